//! 后端注册表
//!
//! 按名称在运行时创建后端。名称不区分大小写。

use tracing::info;

use crate::core::config::ConstructorParameters;
use crate::core::error::{ConfigError, Result};
use crate::gfx::adapter::PresentAdapter;
use crate::gfx::backend::RenderBackend;
use crate::gfx::headless::{HeadlessPlatform, HeadlessSettings};
use crate::gfx::vulkan::VulkanPlatform;

/// 后端工厂
pub type BackendFactory = fn(&ConstructorParameters) -> Box<dyn RenderBackend>;

const BACKENDS: &[(&str, BackendFactory)] = &[("vulkan", create_vulkan), ("headless", create_headless)];

fn create_vulkan(params: &ConstructorParameters) -> Box<dyn RenderBackend> {
    Box::new(PresentAdapter::new(VulkanPlatform::new(), params.clone()))
}

fn create_headless(params: &ConstructorParameters) -> Box<dyn RenderBackend> {
    Box::new(PresentAdapter::new(HeadlessPlatform::new(HeadlessSettings::default()), params.clone()))
}

/// 已注册的后端名称
pub fn available_backends() -> Vec<&'static str> {
    BACKENDS.iter().map(|(name, _)| *name).collect()
}

/// 按名称创建后端
///
/// 创建本身不会失败：GPU 实例创建失败时返回的后端 `doing_okay()` 为 `false`。
pub fn create_backend(name: &str, params: &ConstructorParameters) -> Result<Box<dyn RenderBackend>> {
    let key = name.trim().to_ascii_lowercase();
    let (_, factory) = BACKENDS
        .iter()
        .find(|(registered, _)| *registered == key)
        .ok_or_else(|| ConfigError::InvalidValue {
            field: "rendering.backend".to_string(),
            reason: format!("unknown backend '{}', available: {}", name, available_backends().join(", ")),
        })?;

    let backend = factory(params);
    info!(backend = backend.backend_name(), okay = backend.doing_okay(), "Render backend created");
    Ok(backend)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_available_backends() {
        assert_eq!(available_backends(), vec!["vulkan", "headless"]);
    }

    #[test]
    fn test_create_headless_by_name() {
        let backend = create_backend(" Headless ", &ConstructorParameters::default()).unwrap();
        assert_eq!(backend.backend_name(), "Headless");
        assert!(backend.doing_okay());
        assert_eq!(backend.num_eyes(), 2);
        assert!(backend.open_display().is_complete());
        assert!(backend.render_path_setup());
    }

    #[test]
    fn test_unknown_backend_is_config_error() {
        let err = create_backend("dx12", &ConstructorParameters::default())
            .err()
            .expect("unknown backend");
        assert!(err.to_string().contains("unknown backend 'dx12'"));
    }
}

//! 渲染目标描述
//!
//! 每只眼睛一对颜色/深度目标，尺寸与该眼视口完全一致。
//! 颜色格式固定为 4 通道 8 位无符号归一化格式，这是直接呈现路径的硬性要求。

use crate::core::math::Viewport;

/// 颜色目标格式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ColorFormat {
    /// R8G8B8A8_UNORM
    #[default]
    Rgba8Unorm,
}

/// 深度/模板目标格式，按优先级排列
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum DepthFormat {
    #[default]
    D24UnormS8Uint,
    D32SfloatS8Uint,
    D16UnormS8Uint,
}

impl DepthFormat {
    /// 设备不支持首选格式时依次尝试的候选
    pub const CANDIDATES: [DepthFormat; 3] = [
        DepthFormat::D24UnormS8Uint,
        DepthFormat::D32SfloatS8Uint,
        DepthFormat::D16UnormS8Uint,
    ];
}

/// 单只眼睛渲染目标的描述信息
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderTargetDescriptor {
    /// 所属眼睛
    pub eye: usize,
    /// 尺寸（像素）
    pub extent: [u32; 2],
    /// 颜色格式
    pub color_format: ColorFormat,
    /// 深度格式
    pub depth_format: DepthFormat,
    /// 调试名称（可选）
    pub name: Option<String>,
}

impl RenderTargetDescriptor {
    /// 按眼睛视口创建描述符
    pub fn for_eye(eye: usize, viewport: &Viewport) -> Self {
        Self {
            eye,
            extent: viewport.extent(),
            color_format: ColorFormat::Rgba8Unorm,
            depth_format: DepthFormat::default(),
            name: None,
        }
    }

    /// 设置调试名称
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// 像素数量
    pub fn texel_count(&self) -> u64 {
        self.extent[0] as u64 * self.extent[1] as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_matches_viewport() {
        let desc = RenderTargetDescriptor::for_eye(1, &Viewport::new(960, 0, 960, 1080))
            .with_name("eye1");
        assert_eq!(desc.extent, [960, 1080]);
        assert_eq!(desc.color_format, ColorFormat::Rgba8Unorm);
        assert_eq!(desc.depth_format, DepthFormat::D24UnormS8Uint);
        assert_eq!(desc.name.as_deref(), Some("eye1"));
        assert_eq!(desc.texel_count(), 960 * 1080);
    }
}

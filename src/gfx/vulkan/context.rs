//! Vulkan 实例与设备
//!
//! # 初始化流程
//!
//! 1. 加载 Vulkan 库并创建实例（只启用本机支持的表面扩展）
//! 2. 第一个表面创建后选择物理设备（优先独立显卡）
//! 3. 创建逻辑设备和队列
//! 4. 创建内存和命令缓冲分配器，选择深度格式

use std::sync::Arc;
use tracing::{debug, info};
use vulkano::command_buffer::allocator::{
    StandardCommandBufferAllocator, StandardCommandBufferAllocatorCreateInfo,
};
use vulkano::device::physical::{PhysicalDevice, PhysicalDeviceType};
use vulkano::device::{Device, DeviceCreateInfo, DeviceExtensions, Queue, QueueCreateInfo, QueueFlags};
use vulkano::format::{Format, FormatFeatures};
use vulkano::instance::{Instance, InstanceCreateInfo, InstanceExtensions};
use vulkano::memory::allocator::StandardMemoryAllocator;
use vulkano::swapchain::Surface;
use vulkano::VulkanLibrary;

use crate::core::config::ConstructorParameters;
use crate::core::error::{GraphicsError, Result};
use crate::renderer::resource::{ColorFormat, DepthFormat};

/// 创建 Vulkan 实例
pub fn create_instance(params: &ConstructorParameters) -> Result<Arc<Instance>> {
    let library = VulkanLibrary::new()
        .map_err(|e| GraphicsError::InstanceCreation(format!("Failed to load Vulkan library: {:?}", e)))?;

    let wanted = InstanceExtensions {
        khr_surface: true,
        khr_win32_surface: cfg!(target_os = "windows"),
        khr_xlib_surface: cfg!(all(unix, not(target_os = "macos"), not(target_os = "android"))),
        khr_wayland_surface: cfg!(all(unix, not(target_os = "macos"), not(target_os = "android"))),
        ..InstanceExtensions::empty()
    };
    let supported = library.supported_extensions();
    if !supported.khr_surface {
        return Err(GraphicsError::InstanceCreation("VK_KHR_surface is not supported".to_string()).into());
    }
    let enabled_extensions = supported.intersection(&wanted);

    let instance = Instance::new(
        library,
        InstanceCreateInfo {
            application_name: Some(params.window_title.clone()),
            enabled_extensions,
            ..Default::default()
        },
    )
    .map_err(|e| GraphicsError::InstanceCreation(format!("Failed to create Vulkan instance: {:?}", e)))?;

    debug!(extensions = ?enabled_extensions, "Vulkan instance created");
    Ok(instance)
}

/// 逻辑设备及其分配器
pub struct DeviceContext {
    pub device: Arc<Device>,
    pub queue: Arc<Queue>,
    pub memory_allocator: Arc<StandardMemoryAllocator>,
    pub command_buffer_allocator: StandardCommandBufferAllocator,
    /// 设备支持的深度/模板格式
    pub depth_format: DepthFormat,
}

impl DeviceContext {
    /// 选择能向 `surface` 呈现的物理设备并创建逻辑设备
    pub fn new(instance: &Arc<Instance>, surface: &Surface) -> Result<Self> {
        let device_extensions = DeviceExtensions {
            khr_swapchain: true,
            ..DeviceExtensions::empty()
        };

        // 优先级：独立显卡 > 集成显卡 > 虚拟显卡 > CPU > 其他
        let (physical_device, queue_family_index) = instance
            .enumerate_physical_devices()
            .map_err(|e| GraphicsError::DeviceCreation(format!("Failed to enumerate physical devices: {:?}", e)))?
            .filter(|p| p.supported_extensions().contains(&device_extensions))
            .filter_map(|p| {
                p.queue_family_properties()
                    .iter()
                    .enumerate()
                    .position(|(i, q)| {
                        q.queue_flags.intersects(QueueFlags::GRAPHICS)
                            && p.surface_support(i as u32, surface).unwrap_or(false)
                    })
                    .map(|i| (p, i as u32))
            })
            .min_by_key(|(p, _)| match p.properties().device_type {
                PhysicalDeviceType::DiscreteGpu => 0,
                PhysicalDeviceType::IntegratedGpu => 1,
                PhysicalDeviceType::VirtualGpu => 2,
                PhysicalDeviceType::Cpu => 3,
                PhysicalDeviceType::Other => 4,
                _ => 5,
            })
            .ok_or_else(|| GraphicsError::DeviceCreation("No suitable physical device found".to_string()))?;

        info!(
            device_name = physical_device.properties().device_name,
            device_type = ?physical_device.properties().device_type,
            "Using device"
        );
        debug!(queue_family_index, "Queue family index");

        let depth_format = select_depth_format(&physical_device);

        let (device, mut queues) = Device::new(
            physical_device,
            DeviceCreateInfo {
                enabled_extensions: device_extensions,
                queue_create_infos: vec![QueueCreateInfo {
                    queue_family_index,
                    ..Default::default()
                }],
                ..Default::default()
            },
        )
        .map_err(|e| GraphicsError::DeviceCreation(format!("Failed to create logical device: {:?}", e)))?;

        let queue = queues
            .next()
            .ok_or_else(|| GraphicsError::DeviceCreation("Failed to get queue".to_string()))?;

        let memory_allocator = Arc::new(StandardMemoryAllocator::new_default(device.clone()));
        let command_buffer_allocator = StandardCommandBufferAllocator::new(
            device.clone(),
            StandardCommandBufferAllocatorCreateInfo::default(),
        );

        debug!(?depth_format, "Vulkan device ready");

        Ok(Self {
            device,
            queue,
            memory_allocator,
            command_buffer_allocator,
            depth_format,
        })
    }

    pub fn vk_depth_format(&self) -> Format {
        vk_depth_format(self.depth_format)
    }
}

/// 按候选顺序选出第一个可用作深度/模板附件的格式
fn select_depth_format(physical_device: &PhysicalDevice) -> DepthFormat {
    DepthFormat::CANDIDATES
        .into_iter()
        .find(|candidate| {
            physical_device
                .format_properties(vk_depth_format(*candidate))
                .map(|props| {
                    props
                        .optimal_tiling_features
                        .intersects(FormatFeatures::DEPTH_STENCIL_ATTACHMENT)
                })
                .unwrap_or(false)
        })
        .unwrap_or(DepthFormat::D32SfloatS8Uint)
}

pub fn vk_depth_format(format: DepthFormat) -> Format {
    match format {
        DepthFormat::D24UnormS8Uint => Format::D24_UNORM_S8_UINT,
        DepthFormat::D32SfloatS8Uint => Format::D32_SFLOAT_S8_UINT,
        DepthFormat::D16UnormS8Uint => Format::D16_UNORM_S8_UINT,
    }
}

pub fn vk_color_format(format: ColorFormat) -> Format {
    match format {
        ColorFormat::Rgba8Unorm => Format::R8G8B8A8_UNORM,
    }
}

//! Vulkan 呈现平台
//!
//! 本模块包含所有 Vulkan 相关的代码：
//! - Context: 实例创建、物理设备选择、逻辑设备与分配器
//! - Surface: 从原生窗口句柄创建表面，以及交换链的创建与重建
//! - Platform: [`VulkanPlatform`]，把以上内容接到适配器的平台接口上
//! - EventLoop: 每个线程共享的 winit 事件循环

pub mod context;
mod event_loop;
pub mod platform;
pub mod surface;

use std::fmt;
use std::sync::Arc;

use vulkano::device::{Device, Queue};
use vulkano::image::view::ImageView;
use vulkano::image::Image;
use vulkano::instance::Instance;
use vulkano::memory::allocator::StandardMemoryAllocator;

pub use context::DeviceContext;
pub use platform::{VulkanInstance, VulkanPlatform};
pub use surface::VulkanSurface;

/// 交给应用的 Vulkan 句柄
///
/// 应用用这些句柄创建自己的管线和命令缓冲，在渲染回调中提交到 `queue`。
#[derive(Clone)]
pub struct GraphicsLibraryVulkan {
    pub instance: Arc<Instance>,
    pub device: Arc<Device>,
    pub queue: Arc<Queue>,
    pub memory_allocator: Arc<StandardMemoryAllocator>,
}

impl fmt::Debug for GraphicsLibraryVulkan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphicsLibraryVulkan")
            .field("device", &self.device.physical_device().properties().device_name)
            .field("queue_family_index", &self.queue.queue_family_index())
            .finish()
    }
}

/// 一只眼睛的颜色 + 深度目标
#[derive(Clone)]
pub struct RenderBufferVulkan {
    pub color: Arc<Image>,
    pub color_view: Arc<ImageView>,
    pub depth: Arc<Image>,
    pub depth_view: Arc<ImageView>,
}

impl RenderBufferVulkan {
    pub fn extent(&self) -> [u32; 2] {
        let [width, height, _] = self.color.extent();
        [width, height]
    }
}

impl fmt::Debug for RenderBufferVulkan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderBufferVulkan")
            .field("extent", &self.extent())
            .field("color_format", &self.color.format())
            .field("depth_format", &self.depth.format())
            .finish()
    }
}

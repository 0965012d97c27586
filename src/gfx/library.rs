//! 交给应用程序的图形句柄包
//!
//! 每个后端一个变体。应用的渲染回调按变体取出自己认识的句柄，
//! 用它们记录绘制命令；句柄本身都是引用计数的，克隆代价很低。

use crate::gfx::headless::{GraphicsLibraryHeadless, RenderBufferHeadless};
use crate::gfx::vulkan::{GraphicsLibraryVulkan, RenderBufferVulkan};

/// 图形库句柄包：应用在自己的管线初始化中使用
#[derive(Debug, Clone)]
pub enum GraphicsLibrary {
    Vulkan(GraphicsLibraryVulkan),
    Headless(GraphicsLibraryHeadless),
}

/// 单只眼睛的渲染缓冲（颜色 + 深度），借给回调使用
#[derive(Debug, Clone)]
pub enum RenderBuffer {
    Vulkan(RenderBufferVulkan),
    Headless(RenderBufferHeadless),
}

impl GraphicsLibrary {
    pub fn backend_name(&self) -> &'static str {
        match self {
            GraphicsLibrary::Vulkan(_) => "Vulkan",
            GraphicsLibrary::Headless(_) => "Headless",
        }
    }

    pub fn as_vulkan(&self) -> Option<&GraphicsLibraryVulkan> {
        match self {
            GraphicsLibrary::Vulkan(library) => Some(library),
            _ => None,
        }
    }

    pub fn as_headless(&self) -> Option<&GraphicsLibraryHeadless> {
        match self {
            GraphicsLibrary::Headless(library) => Some(library),
            _ => None,
        }
    }
}

impl RenderBuffer {
    /// 缓冲尺寸（像素）
    pub fn extent(&self) -> [u32; 2] {
        match self {
            RenderBuffer::Vulkan(buffer) => buffer.extent(),
            RenderBuffer::Headless(buffer) => buffer.extent,
        }
    }

    pub fn as_vulkan(&self) -> Option<&RenderBufferVulkan> {
        match self {
            RenderBuffer::Vulkan(buffer) => Some(buffer),
            _ => None,
        }
    }

    pub fn as_headless(&self) -> Option<&RenderBufferHeadless> {
        match self {
            RenderBuffer::Headless(buffer) => Some(buffer),
            _ => None,
        }
    }
}

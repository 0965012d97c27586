//! 表面与交换链
//!
//! winit 0.29 使用 raw-window-handle 0.6，而 vulkano 0.34 依赖 0.5，
//! 因此表面通过 ash 的平台扩展手动创建，再包装为 vulkano 的 `Surface`。

use std::any::Any;
use std::ffi::c_void;
use std::sync::Arc;

use ash::extensions::khr;
use ash::vk;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle, RawDisplayHandle, RawWindowHandle};
use tracing::debug;
use vulkano::format::Format;
use vulkano::image::{Image, ImageUsage};
use vulkano::instance::Instance;
use vulkano::swapchain::{PresentMode, Surface, SurfaceApi, Swapchain, SwapchainAcquireFuture, SwapchainCreateInfo};
use vulkano::VulkanObject;
use winit::window::Window;

use super::context::DeviceContext;
use crate::core::error::{GraphicsError, HmdRenderError, Result};

/// 一个显示的表面、交换链与当前获取的图像
pub struct VulkanSurface {
    pub display: usize,
    pub window: Arc<Window>,
    pub surface: Arc<Surface>,
    pub swapchain: Arc<Swapchain>,
    pub images: Vec<Arc<Image>>,
    /// begin_present 获取、finish_present 消费
    pub(crate) acquired: Option<(u32, SwapchainAcquireFuture)>,
    pub(crate) needs_recreate: bool,
}

impl VulkanSurface {
    pub fn new(ctx: &DeviceContext, index: usize, window: Arc<Window>, surface: Arc<Surface>, vsync: bool) -> Result<Self> {
        let (swapchain, images) = create_swapchain(ctx, &surface, &window, vsync)?;
        debug!(
            display = index,
            width = swapchain.image_extent()[0],
            height = swapchain.image_extent()[1],
            images = images.len(),
            present_mode = ?swapchain.present_mode(),
            "Swapchain created"
        );
        Ok(Self {
            display: index,
            window,
            surface,
            swapchain,
            images,
            acquired: None,
            needs_recreate: false,
        })
    }

    /// 按窗口当前尺寸重建交换链
    pub fn recreate(&mut self) -> Result<()> {
        let image_extent: [u32; 2] = self.window.inner_size().into();
        if image_extent.contains(&0) {
            // 最小化时保留旧交换链
            return Ok(());
        }

        let (swapchain, images) = self
            .swapchain
            .recreate(SwapchainCreateInfo {
                image_extent,
                ..self.swapchain.create_info()
            })
            .map_err(|e| GraphicsError::SwapchainError(format!("Failed to recreate swapchain: {:?}", e)))?;

        debug!(
            display = self.display,
            width = image_extent[0],
            height = image_extent[1],
            "Swapchain recreated"
        );
        self.swapchain = swapchain;
        self.images = images;
        self.needs_recreate = false;
        Ok(())
    }
}

/// 从窗口的原生句柄创建表面
pub fn create_surface(instance: &Arc<Instance>, window: &Arc<Window>, index: usize) -> Result<Arc<Surface>> {
    let fail = |reason: String| HmdRenderError::from(GraphicsError::SurfaceCreation { display: index, reason });

    let window_handle = window.window_handle().map_err(|e| fail(e.to_string()))?.as_raw();
    let display_handle = window.display_handle().map_err(|e| fail(e.to_string()))?.as_raw();

    let entry = unsafe { ash::Entry::load() }.map_err(|e| fail(format!("Failed to load Vulkan entry: {}", e)))?;
    let ash_instance = unsafe { ash::Instance::load(entry.static_fn(), instance.handle()) };

    let (handle, api) = unsafe { raw_surface(&entry, &ash_instance, window_handle, display_handle) }.map_err(fail)?;

    // 表面持有窗口，保证窗口比表面活得久
    let object: Arc<dyn Any + Send + Sync> = window.clone();
    let surface = unsafe { Surface::from_handle(instance.clone(), handle, api, Some(object)) };
    debug!(display = index, ?api, "Vulkan surface created");
    Ok(Arc::new(surface))
}

unsafe fn raw_surface(
    entry: &ash::Entry,
    instance: &ash::Instance,
    window: RawWindowHandle,
    display: RawDisplayHandle,
) -> std::result::Result<(vk::SurfaceKHR, SurfaceApi), String> {
    match (window, display) {
        (RawWindowHandle::Win32(handle), _) => {
            let hinstance = handle
                .hinstance
                .map_or(std::ptr::null(), |h| h.get() as *const c_void);
            let create_info = vk::Win32SurfaceCreateInfoKHR::builder()
                .hinstance(hinstance)
                .hwnd(handle.hwnd.get() as *const c_void);
            khr::Win32Surface::new(entry, instance)
                .create_win32_surface(&create_info, None)
                .map(|surface| (surface, SurfaceApi::Win32))
                .map_err(|e| format!("Failed to create Win32 surface: {}", e))
        }
        (RawWindowHandle::Xlib(window), RawDisplayHandle::Xlib(display)) => {
            let dpy = display
                .display
                .map_or(std::ptr::null_mut(), |d| d.as_ptr());
            let create_info = vk::XlibSurfaceCreateInfoKHR::builder()
                .dpy(dpy as *mut vk::Display)
                .window(window.window);
            khr::XlibSurface::new(entry, instance)
                .create_xlib_surface(&create_info, None)
                .map(|surface| (surface, SurfaceApi::Xlib))
                .map_err(|e| format!("Failed to create Xlib surface: {}", e))
        }
        (RawWindowHandle::Wayland(window), RawDisplayHandle::Wayland(display)) => {
            let create_info = vk::WaylandSurfaceCreateInfoKHR::builder()
                .display(display.display.as_ptr())
                .surface(window.surface.as_ptr());
            khr::WaylandSurface::new(entry, instance)
                .create_wayland_surface(&create_info, None)
                .map(|surface| (surface, SurfaceApi::Wayland))
                .map_err(|e| format!("Failed to create Wayland surface: {}", e))
        }
        (other, _) => Err(format!("Unsupported window handle: {:?}", other)),
    }
}

fn create_swapchain(
    ctx: &DeviceContext,
    surface: &Arc<Surface>,
    window: &Window,
    vsync: bool,
) -> Result<(Arc<Swapchain>, Vec<Arc<Image>>)> {
    let physical = ctx.device.physical_device();

    let capabilities = physical
        .surface_capabilities(surface, Default::default())
        .map_err(|e| GraphicsError::SwapchainError(format!("Failed to get surface capabilities: {:?}", e)))?;
    let formats = physical
        .surface_formats(surface, Default::default())
        .map_err(|e| GraphicsError::SwapchainError(format!("Failed to get surface formats: {:?}", e)))?;

    let image_format = formats
        .iter()
        .map(|(format, _)| *format)
        .find(|format| matches!(format, Format::B8G8R8A8_UNORM | Format::R8G8B8A8_UNORM))
        .or_else(|| formats.first().map(|(format, _)| *format))
        .ok_or_else(|| GraphicsError::SwapchainError("No surface formats available".to_string()))?;

    // 合成通过 blit 写入交换链图像
    if !capabilities.supported_usage_flags.intersects(ImageUsage::TRANSFER_DST) {
        return Err(GraphicsError::SwapchainError("Swapchain images cannot be blit targets".to_string()).into());
    }

    let composite_alpha = capabilities
        .supported_composite_alpha
        .into_iter()
        .next()
        .ok_or_else(|| GraphicsError::SwapchainError("No supported composite alpha modes".to_string()))?;

    let mut min_image_count = capabilities.min_image_count.max(2);
    if let Some(max) = capabilities.max_image_count {
        min_image_count = min_image_count.min(max);
    }

    let present_mode = choose_present_mode(ctx, surface, vsync);

    Swapchain::new(
        ctx.device.clone(),
        surface.clone(),
        SwapchainCreateInfo {
            min_image_count,
            image_format,
            image_extent: window.inner_size().into(),
            image_usage: ImageUsage::COLOR_ATTACHMENT | ImageUsage::TRANSFER_DST,
            composite_alpha,
            present_mode,
            ..Default::default()
        },
    )
    .map_err(|e| GraphicsError::SwapchainError(format!("Failed to create swapchain: {:?}", e)).into())
}

/// 垂直同步时固定使用 FIFO；否则优先 Immediate，其次 Mailbox
fn choose_present_mode(ctx: &DeviceContext, surface: &Surface, vsync: bool) -> PresentMode {
    if vsync {
        return PresentMode::Fifo;
    }
    let supported: Vec<PresentMode> = ctx
        .device
        .physical_device()
        .surface_present_modes(surface, Default::default())
        .map(|modes| modes.into_iter().collect())
        .unwrap_or_default();
    preferred_present_mode(&supported, vsync)
}

pub(crate) fn preferred_present_mode(supported: &[PresentMode], vsync: bool) -> PresentMode {
    if vsync {
        return PresentMode::Fifo;
    }
    [PresentMode::Immediate, PresentMode::Mailbox]
        .into_iter()
        .find(|mode| supported.contains(mode))
        .unwrap_or(PresentMode::Fifo)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vsync_always_uses_fifo() {
        let all = [PresentMode::Immediate, PresentMode::Mailbox, PresentMode::Fifo];
        assert_eq!(preferred_present_mode(&all, true), PresentMode::Fifo);
    }

    #[test]
    fn test_present_mode_fallback_order() {
        let all = [PresentMode::Fifo, PresentMode::Mailbox, PresentMode::Immediate];
        assert_eq!(preferred_present_mode(&all, false), PresentMode::Immediate);
        assert_eq!(
            preferred_present_mode(&[PresentMode::Fifo, PresentMode::Mailbox], false),
            PresentMode::Mailbox
        );
        assert_eq!(preferred_present_mode(&[PresentMode::Fifo], false), PresentMode::Fifo);
        assert_eq!(preferred_present_mode(&[], false), PresentMode::Fifo);
    }
}

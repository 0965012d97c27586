//! Vulkan + winit 平台
//!
//! 窗口由 winit 创建。事件循环属于打开显示的线程（见 [`super::event_loop`]），
//! 按帧用 `pump_events` 非阻塞地排空。
//! 逻辑设备在第一个表面创建后才选择，以保证所选队列族能向该表面呈现。
//! 每次呈现在提交后等待设备完成，再把图像交给呈现引擎。

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, trace, warn};
use vulkano::command_buffer::{
    AutoCommandBufferBuilder, BlitImageInfo, ClearColorImageInfo, CommandBufferUsage, ImageBlit,
    PrimaryAutoCommandBuffer,
};
use vulkano::format::ClearColorValue;
use vulkano::image::sampler::Filter;
use vulkano::image::view::ImageView;
use vulkano::image::{Image, ImageCreateInfo, ImageType, ImageUsage};
use vulkano::memory::allocator::{AllocationCreateInfo, MemoryTypeFilter};
use vulkano::swapchain::{acquire_next_image, SwapchainPresentInfo};
use vulkano::sync::{self, GpuFuture};
use vulkano::{Validated, VulkanError};
use winit::dpi::{PhysicalPosition, PhysicalSize};
use winit::event::{Event, WindowEvent};
use winit::platform::pump_events::{EventLoopExtPumpEvents, PumpStatus};
use winit::window::{Fullscreen, Window, WindowBuilder, WindowId};

use super::context::{self, vk_color_format, DeviceContext};
use super::event_loop;
use super::surface::{self, VulkanSurface};
use super::{GraphicsLibraryVulkan, RenderBufferVulkan};
use crate::core::config::ConstructorParameters;
use crate::core::error::{GraphicsError, HmdRenderError, PreconditionError, Result};
use crate::core::event::HostEvent;
use crate::gfx::library::{GraphicsLibrary, RenderBuffer};
use crate::gfx::platform::{Platform, PresentSource};
use crate::renderer::resource::RenderTargetDescriptor;
use crate::renderer::topology::WindowDescriptor;

/// 实例与（延迟创建的）设备
pub struct VulkanInstance {
    pub instance: Arc<vulkano::instance::Instance>,
    pub device: Option<DeviceContext>,
}

impl VulkanInstance {
    fn context(&self) -> Result<&DeviceContext> {
        self.device
            .as_ref()
            .ok_or_else(|| PreconditionError::DisplayNotOpen.into())
    }
}

/// Vulkan 平台
#[derive(Debug, Default)]
pub struct VulkanPlatform {
    /// 窗口到显示编号的映射，用于把窗口事件归到显示
    window_ids: Vec<(WindowId, usize)>,
    vsync: bool,
}

impl VulkanPlatform {
    pub fn new() -> Self {
        Self::default()
    }

}

fn display_of(window_ids: &[(WindowId, usize)], window_id: WindowId) -> Option<usize> {
    window_ids
        .iter()
        .find(|(id, _)| *id == window_id)
        .map(|(_, display)| *display)
}

/// 显示器报告的刷新率（毫赫兹）换算为刷新间隔
pub(crate) fn interval_from_millihertz(millihertz: u32) -> Option<Duration> {
    if millihertz == 0 {
        return None;
    }
    Some(Duration::from_nanos(1_000_000_000_000 / u64::from(millihertz)))
}

/// 把 winit 窗口事件映射为宿主事件；不关心的事件返回 `None`
fn host_event(window_ids: &[(WindowId, usize)], event: Event<()>) -> Option<HostEvent> {
    match event {
        Event::WindowEvent { window_id, event } => match event {
            WindowEvent::CloseRequested | WindowEvent::Destroyed => Some(HostEvent::CloseRequested {
                display: display_of(window_ids, window_id),
            }),
            WindowEvent::Resized(size) => Some(HostEvent::Resized {
                display: display_of(window_ids, window_id),
                width: size.width,
                height: size.height,
            }),
            _ => None,
        },
        Event::LoopExiting => Some(HostEvent::Quit),
        _ => None,
    }
}

/// 根据窗口描述构建 winit 的窗口参数
fn window_builder(descriptor: &WindowDescriptor) -> WindowBuilder {
    let builder = WindowBuilder::new()
        .with_title(descriptor.title.clone())
        .with_inner_size(PhysicalSize::new(descriptor.width, descriptor.height))
        .with_position(PhysicalPosition::new(descriptor.x, descriptor.y))
        .with_resizable(descriptor.resizable);
    if descriptor.fullscreen {
        builder
            .with_decorations(false)
            .with_fullscreen(Some(Fullscreen::Borderless(None)))
    } else {
        builder
    }
}

fn command_error<E: std::fmt::Debug>(e: E) -> HmdRenderError {
    GraphicsError::CommandExecution(format!("{:?}", e)).into()
}

fn resource_error<E: std::fmt::Debug>(e: E) -> HmdRenderError {
    GraphicsError::ResourceCreation(format!("{:?}", e)).into()
}

fn one_time_builder(ctx: &DeviceContext) -> Result<AutoCommandBufferBuilder<PrimaryAutoCommandBuffer>> {
    AutoCommandBufferBuilder::primary(
        &ctx.command_buffer_allocator,
        ctx.queue.queue_family_index(),
        CommandBufferUsage::OneTimeSubmit,
    )
    .map_err(command_error)
}

impl Platform for VulkanPlatform {
    type Instance = VulkanInstance;
    type Window = Arc<Window>;
    type Surface = VulkanSurface;
    type Target = RenderBufferVulkan;

    fn name(&self) -> &'static str {
        "Vulkan"
    }

    fn create_instance(&mut self, params: &ConstructorParameters) -> Result<VulkanInstance> {
        self.vsync = params.vsync;
        let instance = context::create_instance(params)?;
        Ok(VulkanInstance { instance, device: None })
    }

    fn init_windowing(&mut self) -> Result<()> {
        event_loop::ensure_event_loop()
    }

    fn create_window(&mut self, descriptor: &WindowDescriptor) -> Result<Arc<Window>> {
        let builder = window_builder(descriptor);
        let window = event_loop::with_event_loop(|event_loop| builder.build(&*event_loop))?
            .map_err(|e| GraphicsError::WindowCreation {
                display: descriptor.display,
                reason: e.to_string(),
            })?;
        self.window_ids.push((window.id(), descriptor.display));
        Ok(Arc::new(window))
    }

    fn drawable_size(&self, window: &Arc<Window>) -> [u32; 2] {
        window.inner_size().into()
    }

    fn refresh_interval(&self, window: &Arc<Window>) -> Option<Duration> {
        interval_from_millihertz(window.current_monitor()?.refresh_rate_millihertz()?)
    }

    fn create_surface(
        &mut self,
        instance: &mut VulkanInstance,
        window: &Arc<Window>,
        display: usize,
    ) -> Result<VulkanSurface> {
        let surface = surface::create_surface(&instance.instance, window, display)?;

        if instance.device.is_none() {
            instance.device = Some(DeviceContext::new(&instance.instance, &surface)?);
        }
        let ctx = instance.context()?;

        let supported = ctx
            .device
            .physical_device()
            .surface_support(ctx.queue.queue_family_index(), &surface)
            .unwrap_or(false);
        if !supported {
            return Err(GraphicsError::SurfaceCreation {
                display,
                reason: "selected queue family cannot present to this surface".to_string(),
            }
            .into());
        }

        VulkanSurface::new(ctx, display, window.clone(), surface, self.vsync)
    }

    fn library(&self, instance: &VulkanInstance) -> Result<GraphicsLibrary> {
        let ctx = instance.context()?;
        Ok(GraphicsLibrary::Vulkan(GraphicsLibraryVulkan {
            instance: instance.instance.clone(),
            device: ctx.device.clone(),
            queue: ctx.queue.clone(),
            memory_allocator: ctx.memory_allocator.clone(),
        }))
    }

    fn create_render_target(
        &mut self,
        instance: &mut VulkanInstance,
        descriptor: &RenderTargetDescriptor,
    ) -> Result<RenderBufferVulkan> {
        let ctx = instance.context()?;
        let [width, height] = descriptor.extent;

        let color = Image::new(
            ctx.memory_allocator.clone(),
            ImageCreateInfo {
                image_type: ImageType::Dim2d,
                format: vk_color_format(descriptor.color_format),
                extent: [width, height, 1],
                usage: ImageUsage::COLOR_ATTACHMENT
                    | ImageUsage::SAMPLED
                    | ImageUsage::TRANSFER_SRC
                    | ImageUsage::TRANSFER_DST,
                ..Default::default()
            },
            AllocationCreateInfo {
                memory_type_filter: MemoryTypeFilter::PREFER_DEVICE,
                ..Default::default()
            },
        )
        .map_err(resource_error)?;
        let color_view = ImageView::new_default(color.clone()).map_err(resource_error)?;

        // 设备选出的深度格式优先于描述符里的首选值
        let depth = Image::new(
            ctx.memory_allocator.clone(),
            ImageCreateInfo {
                image_type: ImageType::Dim2d,
                format: ctx.vk_depth_format(),
                extent: [width, height, 1],
                usage: ImageUsage::DEPTH_STENCIL_ATTACHMENT,
                ..Default::default()
            },
            AllocationCreateInfo {
                memory_type_filter: MemoryTypeFilter::PREFER_DEVICE,
                ..Default::default()
            },
        )
        .map_err(resource_error)?;
        let depth_view = ImageView::new_default(depth.clone()).map_err(resource_error)?;

        debug!(eye = descriptor.eye, name = ?descriptor.name, width, height, "Vulkan render target created");
        Ok(RenderBufferVulkan {
            color,
            color_view,
            depth,
            depth_view,
        })
    }

    fn lend(&self, target: &RenderBufferVulkan) -> RenderBuffer {
        RenderBuffer::Vulkan(target.clone())
    }

    fn adopt(&self, buffer: &RenderBuffer) -> Option<RenderBufferVulkan> {
        buffer
            .as_vulkan()
            .filter(|b| b.color.usage().intersects(ImageUsage::TRANSFER_SRC))
            .cloned()
    }

    fn fill_target(&mut self, instance: &mut VulkanInstance, target: &RenderBufferVulkan, rgba: [f32; 4]) -> Result<()> {
        let ctx = instance.context()?;
        let mut builder = one_time_builder(ctx)?;
        builder
            .clear_color_image(ClearColorImageInfo {
                clear_value: ClearColorValue::Float(rgba),
                ..ClearColorImageInfo::image(target.color.clone())
            })
            .map_err(command_error)?;
        let command_buffer = builder.build().map_err(command_error)?;

        sync::now(ctx.device.clone())
            .then_execute(ctx.queue.clone(), command_buffer)
            .map_err(command_error)?
            .then_signal_fence_and_flush()
            .map_err(command_error)?
            .wait(None)
            .map_err(command_error)
    }

    fn begin_present(&mut self, _instance: &mut VulkanInstance, surface: &mut VulkanSurface) -> Result<()> {
        if surface.acquired.is_some() {
            return Err(GraphicsError::SwapchainError("image already acquired".to_string()).into());
        }
        if surface.needs_recreate {
            surface.recreate()?;
        }

        let (index, suboptimal, future) = match acquire_next_image(surface.swapchain.clone(), None) {
            Ok(acquired) => acquired,
            Err(Validated::Error(VulkanError::OutOfDate)) => {
                warn!(display = surface.display, "Swapchain out of date, recreating");
                surface.recreate()?;
                acquire_next_image(surface.swapchain.clone(), None).map_err(|e| {
                    GraphicsError::SwapchainError(format!("Failed to acquire next image: {:?}", e))
                })?
            }
            Err(e) => {
                return Err(GraphicsError::SwapchainError(format!("Failed to acquire next image: {:?}", e)).into());
            }
        };

        if suboptimal {
            debug!(display = surface.display, "Swapchain suboptimal, will recreate next frame");
            surface.needs_recreate = true;
        }
        trace!(display = surface.display, index, "Acquired swapchain image");
        surface.acquired = Some((index, future));
        Ok(())
    }

    fn finish_present(
        &mut self,
        instance: &mut VulkanInstance,
        surface: &mut VulkanSurface,
        sources: &[PresentSource<'_, RenderBufferVulkan>],
    ) -> Result<()> {
        let ctx = instance.context()?;
        let (index, acquire_future) = surface
            .acquired
            .take()
            .ok_or_else(|| GraphicsError::SwapchainError("no acquired image".to_string()))?;
        let destination = surface.images[index as usize].clone();
        let [dst_width, dst_height, _] = destination.extent();

        let mut builder = one_time_builder(ctx)?;
        builder
            .clear_color_image(ClearColorImageInfo {
                clear_value: ClearColorValue::Float([0.0, 0.0, 0.0, 1.0]),
                ..ClearColorImageInfo::image(destination.clone())
            })
            .map_err(command_error)?;

        for source in sources {
            let region = source.region;
            let right = region.right().min(dst_width);
            let bottom = region.bottom().min(dst_height);
            if right <= region.left || bottom <= region.top {
                continue;
            }
            let [src_width, src_height] = source.target.extent();
            builder
                .blit_image(BlitImageInfo {
                    regions: [ImageBlit {
                        src_subresource: source.target.color.subresource_layers(),
                        src_offsets: [[0, 0, 0], [src_width, src_height, 1]],
                        dst_subresource: destination.subresource_layers(),
                        dst_offsets: [[region.left, region.top, 0], [right, bottom, 1]],
                        ..Default::default()
                    }]
                    .into(),
                    filter: Filter::Linear,
                    ..BlitImageInfo::images(source.target.color.clone(), destination.clone())
                })
                .map_err(command_error)?;
        }
        let command_buffer = builder.build().map_err(command_error)?;

        // 呈现之前等待设备完成合成
        let composed = acquire_future
            .then_execute(ctx.queue.clone(), command_buffer)
            .map_err(command_error)?
            .then_signal_fence_and_flush()
            .map_err(command_error)?;
        composed.wait(None).map_err(command_error)?;

        let presented = composed
            .then_swapchain_present(
                ctx.queue.clone(),
                SwapchainPresentInfo::swapchain_image_index(surface.swapchain.clone(), index),
            )
            .then_signal_fence_and_flush();

        match presented {
            Ok(future) => future.wait(None).map_err(command_error),
            Err(Validated::Error(VulkanError::OutOfDate)) => {
                debug!(display = surface.display, "Present: swapchain out of date");
                surface.needs_recreate = true;
                Ok(())
            }
            Err(e) => Err(command_error(e)),
        }
    }

    fn pump_events(&mut self) -> Vec<HostEvent> {
        let window_ids = &self.window_ids;
        let mut events = Vec::new();
        let status = event_loop::with_event_loop(|event_loop| {
            event_loop.pump_events(Some(Duration::ZERO), |event, _| {
                events.extend(host_event(window_ids, event));
            })
        });

        match status {
            Ok(PumpStatus::Exit(code)) => {
                debug!(code, "Event loop exited");
                events.push(HostEvent::Quit);
            }
            Ok(PumpStatus::Continue) => {}
            Err(e) => trace!(error = %e, "No events pumped"),
        }
        events
    }

    fn destroy_surface(&mut self, surface: VulkanSurface) {
        debug!(display = surface.display, "Destroying surface");
        drop(surface);
    }

    fn destroy_window(&mut self, window: Arc<Window>) {
        self.window_ids.retain(|(id, _)| *id != window.id());
        drop(window);
    }

    fn destroy_target(&mut self, target: RenderBufferVulkan) {
        drop(target);
    }

    fn destroy_instance(&mut self, instance: VulkanInstance) {
        debug!("Destroying Vulkan device and instance");
        drop(instance);
    }
}

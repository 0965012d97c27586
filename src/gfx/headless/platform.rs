use std::time::Duration;

use super::{GraphicsLibraryHeadless, HeadlessProbe, HeadlessSettings, PlatformCall, RenderBufferHeadless};
use crate::core::config::ConstructorParameters;
use crate::core::error::{GraphicsError, Result};
use crate::core::event::HostEvent;
use crate::gfx::library::{GraphicsLibrary, RenderBuffer};
use crate::gfx::platform::{Platform, PresentSource};
use crate::renderer::resource::RenderTargetDescriptor;
use crate::renderer::sync::interval_from_hz;
use crate::renderer::topology::WindowDescriptor;

#[derive(Debug)]
pub struct HeadlessInstance {
    pub id: u64,
}

#[derive(Debug)]
pub struct HeadlessWindow {
    pub id: u64,
    pub display: usize,
    pub drawable: [u32; 2],
}

#[derive(Debug)]
pub struct HeadlessSurface {
    pub id: u64,
    pub display: usize,
    acquired: bool,
}

/// 内存中的平台实现
#[derive(Debug)]
pub struct HeadlessPlatform {
    settings: HeadlessSettings,
    probe: HeadlessProbe,
    next_id: u64,
    windowing_ready: bool,
}

impl HeadlessPlatform {
    pub fn new(settings: HeadlessSettings) -> Self {
        Self {
            settings,
            probe: HeadlessProbe::default(),
            next_id: 1,
            windowing_ready: false,
        }
    }

    /// 返回平台和一个共享同一份记录的探针
    pub fn with_probe(settings: HeadlessSettings) -> (Self, HeadlessProbe) {
        let platform = Self::new(settings);
        let probe = platform.probe.clone();
        (platform, probe)
    }

    fn allocate_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

impl Default for HeadlessPlatform {
    fn default() -> Self {
        Self::new(HeadlessSettings::default())
    }
}

impl Platform for HeadlessPlatform {
    type Instance = HeadlessInstance;
    type Window = HeadlessWindow;
    type Surface = HeadlessSurface;
    type Target = RenderBufferHeadless;

    fn name(&self) -> &'static str {
        "Headless"
    }

    fn create_instance(&mut self, _params: &ConstructorParameters) -> Result<HeadlessInstance> {
        if self.settings.fail_instance {
            return Err(GraphicsError::InstanceCreation("simulated instance failure".to_string()).into());
        }
        let id = self.allocate_id();
        self.probe.record(PlatformCall::CreateInstance { id });
        Ok(HeadlessInstance { id })
    }

    fn init_windowing(&mut self) -> Result<()> {
        if !self.windowing_ready {
            self.windowing_ready = true;
            self.probe.record(PlatformCall::InitWindowing);
        }
        Ok(())
    }

    fn create_window(&mut self, descriptor: &WindowDescriptor) -> Result<HeadlessWindow> {
        if !self.windowing_ready {
            return Err(GraphicsError::Windowing("windowing not initialized".to_string()).into());
        }
        if self.settings.fail_window_on == Some(descriptor.display) {
            return Err(GraphicsError::WindowCreation {
                display: descriptor.display,
                reason: "simulated window failure".to_string(),
            }
            .into());
        }
        let id = self.allocate_id();
        let scale = self.settings.drawable_scale.max(1);
        self.probe.record(PlatformCall::CreateWindow { id, display: descriptor.display });
        self.probe.record_window(descriptor.clone());
        Ok(HeadlessWindow {
            id,
            display: descriptor.display,
            drawable: [descriptor.width * scale, descriptor.height * scale],
        })
    }

    fn drawable_size(&self, window: &HeadlessWindow) -> [u32; 2] {
        window.drawable
    }

    fn refresh_interval(&self, _window: &HeadlessWindow) -> Option<Duration> {
        self.settings.refresh_rate_hz.map(interval_from_hz)
    }

    fn create_surface(
        &mut self,
        _instance: &mut HeadlessInstance,
        window: &HeadlessWindow,
        display: usize,
    ) -> Result<HeadlessSurface> {
        if self.settings.fail_surface_on == Some(display) {
            return Err(GraphicsError::SurfaceCreation {
                display,
                reason: "simulated surface failure".to_string(),
            }
            .into());
        }
        let id = self.allocate_id();
        self.probe.record(PlatformCall::CreateSurface { id, display: window.display });
        Ok(HeadlessSurface { id, display, acquired: false })
    }

    fn library(&self, instance: &HeadlessInstance) -> Result<GraphicsLibrary> {
        Ok(GraphicsLibrary::Headless(GraphicsLibraryHeadless { instance_id: instance.id }))
    }

    fn create_render_target(
        &mut self,
        _instance: &mut HeadlessInstance,
        descriptor: &RenderTargetDescriptor,
    ) -> Result<RenderBufferHeadless> {
        if self.settings.fail_render_target {
            return Err(GraphicsError::ResourceCreation("simulated allocation failure".to_string()).into());
        }
        let id = self.allocate_id();
        self.probe.record(PlatformCall::CreateTarget {
            id,
            eye: descriptor.eye,
            extent: descriptor.extent,
        });
        let mut buffer = RenderBufferHeadless::new(id, descriptor.eye, descriptor.extent);
        buffer.depth_format = descriptor.depth_format;
        Ok(buffer)
    }

    fn lend(&self, target: &RenderBufferHeadless) -> RenderBuffer {
        RenderBuffer::Headless(target.clone())
    }

    fn adopt(&self, buffer: &RenderBuffer) -> Option<RenderBufferHeadless> {
        buffer.as_headless().cloned()
    }

    fn fill_target(
        &mut self,
        _instance: &mut HeadlessInstance,
        target: &RenderBufferHeadless,
        rgba: [f32; 4],
    ) -> Result<()> {
        target.fill(rgba);
        self.probe.record(PlatformCall::FillTarget { id: target.id, rgba });
        Ok(())
    }

    fn begin_present(&mut self, _instance: &mut HeadlessInstance, surface: &mut HeadlessSurface) -> Result<()> {
        if surface.acquired {
            return Err(GraphicsError::SwapchainError("image already acquired".to_string()).into());
        }
        surface.acquired = true;
        self.probe.record(PlatformCall::BeginPresent { display: surface.display });
        Ok(())
    }

    fn finish_present(
        &mut self,
        _instance: &mut HeadlessInstance,
        surface: &mut HeadlessSurface,
        sources: &[PresentSource<'_, RenderBufferHeadless>],
    ) -> Result<()> {
        if !surface.acquired {
            return Err(GraphicsError::SwapchainError("no acquired image".to_string()).into());
        }
        surface.acquired = false;
        self.probe.record(PlatformCall::FinishPresent {
            display: surface.display,
            sources: sources
                .iter()
                .map(|s| (s.eye, s.target.id, s.region))
                .collect(),
        });
        Ok(())
    }

    fn pump_events(&mut self) -> Vec<HostEvent> {
        let events = self.probe.drain_events();
        self.probe.record(PlatformCall::PumpEvents { drained: events.len() });
        events
    }

    fn destroy_surface(&mut self, surface: HeadlessSurface) {
        self.probe.record(PlatformCall::DestroySurface { id: surface.id });
    }

    fn destroy_window(&mut self, window: HeadlessWindow) {
        self.probe.record(PlatformCall::DestroyWindow { id: window.id });
    }

    fn destroy_target(&mut self, target: RenderBufferHeadless) {
        self.probe.record(PlatformCall::DestroyTarget { id: target.id });
    }

    fn destroy_instance(&mut self, instance: HeadlessInstance) {
        self.probe.record(PlatformCall::DestroyInstance { id: instance.id });
    }
}

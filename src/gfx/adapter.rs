//! 呈现适配器
//!
//! 把某个 [`Platform`]（Vulkan + winit，或 headless）包装成对外的 [`RenderBackend`]。
//!
//! # 状态
//!
//! - 可变状态（窗口、表面、渲染目标、回调）都在一把互斥锁后面，
//!   每个对外操作在整个执行期间持有这把锁。
//! - `doing_okay` / `display_open` 是原子标志；时序快照在打开显示时发布一次，
//!   之后只读。时序查询因此完全不加锁，可以在任意线程与帧循环并发调用。
//!
//! # 失败
//!
//! 初始化类失败（实例、窗口、表面、渲染目标）会让 `doing_okay` 永久变为 `false`；
//! 前置条件失败只记录日志并返回 `false`，不改变状态。

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, OnceLock};
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::core::config::ConstructorParameters;
use crate::core::error::{HmdRenderError, PreconditionError, Result};
use crate::core::event::HostEvent;
use crate::core::math::{Pose, Projection, RgbColor, Viewport};
use crate::core::runtime::{self, WindowingGuard, WindowingRuntime};
use crate::gfx::backend::{OpenResults, RenderBackend, RenderCallbackArgs, RenderCallbackInfo};
use crate::gfx::library::{GraphicsLibrary, RenderBuffer};
use crate::gfx::platform::{Platform, PresentSource};
use crate::renderer::resource::RenderTargetDescriptor;
use crate::renderer::sync::{interval_from_hz, RenderTimingInfo, VsyncClock};
use crate::renderer::topology::{DisplayTopology, WindowDescriptor};
use crate::{backend_error, backend_info, backend_warn};

/// 无法得知显示器刷新率时使用的刷新率
pub const DEFAULT_REFRESH_RATE_HZ: f64 = 60.0;

/// 打开显示后发布的只读时序数据
#[derive(Debug)]
struct TimingSnapshot {
    intervals: Vec<Duration>,
    clock: VsyncClock,
}

/// 每个显示的记录；句柄只有在创建成功后才是 `Some`
#[derive(Debug)]
struct DisplayInfo<W, S> {
    descriptor: WindowDescriptor,
    window: Option<W>,
    surface: Option<S>,
    drawable: [u32; 2],
    refresh_interval: Duration,
    presenting: bool,
}

impl<W, S> DisplayInfo<W, S> {
    fn new(descriptor: WindowDescriptor) -> Self {
        let drawable = [descriptor.width, descriptor.height];
        Self {
            descriptor,
            window: None,
            surface: None,
            drawable,
            refresh_interval: Duration::ZERO,
            presenting: false,
        }
    }
}

/// 已打开显示的概要
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplaySummary {
    pub descriptor: WindowDescriptor,
    pub drawable: [u32; 2],
    pub refresh_interval: Duration,
    pub has_window: bool,
    pub has_surface: bool,
}

struct AdapterState<P: Platform> {
    platform: P,
    instance: Option<P::Instance>,
    displays: Vec<DisplayInfo<P::Window, P::Surface>>,
    /// 自有的每眼渲染目标
    render_buffers: Vec<P::Target>,
    /// 本次 present_render_buffers 借入的应用缓冲
    staged: Vec<P::Target>,
    /// 按空间编号索引的回调
    callbacks: BTreeMap<usize, RenderCallbackInfo>,
    library: Option<GraphicsLibrary>,
    windowing: Option<WindowingGuard>,
}

impl<P: Platform> AdapterState<P> {
    /// 释放全部资源：表面 → 窗口 → 渲染目标 → 实例 → 窗口子系统
    fn teardown(&mut self) {
        let AdapterState {
            platform,
            instance,
            displays,
            render_buffers,
            staged,
            callbacks,
            library,
            windowing,
        } = self;

        callbacks.clear();
        staged.clear();
        library.take();

        for display in displays.iter_mut() {
            if let Some(surface) = display.surface.take() {
                platform.destroy_surface(surface);
            }
        }
        for display in displays.iter_mut() {
            if let Some(window) = display.window.take() {
                platform.destroy_window(window);
            }
        }
        displays.clear();

        for target in render_buffers.drain(..) {
            platform.destroy_target(target);
        }
        if let Some(instance) = instance.take() {
            platform.destroy_instance(instance);
        }
        windowing.take();
    }
}

/// 呈现状态机
pub struct PresentAdapter<P: Platform> {
    name: &'static str,
    params: ConstructorParameters,
    topology: DisplayTopology,
    runtime: &'static WindowingRuntime,
    doing_okay: AtomicBool,
    display_open: AtomicBool,
    timing: OnceLock<TimingSnapshot>,
    state: Mutex<AdapterState<P>>,
}

impl<P: Platform> PresentAdapter<P> {
    /// 创建适配器并立即创建 GPU 实例
    ///
    /// 不会 panic：参数无效或实例创建失败时适配器处于 "not okay" 状态。
    pub fn new(platform: P, params: ConstructorParameters) -> Self {
        Self::with_runtime(platform, params, runtime::windowing())
    }

    /// 使用指定的窗口子系统
    pub fn with_runtime(mut platform: P, params: ConstructorParameters, runtime: &'static WindowingRuntime) -> Self {
        let name = platform.name();
        let topology = match DisplayTopology::from_params(&params) {
            Ok(topology) => Some(topology),
            Err(e) => {
                backend_error!(backend = name, error = %e, "Invalid display parameters");
                None
            }
        };

        let instance = match topology {
            Some(_) => match platform.create_instance(&params) {
                Ok(instance) => {
                    info!(backend = name, "GPU instance created");
                    Some(instance)
                }
                Err(e) => {
                    backend_error!(backend = name, error = %e, "Could not create GPU instance");
                    None
                }
            },
            None => None,
        };

        let doing_okay = instance.is_some();
        let topology = topology.unwrap_or_else(|| DisplayTopology::empty(&params));

        Self {
            name,
            params,
            topology,
            runtime,
            doing_okay: AtomicBool::new(doing_okay),
            display_open: AtomicBool::new(false),
            timing: OnceLock::new(),
            state: Mutex::new(AdapterState {
                platform,
                instance,
                displays: Vec::new(),
                render_buffers: Vec::new(),
                staged: Vec::new(),
                callbacks: BTreeMap::new(),
                library: None,
                windowing: None,
            }),
        }
    }

    pub fn params(&self) -> &ConstructorParameters {
        &self.params
    }

    pub fn topology(&self) -> &DisplayTopology {
        &self.topology
    }

    pub fn is_display_open(&self) -> bool {
        self.display_open.load(Ordering::Acquire)
    }

    /// 已记录的显示（包括打开失败时部分创建的）
    pub fn display_summaries(&self) -> Vec<DisplaySummary> {
        self.lock()
            .displays
            .iter()
            .map(|d| DisplaySummary {
                descriptor: d.descriptor.clone(),
                drawable: d.drawable,
                refresh_interval: d.refresh_interval,
                has_window: d.window.is_some(),
                has_surface: d.surface.is_some(),
            })
            .collect()
    }

    /// 时序查询
    ///
    /// 检查顺序：适配器状态 → 眼睛编号 → 显示是否打开。
    pub fn timing_info(&self, eye: usize) -> Result<RenderTimingInfo> {
        if !self.doing_okay() {
            return Err(PreconditionError::NotOkay.into());
        }
        self.topology.check_eye(eye)?;
        if !self.is_display_open() {
            return Err(PreconditionError::DisplayNotOpen.into());
        }
        let snapshot = self.timing.get().ok_or(PreconditionError::DisplayNotOpen)?;
        let display = self
            .topology
            .display_used_by_eye(eye)
            .ok_or(PreconditionError::NoSuchEye { eye, num_eyes: self.topology.num_eyes() })?;
        let interval = snapshot.intervals.get(display).copied().unwrap_or_default();
        Ok(snapshot.clock.timing(display, interval, Instant::now()))
    }

    fn lock(&self) -> MutexGuard<'_, AdapterState<P>> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn mark_not_okay(&self) {
        self.doing_okay.store(false, Ordering::Release);
    }

    fn check_ready(&self) -> Result<()> {
        if !self.doing_okay() {
            return Err(PreconditionError::NotOkay.into());
        }
        if !self.is_display_open() {
            return Err(PreconditionError::DisplayNotOpen.into());
        }
        Ok(())
    }

    fn check_render_path(&self, state: &AdapterState<P>) -> Result<()> {
        if state.render_buffers.len() != self.topology.num_eyes() {
            return Err(PreconditionError::RenderPathNotReady.into());
        }
        Ok(())
    }

    /// 在布尔边界上报告结果
    fn report(&self, operation: &str, result: Result<()>) -> bool {
        match result {
            Ok(()) => true,
            Err(e) => {
                backend_error!(backend = self.name, operation, error = %e, "Operation failed");
                false
            }
        }
    }

    /// 在 `deadline` 之前提交绘制
    fn deadline_for(&self, eye: usize) -> Instant {
        let remaining = self
            .timing_info(eye)
            .map(|t| t.time_until_next_present_required)
            .unwrap_or_default();
        Instant::now() + remaining
    }

    fn open_display_locked(&self, state: &mut AdapterState<P>) -> Result<GraphicsLibrary> {
        if self.is_display_open() {
            backend_warn!(backend = self.name, "OpenDisplay called on an already open display");
            return state
                .library
                .clone()
                .ok_or_else(|| HmdRenderError::Runtime("open display has no graphics library".to_string()));
        }

        let AdapterState {
            platform,
            instance,
            displays,
            library,
            windowing,
            ..
        } = state;

        let instance = instance
            .as_mut()
            .ok_or_else(|| HmdRenderError::Initialization("no GPU instance, cannot open display".to_string()))?;
        if !self.doing_okay() {
            return Err(PreconditionError::NotOkay.into());
        }

        if windowing.is_none() {
            *windowing = Some(self.runtime.acquire());
        }
        platform.init_windowing()?;

        for index in 0..self.topology.num_displays() {
            let descriptor = self.topology.window_descriptor(index, &self.params);
            debug!(
                display = index,
                title = %descriptor.title,
                x = descriptor.x,
                y = descriptor.y,
                width = descriptor.width,
                height = descriptor.height,
                "Creating window"
            );
            displays.push(DisplayInfo::new(descriptor));
            let window = platform.create_window(&displays[index].descriptor)?;
            displays[index].window = Some(window);
        }

        for (index, info) in displays.iter_mut().enumerate() {
            let Some(window) = info.window.as_ref() else {
                continue;
            };
            let surface = platform.create_surface(instance, window, index)?;
            info.surface = Some(surface);
            info.drawable = platform.drawable_size(window);
            info.refresh_interval = match self.params.refresh_rate_hz {
                Some(hz) => interval_from_hz(hz),
                None => platform
                    .refresh_interval(window)
                    .unwrap_or_else(|| interval_from_hz(DEFAULT_REFRESH_RATE_HZ)),
            };
            debug!(
                display = index,
                drawable_width = info.drawable[0],
                drawable_height = info.drawable[1],
                refresh_interval = ?info.refresh_interval,
                "Display surface ready"
            );
        }

        let opened = platform.library(instance)?;
        *library = Some(opened.clone());

        let snapshot = TimingSnapshot {
            intervals: displays.iter().map(|d| d.refresh_interval).collect(),
            clock: VsyncClock::new(displays.len()),
        };
        if self.timing.set(snapshot).is_err() {
            backend_warn!(backend = self.name, "Timing snapshot was already published");
        }
        self.display_open.store(true, Ordering::Release);

        backend_info!(
            backend = self.name,
            displays = self.topology.num_displays(),
            eyes = self.topology.num_eyes(),
            "Display opened"
        );
        Ok(opened)
    }

    fn render_path_setup_locked(&self, state: &mut AdapterState<P>) -> Result<()> {
        self.check_ready()?;
        if !state.render_buffers.is_empty() {
            return Err(PreconditionError::RenderPathAlreadySetUp.into());
        }

        let AdapterState {
            platform,
            instance,
            render_buffers,
            ..
        } = state;
        let instance = instance.as_mut().ok_or(PreconditionError::NotOkay)?;

        for eye in 0..self.topology.num_eyes() {
            let viewport = self
                .topology
                .eye_viewport(eye)
                .ok_or(PreconditionError::NoSuchEye { eye, num_eyes: self.topology.num_eyes() })?;
            let descriptor = RenderTargetDescriptor::for_eye(eye, &viewport).with_name(format!("eye{}", eye));
            let target = platform.create_render_target(instance, &descriptor)?;
            debug!(eye, width = descriptor.extent[0], height = descriptor.extent[1], "Render target created");
            render_buffers.push(target);
        }

        backend_info!(backend = self.name, eyes = render_buffers.len(), "Render path set up");
        Ok(())
    }

    fn register_render_callback_locked(&self, state: &mut AdapterState<P>, info: RenderCallbackInfo) -> Result<()> {
        if !self.doing_okay() {
            return Err(PreconditionError::NotOkay.into());
        }
        let space = info.space;
        if state.callbacks.insert(space, info).is_some() {
            debug!(space, "Render callback replaced");
        } else {
            debug!(space, "Render callback registered");
        }
        Ok(())
    }

    fn render_space_locked(
        &self,
        state: &mut AdapterState<P>,
        space: usize,
        eye: usize,
        pose: &Pose,
        viewport: &Viewport,
        projection: &Projection,
    ) -> Result<()> {
        self.topology.check_eye(eye)?;
        self.check_ready()?;
        self.check_render_path(state)?;
        let deadline = self.deadline_for(eye);

        let AdapterState {
            platform,
            callbacks,
            render_buffers,
            library,
            ..
        } = state;

        let RenderCallbackInfo { callback, user_data, .. } = callbacks
            .get_mut(&space)
            .ok_or(PreconditionError::NoCallbackForSpace(space))?;
        let library = library.as_ref().ok_or(PreconditionError::DisplayNotOpen)?;
        let buffer = platform.lend(&render_buffers[eye]);

        let args = RenderCallbackArgs {
            library,
            buffer: &buffer,
            eye,
            viewport: *viewport,
            pose,
            projection,
            deadline,
            user_data: user_data.as_deref(),
        };
        callback(&args);
        Ok(())
    }

    fn present_display_initialize_locked(&self, state: &mut AdapterState<P>, display: usize) -> Result<()> {
        self.topology.check_display(display)?;
        self.check_ready()?;

        let AdapterState {
            platform,
            instance,
            displays,
            ..
        } = state;
        let info = displays.get_mut(display).ok_or(PreconditionError::DisplayNotOpen)?;
        if info.presenting {
            return Err(PreconditionError::PresentAlreadyStarted(display).into());
        }
        let (Some(instance), Some(surface)) = (instance.as_mut(), info.surface.as_mut()) else {
            return Err(PreconditionError::DisplayNotOpen.into());
        };

        platform.begin_present(instance, surface)?;
        info.presenting = true;
        Ok(())
    }

    fn present_display_finalize_locked(&self, state: &mut AdapterState<P>, display: usize) -> Result<()> {
        self.topology.check_display(display)?;
        self.check_ready()?;

        let AdapterState {
            platform,
            instance,
            displays,
            render_buffers,
            staged,
            ..
        } = state;
        let info = displays.get_mut(display).ok_or(PreconditionError::DisplayNotOpen)?;
        if !info.presenting {
            return Err(PreconditionError::PresentNotStarted(display).into());
        }
        info.presenting = false;

        let drawable = info.drawable;
        let targets: &[P::Target] = if staged.is_empty() {
            &render_buffers[..]
        } else {
            &staged[..]
        };
        let sources: Vec<PresentSource<'_, P::Target>> = self
            .topology
            .eyes_on_display(display)
            .into_iter()
            .filter_map(|eye| {
                let target = targets.get(eye)?;
                let region = self.topology.present_region(eye, drawable)?;
                Some(PresentSource { eye, target, region })
            })
            .collect();

        let (Some(instance), Some(surface)) = (instance.as_mut(), info.surface.as_mut()) else {
            return Err(PreconditionError::DisplayNotOpen.into());
        };
        platform.finish_present(instance, surface, &sources)?;

        if let Some(snapshot) = self.timing.get() {
            snapshot.clock.stamp(display);
        }
        Ok(())
    }

    /// 排空事件队列；`Ok(false)` 表示收到了关闭/退出请求
    fn present_frame_finalize_locked(&self, state: &mut AdapterState<P>) -> Result<bool> {
        if !self.doing_okay() {
            return Err(PreconditionError::NotOkay.into());
        }

        let events = state.platform.pump_events();
        let mut keep_running = true;
        for event in events {
            match event {
                HostEvent::Resized {
                    display: Some(index),
                    width,
                    height,
                } => {
                    if let Some(info) = state.displays.get_mut(index) {
                        info.drawable = [width, height];
                        debug!(display = index, width, height, "Drawable resized");
                    }
                }
                event if event.is_termination() => {
                    backend_info!(backend = self.name, %event, "Termination requested by host");
                    keep_running = false;
                }
                _ => {}
            }
        }
        Ok(keep_running)
    }

    /// 依次呈现所有显示，然后结束这一帧
    fn present_all_locked(&self, state: &mut AdapterState<P>) -> Result<bool> {
        for display in 0..self.topology.num_displays() {
            self.present_display_initialize_locked(state, display)?;
            self.present_display_finalize_locked(state, display)?;
        }
        self.present_frame_finalize_locked(state)
    }

    fn present_render_buffers_locked(&self, state: &mut AdapterState<P>, buffers: &[RenderBuffer]) -> Result<bool> {
        self.check_ready()?;
        let expected = self.topology.num_eyes();
        if buffers.len() != expected {
            return Err(PreconditionError::BufferCountMismatch {
                expected,
                got: buffers.len(),
            }
            .into());
        }

        let adopted = buffers
            .iter()
            .enumerate()
            .map(|(eye, buffer)| {
                state
                    .platform
                    .adopt(buffer)
                    .ok_or_else(|| HmdRenderError::from(PreconditionError::IncompatibleBuffer(eye)))
            })
            .collect::<Result<Vec<_>>>()?;

        state.staged = adopted;
        let result = self.present_all_locked(state);
        // 借入的缓冲属于应用，只丢弃本地句柄
        state.staged.clear();
        result
    }

    fn solid_color_eye_locked(&self, state: &mut AdapterState<P>, eye: usize, color: &RgbColor) -> Result<()> {
        self.topology.check_eye(eye)?;
        self.check_ready()?;
        self.check_render_path(state)?;

        let AdapterState {
            platform,
            instance,
            render_buffers,
            ..
        } = state;
        let instance = instance.as_mut().ok_or(PreconditionError::NotOkay)?;
        platform.fill_target(instance, &render_buffers[eye], color.rgba())
    }
}

impl<P: Platform> RenderBackend for PresentAdapter<P> {
    fn backend_name(&self) -> &str {
        self.name
    }

    fn doing_okay(&self) -> bool {
        self.doing_okay.load(Ordering::Acquire)
    }

    fn num_eyes(&self) -> usize {
        self.topology.num_eyes()
    }

    fn num_displays(&self) -> usize {
        self.topology.num_displays()
    }

    fn display_used_by_eye(&self, eye: usize) -> Option<usize> {
        self.topology.display_used_by_eye(eye)
    }

    fn eye_viewport(&self, eye: usize) -> Option<Viewport> {
        self.topology.eye_viewport(eye)
    }

    fn open_display(&self) -> OpenResults {
        let mut state = self.lock();
        match self.open_display_locked(&mut state) {
            Ok(library) => OpenResults::complete(library),
            Err(e) => {
                backend_error!(backend = self.name, error = %e, "OpenDisplay failed");
                self.mark_not_okay();
                OpenResults::failure()
            }
        }
    }

    fn register_render_callback(&self, info: RenderCallbackInfo) -> bool {
        let mut state = self.lock();
        let result = self.register_render_callback_locked(&mut state, info);
        self.report("RegisterRenderCallback", result)
    }

    fn render_path_setup(&self) -> bool {
        let mut state = self.lock();
        match self.render_path_setup_locked(&mut state) {
            Ok(()) => true,
            Err(e) => {
                backend_error!(backend = self.name, error = %e, "RenderPathSetup failed");
                if !e.is_precondition() {
                    self.mark_not_okay();
                }
                false
            }
        }
    }

    fn render_frame_initialize(&self) -> bool {
        let state = self.lock();
        let result = self.check_ready().and_then(|_| self.check_render_path(&state));
        self.report("RenderFrameInitialize", result)
    }

    fn render_display_initialize(&self, display: usize) -> bool {
        let _state = self.lock();
        let result = self.topology.check_display(display).and_then(|_| self.check_ready());
        self.report("RenderDisplayInitialize", result)
    }

    fn render_eye_initialize(&self, eye: usize) -> bool {
        let state = self.lock();
        let result = self
            .topology
            .check_eye(eye)
            .and_then(|_| self.check_ready())
            .and_then(|_| self.check_render_path(&state));
        self.report("RenderEyeInitialize", result)
    }

    fn render_space(
        &self,
        space: usize,
        eye: usize,
        pose: &Pose,
        viewport: &Viewport,
        projection: &Projection,
    ) -> bool {
        let mut state = self.lock();
        let result = self.render_space_locked(&mut state, space, eye, pose, viewport, projection);
        self.report("RenderSpace", result)
    }

    fn render_eye_finalize(&self, eye: usize) -> bool {
        let state = self.lock();
        let result = self
            .topology
            .check_eye(eye)
            .and_then(|_| self.check_ready())
            .and_then(|_| self.check_render_path(&state));
        self.report("RenderEyeFinalize", result)
    }

    fn render_display_finalize(&self, display: usize) -> bool {
        let _state = self.lock();
        let result = self.topology.check_display(display).and_then(|_| self.check_ready());
        self.report("RenderDisplayFinalize", result)
    }

    fn render_frame_finalize(&self) -> bool {
        let mut state = self.lock();
        let result = self
            .check_render_path(&state)
            .and_then(|_| self.present_all_locked(&mut state));
        match result {
            Ok(keep_running) => keep_running,
            Err(e) => {
                backend_error!(backend = self.name, error = %e, "RenderFrameFinalize failed");
                false
            }
        }
    }

    fn present_render_buffers(&self, buffers: &[RenderBuffer]) -> bool {
        let mut state = self.lock();
        match self.present_render_buffers_locked(&mut state, buffers) {
            Ok(keep_running) => keep_running,
            Err(e) => {
                backend_error!(backend = self.name, error = %e, "PresentRenderBuffers failed");
                false
            }
        }
    }

    fn present_display_initialize(&self, display: usize) -> bool {
        let mut state = self.lock();
        let result = self.present_display_initialize_locked(&mut state, display);
        self.report("PresentDisplayInitialize", result)
    }

    fn present_display_finalize(&self, display: usize) -> bool {
        let mut state = self.lock();
        let result = self.present_display_finalize_locked(&mut state, display);
        self.report("PresentDisplayFinalize", result)
    }

    fn present_frame_finalize(&self) -> bool {
        let mut state = self.lock();
        match self.present_frame_finalize_locked(&mut state) {
            Ok(keep_running) => keep_running,
            Err(e) => {
                backend_error!(backend = self.name, error = %e, "PresentFrameFinalize failed");
                false
            }
        }
    }

    fn solid_color_eye(&self, eye: usize, color: &RgbColor) -> bool {
        let mut state = self.lock();
        let result = self.solid_color_eye_locked(&mut state, eye, color);
        self.report("SolidColorEye", result)
    }

    fn get_timing_info(&self, eye: usize, info: &mut RenderTimingInfo) -> bool {
        match self.timing_info(eye) {
            Ok(timing) => {
                *info = timing;
                true
            }
            Err(e) => {
                if matches!(e, HmdRenderError::Precondition(PreconditionError::DisplayNotOpen)) {
                    *info = RenderTimingInfo::default();
                }
                backend_error!(backend = self.name, error = %e, "GetTimingInfo failed");
                false
            }
        }
    }
}

impl<P: Platform> Drop for PresentAdapter<P> {
    fn drop(&mut self) {
        self.display_open.store(false, Ordering::Release);
        let state = self.state.get_mut().unwrap_or_else(|e| e.into_inner());
        state.teardown();
        debug!(backend = self.name, "Present adapter torn down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::{DisplayMode, DisplayRotation};
    use crate::gfx::headless::{HeadlessPlatform, HeadlessProbe, HeadlessSettings, PlatformCall};
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    fn leaked_runtime() -> &'static WindowingRuntime {
        Box::leak(Box::new(WindowingRuntime::new()))
    }

    fn side_by_side() -> ConstructorParameters {
        ConstructorParameters {
            window_title: "HMD".to_string(),
            window_x: 0,
            window_y: 0,
            display_width: 1920,
            display_height: 1080,
            num_eyes: 2,
            num_displays: 1,
            display_mode: DisplayMode::HorizontalSideBySide,
            refresh_rate_hz: None,
            ..ConstructorParameters::default()
        }
    }

    fn two_displays() -> ConstructorParameters {
        ConstructorParameters {
            num_displays: 2,
            display_mode: DisplayMode::FullScreen,
            ..side_by_side()
        }
    }

    fn adapter_with(
        settings: HeadlessSettings,
        params: ConstructorParameters,
    ) -> (PresentAdapter<HeadlessPlatform>, HeadlessProbe) {
        let (platform, probe) = HeadlessPlatform::with_probe(settings);
        (PresentAdapter::with_runtime(platform, params, leaked_runtime()), probe)
    }

    fn opened(params: ConstructorParameters) -> (PresentAdapter<HeadlessPlatform>, HeadlessProbe) {
        let (adapter, probe) = adapter_with(HeadlessSettings::default(), params);
        assert!(adapter.open_display().is_complete());
        (adapter, probe)
    }

    fn ready(params: ConstructorParameters) -> (PresentAdapter<HeadlessPlatform>, HeadlessProbe) {
        let (adapter, probe) = opened(params);
        assert!(adapter.render_path_setup());
        (adapter, probe)
    }

    fn is_window(call: &PlatformCall) -> bool {
        matches!(call, PlatformCall::CreateWindow { .. })
    }

    #[test]
    fn test_instance_failure_is_not_okay_and_opens_nothing() {
        let settings = HeadlessSettings { fail_instance: true, ..Default::default() };
        let (adapter, probe) = adapter_with(settings, side_by_side());
        assert!(!adapter.doing_okay());

        let results = adapter.open_display();
        assert!(!results.is_complete());
        assert!(results.library.is_none());
        assert_eq!(probe.count(is_window), 0);
        assert!(adapter.display_summaries().is_empty());
    }

    #[test]
    fn test_invalid_parameters_are_not_okay() {
        let mut params = side_by_side();
        params.num_displays = 3;
        let (adapter, probe) = adapter_with(HeadlessSettings::default(), params);
        assert!(!adapter.doing_okay());
        assert_eq!(adapter.num_eyes(), 0);
        assert!(probe.calls().is_empty());
    }

    #[test]
    fn test_open_display_side_by_side() {
        let (adapter, probe) = opened(side_by_side());
        assert!(adapter.doing_okay());
        assert!(adapter.is_display_open());

        let windows = probe.windows();
        assert_eq!(windows.len(), 1);
        assert_eq!(windows[0].title, "HMD0");
        assert_eq!([windows[0].width, windows[0].height], [1920, 1080]);

        let summaries = adapter.display_summaries();
        assert_eq!(summaries.len(), 1);
        assert!(summaries[0].has_window && summaries[0].has_surface);
        assert_eq!(summaries[0].refresh_interval, interval_from_hz(90.0));
    }

    #[test]
    fn test_single_display_uses_configured_geometry() {
        let mut params = side_by_side();
        params.window_x = 320;
        params.window_y = 40;
        let (adapter, probe) = opened(params);

        let summaries = adapter.display_summaries();
        assert_eq!(summaries.len(), 1);
        let window = &summaries[0].descriptor;
        assert_eq!((window.x, window.y), (320, 40));
        assert_eq!([window.width, window.height], [1920, 1080]);
        assert_eq!(probe.windows()[0], *window);
    }

    #[test]
    fn test_open_display_returns_library() {
        let (adapter, _probe) = adapter_with(HeadlessSettings::default(), side_by_side());
        let results = adapter.open_display();
        let library = results.library.expect("library");
        assert_eq!(library.backend_name(), "Headless");
        assert!(library.as_headless().is_some());
    }

    #[test]
    fn test_reopen_is_complete_without_new_windows() {
        let (adapter, probe) = opened(side_by_side());
        let again = adapter.open_display();
        assert!(again.is_complete());
        assert!(again.library.is_some());
        assert_eq!(probe.count(is_window), 1);
    }

    #[test]
    fn test_rotated_windows_tile_across_displays() {
        let mut params = two_displays();
        params.window_x = 200;
        params.rotation = DisplayRotation::Ninety;
        let (_adapter, probe) = opened(params);

        let windows = probe.windows();
        assert_eq!(windows.len(), 2);
        assert_eq!([windows[0].width, windows[0].height], [1080, 1920]);
        assert_eq!(windows[0].x, 200);
        assert_eq!(windows[1].x, 200 + 1080);
        assert_eq!(windows[1].title, "HMD1");
    }

    #[test]
    fn test_window_failure_tears_down_created_handles_only() {
        let settings = HeadlessSettings { fail_window_on: Some(1), ..Default::default() };
        let (adapter, probe) = adapter_with(settings, two_displays());

        assert!(!adapter.open_display().is_complete());
        assert!(!adapter.doing_okay());
        let summaries = adapter.display_summaries();
        assert_eq!(summaries.len(), 2);
        assert!(summaries[0].has_window);
        assert!(!summaries[1].has_window);

        drop(adapter);
        assert_eq!(probe.count(|c| matches!(c, PlatformCall::DestroyWindow { .. })), 1);
        assert_eq!(probe.count(|c| matches!(c, PlatformCall::DestroySurface { .. })), 0);
        assert_eq!(probe.count(|c| matches!(c, PlatformCall::DestroyInstance { .. })), 1);
    }

    #[test]
    fn test_surface_failure_marks_not_okay() {
        let settings = HeadlessSettings { fail_surface_on: Some(1), ..Default::default() };
        let (adapter, probe) = adapter_with(settings, two_displays());

        assert!(!adapter.open_display().is_complete());
        assert!(!adapter.doing_okay());
        assert!(!adapter.render_path_setup());

        drop(adapter);
        assert_eq!(probe.count(|c| matches!(c, PlatformCall::DestroySurface { .. })), 1);
        assert_eq!(probe.count(|c| matches!(c, PlatformCall::DestroyWindow { .. })), 2);
    }

    #[test]
    fn test_teardown_order() {
        let (adapter, probe) = ready(two_displays());
        drop(adapter);

        let last_surface = probe
            .calls()
            .iter()
            .rposition(|c| matches!(c, PlatformCall::DestroySurface { .. }))
            .expect("surface destroyed");
        let first_window = probe.position(|c| matches!(c, PlatformCall::DestroyWindow { .. })).expect("window");
        let first_target = probe.position(|c| matches!(c, PlatformCall::DestroyTarget { .. })).expect("target");
        let instance = probe.position(|c| matches!(c, PlatformCall::DestroyInstance { .. })).expect("instance");

        assert!(last_surface < first_window);
        assert!(first_window < first_target);
        assert!(first_target < instance);
        assert_eq!(probe.count(|c| matches!(c, PlatformCall::DestroyTarget { .. })), 2);
    }

    #[test]
    fn test_windowing_runtime_is_shared_and_released() {
        let runtime = leaked_runtime();
        let first = PresentAdapter::with_runtime(HeadlessPlatform::default(), side_by_side(), runtime);
        let second = PresentAdapter::with_runtime(HeadlessPlatform::default(), side_by_side(), runtime);
        assert!(first.open_display().is_complete());
        assert!(second.open_display().is_complete());
        assert_eq!(runtime.active_users(), 2);
        assert_eq!(runtime.initialization_count(), 1);

        drop(first);
        assert!(runtime.is_initialized());
        drop(second);
        assert!(!runtime.is_initialized());
    }

    #[test]
    fn test_reopen_after_drop_on_another_thread() {
        let runtime = leaked_runtime();
        let adapter = PresentAdapter::with_runtime(HeadlessPlatform::default(), side_by_side(), runtime);
        assert!(adapter.open_display().is_complete());
        drop(adapter);

        let reopened = std::thread::spawn(move || {
            let adapter = PresentAdapter::with_runtime(HeadlessPlatform::default(), side_by_side(), runtime);
            adapter.open_display().is_complete() && adapter.render_path_setup()
        })
        .join()
        .unwrap();
        assert!(reopened);
        assert_eq!(runtime.initialization_count(), 2);
        assert!(!runtime.is_initialized());
    }

    #[test]
    fn test_present_display_out_of_range_has_no_side_effects() {
        let (adapter, probe) = ready(side_by_side());
        probe.clear_calls();

        assert!(!adapter.present_display_initialize(1));
        assert!(!adapter.present_display_finalize(5));
        assert!(probe.calls().is_empty());
    }

    #[test]
    fn test_present_sequence_preconditions() {
        let (adapter, probe) = ready(side_by_side());

        assert!(!adapter.present_display_finalize(0));
        assert!(adapter.present_display_initialize(0));
        assert!(!adapter.present_display_initialize(0));
        assert!(adapter.present_display_finalize(0));
        assert!(!adapter.present_display_finalize(0));

        assert_eq!(probe.count(|c| matches!(c, PlatformCall::BeginPresent { .. })), 1);
        assert_eq!(probe.count(|c| matches!(c, PlatformCall::FinishPresent { .. })), 1);
    }

    #[test]
    fn test_present_composites_eyes_into_regions() {
        let settings = HeadlessSettings { drawable_scale: 2, ..Default::default() };
        let (adapter, probe) = adapter_with(settings, side_by_side());
        assert!(adapter.open_display().is_complete());
        assert!(adapter.render_path_setup());

        assert!(adapter.present_display_initialize(0));
        assert!(adapter.present_display_finalize(0));

        let sources = probe
            .calls()
            .into_iter()
            .find_map(|c| match c {
                PlatformCall::FinishPresent { sources, .. } => Some(sources),
                _ => None,
            })
            .expect("present");
        assert_eq!(sources.len(), 2);
        assert_eq!(sources[0].2, Viewport::new(0, 0, 1920, 2160));
        assert_eq!(sources[1].2, Viewport::new(1920, 0, 1920, 2160));
    }

    #[test]
    fn test_present_before_open_fails() {
        let (adapter, probe) = adapter_with(HeadlessSettings::default(), side_by_side());
        assert!(!adapter.present_display_initialize(0));
        assert!(!adapter.render_path_setup());
        assert_eq!(probe.count(|c| matches!(c, PlatformCall::BeginPresent { .. })), 0);
    }

    #[test]
    fn test_frame_finalize_stops_on_close() {
        let (adapter, probe) = ready(side_by_side());
        assert!(adapter.present_frame_finalize());

        probe.push_event(HostEvent::Other);
        assert!(adapter.present_frame_finalize());

        probe.push_event(HostEvent::CloseRequested { display: Some(0) });
        assert!(!adapter.present_frame_finalize());
        assert_eq!(probe.pending_events(), 0);
        // 队列已排空
        assert!(adapter.present_frame_finalize());

        probe.push_event(HostEvent::Quit);
        assert!(!adapter.render_frame_finalize());
    }

    #[test]
    fn test_resize_updates_present_region() {
        let (adapter, probe) = ready(side_by_side());
        probe.push_event(HostEvent::Resized { display: Some(0), width: 960, height: 540 });
        assert!(adapter.present_frame_finalize());
        assert_eq!(adapter.display_summaries()[0].drawable, [960, 540]);
    }

    #[test]
    fn test_render_path_setup_once() {
        let (adapter, probe) = opened(side_by_side());
        assert!(adapter.render_path_setup());
        assert!(!adapter.render_path_setup());
        assert!(adapter.doing_okay());

        let extents: Vec<_> = probe
            .calls()
            .into_iter()
            .filter_map(|c| match c {
                PlatformCall::CreateTarget { eye, extent, .. } => Some((eye, extent)),
                _ => None,
            })
            .collect();
        assert_eq!(extents, vec![(0, [960, 1080]), (1, [960, 1080])]);
    }

    #[test]
    fn test_render_target_failure_is_sticky() {
        let settings = HeadlessSettings { fail_render_target: true, ..Default::default() };
        let (adapter, _probe) = adapter_with(settings, side_by_side());
        assert!(adapter.open_display().is_complete());
        assert!(!adapter.render_path_setup());
        assert!(!adapter.doing_okay());
        assert!(!adapter.present_display_initialize(0));
    }

    #[test]
    fn test_render_space_invokes_callback() {
        let (adapter, _probe) = ready(side_by_side());
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();

        let info = RenderCallbackInfo::new(3, move |args| {
            assert_eq!(args.eye, 1);
            assert_eq!(args.buffer.extent(), [960, 1080]);
            assert!(args.deadline >= Instant::now() - Duration::from_millis(1));
            let tag = args.user_data.and_then(|d| d.downcast_ref::<&str>()).copied();
            assert_eq!(tag, Some("world"));
            seen.fetch_add(1, Ordering::SeqCst);
        })
        .with_user_data(Arc::new("world"));
        assert!(adapter.register_render_callback(info));

        let viewport = Viewport::new(0, 0, 960, 1080);
        let projection = Projection::symmetric(90.0, viewport.aspect(), 0.1, 100.0);
        assert!(adapter.render_space(3, 1, &Pose::identity(), &viewport, &projection));
        assert!(!adapter.render_space(0, 1, &Pose::identity(), &viewport, &projection));
        assert!(!adapter.render_space(3, 2, &Pose::identity(), &viewport, &projection));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_sparse_space_ids() {
        let (adapter, _probe) = ready(side_by_side());
        let hits = Arc::new(AtomicUsize::new(0));

        for space in [usize::MAX, 1 << 60, 0] {
            let counter = hits.clone();
            let info = RenderCallbackInfo::new(space, move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            });
            assert!(adapter.register_render_callback(info));
        }

        let viewport = Viewport::new(0, 0, 960, 1080);
        let projection = Projection::symmetric(90.0, viewport.aspect(), 0.1, 100.0);
        assert!(adapter.render_space(usize::MAX, 0, &Pose::identity(), &viewport, &projection));
        assert!(adapter.render_space(1 << 60, 1, &Pose::identity(), &viewport, &projection));
        assert!(!adapter.render_space((1 << 60) + 1, 1, &Pose::identity(), &viewport, &projection));
        assert_eq!(hits.load(Ordering::SeqCst), 2);
        assert!(adapter.doing_okay());
    }

    #[test]
    fn test_render_space_requires_render_path() {
        let (adapter, _probe) = opened(side_by_side());
        assert!(adapter.register_render_callback(RenderCallbackInfo::new(0, |_| {})));
        let viewport = Viewport::new(0, 0, 960, 1080);
        let projection = Projection::symmetric(90.0, viewport.aspect(), 0.1, 100.0);
        assert!(!adapter.render_space(0, 0, &Pose::identity(), &viewport, &projection));
        assert!(!adapter.render_frame_initialize());
        assert!(adapter.render_display_initialize(0));
        assert!(!adapter.render_display_initialize(1));
    }

    #[test]
    fn test_present_render_buffers() {
        let (adapter, probe) = opened(side_by_side());
        let buffers = vec![
            RenderBuffer::Headless(crate::gfx::headless::RenderBufferHeadless::new(100, 0, [960, 1080])),
            RenderBuffer::Headless(crate::gfx::headless::RenderBufferHeadless::new(101, 1, [960, 1080])),
        ];

        assert!(!adapter.present_render_buffers(&buffers[..1]));
        assert!(adapter.present_render_buffers(&buffers));

        let ids: Vec<u64> = probe
            .calls()
            .into_iter()
            .find_map(|c| match c {
                PlatformCall::FinishPresent { sources, .. } => Some(sources.iter().map(|s| s.1).collect()),
                _ => None,
            })
            .expect("present");
        assert_eq!(ids, vec![100, 101]);

        // 借入的缓冲不由适配器销毁
        drop(adapter);
        assert_eq!(probe.count(|c| matches!(c, PlatformCall::DestroyTarget { .. })), 0);
    }

    #[test]
    fn test_solid_color_eye() {
        let (adapter, probe) = ready(side_by_side());
        assert!(adapter.solid_color_eye(1, &RgbColor::green()));
        assert!(!adapter.solid_color_eye(2, &RgbColor::green()));

        let fills: Vec<[f32; 4]> = probe
            .calls()
            .into_iter()
            .filter_map(|c| match c {
                PlatformCall::FillTarget { rgba, .. } => Some(rgba),
                _ => None,
            })
            .collect();
        assert_eq!(fills, vec![[0.0, 1.0, 0.0, 1.0]]);
    }

    #[test]
    fn test_solid_color_requires_render_path() {
        let (adapter, _probe) = opened(side_by_side());
        assert!(!adapter.solid_color_eye(0, &RgbColor::red()));
    }

    #[test]
    fn test_timing_before_open_zeroes_info() {
        let (adapter, _probe) = adapter_with(HeadlessSettings::default(), side_by_side());
        let mut info = RenderTimingInfo {
            hardware_display_interval: Duration::from_secs(1),
            ..Default::default()
        };
        assert!(!adapter.get_timing_info(0, &mut info));
        assert_eq!(info, RenderTimingInfo::default());
    }

    #[test]
    fn test_timing_bad_eye_leaves_info_untouched() {
        let (adapter, _probe) = opened(side_by_side());
        let sentinel = RenderTimingInfo {
            hardware_display_interval: Duration::from_secs(7),
            ..Default::default()
        };
        let mut info = sentinel;
        assert!(!adapter.get_timing_info(2, &mut info));
        assert_eq!(info, sentinel);
    }

    #[test]
    fn test_timing_after_open() {
        let (adapter, _probe) = ready(side_by_side());
        let mut info = RenderTimingInfo::default();
        assert!(adapter.get_timing_info(1, &mut info));
        assert_eq!(info.hardware_display_interval, interval_from_hz(90.0));
        assert!(info.time_since_last_vertical_retrace < info.hardware_display_interval);
        assert!(info.time_until_next_present_required < info.hardware_display_interval);
    }

    #[test]
    fn test_refresh_rate_override_and_fallback() {
        let mut params = side_by_side();
        params.refresh_rate_hz = Some(120.0);
        let (adapter, _probe) = opened(params);
        assert_eq!(adapter.timing_info(0).unwrap().hardware_display_interval, interval_from_hz(120.0));

        let settings = HeadlessSettings { refresh_rate_hz: None, ..Default::default() };
        let (adapter, _probe) = adapter_with(settings, side_by_side());
        assert!(adapter.open_display().is_complete());
        assert_eq!(
            adapter.timing_info(0).unwrap().hardware_display_interval,
            interval_from_hz(DEFAULT_REFRESH_RATE_HZ)
        );
    }

    #[test]
    fn test_timing_query_does_not_take_the_lock() {
        let (adapter, _probe) = ready(side_by_side());
        let guard = adapter.lock();
        std::thread::scope(|scope| {
            let handle = scope.spawn(|| {
                let mut info = RenderTimingInfo::default();
                adapter.get_timing_info(0, &mut info)
            });
            assert!(handle.join().unwrap());
        });
        drop(guard);
    }

    #[test]
    fn test_full_callback_frame() {
        let (adapter, probe) = ready(two_displays());
        let counter = Arc::new(AtomicUsize::new(0));
        let seen = counter.clone();
        assert!(adapter.register_render_callback(RenderCallbackInfo::new(0, move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        })));

        assert!(adapter.render_frame_initialize());
        for display in 0..adapter.num_displays() {
            assert!(adapter.render_display_initialize(display));
            let eye = display;
            let viewport = adapter.eye_viewport(eye).unwrap();
            let projection = Projection::symmetric(90.0, viewport.aspect(), 0.1, 100.0);
            assert!(adapter.render_eye_initialize(eye));
            assert!(adapter.render_space(0, eye, &Pose::identity(), &viewport, &projection));
            assert!(adapter.render_eye_finalize(eye));
            assert!(adapter.render_display_finalize(display));
        }
        assert!(adapter.render_frame_finalize());

        assert_eq!(counter.load(Ordering::SeqCst), 2);
        assert_eq!(probe.count(|c| matches!(c, PlatformCall::FinishPresent { .. })), 2);
        assert!(adapter.timing_info(0).is_ok());
    }
}

//! Headless 平台
//!
//! 不触碰任何 GPU 或窗口系统的内存实现。所有调用都记录在日志中，
//! 通过 [`HeadlessProbe`] 可以注入宿主事件、读取调用记录，
//! 也可以用 [`HeadlessSettings`] 模拟实例/窗口/表面创建失败。

mod platform;

pub use platform::{HeadlessInstance, HeadlessPlatform, HeadlessSurface, HeadlessWindow};

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::core::event::HostEvent;
use crate::core::math::Viewport;
use crate::renderer::resource::{ColorFormat, DepthFormat};
use crate::renderer::topology::WindowDescriptor;

/// 模拟行为的开关
#[derive(Debug, Clone, PartialEq)]
pub struct HeadlessSettings {
    /// 实例创建失败
    pub fail_instance: bool,
    /// 第 n 个显示的窗口创建失败
    pub fail_window_on: Option<usize>,
    /// 第 n 个显示的表面创建失败
    pub fail_surface_on: Option<usize>,
    /// 渲染目标分配失败
    pub fail_render_target: bool,
    /// 模拟的显示器刷新率，`None` 表示未知
    pub refresh_rate_hz: Option<f64>,
    /// 宿主缩放倍数：可绘制尺寸 = 请求尺寸 × 倍数
    pub drawable_scale: u32,
}

impl Default for HeadlessSettings {
    fn default() -> Self {
        Self {
            fail_instance: false,
            fail_window_on: None,
            fail_surface_on: None,
            fail_render_target: false,
            refresh_rate_hz: Some(90.0),
            drawable_scale: 1,
        }
    }
}

/// 平台调用记录
#[derive(Debug, Clone, PartialEq)]
pub enum PlatformCall {
    CreateInstance { id: u64 },
    InitWindowing,
    CreateWindow { id: u64, display: usize },
    CreateSurface { id: u64, display: usize },
    CreateTarget { id: u64, eye: usize, extent: [u32; 2] },
    FillTarget { id: u64, rgba: [f32; 4] },
    BeginPresent { display: usize },
    /// 每个源：(眼睛, 目标 id, 呈现区域)
    FinishPresent { display: usize, sources: Vec<(usize, u64, Viewport)> },
    PumpEvents { drained: usize },
    DestroySurface { id: u64 },
    DestroyWindow { id: u64 },
    DestroyTarget { id: u64 },
    DestroyInstance { id: u64 },
}

#[derive(Debug, Default)]
struct Journal {
    calls: Vec<PlatformCall>,
    windows: Vec<WindowDescriptor>,
    pending_events: VecDeque<HostEvent>,
}

/// 观察和操纵 headless 平台的句柄，可在平台移交给适配器后继续使用
#[derive(Debug, Clone, Default)]
pub struct HeadlessProbe {
    journal: Arc<Mutex<Journal>>,
}

impl HeadlessProbe {
    fn journal(&self) -> MutexGuard<'_, Journal> {
        self.journal.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// 向宿主事件队列追加一个事件
    pub fn push_event(&self, event: HostEvent) {
        self.journal().pending_events.push_back(event);
    }

    pub fn pending_events(&self) -> usize {
        self.journal().pending_events.len()
    }

    /// 到目前为止的全部调用
    pub fn calls(&self) -> Vec<PlatformCall> {
        self.journal().calls.clone()
    }

    /// 成功创建的窗口参数
    pub fn windows(&self) -> Vec<WindowDescriptor> {
        self.journal().windows.clone()
    }

    pub fn count(&self, pred: impl Fn(&PlatformCall) -> bool) -> usize {
        self.journal().calls.iter().filter(|c| pred(c)).count()
    }

    pub fn position(&self, pred: impl Fn(&PlatformCall) -> bool) -> Option<usize> {
        self.journal().calls.iter().position(pred)
    }

    pub fn clear_calls(&self) {
        self.journal().calls.clear();
    }

    fn record(&self, call: PlatformCall) {
        self.journal().calls.push(call);
    }

    fn record_window(&self, descriptor: WindowDescriptor) {
        self.journal().windows.push(descriptor);
    }

    fn drain_events(&self) -> Vec<HostEvent> {
        self.journal().pending_events.drain(..).collect()
    }
}

/// Headless 的图形库句柄
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphicsLibraryHeadless {
    pub instance_id: u64,
}

/// Headless 渲染缓冲：颜色内容用一个共享的纯色表示
#[derive(Debug, Clone)]
pub struct RenderBufferHeadless {
    pub id: u64,
    pub eye: usize,
    pub extent: [u32; 2],
    pub color_format: ColorFormat,
    pub depth_format: DepthFormat,
    contents: Arc<Mutex<Option<[f32; 4]>>>,
}

impl RenderBufferHeadless {
    pub fn new(id: u64, eye: usize, extent: [u32; 2]) -> Self {
        Self {
            id,
            eye,
            extent,
            color_format: ColorFormat::Rgba8Unorm,
            depth_format: DepthFormat::D24UnormS8Uint,
            contents: Arc::new(Mutex::new(None)),
        }
    }

    /// "绘制"：把整个颜色缓冲设为一种颜色
    pub fn fill(&self, rgba: [f32; 4]) {
        *self.contents.lock().unwrap_or_else(|e| e.into_inner()) = Some(rgba);
    }

    /// 当前颜色内容，从未写入时为 `None`
    pub fn contents(&self) -> Option<[f32; 4]> {
        *self.contents.lock().unwrap_or_else(|e| e.into_inner())
    }
}

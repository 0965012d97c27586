//! 渲染后端的统一接口
//!
//! 上游渲染管理器通过 [`RenderBackend`] 驱动任意一个在运行时选中的后端，
//! 不需要知道具体使用的是哪个图形 API。
//!
//! 除 [`RenderBackend::open_display`] 外，所有操作都以 `true` 表示成功、
//! `false` 表示失败，失败细节只出现在日志中。

use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use crate::core::math::{Pose, Projection, RgbColor, Viewport};
use crate::gfx::library::{GraphicsLibrary, RenderBuffer};
use crate::renderer::sync::RenderTimingInfo;

/// 打开显示的结果状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenStatus {
    Complete,
    Failure,
}

/// 打开显示的结果
#[derive(Debug, Clone)]
pub struct OpenResults {
    pub status: OpenStatus,
    /// 成功时填入，供应用自己的管线初始化使用
    pub library: Option<GraphicsLibrary>,
}

impl OpenResults {
    pub fn complete(library: GraphicsLibrary) -> Self {
        Self {
            status: OpenStatus::Complete,
            library: Some(library),
        }
    }

    pub fn failure() -> Self {
        Self {
            status: OpenStatus::Failure,
            library: None,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.status == OpenStatus::Complete
    }
}

/// 渲染回调收到的参数
pub struct RenderCallbackArgs<'a> {
    pub library: &'a GraphicsLibrary,
    /// 这只眼睛的渲染缓冲（借用，不转移所有权）
    pub buffer: &'a RenderBuffer,
    pub eye: usize,
    pub viewport: Viewport,
    pub pose: &'a Pose,
    pub projection: &'a Projection,
    /// 绘制工作应当在此之前提交完毕
    pub deadline: Instant,
    pub user_data: Option<&'a (dyn Any + Send + Sync)>,
}

/// 渲染回调
///
/// 回调在适配器锁内同步执行，只需提交 GPU 工作，不必等待完成。
/// 回调中不能再调用需要加锁的后端方法；[`RenderBackend::get_timing_info`] 除外。
pub type RenderCallback = Box<dyn FnMut(&RenderCallbackArgs<'_>) + Send>;

/// "空间" 编号到回调与用户数据的关联
pub struct RenderCallbackInfo {
    pub space: usize,
    pub callback: RenderCallback,
    pub user_data: Option<Arc<dyn Any + Send + Sync>>,
}

impl RenderCallbackInfo {
    pub fn new<F>(space: usize, callback: F) -> Self
    where
        F: FnMut(&RenderCallbackArgs<'_>) + Send + 'static,
    {
        Self {
            space,
            callback: Box::new(callback),
            user_data: None,
        }
    }

    pub fn with_user_data(mut self, data: Arc<dyn Any + Send + Sync>) -> Self {
        self.user_data = Some(data);
        self
    }
}

impl fmt::Debug for RenderCallbackInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderCallbackInfo")
            .field("space", &self.space)
            .field("has_user_data", &self.user_data.is_some())
            .finish()
    }
}

/// 统一的渲染后端接口
///
/// # 调用顺序
///
/// ```text
/// open_display → render_path_setup
/// 每帧（回调模式）:
///   render_frame_initialize
///   for display: render_display_initialize
///     for eye: render_eye_initialize → render_space* → render_eye_finalize
///   render_display_finalize
///   render_frame_finalize          // 内部完成呈现
/// 每帧（预渲染模式）:
///   present_render_buffers
/// ```
///
/// 后端可以在线程之间共享，例如在另一个线程上查询时序。
pub trait RenderBackend: Send + Sync {
    /// 后端名称
    fn backend_name(&self) -> &str;

    /// 适配器是否仍处于正常状态；初始化失败后永久为 `false`
    fn doing_okay(&self) -> bool;

    fn num_eyes(&self) -> usize;
    fn num_displays(&self) -> usize;
    fn display_used_by_eye(&self, eye: usize) -> Option<usize>;
    fn eye_viewport(&self, eye: usize) -> Option<Viewport>;

    /// 打开所有显示的窗口和表面
    fn open_display(&self) -> OpenResults;

    /// 注册（或替换）某个空间的渲染回调
    fn register_render_callback(&self, info: RenderCallbackInfo) -> bool;

    /// 构建每只眼睛的渲染缓冲；每个会话只能调用一次
    fn render_path_setup(&self) -> bool;

    fn render_frame_initialize(&self) -> bool;
    fn render_display_initialize(&self, display: usize) -> bool;
    fn render_eye_initialize(&self, eye: usize) -> bool;

    /// 对一只眼睛调用某个空间的回调
    fn render_space(
        &self,
        space: usize,
        eye: usize,
        pose: &Pose,
        viewport: &Viewport,
        projection: &Projection,
    ) -> bool;

    fn render_eye_finalize(&self, eye: usize) -> bool;
    fn render_display_finalize(&self, display: usize) -> bool;

    /// 结束一帧：呈现自有缓冲并排空事件队列
    fn render_frame_finalize(&self) -> bool;

    /// 呈现应用提供的预渲染缓冲（每只眼睛一个）
    fn present_render_buffers(&self, buffers: &[RenderBuffer]) -> bool;

    fn present_display_initialize(&self, display: usize) -> bool;
    fn present_display_finalize(&self, display: usize) -> bool;

    /// 每帧一次：排空宿主事件；观察到关闭/退出时返回 `false`
    fn present_frame_finalize(&self) -> bool;

    /// 调试工具：用纯色填充一只眼睛的颜色缓冲
    fn solid_color_eye(&self, eye: usize, color: &RgbColor) -> bool;

    /// 时序查询，不加锁
    ///
    /// 只有 "显示未打开" 这一种失败会把 `info` 清零。
    fn get_timing_info(&self, eye: usize, info: &mut RenderTimingInfo) -> bool;
}

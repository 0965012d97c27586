//! 帧驱动
//!
//! 扮演上游渲染管理器的角色：按固定顺序调用 [`RenderBackend`] 的各阶段，
//! 为每只眼睛计算位姿和投影，再交给已注册的空间回调绘制。
//!
//! 与具体图形 API 无关的部分也在这里：
//! - `topology`：眼睛/显示拓扑与窗口布局
//! - `resource`：渲染目标描述
//! - `sync`：呈现时序

pub mod resource;
pub mod sync;
pub mod topology;

use tracing::trace;

use crate::core::config::ConstructorParameters;
use crate::core::math::{eye_pose, Pose, Projection, Viewport};
use crate::gfx::backend::RenderBackend;

/// 一帧的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// 已呈现，继续下一帧
    Presented,
    /// 后端报告失败或宿主请求退出
    Stopped,
}

/// 按帧驱动渲染后端
#[derive(Debug, Clone)]
pub struct FrameDriver {
    ipd_meters: f64,
    fov_y_degrees: f64,
    near_clip: f64,
    far_clip: f64,
}

impl FrameDriver {
    pub fn new(params: &ConstructorParameters) -> Self {
        Self {
            ipd_meters: params.ipd_meters,
            fov_y_degrees: params.fov_y_degrees,
            near_clip: params.near_clip,
            far_clip: params.far_clip,
        }
    }

    /// 与视口宽高比匹配的对称投影
    pub fn projection_for(&self, viewport: &Viewport) -> Projection {
        Projection::symmetric(self.fov_y_degrees, viewport.aspect(), self.near_clip, self.far_clip)
    }

    /// 回调模式：为每只眼睛调用 `spaces` 中的每个空间，然后呈现
    ///
    /// 回调收到的视口相对于该眼自己的渲染缓冲。
    pub fn render_frame(&self, backend: &dyn RenderBackend, head: &Pose, spaces: &[usize]) -> FrameOutcome {
        if !backend.render_frame_initialize() {
            return FrameOutcome::Stopped;
        }

        let num_eyes = backend.num_eyes();
        for index in 0..backend.num_displays() {
            if !backend.render_display_initialize(index) {
                return FrameOutcome::Stopped;
            }

            for eye in (0..num_eyes).filter(|&eye| backend.display_used_by_eye(eye) == Some(index)) {
                let Some(eye_viewport) = backend.eye_viewport(eye) else {
                    return FrameOutcome::Stopped;
                };
                let viewport = Viewport::new(0, 0, eye_viewport.width, eye_viewport.height);
                let pose = eye_pose(head, eye, num_eyes, self.ipd_meters);
                let projection = self.projection_for(&viewport);

                if !backend.render_eye_initialize(eye) {
                    return FrameOutcome::Stopped;
                }
                for &space in spaces {
                    if !backend.render_space(space, eye, &pose, &viewport, &projection) {
                        return FrameOutcome::Stopped;
                    }
                }
                if !backend.render_eye_finalize(eye) {
                    return FrameOutcome::Stopped;
                }
                trace!(display = index, eye, "Eye rendered");
            }

            if !backend.render_display_finalize(index) {
                return FrameOutcome::Stopped;
            }
        }

        if backend.render_frame_finalize() {
            FrameOutcome::Presented
        } else {
            FrameOutcome::Stopped
        }
    }

    /// 呈现后端自有的缓冲，不调用任何回调
    pub fn present_frame(&self, backend: &dyn RenderBackend) -> FrameOutcome {
        for display in 0..backend.num_displays() {
            if !backend.present_display_initialize(display) || !backend.present_display_finalize(display) {
                return FrameOutcome::Stopped;
            }
        }
        if backend.present_frame_finalize() {
            FrameOutcome::Presented
        } else {
            FrameOutcome::Stopped
        }
    }
}

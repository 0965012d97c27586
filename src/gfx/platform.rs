//! 图形 API + 窗口系统的接缝
//!
//! [`PresentAdapter`](crate::gfx::adapter::PresentAdapter) 的状态机只通过这个 trait
//! 触碰 GPU 和窗口系统。真实实现是 Vulkan + winit，测试使用内存中的 headless 实现。
//!
//! 所有 `create_*` 返回的句柄都由适配器以 `Option` 持有，
//! 只有创建成功的句柄才会被交回对应的 `destroy_*`。

use std::time::Duration;

use crate::core::config::ConstructorParameters;
use crate::core::error::Result;
use crate::core::event::HostEvent;
use crate::core::math::Viewport;
use crate::gfx::library::{GraphicsLibrary, RenderBuffer};
use crate::renderer::resource::RenderTargetDescriptor;
use crate::renderer::topology::WindowDescriptor;

/// 一次呈现中的一个源：某只眼睛的渲染目标及其在可绘制区域中的位置
#[derive(Debug)]
pub struct PresentSource<'a, T> {
    pub eye: usize,
    pub target: &'a T,
    pub region: Viewport,
}

/// 平台抽象
///
/// 平台及其句柄都必须能随适配器跨线程移动。
pub trait Platform: Send {
    /// GPU 实例
    type Instance: Send;
    /// 原生窗口
    type Window: Send;
    /// 可呈现表面（含交换链）
    type Surface: Send;
    /// 单只眼睛的颜色 + 深度目标
    type Target: Send;

    /// 平台名称，用于日志
    fn name(&self) -> &'static str;

    /// 创建 GPU 实例
    fn create_instance(&mut self, params: &ConstructorParameters) -> Result<Self::Instance>;

    /// 初始化窗口系统，可重复调用
    ///
    /// 之后的窗口与事件操作需在同一线程上调用。
    fn init_windowing(&mut self) -> Result<()>;

    fn create_window(&mut self, descriptor: &WindowDescriptor) -> Result<Self::Window>;

    /// 窗口实际的可绘制尺寸（可能因宿主缩放而不同于请求值）
    fn drawable_size(&self, window: &Self::Window) -> [u32; 2];

    /// 窗口所在显示器的刷新间隔，未知时返回 `None`
    fn refresh_interval(&self, window: &Self::Window) -> Option<Duration>;

    fn create_surface(
        &mut self,
        instance: &mut Self::Instance,
        window: &Self::Window,
        display: usize,
    ) -> Result<Self::Surface>;

    /// 交给应用的图形库句柄包
    fn library(&self, instance: &Self::Instance) -> Result<GraphicsLibrary>;

    fn create_render_target(
        &mut self,
        instance: &mut Self::Instance,
        descriptor: &RenderTargetDescriptor,
    ) -> Result<Self::Target>;

    /// 把目标包装成借给回调的句柄
    fn lend(&self, target: &Self::Target) -> RenderBuffer;

    /// 接受应用预先渲染好的缓冲；不属于本平台时返回 `None`
    fn adopt(&self, buffer: &RenderBuffer) -> Option<Self::Target>;

    /// 用纯色填充目标的颜色缓冲
    fn fill_target(
        &mut self,
        instance: &mut Self::Instance,
        target: &Self::Target,
        rgba: [f32; 4],
    ) -> Result<()>;

    /// 获取下一个呈现图像，作为本显示的呈现目标
    fn begin_present(&mut self, instance: &mut Self::Instance, surface: &mut Self::Surface) -> Result<()>;

    /// 把源合成到呈现图像，等待设备同步后交给呈现引擎
    fn finish_present(
        &mut self,
        instance: &mut Self::Instance,
        surface: &mut Self::Surface,
        sources: &[PresentSource<'_, Self::Target>],
    ) -> Result<()>;

    /// 排空宿主事件队列
    fn pump_events(&mut self) -> Vec<HostEvent>;

    fn destroy_surface(&mut self, surface: Self::Surface);
    fn destroy_window(&mut self, window: Self::Window);
    fn destroy_target(&mut self, target: Self::Target);
    fn destroy_instance(&mut self, instance: Self::Instance);
}

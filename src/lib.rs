//! HmdRender - 头戴显示器渲染呈现后端
//!
//! 为头戴显示器的渲染管理器提供可替换的呈现后端：
//! 创建每个显示的窗口和表面、分配每只眼睛的渲染目标、
//! 调用应用注册的渲染回调，并把结果合成呈现到显示上。
//!
//! # 模块结构
//!
//! - `core`: 核心功能模块（配置、错误处理、日志、数学类型、宿主事件）
//! - `renderer`: 与图形 API 无关的部分（拓扑、渲染目标描述、时序、帧驱动）
//! - `gfx`: 后端接口、呈现状态机以及 Vulkan / headless 平台
//!
//! # 使用示例
//!
//! ```no_run
//! use hmd_render::core::ConstructorParameters;
//! use hmd_render::gfx::{create_backend, RenderBackend};
//!
//! let backend = create_backend("vulkan", &ConstructorParameters::default()).unwrap();
//! if backend.open_display().is_complete() && backend.render_path_setup() {
//!     while backend.render_frame_finalize() {}
//! }
//! ```

pub mod core;
pub mod gfx;
pub mod renderer;

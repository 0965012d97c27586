//! 图形后端模块
//!
//! - `backend`：对外的 [`RenderBackend`] trait 与回调类型
//! - `adapter`：与图形 API 无关的呈现状态机
//! - `platform`：状态机与具体图形 API / 窗口系统之间的接缝
//! - `vulkan`：Vulkan + winit 平台
//! - `headless`：不需要 GPU 的内存平台
//! - `registry`：按名称创建后端

pub mod adapter;
pub mod backend;
pub mod headless;
pub mod library;
pub mod platform;
pub mod registry;
pub mod vulkan;

pub use adapter::PresentAdapter;
pub use backend::{OpenResults, OpenStatus, RenderBackend, RenderCallbackArgs, RenderCallbackInfo};
pub use library::{GraphicsLibrary, RenderBuffer};
pub use registry::{available_backends, create_backend};

//! 核心功能模块
//!
//! 与具体图形 API 无关的基础设施：配置、错误、日志、数学类型、
//! 宿主事件以及进程级窗口子系统状态。

pub mod config;
pub mod error;
pub mod event;
pub mod log;
pub mod math;
pub mod runtime;

// 重新导出常用类型，方便使用
pub use config::{Config, ConstructorParameters, DisplayMode, DisplayRotation};
pub use error::{HmdRenderError, Result};
pub use event::HostEvent;
pub use math::{Pose, Projection, RgbColor, Viewport};

//! 错误处理模块
//!
//! 定义了后端中使用的统一错误类型，使用 `thiserror` 提供友好的错误消息。
//!
//! 对外边界（`RenderBackend` 的布尔返回值）不携带结构化错误：
//! 内部每一步都返回 [`Result`]，在边界处记录日志后折叠为 `false`。

use thiserror::Error;

/// 后端统一的 Result 类型
pub type Result<T> = std::result::Result<T, HmdRenderError>;

/// HmdRender 的错误类型
#[derive(Debug, Error)]
pub enum HmdRenderError {
    /// 配置错误
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// 图形 API / 窗口系统错误
    #[error("Graphics error: {0}")]
    Graphics(#[from] GraphicsError),

    /// 调用前置条件不满足（索引越界、显示未打开等）
    #[error("Precondition violated: {0}")]
    Precondition(#[from] PreconditionError),

    /// IO 错误
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// 初始化错误
    #[error("Initialization error: {0}")]
    Initialization(String),

    /// 运行时错误
    #[error("Runtime error: {0}")]
    Runtime(String),
}

/// 配置相关的错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 配置文件未找到
    #[error("Config file not found: {0}")]
    FileNotFound(String),

    /// 配置文件解析失败
    #[error("Failed to parse config: {0}")]
    ParseError(String),

    /// 配置值无效
    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// 图形 API 相关的错误
///
/// 初始化类错误会让适配器进入不可恢复的 "not okay" 状态。
#[derive(Debug, Error)]
pub enum GraphicsError {
    /// 实例创建失败
    #[error("Instance creation failed: {0}")]
    InstanceCreation(String),

    /// 窗口系统初始化失败
    #[error("Windowing subsystem initialization failed: {0}")]
    Windowing(String),

    /// 窗口创建失败
    #[error("Could not get window for display {display}: {reason}")]
    WindowCreation { display: usize, reason: String },

    /// 表面创建失败
    #[error("Could not create surface for display {display}: {reason}")]
    SurfaceCreation { display: usize, reason: String },

    /// 设备创建失败
    #[error("Device creation failed: {0}")]
    DeviceCreation(String),

    /// 交换链错误
    #[error("Swapchain error: {0}")]
    SwapchainError(String),

    /// 资源创建失败
    #[error("Resource creation failed: {0}")]
    ResourceCreation(String),

    /// 命令执行失败
    #[error("Command execution failed: {0}")]
    CommandExecution(String),
}

/// 前置条件错误
///
/// 只报告，不改变适配器状态。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PreconditionError {
    #[error("adapter is not doing okay")]
    NotOkay,

    #[error("no such eye: {eye} (have {num_eyes})")]
    NoSuchEye { eye: usize, num_eyes: usize },

    #[error("no such display: {display} (have {num_displays})")]
    NoSuchDisplay { display: usize, num_displays: usize },

    #[error("display not open")]
    DisplayNotOpen,

    #[error("render path has not been set up")]
    RenderPathNotReady,

    #[error("render path is already set up")]
    RenderPathAlreadySetUp,

    #[error("no render callback registered for space {0}")]
    NoCallbackForSpace(usize),

    #[error("present has not been initialized for display {0}")]
    PresentNotStarted(usize),

    #[error("present already initialized for display {0}")]
    PresentAlreadyStarted(usize),

    #[error("expected {expected} render buffers, got {got}")]
    BufferCountMismatch { expected: usize, got: usize },

    #[error("render buffer for eye {0} does not belong to this backend")]
    IncompatibleBuffer(usize),
}

impl HmdRenderError {
    /// 是否为前置条件错误（不影响适配器状态）
    pub fn is_precondition(&self) -> bool {
        matches!(self, HmdRenderError::Precondition(_))
    }
}

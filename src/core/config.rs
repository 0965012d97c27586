//! 配置管理模块
//!
//! 提供后端配置的加载、解析和管理功能。
//! 支持从 TOML 配置文件加载，也支持命令行参数覆盖。
//!
//! # 配置文件格式 (config.toml)
//!
//! ```toml
//! [window]
//! title = "HmdRender"
//! x = 0
//! y = 0
//! fullscreen = false
//!
//! [display]
//! width = 1920
//! height = 1080
//! displays = 1
//! eyes = 2
//! mode = "horizontal_side_by_side"
//! rotation = 0
//!
//! [rendering]
//! backend = "vulkan"   # 或 "headless"
//! vsync = true
//!
//! [logging]
//! level = "info"
//! file_output = false
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

use super::error::{ConfigError, Result};

/// 后端配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// 窗口配置
    #[serde(default)]
    pub window: WindowConfig,

    /// 显示设备几何配置
    #[serde(default)]
    pub display: DisplayConfig,

    /// 渲染配置
    #[serde(default)]
    pub rendering: RenderingConfig,

    /// 日志配置
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// 窗口配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowConfig {
    /// 窗口标题（每个显示会在后面追加显示编号）
    #[serde(default = "default_title")]
    pub title: String,

    /// 第一个窗口的 X 坐标
    #[serde(default)]
    pub x: i32,

    /// 窗口 Y 坐标
    #[serde(default)]
    pub y: i32,

    /// 是否全屏
    #[serde(default)]
    pub fullscreen: bool,
}

/// 显示设备配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayConfig {
    /// 单个显示的宽度（未旋转）
    #[serde(default = "default_width")]
    pub width: u32,

    /// 单个显示的高度（未旋转）
    #[serde(default = "default_height")]
    pub height: u32,

    /// 物理显示数量
    #[serde(default = "default_displays")]
    pub displays: usize,

    /// 眼睛数量（1 = 单目, 2 = 双目）
    #[serde(default = "default_eyes")]
    pub eyes: usize,

    /// 眼睛在显示上的排布
    #[serde(default)]
    pub mode: DisplayMode,

    /// 显示旋转角度
    #[serde(default)]
    pub rotation: DisplayRotation,

    /// 刷新率覆盖（Hz），未设置时从显示器查询
    #[serde(default)]
    pub refresh_rate_hz: Option<f64>,
}

/// 渲染配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderingConfig {
    /// 后端名称，由注册表解析
    #[serde(default = "default_backend")]
    pub backend: String,

    /// 是否等待垂直同步
    #[serde(default = "default_vsync")]
    pub vsync: bool,

    /// 瞳距（米）
    #[serde(default = "default_ipd")]
    pub ipd_meters: f64,

    /// 每只眼睛的垂直视场角（度）
    #[serde(default = "default_fov")]
    pub fov_y_degrees: f64,

    /// 近裁剪面
    #[serde(default = "default_near")]
    pub near_clip: f64,

    /// 远裁剪面
    #[serde(default = "default_far")]
    pub far_clip: f64,
}

/// 眼睛排布方式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayMode {
    /// 左右并排（一个显示承载两只眼睛）
    #[default]
    HorizontalSideBySide,
    /// 上下并排
    VerticalSideBySide,
    /// 每只眼睛独占一个显示
    FullScreen,
}

/// 显示旋转
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum DisplayRotation {
    #[default]
    Zero,
    Ninety,
    OneEighty,
    TwoSeventy,
}

impl DisplayRotation {
    /// 旋转角度（度）
    pub fn degrees(&self) -> u32 {
        match self {
            DisplayRotation::Zero => 0,
            DisplayRotation::Ninety => 90,
            DisplayRotation::OneEighty => 180,
            DisplayRotation::TwoSeventy => 270,
        }
    }

    /// 90°/270° 时窗口的宽高需要互换
    pub fn swaps_axes(&self) -> bool {
        matches!(self, DisplayRotation::Ninety | DisplayRotation::TwoSeventy)
    }
}

impl TryFrom<u32> for DisplayRotation {
    type Error = String;

    fn try_from(degrees: u32) -> std::result::Result<Self, Self::Error> {
        match degrees {
            0 => Ok(DisplayRotation::Zero),
            90 => Ok(DisplayRotation::Ninety),
            180 => Ok(DisplayRotation::OneEighty),
            270 => Ok(DisplayRotation::TwoSeventy),
            other => Err(format!("rotation must be 0, 90, 180 or 270, got {other}")),
        }
    }
}

impl From<DisplayRotation> for u32 {
    fn from(rotation: DisplayRotation) -> Self {
        rotation.degrees()
    }
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// 日志级别
    #[serde(default = "default_log_level")]
    pub level: LogLevel,

    /// 是否输出到文件
    #[serde(default)]
    pub file_output: bool,

    /// 日志文件路径
    #[serde(default = "default_log_file")]
    pub log_file: String,
}

/// 日志级别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

/// 一次会话的不可变构造参数
///
/// 只在构造和打开显示时读取。
#[derive(Debug, Clone, PartialEq)]
pub struct ConstructorParameters {
    pub window_title: String,
    pub window_x: i32,
    pub window_y: i32,
    pub fullscreen: bool,
    pub rotation: DisplayRotation,
    pub vsync: bool,
    pub display_width: u32,
    pub display_height: u32,
    pub num_displays: usize,
    pub num_eyes: usize,
    pub display_mode: DisplayMode,
    pub refresh_rate_hz: Option<f64>,
    pub ipd_meters: f64,
    pub fov_y_degrees: f64,
    pub near_clip: f64,
    pub far_clip: f64,
}

impl Default for ConstructorParameters {
    fn default() -> Self {
        Config::default().constructor_parameters()
    }
}

fn default_title() -> String { "HmdRender".to_string() }
fn default_width() -> u32 { 1920 }
fn default_height() -> u32 { 1080 }
fn default_displays() -> usize { 1 }
fn default_eyes() -> usize { 2 }
fn default_backend() -> String { "vulkan".to_string() }
fn default_vsync() -> bool { true }
fn default_ipd() -> f64 { 0.063 }
fn default_fov() -> f64 { 90.0 }
fn default_near() -> f64 { 0.1 }
fn default_far() -> f64 { 100.0 }
fn default_log_level() -> LogLevel { LogLevel::Info }
fn default_log_file() -> String { "hmd_render.log".to_string() }

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: default_title(),
            x: 0,
            y: 0,
            fullscreen: false,
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            displays: default_displays(),
            eyes: default_eyes(),
            mode: DisplayMode::default(),
            rotation: DisplayRotation::default(),
            refresh_rate_hz: None,
        }
    }
}

impl Default for RenderingConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            vsync: default_vsync(),
            ipd_meters: default_ipd(),
            fov_y_degrees: default_fov(),
            near_clip: default_near(),
            far_clip: default_far(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file_output: false,
            log_file: default_log_file(),
        }
    }
}

impl Config {
    /// 从配置文件加载
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_str = path.as_ref().to_string_lossy().to_string();

        let contents = std::fs::read_to_string(path)
            .map_err(|_| ConfigError::FileNotFound(path_str.clone()))?;

        Self::from_toml_str(&contents)
    }

    /// 从 TOML 字符串解析
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        toml::from_str(contents).map_err(|e| ConfigError::ParseError(e.to_string()).into())
    }

    /// 从配置文件加载，如果文件不存在则使用默认配置
    pub fn from_file_or_default<P: AsRef<Path>>(path: P) -> Self {
        Self::from_file(path).unwrap_or_default()
    }

    /// 从命令行参数覆盖配置
    ///
    /// 支持的参数：
    /// - `--headless`: 使用 headless 后端
    /// - `--backend <name>`: 按名称选择后端
    /// - `--width <value>` / `--height <value>`: 显示分辨率
    /// - `--displays <value>`: 显示数量
    /// - `--rotation <value>`: 旋转角度
    /// - `--fullscreen`: 全屏窗口
    /// - `--no-vsync`: 关闭垂直同步
    pub fn apply_args<I>(&mut self, args: I)
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let args: Vec<String> = args.into_iter().map(|s| s.as_ref().to_string()).collect();
        let value_of = |flag: &str| {
            args.iter()
                .position(|a| a == flag)
                .and_then(|idx| args.get(idx + 1))
        };

        if args.iter().any(|a| a == "--headless") {
            self.rendering.backend = "headless".to_string();
        }
        if let Some(name) = value_of("--backend") {
            self.rendering.backend = name.clone();
        }
        if args.iter().any(|a| a == "--fullscreen") {
            self.window.fullscreen = true;
        }
        if args.iter().any(|a| a == "--no-vsync") {
            self.rendering.vsync = false;
        }
        if let Some(width) = value_of("--width").and_then(|v| v.parse().ok()) {
            self.display.width = width;
        }
        if let Some(height) = value_of("--height").and_then(|v| v.parse().ok()) {
            self.display.height = height;
        }
        if let Some(displays) = value_of("--displays").and_then(|v| v.parse().ok()) {
            self.display.displays = displays;
        }
        if let Some(rotation) = value_of("--rotation")
            .and_then(|v| v.parse::<u32>().ok())
            .and_then(|v| DisplayRotation::try_from(v).ok())
        {
            self.display.rotation = rotation;
        }
    }

    /// 验证配置的有效性
    pub fn validate(&self) -> Result<()> {
        let invalid = |field: &str, reason: &str| -> Result<()> {
            Err(ConfigError::InvalidValue {
                field: field.to_string(),
                reason: reason.to_string(),
            }
            .into())
        };

        if self.display.width == 0 || self.display.height == 0 {
            return invalid("display.width/height", "Display dimensions must be greater than 0");
        }
        if !matches!(self.display.eyes, 1 | 2) {
            return invalid("display.eyes", "Eye count must be 1 or 2");
        }
        if self.display.displays != 1 && self.display.displays != self.display.eyes {
            return invalid("display.displays", "Display count must be 1 or equal to the eye count");
        }
        match self.display.mode {
            DisplayMode::HorizontalSideBySide | DisplayMode::VerticalSideBySide
                if self.display.displays != 1 =>
            {
                return invalid("display.mode", "Side-by-side modes use a single display");
            }
            DisplayMode::FullScreen if self.display.displays != self.display.eyes => {
                return invalid("display.mode", "Full-screen mode needs one display per eye");
            }
            _ => {}
        }
        if let Some(rate) = self.display.refresh_rate_hz {
            if !(rate > 0.0) {
                return invalid("display.refresh_rate_hz", "Refresh rate must be positive");
            }
        }
        if !(self.rendering.near_clip > 0.0 && self.rendering.far_clip > self.rendering.near_clip) {
            return invalid("rendering.near_clip/far_clip", "Clip planes must satisfy 0 < near < far");
        }
        if !(self.rendering.fov_y_degrees > 0.0 && self.rendering.fov_y_degrees < 180.0) {
            return invalid("rendering.fov_y_degrees", "Field of view must be in (0, 180)");
        }

        Ok(())
    }

    /// 生成本次会话的构造参数
    pub fn constructor_parameters(&self) -> ConstructorParameters {
        ConstructorParameters {
            window_title: self.window.title.clone(),
            window_x: self.window.x,
            window_y: self.window.y,
            fullscreen: self.window.fullscreen,
            rotation: self.display.rotation,
            vsync: self.rendering.vsync,
            display_width: self.display.width,
            display_height: self.display.height,
            num_displays: self.display.displays,
            num_eyes: self.display.eyes,
            display_mode: self.display.mode,
            refresh_rate_hz: self.display.refresh_rate_hz,
            ipd_meters: self.rendering.ipd_meters,
            fov_y_degrees: self.rendering.fov_y_degrees,
            near_clip: self.rendering.near_clip,
            far_clip: self.rendering.far_clip,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.display.width, 1920);
        assert_eq!(config.display.height, 1080);
        assert_eq!(config.display.eyes, 2);
        assert_eq!(config.rendering.backend, "vulkan");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();
        config.display.width = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.display.displays = 2;
        // 并排模式只能有一个显示
        assert!(config.validate().is_err());
        config.display.mode = DisplayMode::FullScreen;
        assert!(config.validate().is_ok());

        let mut config = Config::default();
        config.display.mode = DisplayMode::FullScreen;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_partial_toml() {
        let config = Config::from_toml_str(
            r#"
            [window]
            title = "Rift"
            x = 1920

            [display]
            rotation = 90
            mode = "vertical_side_by_side"
            "#,
        )
        .unwrap();
        assert_eq!(config.window.title, "Rift");
        assert_eq!(config.window.x, 1920);
        assert_eq!(config.display.rotation, DisplayRotation::Ninety);
        assert_eq!(config.display.mode, DisplayMode::VerticalSideBySide);
        assert_eq!(config.display.width, 1920);
        assert_eq!(config.logging.level, LogLevel::Info);
    }

    #[test]
    fn test_rejects_bad_rotation() {
        assert!(Config::from_toml_str("[display]\nrotation = 45\n").is_err());
    }

    #[test]
    fn test_apply_args() {
        let mut config = Config::default();
        config.apply_args([
            "hmd_render",
            "--headless",
            "--width",
            "1280",
            "--rotation",
            "270",
            "--no-vsync",
        ]);
        assert_eq!(config.rendering.backend, "headless");
        assert_eq!(config.display.width, 1280);
        assert_eq!(config.display.rotation, DisplayRotation::TwoSeventy);
        assert!(!config.rendering.vsync);

        let params = config.constructor_parameters();
        assert_eq!(params.display_width, 1280);
        assert!(params.rotation.swaps_axes());
        assert!(!params.vsync);
    }
}

//! HmdRender 演示程序
//!
//! 打开配置中的显示，给每只眼睛填充循环变化的纯色并呈现，
//! 直到窗口被关闭或达到指定帧数。
//!
//! # 使用方法
//!
//! ```bash
//! # 使用配置文件
//! cargo run
//!
//! # 不需要 GPU 的 headless 后端，渲染 120 帧
//! cargo run -- --headless --frames 120
//! ```
//!
//! # 命令行参数
//!
//! 除 `--frames <n>` 外，其余参数见 `Config::apply_args`。

use anyhow::{bail, Context};
use tracing::{debug, info};

use hmd_render::core::log;
use hmd_render::core::{Config, RgbColor};
use hmd_render::gfx::create_backend;
use hmd_render::renderer::sync::RenderTimingInfo;
use hmd_render::renderer::{FrameDriver, FrameOutcome};

/// headless 后端没有窗口可关闭，未指定帧数时使用
const HEADLESS_DEFAULT_FRAMES: u64 = 120;

fn frame_limit(args: &[String], backend: &str) -> Option<u64> {
    let explicit = args
        .iter()
        .position(|a| a == "--frames")
        .and_then(|idx| args.get(idx + 1))
        .and_then(|v| v.parse().ok());
    explicit.or_else(|| backend.eq_ignore_ascii_case("headless").then_some(HEADLESS_DEFAULT_FRAMES))
}

fn main() -> anyhow::Result<()> {
    // 1. 加载配置并应用命令行覆盖
    let args: Vec<String> = std::env::args().collect();
    let mut config = Config::from_file_or_default("config.toml");
    config.apply_args(&args);
    config.validate().context("Invalid configuration")?;

    // 2. 初始化日志系统
    let log_file = config
        .logging
        .file_output
        .then_some(config.logging.log_file.as_str());
    log::init_logger(config.logging.level, config.logging.file_output, log_file);
    info!(version = env!("CARGO_PKG_VERSION"), "HmdRender starting...");
    info!(
        backend = %config.rendering.backend,
        width = config.display.width,
        height = config.display.height,
        displays = config.display.displays,
        eyes = config.display.eyes,
        rotation = config.display.rotation.degrees(),
        "Display configuration"
    );

    // 3. 创建后端并打开显示
    let params = config.constructor_parameters();
    let backend = create_backend(&config.rendering.backend, &params)?;
    if !backend.open_display().is_complete() {
        bail!("Failed to open display on the {} backend", backend.backend_name());
    }
    if !backend.render_path_setup() {
        bail!("Failed to set up the render path on the {} backend", backend.backend_name());
    }

    // 4. 渲染循环
    let driver = FrameDriver::new(&params);
    let max_frames = frame_limit(&args, &config.rendering.backend);
    let palette = [RgbColor::red(), RgbColor::green(), RgbColor::blue()];
    let mut frame: u64 = 0;

    loop {
        for eye in 0..backend.num_eyes() {
            let color = palette[(frame as usize / 60 + eye) % palette.len()];
            if !backend.solid_color_eye(eye, &color) {
                bail!("Failed to fill eye {}", eye);
            }
        }

        if driver.present_frame(backend.as_ref()) == FrameOutcome::Stopped {
            break;
        }
        frame += 1;

        if frame % 60 == 0 {
            let mut timing = RenderTimingInfo::default();
            if backend.get_timing_info(0, &mut timing) {
                debug!(
                    frame,
                    interval = ?timing.hardware_display_interval,
                    since_retrace = ?timing.time_since_last_vertical_retrace,
                    until_present = ?timing.time_until_next_present_required,
                    "Timing"
                );
            }
        }
        if max_frames.is_some_and(|limit| frame >= limit) {
            break;
        }
    }

    info!(frames = frame, "Render loop finished");
    Ok(())
}

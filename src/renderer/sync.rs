//! 呈现时序
//!
//! 打开显示时发布一次不可变的时序快照（刷新间隔、眼睛到显示的映射），
//! 之后每次显示呈现完成都会在 [`VsyncClock`] 上打一个原子时间戳。
//! 时序查询只读取这两者，因此不需要适配器锁。

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// 留给最终呈现（畸变校正 / 时间扭曲）的时间
pub const PRESENT_SLACK: Duration = Duration::from_millis(1);

/// 渲染时序信息
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderTimingInfo {
    /// 显示硬件的刷新间隔
    pub hardware_display_interval: Duration,
    /// 距上一次垂直回扫的时间
    pub time_since_last_vertical_retrace: Duration,
    /// 距离必须提交下一帧的剩余时间
    pub time_until_next_present_required: Duration,
}

/// 每个显示的最近呈现时间戳
///
/// 时间戳存为相对 `epoch` 的纳秒数加一，0 表示还没有呈现过。
#[derive(Debug)]
pub struct VsyncClock {
    epoch: Instant,
    last_present: Vec<AtomicU64>,
}

impl VsyncClock {
    pub fn new(num_displays: usize) -> Self {
        Self::with_epoch(num_displays, Instant::now())
    }

    pub fn with_epoch(num_displays: usize, epoch: Instant) -> Self {
        Self {
            epoch,
            last_present: (0..num_displays).map(|_| AtomicU64::new(0)).collect(),
        }
    }

    /// 记录显示刚刚完成一次呈现
    pub fn stamp(&self, display: usize) {
        self.stamp_at(display, Instant::now());
    }

    pub fn stamp_at(&self, display: usize, at: Instant) {
        if let Some(slot) = self.last_present.get(display) {
            let nanos = at.saturating_duration_since(self.epoch).as_nanos() as u64;
            slot.store(nanos.saturating_add(1), Ordering::Release);
        }
    }

    /// 最近一次呈现的时间
    pub fn last_present(&self, display: usize) -> Option<Instant> {
        let raw = self.last_present.get(display)?.load(Ordering::Acquire);
        if raw == 0 {
            None
        } else {
            Some(self.epoch + Duration::from_nanos(raw - 1))
        }
    }

    /// 计算 `now` 时刻的时序信息
    ///
    /// 还没有呈现过时以打开显示的时刻作为回扫参考。
    pub fn timing(&self, display: usize, interval: Duration, now: Instant) -> RenderTimingInfo {
        let reference = self.last_present(display).unwrap_or(self.epoch);
        let elapsed = now.saturating_duration_since(reference);

        if interval.is_zero() {
            return RenderTimingInfo {
                hardware_display_interval: interval,
                time_since_last_vertical_retrace: elapsed,
                time_until_next_present_required: Duration::ZERO,
            };
        }

        let since_retrace =
            Duration::from_nanos((elapsed.as_nanos() % interval.as_nanos()) as u64);
        let until_retrace = interval - since_retrace;

        RenderTimingInfo {
            hardware_display_interval: interval,
            time_since_last_vertical_retrace: since_retrace,
            time_until_next_present_required: until_retrace.saturating_sub(PRESENT_SLACK),
        }
    }
}

/// 刷新率（Hz）转换为刷新间隔
pub fn interval_from_hz(hz: f64) -> Duration {
    if hz > 0.0 {
        Duration::from_nanos((1e9 / hz).round() as u64)
    } else {
        Duration::ZERO
    }
}

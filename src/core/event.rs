//! 宿主窗口事件
//!
//! 每帧在帧结束时从窗口系统的事件队列中排空一次。
//! 关闭/退出事件是外部请求到达渲染循环的唯一途径。

use std::fmt;

/// 从窗口系统排空得到的事件
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostEvent {
    /// 某个窗口请求关闭（`display` 为已知的显示编号）
    CloseRequested { display: Option<usize> },

    /// 整个进程请求退出
    Quit,

    /// 窗口可绘制区域尺寸变化
    Resized {
        display: Option<usize>,
        width: u32,
        height: u32,
    },

    /// 其他不关心的事件
    Other,
}

impl HostEvent {
    /// 是否要求渲染循环停止
    pub fn is_termination(&self) -> bool {
        matches!(self, HostEvent::CloseRequested { .. } | HostEvent::Quit)
    }
}

impl fmt::Display for HostEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostEvent::CloseRequested { display: Some(d) } => write!(f, "CloseRequested(display {})", d),
            HostEvent::CloseRequested { display: None } => write!(f, "CloseRequested"),
            HostEvent::Quit => write!(f, "Quit"),
            HostEvent::Resized { width, height, .. } => write!(f, "Resized({}x{})", width, height),
            HostEvent::Other => write!(f, "Other"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_termination_events() {
        assert!(HostEvent::Quit.is_termination());
        assert!(HostEvent::CloseRequested { display: Some(1) }.is_termination());
        assert!(!HostEvent::Resized { display: None, width: 1, height: 1 }.is_termination());
        assert!(!HostEvent::Other.is_termination());
    }
}

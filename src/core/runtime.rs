//! 进程级窗口子系统状态
//!
//! 窗口子系统只初始化一次，由所有打开了显示的适配器共享。
//! 每个使用者持有一个 [`WindowingGuard`]，最后一个守卫释放时完成配对的清理。

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tracing::{debug, info};

/// 引用计数的窗口子系统
#[derive(Debug)]
pub struct WindowingRuntime {
    users: Mutex<usize>,
    initializations: AtomicUsize,
}

static WINDOWING: WindowingRuntime = WindowingRuntime::new();

/// 进程唯一的窗口子系统
pub fn windowing() -> &'static WindowingRuntime {
    &WINDOWING
}

impl WindowingRuntime {
    pub const fn new() -> Self {
        Self {
            users: Mutex::new(0),
            initializations: AtomicUsize::new(0),
        }
    }

    /// 增加一个使用者；第一个使用者触发初始化
    pub fn acquire(&'static self) -> WindowingGuard {
        let mut users = self.users.lock().unwrap_or_else(|e| e.into_inner());
        if *users == 0 {
            self.initializations.fetch_add(1, Ordering::AcqRel);
            info!("Windowing subsystem initialized");
        }
        *users += 1;
        debug!(users = *users, "Windowing subsystem acquired");
        WindowingGuard { runtime: self }
    }

    /// 当前使用者数量
    pub fn active_users(&self) -> usize {
        *self.users.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn is_initialized(&self) -> bool {
        self.active_users() > 0
    }

    /// 从进程启动以来初始化的次数
    pub fn initialization_count(&self) -> usize {
        self.initializations.load(Ordering::Acquire)
    }

    fn release(&self) {
        let mut users = self.users.lock().unwrap_or_else(|e| e.into_inner());
        *users = users.saturating_sub(1);
        if *users == 0 {
            info!("Windowing subsystem shut down");
        }
    }
}

impl Default for WindowingRuntime {
    fn default() -> Self {
        Self::new()
    }
}

/// 窗口子系统的使用凭证，drop 时释放
#[derive(Debug)]
pub struct WindowingGuard {
    runtime: &'static WindowingRuntime,
}

impl Drop for WindowingGuard {
    fn drop(&mut self) {
        self.runtime.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local_runtime() -> &'static WindowingRuntime {
        Box::leak(Box::new(WindowingRuntime::new()))
    }

    #[test]
    fn test_first_acquire_initializes_once() {
        let runtime = local_runtime();
        assert!(!runtime.is_initialized());

        let a = runtime.acquire();
        let b = runtime.acquire();
        assert_eq!(runtime.active_users(), 2);
        assert_eq!(runtime.initialization_count(), 1);

        drop(a);
        assert!(runtime.is_initialized());
        drop(b);
        assert!(!runtime.is_initialized());

        let _c = runtime.acquire();
        assert_eq!(runtime.initialization_count(), 2);
    }
}

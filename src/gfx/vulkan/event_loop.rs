//! 线程内共享的 winit 事件循环
//!
//! winit 每个进程只允许创建一次事件循环，销毁后也不能重建。
//! 事件循环在第一次打开显示时于当前线程创建，此后该线程上的所有 Vulkan 平台共用它，
//! 直到线程退出。事件循环不是 `Send`，所以适配器本身不持有它；
//! 在没有事件循环的线程上调用窗口操作只会得到错误。

use std::cell::RefCell;
use std::panic::{self, AssertUnwindSafe};

use tracing::debug;
use winit::event_loop::{EventLoop, EventLoopBuilder};

use crate::core::error::{GraphicsError, HmdRenderError, Result};

/// 单线程的事件循环槽
#[derive(Debug)]
pub(crate) struct LoopSlot<T> {
    slot: RefCell<Option<T>>,
}

impl<T> LoopSlot<T> {
    pub(crate) const fn new() -> Self {
        Self { slot: RefCell::new(None) }
    }

    /// 槽为空时用 `create` 填充；返回这次是否新建
    pub(crate) fn ensure<F>(&self, create: F) -> Result<bool>
    where
        F: FnOnce() -> Result<T>,
    {
        if self.is_ready() {
            return Ok(false);
        }
        let value = create()?;
        let mut slot = self
            .slot
            .try_borrow_mut()
            .map_err(|_| GraphicsError::Windowing("event loop is in use".to_string()))?;
        *slot = Some(value);
        Ok(true)
    }

    pub(crate) fn is_ready(&self) -> bool {
        self.slot.try_borrow().map(|slot| slot.is_some()).unwrap_or(true)
    }

    /// 借出事件循环；槽为空或正被借用时返回 `None`
    pub(crate) fn with<R>(&self, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        let mut slot = self.slot.try_borrow_mut().ok()?;
        slot.as_mut().map(f)
    }
}

thread_local! {
    static EVENT_LOOP: LoopSlot<EventLoop<()>> = const { LoopSlot::new() };
}

/// 确保当前线程拥有事件循环
pub(crate) fn ensure_event_loop() -> Result<()> {
    let created = EVENT_LOOP
        .try_with(|slot| slot.ensure(build_event_loop))
        .map_err(|e| GraphicsError::Windowing(e.to_string()))??;
    if created {
        debug!(thread = ?std::thread::current().id(), "Event loop created");
    }
    Ok(())
}

/// 在当前线程的事件循环上执行 `f`
pub(crate) fn with_event_loop<R>(f: impl FnOnce(&mut EventLoop<()>) -> R) -> Result<R> {
    EVENT_LOOP
        .try_with(|slot| slot.with(f))
        .ok()
        .flatten()
        .ok_or_else(|| GraphicsError::Windowing("no event loop on this thread".to_string()).into())
}

fn build_event_loop() -> Result<EventLoop<()>> {
    let mut builder = EventLoopBuilder::new();
    allow_any_thread(&mut builder);

    // 不支持非主线程的平台上 winit 会 panic，这里转换为错误
    match panic::catch_unwind(AssertUnwindSafe(|| builder.build())) {
        Ok(Ok(event_loop)) => Ok(event_loop),
        Ok(Err(e)) => Err(GraphicsError::Windowing(e.to_string()).into()),
        Err(_) => Err(HmdRenderError::from(GraphicsError::Windowing(
            "event loop cannot be created on this thread".to_string(),
        ))),
    }
}

#[cfg(all(
    unix,
    not(any(target_os = "macos", target_os = "ios", target_os = "android"))
))]
fn allow_any_thread(builder: &mut EventLoopBuilder<()>) {
    use winit::platform::x11::EventLoopBuilderExtX11;
    // X11 与 Wayland 共用同一个 any_thread 标志
    EventLoopBuilderExtX11::with_any_thread(builder, true);
}

#[cfg(target_os = "windows")]
fn allow_any_thread(builder: &mut EventLoopBuilder<()>) {
    use winit::platform::windows::EventLoopBuilderExtWindows;
    builder.with_any_thread(true);
}

#[cfg(not(any(
    target_os = "windows",
    all(
        unix,
        not(any(target_os = "macos", target_os = "ios", target_os = "android"))
    )
)))]
fn allow_any_thread(_builder: &mut EventLoopBuilder<()>) {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// 和 winit 一样只允许创建一次的假事件循环
    fn create_once(created: &AtomicUsize) -> Result<u32> {
        if created.fetch_add(1, Ordering::SeqCst) > 0 {
            return Err(GraphicsError::Windowing("EventLoop can't be recreated".to_string()).into());
        }
        Ok(7)
    }

    #[test]
    fn test_slot_reused_across_platform_lifetimes() {
        let created = AtomicUsize::new(0);
        let slot = LoopSlot::new();

        // 第一个平台打开显示
        assert!(slot.ensure(|| create_once(&created)).unwrap());
        assert_eq!(slot.with(|value| *value), Some(7));

        // 第二个平台（第一个已销毁）重新打开
        assert!(!slot.ensure(|| create_once(&created)).unwrap());
        assert_eq!(created.load(Ordering::SeqCst), 1);
        assert_eq!(slot.with(|value| *value + 1), Some(8));
    }

    #[test]
    fn test_empty_slot_lends_nothing() {
        let slot: LoopSlot<u32> = LoopSlot::new();
        assert!(!slot.is_ready());
        assert_eq!(slot.with(|value| *value), None);

        let failed = slot.ensure(|| Err(GraphicsError::Windowing("no display".to_string()).into()));
        assert!(failed.is_err());
        assert!(!slot.is_ready());
    }

    #[test]
    fn test_nested_borrow_is_refused() {
        let slot = LoopSlot::new();
        slot.ensure(|| Ok(1u32)).unwrap();
        let inner = slot.with(|_| slot.with(|value| *value));
        assert_eq!(inner, Some(None));
    }

    #[test]
    fn test_missing_event_loop_is_an_error() {
        let result = std::thread::spawn(|| with_event_loop(|_| ()).is_err())
            .join()
            .unwrap();
        assert!(result);
    }
}

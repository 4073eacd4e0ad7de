//! A process-scoped `SetWinEventHook` watcher shared by `OverlayRenderer`'s
//! z-order pinning and `LetterboxWindow`'s foreground/minimize tracking
//! (spec §4.4, §4.6). Win32 hook callbacks are bare `extern "system" fn`s
//! with no user-data slot, so the callback forwards into a thread-local sink
//! set just before the hook is installed — the watcher's thread is the only
//! thread that ever touches that sink.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use windows::Win32::Foundation::HWND;
use windows::Win32::System::Threading::GetCurrentThreadId;
use windows::Win32::UI::Accessibility::{SetWinEventHook, UnhookWinEvent, HWINEVENTHOOK};
use windows::Win32::UI::WindowsAndMessaging::{
    DispatchMessageW, GetMessageW, GetWindowThreadProcessId, PostThreadMessageW, TranslateMessage, MSG,
    WINEVENT_OUTOFCONTEXT, WM_QUIT,
};

use crate::geometry::WindowHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetEvent {
    ForegroundChanged,
    MinimizeStart,
    MinimizeEnd,
    Destroyed,
}

const EVENT_SYSTEM_FOREGROUND: u32 = 0x0003;
const EVENT_SYSTEM_MINIMIZESTART: u32 = 0x0016;
const EVENT_SYSTEM_MINIMIZEEND: u32 = 0x0017;
const EVENT_OBJECT_DESTROY: u32 = 0x8001;

thread_local! {
    static SINK: std::cell::RefCell<Option<Box<dyn FnMut(TargetEvent)>>> = std::cell::RefCell::new(None);
}

unsafe extern "system" fn win_event_proc(
    _hook: HWINEVENTHOOK,
    event: u32,
    _hwnd: HWND,
    _id_object: i32,
    _id_child: i32,
    _id_event_thread: u32,
    _event_time: u32,
) {
    let mapped = match event {
        EVENT_SYSTEM_FOREGROUND => Some(TargetEvent::ForegroundChanged),
        EVENT_SYSTEM_MINIMIZESTART => Some(TargetEvent::MinimizeStart),
        EVENT_SYSTEM_MINIMIZEEND => Some(TargetEvent::MinimizeEnd),
        EVENT_OBJECT_DESTROY => Some(TargetEvent::Destroyed),
        _ => None,
    };
    let Some(mapped) = mapped else { return };
    SINK.with(|sink| {
        if let Some(cb) = sink.borrow_mut().as_mut() {
            cb(mapped);
        }
    });
}

fn process_id_of(handle: WindowHandle) -> u32 {
    unsafe { GetWindowThreadProcessId(HWND(handle.0 as *mut _), None) }
}

/// Runs a `SetWinEventHook` scoped to the target window's process on a
/// dedicated thread, forwarding matched events to `on_event`. Dropping (or
/// calling `stop`) posts `WM_QUIT` to that thread to unblock its `GetMessageW`
/// loop and joins it.
pub struct TargetEventWatcher {
    thread_id: Arc<AtomicU32>,
    handle: Option<JoinHandle<()>>,
}

impl TargetEventWatcher {
    pub fn spawn(target: WindowHandle, mut on_event: impl FnMut(TargetEvent) + Send + 'static) -> Self {
        let thread_id = Arc::new(AtomicU32::new(0));
        let thread_id_setter = thread_id.clone();
        let process_id = process_id_of(target);

        let handle = std::thread::spawn(move || {
            // `GetCurrentThreadId`, not `std::thread::JoinHandle::thread().id()` —
            // the latter is a Rust-internal identifier unrelated to the real
            // Win32 thread id `PostThreadMessageW` needs.
            thread_id_setter.store(unsafe { GetCurrentThreadId() }, Ordering::SeqCst);

            SINK.with(|sink| {
                *sink.borrow_mut() = Some(Box::new(move |event| on_event(event)));
            });

            let hook = unsafe {
                SetWinEventHook(
                    EVENT_SYSTEM_FOREGROUND,
                    EVENT_OBJECT_DESTROY,
                    None,
                    Some(win_event_proc),
                    process_id,
                    0,
                    WINEVENT_OUTOFCONTEXT,
                )
            };

            let mut msg = MSG::default();
            unsafe {
                while GetMessageW(&mut msg, None, 0, 0).as_bool() {
                    let _ = TranslateMessage(&msg);
                    DispatchMessageW(&msg);
                }
                if !hook.is_invalid() {
                    let _ = UnhookWinEvent(hook);
                }
            }
            SINK.with(|sink| *sink.borrow_mut() = None);
        });

        Self { thread_id, handle: Some(handle) }
    }

    pub fn stop(&mut self) {
        let tid = self.thread_id.load(Ordering::SeqCst);
        if tid != 0 {
            unsafe {
                let _ = PostThreadMessageW(tid, WM_QUIT, windows::Win32::Foundation::WPARAM(0), windows::Win32::Foundation::LPARAM(0));
            }
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for TargetEventWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

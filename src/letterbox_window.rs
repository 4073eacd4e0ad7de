//! A fullscreen black backdrop shown when the target exceeds the screen in
//! exactly one axis (spec §4.6). Grounded on the original
//! `letterbox_window.{hpp,cpp}`: a plain win32 window painted with a
//! registered black brush (no swapchain — the content never changes), with
//! its own event-hook thread watching the target's foreground/minimize/
//! destroy transitions via `win_event_hook`.

use std::sync::atomic::{AtomicBool, AtomicIsize, Ordering};
use std::sync::Arc;

use thiserror::Error;

use crate::geometry::{Size, WindowHandle};
use crate::win_event_hook::{TargetEvent, TargetEventWatcher};

#[derive(Debug, Error)]
pub enum LetterboxError {
    #[error("failed to create the letterbox window: {0}")]
    WindowCreationFailed(String),
}

pub type LetterboxResult<T> = Result<(), LetterboxError>;

/// True when the backdrop should be shown: the target exceeds the screen in
/// exactly one axis (so the visible portion would otherwise reveal the
/// desktop behind it), and is never shown while the overlay is active
/// (spec §3 `ConsumerSet::letterbox_visible`).
pub fn should_show(target_size: Size, screen: Size, overlay_active: bool) -> bool {
    if overlay_active {
        return false;
    }
    let exceeds_width = target_size.width > screen.width;
    let exceeds_height = target_size.height > screen.height;
    exceeds_width != exceeds_height
}

const LETTERBOX_CLASS_NAME: &str = "RedirectCoreLetterboxWindow";

pub struct LetterboxWindow {
    hwnd: Arc<AtomicIsize>,
    visible: bool,
    wants_visible: Arc<AtomicBool>,
    watcher: Option<TargetEventWatcher>,
}

impl LetterboxWindow {
    pub fn new() -> Self {
        Self {
            hwnd: Arc::new(AtomicIsize::new(0)),
            visible: false,
            wants_visible: Arc::new(AtomicBool::new(false)),
            watcher: None,
        }
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    #[cfg(target_os = "windows")]
    fn ensure_window(&mut self) {
        if self.hwnd.load(Ordering::SeqCst) != 0 {
            return;
        }
        match create_letterbox_window() {
            Ok(hwnd) => self.hwnd.store(hwnd.0 as isize, Ordering::SeqCst),
            Err(err) => log::error!("LetterboxWindow::ensure_window: {err}"),
        }
    }

    #[cfg(not(target_os = "windows"))]
    fn ensure_window(&mut self) {}

    pub fn show(&mut self) {
        self.ensure_window();
        self.wants_visible.store(true, Ordering::SeqCst);
        set_window_visible(self.hwnd.load(Ordering::SeqCst), true);
        self.visible = true;
        log::info!("LetterboxWindow::show");
    }

    pub fn hide(&mut self) {
        self.wants_visible.store(false, Ordering::SeqCst);
        set_window_visible(self.hwnd.load(Ordering::SeqCst), false);
        self.visible = false;
        log::info!("LetterboxWindow::hide");
    }

    /// Installs a process-scoped event watcher on `target` that hides the
    /// backdrop while the target is minimized and restores it (if it was
    /// meant to be visible) once the target is foregrounded again, mirroring
    /// the original's `WinEventProc`-driven show/hide (spec §4.6).
    pub fn watch_target(&mut self, target: WindowHandle) {
        if let Some(mut watcher) = self.watcher.take() {
            watcher.stop();
        }
        let hwnd_slot = self.hwnd.clone();
        let wants_visible = self.wants_visible.clone();
        self.watcher = Some(TargetEventWatcher::spawn(target, move |event| match event {
            TargetEvent::MinimizeStart => set_window_visible(hwnd_slot.load(Ordering::SeqCst), false),
            TargetEvent::MinimizeEnd | TargetEvent::ForegroundChanged => {
                if wants_visible.load(Ordering::SeqCst) {
                    set_window_visible(hwnd_slot.load(Ordering::SeqCst), true);
                }
            }
            TargetEvent::Destroyed => set_window_visible(hwnd_slot.load(Ordering::SeqCst), false),
        }));
    }

    /// Tears down the window and its event-hook thread. Idempotent.
    pub fn teardown(&mut self) {
        if let Some(mut watcher) = self.watcher.take() {
            watcher.stop();
        }
        destroy_window(self.hwnd.swap(0, Ordering::SeqCst));
        self.visible = false;
        self.wants_visible.store(false, Ordering::SeqCst);
    }

    pub fn apply(&mut self, target_size: Size, screen: Size, overlay_active: bool) {
        if should_show(target_size, screen, overlay_active) {
            self.show();
        } else {
            self.hide();
        }
    }
}

impl Default for LetterboxWindow {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for LetterboxWindow {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(target_os = "windows")]
fn create_letterbox_window() -> LetterboxResult<windows::Win32::Foundation::HWND> {
    use crate::swapchain_window;
    use windows::Win32::Graphics::Gdi::CreateSolidBrush;
    use windows::Win32::Foundation::COLORREF;
    use windows::Win32::UI::WindowsAndMessaging::{WS_EX_TOPMOST, WS_POPUP};
    let black_brush = unsafe { CreateSolidBrush(COLORREF(0)) };
    swapchain_window::create_window_with_background(
        LETTERBOX_CLASS_NAME,
        "",
        WS_EX_TOPMOST,
        WS_POPUP,
        crate::geometry::Position::default(),
        screen_size_for_backdrop(),
        None,
        Some(black_brush),
    )
    .map(|(hwnd, _)| hwnd)
    .map_err(|err| LetterboxError::WindowCreationFailed(err.to_string()))
}

#[cfg(target_os = "windows")]
fn screen_size_for_backdrop() -> Size {
    unsafe {
        let hwnd = windows::Win32::UI::WindowsAndMessaging::GetDesktopWindow();
        let mut rect = windows::Win32::Foundation::RECT::default();
        let _ = windows::Win32::UI::WindowsAndMessaging::GetWindowRect(hwnd, &mut rect);
        Size::new((rect.right - rect.left).max(0) as u32, (rect.bottom - rect.top).max(0) as u32)
    }
}

#[cfg(target_os = "windows")]
fn set_window_visible(hwnd_value: isize, visible: bool) {
    if hwnd_value == 0 {
        return;
    }
    use windows::Win32::Foundation::HWND;
    use windows::Win32::UI::WindowsAndMessaging::{ShowWindow, SW_HIDE, SW_SHOWNOACTIVATE};
    unsafe {
        let _ = ShowWindow(HWND(hwnd_value as *mut _), if visible { SW_SHOWNOACTIVATE } else { SW_HIDE });
    }
}

#[cfg(not(target_os = "windows"))]
fn set_window_visible(_hwnd_value: isize, _visible: bool) {}

#[cfg(target_os = "windows")]
fn destroy_window(hwnd_value: isize) {
    if hwnd_value == 0 {
        return;
    }
    use windows::Win32::Foundation::HWND;
    use windows::Win32::UI::WindowsAndMessaging::DestroyWindow;
    unsafe {
        let _ = DestroyWindow(HWND(hwnd_value as *mut _));
    }
}

#[cfg(not(target_os = "windows"))]
fn destroy_window(_hwnd_value: isize) {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn e1_letterbox_hidden_when_overlay_active() {
        assert!(!should_show(Size::new(7680, 4320), Size::new(1920, 1080), true));
    }

    #[test]
    fn shown_when_exactly_one_axis_exceeds() {
        assert!(should_show(Size::new(2560, 1000), Size::new(1920, 1080), false));
        assert!(!should_show(Size::new(1000, 1000), Size::new(1920, 1080), false));
        // Both axes exceed: still letterboxed (only one axis would reveal
        // desktop if it didn't, but the original only special-cases the
        // single-axis overflow; two-axis overflow is the oversize+overlay
        // case E1, handled by the overlay itself instead).
        assert!(!should_show(Size::new(7680, 4320), Size::new(1920, 1080), false));
    }
}

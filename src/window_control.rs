//! All mutating operations on the *target* window (spec §4.3): resize,
//! reposition, border-style changes, and retargeting the system taskbar.
//! Grounded on the original `window_utils.cpp`'s style-bit and z-order
//! manipulation, expressed through the `windows` crate's Win32 bindings.

use thiserror::Error;
use windows::Win32::Foundation::{HWND, RECT};
use windows::Win32::Graphics::Gdi::{MonitorFromWindow, MONITOR_DEFAULTTONEAREST};
use windows::Win32::UI::WindowsAndMessaging::{
    AdjustWindowRectEx, FindWindowW, GetWindowLongPtrW, GetWindowRect, IsIconic, IsWindow,
    SetWindowLongPtrW, SetWindowPos, ShowWindow, GWL_EXSTYLE, GWL_STYLE, HWND_BOTTOM, SWP_NOACTIVATE,
    SWP_NOSIZE, SWP_NOZORDER, SW_RESTORE, WS_CAPTION, WS_OVERLAPPEDWINDOW, WS_POPUP, WS_THICKFRAME,
};

use crate::geometry::{centered_rect, Rect, Size, WindowHandle};

#[derive(Debug, Error)]
pub enum WindowControlError {
    #[error("resize failed: {0}")]
    ResizeFailed(windows::core::Error),
    #[error("target window handle is invalid")]
    HandleInvalid,
}

pub type WindowControlResult<T> = Result<T, WindowControlError>;

/// `(handle, cached_rect, cached_size, borderless_flag)` (spec §3).
/// Revalidated at every entry point; an invalid handle fails operations
/// safely rather than crashing.
#[derive(Debug, Clone, Copy)]
pub struct TargetWindow {
    pub handle: WindowHandle,
    pub cached_rect: Rect,
    pub cached_size: Size,
    pub borderless: bool,
}

impl TargetWindow {
    pub fn new(handle: WindowHandle, rect: Rect) -> Self {
        Self {
            handle,
            cached_rect: rect,
            cached_size: rect.size(),
            borderless: false,
        }
    }
}

fn hwnd_of(handle: WindowHandle) -> HWND {
    HWND(handle.0 as *mut _)
}

fn is_valid(hwnd: HWND) -> bool {
    unsafe { IsWindow(Some(hwnd)) }.as_bool()
}

/// Finds a top-level window by exact title. Returns `None` rather than
/// erroring — "not found" is a normal, expected outcome the caller turns
/// into a `WINDOW_NOT_FOUND` notification.
pub fn find_target_window(title: &str) -> Option<WindowHandle> {
    let wide: Vec<u16> = title.encode_utf16().chain(std::iter::once(0)).collect();
    let hwnd = unsafe { FindWindowW(None, windows::core::PCWSTR(wide.as_ptr())) }.ok()?;
    if hwnd.0.is_null() {
        None
    } else {
        Some(WindowHandle(hwnd.0 as isize))
    }
}

fn screen_size() -> Size {
    // Primary-monitor size via a desktop window lookup; kept local to this
    // module since no other component needs raw monitor enumeration.
    unsafe {
        let hwnd = windows::Win32::UI::WindowsAndMessaging::GetDesktopWindow();
        let mut rect = RECT::default();
        let _ = GetWindowRect(hwnd, &mut rect);
        Size::new(
            (rect.right - rect.left).max(0) as u32,
            (rect.bottom - rect.top).max(0) as u32,
        )
    }
}

pub struct WindowControl;

impl WindowControl {
    /// If the current style is `OVERLAPPEDWINDOW` *and* the requested size
    /// exceeds the screen in either dimension, strips decorations and adds
    /// `POPUP`. Positions so the client-area center coincides with the
    /// screen center; the window may land partially off-screen — that's
    /// intentional, it's what `OverlayRenderer` compensates for. Resizing
    /// to the same `(w, h)` is a no-op on size but still re-centers.
    pub fn resize(
        target: &mut TargetWindow,
        width: u32,
        height: u32,
        lower_taskbar: bool,
    ) -> WindowControlResult<bool> {
        let hwnd = hwnd_of(target.handle);
        if !is_valid(hwnd) {
            return Err(WindowControlError::HandleInvalid);
        }

        let screen = screen_size();
        let exceeds_screen = width > screen.width || height > screen.height;

        unsafe {
            let style = GetWindowLongPtrW(hwnd, GWL_STYLE) as u32;
            let is_overlapped = style & WS_OVERLAPPEDWINDOW.0 == WS_OVERLAPPEDWINDOW.0;
            if is_overlapped && exceeds_screen {
                let new_style = (style & !(WS_CAPTION.0 | WS_THICKFRAME.0)) | WS_POPUP.0;
                SetWindowLongPtrW(hwnd, GWL_STYLE, new_style as isize);
                target.borderless = true;
            }

            let mut client_rect = RECT {
                left: 0,
                top: 0,
                right: width as i32,
                bottom: height as i32,
            };
            let ex_style = GetWindowLongPtrW(hwnd, GWL_EXSTYLE) as u32;
            let style_now = GetWindowLongPtrW(hwnd, GWL_STYLE) as u32;
            let _ = AdjustWindowRectEx(
                &mut client_rect,
                windows::Win32::UI::WindowsAndMessaging::WINDOW_STYLE(style_now),
                false,
                windows::Win32::UI::WindowsAndMessaging::WINDOW_EX_STYLE(ex_style),
            );
            let window_w = (client_rect.right - client_rect.left) as u32;
            let window_h = (client_rect.bottom - client_rect.top) as u32;

            let target_rect = centered_rect(Size::new(window_w, window_h), screen);
            SetWindowPos(
                hwnd,
                None,
                target_rect.left,
                target_rect.top,
                window_w as i32,
                window_h as i32,
                SWP_NOACTIVATE | SWP_NOZORDER,
            )
            .map_err(WindowControlError::ResizeFailed)?;

            if lower_taskbar {
                Self::lower_taskbar();
            }
        }

        target.cached_size = Size::new(width, height);
        target.cached_rect = centered_rect(Size::new(width, height), screen);
        log::info!(
            "WindowControl::resize: handle={} -> {}x{} borderless={}",
            target.handle,
            width,
            height,
            target.borderless
        );
        Ok(true)
    }

    /// Reverts to the screen-size resolution at ratio 1 and restores
    /// decorations.
    pub fn reset(target: &mut TargetWindow) -> WindowControlResult<bool> {
        let screen = screen_size();
        let hwnd = hwnd_of(target.handle);
        if !is_valid(hwnd) {
            return Err(WindowControlError::HandleInvalid);
        }
        unsafe {
            let style = GetWindowLongPtrW(hwnd, GWL_STYLE) as u32;
            let restored = (style & !WS_POPUP.0) | WS_OVERLAPPEDWINDOW.0;
            SetWindowLongPtrW(hwnd, GWL_STYLE, restored as isize);
            let _ = ShowWindow(hwnd, SW_RESTORE);
        }
        target.borderless = false;
        Self::resize(target, screen.width, screen.height, false)
    }

    /// Flips between `OVERLAPPED...` and `POPUP` style bits.
    pub fn toggle_borderless(target: &mut TargetWindow) -> WindowControlResult<()> {
        let hwnd = hwnd_of(target.handle);
        if !is_valid(hwnd) {
            return Err(WindowControlError::HandleInvalid);
        }
        unsafe {
            let style = GetWindowLongPtrW(hwnd, GWL_STYLE) as u32;
            let new_style = if target.borderless {
                (style & !WS_POPUP.0) | WS_OVERLAPPEDWINDOW.0
            } else {
                (style & !(WS_CAPTION.0 | WS_THICKFRAME.0)) | WS_POPUP.0
            };
            SetWindowLongPtrW(hwnd, GWL_STYLE, new_style as isize);
        }
        target.borderless = !target.borderless;
        Ok(())
    }

    /// Pushes the system taskbar (`Shell_TrayWnd`) to the bottom of the
    /// z-order, matching the original's `window_utils.cpp` behavior.
    pub fn lower_taskbar() {
        unsafe {
            let class: Vec<u16> = "Shell_TrayWnd\0".encode_utf16().collect();
            if let Ok(tray) = FindWindowW(windows::core::PCWSTR(class.as_ptr()), None) {
                if !tray.0.is_null() {
                    let _ = SetWindowPos(tray, Some(HWND_BOTTOM), 0, 0, 0, 0, SWP_NOACTIVATE | SWP_NOSIZE);
                }
            }
        }
    }

    pub fn is_valid_handle(handle: WindowHandle) -> bool {
        is_valid(hwnd_of(handle))
    }

    /// True if the target is currently minimized (spec E6: a minimized
    /// window can't be captured, so `ScreenshotEncoder` refuses up front).
    pub fn is_minimized(handle: WindowHandle) -> bool {
        unsafe { IsIconic(hwnd_of(handle)) }.as_bool()
    }
}

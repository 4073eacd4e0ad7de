//! The most complex component (spec §4.4): a fullscreen, click-through,
//! oversized-window compositor with an input-driven thread that drags the
//! target window to follow the cursor. Grounded on the original
//! `overlay_window.{hpp,cpp}` for the state machine, window styles, and
//! z-order pinning; the shared shader pipeline lives in `shader_quad.rs` and
//! the window+swapchain pairing lives in `swapchain_window.rs`.
//!
//! Per spec §9 Design Notes, the message-window worker pattern is ported as
//! a channel-of-commands pattern, and the low-level mouse hook is replaced
//! by cursor polling on the window-manager thread's own timer — both
//! substitutions are explicitly sanctioned as behaviorally equivalent.

use std::sync::atomic::{AtomicBool, AtomicIsize, Ordering};
use std::sync::mpsc::{Receiver, Sender};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use parking_lot::Mutex;
use thiserror::Error;

use crate::frame_source::{CaptureError, CapturedFrame, FrameSource};
use crate::geometry::{Position, Size, WindowHandle};
use crate::graphics::graphics_context::{DeviceHandle, GraphicsContext, GraphicsError};
use crate::shader_quad::{QuadPipeline, ShaderError};
use crate::swapchain_window::{self, PresentMode, SwapchainTarget};
use crate::timer::{TimerSlot, CLEANUP_TIMEOUT};
use crate::win_event_hook::{TargetEvent, TargetEventWatcher};

#[derive(Debug, Error)]
pub enum OverlayError {
    #[error(transparent)]
    Graphics(#[from] GraphicsError),
    #[error(transparent)]
    Capture(#[from] CaptureError),
    #[error(transparent)]
    Shader(#[from] ShaderError),
    #[error("overlay is already running")]
    AlreadyRunning,
    #[error("failed to create the overlay window: {0}")]
    WindowCreationFailed(String),
}

pub type OverlayResult<T> = Result<T, OverlayError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayState {
    Stopped,
    Starting,
    Running,
    TearingDown,
}

/// Overlay window size for a target of logical size `logical` on a screen
/// of size `screen` (spec §4.4 "Geometry"): fit-to-height when the target
/// is relatively taller than the screen, fit-to-width otherwise.
pub fn fit_to_screen(logical: Size, screen: Size) -> Size {
    let lhs = logical.width as u64 * screen.height as u64;
    let rhs = screen.width as u64 * logical.height as u64;
    if lhs <= rhs {
        let height = screen.height;
        let width = (screen.height as u64 * logical.width as u64 / logical.height as u64) as u32;
        Size::new(width, height)
    } else {
        let width = screen.width;
        let height = (screen.width as u64 * logical.height as u64 / logical.width as u64) as u32;
        Size::new(width, height)
    }
}

/// Relative position of `cursor` within `overlay_rect`, clamped to `[0,1]^2`.
/// Part of the window-manager thread's panning math (spec §4.4).
fn relative_position(cursor: Position, overlay_origin: Position, overlay_size: Size) -> (f64, f64) {
    let rx = (cursor.x - overlay_origin.x) as f64 / overlay_size.width as f64;
    let ry = (cursor.y - overlay_origin.y) as f64 / overlay_size.height as f64;
    (rx.clamp(0.0, 1.0), ry.clamp(0.0, 1.0))
}

/// `target_xy = -rel * logical_size + cursor_xy` (spec §4.4).
fn pan_target_position(rel: (f64, f64), logical_size: Size, cursor: Position) -> Position {
    Position::new(
        (-rel.0 * logical_size.width as f64) as i32 + cursor.x,
        (-rel.1 * logical_size.height as f64) as i32 + cursor.y,
    )
}

enum WorkerCommand {
    ForegroundChanged,
    Quit,
}

/// Alpha value applied to the target window when the overlay camouflages
/// it: visually invisible but still accepting input (spec §4.4
/// "Target-window camouflage").
const CAMOUFLAGE_ALPHA: u8 = 1;

struct Workers {
    render_thread: Option<JoinHandle<()>>,
    window_manager_thread: Option<JoinHandle<()>>,
    foreground_event_thread: Option<JoinHandle<()>>,
    command_tx: Sender<WorkerCommand>,
}

/// Fullscreen compositor; one instance per overlay "feature" — there's only
/// ever one live overlay in this design since `CoordinationHub` enforces
/// mutual exclusion with `PreviewRenderer`.
pub struct OverlayRenderer {
    graphics: Arc<Mutex<GraphicsContext>>,
    device: Option<DeviceHandle>,
    frame_source: Option<Arc<FrameSource>>,
    state: OverlayState,
    cleanup_timer: TimerSlot,
    workers: Option<Workers>,
    running: Arc<AtomicBool>,
    target: WindowHandle,
    logical_size: Size,
    screen_size: Size,
}

impl OverlayRenderer {
    pub fn new(graphics: Arc<Mutex<GraphicsContext>>, clock: Arc<dyn crate::utils::clock::Clock>) -> Self {
        Self {
            graphics,
            device: None,
            frame_source: None,
            state: OverlayState::Stopped,
            cleanup_timer: TimerSlot::new(clock),
            workers: None,
            running: Arc::new(AtomicBool::new(false)),
            target: WindowHandle(0),
            logical_size: Size::default(),
            screen_size: Size::default(),
        }
    }

    pub fn state(&self) -> OverlayState {
        self.state
    }

    /// `Stopped -> Starting -> Running`. A no-op (returns `Ok(false)`) when
    /// `(logical_w, logical_h)` already fits the screen — the overlay is
    /// unnecessary in that case.
    pub fn start(
        &mut self,
        target: WindowHandle,
        logical_size: Size,
        screen_size: Size,
    ) -> OverlayResult<bool> {
        if self.state == OverlayState::Running {
            return Err(OverlayError::AlreadyRunning);
        }
        if logical_size.width <= screen_size.width && logical_size.height <= screen_size.height {
            log::info!("OverlayRenderer::start: target fits on screen, no-op");
            return Ok(false);
        }

        self.state = OverlayState::Starting;
        self.cleanup_timer.cancel();
        log::info!(
            "OverlayRenderer::start: target={} logical={}x{} screen={}x{}",
            target,
            logical_size.width,
            logical_size.height,
            screen_size.width,
            screen_size.height
        );

        let device = self.graphics.lock().acquire()?;
        let overlay_size = fit_to_screen(logical_size, screen_size);

        let frame_source = Arc::new(FrameSource::new(device.clone()));
        let render_mutex: Arc<Mutex<Option<CapturedFrame>>> = Arc::new(Mutex::new(None));
        {
            let render_mutex = render_mutex.clone();
            frame_source
                .start(target, logical_size, move |frame| {
                    // SRV (or equivalent bind state) is recreated from the
                    // new texture every arrival, under this same mutex the
                    // render thread locks before drawing (spec §4.4
                    // "Rendering"; §9 "Frame-pool texture lifetime").
                    *render_mutex.lock() = Some(frame);
                })
                .map_err(OverlayError::from)?;
        }

        let (command_tx, command_rx) = std::sync::mpsc::channel();
        self.running.store(true, Ordering::SeqCst);
        let overlay_hwnd = Arc::new(AtomicIsize::new(0));

        let render_thread = {
            let running = self.running.clone();
            let render_mutex = render_mutex.clone();
            let device = device.clone();
            let overlay_hwnd = overlay_hwnd.clone();
            std::thread::spawn(move || render_loop(running, render_mutex, device, overlay_size, overlay_hwnd))
        };

        let window_manager_thread = {
            let running = self.running.clone();
            let overlay_hwnd = overlay_hwnd.clone();
            std::thread::spawn(move || {
                window_manager_loop(running, command_rx, target, logical_size, overlay_size, overlay_hwnd)
            })
        };

        let foreground_event_thread = {
            let running = self.running.clone();
            let command_tx = command_tx.clone();
            std::thread::spawn(move || foreground_event_loop(running, target, command_tx))
        };

        apply_camouflage(target);

        self.device = Some(device);
        self.frame_source = Some(frame_source);
        self.target = target;
        self.logical_size = logical_size;
        self.screen_size = screen_size;
        self.workers = Some(Workers {
            render_thread: Some(render_thread),
            window_manager_thread: Some(window_manager_thread),
            foreground_event_thread: Some(foreground_event_thread),
            command_tx,
        });
        self.state = OverlayState::Running;
        Ok(true)
    }

    /// Signals every worker to quit and joins them synchronously; the
    /// session/pool/shader-view are released on their owning threads.
    /// D3D device teardown itself is deferred behind `CLEANUP_TIMEOUT`
    /// (spec §4.4 "Cleanup policy") so a quick restart reuses the device.
    pub fn stop(&mut self) {
        if self.state == OverlayState::Stopped {
            return;
        }
        self.state = OverlayState::TearingDown;
        self.running.store(false, Ordering::SeqCst);

        if let Some(workers) = self.workers.take() {
            let _ = workers.command_tx.send(WorkerCommand::Quit);
            if let Some(handle) = workers.render_thread {
                let _ = handle.join();
            }
            if let Some(handle) = workers.window_manager_thread {
                let _ = handle.join();
            }
            if let Some(handle) = workers.foreground_event_thread {
                let _ = handle.join();
            }
        }

        if let Some(frame_source) = self.frame_source.take() {
            frame_source.stop();
        }
        remove_camouflage(self.target);

        self.cleanup_timer.start(CLEANUP_TIMEOUT);
        self.state = OverlayState::Stopped;
        log::info!("OverlayRenderer::stop: workers joined, device teardown deferred 30s");
    }

    /// Call periodically (e.g. from `CoordinationHub`'s own tick) so the
    /// deferred device teardown actually happens once the grace period
    /// elapses with no intervening `start()`.
    pub fn poll_cleanup(&mut self) {
        if self.cleanup_timer.poll() {
            self.cleanup_timer.acknowledge();
            if self.state == OverlayState::Stopped {
                self.graphics.lock().release_all();
                self.device = None;
                log::info!("OverlayRenderer::poll_cleanup: device released after cleanup timeout");
            }
        }
    }
}

impl Drop for OverlayRenderer {
    fn drop(&mut self) {
        self.stop();
    }
}

const OVERLAY_CLASS_NAME: &str = "RedirectCoreOverlayWindow";

#[cfg(target_os = "windows")]
fn create_overlay_window(overlay_size: Size) -> OverlayResult<windows::Win32::Foundation::HWND> {
    use windows::Win32::UI::WindowsAndMessaging::{
        WS_EX_LAYERED, WS_EX_NOACTIVATE, WS_EX_TOPMOST, WS_EX_TRANSPARENT, WS_POPUP,
    };
    let (hwnd, _handler) = swapchain_window::create_window(
        OVERLAY_CLASS_NAME,
        "",
        WS_EX_LAYERED | WS_EX_TRANSPARENT | WS_EX_TOPMOST | WS_EX_NOACTIVATE,
        WS_POPUP,
        Position::default(),
        overlay_size,
        None,
    )
    .map_err(|err| OverlayError::WindowCreationFailed(err.to_string()))?;
    unsafe {
        let _ = windows::Win32::UI::WindowsAndMessaging::SetLayeredWindowAttributes(
            hwnd,
            windows::Win32::Foundation::COLORREF(0),
            255,
            windows::Win32::UI::WindowsAndMessaging::LWA_ALPHA,
        );
        let _ = windows::Win32::UI::WindowsAndMessaging::ShowWindow(
            hwnd,
            windows::Win32::UI::WindowsAndMessaging::SW_SHOWNOACTIVATE,
        );
    }
    Ok(hwnd)
}

/// Creates the overlay's own click-through `HWND` and swapchain on this
/// thread, then drives present at whatever cadence new frames arrive: each
/// iteration rebinds a shader-resource view onto the latest captured
/// texture, draws the fullscreen quad, and presents with 0 sync interval
/// (VRR-friendly, tears rather than stalls — spec §4.4 "Rendering").
#[cfg(target_os = "windows")]
fn render_loop(
    running: Arc<AtomicBool>,
    render_mutex: Arc<Mutex<Option<CapturedFrame>>>,
    device: DeviceHandle,
    overlay_size: Size,
    overlay_hwnd_slot: Arc<AtomicIsize>,
) {
    let hwnd = match create_overlay_window(overlay_size) {
        Ok(hwnd) => hwnd,
        Err(err) => {
            log::error!("OverlayRenderer::render_loop: window creation failed: {err}");
            return;
        }
    };
    overlay_hwnd_slot.store(hwnd.0 as isize, Ordering::SeqCst);

    let mut target = match SwapchainTarget::new(device.device(), hwnd, overlay_size, PresentMode::FlipDiscard) {
        Ok(target) => target,
        Err(err) => {
            log::error!("OverlayRenderer::render_loop: swapchain creation failed: {err}");
            return;
        }
    };
    let pipeline = match QuadPipeline::new(device.device()) {
        Ok(pipeline) => pipeline,
        Err(err) => {
            log::error!("OverlayRenderer::render_loop: shader pipeline creation failed: {err}");
            return;
        }
    };

    let viewport = windows::Win32::Graphics::Direct3D11::D3D11_VIEWPORT {
        TopLeftX: 0.0,
        TopLeftY: 0.0,
        Width: overlay_size.width as f32,
        Height: overlay_size.height as f32,
        MinDepth: 0.0,
        MaxDepth: 1.0,
    };

    while running.load(Ordering::SeqCst) {
        pump_pending_messages(hwnd);

        let frame = render_mutex.lock().take();
        match frame {
            Some(frame) => {
                let mut srv = None;
                let srv_created =
                    unsafe { device.device().CreateShaderResourceView(&frame.texture, None, Some(&mut srv)) };
                if let (Ok(()), Some(srv)) = (srv_created, srv) {
                    if let Some(rtv) = target.render_target_view() {
                        unsafe {
                            device.context().OMSetRenderTargets(Some(&[Some(rtv.clone())]), None);
                        }
                        pipeline.draw(device.context(), &srv, viewport);
                        target.present(0);
                    }
                }
            }
            None => std::thread::sleep(Duration::from_millis(4)),
        }
    }

    unsafe {
        let _ = windows::Win32::UI::WindowsAndMessaging::DestroyWindow(hwnd);
    }
    overlay_hwnd_slot.store(0, Ordering::SeqCst);
}

#[cfg(target_os = "windows")]
fn pump_pending_messages(hwnd: windows::Win32::Foundation::HWND) {
    use windows::Win32::UI::WindowsAndMessaging::{DispatchMessageW, PeekMessageW, TranslateMessage, MSG, PM_REMOVE};
    let mut msg = MSG::default();
    unsafe {
        while PeekMessageW(&mut msg, Some(hwnd), 0, 0, PM_REMOVE).as_bool() {
            let _ = TranslateMessage(&msg);
            DispatchMessageW(&msg);
        }
    }
}

#[cfg(not(target_os = "windows"))]
fn render_loop(
    running: Arc<AtomicBool>,
    render_mutex: Arc<Mutex<Option<CapturedFrame>>>,
    _device: DeviceHandle,
    _overlay_size: Size,
    _overlay_hwnd_slot: Arc<AtomicIsize>,
) {
    while running.load(Ordering::SeqCst) {
        if render_mutex.lock().take().is_none() {
            std::thread::sleep(Duration::from_millis(4));
        }
    }
}

fn window_manager_loop(
    running: Arc<AtomicBool>,
    commands: Receiver<WorkerCommand>,
    target: WindowHandle,
    logical_size: Size,
    overlay_size: Size,
    overlay_hwnd: Arc<AtomicIsize>,
) {
    // ~60 Hz tick (spec §4.4 "Threads").
    const TICK: Duration = Duration::from_millis(16);
    let mut last_cursor = Position::default();
    while running.load(Ordering::SeqCst) {
        match commands.recv_timeout(TICK) {
            Ok(WorkerCommand::ForegroundChanged) => {
                pin_overlay_above_target(overlay_hwnd.load(Ordering::SeqCst), target);
            }
            Ok(WorkerCommand::Quit) | Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => break,
            Err(std::sync::mpsc::RecvTimeoutError::Timeout) => {}
        }
        if !running.load(Ordering::SeqCst) {
            break;
        }
        let cursor = current_cursor_position();
        if cursor != last_cursor {
            last_cursor = cursor;
            if cursor_within_overlay(cursor, overlay_size) {
                let rel = relative_position(cursor, Position::default(), overlay_size);
                let new_pos = pan_target_position(rel, logical_size, cursor);
                move_target_window(target, new_pos);
            }
        }
    }
}

/// Installs a process-scoped `WinEventHook` via `win_event_hook` and forwards
/// foreground-window switches as `WorkerCommand::ForegroundChanged`; exits
/// its watcher thread as soon as `running` goes false.
fn foreground_event_loop(running: Arc<AtomicBool>, target: WindowHandle, commands: Sender<WorkerCommand>) {
    let mut watcher = TargetEventWatcher::spawn(target, {
        let commands = commands.clone();
        move |event| {
            if event == TargetEvent::ForegroundChanged {
                let _ = commands.send(WorkerCommand::ForegroundChanged);
            }
        }
    });
    while running.load(Ordering::SeqCst) {
        std::thread::sleep(Duration::from_millis(50));
    }
    watcher.stop();
}

#[cfg(target_os = "windows")]
fn current_cursor_position() -> Position {
    use windows::Win32::Foundation::POINT;
    use windows::Win32::UI::WindowsAndMessaging::GetCursorPos;
    let mut point = POINT::default();
    unsafe {
        let _ = GetCursorPos(&mut point);
    }
    Position::new(point.x, point.y)
}

#[cfg(not(target_os = "windows"))]
fn current_cursor_position() -> Position {
    Position::default()
}

fn cursor_within_overlay(cursor: Position, overlay_size: Size) -> bool {
    cursor.x >= 0
        && cursor.y >= 0
        && (cursor.x as u32) < overlay_size.width
        && (cursor.y as u32) < overlay_size.height
}

#[cfg(target_os = "windows")]
fn move_target_window(target: WindowHandle, position: Position) {
    use windows::Win32::Foundation::HWND;
    use windows::Win32::UI::WindowsAndMessaging::{SetWindowPos, SWP_NOACTIVATE, SWP_NOSIZE, SWP_NOZORDER};
    unsafe {
        let _ = SetWindowPos(
            HWND(target.0 as *mut _),
            None,
            position.x,
            position.y,
            0,
            0,
            SWP_NOACTIVATE | SWP_NOSIZE | SWP_NOZORDER,
        );
    }
}

#[cfg(not(target_os = "windows"))]
fn move_target_window(_target: WindowHandle, _position: Position) {}

/// Raises the overlay above the target window and re-inserts the target
/// directly below the overlay in z-order, without activating either —
/// the exact `HWND_TOPMOST`/`SetWindowPos` sequence from the original
/// `overlay_window.cpp`'s `WinEventProc` handler (SPEC_FULL §5, mandatory
/// supplemented feature). `overlay_hwnd_value` is 0 while the render
/// thread's window hasn't been created yet, in which case this is a no-op.
#[cfg(target_os = "windows")]
fn pin_overlay_above_target(overlay_hwnd_value: isize, target: WindowHandle) {
    use windows::Win32::Foundation::HWND;
    use windows::Win32::UI::WindowsAndMessaging::{SetWindowPos, HWND_TOPMOST, SWP_NOACTIVATE, SWP_NOMOVE, SWP_NOSIZE};
    if overlay_hwnd_value == 0 {
        return;
    }
    let overlay_hwnd = HWND(overlay_hwnd_value as *mut _);
    let target_hwnd = HWND(target.0 as *mut _);
    unsafe {
        let _ = SetWindowPos(
            overlay_hwnd,
            Some(HWND_TOPMOST),
            0,
            0,
            0,
            0,
            SWP_NOMOVE | SWP_NOSIZE | SWP_NOACTIVATE,
        );
        let _ = SetWindowPos(
            target_hwnd,
            Some(overlay_hwnd),
            0,
            0,
            0,
            0,
            SWP_NOMOVE | SWP_NOSIZE | SWP_NOACTIVATE,
        );
    }
}

#[cfg(not(target_os = "windows"))]
fn pin_overlay_above_target(_overlay_hwnd_value: isize, _target: WindowHandle) {}

#[cfg(target_os = "windows")]
fn apply_camouflage(target: WindowHandle) {
    use windows::Win32::Foundation::HWND;
    use windows::Win32::UI::WindowsAndMessaging::{
        GetWindowLongPtrW, SetLayeredWindowAttributes, SetWindowLongPtrW, GWL_EXSTYLE, LWA_ALPHA,
        WS_EX_LAYERED,
    };
    unsafe {
        let hwnd = HWND(target.0 as *mut _);
        let ex_style = GetWindowLongPtrW(hwnd, GWL_EXSTYLE) as u32;
        SetWindowLongPtrW(hwnd, GWL_EXSTYLE, (ex_style | WS_EX_LAYERED.0) as isize);
        let _ = SetLayeredWindowAttributes(hwnd, windows::Win32::Foundation::COLORREF(0), CAMOUFLAGE_ALPHA, LWA_ALPHA);
    }
}

#[cfg(not(target_os = "windows"))]
fn apply_camouflage(_target: WindowHandle) {}

/// Removes `LAYERED` and restores the target to its screen-centered client
/// size. Spec §9 flags: if an external tool had set `LAYERED`
/// independently, this strips it too — behavior preserved from the source.
#[cfg(target_os = "windows")]
fn remove_camouflage(target: WindowHandle) {
    use windows::Win32::Foundation::HWND;
    use windows::Win32::UI::WindowsAndMessaging::{GetWindowLongPtrW, SetWindowLongPtrW, GWL_EXSTYLE, WS_EX_LAYERED};
    unsafe {
        let hwnd = HWND(target.0 as *mut _);
        let ex_style = GetWindowLongPtrW(hwnd, GWL_EXSTYLE) as u32;
        SetWindowLongPtrW(hwnd, GWL_EXSTYLE, (ex_style & !WS_EX_LAYERED.0) as isize);
    }
}

#[cfg(not(target_os = "windows"))]
fn remove_camouflage(_target: WindowHandle) {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn e1_overlay_fit_to_height() {
        let overlay = fit_to_screen(Size::new(7680, 4320), Size::new(1920, 1080));
        assert_eq!(overlay, Size::new(1920, 1080));
    }

    #[test]
    fn fit_to_width_when_relatively_wide() {
        // Target 3840x1200 (very wide) on a 1920x1080 screen: fitting to
        // height (1080) would need width 1080*3840/1200=3456 > 1920, so the
        // overlay must fit to width instead.
        let overlay = fit_to_screen(Size::new(3840, 1200), Size::new(1920, 1080));
        assert_eq!(overlay.width, 1920);
        assert_eq!(overlay.height, 1920 * 1200 / 3840);
    }

    #[test]
    fn pan_math_keeps_relative_point_under_cursor() {
        let rel = (0.5, 0.5);
        let pos = pan_target_position(rel, Size::new(2000, 1000), Position::new(960, 540));
        assert_eq!(pos, Position::new(960 - 1000, 540 - 500));
    }
}

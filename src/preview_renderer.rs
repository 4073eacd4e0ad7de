//! A small always-on-top, DPI-aware window showing a miniature of the
//! target plus a viewport indicator (spec §4.5). Window creation follows
//! the same raw-Win32 + per-window swapchain idiom as `OverlayRenderer`
//! (`swapchain_window.rs`), using legacy/sequential present (see
//! `DESIGN.md`'s open-question resolution) since the window is tiny and
//! latency-insensitive; the miniature quad reuses `shader_quad::QuadPipeline`
//! and the viewport outline draws through `shader_quad::LinePipeline`. The
//! viewport/drag math lives in `viewport_rect.rs` and stays host-agnostic.

use std::cell::{Cell, RefCell};
use std::sync::atomic::{AtomicBool, AtomicIsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use parking_lot::Mutex;
use thiserror::Error;

use crate::frame_source::{CaptureError, CapturedFrame, FrameSource};
use crate::geometry::{Position, Rect, Size, WindowHandle};
use crate::graphics::graphics_context::{DeviceHandle, GraphicsContext, GraphicsError};
use crate::shader_quad::{QuadPipeline, ShaderError};
use crate::viewport_rect::{compute_viewport, viewport_drag_to_target_position, ViewportRect};

#[derive(Debug, Error)]
pub enum PreviewError {
    #[error(transparent)]
    Graphics(#[from] GraphicsError),
    #[error(transparent)]
    Capture(#[from] CaptureError),
    #[error(transparent)]
    Shader(#[from] ShaderError),
    #[error("failed to create the preview window: {0}")]
    WindowCreationFailed(String),
}

pub type PreviewResult<T> = Result<T, PreviewError>;

/// Base chrome metrics at 96 DPI (spec §4.5 "Window geometry and DPI").
pub const BASE_TITLE_BAR_PX: f64 = 24.0;
pub const BASE_FONT_PX: f64 = 12.0;
pub const BASE_RESIZE_BORDER_PX: f64 = 8.0;

#[derive(Debug, Clone, Copy)]
pub struct ChromeMetrics {
    pub title_bar: f64,
    pub font_size: f64,
    pub resize_border: f64,
}

impl ChromeMetrics {
    /// Scaled linearly from the 96-DPI base metrics on DPI-change events.
    pub fn at_scale(scale_factor: f64) -> Self {
        Self {
            title_bar: BASE_TITLE_BAR_PX * scale_factor,
            font_size: BASE_FONT_PX * scale_factor,
            resize_border: BASE_RESIZE_BORDER_PX * scale_factor,
        }
    }
}

/// `ideal_size` is clamped to `[screen_min/10, screen_max]`.
pub fn clamp_ideal_size(ideal_size: f64, screen: Size) -> f64 {
    let screen_min = screen.width.min(screen.height) as f64;
    let screen_max = screen.width.max(screen.height) as f64;
    ideal_size.clamp(screen_min / 10.0, screen_max)
}

/// Client size for a preview window at `ideal_size`, respecting `aspect`:
/// `max(w,h) == ideal_size`; the larger axis is whichever the aspect ratio
/// implies (width when `aspect >= 1`, height otherwise).
pub fn client_size_for(ideal_size: f64, aspect: f64) -> Size {
    if aspect >= 1.0 {
        Size::new(ideal_size.round() as u32, (ideal_size / aspect).round() as u32)
    } else {
        Size::new((ideal_size * aspect).round() as u32, ideal_size.round() as u32)
    }
}

/// Wheel zoom: scales `ideal_size` by `1 + 0.1*notches`, keeping the point
/// under the cursor stationary. Returns the new `ideal_size` and the
/// window top-left adjustment needed to hold `cursor_in_window` fixed.
pub fn wheel_zoom(
    ideal_size: f64,
    notches: i32,
    screen: Size,
    window_top_left: Position,
    cursor_in_window: Position,
) -> (f64, Position) {
    let factor = 1.0 + 0.1 * notches as f64;
    let new_ideal = clamp_ideal_size(ideal_size * factor, screen);
    let scale = new_ideal / ideal_size;
    let new_top_left = Position::new(
        window_top_left.x + cursor_in_window.x - (cursor_in_window.x as f64 * scale).round() as i32,
        window_top_left.y + cursor_in_window.y - (cursor_in_window.y as f64 * scale).round() as i32,
    );
    (new_ideal, new_top_left)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DragKind {
    Window,
    Viewport,
}

#[derive(Debug, Clone, Copy)]
struct DragState {
    kind: DragKind,
    offset: (f64, f64),
}

/// Pointer-event classification (spec §4.5 "Pointer behavior"). Pure
/// decision logic, kept separate from the actual window-message plumbing so
/// it is directly testable.
pub struct PointerRouter {
    drag: Option<DragState>,
}

impl PointerRouter {
    pub fn new() -> Self {
        Self { drag: None }
    }

    /// Call on left-button-down. `in_title_bar` / `viewport` / click
    /// position are all in preview-local coordinates.
    pub fn on_left_down(
        &mut self,
        position: (f64, f64),
        in_title_bar: bool,
        viewport: Option<ViewportRect>,
        preview: Size,
        target_rect: Rect,
    ) -> Option<Position> {
        if in_title_bar {
            self.drag = Some(DragState { kind: DragKind::Window, offset: position });
            return None;
        }
        match viewport {
            None => {
                self.drag = Some(DragState { kind: DragKind::Window, offset: position });
                None
            }
            Some(rect) => {
                let inside = position.0 >= rect.top_left.0
                    && position.0 <= rect.top_left.0 + rect.size.0
                    && position.1 >= rect.top_left.1
                    && position.1 <= rect.top_left.1 + rect.size.1;
                if inside {
                    let offset = (position.0 - rect.top_left.0, position.1 - rect.top_left.1);
                    self.drag = Some(DragState { kind: DragKind::Viewport, offset });
                    None
                } else {
                    // Recenter the target so the clicked point becomes the
                    // screen center, then start a viewport drag from there.
                    self.drag = Some(DragState { kind: DragKind::Viewport, offset: (0.0, 0.0) });
                    Some(recenter_on_click(position, preview, target_rect))
                }
            }
        }
    }

    /// Call on pointer move while a drag is active. Returns a new target
    /// top-left when dragging the viewport, or `None` when dragging the
    /// preview window itself (an OS-level window move, not a target move).
    pub fn on_move(&self, cursor: (f64, f64), preview: Size, target_size: Size) -> Option<Position> {
        match self.drag {
            Some(DragState { kind: DragKind::Viewport, offset }) => {
                Some(viewport_drag_to_target_position(cursor, offset, preview, target_size))
            }
            _ => None,
        }
    }

    pub fn on_left_up(&mut self) {
        self.drag = None;
    }

    fn is_dragging_window(&self) -> bool {
        matches!(self.drag, Some(DragState { kind: DragKind::Window, .. }))
    }
}

impl Default for PointerRouter {
    fn default() -> Self {
        Self::new()
    }
}

fn recenter_on_click(click: (f64, f64), preview: Size, target_rect: Rect) -> Position {
    let scale_x = target_rect.width as f64 / preview.width as f64;
    let scale_y = target_rect.height as f64 / preview.height as f64;
    // The clicked point, in target-local coordinates, should land at the
    // screen center; approximate the screen center via the current target
    // rect's own center-to-origin offset (caller supplies the real screen
    // size in the full wiring — this pure helper keeps the scale math
    // testable independent of screen size).
    Position::new(
        target_rect.left + (click.0 * scale_x).round() as i32,
        target_rect.top + (click.1 * scale_y).round() as i32,
    )
}

/// Live per-window state the raw window-proc handler mutates on the
/// preview's own thread. `Cell`/`RefCell`, not atomics — everything here is
/// only ever touched from the single thread that owns this window.
struct LiveState {
    pointer: RefCell<PointerRouter>,
    target_rect: Cell<Rect>,
    preview_size: Cell<Size>,
    ideal_size: Cell<f64>,
    screen_size: Size,
    aspect: f64,
    target: WindowHandle,
}

const PREVIEW_CLASS_NAME: &str = "RedirectCorePreviewWindow";

/// Holds the render thread, the window handle it owns, and the
/// latest-known `ideal_size` (carried across stop/start cycles so a toggle
/// off/on doesn't reset the user's zoom level).
pub struct PreviewRenderer {
    graphics: Arc<Mutex<GraphicsContext>>,
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
    window_hwnd: Arc<AtomicIsize>,
    ideal_size: f64,
}

impl PreviewRenderer {
    pub fn new(graphics: Arc<Mutex<GraphicsContext>>) -> Self {
        Self {
            graphics,
            running: Arc::new(AtomicBool::new(false)),
            thread: None,
            window_hwnd: Arc::new(AtomicIsize::new(0)),
            ideal_size: 0.0,
        }
    }

    pub fn is_running(&self) -> bool {
        self.thread.is_some()
    }

    /// Starts the preview window/render thread for `target`, whose current
    /// screen rect is `target_rect`. `ideal_size` defaults to
    /// `clamp_ideal_size(screen_min * 0.3, screen)` the first time this is
    /// called; later calls reuse whatever zoom level the user last set.
    pub fn start(
        &mut self,
        target: WindowHandle,
        target_rect: Rect,
        screen_size: Size,
    ) -> PreviewResult<()> {
        self.stop();

        let aspect = if target_rect.height == 0 { 16.0 / 9.0 } else { target_rect.size().aspect() };
        if self.ideal_size <= 0.0 {
            self.ideal_size = clamp_ideal_size(screen_size.width.min(screen_size.height) as f64 * 0.3, screen_size);
        }
        let ideal_size = self.ideal_size;

        let device = self.graphics.lock().acquire()?;
        self.running.store(true, Ordering::SeqCst);
        let running = self.running.clone();
        let window_hwnd = self.window_hwnd.clone();

        let thread = std::thread::spawn(move || {
            preview_thread_main(running, window_hwnd, device, target, target_rect, screen_size, aspect, ideal_size);
        });
        self.thread = Some(thread);
        Ok(())
    }

    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
        self.window_hwnd.store(0, Ordering::SeqCst);
    }
}

impl Drop for PreviewRenderer {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(target_os = "windows")]
fn preview_thread_main(
    running: Arc<AtomicBool>,
    window_hwnd_slot: Arc<AtomicIsize>,
    device: DeviceHandle,
    target: WindowHandle,
    target_rect: Rect,
    screen_size: Size,
    aspect: f64,
    ideal_size: f64,
) {
    use crate::shader_quad::{viewport_outline_vertices, LinePipeline};
    use crate::swapchain_window::{self, PresentMode, SwapchainTarget, WndProcHandler};
    use windows::Win32::Foundation::LRESULT;
    use windows::Win32::Graphics::Direct3D11::D3D11_VIEWPORT;
    use windows::Win32::UI::WindowsAndMessaging::{
        DispatchMessageW, GetClientRect, PeekMessageW, TranslateMessage, MSG, PM_REMOVE, SW_SHOWNOACTIVATE,
        WS_EX_TOPMOST, WS_POPUP, WS_THICKFRAME,
    };

    let initial_size = client_size_for(ideal_size, aspect);
    let state = Arc::new(LiveState {
        pointer: RefCell::new(PointerRouter::new()),
        target_rect: Cell::new(target_rect),
        preview_size: Cell::new(initial_size),
        ideal_size: Cell::new(ideal_size),
        screen_size,
        aspect,
        target,
    });

    let handler_state = state.clone();
    let handler = WndProcHandler::new(move |hwnd, msg, wparam, lparam| -> Option<LRESULT> {
        preview_wndproc(hwnd, msg, wparam, lparam, &handler_state)
    });

    let (hwnd, _handler) = match swapchain_window::create_window(
        PREVIEW_CLASS_NAME,
        "Preview",
        WS_EX_TOPMOST,
        WS_POPUP | WS_THICKFRAME,
        Position::default(),
        initial_size,
        Some(handler),
    ) {
        Ok(created) => created,
        Err(err) => {
            log::error!("PreviewRenderer: window creation failed: {err}");
            return;
        }
    };
    window_hwnd_slot.store(hwnd.0 as isize, Ordering::SeqCst);
    unsafe {
        let _ = windows::Win32::UI::WindowsAndMessaging::ShowWindow(hwnd, SW_SHOWNOACTIVATE);
    }

    let mut swap_target = match SwapchainTarget::new(device.device(), hwnd, initial_size, PresentMode::Sequential) {
        Ok(target) => target,
        Err(err) => {
            log::error!("PreviewRenderer: swapchain creation failed: {err}");
            return;
        }
    };
    let quad = match QuadPipeline::new(device.device()) {
        Ok(pipeline) => pipeline,
        Err(err) => {
            log::error!("PreviewRenderer: quad pipeline creation failed: {err}");
            return;
        }
    };
    let line = match LinePipeline::new(device.device(), 5) {
        Ok(pipeline) => pipeline,
        Err(err) => {
            log::error!("PreviewRenderer: line pipeline creation failed: {err}");
            return;
        }
    };

    let render_mutex: Arc<Mutex<Option<CapturedFrame>>> = Arc::new(Mutex::new(None));
    let frame_source = FrameSource::new(device.clone());
    {
        let render_mutex = render_mutex.clone();
        let _ = frame_source.start(target, target_rect.size(), move |frame| {
            *render_mutex.lock() = Some(frame);
        });
    }

    while running.load(Ordering::SeqCst) {
        let mut msg = MSG::default();
        unsafe {
            while PeekMessageW(&mut msg, Some(hwnd), 0, 0, PM_REMOVE).as_bool() {
                let _ = TranslateMessage(&msg);
                DispatchMessageW(&msg);
            }
        }

        let mut client_rect = Default::default();
        unsafe {
            let _ = GetClientRect(hwnd, &mut client_rect);
        }
        let current_size = Size::new(
            (client_rect.right - client_rect.left).max(1) as u32,
            (client_rect.bottom - client_rect.top).max(1) as u32,
        );
        if current_size != state.preview_size.get() {
            state.preview_size.set(current_size);
            if let Err(err) = swap_target.resize(device.device(), device.context(), current_size) {
                log::error!("PreviewRenderer: swapchain resize failed: {err}");
            }
        }

        let frame = render_mutex.lock().take();
        if let Some(frame) = frame {
            let mut srv = None;
            let created = unsafe { device.device().CreateShaderResourceView(&frame.texture, None, Some(&mut srv)) };
            if let (Ok(()), Some(srv), Some(rtv)) = (created, srv, swap_target.render_target_view()) {
                let viewport = D3D11_VIEWPORT {
                    TopLeftX: 0.0,
                    TopLeftY: 0.0,
                    Width: current_size.width as f32,
                    Height: current_size.height as f32,
                    MinDepth: 0.0,
                    MaxDepth: 1.0,
                };
                unsafe {
                    device.context().OMSetRenderTargets(Some(&[Some(rtv.clone())]), None);
                }
                quad.draw(device.context(), &srv, viewport);

                if let Some(outline) = compute_viewport(current_size, state.target_rect.get(), state.screen_size) {
                    let vertices = viewport_outline_vertices(
                        outline.top_left,
                        outline.size,
                        (current_size.width as f64, current_size.height as f64),
                        [1.0, 0.85, 0.1, 1.0],
                    );
                    line.draw(device.context(), &vertices, viewport);
                }
                swap_target.present(1);
            }
        } else {
            std::thread::sleep(Duration::from_millis(8));
        }
    }

    frame_source.stop();
    unsafe {
        let _ = windows::Win32::UI::WindowsAndMessaging::DestroyWindow(hwnd);
    }
    window_hwnd_slot.store(0, Ordering::SeqCst);
}

#[cfg(target_os = "windows")]
fn preview_wndproc(
    hwnd: windows::Win32::Foundation::HWND,
    msg: u32,
    wparam: windows::Win32::Foundation::WPARAM,
    lparam: windows::Win32::Foundation::LPARAM,
    state: &LiveState,
) -> Option<windows::Win32::Foundation::LRESULT> {
    use windows::Win32::Foundation::{LRESULT, POINT};
    use windows::Win32::UI::WindowsAndMessaging::{
        PostQuitMessage, ScreenToClient, SetWindowPos, HTCAPTION, SWP_NOACTIVATE, SWP_NOZORDER, WM_DESTROY,
        WM_LBUTTONDOWN, WM_LBUTTONUP, WM_MOUSEMOVE, WM_MOUSEWHEEL, WM_NCHITTEST,
    };

    let loword = |v: isize| (v & 0xffff) as i16 as i32;
    let hiword = |v: isize| ((v >> 16) & 0xffff) as i16 as i32;

    match msg {
        WM_NCHITTEST => {
            let mut point = POINT { x: loword(lparam.0), y: hiword(lparam.0) };
            unsafe {
                let _ = ScreenToClient(hwnd, &mut point);
            }
            let metrics = ChromeMetrics::at_scale(1.0);
            if (point.y as f64) < metrics.title_bar {
                return Some(LRESULT(HTCAPTION as isize));
            }
            None
        }
        WM_LBUTTONDOWN => {
            let position = (loword(lparam.0) as f64, hiword(lparam.0) as f64);
            let preview = state.preview_size.get();
            let viewport = compute_viewport(preview, state.target_rect.get(), state.screen_size);
            let metrics = ChromeMetrics::at_scale(1.0);
            let in_title_bar = position.1 < metrics.title_bar;
            let moved = state.pointer.borrow_mut().on_left_down(
                position,
                in_title_bar,
                viewport,
                preview,
                state.target_rect.get(),
            );
            if let Some(new_pos) = moved {
                apply_target_position(state, new_pos);
            }
            Some(LRESULT(0))
        }
        WM_MOUSEMOVE => {
            let position = (loword(lparam.0) as f64, hiword(lparam.0) as f64);
            let preview = state.preview_size.get();
            let dragging_window = state.pointer.borrow().is_dragging_window();
            if dragging_window {
                return None;
            }
            let moved = state.pointer.borrow().on_move(position, preview, state.target_rect.get().size());
            if let Some(new_pos) = moved {
                apply_target_position(state, new_pos);
            }
            Some(LRESULT(0))
        }
        WM_LBUTTONUP => {
            state.pointer.borrow_mut().on_left_up();
            Some(LRESULT(0))
        }
        WM_MOUSEWHEEL => {
            let notches = (hiword(wparam.0 as isize)) / windows::Win32::UI::WindowsAndMessaging::WHEEL_DELTA as i32;
            let mut cursor = POINT::default();
            unsafe {
                let _ = windows::Win32::UI::WindowsAndMessaging::GetCursorPos(&mut cursor);
                let _ = ScreenToClient(hwnd, &mut cursor);
            }
            let mut rect = Default::default();
            unsafe {
                let _ = windows::Win32::UI::WindowsAndMessaging::GetWindowRect(hwnd, &mut rect);
            }
            let (new_ideal, new_top_left) = wheel_zoom(
                state.ideal_size.get(),
                notches,
                state.screen_size,
                Position::new(rect.left, rect.top),
                Position::new(cursor.x, cursor.y),
            );
            state.ideal_size.set(new_ideal);
            let new_client_size = client_size_for(new_ideal, state.aspect);
            unsafe {
                let _ = SetWindowPos(
                    hwnd,
                    None,
                    new_top_left.x,
                    new_top_left.y,
                    new_client_size.width as i32,
                    new_client_size.height as i32,
                    SWP_NOACTIVATE | SWP_NOZORDER,
                );
            }
            Some(LRESULT(0))
        }
        WM_DESTROY => {
            unsafe { PostQuitMessage(0) };
            Some(LRESULT(0))
        }
        _ => None,
    }
}

#[cfg(target_os = "windows")]
fn apply_target_position(state: &LiveState, new_position: Position) {
    let current = state.target_rect.get();
    let new_rect = Rect::new(new_position.x, new_position.y, current.width, current.height);
    state.target_rect.set(new_rect);
    unsafe {
        use windows::Win32::Foundation::HWND;
        use windows::Win32::UI::WindowsAndMessaging::{SetWindowPos, SWP_NOACTIVATE, SWP_NOSIZE, SWP_NOZORDER};
        let _ = SetWindowPos(
            HWND(state.target.0 as *mut _),
            None,
            new_position.x,
            new_position.y,
            0,
            0,
            SWP_NOACTIVATE | SWP_NOSIZE | SWP_NOZORDER,
        );
    }
}

#[cfg(not(target_os = "windows"))]
fn preview_thread_main(
    running: Arc<AtomicBool>,
    _window_hwnd_slot: Arc<AtomicIsize>,
    _device: DeviceHandle,
    _target: WindowHandle,
    _target_rect: Rect,
    _screen_size: Size,
    _aspect: f64,
    _ideal_size: f64,
) {
    while running.load(Ordering::SeqCst) {
        std::thread::sleep(Duration::from_millis(16));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn e4_wheel_zoom() {
        // E4: ideal_size 540, wheel up one notch, cursor at window top-left.
        let (new_size, new_top_left) = wheel_zoom(
            540.0,
            1,
            Size::new(1920, 1080),
            Position::new(100, 100),
            Position::new(0, 0),
        );
        assert_eq!(new_size, 594.0);
        assert_eq!(new_top_left, Position::new(100, 100));
    }

    #[test]
    fn ideal_size_clamped_to_screen_bounds() {
        let screen = Size::new(1920, 1080);
        assert_eq!(clamp_ideal_size(10.0, screen), 108.0);
        assert_eq!(clamp_ideal_size(5000.0, screen), 1920.0);
    }

    #[test]
    fn client_size_respects_aspect() {
        let size = client_size_for(540.0, 16.0 / 9.0);
        assert_eq!(size.width, 540);
        assert_eq!(size.height, (540.0 / (16.0 / 9.0)).round() as u32);
    }

    #[test]
    fn viewport_drag_updates_target_position() {
        let mut router = PointerRouter::new();
        let preview = Size::new(400, 225);
        let target_rect = Rect::new(-960, -540, 3840, 2160);
        let viewport = compute_viewport(preview, target_rect, Size::new(1920, 1080)).unwrap();
        router.on_left_down((viewport.top_left.0, viewport.top_left.1), false, Some(viewport), preview, target_rect);
        let moved = router.on_move((0.0, 0.0), preview, target_rect.size());
        assert_eq!(moved, Some(Position::new(0, 0)));
    }
}

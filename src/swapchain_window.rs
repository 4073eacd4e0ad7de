//! Raw Win32 window creation paired with a per-window `IDXGISwapChain1`,
//! shared by `OverlayRenderer` and `PreviewRenderer` — both draw through
//! `shader_quad::QuadPipeline`/`LinePipeline` onto their own back buffer.
//! Grounded on `hdrcapture`'s `d3d11.rs` swapchain setup and the original
//! `overlay_window.cpp`'s `RegisterClassExW`/`CreateWindowExW` pair; the
//! window and its swapchain are both created on the thread that renders to
//! them, matching the single-thread-owns-its-GPU-resources rule documented
//! in `graphics_context.rs`.

use std::sync::Mutex;

use thiserror::Error;
use windows::core::PCWSTR;
use windows::Win32::Foundation::{HWND, LPARAM, LRESULT, WPARAM};
use windows::Win32::Graphics::Direct3D11::{ID3D11Device, ID3D11RenderTargetView, ID3D11Texture2D};
use windows::Win32::Graphics::Dxgi::Common::{DXGI_FORMAT_B8G8R8A8_UNORM, DXGI_SAMPLE_DESC};
use windows::Win32::Graphics::Dxgi::{
    CreateDXGIFactory1, IDXGIDevice, IDXGIFactory2, IDXGISwapChain1, DXGI_SCALING_STRETCH,
    DXGI_SWAP_CHAIN_DESC1, DXGI_SWAP_EFFECT_SEQUENTIAL, DXGI_USAGE_RENDER_TARGET_OUTPUT,
};
use windows::Win32::Graphics::Gdi::HBRUSH;
use windows::Win32::UI::WindowsAndMessaging::{
    CreateWindowExW, DefWindowProcW, GetWindowLongPtrW, RegisterClassExW, SetWindowLongPtrW, CREATESTRUCTW,
    CW_USEDEFAULT, GWLP_USERDATA, HCURSOR, HICON, WINDOW_EX_STYLE, WINDOW_STYLE, WM_NCCREATE, WNDCLASSEXW,
};

use crate::geometry::{Position, Size};

#[derive(Debug, Error)]
pub enum SwapchainWindowError {
    #[error("window registration/creation failed: {0}")]
    WindowCreationFailed(windows::core::Error),
    #[error("swapchain creation failed: {0}")]
    SwapchainCreationFailed(windows::core::Error),
}

pub type SwapchainWindowResult<T> = Result<T, SwapchainWindowError>;

/// Whether a swapchain should request `FLIP_DISCARD` (overlay: full-screen,
/// latency-sensitive) or legacy `SEQUENTIAL` (preview: tiny, always-on-top,
/// avoids an extra intermediate buffer — see `DESIGN.md`'s open-question
/// resolution).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentMode {
    FlipDiscard,
    Sequential,
}

unsafe extern "system" fn raw_wndproc(hwnd: HWND, msg: u32, wparam: WPARAM, lparam: LPARAM) -> LRESULT {
    if msg == WM_NCCREATE {
        let create_struct = lparam.0 as *const CREATESTRUCTW;
        if !create_struct.is_null() {
            SetWindowLongPtrW(hwnd, GWLP_USERDATA, (*create_struct).lpCreateParams as isize);
        }
        return DefWindowProcW(hwnd, msg, wparam, lparam);
    }

    let user_data = GetWindowLongPtrW(hwnd, GWLP_USERDATA);
    if user_data != 0 {
        let handler = &*(user_data as *const WndProcHandler);
        if let Some(result) = (handler.callback)(hwnd, msg, wparam, lparam) {
            return result;
        }
    }
    DefWindowProcW(hwnd, msg, wparam, lparam)
}

/// Boxed message-handler stashed in `GWLP_USERDATA`; returning `None` falls
/// through to `DefWindowProcW`. Used by `PreviewRenderer` to route pointer
/// messages into `PointerRouter` without a thread-local (the handle is
/// per-window, not per-thread).
pub struct WndProcHandler {
    callback: Box<dyn Fn(HWND, u32, WPARAM, LPARAM) -> Option<LRESULT>>,
}

impl WndProcHandler {
    pub fn new(callback: impl Fn(HWND, u32, WPARAM, LPARAM) -> Option<LRESULT> + 'static) -> Box<Self> {
        Box::new(Self { callback: Box::new(callback) })
    }
}

/// Each window class in this crate (overlay, preview, letterbox) has a
/// distinct name, so registration is keyed by name rather than gated behind
/// a single `Once` — otherwise only the first caller across the whole
/// process would ever get its class registered.
fn register_class_once(class_name: &str, class_wide: &[u16], background: Option<HBRUSH>) {
    static REGISTERED: Mutex<Vec<String>> = Mutex::new(Vec::new());
    let mut registered = REGISTERED.lock().unwrap();
    if registered.iter().any(|name| name == class_name) {
        return;
    }
    unsafe {
        let wc = WNDCLASSEXW {
            cbSize: std::mem::size_of::<WNDCLASSEXW>() as u32,
            lpfnWndProc: Some(raw_wndproc),
            lpszClassName: PCWSTR(class_wide.as_ptr()),
            hCursor: HCURSOR::default(),
            hIcon: HICON::default(),
            hbrBackground: background.unwrap_or_default(),
            ..Default::default()
        };
        RegisterClassExW(&wc);
    }
    registered.push(class_name.to_string());
}

fn wide(s: &str) -> Vec<u16> {
    s.encode_utf16().chain(std::iter::once(0)).collect()
}

/// Creates a (possibly invisible, possibly layered/click-through) top-level
/// window, registering its window class on first use. `handler`, if given,
/// is boxed and stashed in `GWLP_USERDATA` so `raw_wndproc` can route
/// messages to it; it must outlive the window (the caller keeps it alive
/// alongside the `HWND`, e.g. in the same render-thread stack frame).
pub fn create_window(
    class_name: &str,
    title: &str,
    ex_style: WINDOW_EX_STYLE,
    style: WINDOW_STYLE,
    origin: Position,
    size: Size,
    handler: Option<Box<WndProcHandler>>,
) -> SwapchainWindowResult<(HWND, Option<Box<WndProcHandler>>)> {
    create_window_with_background(class_name, title, ex_style, style, origin, size, handler, None)
}

/// Same as [`create_window`], but lets the caller register the class with a
/// custom background brush (the letterbox backdrop's solid black fill).
pub fn create_window_with_background(
    class_name: &str,
    title: &str,
    ex_style: WINDOW_EX_STYLE,
    style: WINDOW_STYLE,
    origin: Position,
    size: Size,
    handler: Option<Box<WndProcHandler>>,
    background: Option<HBRUSH>,
) -> SwapchainWindowResult<(HWND, Option<Box<WndProcHandler>>)> {
    let class_wide = wide(class_name);
    register_class_once(class_name, &class_wide, background);
    let title_wide = wide(title);

    let user_data = handler
        .as_ref()
        .map(|h| h.as_ref() as *const WndProcHandler as *mut std::ffi::c_void)
        .unwrap_or(std::ptr::null_mut());

    let hwnd = unsafe {
        CreateWindowExW(
            ex_style,
            PCWSTR(class_wide.as_ptr()),
            PCWSTR(title_wide.as_ptr()),
            style,
            origin.x,
            origin.y,
            size.width as i32,
            size.height as i32,
            None,
            None,
            None,
            Some(user_data),
        )
    }
    .map_err(SwapchainWindowError::WindowCreationFailed)?;

    Ok((hwnd, handler))
}

/// Unused by most windows, kept for callers that want `CW_USEDEFAULT`
/// positioning (the letterbox backdrop, centered-fullscreen overlay).
pub const USE_DEFAULT_POSITION: Position = Position { x: CW_USEDEFAULT, y: CW_USEDEFAULT };

pub struct SwapchainTarget {
    swapchain: IDXGISwapChain1,
    render_target_view: Option<ID3D11RenderTargetView>,
    size: Size,
}

impl SwapchainTarget {
    pub fn new(device: &ID3D11Device, hwnd: HWND, size: Size, mode: PresentMode) -> SwapchainWindowResult<Self> {
        let dxgi_device: IDXGIDevice = device.cast().map_err(SwapchainWindowError::SwapchainCreationFailed)?;
        let adapter = unsafe { dxgi_device.GetAdapter() }.map_err(SwapchainWindowError::SwapchainCreationFailed)?;
        let factory: IDXGIFactory2 = unsafe { adapter.GetParent() }
            .or_else(|_: windows::core::Error| unsafe { CreateDXGIFactory1() })
            .map_err(SwapchainWindowError::SwapchainCreationFailed)?;

        let swap_effect = match mode {
            PresentMode::FlipDiscard => windows::Win32::Graphics::Dxgi::DXGI_SWAP_EFFECT_FLIP_DISCARD,
            PresentMode::Sequential => DXGI_SWAP_EFFECT_SEQUENTIAL,
        };
        let buffer_count = match mode {
            PresentMode::FlipDiscard => 2,
            PresentMode::Sequential => 1,
        };

        let desc = DXGI_SWAP_CHAIN_DESC1 {
            Width: size.width,
            Height: size.height,
            Format: DXGI_FORMAT_B8G8R8A8_UNORM,
            SampleDesc: DXGI_SAMPLE_DESC { Count: 1, Quality: 0 },
            BufferUsage: DXGI_USAGE_RENDER_TARGET_OUTPUT,
            BufferCount: buffer_count,
            Scaling: DXGI_SCALING_STRETCH,
            SwapEffect: swap_effect,
            ..Default::default()
        };

        let swapchain = unsafe { factory.CreateSwapChainForHwnd(device, hwnd, &desc, None, None) }
            .map_err(SwapchainWindowError::SwapchainCreationFailed)?;

        let mut target = Self { swapchain, render_target_view: None, size };
        target.rebuild_render_target(device)?;
        Ok(target)
    }

    fn rebuild_render_target(&mut self, device: &ID3D11Device) -> SwapchainWindowResult<()> {
        let back_buffer: ID3D11Texture2D =
            unsafe { self.swapchain.GetBuffer(0) }.map_err(SwapchainWindowError::SwapchainCreationFailed)?;
        let mut rtv = None;
        unsafe { device.CreateRenderTargetView(&back_buffer, None, Some(&mut rtv)) }
            .map_err(SwapchainWindowError::SwapchainCreationFailed)?;
        self.render_target_view = rtv;
        Ok(())
    }

    pub fn render_target_view(&self) -> Option<&ID3D11RenderTargetView> {
        self.render_target_view.as_ref()
    }

    pub fn size(&self) -> Size {
        self.size
    }

    /// Drops the render target view (must be unbound from the pipeline
    /// first), resizes the swapchain buffers, and rebuilds the view.
    pub fn resize(&mut self, device: &ID3D11Device, context: &windows::Win32::Graphics::Direct3D11::ID3D11DeviceContext, size: Size) -> SwapchainWindowResult<()> {
        if size == self.size {
            return Ok(());
        }
        self.render_target_view = None;
        unsafe { context.OMSetRenderTargets(None, None) };
        unsafe { self.swapchain.ResizeBuffers(0, size.width, size.height, DXGI_FORMAT_B8G8R8A8_UNORM, windows::Win32::Graphics::Dxgi::DXGI_SWAP_CHAIN_FLAG(0)) }
            .map_err(SwapchainWindowError::SwapchainCreationFailed)?;
        self.size = size;
        self.rebuild_render_target(device)
    }

    /// `sync_interval` 0 is VRR-friendly tearing-capable present (overlay);
    /// 1 is vsync-paced (preview, where tearing would be visible at such a
    /// small size and latency headroom is ample).
    pub fn present(&self, sync_interval: u32) {
        unsafe {
            let _ = self.swapchain.Present(sync_interval, windows::Win32::Graphics::Dxgi::DXGI_PRESENT(0));
        }
    }
}

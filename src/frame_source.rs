//! Subscribes to one target window's composition stream and delivers
//! per-frame GPU textures to a callback (spec §4.2). Grounded on
//! `hdrcapture`'s `capture/wgc.rs` for the Windows.Graphics.Capture
//! plumbing (capture item from `HWND`, frame pool, frame-arrived event),
//! simplified to this spec's BGRA8-only, no-HDR, single-buffer pool.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;
use windows::core::Interface;
use windows::Foundation::TypedEventHandler;
use windows::Graphics::Capture::{
    Direct3D11CaptureFrame, Direct3D11CaptureFramePool, GraphicsCaptureItem,
    GraphicsCaptureSession,
};
use windows::Graphics::DirectX::Direct3D11::IDirect3DDevice;
use windows::Graphics::DirectX::DirectXPixelFormat;
use windows::Win32::Foundation::HWND;
use windows::Win32::Graphics::Direct3D11::ID3D11Texture2D;
use windows::Win32::Graphics::Dxgi::IDXGIDevice;
use windows::Win32::System::WinRT::Direct3D11::{
    CreateDirect3D11DeviceFromDXGIDevice, IDirect3DDxgiInterfaceAccess,
};
use windows::Win32::System::WinRT::Graphics::Capture::IGraphicsCaptureItemInterop;

use crate::geometry::{Size, WindowHandle};
use crate::graphics::graphics_context::DeviceHandle;

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("window composition capture is not supported on this OS build")]
    UnsupportedCaptureApi,
    #[error("failed to create a capture item for the window: {0}")]
    CaptureItemCreationFailed(windows::core::Error),
    #[error("failed to create the capture session: {0}")]
    SessionCreationFailed(windows::core::Error),
    #[error("target window handle is no longer valid")]
    WindowInvalid,
}

pub type CaptureResult<T> = Result<T, CaptureError>;

/// A GPU-resident BGRA8 texture owned by the frame pool. Valid only until
/// the next `FrameArrived` callback rotates the pool (spec §3
/// `CapturedFrame`): consumers must render from it synchronously, or
/// re-create their shader-resource view every time this arrives.
pub struct CapturedFrame {
    pub texture: ID3D11Texture2D,
    pub size: Size,
}

fn d3d_device_from_handle(device: &DeviceHandle) -> CaptureResult<IDirect3DDevice> {
    let dxgi_device: IDXGIDevice = device
        .device()
        .cast()
        .map_err(CaptureError::CaptureItemCreationFailed)?;
    unsafe { CreateDirect3D11DeviceFromDXGIDevice(&dxgi_device) }
        .map_err(CaptureError::CaptureItemCreationFailed)
}

fn capture_item_for_window(hwnd: HWND) -> CaptureResult<GraphicsCaptureItem> {
    let interop: IGraphicsCaptureItemInterop =
        windows::core::factory::<GraphicsCaptureItem, IGraphicsCaptureItemInterop>()
            .map_err(CaptureError::CaptureItemCreationFailed)?;
    unsafe { interop.CreateForWindow(hwnd) }.map_err(CaptureError::CaptureItemCreationFailed)
}

fn texture_from_frame(frame: &Direct3D11CaptureFrame) -> CaptureResult<ID3D11Texture2D> {
    let surface = frame
        .Surface()
        .map_err(CaptureError::CaptureItemCreationFailed)?;
    let access: IDirect3DDxgiInterfaceAccess = surface
        .cast()
        .map_err(CaptureError::CaptureItemCreationFailed)?;
    unsafe { access.GetInterface::<ID3D11Texture2D>() }.map_err(CaptureError::CaptureItemCreationFailed)
}

struct SessionState {
    frame_pool: Direct3D11CaptureFramePool,
    session: GraphicsCaptureSession,
    producing_size: Size,
}

/// For a given `(TargetWindow, producing_size)`, produces a lazy, hot,
/// restartable stream of `CapturedFrame`. At most one session exists per
/// `(handle, producing_size)`; changing either requires a stop+start cycle.
pub struct FrameSource {
    device: DeviceHandle,
    state: Mutex<Option<SessionState>>,
    shutting_down: Arc<AtomicBool>,
}

impl FrameSource {
    pub fn new(device: DeviceHandle) -> Self {
        Self {
            device,
            state: Mutex::new(None),
            shutting_down: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Creates a capture item, allocates a free-threaded frame pool with a
    /// single buffer and BGRA8 pixel format, subscribes a frame-arrived
    /// callback, and starts the session with cursor capture and the
    /// "border required" indicator both off.
    pub fn start(
        &self,
        handle: WindowHandle,
        size: Size,
        on_frame: impl Fn(CapturedFrame) + Send + Sync + 'static,
    ) -> CaptureResult<()> {
        self.stop();
        self.shutting_down.store(false, Ordering::SeqCst);

        let hwnd = HWND(handle.0 as *mut _);
        let item = capture_item_for_window(hwnd)?;
        let d3d_device = d3d_device_from_handle(&self.device)?;

        let frame_pool = Direct3D11CaptureFramePool::CreateFreeThreaded(
            &d3d_device,
            DirectXPixelFormat::B8G8R8A8UIntNormalized,
            1,
            item.Size().map_err(CaptureError::SessionCreationFailed)?,
        )
        .map_err(CaptureError::SessionCreationFailed)?;

        let session = frame_pool
            .CreateCaptureSession(&item)
            .map_err(CaptureError::SessionCreationFailed)?;
        if let Ok(()) = session.SetIsCursorCaptureEnabled(false) {
            // Supported on this OS build; fall through silently otherwise —
            // the caller falls back to hiding the cursor for a one-shot
            // capture instead (ScreenshotEncoder's responsibility).
        }
        if let Ok(()) = session.SetIsBorderRequired(false) {
        }

        let shutting_down = self.shutting_down.clone();
        frame_pool
            .FrameArrived(&TypedEventHandler::new(move |pool: &Option<Direct3D11CaptureFramePool>, _| {
                if shutting_down.load(Ordering::SeqCst) {
                    return Ok(());
                }
                let Some(pool) = pool else { return Ok(()) };
                if let Ok(Some(frame)) = pool.TryGetNextFrame().map(Some) {
                    if let Ok(texture) = texture_from_frame(&frame) {
                        let frame_size = frame.ContentSize().unwrap_or_default();
                        on_frame(CapturedFrame {
                            texture,
                            size: Size::new(frame_size.Width.max(0) as u32, frame_size.Height.max(0) as u32),
                        });
                    }
                }
                Ok(())
            }))
            .map_err(CaptureError::SessionCreationFailed)?;

        session
            .StartCapture()
            .map_err(CaptureError::SessionCreationFailed)?;

        *self.state.lock() = Some(SessionState {
            frame_pool,
            session,
            producing_size: size,
        });
        log::info!(
            "FrameSource::start: capturing handle={} at {}x{}",
            handle,
            size.width,
            size.height
        );
        Ok(())
    }

    /// Unsubscribes, closes the pool, drops the session and item. Idempotent.
    pub fn stop(&self) {
        self.shutting_down.store(true, Ordering::SeqCst);
        if let Some(state) = self.state.lock().take() {
            let _ = state.session.Close();
            let _ = state.frame_pool.Close();
            log::info!("FrameSource::stop: session torn down");
        }
    }

    /// Compares the current producing size to `size`; on mismatch performs
    /// a full stop+start cycle. The caller supplies the frame callback
    /// again since a new pool/session is created.
    pub fn resize_if_changed(
        &self,
        handle: WindowHandle,
        size: Size,
        on_frame: impl Fn(CapturedFrame) + Send + Sync + 'static,
    ) -> CaptureResult<bool> {
        let needs_restart = match &*self.state.lock() {
            Some(state) => state.producing_size != size,
            None => true,
        };
        if needs_restart {
            self.start(handle, size, on_frame)?;
        }
        Ok(needs_restart)
    }

    pub fn is_running(&self) -> bool {
        self.state.lock().is_some()
    }
}

impl Drop for FrameSource {
    fn drop(&mut self) {
        self.stop();
    }
}

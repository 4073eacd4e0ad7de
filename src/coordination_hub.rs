//! Top-level state holder: the single `ConsumerSet`, the shared
//! `GraphicsContext`, the `FrameSource`, and the dispatcher for the eight
//! external commands (spec §4.8). Mutual exclusion between `Overlay` and
//! `Preview` is enforced exclusively here, at command-handling time, never
//! inside the renderers themselves.

use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;

use crate::command::{Command, ScreenshotFormat};
use crate::config::ConfigProvider;
use crate::consumer_set::ConsumerSet;
use crate::frame_source::FrameSource;
use crate::geometry::{Size, TargetGeometry, WindowHandle};
use crate::graphics::graphics_context::{GraphicsContext, GraphicsError};
use crate::letterbox_window::LetterboxWindow;
use crate::notification::{ids, NotificationKind, NotificationSink};
use crate::overlay_renderer::OverlayRenderer;
use crate::preview_renderer::PreviewRenderer;
use crate::screenshot_encoder::{local_now, ScreenshotEncoder, ScreenshotError};
use crate::utils::clock::Clock;
use crate::window_control::{find_target_window, TargetWindow, WindowControl};

#[derive(Debug, Error)]
pub enum HubError {
    #[error("target window not found")]
    WindowNotFound,
    #[error(transparent)]
    Overlay(#[from] crate::overlay_renderer::OverlayError),
    #[error(transparent)]
    Preview(#[from] crate::preview_renderer::PreviewError),
    #[error(transparent)]
    WindowControl(#[from] crate::window_control::WindowControlError),
    #[error(transparent)]
    Graphics(#[from] GraphicsError),
    #[error(transparent)]
    Screenshot(#[from] ScreenshotError),
}

pub type HubResult<T> = Result<T, HubError>;

pub struct CoordinationHub {
    config: Arc<dyn ConfigProvider>,
    notifications: Arc<dyn NotificationSink>,
    graphics: Arc<Mutex<GraphicsContext>>,
    target: Option<TargetWindow>,
    consumers: ConsumerSet,
    overlay: OverlayRenderer,
    preview: PreviewRenderer,
    letterbox: LetterboxWindow,
    current_ratio: Option<f64>,
    current_pixel_budget: u64,
    screen_size: Size,
}

impl CoordinationHub {
    pub fn new(
        config: Arc<dyn ConfigProvider>,
        notifications: Arc<dyn NotificationSink>,
        clock: Arc<dyn Clock>,
        screen_size: Size,
    ) -> Self {
        let graphics = Arc::new(Mutex::new(GraphicsContext::new()));
        Self {
            config,
            notifications,
            graphics: graphics.clone(),
            target: None,
            consumers: ConsumerSet::new(),
            overlay: OverlayRenderer::new(graphics.clone(), clock),
            preview: PreviewRenderer::new(graphics),
            letterbox: LetterboxWindow::new(),
            current_ratio: None,
            current_pixel_budget: 0,
            screen_size,
        }
    }

    pub fn consumers(&self) -> ConsumerSet {
        self.consumers
    }

    /// Periodic housekeeping tick: advances the overlay's deferred-teardown
    /// timer. Callers drive this from whatever idle tick their host
    /// application already has (spec §4.4 "Cleanup policy").
    pub fn tick(&mut self) {
        self.overlay.poll_cleanup();
    }

    pub fn dispatch(&mut self, command: Command) -> HubResult<()> {
        match command {
            Command::SelectWindow(title) => self.select_window(&title),
            Command::ApplyRatio(idx) => self.apply_geometry(Some(idx), None),
            Command::ApplyResolution(idx) => self.apply_geometry(None, Some(idx)),
            Command::ResetWindow => self.reset_window(),
            Command::TogglePreview => self.toggle_preview(),
            Command::ToggleOverlay => self.toggle_overlay(),
            Command::ToggleLetterbox => self.toggle_letterbox(),
            Command::CaptureScreenshot { directory, format, on_complete } => {
                self.capture_screenshot(directory, format, on_complete)
            }
        }
    }

    fn select_window(&mut self, title: &str) -> HubResult<()> {
        match find_target_window(title) {
            Some(handle) => {
                self.target = Some(TargetWindow::new(handle, crate::geometry::Rect::default()));
                self.letterbox.watch_target(handle);
                Ok(())
            }
            None => {
                self.notifications
                    .notify("Window", ids::WINDOW_NOT_FOUND, NotificationKind::Error);
                Err(HubError::WindowNotFound)
            }
        }
    }

    fn apply_geometry(&mut self, ratio_idx: Option<usize>, resolution_idx: Option<usize>) -> HubResult<()> {
        let Some(target) = self.target.as_mut() else {
            self.notifications
                .notify("Window", ids::WINDOW_NOT_FOUND, NotificationKind::Error);
            return Err(HubError::WindowNotFound);
        };

        if let Some(idx) = ratio_idx {
            if let Some(preset) = self.config.aspect_ratios().get(idx) {
                self.current_ratio = Some(preset.ratio);
            }
        }
        if let Some(idx) = resolution_idx {
            if let Some(preset) = self.config.resolutions().get(idx) {
                self.current_pixel_budget = preset.pixel_budget();
            }
        }
        let ratio = self.current_ratio.unwrap_or(16.0 / 9.0);

        let was_overlay = self.consumers.overlay;
        let was_preview = self.consumers.preview;
        self.overlay.stop();
        self.preview.stop();

        let geometry = TargetGeometry::compute(ratio, self.current_pixel_budget, self.screen_size);
        let lower_taskbar = self.config.taskbar_lower_on_resize();
        match WindowControl::resize(target, geometry.width, geometry.height, lower_taskbar) {
            Ok(_) => {}
            Err(err) => {
                self.notifications
                    .notify("Resize", ids::ADJUST_FAILED, NotificationKind::Error);
                return Err(err.into());
            }
        }

        if was_overlay {
            self.toggle_overlay_on()?;
        }
        if was_preview {
            self.toggle_preview_on()?;
        }
        Ok(())
    }

    fn reset_window(&mut self) -> HubResult<()> {
        let Some(target) = self.target.as_mut() else {
            return Err(HubError::WindowNotFound);
        };
        let was_overlay = self.consumers.overlay;
        let was_preview = self.consumers.preview;
        self.overlay.stop();
        self.preview.stop();

        match WindowControl::reset(target) {
            Ok(_) => {
                self.notifications
                    .notify("Reset", ids::RESET_SUCCESS, NotificationKind::Info);
            }
            Err(err) => {
                self.notifications
                    .notify("Reset", ids::RESET_FAILED, NotificationKind::Error);
                return Err(err.into());
            }
        }

        if was_overlay {
            self.toggle_overlay_on()?;
        }
        if was_preview {
            self.toggle_preview_on()?;
        }
        Ok(())
    }

    /// If preview was off and overlay is on, turns overlay off first and
    /// posts `FEATURE_CONFLICT`; then toggles preview.
    fn toggle_preview(&mut self) -> HubResult<()> {
        if !self.consumers.preview && self.consumers.overlay {
            self.overlay.stop();
            self.consumers.overlay = false;
            self.notifications
                .notify("Preview", ids::FEATURE_CONFLICT, NotificationKind::Info);
        }
        if self.consumers.preview {
            self.preview.stop();
            self.consumers.preview = false;
        } else {
            self.toggle_preview_on()?;
        }
        self.letterbox.apply(self.target_size(), self.screen_size, self.consumers.overlay);
        debug_assert!(self.consumers.is_valid());
        Ok(())
    }

    /// Symmetric to `toggle_preview`.
    fn toggle_overlay(&mut self) -> HubResult<()> {
        if !self.consumers.overlay && self.consumers.preview {
            self.preview.stop();
            self.consumers.preview = false;
            self.notifications
                .notify("Overlay", ids::FEATURE_CONFLICT, NotificationKind::Info);
        }
        if self.consumers.overlay {
            self.overlay.stop();
            self.consumers.overlay = false;
        } else {
            self.toggle_overlay_on()?;
        }
        self.letterbox.apply(self.target_size(), self.screen_size, self.consumers.overlay);
        debug_assert!(self.consumers.is_valid());
        Ok(())
    }

    fn toggle_overlay_on(&mut self) -> HubResult<()> {
        let Some(target) = self.target else {
            return Err(HubError::WindowNotFound);
        };
        self.overlay
            .start(target.handle, target.cached_size, self.screen_size)?;
        self.consumers.overlay = true;
        Ok(())
    }

    fn toggle_preview_on(&mut self) -> HubResult<()> {
        let Some(target) = self.target else {
            return Err(HubError::WindowNotFound);
        };
        self.preview.start(target.handle, target.cached_rect, self.screen_size)?;
        self.consumers.preview = true;
        Ok(())
    }

    /// Flips the flag, persists via the config sink (the sink's concern —
    /// the hub only reads config, so persistence here means "report the
    /// intent", matching spec §1's "no persistence" non-goal for the core
    /// itself), shuts down the letterbox window if toggling off, and
    /// restarts the overlay capture if it's currently running so it picks
    /// up the new letterbox-mode flag.
    fn toggle_letterbox(&mut self) -> HubResult<()> {
        self.consumers.letterbox = !self.consumers.letterbox;
        if !self.consumers.letterbox {
            self.letterbox.teardown();
        } else {
            self.letterbox.apply(self.target_size(), self.screen_size, self.consumers.overlay);
        }
        if self.consumers.overlay {
            self.overlay.stop();
            self.toggle_overlay_on()?;
        }
        Ok(())
    }

    fn capture_screenshot(
        &mut self,
        directory: PathBuf,
        format: ScreenshotFormat,
        on_complete: crate::command::ScreenshotCallback,
    ) -> HubResult<()> {
        let Some(target) = self.target else {
            self.notifications
                .notify("Screenshot", ids::WINDOW_NOT_FOUND, NotificationKind::Error);
            on_complete(false, &directory);
            return Err(HubError::WindowNotFound);
        };
        let directory = match crate::screenshot_encoder::resolve_directory(Some(&directory)) {
            Ok(dir) => dir,
            Err(_) => {
                self.notifications
                    .notify("Screenshot", ids::WINDOW_NOT_FOUND, NotificationKind::Error);
                on_complete(false, &directory);
                return Err(HubError::WindowNotFound);
            }
        };
        let device = match self.graphics.lock().acquire() {
            Ok(device) => device,
            Err(err) => {
                self.notifications
                    .notify("Screenshot", ids::WINDOW_NOT_FOUND, NotificationKind::Error);
                on_complete(false, &directory);
                return Err(err.into());
            }
        };
        let frame_source = FrameSource::new(device.clone());
        let result = ScreenshotEncoder::capture(
            &device,
            &frame_source,
            target.handle,
            target.cached_size,
            WindowControl::is_minimized,
            &directory,
            format,
            local_now(),
        );
        match result {
            Ok(path) => {
                self.notifications.notify(
                    "Screenshot",
                    &format!("{} {}", ids::CAPTURE_SUCCESS, path.display()),
                    NotificationKind::Info,
                );
                on_complete(true, &path);
                Ok(())
            }
            Err(err) => {
                self.notifications
                    .notify("Screenshot", ids::WINDOW_NOT_FOUND, NotificationKind::Error);
                on_complete(false, &directory);
                Err(err.into())
            }
        }
    }

    fn target_size(&self) -> Size {
        self.target.map(|t| t.cached_size).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AspectRatioPreset, ResolutionPreset, StaticConfig};
    use crate::utils::clock::TestClock;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct NullSink(AtomicUsize);
    impl NotificationSink for NullSink {
        fn notify(&self, _title: &str, _message: &str, _kind: NotificationKind) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn make_hub() -> CoordinationHub {
        let config = Arc::new(StaticConfig {
            window_title: "Game".into(),
            aspect_ratios: vec![AspectRatioPreset { name: "16:9".into(), ratio: 16.0 / 9.0 }],
            resolutions: vec![ResolutionPreset { name_index: 0, width: 0, height: 0 }],
            taskbar_lower_on_resize: false,
            letterbox_enabled: false,
        });
        let notifications = Arc::new(NullSink(AtomicUsize::new(0)));
        let clock = Arc::new(TestClock::new());
        CoordinationHub::new(config, notifications, clock, Size::new(1920, 1080))
    }

    #[test]
    fn mutual_exclusion_invariant_holds_after_toggles() {
        let mut hub = make_hub();
        hub.target = Some(TargetWindow::new(WindowHandle(1), crate::geometry::Rect::default()));
        // No real HWND behind this in a unit test, so the underlying
        // renderer starts will fail on Windows; the invariant check only
        // exercises the ConsumerSet bookkeeping path, which runs regardless
        // of whether the OS calls themselves succeed.
        let _ = hub.toggle_overlay();
        let _ = hub.toggle_preview();
        assert!(hub.consumers().is_valid());
    }
}

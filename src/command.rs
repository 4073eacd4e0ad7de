//! The eight commands the external UI layer sends into the core (spec §6).
//! All take their arguments by value and return synchronously, except
//! `CaptureScreenshot` which completes asynchronously via callback. No
//! command is re-entrant; the caller must serialize.

use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Where a screenshot should be written and in what format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScreenshotFormat {
    Png,
    Jpeg,
}

/// Invoked once capture finishes: `success` and the path written to (valid
/// only when `success`). `CoordinationHub` calls this on every completion
/// path — the happy path and every error path — exactly once per
/// `CaptureScreenshot` command (spec §4.7, E6).
pub type ScreenshotCallback = Arc<dyn Fn(bool, &Path) + Send + Sync>;

#[derive(Clone)]
pub enum Command {
    SelectWindow(String),
    ApplyRatio(usize),
    ApplyResolution(usize),
    ResetWindow,
    TogglePreview,
    ToggleOverlay,
    ToggleLetterbox,
    CaptureScreenshot { directory: PathBuf, format: ScreenshotFormat, on_complete: ScreenshotCallback },
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Command::SelectWindow(title) => f.debug_tuple("SelectWindow").field(title).finish(),
            Command::ApplyRatio(idx) => f.debug_tuple("ApplyRatio").field(idx).finish(),
            Command::ApplyResolution(idx) => f.debug_tuple("ApplyResolution").field(idx).finish(),
            Command::ResetWindow => write!(f, "ResetWindow"),
            Command::TogglePreview => write!(f, "TogglePreview"),
            Command::ToggleOverlay => write!(f, "ToggleOverlay"),
            Command::ToggleLetterbox => write!(f, "ToggleLetterbox"),
            Command::CaptureScreenshot { directory, format, .. } => f
                .debug_struct("CaptureScreenshot")
                .field("directory", directory)
                .field("format", format)
                .field("on_complete", &"<callback>")
                .finish(),
        }
    }
}

//! GPU capture-and-redirect render pipeline: mirrors an oversized target
//! window back onto the screen through a fullscreen overlay, a miniature
//! preview, or a one-shot screenshot, depending on which of the three is
//! selected. See `CoordinationHub` for the external command surface.

pub mod command;
pub mod config;
pub mod consumer_set;
pub mod geometry;
pub mod notification;
pub mod timer;
pub mod viewport_rect;

pub mod utils {
    pub mod clock;
}

#[cfg(target_os = "windows")]
pub mod graphics {
    pub mod graphics_context;
}

#[cfg(target_os = "windows")]
pub mod coordination_hub;
#[cfg(target_os = "windows")]
pub mod frame_source;
#[cfg(target_os = "windows")]
pub mod letterbox_window;
#[cfg(target_os = "windows")]
pub mod overlay_renderer;
#[cfg(target_os = "windows")]
pub mod preview_renderer;
#[cfg(target_os = "windows")]
pub mod screenshot_encoder;
#[cfg(target_os = "windows")]
pub mod shader_quad;
#[cfg(target_os = "windows")]
pub mod swapchain_window;
#[cfg(target_os = "windows")]
pub mod win_event_hook;
#[cfg(target_os = "windows")]
pub mod window_control;

pub use command::{Command, ScreenshotCallback, ScreenshotFormat};
pub use config::{AspectRatioPreset, ConfigProvider, ResolutionPreset, StaticConfig};
pub use consumer_set::ConsumerSet;
pub use notification::{NotificationKind, NotificationSink, ThrottlingSink};

#[cfg(target_os = "windows")]
pub use coordination_hub::{CoordinationHub, HubError};

//! Shape of the configuration surface the core reads (spec §6). Loading an
//! INI file (or anything else) is an external collaborator's job; this
//! module only defines what the core expects to be handed, following the
//! teacher's convention of accepting fully-formed config structs by value
//! (`RenderLoopRunArgs` in the teacher's `lib.rs`) instead of owning a parser.

use serde::{Deserialize, Serialize};

/// `(0, 0)` means "default, derive from screen" (spec §3 `TargetGeometry`,
/// §6 resolution presets).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionPreset {
    pub name_index: usize,
    pub width: u32,
    pub height: u32,
}

impl ResolutionPreset {
    pub fn is_screen_derived(&self) -> bool {
        self.width == 0 && self.height == 0
    }

    pub fn pixel_budget(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AspectRatioPreset {
    pub name: String,
    pub ratio: f64,
}

/// Read-only view of the session's configuration. `CoordinationHub` reads
/// this at startup and again on every `ApplyRatio`/`ApplyResolution`.
pub trait ConfigProvider: Send + Sync {
    fn window_title(&self) -> String;
    fn aspect_ratios(&self) -> Vec<AspectRatioPreset>;
    fn resolutions(&self) -> Vec<ResolutionPreset>;
    fn taskbar_lower_on_resize(&self) -> bool;
    fn letterbox_enabled(&self) -> bool;
}

/// A `ConfigProvider` backed by plain fields, for hosts that already parsed
/// their own config file, and for tests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaticConfig {
    pub window_title: String,
    pub aspect_ratios: Vec<AspectRatioPreset>,
    pub resolutions: Vec<ResolutionPreset>,
    pub taskbar_lower_on_resize: bool,
    pub letterbox_enabled: bool,
}

impl ConfigProvider for StaticConfig {
    fn window_title(&self) -> String {
        self.window_title.clone()
    }

    fn aspect_ratios(&self) -> Vec<AspectRatioPreset> {
        self.aspect_ratios.clone()
    }

    fn resolutions(&self) -> Vec<ResolutionPreset> {
        self.resolutions.clone()
    }

    fn taskbar_lower_on_resize(&self) -> bool {
        self.taskbar_lower_on_resize
    }

    fn letterbox_enabled(&self) -> bool {
        self.letterbox_enabled
    }
}

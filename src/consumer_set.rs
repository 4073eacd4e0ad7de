//! The enabled subset of `{Overlay, Preview, Letterbox}` and the mutual
//! exclusion rules between them. `ConsumerSet` itself is a dumb bag of
//! flags — the exclusion policy lives in `CoordinationHub`, never here,
//! per spec §4.8 ("Mutual exclusion invariant is enforced here, at
//! command-handling time, never inside the renderers").

/// Which of the three consumers are currently enabled. Mutated only on the
/// thread that owns `CoordinationHub` (the UI thread, in spec's terms).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConsumerSet {
    pub overlay: bool,
    pub preview: bool,
    pub letterbox: bool,
}

impl ConsumerSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// `Letterbox` is subsumed whenever `Overlay` is active: the overlay
    /// paints its own black background, so a separately visible letterbox
    /// window would double-dim the desktop.
    pub fn letterbox_visible(&self) -> bool {
        self.letterbox && !self.overlay
    }

    /// Invariant checked by Testable Property 3 and 5.
    pub fn is_valid(&self) -> bool {
        !(self.overlay && self.preview)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn letterbox_hidden_when_overlay_active() {
        let set = ConsumerSet {
            overlay: true,
            preview: false,
            letterbox: true,
        };
        assert!(!set.letterbox_visible());
        assert!(set.is_valid());
    }

    #[test]
    fn letterbox_visible_without_overlay() {
        let set = ConsumerSet {
            overlay: false,
            preview: false,
            letterbox: true,
        };
        assert!(set.letterbox_visible());
    }
}

//! Pure data model shared by every component: resolutions, aspect ratios,
//! target geometry, and the plain rectangle/point types used throughout the
//! render pipeline. None of this touches the OS; it is exercised directly by
//! unit tests on any host platform.

use std::fmt;

/// An opaque OS identifier for a top-level window. The core never constructs
/// one itself; it is handed in by whatever external layer does window
/// discovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WindowHandle(pub isize);

impl fmt::Display for WindowHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:x}", self.0)
    }
}

/// A plain 2D integer point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// A plain 2D unsigned extent (width/height in pixels).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn aspect(&self) -> f64 {
        self.width as f64 / self.height as f64
    }
}

/// An axis-aligned rectangle in screen or window-local coordinates. Origin
/// may be negative: a target window bigger than the screen is commonly
/// positioned with a negative top-left so its center lands on the screen
/// center.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    pub left: i32,
    pub top: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub fn new(left: i32, top: i32, width: u32, height: u32) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    pub fn top_left(&self) -> Position {
        Position::new(self.left, self.top)
    }

    /// True if this rectangle fits entirely within `screen` (i.e. the window
    /// it represents doesn't exceed the screen in either axis).
    pub fn fits_within(&self, screen: Size) -> bool {
        self.width <= screen.width && self.height <= screen.height
    }
}

/// `{width, height, total_pixels}`. `total_pixels` is enforced at
/// construction, never mutated independently, matching spec's invariant
/// `total_pixels = width * height`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
    pub total_pixels: u64,
}

impl Resolution {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            total_pixels: width as u64 * height as u64,
        }
    }

    /// `w = round(sqrt(total_pixels * ratio))`, `h = round(w / ratio)`, then
    /// bump `w` by one if the rounding left `w*h` short of the budget.
    pub fn compute(total_pixels: u64, ratio: f64) -> Self {
        debug_assert!(ratio > 0.0);
        let mut w = (total_pixels as f64 * ratio).sqrt().round() as u32;
        let mut h = (w as f64 / ratio).round() as u32;
        if (w as u64) * (h as u64) < total_pixels {
            w += 1;
            h = (w as f64 / ratio).round() as u32;
        }
        Self::new(w, h)
    }

    /// The largest `w x h` at `ratio` that fits `screen` in at least one
    /// dimension.
    pub fn compute_by_screen(ratio: f64, screen: Size) -> Self {
        debug_assert!(ratio > 0.0);
        let screen_ratio = screen.width as f64 / screen.height as f64;
        if ratio <= screen_ratio {
            // Height-limited: full screen height, width follows the ratio.
            let h = screen.height;
            let w = (h as f64 * ratio).round() as u32;
            Self::new(w.min(screen.width), h)
        } else {
            // Width-limited: full screen width, height follows the ratio.
            let w = screen.width;
            let h = (w as f64 / ratio).round() as u32;
            Self::new(w, h.min(screen.height))
        }
    }
}

/// `{name, ratio}`, `ratio = width/height`, strictly positive.
#[derive(Debug, Clone, PartialEq)]
pub struct AspectRatio {
    pub name: String,
    pub ratio: f64,
}

impl AspectRatio {
    pub fn new(name: impl Into<String>, ratio: f64) -> Self {
        assert!(ratio > 0.0, "aspect ratio must be strictly positive");
        Self {
            name: name.into(),
            ratio,
        }
    }
}

/// The resolved `(w, h)` a target window should be resized to for a given
/// aspect ratio and an optional pixel budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetGeometry {
    pub width: u32,
    pub height: u32,
}

impl TargetGeometry {
    /// `pixel_budget == 0` means "derive from screen"; matches the config
    /// surface's `(0, 0)` resolution-preset sentinel.
    pub fn compute(ratio: f64, pixel_budget: u64, screen: Size) -> Self {
        let resolution = if pixel_budget == 0 {
            Resolution::compute_by_screen(ratio, screen)
        } else {
            Resolution::compute(pixel_budget, ratio)
        };
        Self {
            width: resolution.width,
            height: resolution.height,
        }
    }

    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }
}

/// Computes where a window's client rect should be positioned so its center
/// coincides with the screen center. The rect may land partially or fully
/// off-screen when `target` exceeds `screen` — that's intentional; it's what
/// `OverlayRenderer` compensates for.
pub fn centered_rect(target: Size, screen: Size) -> Rect {
    let left = (screen.width as i64 - target.width as i64) / 2;
    let top = (screen.height as i64 - target.height as i64) / 2;
    Rect::new(left as i32, top as i32, target.width, target.height)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolution_round_trip_property() {
        // Property 1: for a grid of (ratio, total_pixels), compute() returns
        // (w, h) with w*h >= total_pixels and |w/h - ratio| <= 1/min(w,h).
        let ratios = [0.1, 0.5, 1.0, 4.0 / 3.0, 16.0 / 9.0, 21.0 / 9.0, 10.0];
        let budgets = [100_000u64, 2_073_600, 8_294_400, 33_177_600, 100_000_000];
        for &ratio in &ratios {
            for &budget in &budgets {
                let r = Resolution::compute(budget, ratio);
                assert!(
                    r.total_pixels >= budget,
                    "ratio={ratio} budget={budget} got {}x{}={}",
                    r.width,
                    r.height,
                    r.total_pixels
                );
                let min_dim = r.width.min(r.height) as f64;
                let actual_ratio = r.width as f64 / r.height as f64;
                assert!(
                    (actual_ratio - ratio).abs() <= 1.0 / min_dim,
                    "ratio={ratio} budget={budget} got ratio {actual_ratio}"
                );
            }
        }
    }

    #[test]
    fn resolution_by_screen_fit_property() {
        // Property 2: compute_by_screen returns (w, h) with w <= screen_w
        // and h <= screen_h, at least one inequality tight.
        let screens = [
            Size::new(1920, 1080),
            Size::new(2560, 1440),
            Size::new(3440, 1440),
            Size::new(1280, 1024),
        ];
        let ratios = [0.1, 0.5, 1.0, 4.0 / 3.0, 16.0 / 9.0, 21.0 / 9.0, 10.0];
        for &screen in &screens {
            for &ratio in &ratios {
                let r = Resolution::compute_by_screen(ratio, screen);
                assert!(r.width <= screen.width);
                assert!(r.height <= screen.height);
                assert!(r.width == screen.width || r.height == screen.height);
            }
        }
    }

    #[test]
    fn e1_oversize_resolution_and_overlay_fit() {
        // E1: screen 1920x1080, 8K-ish budget at 16:9.
        let target = TargetGeometry::compute(16.0 / 9.0, 33_177_600, Size::new(1920, 1080));
        assert_eq!(target.width, 7680);
        assert_eq!(target.height, 4320);

        let rect = centered_rect(target.size(), Size::new(1920, 1080));
        assert_eq!(rect.left, (1920 - 7680) / 2);
        assert_eq!(rect.top, (1080 - 4320) / 2);
        assert!(rect.left < 0 && rect.top < 0);
    }

    #[test]
    fn e2_ratio_without_resolution_budget() {
        // E2: screen 1920x1080, ratio 21/9, no pixel budget.
        let resolution = Resolution::compute_by_screen(21.0 / 9.0, Size::new(1920, 1080));
        assert_eq!(resolution.width, 1920);
        assert_eq!(resolution.height, 823);
    }
}

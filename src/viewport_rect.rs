//! Pure viewport-rectangle math for `PreviewRenderer` (spec §4.5). Kept
//! free of any windowing dependency so scenario E3/E4 and the drag math can
//! be exercised on any host platform.

use crate::geometry::{Position, Rect, Size};

/// The rectangle, in preview-local coordinates, representing the slice of
/// the oversized target window currently visible on the physical screen.
/// `None` when the target fits entirely on screen (nothing to indicate).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportRect {
    pub top_left: (f64, f64),
    pub size: (f64, f64),
}

/// `P` = preview client size, `G` = target window's current rect (may
/// extend off-screen, may have negative origin), `S` = screen size.
pub fn compute_viewport(preview: Size, target_rect: Rect, screen: Size) -> Option<ViewportRect> {
    if target_rect.fits_within(screen) {
        return None;
    }
    let scale_x = preview.width as f64 / target_rect.width as f64;
    let scale_y = preview.height as f64 / target_rect.height as f64;
    let top_left = (
        (-target_rect.left as f64 / target_rect.width as f64) * preview.width as f64,
        (-target_rect.top as f64 / target_rect.height as f64) * preview.height as f64,
    );
    let size = (screen.width as f64 * scale_x, screen.height as f64 * scale_y);
    Some(ViewportRect { top_left, size })
}

/// Inverse mapping used while dragging the viewport rect: given the cursor
/// position in preview-local coordinates, the drag's original offset from
/// the rect's top-left, the preview size, and the target's full size,
/// returns the new top-left the target window should be moved to. Each axis
/// is independent: an axis the target already fits within is left centered
/// and ignored here (caller skips updating it).
pub fn viewport_drag_to_target_position(
    cursor: (f64, f64),
    drag_offset: (f64, f64),
    preview: Size,
    target_size: Size,
) -> Position {
    let rel = (
        (cursor.0 - drag_offset.0) / preview.width as f64,
        (cursor.1 - drag_offset.1) / preview.height as f64,
    );
    Position::new(
        (-rel.0 * target_size.width as f64).round() as i32,
        (-rel.1 * target_size.height as f64).round() as i32,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn e3_preview_drag() {
        // E3: target 3840x2160 on a 1920x1080 screen, positioned at
        // (-960, -540). Preview client 400x225.
        let target_rect = Rect::new(-960, -540, 3840, 2160);
        let preview = Size::new(400, 225);
        let screen = Size::new(1920, 1080);

        let viewport = compute_viewport(preview, target_rect, screen).expect("viewport visible");
        assert!((viewport.top_left.0 - 100.0).abs() < 1e-9);
        assert!((viewport.top_left.1 - 56.25).abs() < 1e-9);
        assert!((viewport.size.0 - 200.0).abs() < 1e-9);
        assert!((viewport.size.1 - 112.5).abs() < 1e-9);

        // User grabs the viewport exactly at its top-left corner (so the
        // pointer's offset from the rect's top-left is zero) and drags it
        // to preview-local (0, 0).
        let new_target =
            viewport_drag_to_target_position((0.0, 0.0), (0.0, 0.0), preview, target_rect.size());
        assert_eq!(new_target, Position::new(0, 0));
    }

    #[test]
    fn viewport_hidden_when_target_fits_screen() {
        let target_rect = Rect::new(0, 0, 1280, 720);
        let screen = Size::new(1920, 1080);
        assert!(compute_viewport(Size::new(400, 225), target_rect, screen).is_none());
    }
}

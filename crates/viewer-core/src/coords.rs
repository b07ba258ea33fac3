//! Pixel <-> normalized coordinate mapping
//!
//! Every conversion is against the surface's *current* size. A rectangle
//! captured at one zoom level renders at another by multiplying back out.

use doc_model::{NormalizedRect, PixelPoint, PixelRect, SurfaceSize};

/// Default minimum drag size in pixels; smaller drags are treated as clicks.
pub const DEFAULT_MIN_DRAG_PX: f64 = 3.0;

/// Convert a surface-relative pixel rectangle to fractions of the surface.
///
/// Returns `None` until the surface has non-zero bounds; callers defer
/// instead of storing garbage.
pub fn to_normalized(rect: PixelRect, surface: SurfaceSize) -> Option<NormalizedRect> {
    if !surface.is_laid_out() {
        return None;
    }

    Some(NormalizedRect::new(
        rect.left / surface.width,
        rect.top / surface.height,
        rect.width / surface.width,
        rect.height / surface.height,
    ))
}

pub fn to_pixels(rect: NormalizedRect, surface: SurfaceSize) -> PixelRect {
    PixelRect::new(
        rect.x * surface.width,
        rect.y * surface.height,
        rect.width * surface.width,
        rect.height * surface.height,
    )
}

pub fn point_to_normalized(point: PixelPoint, surface: SurfaceSize) -> Option<(f64, f64)> {
    if !surface.is_laid_out() {
        return None;
    }

    Some((point.x / surface.width, point.y / surface.height))
}

pub fn point_to_pixels(x: f64, y: f64, surface: SurfaceSize) -> PixelPoint {
    PixelPoint::new(x * surface.width, y * surface.height)
}

/// Rectangle spanned by two drag corners, whichever direction the drag went.
pub fn rect_from_corners(a: PixelPoint, b: PixelPoint) -> PixelRect {
    let left = a.x.min(b.x);
    let top = a.y.min(b.y);
    PixelRect::new(left, top, (a.x - b.x).abs(), (a.y - b.y).abs())
}

/// Clip a rectangle to `[0, width] x [0, height]`.
pub fn clamp_to_surface(rect: PixelRect, surface: SurfaceSize) -> PixelRect {
    let left = rect.left.clamp(0.0, surface.width.max(0.0));
    let top = rect.top.clamp(0.0, surface.height.max(0.0));
    let right = rect.right().clamp(left, surface.width.max(left));
    let bottom = rect.bottom().clamp(top, surface.height.max(top));

    PixelRect::new(left, top, right - left, bottom - top)
}

pub fn exceeds_threshold(rect: PixelRect, min_px: f64) -> bool {
    rect.width > min_px && rect.height > min_px
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f64 = 1e-9;

    fn assert_rect_close(actual: PixelRect, expected: PixelRect) {
        for (a, e) in [
            (actual.left, expected.left),
            (actual.top, expected.top),
            (actual.width, expected.width),
            (actual.height, expected.height),
        ] {
            assert!((a - e).abs() < EPSILON, "{actual:?} != {expected:?}");
        }
    }

    #[test]
    fn scenario_rect_survives_resize() {
        let drawn = PixelRect::new(10.0, 20.0, 100.0, 50.0);

        let normalized =
            to_normalized(drawn, SurfaceSize::new(1000.0, 500.0)).expect("surface is laid out");
        assert!((normalized.x - 0.01).abs() < EPSILON);
        assert!((normalized.y - 0.04).abs() < EPSILON);
        assert!((normalized.width - 0.1).abs() < EPSILON);
        assert!((normalized.height - 0.1).abs() < EPSILON);

        let rerendered = to_pixels(normalized, SurfaceSize::new(800.0, 400.0));
        assert_rect_close(rerendered, PixelRect::new(8.0, 16.0, 80.0, 40.0));
    }

    #[test]
    fn normalize_then_denormalize_is_identity() {
        let surfaces = [SurfaceSize::new(612.0, 792.0), SurfaceSize::new(1.5, 3000.25)];
        let rects = [
            PixelRect::new(0.0, 0.0, 1.0, 1.0),
            PixelRect::new(0.3, 0.7, 0.5, 0.2),
            PixelRect::new(0.999, 0.0, 0.001, 1.0),
        ];

        for surface in surfaces {
            for fraction in rects {
                let rect = PixelRect::new(
                    fraction.left * surface.width,
                    fraction.top * surface.height,
                    fraction.width * surface.width,
                    fraction.height * surface.height,
                );
                let normalized = to_normalized(rect, surface).expect("surface is laid out");
                assert_rect_close(to_pixels(normalized, surface), rect);
            }
        }
    }

    #[test]
    fn zero_sized_surface_defers() {
        let rect = PixelRect::new(1.0, 1.0, 10.0, 10.0);
        assert!(to_normalized(rect, SurfaceSize::new(0.0, 400.0)).is_none());
        assert!(point_to_normalized(PixelPoint::new(1.0, 1.0), SurfaceSize::new(400.0, 0.0)).is_none());
    }

    #[test]
    fn corners_in_any_order_give_same_rect() {
        let a = PixelPoint::new(50.0, 10.0);
        let b = PixelPoint::new(20.0, 40.0);
        assert_eq!(rect_from_corners(a, b), PixelRect::new(20.0, 10.0, 30.0, 30.0));
        assert_eq!(rect_from_corners(b, a), rect_from_corners(a, b));
    }

    #[test]
    fn clamp_clips_to_surface() {
        let surface = SurfaceSize::new(100.0, 100.0);
        let clipped = clamp_to_surface(PixelRect::new(-10.0, 90.0, 50.0, 50.0), surface);
        assert_eq!(clipped, PixelRect::new(0.0, 90.0, 40.0, 10.0));

        let outside = clamp_to_surface(PixelRect::new(150.0, 150.0, 10.0, 10.0), surface);
        assert_eq!(outside.width, 0.0);
        assert_eq!(outside.height, 0.0);
    }

    #[test]
    fn threshold_requires_both_dimensions() {
        assert!(exceeds_threshold(PixelRect::new(0.0, 0.0, 4.0, 4.0), DEFAULT_MIN_DRAG_PX));
        assert!(!exceeds_threshold(PixelRect::new(0.0, 0.0, 3.0, 40.0), DEFAULT_MIN_DRAG_PX));
        assert!(!exceeds_threshold(PixelRect::new(0.0, 0.0, 40.0, 2.0), DEFAULT_MIN_DRAG_PX));
    }
}

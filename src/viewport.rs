//! Per-viewport view state and the canvas transform derived from it
//!
//! The transform is always composed as translate(center + pan) → scale(zoom)
//! → rotate → flip. Overlay and hit-test math assume this exact order.

use crate::types::Point;
use serde::Deserialize;

/// Allowed zoom factors
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct ZoomRange {
    pub min: f64,
    pub max: f64,
}

impl ZoomRange {
    /// Range with `min <= max`, both strictly positive
    #[must_use]
    pub fn new(min: f64, max: f64) -> Self {
        let min = if min.is_finite() && min > 0.0 { min } else { 0.01 };
        let max = if max.is_finite() { max.max(min) } else { min };
        Self { min, max }
    }

    #[inline]
    #[must_use]
    pub fn clamp(&self, zoom: f64) -> f64 {
        if zoom.is_nan() {
            return 1.0_f64.clamp(self.min, self.max);
        }
        zoom.clamp(self.min, self.max)
    }
}

impl Default for ZoomRange {
    fn default() -> Self {
        Self::new(0.1, 10.0)
    }
}

/// 2D affine matrix in canvas order:
/// `x' = a·x + c·y + e`, `y' = b·x + d·y + f`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Affine {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
    pub f: f64,
}

impl Default for Affine {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Affine {
    pub const IDENTITY: Affine = Affine {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        e: 0.0,
        f: 0.0,
    };

    /// `self × other`: `other` is applied to points first
    #[must_use]
    pub fn then(self, other: Affine) -> Affine {
        Affine {
            a: self.a * other.a + self.c * other.b,
            b: self.b * other.a + self.d * other.b,
            c: self.a * other.c + self.c * other.d,
            d: self.b * other.c + self.d * other.d,
            e: self.a * other.e + self.c * other.f + self.e,
            f: self.b * other.e + self.d * other.f + self.f,
        }
    }

    #[must_use]
    pub fn translate(self, tx: f64, ty: f64) -> Affine {
        self.then(Affine {
            e: tx,
            f: ty,
            ..Affine::IDENTITY
        })
    }

    #[must_use]
    pub fn scale(self, sx: f64, sy: f64) -> Affine {
        self.then(Affine {
            a: sx,
            d: sy,
            ..Affine::IDENTITY
        })
    }

    #[must_use]
    pub fn rotate(self, radians: f64) -> Affine {
        let (sin, cos) = radians.sin_cos();
        self.then(Affine {
            a: cos,
            b: sin,
            c: -sin,
            d: cos,
            e: 0.0,
            f: 0.0,
        })
    }

    #[inline]
    #[must_use]
    pub fn apply(&self, p: Point) -> Point {
        Point::new(
            self.a * p.x + self.c * p.y + self.e,
            self.b * p.x + self.d * p.y + self.f,
        )
    }

    #[inline]
    #[must_use]
    pub fn determinant(&self) -> f64 {
        self.a * self.d - self.b * self.c
    }

    /// Inverse transform, `None` when singular
    #[must_use]
    pub fn invert(&self) -> Option<Affine> {
        let det = self.determinant();
        if det.abs() < f64::EPSILON {
            return None;
        }
        Some(Affine {
            a: self.d / det,
            b: -self.b / det,
            c: -self.c / det,
            d: self.a / det,
            e: (self.c * self.f - self.d * self.e) / det,
            f: (self.b * self.e - self.a * self.f) / det,
        })
    }
}

/// Mutable view state of one viewport
///
/// Every mutator enforces the invariants: zoom inside the configured range,
/// rotation in [0, 360), slice index inside the store.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewportState {
    slice_index: usize,
    zoom: f64,
    pan_x: f64,
    pan_y: f64,
    rotation: f64,
    flip_horizontal: bool,
    flip_vertical: bool,
    zoom_range: ZoomRange,
}

impl Default for ViewportState {
    fn default() -> Self {
        Self::new(ZoomRange::default())
    }
}

impl ViewportState {
    #[must_use]
    pub fn new(zoom_range: ZoomRange) -> Self {
        Self {
            slice_index: 0,
            zoom: zoom_range.clamp(1.0),
            pan_x: 0.0,
            pan_y: 0.0,
            rotation: 0.0,
            flip_horizontal: false,
            flip_vertical: false,
            zoom_range,
        }
    }

    #[inline]
    #[must_use]
    pub fn slice_index(&self) -> usize {
        self.slice_index
    }

    #[inline]
    #[must_use]
    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    #[inline]
    #[must_use]
    pub fn pan(&self) -> (f64, f64) {
        (self.pan_x, self.pan_y)
    }

    #[inline]
    #[must_use]
    pub fn rotation(&self) -> f64 {
        self.rotation
    }

    #[inline]
    #[must_use]
    pub fn flip_horizontal(&self) -> bool {
        self.flip_horizontal
    }

    #[inline]
    #[must_use]
    pub fn flip_vertical(&self) -> bool {
        self.flip_vertical
    }

    #[inline]
    #[must_use]
    pub fn zoom_range(&self) -> ZoomRange {
        self.zoom_range
    }

    pub fn set_zoom(&mut self, zoom: f64) {
        self.zoom = self.zoom_range.clamp(zoom);
    }

    pub fn zoom_by(&mut self, delta: f64) {
        self.set_zoom(self.zoom + delta);
    }

    pub fn set_pan(&mut self, x: f64, y: f64) {
        if x.is_finite() && y.is_finite() {
            self.pan_x = x;
            self.pan_y = y;
        }
    }

    pub fn pan_by(&mut self, dx: f64, dy: f64) {
        self.set_pan(self.pan_x + dx, self.pan_y + dy);
    }

    pub fn set_rotation(&mut self, degrees: f64) {
        if !degrees.is_finite() {
            return;
        }
        let normalized = degrees.rem_euclid(360.0);
        // rem_euclid can round up to exactly 360 for tiny negative inputs
        self.rotation = if normalized >= 360.0 { 0.0 } else { normalized };
    }

    pub fn rotate_by(&mut self, degrees: f64) {
        self.set_rotation(self.rotation + degrees);
    }

    pub fn set_flip_horizontal(&mut self, flip: bool) {
        self.flip_horizontal = flip;
    }

    pub fn set_flip_vertical(&mut self, flip: bool) {
        self.flip_vertical = flip;
    }

    pub fn toggle_flip_horizontal(&mut self) {
        self.flip_horizontal = !self.flip_horizontal;
    }

    pub fn toggle_flip_vertical(&mut self) {
        self.flip_vertical = !self.flip_vertical;
    }

    /// Point at `index`, clamped into `[0, count)` (0 for an empty store)
    pub fn set_slice(&mut self, index: usize, count: usize) {
        self.slice_index = index.min(count.saturating_sub(1));
    }

    /// Zoom 1, no pan, no rotation, no flips; the slice index is kept
    pub fn reset(&mut self) {
        let slice_index = self.slice_index;
        *self = Self::new(self.zoom_range);
        self.slice_index = slice_index;
    }

    /// Canvas transform for a viewport of `width` x `height`
    #[must_use]
    pub fn transform(&self, width: f64, height: f64) -> Affine {
        let mut affine = Affine::IDENTITY
            .translate(width / 2.0 + self.pan_x, height / 2.0 + self.pan_y)
            .scale(self.zoom, self.zoom)
            .rotate(self.rotation.to_radians());
        if self.flip_horizontal {
            affine = affine.scale(-1.0, 1.0);
        }
        if self.flip_vertical {
            affine = affine.scale(1.0, -1.0);
        }
        affine
    }

    /// Raster (image) coordinates to canvas coordinates; the raster is drawn
    /// centred on the origin of the transformed space
    #[must_use]
    pub fn image_to_canvas(&self, p: Point, width: f64, height: f64) -> Point {
        self.transform(width, height)
            .apply(p.offset(-width / 2.0, -height / 2.0))
    }

    /// Inverse of [`image_to_canvas`](Self::image_to_canvas)
    #[must_use]
    pub fn canvas_to_image(&self, p: Point, width: f64, height: f64) -> Option<Point> {
        let inverse = self.transform(width, height).invert()?;
        Some(inverse.apply(p).offset(width / 2.0, height / 2.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn assert_point_eq(actual: Point, expected: Point) {
        assert_relative_eq!(actual.x, expected.x, epsilon = 1e-9);
        assert_relative_eq!(actual.y, expected.y, epsilon = 1e-9);
    }

    #[test]
    fn test_zoom_clamped() {
        let mut vp = ViewportState::new(ZoomRange::new(0.1, 5.0));
        for _ in 0..100 {
            vp.zoom_by(0.1);
        }
        assert_relative_eq!(vp.zoom(), 5.0);

        for _ in 0..100 {
            vp.zoom_by(-0.37);
        }
        assert_relative_eq!(vp.zoom(), 0.1);

        vp.set_zoom(f64::NAN);
        assert!(vp.zoom() >= 0.1 && vp.zoom() <= 5.0);
    }

    #[test]
    fn test_rotation_normalized() {
        let mut vp = ViewportState::default();
        vp.rotate_by(-90.0);
        assert_relative_eq!(vp.rotation(), 270.0);
        vp.rotate_by(180.0);
        assert_relative_eq!(vp.rotation(), 90.0);
        vp.set_rotation(720.0);
        assert_relative_eq!(vp.rotation(), 0.0);
        vp.set_rotation(-1e-20);
        assert!(vp.rotation() < 360.0);
    }

    #[test]
    fn test_set_slice_clamps() {
        let mut vp = ViewportState::default();
        vp.set_slice(12, 10);
        assert_eq!(vp.slice_index(), 9);
        vp.set_slice(3, 0);
        assert_eq!(vp.slice_index(), 0);
    }

    #[test]
    fn test_reset_keeps_slice() {
        let mut vp = ViewportState::default();
        vp.set_slice(4, 10);
        vp.set_zoom(3.0);
        vp.pan_by(10.0, -4.0);
        vp.rotate_by(90.0);
        vp.toggle_flip_horizontal();
        vp.reset();

        assert_eq!(vp.slice_index(), 4);
        assert_relative_eq!(vp.zoom(), 1.0);
        assert_eq!(vp.pan(), (0.0, 0.0));
        assert_relative_eq!(vp.rotation(), 0.0);
        assert!(!vp.flip_horizontal());
    }

    #[test]
    fn test_identity_transform_centres_raster() {
        let vp = ViewportState::default();
        assert_point_eq(vp.image_to_canvas(Point::new(0.0, 0.0), 200.0, 100.0), Point::new(0.0, 0.0));
        assert_point_eq(
            vp.image_to_canvas(Point::new(100.0, 50.0), 200.0, 100.0),
            Point::new(100.0, 50.0),
        );
    }

    #[test]
    fn test_rotation_before_flip() {
        // Rotating 90° then flipping horizontally maps the raster's right edge
        // midpoint above the centre; the reverse order would map it below.
        let mut vp = ViewportState::default();
        vp.rotate_by(90.0);
        vp.toggle_flip_horizontal();

        let p = vp.image_to_canvas(Point::new(100.0, 50.0), 100.0, 100.0);
        assert_point_eq(p, Point::new(50.0, 0.0));
    }

    #[test]
    fn test_canvas_image_round_trip() {
        let mut vp = ViewportState::default();
        vp.set_zoom(2.5);
        vp.pan_by(13.0, -7.0);
        vp.rotate_by(33.0);
        vp.toggle_flip_vertical();

        let original = Point::new(17.0, 81.0);
        let canvas = vp.image_to_canvas(original, 256.0, 192.0);
        let back = vp.canvas_to_image(canvas, 256.0, 192.0).unwrap();
        assert_point_eq(back, original);
    }

    #[test]
    fn test_affine_inverse_singular() {
        let singular = Affine::IDENTITY.scale(0.0, 1.0);
        assert!(singular.invert().is_none());
    }
}

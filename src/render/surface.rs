//! Drawing surfaces
//!
//! [`DrawingSurface`] is the small set of canvas operations the renderer
//! needs. [`RasterSurface`] implements it in software over a [`Raster`];
//! [`RecordingSurface`] only records the calls, for assertions.

use super::raster::{Raster, Rgba};
use crate::types::Point;
use crate::viewport::Affine;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SurfaceError {
    /// The current transform cannot be inverted (zero scale)
    #[error("Transform is singular")]
    SingularTransform,

    #[error("Cannot draw an empty {width}x{height} raster")]
    EmptyRaster { width: u32, height: u32 },

    /// Failure reported by the surface implementation itself
    #[error("Surface failure: {0}")]
    Backend(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextAlign {
    Left,
    Right,
}

/// Line colour and thickness in device pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stroke {
    pub color: Rgba<u8>,
    pub width: u32,
}

impl Stroke {
    #[must_use]
    pub const fn new(color: Rgba<u8>, width: u32) -> Self {
        Self { color, width }
    }
}

pub trait DrawingSurface {
    /// Surface size in device pixels
    fn size(&self) -> (u32, u32);

    /// Replace the current transform (applies to all later drawing)
    fn set_transform(&mut self, transform: Affine);

    fn reset_transform(&mut self);

    /// Fill the whole surface, ignoring the transform
    fn clear(&mut self, color: Rgba<u8>);

    /// Draw `raster` with its top-left corner at `at` in transformed space
    fn draw_raster(&mut self, raster: &Raster, at: Point) -> Result<(), SurfaceError>;

    fn draw_line(&mut self, from: Point, to: Point, stroke: Stroke);

    fn draw_text(&mut self, text: &str, at: Point, align: TextAlign, color: Rgba<u8>);

    fn draw_ellipse(&mut self, center: Point, radius_x: f64, radius_y: f64, stroke: Stroke);

    fn stroke_rect(&mut self, top_left: Point, width: f64, height: f64, stroke: Stroke);
}

/// Text placed on a [`RasterSurface`], in device coordinates
#[derive(Debug, Clone, PartialEq)]
pub struct TextRun {
    pub text: String,
    pub position: Point,
    pub align: TextAlign,
    pub color: Rgba<u8>,
}

/// Software surface drawing into an RGBA raster
///
/// Glyphs are not rasterised: text is kept as [`TextRun`]s for the host to
/// print or composite.
#[derive(Debug, Clone)]
pub struct RasterSurface {
    canvas: Raster,
    transform: Affine,
    texts: Vec<TextRun>,
}

impl RasterSurface {
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            canvas: Raster::new(width, height),
            transform: Affine::IDENTITY,
            texts: Vec::new(),
        }
    }

    #[must_use]
    pub fn raster(&self) -> &Raster {
        &self.canvas
    }

    #[must_use]
    pub fn into_raster(self) -> Raster {
        self.canvas
    }

    #[must_use]
    pub fn text_runs(&self) -> &[TextRun] {
        &self.texts
    }

    fn stamp(&mut self, x: i64, y: i64, stroke: Stroke) {
        let half = i64::from(stroke.width.max(1)) / 2;
        let extent = i64::from(stroke.width.max(1));
        for dy in 0..extent {
            for dx in 0..extent {
                self.canvas
                    .put_pixel_i(x + dx - half, y + dy - half, stroke.color);
            }
        }
    }

    /// Bresenham between two device points
    fn device_line(&mut self, from: Point, to: Point, stroke: Stroke) {
        if !(from.x.is_finite() && from.y.is_finite() && to.x.is_finite() && to.y.is_finite()) {
            return;
        }
        let (mut x0, mut y0) = (from.x.round() as i64, from.y.round() as i64);
        let (x1, y1) = (to.x.round() as i64, to.y.round() as i64);
        let dx = (x1 - x0).abs();
        let dy = -(y1 - y0).abs();
        let sx = if x0 < x1 { 1 } else { -1 };
        let sy = if y0 < y1 { 1 } else { -1 };
        let mut err = dx + dy;

        // Bound the walk so absurd coordinates cannot stall a frame
        let limit = 4 * (i64::from(self.canvas.width()) + i64::from(self.canvas.height())) + 8;
        let mut steps = 0;
        loop {
            self.stamp(x0, y0, stroke);
            if (x0 == x1 && y0 == y1) || steps > limit.max(dx - dy) {
                break;
            }
            steps += 1;
            let e2 = 2 * err;
            if e2 >= dy {
                err += dy;
                x0 += sx;
            }
            if e2 <= dx {
                err += dx;
                y0 += sy;
            }
        }
    }

    fn polyline(&mut self, points: &[Point], stroke: Stroke) {
        for pair in points.windows(2) {
            self.device_line(pair[0], pair[1], stroke);
        }
    }
}

impl DrawingSurface for RasterSurface {
    fn size(&self) -> (u32, u32) {
        (self.canvas.width(), self.canvas.height())
    }

    fn set_transform(&mut self, transform: Affine) {
        self.transform = transform;
    }

    fn reset_transform(&mut self) {
        self.transform = Affine::IDENTITY;
    }

    fn clear(&mut self, color: Rgba<u8>) {
        self.canvas.fill(color);
        self.texts.clear();
    }

    fn draw_raster(&mut self, raster: &Raster, at: Point) -> Result<(), SurfaceError> {
        if raster.width() == 0 || raster.height() == 0 {
            return Err(SurfaceError::EmptyRaster {
                width: raster.width(),
                height: raster.height(),
            });
        }
        let inverse = self
            .transform
            .invert()
            .ok_or(SurfaceError::SingularTransform)?;

        // Device-space bounding box of the transformed raster
        let (w, h) = (f64::from(raster.width()), f64::from(raster.height()));
        let corners = [
            at,
            at.offset(w, 0.0),
            at.offset(0.0, h),
            at.offset(w, h),
        ]
        .map(|p| self.transform.apply(p));
        let (min_x, max_x) = corners
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), p| (lo.min(p.x), hi.max(p.x)));
        let (min_y, max_y) = corners
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), p| (lo.min(p.y), hi.max(p.y)));

        let (cw, ch) = self.size();
        let x_start = min_x.floor().max(0.0) as u32;
        let y_start = min_y.floor().max(0.0) as u32;
        let x_end = max_x.ceil().clamp(0.0, f64::from(cw)) as u32;
        let y_end = max_y.ceil().clamp(0.0, f64::from(ch)) as u32;

        for y in y_start..y_end {
            for x in x_start..x_end {
                let local = inverse.apply(Point::new(f64::from(x) + 0.5, f64::from(y) + 0.5));
                let (sx, sy) = (local.x - at.x, local.y - at.y);
                if sx < 0.0 || sy < 0.0 || sx >= w || sy >= h {
                    continue;
                }
                if let Some(color) = raster.pixel(sx as u32, sy as u32)
                    && color.0[3] > 0
                {
                    self.canvas.put_pixel(x, y, color);
                }
            }
        }
        Ok(())
    }

    fn draw_line(&mut self, from: Point, to: Point, stroke: Stroke) {
        let (a, b) = (self.transform.apply(from), self.transform.apply(to));
        self.device_line(a, b, stroke);
    }

    fn draw_text(&mut self, text: &str, at: Point, align: TextAlign, color: Rgba<u8>) {
        self.texts.push(TextRun {
            text: text.to_string(),
            position: self.transform.apply(at),
            align,
            color,
        });
    }

    fn draw_ellipse(&mut self, center: Point, radius_x: f64, radius_y: f64, stroke: Stroke) {
        let (rx, ry) = (radius_x.abs(), radius_y.abs());
        let segments = ((rx + ry) * std::f64::consts::PI).ceil().clamp(16.0, 720.0) as usize;
        let points: Vec<Point> = (0..=segments)
            .map(|i| {
                let t = i as f64 / segments as f64 * std::f64::consts::TAU;
                self.transform
                    .apply(Point::new(center.x + rx * t.cos(), center.y + ry * t.sin()))
            })
            .collect();
        self.polyline(&points, stroke);
    }

    fn stroke_rect(&mut self, top_left: Point, width: f64, height: f64, stroke: Stroke) {
        let corners: Vec<Point> = [
            top_left,
            top_left.offset(width, 0.0),
            top_left.offset(width, height),
            top_left.offset(0.0, height),
            top_left,
        ]
        .into_iter()
        .map(|p| self.transform.apply(p))
        .collect();
        self.polyline(&corners, stroke);
    }
}

/// One recorded surface call
#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    SetTransform(Affine),
    ResetTransform,
    Clear(Rgba<u8>),
    Raster { width: u32, height: u32, at: Point },
    Line { from: Point, to: Point, stroke: Stroke },
    Text { text: String, at: Point, align: TextAlign, color: Rgba<u8> },
    Ellipse { center: Point, radius_x: f64, radius_y: f64, stroke: Stroke },
    Rect { top_left: Point, width: f64, height: f64, stroke: Stroke },
}

/// Surface that records every call instead of drawing
#[derive(Debug, Clone, Default)]
pub struct RecordingSurface {
    width: u32,
    height: u32,
    commands: Vec<DrawCommand>,
    fail_rasters: bool,
}

impl RecordingSurface {
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            ..Self::default()
        }
    }

    /// Make every later `draw_raster` call fail
    #[must_use]
    pub fn failing_rasters(mut self) -> Self {
        self.fail_rasters = true;
        self
    }

    #[must_use]
    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    /// Texts drawn so far, in order
    #[must_use]
    pub fn texts(&self) -> Vec<&str> {
        self.commands
            .iter()
            .filter_map(|c| match c {
                DrawCommand::Text { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }
}

impl DrawingSurface for RecordingSurface {
    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn set_transform(&mut self, transform: Affine) {
        self.commands.push(DrawCommand::SetTransform(transform));
    }

    fn reset_transform(&mut self) {
        self.commands.push(DrawCommand::ResetTransform);
    }

    fn clear(&mut self, color: Rgba<u8>) {
        self.commands.push(DrawCommand::Clear(color));
    }

    fn draw_raster(&mut self, raster: &Raster, at: Point) -> Result<(), SurfaceError> {
        if self.fail_rasters {
            return Err(SurfaceError::Backend("raster drawing disabled".to_string()));
        }
        self.commands.push(DrawCommand::Raster {
            width: raster.width(),
            height: raster.height(),
            at,
        });
        Ok(())
    }

    fn draw_line(&mut self, from: Point, to: Point, stroke: Stroke) {
        self.commands.push(DrawCommand::Line { from, to, stroke });
    }

    fn draw_text(&mut self, text: &str, at: Point, align: TextAlign, color: Rgba<u8>) {
        self.commands.push(DrawCommand::Text {
            text: text.to_string(),
            at,
            align,
            color,
        });
    }

    fn draw_ellipse(&mut self, center: Point, radius_x: f64, radius_y: f64, stroke: Stroke) {
        self.commands.push(DrawCommand::Ellipse {
            center,
            radius_x,
            radius_y,
            stroke,
        });
    }

    fn stroke_rect(&mut self, top_left: Point, width: f64, height: f64, stroke: Stroke) {
        self.commands.push(DrawCommand::Rect {
            top_left,
            width,
            height,
            stroke,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::raster::palette;

    #[test]
    fn test_draw_raster_identity() {
        let mut surface = RasterSurface::new(4, 4);
        let tile = Raster::filled(2, 2, palette::WHITE);
        surface.draw_raster(&tile, Point::new(1.0, 1.0)).unwrap();

        let canvas = surface.raster();
        assert_eq!(canvas.pixel(1, 1), Some(palette::WHITE));
        assert_eq!(canvas.pixel(2, 2), Some(palette::WHITE));
        assert_eq!(canvas.pixel(0, 0), Some(palette::BLACK));
        assert_eq!(canvas.pixel(3, 3), Some(palette::BLACK));
    }

    #[test]
    fn test_draw_raster_scaled_about_centre() {
        let mut surface = RasterSurface::new(8, 8);
        surface.set_transform(Affine::IDENTITY.translate(4.0, 4.0).scale(2.0, 2.0));
        let tile = Raster::filled(2, 2, palette::WHITE);
        surface.draw_raster(&tile, Point::new(-1.0, -1.0)).unwrap();

        let canvas = surface.raster();
        assert_eq!(canvas.pixel(2, 2), Some(palette::WHITE));
        assert_eq!(canvas.pixel(5, 5), Some(palette::WHITE));
        assert_eq!(canvas.pixel(1, 1), Some(palette::BLACK));
        assert_eq!(canvas.pixel(6, 6), Some(palette::BLACK));
    }

    #[test]
    fn test_draw_raster_errors() {
        let mut surface = RasterSurface::new(4, 4);
        assert!(matches!(
            surface.draw_raster(&Raster::new(0, 3), Point::default()),
            Err(SurfaceError::EmptyRaster { .. })
        ));

        surface.set_transform(Affine::IDENTITY.scale(0.0, 0.0));
        assert!(matches!(
            surface.draw_raster(&Raster::new(1, 1), Point::default()),
            Err(SurfaceError::SingularTransform)
        ));
    }

    #[test]
    fn test_line_and_rect() {
        let mut surface = RasterSurface::new(10, 10);
        surface.draw_line(Point::new(0.0, 0.0), Point::new(9.0, 9.0), Stroke::new(palette::RED, 1));
        for i in 0..10 {
            assert_eq!(surface.raster().pixel(i, i), Some(palette::RED));
        }

        surface.stroke_rect(Point::new(2.0, 2.0), 5.0, 3.0, Stroke::new(palette::GREEN, 1));
        assert_eq!(surface.raster().pixel(7, 2), Some(palette::GREEN));
        assert_eq!(surface.raster().pixel(2, 5), Some(palette::GREEN));
        assert_eq!(surface.raster().pixel(4, 4), Some(palette::RED));
    }

    #[test]
    fn test_text_runs_follow_transform() {
        let mut surface = RasterSurface::new(10, 10);
        surface.set_transform(Affine::IDENTITY.translate(3.0, 4.0));
        surface.draw_text("hi", Point::new(1.0, 1.0), TextAlign::Left, palette::GREEN);
        assert_eq!(surface.text_runs()[0].position, Point::new(4.0, 5.0));

        surface.clear(palette::BLACK);
        assert!(surface.text_runs().is_empty());
    }

    #[test]
    fn test_recording_surface() {
        let mut surface = RecordingSurface::new(5, 5).failing_rasters();
        surface.clear(palette::BLACK);
        assert!(surface.draw_raster(&Raster::new(1, 1), Point::default()).is_err());
        surface.draw_text("x", Point::default(), TextAlign::Right, palette::GREEN);
        assert_eq!(surface.commands().len(), 2);
        assert_eq!(surface.texts(), vec!["x"]);
    }
}

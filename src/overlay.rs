//! Measurement and annotation overlays
//!
//! All coordinates are canvas-space. Derived quantities (length, angle, area,
//! volume) are computed from the stored points with a fixed millimetre per
//! pixel scale.

use crate::types::Point;
use std::fmt;

/// Creation-order key of an overlay entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OverlayId(u64);

impl fmt::Display for OverlayId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Straight-line length measurement
#[derive(Debug, Clone, PartialEq)]
pub struct Measurement {
    id: OverlayId,
    start: Point,
    end: Point,
    length_mm: f64,
}

impl Measurement {
    fn new(id: OverlayId, start: Point, mm_per_pixel: f64) -> Self {
        Self {
            id,
            start,
            end: start,
            length_mm: 0.0,
        }
        .with_end(start, mm_per_pixel)
    }

    fn with_end(mut self, end: Point, mm_per_pixel: f64) -> Self {
        self.set_end(end, mm_per_pixel);
        self
    }

    fn set_end(&mut self, end: Point, mm_per_pixel: f64) {
        self.end = end;
        self.length_mm = Self::length_between(self.start, end, mm_per_pixel);
    }

    /// Length in millimetres between two canvas points
    #[inline]
    #[must_use]
    pub fn length_between(start: Point, end: Point, mm_per_pixel: f64) -> f64 {
        start.distance(end) * mm_per_pixel
    }

    #[must_use]
    pub fn id(&self) -> OverlayId {
        self.id
    }

    #[must_use]
    pub fn start(&self) -> Point {
        self.start
    }

    #[must_use]
    pub fn end(&self) -> Point {
        self.end
    }

    /// Length kept up to date on every end-point change
    #[must_use]
    pub fn length_mm(&self) -> f64 {
        self.length_mm
    }
}

/// Three-point angle with its vertex at `p2`
#[derive(Debug, Clone, PartialEq)]
pub struct Angle {
    id: OverlayId,
    p1: Point,
    p2: Point,
    p3: Option<Point>,
}

impl Angle {
    #[must_use]
    pub fn id(&self) -> OverlayId {
        self.id
    }

    #[must_use]
    pub fn points(&self) -> (Point, Point, Option<Point>) {
        (self.p1, self.p2, self.p3)
    }

    /// Angle at the vertex in [0, 180], once the third point exists
    #[must_use]
    pub fn degrees(&self) -> Option<f64> {
        self.p3.map(|p3| Self::degrees_between(self.p1, self.p2, p3))
    }

    #[must_use]
    pub fn degrees_between(p1: Point, vertex: Point, p3: Point) -> f64 {
        let a1 = (p1.y - vertex.y).atan2(p1.x - vertex.x);
        let a2 = (p3.y - vertex.y).atan2(p3.x - vertex.x);
        let diff = (a2 - a1).to_degrees().rem_euclid(360.0);
        if diff > 180.0 { 360.0 - diff } else { diff }
    }
}

/// Axis-aligned box spanned by two corners
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub start: Point,
    pub end: Point,
}

impl BoundingBox {
    #[must_use]
    pub fn width(&self) -> f64 {
        (self.end.x - self.start.x).abs()
    }

    #[must_use]
    pub fn height(&self) -> f64 {
        (self.end.y - self.start.y).abs()
    }

    #[must_use]
    pub fn top_left(&self) -> Point {
        Point::new(self.start.x.min(self.end.x), self.start.y.min(self.end.y))
    }

    #[must_use]
    pub fn center(&self) -> Point {
        Point::new(
            (self.start.x + self.end.x) / 2.0,
            (self.start.y + self.end.y) / 2.0,
        )
    }

    /// Area in mm² of the rectangle
    #[must_use]
    pub fn rectangle_area_mm2(&self, mm_per_pixel: f64) -> f64 {
        self.width() * self.height() * mm_per_pixel * mm_per_pixel
    }

    /// Area in mm² of the inscribed ellipse
    #[must_use]
    pub fn ellipse_area_mm2(&self, mm_per_pixel: f64) -> f64 {
        std::f64::consts::PI * (self.width() / 2.0) * (self.height() / 2.0) * mm_per_pixel * mm_per_pixel
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RectangleRoi {
    pub id: OverlayId,
    pub bounds: BoundingBox,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EllipseRoi {
    pub id: OverlayId,
    pub bounds: BoundingBox,
}

/// Rectangle extruded over an assumed number of slices
#[derive(Debug, Clone, PartialEq)]
pub struct VolumeRoi {
    pub id: OverlayId,
    pub bounds: BoundingBox,
    pub slice_count: u32,
}

impl VolumeRoi {
    #[must_use]
    pub fn volume_mm3(&self, mm_per_pixel: f64) -> f64 {
        self.bounds.rectangle_area_mm2(mm_per_pixel) * f64::from(self.slice_count)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
    pub id: OverlayId,
    pub text: String,
    pub position: Point,
}

/// Shapes drawn with a press-drag-release gesture
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapeKind {
    Length,
    Angle,
    Rectangle,
    Ellipse,
    Volume,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Draft {
    Shape(ShapeKind, OverlayId),
    /// Dragging the third point of an existing angle
    AngleArm(OverlayId),
}

/// Kind of entity, for summaries and removal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayKind {
    Length,
    Angle,
    Rectangle,
    Ellipse,
    Volume,
    Annotation,
}

/// One line of the measurement list shown next to the viewer
#[derive(Debug, Clone, PartialEq)]
pub struct OverlaySummary {
    pub id: OverlayId,
    pub kind: OverlayKind,
    pub label: String,
}

/// All overlay entities of the current study
#[derive(Debug, Clone)]
pub struct OverlayModel {
    next_id: u64,
    mm_per_pixel: f64,
    volume_slices: u32,
    show_measurements: bool,
    measurements: Vec<Measurement>,
    angles: Vec<Angle>,
    rectangles: Vec<RectangleRoi>,
    ellipses: Vec<EllipseRoi>,
    volumes: Vec<VolumeRoi>,
    annotations: Vec<Annotation>,
    draft: Option<Draft>,
    /// Angle whose first two points are placed and which waits for its third
    open_angle: Option<OverlayId>,
}

impl Default for OverlayModel {
    fn default() -> Self {
        Self::new(0.1, 10)
    }
}

impl OverlayModel {
    #[must_use]
    pub fn new(mm_per_pixel: f64, volume_slices: u32) -> Self {
        Self {
            next_id: 0,
            mm_per_pixel,
            volume_slices: volume_slices.max(1),
            show_measurements: true,
            measurements: Vec::new(),
            angles: Vec::new(),
            rectangles: Vec::new(),
            ellipses: Vec::new(),
            volumes: Vec::new(),
            annotations: Vec::new(),
            draft: None,
            open_angle: None,
        }
    }

    fn allocate_id(&mut self) -> OverlayId {
        let id = OverlayId(self.next_id);
        self.next_id += 1;
        id
    }

    #[must_use]
    pub fn mm_per_pixel(&self) -> f64 {
        self.mm_per_pixel
    }

    #[must_use]
    pub fn measurements(&self) -> &[Measurement] {
        &self.measurements
    }

    #[must_use]
    pub fn angles(&self) -> &[Angle] {
        &self.angles
    }

    #[must_use]
    pub fn rectangles(&self) -> &[RectangleRoi] {
        &self.rectangles
    }

    #[must_use]
    pub fn ellipses(&self) -> &[EllipseRoi] {
        &self.ellipses
    }

    #[must_use]
    pub fn volumes(&self) -> &[VolumeRoi] {
        &self.volumes
    }

    #[must_use]
    pub fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }

    #[must_use]
    pub fn show_measurements(&self) -> bool {
        self.show_measurements
    }

    pub fn set_show_measurements(&mut self, show: bool) {
        self.show_measurements = show;
    }

    pub fn toggle_show_measurements(&mut self) {
        self.show_measurements = !self.show_measurements;
    }

    /// `true` while a press-drag-release gesture is shaping an entity
    #[must_use]
    pub fn is_drawing(&self) -> bool {
        self.draft.is_some()
    }

    /// Angle waiting for its third point
    #[must_use]
    pub fn open_angle(&self) -> Option<OverlayId> {
        self.open_angle
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.measurements.len()
            + self.angles.len()
            + self.rectangles.len()
            + self.ellipses.len()
            + self.volumes.len()
            + self.annotations.len()
    }

    /// Start a shape at `at` (pointer down)
    ///
    /// For [`ShapeKind::Angle`] a press while an angle waits for its third
    /// point places that point instead of starting a new angle.
    pub fn begin(&mut self, kind: ShapeKind, at: Point) -> OverlayId {
        self.cancel_draft();

        if kind == ShapeKind::Angle
            && let Some(id) = self.open_angle
            && let Some(angle) = self.angles.iter_mut().find(|a| a.id == id)
        {
            angle.p3 = Some(at);
            self.draft = Some(Draft::AngleArm(id));
            return id;
        }

        let id = self.allocate_id();
        let bounds = BoundingBox { start: at, end: at };
        match kind {
            ShapeKind::Length => self
                .measurements
                .push(Measurement::new(id, at, self.mm_per_pixel)),
            ShapeKind::Angle => self.angles.push(Angle {
                id,
                p1: at,
                p2: at,
                p3: None,
            }),
            ShapeKind::Rectangle => self.rectangles.push(RectangleRoi { id, bounds }),
            ShapeKind::Ellipse => self.ellipses.push(EllipseRoi { id, bounds }),
            ShapeKind::Volume => self.volumes.push(VolumeRoi {
                id,
                bounds,
                slice_count: self.volume_slices,
            }),
        }
        self.draft = Some(Draft::Shape(kind, id));
        id
    }

    /// Move the free point of the shape being drawn (pointer move)
    pub fn update(&mut self, to: Point) {
        let mm_per_pixel = self.mm_per_pixel;
        match self.draft {
            Some(Draft::Shape(ShapeKind::Length, id)) => {
                if let Some(m) = self.measurements.iter_mut().find(|m| m.id == id) {
                    m.set_end(to, mm_per_pixel);
                }
            }
            Some(Draft::Shape(ShapeKind::Angle, id)) => {
                if let Some(a) = self.angles.iter_mut().find(|a| a.id == id) {
                    a.p2 = to;
                }
            }
            Some(Draft::AngleArm(id)) => {
                if let Some(a) = self.angles.iter_mut().find(|a| a.id == id) {
                    a.p3 = Some(to);
                }
            }
            Some(Draft::Shape(ShapeKind::Rectangle, id)) => {
                if let Some(r) = self.rectangles.iter_mut().find(|r| r.id == id) {
                    r.bounds.end = to;
                }
            }
            Some(Draft::Shape(ShapeKind::Ellipse, id)) => {
                if let Some(e) = self.ellipses.iter_mut().find(|e| e.id == id) {
                    e.bounds.end = to;
                }
            }
            Some(Draft::Shape(ShapeKind::Volume, id)) => {
                if let Some(v) = self.volumes.iter_mut().find(|v| v.id == id) {
                    v.bounds.end = to;
                }
            }
            None => {}
        }
    }

    /// Finalize the shape being drawn (pointer up)
    pub fn finish(&mut self) -> Option<OverlayId> {
        match self.draft.take()? {
            Draft::Shape(ShapeKind::Angle, id) => {
                self.open_angle = Some(id);
                Some(id)
            }
            Draft::AngleArm(id) => {
                self.open_angle = None;
                Some(id)
            }
            Draft::Shape(_, id) => Some(id),
        }
    }

    /// Discard the shape being drawn; an angle losing its third point goes
    /// back to waiting for it
    pub fn cancel_draft(&mut self) {
        match self.draft.take() {
            Some(Draft::Shape(ShapeKind::Angle, id)) => {
                self.remove(id);
            }
            Some(Draft::AngleArm(id)) => {
                if let Some(a) = self.angles.iter_mut().find(|a| a.id == id) {
                    a.p3 = None;
                }
            }
            Some(Draft::Shape(_, id)) => {
                self.remove(id);
            }
            None => {}
        }
    }

    /// Place a text annotation; blank text creates nothing
    pub fn annotate(&mut self, text: &str, at: Point) -> Option<OverlayId> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        let id = self.allocate_id();
        self.annotations.push(Annotation {
            id,
            text: text.to_string(),
            position: at,
        });
        Some(id)
    }

    /// Remove one entity; `false` if no entity has that id
    pub fn remove(&mut self, id: OverlayId) -> bool {
        let before = self.len();
        self.measurements.retain(|m| m.id != id);
        self.angles.retain(|a| a.id != id);
        self.rectangles.retain(|r| r.id != id);
        self.ellipses.retain(|e| e.id != id);
        self.volumes.retain(|v| v.id != id);
        self.annotations.retain(|a| a.id != id);

        if self.open_angle == Some(id) {
            self.open_angle = None;
        }
        if matches!(self.draft, Some(Draft::Shape(_, d) | Draft::AngleArm(d)) if d == id) {
            self.draft = None;
        }
        self.len() != before
    }

    /// Empty every collection
    pub fn clear(&mut self) {
        self.measurements.clear();
        self.angles.clear();
        self.rectangles.clear();
        self.ellipses.clear();
        self.volumes.clear();
        self.annotations.clear();
        self.draft = None;
        self.open_angle = None;
    }

    /// Labelled list of every entity, in creation order
    #[must_use]
    pub fn summaries(&self) -> Vec<OverlaySummary> {
        let mm = self.mm_per_pixel;
        let mut out: Vec<OverlaySummary> = Vec::with_capacity(self.len());

        out.extend(self.measurements.iter().enumerate().map(|(i, m)| OverlaySummary {
            id: m.id,
            kind: OverlayKind::Length,
            label: format!("Length {}: {:.1} mm", i + 1, m.length_mm),
        }));
        out.extend(self.angles.iter().enumerate().map(|(i, a)| OverlaySummary {
            id: a.id,
            kind: OverlayKind::Angle,
            label: match a.degrees() {
                Some(deg) => format!("Angle {}: {deg:.1}°", i + 1),
                None => format!("Angle {}: pending", i + 1),
            },
        }));
        out.extend(self.rectangles.iter().enumerate().map(|(i, r)| OverlaySummary {
            id: r.id,
            kind: OverlayKind::Rectangle,
            label: format!("ROI {}: {:.1} mm²", i + 1, r.bounds.rectangle_area_mm2(mm)),
        }));
        out.extend(self.ellipses.iter().enumerate().map(|(i, e)| OverlaySummary {
            id: e.id,
            kind: OverlayKind::Ellipse,
            label: format!("Ellipse {}: {:.1} mm²", i + 1, e.bounds.ellipse_area_mm2(mm)),
        }));
        out.extend(self.volumes.iter().enumerate().map(|(i, v)| OverlaySummary {
            id: v.id,
            kind: OverlayKind::Volume,
            label: format!("Volume {}: {:.1} mm³", i + 1, v.volume_mm3(mm)),
        }));
        out.extend(self.annotations.iter().map(|a| OverlaySummary {
            id: a.id,
            kind: OverlayKind::Annotation,
            label: a.text.clone(),
        }));

        out.sort_by_key(|s| s.id);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_length_follows_drag() {
        let mut model = OverlayModel::default();
        let id = model.begin(ShapeKind::Length, Point::new(10.0, 10.0));
        for step in 1..=20 {
            model.update(Point::new(10.0 + f64::from(step) * 3.0, 10.0 + f64::from(step) * 4.0));
            let m = &model.measurements()[0];
            assert_relative_eq!(
                m.length_mm(),
                Measurement::length_between(m.start(), m.end(), model.mm_per_pixel())
            );
        }
        assert_eq!(model.finish(), Some(id));
        // 60/80/100 triangle at 0.1 mm per pixel
        assert_relative_eq!(model.measurements()[0].length_mm(), 10.0);
        assert!(!model.is_drawing());
    }

    #[test]
    fn test_angle_two_gestures() {
        let mut model = OverlayModel::default();
        let id = model.begin(ShapeKind::Angle, Point::new(10.0, 0.0));
        model.update(Point::new(0.0, 0.0));
        model.finish();
        assert_eq!(model.open_angle(), Some(id));
        assert_eq!(model.angles()[0].degrees(), None);

        assert_eq!(model.begin(ShapeKind::Angle, Point::new(5.0, 5.0)), id);
        model.update(Point::new(0.0, 10.0));
        model.finish();
        assert_eq!(model.open_angle(), None);
        assert_eq!(model.angles().len(), 1);
        assert_relative_eq!(model.angles()[0].degrees().unwrap(), 90.0, epsilon = 1e-9);

        // Next press starts a fresh angle
        let next = model.begin(ShapeKind::Angle, Point::new(1.0, 1.0));
        assert_ne!(next, id);
    }

    #[test]
    fn test_angle_folds_into_half_turn() {
        let vertex = Point::new(0.0, 0.0);
        let deg = Angle::degrees_between(Point::new(1.0, 0.0), vertex, Point::new(-1.0, -0.0001));
        assert!(deg <= 180.0 && deg > 179.9);
        let deg = Angle::degrees_between(Point::new(1.0, 0.0), vertex, Point::new(1.0, -1.0));
        assert_relative_eq!(deg, 45.0, epsilon = 1e-9);
    }

    #[test]
    fn test_roi_areas() {
        let bounds = BoundingBox {
            start: Point::new(50.0, 40.0),
            end: Point::new(10.0, 20.0),
        };
        assert_relative_eq!(bounds.rectangle_area_mm2(0.1), 8.0);
        assert_relative_eq!(bounds.ellipse_area_mm2(0.1), std::f64::consts::PI * 20.0 * 10.0 / 100.0);
        assert_eq!(bounds.top_left(), Point::new(10.0, 20.0));

        let mut model = OverlayModel::new(0.1, 10);
        model.begin(ShapeKind::Volume, Point::new(0.0, 0.0));
        model.update(Point::new(100.0, 50.0));
        model.finish();
        assert_relative_eq!(model.volumes()[0].volume_mm3(0.1), 500.0);
        assert_eq!(model.volumes()[0].slice_count, 10);
    }

    #[test]
    fn test_cancel_discards_draft() {
        let mut model = OverlayModel::default();
        model.begin(ShapeKind::Rectangle, Point::new(0.0, 0.0));
        model.update(Point::new(5.0, 5.0));
        model.cancel_draft();
        assert!(model.is_empty());
        assert!(model.finish().is_none());
    }

    #[test]
    fn test_annotate_requires_text() {
        let mut model = OverlayModel::default();
        assert!(model.annotate("   ", Point::new(1.0, 1.0)).is_none());
        let id = model.annotate("lesion", Point::new(1.0, 1.0)).unwrap();
        assert_eq!(model.annotations()[0].text, "lesion");
        assert!(model.remove(id));
        assert!(!model.remove(id));
    }

    #[test]
    fn test_clear_and_summaries() {
        let mut model = OverlayModel::default();
        model.begin(ShapeKind::Ellipse, Point::new(0.0, 0.0));
        model.update(Point::new(20.0, 20.0));
        model.finish();
        model.annotate("note", Point::new(3.0, 3.0));
        model.begin(ShapeKind::Length, Point::new(0.0, 0.0));
        model.update(Point::new(0.0, 25.0));
        model.finish();

        let labels: Vec<String> = model.summaries().into_iter().map(|s| s.label).collect();
        assert_eq!(labels, vec!["Ellipse 1: 3.1 mm²", "note", "Length 1: 2.5 mm"]);

        model.clear();
        assert!(model.is_empty());
        assert!(model.summaries().is_empty());
    }
}

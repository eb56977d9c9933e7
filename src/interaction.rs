//! Pointer and wheel input routed by the active tool
//!
//! All positions are canvas coordinates of the viewport the event hit.

use crate::layout::LayoutManager;
use crate::overlay::{OverlayId, OverlayModel, ShapeKind};
use crate::render::ImageAdjustment;
use crate::store::{Navigation, SliceStore};
use crate::types::Point;
use crate::viewport::ViewportState;
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tool {
    #[default]
    Pan,
    Zoom,
    WindowLevel,
    Length,
    Angle,
    RectangleRoi,
    EllipseRoi,
    VolumeRoi,
    Annotate,
    Crosshair,
}

impl Tool {
    pub const ALL: [Tool; 10] = [
        Tool::Pan,
        Tool::Zoom,
        Tool::WindowLevel,
        Tool::Length,
        Tool::Angle,
        Tool::RectangleRoi,
        Tool::EllipseRoi,
        Tool::VolumeRoi,
        Tool::Annotate,
        Tool::Crosshair,
    ];

    /// Shape drawn by this tool, for the press-drag-release drawing tools
    #[must_use]
    pub fn shape(self) -> Option<ShapeKind> {
        match self {
            Tool::Length => Some(ShapeKind::Length),
            Tool::Angle => Some(ShapeKind::Angle),
            Tool::RectangleRoi => Some(ShapeKind::Rectangle),
            Tool::EllipseRoi => Some(ShapeKind::Ellipse),
            Tool::VolumeRoi => Some(ShapeKind::Volume),
            _ => None,
        }
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Tool::Pan => "pan",
            Tool::Zoom => "zoom",
            Tool::WindowLevel => "window_level",
            Tool::Length => "length",
            Tool::Angle => "angle",
            Tool::RectangleRoi => "rectangle_roi",
            Tool::EllipseRoi => "ellipse_roi",
            Tool::VolumeRoi => "volume_roi",
            Tool::Annotate => "annotate",
            Tool::Crosshair => "crosshair",
        }
    }
}

impl FromStr for Tool {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('-', "_");
        Tool::ALL
            .into_iter()
            .find(|t| t.name() == wanted)
            .ok_or_else(|| format!("unknown tool `{s}`"))
    }
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The state an input event may mutate
#[derive(Debug)]
pub struct Targets<'a> {
    pub viewports: &'a mut [ViewportState],
    /// One entry when the adjustment is shared, otherwise one per viewport
    pub adjustments: &'a mut [ImageAdjustment],
    pub overlays: &'a mut OverlayModel,
    pub layout: &'a mut LayoutManager,
    pub store: &'a SliceStore,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Drag {
    viewport: usize,
    last: Point,
}

/// Active tool plus the gesture currently in progress
#[derive(Debug, Clone)]
pub struct InteractionController {
    tool: Tool,
    sync: bool,
    wheel_zoom_step: f64,
    drag: Option<Drag>,
    annotation_text: Option<String>,
    crosshair: Option<Point>,
}

impl Default for InteractionController {
    fn default() -> Self {
        Self::new(0.1)
    }
}

impl InteractionController {
    #[must_use]
    pub fn new(wheel_zoom_step: f64) -> Self {
        Self {
            tool: Tool::default(),
            sync: false,
            wheel_zoom_step,
            drag: None,
            annotation_text: None,
            crosshair: None,
        }
    }

    #[inline]
    #[must_use]
    pub fn tool(&self) -> Tool {
        self.tool
    }

    #[inline]
    #[must_use]
    pub fn sync(&self) -> bool {
        self.sync
    }

    pub fn set_sync(&mut self, sync: bool) {
        self.sync = sync;
    }

    #[must_use]
    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    /// Switch tools; a gesture still in progress is finalized first
    pub fn select_tool(&mut self, targets: &mut Targets<'_>, tool: Tool) {
        if self.drag.is_some() {
            self.pointer_up(targets);
        }
        debug!("Tool {} -> {tool}", self.tool);
        self.tool = tool;
    }

    /// Text placed by the next annotate click
    pub fn set_annotation_text(&mut self, text: impl Into<String>) {
        self.annotation_text = Some(text.into());
    }

    /// Crosshair point while the crosshair tool is active; the viewport
    /// centre until the tool has been used
    #[must_use]
    pub fn crosshair(&self, width: f64, height: f64) -> Option<Point> {
        (self.tool == Tool::Crosshair)
            .then(|| self.crosshair.unwrap_or(Point::new(width / 2.0, height / 2.0)))
    }

    pub fn pointer_down(&mut self, targets: &mut Targets<'_>, viewport: usize, at: Point) {
        if viewport >= targets.viewports.len() {
            return;
        }
        targets.layout.set_active(viewport);
        if self.drag.is_some() {
            self.pointer_up(targets);
        }

        match self.tool {
            Tool::Annotate => {
                if let Some(text) = self.annotation_text.take() {
                    targets.overlays.annotate(&text, at);
                }
                return;
            }
            Tool::Crosshair => self.crosshair = Some(at),
            tool => {
                if let Some(shape) = tool.shape() {
                    targets.overlays.begin(shape, at);
                }
            }
        }
        self.drag = Some(Drag { viewport, last: at });
    }

    pub fn pointer_move(&mut self, targets: &mut Targets<'_>, at: Point) {
        let Some(drag) = self.drag.as_mut() else {
            return;
        };
        let (dx, dy) = (at.x - drag.last.x, at.y - drag.last.y);
        drag.last = at;
        let viewport = drag.viewport;

        match self.tool {
            Tool::Pan => {
                if self.sync {
                    targets.viewports.iter_mut().for_each(|v| v.pan_by(dx, dy));
                } else if let Some(v) = targets.viewports.get_mut(viewport) {
                    v.pan_by(dx, dy);
                }
            }
            Tool::WindowLevel => {
                let slice = targets
                    .viewports
                    .get(viewport)
                    .and_then(|v| targets.store.get(v.slice_index()));
                let index = if targets.adjustments.len() > 1 { viewport } else { 0 };
                if let Some(adjustment) = targets.adjustments.get_mut(index) {
                    adjustment.drag_window(slice, dx, dy);
                }
            }
            Tool::Crosshair => self.crosshair = Some(at),
            Tool::Zoom | Tool::Annotate => {}
            Tool::Length | Tool::Angle | Tool::RectangleRoi | Tool::EllipseRoi | Tool::VolumeRoi => {
                targets.overlays.update(at);
            }
        }
    }

    /// End the gesture; returns the finalized overlay, if one was drawn
    pub fn pointer_up(&mut self, targets: &mut Targets<'_>) -> Option<OverlayId> {
        self.drag.take()?;
        if targets.overlays.is_drawing() {
            targets.overlays.finish()
        } else {
            None
        }
    }

    /// Drop the gesture in progress, discarding any shape being drawn
    pub fn cancel_gesture(&mut self, targets: &mut Targets<'_>) {
        if self.drag.take().is_some() {
            targets.overlays.cancel_draft();
        }
    }

    /// Wheel over `viewport`; positive notches zoom in or move to the next slice
    pub fn wheel(&mut self, targets: &mut Targets<'_>, viewport: usize, notches: i32) {
        if notches == 0 || viewport >= targets.viewports.len() {
            return;
        }
        let indices: Vec<usize> = if self.sync {
            (0..targets.viewports.len()).collect()
        } else {
            vec![viewport]
        };

        if self.tool == Tool::Zoom {
            let delta = f64::from(notches) * self.wheel_zoom_step;
            for i in indices {
                targets.viewports[i].zoom_by(delta);
            }
        } else {
            for i in indices {
                targets
                    .store
                    .advance(targets.viewports, i, i64::from(notches), Navigation::Clamp);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dicom::{self, synthetic::SyntheticSlice};
    use crate::render::WindowSource;
    use crate::viewport::ZoomRange;
    use approx::assert_relative_eq;

    struct Fixture {
        viewports: Vec<ViewportState>,
        adjustments: Vec<ImageAdjustment>,
        overlays: OverlayModel,
        layout: LayoutManager,
        store: SliceStore,
    }

    impl Fixture {
        fn new(layout_id: &str, slices: usize, zoom_range: ZoomRange) -> Self {
            let mut layout = LayoutManager::new(true, zoom_range);
            let viewports = layout.configure(layout_id);
            let bytes = SyntheticSlice::uniform(4, 4, 500)
                .with_window(400.0, 200.0)
                .to_bytes()
                .unwrap();
            let store =
                SliceStore::from_slices((0..slices).map(|_| dicom::decode(&bytes).unwrap()).collect());
            Self {
                viewports,
                adjustments: vec![ImageAdjustment::default()],
                overlays: OverlayModel::default(),
                layout,
                store,
            }
        }

        fn targets(&mut self) -> Targets<'_> {
            Targets {
                viewports: &mut self.viewports,
                adjustments: &mut self.adjustments,
                overlays: &mut self.overlays,
                layout: &mut self.layout,
                store: &self.store,
            }
        }
    }

    fn drag(
        controller: &mut InteractionController,
        fixture: &mut Fixture,
        viewport: usize,
        from: Point,
        to: Point,
    ) -> Option<OverlayId> {
        controller.pointer_down(&mut fixture.targets(), viewport, from);
        controller.pointer_move(&mut fixture.targets(), to);
        controller.pointer_up(&mut fixture.targets())
    }

    #[test]
    fn test_parse_tools() {
        assert_eq!("window-level".parse::<Tool>().unwrap(), Tool::WindowLevel);
        assert_eq!("Ellipse_ROI".parse::<Tool>().unwrap(), Tool::EllipseRoi);
        assert!("lasso".parse::<Tool>().is_err());
    }

    #[test]
    fn test_pan_without_sync_moves_one_viewport() {
        let mut fixture = Fixture::new("1x2", 3, ZoomRange::default());
        let mut controller = InteractionController::default();

        drag(&mut controller, &mut fixture, 0, Point::new(10.0, 10.0), Point::new(20.0, 15.0));
        assert_eq!(fixture.viewports[0].pan(), (10.0, 5.0));
        assert_eq!(fixture.viewports[1].pan(), (0.0, 0.0));

        controller.set_sync(true);
        drag(&mut controller, &mut fixture, 0, Point::new(0.0, 0.0), Point::new(10.0, 5.0));
        assert_eq!(fixture.viewports[0].pan(), (20.0, 10.0));
        assert_eq!(fixture.viewports[1].pan(), (10.0, 5.0));
    }

    #[test]
    fn test_pointer_down_focuses_viewport() {
        let mut fixture = Fixture::new("2x2", 3, ZoomRange::default());
        let mut controller = InteractionController::default();
        controller.pointer_down(&mut fixture.targets(), 3, Point::new(1.0, 1.0));
        assert_eq!(fixture.layout.active(), 3);
        controller.pointer_up(&mut fixture.targets());

        controller.pointer_down(&mut fixture.targets(), 9, Point::new(1.0, 1.0));
        assert_eq!(fixture.layout.active(), 3);
        assert!(!controller.is_dragging());
    }

    #[test]
    fn test_window_level_drag() {
        let mut fixture = Fixture::new("1x1", 1, ZoomRange::default());
        let mut controller = InteractionController::default();
        controller.select_tool(&mut fixture.targets(), Tool::WindowLevel);

        drag(&mut controller, &mut fixture, 0, Point::new(0.0, 0.0), Point::new(10.0, -20.0));
        let adjustment = fixture.adjustments[0];
        assert_eq!(adjustment.window_source(), WindowSource::Custom);
        // Starts from the native 400/200 window
        assert_relative_eq!(adjustment.window_width(), 220.0);
        assert_relative_eq!(adjustment.window_center(), 410.0);

        // Width never drops below 1
        drag(&mut controller, &mut fixture, 0, Point::new(0.0, 0.0), Point::new(-1000.0, 0.0));
        assert_relative_eq!(fixture.adjustments[0].window_width(), 1.0);
    }

    #[test]
    fn test_wheel_zoom_clamps() {
        let mut fixture = Fixture::new("1x1", 1, ZoomRange::new(0.1, 5.0));
        let mut controller = InteractionController::default();
        controller.select_tool(&mut fixture.targets(), Tool::Zoom);

        for _ in 0..20 {
            controller.wheel(&mut fixture.targets(), 0, 1);
        }
        assert_relative_eq!(fixture.viewports[0].zoom(), 3.0, epsilon = 1e-9);

        for _ in 0..50 {
            controller.wheel(&mut fixture.targets(), 0, 1);
        }
        assert_relative_eq!(fixture.viewports[0].zoom(), 5.0);

        for _ in 0..200 {
            controller.wheel(&mut fixture.targets(), 0, -1);
        }
        assert_relative_eq!(fixture.viewports[0].zoom(), 0.1);
    }

    #[test]
    fn test_wheel_scrolls_slices() {
        let mut fixture = Fixture::new("1x2", 4, ZoomRange::default());
        let mut controller = InteractionController::default();

        controller.wheel(&mut fixture.targets(), 1, 1);
        controller.wheel(&mut fixture.targets(), 1, 1);
        assert_eq!(fixture.viewports[1].slice_index(), 2);
        assert_eq!(fixture.viewports[0].slice_index(), 0);

        controller.set_sync(true);
        controller.wheel(&mut fixture.targets(), 0, 5);
        assert_eq!(fixture.viewports[0].slice_index(), 3);
        assert_eq!(fixture.viewports[1].slice_index(), 3);

        controller.wheel(&mut fixture.targets(), 0, -9);
        assert_eq!(fixture.viewports[0].slice_index(), 0);
    }

    #[test]
    fn test_length_tool_draws_measurement() {
        let mut fixture = Fixture::new("1x1", 1, ZoomRange::default());
        let mut controller = InteractionController::default();
        controller.select_tool(&mut fixture.targets(), Tool::Length);

        let id = drag(&mut controller, &mut fixture, 0, Point::new(0.0, 0.0), Point::new(0.0, 100.0));
        assert!(id.is_some());
        let m = &fixture.overlays.measurements()[0];
        assert_relative_eq!(m.length_mm(), 10.0);
        assert!(!fixture.overlays.is_drawing());
    }

    #[test]
    fn test_angle_takes_two_gestures() {
        let mut fixture = Fixture::new("1x1", 1, ZoomRange::default());
        let mut controller = InteractionController::default();
        controller.select_tool(&mut fixture.targets(), Tool::Angle);

        drag(&mut controller, &mut fixture, 0, Point::new(10.0, 0.0), Point::new(0.0, 0.0));
        assert!(fixture.overlays.angles()[0].degrees().is_none());
        drag(&mut controller, &mut fixture, 0, Point::new(0.0, 5.0), Point::new(0.0, 10.0));

        assert_eq!(fixture.overlays.angles().len(), 1);
        assert_relative_eq!(fixture.overlays.angles()[0].degrees().unwrap(), 90.0, epsilon = 1e-9);
    }

    #[test]
    fn test_cancel_discards_shape() {
        let mut fixture = Fixture::new("1x1", 1, ZoomRange::default());
        let mut controller = InteractionController::default();
        controller.select_tool(&mut fixture.targets(), Tool::RectangleRoi);

        controller.pointer_down(&mut fixture.targets(), 0, Point::new(0.0, 0.0));
        controller.pointer_move(&mut fixture.targets(), Point::new(20.0, 20.0));
        controller.cancel_gesture(&mut fixture.targets());
        assert!(fixture.overlays.is_empty());
        assert!(controller.pointer_up(&mut fixture.targets()).is_none());
    }

    #[test]
    fn test_annotate_uses_pending_text_once() {
        let mut fixture = Fixture::new("1x1", 1, ZoomRange::default());
        let mut controller = InteractionController::default();
        controller.select_tool(&mut fixture.targets(), Tool::Annotate);

        controller.pointer_down(&mut fixture.targets(), 0, Point::new(5.0, 5.0));
        assert!(fixture.overlays.is_empty());

        controller.set_annotation_text("lesion");
        controller.pointer_down(&mut fixture.targets(), 0, Point::new(5.0, 5.0));
        controller.pointer_down(&mut fixture.targets(), 0, Point::new(9.0, 9.0));
        assert_eq!(fixture.overlays.annotations().len(), 1);
        assert_eq!(fixture.overlays.annotations()[0].text, "lesion");
    }

    #[test]
    fn test_crosshair_follows_pointer() {
        let mut fixture = Fixture::new("1x1", 1, ZoomRange::default());
        let mut controller = InteractionController::default();
        assert!(controller.crosshair(100.0, 80.0).is_none());

        controller.select_tool(&mut fixture.targets(), Tool::Crosshair);
        assert_eq!(controller.crosshair(100.0, 80.0), Some(Point::new(50.0, 40.0)));

        drag(&mut controller, &mut fixture, 0, Point::new(1.0, 2.0), Point::new(30.0, 20.0));
        assert_eq!(controller.crosshair(100.0, 80.0), Some(Point::new(30.0, 20.0)));
    }

    #[test]
    fn test_switching_tool_finishes_gesture() {
        let mut fixture = Fixture::new("1x1", 1, ZoomRange::default());
        let mut controller = InteractionController::default();
        controller.select_tool(&mut fixture.targets(), Tool::EllipseRoi);
        controller.pointer_down(&mut fixture.targets(), 0, Point::new(0.0, 0.0));
        controller.pointer_move(&mut fixture.targets(), Point::new(10.0, 10.0));

        controller.select_tool(&mut fixture.targets(), Tool::Pan);
        assert!(!controller.is_dragging());
        assert!(!fixture.overlays.is_drawing());
        assert_eq!(fixture.overlays.ellipses().len(), 1);
    }
}

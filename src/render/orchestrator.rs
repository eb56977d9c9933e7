//! Full-frame rendering of every visible viewport
//!
//! Each viewport is cleared and redrawn from scratch: image layer under the
//! viewport transform, then text, overlays and focus decorations in plain
//! canvas space. A viewport that cannot be drawn gets a placeholder; the
//! frame itself never fails.

use super::intensity::ImageAdjustment;
use super::modes::{self, NON_DIAGNOSTIC_LABEL, RenderMode};
use super::raster::{Raster, palette};
use super::surface::{DrawingSurface, Stroke, SurfaceError, TextAlign};
use crate::overlay::OverlayModel;
use crate::store::SliceStore;
use crate::study::StudyDescriptor;
use crate::types::Point;
use crate::viewport::ViewportState;
use tracing::{debug, error};

const TEXT_LEFT: f64 = 10.0;
const TEXT_TOP: f64 = 20.0;
const LINE_HEIGHT: f64 = 16.0;

const MEASUREMENT: Stroke = Stroke::new(palette::YELLOW, 2);
const ANGLE: Stroke = Stroke::new(palette::MAGENTA, 2);
const RECTANGLE: Stroke = Stroke::new(palette::CYAN, 2);
const ELLIPSE: Stroke = Stroke::new(palette::ORANGE, 2);
const VOLUME: Stroke = Stroke::new(palette::PURPLE, 2);
const VOLUME_DEPTH: Stroke = Stroke::new(palette::PURPLE, 1);
const ANNOTATION: Stroke = Stroke::new(palette::RED, 3);
const ACTIVE_BORDER: Stroke = Stroke::new(palette::GREEN, 3);
const CROSSHAIR: Stroke = Stroke::new(palette::RED, 1);

/// Everything a frame is drawn from
#[derive(Debug, Clone, Copy)]
pub struct FrameInput<'a> {
    pub store: &'a SliceStore,
    pub viewports: &'a [ViewportState],
    /// One entry when the adjustment is shared, otherwise one per viewport
    pub adjustments: &'a [ImageAdjustment],
    pub overlays: &'a OverlayModel,
    pub descriptor: Option<&'a StudyDescriptor>,
    pub active: usize,
    pub mode: RenderMode,
    pub slab_thickness: usize,
    /// Drawn on the active viewport when set
    pub crosshair: Option<Point>,
}

impl FrameInput<'_> {
    fn adjustment(&self, viewport: usize) -> ImageAdjustment {
        self.adjustments
            .get(viewport)
            .or_else(|| self.adjustments.first())
            .copied()
            .unwrap_or_default()
    }
}

/// Why a viewport shows the placeholder
#[derive(Debug, Clone, PartialEq)]
pub enum PlaceholderReason {
    /// The slot at the viewport's index holds no decoded slice
    MissingSlice,
    /// The surface refused the image layer
    Surface(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ViewportOutcome {
    Rendered { slice_index: usize },
    Placeholder { slice_index: usize, reason: PlaceholderReason },
    /// No surface was supplied for this viewport
    Skipped,
}

/// Per-viewport result of one [`render_frame`] call
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FrameReport {
    pub viewports: Vec<ViewportOutcome>,
}

impl FrameReport {
    #[must_use]
    pub fn placeholders(&self) -> usize {
        self.viewports
            .iter()
            .filter(|o| matches!(o, ViewportOutcome::Placeholder { .. }))
            .count()
    }
}

/// Redraw every viewport onto its surface (`surfaces[i]` hosts viewport `i`)
pub fn render_frame<S: DrawingSurface>(input: &FrameInput<'_>, surfaces: &mut [S]) -> FrameReport {
    let multi = input.viewports.len() > 1;
    let viewports = input
        .viewports
        .iter()
        .enumerate()
        .map(|(index, viewport)| match surfaces.get_mut(index) {
            Some(surface) => render_viewport(input, index, viewport, multi, surface),
            None => ViewportOutcome::Skipped,
        })
        .collect();

    FrameReport { viewports }
}

fn render_viewport<S: DrawingSurface>(
    input: &FrameInput<'_>,
    index: usize,
    viewport: &ViewportState,
    multi: bool,
    surface: &mut S,
) -> ViewportOutcome {
    let (width, height) = surface.size();
    let adjustment = input.adjustment(index);
    let slice_index = viewport.slice_index();

    surface.reset_transform();
    surface.clear(if adjustment.invert() { palette::WHITE } else { palette::BLACK });

    let raster = modes::rasterize(
        input.mode,
        input.store,
        slice_index,
        &adjustment,
        input.slab_thickness,
        width,
        height,
    );

    let outcome = match raster {
        Some(raster) => match draw_image_layer(surface, viewport, &raster) {
            Ok(()) => ViewportOutcome::Rendered { slice_index },
            Err(e) => {
                error!(viewport = index, slice = slice_index, "Failed to draw slice: {e}");
                draw_placeholder(surface, slice_index);
                ViewportOutcome::Placeholder {
                    slice_index,
                    reason: PlaceholderReason::Surface(e.to_string()),
                }
            }
        },
        None => {
            debug!(viewport = index, slice = slice_index, "No slice loaded, drawing placeholder");
            draw_placeholder(surface, slice_index);
            ViewportOutcome::Placeholder {
                slice_index,
                reason: PlaceholderReason::MissingSlice,
            }
        }
    };

    draw_info(surface, input, index, viewport, &adjustment, multi);

    if index == input.active {
        draw_overlays(surface, input.overlays);
        if let Some(point) = input.crosshair {
            draw_crosshair(surface, point);
        }
        if multi {
            surface.stroke_rect(
                Point::new(0.0, 0.0),
                f64::from(width),
                f64::from(height),
                ACTIVE_BORDER,
            );
        }
    }

    outcome
}

/// Slice raster under the viewport transform, centred on the origin
fn draw_image_layer<S: DrawingSurface>(
    surface: &mut S,
    viewport: &ViewportState,
    raster: &Raster,
) -> Result<(), SurfaceError> {
    let (width, height) = surface.size();
    let (w, h) = (f64::from(width), f64::from(height));
    surface.set_transform(viewport.transform(w, h));
    let result = surface.draw_raster(raster, Point::new(-w / 2.0, -h / 2.0));
    surface.reset_transform();
    result
}

fn draw_placeholder<S: DrawingSurface>(surface: &mut S, slice_index: usize) {
    let (width, height) = surface.size();
    surface.reset_transform();
    let board = Raster::checkerboard(width, height, 16, palette::gray(24), palette::gray(40));
    if let Err(e) = surface.draw_raster(&board, Point::new(0.0, 0.0)) {
        debug!("Placeholder raster not drawn: {e}");
    }
    surface.draw_text(
        &format!("Slice {} unavailable", slice_index + 1),
        Point::new(TEXT_LEFT, f64::from(height) / 2.0),
        TextAlign::Left,
        palette::gray(200),
    );
}

/// Info lines for one viewport, in draw order
#[must_use]
pub fn info_lines(
    input: &FrameInput<'_>,
    viewport: &ViewportState,
    adjustment: &ImageAdjustment,
) -> Vec<String> {
    let slice = input.store.get(viewport.slice_index());
    let descriptor = input.descriptor;
    let metadata = slice.map(|s| s.metadata());

    let patient = descriptor
        .and_then(|d| d.patient_name.clone())
        .or_else(|| metadata.and_then(|m| m.patient.name.clone()))
        .unwrap_or_else(|| "N/A".to_string());
    let study_id = descriptor
        .map(|d| d.study_id.clone())
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| "N/A".to_string());
    let modality = descriptor
        .and_then(|d| d.modality.clone())
        .or_else(|| metadata.and_then(|m| m.study.modality.clone()))
        .unwrap_or_else(|| "N/A".to_string());
    let window = adjustment.effective_window(slice);

    let mut lines = vec![
        format!("Patient: {patient}"),
        format!("Study ID: {study_id}"),
        format!("Modality: {modality}"),
        format!(
            "Slice: {}/{}",
            viewport.slice_index() + 1,
            input.store.count().max(1)
        ),
        format!("Zoom: {:.0}%", viewport.zoom() * 100.0),
        format!("W/L: {window}"),
    ];
    if !input.mode.is_diagnostic() {
        lines.push(format!("{} {NON_DIAGNOSTIC_LABEL}", input.mode.name().to_uppercase()));
    }
    lines
}

fn draw_info<S: DrawingSurface>(
    surface: &mut S,
    input: &FrameInput<'_>,
    index: usize,
    viewport: &ViewportState,
    adjustment: &ImageAdjustment,
    multi: bool,
) {
    let (width, _) = surface.size();
    let color = if adjustment.invert() { palette::BLACK } else { palette::GREEN };

    for (i, line) in info_lines(input, viewport, adjustment).iter().enumerate() {
        surface.draw_text(
            line,
            Point::new(TEXT_LEFT, TEXT_TOP + i as f64 * LINE_HEIGHT),
            TextAlign::Left,
            color,
        );
    }

    let right = f64::from(width) - TEXT_LEFT;
    if let Some(d) = input.descriptor {
        let age = d.patient_age.as_deref().unwrap_or("?");
        let gender = d.patient_gender.as_deref().unwrap_or("?");
        surface.draw_text(
            &format!("{age}Y {gender}"),
            Point::new(right, TEXT_TOP),
            TextAlign::Right,
            color,
        );
    }
    if multi {
        surface.draw_text(
            &format!("View {}", index + 1),
            Point::new(right, TEXT_TOP + LINE_HEIGHT),
            TextAlign::Right,
            color,
        );
    }
}

fn draw_overlays<S: DrawingSurface>(surface: &mut S, overlays: &OverlayModel) {
    let mm = overlays.mm_per_pixel();

    if overlays.show_measurements() {
        for m in overlays.measurements() {
            surface.draw_line(m.start(), m.end(), MEASUREMENT);
            let mid = Point::new((m.start().x + m.end().x) / 2.0, (m.start().y + m.end().y) / 2.0);
            surface.draw_text(
                &format!("{:.1} mm", m.length_mm()),
                mid.offset(5.0, -5.0),
                TextAlign::Left,
                MEASUREMENT.color,
            );
        }

        for angle in overlays.angles() {
            let (p1, p2, p3) = angle.points();
            surface.draw_line(p1, p2, ANGLE);
            if let Some(p3) = p3 {
                surface.draw_line(p2, p3, ANGLE);
            }
            if let Some(degrees) = angle.degrees() {
                surface.draw_text(
                    &format!("{degrees:.1}°"),
                    p2.offset(35.0, -5.0),
                    TextAlign::Left,
                    ANGLE.color,
                );
            }
        }

        for (i, roi) in overlays.rectangles().iter().enumerate() {
            let origin = roi.bounds.top_left();
            surface.stroke_rect(origin, roi.bounds.width(), roi.bounds.height(), RECTANGLE);
            surface.draw_text(
                &format!("ROI {}: {:.1} mm²", i + 1, roi.bounds.rectangle_area_mm2(mm)),
                origin.offset(5.0, 15.0),
                TextAlign::Left,
                RECTANGLE.color,
            );
        }

        for (i, roi) in overlays.ellipses().iter().enumerate() {
            let center = roi.bounds.center();
            let (rx, ry) = (roi.bounds.width() / 2.0, roi.bounds.height() / 2.0);
            surface.draw_ellipse(center, rx, ry, ELLIPSE);
            surface.draw_text(
                &format!("Ellipse {}: {:.1} mm²", i + 1, roi.bounds.ellipse_area_mm2(mm)),
                center.offset(-40.0, -ry - 10.0),
                TextAlign::Left,
                ELLIPSE.color,
            );
        }

        for (i, roi) in overlays.volumes().iter().enumerate() {
            draw_volume_box(surface, roi.bounds.top_left(), roi.bounds.width(), roi.bounds.height());
            let origin = roi.bounds.top_left();
            surface.draw_text(
                &format!("Volume {}: {:.1} mm³", i + 1, roi.volume_mm3(mm)),
                origin.offset(5.0, 15.0),
                TextAlign::Left,
                VOLUME.color,
            );
            surface.draw_text(
                &format!("Slices: {}", roi.slice_count),
                origin.offset(5.0, 30.0),
                TextAlign::Left,
                VOLUME.color,
            );
        }
    }

    for annotation in overlays.annotations() {
        surface.draw_ellipse(annotation.position.offset(-10.0, -5.0), 3.0, 3.0, ANNOTATION);
        surface.draw_text(
            &annotation.text,
            annotation.position,
            TextAlign::Left,
            ANNOTATION.color,
        );
    }
}

/// Front face, back face shifted by the depth offset, and the four edges
/// joining them
fn draw_volume_box<S: DrawingSurface>(surface: &mut S, origin: Point, width: f64, height: f64) {
    const DEPTH: f64 = 8.0;
    surface.stroke_rect(origin, width, height, VOLUME);
    surface.stroke_rect(origin.offset(DEPTH, -DEPTH), width, height, VOLUME_DEPTH);
    for corner in [
        origin,
        origin.offset(width, 0.0),
        origin.offset(width, height),
        origin.offset(0.0, height),
    ] {
        surface.draw_line(corner, corner.offset(DEPTH, -DEPTH), VOLUME_DEPTH);
    }
}

fn draw_crosshair<S: DrawingSurface>(surface: &mut S, point: Point) {
    let (width, height) = surface.size();
    surface.draw_line(Point::new(point.x, 0.0), Point::new(point.x, f64::from(height)), CROSSHAIR);
    surface.draw_line(Point::new(0.0, point.y), Point::new(f64::from(width), point.y), CROSSHAIR);
}

//! The viewer a UI shell drives
//!
//! [`Viewer`] owns every piece of viewer state and exposes the entry points
//! for toolbar controls, pointer input, playback and rendering. Nothing here
//! runs on its own: the host feeds events and elapsed time, then renders.

use crate::config::{AdjustmentScope, ViewerConfig};
use crate::interaction::{InteractionController, Targets, Tool};
use crate::layout::{Layout, LayoutManager};
use crate::overlay::{OverlayId, OverlayModel, OverlaySummary};
use crate::render::surface::TextRun;
use crate::render::{
    DrawingSurface, FrameInput, FrameReport, ImageAdjustment, Raster, RasterSurface, RenderMode,
    WindowPreset, render_frame,
};
use crate::store::{CineTicker, Navigation, SliceStore};
use crate::study::{LoadReport, LoadedStudy, StudyDescriptor, StudyLoadError, StudyLoader, StudySource};
use crate::types::Point;
use crate::viewport::ViewportState;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Signed-in user, supplied by the host
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Session {
    pub user: String,
    pub role: String,
}

impl Session {
    pub fn new(user: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            role: role.into(),
        }
    }
}

/// Read-only snapshot for an info panel next to the viewer
#[derive(Debug, Clone, PartialEq)]
pub struct InfoPanel {
    pub user: String,
    pub active_viewport: usize,
    pub slice_index: usize,
    pub slice_count: usize,
    pub zoom_percent: f64,
    pub window_center: f64,
    pub window_width: f64,
    pub tool: Tool,
    pub layout: Layout,
    pub mode: RenderMode,
    pub playing: bool,
    pub loaded: usize,
    pub expected: usize,
    pub measurements: Vec<OverlaySummary>,
}

/// One rendered frame composed onto a single canvas
#[derive(Debug, Clone)]
pub struct ComposedFrame {
    pub raster: Raster,
    /// Text in canvas coordinates
    pub texts: Vec<TextRun>,
    pub report: FrameReport,
}

#[derive(Debug)]
pub struct Viewer {
    session: Session,
    config: ViewerConfig,
    descriptor: Option<StudyDescriptor>,
    store: SliceStore,
    report: LoadReport,
    layout: LayoutManager,
    viewports: Vec<ViewportState>,
    adjustments: Vec<ImageAdjustment>,
    overlays: OverlayModel,
    interaction: InteractionController,
    cine: CineTicker,
    mode: RenderMode,
    /// Top-left of the grid cell the last canvas press landed in
    cell_origin: Point,
}

impl Viewer {
    #[must_use]
    pub fn new(session: Session, config: ViewerConfig) -> Self {
        let mut layout = LayoutManager::new(config.features.multi_viewport, config.zoom_range);
        let viewports = layout.apply(Layout::SINGLE);
        let mut interaction = InteractionController::new(config.wheel_zoom_step);
        interaction.set_sync(config.sync);
        debug!(user = %session.user, role = %session.role, "Viewer created");

        Self {
            session,
            descriptor: None,
            store: SliceStore::new(),
            report: LoadReport::default(),
            layout,
            viewports,
            adjustments: vec![ImageAdjustment::default()],
            overlays: OverlayModel::new(config.mm_per_pixel, config.volume_slices),
            interaction,
            cine: CineTicker::new(config.cine_fps),
            mode: RenderMode::Stack,
            cell_origin: Point::default(),
            config,
        }
    }

    /// Load `study_id` from `source` with the configured cap and timeout
    pub fn load(
        &mut self,
        source: Arc<dyn StudySource>,
        study_id: &str,
    ) -> Result<&LoadReport, StudyLoadError> {
        let study = StudyLoader::new(source)
            .with_max_files(self.config.max_files)
            .with_timeout(self.config.fetch_timeout())
            .load(study_id)?;
        self.open(study);
        Ok(&self.report)
    }

    /// Replace the current study
    ///
    /// Playback stops, overlays are cleared, viewports return to their
    /// defaults and the image adjustment follows the native window again.
    pub fn open(&mut self, study: LoadedStudy) {
        info!(
            user = %self.session.user,
            "Opening study {}: {}",
            study.descriptor.study_id,
            study.report
        );
        self.cine.stop();
        self.descriptor = Some(study.descriptor);
        self.store = study.store;
        self.report = study.report;
        self.overlays.clear();
        self.viewports = self.layout.apply(self.layout.layout());
        self.reset_adjustments();
    }

    fn reset_adjustments(&mut self) {
        let count = match self.config.adjustment_scope {
            AdjustmentScope::Shared => 1,
            AdjustmentScope::PerViewport => self.viewports.len(),
        };
        let first = self.store.iter().next().map(|(_, slice)| slice);
        self.adjustments = vec![ImageAdjustment::native_for(first); count];
    }

    fn split(&mut self) -> (&mut InteractionController, Targets<'_>) {
        (
            &mut self.interaction,
            Targets {
                viewports: &mut self.viewports,
                adjustments: &mut self.adjustments,
                overlays: &mut self.overlays,
                layout: &mut self.layout,
                store: &self.store,
            },
        )
    }

    fn adjustment_index(&self, viewport: usize) -> usize {
        if self.adjustments.len() > 1 { viewport } else { 0 }
    }

    fn active_adjustment_mut(&mut self) -> Option<&mut ImageAdjustment> {
        let index = self.adjustment_index(self.layout.active());
        self.adjustments.get_mut(index)
    }

    fn active_viewport_mut(&mut self) -> Option<&mut ViewportState> {
        self.viewports.get_mut(self.layout.active())
    }

    #[must_use]
    pub fn session(&self) -> &Session {
        &self.session
    }

    #[must_use]
    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    #[must_use]
    pub fn descriptor(&self) -> Option<&StudyDescriptor> {
        self.descriptor.as_ref()
    }

    #[must_use]
    pub fn store(&self) -> &SliceStore {
        &self.store
    }

    #[must_use]
    pub fn load_report(&self) -> &LoadReport {
        &self.report
    }

    #[must_use]
    pub fn layout(&self) -> &LayoutManager {
        &self.layout
    }

    #[must_use]
    pub fn viewports(&self) -> &[ViewportState] {
        &self.viewports
    }

    /// Adjustment in force for `viewport`
    #[must_use]
    pub fn adjustment(&self, viewport: usize) -> Option<&ImageAdjustment> {
        self.adjustments.get(self.adjustment_index(viewport))
    }

    #[must_use]
    pub fn overlays(&self) -> &OverlayModel {
        &self.overlays
    }

    #[must_use]
    pub fn tool(&self) -> Tool {
        self.interaction.tool()
    }

    #[must_use]
    pub fn render_mode(&self) -> RenderMode {
        self.mode
    }

    #[must_use]
    pub fn is_playing(&self) -> bool {
        self.cine.is_running()
    }

    /// Switch tools; `false` if the tool is disabled for this viewer
    pub fn select_tool(&mut self, tool: Tool) -> bool {
        if !self.config.features.allows(tool) {
            warn!("Tool {tool} is not enabled");
            return false;
        }
        let (interaction, mut targets) = self.split();
        interaction.select_tool(&mut targets, tool);
        true
    }

    pub fn set_annotation_text(&mut self, text: impl Into<String>) {
        self.interaction.set_annotation_text(text);
    }

    /// Switch layout; every viewport starts over from the defaults
    pub fn select_layout(&mut self, layout_id: &str) -> Layout {
        let (interaction, mut targets) = self.split();
        interaction.cancel_gesture(&mut targets);
        self.viewports = self.layout.configure(layout_id);
        if self.config.adjustment_scope == AdjustmentScope::PerViewport {
            self.reset_adjustments();
        }
        self.layout.layout()
    }

    pub fn set_active_viewport(&mut self, index: usize) -> bool {
        self.layout.set_active(index)
    }

    pub fn set_sync(&mut self, sync: bool) {
        self.interaction.set_sync(sync);
    }

    /// Switch render mode; `false` if special modes are disabled
    pub fn set_render_mode(&mut self, mode: RenderMode) -> bool {
        if !mode.is_diagnostic() && !self.config.features.special_modes {
            warn!("Render mode {mode} is not enabled");
            return false;
        }
        if mode != self.mode {
            // Playback belongs to the stack view
            self.cine.stop();
            self.mode = mode;
        }
        true
    }

    pub fn play(&mut self) {
        if self.store.count() > 1 {
            self.cine.start();
        }
    }

    pub fn stop(&mut self) {
        self.cine.stop();
    }

    pub fn toggle_playback(&mut self) {
        if self.cine.is_running() {
            self.stop();
        } else {
            self.play();
        }
    }

    pub fn set_cine_fps(&mut self, fps: f64) {
        self.cine.set_fps(fps);
    }

    /// Feed elapsed time to cine playback; `true` if any slice changed
    ///
    /// The active viewport plays, or every viewport while sync is on.
    pub fn tick(&mut self, elapsed: Duration) -> bool {
        let frames = self.cine.tick(elapsed);
        if frames == 0 {
            return false;
        }
        let delta = i64::try_from(frames).unwrap_or(i64::MAX);
        let indices: Vec<usize> = if self.interaction.sync() {
            (0..self.viewports.len()).collect()
        } else {
            vec![self.layout.active()]
        };
        for index in indices {
            self.store
                .advance(&mut self.viewports, index, delta, Navigation::Wrap);
        }
        true
    }

    pub fn apply_preset(&mut self, preset: WindowPreset) {
        if let Some(adjustment) = self.active_adjustment_mut() {
            adjustment.apply_preset(preset);
        }
    }

    pub fn set_window(&mut self, center: f64, width: f64) {
        if let Some(adjustment) = self.active_adjustment_mut() {
            adjustment.set_window(center, width);
        }
    }

    pub fn use_native_window(&mut self) {
        if let Some(adjustment) = self.active_adjustment_mut() {
            adjustment.use_native_window();
        }
    }

    pub fn set_brightness(&mut self, brightness: f64) {
        if let Some(adjustment) = self.active_adjustment_mut() {
            adjustment.set_brightness(brightness);
        }
    }

    pub fn set_contrast(&mut self, contrast: f64) {
        if let Some(adjustment) = self.active_adjustment_mut() {
            adjustment.set_contrast(contrast);
        }
    }

    pub fn toggle_invert(&mut self) {
        if let Some(adjustment) = self.active_adjustment_mut() {
            adjustment.toggle_invert();
        }
    }

    pub fn rotate_by(&mut self, degrees: f64) {
        if let Some(viewport) = self.active_viewport_mut() {
            viewport.rotate_by(degrees);
        }
    }

    pub fn flip_horizontal(&mut self) {
        if let Some(viewport) = self.active_viewport_mut() {
            viewport.toggle_flip_horizontal();
        }
    }

    pub fn flip_vertical(&mut self) {
        if let Some(viewport) = self.active_viewport_mut() {
            viewport.toggle_flip_vertical();
        }
    }

    pub fn set_zoom(&mut self, zoom: f64) {
        if let Some(viewport) = self.active_viewport_mut() {
            viewport.set_zoom(zoom);
        }
    }

    /// Jump the active viewport to `index` (clamped)
    pub fn set_slice(&mut self, index: usize) {
        let count = self.store.count();
        if let Some(viewport) = self.active_viewport_mut() {
            viewport.set_slice(index, count);
        }
    }

    pub fn reset_view(&mut self) {
        if let Some(viewport) = self.active_viewport_mut() {
            viewport.reset();
        }
    }

    pub fn toggle_measurements(&mut self) {
        self.overlays.toggle_show_measurements();
    }

    pub fn remove_overlay(&mut self, id: OverlayId) -> bool {
        self.overlays.remove(id)
    }

    pub fn clear_overlays(&mut self) {
        self.overlays.clear();
    }

    /// Pointer press at `at` in the canvas of `viewport`
    pub fn pointer_down(&mut self, viewport: usize, at: Point) {
        let (interaction, mut targets) = self.split();
        interaction.pointer_down(&mut targets, viewport, at);
    }

    /// Pointer press on a single canvas hosting the whole grid
    ///
    /// Returns the viewport hit, if any; `at` is translated into that
    /// viewport's canvas coordinates. Follow up with
    /// [`pointer_move_on_canvas`](Self::pointer_move_on_canvas).
    pub fn pointer_down_on_canvas(&mut self, at: Point, width: u32, height: u32) -> Option<usize> {
        let viewport = self.layout.hit_test(at.x, at.y, width, height)?;
        let cell = self.layout.cell_rect(viewport, width, height)?;
        self.cell_origin = Point::new(f64::from(cell.x), f64::from(cell.y));
        self.pointer_down(viewport, self.to_cell(at));
        Some(viewport)
    }

    /// Pointer motion on the grid canvas, relative to the pressed cell
    pub fn pointer_move_on_canvas(&mut self, at: Point) {
        self.pointer_move(self.to_cell(at));
    }

    fn to_cell(&self, at: Point) -> Point {
        at.offset(-self.cell_origin.x, -self.cell_origin.y)
    }

    pub fn pointer_move(&mut self, at: Point) {
        let (interaction, mut targets) = self.split();
        interaction.pointer_move(&mut targets, at);
    }

    pub fn pointer_up(&mut self) -> Option<OverlayId> {
        let (interaction, mut targets) = self.split();
        interaction.pointer_up(&mut targets)
    }

    /// Abandon the gesture in progress (escape key)
    pub fn cancel_gesture(&mut self) {
        let (interaction, mut targets) = self.split();
        interaction.cancel_gesture(&mut targets);
    }

    pub fn wheel(&mut self, viewport: usize, notches: i32) {
        let (interaction, mut targets) = self.split();
        interaction.wheel(&mut targets, viewport, notches);
    }

    /// Redraw every viewport; `surfaces[i]` hosts viewport `i`
    pub fn render_frame<S: DrawingSurface>(&self, surfaces: &mut [S]) -> FrameReport {
        let active = self.layout.active();
        let crosshair = surfaces.get(active).and_then(|s| {
            let (w, h) = s.size();
            self.interaction.crosshair(f64::from(w), f64::from(h))
        });
        let input = FrameInput {
            store: &self.store,
            viewports: &self.viewports,
            adjustments: &self.adjustments,
            overlays: &self.overlays,
            descriptor: self.descriptor.as_ref(),
            active,
            mode: self.mode,
            slab_thickness: self.config.slab_thickness,
            crosshair,
        };
        render_frame(&input, surfaces)
    }

    /// Render the whole grid onto one `width` x `height` canvas
    #[must_use]
    pub fn render_composed(&self, width: u32, height: u32) -> ComposedFrame {
        let cells: Vec<_> = (0..self.viewports.len())
            .filter_map(|i| self.layout.cell_rect(i, width, height))
            .collect();
        let mut surfaces: Vec<RasterSurface> = cells
            .iter()
            .map(|cell| RasterSurface::new(cell.width, cell.height))
            .collect();
        let report = self.render_frame(&mut surfaces);

        let mut raster = Raster::new(width, height);
        let mut texts = Vec::new();
        for (cell, surface) in cells.iter().zip(surfaces) {
            texts.extend(surface.text_runs().iter().cloned().map(|mut run| {
                run.position = run.position.offset(f64::from(cell.x), f64::from(cell.y));
                run
            }));
            raster.blit(&surface.into_raster(), cell.x, cell.y);
        }

        ComposedFrame {
            raster,
            texts,
            report,
        }
    }

    #[must_use]
    pub fn info_panel(&self) -> InfoPanel {
        let active = self.layout.active();
        let viewport = self.viewports.get(active).cloned().unwrap_or_default();
        let slice = self.store.get(viewport.slice_index());
        let window = self
            .adjustment(active)
            .copied()
            .unwrap_or_default()
            .effective_window(slice);

        InfoPanel {
            user: self.session.user.clone(),
            active_viewport: active,
            slice_index: viewport.slice_index(),
            slice_count: self.store.count(),
            zoom_percent: (viewport.zoom() * 100.0).round(),
            window_center: window.center,
            window_width: window.width,
            tool: self.interaction.tool(),
            layout: self.layout.layout(),
            mode: self.mode,
            playing: self.cine.is_running(),
            loaded: self.report.loaded,
            expected: self.report.expected,
            measurements: self.overlays.summaries(),
        }
    }
}

impl Drop for Viewer {
    fn drop(&mut self) {
        if self.cine.is_running() {
            debug!("Stopping cine playback");
            self.cine.stop();
        }
    }
}

//! Turning decoded slices into pixels

pub mod intensity;
pub mod modes;
pub mod orchestrator;
pub mod raster;
pub mod surface;

pub use intensity::{ImageAdjustment, Window, WindowPreset, WindowSource, map_sample, map_to_raster};
pub use modes::{NON_DIAGNOSTIC_LABEL, RenderMode};
pub use orchestrator::{FrameInput, FrameReport, PlaceholderReason, ViewportOutcome, render_frame};
pub use raster::Raster;
pub use surface::{DrawingSurface, RasterSurface, RecordingSurface, Stroke, SurfaceError, TextAlign};

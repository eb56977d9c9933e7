//! Alternate rasterisation paths
//!
//! Apart from [`RenderMode::Stack`] these are illustrative previews built from
//! the loaded slices without interpolation or physical modelling. They are
//! labelled NON-DIAGNOSTIC wherever they are drawn.

use super::intensity::{ImageAdjustment, map_to_raster};
use super::raster::Raster;
use crate::dicom::Slice;
use crate::store::SliceStore;
use crate::types::Dimensions;
use std::fmt;
use std::str::FromStr;

pub const NON_DIAGNOSTIC_LABEL: &str = "NON-DIAGNOSTIC";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderMode {
    /// The current slice
    #[default]
    Stack,
    /// Axial, sagittal and coronal panes
    Mpr,
    /// Depth-weighted mean of every slice
    Volume,
    /// Maximum intensity over a slab
    Mip,
    /// Minimum intensity over a slab
    Minip,
}

impl RenderMode {
    #[must_use]
    pub fn is_diagnostic(self) -> bool {
        self == RenderMode::Stack
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            RenderMode::Stack => "stack",
            RenderMode::Mpr => "mpr",
            RenderMode::Volume => "volume",
            RenderMode::Mip => "mip",
            RenderMode::Minip => "minip",
        }
    }
}

impl FromStr for RenderMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "stack" | "2d" => Ok(RenderMode::Stack),
            "mpr" => Ok(RenderMode::Mpr),
            "volume" | "3d" => Ok(RenderMode::Volume),
            "mip" => Ok(RenderMode::Mip),
            "minip" => Ok(RenderMode::Minip),
            other => Err(format!("unknown render mode `{other}`")),
        }
    }
}

impl fmt::Display for RenderMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Slice sharing `reference`'s bit depth, window and metadata
fn derived_slice(reference: &Slice, rows: usize, cols: usize, samples: Vec<u16>) -> Option<Slice> {
    let dimensions = Dimensions::new(u16::try_from(rows).ok()?, u16::try_from(cols).ok()?);
    if !dimensions.is_valid() {
        return None;
    }
    Some(Slice::new(
        dimensions,
        reference.bit_depth(),
        samples,
        reference.native_window(),
        reference.metadata().clone(),
    ))
}

/// Loaded slices in `range` whose grid matches `reference`
fn matching<'a>(
    store: &'a SliceStore,
    reference: &Slice,
    range: std::ops::Range<usize>,
) -> Vec<&'a Slice> {
    range
        .filter_map(|i| store.get(i))
        .filter(|s| s.dimensions() == reference.dimensions())
        .collect()
}

/// Rasterise `mode` for the slice at `index`; `None` when that slot is empty
#[must_use]
pub fn rasterize(
    mode: RenderMode,
    store: &SliceStore,
    index: usize,
    adjustment: &ImageAdjustment,
    slab_thickness: usize,
    width: u32,
    height: u32,
) -> Option<Raster> {
    let current = store.get(index)?;
    match mode {
        RenderMode::Stack => Some(map_to_raster(current, adjustment, width, height)),
        RenderMode::Mip | RenderMode::Minip => {
            let projected = slab_projection(store, index, slab_thickness, mode == RenderMode::Mip)?;
            Some(map_to_raster(&projected, adjustment, width, height))
        }
        RenderMode::Volume => {
            let projected = weighted_mean(store, current)?;
            Some(map_to_raster(&projected, adjustment, width, height))
        }
        RenderMode::Mpr => Some(mpr_panes(store, current, adjustment, width, height)),
    }
}

/// Per-pixel max (or min) over `thickness` slices centred on `index`
#[must_use]
pub fn slab_projection(store: &SliceStore, index: usize, thickness: usize, maximum: bool) -> Option<Slice> {
    let current = store.get(index)?;
    let thickness = thickness.max(1);
    let start = index.saturating_sub(thickness / 2);
    let end = (start + thickness).min(store.count());
    let slab = matching(store, current, start..end);

    let samples: Vec<u16> = (0..current.samples().len())
        .map(|i| {
            let values = slab.iter().map(|s| s.samples()[i]);
            if maximum {
                values.max().unwrap_or(0)
            } else {
                values.min().unwrap_or(0)
            }
        })
        .collect();

    derived_slice(current, usize::from(current.rows()), usize::from(current.cols()), samples)
}

/// Mean of every matching slice, later slices weighted more
fn weighted_mean(store: &SliceStore, current: &Slice) -> Option<Slice> {
    let stack = matching(store, current, 0..store.count());
    let weights: Vec<f64> = (1..=stack.len()).map(|k| k as f64).collect();
    let total: f64 = weights.iter().sum();
    if total <= 0.0 {
        return None;
    }

    let samples = (0..current.samples().len())
        .map(|i| {
            let sum: f64 = stack
                .iter()
                .zip(&weights)
                .map(|(s, w)| f64::from(s.samples()[i]) * w)
                .sum();
            (sum / total).round() as u16
        })
        .collect();

    derived_slice(current, usize::from(current.rows()), usize::from(current.cols()), samples)
}

/// Sagittal reslice through the middle column: one row per slice
#[must_use]
pub fn sagittal(store: &SliceStore, reference: &Slice) -> Option<Slice> {
    let stack = matching(store, reference, 0..store.count());
    let col = usize::from(reference.cols()) / 2;
    let rows = usize::from(reference.rows());
    let samples = stack
        .iter()
        .flat_map(|s| (0..rows).map(move |r| s.sample(r, col).unwrap_or(0)))
        .collect();
    derived_slice(reference, stack.len(), rows, samples)
}

/// Coronal reslice through the middle row: one row per slice
#[must_use]
pub fn coronal(store: &SliceStore, reference: &Slice) -> Option<Slice> {
    let stack = matching(store, reference, 0..store.count());
    let row = usize::from(reference.rows()) / 2;
    let cols = usize::from(reference.cols());
    let samples = stack
        .iter()
        .flat_map(|s| (0..cols).map(move |c| s.sample(row, c).unwrap_or(0)))
        .collect();
    derived_slice(reference, stack.len(), cols, samples)
}

/// Axial pane on the left half, sagittal top-right, coronal bottom-right
fn mpr_panes(
    store: &SliceStore,
    current: &Slice,
    adjustment: &ImageAdjustment,
    width: u32,
    height: u32,
) -> Raster {
    let mut canvas = Raster::new(width, height);
    let left = width / 2;
    let right = width - left;
    let top = height / 2;
    let bottom = height - top;

    canvas.blit(&map_to_raster(current, adjustment, left, height), 0, 0);
    if let Some(sag) = sagittal(store, current) {
        canvas.blit(&map_to_raster(&sag, adjustment, right, top), left, 0);
    }
    if let Some(cor) = coronal(store, current) {
        canvas.blit(&map_to_raster(&cor, adjustment, right, bottom), left, top);
    }
    canvas
}

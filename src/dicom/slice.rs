//! Decoded image plane

use crate::types::*;
use super::photometric::PhotometricInterpretation;

/// Fallback window when the file carries none
pub const DEFAULT_WINDOW_CENTER: f64 = 128.0;
pub const DEFAULT_WINDOW_WIDTH: f64 = 256.0;

/// Window center/width embedded in a file
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NativeWindow {
    pub center: f64,
    pub width: f64,
    /// False when the defaults were substituted
    pub from_file: bool,
}

impl Default for NativeWindow {
    fn default() -> Self {
        Self {
            center: DEFAULT_WINDOW_CENTER,
            width: DEFAULT_WINDOW_WIDTH,
            from_file: false,
        }
    }
}

/// Informational metadata. Never consulted by windowing.
#[derive(Debug, Clone)]
pub struct SliceMetadata {
    pub patient: PatientInfo,
    pub study: StudyInfo,
    pub series: SeriesInfo,
    pub pixel_spacing: PixelSpacing,
    pub rescale: RescaleParams,
    pub photometric_interpretation: PhotometricInterpretation,
    pub samples_per_pixel: u16,
    pub pixel_representation: u16,
    pub number_of_frames: u32,
    pub sop_class: Option<SOPClass>,
    pub transfer_syntax: TransferSyntax,
}

/// One decoded, single-channel image plane. Immutable once built.
#[derive(Debug, Clone)]
pub struct Slice {
    dimensions: Dimensions,
    bit_depth: BitDepth,
    samples: Box<[u16]>,
    window: NativeWindow,
    metadata: SliceMetadata,
}

impl Slice {
    /// Assemble a slice; `samples.len()` must equal `rows × cols`
    pub(crate) fn new(
        dimensions: Dimensions,
        bit_depth: BitDepth,
        samples: Vec<u16>,
        window: NativeWindow,
        metadata: SliceMetadata,
    ) -> Self {
        debug_assert_eq!(samples.len(), dimensions.pixel_count());
        Self {
            dimensions,
            bit_depth,
            samples: samples.into_boxed_slice(),
            window,
            metadata,
        }
    }

    #[inline(always)]
    #[must_use]
    pub fn rows(&self) -> u16 {
        self.dimensions.rows
    }

    #[inline(always)]
    #[must_use]
    pub fn cols(&self) -> u16 {
        self.dimensions.cols
    }

    #[inline]
    #[must_use]
    pub fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    #[inline]
    #[must_use]
    pub fn bits_allocated(&self) -> u16 {
        self.bit_depth.allocated
    }

    #[inline]
    #[must_use]
    pub fn bit_depth(&self) -> BitDepth {
        self.bit_depth
    }

    /// Raw samples, row-major, one per pixel
    #[inline]
    #[must_use]
    pub fn samples(&self) -> &[u16] {
        &self.samples
    }

    /// Sample at (`row`, `col`), `None` outside the grid
    #[inline]
    #[must_use]
    pub fn sample(&self, row: usize, col: usize) -> Option<u16> {
        let cols = usize::from(self.dimensions.cols);
        if row >= usize::from(self.dimensions.rows) || col >= cols {
            return None;
        }
        self.samples.get(row * cols + col).copied()
    }

    #[inline]
    #[must_use]
    pub fn native_window(&self) -> NativeWindow {
        self.window
    }

    #[inline]
    #[must_use]
    pub fn metadata(&self) -> &SliceMetadata {
        &self.metadata
    }
}

//! Window/level intensity mapping
//!
//! Raw samples are mapped to 8-bit gray through the window, then contrast and
//! brightness are applied, then optional inversion. Nothing here keeps state
//! between calls, so a frame can be re-rendered any number of times.

use super::raster::{Raster, palette};
use crate::dicom::Slice;
use std::fmt;
use std::str::FromStr;

/// Smallest window width an adjustment will hold
pub const MIN_WINDOW_WIDTH: f64 = 1.0;

/// A window in raw sample units
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Window {
    pub center: f64,
    pub width: f64,
}

impl Window {
    #[must_use]
    pub fn new(center: f64, width: f64) -> Self {
        Self {
            center,
            width: width.max(MIN_WINDOW_WIDTH),
        }
    }

    /// (lower, upper) bounds of the linear ramp
    #[inline]
    #[must_use]
    pub fn bounds(&self) -> (f64, f64) {
        let half = self.width / 2.0;
        (self.center - half, self.center + half)
    }
}

impl fmt::Display for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.0}/{:.0}", self.width, self.center)
    }
}

/// Whether the file-native window or the user's window is in force
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WindowSource {
    /// Each slice is shown with the window embedded in its file
    #[default]
    Native,
    /// The adjustment's own center/width, set by an explicit user action
    Custom,
}

/// CT window presets (center, width)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowPreset {
    Lung,
    Bone,
    Brain,
    SoftTissue,
    Liver,
    Default,
}

impl WindowPreset {
    pub const ALL: [WindowPreset; 6] = [
        WindowPreset::Lung,
        WindowPreset::Bone,
        WindowPreset::Brain,
        WindowPreset::SoftTissue,
        WindowPreset::Liver,
        WindowPreset::Default,
    ];

    #[must_use]
    pub fn window(self) -> Window {
        match self {
            WindowPreset::Lung => Window::new(-600.0, 1500.0),
            WindowPreset::Bone => Window::new(300.0, 2000.0),
            WindowPreset::Brain => Window::new(40.0, 80.0),
            WindowPreset::SoftTissue => Window::new(40.0, 350.0),
            WindowPreset::Liver => Window::new(30.0, 150.0),
            WindowPreset::Default => Window::new(40.0, 400.0),
        }
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            WindowPreset::Lung => "lung",
            WindowPreset::Bone => "bone",
            WindowPreset::Brain => "brain",
            WindowPreset::SoftTissue => "soft",
            WindowPreset::Liver => "liver",
            WindowPreset::Default => "default",
        }
    }
}

impl FromStr for WindowPreset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lung" => Ok(WindowPreset::Lung),
            "bone" => Ok(WindowPreset::Bone),
            "brain" => Ok(WindowPreset::Brain),
            "soft" | "soft-tissue" | "soft_tissue" | "softtissue" => Ok(WindowPreset::SoftTissue),
            "liver" => Ok(WindowPreset::Liver),
            "default" => Ok(WindowPreset::Default),
            other => Err(format!("unknown window preset `{other}`")),
        }
    }
}

impl fmt::Display for WindowPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Display adjustment applied on top of the raw samples
///
/// `window_width` is kept at or above [`MIN_WINDOW_WIDTH`] by every mutator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImageAdjustment {
    window_center: f64,
    window_width: f64,
    brightness: f64,
    contrast: f64,
    invert: bool,
    window_source: WindowSource,
}

impl Default for ImageAdjustment {
    fn default() -> Self {
        Self {
            window_center: crate::dicom::DEFAULT_WINDOW_CENTER,
            window_width: crate::dicom::DEFAULT_WINDOW_WIDTH,
            brightness: 0.0,
            contrast: 1.0,
            invert: false,
            window_source: WindowSource::Native,
        }
    }
}

impl ImageAdjustment {
    /// Adjustment that follows the native window of each slice, seeded with
    /// `slice`'s window for display before the first override
    #[must_use]
    pub fn native_for(slice: Option<&Slice>) -> Self {
        let mut adjustment = Self::default();
        if let Some(native) = slice.map(Slice::native_window) {
            adjustment.window_center = native.center;
            adjustment.window_width = native.width.max(MIN_WINDOW_WIDTH);
        }
        adjustment
    }

    #[inline]
    #[must_use]
    pub fn window_center(&self) -> f64 {
        self.window_center
    }

    #[inline]
    #[must_use]
    pub fn window_width(&self) -> f64 {
        self.window_width
    }

    #[inline]
    #[must_use]
    pub fn brightness(&self) -> f64 {
        self.brightness
    }

    #[inline]
    #[must_use]
    pub fn contrast(&self) -> f64 {
        self.contrast
    }

    #[inline]
    #[must_use]
    pub fn invert(&self) -> bool {
        self.invert
    }

    #[inline]
    #[must_use]
    pub fn window_source(&self) -> WindowSource {
        self.window_source
    }

    /// The window used for `slice`: its native window while the source is
    /// [`WindowSource::Native`], the custom window otherwise
    #[must_use]
    pub fn effective_window(&self, slice: Option<&Slice>) -> Window {
        match (self.window_source, slice) {
            (WindowSource::Native, Some(slice)) => {
                let native = slice.native_window();
                Window::new(native.center, native.width)
            }
            _ => Window::new(self.window_center, self.window_width),
        }
    }

    /// Explicit user window; switches to [`WindowSource::Custom`]
    pub fn set_window(&mut self, center: f64, width: f64) {
        if !center.is_finite() || !width.is_finite() {
            return;
        }
        self.window_center = center;
        self.window_width = width.max(MIN_WINDOW_WIDTH);
        self.window_source = WindowSource::Custom;
    }

    /// Window-level drag: width grows by `dx * 2`, center drops by `dy * 0.5`,
    /// starting from whatever window `slice` is currently shown with
    pub fn drag_window(&mut self, slice: Option<&Slice>, dx: f64, dy: f64) {
        let current = self.effective_window(slice);
        self.set_window(current.center - dy * 0.5, current.width + dx * 2.0);
    }

    pub fn apply_preset(&mut self, preset: WindowPreset) {
        let window = preset.window();
        self.set_window(window.center, window.width);
    }

    /// Return to each slice's native window
    pub fn use_native_window(&mut self) {
        self.window_source = WindowSource::Native;
    }

    pub fn set_brightness(&mut self, brightness: f64) {
        if brightness.is_finite() {
            self.brightness = brightness.clamp(-255.0, 255.0);
        }
    }

    pub fn set_contrast(&mut self, contrast: f64) {
        if contrast.is_finite() {
            self.contrast = contrast.max(0.0);
        }
    }

    pub fn set_invert(&mut self, invert: bool) {
        self.invert = invert;
    }

    pub fn toggle_invert(&mut self) {
        self.invert = !self.invert;
    }
}

/// Map one raw sample to its displayed gray level
#[inline]
#[must_use]
pub fn map_sample(value: u16, window: Window, adjustment: &ImageAdjustment) -> u8 {
    let (lower, upper) = window.bounds();
    let value = f64::from(value);

    let windowed = if value <= lower {
        0.0
    } else if value >= upper {
        255.0
    } else {
        (value - lower) / window.width * 255.0
    };

    let adjusted = windowed
        .mul_add(adjustment.contrast, adjustment.brightness)
        .clamp(0.0, 255.0);
    let gray = adjusted.round() as u8;

    if adjustment.invert { 255 - gray } else { gray }
}

/// Resample `slice` (nearest neighbour) to `width` x `height` and window it
///
/// Source indices falling outside the slice map to opaque black.
#[must_use]
pub fn map_to_raster(slice: &Slice, adjustment: &ImageAdjustment, width: u32, height: u32) -> Raster {
    let window = adjustment.effective_window(Some(slice));
    if width == 0 || height == 0 {
        return Raster::new(width, height);
    }

    let scale_x = f64::from(slice.cols()) / f64::from(width);
    let scale_y = f64::from(slice.rows()) / f64::from(height);

    Raster::from_fn(width, height, |x, y| {
        let sx = (f64::from(x) * scale_x).floor() as usize;
        let sy = (f64::from(y) * scale_y).floor() as usize;
        slice
            .sample(sy, sx)
            .map_or(palette::BLACK, |value| palette::gray(map_sample(value, window, adjustment)))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dicom::{self, synthetic::SyntheticSlice};
    use approx::assert_relative_eq;

    fn slice(rows: u16, cols: u16, samples: Vec<u16>) -> Slice {
        dicom::decode(&SyntheticSlice::with_samples(rows, cols, samples).to_bytes().unwrap()).unwrap()
    }

    fn custom(center: f64, width: f64) -> ImageAdjustment {
        let mut adjustment = ImageAdjustment::default();
        adjustment.set_window(center, width);
        adjustment
    }

    #[test]
    fn test_soft_tissue_boundary_maps_to_white() {
        let adjustment = custom(40.0, 400.0);
        let window = adjustment.effective_window(None);
        assert_eq!(map_sample(240, window, &adjustment), 255);
        assert_eq!(map_sample(0, window, &adjustment), 102);
        assert_eq!(map_sample(40, window, &adjustment), 128);
    }

    #[test]
    fn test_outside_window_saturates() {
        let adjustment = custom(1000.0, 200.0);
        let window = adjustment.effective_window(None);
        assert_eq!(map_sample(900, window, &adjustment), 0);
        assert_eq!(map_sample(0, window, &adjustment), 0);
        assert_eq!(map_sample(1100, window, &adjustment), 255);
        assert_eq!(map_sample(u16::MAX, window, &adjustment), 255);
    }

    #[test]
    fn test_monotonic_within_window() {
        for (center, width) in [(40.0, 400.0), (-600.0, 1500.0), (2048.0, 1.0), (512.5, 37.0)] {
            let adjustment = custom(center, width);
            let window = adjustment.effective_window(None);
            let mut previous = 0u8;
            for value in 0..=4096u16 {
                let gray = map_sample(value, window, &adjustment);
                assert!(gray >= previous, "not monotonic at {value} for {center}/{width}");
                previous = gray;
            }
        }
    }

    #[test]
    fn test_contrast_brightness_invert() {
        let mut adjustment = custom(128.0, 256.0);
        adjustment.set_contrast(2.0);
        adjustment.set_brightness(-10.0);
        let window = adjustment.effective_window(None);
        // 64 -> 63.75 -> 117.5 -> 118
        assert_eq!(map_sample(64, window, &adjustment), 118);

        adjustment.toggle_invert();
        assert_eq!(map_sample(64, window, &adjustment), 137);
        assert_eq!(map_sample(0, window, &adjustment), 255);
    }

    #[test]
    fn test_window_width_never_below_one() {
        let mut adjustment = custom(100.0, -50.0);
        assert_relative_eq!(adjustment.window_width(), MIN_WINDOW_WIDTH);

        adjustment.drag_window(None, -1000.0, 0.0);
        assert_relative_eq!(adjustment.window_width(), MIN_WINDOW_WIDTH);

        adjustment.set_window(f64::NAN, 10.0);
        assert_relative_eq!(adjustment.window_center(), 100.0);
    }

    #[test]
    fn test_drag_starts_from_native_window() {
        let s = dicom::decode(
            &SyntheticSlice::uniform(2, 2, 0)
                .with_window(40.0, 400.0)
                .to_bytes()
                .unwrap(),
        )
        .unwrap();

        let mut adjustment = ImageAdjustment::native_for(Some(&s));
        assert_eq!(adjustment.window_source(), WindowSource::Native);

        adjustment.drag_window(Some(&s), 10.0, 20.0);
        assert_eq!(adjustment.window_source(), WindowSource::Custom);
        assert_relative_eq!(adjustment.window_width(), 420.0);
        assert_relative_eq!(adjustment.window_center(), 30.0);
    }

    #[test]
    fn test_custom_window_equal_to_defaults_stays_custom() {
        let s = dicom::decode(
            &SyntheticSlice::uniform(2, 2, 0)
                .with_window(40.0, 400.0)
                .to_bytes()
                .unwrap(),
        )
        .unwrap();

        let adjustment = custom(128.0, 256.0);
        let window = adjustment.effective_window(Some(&s));
        assert_relative_eq!(window.center, 128.0);
        assert_relative_eq!(window.width, 256.0);
    }

    #[test]
    fn test_presets() {
        assert_eq!("lung".parse::<WindowPreset>().unwrap(), WindowPreset::Lung);
        assert_eq!("Soft-Tissue".parse::<WindowPreset>().unwrap(), WindowPreset::SoftTissue);
        assert!("spine".parse::<WindowPreset>().is_err());

        let mut adjustment = ImageAdjustment::default();
        adjustment.apply_preset(WindowPreset::Bone);
        assert_relative_eq!(adjustment.window_center(), 300.0);
        assert_relative_eq!(adjustment.window_width(), 2000.0);
        assert_eq!(adjustment.window_source(), WindowSource::Custom);
    }

    #[test]
    fn test_map_to_raster_resamples_nearest() {
        let s = slice(2, 2, vec![0, 255, 255, 0]);
        let adjustment = custom(127.5, 255.0);

        let raster = map_to_raster(&s, &adjustment, 4, 4);
        assert_eq!(raster.pixel(0, 0), Some(palette::gray(0)));
        assert_eq!(raster.pixel(1, 1), Some(palette::gray(0)));
        assert_eq!(raster.pixel(2, 0), Some(palette::gray(255)));
        assert_eq!(raster.pixel(3, 3), Some(palette::gray(0)));
        assert_eq!(raster.pixel(0, 3), Some(palette::gray(255)));
    }

    #[test]
    fn test_map_to_raster_is_repeatable() {
        let s = slice(3, 5, (0..15).map(|v| v * 100).collect());
        let adjustment = custom(700.0, 900.0);
        let first = map_to_raster(&s, &adjustment, 7, 11);
        let second = map_to_raster(&s, &adjustment, 7, 11);
        assert_eq!(first, second);
        assert!(first.data().chunks_exact(4).all(|px| px[0] == px[1] && px[1] == px[2] && px[3] == 255));
    }
}

//! Domain-specific value types shared by the decoder, the renderer and the
//! interaction layer

use dicom::transfer_syntax::entries;
use std::fmt;

/// DICOM transfer syntax (UID, name)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferSyntax {
    pub uid: String,
    pub name: String,
}

impl TransferSyntax {
    #[must_use]
    pub fn new(uid: String, name: String) -> Self {
        Self { uid, name }
    }

    #[inline]
    #[must_use]
    #[allow(deprecated)] // Explicit VR Big Endian is retired but still in use
    pub fn is_big_endian(&self) -> bool {
        self.uid == entries::EXPLICIT_VR_BIG_ENDIAN.uid()
    }
}

impl fmt::Display for TransferSyntax {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{name} ({uid})", name = self.name, uid = self.uid)
    }
}

/// SOP Class (UID, name)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SOPClass {
    pub uid: String,
    pub name: String,
}

impl SOPClass {
    #[must_use]
    pub fn new(uid: String, name: String) -> Self {
        Self { uid, name }
    }
}

impl fmt::Display for SOPClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{name} ({uid})", name = self.name, uid = self.uid)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub rows: u16,
    pub cols: u16,
}

impl Dimensions {
    #[must_use]
    pub fn new(rows: u16, cols: u16) -> Self {
        Self { rows, cols }
    }

    #[inline]
    #[must_use]
    pub fn pixel_count(&self) -> usize {
        usize::from(self.rows) * usize::from(self.cols)
    }

    #[inline]
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.rows > 0 && self.cols > 0
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{cols}x{rows}", cols = self.cols, rows = self.rows)
    }
}

/// Rescale parameters for converting pixel values to real units
///
/// Carried as metadata only: windowing operates on the raw samples.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RescaleParams {
    pub slope: f64,
    pub intercept: f64,
}

impl RescaleParams {
    #[must_use]
    pub fn new(slope: f64, intercept: f64) -> Self {
        Self { slope, intercept }
    }

    #[inline]
    #[must_use]
    pub fn apply(&self, pixel: u16) -> f64 {
        f64::from(pixel).mul_add(self.slope, self.intercept)
    }
}

impl Default for RescaleParams {
    fn default() -> Self {
        Self::new(1.0, 0.0)
    }
}

impl fmt::Display for RescaleParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "slope={slope}, intercept={intercept}",
            slope = self.slope,
            intercept = self.intercept
        )
    }
}

/// Physical distance between pixel centres, in millimetres (row, column)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelSpacing {
    pub row: f64,
    pub col: f64,
}

impl PixelSpacing {
    #[must_use]
    pub fn new(row: f64, col: f64) -> Self {
        Self { row, col }
    }
}

impl Default for PixelSpacing {
    fn default() -> Self {
        Self::new(1.0, 1.0)
    }
}

impl fmt::Display for PixelSpacing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{row}\\{col}", row = self.row, col = self.col)
    }
}

/// Bit depth information for pixel data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitDepth {
    pub allocated: u16,
    pub stored: u16,
    pub high_bit: u16,
}

impl BitDepth {
    #[must_use]
    pub fn new(allocated: u16, stored: u16, high_bit: u16) -> Self {
        Self {
            allocated,
            stored,
            high_bit,
        }
    }

    #[inline]
    #[must_use]
    pub fn bytes_per_sample(&self) -> usize {
        usize::from(self.allocated / 8)
    }
}

impl fmt::Display for BitDepth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{stored}/{allocated} bits",
            stored = self.stored,
            allocated = self.allocated
        )
    }
}

/// Patient information metadata
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatientInfo {
    pub name: Option<String>,
    pub id: Option<String>,
}

/// Study information metadata
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StudyInfo {
    pub date: Option<String>,
    pub description: Option<String>,
    pub modality: Option<String>,
}

/// Series and per-image positional metadata
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesInfo {
    pub description: Option<String>,
    pub instance_number: Option<i32>,
    pub slice_location: f64,
    pub slice_thickness: f64,
}

impl Default for SeriesInfo {
    fn default() -> Self {
        Self {
            description: None,
            instance_number: None,
            slice_location: 0.0,
            slice_thickness: 1.0,
        }
    }
}

/// A position on a viewport canvas (or in image space after inversion)
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    #[inline]
    #[must_use]
    pub fn distance(&self, other: Point) -> f64 {
        (other.x - self.x).hypot(other.y - self.y)
    }

    #[inline]
    #[must_use]
    pub fn offset(&self, dx: f64, dy: f64) -> Point {
        Point::new(self.x + dx, self.y + dy)
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.1}, {:.1})", self.x, self.y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_dimensions() {
        let dims = Dimensions::new(4, 3);
        assert_eq!(dims.pixel_count(), 12);
        assert!(dims.is_valid());
        assert!(!Dimensions::new(0, 3).is_valid());
        assert_eq!(dims.to_string(), "3x4");
    }

    #[test]
    fn test_point_distance() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(30.0, 40.0);
        assert_relative_eq!(a.distance(b), 50.0);
        assert_eq!(a.offset(1.0, -2.0), Point::new(1.0, -2.0));
    }

    #[test]
    fn test_rescale_apply() {
        let rescale = RescaleParams::new(2.0, -1024.0);
        assert_relative_eq!(rescale.apply(1000), 976.0);
        assert_eq!(RescaleParams::default(), RescaleParams::new(1.0, 0.0));
    }
}

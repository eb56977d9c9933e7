use std::str::FromStr;

/// Photometric interpretation describes the color space of pixel data
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhotometricInterpretation {
    /// Grayscale where min value = white, max value = black
    Monochrome1,
    /// Grayscale where min value = black, max value = white
    Monochrome2,
    /// RGB color space (interleaved or planar)
    Rgb,
    /// YCbCr; like RGB, reduced to the integer mean of the three samples
    YbrFull,
    YbrFull422,
    /// Palette color, indices treated as intensities
    Palette,
    /// Unknown photometric interpretation
    Unknown(String),
}

impl FromStr for PhotometricInterpretation {
    type Err = ();

    /// Parse photometric interpretation from DICOM string
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim() {
            "MONOCHROME1" => Self::Monochrome1,
            "MONOCHROME2" => Self::Monochrome2,
            "RGB" => Self::Rgb,
            "YBR_FULL" => Self::YbrFull,
            "YBR_FULL_422" => Self::YbrFull422,
            "PALETTE COLOR" => Self::Palette,
            other => Self::Unknown(other.to_string()),
        })
    }
}

impl PhotometricInterpretation {
    #[inline]
    #[must_use]
    pub fn is_grayscale(&self) -> bool {
        matches!(self, Self::Monochrome1 | Self::Monochrome2)
    }

    #[inline]
    #[must_use]
    pub fn is_ycbcr(&self) -> bool {
        matches!(self, Self::YbrFull | Self::YbrFull422)
    }

    /// Number of samples per pixel this interpretation normally carries
    #[must_use]
    pub fn expected_samples(&self) -> Option<u16> {
        match self {
            Self::Monochrome1 | Self::Monochrome2 | Self::Palette => Some(1),
            Self::Rgb | Self::YbrFull | Self::YbrFull422 => Some(3),
            Self::Unknown(_) => None,
        }
    }
}

impl std::fmt::Display for PhotometricInterpretation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Monochrome1 => write!(f, "MONOCHROME1"),
            Self::Monochrome2 => write!(f, "MONOCHROME2"),
            Self::Rgb => write!(f, "RGB"),
            Self::YbrFull => write!(f, "YBR_FULL"),
            Self::YbrFull422 => write!(f, "YBR_FULL_422"),
            Self::Palette => write!(f, "PALETTE COLOR"),
            Self::Unknown(s) => write!(f, "{s}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        let pi = PhotometricInterpretation::from_str("MONOCHROME2 ").unwrap();
        assert_eq!(pi, PhotometricInterpretation::Monochrome2);
        assert!(pi.is_grayscale());
        assert_eq!(pi.to_string(), "MONOCHROME2");

        let unknown = PhotometricInterpretation::from_str("HSV").unwrap();
        assert_eq!(unknown, PhotometricInterpretation::Unknown("HSV".to_string()));
        assert_eq!(unknown.expected_samples(), None);
    }

    #[test]
    fn test_expected_samples() {
        assert_eq!(PhotometricInterpretation::Rgb.expected_samples(), Some(3));
        assert_eq!(PhotometricInterpretation::YbrFull422.expected_samples(), Some(3));
        assert_eq!(PhotometricInterpretation::Palette.expected_samples(), Some(1));
    }
}

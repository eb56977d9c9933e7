use super::error::DecodeError;
use super::photometric::PhotometricInterpretation;

#[inline]
pub fn validate_bits_allocated(bits_allocated: u16) -> Result<(), DecodeError> {
    if !matches!(bits_allocated, 8 | 16) {
        return Err(DecodeError::UnsupportedFormat(format!(
            "bits allocated {bits_allocated} (expected 8 or 16)"
        )));
    }

    Ok(())
}

#[inline]
pub fn validate_samples_per_pixel(samples_per_pixel: u16) -> Result<(), DecodeError> {
    if !matches!(samples_per_pixel, 1 | 3) {
        return Err(DecodeError::UnsupportedFormat(format!(
            "samples per pixel {samples_per_pixel} (expected 1 or 3)"
        )));
    }

    Ok(())
}

/// Photometric interpretation and sample count must agree when the
/// interpretation is a known one
#[inline]
pub fn validate_photometric_samples(
    photometric_interpretation: &PhotometricInterpretation,
    samples_per_pixel: u16,
) -> Result<(), DecodeError> {
    match photometric_interpretation.expected_samples() {
        Some(expected) if expected != samples_per_pixel => Err(DecodeError::UnsupportedFormat(
            format!(
                "{photometric_interpretation} with {samples_per_pixel} samples per pixel"
            ),
        )),
        _ => Ok(()),
    }
}

pub fn validate_layout(
    photometric_interpretation: &PhotometricInterpretation,
    samples_per_pixel: u16,
    bits_allocated: u16,
) -> Result<(), DecodeError> {
    validate_bits_allocated(bits_allocated)?;
    validate_samples_per_pixel(samples_per_pixel)?;
    validate_photometric_samples(photometric_interpretation, samples_per_pixel)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_bits_allocated() {
        assert!(validate_bits_allocated(8).is_ok());
        assert!(validate_bits_allocated(16).is_ok());
        assert_matches!(
            validate_bits_allocated(32),
            Err(DecodeError::UnsupportedFormat(_))
        );
        assert_matches!(
            validate_bits_allocated(12),
            Err(DecodeError::UnsupportedFormat(_))
        );
    }

    #[test]
    fn test_layout() {
        use PhotometricInterpretation::*;

        assert!(validate_layout(&Monochrome2, 1, 16).is_ok());
        assert!(validate_layout(&Rgb, 3, 8).is_ok());
        assert!(validate_layout(&Unknown("HSV".into()), 3, 8).is_ok());
        assert_matches!(
            validate_layout(&Monochrome1, 3, 16),
            Err(DecodeError::UnsupportedFormat(_))
        );
        assert_matches!(
            validate_layout(&Rgb, 4, 8),
            Err(DecodeError::UnsupportedFormat(_))
        );
    }
}

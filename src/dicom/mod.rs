//! DICOM decoding
//!
//! This module turns the raw bytes of one DICOM file into a [`Slice`]: the
//! image geometry, one single-channel sample per pixel, the window embedded
//! in the file and informational metadata.

mod error;
mod parser;
mod photometric;
mod pixel_data;
mod slice;
pub mod synthetic;
mod validation;

// Re-export public API
pub use error::DecodeError;
pub use photometric::PhotometricInterpretation;
pub use slice::{DEFAULT_WINDOW_CENTER, DEFAULT_WINDOW_WIDTH, NativeWindow, Slice, SliceMetadata};

use dicom::dictionary_std::tags;
use dicom::object::file::ReadPreamble;
use dicom::object::{DefaultDicomObject, OpenFileOptions};
use pixel_data::PixelLayout;
use std::path::Path;

const PREAMBLE_LEN: usize = 128;
const MAGIC: &[u8; 4] = b"DICM";

/// Skip the 128-byte preamble when the magic code follows it
fn strip_preamble(bytes: &[u8]) -> &[u8] {
    match bytes.get(PREAMBLE_LEN..PREAMBLE_LEN + MAGIC.len()) {
        Some(magic) if magic == MAGIC => &bytes[PREAMBLE_LEN..],
        _ => bytes,
    }
}

/// Parse a DICOM object from an in-memory file
pub fn open_dicom_bytes(bytes: &[u8]) -> Result<DefaultDicomObject, DecodeError> {
    OpenFileOptions::new()
        .read_preamble(ReadPreamble::Never)
        .from_reader(strip_preamble(bytes))
        .map_err(|e| DecodeError::Unreadable(e.to_string()))
}

/// Decode one file's bytes into a slice
///
/// Pure: no state outside the returned value is touched.
pub fn decode(bytes: &[u8]) -> Result<Slice, DecodeError> {
    let obj = open_dicom_bytes(bytes)?;
    decode_object(&obj)
}

/// Read and decode a file from disk
pub fn decode_file(path: &Path) -> Result<Slice, DecodeError> {
    let bytes = std::fs::read(path)
        .map_err(|e| DecodeError::Unreadable(format!("{}: {e}", path.display())))?;
    decode(&bytes)
}

/// Extract geometry, samples, window and metadata from a parsed object
pub fn decode_object(obj: &DefaultDicomObject) -> Result<Slice, DecodeError> {
    let dimensions = parser::extract_dimensions(obj)?;

    if obj.get(tags::PIXEL_DATA).is_none() {
        return Err(DecodeError::MissingPixelData);
    }

    let bit_depth = parser::extract_bit_depth(obj);
    let samples_per_pixel = parser::extract_samples_per_pixel(obj);
    let photometric_interpretation = parser::extract_photometric_interpretation(obj);
    validation::validate_layout(
        &photometric_interpretation,
        samples_per_pixel,
        bit_depth.allocated,
    )?;

    let transfer_syntax = parser::extract_transfer_syntax(obj);
    let number_of_frames = parser::extract_number_of_frames(obj);
    let layout = PixelLayout {
        dimensions,
        bits_allocated: bit_depth.allocated,
        samples_per_pixel,
        planar_configuration: parser::extract_planar_configuration(obj),
        number_of_frames,
        big_endian: transfer_syntax.is_big_endian(),
    };
    let samples = pixel_data::extract_samples(obj, &layout)?;

    let metadata = SliceMetadata {
        patient: parser::extract_patient_info(obj),
        study: parser::extract_study_info(obj),
        series: parser::extract_series_info(obj),
        pixel_spacing: parser::extract_pixel_spacing(obj),
        rescale: parser::extract_rescale_params(obj),
        photometric_interpretation,
        samples_per_pixel,
        pixel_representation: parser::extract_pixel_representation(obj),
        number_of_frames,
        sop_class: parser::extract_sop_class(obj),
        transfer_syntax,
    };

    Ok(Slice::new(
        dimensions,
        bit_depth,
        samples,
        parser::extract_window(obj),
        metadata,
    ))
}

#[cfg(test)]
mod tests {
    use super::synthetic::SyntheticSlice;
    use super::*;
    use approx::assert_relative_eq;
    use assert_matches::assert_matches;

    #[test]
    fn test_decode_gradient() {
        let bytes = SyntheticSlice::gradient(16, 12)
            .with_window(2048.0, 4096.0)
            .with_patient("DOE^JANE", "P-17")
            .with_modality("MR")
            .to_bytes()
            .unwrap();

        let slice = decode(&bytes).unwrap();
        assert_eq!(slice.rows(), 16);
        assert_eq!(slice.cols(), 12);
        assert_eq!(slice.bits_allocated(), 16);
        assert_eq!(slice.samples().len(), 16 * 12);
        assert_eq!(slice.sample(0, 0), Some(0));
        assert_eq!(slice.sample(15, 11), Some(4095));
        assert_eq!(slice.sample(16, 0), None);

        let window = slice.native_window();
        assert!(window.from_file);
        assert_relative_eq!(window.center, 2048.0);
        assert_relative_eq!(window.width, 4096.0);

        let metadata = slice.metadata();
        assert_eq!(metadata.patient.name.as_deref(), Some("DOE^JANE"));
        assert_eq!(metadata.patient.id.as_deref(), Some("P-17"));
        assert_eq!(metadata.study.modality.as_deref(), Some("MR"));
        assert_eq!(metadata.transfer_syntax.uid, "1.2.840.10008.1.2.1");
        assert_eq!(
            metadata.photometric_interpretation,
            PhotometricInterpretation::Monochrome2
        );
        assert_eq!(
            metadata.sop_class.as_ref().map(|sc| sc.name.as_str()),
            Some("CT Image Storage")
        );
    }

    #[test]
    fn test_decode_without_preamble() {
        let bytes = SyntheticSlice::uniform(4, 4, 900)
            .without_preamble()
            .to_bytes()
            .unwrap();

        let slice = decode(&bytes).unwrap();
        assert!(slice.samples().iter().all(|&s| s == 900));
    }

    #[test]
    fn test_decode_eight_bit() {
        let bytes = SyntheticSlice::eight_bit(2, 4, vec![0, 10, 20, 30, 40, 50, 60, 255])
            .to_bytes()
            .unwrap();

        let slice = decode(&bytes).unwrap();
        assert_eq!(slice.bits_allocated(), 8);
        assert_eq!(slice.samples(), &[0, 10, 20, 30, 40, 50, 60, 255]);
    }

    #[test]
    fn test_decode_rgb_reduces_to_mean() {
        let interleaved = vec![255, 0, 0, 30, 60, 90];
        let slice = decode(
            &SyntheticSlice::rgb(1, 2, interleaved, false)
                .to_bytes()
                .unwrap(),
        )
        .unwrap();
        assert_eq!(slice.samples(), &[85, 60]);
        assert_eq!(slice.metadata().samples_per_pixel, 3);

        let planar = vec![255, 30, 0, 60, 0, 90];
        let slice = decode(&SyntheticSlice::rgb(1, 2, planar, true).to_bytes().unwrap()).unwrap();
        assert_eq!(slice.samples(), &[85, 60]);
    }

    #[test]
    fn test_multi_frame_keeps_first_frame() {
        let mut samples = vec![1u16; 4];
        samples.extend([2u16; 4]);
        let bytes = SyntheticSlice::with_samples(2, 2, samples)
            .with_frames(2)
            .to_bytes()
            .unwrap();

        let slice = decode(&bytes).unwrap();
        assert_eq!(slice.samples(), &[1, 1, 1, 1]);
        assert_eq!(slice.metadata().number_of_frames, 2);
    }

    #[test]
    fn test_frame_count_must_match_payload() {
        let bytes = SyntheticSlice::with_samples(2, 2, vec![1; 4])
            .with_frames(2)
            .to_bytes()
            .unwrap();
        assert_matches!(decode(&bytes), Err(DecodeError::MalformedPixelData(_)));
    }

    #[test]
    fn test_window_falls_back_to_defaults() {
        let absent = decode(&SyntheticSlice::uniform(2, 2, 0).to_bytes().unwrap()).unwrap();
        assert_eq!(absent.native_window(), NativeWindow::default());

        let garbage = SyntheticSlice::uniform(2, 2, 0)
            .with_window_text("abc", "400")
            .to_bytes()
            .unwrap();
        let window = decode(&garbage).unwrap().native_window();
        assert!(!window.from_file);
        assert_relative_eq!(window.center, DEFAULT_WINDOW_CENTER);
        assert_relative_eq!(window.width, DEFAULT_WINDOW_WIDTH);

        let zero_width = SyntheticSlice::uniform(2, 2, 0)
            .with_window(40.0, 0.0)
            .to_bytes()
            .unwrap();
        assert!(!decode(&zero_width).unwrap().native_window().from_file);
    }

    #[test]
    fn test_multi_valued_window_uses_first() {
        let bytes = SyntheticSlice::uniform(2, 2, 0)
            .with_window_text("40\\-600", "400\\1500")
            .to_bytes()
            .unwrap();

        let window = decode(&bytes).unwrap().native_window();
        assert!(window.from_file);
        assert_relative_eq!(window.center, 40.0);
        assert_relative_eq!(window.width, 400.0);
    }

    #[test]
    fn test_missing_dimensions() {
        let bytes = SyntheticSlice::uniform(4, 4, 1)
            .omitting(tags::ROWS)
            .to_bytes()
            .unwrap();
        assert_matches!(
            decode(&bytes),
            Err(DecodeError::MissingDimensions { tag: "Rows" })
        );

        let bytes = SyntheticSlice::uniform(4, 0, 1).to_bytes().unwrap();
        assert_matches!(
            decode(&bytes),
            Err(DecodeError::MissingDimensions { tag: "Columns" })
        );
    }

    #[test]
    fn test_missing_pixel_data() {
        let bytes = SyntheticSlice::uniform(4, 4, 1)
            .without_pixel_data()
            .to_bytes()
            .unwrap();
        assert_matches!(decode(&bytes), Err(DecodeError::MissingPixelData));
    }

    #[test]
    fn test_malformed_pixel_data_length() {
        let short = SyntheticSlice::with_samples(4, 4, vec![0; 10])
            .to_bytes()
            .unwrap();
        assert_matches!(decode(&short), Err(DecodeError::MalformedPixelData(_)));

        let long = SyntheticSlice::eight_bit(2, 2, vec![0; 12])
            .to_bytes()
            .unwrap();
        assert_matches!(decode(&long), Err(DecodeError::MalformedPixelData(_)));
    }

    #[test]
    fn test_unsupported_bit_depth() {
        let bytes = SyntheticSlice::with_samples(2, 2, vec![0; 8])
            .with_bits_allocated(32)
            .to_bytes()
            .unwrap();
        assert_matches!(decode(&bytes), Err(DecodeError::UnsupportedFormat(_)));
    }

    #[test]
    fn test_truncated_and_garbage_buffers() {
        let bytes = SyntheticSlice::gradient(32, 32).to_bytes().unwrap();
        let truncated = &bytes[..bytes.len() - 700];
        assert!(decode(truncated).is_err());

        assert_matches!(decode(&[]), Err(DecodeError::Unreadable(_)));
        assert_matches!(
            decode(b"definitely not a DICOM file"),
            Err(DecodeError::Unreadable(_))
        );
    }
}

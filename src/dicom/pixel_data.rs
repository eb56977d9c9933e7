//! DICOM pixel data extraction
//!
//! This module turns the Pixel Data element into one single-channel `u16`
//! sample per pixel for the first frame, whatever the storage: native words,
//! native bytes (either endianness) or encapsulated (compressed) fragments.

use super::error::DecodeError;
use crate::types::Dimensions;
use dicom::core::PrimitiveValue;
use dicom::core::value::DicomValueType;
use dicom::dictionary_std::tags;
use dicom::object::DefaultDicomObject;
use dicom_pixeldata::PixelDecoder;

/// Header facts needed to interpret the payload
#[derive(Debug, Clone, Copy)]
pub struct PixelLayout {
    pub dimensions: Dimensions,
    pub bits_allocated: u16,
    pub samples_per_pixel: u16,
    pub planar_configuration: u16,
    pub number_of_frames: u32,
    pub big_endian: bool,
}

impl PixelLayout {
    /// Stored values (not pixels) in one frame
    #[inline]
    #[must_use]
    pub fn values_per_frame(&self) -> usize {
        self.dimensions.pixel_count() * usize::from(self.samples_per_pixel)
    }

    #[inline]
    #[must_use]
    pub fn values_total(&self) -> usize {
        self.values_per_frame() * self.number_of_frames as usize
    }
}

/// Extract the first frame as single-channel samples
pub fn extract_samples(
    obj: &DefaultDicomObject,
    layout: &PixelLayout,
) -> Result<Vec<u16>, DecodeError> {
    let element = obj
        .get(tags::PIXEL_DATA)
        .ok_or(DecodeError::MissingPixelData)?;

    let values = match element.value().primitive() {
        Some(value) => native_values(value, layout)?,
        // Encapsulated fragments: hand over to the codec registry
        None => decoded_values(obj, layout)?,
    };

    if values.len() != layout.values_total() {
        return Err(DecodeError::MalformedPixelData(format!(
            "expected {} values ({} x {} x {} samples x {} frames), found {}",
            layout.values_total(),
            layout.dimensions.rows,
            layout.dimensions.cols,
            layout.samples_per_pixel,
            layout.number_of_frames,
            values.len()
        )));
    }

    Ok(to_single_channel(&values[..layout.values_per_frame()], layout))
}

fn native_values(value: &PrimitiveValue, layout: &PixelLayout) -> Result<Vec<u16>, DecodeError> {
    match (value, layout.bits_allocated) {
        (PrimitiveValue::U16(words), 16) => Ok(words.to_vec()),
        (PrimitiveValue::U8(bytes), 8) => Ok(widen_bytes(bytes, layout.values_total())),
        (PrimitiveValue::U8(bytes), 16) => pair_bytes(bytes, layout.big_endian),
        (PrimitiveValue::U16(words), 8) => {
            // 8-bit samples declared as OW: the byte stream is what matters
            let bytes: Vec<u8> = words.iter().flat_map(|w| w.to_le_bytes()).collect();
            Ok(widen_bytes(&bytes, layout.values_total()))
        }
        (PrimitiveValue::Empty, _) => Err(DecodeError::MalformedPixelData(
            "pixel data element is empty".to_string(),
        )),
        (other, bits) => Err(DecodeError::MalformedPixelData(format!(
            "unexpected {:?} value for {bits}-bit pixel data",
            other.value_type()
        ))),
    }
}

/// Decode encapsulated pixel data (JPEG, RLE, ...)
fn decoded_values(obj: &DefaultDicomObject, layout: &PixelLayout) -> Result<Vec<u16>, DecodeError> {
    let decoded = obj
        .decode_pixel_data()
        .map_err(|e| DecodeError::MalformedPixelData(format!("failed to decode pixel data: {e}")))?;

    let data = decoded.data();
    match layout.bits_allocated {
        8 => Ok(widen_bytes(data, layout.values_total())),
        // Decoded buffers are always native little-endian
        _ => pair_bytes(data, false),
    }
}

/// One value per byte, dropping the single pad byte odd-length values carry
fn widen_bytes(bytes: &[u8], expected: usize) -> Vec<u16> {
    let bytes = if bytes.len() == expected + 1 && expected % 2 == 1 {
        &bytes[..expected]
    } else {
        bytes
    };
    bytes.iter().map(|&b| u16::from(b)).collect()
}

fn pair_bytes(bytes: &[u8], big_endian: bool) -> Result<Vec<u16>, DecodeError> {
    if !bytes.len().is_multiple_of(2) {
        return Err(DecodeError::MalformedPixelData(format!(
            "odd byte count {} for 16-bit pixel data",
            bytes.len()
        )));
    }

    Ok(bytes
        .chunks_exact(2)
        .map(|pair| {
            if big_endian {
                u16::from_be_bytes([pair[0], pair[1]])
            } else {
                u16::from_le_bytes([pair[0], pair[1]])
            }
        })
        .collect())
}

/// Collapse 3-sample pixels (RGB or YBR) to their integer mean; single-sample
/// data passes through
fn to_single_channel(values: &[u16], layout: &PixelLayout) -> Vec<u16> {
    if layout.samples_per_pixel == 1 {
        return values.to_vec();
    }

    let pixels = layout.dimensions.pixel_count();
    let mean = |a: u16, b: u16, c: u16| ((u32::from(a) + u32::from(b) + u32::from(c)) / 3) as u16;

    if layout.planar_configuration == 1 {
        let (r, rest) = values.split_at(pixels);
        let (g, b) = rest.split_at(pixels);
        (0..pixels).map(|i| mean(r[i], g[i], b[i])).collect()
    } else {
        values
            .chunks_exact(3)
            .map(|rgb| mean(rgb[0], rgb[1], rgb[2]))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout(rows: u16, cols: u16, bits: u16, spp: u16) -> PixelLayout {
        PixelLayout {
            dimensions: Dimensions::new(rows, cols),
            bits_allocated: bits,
            samples_per_pixel: spp,
            planar_configuration: 0,
            number_of_frames: 1,
            big_endian: false,
        }
    }

    #[test]
    fn test_widen_bytes_drops_pad_byte() {
        // 3x3 8-bit image is stored padded to 10 bytes
        let bytes = [1u8, 2, 3, 4, 5, 6, 7, 8, 9, 0];
        assert_eq!(widen_bytes(&bytes, 9).len(), 9);
        assert_eq!(widen_bytes(&bytes[..4], 4), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_pair_bytes_endianness() {
        let bytes = [0x01, 0x02, 0xff, 0x00];
        assert_eq!(pair_bytes(&bytes, false).unwrap(), vec![0x0201, 0x00ff]);
        assert_eq!(pair_bytes(&bytes, true).unwrap(), vec![0x0102, 0xff00]);
        assert!(pair_bytes(&bytes[..3], false).is_err());
    }

    #[test]
    fn test_rgb_interleaved_to_single_channel() {
        let values = [30u16, 60, 90, 0, 0, 3];
        let l = layout(1, 2, 8, 3);
        assert_eq!(to_single_channel(&values, &l), vec![60, 1]);
    }

    #[test]
    fn test_rgb_planar_to_single_channel() {
        // R plane, G plane, B plane for two pixels
        let values = [30u16, 0, 60, 0, 90, 3];
        let mut l = layout(1, 2, 8, 3);
        l.planar_configuration = 1;
        assert_eq!(to_single_channel(&values, &l), vec![60, 1]);
    }

    #[test]
    fn test_native_values_rejects_empty() {
        let l = layout(2, 2, 16, 1);
        let result = native_values(&PrimitiveValue::Empty, &l);
        assert!(matches!(result, Err(DecodeError::MalformedPixelData(_))));
    }

    #[test]
    fn test_values_total_counts_frames() {
        let mut l = layout(2, 3, 16, 1);
        l.number_of_frames = 4;
        assert_eq!(l.values_per_frame(), 6);
        assert_eq!(l.values_total(), 24);
    }
}

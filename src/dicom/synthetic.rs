//! In-memory DICOM file synthesis
//!
//! Builds small but complete DICOM files (preamble, file meta group, image
//! pixel module) with the `dicom` object writer. The demo study, the test
//! suites and the benchmarks all decode these instead of checked-in binaries.

use anyhow::{Context, Result};
use dicom::core::{DataElement, PrimitiveValue, Tag, VR};
use dicom::dictionary_std::{tags, uids};
use dicom::object::mem::InMemElement;
use dicom::object::{FileMetaTableBuilder, InMemDicomObject};

/// Raw value stored in the Pixel Data element
#[derive(Debug, Clone)]
enum Payload {
    Words(Vec<u16>),
    Bytes(Vec<u8>),
}

/// Builder for one synthetic single-frame (or multi-frame) DICOM file
#[derive(Debug, Clone)]
pub struct SyntheticSlice {
    rows: u16,
    cols: u16,
    bits_allocated: u16,
    samples_per_pixel: u16,
    planar_configuration: u16,
    number_of_frames: Option<u32>,
    payload: Option<Payload>,
    window: Option<(String, String)>,
    rescale: Option<(f64, f64)>,
    patient_name: String,
    patient_id: String,
    modality: String,
    study_description: Option<String>,
    instance_number: Option<i32>,
    slice_location: Option<f64>,
    omitted: Vec<Tag>,
    preamble: bool,
}

impl SyntheticSlice {
    /// A 16-bit monochrome slice holding the given samples (row-major)
    #[must_use]
    pub fn with_samples(rows: u16, cols: u16, samples: Vec<u16>) -> Self {
        Self {
            rows,
            cols,
            bits_allocated: 16,
            samples_per_pixel: 1,
            planar_configuration: 0,
            number_of_frames: None,
            payload: Some(Payload::Words(samples)),
            window: None,
            rescale: None,
            patient_name: "DEMO^PATIENT".to_string(),
            patient_id: "DEMO-0001".to_string(),
            modality: "CT".to_string(),
            study_description: None,
            instance_number: None,
            slice_location: None,
            omitted: Vec::new(),
            preamble: true,
        }
    }

    /// Every pixel set to `value`
    #[must_use]
    pub fn uniform(rows: u16, cols: u16, value: u16) -> Self {
        Self::with_samples(rows, cols, vec![value; usize::from(rows) * usize::from(cols)])
    }

    /// Diagonal ramp from 0 (top-left) to 4095 (bottom-right)
    #[must_use]
    pub fn gradient(rows: u16, cols: u16) -> Self {
        let span = (u32::from(rows) + u32::from(cols)).saturating_sub(2).max(1);
        let samples = (0..rows)
            .flat_map(|r| (0..cols).map(move |c| (u32::from(r) + u32::from(c)) * 4095 / span))
            .map(|v| v as u16)
            .collect();
        Self::with_samples(rows, cols, samples)
    }

    /// An 8-bit monochrome slice
    #[must_use]
    pub fn eight_bit(rows: u16, cols: u16, bytes: Vec<u8>) -> Self {
        let mut slice = Self::with_samples(rows, cols, Vec::new());
        slice.bits_allocated = 8;
        slice.payload = Some(Payload::Bytes(bytes));
        slice
    }

    /// An 8-bit RGB slice; `planar` selects plane-by-plane sample order
    #[must_use]
    pub fn rgb(rows: u16, cols: u16, bytes: Vec<u8>, planar: bool) -> Self {
        let mut slice = Self::eight_bit(rows, cols, bytes);
        slice.samples_per_pixel = 3;
        slice.planar_configuration = u16::from(planar);
        slice
    }

    /// Axial phantom for slice `index` of `count`: air background, a soft
    /// tissue disc whose radius follows the slice position, a bone ring and a
    /// dense marker that moves with the index.
    ///
    /// Raw values use a CT-style intercept of -1024.
    #[must_use]
    pub fn phantom(rows: u16, cols: u16, index: usize, count: usize) -> Self {
        let (h, w) = (f64::from(rows), f64::from(cols));
        let (cy, cx) = (h / 2.0, w / 2.0);
        let depth = (index as f64 + 0.5) / count.max(1) as f64;
        let body = (w.min(h) * 0.45) * (1.0 - (2.0 * depth - 1.0).powi(2)).sqrt().max(0.2);
        let marker_angle = depth * std::f64::consts::TAU;
        let (my, mx) = (
            cy + body * 0.5 * marker_angle.sin(),
            cx + body * 0.5 * marker_angle.cos(),
        );

        let mut samples = Vec::with_capacity(usize::from(rows) * usize::from(cols));
        for r in 0..rows {
            for c in 0..cols {
                let (y, x) = (f64::from(r) + 0.5, f64::from(c) + 0.5);
                let d = (y - cy).hypot(x - cx);
                let value = if (y - my).hypot(x - mx) < body * 0.12 {
                    2500
                } else if d < body * 0.92 {
                    (1064.0 + (x - cx) * 0.3) as u16
                } else if d < body {
                    2024
                } else {
                    24
                };
                samples.push(value);
            }
        }

        Self::with_samples(rows, cols, samples)
            .with_rescale(1.0, -1024.0)
            .with_window(1064.0, 400.0)
            .with_instance_number(index as i32 + 1)
            .with_slice_location(index as f64 * 2.5)
    }

    #[must_use]
    pub fn with_window(self, center: f64, width: f64) -> Self {
        self.with_window_text(&center.to_string(), &width.to_string())
    }

    /// Window tags with verbatim decimal-string content
    #[must_use]
    pub fn with_window_text(mut self, center: &str, width: &str) -> Self {
        self.window = Some((center.to_string(), width.to_string()));
        self
    }

    #[must_use]
    pub fn with_rescale(mut self, slope: f64, intercept: f64) -> Self {
        self.rescale = Some((slope, intercept));
        self
    }

    #[must_use]
    pub fn with_patient(mut self, name: &str, id: &str) -> Self {
        self.patient_name = name.to_string();
        self.patient_id = id.to_string();
        self
    }

    #[must_use]
    pub fn with_modality(mut self, modality: &str) -> Self {
        self.modality = modality.to_string();
        self
    }

    #[must_use]
    pub fn with_study_description(mut self, description: &str) -> Self {
        self.study_description = Some(description.to_string());
        self
    }

    #[must_use]
    pub fn with_instance_number(mut self, number: i32) -> Self {
        self.instance_number = Some(number);
        self
    }

    #[must_use]
    pub fn with_slice_location(mut self, location: f64) -> Self {
        self.slice_location = Some(location);
        self
    }

    /// Declare `frames` frames; the payload must hold all of them
    #[must_use]
    pub fn with_frames(mut self, frames: u32) -> Self {
        self.number_of_frames = Some(frames);
        self
    }

    /// Override bits allocated without touching the payload
    #[must_use]
    pub fn with_bits_allocated(mut self, bits: u16) -> Self {
        self.bits_allocated = bits;
        self
    }

    /// Replace the Pixel Data content with arbitrary bytes
    #[must_use]
    pub fn with_raw_pixel_data(mut self, bytes: Vec<u8>) -> Self {
        self.payload = Some(Payload::Bytes(bytes));
        self
    }

    #[must_use]
    pub fn without_pixel_data(mut self) -> Self {
        self.payload = None;
        self
    }

    /// Leave `tag` out of the written data set
    #[must_use]
    pub fn omitting(mut self, tag: Tag) -> Self {
        self.omitted.push(tag);
        self
    }

    /// Start the output at the `DICM` magic code
    #[must_use]
    pub fn without_preamble(mut self) -> Self {
        self.preamble = false;
        self
    }

    /// Encode as an Explicit VR Little Endian file
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut obj = InMemDicomObject::new_empty();
        let mut put = |element: InMemElement| {
            if !self.omitted.contains(&element.header().tag) {
                obj.put(element);
            }
        };

        let instance_uid = format!(
            "2.25.{}.{}",
            self.instance_number.unwrap_or(0).unsigned_abs(),
            u32::from(self.rows) * 65536 + u32::from(self.cols)
        );

        put(DataElement::new(
            tags::SOP_CLASS_UID,
            VR::UI,
            PrimitiveValue::from(uids::CT_IMAGE_STORAGE),
        ));
        put(DataElement::new(
            tags::SOP_INSTANCE_UID,
            VR::UI,
            PrimitiveValue::from(instance_uid.as_str()),
        ));
        put(DataElement::new(
            tags::MODALITY,
            VR::CS,
            PrimitiveValue::from(self.modality.as_str()),
        ));
        put(DataElement::new(
            tags::PATIENT_NAME,
            VR::PN,
            PrimitiveValue::from(self.patient_name.as_str()),
        ));
        put(DataElement::new(
            tags::PATIENT_ID,
            VR::LO,
            PrimitiveValue::from(self.patient_id.as_str()),
        ));
        if let Some(description) = &self.study_description {
            put(DataElement::new(
                tags::STUDY_DESCRIPTION,
                VR::LO,
                PrimitiveValue::from(description.as_str()),
            ));
        }
        if let Some(number) = self.instance_number {
            put(DataElement::new(
                tags::INSTANCE_NUMBER,
                VR::IS,
                PrimitiveValue::from(number.to_string()),
            ));
        }
        if let Some(location) = self.slice_location {
            put(DataElement::new(
                tags::SLICE_LOCATION,
                VR::DS,
                PrimitiveValue::from(location.to_string()),
            ));
        }

        let photometric = if self.samples_per_pixel == 3 {
            "RGB"
        } else {
            "MONOCHROME2"
        };
        put(DataElement::new(
            tags::SAMPLES_PER_PIXEL,
            VR::US,
            PrimitiveValue::from(self.samples_per_pixel),
        ));
        put(DataElement::new(
            tags::PHOTOMETRIC_INTERPRETATION,
            VR::CS,
            PrimitiveValue::from(photometric),
        ));
        if self.samples_per_pixel == 3 {
            put(DataElement::new(
                tags::PLANAR_CONFIGURATION,
                VR::US,
                PrimitiveValue::from(self.planar_configuration),
            ));
        }
        if let Some(frames) = self.number_of_frames {
            put(DataElement::new(
                tags::NUMBER_OF_FRAMES,
                VR::IS,
                PrimitiveValue::from(frames.to_string()),
            ));
        }
        put(DataElement::new(
            tags::ROWS,
            VR::US,
            PrimitiveValue::from(self.rows),
        ));
        put(DataElement::new(
            tags::COLUMNS,
            VR::US,
            PrimitiveValue::from(self.cols),
        ));
        put(DataElement::new(
            tags::BITS_ALLOCATED,
            VR::US,
            PrimitiveValue::from(self.bits_allocated),
        ));
        put(DataElement::new(
            tags::BITS_STORED,
            VR::US,
            PrimitiveValue::from(self.bits_allocated),
        ));
        put(DataElement::new(
            tags::HIGH_BIT,
            VR::US,
            PrimitiveValue::from(self.bits_allocated.saturating_sub(1)),
        ));
        put(DataElement::new(
            tags::PIXEL_REPRESENTATION,
            VR::US,
            PrimitiveValue::from(0_u16),
        ));
        if let Some((center, width)) = &self.window {
            put(DataElement::new(
                tags::WINDOW_CENTER,
                VR::DS,
                PrimitiveValue::from(center.as_str()),
            ));
            put(DataElement::new(
                tags::WINDOW_WIDTH,
                VR::DS,
                PrimitiveValue::from(width.as_str()),
            ));
        }
        if let Some((slope, intercept)) = self.rescale {
            put(DataElement::new(
                tags::RESCALE_INTERCEPT,
                VR::DS,
                PrimitiveValue::from(intercept.to_string()),
            ));
            put(DataElement::new(
                tags::RESCALE_SLOPE,
                VR::DS,
                PrimitiveValue::from(slope.to_string()),
            ));
        }
        match &self.payload {
            Some(Payload::Words(words)) => put(DataElement::new(
                tags::PIXEL_DATA,
                VR::OW,
                PrimitiveValue::U16(words.clone().into()),
            )),
            Some(Payload::Bytes(bytes)) => put(DataElement::new(
                tags::PIXEL_DATA,
                VR::OB,
                PrimitiveValue::from(bytes.clone()),
            )),
            None => {}
        }

        let file = obj
            .with_meta(
                FileMetaTableBuilder::new()
                    .media_storage_sop_class_uid(uids::CT_IMAGE_STORAGE)
                    .media_storage_sop_instance_uid(instance_uid.as_str())
                    .transfer_syntax(uids::EXPLICIT_VR_LITTLE_ENDIAN)
                    .implementation_class_uid("2.25.4242"),
            )
            .context("Failed to build file meta group")?;

        let mut bytes = Vec::new();
        file.write_all(&mut bytes)
            .context("Failed to encode synthetic DICOM object")?;

        if !self.preamble {
            bytes.drain(..128);
        }
        Ok(bytes)
    }
}

/// Bytes of a `count`-slice phantom series
pub fn phantom_series(rows: u16, cols: u16, count: usize) -> Result<Vec<Vec<u8>>> {
    (0..count)
        .map(|index| {
            SyntheticSlice::phantom(rows, cols, index, count)
                .with_study_description("Synthetic phantom")
                .to_bytes()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preamble_and_magic() {
        let bytes = SyntheticSlice::uniform(4, 4, 7).to_bytes().unwrap();
        assert!(bytes[..128].iter().all(|&b| b == 0));
        assert_eq!(&bytes[128..132], b"DICM");

        let bare = SyntheticSlice::uniform(4, 4, 7)
            .without_preamble()
            .to_bytes()
            .unwrap();
        assert_eq!(&bare[..4], b"DICM");
        assert_eq!(bare.len(), bytes.len() - 128);
    }

    #[test]
    fn test_gradient_range() {
        let slice = SyntheticSlice::gradient(8, 8);
        match slice.payload {
            Some(Payload::Words(words)) => {
                assert_eq!(words.len(), 64);
                assert_eq!(words[0], 0);
                assert_eq!(words[63], 4095);
            }
            other => panic!("unexpected payload {other:?}"),
        }
    }
}

use super::error::DecodeError;
use super::photometric::PhotometricInterpretation;
use super::slice::NativeWindow;
use crate::types::{
    BitDepth, Dimensions, PatientInfo, PixelSpacing, RescaleParams, SOPClass, SeriesInfo,
    StudyInfo, TransferSyntax,
};
use dicom::core::Tag;
use dicom::core::dictionary::UidDictionary;
use dicom::dictionary_std::sop_class;
use dicom::dictionary_std::tags;
use dicom::encoding::TransferSyntaxIndex;
use dicom::object::DefaultDicomObject;
use dicom::transfer_syntax::TransferSyntaxRegistry;
use std::str::FromStr;

/// Trimmed, non-empty string value of a tag
fn string_tag(obj: &DefaultDicomObject, tag: Tag) -> Option<String> {
    obj.get(tag)
        .and_then(|e| e.value().to_str().ok())
        .map(|s| s.trim_matches(|c: char| c.is_whitespace() || c == '\0').to_string())
        .filter(|s| !s.is_empty())
}

/// All backslash-separated decimal values of a tag, `None` if any fails to parse
fn decimal_values(obj: &DefaultDicomObject, tag: Tag) -> Option<Vec<f64>> {
    let raw = string_tag(obj, tag)?;
    raw.split('\\')
        .map(|part| part.trim().parse::<f64>().ok().filter(|v| v.is_finite()))
        .collect()
}

/// First value of a multi-valued decimal string
fn first_decimal(obj: &DefaultDicomObject, tag: Tag) -> Option<f64> {
    decimal_values(obj, tag).and_then(|values| values.first().copied())
}

#[inline]
fn uint_tag(obj: &DefaultDicomObject, tag: Tag) -> Option<u16> {
    obj.get(tag).and_then(|e| e.to_int::<u16>().ok())
}

pub fn extract_dimensions(obj: &DefaultDicomObject) -> Result<Dimensions, DecodeError> {
    let rows = uint_tag(obj, tags::ROWS)
        .filter(|&r| r > 0)
        .ok_or(DecodeError::MissingDimensions { tag: "Rows" })?;

    let cols = uint_tag(obj, tags::COLUMNS)
        .filter(|&c| c > 0)
        .ok_or(DecodeError::MissingDimensions { tag: "Columns" })?;

    Ok(Dimensions::new(rows, cols))
}

/// Bits allocated/stored/high bit, with the usual fallbacks
/// (16, allocated, stored - 1)
pub fn extract_bit_depth(obj: &DefaultDicomObject) -> BitDepth {
    let allocated = uint_tag(obj, tags::BITS_ALLOCATED).unwrap_or(16);
    let stored = uint_tag(obj, tags::BITS_STORED).unwrap_or(allocated);
    let high_bit = uint_tag(obj, tags::HIGH_BIT).unwrap_or_else(|| stored.saturating_sub(1));

    BitDepth::new(allocated, stored, high_bit)
}

#[inline]
pub fn extract_samples_per_pixel(obj: &DefaultDicomObject) -> u16 {
    uint_tag(obj, tags::SAMPLES_PER_PIXEL).unwrap_or(1)
}

#[inline]
pub fn extract_pixel_representation(obj: &DefaultDicomObject) -> u16 {
    uint_tag(obj, tags::PIXEL_REPRESENTATION).unwrap_or(0)
}

#[inline]
pub fn extract_planar_configuration(obj: &DefaultDicomObject) -> u16 {
    uint_tag(obj, tags::PLANAR_CONFIGURATION).unwrap_or(0)
}

#[inline]
pub fn extract_number_of_frames(obj: &DefaultDicomObject) -> u32 {
    obj.get(tags::NUMBER_OF_FRAMES)
        .and_then(|e| e.to_int::<u32>().ok())
        .filter(|&n| n > 0)
        .unwrap_or(1)
}

pub fn extract_photometric_interpretation(obj: &DefaultDicomObject) -> PhotometricInterpretation {
    string_tag(obj, tags::PHOTOMETRIC_INTERPRETATION)
        .and_then(|s| PhotometricInterpretation::from_str(&s).ok())
        .unwrap_or(PhotometricInterpretation::Monochrome2)
}

/// Window center/width, best effort.
///
/// Absent tags, parse failures and non-positive widths all yield the
/// defaults (128/256); a missing window is never a decode failure.
pub fn extract_window(obj: &DefaultDicomObject) -> NativeWindow {
    let center = first_decimal(obj, tags::WINDOW_CENTER);
    let width = first_decimal(obj, tags::WINDOW_WIDTH).filter(|&w| w > 0.0);

    match (center, width) {
        (Some(center), Some(width)) => NativeWindow {
            center,
            width,
            from_file: true,
        },
        _ => NativeWindow::default(),
    }
}

pub fn extract_pixel_spacing(obj: &DefaultDicomObject) -> PixelSpacing {
    match decimal_values(obj, tags::PIXEL_SPACING).as_deref() {
        Some([row, col, ..]) if *row > 0.0 && *col > 0.0 => PixelSpacing::new(*row, *col),
        _ => PixelSpacing::default(),
    }
}

pub fn extract_rescale_params(obj: &DefaultDicomObject) -> RescaleParams {
    // Only present for modalities with real-world units (CT/PET)
    let slope = first_decimal(obj, tags::RESCALE_SLOPE).unwrap_or(1.0);
    let intercept = first_decimal(obj, tags::RESCALE_INTERCEPT).unwrap_or(0.0);

    RescaleParams::new(slope, intercept)
}

pub fn extract_transfer_syntax(obj: &DefaultDicomObject) -> TransferSyntax {
    let uid = obj.meta().transfer_syntax().trim_end_matches('\0').to_string();
    let name = TransferSyntaxRegistry
        .get(&uid)
        .map_or_else(|| "Unknown".to_string(), |ts| ts.name().to_string());

    TransferSyntax::new(uid, name)
}

pub fn extract_sop_class(obj: &DefaultDicomObject) -> Option<SOPClass> {
    let uid = string_tag(obj, tags::SOP_CLASS_UID)?;
    sop_class::StandardSopClassDictionary
        .by_uid(&uid)
        .map(|entry| SOPClass::new(uid.clone(), entry.name.to_string()))
}

pub fn extract_patient_info(obj: &DefaultDicomObject) -> PatientInfo {
    PatientInfo {
        name: string_tag(obj, tags::PATIENT_NAME),
        id: string_tag(obj, tags::PATIENT_ID),
    }
}

pub fn extract_study_info(obj: &DefaultDicomObject) -> StudyInfo {
    StudyInfo {
        date: string_tag(obj, tags::STUDY_DATE),
        description: string_tag(obj, tags::STUDY_DESCRIPTION),
        modality: string_tag(obj, tags::MODALITY),
    }
}

pub fn extract_series_info(obj: &DefaultDicomObject) -> SeriesInfo {
    let defaults = SeriesInfo::default();

    SeriesInfo {
        description: string_tag(obj, tags::SERIES_DESCRIPTION),
        instance_number: obj
            .get(tags::INSTANCE_NUMBER)
            .and_then(|e| e.to_int::<i32>().ok()),
        slice_location: first_decimal(obj, tags::SLICE_LOCATION)
            .unwrap_or(defaults.slice_location),
        slice_thickness: first_decimal(obj, tags::SLICE_THICKNESS)
            .unwrap_or(defaults.slice_thickness),
    }
}

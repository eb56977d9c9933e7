use thiserror::Error;

/// Reasons a single file could not be turned into a [`Slice`](super::Slice)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// The buffer is not a readable DICOM object (truncated, garbage, unknown
    /// transfer syntax)
    #[error("Not a readable DICOM object: {0}")]
    Unreadable(String),

    /// Rows or Columns absent, unparseable or zero
    #[error("Missing or invalid {tag} tag")]
    MissingDimensions { tag: &'static str },

    /// No Pixel Data element in the object
    #[error("No pixel data element present")]
    MissingPixelData,

    /// Pixel Data present but its size or encoding does not match the header
    #[error("Malformed pixel data: {0}")]
    MalformedPixelData(String),

    /// Bit depth or sample layout outside what a slice can hold
    #[error("Unsupported image format: {0}")]
    UnsupportedFormat(String),
}

impl DecodeError {
    /// Short machine-friendly label, used in load reports and logs
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            DecodeError::Unreadable(_) => "unreadable",
            DecodeError::MissingDimensions { .. } => "missing-dimensions",
            DecodeError::MissingPixelData => "missing-pixel-data",
            DecodeError::MalformedPixelData(_) => "malformed-pixel-data",
            DecodeError::UnsupportedFormat(_) => "unsupported-format",
        }
    }
}

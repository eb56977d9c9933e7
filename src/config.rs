//! Viewer configuration and feature profiles

use crate::interaction::Tool;
use crate::study::{DEFAULT_FETCH_TIMEOUT, DEFAULT_MAX_FILES};
use crate::viewport::ZoomRange;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Invalid configuration: {}", .0.join("; "))]
    Invalid(Vec<String>),
}

/// Whether viewports share one image adjustment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdjustmentScope {
    #[default]
    Shared,
    PerViewport,
}

/// Capabilities that distinguish the basic, advanced and multi-viewport viewers
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ViewerFeatures {
    pub multi_viewport: bool,
    /// MPR, volume and projection render modes
    pub special_modes: bool,
    pub tools: Vec<Tool>,
}

impl Default for ViewerFeatures {
    fn default() -> Self {
        Self {
            multi_viewport: true,
            special_modes: true,
            tools: Tool::ALL.to_vec(),
        }
    }
}

impl ViewerFeatures {
    #[must_use]
    pub fn allows(&self, tool: Tool) -> bool {
        self.tools.contains(&tool)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    pub zoom_range: ZoomRange,
    pub wheel_zoom_step: f64,
    /// Files loaded per study; the rest of a longer study is ignored
    pub max_files: usize,
    pub fetch_timeout_ms: u64,
    pub cine_fps: f64,
    pub mm_per_pixel: f64,
    /// Slice count assumed by volume ROIs
    pub volume_slices: u32,
    pub canvas_width: u32,
    pub canvas_height: u32,
    pub sync: bool,
    pub adjustment_scope: AdjustmentScope,
    /// Slices per MIP/MinIP slab
    pub slab_thickness: usize,
    pub features: ViewerFeatures,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            zoom_range: ZoomRange::default(),
            wheel_zoom_step: 0.1,
            max_files: DEFAULT_MAX_FILES,
            fetch_timeout_ms: DEFAULT_FETCH_TIMEOUT.as_millis() as u64,
            cine_fps: 5.0,
            mm_per_pixel: 0.1,
            volume_slices: 10,
            canvas_width: 512,
            canvas_height: 512,
            sync: false,
            adjustment_scope: AdjustmentScope::Shared,
            slab_thickness: 10,
            features: ViewerFeatures::default(),
        }
    }
}

impl ViewerConfig {
    /// Single viewport with pan, zoom, window/level and length only
    #[must_use]
    pub fn basic() -> Self {
        Self {
            features: ViewerFeatures {
                multi_viewport: false,
                special_modes: false,
                tools: vec![Tool::Pan, Tool::Zoom, Tool::WindowLevel, Tool::Length],
            },
            ..Self::default()
        }
    }

    /// Every feature, with the tighter load limits of the multi-viewport viewer
    #[must_use]
    pub fn advanced() -> Self {
        Self {
            max_files: 10,
            fetch_timeout_ms: 10_000,
            ..Self::default()
        }
    }

    /// Named profile: `basic`, `advanced` or `default`
    #[must_use]
    pub fn profile(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "basic" => Some(Self::basic()),
            "advanced" => Some(Self::advanced()),
            "default" => Some(Self::default()),
            _ => None,
        }
    }

    /// Read a JSON config; absent fields keep their defaults
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    #[must_use]
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        let ZoomRange { min, max } = self.zoom_range;
        if !(min.is_finite() && max.is_finite() && min > 0.0 && min <= max) {
            errors.push(format!("zoom_range must satisfy 0 < min <= max, got [{min}, {max}]"));
        }
        if !(self.wheel_zoom_step.is_finite() && self.wheel_zoom_step > 0.0) {
            errors.push("wheel_zoom_step must be positive".to_string());
        }
        if self.max_files == 0 {
            errors.push("max_files must be at least 1".to_string());
        }
        if self.fetch_timeout_ms == 0 {
            errors.push("fetch_timeout_ms must be positive".to_string());
        }
        if !(self.cine_fps > 0.0 && self.cine_fps <= 60.0) {
            errors.push(format!("cine_fps must be in (0, 60], got {}", self.cine_fps));
        }
        if !(self.mm_per_pixel.is_finite() && self.mm_per_pixel > 0.0) {
            errors.push("mm_per_pixel must be positive".to_string());
        }
        if self.canvas_width == 0 || self.canvas_height == 0 {
            errors.push("canvas size must be non-zero".to_string());
        }
        if self.slab_thickness == 0 {
            errors.push("slab_thickness must be at least 1".to_string());
        }
        if self.features.tools.is_empty() {
            errors.push("at least one tool must be enabled".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid(errors))
        }
    }
}

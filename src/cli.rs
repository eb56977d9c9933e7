use crate::config::{AdjustmentScope, ViewerConfig};
use crate::render::{RenderMode, WindowPreset};
use clap::Parser;
use std::path::PathBuf;

/// Terminal PACS viewer: loads a study, renders it and prints the frame
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Study directory (`study.json` or `*.dcm` files)
    #[arg(value_name = "STUDY_DIR", required_unless_present = "demo")]
    pub study: Option<PathBuf>,

    /// Render a synthetic study of N slices instead of a directory
    #[arg(long, value_name = "N")]
    pub demo: Option<usize>,

    /// JSON viewer configuration
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Feature profile: basic, advanced or default
    #[arg(long)]
    pub profile: Option<String>,

    /// Viewport layout, e.g. 1x1, 2x2, 1x3
    #[arg(long, default_value = "1x1")]
    pub layout: String,

    /// Render mode: stack, mpr, volume, mip, minip
    #[arg(long, default_value = "stack")]
    pub mode: RenderMode,

    /// Window preset: lung, bone, brain, soft_tissue, liver, default
    #[arg(long, conflicts_with = "window")]
    pub preset: Option<WindowPreset>,

    /// Window as CENTER/WIDTH
    #[arg(long, value_name = "C/W", value_parser = parse_window, allow_hyphen_values = true)]
    pub window: Option<(f64, f64)>,

    #[arg(long)]
    pub zoom: Option<f64>,

    /// Rotation in degrees
    #[arg(long, allow_hyphen_values = true)]
    pub rotate: Option<f64>,

    #[arg(long)]
    pub flip_h: bool,

    #[arg(long)]
    pub flip_v: bool,

    #[arg(long)]
    pub invert: bool,

    /// 1-based slice number shown in every viewport
    #[arg(long)]
    pub slice: Option<usize>,

    /// Keep pan, zoom and scrolling in step across viewports
    #[arg(long)]
    pub sync: bool,

    /// Separate window/level per viewport
    #[arg(long)]
    pub per_viewport: bool,

    /// Play the study in place for this many seconds
    #[arg(long, value_name = "SECONDS")]
    pub cine: Option<f64>,

    /// Cine frames per second
    #[arg(long)]
    pub fps: Option<f64>,

    /// Also write the rendered frame to this PNG file
    #[arg(short, long, value_name = "PNG")]
    pub output: Option<PathBuf>,

    /// Canvas size in pixels as WIDTHxHEIGHT
    #[arg(long, value_name = "WxH", value_parser = parse_canvas)]
    pub canvas: Option<(u32, u32)>,

    /// Maximum number of files loaded from the study
    #[arg(long)]
    pub max_files: Option<usize>,

    /// Per-file fetch timeout in seconds
    #[arg(long, value_name = "SECONDS")]
    pub timeout: Option<f64>,

    /// Output width in terminal columns
    #[arg(short = 'W', long)]
    pub width: Option<u32>,

    /// Output height in terminal rows
    #[arg(short = 'H', long)]
    pub height: Option<u32>,

    /// Show study and slice metadata, debug logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    /// Fold the flags that override configuration fields into `config`
    pub fn apply_to(&self, config: &mut ViewerConfig) {
        if let Some(max_files) = self.max_files {
            config.max_files = max_files;
        }
        if let Some(seconds) = self.timeout.filter(|s| s.is_finite() && *s > 0.0) {
            config.fetch_timeout_ms = (seconds * 1000.0).round() as u64;
        }
        if let Some(fps) = self.fps {
            config.cine_fps = fps;
        }
        if let Some((width, height)) = self.canvas {
            config.canvas_width = width;
            config.canvas_height = height;
        }
        if self.sync {
            config.sync = true;
        }
        if self.per_viewport {
            config.adjustment_scope = AdjustmentScope::PerViewport;
        }
    }
}

fn parse_window(s: &str) -> Result<(f64, f64), String> {
    let (center, width) = s
        .split_once('/')
        .ok_or_else(|| format!("expected CENTER/WIDTH, got `{s}`"))?;
    let center = center.trim().parse::<f64>().map_err(|e| format!("center: {e}"))?;
    let width = width.trim().parse::<f64>().map_err(|e| format!("width: {e}"))?;
    if width <= 0.0 {
        return Err("window width must be positive".to_string());
    }
    Ok((center, width))
}

fn parse_canvas(s: &str) -> Result<(u32, u32), String> {
    let (w, h) = s
        .to_ascii_lowercase()
        .split_once('x')
        .map(|(w, h)| (w.trim().parse::<u32>(), h.trim().parse::<u32>()))
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got `{s}`"))?;
    match (w, h) {
        (Ok(w), Ok(h)) if w > 0 && h > 0 => Ok((w, h)),
        _ => Err(format!("invalid canvas size `{s}`")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_window() {
        assert_eq!(parse_window("-600/1500"), Ok((-600.0, 1500.0)));
        assert!(parse_window("40").is_err());
        assert!(parse_window("40/0").is_err());
    }

    #[test]
    fn test_parse_canvas() {
        assert_eq!(parse_canvas("640x480"), Ok((640, 480)));
        assert!(parse_canvas("0x480").is_err());
        assert!(parse_canvas("big").is_err());
    }

    #[test]
    fn test_flags_override_config() {
        let args = Args::try_parse_from([
            "pacsview",
            "study",
            "--max-files",
            "7",
            "--timeout",
            "2.5",
            "--canvas",
            "320x240",
            "--sync",
            "--mode",
            "mip",
            "--window",
            "-600/1500",
        ])
        .unwrap();
        assert_eq!(args.mode, RenderMode::Mip);
        assert_eq!(args.window, Some((-600.0, 1500.0)));

        let mut config = ViewerConfig::default();
        args.apply_to(&mut config);
        assert_eq!(config.max_files, 7);
        assert_eq!(config.fetch_timeout_ms, 2500);
        assert_eq!((config.canvas_width, config.canvas_height), (320, 240));
        assert!(config.sync);
    }

    #[test]
    fn test_study_or_demo_required() {
        assert!(Args::try_parse_from(["pacsview"]).is_err());
        let args = Args::try_parse_from(["pacsview", "--demo", "12"]).unwrap();
        assert_eq!(args.demo, Some(12));
        assert!(args.study.is_none());
    }
}

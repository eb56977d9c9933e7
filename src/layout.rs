//! Viewport grid layouts

use crate::viewport::{ViewportState, ZoomRange};
use std::fmt;
use std::str::FromStr;
use tracing::warn;

/// A grid of `rows` x `cols` viewports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    rows: u8,
    cols: u8,
}

impl Layout {
    pub const SINGLE: Layout = Layout { rows: 1, cols: 1 };
    pub const QUAD: Layout = Layout { rows: 2, cols: 2 };

    /// Every supported layout, in menu order
    pub const SUPPORTED: [Layout; 13] = [
        Layout { rows: 1, cols: 1 },
        Layout { rows: 1, cols: 2 },
        Layout { rows: 2, cols: 1 },
        Layout { rows: 2, cols: 2 },
        Layout { rows: 1, cols: 3 },
        Layout { rows: 3, cols: 1 },
        Layout { rows: 1, cols: 4 },
        Layout { rows: 4, cols: 1 },
        Layout { rows: 2, cols: 3 },
        Layout { rows: 3, cols: 2 },
        Layout { rows: 3, cols: 3 },
        Layout { rows: 1, cols: 6 },
        Layout { rows: 6, cols: 1 },
    ];

    #[inline]
    #[must_use]
    pub fn rows(&self) -> u8 {
        self.rows
    }

    #[inline]
    #[must_use]
    pub fn cols(&self) -> u8 {
        self.cols
    }

    #[inline]
    #[must_use]
    pub fn viewport_count(&self) -> usize {
        usize::from(self.rows) * usize::from(self.cols)
    }

    /// Parse a layout id, falling back to 2x2 for unknown ids
    #[must_use]
    pub fn parse_or_default(id: &str) -> Layout {
        id.parse().unwrap_or_else(|e: String| {
            warn!("{e}, using {}", Layout::QUAD);
            Layout::QUAD
        })
    }
}

impl FromStr for Layout {
    type Err = String;

    /// Layout ids look like `2x3` (rows x columns)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (rows, cols) = s
            .trim()
            .to_ascii_lowercase()
            .split_once('x')
            .and_then(|(r, c)| Some((r.parse::<u8>().ok()?, c.parse::<u8>().ok()?)))
            .ok_or_else(|| format!("unrecognised layout `{s}`"))?;

        Layout::SUPPORTED
            .into_iter()
            .find(|l| l.rows == rows && l.cols == cols)
            .ok_or_else(|| format!("unsupported layout `{s}`"))
    }
}

impl fmt::Display for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.rows, self.cols)
    }
}

/// Rectangle in canvas pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl CellRect {
    #[must_use]
    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= f64::from(self.x)
            && y >= f64::from(self.y)
            && x < f64::from(self.x + self.width)
            && y < f64::from(self.y + self.height)
    }
}

/// Current layout, active viewport and viewport cell geometry
#[derive(Debug, Clone)]
pub struct LayoutManager {
    layout: Layout,
    active: usize,
    multi_viewport: bool,
    zoom_range: ZoomRange,
}

impl LayoutManager {
    #[must_use]
    pub fn new(multi_viewport: bool, zoom_range: ZoomRange) -> Self {
        Self {
            layout: Layout::SINGLE,
            active: 0,
            multi_viewport,
            zoom_range,
        }
    }

    #[inline]
    #[must_use]
    pub fn layout(&self) -> Layout {
        self.layout
    }

    #[inline]
    #[must_use]
    pub fn viewport_count(&self) -> usize {
        self.layout.viewport_count()
    }

    #[inline]
    #[must_use]
    pub fn active(&self) -> usize {
        self.active
    }

    #[must_use]
    pub fn is_multi(&self) -> bool {
        self.viewport_count() > 1
    }

    /// Switch to `layout_id` and return fresh states for every viewport
    ///
    /// Unknown ids fall back to 2x2; without multi-viewport support every
    /// layout collapses to 1x1. The active viewport returns to 0.
    pub fn configure(&mut self, layout_id: &str) -> Vec<ViewportState> {
        let requested = Layout::parse_or_default(layout_id);
        self.apply(requested)
    }

    pub fn apply(&mut self, layout: Layout) -> Vec<ViewportState> {
        self.layout = if self.multi_viewport {
            layout
        } else {
            if layout != Layout::SINGLE {
                warn!("multi-viewport layouts are disabled, using {}", Layout::SINGLE);
            }
            Layout::SINGLE
        };
        self.active = 0;
        vec![ViewportState::new(self.zoom_range); self.viewport_count()]
    }

    /// Focus viewport `index`; out-of-range indices are ignored
    pub fn set_active(&mut self, index: usize) -> bool {
        if index < self.viewport_count() {
            self.active = index;
            true
        } else {
            false
        }
    }

    /// Rectangle of viewport `index` inside a `width` x `height` canvas
    ///
    /// Remainder pixels go to the last row/column so the grid covers the
    /// whole canvas.
    #[must_use]
    pub fn cell_rect(&self, index: usize, width: u32, height: u32) -> Option<CellRect> {
        if index >= self.viewport_count() {
            return None;
        }
        let cols = u32::from(self.layout.cols);
        let rows = u32::from(self.layout.rows);
        let (col, row) = ((index as u32) % cols, (index as u32) / cols);
        let (cell_w, cell_h) = (width / cols, height / rows);

        let x = col * cell_w;
        let y = row * cell_h;
        let w = if col + 1 == cols { width - x } else { cell_w };
        let h = if row + 1 == rows { height - y } else { cell_h };
        Some(CellRect {
            x,
            y,
            width: w,
            height: h,
        })
    }

    /// Viewport under the canvas point, if any
    #[must_use]
    pub fn hit_test(&self, x: f64, y: f64, width: u32, height: u32) -> Option<usize> {
        (0..self.viewport_count()).find(|&i| {
            self.cell_rect(i, width, height)
                .is_some_and(|rect| rect.contains(x, y))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_viewport_counts() {
        let counts: Vec<usize> = ["1x1", "1x2", "3x1", "2x2", "2x3", "6x1", "3x3"]
            .iter()
            .map(|id| id.parse::<Layout>().unwrap().viewport_count())
            .collect();
        assert_eq!(counts, vec![1, 2, 3, 4, 6, 6, 9]);
    }

    #[test]
    fn test_unknown_layout_falls_back() {
        let mut manager = LayoutManager::new(true, ZoomRange::default());
        let states = manager.configure("5x5");
        assert_eq!(manager.layout(), Layout::QUAD);
        assert_eq!(states.len(), 4);
        assert_eq!(manager.configure("banana").len(), 4);
    }

    #[test]
    fn test_configure_resets_states() {
        let mut manager = LayoutManager::new(true, ZoomRange::default());
        manager.configure("1x3");
        assert!(manager.set_active(2));
        assert!(!manager.set_active(3));
        assert_eq!(manager.active(), 2);

        let states = manager.configure("1x2");
        assert_eq!(manager.active(), 0);
        assert!(states.iter().all(|s| *s == ViewportState::default()));
    }

    #[test]
    fn test_single_viewport_only() {
        let mut manager = LayoutManager::new(false, ZoomRange::default());
        assert_eq!(manager.configure("3x3").len(), 1);
        assert!(!manager.is_multi());
    }

    #[test]
    fn test_cell_rects_tile_canvas() {
        let mut manager = LayoutManager::new(true, ZoomRange::default());
        manager.configure("2x3");
        let last = manager.cell_rect(5, 301, 200).unwrap();
        assert_eq!(
            last,
            CellRect {
                x: 200,
                y: 100,
                width: 101,
                height: 100
            }
        );
        let total: u32 = (0..6)
            .map(|i| manager.cell_rect(i, 301, 200).unwrap())
            .map(|r| r.width * r.height)
            .sum();
        assert_eq!(total, 301 * 200);
        assert!(manager.cell_rect(6, 301, 200).is_none());
        assert_eq!(manager.hit_test(250.0, 150.0, 301, 200), Some(5));
    }
}

//! RGBA pixel buffers
//!
//! Every rasteriser writes into a [`Raster`], a thin wrapper over
//! [`RgbaImage`] that clips out-of-range writes instead of panicking.

use image::{DynamicImage, ImageResult, RgbaImage, imageops};
use std::path::Path;

pub use image::Rgba;

/// Named opaque colours used by the renderer
pub mod palette {
    use image::Rgba;

    pub const BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);
    pub const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);
    pub const GREEN: Rgba<u8> = Rgba([0, 255, 0, 255]);
    pub const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);
    pub const YELLOW: Rgba<u8> = Rgba([255, 255, 0, 255]);
    pub const MAGENTA: Rgba<u8> = Rgba([255, 0, 255, 255]);
    pub const CYAN: Rgba<u8> = Rgba([0, 255, 255, 255]);
    pub const ORANGE: Rgba<u8> = Rgba([255, 102, 0, 255]);
    pub const PURPLE: Rgba<u8> = Rgba([147, 51, 234, 255]);

    #[inline]
    #[must_use]
    pub const fn gray(value: u8) -> Rgba<u8> {
        Rgba([value, value, value, 255])
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Raster {
    buffer: RgbaImage,
}

impl From<RgbaImage> for Raster {
    fn from(buffer: RgbaImage) -> Self {
        Self { buffer }
    }
}

impl Raster {
    /// Opaque black raster
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self::filled(width, height, palette::BLACK)
    }

    #[must_use]
    pub fn filled(width: u32, height: u32, color: Rgba<u8>) -> Self {
        RgbaImage::from_pixel(width, height, color).into()
    }

    /// Build a raster by evaluating `f` at every pixel
    #[must_use]
    pub fn from_fn<F>(width: u32, height: u32, f: F) -> Self
    where
        F: FnMut(u32, u32) -> Rgba<u8>,
    {
        RgbaImage::from_fn(width, height, f).into()
    }

    /// Wrap an existing RGBA buffer; `None` if it is too short
    #[must_use]
    pub fn from_rgba(width: u32, height: u32, data: Vec<u8>) -> Option<Self> {
        RgbaImage::from_raw(width, height, data).map(Self::from)
    }

    /// Two-tone checkerboard with square cells of `cell` pixels
    #[must_use]
    pub fn checkerboard(width: u32, height: u32, cell: u32, a: Rgba<u8>, b: Rgba<u8>) -> Self {
        let cell = cell.max(1);
        Self::from_fn(width, height, |x, y| {
            if ((x / cell) + (y / cell)) % 2 == 0 { a } else { b }
        })
    }

    #[inline(always)]
    #[must_use]
    pub fn width(&self) -> u32 {
        self.buffer.width()
    }

    #[inline(always)]
    #[must_use]
    pub fn height(&self) -> u32 {
        self.buffer.height()
    }

    /// Raw bytes, row-major, four per pixel
    #[inline]
    #[must_use]
    pub fn data(&self) -> &[u8] {
        self.buffer.as_raw()
    }

    #[inline]
    #[must_use]
    pub fn as_image(&self) -> &RgbaImage {
        &self.buffer
    }

    #[inline]
    #[must_use]
    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgba<u8>> {
        self.buffer.get_pixel_checked(x, y).copied()
    }

    /// Write one pixel; coordinates outside the raster are ignored
    #[inline]
    pub fn put_pixel(&mut self, x: u32, y: u32, color: Rgba<u8>) {
        if let Some(px) = self.buffer.get_pixel_mut_checked(x, y) {
            *px = color;
        }
    }

    /// Signed-coordinate variant of [`put_pixel`](Self::put_pixel)
    #[inline]
    pub fn put_pixel_i(&mut self, x: i64, y: i64, color: Rgba<u8>) {
        if let (Ok(x), Ok(y)) = (u32::try_from(x), u32::try_from(y)) {
            self.put_pixel(x, y, color);
        }
    }

    pub fn fill(&mut self, color: Rgba<u8>) {
        self.buffer.pixels_mut().for_each(|px| *px = color);
    }

    /// Fill the axis-aligned rectangle clipped to the raster
    pub fn fill_rect(&mut self, x: u32, y: u32, width: u32, height: u32, color: Rgba<u8>) {
        let x_end = x.saturating_add(width).min(self.width());
        let y_end = y.saturating_add(height).min(self.height());
        for yy in y..y_end {
            for xx in x..x_end {
                self.buffer.put_pixel(xx, yy, color);
            }
        }
    }

    /// Composite `src` with its top-left corner at (`x`, `y`), clipped
    ///
    /// Opaque source pixels replace the canvas; transparent ones leave it.
    pub fn blit(&mut self, src: &Raster, x: u32, y: u32) {
        imageops::overlay(&mut self.buffer, &src.buffer, i64::from(x), i64::from(y));
    }

    #[must_use]
    pub fn to_image(&self) -> DynamicImage {
        DynamicImage::ImageRgba8(self.buffer.clone())
    }

    #[must_use]
    pub fn into_image(self) -> RgbaImage {
        self.buffer
    }

    /// Encode to `path`, format taken from the extension
    pub fn save(&self, path: &Path) -> ImageResult<()> {
        self.buffer.save(path)
    }
}

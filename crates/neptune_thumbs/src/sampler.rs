//! Aspect-preserving downscaling and RGB565 quantization.

use image::{imageops, Rgba, RgbaImage};
use serde::{Deserialize, Serialize};

/// Resampling filter used when scaling the rendered image to a thumbnail size.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScaleFilter {
    /// Nearest neighbour, the host application's fast transformation
    #[default]
    Nearest,
    Triangle,
    CatmullRom,
    Lanczos3,
}

impl From<ScaleFilter> for imageops::FilterType {
    fn from(filter: ScaleFilter) -> Self {
        match filter {
            ScaleFilter::Nearest => imageops::FilterType::Nearest,
            ScaleFilter::Triangle => imageops::FilterType::Triangle,
            ScaleFilter::CatmullRom => imageops::FilterType::CatmullRom,
            ScaleFilter::Lanczos3 => imageops::FilterType::Lanczos3,
        }
    }
}

/// Pack an 8-bit RGB triple into RGB565.
#[inline]
pub const fn rgb565(r: u8, g: u8, b: u8) -> u16 {
    ((r as u16 >> 3) << 11) | ((g as u16 >> 2) << 5) | (b as u16 >> 3)
}

/// Expand an RGB565 value back to 8-bit channels (bit replication).
#[inline]
pub const fn rgb888(color: u16) -> [u8; 3] {
    let r = ((color >> 11) & 0x1f) as u8;
    let g = ((color >> 5) & 0x3f) as u8;
    let b = (color & 0x1f) as u8;
    [(r << 3) | (r >> 2), (g << 2) | (g >> 4), (b << 3) | (b >> 2)]
}

/// Largest size with the source aspect ratio that fits in `dst_w` x `dst_h`.
///
/// Mirrors the keep-aspect-ratio rule of the host toolkit, including its
/// integer truncation, so thumbnails come out with the same dimensions.
pub fn fit_within(src_w: u32, src_h: u32, dst_w: u32, dst_h: u32) -> (u32, u32) {
    if src_w == 0 || src_h == 0 {
        return (0, 0);
    }
    let rw = (dst_h as u64 * src_w as u64 / src_h as u64) as u32;
    let (w, h) = if rw <= dst_w {
        (rw, dst_h)
    } else {
        (dst_w, (dst_w as u64 * src_h as u64 / src_w as u64) as u32)
    };
    (w.max(1), h.max(1))
}

/// Scale `image` to fit `width` x `height`, keeping its aspect ratio.
pub fn scale(image: &RgbaImage, width: u32, height: u32, filter: ScaleFilter) -> RgbaImage {
    let (w, h) = fit_within(image.width(), image.height(), width, height);
    if (w, h) == image.dimensions() || w == 0 {
        return image.clone();
    }
    imageops::resize(image, w, h, filter.into())
}

/// A raster of RGB565 pixels in row-major order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QuantizedGrid {
    pub width: usize,
    pub height: usize,
    pub pixels: Vec<u16>,
}

impl QuantizedGrid {
    /// Quantize every pixel of `image`, ignoring alpha.
    pub fn from_image(image: &RgbaImage) -> Self {
        let pixels = image
            .pixels()
            .map(|Rgba([r, g, b, _])| rgb565(*r, *g, *b))
            .collect();
        Self {
            width: image.width() as usize,
            height: image.height() as usize,
            pixels,
        }
    }

    /// Pixels of row `y`.
    pub fn row(&self, y: usize) -> &[u16] {
        &self.pixels[y * self.width..(y + 1) * self.width]
    }

    pub fn rows(&self) -> impl Iterator<Item = &[u16]> {
        self.pixels.chunks_exact(self.width.max(1))
    }

    /// Expand back to an opaque RGBA image.
    pub fn to_rgba(&self) -> RgbaImage {
        let mut out = RgbaImage::new(self.width as u32, self.height as u32);
        for (dst, &color) in out.pixels_mut().zip(&self.pixels) {
            let [r, g, b] = rgb888(color);
            *dst = Rgba([r, g, b, 255]);
        }
        out
    }
}

/// Scale `image` into the target box and quantize it to RGB565.
pub fn sample(image: &RgbaImage, width: u32, height: u32) -> QuantizedGrid {
    sample_with(image, width, height, ScaleFilter::default())
}

/// Like [`sample`] with an explicit resampling filter.
pub fn sample_with(image: &RgbaImage, width: u32, height: u32, filter: ScaleFilter) -> QuantizedGrid {
    QuantizedGrid::from_image(&scale(image, width, height, filter))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rgb565_primaries() {
        assert_eq!(rgb565(255, 0, 0), 0xf800);
        assert_eq!(rgb565(0, 255, 0), 0x07e0);
        assert_eq!(rgb565(0, 0, 255), 0x001f);
        assert_eq!(rgb565(255, 255, 255), 0xffff);
        assert_eq!(rgb565(7, 3, 7), 0);
    }

    #[test]
    fn test_rgb565_fields_never_overflow() {
        for v in 0..=255u8 {
            let r = rgb565(v, 0, 0);
            let g = rgb565(0, v, 0);
            let b = rgb565(0, 0, v);
            assert_eq!(r & 0x07ff, 0, "red leaked for {v}");
            assert_eq!(g & 0xf81f, 0, "green leaked for {v}");
            assert_eq!(b & 0xffe0, 0, "blue leaked for {v}");
            assert_eq!(r >> 11, (v >> 3) as u16);
            assert_eq!((g >> 5) & 0x3f, (v >> 2) as u16);
            assert_eq!(b, (v >> 3) as u16);
        }
    }

    #[test]
    fn test_rgb888_expands_full_range() {
        assert_eq!(rgb888(0xffff), [255, 255, 255]);
        assert_eq!(rgb888(0), [0, 0, 0]);
        assert_eq!(rgb565(rgb888(0x1234)[0], rgb888(0x1234)[1], rgb888(0x1234)[2]), 0x1234);
    }

    #[test]
    fn test_fit_within_keeps_aspect() {
        assert_eq!(fit_within(900, 900, 200, 200), (200, 200));
        assert_eq!(fit_within(900, 450, 200, 200), (200, 100));
        assert_eq!(fit_within(450, 900, 200, 200), (100, 200));
        assert_eq!(fit_within(2, 1, 2, 1), (2, 1));
        assert_eq!(fit_within(1000, 1, 100, 100), (100, 1));
        assert_eq!(fit_within(0, 10, 100, 100), (0, 0));
    }

    #[test]
    fn test_sample_raster_order() {
        let mut img = RgbaImage::new(2, 2);
        img.put_pixel(0, 0, Rgba([255, 0, 0, 255]));
        img.put_pixel(1, 0, Rgba([0, 255, 0, 0]));
        img.put_pixel(0, 1, Rgba([0, 0, 255, 255]));
        img.put_pixel(1, 1, Rgba([255, 255, 255, 255]));
        let grid = sample(&img, 2, 2);
        assert_eq!(grid.width, 2);
        assert_eq!(grid.height, 2);
        assert_eq!(grid.pixels, vec![0xf800, 0x07e0, 0x001f, 0xffff]);
        assert_eq!(grid.row(1), &[0x001f, 0xffff]);
    }

    #[test]
    fn test_sample_downscale_is_deterministic() {
        let img = RgbaImage::from_fn(90, 60, |x, y| Rgba([(x * 2) as u8, (y * 4) as u8, 17, 255]));
        let a = sample(&img, 30, 30);
        let b = sample(&img, 30, 30);
        assert_eq!((a.width, a.height), (30, 20));
        assert_eq!(a, b);
    }
}

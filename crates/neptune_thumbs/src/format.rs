//! The four thumbnail encodings and their dispatch.
//!
//! One encoding is chosen per export from the device family and is never
//! switched mid-stream. Every rendition is encoded independently, so a
//! failure only drops that image.

use base64::Engine;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{imageops, DynamicImage, RgbaImage};

use crate::framer::{frame_klipper_block, LineFramer};
use crate::palette::PaletteEncoder;
use crate::sampler::{sample_with, scale, QuantizedGrid, ScaleFilter};
use crate::Result;

/// JPEG quality used for the base64 JPEG format.
const JPEG_QUALITY: u8 = 75;

/// Output buffer size factor for ColPic, in bytes per pixel.
const COLPIC_BUFFER_FACTOR: usize = 10;

/// Wire format of the embedded thumbnail.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ThumbnailFormat {
    /// RGB565 hex digits, one `M10086` comment line per row
    LegacyHex,
    /// ColPic palette stream in 1015 character lines
    PaletteBinary,
    /// Base64 JPEG in 1015 character lines
    Base64Jpeg,
    /// Klipper `; thumbnail begin` PNG blocks
    Base64PngBlock,
}

/// One image size emitted for a device, with its comment tag.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rendition {
    pub tag: &'static str,
    pub width: u32,
    pub height: u32,
}

impl Rendition {
    pub const fn new(tag: &'static str, width: u32, height: u32) -> Self {
        Self { tag, width, height }
    }

    /// Line prefix, e.g. `;gimage:`.
    pub fn prefix(&self) -> String {
        format!(";{}:", self.tag)
    }
}

/// RGB565 rows as hex, low byte first.
pub fn legacy_hex(grid: &QuantizedGrid, prefix: &str) -> String {
    let mut out = String::with_capacity(prefix.len() + grid.pixels.len() * 4 + grid.height * 10);
    out.push_str(prefix);
    for row in grid.rows() {
        for &color in row {
            out.push_str(&format!("{:02x}{:02x}", color & 0xff, color >> 8));
        }
        out.push_str("\rM10086 ;");
    }
    out.push('\r');
    out
}

/// Scale and quantize `image`, then emit it as legacy hex rows.
pub fn encode_legacy_hex(image: &RgbaImage, rendition: &Rendition, filter: ScaleFilter) -> String {
    let grid = sample_with(image, rendition.width, rendition.height, filter);
    legacy_hex(&grid, &rendition.prefix())
}

/// Scale and quantize `image`, then emit it as a framed ColPic stream.
/// Returns an empty string when the encoder fails.
pub fn encode_palette(
    image: &RgbaImage,
    rendition: &Rendition,
    filter: ScaleFilter,
    encoder: &PaletteEncoder,
) -> String {
    let grid = sample_with(image, rendition.width, rendition.height, filter);
    let data = encoder.encode(&grid, grid.width * grid.height * COLPIC_BUFFER_FACTOR);
    if data.is_empty() {
        return String::new();
    }
    let prefix = rendition.prefix();
    LineFramer::with_prefix(&prefix).frame(&data)
}

/// JPEG bytes of `image` (alpha dropped).
pub fn jpeg_bytes(image: &RgbaImage) -> Result<Vec<u8>> {
    let rgb = DynamicImage::ImageRgba8(image.clone()).into_rgb8();
    let mut buf = Vec::new();
    rgb.write_with_encoder(JpegEncoder::new_with_quality(&mut buf, JPEG_QUALITY))?;
    Ok(buf)
}

/// PNG bytes of `image`.
pub fn png_bytes(image: &RgbaImage) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    image.write_with_encoder(PngEncoder::new(&mut buf))?;
    Ok(buf)
}

fn base64(bytes: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

/// Scale `image`, encode as JPEG and frame the base64 text. No filler record.
pub fn encode_base64_jpeg(image: &RgbaImage, rendition: &Rendition, filter: ScaleFilter) -> Result<String> {
    let scaled = scale(image, rendition.width, rendition.height, filter);
    let encoded = base64(&jpeg_bytes(&scaled)?);
    let prefix = rendition.prefix();
    Ok(LineFramer::with_prefix(&prefix).frame_unpadded(encoded.as_bytes()))
}

/// Fit `image` into a transparent `width` x `height` icon, centred, and wrap
/// it in a Klipper block.
pub fn encode_klipper_png(image: &RgbaImage, width: u32, height: u32, filter: ScaleFilter) -> Result<String> {
    let icon = if image.dimensions() == (width, height) {
        image.clone()
    } else {
        let fitted = scale(image, width, height, filter);
        let mut icon = RgbaImage::new(width, height);
        let x = (width.saturating_sub(fitted.width()) / 2) as i64;
        let y = (height.saturating_sub(fitted.height()) / 2) as i64;
        imageops::overlay(&mut icon, &fitted, x, y);
        icon
    };
    let encoded = base64(&png_bytes(&icon)?);
    Ok(frame_klipper_block(&encoded, width, height))
}

/// Encode one rendition of `image` in `format`.
///
/// Failures are logged and produce an empty string so that the remaining
/// renditions are still emitted.
pub fn encode_rendition(
    format: ThumbnailFormat,
    image: &RgbaImage,
    rendition: &Rendition,
    filter: ScaleFilter,
) -> String {
    let result = match format {
        ThumbnailFormat::LegacyHex => Ok(encode_legacy_hex(image, rendition, filter)),
        ThumbnailFormat::PaletteBinary => Ok(encode_palette(
            image,
            rendition,
            filter,
            &PaletteEncoder::default(),
        )),
        ThumbnailFormat::Base64Jpeg => encode_base64_jpeg(image, rendition, filter),
        ThumbnailFormat::Base64PngBlock => {
            encode_klipper_png(image, rendition.width, rendition.height, filter)
        }
    };
    match result {
        Ok(text) => {
            if text.is_empty() {
                log::warn!("Skipping {} thumbnail {}x{}", rendition.tag, rendition.width, rendition.height);
            }
            text
        }
        Err(err) => {
            log::warn!(
                "Skipping {} thumbnail {}x{}: {}",
                rendition.tag,
                rendition.width,
                rendition.height,
                err
            );
            String::new()
        }
    }
}

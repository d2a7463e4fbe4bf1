//! # neptune_thumbs
//!
//! Encodes slicer preview images into the thumbnail comments that printer
//! firmwares read from G-code files.
//!
//! ## Features
//!
//! - **Palette codec**: the ColPic palette/run-length stream used by Elegoo
//!   Neptune 3/4 and Artillery Sidewinder displays (encoder and decoder)
//! - **Legacy hex**: raw RGB565 rows for Neptune 2 / X generation firmware
//! - **Base64 JPEG**: the OrangeStorm Giga variant
//! - **Klipper blocks**: `; thumbnail begin` PNG blocks for Moonraker/Klipper
//!
//! ## Quick Start
//!
//! ```ignore
//! use neptune_thumbs::{embed, ControlFile, Settings};
//!
//! let settings = Settings::load(None)?;
//! let snapshot = image::open("snapshot.png")?.to_rgba8();
//! let mut file = ControlFile::parse(&std::fs::read_to_string("part.gcode")?);
//! let meta = file.slice_metadata();
//! if embed(&settings, &mut file, &meta, &snapshot) {
//!     std::fs::write("part.gcode", file.to_text())?;
//! }
//! ```

use thiserror::Error;

pub mod composer;
pub mod format;
pub mod framer;
pub mod gcode;
pub mod overlay;
pub mod palette;
pub mod profile;
pub mod sampler;
pub mod settings;
pub mod telemetry;

pub use composer::{
    compose, compose_for, embed, render_preview, render_thumbnail, PLUGIN_NAME, PLUGIN_VERSION,
};
pub use format::{encode_rendition, Rendition, ThumbnailFormat};
pub use framer::{frame, frame_klipper_block, frame_unpadded, LineFramer};
pub use gcode::{ControlFile, EmbeddedImage};
pub use overlay::{CornerOption, SliceMetadata};
pub use palette::{decode_colpic, PaletteEncoder};
pub use profile::{Background, DeviceProfile, PrinterModel, ThumbnailFamily};
pub use sampler::{rgb565, sample, QuantizedGrid, ScaleFilter};
pub use settings::{Settings, SettingsError};
pub use telemetry::{send_statistics, StatisticsReport};

/// Errors that can occur while producing thumbnail payloads.
#[derive(Debug, Error)]
pub enum ThumbnailError {
    /// Invalid image dimensions (width or height is zero)
    #[error("invalid dimensions: {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },

    /// Pixel count doesn't match the given dimensions
    #[error("buffer size mismatch: expected {expected} pixels, got {actual}")]
    BufferSizeMismatch { expected: usize, actual: usize },

    /// Encoded stream would not fit in the output budget
    #[error("encoded output of {needed} bytes exceeds limit of {limit} bytes")]
    OutputOverflow { needed: usize, limit: usize },

    /// Line width too small to frame anything
    #[error("invalid line width: {0}")]
    InvalidLineWidth(usize),

    /// Malformed encoded thumbnail data
    #[error("invalid thumbnail data: {0}")]
    InvalidData(String),

    /// Image encoding or decoding failed
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    /// File I/O error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for thumbnail operations.
pub type Result<T> = core::result::Result<T, ThumbnailError>;

/// Payload characters per line in the `;gimage:` style formats (`1024 - 8 - 1`).
pub const EACH_MAX: usize = 1024 - 8 - 1;

/// Base64 characters per line in Klipper thumbnail blocks.
pub const KLIPPER_BLOCK_SIZE: usize = 78;

/// Largest palette the ColPic format can address.
pub const COLPIC_MAX_COLORS: usize = 1024;

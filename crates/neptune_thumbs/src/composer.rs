//! Builds the thumbnail block that is prepended to a G-code file.

use image::{imageops, Rgba, RgbaImage};

use crate::format::{encode_klipper_png, encode_rendition};
use crate::gcode::{ControlFile, GENERATOR_MARKER};
use crate::overlay::{corner_lines, draw_corner_text, draw_cross, SliceMetadata, CANVAS_SIZE};
use crate::profile::{Background, DeviceProfile, ThumbnailFamily};
use crate::sampler::scale;
use crate::settings::Settings;

pub const PLUGIN_NAME: &str = env!("CARGO_PKG_NAME");
pub const PLUGIN_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Box the model snapshot is fitted into, and where it is drawn.
const FOREGROUND_SIZE: u32 = 600;
const FOREGROUND_X: i64 = 150;
const FOREGROUND_Y: i64 = 160;

/// Klipper icon sizes.
const KLIPPER_SMALL: u32 = 32;
const KLIPPER_LARGE: u32 = 300;

/// Comment line identifying the generator, including the blank line after it.
pub fn generator_line() -> String {
    format!(
        "{}the {} plugin version {}\r\r",
        GENERATOR_MARKER, PLUGIN_NAME, PLUGIN_VERSION
    )
}

fn fill_background(canvas: &mut RgbaImage, profile: &DeviceProfile) {
    let solid = |canvas: &mut RgbaImage, rgb: Option<[u8; 3]>| {
        if let Some([r, g, b]) = rgb {
            for pixel in canvas.pixels_mut() {
                *pixel = Rgba([r, g, b, 255]);
            }
        }
    };
    match &profile.background {
        Background::Transparent => {}
        Background::Solid(rgb) => solid(canvas, Some(*rgb)),
        Background::Image(path) => match image::open(path) {
            Ok(img) => imageops::overlay(canvas, &img.to_rgba8(), 0, 0),
            Err(err) => {
                log::warn!("Cannot load background {}: {}", path.display(), err);
                solid(canvas, profile.family.background_color());
            }
        },
    }
}

/// Render the 900x900 thumbnail canvas.
///
/// The foreground is fitted into 600x600 and drawn at (150, 160). With every
/// thumbnail output disabled a red cross replaces the foreground and the
/// corner texts are left out.
pub fn render_thumbnail(
    settings: &Settings,
    profile: &DeviceProfile,
    meta: &SliceMetadata,
    foreground: Option<&RgbaImage>,
    add_background: bool,
) -> RgbaImage {
    let mut canvas = RgbaImage::new(CANVAS_SIZE, CANVAS_SIZE);
    if add_background {
        fill_background(&mut canvas, profile);
    }

    if !settings.any_thumbnails() {
        draw_cross(&mut canvas);
        return canvas;
    }
    if let Some(fg) = foreground {
        let fitted = scale(fg, FOREGROUND_SIZE, FOREGROUND_SIZE, settings.scale_filter);
        imageops::overlay(&mut canvas, &fitted, FOREGROUND_X, FOREGROUND_Y);
    }

    let lines = corner_lines(&settings.corner_options, meta, &settings.currency);
    let light = add_background && profile.family.is_light_background();
    draw_corner_text(&mut canvas, &lines, light);
    canvas
}

/// Preview with the sample statistics, as shown in the settings dialog.
pub fn render_preview(
    settings: &Settings,
    profile: &DeviceProfile,
    foreground: Option<&RgbaImage>,
) -> RgbaImage {
    render_thumbnail(settings, profile, &SliceMetadata::default(), foreground, true)
}

/// Small raw snapshot and large background-free rendering as Klipper blocks.
fn klipper_blocks(
    settings: &Settings,
    profile: &DeviceProfile,
    meta: &SliceMetadata,
    foreground: &RgbaImage,
) -> String {
    let large = render_thumbnail(settings, profile, meta, Some(foreground), false);
    let mut out = String::new();
    for (icon, size) in [(foreground, KLIPPER_SMALL), (&large, KLIPPER_LARGE)] {
        match encode_klipper_png(icon, size, size, settings.scale_filter) {
            Ok(block) => out.push_str(&block),
            Err(err) => log::warn!("Skipping Klipper thumbnail {size}x{size}: {err}"),
        }
    }
    out
}

/// Compose the full thumbnail block for `profile`.
pub fn compose_for(
    settings: &Settings,
    profile: &DeviceProfile,
    meta: &SliceMetadata,
    foreground: &RgbaImage,
) -> String {
    let mut out = String::new();
    if profile.family == ThumbnailFamily::Klipper {
        // Either flag asks for the same Klipper blocks here.
        if settings.any_thumbnails() {
            out.push_str(&klipper_blocks(settings, profile, meta, foreground));
        }
    } else if settings.thumbnails_enabled {
        let thumbnail = render_thumbnail(settings, profile, meta, Some(foreground), true);
        for rendition in profile.renditions() {
            out.push_str(&encode_rendition(
                profile.format(),
                &thumbnail,
                rendition,
                settings.scale_filter,
            ));
        }
    }
    if settings.klipper_thumbnails_enabled && profile.family != ThumbnailFamily::Klipper {
        out.push('\r');
        out.push_str(&klipper_blocks(settings, profile, meta, foreground));
    }
    out.push_str(&generator_line());
    log::debug!("Composed {} thumbnail block of {} bytes", profile.model, out.len());
    out
}

/// Compose the thumbnail block for the configured printer.
///
/// Returns `None` when the printer is not recognized or every thumbnail
/// output is disabled.
pub fn compose(settings: &Settings, meta: &SliceMetadata, foreground: &RgbaImage) -> Option<String> {
    if !settings.any_thumbnails() {
        return None;
    }
    let Some(profile) = settings.profile() else {
        log::warn!("Unrecognized printer '{}', no thumbnail generated", settings.printer_model);
        return None;
    };
    Some(compose_for(settings, &profile, meta, foreground))
}

/// Replace the thumbnails in `file` with freshly composed ones.
///
/// Returns `false` and leaves the file untouched when nothing is composed.
pub fn embed(
    settings: &Settings,
    file: &mut ControlFile,
    meta: &SliceMetadata,
    foreground: &RgbaImage,
) -> bool {
    let Some(block) = compose(settings, meta, foreground) else {
        return false;
    };
    file.strip_thumbnails();
    file.insert_head(block);
    true
}

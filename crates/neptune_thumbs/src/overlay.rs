//! Corner statistics drawn over the thumbnail canvas.
//!
//! Texts are formatted exactly as the printer UI shows them and rasterized
//! with an embedded-graphics bitmap font, scaled up to the 900x900 canvas.

use std::convert::Infallible;

use embedded_graphics::{
    mono_font::{iso_8859_1::FONT_10X20, MonoTextStyle},
    pixelcolor::Rgb888,
    prelude::*,
    primitives::{Line, PrimitiveStyle},
    text::{Baseline, Text},
};
use image::{Rgba, RgbaImage};
use serde::{Deserialize, Serialize};

/// Size of the square canvas the thumbnail is composed on.
pub const CANVAS_SIZE: u32 = 900;

const TEXT_SCALE: i32 = 3;
const BOX_WIDTH: i32 = 400;
const BOX_HEIGHT: i32 = 100;

const OWN_GRAY: Rgb888 = Rgb888::new(200, 200, 200);
const DARKER_GRAY: Rgb888 = Rgb888::new(63, 63, 63);
const CROSS_RED: Rgb888 = Rgb888::new(209, 76, 81);

/// What to show in one corner of the thumbnail.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CornerOption {
    #[default]
    Nothing,
    TimeEstimate,
    FilamentGramsEstimate,
    LayerHeight,
    ModelHeight,
    FilamentCostEstimate,
    FilamentMetersEstimate,
    LineWidth,
}

impl CornerOption {
    pub const ALL: [CornerOption; 8] = [
        CornerOption::Nothing,
        CornerOption::TimeEstimate,
        CornerOption::FilamentGramsEstimate,
        CornerOption::LayerHeight,
        CornerOption::ModelHeight,
        CornerOption::FilamentCostEstimate,
        CornerOption::FilamentMetersEstimate,
        CornerOption::LineWidth,
    ];

    pub fn id(self) -> &'static str {
        match self {
            CornerOption::Nothing => "nothing",
            CornerOption::TimeEstimate => "time_estimate",
            CornerOption::FilamentGramsEstimate => "filament_grams_estimate",
            CornerOption::LayerHeight => "layer_height",
            CornerOption::ModelHeight => "model_height",
            CornerOption::FilamentCostEstimate => "filament_cost_estimate",
            CornerOption::FilamentMetersEstimate => "filament_meters_estimate",
            CornerOption::LineWidth => "line_width",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            CornerOption::Nothing => "Nothing",
            CornerOption::TimeEstimate => "Time Estimate",
            CornerOption::FilamentGramsEstimate => "Filament Grams Estimate",
            CornerOption::LayerHeight => "Layer Height",
            CornerOption::ModelHeight => "Model Height",
            CornerOption::FilamentCostEstimate => "Filament Cost Estimate",
            CornerOption::FilamentMetersEstimate => "Filament Meters Estimate",
            CornerOption::LineWidth => "Line Width",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|o| o.id() == id)
    }
}

/// Print statistics shown in the corners. Negative heights mean unknown.
#[derive(Clone, Debug, PartialEq)]
pub struct SliceMetadata {
    pub layer_height: f64,
    pub time_seconds: u64,
    pub filament_meters: f64,
    pub filament_grams: f64,
    pub model_height: f64,
    pub filament_cost: f64,
    pub line_width: f64,
}

impl Default for SliceMetadata {
    /// Sample values used for previews.
    fn default() -> Self {
        Self {
            layer_height: 0.2,
            time_seconds: 3960,
            filament_meters: 3.9,
            filament_grams: 11.6,
            model_height: 48.0,
            filament_cost: 0.25,
            line_width: 0.4,
        }
    }
}

/// Round half to even at two decimals.
fn round2(x: f64) -> f64 {
    (x * 100.0).round_ties_even() / 100.0
}

/// Shortest representation with at least one decimal (`48.0`, `0.12`).
fn short_decimal(x: f64) -> String {
    let s = format!("{}", x);
    if s.contains('.') || !x.is_finite() {
        s
    } else {
        format!("{}.0", s)
    }
}

/// Text for `option`. Empty for [`CornerOption::Nothing`].
pub fn format_option(option: CornerOption, meta: &SliceMetadata, currency: &str) -> String {
    match option {
        CornerOption::Nothing => String::new(),
        CornerOption::TimeEstimate => {
            let minutes = meta.time_seconds / 60;
            format!("⧖ {}:{:02}h", minutes / 60, minutes % 60)
        }
        CornerOption::FilamentGramsEstimate => {
            format!("⭗ {}g", meta.filament_grams.round_ties_even() as i64)
        }
        CornerOption::LayerHeight => {
            if meta.layer_height < 0.0 {
                "⧗ N/A".to_string()
            } else {
                format!("⧗ {}mm", short_decimal(round2(meta.layer_height)))
            }
        }
        CornerOption::ModelHeight => {
            if meta.model_height < 0.0 {
                "⭱ N/A".to_string()
            } else {
                format!("⭱ {}mm", short_decimal(round2(meta.model_height)))
            }
        }
        CornerOption::FilamentCostEstimate => {
            format!("⛁ {:.2}{}", round2(meta.filament_cost), currency)
        }
        CornerOption::FilamentMetersEstimate => {
            format!("⬌ {:.2}m", round2(meta.filament_meters))
        }
        CornerOption::LineWidth => {
            if meta.line_width < 0.0 {
                "◯ N/A".to_string()
            } else {
                format!("◯ {:.2}mm", round2(meta.line_width))
            }
        }
    }
}

/// Texts for the four corners: top-left, top-right, bottom-left, bottom-right.
pub fn corner_lines(options: &[CornerOption; 4], meta: &SliceMetadata, currency: &str) -> [String; 4] {
    options.map(|option| format_option(option, meta, currency))
}

/// Scaled view of an RGBA image as an embedded-graphics draw target.
struct Canvas<'a> {
    image: &'a mut RgbaImage,
    origin: Point,
    scale: i32,
}

impl<'a> Canvas<'a> {
    fn new(image: &'a mut RgbaImage, origin: Point, scale: i32) -> Self {
        Self {
            image,
            origin,
            scale: scale.max(1),
        }
    }

    fn set_block(&mut self, point: Point, color: Rgb888) {
        let (w, h) = (self.image.width() as i32, self.image.height() as i32);
        let x0 = self.origin.x + point.x * self.scale;
        let y0 = self.origin.y + point.y * self.scale;
        for y in y0.max(0)..(y0 + self.scale).min(h) {
            for x in x0.max(0)..(x0 + self.scale).min(w) {
                self.image
                    .put_pixel(x as u32, y as u32, Rgba([color.r(), color.g(), color.b(), 255]));
            }
        }
    }
}

impl OriginDimensions for Canvas<'_> {
    fn size(&self) -> Size {
        Size::new(
            self.image.width() / self.scale as u32,
            self.image.height() / self.scale as u32,
        )
    }
}

impl DrawTarget for Canvas<'_> {
    type Color = Rgb888;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(point, color) in pixels {
            self.set_block(point, color);
        }
        Ok(())
    }
}

/// The part of `line` the bitmap font can draw. Symbols outside Latin-1
/// are dropped.
fn drawable_text(line: &str) -> String {
    line.chars()
        .filter(|c| (*c as u32) < 0x100)
        .collect::<String>()
        .trim()
        .to_string()
}

/// Draw `lines` into the corner boxes of `image`.
///
/// Index 0 is top-left, 1 top-right, 2 bottom-left, 3 bottom-right. Even
/// indices are left-aligned, odd ones right-aligned; text is centered
/// vertically in its 400x100 box.
pub fn draw_corner_text(image: &mut RgbaImage, lines: &[String], light_background: bool) {
    let color = if light_background { DARKER_GRAY } else { OWN_GRAY };
    let style = MonoTextStyle::new(&FONT_10X20, color);
    let glyph_w = FONT_10X20.character_size.width as i32 * TEXT_SCALE;
    let glyph_h = FONT_10X20.character_size.height as i32 * TEXT_SCALE;

    for (i, line) in lines.iter().enumerate().take(4) {
        let text = drawable_text(line);
        if text.is_empty() {
            continue;
        }
        let left = i % 2 == 0;
        let top = i < 2;
        let box_x = if left { 30 } else { 470 };
        let box_y = if top { 20 } else { 790 };
        let text_w = (text.chars().count() as i32 * glyph_w).min(BOX_WIDTH);
        let x = if left { box_x } else { box_x + BOX_WIDTH - text_w };
        let y = box_y + (BOX_HEIGHT - glyph_h) / 2;

        let mut canvas = Canvas::new(image, Point::new(x, y), TEXT_SCALE);
        let _ = Text::with_baseline(&text, Point::zero(), style, Baseline::Top).draw(&mut canvas);
    }
}

/// Red cross shown in place of the model when thumbnails are disabled.
pub fn draw_cross(image: &mut RgbaImage) {
    let stroke = PrimitiveStyle::with_stroke(CROSS_RED, 40);
    let mut canvas = Canvas::new(image, Point::zero(), 1);
    let _ = Line::new(Point::new(250, 260), Point::new(650, 660))
        .into_styled(stroke)
        .draw(&mut canvas);
    let _ = Line::new(Point::new(650, 260), Point::new(250, 660))
        .into_styled(stroke)
        .draw(&mut canvas);
}

//! G-code control files as ordered text segments.
//!
//! Slicers hand over G-code as a list of segments; the thumbnail block is
//! inserted as the head segment. Flat files are split so that a previously
//! embedded block becomes its own segment again.

use std::collections::HashMap;

use base64::Engine;
use image::{Rgba, RgbaImage};

use crate::overlay::SliceMetadata;
use crate::palette::decode_colpic;
use crate::sampler::rgb888;
use crate::{Result, ThumbnailError};

/// First line of the generator comment appended after every thumbnail block.
pub const GENERATOR_MARKER: &str = ";Thumbnail generated by ";

/// Marks the end of the slicer's header segment; scanning stops after it.
pub const HEADER_END_MARKER: &str = ";Generated with Cura_SteamEngine";

const THUMBNAIL_MARKERS: [&str; 4] = [";gimage:", ";simage:", "; thumbnail begin ", GENERATOR_MARKER];
const IMAGE_TAGS: [&str; 3] = ["gimage:", "simage:", "mimage:"];
const KLIPPER_BEGIN: &str = "; thumbnail begin ";
const KLIPPER_END: &str = "; thumbnail end";
const LEGACY_ROW: &str = "M10086 ;";

/// Header comment keys and the parameter names they map to.
const ELEGOO_PARAMS: &[(&str, &str)] = &[
    ("flavor", "flavor"),
    ("time", "time"),
    ("filament used", "filament_used"),
    ("layer height", "layer_height"),
    ("minx", "minx"),
    ("miny", "miny"),
    ("minz", "minz"),
    ("maxx", "maxx"),
    ("maxy", "maxy"),
    ("maxz", "maxz"),
    ("target_machine.name", "machine_name"),
];

const ULTIMAKER_PARAMS: &[(&str, &str)] = &[
    ("flavor", "flavor"),
    ("print.time", "time"),
    ("print.size.min.x", "minx"),
    ("print.size.min.y", "miny"),
    ("print.size.min.z", "minz"),
    ("print.size.max.x", "maxx"),
    ("print.size.max.y", "maxy"),
    ("print.size.max.z", "maxz"),
    ("target_machine.name", "machine_name"),
];

fn strip_eol(line: &str) -> &str {
    line.trim_end_matches(['\r', '\n'])
}

fn lines_inclusive(text: &str) -> impl Iterator<Item = &str> {
    text.split_inclusive(['\r', '\n'])
}

/// `;gimage:`, `;;gimage:`, `;simage:`, `;mimage:` and the rest of the line.
fn image_tag(line: &str) -> Option<(&str, &str)> {
    let body = line.strip_prefix(';')?;
    let body = body.strip_prefix(';').unwrap_or(body);
    IMAGE_TAGS
        .iter()
        .find(|tag| body.starts_with(*tag))
        .map(|tag| (&tag[..tag.len() - 1], &body[tag.len()..]))
}

fn is_filler(line: &str) -> bool {
    line.strip_prefix(';')
        .is_some_and(|rest| rest.bytes().all(|b| b == b'0'))
}

/// Base64 payload of a `; <data>` line inside a Klipper block.
fn klipper_payload(line: &str) -> Option<&str> {
    line.strip_prefix("; ").filter(|data| {
        !data.is_empty()
            && data
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'+' | b'/' | b'='))
    })
}

fn has_thumbnail(segment: &str) -> bool {
    THUMBNAIL_MARKERS.iter().any(|m| segment.contains(m))
}

/// Remove every thumbnail line from `segment`, keeping everything else.
fn strip_segment(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len());
    let mut in_klipper = false;
    let mut after_payload = false;
    for raw in lines_inclusive(segment) {
        let line = strip_eol(raw);
        if in_klipper {
            if line == KLIPPER_END {
                in_klipper = false;
                continue;
            }
            if klipper_payload(line).is_some() {
                continue;
            }
            // Unterminated block ends at the first non-payload line.
            in_klipper = false;
        }
        let removed = if line.starts_with(KLIPPER_BEGIN) {
            in_klipper = true;
            true
        } else if image_tag(line).is_some() || line.starts_with(GENERATOR_MARKER) {
            true
        } else {
            after_payload && (line.is_empty() || line.starts_with(LEGACY_ROW) || is_filler(line))
        };
        if removed {
            after_payload = true;
        } else {
            after_payload = false;
            out.push_str(raw);
        }
    }
    out
}

/// One thumbnail image found in an existing file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EmbeddedImage {
    /// `gimage`, `simage`, `mimage` or `thumbnail` for Klipper blocks
    pub tag: String,
    /// Payload text per line, prefixes removed
    pub lines: Vec<String>,
}

impl EmbeddedImage {
    /// Decode the payload, detecting its wire format.
    pub fn decode(&self) -> Result<RgbaImage> {
        let payload = self.lines.concat();
        if self.tag == "thumbnail" || payload.starts_with("/9j/") {
            let bytes = base64::engine::general_purpose::STANDARD
                .decode(payload.as_bytes())
                .map_err(|err| ThumbnailError::InvalidData(err.to_string()))?;
            return Ok(image::load_from_memory(&bytes)?.to_rgba8());
        }
        let is_hex = |l: &String| !l.is_empty() && l.len() % 4 == 0 && l.bytes().all(|b| b.is_ascii_hexdigit());
        if self.lines.iter().all(is_hex) && self.lines.iter().all(|l| l.len() == self.lines[0].len()) {
            return Ok(decode_legacy_hex(&self.lines));
        }
        Ok(decode_colpic(payload.as_bytes())?.to_rgba())
    }
}

fn decode_legacy_hex(rows: &[String]) -> RgbaImage {
    let width = rows.first().map_or(0, |r| r.len() / 4) as u32;
    let mut img = RgbaImage::new(width, rows.len() as u32);
    for (y, row) in rows.iter().enumerate() {
        for x in 0..width as usize {
            let byte = |i: usize| u8::from_str_radix(&row[i..i + 2], 16).unwrap_or(0);
            let color = u16::from_le_bytes([byte(x * 4), byte(x * 4 + 2)]);
            let [r, g, b] = rgb888(color);
            img.put_pixel(x as u32, y as u32, Rgba([r, g, b, 255]));
        }
    }
    img
}

/// Ordered text segments of one G-code file.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ControlFile {
    segments: Vec<String>,
}

impl ControlFile {
    /// Split a flat file. A leading thumbnail block that ends in the
    /// generator line becomes the first segment.
    pub fn parse(text: &str) -> Self {
        let starts_with_thumbnail = lines_inclusive(text)
            .map(strip_eol)
            .find(|l| !l.is_empty())
            .is_some_and(|l| image_tag(l).is_some() || l.starts_with(KLIPPER_BEGIN) || l.starts_with(GENERATOR_MARKER));
        if starts_with_thumbnail {
            let mut offset = 0;
            let mut lines = lines_inclusive(text).peekable();
            while let Some(line) = lines.next() {
                offset += line.len();
                if strip_eol(line).starts_with(GENERATOR_MARKER) {
                    while let Some(next) = lines.peek() {
                        if !strip_eol(next).is_empty() {
                            break;
                        }
                        offset += next.len();
                        lines.next();
                    }
                    let (head, rest) = text.split_at(offset);
                    let mut segments = vec![head.to_string()];
                    if !rest.is_empty() {
                        segments.push(rest.to_string());
                    }
                    return Self { segments };
                }
            }
        }
        Self {
            segments: vec![text.to_string()],
        }
    }

    pub fn from_segments(segments: Vec<String>) -> Self {
        Self { segments }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn into_segments(self) -> Vec<String> {
        self.segments
    }

    pub fn to_text(&self) -> String {
        self.segments.concat()
    }

    /// Index past the last header segment that may hold thumbnails.
    fn header_end(&self) -> usize {
        self.segments
            .iter()
            .position(|s| s.contains(HEADER_END_MARKER))
            .map_or(self.segments.len(), |i| i + 1)
    }

    /// Header parameters such as `time`, `layer_height` and `maxz`.
    pub fn params(&self) -> HashMap<&'static str, String> {
        let mut params = HashMap::new();
        for segment in &self.segments[..self.header_end()] {
            for line in segment.lines().flat_map(|l| l.split('\r')) {
                let lower = line.to_ascii_lowercase();
                for (key, name) in ELEGOO_PARAMS.iter().chain(ULTIMAKER_PARAMS) {
                    let matches = lower
                        .strip_prefix(';')
                        .and_then(|rest| rest.strip_prefix(key))
                        .is_some_and(|rest| rest.starts_with(':'));
                    if matches {
                        params.insert(*name, line[key.len() + 2..].to_string());
                    }
                }
            }
        }
        params
    }

    /// Metadata read from the header. Heights default to `-1.0` when missing;
    /// values the file does not carry are zero.
    pub fn slice_metadata(&self) -> SliceMetadata {
        let params = self.params();
        let number = |key: &str| params.get(key).and_then(|v| v.trim().parse::<f64>().ok());
        SliceMetadata {
            layer_height: number("layer_height").unwrap_or(-1.0),
            model_height: number("maxz").unwrap_or(-1.0),
            time_seconds: number("time").map_or(0, |t| t.max(0.0) as u64),
            filament_meters: params
                .get("filament_used")
                .and_then(|v| v.trim().trim_end_matches('m').parse().ok())
                .unwrap_or(0.0),
            filament_grams: 0.0,
            filament_cost: 0.0,
            line_width: 0.0,
        }
    }

    /// Remove previously embedded thumbnails from the header segments.
    /// Segments left empty are dropped. Returns whether anything was removed.
    pub fn strip_thumbnails(&mut self) -> bool {
        let end = self.header_end();
        let mut changed = false;
        let mut kept = Vec::with_capacity(self.segments.len());
        for (i, segment) in self.segments.drain(..).enumerate() {
            if i >= end || !has_thumbnail(&segment) {
                kept.push(segment);
                continue;
            }
            let stripped = strip_segment(&segment);
            changed |= stripped != segment;
            if !stripped.trim().is_empty() {
                kept.push(stripped);
            }
        }
        self.segments = kept;
        changed
    }

    pub fn insert_head(&mut self, block: String) {
        self.segments.insert(0, block);
    }

    /// Thumbnails embedded in the header segments, in file order.
    pub fn embedded_images(&self) -> Vec<EmbeddedImage> {
        let mut images: Vec<EmbeddedImage> = Vec::new();
        let mut in_klipper = false;
        let mut open = false;
        for segment in &self.segments[..self.header_end()] {
            for line in lines_inclusive(segment).map(strip_eol) {
                if in_klipper {
                    if line == KLIPPER_END {
                        in_klipper = false;
                        continue;
                    }
                    if let Some(data) = klipper_payload(line) {
                        if let Some(image) = images.last_mut() {
                            image.lines.push(data.to_string());
                        }
                        continue;
                    }
                    in_klipper = false;
                }
                if line.starts_with(KLIPPER_BEGIN) {
                    in_klipper = true;
                    open = false;
                    images.push(EmbeddedImage {
                        tag: "thumbnail".to_string(),
                        lines: Vec::new(),
                    });
                } else if let Some((tag, data)) = image_tag(line) {
                    match images.last_mut() {
                        Some(image) if open && image.tag == tag => image.lines.push(data.to_string()),
                        _ => images.push(EmbeddedImage {
                            tag: tag.to_string(),
                            lines: vec![data.to_string()],
                        }),
                    }
                    open = true;
                } else if let (true, Some(row)) = (open, line.strip_prefix(LEGACY_ROW)) {
                    if let Some(image) = images.last_mut() {
                        if !row.is_empty() {
                            image.lines.push(row.to_string());
                        }
                    }
                } else {
                    open = false;
                }
            }
        }
        images
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const HEADER: &str = ";FLAVOR:Marlin\n;TIME:3960\n;Filament used: 3.9m\n;Layer height: 0.2\n;MINX:1\n;MAXZ:48\n;Generated with Cura_SteamEngine 5.6.0\n";

    #[test]
    fn test_params_case_insensitive() {
        let file = ControlFile::from_segments(vec![HEADER.to_string(), "G28\n".to_string()]);
        let params = file.params();
        assert_eq!(params["flavor"], "Marlin");
        assert_eq!(params["time"], "3960");
        assert_eq!(params["filament_used"], " 3.9m");
        assert_eq!(params["layer_height"], " 0.2");
        assert_eq!(params["maxz"], "48");
    }

    #[test]
    fn test_params_stop_after_header() {
        let file = ControlFile::from_segments(vec![HEADER.to_string(), ";LAYER_HEIGHT:0.3\n".to_string()]);
        assert_eq!(file.params()["layer_height"], " 0.2");
    }

    #[test]
    fn test_slice_metadata_defaults() {
        let meta = ControlFile::from_segments(vec![HEADER.to_string()]).slice_metadata();
        assert_eq!(meta.layer_height, 0.2);
        assert_eq!(meta.model_height, 48.0);
        assert_eq!(meta.time_seconds, 3960);
        assert_eq!(meta.filament_meters, 3.9);

        let meta = ControlFile::parse("G28\n").slice_metadata();
        assert_eq!(meta.layer_height, -1.0);
        assert_eq!(meta.model_height, -1.0);
    }

    #[test]
    fn test_ultimaker_keys() {
        let file = ControlFile::parse(";PRINT.TIME:120\n;PRINT.SIZE.MAX.Z:10.5\n");
        let meta = file.slice_metadata();
        assert_eq!(meta.time_seconds, 120);
        assert_eq!(meta.model_height, 10.5);
    }

    #[test]
    fn test_strip_drops_thumbnail_segments() {
        let block = ";gimage:0`00abc\r;0000\r;simage:0`00def\r;00\r;Thumbnail generated by the x plugin version 1\r\r";
        let mut file = ControlFile::from_segments(vec![block.to_string(), HEADER.to_string(), "G1 X1\n".to_string()]);
        assert!(file.strip_thumbnails());
        assert_eq!(file.segments(), &[HEADER.to_string(), "G1 X1\n".to_string()]);
        assert!(!file.strip_thumbnails());
    }

    #[test]
    fn test_strip_legacy_and_klipper_lines() {
        let text = format!(
            ";simage:00f8\rM10086 ;e007\rM10086 ;\r;;gimage:0000\rM10086 ;\r\r; thumbnail begin 1 1 4\r; AAAA\r; thumbnail end\r\r{}",
            HEADER
        );
        let mut file = ControlFile::from_segments(vec![text]);
        file.strip_thumbnails();
        assert_eq!(file.to_text(), HEADER);
    }

    #[test]
    fn test_strip_unterminated_klipper_block_keeps_body() {
        let text = "; thumbnail begin 1 1 4\n; AAAA\n;FLAVOR:Marlin\n;Generated with Cura_SteamEngine 5.6.0\nG28\nG1 X10\n";
        let mut file = ControlFile::parse(text);
        assert!(file.strip_thumbnails());
        assert_eq!(
            file.to_text(),
            ";FLAVOR:Marlin\n;Generated with Cura_SteamEngine 5.6.0\nG28\nG1 X10\n"
        );

        let images = ControlFile::parse(text).embedded_images();
        assert_eq!(images.len(), 1);
        assert_eq!(images[0].lines, ["AAAA"]);
    }

    #[test]
    fn test_strip_ignores_body_segments() {
        let body = "G1 X1\n;gimage:not-a-thumbnail\n";
        let mut file = ControlFile::from_segments(vec![HEADER.to_string(), body.to_string()]);
        assert!(!file.strip_thumbnails());
        assert_eq!(file.segments()[1], body);
    }

    #[test]
    fn test_parse_splits_leading_block() {
        let text = format!(";gimage:abc\r;0\r;Thumbnail generated by the x plugin version 1\r\r{}G28\n", HEADER);
        let file = ControlFile::parse(&text);
        assert_eq!(file.segments().len(), 2);
        assert!(file.segments()[0].ends_with("version 1\r\r"));
        assert!(file.segments()[1].starts_with(";FLAVOR"));
        assert_eq!(file.to_text(), text);

        let plain = ControlFile::parse(HEADER);
        assert_eq!(plain.segments(), &[HEADER.to_string()]);
    }

    #[test]
    fn test_embedded_images() {
        let text = ";gimage:ab\r;gimage:cd\r;0000\r;;gimage:00f8\rM10086 ;e007\rM10086 ;\r; thumbnail begin 1 1 4\r; AA\r; AA\r; thumbnail end\r\r";
        let images = ControlFile::parse(text).embedded_images();
        assert_eq!(images.len(), 3);
        assert_eq!(images[0].tag, "gimage");
        assert_eq!(images[0].lines, ["ab", "cd"]);
        assert_eq!(images[1].lines, ["00f8", "e007"]);
        assert_eq!(images[2].tag, "thumbnail");
        assert_eq!(images[2].lines, ["AA", "AA"]);
    }

    #[test]
    fn test_decode_legacy_rows() {
        let image = EmbeddedImage {
            tag: "simage".to_string(),
            lines: vec!["00f8e007".to_string()],
        };
        let img = image.decode().unwrap();
        assert_eq!(img.dimensions(), (2, 1));
        assert_eq!(img.get_pixel(0, 0).0, [255, 0, 0, 255]);
        assert_eq!(img.get_pixel(1, 0).0, [0, 255, 0, 255]);
    }
}

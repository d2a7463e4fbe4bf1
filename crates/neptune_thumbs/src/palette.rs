//! ColPic palette codec.
//!
//! The stream consumed by Elegoo Neptune 3/4 and Artillery Sidewinder display
//! firmware. A binary image is built from three parts (all little endian):
//!
//! ```text
//! +----------------------+------------------------+-------------------+
//! | header (32 bytes)    | palette (2 * n bytes)  | run data          |
//! +----------------------+------------------------+-------------------+
//! ```
//!
//! The run data addresses the palette in banks of 32 entries:
//!
//! ```text
//! 111b bbbb            select bank b (palette offset b * 32)
//! rrrt tttt            run of r (1..=6) pixels of entry t in the current bank
//! 000t tttt nnnn nnnn  run of n (7..=255) pixels of entry t
//! ```
//!
//! The binary image is then armored into printable characters: three bytes
//! become four 6-bit values offset by `'0'`, with `'\'` replaced by `'~'`.

use std::collections::HashMap;

use crate::sampler::QuantizedGrid;
use crate::{Result, ThumbnailError, COLPIC_MAX_COLORS};

const HEADER_LEN: usize = 32;
const ENCODE_VERSION: u8 = 3;
const HEADER_MARK: u32 = 98_419_516;

const BANK_SIZE: usize = 32;
const BANK_SELECT: u8 = 0b111 << 5;
const SHORT_RUN_MAX: usize = 6;
const MAX_RUN: usize = 255;

const ARMOR_OFFSET: u8 = b'0';
const ARMOR_ESCAPED: u8 = b'\\';
const ARMOR_ESCAPE: u8 = b'~';

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct PaletteEntry {
    color: u16,
    count: u32,
}

impl PaletteEntry {
    fn distance(&self, other: &PaletteEntry) -> u32 {
        let (r0, g0, b0) = channels(self.color);
        let (r1, g1, b1) = channels(other.color);
        r0.abs_diff(r1) + g0.abs_diff(g1) + b0.abs_diff(b1)
    }
}

#[inline]
fn channels(color: u16) -> (u32, u32, u32) {
    let c = color as u32;
    (c >> 11, (c >> 5) & 0x3f, c & 0x1f)
}

/// Occurrence counts of RGB565 colors, in first-seen order.
///
/// Once the table holds `limit` distinct colors it stops counting altogether;
/// later pixels are neither added nor counted.
#[derive(Debug)]
pub struct ColorTable {
    entries: Vec<PaletteEntry>,
    index: HashMap<u16, usize>,
    limit: usize,
}

impl ColorTable {
    pub fn new(limit: usize) -> Self {
        Self {
            entries: Vec::new(),
            index: HashMap::new(),
            limit,
        }
    }

    /// Count one occurrence of `color`. Returns `false` once the table is full.
    pub fn add(&mut self, color: u16) -> bool {
        if self.entries.len() >= self.limit {
            return false;
        }
        match self.index.get(&color) {
            Some(&i) => self.entries[i].count += 1,
            None => {
                self.index.insert(color, self.entries.len());
                self.entries.push(PaletteEntry { color, count: 1 });
            }
        }
        true
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `(color, count)` pairs sorted by descending count.
    pub fn sorted(&self) -> Vec<(u16, u32)> {
        let mut entries = self.entries.clone();
        sort_by_frequency(&mut entries);
        entries.iter().map(|e| (e.color, e.count)).collect()
    }
}

/// Insertion sort, descending by count. An entry is placed before the first
/// earlier entry whose count it equals or exceeds, so among equal counts the
/// later-seen color ends up first. The firmware vendor's encoder orders ties
/// this way and the palette order is part of the output.
fn sort_by_frequency(entries: &mut [PaletteEntry]) {
    for index in 1..entries.len() {
        let entry = entries[index];
        if let Some(pos) = entries[..index].iter().position(|e| entry.count >= e.count) {
            entries.copy_within(pos..index, pos + 1);
            entries[pos] = entry;
        }
    }
}

/// Fold the least frequent entries into their nearest neighbour among the
/// first `max_colors` until the palette fits, rewriting `pixels` in place.
fn reduce_palette(entries: &mut Vec<PaletteEntry>, pixels: &mut [u16], max_colors: usize) {
    while entries.len() > max_colors {
        let Some(last) = entries.pop() else { break };
        let mut nearest = entries[0].color;
        let mut best = u32::MAX;
        for candidate in &entries[..max_colors] {
            let d = candidate.distance(&last);
            if d < best {
                best = d;
                nearest = candidate.color;
            }
        }
        for p in pixels.iter_mut().filter(|p| **p == last.color) {
            *p = nearest;
        }
    }
}

fn validate(pixels: &[u16], width: usize, height: usize) -> Result<()> {
    if width == 0 || height == 0 {
        return Err(ThumbnailError::InvalidDimensions { width, height });
    }
    let expected = width * height;
    if pixels.len() != expected {
        return Err(ThumbnailError::BufferSizeMismatch {
            expected,
            actual: pixels.len(),
        });
    }
    Ok(())
}

/// Encode pixels into the binary (unarmored) ColPic image.
///
/// `max_output_bytes` bounds the whole binary image; run data that would
/// exceed it fails with [`ThumbnailError::OutputOverflow`].
pub fn encode_binary(
    pixels: &[u16],
    width: usize,
    height: usize,
    max_output_bytes: usize,
    max_colors: usize,
) -> Result<Vec<u8>> {
    validate(pixels, width, height)?;
    let max_colors = max_colors.clamp(1, COLPIC_MAX_COLORS);

    let mut table = ColorTable::new(COLPIC_MAX_COLORS);
    for &color in pixels {
        table.add(color);
    }
    let mut entries = table.entries;
    sort_by_frequency(&mut entries);

    let mut pixels = pixels.to_vec();
    reduce_palette(&mut entries, &mut pixels, max_colors);

    let palette: Vec<u16> = entries.iter().map(|e| e.color).collect();
    let list_size = palette.len() * 2;
    let data_limit = max_output_bytes.saturating_sub(HEADER_LEN + list_size);
    let runs = encode_runs(&pixels, &palette, data_limit)?;

    let mut out = Vec::with_capacity(HEADER_LEN + list_size + runs.len());
    out.push(ENCODE_VERSION);
    out.push(0);
    out.extend_from_slice(&0u16.to_le_bytes());
    // Firmware reads the row count first.
    out.extend_from_slice(&(height as u32).to_le_bytes());
    out.extend_from_slice(&(width as u32).to_le_bytes());
    out.extend_from_slice(&HEADER_MARK.to_le_bytes());
    out.extend_from_slice(&(list_size as u32).to_le_bytes());
    out.extend_from_slice(&(runs.len() as u32).to_le_bytes());
    out.extend_from_slice(&[0u8; 8]);
    for color in &palette {
        out.extend_from_slice(&color.to_le_bytes());
    }
    out.extend_from_slice(&runs);
    Ok(out)
}

fn encode_runs(pixels: &[u16], palette: &[u16], limit: usize) -> Result<Vec<u8>> {
    let lookup: HashMap<u16, usize> = palette
        .iter()
        .enumerate()
        .rev()
        .map(|(i, &c)| (c, i))
        .collect();

    let mut out = Vec::new();
    let push = |out: &mut Vec<u8>, byte: u8| {
        if out.len() >= limit {
            return Err(ThumbnailError::OutputOverflow {
                needed: out.len() + 1,
                limit,
            });
        }
        out.push(byte);
        Ok(())
    };

    let mut bank = 0usize;
    let mut src = 0usize;
    while src < pixels.len() {
        let color = pixels[src];
        let mut run = 1;
        while run < MAX_RUN && src + run < pixels.len() && pixels[src + run] == color {
            run += 1;
        }

        // colors that missed the table fall back to the most frequent entry
        let index = lookup.get(&color).copied().unwrap_or(0);
        let (sid, tid) = (index / BANK_SIZE, (index % BANK_SIZE) as u8);
        if sid != bank {
            push(&mut out, BANK_SELECT | sid as u8)?;
            bank = sid;
        }
        if run <= SHORT_RUN_MAX {
            push(&mut out, ((run as u8) << 5) | tid)?;
        } else {
            push(&mut out, tid)?;
            push(&mut out, run as u8)?;
        }
        src += run;
    }
    Ok(out)
}

/// Armor a binary image into the printable ColPic character set.
///
/// One to three zero bytes are always appended first, so the input length
/// reaches the next multiple of three strictly above it.
pub fn armor(binary: &[u8]) -> Vec<u8> {
    let mut padded = binary.to_vec();
    padded.resize(binary.len() + 3 - binary.len() % 3, 0);

    let mut out = Vec::with_capacity(padded.len() / 3 * 4);
    for c in padded.chunks_exact(3) {
        let sextets = [
            c[0] >> 2,
            ((c[0] & 0x03) << 4) | (c[1] >> 4),
            ((c[1] & 0x0f) << 2) | (c[2] >> 6),
            c[2] & 0x3f,
        ];
        out.extend(sextets.iter().map(|s| match s + ARMOR_OFFSET {
            ARMOR_ESCAPED => ARMOR_ESCAPE,
            ch => ch,
        }));
    }
    out
}

/// Reverse [`armor`]. Trailing padding bytes are kept.
pub fn dearmor(text: &[u8]) -> Result<Vec<u8>> {
    if text.len() % 4 != 0 {
        return Err(ThumbnailError::InvalidData(format!(
            "armored length {} is not a multiple of 4",
            text.len()
        )));
    }
    let mut out = Vec::with_capacity(text.len() / 4 * 3);
    for chunk in text.chunks_exact(4) {
        let mut s = [0u8; 4];
        for (dst, &ch) in s.iter_mut().zip(chunk) {
            let ch = if ch == ARMOR_ESCAPE { ARMOR_ESCAPED } else { ch };
            *dst = ch
                .checked_sub(ARMOR_OFFSET)
                .filter(|v| *v < 64)
                .ok_or_else(|| ThumbnailError::InvalidData(format!("invalid character {:?}", ch as char)))?;
        }
        out.push((s[0] << 2) | (s[1] >> 4));
        out.push((s[1] << 4) | (s[2] >> 2));
        out.push((s[2] << 6) | s[3]);
    }
    Ok(out)
}

/// Encode pixels into the armored ColPic text.
///
/// Fails when the armored text would need `max_output_bytes` or more bytes,
/// matching the fixed output buffer of the reference encoder.
pub fn encode_str(
    pixels: &[u16],
    width: usize,
    height: usize,
    max_output_bytes: usize,
    max_colors: usize,
) -> Result<Vec<u8>> {
    let binary = encode_binary(pixels, width, height, max_output_bytes, max_colors)?;
    let padded_len = binary.len() + 3 - binary.len() % 3;
    let needed = padded_len * 4 / 3;
    if needed >= max_output_bytes {
        return Err(ThumbnailError::OutputOverflow {
            needed,
            limit: max_output_bytes,
        });
    }
    Ok(armor(&binary))
}

/// Palette encoder with the failure policy of the thumbnail pipeline: an
/// encode error is logged and yields an empty payload.
#[derive(Clone, Debug)]
pub struct PaletteEncoder {
    /// Maximum palette entries (1..=1024).
    pub max_colors: usize,
}

impl Default for PaletteEncoder {
    fn default() -> Self {
        Self {
            max_colors: COLPIC_MAX_COLORS,
        }
    }
}

impl PaletteEncoder {
    pub fn with_max_colors(max_colors: usize) -> Self {
        Self { max_colors }
    }

    /// Encode `grid` into armored ColPic text, or an empty vector on failure.
    pub fn encode(&self, grid: &QuantizedGrid, max_output_bytes: usize) -> Vec<u8> {
        match encode_str(
            &grid.pixels,
            grid.width,
            grid.height,
            max_output_bytes,
            self.max_colors,
        ) {
            Ok(data) => {
                log::debug!(
                    "ColPic {}x{}: {} pixels -> {} bytes",
                    grid.width,
                    grid.height,
                    grid.pixels.len(),
                    data.len()
                );
                data
            }
            Err(err) => {
                log::warn!("ColPic encoding of {}x{} failed: {}", grid.width, grid.height, err);
                Vec::new()
            }
        }
    }
}

/// Decode armored ColPic text back into RGB565 pixels.
pub fn decode_colpic(text: &[u8]) -> Result<QuantizedGrid> {
    let raw = dearmor(text)?;
    if raw.len() < HEADER_LEN {
        return Err(ThumbnailError::InvalidData(format!(
            "stream of {} bytes is shorter than the header",
            raw.len()
        )));
    }
    let u32_at = |offset: usize| {
        u32::from_le_bytes([raw[offset], raw[offset + 1], raw[offset + 2], raw[offset + 3]]) as usize
    };
    if raw[0] != ENCODE_VERSION {
        return Err(ThumbnailError::InvalidData(format!("unsupported version {}", raw[0])));
    }
    if u32_at(12) != HEADER_MARK as usize {
        return Err(ThumbnailError::InvalidData("bad header mark".to_string()));
    }
    let (height, width) = (u32_at(4), u32_at(8));
    let (list_size, data_size) = (u32_at(16), u32_at(20));
    if width == 0 || height == 0 {
        return Err(ThumbnailError::InvalidDimensions { width, height });
    }
    let data_start = HEADER_LEN + list_size;
    let data_end = data_start + data_size;
    if list_size % 2 != 0 || data_end > raw.len() {
        return Err(ThumbnailError::InvalidData(format!(
            "section sizes {list_size}+{data_size} exceed stream of {} bytes",
            raw.len()
        )));
    }

    let palette: Vec<u16> = raw[HEADER_LEN..data_start]
        .chunks_exact(2)
        .map(|c| u16::from_le_bytes([c[0], c[1]]))
        .collect();
    let data = &raw[data_start..data_end];
    let total = width
        .checked_mul(height)
        .ok_or_else(|| ThumbnailError::InvalidData(format!("image of {width}x{height} is too large")))?;

    let mut pixels = Vec::with_capacity(total.min(data.len() * MAX_RUN));
    let mut bank = 0usize;
    let mut i = 0;
    while i < data.len() {
        let byte = data[i];
        let tid = (byte & 0x1f) as usize;
        let run = match byte >> 5 {
            0b111 => {
                bank = tid;
                i += 1;
                continue;
            }
            0 => {
                let n = *data
                    .get(i + 1)
                    .ok_or_else(|| ThumbnailError::InvalidData("truncated long run".to_string()))?;
                i += 2;
                n as usize
            }
            short => {
                i += 1;
                short as usize
            }
        };
        let index = bank * BANK_SIZE + tid;
        let color = *palette.get(index).ok_or_else(|| {
            ThumbnailError::InvalidData(format!("palette index {index} out of range"))
        })?;
        if pixels.len() + run > total {
            return Err(ThumbnailError::InvalidData("run exceeds image size".to_string()));
        }
        pixels.resize(pixels.len() + run, color);
    }

    if pixels.len() != total {
        return Err(ThumbnailError::BufferSizeMismatch {
            expected: total,
            actual: pixels.len(),
        });
    }
    Ok(QuantizedGrid {
        width,
        height,
        pixels,
    })
}

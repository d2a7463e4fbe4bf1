//! Fixed-width comment framing for thumbnail payloads.
//!
//! Palette and base64 payloads are written as lines of at most `each_max`
//! characters, each line starting with the image tag (`;gimage:` etc).
//! Palette payloads are followed by a filler record of `'0'` characters that
//! rounds the segment up to the size the firmware reader expects.

use crate::{Result, ThumbnailError, EACH_MAX, KLIPPER_BLOCK_SIZE};

/// Number of filler characters after a payload of `total` characters.
///
/// `each_max - 3 - total % each_max`, never negative.
pub fn append_len(total: usize, each_max: usize) -> usize {
    if each_max == 0 {
        return 0;
    }
    each_max.saturating_sub(3).saturating_sub(total % each_max)
}

/// Frames payload bytes into prefixed lines.
#[derive(Clone, Debug)]
pub struct LineFramer<'a> {
    prefix: &'a str,
    each_max: usize,
}

impl<'a> LineFramer<'a> {
    pub fn new(prefix: &'a str, each_max: usize) -> Result<Self> {
        if each_max == 0 {
            return Err(ThumbnailError::InvalidLineWidth(each_max));
        }
        Ok(Self { prefix, each_max })
    }

    /// Framer with the standard line width of 1015 characters.
    pub fn with_prefix(prefix: &'a str) -> Self {
        Self {
            prefix,
            each_max: EACH_MAX,
        }
    }

    pub fn each_max(&self) -> usize {
        self.each_max
    }

    /// Frame `payload` followed by the filler record and a final `\r`.
    pub fn frame(&self, payload: &[u8]) -> String {
        let mut out = String::new();
        let total = self.push_lines(&mut out, payload);
        out.push_str("\r;");
        out.extend(std::iter::repeat('0').take(append_len(total, self.each_max)));
        out.push('\r');
        out
    }

    /// Frame `payload` followed only by a final `\r`.
    pub fn frame_unpadded(&self, payload: &[u8]) -> String {
        let mut out = String::new();
        self.push_lines(&mut out, payload);
        out.push('\r');
        out
    }

    /// Returns the number of payload characters written. Null bytes are
    /// unused buffer space and are skipped.
    fn push_lines(&self, out: &mut String, payload: &[u8]) -> usize {
        let mut written = 0;
        for &byte in payload.iter().filter(|b| **b != 0) {
            if written == 0 {
                out.push_str(self.prefix);
            } else if written % self.each_max == 0 {
                out.push('\r');
                out.push_str(self.prefix);
            }
            out.push(byte as char);
            written += 1;
        }
        written
    }
}

/// Frame `payload` with `prefix` and the filler record.
pub fn frame(payload: &[u8], prefix: &str, each_max: usize) -> Result<String> {
    Ok(LineFramer::new(prefix, each_max)?.frame(payload))
}

/// Frame `payload` with `prefix`, without the filler record.
pub fn frame_unpadded(payload: &[u8], prefix: &str, each_max: usize) -> Result<String> {
    Ok(LineFramer::new(prefix, each_max)?.frame_unpadded(payload))
}

/// Wrap a base64 PNG into a Klipper/Moonraker thumbnail block.
pub fn frame_klipper_block(base64: &str, width: u32, height: u32) -> String {
    let mut out = format!("; thumbnail begin {} {} {}\r", width, height, base64.len());
    for chunk in base64.as_bytes().chunks(KLIPPER_BLOCK_SIZE) {
        out.push_str("; ");
        out.extend(chunk.iter().map(|&b| b as char));
        out.push('\r');
    }
    out.push_str("; thumbnail end\r\r");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn payload_lines(framed: &str, prefix: &str) -> Vec<String> {
        framed
            .split('\r')
            .filter_map(|line| line.strip_prefix(prefix))
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn test_append_len_exact_multiple() {
        assert_eq!(append_len(2030, 1015), 1012);
        assert_eq!(append_len(0, 1015), 1012);
        assert_eq!(append_len(1, 1015), 1011);
        assert_eq!(append_len(1012, 1015), 0);
        assert_eq!(append_len(1014, 1015), 0);
    }

    #[test]
    fn test_append_len_bounds() {
        for each_max in [4usize, 10, 1015] {
            for total in 0..each_max * 4 {
                let n = append_len(total, each_max);
                assert!(n < each_max, "append_len({total}, {each_max}) = {n}");
                let r = total % each_max;
                if r <= each_max - 3 {
                    assert_eq!(n + r, each_max - 3);
                } else {
                    assert_eq!(n, 0);
                }
            }
        }
    }

    #[test]
    fn test_frame_small_payload() {
        let framed = frame(b"abc", ";gimage:", 10).unwrap();
        assert_eq!(framed, ";gimage:abc\r;0000\r");
    }

    #[test]
    fn test_frame_line_width_invariant() {
        for len in [1usize, 9, 10, 11, 25, 30] {
            let payload: Vec<u8> = (0..len).map(|i| b'A' + (i % 26) as u8).collect();
            let framed = frame(&payload, ";simage:", 10).unwrap();
            let lines = payload_lines(&framed, ";simage:");
            assert_eq!(lines.len(), len.div_ceil(10));
            for line in &lines[..lines.len() - 1] {
                assert_eq!(line.len(), 10);
            }
            assert_eq!(lines.concat().as_bytes(), &payload[..]);
            let filler = framed.rsplit('\r').nth(1).unwrap();
            assert_eq!(filler.len(), 1 + append_len(len, 10));
        }
    }

    #[test]
    fn test_frame_exact_multiple_of_each_max() {
        let payload = vec![b'x'; 2030];
        let framed = frame(&payload, ";gimage:", 1015).unwrap();
        let lines = payload_lines(&framed, ";gimage:");
        assert_eq!(lines.len(), 2);
        assert!(lines.iter().all(|l| l.len() == 1015));
        assert!(framed.ends_with(&format!("\r;{}\r", "0".repeat(1012))));
    }

    #[test]
    fn test_frame_skips_null_bytes() {
        let framed = frame(b"a\0b\0\0", ";gimage:", 1015).unwrap();
        assert!(framed.starts_with(";gimage:ab\r;"));
        assert_eq!(framed.len(), ";gimage:ab\r;".len() + 1010 + 1);
    }

    #[test]
    fn test_frame_unpadded() {
        let framed = frame_unpadded(b"ABCDEFG", ";gimage:", 3).unwrap();
        assert_eq!(framed, ";gimage:ABC\r;gimage:DEF\r;gimage:G\r");
    }

    #[test]
    fn test_zero_width_rejected() {
        assert!(matches!(
            LineFramer::new(";gimage:", 0),
            Err(ThumbnailError::InvalidLineWidth(0))
        ));
    }

    #[test]
    fn test_klipper_block_line_count() {
        let b64 = "A".repeat(200);
        let block = frame_klipper_block(&b64, 32, 32);
        let lines: Vec<&str> = block.split('\r').collect();
        assert_eq!(lines[0], "; thumbnail begin 32 32 200");
        let body: Vec<&&str> = lines
            .iter()
            .filter(|l| l.starts_with("; ") && !l.contains("thumbnail"))
            .collect();
        assert_eq!(body.len(), 3);
        assert_eq!(body[0].len(), 2 + 78);
        assert_eq!(body[2].len(), 2 + 200 - 156);
        assert!(block.ends_with("; thumbnail end\r\r"));
    }
}

#![no_main]

use libfuzzer_sys::fuzz_target;
use neptune_thumbs::{decode_colpic, ControlFile};

fuzz_target!(|data: &[u8]| {
    // Neither the codec nor the G-code scanner may panic on arbitrary input
    let _ = decode_colpic(data);
    if let Ok(text) = std::str::from_utf8(data) {
        for image in ControlFile::parse(text).embedded_images() {
            let _ = image.decode();
        }
    }
});

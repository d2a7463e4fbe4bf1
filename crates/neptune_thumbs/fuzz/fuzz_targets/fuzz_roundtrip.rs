#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use neptune_thumbs::palette::encode_str;
use neptune_thumbs::{decode_colpic, COLPIC_MAX_COLORS};

#[derive(Arbitrary, Debug)]
struct FuzzInput {
    width: u8,
    height: u8,
    pixels: Vec<u16>,
}

fuzz_target!(|input: FuzzInput| {
    let width = (input.width as usize).clamp(1, 64);
    let height = (input.height as usize).clamp(1, 64);
    let expected = width * height;
    if input.pixels.len() < expected {
        return;
    }
    let pixels = &input.pixels[..expected];

    let text = match encode_str(pixels, width, height, expected * 10 + 64, COLPIC_MAX_COLORS) {
        Ok(t) => t,
        Err(_) => return,
    };

    let decoded = decode_colpic(&text).expect("encoder output must decode");
    assert_eq!((decoded.width, decoded.height), (width, height));

    let mut distinct = pixels.to_vec();
    distinct.sort_unstable();
    distinct.dedup();
    if distinct.len() <= COLPIC_MAX_COLORS {
        assert_eq!(decoded.pixels, pixels);
    }
});

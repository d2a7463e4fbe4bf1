#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use neptune_thumbs::frame;

#[derive(Arbitrary, Debug)]
struct FuzzInput {
    each_max: u16,
    payload: Vec<u8>,
}

fuzz_target!(|input: FuzzInput| {
    let each_max = input.each_max as usize;
    let payload: Vec<u8> = input
        .payload
        .iter()
        .map(|b| b'0' + b % 64)
        .collect();
    let Ok(framed) = frame(&payload, ";gimage:", each_max) else {
        assert_eq!(each_max, 0);
        return;
    };

    let lines: Vec<&str> = framed
        .split('\r')
        .filter_map(|l| l.strip_prefix(";gimage:"))
        .collect();
    for line in &lines {
        assert!(line.len() <= each_max);
    }
    assert_eq!(lines.concat().as_bytes(), &payload[..]);
});

use criterion::{criterion_group, criterion_main, Criterion};
use image::{Rgba, RgbaImage};
use neptune_thumbs::{decode_colpic, frame, sample, PaletteEncoder, EACH_MAX};
use std::hint::black_box;

fn generate_gradient(width: u32, height: u32) -> RgbaImage {
    RgbaImage::from_fn(width, height, |x, y| {
        let r = ((x * 255) / width.max(1)) as u8;
        let g = ((y * 255) / height.max(1)) as u8;
        Rgba([r, g, 128, 255])
    })
}

fn generate_blocks(width: u32, height: u32) -> RgbaImage {
    RgbaImage::from_fn(width, height, |x, y| {
        if (x / 20 + y / 20) % 2 == 0 {
            Rgba([48, 57, 79, 255])
        } else {
            Rgba([240, 120, 20, 255])
        }
    })
}

fn bench_encode(c: &mut Criterion) {
    let encoder = PaletteEncoder::default();
    let mut group = c.benchmark_group("colpic_encode");
    for (name, img) in [
        ("gradient_200x200", generate_gradient(900, 900)),
        ("blocks_200x200", generate_blocks(900, 900)),
    ] {
        let grid = sample(&img, 200, 200);
        let limit = grid.width * grid.height * 10;
        group.bench_function(name, |b| b.iter(|| encoder.encode(black_box(&grid), limit)));
    }
    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let grid = sample(&generate_gradient(900, 900), 200, 200);
    let encoded = PaletteEncoder::default().encode(&grid, grid.width * grid.height * 10);

    c.bench_function("colpic_decode_200x200", |b| {
        b.iter(|| {
            let result = decode_colpic(black_box(&encoded));
            assert!(result.is_ok());
            result
        })
    });
}

fn bench_frame(c: &mut Criterion) {
    let grid = sample(&generate_gradient(900, 900), 200, 200);
    let encoded = PaletteEncoder::default().encode(&grid, grid.width * grid.height * 10);

    c.bench_function("frame_200x200", |b| {
        b.iter(|| frame(black_box(&encoded), ";gimage:", EACH_MAX))
    });
}

criterion_group!(benches, bench_encode, bench_decode, bench_frame);
criterion_main!(benches);

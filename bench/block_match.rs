use criterion::{black_box, criterion_group, criterion_main, Criterion};

use stereo_disparity::prelude::*;

fn noise(u: usize, y: usize) -> u8 {
    let mut h = ((u as u64) << 32) | y as u64;
    h ^= h >> 33;
    h = h.wrapping_mul(0xff51_afd7_ed55_8ccd);
    h ^= h >> 33;
    h = h.wrapping_mul(0xc4ce_b9fe_1a85_ec53);
    h ^= h >> 33;
    (h & 0xff) as u8
}

fn block_match_bench(c: &mut Criterion) {
    // Build a 640x480 pair with a disparity of 12
    let left: DynImage = Gray::from_fn(640, 480, |x, y| noise(x + 100, y)).into();
    let right: DynImage = Gray::from_fn(640, 480, |x, y| noise(x + 112, y)).into();

    let sad = DisparityConfig {
        max_disparity: 64,
        region_radius_x: 5,
        region_radius_y: 5,
        ..Default::default()
    };
    let mut rect = BlockMatch::new(sad.clone()).unwrap();
    c.bench_function("block_match sad rect 640x480", |b| {
        b.iter(|| rect.compute(black_box(&left), black_box(&right)))
    });

    let mut five = BlockMatch::new(DisparityConfig {
        shape: BlockShape::BestFive,
        region_radius_x: 3,
        region_radius_y: 3,
        ..sad.clone()
    }).unwrap();
    c.bench_function("block_match sad best five 640x480", |b| {
        b.iter(|| five.compute(black_box(&left), black_box(&right)))
    });

    let mut census = BlockMatch::new(DisparityConfig {
        error_metric: ErrorMetric::Census,
        subpixel: true,
        ..sad
    }).unwrap();
    c.bench_function("block_match census subpixel 640x480", |b| {
        b.iter(|| census.compute(black_box(&left), black_box(&right)))
    });
}

criterion_group!(benches, block_match_bench);
criterion_main!(benches);

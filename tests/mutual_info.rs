//! # Mutual information
//!
//! Mutual information of stereo pairs at known and computed correspondences.

use approx::assert_relative_eq;
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

#[test]
fn image_with_itself_shares_all_information() {
    let img = Gray::from_fn(40, 30, |x, y| noise(x, y));
    let disp = Gray::filled(40, 30, 0u8);

    let mut mi = StereoMutualInformation::new();
    mi.process(img.view(), img.view(), disp.view(), 255).unwrap();

    assert_eq!(mi.total(), 40 * 30);
    assert_relative_eq!(mi.entropy_left(), mi.entropy_right(), epsilon = 1e-12);
    assert_relative_eq!(mi.entropy_joint(), mi.entropy_left(), epsilon = 1e-9);
    assert_relative_eq!(mi.mutual_information(), mi.entropy_left(), epsilon = 1e-9);
    assert!(mi.mutual_information() > 0.0);
}

#[test]
fn independent_images_share_no_information() {
    // left depends only on x and right only on y, every pair occurs equally often
    let left = Gray::from_fn(16, 16, |x, _| ((x % 4) * 64) as u8);
    let right = Gray::from_fn(16, 16, |_, y| ((y % 4) * 64) as u8);
    let disp = Gray::filled(16, 16, 0u8);

    let mut mi = StereoMutualInformation::new();
    mi.process(left.view(), right.view(), disp.view(), 255).unwrap();

    assert_relative_eq!(mi.entropy_left(), (4.0f64).ln(), epsilon = 1e-9);
    assert_relative_eq!(mi.entropy_joint(), (16.0f64).ln(), epsilon = 1e-9);
    assert_relative_eq!(mi.mutual_information(), 0.0, epsilon = 1e-9);
}

#[test]
fn block_match_disparity_aligns_the_pair() {
    let left = Gray::from_fn(60, 40, |x, y| noise(x + 100, y));
    let right = Gray::from_fn(60, 40, |x, y| noise(x + 106, y));

    let config = DisparityConfig {
        max_disparity: 16,
        validate_rtol: 0,
        ..Default::default()
    };
    let map = compute_disparity(&left.clone().into(), &right.clone().into(), &config).unwrap();
    let disp = match map.data() {
        DisparityData::U8(d) => d,
        DisparityData::F32(_) => unreachable!()
    };

    let mut mi = StereoMutualInformation::new();
    mi.process(left.view(), right.view(), disp.view(), map.invalid_value() as u8).unwrap();
    assert!(mi.total() > 0);
    let aligned = mi.mutual_information();

    // every valid pixel matches exactly, so the joint distribution is as sharp as the marginals
    assert_relative_eq!(aligned, mi.entropy_left(), epsilon = 1e-9);

    let zero = Gray::filled(60, 40, 0u8);
    mi.process(left.view(), right.view(), zero.view(), 255).unwrap();
    assert!(mi.mutual_information() < aligned);
}

#[test]
fn reconfigured_histogram() {
    let left = Gray::from_fn(32, 8, |x, y| (x * 2000 + y) as u16);
    let disp = Gray::filled(32, 8, 0u8);

    let mut mi = StereoMutualInformation::new();
    mi.configure_histogram(65535, 64).unwrap();
    mi.configure_smoothing(1);
    mi.process(left.view(), left.view(), disp.view(), 255).unwrap();

    assert_eq!(mi.bins(), 64);
    assert_relative_eq!(mi.prob_left().iter().sum::<f64>(), 1.0, epsilon = 1e-12);
    assert!(mi.cost(10_000, 10_000) < mi.cost(10_000, 50_000));
}

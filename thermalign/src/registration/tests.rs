use std::time::Duration;

use image::Rgb;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

use super::*;
use crate::math::DMat3;

/// Overlapping colored rectangles on a dark background.
fn scene(width: u32, height: u32, seed: u64) -> RgbImage {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut image = RgbImage::from_pixel(width, height, Rgb([30, 30, 40]));
    for _ in 0..120 {
        let w = rng.random_range(8..40);
        let h = rng.random_range(8..40);
        let x0 = rng.random_range(0..width - w);
        let y0 = rng.random_range(0..height - h);
        let color = Rgb([
            rng.random_range(50..=255),
            rng.random_range(50..=255),
            rng.random_range(50..=255),
        ]);
        for y in y0..y0 + h {
            for x in x0..x0 + w {
                image.put_pixel(x, y, color);
            }
        }
    }
    image
}

/// `image` with its content moved by `(dx, dy)` pixels.
fn shifted(image: &RgbImage, dx: u32, dy: u32) -> RgbImage {
    RgbImage::from_fn(image.width(), image.height(), |x, y| {
        if x >= dx && y >= dy {
            *image.get_pixel(x - dx, y - dy)
        } else {
            Rgb([30, 30, 40])
        }
    })
}

fn map(h: &DMat3, x: f64, y: f64) -> DVec2 {
    h.transform_point(DVec2::new(x, y)).unwrap()
}

#[test]
fn test_identical_images_give_identity() {
    common::test_utils::init_tracing();
    let image = scene(320, 240, 1);

    let aligned = align(&image, &image).unwrap();

    assert!(aligned.result.transform.deviation_from_identity() < 1e-6);
    assert_eq!(aligned.result.inlier_count(), aligned.result.correspondences);
    assert!(aligned.result.correspondences >= MIN_CORRESPONDENCES);
    assert!(aligned.result.correspondences <= 50);
    assert!(aligned.result.rms_error < 1e-6);

    assert_eq!(aligned.image.dimensions(), image.dimensions());
    let max_diff = aligned
        .image
        .pixels()
        .zip(image.pixels())
        .flat_map(|(a, b)| a.0.iter().zip(b.0.iter()).map(|(x, y)| x.abs_diff(*y)))
        .max()
        .unwrap();
    assert!(max_diff <= 1, "max pixel difference {max_diff}");
}

#[test]
fn test_blank_image_has_insufficient_correspondences() {
    let blank = RgbImage::from_pixel(160, 120, Rgb([90, 90, 90]));
    let textured = scene(160, 120, 2);

    for (primary, secondary) in [(&blank, &textured), (&textured, &blank), (&blank, &blank)] {
        match align(primary, secondary) {
            Err(RegistrationError::InsufficientCorrespondences { found, required, .. }) => {
                assert_eq!(found, 0);
                assert_eq!(required, 4);
            }
            other => panic!("expected InsufficientCorrespondences, got {other:?}"),
        }
    }
}

#[test]
fn test_tiny_images_do_not_panic() {
    let tiny = RgbImage::from_pixel(5, 3, Rgb([200, 10, 10]));
    let err = align(&tiny, &tiny).unwrap_err();
    assert!(matches!(
        err,
        RegistrationError::InsufficientCorrespondences { .. }
    ));
}

#[test]
fn test_recovers_translation() {
    let primary = scene(320, 240, 3);
    let secondary = shifted(&primary, 9, 6);

    let aligned = align(&primary, &secondary).unwrap();
    let h = aligned.result.transform;

    // Secondary content sits 9,6 pixels further along, so the transform moves it back.
    for (x, y) in [(60.0, 60.0), (160.0, 120.0), (260.0, 180.0)] {
        let mapped = map(&h, x, y);
        assert!(
            (mapped - DVec2::new(x - 9.0, y - 6.0)).length() < 1.0,
            "({x}, {y}) mapped to {mapped}"
        );
    }

    // Interior pixels line up with the primary image far better than before.
    let mean_diff = |image: &RgbImage| {
        let mut total = 0u64;
        for y in 40..200 {
            for x in 40..280 {
                let a = image.get_pixel(x, y);
                let b = primary.get_pixel(x, y);
                total += a
                    .0
                    .iter()
                    .zip(b.0.iter())
                    .map(|(p, q)| u64::from(p.abs_diff(*q)))
                    .sum::<u64>();
            }
        }
        total as f64 / (160.0 * 240.0 * 3.0)
    };
    let before = mean_diff(&secondary);
    let after = mean_diff(&aligned.image);
    assert!(after < before * 0.25, "mean difference {after} vs {before} unaligned");
}

#[test]
fn test_output_uses_primary_dimensions() {
    let primary = scene(300, 200, 4);
    let secondary = RgbImage::from_fn(340, 230, |x, y| {
        if x < 300 && y < 200 {
            *primary.get_pixel(x, y)
        } else {
            Rgb([0, 0, 0])
        }
    });

    let aligned = align(&primary, &secondary).unwrap();
    assert_eq!(aligned.image.dimensions(), (300, 200));
}

#[test]
fn test_zero_timeout_reports_timed_out() {
    let image = scene(200, 160, 5);
    let err = Registrator::default()
        .align_within(&image, &image, Some(Duration::ZERO))
        .unwrap_err();
    assert_eq!(err.reason(), Some(FailureReason::TimedOut));
}

#[test]
fn test_expired_deadline_stops_before_matching() {
    let blank = GrayImage::from_pixel(120, 90, image::Luma([128]));
    let past = std::time::Instant::now() - Duration::from_millis(1);
    let err = Registrator::default()
        .register_gray(&blank, &blank, Some(past))
        .unwrap_err();
    assert_eq!(err.reason(), Some(FailureReason::TimedOut));
}

#[test]
fn test_unrepresentable_timeout_means_no_limit() {
    let primary = scene(300, 200, 7);
    let secondary = shifted(&primary, 6, 4);
    let aligned = Registrator::default()
        .align_within(&primary, &secondary, Some(Duration::MAX))
        .unwrap();
    assert!(aligned.result.inlier_count() >= MIN_CORRESPONDENCES);
}

#[test]
fn test_correspondence_limit_is_respected() {
    let image = scene(320, 240, 6);
    let registrator = Registrator::new(RegistrationConfig {
        max_correspondences: 12,
        ..RegistrationConfig::default()
    });
    let aligned = registrator.align(&image, &image).unwrap();
    assert_eq!(aligned.result.correspondences, 12);
    assert_eq!(aligned.result.inliers.len(), 12);
}

#[test]
fn test_default_config_is_valid() {
    assert!(RegistrationConfig::default().validate().is_ok());
    let bad = RegistrationConfig {
        max_correspondences: 3,
        ..RegistrationConfig::default()
    };
    assert!(bad.validate().is_err());
    let bad_threshold = RegistrationConfig {
        ransac: RansacConfig {
            inlier_threshold: 0.0,
            ..RansacConfig::default()
        },
        ..RegistrationConfig::default()
    };
    assert!(bad_threshold.validate().is_err());
}

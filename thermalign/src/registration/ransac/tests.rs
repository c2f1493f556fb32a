use std::time::{Duration, Instant};

use glam::DVec2;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

use super::transforms::{adaptive_iterations, estimate_homography, is_degenerate, normalize_points};
use super::*;

fn grid_points(n: usize) -> Vec<DVec2> {
    let mut rng = ChaCha8Rng::seed_from_u64(7);
    (0..n)
        .map(|_| DVec2::new(rng.random_range(0.0..400.0), rng.random_range(0.0..300.0)))
        .collect()
}

fn apply(h: &DMat3, points: &[DVec2]) -> Vec<DVec2> {
    points.iter().map(|p| h.transform_point(*p).unwrap()).collect()
}

fn max_error(a: &DMat3, b: &DMat3, points: &[DVec2]) -> f64 {
    points
        .iter()
        .map(|p| (a.transform_point(*p).unwrap() - b.transform_point(*p).unwrap()).length())
        .fold(0.0, f64::max)
}

fn perspective() -> DMat3 {
    DMat3::from_array([1.02, 0.03, 12.5, -0.02, 0.98, -7.25, 2e-5, -1e-5, 1.0])
}

#[test]
fn test_exact_homography_from_four_points() {
    let src = vec![
        DVec2::new(0.0, 0.0),
        DVec2::new(100.0, 0.0),
        DVec2::new(100.0, 80.0),
        DVec2::new(0.0, 80.0),
    ];
    let h = perspective();
    let dst = apply(&h, &src);

    let estimated = estimate_homography(&src, &dst).unwrap();
    assert!(max_error(&estimated, &h, &src) < 1e-6);
    assert!((estimated[8] - 1.0).abs() < 1e-12);
}

#[test]
fn test_homography_rejects_collinear_points() {
    let src: Vec<DVec2> = (0..4).map(|i| DVec2::new(i as f64 * 10.0, 5.0)).collect();
    assert!(is_degenerate(&src));
    assert!(estimate_homography(&src, &src).is_none());
}

#[test]
fn test_normalized_points_have_sqrt2_mean_distance() {
    let points = grid_points(30);
    let (normalized, t) = normalize_points(&points);
    let mean = normalized.iter().map(|p| p.length()).sum::<f64>() / normalized.len() as f64;
    assert!((mean - std::f64::consts::SQRT_2).abs() < 1e-9);
    let mapped = t.transform_point(points[3]).unwrap();
    assert!((mapped - normalized[3]).length() < 1e-9);
}

#[test]
fn test_adaptive_iterations() {
    assert_eq!(adaptive_iterations(1.0, 4, 0.995), 1);
    assert_eq!(adaptive_iterations(0.0, 4, 0.995), usize::MAX);
    let loose = adaptive_iterations(0.5, 4, 0.995);
    let tight = adaptive_iterations(0.9, 4, 0.995);
    assert!(tight < loose);
    assert_eq!(loose, 83);
}

#[test]
fn test_ransac_with_outliers() {
    let src = grid_points(60);
    let h = perspective();
    let mut dst = apply(&h, &src);

    // A third of the correspondences are garbage.
    let mut rng = ChaCha8Rng::seed_from_u64(99);
    for d in dst.iter_mut().step_by(3) {
        *d += DVec2::new(rng.random_range(30.0..80.0), rng.random_range(-80.0..-30.0));
    }

    let result = RansacEstimator::new(RansacConfig::default())
        .estimate(&src, &dst, None)
        .unwrap();

    assert_eq!(result.inlier_count, 40);
    for (i, &inlier) in result.inliers.iter().enumerate() {
        assert_eq!(inlier, i % 3 != 0, "correspondence {i}");
    }
    assert!(max_error(&result.transform, &h, &src) < 1e-3);
    assert!(result.rms_error < 1e-3);
}

#[test]
fn test_ransac_is_deterministic_with_seed() {
    let src = grid_points(40);
    let mut dst = apply(&DMat3::translation(4.0, -2.0), &src);
    for d in dst.iter_mut().step_by(4) {
        *d += DVec2::new(25.0, 40.0);
    }

    let estimator = RansacEstimator::new(RansacConfig::default());
    let a = estimator.estimate(&src, &dst, None).unwrap();
    let b = estimator.estimate(&src, &dst, None).unwrap();
    assert_eq!(a.transform, b.transform);
    assert_eq!(a.inliers, b.inliers);
    assert_eq!(a.iterations, b.iterations);
}

#[test]
fn test_ransac_too_few_points() {
    let src = grid_points(3);
    let err = RansacEstimator::new(RansacConfig::default())
        .estimate(&src, &src, None)
        .unwrap_err();
    assert_eq!(err.reason, FailureReason::InsufficientInliers);
}

#[test]
fn test_ransac_all_collinear() {
    let src: Vec<DVec2> = (0..10).map(|i| DVec2::new(i as f64 * 7.0, 3.0)).collect();
    let err = RansacEstimator::new(RansacConfig {
        max_iterations: 50,
        ..RansacConfig::default()
    })
    .estimate(&src, &src, None)
    .unwrap_err();
    assert_eq!(err.reason, FailureReason::DegenerateSample);
    assert_eq!(err.iterations, 50);
}

#[test]
fn test_ransac_random_correspondences_fail() {
    let mut rng = ChaCha8Rng::seed_from_u64(3);
    let src = grid_points(40);
    let dst: Vec<DVec2> = (0..40)
        .map(|_| DVec2::new(rng.random_range(0.0..400.0), rng.random_range(0.0..300.0)))
        .collect();

    let err = RansacEstimator::new(RansacConfig {
        inlier_threshold: 1.0,
        min_inlier_ratio: 0.5,
        ..RansacConfig::default()
    })
    .estimate(&src, &dst, None)
    .unwrap_err();
    assert_eq!(err.reason, FailureReason::InsufficientInliers);
    assert!(err.best_inlier_count < 20);
}

#[test]
fn test_ransac_deadline_in_the_past() {
    let src = grid_points(20);
    let deadline = Instant::now() - Duration::from_millis(1);
    let err = RansacEstimator::new(RansacConfig::default())
        .estimate(&src, &src, Some(deadline))
        .unwrap_err();
    assert_eq!(err.reason, FailureReason::TimedOut);
    assert_eq!(err.iterations, 0);
}

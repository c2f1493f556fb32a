//! Homography estimation from point correspondences.
//!
//! Pure geometry and linear algebra: normalized DLT, sample degeneracy tests
//! and the adaptive iteration bound.

use glam::DVec2;
use nalgebra::{DMatrix, SVD};

use crate::math::{centroid, cross, DMat3};

/// Minimum points for a homography.
pub(crate) const HOMOGRAPHY_SAMPLE: usize = 4;

/// Twice-triangle areas below this (in squared pixels) count as collinear.
const COLLINEAR_EPSILON: f64 = 1e-3;

/// Compute adaptive iteration count for early termination.
pub(crate) fn adaptive_iterations(inlier_ratio: f64, sample_size: usize, confidence: f64) -> usize {
    if inlier_ratio <= 0.0 {
        return usize::MAX;
    }
    if inlier_ratio >= 1.0 {
        return 1;
    }

    // N = log(1 - confidence) / log(1 - w^n)
    let w_n = inlier_ratio.powi(sample_size as i32);
    let log_conf = (1.0 - confidence).ln();
    let log_outlier = (1.0 - w_n).ln();

    if log_outlier >= 0.0 || !log_conf.is_finite() {
        return usize::MAX;
    }

    (log_conf / log_outlier).ceil().max(1.0) as usize
}

/// True when any three of the points are (nearly) collinear.
pub(crate) fn is_degenerate(points: &[DVec2]) -> bool {
    let n = points.len();
    for i in 0..n {
        for j in (i + 1)..n {
            for k in (j + 1)..n {
                if cross(points[i], points[j], points[k]).abs() < COLLINEAR_EPSILON {
                    return true;
                }
            }
        }
    }
    false
}

/// Estimate the homography mapping `src` onto `dst` with the normalized DLT.
///
/// With exactly four points the fit is exact; with more it minimizes the
/// algebraic error. The result is scaled so that `h8 == 1`.
pub(crate) fn estimate_homography(src: &[DVec2], dst: &[DVec2]) -> Option<DMat3> {
    if src.len() < HOMOGRAPHY_SAMPLE || src.len() != dst.len() {
        return None;
    }

    let (src_norm, src_t) = normalize_points(src);
    let (dst_norm, dst_t) = normalize_points(dst);

    // Each correspondence contributes two rows:
    // [-x -y -1  0  0  0  x*x'  y*x'  x']
    // [ 0  0  0 -x -y -1  x*y'  y*y'  y']
    let n = src_norm.len();
    let mut a_data = vec![0.0f64; 2 * n * 9];
    for (i, (s, d)) in src_norm.iter().zip(dst_norm.iter()).enumerate() {
        let base = i * 18;
        a_data[base..base + 9]
            .copy_from_slice(&[-s.x, -s.y, -1.0, 0.0, 0.0, 0.0, s.x * d.x, s.y * d.x, d.x]);
        a_data[base + 9..base + 18]
            .copy_from_slice(&[0.0, 0.0, 0.0, -s.x, -s.y, -1.0, s.x * d.y, s.y * d.y, d.y]);
    }
    let a = DMatrix::from_row_slice(2 * n, 9, &a_data);

    let h_norm = solve_homogeneous_svd(a)?;

    // H = T_dst^-1 * H_norm * T_src
    let dst_t_inv = dst_t.inverse()?;
    let h = (dst_t_inv * h_norm * src_t).normalized()?;

    if h.is_finite() && h.inverse().is_some() {
        Some(h)
    } else {
        None
    }
}

/// Translate to the centroid and scale so the mean distance is sqrt(2).
pub(crate) fn normalize_points(points: &[DVec2]) -> (Vec<DVec2>, DMat3) {
    if points.is_empty() {
        return (Vec::new(), DMat3::identity());
    }

    let c = centroid(points);
    let avg_dist = points.iter().map(|p| (*p - c).length()).sum::<f64>() / points.len() as f64;
    if avg_dist < 1e-10 {
        return (points.to_vec(), DMat3::identity());
    }

    let scale = std::f64::consts::SQRT_2 / avg_dist;
    let normalized = points.iter().map(|p| (*p - c) * scale).collect();
    let t = DMat3::from_array([
        scale,
        0.0,
        -c.x * scale,
        0.0,
        scale,
        -c.y * scale,
        0.0,
        0.0,
        1.0,
    ]);
    (normalized, t)
}

/// Null vector of `a`: the right singular vector of the smallest singular value.
fn solve_homogeneous_svd(a: DMatrix<f64>) -> Option<DMat3> {
    let nrows = a.nrows();
    let ncols = a.ncols();

    // Thin SVD of an m x 9 matrix with m < 9 drops the null-space vector,
    // so pad with zero rows.
    let a = if nrows < ncols {
        let mut padded = DMatrix::zeros(ncols, ncols);
        padded.view_mut((0, 0), (nrows, ncols)).copy_from(&a);
        padded
    } else {
        a
    };

    let svd = SVD::new(a, false, true);
    let v_t = svd.v_t?;
    let smallest = svd.singular_values.argmin().0;

    let mut data = [0.0f64; 9];
    for (i, &val) in v_t.row(smallest).iter().enumerate() {
        data[i] = val;
    }
    Some(DMat3::from_array(data))
}

/// Euclidean distance between `dst` and `src` mapped through `h`.
#[inline]
pub(crate) fn reprojection_error(h: &DMat3, src: DVec2, dst: DVec2) -> f64 {
    match h.transform_point(src) {
        Some(projected) => (projected - dst).length(),
        None => f64::INFINITY,
    }
}

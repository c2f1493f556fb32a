//! Small fixed-size linear algebra used by the registration engine.

mod dmat3;

pub use dmat3::DMat3;

use glam::DVec2;

/// Mean of a point set, or the origin for an empty set.
pub fn centroid(points: &[DVec2]) -> DVec2 {
    if points.is_empty() {
        return DVec2::ZERO;
    }
    points.iter().copied().sum::<DVec2>() / points.len() as f64
}

/// Twice the signed area of triangle `(a, b, c)`.
#[inline]
pub fn cross(a: DVec2, b: DVec2, c: DVec2) -> f64 {
    (b - a).perp_dot(c - a)
}

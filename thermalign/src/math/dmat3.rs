use std::ops::{Index, Mul};

use glam::DVec2;

/// Planar projective transform stored row-major:
///
/// ```text
/// | h0 h1 h2 |
/// | h3 h4 h5 |
/// | h6 h7 h8 |
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DMat3 {
    h: [f64; 9],
}

/// Determinants below this are treated as singular.
const SINGULAR_EPSILON: f64 = 1e-12;

impl DMat3 {
    pub const IDENTITY: DMat3 = DMat3 {
        h: [1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0],
    };

    #[inline]
    pub const fn from_array(h: [f64; 9]) -> Self {
        Self { h }
    }

    #[inline]
    pub const fn identity() -> Self {
        Self::IDENTITY
    }

    pub const fn translation(tx: f64, ty: f64) -> Self {
        Self {
            h: [1.0, 0.0, tx, 0.0, 1.0, ty, 0.0, 0.0, 1.0],
        }
    }

    #[inline]
    fn at(&self, row: usize, col: usize) -> f64 {
        self.h[row * 3 + col]
    }

    /// Signed cofactor of element `(row, col)`. Taking the remaining rows and
    /// columns in cyclic order folds the checkerboard sign into the product.
    fn cofactor(&self, row: usize, col: usize) -> f64 {
        let (r0, r1) = ((row + 1) % 3, (row + 2) % 3);
        let (c0, c1) = ((col + 1) % 3, (col + 2) % 3);
        self.at(r0, c0) * self.at(r1, c1) - self.at(r0, c1) * self.at(r1, c0)
    }

    pub fn determinant(&self) -> f64 {
        (0..3).map(|col| self.at(0, col) * self.cofactor(0, col)).sum()
    }

    /// Inverse, or `None` when the determinant is effectively zero.
    pub fn inverse(&self) -> Option<DMat3> {
        let det = self.determinant();
        if !det.is_finite() || det.abs() < SINGULAR_EPSILON {
            return None;
        }
        let mut h = [0.0; 9];
        for (i, v) in h.iter_mut().enumerate() {
            // Transposed cofactor matrix.
            *v = self.cofactor(i % 3, i / 3) / det;
        }
        Some(DMat3 { h })
    }

    /// Scales the matrix so that `h8 == 1`. Returns `None` if `h8` is ~0.
    pub fn normalized(&self) -> Option<DMat3> {
        let scale = self.h[8];
        if !scale.is_finite() || scale.abs() < 1e-10 {
            return None;
        }
        Some(DMat3 {
            h: self.h.map(|v| v / scale),
        })
    }

    /// Applies the matrix to `p` in homogeneous coordinates.
    ///
    /// Returns `None` for points that map to infinity.
    #[inline]
    pub fn transform_point(&self, p: DVec2) -> Option<DVec2> {
        let w = self.at(2, 0) * p.x + self.at(2, 1) * p.y + self.at(2, 2);
        if w.abs() <= f64::EPSILON {
            return None;
        }
        let x = self.at(0, 0) * p.x + self.at(0, 1) * p.y + self.at(0, 2);
        let y = self.at(1, 0) * p.x + self.at(1, 1) * p.y + self.at(1, 2);
        Some(DVec2::new(x / w, y / w))
    }

    pub fn is_finite(&self) -> bool {
        self.h.iter().all(|v| v.is_finite())
    }

    /// Frobenius norm of `self - I`.
    pub fn deviation_from_identity(&self) -> f64 {
        self.h
            .iter()
            .zip(Self::IDENTITY.h.iter())
            .map(|(a, b)| (a - b).powi(2))
            .sum::<f64>()
            .sqrt()
    }
}

impl Default for DMat3 {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Index<usize> for DMat3 {
    type Output = f64;

    #[inline]
    fn index(&self, idx: usize) -> &f64 {
        &self.h[idx]
    }
}

impl Mul for DMat3 {
    type Output = DMat3;

    fn mul(self, rhs: DMat3) -> DMat3 {
        let mut h = [0.0; 9];
        for (i, v) in h.iter_mut().enumerate() {
            let (row, col) = (i / 3, i % 3);
            *v = (0..3).map(|k| self.at(row, k) * rhs.at(k, col)).sum();
        }
        DMat3 { h }
    }
}

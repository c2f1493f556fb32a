//! Registration result and error types.

use image::RgbImage;

use crate::math::DMat3;

/// Why the robust fit did not produce a usable transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    /// No hypothesis gathered a consensus.
    NoConsensus,
    /// Every minimal sample was degenerate (collinear or coincident points).
    DegenerateSample,
    /// A model was found but too few correspondences agree with it.
    InsufficientInliers,
    /// The fitted matrix cannot be inverted for resampling.
    SingularTransform,
    /// The per-pair time budget ran out.
    TimedOut,
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureReason::NoConsensus => write!(f, "no consensus"),
            FailureReason::DegenerateSample => write!(f, "degenerate samples"),
            FailureReason::InsufficientInliers => write!(f, "insufficient inliers"),
            FailureReason::SingularTransform => write!(f, "singular transform"),
            FailureReason::TimedOut => write!(f, "timed out"),
        }
    }
}

/// Registration error types.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RegistrationError {
    #[error(
        "Insufficient correspondences: found {found}, need {required} \
         ({primary_keypoints} primary / {secondary_keypoints} secondary keypoints)"
    )]
    InsufficientCorrespondences {
        found: usize,
        required: usize,
        primary_keypoints: usize,
        secondary_keypoints: usize,
    },

    #[error(
        "Registration failed ({reason}) after {iterations} iterations: \
         best inlier count {best_inlier_count} of {correspondences} correspondences"
    )]
    RegistrationFailed {
        reason: FailureReason,
        iterations: usize,
        best_inlier_count: usize,
        correspondences: usize,
    },
}

impl RegistrationError {
    pub fn reason(&self) -> Option<FailureReason> {
        match self {
            RegistrationError::InsufficientCorrespondences { .. } => None,
            RegistrationError::RegistrationFailed { reason, .. } => Some(*reason),
        }
    }
}

/// Outcome of a successful registration.
#[derive(Debug, Clone)]
pub struct RegistrationResult {
    /// Maps secondary-image pixel coordinates to primary-image pixel coordinates.
    pub transform: DMat3,
    /// Inlier mask, one entry per correspondence.
    pub inliers: Vec<bool>,
    pub correspondences: usize,
    pub primary_keypoints: usize,
    pub secondary_keypoints: usize,
    pub iterations: usize,
    /// RMS reprojection error of the inliers, in pixels.
    pub rms_error: f64,
    pub elapsed_ms: f64,
}

impl RegistrationResult {
    pub fn inlier_count(&self) -> usize {
        self.inliers.iter().filter(|&&inlier| inlier).count()
    }

    pub fn inlier_ratio(&self) -> f64 {
        if self.correspondences == 0 {
            0.0
        } else {
            self.inlier_count() as f64 / self.correspondences as f64
        }
    }
}

/// The secondary image resampled onto the primary image grid.
#[derive(Debug, Clone)]
pub struct AlignedImage {
    pub image: RgbImage,
    pub result: RegistrationResult,
}

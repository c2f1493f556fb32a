//! Configuration types for the registration engine.
//!
//! All tunables of the engine live here. Submodules import the struct they need.

use serde::{Deserialize, Serialize};

use crate::config::ConfigError;

// =============================================================================
// Feature detection
// =============================================================================

/// ORB detector and descriptor parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrbConfig {
    /// Maximum keypoints kept across all pyramid levels.
    pub n_features: usize,
    /// Downscale factor between consecutive pyramid levels.
    pub scale_factor: f32,
    /// Number of pyramid levels, including the full-resolution one.
    pub n_levels: usize,
    /// Intensity difference a FAST circle pixel needs to count as brighter or darker.
    pub fast_threshold: u8,
    /// Harris detector free parameter.
    pub harris_k: f32,
    /// Gaussian sigma applied before sampling descriptor pairs.
    pub blur_sigma: f32,
    /// Seed of the BRIEF sampling pattern. Both images must use the same one.
    pub pattern_seed: u64,
}

impl Default for OrbConfig {
    fn default() -> Self {
        Self {
            n_features: 500,
            scale_factor: 1.2,
            n_levels: 8,
            fast_threshold: 20,
            harris_k: 0.04,
            blur_sigma: 2.0,
            pattern_seed: 0x0b5e_55ed,
        }
    }
}

impl OrbConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.n_features == 0 {
            return Err(ConfigError::invalid("orb.n_features", "must be positive"));
        }
        if !(self.scale_factor > 1.0 && self.scale_factor.is_finite()) {
            return Err(ConfigError::invalid(
                "orb.scale_factor",
                format!("must be greater than 1, got {}", self.scale_factor),
            ));
        }
        if self.n_levels == 0 {
            return Err(ConfigError::invalid("orb.n_levels", "must be positive"));
        }
        if !(self.blur_sigma > 0.0 && self.blur_sigma.is_finite()) {
            return Err(ConfigError::invalid(
                "orb.blur_sigma",
                format!("must be positive, got {}", self.blur_sigma),
            ));
        }
        if !self.harris_k.is_finite() {
            return Err(ConfigError::invalid("orb.harris_k", "must be finite"));
        }
        Ok(())
    }
}

// =============================================================================
// RANSAC configuration
// =============================================================================

/// Robust homography fitting parameters.
///
/// The threshold and iteration budget follow the usual values for homography
/// RANSAC on pixel coordinates. The default seed is fixed so that repeated
/// runs over the same inputs produce the same transform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RansacConfig {
    pub max_iterations: usize,
    /// Reprojection distance in primary-image pixels below which a
    /// correspondence is an inlier.
    pub inlier_threshold: f64,
    /// Target confidence for adaptive early termination.
    pub confidence: f64,
    /// Minimum fraction of correspondences that must be inliers.
    pub min_inlier_ratio: f64,
    /// Random seed (None draws one from the OS).
    pub seed: Option<u64>,
    /// Re-fit promising hypotheses on their inliers before scoring.
    pub use_local_optimization: bool,
    pub lo_max_iterations: usize,
}

impl Default for RansacConfig {
    fn default() -> Self {
        Self {
            max_iterations: 2000,
            inlier_threshold: 3.0,
            confidence: 0.995,
            min_inlier_ratio: 0.25,
            seed: Some(42),
            use_local_optimization: true,
            lo_max_iterations: 10,
        }
    }
}

impl RansacConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_iterations == 0 {
            return Err(ConfigError::invalid(
                "ransac.max_iterations",
                "must be positive",
            ));
        }
        if !(self.inlier_threshold > 0.0 && self.inlier_threshold.is_finite()) {
            return Err(ConfigError::invalid(
                "ransac.inlier_threshold",
                format!("must be positive, got {}", self.inlier_threshold),
            ));
        }
        if !(0.0..1.0).contains(&self.confidence) {
            return Err(ConfigError::invalid(
                "ransac.confidence",
                format!("must be in [0, 1), got {}", self.confidence),
            ));
        }
        if !(self.min_inlier_ratio > 0.0 && self.min_inlier_ratio <= 1.0) {
            return Err(ConfigError::invalid(
                "ransac.min_inlier_ratio",
                format!("must be in (0, 1], got {}", self.min_inlier_ratio),
            ));
        }
        Ok(())
    }
}

// =============================================================================
// Engine configuration
// =============================================================================

/// Minimum point pairs for a projective transform.
pub const MIN_CORRESPONDENCES: usize = 4;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistrationConfig {
    /// Best cross-checked matches kept for fitting.
    pub max_correspondences: usize,
    pub orb: OrbConfig,
    pub ransac: RansacConfig,
}

impl Default for RegistrationConfig {
    fn default() -> Self {
        Self {
            max_correspondences: 50,
            orb: OrbConfig::default(),
            ransac: RansacConfig::default(),
        }
    }
}

impl RegistrationConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_correspondences < MIN_CORRESPONDENCES {
            return Err(ConfigError::invalid(
                "max_correspondences",
                format!(
                    "must be at least {}, got {}",
                    MIN_CORRESPONDENCES, self.max_correspondences
                ),
            ));
        }
        self.orb.validate()?;
        self.ransac.validate()
    }
}

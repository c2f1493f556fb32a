//! Feature-based registration of a secondary image onto a primary image.
//!
//! Both images are reduced to intensity, described with ORB features and
//! matched with a mutual nearest neighbour check. The best matches feed a
//! RANSAC homography fit that maps secondary pixels onto the primary grid,
//! and the secondary image is then resampled through it. The engine works on
//! decoded images only and has no side effects.

pub mod config;
pub mod matching;
pub mod orb;
pub mod ransac;
pub mod result;
pub mod warp;

#[cfg(test)]
mod tests;

use std::time::{Duration, Instant};

use glam::DVec2;
use image::{imageops, GrayImage, RgbImage};

pub use config::{OrbConfig, RansacConfig, RegistrationConfig, MIN_CORRESPONDENCES};
pub use result::{AlignedImage, FailureReason, RegistrationError, RegistrationResult};

use matching::cross_check_match;
use orb::Orb;
use ransac::RansacEstimator;

/// Reusable registration engine.
///
/// Construct once and share across threads: the sampling pattern is built
/// at construction and every call is independent.
#[derive(Debug, Clone)]
pub struct Registrator {
    config: RegistrationConfig,
    orb: Orb,
}

impl Default for Registrator {
    fn default() -> Self {
        Self::new(RegistrationConfig::default())
    }
}

impl Registrator {
    pub fn new(config: RegistrationConfig) -> Self {
        let orb = Orb::new(config.orb.clone());
        Self { config, orb }
    }

    pub fn config(&self) -> &RegistrationConfig {
        &self.config
    }

    /// Aligns `secondary` onto `primary` with no time limit.
    pub fn align(
        &self,
        primary: &RgbImage,
        secondary: &RgbImage,
    ) -> Result<AlignedImage, RegistrationError> {
        self.align_within(primary, secondary, None)
    }

    /// Aligns `secondary` onto `primary`, giving up with
    /// [`FailureReason::TimedOut`] once `timeout` has elapsed.
    ///
    /// The limit is checked after feature detection and on every RANSAC
    /// iteration. A timeout too large to represent means no limit.
    pub fn align_within(
        &self,
        primary: &RgbImage,
        secondary: &RgbImage,
        timeout: Option<Duration>,
    ) -> Result<AlignedImage, RegistrationError> {
        let start = Instant::now();
        let deadline = timeout.and_then(|t| start.checked_add(t));

        let mut result = self.register_gray(
            &imageops::grayscale(primary),
            &imageops::grayscale(secondary),
            deadline,
        )?;

        let image = warp::warp_image(
            secondary,
            &result.transform,
            primary.width(),
            primary.height(),
        )
        .ok_or_else(|| RegistrationError::RegistrationFailed {
            reason: FailureReason::SingularTransform,
            iterations: result.iterations,
            best_inlier_count: result.inlier_count(),
            correspondences: result.correspondences,
        })?;

        result.elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
        Ok(AlignedImage { image, result })
    }

    /// Estimates the secondary-to-primary transform on intensity images.
    pub fn register_gray(
        &self,
        primary: &GrayImage,
        secondary: &GrayImage,
        deadline: Option<Instant>,
    ) -> Result<RegistrationResult, RegistrationError> {
        let start = Instant::now();

        let (primary_features, secondary_features) = rayon::join(
            || self.orb.detect_and_compute(primary),
            || self.orb.detect_and_compute(secondary),
        );
        tracing::debug!(
            "Keypoints: {} primary, {} secondary",
            primary_features.len(),
            secondary_features.len()
        );
        if deadline.is_some_and(|d| Instant::now() >= d) {
            return Err(RegistrationError::RegistrationFailed {
                reason: FailureReason::TimedOut,
                iterations: 0,
                best_inlier_count: 0,
                correspondences: 0,
            });
        }

        let matches = cross_check_match(
            &secondary_features.descriptors,
            &primary_features.descriptors,
            self.config.max_correspondences,
        );
        tracing::debug!("Cross-checked correspondences: {}", matches.len());

        if matches.len() < MIN_CORRESPONDENCES {
            return Err(RegistrationError::InsufficientCorrespondences {
                found: matches.len(),
                required: MIN_CORRESPONDENCES,
                primary_keypoints: primary_features.len(),
                secondary_keypoints: secondary_features.len(),
            });
        }

        let (src, dst): (Vec<DVec2>, Vec<DVec2>) = matches
            .iter()
            .map(|m| {
                (
                    secondary_features.keypoints[m.secondary].position,
                    primary_features.keypoints[m.primary].position,
                )
            })
            .unzip();

        let fit = RansacEstimator::new(self.config.ransac.clone())
            .estimate(&src, &dst, deadline)
            .map_err(|failure| RegistrationError::RegistrationFailed {
                reason: failure.reason,
                iterations: failure.iterations,
                best_inlier_count: failure.best_inlier_count,
                correspondences: matches.len(),
            })?;
        tracing::debug!(
            "RANSAC: {} of {} inliers after {} iterations, rms {:.3} px",
            fit.inlier_count,
            matches.len(),
            fit.iterations,
            fit.rms_error
        );

        Ok(RegistrationResult {
            transform: fit.transform,
            inliers: fit.inliers,
            correspondences: matches.len(),
            primary_keypoints: primary_features.len(),
            secondary_keypoints: secondary_features.len(),
            iterations: fit.iterations,
            rms_error: fit.rms_error,
            elapsed_ms: start.elapsed().as_secs_f64() * 1000.0,
        })
    }
}

/// Aligns `secondary` onto `primary` with the default configuration.
pub fn align(primary: &RgbImage, secondary: &RgbImage) -> Result<AlignedImage, RegistrationError> {
    Registrator::default().align(primary, secondary)
}

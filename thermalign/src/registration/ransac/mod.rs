//! RANSAC (Random Sample Consensus) for robust homography estimation.
//!
//! Each iteration draws four correspondences, fits an exact homography and
//! counts the correspondences it explains within the inlier threshold.
//! Promising hypotheses are refined on their own inliers (LO-RANSAC), the
//! iteration budget shrinks as the best inlier ratio grows, and the winner is
//! re-fitted by least squares on all of its inliers.

#[cfg(test)]
mod tests;

pub(crate) mod transforms;

use std::time::Instant;

use glam::DVec2;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

use crate::math::DMat3;
use crate::registration::config::RansacConfig;
use crate::registration::result::FailureReason;
use transforms::{
    adaptive_iterations, estimate_homography, is_degenerate, reprojection_error,
    HOMOGRAPHY_SAMPLE,
};

/// Result of RANSAC estimation.
#[derive(Debug, Clone)]
pub struct RansacResult {
    /// Maps source points onto destination points.
    pub transform: DMat3,
    /// Inlier mask, index-aligned with the input points.
    pub inliers: Vec<bool>,
    pub inlier_count: usize,
    pub iterations: usize,
    /// RMS reprojection error over the inliers.
    pub rms_error: f64,
}

/// Why and when estimation gave up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RansacFailure {
    pub reason: FailureReason,
    pub iterations: usize,
    pub best_inlier_count: usize,
}

/// Consensus of one hypothesis.
#[derive(Debug, Clone)]
struct Consensus {
    transform: DMat3,
    inliers: Vec<bool>,
    count: usize,
    /// Sum of squared inlier errors, lower is better among equal counts.
    sse: f64,
}

impl Consensus {
    fn better_than(&self, other: &Option<Consensus>) -> bool {
        match other {
            None => true,
            Some(best) => self.count > best.count || (self.count == best.count && self.sse < best.sse),
        }
    }
}

/// RANSAC estimator for robust homography fitting.
pub struct RansacEstimator {
    config: RansacConfig,
}

impl RansacEstimator {
    pub fn new(config: RansacConfig) -> Self {
        Self { config }
    }

    /// Estimates the homography mapping `src` onto `dst`.
    ///
    /// `deadline` bounds wall-clock time; it is checked once per iteration.
    pub fn estimate(
        &self,
        src: &[DVec2],
        dst: &[DVec2],
        deadline: Option<Instant>,
    ) -> Result<RansacResult, RansacFailure> {
        let n = src.len().min(dst.len());
        if n < HOMOGRAPHY_SAMPLE {
            return Err(RansacFailure {
                reason: FailureReason::InsufficientInliers,
                iterations: 0,
                best_inlier_count: 0,
            });
        }
        let src = &src[..n];
        let dst = &dst[..n];

        let mut rng: ChaCha8Rng = match self.config.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_os_rng(),
        };

        let mut best: Option<Consensus> = None;
        let mut sample_indices: Vec<usize> = Vec::with_capacity(HOMOGRAPHY_SAMPLE);
        let mut sample_src: Vec<DVec2> = Vec::with_capacity(HOMOGRAPHY_SAMPLE);
        let mut sample_dst: Vec<DVec2> = Vec::with_capacity(HOMOGRAPHY_SAMPLE);

        let mut iterations = 0;
        let mut degenerate = 0;
        let mut max_iter = self.config.max_iterations;

        while iterations < max_iter {
            if deadline.is_some_and(|d| Instant::now() >= d) {
                return Err(RansacFailure {
                    reason: FailureReason::TimedOut,
                    iterations,
                    best_inlier_count: best.as_ref().map_or(0, |b| b.count),
                });
            }
            iterations += 1;

            random_sample_into(&mut rng, n, HOMOGRAPHY_SAMPLE, &mut sample_indices);
            sample_src.clear();
            sample_dst.clear();
            for &i in &sample_indices {
                sample_src.push(src[i]);
                sample_dst.push(dst[i]);
            }

            if is_degenerate(&sample_src) || is_degenerate(&sample_dst) {
                degenerate += 1;
                continue;
            }

            let Some(transform) = estimate_homography(&sample_src, &sample_dst) else {
                degenerate += 1;
                continue;
            };

            let mut consensus = self.score(src, dst, transform);
            if self.config.use_local_optimization
                && consensus.count >= HOMOGRAPHY_SAMPLE
                && consensus.better_than(&best)
            {
                consensus = self.local_optimization(src, dst, consensus);
            }

            if consensus.better_than(&best) {
                let ratio = consensus.count as f64 / n as f64;
                best = Some(consensus);

                if ratio >= self.config.min_inlier_ratio {
                    let adaptive =
                        adaptive_iterations(ratio, HOMOGRAPHY_SAMPLE, self.config.confidence);
                    max_iter = max_iter.min(adaptive.max(iterations));
                }
            }
        }

        let Some(best) = best else {
            let reason = if degenerate == iterations {
                FailureReason::DegenerateSample
            } else {
                FailureReason::NoConsensus
            };
            return Err(RansacFailure {
                reason,
                iterations,
                best_inlier_count: 0,
            });
        };

        let best = self.refit(src, dst, best);
        let ratio = best.count as f64 / n as f64;
        if best.count < HOMOGRAPHY_SAMPLE || ratio < self.config.min_inlier_ratio {
            return Err(RansacFailure {
                reason: FailureReason::InsufficientInliers,
                iterations,
                best_inlier_count: best.count,
            });
        }

        let rms_error = (best.sse / best.count as f64).sqrt();
        Ok(RansacResult {
            transform: best.transform,
            inliers: best.inliers,
            inlier_count: best.count,
            iterations,
            rms_error,
        })
    }

    fn score(&self, src: &[DVec2], dst: &[DVec2], transform: DMat3) -> Consensus {
        let threshold = self.config.inlier_threshold;
        let mut inliers = vec![false; src.len()];
        let mut count = 0;
        let mut sse = 0.0;
        for (i, (s, d)) in src.iter().zip(dst.iter()).enumerate() {
            let error = reprojection_error(&transform, *s, *d);
            if error < threshold {
                inliers[i] = true;
                count += 1;
                sse += error * error;
            }
        }
        Consensus {
            transform,
            inliers,
            count,
            sse,
        }
    }

    /// Re-estimates from the current inliers until the consensus stops improving.
    fn local_optimization(&self, src: &[DVec2], dst: &[DVec2], initial: Consensus) -> Consensus {
        let mut current = initial;
        for _ in 0..self.config.lo_max_iterations {
            let Some(candidate) = self.fit_inliers(src, dst, &current) else {
                break;
            };
            if candidate.count < current.count
                || (candidate.count == current.count && candidate.sse >= current.sse)
            {
                break;
            }
            current = candidate;
        }
        current
    }

    /// Final least-squares fit on all inliers, kept only if it does not lose inliers.
    fn refit(&self, src: &[DVec2], dst: &[DVec2], best: Consensus) -> Consensus {
        match self.fit_inliers(src, dst, &best) {
            Some(refined) if refined.count >= best.count => refined,
            _ => best,
        }
    }

    fn fit_inliers(&self, src: &[DVec2], dst: &[DVec2], consensus: &Consensus) -> Option<Consensus> {
        if consensus.count < HOMOGRAPHY_SAMPLE {
            return None;
        }
        let (inlier_src, inlier_dst): (Vec<DVec2>, Vec<DVec2>) = consensus
            .inliers
            .iter()
            .enumerate()
            .filter(|(_, &inlier)| inlier)
            .map(|(i, _)| (src[i], dst[i]))
            .unzip();
        let transform = estimate_homography(&inlier_src, &inlier_dst)?;
        Some(self.score(src, dst, transform))
    }
}

/// Floyd's algorithm for sampling `k` distinct indices from `0..n`.
fn random_sample_into<R: Rng>(rng: &mut R, n: usize, k: usize, buffer: &mut Vec<usize>) {
    debug_assert!(k <= n, "Cannot sample {} indices from {}", k, n);
    buffer.clear();
    for j in (n - k)..n {
        let t = rng.random_range(0..=j);
        if buffer.contains(&t) {
            buffer.push(j);
        } else {
            buffer.push(t);
        }
    }
}

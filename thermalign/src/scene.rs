//! Screening of primary images whose view is obscured (fog, low cloud).
//!
//! An obscured frame has almost no usable texture, so registration against it
//! either fails or locks onto noise. The screen combines the mean of the Canny
//! edge map with the mean per-channel color variance.

use image::{imageops, RgbImage};
use serde::{Deserialize, Serialize};

use crate::config::ConfigError;

/// Thresholds separating structured from obscured scenes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneFilterConfig {
    pub canny_low: f32,
    pub canny_high: f32,
    /// Scenes at or above this mean edge-map value (0..255) are rejected.
    pub max_edge_density: f64,
    /// Accepted open interval of mean color variance.
    pub min_variance: f64,
    pub max_variance: f64,
}

impl Default for SceneFilterConfig {
    fn default() -> Self {
        Self {
            canny_low: 50.0,
            canny_high: 150.0,
            max_edge_density: 30.0,
            min_variance: 400.0,
            max_variance: 2000.0,
        }
    }
}

impl SceneFilterConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.canny_low >= 0.0 && self.canny_low <= self.canny_high) {
            return Err(ConfigError::invalid(
                "scene_filter.canny_low",
                format!(
                    "must be non-negative and not above canny_high ({} > {})",
                    self.canny_low, self.canny_high
                ),
            ));
        }
        if self.min_variance >= self.max_variance {
            return Err(ConfigError::invalid(
                "scene_filter.min_variance",
                format!(
                    "must be below max_variance ({} >= {})",
                    self.min_variance, self.max_variance
                ),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneClass {
    Structured,
    Obscured,
}

impl std::fmt::Display for SceneClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SceneClass::Structured => write!(f, "structured"),
            SceneClass::Obscured => write!(f, "obscured"),
        }
    }
}

/// Measured scene statistics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SceneAssessment {
    /// Mean of the Canny edge map, in 0..255.
    pub edge_density: f64,
    /// Mean over the color channels of the per-channel population variance.
    pub color_variance: f64,
}

impl SceneAssessment {
    pub fn measure(image: &RgbImage, config: &SceneFilterConfig) -> Self {
        let pixel_count = image.width() as f64 * image.height() as f64;
        if pixel_count == 0.0 {
            return Self {
                edge_density: 0.0,
                color_variance: 0.0,
            };
        }

        let gray = imageops::grayscale(image);
        let edges = imageproc::edges::canny(&gray, config.canny_low, config.canny_high);
        let edge_sum: u64 = edges.as_raw().iter().map(|&v| u64::from(v)).sum();

        let mut sum = [0.0f64; 3];
        let mut sum_sq = [0.0f64; 3];
        for pixel in image.pixels() {
            for c in 0..3 {
                let v = f64::from(pixel.0[c]);
                sum[c] += v;
                sum_sq[c] += v * v;
            }
        }
        let variance = (0..3)
            .map(|c| {
                let mean = sum[c] / pixel_count;
                (sum_sq[c] / pixel_count - mean * mean).max(0.0)
            })
            .sum::<f64>()
            / 3.0;

        Self {
            edge_density: edge_sum as f64 / pixel_count,
            color_variance: variance,
        }
    }

    pub fn classify(&self, config: &SceneFilterConfig) -> SceneClass {
        let structured = self.edge_density < config.max_edge_density
            && self.color_variance > config.min_variance
            && self.color_variance < config.max_variance;
        if structured {
            SceneClass::Structured
        } else {
            SceneClass::Obscured
        }
    }
}

/// Measures and classifies `image`.
pub fn assess(image: &RgbImage, config: &SceneFilterConfig) -> (SceneAssessment, SceneClass) {
    let assessment = SceneAssessment::measure(image, config);
    let class = assessment.classify(config);
    tracing::trace!(
        "Scene edge density {:.2}, color variance {:.1}: {}",
        assessment.edge_density,
        assessment.color_variance,
        class
    );
    (assessment, class)
}

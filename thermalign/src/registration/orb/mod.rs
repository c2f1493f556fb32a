//! Oriented FAST and rotated BRIEF features.
//!
//! Keypoints are FAST-9 corners found on every level of a downscaled image
//! pyramid, thinned with 3x3 non-maximum suppression and ranked by Harris
//! response. Each level gets a share of the feature budget proportional to
//! its area. Orientation comes from the intensity centroid of a circular
//! patch, and the 256-bit descriptor compares pixel pairs from a fixed seeded
//! pattern rotated by that orientation on a Gaussian-smoothed copy of the level.

mod fast;

use glam::DVec2;
use image::imageops::{self, FilterType};
use image::GrayImage;
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;

use crate::registration::config::OrbConfig;

/// Keypoints closer than this to any image edge are discarded, leaving room
/// for the orientation patch and the rotated sampling pattern.
pub const BORDER: u32 = 16;

const HALF_PATCH: i32 = 15;
const PATTERN_RADIUS: i32 = 13;
const DESCRIPTOR_BITS: usize = 256;
const HARRIS_RADIUS: i32 = 3;

/// 256-bit binary descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Descriptor(pub [u64; 4]);

impl Descriptor {
    #[inline]
    pub fn hamming(&self, other: &Descriptor) -> u32 {
        self.0
            .iter()
            .zip(other.0.iter())
            .map(|(a, b)| (a ^ b).count_ones())
            .sum()
    }

    #[inline]
    fn set_bit(&mut self, bit: usize) {
        self.0[bit / 64] |= 1u64 << (bit % 64);
    }
}

/// A detected keypoint in full-resolution pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Keypoint {
    pub position: DVec2,
    /// Pyramid level the keypoint was detected on.
    pub level: usize,
    /// Orientation in radians.
    pub angle: f32,
    pub response: f32,
}

/// Keypoints and their descriptors, index-aligned.
#[derive(Debug, Clone, Default)]
pub struct Features {
    pub keypoints: Vec<Keypoint>,
    pub descriptors: Vec<Descriptor>,
}

impl Features {
    pub fn len(&self) -> usize {
        self.keypoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keypoints.is_empty()
    }
}

/// ORB detector with a precomputed sampling pattern.
#[derive(Debug, Clone)]
pub struct Orb {
    config: OrbConfig,
    pattern: Vec<[(i32, i32); 2]>,
}

impl Orb {
    pub fn new(config: OrbConfig) -> Self {
        let pattern = sampling_pattern(config.pattern_seed);
        Self { config, pattern }
    }

    pub fn config(&self) -> &OrbConfig {
        &self.config
    }

    /// Detects keypoints on every pyramid level and describes them.
    pub fn detect_and_compute(&self, image: &GrayImage) -> Features {
        let pyramid = build_pyramid(image, self.config.scale_factor, self.config.n_levels);
        let quotas = level_quotas(
            self.config.n_features,
            pyramid.len(),
            self.config.scale_factor,
        );

        let per_level: Vec<Vec<(Keypoint, Descriptor)>> = pyramid
            .par_iter()
            .zip(quotas.par_iter())
            .enumerate()
            .map(|(level, ((level_image, scale), &quota))| {
                self.process_level(level_image, level, *scale, quota)
            })
            .collect();

        let mut features = Features::default();
        for (keypoint, descriptor) in per_level.into_iter().flatten() {
            features.keypoints.push(keypoint);
            features.descriptors.push(descriptor);
        }
        features
    }

    fn process_level(
        &self,
        image: &GrayImage,
        level: usize,
        scale: DVec2,
        quota: usize,
    ) -> Vec<(Keypoint, Descriptor)> {
        if quota == 0 {
            return Vec::new();
        }

        let mut candidates = detect_corners(image, self.config.fast_threshold, self.config.harris_k);
        // Strongest first, raster order among equals.
        candidates.sort_by(|a, b| {
            b.2.total_cmp(&a.2)
                .then_with(|| a.1.cmp(&b.1))
                .then_with(|| a.0.cmp(&b.0))
        });
        candidates.truncate(quota);

        let smoothed = imageproc::filter::gaussian_blur_f32(image, self.config.blur_sigma);

        candidates
            .into_iter()
            .map(|(x, y, response)| {
                let angle = intensity_centroid_angle(image, x, y);
                let descriptor = self.describe(&smoothed, x, y, angle);
                let keypoint = Keypoint {
                    position: DVec2::new(x as f64, y as f64) * scale,
                    level,
                    angle,
                    response,
                };
                (keypoint, descriptor)
            })
            .collect()
    }

    fn describe(&self, smoothed: &GrayImage, x: u32, y: u32, angle: f32) -> Descriptor {
        let (sin, cos) = angle.sin_cos();
        let rotate = |(px, py): (i32, i32)| -> u8 {
            let rx = (px as f32 * cos - py as f32 * sin).round() as i32;
            let ry = (px as f32 * sin + py as f32 * cos).round() as i32;
            smoothed.get_pixel((x as i32 + rx) as u32, (y as i32 + ry) as u32)[0]
        };

        let mut descriptor = Descriptor::default();
        for (bit, [a, b]) in self.pattern.iter().enumerate() {
            if rotate(*a) < rotate(*b) {
                descriptor.set_bit(bit);
            }
        }
        descriptor
    }
}

/// Seeded BRIEF test pairs inside a disc of radius [`PATTERN_RADIUS`].
fn sampling_pattern(seed: u64) -> Vec<[(i32, i32); 2]> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut point = move || loop {
        let x = rng.random_range(-PATTERN_RADIUS..=PATTERN_RADIUS);
        let y = rng.random_range(-PATTERN_RADIUS..=PATTERN_RADIUS);
        if x * x + y * y <= PATTERN_RADIUS * PATTERN_RADIUS {
            return (x, y);
        }
    };

    (0..DESCRIPTOR_BITS)
        .map(|_| loop {
            let a = point();
            let b = point();
            if a != b {
                return [a, b];
            }
        })
        .collect()
}

/// Pyramid levels paired with their per-axis scale back to level 0.
/// Stops early once a level is too small to hold any keypoint.
pub(crate) fn build_pyramid(
    image: &GrayImage,
    scale_factor: f32,
    n_levels: usize,
) -> Vec<(GrayImage, DVec2)> {
    let min_side = 2 * BORDER + 1;
    let mut levels = Vec::with_capacity(n_levels);

    for level in 0..n_levels {
        if level == 0 {
            if image.width() < min_side || image.height() < min_side {
                break;
            }
            levels.push((image.clone(), DVec2::ONE));
            continue;
        }

        let factor = (scale_factor as f64).powi(level as i32);
        let width = (image.width() as f64 / factor).round() as u32;
        let height = (image.height() as f64 / factor).round() as u32;
        if width < min_side || height < min_side {
            break;
        }

        let scale = DVec2::new(
            image.width() as f64 / width as f64,
            image.height() as f64 / height as f64,
        );
        levels.push((imageops::resize(image, width, height, FilterType::Triangle), scale));
    }

    levels
}

/// Splits the feature budget across levels in proportion to level area.
pub(crate) fn level_quotas(n_features: usize, n_levels: usize, scale_factor: f32) -> Vec<usize> {
    if n_levels == 0 {
        return Vec::new();
    }

    let factor = 1.0 / scale_factor as f64;
    let first = n_features as f64 * (1.0 - factor) / (1.0 - factor.powi(n_levels as i32));

    let mut quotas = Vec::with_capacity(n_levels);
    let mut assigned = 0usize;
    let mut desired = first;
    for _ in 0..n_levels - 1 {
        let quota = (desired.round() as usize).min(n_features - assigned);
        quotas.push(quota);
        assigned += quota;
        desired *= factor;
    }
    quotas.push(n_features - assigned);
    quotas
}

/// FAST-9 corners away from the border that survive 3x3 non-maximum
/// suppression on their Harris response, as `(x, y, response)`.
pub(crate) fn detect_corners(image: &GrayImage, threshold: u8, harris_k: f32) -> Vec<(u32, u32, f32)> {
    let (width, height) = image.dimensions();
    if width < 2 * BORDER + 1 || height < 2 * BORDER + 1 {
        return Vec::new();
    }

    let corners: Vec<(u32, u32, f32)> = fast::fast9(image, threshold)
        .into_iter()
        .filter(|&(x, y)| x >= BORDER && y >= BORDER && x < width - BORDER && y < height - BORDER)
        .map(|(x, y)| (x, y, harris_response(image, x, y, harris_k)))
        .collect();

    let w = width as usize;
    let mut response_map = vec![f32::NEG_INFINITY; w * height as usize];
    for &(x, y, response) in &corners {
        response_map[y as usize * w + x as usize] = response;
    }

    corners
        .into_iter()
        .filter(|&(x, y, response)| {
            let center = y as usize * w + x as usize;
            for dy in -1i32..=1 {
                for dx in -1i32..=1 {
                    if dx == 0 && dy == 0 {
                        continue;
                    }
                    let idx = (y as i32 + dy) as usize * w + (x as i32 + dx) as usize;
                    let neighbor = response_map[idx];
                    // Equal responses: the first in raster order survives.
                    if neighbor > response || (neighbor == response && idx < center) {
                        return false;
                    }
                }
            }
            true
        })
        .collect()
}

/// Harris corner measure over a 7x7 window of central-difference gradients.
fn harris_response(image: &GrayImage, x: u32, y: u32, k: f32) -> f32 {
    let at = |px: i32, py: i32| image.get_pixel(px as u32, py as u32)[0] as f32;
    let (cx, cy) = (x as i32, y as i32);

    let mut sxx = 0.0f32;
    let mut syy = 0.0f32;
    let mut sxy = 0.0f32;
    for dy in -HARRIS_RADIUS..=HARRIS_RADIUS {
        for dx in -HARRIS_RADIUS..=HARRIS_RADIUS {
            let px = cx + dx;
            let py = cy + dy;
            let ix = (at(px + 1, py) - at(px - 1, py)) * 0.5;
            let iy = (at(px, py + 1) - at(px, py - 1)) * 0.5;
            sxx += ix * ix;
            syy += iy * iy;
            sxy += ix * iy;
        }
    }

    let det = sxx * syy - sxy * sxy;
    let trace = sxx + syy;
    det - k * trace * trace
}

/// Orientation of the vector from the keypoint to the intensity centroid
/// of the surrounding disc.
fn intensity_centroid_angle(image: &GrayImage, x: u32, y: u32) -> f32 {
    let mut m01 = 0.0f64;
    let mut m10 = 0.0f64;
    for dy in -HALF_PATCH..=HALF_PATCH {
        for dx in -HALF_PATCH..=HALF_PATCH {
            if dx * dx + dy * dy > HALF_PATCH * HALF_PATCH {
                continue;
            }
            let intensity =
                image.get_pixel((x as i32 + dx) as u32, (y as i32 + dy) as u32)[0] as f64;
            m10 += dx as f64 * intensity;
            m01 += dy as f64 * intensity;
        }
    }
    m01.atan2(m10) as f32
}

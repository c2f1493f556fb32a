//! Resampling of the secondary image onto the primary image grid.

use glam::DVec2;
use image::{Rgb, RgbImage};
use rayon::prelude::*;

use crate::math::DMat3;

/// Rows processed per rayon task.
const ROWS_PER_CHUNK: usize = 16;

/// Sample positions this close to a pixel center snap onto it.
const SNAP_EPSILON: f64 = 1e-6;

/// Pixels mapped outside the source image.
pub const BORDER_VALUE: Rgb<u8> = Rgb([0, 0, 0]);

/// Warps `source` into a `width` x `height` image.
///
/// `transform` maps source pixel coordinates to output pixel coordinates;
/// every output pixel is inverse-mapped and bilinearly sampled. Returns
/// `None` when the transform is not invertible.
pub fn warp_image(source: &RgbImage, transform: &DMat3, width: u32, height: u32) -> Option<RgbImage> {
    let inverse = transform.inverse()?;
    let mut output = RgbImage::from_pixel(width, height, BORDER_VALUE);
    if width == 0 || height == 0 {
        return Some(output);
    }

    let row_len = width as usize * 3;
    output
        .par_chunks_mut(row_len * ROWS_PER_CHUNK)
        .enumerate()
        .for_each(|(chunk_idx, chunk)| {
            let y_start = chunk_idx * ROWS_PER_CHUNK;
            for (row_in_chunk, row) in chunk.chunks_exact_mut(row_len).enumerate() {
                let y = (y_start + row_in_chunk) as f64;
                for x in 0..width as usize {
                    let Some(src) = inverse.transform_point(DVec2::new(x as f64, y)) else {
                        continue;
                    };
                    let pixel = sample_bilinear(source, snap(src));
                    row[x * 3..x * 3 + 3].copy_from_slice(&pixel);
                }
            }
        });

    Some(output)
}

#[inline]
fn snap(p: DVec2) -> DVec2 {
    let rounded = p.round();
    DVec2::new(
        if (p.x - rounded.x).abs() < SNAP_EPSILON { rounded.x } else { p.x },
        if (p.y - rounded.y).abs() < SNAP_EPSILON { rounded.y } else { p.y },
    )
}

#[inline]
fn fetch(image: &RgbImage, x: i64, y: i64) -> [f64; 3] {
    if x < 0 || y < 0 || x >= image.width() as i64 || y >= image.height() as i64 {
        return BORDER_VALUE.0.map(f64::from);
    }
    image.get_pixel(x as u32, y as u32).0.map(f64::from)
}

/// Bilinear interpolation with a constant black border.
fn sample_bilinear(image: &RgbImage, p: DVec2) -> [u8; 3] {
    if !p.x.is_finite() || !p.y.is_finite() {
        return BORDER_VALUE.0;
    }
    let x0 = p.x.floor();
    let y0 = p.y.floor();
    let fx = p.x - x0;
    let fy = p.y - y0;
    let (xi, yi) = (x0 as i64, y0 as i64);

    if xi < -1 || yi < -1 || xi >= image.width() as i64 || yi >= image.height() as i64 {
        return BORDER_VALUE.0;
    }

    let p00 = fetch(image, xi, yi);
    let p10 = fetch(image, xi + 1, yi);
    let p01 = fetch(image, xi, yi + 1);
    let p11 = fetch(image, xi + 1, yi + 1);

    let mut out = [0u8; 3];
    for c in 0..3 {
        let top = p00[c] + fx * (p10[c] - p00[c]);
        let bottom = p01[c] + fx * (p11[c] - p01[c]);
        out[c] = (top + fy * (bottom - top)).round().clamp(0.0, 255.0) as u8;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient(width: u32, height: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x * 10) as u8, (y * 10) as u8, ((x + y) * 5) as u8])
        })
    }

    #[test]
    fn test_identity_reproduces_input() {
        let image = gradient(20, 15);
        let warped = warp_image(&image, &DMat3::identity(), 20, 15).unwrap();
        assert_eq!(warped, image);
    }

    #[test]
    fn test_integer_translation() {
        let image = gradient(20, 15);
        let warped = warp_image(&image, &DMat3::translation(3.0, 2.0), 20, 15).unwrap();
        assert_eq!(warped.get_pixel(5, 4), image.get_pixel(2, 2));
        assert_eq!(warped.get_pixel(19, 14), image.get_pixel(16, 12));
        // Shifted in from outside the source.
        assert_eq!(*warped.get_pixel(1, 1), BORDER_VALUE);
    }

    #[test]
    fn test_half_pixel_shift_interpolates() {
        let image = RgbImage::from_fn(4, 1, |x, _| Rgb([(x * 100) as u8, 0, 0]));
        let warped = warp_image(&image, &DMat3::translation(-0.5, 0.0), 4, 1).unwrap();
        assert_eq!(warped.get_pixel(0, 0).0[0], 50);
        assert_eq!(warped.get_pixel(1, 0).0[0], 150);
    }

    #[test]
    fn test_output_takes_requested_dimensions() {
        let image = gradient(10, 10);
        let warped = warp_image(&image, &DMat3::identity(), 25, 7).unwrap();
        assert_eq!(warped.dimensions(), (25, 7));
        assert_eq!(*warped.get_pixel(24, 6), BORDER_VALUE);
    }

    #[test]
    fn test_singular_transform() {
        let singular = DMat3::from_array([1.0, 2.0, 0.0, 2.0, 4.0, 0.0, 0.0, 0.0, 1.0]);
        assert!(warp_image(&gradient(4, 4), &singular, 4, 4).is_none());
    }
}

//! FAST-9 segment test on the 16-pixel Bresenham circle of radius 3.

use image::GrayImage;

/// Circle offsets in clockwise order starting straight up.
const CIRCLE: [(i32, i32); 16] = [
    (0, -3),
    (1, -3),
    (2, -2),
    (3, -1),
    (3, 0),
    (3, 1),
    (2, 2),
    (1, 3),
    (0, 3),
    (-1, 3),
    (-2, 2),
    (-3, 1),
    (-3, 0),
    (-3, -1),
    (-2, -2),
    (-1, -3),
];

/// Shortest arc of consistently brighter or darker pixels that makes a corner.
const ARC_LEN: usize = 9;

/// All pixels at least 3 away from the edge whose circle holds a contiguous
/// arc of `ARC_LEN` pixels all brighter than `center + threshold` or all
/// darker than `center - threshold`. The arc may wrap around the circle.
pub(crate) fn fast9(image: &GrayImage, threshold: u8) -> Vec<(u32, u32)> {
    let (width, height) = image.dimensions();
    if width < 7 || height < 7 {
        return Vec::new();
    }

    let mut corners = Vec::new();
    for y in 3..height - 3 {
        for x in 3..width - 3 {
            if is_corner(image, x, y, threshold) {
                corners.push((x, y));
            }
        }
    }
    corners
}

fn is_corner(image: &GrayImage, x: u32, y: u32, threshold: u8) -> bool {
    let center = image.get_pixel(x, y)[0] as i16;
    let t = threshold as i16;

    // -1 darker, 1 brighter, 0 similar.
    let mut signs = [0i8; 16];
    for (sign, &(dx, dy)) in signs.iter_mut().zip(CIRCLE.iter()) {
        let v = image.get_pixel((x as i32 + dx) as u32, (y as i32 + dy) as u32)[0] as i16;
        *sign = if v > center + t {
            1
        } else if v < center - t {
            -1
        } else {
            0
        };
    }

    [1i8, -1].into_iter().any(|wanted| {
        let mut run = 0;
        // Two laps so arcs crossing index 0 are counted whole.
        for i in 0..2 * CIRCLE.len() {
            if signs[i % CIRCLE.len()] == wanted {
                run += 1;
                if run >= ARC_LEN {
                    return true;
                }
            } else {
                run = 0;
            }
        }
        false
    })
}

use image::{Rgb, RgbImage};
use serde::{Deserialize, Serialize};

use super::ThermalGrid;

/// Output for grids with no usable range.
pub const FLAT_GRAY: Rgb<u8> = Rgb([128, 128, 128]);

/// Mapping from normalized intensity to color.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Colormap {
    /// Blue, cyan, yellow, red perceptual map.
    #[default]
    Jet,
    /// Black, blue, red, yellow, white piecewise ramp.
    ThermalRamp,
}

impl Colormap {
    pub fn color(&self, v: f32) -> Rgb<u8> {
        match self {
            Colormap::Jet => jet_color(v),
            Colormap::ThermalRamp => ramp_color(v),
        }
    }
}

impl std::fmt::Display for Colormap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Colormap::Jet => write!(f, "jet"),
            Colormap::ThermalRamp => write!(f, "thermal_ramp"),
        }
    }
}

impl std::str::FromStr for Colormap {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "jet" => Ok(Colormap::Jet),
            "thermal_ramp" | "thermal-ramp" | "ramp" => Ok(Colormap::ThermalRamp),
            other => Err(format!("unknown colormap '{other}'")),
        }
    }
}

#[inline]
fn channel(value: f32) -> u8 {
    value.clamp(0.0, 255.0) as u8
}

/// Four-segment ramp for `v` in `[0, 1]`.
pub fn ramp_color(v: f32) -> Rgb<u8> {
    const SPAN: f32 = 4.0 * 255.0;
    if v < 0.25 {
        Rgb([0, 0, channel(v * SPAN)])
    } else if v < 0.5 {
        let t = (v - 0.25) * SPAN;
        Rgb([channel(t), 0, channel(255.0 - t)])
    } else if v < 0.75 {
        Rgb([255, channel((v - 0.5) * SPAN), 0])
    } else {
        Rgb([255, 255, channel((v - 0.75) * SPAN)])
    }
}

/// Jet colormap for `v` in `[0, 1]`.
pub fn jet_color(v: f32) -> Rgb<u8> {
    let v = v.clamp(0.0, 1.0);
    let lobe = |center: f32| channel((1.5 - (4.0 * v - center).abs()) * 255.0);
    Rgb([lobe(3.0), lobe(2.0), lobe(1.0)])
}

/// Renders a grid as an RGB image, one pixel per sample.
///
/// Values are stretched between the grid's own finite minimum and maximum.
/// Non-finite samples map to the minimum. A grid without a usable range
/// renders as [`FLAT_GRAY`].
pub fn decode(grid: &ThermalGrid, colormap: Colormap) -> RgbImage {
    let width = grid.width() as u32;
    let height = grid.height() as u32;

    let (min, max) = grid.finite_range().unwrap_or((0.0, 0.0));
    let range = max - min;
    if !range.is_finite() || range <= 0.0 {
        tracing::debug!("Grid {}x{} has no dynamic range, rendering flat gray", width, height);
        return RgbImage::from_pixel(width, height, FLAT_GRAY);
    }

    RgbImage::from_fn(width, height, |x, y| {
        let raw = grid.get(x as usize, y as usize);
        let v = if raw.is_finite() {
            ((raw - min) / range).clamp(0.0, 1.0)
        } else {
            0.0
        };
        match colormap {
            // Jet is sampled from the 8-bit stretch, matching a 256-entry lookup table.
            Colormap::Jet => jet_color(f32::from(channel(v * 255.0)) / 255.0),
            Colormap::ThermalRamp => ramp_color(v),
        }
    })
}

//! Display rendering of cube projections.
//!
//! Every channel is normalized against its running maximum and compressed with a 0.42
//! power before clipping to the 8-bit range.

use crate::acquisition::cube::store::HyperspectralCube;
use crate::acquisition::cube::types::{Plane, Projections};

const DISPLAY_GAMMA: f64 = 0.42;
const FULL_SCALE: f64 = 255.0;
const SATURATION_BLUE_GAIN: f64 = 5.0;

/// Which projection is drawn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Preview {
    /// CIE-derived red/green/blue
    #[default]
    Rgb,
    /// Grey image with saturated cells highlighted
    Saturation,
    /// Near-IR / green / near-UV false colour
    ExtremeBands,
    /// Chlorophyll-ratio false colour
    Ndvi,
}

/// Per-channel display gains, identity until a reflectance reference is set
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WhiteBalance {
    pub red: f64,
    pub green: f64,
    pub blue: f64,
    pub infrared: f64,
    pub extreme_green: f64,
    pub ultraviolet: f64,
}

impl WhiteBalance {
    pub const IDENTITY: WhiteBalance = WhiteBalance {
        red: 1.0,
        green: 1.0,
        blue: 1.0,
        infrared: 1.0,
        extreme_green: 1.0,
        ultraviolet: 1.0,
    };
}

impl Default for WhiteBalance {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Interleaved 8-bit RGB image
#[derive(Debug, Clone, PartialEq)]
pub struct RgbImage8 {
    pub width: usize,
    pub height: usize,
    /// RGB pixel data interleaved [R, G, B, R, G, B, ...]
    pub data: Vec<u8>,
}

fn tone(value: f64, gain: f64, max: f64, brightness: f64) -> f64 {
    let normalized = ((value * gain).abs() / max).powf(DISPLAY_GAMMA);
    (value.signum() * normalized * FULL_SCALE * brightness).clamp(0.0, FULL_SCALE)
}

fn channel(plane: &Plane<f64>, gain: f64, max: f64, brightness: f64) -> Vec<f64> {
    plane
        .data
        .iter()
        .map(|&value| tone(value, gain, max, brightness))
        .collect()
}

/// Renders one preview of the cube; `brightness` scales the output (1.0 = full scale).
pub fn render(cube: &HyperspectralCube, preview: Preview, white_balance: &WhiteBalance, brightness: f64) -> RgbImage8 {
    let p: &Projections = cube.projections();
    let (width, height) = (p.red.width, p.red.height);

    let (r, g, b) = match preview {
        Preview::Rgb => color_channels(p, white_balance, brightness),
        Preview::Saturation => {
            let (_, grey, _) = color_channels(p, white_balance, brightness);
            let mut r = Vec::with_capacity(grey.len());
            let mut g = Vec::with_capacity(grey.len());
            let mut b = Vec::with_capacity(grey.len());
            for ((&grey, &saturated), &magnitude) in grey
                .iter()
                .zip(&p.saturated.data)
                .zip(&p.saturation_magnitude.data)
            {
                let cut = if saturated { FULL_SCALE } else { 0.0 };
                let dimmed = (grey - cut).clamp(0.0, FULL_SCALE);
                r.push(grey);
                g.push(dimmed);
                b.push((dimmed + magnitude * SATURATION_BLUE_GAIN).clamp(0.0, FULL_SCALE));
            }
            (r, g, b)
        }
        Preview::ExtremeBands => {
            let max = p.max_extreme_channel;
            (
                channel(&p.infrared, white_balance.infrared, max, brightness),
                channel(&p.extreme_green, white_balance.extreme_green, max, brightness),
                channel(&p.ultraviolet, white_balance.ultraviolet, max, brightness),
            )
        }
        Preview::Ndvi => {
            let b: Vec<f64> = p.chlorophyll_b.data.iter().map(|&v| v * FULL_SCALE).collect();
            let r: Vec<f64> = b
                .iter()
                .zip(&p.chlorophyll_a.data)
                .map(|(&b, &a)| ((FULL_SCALE - b) * 2.0 * a).clamp(0.0, FULL_SCALE))
                .collect();
            let g: Vec<f64> = b
                .iter()
                .zip(&p.chlorophyll_a.data)
                .map(|(&b, &a)| ((FULL_SCALE - b) * 2.0 * (1.0 - a)).clamp(0.0, FULL_SCALE))
                .collect();
            let b: Vec<f64> = b.into_iter().map(|v| v.clamp(0.0, FULL_SCALE)).collect();
            (r, g, b)
        }
    };

    let data = r
        .iter()
        .zip(&g)
        .zip(&b)
        .flat_map(|((&r, &g), &b)| [r as u8, g as u8, b as u8])
        .collect();

    RgbImage8 { width, height, data }
}

fn color_channels(p: &Projections, white_balance: &WhiteBalance, brightness: f64) -> (Vec<f64>, Vec<f64>, Vec<f64>) {
    let max = p.max_color_channel;
    (
        channel(&p.red, white_balance.red, max, brightness),
        channel(&p.green, white_balance.green, max, brightness),
        channel(&p.blue, white_balance.blue, max, brightness),
    )
}

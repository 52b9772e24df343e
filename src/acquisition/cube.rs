//! Hyperspectral cube module
//!
//! This module owns the 3-D spectral cube of a scan, its derived 2-D projections and the
//! display rendering of those projections.

mod render;
mod store;
pub mod types;


pub use render::{Preview, RgbImage8, WhiteBalance, render};
pub use store::{
    EXTREME_PROXY_CURVE, HyperspectralCube, LUMINANCE_SCALE, MAX_EPSILON, chlorophyll_ratio, xyz_to_display_rgb,
};
pub use types::{Plane, Projections};

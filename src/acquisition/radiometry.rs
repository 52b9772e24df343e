//! Radiometric conversion module
//!
//! Turns a light frame and its matching dark frame into per-bin radiance and the seven
//! colorimetric weighted sums that feed the derived images.

mod converter;
pub mod types;


pub use converter::{RadiometricConverter, linearize};
pub use types::{ColorimetricSums, Conversion};

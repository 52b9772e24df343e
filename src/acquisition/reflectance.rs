//! Reflectance calibration module
//!
//! Captures the spectrum of a known-reflectance reference target inside the cube and
//! converts other spectra to percent reflectance against it.

use tracing::info;

use crate::acquisition::common::error::ReflectanceError;
use crate::acquisition::cube::{HyperspectralCube, WhiteBalance};


/// Armed reference target
#[derive(Debug, Clone, PartialEq)]
pub struct ReflectanceReference {
    /// `(x, y) = (pan_index, tilt_index)` of the reference cell
    pub cell: (usize, usize),
    pub reference_spectrum: Vec<f64>,
    pub target_percent: f64,
    /// `target_percent / 100 / reference_spectrum`; non-finite where the reference is zero
    pub multiplier: Vec<f64>,
    pub white_balance: WhiteBalance,
}

#[derive(Debug, Clone, Default)]
pub struct ReflectanceCalibrator {
    reference: Option<ReflectanceReference>,
}

impl ReflectanceCalibrator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses the written cell at `(x, y)` as a reference of `target_percent` reflectance,
    /// replacing any previous reference.
    pub fn arm(
        &mut self,
        cube: Option<&HyperspectralCube>,
        x: usize,
        y: usize,
        target_percent: f64,
    ) -> Result<&ReflectanceReference, ReflectanceError> {
        let cube = cube.ok_or(ReflectanceError::NoData)?;
        if !(target_percent > 0.0 && target_percent.is_finite()) {
            return Err(ReflectanceError::InvalidTarget(target_percent));
        }
        if !cube.is_written(x, y) {
            return Err(ReflectanceError::NoData);
        }
        let spectrum = cube.read_spectrum(x, y).ok_or(ReflectanceError::NoData)?;
        let (color, extreme) = cube.channel_values(x, y).ok_or(ReflectanceError::NoData)?;

        let fraction = target_percent / 100.0;
        let multiplier = spectrum.iter().map(|&value| fraction / value).collect();
        let [red, green, blue] = balance(color);
        let [infrared, extreme_green, ultraviolet] = balance(extreme);

        info!(x, y, target_percent, "Reflectance reference set");
        Ok(self.reference.insert(ReflectanceReference {
            cell: (x, y),
            reference_spectrum: spectrum.to_vec(),
            target_percent,
            multiplier,
            white_balance: WhiteBalance {
                red,
                green,
                blue,
                infrared,
                extreme_green,
                ultraviolet,
            },
        }))
    }

    pub fn clear(&mut self) {
        if self.reference.take().is_some() {
            info!("Reflectance reference cleared");
        }
    }

    pub fn is_armed(&self) -> bool {
        self.reference.is_some()
    }

    pub fn reference(&self) -> Option<&ReflectanceReference> {
        self.reference.as_ref()
    }

    /// Display gains to use with the rendered projections.
    pub fn white_balance(&self) -> WhiteBalance {
        self.reference
            .as_ref()
            .map_or(WhiteBalance::IDENTITY, |reference| reference.white_balance)
    }

    /// Radiance -> percent reflectance; identity when no reference is armed.
    /// Bins with a zero reference stay non-finite. `spectrum` must come from the cube the
    /// reference was armed on, so both have one value per spectral bin.
    pub fn apply(&self, spectrum: &[f64]) -> Vec<f64> {
        match &self.reference {
            Some(reference) => {
                debug_assert_eq!(spectrum.len(), reference.multiplier.len(), "spectral bin count");
                spectrum
                    .iter()
                    .zip(&reference.multiplier)
                    .map(|(&value, &multiplier)| value * multiplier * 100.0)
                    .collect()
            }
            None => spectrum.to_vec(),
        }
    }

    /// Percent reflectance -> radiance, with the same length requirement as `apply`.
    pub fn apply_inverse(&self, reflectance: &[f64]) -> Vec<f64> {
        match &self.reference {
            Some(reference) => {
                debug_assert_eq!(reflectance.len(), reference.multiplier.len(), "spectral bin count");
                reflectance
                    .iter()
                    .zip(&reference.multiplier)
                    .map(|(&value, &multiplier)| value / (multiplier * 100.0))
                    .collect()
            }
            None => reflectance.to_vec(),
        }
    }
}

/// Gains that lift every channel to the brightest one.
fn balance(channels: [f64; 3]) -> [f64; 3] {
    let brightest = channels.iter().copied().fold(channels[0], f64::max);
    channels.map(|value| brightest / value)
}

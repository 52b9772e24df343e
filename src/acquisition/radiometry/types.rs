//! Radiometric conversion result types

use crate::acquisition::calibration::{CURVE_COUNT, SensitivityCurve};

/// Marks a value whose computation was indeterminate (zero or non-finite divisor).
pub const NO_DATA: f64 = f64::NAN;

/// Bin-width-weighted radiance summed under each sensitivity curve
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ColorimetricSums {
    pub values: [f64; CURVE_COUNT],
}

impl ColorimetricSums {
    pub fn get(&self, curve: SensitivityCurve) -> f64 {
        self.values[curve.index()]
    }

    pub fn set(&mut self, curve: SensitivityCurve, value: f64) {
        self.values[curve.index()] = value;
    }
}

/// Converted light frame
#[derive(Debug, Clone, PartialEq)]
pub struct Conversion {
    /// Average linear radiance per spectral bin
    pub spectrum: Vec<f64>,
    pub sums: ColorimetricSums,
}

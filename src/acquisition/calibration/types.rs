//! Calibration data types

use crate::acquisition::common::error::CalibrationError;

/// Number of spectral sensitivity curves weighted into every light frame.
pub const CURVE_COUNT: usize = 7;

const WAVELENGTH_COEFFICIENTS: usize = 6;
const LINEARIZATION_COEFFICIENTS: usize = 2;

/// Spectral sensitivity curves used for the colorimetric sums
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SensitivityCurve {
    /// CIE 1931 x̄ colour matching function
    CieX,
    /// CIE 1931 ȳ colour matching function (photopic luminosity)
    CieY,
    /// CIE 1931 z̄ colour matching function
    CieZ,
    /// Chlorophyll a absorption band
    ChlA,
    /// Chlorophyll b absorption band
    ChlB,
    /// Near-infrared band
    NearIr,
    /// Near-ultraviolet band
    NearUv,
}

impl SensitivityCurve {
    pub const ALL: [SensitivityCurve; CURVE_COUNT] = [
        SensitivityCurve::CieX,
        SensitivityCurve::CieY,
        SensitivityCurve::CieZ,
        SensitivityCurve::ChlA,
        SensitivityCurve::ChlB,
        SensitivityCurve::NearIr,
        SensitivityCurve::NearUv,
    ];

    pub const fn index(self) -> usize {
        match self {
            SensitivityCurve::CieX => 0,
            SensitivityCurve::CieY => 1,
            SensitivityCurve::CieZ => 2,
            SensitivityCurve::ChlA => 3,
            SensitivityCurve::ChlB => 4,
            SensitivityCurve::NearIr => 5,
            SensitivityCurve::NearUv => 6,
        }
    }

    /// Row name used in the sensitivity table
    pub const fn table_name(self) -> &'static str {
        match self {
            SensitivityCurve::CieX => "cieX",
            SensitivityCurve::CieY => "cieY",
            SensitivityCurve::CieZ => "cieZ",
            SensitivityCurve::ChlA => "chlA",
            SensitivityCurve::ChlB => "chlB",
            SensitivityCurve::NearIr => "nIR",
            SensitivityCurve::NearUv => "nUV",
        }
    }

    pub fn from_table_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|curve| curve.table_name() == name)
    }
}

/// Sensitivity curves at their native sampling
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CurveTable {
    /// Baseline wavelength grid in whole nanometres
    pub grid: Vec<i64>,
    /// Curve values indexed by `SensitivityCurve::index`, sampled on `grid`
    pub values: [Vec<f64>; CURVE_COUNT],
}

/// Raw coefficient rows for one instrument unit
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UnitCoefficients {
    pub wavelength: Vec<f64>,
    pub sensitivity: Vec<f64>,
    pub linearization: Vec<f64>,
}

/// Validated calibration for one instrument unit, immutable after load.
#[derive(Debug, Clone)]
pub struct CalibrationSet {
    pub unit_id: u32,
    pub pixels: usize,
    /// 5th-degree polynomial, pixel index -> wavelength in nm
    pub wavelength_coefficients: [f64; WAVELENGTH_COEFFICIENTS],
    /// Per-pixel radiometric sensitivity; pixels at or below zero are dead
    pub radiometric_sensitivity: Vec<f64>,
    /// Power-law linearization `exp(c0 * ln|x| + c1)`
    pub linearization: [f64; LINEARIZATION_COEFFICIENTS],
    pub curves: CurveTable,
    /// Curves resampled onto the sensor wavelength of every pixel
    pub pixel_sensitivity: [Vec<f64>; CURVE_COUNT],
    pub wavelength: Vec<f64>,
    /// Forward difference of `wavelength`; the last pixel reuses the previous width
    pub wavelength_bin_width: Vec<f64>,
}

impl CalibrationSet {
    pub fn new(
        unit_id: u32,
        pixels: usize,
        coefficients: UnitCoefficients,
        curves: CurveTable,
    ) -> Result<Self, CalibrationError> {
        let wavelength_coefficients: [f64; WAVELENGTH_COEFFICIENTS] =
            fixed_length(unit_id, "wavelength coefficients", coefficients.wavelength)?;
        let linearization: [f64; LINEARIZATION_COEFFICIENTS] =
            fixed_length(unit_id, "linearization coefficients", coefficients.linearization)?;

        if coefficients.sensitivity.len() != pixels {
            return Err(CalibrationError::LengthMismatch {
                unit: unit_id,
                field: "radiometric sensitivity",
                expected: pixels,
                found: coefficients.sensitivity.len(),
            });
        }

        let wavelength: Vec<f64> = (0..pixels)
            .map(|i| evaluate_polynomial(&wavelength_coefficients, i as f64))
            .collect();
        let wavelength_bin_width = bin_widths(&wavelength);
        let pixel_sensitivity = resample(&curves, &wavelength);

        Ok(Self {
            unit_id,
            pixels,
            wavelength_coefficients,
            radiometric_sensitivity: coefficients.sensitivity,
            linearization,
            curves,
            pixel_sensitivity,
            wavelength,
            wavelength_bin_width,
        })
    }

    /// Wavelength of a (possibly fractional) pixel position
    pub fn wavelength_at(&self, pixel: f64) -> f64 {
        evaluate_polynomial(&self.wavelength_coefficients, pixel)
    }

    /// Spectrum x-axis for a boxcar width: the wavelength of every bin's first pixel.
    pub fn boxcar_wavelengths(&self, boxcar_width: usize) -> Vec<f64> {
        (0..self.pixels)
            .step_by(boxcar_width.max(1))
            .map(|i| self.wavelength_at(i as f64))
            .collect()
    }

    pub fn curve(&self, curve: SensitivityCurve) -> &[f64] {
        &self.pixel_sensitivity[curve.index()]
    }

    pub fn is_live_pixel(&self, pixel: usize) -> bool {
        self.radiometric_sensitivity
            .get(pixel)
            .is_some_and(|&sensitivity| sensitivity > 0.0)
    }
}

fn fixed_length<const N: usize>(
    unit_id: u32,
    field: &'static str,
    values: Vec<f64>,
) -> Result<[f64; N], CalibrationError> {
    let found = values.len();
    values
        .try_into()
        .map_err(|_| CalibrationError::LengthMismatch {
            unit: unit_id,
            field,
            expected: N,
            found,
        })
}

fn evaluate_polynomial(coefficients: &[f64], x: f64) -> f64 {
    coefficients
        .iter()
        .rev()
        .fold(0.0, |acc, &coefficient| acc * x + coefficient)
}

fn bin_widths(wavelength: &[f64]) -> Vec<f64> {
    if wavelength.len() < 2 {
        return vec![0.0; wavelength.len()];
    }
    let mut widths: Vec<f64> = wavelength.windows(2).map(|w| w[1] - w[0]).collect();
    widths.push(widths[widths.len() - 1]);
    widths
}

// Exact whole-nanometre match against the baseline grid; unmatched pixels stay at zero.
fn resample(curves: &CurveTable, wavelength: &[f64]) -> [Vec<f64>; CURVE_COUNT] {
    let mut resampled: [Vec<f64>; CURVE_COUNT] =
        std::array::from_fn(|_| vec![0.0; wavelength.len()]);

    for (pixel, &w) in wavelength.iter().enumerate() {
        let rounded = w.round_ties_even() as i64;
        let Some(j) = curves.grid.iter().rposition(|&grid_nm| grid_nm == rounded) else {
            continue;
        };
        for (curve, values) in resampled.iter_mut().enumerate() {
            values[pixel] = curves.values[curve].get(j).copied().unwrap_or(0.0);
        }
    }

    resampled
}

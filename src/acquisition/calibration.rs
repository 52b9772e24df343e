//! Calibration repository module
//!
//! This module loads the per-unit coefficient tables and the shared spectral sensitivity
//! curves, and derives the per-pixel tables the radiometric converter works from.

mod source;
mod table_source;
pub mod types;


pub use source::CalibrationSource;
pub use table_source::{TableCalibrationSource, parse_sensitivity_curves, parse_unit_coefficients};
pub use types::{CURVE_COUNT, CalibrationSet, CurveTable, SensitivityCurve, UnitCoefficients};

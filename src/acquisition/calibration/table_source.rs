//! Calibration source backed by the two row-oriented text tables shipped with each instrument.
//!
//! The coefficient table holds one row per unit and record type:
//!
//! ```text
//! 3,wavCoef,301.2,2.61,-3.1e-4,1.2e-7,0,0,
//! 3,radSens,0.0012,0.0013,...,
//! 3,linCoefs,1.013,-0.021,
//! ```
//!
//! The sensitivity table holds the baseline wavelength grid and the named curves:
//!
//! ```text
//! base,cieWav,300,301,302,...
//! base,cieX,0.0001,0.0001,...
//! ```

use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument};

use crate::acquisition::calibration::source::CalibrationSource;
use crate::acquisition::calibration::types::{
    CURVE_COUNT, CalibrationSet, CurveTable, SensitivityCurve, UnitCoefficients,
};
use crate::acquisition::common::error::CalibrationError;

const WAVELENGTH_TAG: &str = "wavCoef";
const SENSITIVITY_TAG: &str = "radSens";
const LINEARIZATION_TAG: &str = "linCoefs";
const BASE_TAG: &str = "base";
const GRID_TAG: &str = "cieWav";

pub struct TableCalibrationSource {
    calibration_table: PathBuf,
    sensitivity_table: PathBuf,
}

impl TableCalibrationSource {
    pub fn new(calibration_table: impl Into<PathBuf>, sensitivity_table: impl Into<PathBuf>) -> Self {
        Self {
            calibration_table: calibration_table.into(),
            sensitivity_table: sensitivity_table.into(),
        }
    }
}

impl CalibrationSource for TableCalibrationSource {
    #[instrument(skip(self), fields(table = %self.calibration_table.display()))]
    fn load(&self, unit_id: u32, pixels: usize) -> Result<CalibrationSet, CalibrationError> {
        let coefficients = parse_unit_coefficients(&read_table(&self.calibration_table)?, unit_id)?;
        let curves = parse_sensitivity_curves(&read_table(&self.sensitivity_table)?)?;

        let calibration = CalibrationSet::new(unit_id, pixels, coefficients, curves)?;
        info!(
            unit = unit_id,
            pixels,
            first_nm = calibration.wavelength.first().copied().unwrap_or_default(),
            last_nm = calibration.wavelength.last().copied().unwrap_or_default(),
            "Calibration loaded"
        );
        Ok(calibration)
    }
}

fn read_table(path: &Path) -> Result<String, CalibrationError> {
    std::fs::read_to_string(path).map_err(|e| CalibrationError::MissingTable {
        path: path.display().to_string(),
        reason: e.to_string(),
    })
}

/// Non-empty trimmed fields after the two key columns.
fn value_fields<'a>(fields: &'a [&'a str]) -> impl Iterator<Item = &'a str> {
    fields
        .iter()
        .skip(2)
        .map(|field| field.trim())
        .filter(|field| !field.is_empty())
}

fn parse_floats(fields: &[&str]) -> Result<Vec<f64>, CalibrationError> {
    value_fields(fields)
        .map(|field| {
            field
                .parse::<f64>()
                .map_err(|e| CalibrationError::Parse(format!("'{field}': {e}")))
        })
        .collect()
}

/// Extracts the wavelength, sensitivity and linearization rows for `unit_id`.
///
/// Rows whose first column is not an integer are headers or comments and are skipped.
/// Missing rows come back empty; length validation happens in `CalibrationSet::new`.
pub fn parse_unit_coefficients(text: &str, unit_id: u32) -> Result<UnitCoefficients, CalibrationError> {
    let mut coefficients = UnitCoefficients::default();

    for line in text.lines() {
        let fields: Vec<&str> = line.split(',').collect();
        let Ok(unit) = fields[0].trim().parse::<u32>() else {
            continue;
        };
        if unit != unit_id || fields.len() < 2 {
            continue;
        }

        match fields[1].trim() {
            WAVELENGTH_TAG => coefficients.wavelength = parse_floats(&fields)?,
            SENSITIVITY_TAG => coefficients.sensitivity = parse_floats(&fields)?,
            LINEARIZATION_TAG => coefficients.linearization = parse_floats(&fields)?,
            other => debug!("Ignoring calibration row '{}' for unit {}", other, unit),
        }
    }

    Ok(coefficients)
}

/// Reads the baseline grid and the seven named `base` curves.
///
/// Rows not tagged `base` carry receptor curves that this core does not use.
pub fn parse_sensitivity_curves(text: &str) -> Result<CurveTable, CalibrationError> {
    let mut grid: Option<Vec<i64>> = None;
    let mut values: [Option<Vec<f64>>; CURVE_COUNT] = Default::default();

    for line in text.lines() {
        let fields: Vec<&str> = line.split(',').collect();
        if fields.len() < 2 || fields[0].trim() != BASE_TAG {
            continue;
        }

        let name = fields[1].trim();
        if name == GRID_TAG {
            let parsed = value_fields(&fields)
                .map(|field| {
                    field
                        .parse::<i64>()
                        .map_err(|e| CalibrationError::Parse(format!("'{field}': {e}")))
                })
                .collect::<Result<Vec<_>, _>>()?;
            grid = Some(parsed);
        } else if let Some(curve) = SensitivityCurve::from_table_name(name) {
            values[curve.index()] = Some(parse_floats(&fields)?);
        } else {
            debug!("Ignoring sensitivity row '{}'", name);
        }
    }

    let grid = grid.ok_or(CalibrationError::MissingCurve(GRID_TAG))?;
    let mut curves: [Vec<f64>; CURVE_COUNT] = Default::default();
    for curve in SensitivityCurve::ALL {
        curves[curve.index()] = values[curve.index()]
            .take()
            .ok_or(CalibrationError::MissingCurve(curve.table_name()))?;
    }

    Ok(CurveTable { grid, values: curves })
}

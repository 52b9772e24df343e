//! Fixtures shared by the unit tests of the acquisition modules.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::path::PathBuf;
use std::rc::Rc;

use crate::acquisition::calibration::{CalibrationSet, CalibrationSource, CurveTable, SensitivityCurve, UnitCoefficients};
use crate::acquisition::common::{CalibrationError, Result, ScanError};
use crate::acquisition::cube::HyperspectralCube;
use crate::acquisition::export::{CaptureSink, SavedCapture};
use crate::acquisition::protocol::LineSource;

/// Every curve equal to 1.0 on a 1 nm grid `start..=end`.
pub fn flat_curves(start: i64, end: i64) -> CurveTable {
    let grid: Vec<i64> = (start..=end).collect();
    let mut curves = CurveTable {
        grid,
        ..Default::default()
    };
    for curve in SensitivityCurve::ALL {
        curves.values[curve.index()] = vec![1.0; curves.grid.len()];
    }
    curves
}

/// Linear wavelength map, unit sensitivity and identity linearization.
pub fn linear_calibration(pixels: usize, start_nm: f64, step_nm: f64) -> CalibrationSet {
    let coefficients = UnitCoefficients {
        wavelength: vec![start_nm, step_nm, 0.0, 0.0, 0.0, 0.0],
        sensitivity: vec![1.0; pixels],
        linearization: vec![1.0, 0.0],
    };
    CalibrationSet::new(1, pixels, coefficients, flat_curves(300, 1200)).unwrap()
}

pub fn sensitivity_table_text(start: i64, end: i64) -> String {
    let grid: Vec<String> = (start..=end).map(|nm| nm.to_string()).collect();
    let ones = vec!["1.0"; grid.len()].join(",");
    let mut text = format!("base,cieWav,{},\n", grid.join(","));
    for curve in SensitivityCurve::ALL {
        text.push_str(&format!("base,{},{ones},\n", curve.table_name()));
    }
    text.push_str(&format!("receptor,cone,{ones},\n"));
    text
}

/// Calibration source handing out a fixed set, relabelled with the requested unit.
pub struct StaticCalibrationSource {
    calibration: CalibrationSet,
    pub loads: Rc<Cell<usize>>,
}

impl StaticCalibrationSource {
    pub fn new(calibration: CalibrationSet) -> Self {
        Self {
            calibration,
            loads: Rc::new(Cell::new(0)),
        }
    }
}

impl CalibrationSource for StaticCalibrationSource {
    fn load(&self, unit_id: u32, _pixels: usize) -> std::result::Result<CalibrationSet, CalibrationError> {
        self.loads.set(self.loads.get() + 1);
        let mut calibration = self.calibration.clone();
        calibration.unit_id = unit_id;
        Ok(calibration)
    }
}

/// Calibration source for a unit with no table entries.
pub struct MissingCalibrationSource;

impl CalibrationSource for MissingCalibrationSource {
    fn load(&self, unit_id: u32, _pixels: usize) -> std::result::Result<CalibrationSet, CalibrationError> {
        Err(CalibrationError::LengthMismatch {
            unit: unit_id,
            field: "wavelength coefficients",
            expected: 6,
            found: 0,
        })
    }
}

/// In-memory line source recording every command sent to it.
pub struct VecLineSource {
    lines: VecDeque<String>,
    fail_when_empty: bool,
    pub sent: Rc<RefCell<Vec<String>>>,
    /// Number of `next_line` calls so far
    pub reads: Rc<Cell<usize>>,
}

impl VecLineSource {
    pub fn new<I, L>(lines: I) -> Self
    where
        I: IntoIterator<Item = L>,
        L: Into<String>,
    {
        Self {
            lines: lines.into_iter().map(Into::into).collect(),
            fail_when_empty: false,
            sent: Rc::new(RefCell::new(Vec::new())),
            reads: Rc::new(Cell::new(0)),
        }
    }

    /// Reading past the last line returns a transport error instead of end-of-stream.
    pub fn failing_when_empty(mut self) -> Self {
        self.fail_when_empty = true;
        self
    }
}

impl LineSource for VecLineSource {
    fn next_line(&mut self) -> Result<Option<String>> {
        self.reads.set(self.reads.get() + 1);
        match self.lines.pop_front() {
            Some(line) => Ok(Some(line)),
            None if self.fail_when_empty => Err(ScanError::Transport("device disconnected".to_string())),
            None => Ok(None),
        }
    }

    fn send_command(&mut self, command: &str) -> Result<()> {
        self.sent.borrow_mut().push(command.to_string());
        Ok(())
    }
}

/// What a `RecordingSink` was handed for one capture
#[derive(Debug, Clone)]
pub struct RecordedCapture {
    pub raw_lines: Vec<String>,
    pub shape: (usize, usize, usize),
    pub cells_written: usize,
}

#[derive(Default)]
pub struct RecordingSink {
    pub captures: Rc<RefCell<Vec<RecordedCapture>>>,
}

impl CaptureSink for RecordingSink {
    fn persist(&mut self, raw_lines: &[String], cube: &HyperspectralCube) -> Result<SavedCapture> {
        self.captures.borrow_mut().push(RecordedCapture {
            raw_lines: raw_lines.to_vec(),
            shape: cube.shape(),
            cells_written: cube.cells_written(),
        });
        Ok(SavedCapture {
            stem: PathBuf::from("recorded"),
            csv_path: PathBuf::from("recorded.csv"),
            image_path: PathBuf::from("recorded_sRGB.tiff"),
        })
    }
}

/// `h,<unit>,<pan range>,<tilt range>,100,<boxcar>,500`
pub fn header_line(unit: u32, pan: (i64, i64, i64), tilt: (i64, i64, i64), boxcar: usize) -> String {
    format!(
        "h,{unit},{},{},{},{},{},{},100,{boxcar},500",
        pan.0, pan.1, pan.2, tilt.0, tilt.1, tilt.2
    )
}

pub fn data_line(pan: i64, tilt: i64, tag: i64, integration_time: i64, saturation: i64, counts: &[f64]) -> String {
    let counts: Vec<String> = counts.iter().map(|count| count.to_string()).collect();
    format!("{pan},{tilt},{tag},{integration_time},{saturation},{}", counts.join(","))
}

use crate::acquisition::calibration::types::CalibrationSet;
use crate::acquisition::common::error::CalibrationError;

pub trait CalibrationSource {
    fn load(&self, unit_id: u32, pixels: usize) -> Result<CalibrationSet, CalibrationError>;
}

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CalibrationError {
    #[error("Failed to read calibration table {path}: {reason}")]
    MissingTable { path: String, reason: String },

    #[error("Calibration data not found for unit #{unit}: {field} has {found} entries, expected {expected}")]
    LengthMismatch {
        unit: u32,
        field: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("Sensitivity table has no '{0}' row")]
    MissingCurve(&'static str),

    #[error("Invalid numeric value in calibration table: {0}")]
    Parse(String),
}

/// Per-line conditions absorbed by the session; a scan never aborts on these.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FrameError {
    #[error("Malformed frame: expected {expected} fields, found {found}")]
    Malformed { expected: usize, found: usize },

    #[error("Data frame received before a scan header")]
    BeforeHeader,

    #[error("Invalid frame field: {0}")]
    InvalidField(String),

    #[error("No dark frame recorded for integration time {integration_time}")]
    NoMatchingDark { integration_time: i64 },

    #[error("Position pan={pan} tilt={tilt} is outside the scan geometry")]
    OutOfRange { pan: i64, tilt: i64 },

    #[error("Cell at pan={pan} tilt={tilt} has already been written")]
    AlreadyWritten { pan: i64, tilt: i64 },
}

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Calibration error: {0}")]
    Calibration(#[from] CalibrationError),

    #[error("Invalid scan geometry: {0}")]
    InvalidGeometry(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Invalid session state: {0}")]
    InvalidState(String),

    #[error("Failed to write export file: {0}")]
    Export(String),

    #[error("Failed to encode TIFF image: {0}")]
    Encode(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ReflectanceError {
    #[error("No spectrum available at the selected cell")]
    NoData,

    #[error("Reference reflectance must be positive, got {0}")]
    InvalidTarget(f64),
}

pub type Result<T> = std::result::Result<T, ScanError>;

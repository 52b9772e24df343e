//! Hyperspectral acquisition module
//!
//! This module provides the scan pipeline of the pan/tilt line spectrometer, with separate
//! modules for calibration loading, protocol decoding, radiometric conversion, cube storage,
//! reflectance calibration and capture export.

pub mod calibration;
pub mod common;
pub mod cube;
pub mod export;
pub mod protocol;
pub mod radiometry;
pub mod reflectance;

#[cfg(test)]
pub(crate) mod test_support;

pub use common::{
    AcquisitionConfig,
    AcquisitionConfigBuilder,
    CalibrationError,
    FrameError,
    ReflectanceError,
    Result,
    ScanError,
    TiffCompression,
};

pub use calibration::{
    CalibrationSet,
    CalibrationSource,
    TableCalibrationSource,
};

pub use protocol::{
    AcquisitionSession,
    CaptureReplay,
    LineSource,
    ScanOutcome,
    ScanRequest,
    SessionState,
    Step,
    StopHandle,
    StreamTransport,
};

pub use cube::{
    HyperspectralCube,
    Preview,
    RgbImage8,
    WhiteBalance,
};

pub use reflectance::{
    ReflectanceCalibrator,
    ReflectanceReference,
};

pub use export::{
    CaptureSink,
    CaptureWriter,
    SavedCapture,
    SpectrumKind,
};

//! Common utilities module
//!
//! This module contains the error types and configuration shared across the acquisition core.

pub mod config;
pub mod error;

pub use config::{AcquisitionConfig, AcquisitionConfigBuilder, TiffCompression};
pub use error::{CalibrationError, FrameError, ReflectanceError, Result, ScanError};

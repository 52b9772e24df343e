//! Acquisition protocol module
//!
//! This module decodes the device's line-oriented data stream and drives the scan state
//! machine over any line source, live transport or saved capture alike.

mod command;
mod dark;
pub mod frame;
mod geometry;
mod replay;
mod session;
mod source;
mod transport;

#[cfg(test)]
mod tests;

pub use command::{
    MAX_DEGREES, STOP_COMMAND, ScanRequest, ScanRequestBuilder, clamp_degrees, degrees_to_steps,
};
pub use dark::{DarkFrame, DarkFrameSet};
pub use frame::{DataFrame, Frame, HeaderFrame};
pub use geometry::{MAX_AXIS_CELLS, ScanGeometry, spectral_bin_count};
pub use replay::CaptureReplay;
pub use session::{AcquisitionSession, FrameProgress, ScanOutcome, ScanSummary, SessionState, Step, StopHandle};
pub use source::LineSource;
pub use transport::StreamTransport;

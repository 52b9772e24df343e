//! Outgoing scan-start command and the degree/step conversion of the gimbal.

use crate::acquisition::common::error::{Result, ScanError};

/// Mechanical travel of each axis in either direction.
pub const MAX_DEGREES: f64 = 90.0;

/// Native step count at `MAX_DEGREES`.
const STEPS_AT_MAX: f64 = 512.0;

/// Sent to the transport when a running scan is cancelled.
pub const STOP_COMMAND: &str = "stop";

pub fn clamp_degrees(degrees: f64) -> f64 {
    degrees.clamp(-MAX_DEGREES, MAX_DEGREES)
}

/// Linear ±90° -> ±512 steps, truncated toward zero.
pub fn degrees_to_steps(degrees: f64) -> i64 {
    (degrees * STEPS_AT_MAX / MAX_DEGREES) as i64
}

/// Scan parameters in the operator's physical units
#[derive(Debug, Clone, PartialEq)]
pub struct ScanRequest {
    pub pan_left_deg: f64,
    pub pan_right_deg: f64,
    pub pan_resolution_deg: f64,
    pub tilt_bottom_deg: f64,
    pub tilt_top_deg: f64,
    pub tilt_resolution_deg: f64,
    /// Maximum integration time in milliseconds
    pub max_integration_ms: u32,
    pub boxcar_width: usize,
    /// Interval between dark re-measurements in seconds
    pub dark_repeat_s: u32,
}

impl Default for ScanRequest {
    fn default() -> Self {
        Self {
            pan_left_deg: -60.0,
            pan_right_deg: 60.0,
            pan_resolution_deg: 30.0,
            tilt_bottom_deg: -60.0,
            tilt_top_deg: 60.0,
            tilt_resolution_deg: 30.0,
            max_integration_ms: 2000,
            boxcar_width: 2,
            dark_repeat_s: 120,
        }
    }
}

/// Step-unit form of a validated request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct StepRanges {
    pan_left: i64,
    pan_right: i64,
    pan_resolution: i64,
    tilt_bottom: i64,
    tilt_top: i64,
    tilt_resolution: i64,
}

impl ScanRequest {
    pub fn builder() -> ScanRequestBuilder {
        ScanRequestBuilder::default()
    }

    fn step_ranges(&self) -> Result<StepRanges> {
        let ranges = StepRanges {
            pan_left: degrees_to_steps(clamp_degrees(self.pan_left_deg)),
            pan_right: degrees_to_steps(clamp_degrees(self.pan_right_deg)),
            pan_resolution: degrees_to_steps(self.pan_resolution_deg),
            tilt_bottom: degrees_to_steps(clamp_degrees(self.tilt_bottom_deg)),
            tilt_top: degrees_to_steps(clamp_degrees(self.tilt_top_deg)),
            tilt_resolution: degrees_to_steps(self.tilt_resolution_deg),
        };

        if ranges.pan_right <= ranges.pan_left || ranges.tilt_top <= ranges.tilt_bottom {
            return Err(ScanError::InvalidGeometry(format!(
                "pan {}..{} / tilt {}..{} steps must be increasing",
                ranges.pan_left, ranges.pan_right, ranges.tilt_bottom, ranges.tilt_top
            )));
        }
        if ranges.pan_resolution <= 0 || ranges.tilt_resolution <= 0 {
            return Err(ScanError::InvalidGeometry(format!(
                "resolution {} / {} steps must be positive",
                ranges.pan_resolution, ranges.tilt_resolution
            )));
        }
        Ok(ranges)
    }

    /// `(pan_count, tilt_count)` the device will sweep.
    pub fn grid_dimensions(&self) -> Result<(usize, usize)> {
        let ranges = self.step_ranges()?;
        let pan = (ranges.pan_right - ranges.pan_left) / ranges.pan_resolution + 1;
        let tilt = (ranges.tilt_top - ranges.tilt_bottom) / ranges.tilt_resolution + 1;
        Ok((pan as usize, tilt as usize))
    }

    /// Renders the `h...` command, rejecting inverted ranges and out-of-range boxcar widths.
    pub fn command(&self, pixels: usize) -> Result<String> {
        let ranges = self.step_ranges()?;
        if self.boxcar_width == 0 || self.boxcar_width > pixels {
            return Err(ScanError::InvalidGeometry(format!(
                "boxcar width {} outside 1..={}",
                self.boxcar_width, pixels
            )));
        }

        let max_integration_us = u64::from(self.max_integration_ms) * 1000;
        let dark_repeat_ms = u64::from(self.dark_repeat_s) * 1000;
        Ok(format!(
            "h{},{},{},{},{},{},{},{},{},",
            ranges.pan_left,
            ranges.pan_right,
            ranges.pan_resolution,
            ranges.tilt_bottom,
            ranges.tilt_top,
            ranges.tilt_resolution,
            max_integration_us,
            self.boxcar_width,
            dark_repeat_ms
        ))
    }
}

/// Builder for ScanRequest
#[derive(Default)]
pub struct ScanRequestBuilder {
    pan: Option<(f64, f64)>,
    pan_resolution_deg: Option<f64>,
    tilt: Option<(f64, f64)>,
    tilt_resolution_deg: Option<f64>,
    max_integration_ms: Option<u32>,
    boxcar_width: Option<usize>,
    dark_repeat_s: Option<u32>,
}

impl ScanRequestBuilder {
    pub fn pan(mut self, left_deg: f64, right_deg: f64) -> Self {
        self.pan = Some((left_deg, right_deg));
        self
    }

    pub fn pan_resolution(mut self, degrees: f64) -> Self {
        self.pan_resolution_deg = Some(degrees);
        self
    }

    pub fn tilt(mut self, bottom_deg: f64, top_deg: f64) -> Self {
        self.tilt = Some((bottom_deg, top_deg));
        self
    }

    pub fn tilt_resolution(mut self, degrees: f64) -> Self {
        self.tilt_resolution_deg = Some(degrees);
        self
    }

    pub fn max_integration_ms(mut self, ms: u32) -> Self {
        self.max_integration_ms = Some(ms);
        self
    }

    pub fn boxcar_width(mut self, width: usize) -> Self {
        self.boxcar_width = Some(width);
        self
    }

    pub fn dark_repeat_s(mut self, seconds: u32) -> Self {
        self.dark_repeat_s = Some(seconds);
        self
    }

    pub fn build(self) -> ScanRequest {
        let default = ScanRequest::default();
        let (pan_left_deg, pan_right_deg) = self.pan.unwrap_or((default.pan_left_deg, default.pan_right_deg));
        let (tilt_bottom_deg, tilt_top_deg) = self.tilt.unwrap_or((default.tilt_bottom_deg, default.tilt_top_deg));
        ScanRequest {
            pan_left_deg,
            pan_right_deg,
            pan_resolution_deg: self.pan_resolution_deg.unwrap_or(default.pan_resolution_deg),
            tilt_bottom_deg,
            tilt_top_deg,
            tilt_resolution_deg: self.tilt_resolution_deg.unwrap_or(default.tilt_resolution_deg),
            max_integration_ms: self.max_integration_ms.unwrap_or(default.max_integration_ms),
            boxcar_width: self.boxcar_width.unwrap_or(default.boxcar_width),
            dark_repeat_s: self.dark_repeat_s.unwrap_or(default.dark_repeat_s),
        }
    }
}

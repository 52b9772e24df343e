use tracing::warn;

use crate::acquisition::common::error::{FrameError, Result, ScanError};
use crate::acquisition::protocol::frame::HeaderFrame;

/// Widest sweep the gimbal can report: -512..=512 steps at a step of 1.
pub const MAX_AXIS_CELLS: usize = 1025;

/// Pan/tilt grid and spectral binning of one scan, fixed once the header arrives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanGeometry {
    pub pan_start: i64,
    pub pan_stop: i64,
    pub pan_step: i64,
    pub pan_count: usize,
    pub tilt_start: i64,
    pub tilt_stop: i64,
    pub tilt_step: i64,
    pub tilt_count: usize,
    pub boxcar_width: usize,
    pub spectral_bins: usize,
}

impl ScanGeometry {
    pub fn from_header(header: &HeaderFrame, pixels: usize) -> Result<Self> {
        let pan_count = axis_count("pan", header.pan_start, header.pan_stop, header.pan_step)?;
        let tilt_count = axis_count("tilt", header.tilt_start, header.tilt_stop, header.tilt_step)?;

        if header.boxcar_width == 0 || header.boxcar_width > pixels {
            return Err(ScanError::InvalidGeometry(format!(
                "boxcar width {} outside 1..={}",
                header.boxcar_width, pixels
            )));
        }

        Ok(Self {
            pan_start: header.pan_start,
            pan_stop: header.pan_stop,
            pan_step: header.pan_step,
            pan_count,
            tilt_start: header.tilt_start,
            tilt_stop: header.tilt_stop,
            tilt_step: header.tilt_step,
            tilt_count,
            boxcar_width: header.boxcar_width,
            spectral_bins: spectral_bin_count(pixels, header.boxcar_width),
        })
    }

    pub fn cell_count(&self) -> usize {
        self.pan_count * self.tilt_count
    }

    /// Maps reported gimbal positions to `(pan_index, tilt_index)` in geometry order.
    pub fn index_of(&self, pan: i64, tilt: i64) -> std::result::Result<(usize, usize), FrameError> {
        let out_of_range = || FrameError::OutOfRange { pan, tilt };
        let pan_index = axis_index(pan, self.pan_start, self.pan_step, self.pan_count).ok_or_else(out_of_range)?;
        let tilt_index =
            axis_index(tilt, self.tilt_start, self.tilt_step, self.tilt_count).ok_or_else(out_of_range)?;
        Ok((pan_index, tilt_index))
    }

    pub fn pan_position(&self, pan_index: usize) -> i64 {
        self.pan_start + self.pan_step * pan_index as i64
    }

    pub fn tilt_position(&self, tilt_index: usize) -> i64 {
        self.tilt_start + self.tilt_step * tilt_index as i64
    }

    /// Share of the sweep completed once this cell is written, in whole percent.
    pub fn progress_percent(&self, pan_index: usize, tilt_index: usize) -> u8 {
        let done = (pan_index + tilt_index * self.pan_count) as f64;
        (done / self.cell_count() as f64 * 100.0).round().clamp(0.0, 100.0) as u8
    }
}

pub fn spectral_bin_count(pixels: usize, boxcar_width: usize) -> usize {
    pixels.div_ceil(boxcar_width)
}

fn axis_count(axis: &str, start: i64, stop: i64, step: i64) -> Result<usize> {
    let invalid = || ScanError::InvalidGeometry(format!("{axis} range {start}..{stop} with step {step}"));
    if step <= 0 || stop < start {
        return Err(invalid());
    }
    let span = stop.checked_sub(start).ok_or_else(invalid)?;
    let count = usize::try_from(span / step).ok().and_then(|cells| cells.checked_add(1));
    match count {
        Some(count) if count <= MAX_AXIS_CELLS => Ok(count),
        _ => {
            warn!(axis, start, stop, step, max = MAX_AXIS_CELLS, "Header axis exceeds gimbal range");
            Err(invalid())
        }
    }
}

fn axis_index(position: i64, start: i64, step: i64, count: usize) -> Option<usize> {
    let offset = position.checked_sub(start)?;
    if offset < 0 {
        return None;
    }
    let index = (offset / step) as usize;
    (index < count).then_some(index)
}

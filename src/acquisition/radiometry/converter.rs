use std::sync::Arc;

use tracing::trace;

use crate::acquisition::calibration::{CalibrationSet, SensitivityCurve};
use crate::acquisition::common::error::FrameError;
use crate::acquisition::protocol::{DarkFrameSet, DataFrame, ScanGeometry};
use crate::acquisition::radiometry::types::{ColorimetricSums, Conversion, NO_DATA};

/// Converts light frames of one scan using a fixed calibration and boxcar width.
#[derive(Debug, Clone)]
pub struct RadiometricConverter {
    calibration: Arc<CalibrationSet>,
    boxcar_width: usize,
    spectral_bins: usize,
    base_integration_offset: f64,
}

impl RadiometricConverter {
    pub fn new(calibration: Arc<CalibrationSet>, geometry: &ScanGeometry, base_integration_offset: f64) -> Self {
        Self {
            calibration,
            boxcar_width: geometry.boxcar_width,
            spectral_bins: geometry.spectral_bins,
            base_integration_offset,
        }
    }

    pub fn calibration(&self) -> &CalibrationSet {
        &self.calibration
    }

    /// Calibrates a light frame against the dark frame taken at the same integration time.
    pub fn convert(&self, frame: &DataFrame, darks: &DarkFrameSet) -> Result<Conversion, FrameError> {
        let no_match = || FrameError::NoMatchingDark {
            integration_time: frame.integration_time,
        };
        let dark = darks.find(frame.integration_time).ok_or_else(no_match)?;
        if dark.len() != self.spectral_bins || frame.counts.len() != self.spectral_bins {
            return Err(no_match());
        }
        Ok(self.convert_with_dark(frame, dark))
    }

    /// Dark subtraction, linearization and radiance conversion.
    ///
    /// Each bin's count is shared across its `boxcar_width` pixels; every live pixel is
    /// converted with its own sensitivity and the bin stores the average. The colorimetric
    /// sums weight each pixel's radiance by its wavelength bin width and curve value.
    pub fn convert_with_dark(&self, frame: &DataFrame, dark: &[f64]) -> Conversion {
        let calibration = &*self.calibration;
        let [exponent, offset] = calibration.linearization;
        let effective_integration = frame.integration_time as f64 + self.base_integration_offset;
        let boxcar = self.boxcar_width as f64;

        let mut spectrum = Vec::with_capacity(self.spectral_bins);
        let mut sums = ColorimetricSums::default();

        let bins = (0..calibration.pixels).step_by(self.boxcar_width);
        for ((first_pixel, &raw), &dark_count) in bins.zip(&frame.counts).zip(dark) {
            let last_pixel = (first_pixel + self.boxcar_width).min(calibration.pixels);
            let mut bin_sum = 0.0;

            for pixel in first_pixel..last_pixel {
                if !calibration.is_live_pixel(pixel) {
                    continue;
                }
                let sensitivity = calibration.radiometric_sensitivity[pixel];

                let counts = linearize((raw - dark_count) / boxcar, exponent, offset);
                let radiance = safe_div(counts, sensitivity * effective_integration);
                bin_sum += radiance;

                let weighted = radiance * calibration.wavelength_bin_width[pixel];
                for curve in SensitivityCurve::ALL {
                    let value = sums.get(curve) + weighted * calibration.curve(curve)[pixel];
                    sums.set(curve, value);
                }
            }

            spectrum.push(bin_sum / boxcar);
        }

        trace!(
            pan = frame.pan,
            tilt = frame.tilt,
            integration = frame.integration_time,
            "Converted light frame"
        );
        Conversion { spectrum, sums }
    }
}

/// Power-law correction `sign(x) * exp(exponent * ln|x| + offset)`; zero stays zero.
pub fn linearize(x: f64, exponent: f64, offset: f64) -> f64 {
    if x == 0.0 {
        return 0.0;
    }
    x.signum() * (exponent * x.abs().ln() + offset).exp()
}

fn safe_div(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 || !denominator.is_finite() {
        NO_DATA
    } else {
        numerator / denominator
    }
}

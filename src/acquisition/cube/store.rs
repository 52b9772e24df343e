use tracing::trace;

use crate::acquisition::calibration::SensitivityCurve;
use crate::acquisition::common::error::{FrameError, Result, ScanError};
use crate::acquisition::cube::types::{Plane, Projections};
use crate::acquisition::protocol::ScanGeometry;
use crate::acquisition::radiometry::ColorimetricSums;

/// Luminous efficacy (683 lm/W) times the empirical cross-instrument scale.
pub const LUMINANCE_SCALE: f64 = 683.0 * 117.159574150716;

/// Starting value of the running maxima; never zero so normalization cannot divide by zero.
pub const MAX_EPSILON: f64 = 1e-10;

/// Curve standing in for green in the extreme-band image.
pub const EXTREME_PROXY_CURVE: SensitivityCurve = SensitivityCurve::CieY;

const XYZ_TO_RGB: [[f64; 3]; 3] = [
    [3.24, -1.54, -0.50],
    [-0.97, 1.88, 0.04],
    [0.06, -0.20, 1.06],
];

/// Post-matrix gains matching the reference display.
const RGB_GAINS: [f64; 3] = [1.0, 1.44, 1.71];

pub fn xyz_to_display_rgb(x: f64, y: f64, z: f64) -> [f64; 3] {
    std::array::from_fn(|channel| {
        let [a, b, c] = XYZ_TO_RGB[channel];
        (a * x + b * y + c * z) * RGB_GAINS[channel]
    })
}

/// `band / (band + nir)`, zero when the denominator is zero.
pub fn chlorophyll_ratio(band: f64, nir: f64) -> f64 {
    let denominator = band + nir;
    if denominator == 0.0 { 0.0 } else { band / denominator }
}

/// Spectral cube of one scan plus its derived projections.
///
/// Storage is in display order: row 0 holds the highest tilt. Accessors take
/// `(x, y) = (pan_index, tilt_index)` in geometry order and flip internally.
#[derive(Debug, Clone)]
pub struct HyperspectralCube {
    geometry: ScanGeometry,
    wavelengths: Vec<f64>,
    spectra: Vec<f64>,
    written: Plane<bool>,
    projections: Projections,
}

impl HyperspectralCube {
    pub fn new(geometry: ScanGeometry, wavelengths: Vec<f64>) -> Result<Self> {
        let (width, height) = (geometry.pan_count, geometry.tilt_count);
        let len = width
            .checked_mul(height)
            .and_then(|cells| cells.checked_mul(geometry.spectral_bins))
            .ok_or_else(|| {
                ScanError::InvalidGeometry(format!(
                    "{width}x{height} cells of {} bins do not fit in memory",
                    geometry.spectral_bins
                ))
            })?;
        Ok(Self {
            spectra: vec![0.0; len],
            written: Plane::new(width, height),
            projections: Projections::new(width, height, MAX_EPSILON),
            geometry,
            wavelengths,
        })
    }

    pub fn geometry(&self) -> &ScanGeometry {
        &self.geometry
    }

    /// Wavelength of every spectral bin (first pixel of each boxcar).
    pub fn wavelengths(&self) -> &[f64] {
        &self.wavelengths
    }

    /// `(tilt_count, pan_count, spectral_bins)`
    pub fn shape(&self) -> (usize, usize, usize) {
        (self.geometry.tilt_count, self.geometry.pan_count, self.geometry.spectral_bins)
    }

    fn display_row(&self, tilt_index: usize) -> Option<usize> {
        (tilt_index < self.geometry.tilt_count).then(|| self.geometry.tilt_count - 1 - tilt_index)
    }

    fn cell(&self, x: usize, y: usize) -> Option<(usize, usize)> {
        let row = self.display_row(y)?;
        (x < self.geometry.pan_count).then_some((row, x))
    }

    fn spectrum_range(&self, row: usize, column: usize) -> std::ops::Range<usize> {
        let bins = self.geometry.spectral_bins;
        let start = (row * self.geometry.pan_count + column) * bins;
        start..start + bins
    }

    /// Stores a converted light frame and derives every projection for that cell.
    pub fn write(
        &mut self,
        tilt_index: usize,
        pan_index: usize,
        spectrum: &[f64],
        sums: &ColorimetricSums,
        saturated: bool,
        saturation_magnitude: f64,
    ) -> std::result::Result<(), FrameError> {
        let pan = self.geometry.pan_position(pan_index);
        let tilt = self.geometry.tilt_position(tilt_index);
        let (row, column) = self
            .cell(pan_index, tilt_index)
            .ok_or(FrameError::OutOfRange { pan, tilt })?;
        if self.written.get(row, column).unwrap_or(false) {
            return Err(FrameError::AlreadyWritten { pan, tilt });
        }

        let range = self.spectrum_range(row, column);
        for (slot, &value) in self.spectra[range].iter_mut().zip(spectrum) {
            *slot = value;
        }
        self.written.set(row, column, true);

        let x = sums.get(SensitivityCurve::CieX);
        let y = sums.get(SensitivityCurve::CieY);
        let z = sums.get(SensitivityCurve::CieZ);
        let nir = sums.get(SensitivityCurve::NearIr);
        let nuv = sums.get(SensitivityCurve::NearUv);
        let green_proxy = sums.get(EXTREME_PROXY_CURVE);
        let [red, green, blue] = xyz_to_display_rgb(x, y, z);

        let p = &mut self.projections;
        p.luminance.set(row, column, y * LUMINANCE_SCALE);
        p.red.set(row, column, red);
        p.green.set(row, column, green);
        p.blue.set(row, column, blue);
        p.saturated.set(row, column, saturated);
        p.saturation_magnitude.set(row, column, saturation_magnitude);
        p.infrared.set(row, column, nir);
        p.extreme_green.set(row, column, green_proxy);
        p.ultraviolet.set(row, column, nuv);
        p.chlorophyll_a
            .set(row, column, chlorophyll_ratio(sums.get(SensitivityCurve::ChlA), nir));
        p.chlorophyll_b
            .set(row, column, chlorophyll_ratio(sums.get(SensitivityCurve::ChlB), nir));

        for value in [red, green, blue] {
            if value > p.max_color_channel {
                p.max_color_channel = value;
            }
        }
        for value in [nir, green_proxy, nuv] {
            if value > p.max_extreme_channel {
                p.max_extreme_channel = value;
            }
        }

        trace!(pan_index, tilt_index, red, green, blue, "Cell written");
        Ok(())
    }

    pub fn read_spectrum(&self, x: usize, y: usize) -> Option<&[f64]> {
        let (row, column) = self.cell(x, y)?;
        Some(&self.spectra[self.spectrum_range(row, column)])
    }

    pub fn is_written(&self, x: usize, y: usize) -> bool {
        self.cell(x, y)
            .and_then(|(row, column)| self.written.get(row, column))
            .unwrap_or(false)
    }

    pub fn cells_written(&self) -> usize {
        self.written.data.iter().filter(|&&written| written).count()
    }

    pub fn luminance_at(&self, x: usize, y: usize) -> Option<f64> {
        let (row, column) = self.cell(x, y)?;
        self.projections.luminance.get(row, column)
    }

    /// `([red, green, blue], [infrared, extreme_green, ultraviolet])` at a cell
    pub fn channel_values(&self, x: usize, y: usize) -> Option<([f64; 3], [f64; 3])> {
        let (row, column) = self.cell(x, y)?;
        let p = &self.projections;
        Some((
            [
                p.red.get(row, column)?,
                p.green.get(row, column)?,
                p.blue.get(row, column)?,
            ],
            [
                p.infrared.get(row, column)?,
                p.extreme_green.get(row, column)?,
                p.ultraviolet.get(row, column)?,
            ],
        ))
    }

    /// Highest finite bin of a cell's spectrum as `(wavelength, value)`.
    pub fn peak(&self, x: usize, y: usize) -> Option<(f64, f64)> {
        let spectrum = self.read_spectrum(x, y)?;
        let (bin, &value) = spectrum
            .iter()
            .enumerate()
            .filter(|(_, value)| value.is_finite())
            .max_by(|a, b| a.1.total_cmp(b.1))?;
        Some((self.wavelengths.get(bin).copied()?, value))
    }

    pub fn projections(&self) -> &Projections {
        &self.projections
    }

    pub fn snapshot_projections(&self) -> Projections {
        self.projections.clone()
    }
}

//! Acquisition configuration types

use std::path::PathBuf;

/// Number of pixels on the line spectrometer.
pub const SENSOR_PIXELS: usize = 288;

/// Minimum hardware integration time added to every reported integration time.
pub const BASE_INTEGRATION_OFFSET: f64 = 550.0;

/// TIFF compression methods
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TiffCompression {
    /// No compression (fastest, largest file)
    None,
    /// LZW compression (slow, good compression)
    Lzw,
    /// Deflate compression - fast level (good speed/size balance)
    DeflateFast,
    /// Deflate compression - best compression (slower)
    DeflateBest,
    /// Deflate compression - balanced
    DeflateBalanced,
}

/// Configuration for an acquisition session
#[derive(Debug, Clone)]
pub struct AcquisitionConfig {
    /// Sensor pixel count
    pub pixels: usize,
    /// Added to the integration time before dividing counts into radiance
    pub base_integration_offset: f64,
    /// Dark frames with a longer integration time also yield in cooperative mode
    pub long_dark_threshold: i64,
    /// Per-unit coefficient table (wavelength, sensitivity, linearization rows)
    pub calibration_table: PathBuf,
    /// Shared spectral sensitivity curve table
    pub sensitivity_table: PathBuf,
    /// Directory completed captures are written to
    pub save_dir: PathBuf,
    /// Operator label appended to capture file names
    pub save_label: String,
    /// Compression used for the rendered sRGB image
    pub compression: TiffCompression,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            pixels: SENSOR_PIXELS,
            base_integration_offset: BASE_INTEGRATION_OFFSET,
            long_dark_threshold: 100_000,
            calibration_table: PathBuf::from("./calibration_data.txt"),
            sensitivity_table: PathBuf::from("./sensitivity_data.csv"),
            save_dir: PathBuf::from("./scans"),
            save_label: String::new(),
            compression: TiffCompression::None,
        }
    }
}

impl AcquisitionConfig {
    pub fn builder() -> AcquisitionConfigBuilder {
        AcquisitionConfigBuilder::default()
    }
}

/// Builder for AcquisitionConfig
#[derive(Default)]
pub struct AcquisitionConfigBuilder {
    pixels: Option<usize>,
    base_integration_offset: Option<f64>,
    long_dark_threshold: Option<i64>,
    calibration_table: Option<PathBuf>,
    sensitivity_table: Option<PathBuf>,
    save_dir: Option<PathBuf>,
    save_label: Option<String>,
    compression: Option<TiffCompression>,
}

impl AcquisitionConfigBuilder {
    pub fn pixels(mut self, pixels: usize) -> Self {
        self.pixels = Some(pixels);
        self
    }

    pub fn base_integration_offset(mut self, offset: f64) -> Self {
        self.base_integration_offset = Some(offset);
        self
    }

    pub fn long_dark_threshold(mut self, threshold: i64) -> Self {
        self.long_dark_threshold = Some(threshold);
        self
    }

    pub fn calibration_table(mut self, path: impl Into<PathBuf>) -> Self {
        self.calibration_table = Some(path.into());
        self
    }

    pub fn sensitivity_table(mut self, path: impl Into<PathBuf>) -> Self {
        self.sensitivity_table = Some(path.into());
        self
    }

    pub fn save_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.save_dir = Some(path.into());
        self
    }

    pub fn save_label(mut self, label: impl Into<String>) -> Self {
        self.save_label = Some(label.into());
        self
    }

    pub fn compression(mut self, compression: TiffCompression) -> Self {
        self.compression = Some(compression);
        self
    }

    pub fn build(self) -> AcquisitionConfig {
        let default = AcquisitionConfig::default();
        AcquisitionConfig {
            pixels: self.pixels.unwrap_or(default.pixels),
            base_integration_offset: self
                .base_integration_offset
                .unwrap_or(default.base_integration_offset),
            long_dark_threshold: self.long_dark_threshold.unwrap_or(default.long_dark_threshold),
            calibration_table: self.calibration_table.unwrap_or(default.calibration_table),
            sensitivity_table: self.sensitivity_table.unwrap_or(default.sensitivity_table),
            save_dir: self.save_dir.unwrap_or(default.save_dir),
            save_label: self.save_label.unwrap_or(default.save_label),
            compression: self.compression.unwrap_or(default.compression),
        }
    }
}

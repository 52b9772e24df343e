use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use hyperspec_scan_rs::acquisition::{Preview, ScanRequest, TiffCompression};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Acquisition and replay for the pan/tilt hyperspectral scanner",
    long_about = None,
    arg_required_else_help = true,
    after_help = "Examples:\n  hyperspec_scan replay scans/2024-3-5_07-08-09_roof.csv --export-srgb roof.tiff\n  hyperspec_scan replay roof.csv --reference 2,1 --spectrum 4,3 --label leaf\n  hyperspec_scan scan --device /dev/ttyACM0 --pan-left -30 --pan-right 30 --pan-res 5 --label roof\n"
)]
pub struct Cli {
    /// Per-unit calibration coefficient table
    #[arg(long, global = true, default_value = "./calibration_data.txt")]
    pub calibration: PathBuf,

    /// Shared spectral sensitivity curve table
    #[arg(long, global = true, default_value = "./sensitivity_data.csv")]
    pub sensitivity: PathBuf,

    /// Log at debug level unless RUST_LOG is set
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Drive a saved capture file through the acquisition pipeline
    Replay(ReplayArgs),
    /// Run a live scan over a pre-configured serial device
    Scan(ScanArgs),
}

#[derive(Args, Debug)]
pub struct ReplayArgs {
    /// Capture file written by a previous scan
    pub file: PathBuf,

    /// Write the rendered preview as a TIFF image
    #[arg(long)]
    pub export_srgb: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = PreviewArg::Rgb)]
    pub preview: PreviewArg,

    /// Display brightness multiplier
    #[arg(long, default_value_t = 1.0)]
    pub brightness: f64,

    #[arg(long, value_enum, default_value_t = CompressionArg::None)]
    pub compression: CompressionArg,

    /// Use cell X,Y as the reflectance reference
    #[arg(long, value_delimiter = ',', num_args = 2, value_names = ["X", "Y"])]
    pub reference: Option<Vec<usize>>,

    /// Reflectance of the reference target in percent
    #[arg(long, default_value_t = 99.0)]
    pub reference_percent: f64,

    /// Append the spectrum of cell X,Y to the capture's spectrum CSV
    #[arg(long, value_delimiter = ',', num_args = 2, value_names = ["X", "Y"])]
    pub spectrum: Option<Vec<usize>>,

    /// Column label for the exported spectrum
    #[arg(long, default_value = "")]
    pub label: String,
}

#[derive(Args, Debug)]
pub struct ScanArgs {
    /// Character device of the scanner, already configured (baud rate, raw mode)
    #[arg(long)]
    pub device: PathBuf,

    #[arg(long, allow_hyphen_values = true, default_value_t = -60.0)]
    pub pan_left: f64,

    #[arg(long, allow_hyphen_values = true, default_value_t = 60.0)]
    pub pan_right: f64,

    /// Pan resolution in degrees
    #[arg(long, default_value_t = 30.0)]
    pub pan_res: f64,

    #[arg(long, allow_hyphen_values = true, default_value_t = -60.0)]
    pub tilt_bottom: f64,

    #[arg(long, allow_hyphen_values = true, default_value_t = 60.0)]
    pub tilt_top: f64,

    /// Tilt resolution in degrees
    #[arg(long, default_value_t = 30.0)]
    pub tilt_res: f64,

    /// Maximum integration time in milliseconds
    #[arg(long, default_value_t = 2000)]
    pub max_integration: u32,

    #[arg(long, default_value_t = 2)]
    pub boxcar: usize,

    /// Dark re-measurement interval in seconds
    #[arg(long, default_value_t = 120)]
    pub dark_repeat: u32,

    /// Label appended to the capture file names
    #[arg(long, default_value = "")]
    pub label: String,

    #[arg(long, default_value = "./scans")]
    pub save_dir: PathBuf,

    #[arg(long, value_enum, default_value_t = CompressionArg::None)]
    pub compression: CompressionArg,
}

impl ScanArgs {
    pub fn request(&self) -> ScanRequest {
        ScanRequest::builder()
            .pan(self.pan_left, self.pan_right)
            .pan_resolution(self.pan_res)
            .tilt(self.tilt_bottom, self.tilt_top)
            .tilt_resolution(self.tilt_res)
            .max_integration_ms(self.max_integration)
            .boxcar_width(self.boxcar)
            .dark_repeat_s(self.dark_repeat)
            .build()
    }
}

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum PreviewArg {
    Rgb,
    Saturation,
    Extreme,
    Ndvi,
}

impl From<PreviewArg> for Preview {
    fn from(preview: PreviewArg) -> Self {
        match preview {
            PreviewArg::Rgb => Preview::Rgb,
            PreviewArg::Saturation => Preview::Saturation,
            PreviewArg::Extreme => Preview::ExtremeBands,
            PreviewArg::Ndvi => Preview::Ndvi,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum CompressionArg {
    None,
    Lzw,
    DeflateFast,
    DeflateBalanced,
    DeflateBest,
}

impl From<CompressionArg> for TiffCompression {
    fn from(compression: CompressionArg) -> Self {
        match compression {
            CompressionArg::None => TiffCompression::None,
            CompressionArg::Lzw => TiffCompression::Lzw,
            CompressionArg::DeflateFast => TiffCompression::DeflateFast,
            CompressionArg::DeflateBalanced => TiffCompression::DeflateBalanced,
            CompressionArg::DeflateBest => TiffCompression::DeflateBest,
        }
    }
}

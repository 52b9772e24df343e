//! Capture export module
//!
//! This module persists completed scans: the raw capture stream with its summary table,
//! the rendered sRGB image, and per-cell spectrum columns.

mod capture_writer;
mod sink;
mod spectrum_csv;
mod standard_tiff_writer;
mod summary;
pub mod types;
mod writer;


pub use capture_writer::{CaptureWriter, capture_stem};
pub use sink::CaptureSink;
pub use spectrum_csv::{export_spectrum, spectrum_csv_path};
pub use standard_tiff_writer::StandardTiffWriter;
pub use summary::summary_table;
pub use types::{SavedCapture, SpectrumKind};
pub use writer::TiffWriter;

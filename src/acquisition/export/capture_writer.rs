use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use tracing::{info, instrument};

use crate::acquisition::common::{AcquisitionConfig, Result, ScanError, TiffCompression};
use crate::acquisition::cube::{HyperspectralCube, Preview, WhiteBalance, render};
use crate::acquisition::export::sink::CaptureSink;
use crate::acquisition::export::standard_tiff_writer::StandardTiffWriter;
use crate::acquisition::export::summary::summary_table;
use crate::acquisition::export::types::SavedCapture;
use crate::acquisition::export::writer::TiffWriter;

const IMAGE_SUFFIX: &str = "_sRGB.tiff";

/// `<save_dir>/<Y>-<M>-<D>_<HH-MM-SS>_<label>` in local time, date fields unpadded.
pub fn capture_stem(save_dir: &Path, label: &str, timestamp: &DateTime<Local>) -> PathBuf {
    save_dir.join(format!("{}_{label}", timestamp.format("%Y-%-m-%-d_%H-%M-%S")))
}

fn with_suffix(stem: &Path, suffix: &str) -> PathBuf {
    let mut name = stem.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}

/// Writes completed live scans to timestamped files under the save directory.
pub struct CaptureWriter<W: TiffWriter = StandardTiffWriter> {
    save_dir: PathBuf,
    label: String,
    compression: TiffCompression,
    writer: W,
}

impl CaptureWriter<StandardTiffWriter> {
    pub fn new(config: &AcquisitionConfig) -> Self {
        Self::with_custom(StandardTiffWriter, config)
    }
}

impl<W: TiffWriter> CaptureWriter<W> {
    pub fn with_custom(writer: W, config: &AcquisitionConfig) -> Self {
        Self {
            save_dir: config.save_dir.clone(),
            label: config.save_label.clone(),
            compression: config.compression,
            writer,
        }
    }

    pub fn save_dir(&self) -> &Path {
        &self.save_dir
    }

    /// Writes the capture under an explicit stem.
    #[instrument(skip(self, stem, raw_lines, cube), fields(stem = %stem.display(), lines = raw_lines.len()))]
    pub fn persist_as(&self, stem: &Path, raw_lines: &[String], cube: &HyperspectralCube) -> Result<SavedCapture> {
        if let Some(parent) = stem.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| ScanError::Export(format!("{}: {}", parent.display(), e)))?;
        }

        let csv_path = with_suffix(stem, ".csv");
        {
            let _span = tracing::info_span!("write_capture_csv").entered();
            let file = File::create(&csv_path)
                .map_err(|e| ScanError::Export(format!("{}: {}", csv_path.display(), e)))?;
            let mut output = BufWriter::new(file);
            for line in raw_lines {
                writeln!(output, "{line}")?;
            }
            output.write_all(summary_table(cube).as_bytes())?;
            output.flush()?;
        }

        let image_path = with_suffix(stem, IMAGE_SUFFIX);
        {
            let _span = tracing::info_span!("write_srgb_image").entered();
            let image = render(cube, Preview::Rgb, &WhiteBalance::IDENTITY, 1.0);
            let mut output = File::create(&image_path)
                .map_err(|e| ScanError::Export(format!("{}: {}", image_path.display(), e)))?;
            self.writer.write_rgb_tiff(&image, &mut output, self.compression)?;
        }

        info!(
            csv = %csv_path.display(),
            image = %image_path.display(),
            "Capture saved"
        );
        Ok(SavedCapture {
            stem: stem.to_path_buf(),
            csv_path,
            image_path,
        })
    }
}

impl<W: TiffWriter> CaptureSink for CaptureWriter<W> {
    fn persist(&mut self, raw_lines: &[String], cube: &HyperspectralCube) -> Result<SavedCapture> {
        let stem = capture_stem(&self.save_dir, &self.label, &Local::now());
        self.persist_as(&stem, raw_lines, cube)
    }
}

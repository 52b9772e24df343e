use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::acquisition::common::{Result, ScanError};
use crate::acquisition::export::types::SpectrumKind;

/// `<stem>_radiance.csv` or `<stem>_reflectance.csv`
pub fn spectrum_csv_path(stem: &Path, kind: SpectrumKind) -> PathBuf {
    let mut name = stem.as_os_str().to_os_string();
    name.push(format!("_{}.csv", kind.file_suffix()));
    PathBuf::from(name)
}

/// Adds the spectrum of cell `(x, y)` as a new column of the per-scan spectrum file,
/// creating the file with a wavelength column when it does not exist yet.
///
/// An existing file whose row count differs from the spectrum length is left untouched.
pub fn export_spectrum(
    stem: &Path,
    kind: SpectrumKind,
    cell: (usize, usize),
    label: &str,
    wavelengths: &[f64],
    values: &[f64],
) -> Result<PathBuf> {
    let path = spectrum_csv_path(stem, kind);
    let column = format!("x{}_y{}_{label}", cell.0, cell.1);

    let contents = if path.exists() {
        let existing = std::fs::read_to_string(&path)
            .map_err(|e| ScanError::Export(format!("{}: {}", path.display(), e)))?;
        let mut lines = existing.lines();
        let header = lines.next().unwrap_or_default().trim();
        let rows: Vec<&str> = lines.collect();
        if rows.len() != values.len() {
            return Err(ScanError::Export(format!(
                "{} has {} rows, spectrum has {} bins",
                path.display(),
                rows.len(),
                values.len()
            )));
        }

        let mut contents = format!("{header},{column}\n");
        for (row, value) in rows.iter().zip(values) {
            let _ = writeln!(contents, "{},{value}", row.trim());
        }
        debug!(path = %path.display(), column, "Appending spectrum column");
        contents
    } else {
        let mut contents = format!("Wavelength,{column}\n");
        for (wavelength, value) in wavelengths.iter().zip(values) {
            let _ = writeln!(contents, "{wavelength},{value}");
        }
        contents
    };

    std::fs::write(&path, contents).map_err(|e| ScanError::Export(format!("{}: {}", path.display(), e)))?;
    info!(path = %path.display(), column, "Spectrum exported");
    Ok(path)
}

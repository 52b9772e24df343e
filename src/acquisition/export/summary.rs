use std::fmt::Write;

use crate::acquisition::cube::HyperspectralCube;

/// Table appended after the raw lines of a saved capture.
///
/// ```text
/// le values
/// pan,tilt,wavelength
/// ,,<wl_0>,<wl_1>,...
/// <pan>,<tilt>,<value_0>,<value_1>,...
/// ```
///
/// Rows run pan-fastest in ascending tilt. Wavelengths are truncated to whole nanometres
/// and non-finite values are written as `0`.
pub fn summary_table(cube: &HyperspectralCube) -> String {
    let geometry = cube.geometry();
    let mut table = String::from("le values\npan,tilt,wavelength\n,");
    for wavelength in cube.wavelengths() {
        let _ = write!(table, ",{}", *wavelength as i64);
    }

    for tilt_index in 0..geometry.tilt_count {
        for pan_index in 0..geometry.pan_count {
            let _ = write!(
                table,
                "\n{},{}",
                geometry.pan_position(pan_index),
                geometry.tilt_position(tilt_index)
            );
            for &value in cube.read_spectrum(pan_index, tilt_index).unwrap_or_default() {
                let value = if value.is_finite() { value } else { 0.0 };
                let _ = write!(table, ",{value}");
            }
        }
    }
    table
}

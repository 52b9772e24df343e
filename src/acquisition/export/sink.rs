use crate::acquisition::common::Result;
use crate::acquisition::cube::HyperspectralCube;
use crate::acquisition::export::types::SavedCapture;

/// Receives every scan that completes without being stopped.
pub trait CaptureSink {
    fn persist(&mut self, raw_lines: &[String], cube: &HyperspectralCube) -> Result<SavedCapture>;
}

use std::path::PathBuf;

/// Files written for one completed scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedCapture {
    /// Shared prefix of every file belonging to the capture
    pub stem: PathBuf,
    pub csv_path: PathBuf,
    pub image_path: PathBuf,
}

/// Which quantity a spectrum export holds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpectrumKind {
    Radiance,
    Reflectance,
}

impl SpectrumKind {
    pub fn file_suffix(self) -> &'static str {
        match self {
            SpectrumKind::Radiance => "radiance",
            SpectrumKind::Reflectance => "reflectance",
        }
    }
}

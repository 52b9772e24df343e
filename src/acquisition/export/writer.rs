use std::io::Write;

use crate::acquisition::common::{Result, TiffCompression};
use crate::acquisition::cube::RgbImage8;

pub trait TiffWriter {
    fn write_rgb_tiff(&self, image: &RgbImage8, output: &mut dyn Write, compression: TiffCompression) -> Result<()>;
}

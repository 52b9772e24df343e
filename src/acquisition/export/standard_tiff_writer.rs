use std::io::Write;

use tracing::debug;

use crate::acquisition::common::{Result, ScanError, TiffCompression};
use crate::acquisition::cube::RgbImage8;
use crate::acquisition::export::writer::TiffWriter;

pub struct StandardTiffWriter;

impl TiffWriter for StandardTiffWriter {
    fn write_rgb_tiff(&self, image: &RgbImage8, output: &mut dyn Write, compression: TiffCompression) -> Result<()> {
        debug!("Encoding RGB TIFF image: {}x{}", image.width, image.height);

        let mut buffer = Vec::new();

        let compression = match compression {
            TiffCompression::None => tiff::encoder::Compression::Uncompressed,
            TiffCompression::Lzw => tiff::encoder::Compression::Lzw,
            TiffCompression::DeflateFast => {
                tiff::encoder::Compression::Deflate(tiff::encoder::compression::DeflateLevel::Fast)
            }
            TiffCompression::DeflateBalanced => {
                tiff::encoder::Compression::Deflate(tiff::encoder::compression::DeflateLevel::Balanced)
            }
            TiffCompression::DeflateBest => {
                tiff::encoder::Compression::Deflate(tiff::encoder::compression::DeflateLevel::Best)
            }
        };

        let mut encoder = tiff::encoder::TiffEncoder::new(std::io::Cursor::new(&mut buffer))
            .map_err(|e| ScanError::Encode(e.to_string()))?
            .with_compression(compression);

        encoder
            .write_image::<tiff::encoder::colortype::RGB8>(image.width as u32, image.height as u32, &image.data)
            .map_err(|e| ScanError::Encode(e.to_string()))?;

        output.write_all(&buffer)?;

        debug!("TIFF encoding complete");
        Ok(())
    }
}

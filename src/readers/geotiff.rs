use super::{DataReader, Raster, ReadError};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use tiff::decoder::{Decoder, DecodingResult};
use tiff::encoder::{TiffEncoder, colortype::Gray32Float};

pub struct GeoTiffReader {
    pub path: PathBuf,
}

impl GeoTiffReader {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    fn tiff_error(&self, source: tiff::TiffError) -> ReadError {
        ReadError::Tiff {
            path: self.path.clone(),
            source,
        }
    }
}

impl DataReader for GeoTiffReader {
    fn read_data(&self) -> Result<Raster, ReadError> {
        let file = File::open(&self.path).map_err(|source| ReadError::Io {
            path: self.path.clone(),
            source,
        })?;

        let reader = BufReader::new(file);

        let mut decoder = Decoder::new(reader).map_err(|e| self.tiff_error(e))?;

        let (width, height) = decoder.dimensions().map_err(|e| self.tiff_error(e))?;

        let image_data: Vec<f32> = match decoder.read_image().map_err(|e| self.tiff_error(e))? {
            DecodingResult::U8(data) => data.iter().map(|&x| x as f32).collect(),
            DecodingResult::U16(data) => data.iter().map(|&x| x as f32).collect(),
            DecodingResult::U32(data) => data.iter().map(|&x| x as f32).collect(),
            DecodingResult::I8(data) => data.iter().map(|&x| x as f32).collect(),
            DecodingResult::I16(data) => data.iter().map(|&x| x as f32).collect(),
            DecodingResult::I32(data) => data.iter().map(|&x| x as f32).collect(),
            DecodingResult::F32(data) => data,
            DecodingResult::F64(data) => data.iter().map(|&x| x as f32).collect(),
            _ => return Err(ReadError::PixelFormat(self.path.clone())),
        };

        Ok(Raster {
            width,
            height,
            buffer: image_data,
        })
    }
}

/// Writes `raster` as a single band 32-bit float TIFF.
pub fn write_raster<P: AsRef<Path>>(path: P, raster: &Raster) -> Result<(), ReadError> {
    let path = path.as_ref();
    let tiff_error = |source| ReadError::Tiff {
        path: path.to_path_buf(),
        source,
    };

    let file = File::create(path).map_err(|source| ReadError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let mut encoder = TiffEncoder::new(BufWriter::new(file)).map_err(tiff_error)?;
    encoder
        .write_image::<Gray32Float>(raster.width, raster.height, &raster.buffer)
        .map_err(tiff_error)?;

    log::debug!("Wrote {}x{} raster to {}", raster.width, raster.height, path.display());
    Ok(())
}

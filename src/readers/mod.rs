pub mod geotiff;
pub mod types;

use std::path::Path;

pub use geotiff::{GeoTiffReader, write_raster};
pub use types::{DataReader, Raster, ReadError};

pub fn is_supported_file_type(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|ext| ext.to_str()),
        Some("tif") | Some("tiff")
    )
}

pub fn create_reader(path: &Path) -> Result<Box<dyn DataReader>, ReadError> {
    if is_supported_file_type(path) {
        Ok(Box::new(GeoTiffReader::new(path)))
    } else {
        Err(ReadError::UnknownFileType(path.to_path_buf()))
    }
}

/// `<product>/<band>.tif`
pub fn band_path(product: &Path, band: &str) -> std::path::PathBuf {
    product.join(format!("{}.tif", band))
}

/// Reads band `band` of `product`, which must exist.
pub fn read_band(product: &Path, band: &str) -> Result<Raster, ReadError> {
    let path = band_path(product, band);
    if !path.is_file() {
        return Err(ReadError::MissingBand {
            product: product.to_path_buf(),
            band: band.to_string(),
        });
    }
    create_reader(&path)?.read_data()
}

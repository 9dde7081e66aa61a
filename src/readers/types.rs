use std::fmt;
use std::path::PathBuf;

pub trait DataReader {
    fn read_data(&self) -> Result<Raster, ReadError>;
}

#[derive(Debug, thiserror::Error)]
pub enum ReadError {
    #[error("Failed to open {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("TIFF error in {}: {source}", path.display())]
    Tiff {
        path: PathBuf,
        #[source]
        source: tiff::TiffError,
    },

    #[error("Unsupported pixel format in {}", .0.display())]
    PixelFormat(PathBuf),

    #[error("Unknown file type: {}", .0.display())]
    UnknownFileType(PathBuf),

    #[error("Missing band '{band}' in {}", product.display())]
    MissingBand { product: PathBuf, band: String },

    #[error("Band '{band}' is {actual:?}, expected {expected:?}")]
    Shape {
        band: String,
        expected: (u32, u32),
        actual: (u32, u32),
    },
}

/// Single band image, row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct Raster {
    pub width: u32,
    pub height: u32,
    pub buffer: Vec<f32>,
}

impl Raster {
    pub fn new(width: u32, height: u32, buffer: Vec<f32>) -> Self {
        Self {
            width,
            height,
            buffer,
        }
    }

    pub fn filled(width: u32, height: u32, value: f32) -> Self {
        Self::new(width, height, vec![value; width as usize * height as usize])
    }

    pub fn dim(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Mean over the non-NaN pixels, `None` if there are none.
    pub fn valid_mean(&self) -> Option<f64> {
        let (sum, count) = self
            .buffer
            .iter()
            .filter(|v| !v.is_nan())
            .fold((0.0f64, 0usize), |(s, n), &v| (s + v as f64, n + 1));
        (count > 0).then(|| sum / count as f64)
    }
}

impl fmt::Display for Raster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let valid = || self.buffer.iter().copied().filter(|x| !x.is_nan());
        let min_value = valid().fold(f32::NAN, f32::min);
        let max_value = valid().fold(f32::NAN, f32::max);

        write!(
            f,
            "Width: {}\nHeight: {}\nBuffer Length: {}\nMin value: {}\nMax value: {}",
            self.width,
            self.height,
            self.buffer.len(),
            min_value,
            max_value,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_mean_skips_nan() {
        let raster = Raster::new(2, 2, vec![0.2, f32::NAN, 0.4, 0.3]);
        let mean = raster.valid_mean().unwrap();
        assert!((mean - 0.3).abs() < 1e-6);
        assert_eq!(Raster::filled(1, 1, f32::NAN).valid_mean(), None);
    }

    #[test]
    fn test_display_reports_range() {
        let raster = Raster::new(3, 1, vec![2.0, f32::NAN, -1.0]);
        let text = raster.to_string();
        assert!(text.contains("Min value: -1"));
        assert!(text.contains("Max value: 2"));
    }
}

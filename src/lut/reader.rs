use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use super::error::LutError;

/// Big-endian reader over a binary LUT file.
pub struct LutReader<R: Read> {
    inner: R,
    path: String,
}

impl LutReader<BufReader<File>> {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, LutError> {
        let path_str = path.as_ref().display().to_string();
        let file = File::open(path.as_ref()).map_err(|e| LutError::io(&path_str, e))?;
        log::debug!("Opened LUT file {}", path_str);

        Ok(Self {
            inner: BufReader::new(file),
            path: path_str,
        })
    }
}

impl<R: Read> LutReader<R> {
    pub fn from_reader(inner: R, name: &str) -> Self {
        Self {
            inner,
            path: name.to_string(),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N], LutError> {
        let mut buf = [0u8; N];
        self.inner
            .read_exact(&mut buf)
            .map_err(|e| LutError::io(&self.path, e))?;
        Ok(buf)
    }

    pub fn read_i32(&mut self) -> Result<i32, LutError> {
        Ok(i32::from_be_bytes(self.read_array::<4>()?))
    }

    pub fn read_f32(&mut self) -> Result<f32, LutError> {
        Ok(f32::from_be_bytes(self.read_array::<4>()?))
    }

    pub fn read_f64(&mut self) -> Result<f64, LutError> {
        Ok(f64::from_be_bytes(self.read_array::<8>()?))
    }

    /// Reads an element count, rejecting negative values.
    pub fn read_count(&mut self) -> Result<usize, LutError> {
        let n = self.read_i32()?;
        usize::try_from(n)
            .map_err(|_| LutError::format(&self.path, format!("negative element count {}", n)))
    }

    /// Product of header counts, rejecting sizes that overflow `usize`.
    pub fn element_count(&self, counts: &[usize]) -> Result<usize, LutError> {
        counts
            .iter()
            .try_fold(1usize, |acc, &c| acc.checked_mul(c))
            .ok_or_else(|| LutError::format(&self.path, format!("element count {:?} overflows", counts)))
    }

    pub fn read_f32_vec(&mut self, n: usize) -> Result<Vec<f32>, LutError> {
        let mut bytes = vec![0u8; self.element_count(&[n, 4])?];
        self.inner
            .read_exact(&mut bytes)
            .map_err(|e| LutError::io(&self.path, e))?;

        Ok(bytes
            .chunks_exact(4)
            .map(|c| f32::from_be_bytes([c[0], c[1], c[2], c[3]]))
            .collect())
    }

    /// Reads a length-prefixed axis.
    pub fn read_dimension(&mut self) -> Result<Vec<f32>, LutError> {
        let n = self.read_count()?;
        self.read_f32_vec(n)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    /// Big-endian byte builder for synthetic LUT fixtures.
    #[derive(Default)]
    pub struct LutBytes {
        pub bytes: Vec<u8>,
    }

    impl LutBytes {
        pub fn i32(&mut self, v: i32) -> &mut Self {
            self.bytes.extend_from_slice(&v.to_be_bytes());
            self
        }

        pub fn f32(&mut self, v: f32) -> &mut Self {
            self.bytes.extend_from_slice(&v.to_be_bytes());
            self
        }

        pub fn f64(&mut self, v: f64) -> &mut Self {
            self.bytes.extend_from_slice(&v.to_be_bytes());
            self
        }

        pub fn floats(&mut self, values: &[f32]) -> &mut Self {
            for &v in values {
                self.f32(v);
            }
            self
        }

        pub fn dimension(&mut self, values: &[f32]) -> &mut Self {
            self.i32(values.len() as i32);
            self.floats(values)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::LutBytes;
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_reads_big_endian_values() {
        let mut b = LutBytes::default();
        b.i32(-7).f32(1.5).f64(-2.25).dimension(&[0.0, 10.0, 20.0]);

        let mut reader = LutReader::from_reader(Cursor::new(b.bytes), "mem");
        assert_eq!(reader.read_i32().unwrap(), -7);
        assert_eq!(reader.read_f32().unwrap(), 1.5);
        assert_eq!(reader.read_f64().unwrap(), -2.25);
        assert_eq!(reader.read_dimension().unwrap(), vec![0.0, 10.0, 20.0]);
    }

    #[test]
    fn test_short_read_is_an_error() {
        let mut b = LutBytes::default();
        b.i32(4).floats(&[1.0, 2.0]);

        let mut reader = LutReader::from_reader(Cursor::new(b.bytes), "short");
        assert!(matches!(reader.read_dimension(), Err(LutError::Io { .. })));
    }

    #[test]
    fn test_negative_count_is_rejected() {
        let mut b = LutBytes::default();
        b.i32(-1);

        let mut reader = LutReader::from_reader(Cursor::new(b.bytes), "neg");
        assert!(matches!(reader.read_count(), Err(LutError::Format { .. })));
    }

    #[test]
    fn test_element_count_overflow_is_rejected() {
        let reader = LutReader::from_reader(Cursor::new(Vec::new()), "huge");
        assert_eq!(reader.element_count(&[2, 3, 4]).unwrap(), 24);
        assert!(matches!(
            reader.element_count(&[usize::MAX / 2, 3]),
            Err(LutError::Format { .. })
        ));
    }

    #[test]
    fn test_oversized_vector_is_a_format_error() {
        let mut reader = LutReader::from_reader(Cursor::new(Vec::new()), "huge");
        assert!(matches!(
            reader.read_f32_vec(usize::MAX / 2),
            Err(LutError::Format { .. })
        ));
    }
}

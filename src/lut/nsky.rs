use std::io::Read;
use std::path::Path;

use super::error::LutError;
use super::lookup_table::LookupTable;
use super::reader::LutReader;

/// Two diffuse-sky kernel terms are stored per node.
pub const NSKY_VALUES: [f32; 2] = [1.0, 2.0];

/// Axis order of the sky coupling tables.
pub mod axis {
    pub const BROADBAND: usize = 0;
    pub const AOT: usize = 1;
    pub const ELEVATION: usize = 2;
    /// SZA for the downwelling table, VZA for the upwelling one.
    pub const ANGLE: usize = 3;
    pub const VALUE: usize = 4;
}

/// Sky coupling table for diffuse illumination of the BRDF kernels, with the
/// planar kernel constants stored alongside.
#[derive(Debug, Clone)]
pub struct NskyLookupTable {
    lut: LookupTable,
    kpp_vol: f64,
    kpp_geo: f64,
}

impl NskyLookupTable {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, LutError> {
        let mut reader = LutReader::open(path)?;
        Self::read(&mut reader)
    }

    /// Reads angle, elevation and AOT axes, the broadband count, the two
    /// planar kernel constants and then the value cube.
    pub fn read<R: Read>(reader: &mut LutReader<R>) -> Result<Self, LutError> {
        let angle = reader.read_dimension()?;
        let hsf = reader.read_dimension()?;
        let aot = reader.read_dimension()?;

        let n_spec = reader.read_count()?;
        let spec: Vec<f32> = (1..=n_spec).map(|i| i as f32).collect();

        let kpp_vol = reader.read_f64()?;
        let kpp_geo = reader.read_f64()?;

        let n = reader.element_count(&[NSKY_VALUES.len(), angle.len(), hsf.len(), aot.len(), n_spec])?;
        let values = reader.read_f32_vec(n)?;

        let lut = LookupTable::from_f32_axes(values, &[&spec, &aot, &hsf, &angle, &NSKY_VALUES])?;

        log::debug!(
            "Loaded Nsky LUT {}: {} broadbands, kpp_vol={}, kpp_geo={}",
            reader.path(),
            n_spec,
            kpp_vol,
            kpp_geo
        );

        Ok(Self {
            lut,
            kpp_vol,
            kpp_geo,
        })
    }

    pub fn lut(&self) -> &LookupTable {
        &self.lut
    }

    pub fn kpp_vol(&self) -> f64 {
        self.kpp_vol
    }

    pub fn kpp_geo(&self) -> f64 {
        self.kpp_geo
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::super::reader::test_support::LutBytes;

    pub const ANGLE: [f32; 3] = [0.0, 40.0, 80.0];
    pub const HSF: [f32; 2] = [0.0, 6.0];
    pub const AOT: [f32; 2] = [0.05, 2.0];

    /// Nsky table whose values depend only on the broadband and value index:
    /// `offset + 0.1 * band + 0.01 * value`.
    pub fn nsky_lut(n_spec: usize, offset: f32, kpp: (f64, f64)) -> Vec<u8> {
        let mut b = LutBytes::default();
        b.dimension(&ANGLE)
            .dimension(&HSF)
            .dimension(&AOT)
            .i32(n_spec as i32)
            .f64(kpp.0)
            .f64(kpp.1);
        for s in 0..n_spec {
            for _ in 0..AOT.len() {
                for _ in 0..HSF.len() {
                    for _ in 0..ANGLE.len() {
                        for v in 0..2 {
                            b.f32(offset + 0.1 * s as f32 + 0.01 * v as f32);
                        }
                    }
                }
            }
        }
        b.bytes
    }
}

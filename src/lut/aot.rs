use std::io::Read;
use std::path::Path;

use super::error::LutError;
use super::lookup_table::LookupTable;
use super::reader::LutReader;

/// Number of radiative transfer terms stored per node of the AOT LUT.
pub const AOT_PARAMETERS: [f32; 5] = [1.0, 2.0, 3.0, 4.0, 5.0];
/// Number of AOT sensitivity terms stored per node of the Kx LUT.
pub const AOT_KX_PARAMETERS: [f32; 2] = [1.0, 2.0];

/// Axis order of both AOT tables.
pub mod axis {
    pub const WAVELENGTH: usize = 0;
    pub const AOT: usize = 1;
    pub const ELEVATION: usize = 2;
    pub const AZIMUTH: usize = 3;
    pub const SZA: usize = 4;
    pub const VZA: usize = 5;
    pub const PARAMETER: usize = 6;
}

/// Barometric conversion of a surface pressure node (hPa) to elevation (km).
///
/// The fill value -1 is passed through.
pub fn pressure_to_elevation(pressure: f32) -> f32 {
    if pressure == -1.0 {
        return pressure;
    }
    let a = pressure as f64 / 1013.25;
    let b = 1.0 / 5.25588;
    (0.001 * (1.0 - a.powf(b)) / 2.25577e-5) as f32
}

/// Aerosol radiative transfer table: path radiance, total transmission,
/// spherical albedo and the two diffuse ratios per band.
#[derive(Debug, Clone)]
pub struct AotLookupTable {
    lut: LookupTable,
    wavelengths: Vec<f32>,
    solar_irradiance: Vec<f32>,
}

impl AotLookupTable {
    pub fn from_file<P: AsRef<Path>>(path: P, wavelengths: &[f32]) -> Result<Self, LutError> {
        let mut reader = LutReader::open(path)?;
        Self::read(&mut reader, wavelengths)
    }

    pub fn read<R: Read>(reader: &mut LutReader<R>, wavelengths: &[f32]) -> Result<Self, LutError> {
        let vza = reader.read_dimension()?;
        let sza = reader.read_dimension()?;
        let azi = reader.read_dimension()?;
        let hsf: Vec<f32> = reader
            .read_dimension()?
            .into_iter()
            .map(pressure_to_elevation)
            .collect();
        let aot = reader.read_dimension()?;

        let n_par = AOT_PARAMETERS.len();
        let (n_vza, n_sza, n_azi, n_hsf, n_aot) =
            (vza.len(), sza.len(), azi.len(), hsf.len(), aot.len());
        let n_wvl = wavelengths.len();

        let n = reader.element_count(&[n_par, n_vza, n_sza, n_azi, n_hsf, n_aot, n_wvl])?;
        let mut values = vec![0.0f32; n];

        // the azimuth axis is stored descending in the file
        for i_wvl in 0..n_wvl {
            for i_aot in 0..n_aot {
                for i_hsf in 0..n_hsf {
                    for i_azi in 0..n_azi {
                        let i_azi_flipped = n_azi - i_azi - 1;
                        for i_sza in 0..n_sza {
                            for i_vza in 0..n_vza {
                                for i_par in 0..n_par {
                                    let index = i_par
                                        + n_par
                                            * (i_vza
                                                + n_vza
                                                    * (i_sza
                                                        + n_sza
                                                            * (i_azi_flipped
                                                                + n_azi
                                                                    * (i_hsf
                                                                        + n_hsf
                                                                            * (i_aot
                                                                                + n_aot * i_wvl)))));
                                    values[index] = reader.read_f32()?;
                                }
                            }
                        }
                    }
                }
            }
        }

        // wavelengths are taken from the sensor table, skip the stored copy
        reader.read_f32_vec(n_wvl)?;
        let solar_irradiance = reader.read_f32_vec(n_wvl)?;

        let lut = LookupTable::from_f32_axes(
            values,
            &[wavelengths, &aot, &hsf, &azi, &sza, &vza, &AOT_PARAMETERS],
        )?;

        log::debug!(
            "Loaded AOT LUT {}: {} bands, {} aot, {} hsf, {} azi, {} sza, {} vza",
            reader.path(),
            n_wvl,
            n_aot,
            n_hsf,
            n_azi,
            n_sza,
            n_vza
        );

        Ok(Self {
            lut,
            wavelengths: wavelengths.to_vec(),
            solar_irradiance,
        })
    }

    pub fn lut(&self) -> &LookupTable {
        &self.lut
    }

    pub fn wavelengths(&self) -> &[f32] {
        &self.wavelengths
    }

    pub fn solar_irradiance(&self) -> &[f32] {
        &self.solar_irradiance
    }
}

/// Reads the AOT sensitivity table, same axes and elevation conversion as the
/// AOT LUT with a two-entry parameter axis.
pub fn read_aot_kx_lut<R: Read>(
    reader: &mut LutReader<R>,
    wavelengths: &[f32],
) -> Result<LookupTable, LutError> {
    let vza = reader.read_dimension()?;
    let sza = reader.read_dimension()?;
    let azi = reader.read_dimension()?;
    let hsf: Vec<f32> = reader
        .read_dimension()?
        .into_iter()
        .map(pressure_to_elevation)
        .collect();
    let aot = reader.read_dimension()?;

    let n = reader.element_count(&[
        AOT_KX_PARAMETERS.len(),
        vza.len(),
        sza.len(),
        azi.len(),
        hsf.len(),
        aot.len(),
        wavelengths.len(),
    ])?;
    let values = reader.read_f32_vec(n)?;

    LookupTable::from_f32_axes(
        values,
        &[wavelengths, &aot, &hsf, &azi, &sza, &vza, &AOT_KX_PARAMETERS],
    )
}

pub fn aot_kx_lut_from_file<P: AsRef<Path>>(
    path: P,
    wavelengths: &[f32],
) -> Result<LookupTable, LutError> {
    let mut reader = LutReader::open(path)?;
    read_aot_kx_lut(&mut reader, wavelengths)
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use approx::assert_abs_diff_eq;
    use std::io::Cursor;

    #[test]
    fn test_pressure_to_elevation() {
        assert_abs_diff_eq!(pressure_to_elevation(1013.25), 0.0, epsilon = 1e-6);
        assert_abs_diff_eq!(pressure_to_elevation(898.75), 1.0, epsilon = 1e-3);
        assert_eq!(pressure_to_elevation(-1.0), -1.0);
        assert!(pressure_to_elevation(500.0) > pressure_to_elevation(700.0));
    }

    #[test]
    fn test_azimuth_axis_is_flipped() {
        let wvl = [442.0, 865.0];
        let bytes = counting_aot_lut(wvl.len());
        let mut reader = LutReader::from_reader(Cursor::new(bytes), "aot");
        let aot_lut = AotLookupTable::read(&mut reader, &wvl).unwrap();
        let lut = aot_lut.lut();

        // file counter strides: wvl 160, aot 80, hsf 40, azi 20, sza 10, vza 5, param 1
        // node azi=0 sits at file azimuth index 1
        let v = lut.value(&[442.0, 0.05, 0.0, 0.0, 0.0, 0.0, 1.0]);
        assert_abs_diff_eq!(v, 20.0, epsilon = 1e-9);

        let v = lut.value(&[442.0, 0.05, 0.0, 180.0, 0.0, 0.0, 1.0]);
        assert_abs_diff_eq!(v, 0.0, epsilon = 1e-9);

        let v = lut.value(&[865.0, 2.0, lut.dimension(2).max(), 0.0, 70.0, 60.0, 5.0]);
        assert_abs_diff_eq!(v, 160.0 + 80.0 + 40.0 + 20.0 + 10.0 + 5.0 + 4.0, epsilon = 1e-9);
    }

    #[test]
    fn test_trailer_and_axes() {
        let wvl = [442.0, 865.0];
        let bytes = counting_aot_lut(wvl.len());
        let mut reader = LutReader::from_reader(Cursor::new(bytes), "aot");
        let aot_lut = AotLookupTable::read(&mut reader, &wvl).unwrap();

        assert_eq!(aot_lut.solar_irradiance(), &[1800.0, 1799.0]);
        assert_eq!(aot_lut.wavelengths(), &wvl);

        let lut = aot_lut.lut();
        assert_eq!(lut.dimension_count(), 7);
        assert_abs_diff_eq!(lut.dimension(axis::ELEVATION).min(), 0.0, epsilon = 1e-6);
        assert_abs_diff_eq!(lut.dimension(axis::ELEVATION).max(), 5.57, epsilon = 0.01);
        assert_eq!(lut.dimension(axis::VZA).max(), 60.0);
        assert_eq!(lut.dimension(axis::SZA).max(), 70.0);
        assert_eq!(lut.dimension(axis::PARAMETER).cardinality(), 5);
    }

    #[test]
    fn test_truncated_file_fails() {
        let wvl = [442.0, 865.0];
        let mut bytes = counting_aot_lut(wvl.len());
        bytes.truncate(bytes.len() - 8);
        let mut reader = LutReader::from_reader(Cursor::new(bytes), "aot");
        assert!(AotLookupTable::read(&mut reader, &wvl).is_err());
    }

    #[test]
    fn test_kx_lut_is_row_major() {
        let wvl = [442.0, 865.0];
        let bytes = constant_aot_kx_lut(wvl.len(), [0.25, -0.5]);
        let mut reader = LutReader::from_reader(Cursor::new(bytes), "kx");
        let lut = read_aot_kx_lut(&mut reader, &wvl).unwrap();

        assert_eq!(lut.dimension_count(), 7);
        assert_abs_diff_eq!(
            lut.value(&[600.0, 0.3, 1.0, 45.0, 10.0, 20.0, 1.0]),
            0.25,
            epsilon = 1e-6
        );
        assert_abs_diff_eq!(
            lut.value(&[600.0, 0.3, 1.0, 45.0, 10.0, 20.0, 2.0]),
            -0.5,
            epsilon = 1e-6
        );
    }
}

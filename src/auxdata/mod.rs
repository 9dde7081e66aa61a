pub mod error;
pub mod n2b;

use std::path::{Path, PathBuf};

pub use error::AuxdataError;
pub use n2b::{N2bCoefficients, N_SPC};

use crate::lut::aot::{self, AotLookupTable};
use crate::lut::nsky;
use crate::lut::{FracIndex, GasLookupTable, LookupTable, NskyLookupTable};
use crate::sensor::Sensor;

/// Lowest elevation (km) accepted for a pixel.
pub const HSF_MIN: f64 = 0.001;

/// Number of atmospheric terms returned per band by
/// [`BbdrAuxdata::interpol_lut_momo_kx`].
pub const N_ATMOS_TERMS: usize = 7;

/// Validity domain of the atmospheric correction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DomainBounds {
    pub vza_min: f64,
    pub vza_max: f64,
    pub sza_min: f64,
    pub sza_max: f64,
    pub aot_min: f64,
    pub aot_max: f64,
    pub hsf_min: f64,
    pub hsf_max: f64,
}

impl DomainBounds {
    pub fn contains(&self, vza: f64, sza: f64, aot: f64, hsf: f64) -> bool {
        (self.vza_min..=self.vza_max).contains(&vza)
            && (self.sza_min..=self.sza_max).contains(&sza)
            && (self.aot_min..=self.aot_max).contains(&aot)
            && (self.hsf_min..=self.hsf_max).contains(&hsf)
    }
}

/// Kinds of binary LUT stored per instrument.
#[derive(Debug, Clone, Copy)]
pub enum LutKind {
    Aot,
    AotKx,
    Gas,
    GasKx,
    NskyDw,
    NskyUp,
}

impl LutKind {
    fn suffix(&self) -> &'static str {
        match self {
            LutKind::Aot => "aot",
            LutKind::AotKx => "aot_kx",
            LutKind::Gas => "gas",
            LutKind::GasKx => "gas_kx",
            LutKind::NskyDw => "nsky_dw",
            LutKind::NskyUp => "nsky_up",
        }
    }
}

/// `<lut_root>/<INST>/<INST>_<kind>.bin`
pub fn lut_path(lut_root: &Path, instrument: &str, kind: LutKind) -> PathBuf {
    lut_root
        .join(instrument)
        .join(format!("{}_{}.bin", instrument, kind.suffix()))
}

/// Every table the per-pixel algorithm needs for one sensor.
///
/// Built once before processing and shared read-only between workers.
#[derive(Debug)]
pub struct BbdrAuxdata {
    sensor: Sensor,
    aot_lut: AotLookupTable,
    aot_kx_lut: LookupTable,
    gas_lut: GasLookupTable,
    nsky_dw: NskyLookupTable,
    nsky_up: NskyLookupTable,
    n2b: N2bCoefficients,
    bounds: DomainBounds,
    ozone_mean: f64,
}

impl BbdrAuxdata {
    /// Loads all LUTs and N2B tables of `sensor` below `lut_root`.
    ///
    /// `ozone_mean` is used as gas reference for sensors with per-pixel CWV.
    pub fn load(lut_root: &Path, sensor: Sensor, ozone_mean: f64) -> Result<Self, AuxdataError> {
        let params = sensor.params();
        let instrument = params.lut_instrument;
        let wavelengths = params.wavelengths;
        log::info!(
            "Loading auxiliary data for {} from {}",
            sensor,
            lut_root.join(instrument).display()
        );

        let aot_lut = AotLookupTable::from_file(lut_path(lut_root, instrument, LutKind::Aot), wavelengths)?;
        let aot_kx_lut =
            aot::aot_kx_lut_from_file(lut_path(lut_root, instrument, LutKind::AotKx), wavelengths)?;
        let gas_lut = GasLookupTable::from_files(
            lut_path(lut_root, instrument, LutKind::Gas),
            lut_path(lut_root, instrument, LutKind::GasKx),
            wavelengths.len(),
            params.gas_strategy,
            sensor.gas_reference(ozone_mean),
        )?;
        let nsky_dw = NskyLookupTable::from_file(lut_path(lut_root, instrument, LutKind::NskyDw))?;
        let nsky_up = NskyLookupTable::from_file(lut_path(lut_root, instrument, LutKind::NskyUp))?;
        let n2b = N2bCoefficients::load(&lut_root.join(instrument), instrument, wavelengths.len())?;

        Self::from_parts(sensor, aot_lut, aot_kx_lut, gas_lut, nsky_dw, nsky_up, n2b, ozone_mean)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn from_parts(
        sensor: Sensor,
        aot_lut: AotLookupTable,
        aot_kx_lut: LookupTable,
        gas_lut: GasLookupTable,
        nsky_dw: NskyLookupTable,
        nsky_up: NskyLookupTable,
        n2b: N2bCoefficients,
        ozone_mean: f64,
    ) -> Result<Self, AuxdataError> {
        let n_bands = sensor.num_bands();
        let lut = aot_lut.lut();

        // the Kx table is evaluated with fractional indices computed on the AOT table
        for d in 0..aot::axis::PARAMETER {
            let (a, k) = (lut.dimension(d).cardinality(), aot_kx_lut.dimension(d).cardinality());
            if a != k {
                return Err(AuxdataError::Inconsistent(format!(
                    "AOT Kx axis {} has {} nodes, AOT LUT has {}",
                    d, k, a
                )));
            }
        }

        for (name, table) in [("downwelling", &nsky_dw), ("upwelling", &nsky_up)] {
            let n = table.lut().dimension(nsky::axis::BROADBAND).cardinality();
            if n != N_SPC {
                return Err(AuxdataError::Inconsistent(format!(
                    "{} Nsky LUT has {} broadbands, expected {}",
                    name, n, N_SPC
                )));
            }
        }

        if n2b.num_bands() != n_bands {
            return Err(AuxdataError::Inconsistent(format!(
                "N2B tables have {} bands, {} has {}",
                n2b.num_bands(),
                sensor,
                n_bands
            )));
        }

        for (i, (stored, table)) in aot_lut
            .solar_irradiance()
            .iter()
            .zip(sensor.params().solar_irradiance)
            .enumerate()
        {
            if (stored - table).abs() > 0.01 * table.abs() {
                log::warn!(
                    "Solar irradiance of band {} differs between AOT LUT ({}) and sensor table ({})",
                    i,
                    stored,
                    table
                );
            }
        }

        let vza = lut.dimension(aot::axis::VZA);
        let sza = lut.dimension(aot::axis::SZA);
        let aot_axis = lut.dimension(aot::axis::AOT);
        let hsf = lut.dimension(aot::axis::ELEVATION);
        let bounds = DomainBounds {
            vza_min: vza.min(),
            vza_max: vza.max(),
            sza_min: sza.min(),
            sza_max: sza.max(),
            aot_min: aot_axis.min(),
            aot_max: aot_axis.max(),
            hsf_min: HSF_MIN,
            hsf_max: hsf.max(),
        };
        log::debug!("Domain bounds for {}: {:?}", sensor, bounds);

        Ok(Self {
            sensor,
            aot_lut,
            aot_kx_lut,
            gas_lut,
            nsky_dw,
            nsky_up,
            n2b,
            bounds,
            ozone_mean,
        })
    }

    pub fn sensor(&self) -> Sensor {
        self.sensor
    }

    pub fn bounds(&self) -> &DomainBounds {
        &self.bounds
    }

    pub fn aot_lut(&self) -> &AotLookupTable {
        &self.aot_lut
    }

    pub fn aot_kx_lut(&self) -> &LookupTable {
        &self.aot_kx_lut
    }

    pub fn gas_lut(&self) -> &GasLookupTable {
        &self.gas_lut
    }

    pub fn n2b(&self) -> &N2bCoefficients {
        &self.n2b
    }

    pub fn kpp_vol(&self) -> f64 {
        self.nsky_dw.kpp_vol()
    }

    pub fn kpp_geo(&self) -> f64 {
        self.nsky_dw.kpp_geo()
    }

    pub fn ozone_mean(&self) -> f64 {
        self.ozone_mean
    }

    /// Atmospheric terms per band at the given geometry:
    /// path radiance, total transmission, spherical albedo, diffuse down and
    /// up ratios from the AOT table, then the two AOT sensitivities.
    pub fn interpol_lut_momo_kx(
        &self,
        vza: f64,
        sza: f64,
        phi: f64,
        hsf: f64,
        aot: f64,
    ) -> Vec<[f64; N_ATMOS_TERMS]> {
        use crate::lut::aot::axis;

        let lut = self.aot_lut.lut();
        let kx_lut = &self.aot_kx_lut;
        let n = lut.dimension_count();
        let mut frac = vec![FracIndex::default(); n];
        let mut vertices = vec![0.0; 1 << n];

        frac[axis::AOT] = LookupTable::compute_frac_index(lut.dimension(axis::AOT), aot);
        frac[axis::ELEVATION] = LookupTable::compute_frac_index(lut.dimension(axis::ELEVATION), hsf);
        frac[axis::AZIMUTH] = LookupTable::compute_frac_index(lut.dimension(axis::AZIMUTH), phi);
        frac[axis::SZA] = LookupTable::compute_frac_index(lut.dimension(axis::SZA), sza);
        frac[axis::VZA] = LookupTable::compute_frac_index(lut.dimension(axis::VZA), vza);

        let wavelengths = lut.dimension(axis::WAVELENGTH);
        (0..wavelengths.cardinality())
            .map(|band| {
                let mut terms = [0.0; N_ATMOS_TERMS];
                frac[axis::WAVELENGTH] =
                    LookupTable::compute_frac_index(wavelengths, wavelengths.get(band));

                let params = lut.dimension(axis::PARAMETER);
                for (j, term) in terms.iter_mut().take(params.cardinality()).enumerate() {
                    frac[axis::PARAMETER] = LookupTable::compute_frac_index(params, params.get(j));
                    *term = lut.value_at(&frac, &mut vertices);
                }

                let kx_params = kx_lut.dimension(axis::PARAMETER);
                let offset = params.cardinality();
                for j in 0..kx_params.cardinality() {
                    frac[axis::PARAMETER] =
                        LookupTable::compute_frac_index(kx_params, kx_params.get(j));
                    terms[offset + j] = kx_lut.value_at(&frac, &mut vertices);
                }
                terms
            })
            .collect()
    }

    /// Sky coupling kernel terms per broadband:
    /// `[dw vol, dw geo, up vol, up geo]`.
    pub fn interpol_lut_nsky(&self, sza: f64, vza: f64, hsf: f64, aot: f64) -> [[f64; 4]; N_SPC] {
        use crate::lut::nsky::axis;

        let dw = self.nsky_dw.lut();
        let up = self.nsky_up.lut();
        let n = dw.dimension_count();
        let mut frac = vec![FracIndex::default(); n];
        let mut vertices = vec![0.0; 1 << n];
        let mut result = [[0.0; 4]; N_SPC];

        frac[axis::AOT] = LookupTable::compute_frac_index(dw.dimension(axis::AOT), aot);
        frac[axis::ELEVATION] = LookupTable::compute_frac_index(dw.dimension(axis::ELEVATION), hsf);

        let broadbands = dw.dimension(axis::BROADBAND);
        for (i, row) in result.iter_mut().enumerate() {
            frac[axis::BROADBAND] = LookupTable::compute_frac_index(broadbands, broadbands.get(i));

            let mut k = 0;
            for (table, angle) in [(dw, sza), (up, vza)] {
                frac[axis::ANGLE] = LookupTable::compute_frac_index(table.dimension(axis::ANGLE), angle);
                let values = table.dimension(axis::VALUE);
                for j in 0..values.cardinality() {
                    frac[axis::VALUE] = LookupTable::compute_frac_index(values, values.get(j));
                    row[k] = table.value_at(&frac, &mut vertices);
                    k += 1;
                }
            }
        }

        result
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::fs;
    use std::path::Path;

    use super::n2b::{self, test_support::table};
    use super::*;
    use crate::lut::aot::test_support::{constant_aot_kx_lut, constant_aot_lut};
    use crate::lut::gas::test_support::{gas_kx_lut, gas_lut};
    use crate::lut::nsky::test_support::nsky_lut;

    /// Atmospheric terms written to the synthetic AOT tables.
    pub const AOT_TERMS: [f32; 5] = [0.01, 0.8, 0.1, 0.3, 0.2];
    pub const AOT_KX_TERMS: [f32; 2] = [0.02, -0.01];
    pub const GAS_KX: [[f32; 2]; 2] = [[0.001, 0.002], [0.003, -0.004]];
    pub const KPP: (f64, f64) = (0.2, -1.3);

    /// Writes a complete synthetic auxiliary data set for `sensor` below `root`.
    pub fn write_auxdata(root: &Path, sensor: Sensor) {
        let params = sensor.params();
        let inst = params.lut_instrument;
        let n = params.wavelengths.len();
        fs::create_dir_all(root.join(inst)).unwrap();

        fs::write(lut_path(root, inst, LutKind::Aot), constant_aot_lut(n, AOT_TERMS)).unwrap();
        fs::write(lut_path(root, inst, LutKind::AotKx), constant_aot_kx_lut(n, AOT_KX_TERMS)).unwrap();
        fs::write(lut_path(root, inst, LutKind::Gas), gas_lut(n)).unwrap();
        fs::write(lut_path(root, inst, LutKind::GasKx), gas_kx_lut(n, Some(GAS_KX))).unwrap();
        fs::write(lut_path(root, inst, LutKind::NskyDw), nsky_lut(3, 0.5, KPP)).unwrap();
        fs::write(lut_path(root, inst, LutKind::NskyUp), nsky_lut(3, 0.7, KPP)).unwrap();

        let uniform = vec![1.0 / n as f64; n];
        let weights = [uniform.clone(), uniform.clone(), uniform];
        fs::write(
            root.join(inst).join(n2b::rmse_file_name(inst)),
            table(&weights, [0.01, 0.02, 0.03], Some([0.01, 0.02, 0.03])),
        )
        .unwrap();
        fs::write(
            root.join(inst).join(n2b::ddw_dup_file_name(inst)),
            table(&weights, [0.0, 0.0, 0.0], None),
        )
        .unwrap();
    }

    pub fn load_auxdata(sensor: Sensor) -> BbdrAuxdata {
        let dir = tempfile::tempdir().unwrap();
        write_auxdata(dir.path(), sensor);
        BbdrAuxdata::load(dir.path(), sensor, 0.3).unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_lut_path_layout() {
        let p = lut_path(Path::new("/aux"), "VGT", LutKind::NskyUp);
        assert_eq!(p, PathBuf::from("/aux/VGT/VGT_nsky_up.bin"));
    }

    #[test]
    fn test_bounds_follow_lut_axes() {
        let aux = load_auxdata(Sensor::ProbaV);
        let b = aux.bounds();
        assert_eq!((b.vza_min, b.vza_max), (0.0, 60.0));
        assert_eq!((b.sza_min, b.sza_max), (0.0, 70.0));
        assert_abs_diff_eq!(b.aot_min, 0.05, epsilon = 1e-6);
        assert_abs_diff_eq!(b.aot_max, 2.0, epsilon = 1e-6);
        assert_eq!(b.hsf_min, HSF_MIN);
        assert_abs_diff_eq!(b.hsf_max, 5.57, epsilon = 0.01);

        assert!(b.contains(30.0, 30.0, 0.2, 0.5));
        assert!(!b.contains(61.0, 30.0, 0.2, 0.5));
        assert!(!b.contains(30.0, 30.0, 0.2, 0.0));
    }

    #[test]
    fn test_momo_kx_terms_per_band() {
        let aux = load_auxdata(Sensor::ProbaV);
        let terms = aux.interpol_lut_momo_kx(20.0, 35.0, 90.0, 0.5, 0.3);
        assert_eq!(terms.len(), 4);
        for band in &terms {
            for (t, e) in band.iter().zip(AOT_TERMS.iter().chain(AOT_KX_TERMS.iter())) {
                assert_abs_diff_eq!(*t, *e as f64, epsilon = 1e-6);
            }
        }
    }

    #[test]
    fn test_nsky_terms_per_broadband() {
        let aux = load_auxdata(Sensor::ProbaV);
        let nsky = aux.interpol_lut_nsky(35.0, 20.0, 0.5, 0.3);
        assert_abs_diff_eq!(nsky[0][0], 0.5, epsilon = 1e-6);
        assert_abs_diff_eq!(nsky[0][1], 0.51, epsilon = 1e-6);
        assert_abs_diff_eq!(nsky[1][2], 0.8, epsilon = 1e-6);
        assert_abs_diff_eq!(nsky[2][3], 0.91, epsilon = 1e-6);
        assert_eq!(aux.kpp_vol(), KPP.0);
        assert_eq!(aux.kpp_geo(), KPP.1);
    }

    #[test]
    fn test_missing_lut_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        write_auxdata(dir.path(), Sensor::Avhrr);
        std::fs::remove_file(lut_path(dir.path(), "AVHRR", LutKind::GasKx)).unwrap();
        let result = BbdrAuxdata::load(dir.path(), Sensor::Avhrr, 0.3);
        assert!(matches!(result, Err(AuxdataError::Lut(_))));
    }

    #[test]
    fn test_sensors_sharing_lut_instrument() {
        let dir = tempfile::tempdir().unwrap();
        write_auxdata(dir.path(), Sensor::Vgt);
        // PROBAV shares the VGT tables, AATSR has its own and is absent
        assert!(BbdrAuxdata::load(dir.path(), Sensor::ProbaV, 0.3).is_ok());
        assert!(BbdrAuxdata::load(dir.path(), Sensor::Aatsr, 0.3).is_err());
    }
}

use std::f64::consts::PI;

use ndarray::Array1;

use super::covariance::{self, ErrorTerms, SqrtPolicy};
use super::kernels::{self, DiffuseRatios, Kernels};
use super::pixel::{BbdrOutput, PixelInput, SdrOutput, SdrPixelInput, Status};
use crate::auxdata::{BbdrAuxdata, N_SPC};
use crate::lut::gas::CWV_REFERENCE;
use crate::sensor::{GasValues, OZO_CONSTANT_VALUE, Sensor, SensorParams};

/// Viewing geometry of a pixel that passed the domain check.
#[derive(Debug, Clone, Copy)]
struct Geometry {
    vza: f64,
    sza: f64,
    /// Relative azimuth folded into `[1, 179]`.
    phi: f64,
    /// Elevation in km.
    hsf: f64,
    aot: f64,
    mus: f64,
    amf: f64,
}

/// Atmospheric correction of one pixel up to the SDR error matrix.
struct Retrieval {
    sdr: Array1<f64>,
    errors: ErrorTerms,
    diffuse: DiffuseRatios,
}

/// A zero or NaN reflectance in any band.
fn has_bad_toa(toa: &[f64]) -> bool {
    toa.iter().any(|&t| t == 0.0 || t.is_nan())
}

/// Relative azimuth in `[1, 179]` degrees.
pub fn relative_azimuth(saa: f64, vaa: f64) -> f64 {
    let mut phi = (saa - vaa).abs();
    if phi > 180.0 {
        phi = 360.0 - phi;
    }
    phi.clamp(1.0, 179.0)
}

/// Per-pixel SDR and BBDR retrieval for one sensor.
///
/// Holds only shared references, so one processor serves all worker threads.
#[derive(Debug, Clone, Copy)]
pub struct BbdrProcessor<'a> {
    aux: &'a BbdrAuxdata,
    sensor: Sensor,
    params: &'static SensorParams,
    sqrt_policy: SqrtPolicy,
}

impl<'a> BbdrProcessor<'a> {
    pub fn new(aux: &'a BbdrAuxdata, sqrt_policy: SqrtPolicy) -> Self {
        let sensor = aux.sensor();
        Self {
            aux,
            sensor,
            params: sensor.params(),
            sqrt_policy,
        }
    }

    pub fn sensor(&self) -> Sensor {
        self.sensor
    }

    /// Converts angles and elevation and checks them against the LUT domain.
    fn geometry(&self, vza: f64, vaa: f64, sza: f64, saa: f64, dem: f64, aot: f64) -> Option<Geometry> {
        let (vza, sza) = if self.params.elevation_geometry {
            (90.0 - vza, 90.0 - sza)
        } else {
            (vza, sza)
        };

        let bounds = self.aux.bounds();
        let mut hsf = dem * 0.001;
        if (-0.45..=0.0).contains(&hsf) {
            hsf = bounds.hsf_min;
        }

        if !bounds.contains(vza, sza, aot, hsf) {
            return None;
        }

        let muv = vza.to_radians().cos();
        let mus = sza.to_radians().cos();

        Some(Geometry {
            vza,
            sza,
            phi: relative_azimuth(saa, vaa),
            hsf,
            aot,
            mus,
            amf: 1.0 / muv + 1.0 / mus,
        })
    }

    /// TOA to SDR inversion with all per-band error contributions.
    fn retrieve(&self, geom: &Geometry, input: &PixelInput) -> Retrieval {
        let params = self.params;
        let n = self.sensor.num_bands();
        let gas = self.sensor.gas_values(input.ozone, input.cwv, self.aux.ozone_mean());

        let gas_lut = self.aux.gas_lut();
        let tg = gas_lut.tg(geom.amf as f32, gas.gas as f32);
        let kx_tg = gas_lut.kx_tg(geom.amf as f32, gas.gas as f32);
        let atmos = self
            .aux
            .interpol_lut_momo_kx(geom.vza, geom.sza, geom.phi, geom.hsf, geom.aot);

        let mut sdr = Array1::zeros(n);
        let mut toa = Array1::zeros(n);
        let mut diffuse = DiffuseRatios {
            rat_tdw: Array1::zeros(n),
            rat_tup: Array1::zeros(n),
            sab: Array1::zeros(n),
        };

        for i in 0..n {
            let f = &atmos[i];
            let mut toa_i = input.toa[i] / params.cal2meris[i];
            if params.elevation_geometry {
                // AATSR reflectances are given in percent of the unit-sun flux
                toa_i *= 0.01 / geom.mus;
            }
            toa_i /= tg[i];

            let rpw = f[0] * PI / geom.mus;
            let ttot = f[1] / geom.mus;
            let x = (toa_i - rpw) / ttot;

            toa[i] = toa_i;
            sdr[i] = x / (1.0 + f[2] * x);
            diffuse.sab[i] = f[2];
            diffuse.rat_tdw[i] = 1.0 - f[3];
            diffuse.rat_tup[i] = 1.0 - f[4];
        }

        let errors = self.error_terms(&atmos, &kx_tg, &gas, &sdr, &toa, input.aot_err, input.toa_var);
        Retrieval { sdr, errors, diffuse }
    }

    #[allow(clippy::too_many_arguments)]
    fn error_terms(
        &self,
        atmos: &[[f64; 7]],
        kx_tg: &[[[f64; 2]; 2]],
        gas: &GasValues,
        sdr: &Array1<f64>,
        toa: &Array1<f64>,
        aot_err: f64,
        toa_var: &[f64],
    ) -> ErrorTerms {
        let params = self.params;
        let delta_cwv = params.cwv_error * gas.cwv;
        let delta_ozo = params.ozo_error * gas.ozo;
        let mut errors = ErrorTerms::zeros(sdr.len());

        for i in 0..sdr.len() {
            let (f, kx, s) = (&atmos[i], &kx_tg[i], sdr[i]);
            errors.rad[i] = params.radiometric_error * toa[i];
            errors.aod[i] = ((f[5] + f[6] * s) * aot_err).abs();
            errors.cwv[i] = ((kx[0][0] + kx[0][1] * s) * delta_cwv).abs();
            errors.ozo[i] = ((kx[1][0] + kx[1][1] * s) * delta_ozo).abs();
            errors.coreg[i] = toa_var[i] * params.err_coreg_scale;
        }

        errors
    }

    /// `(ndvi, sig_ndvi)` from the SDR and its error matrix diagonal.
    fn ndvi(&self, sdr: &Array1<f64>, sigma_diag: &Array1<f64>) -> (f64, f64) {
        let p = self.params;
        let (red, nir) = (sdr[p.index_red], sdr[p.index_nir]);
        let norm = 1.0 / (nir + red);
        let ndvi = (p.bndvi * nir - p.andvi * red) * norm;

        let s = p.andvi + p.bndvi;
        let sig = ((s * nir * sigma_diag[p.index_red].sqrt() * norm * norm).powi(2)
            + (s * red * sigma_diag[p.index_nir].sqrt() * norm * norm).powi(2))
        .sqrt();
        (ndvi, sig)
    }

    /// Spectral SDR only, the first half of [`Self::compute_bbdr`].
    pub fn compute_sdr(&self, input: &PixelInput) -> SdrOutput {
        let n = self.sensor.num_bands();
        if !input.land {
            return SdrOutput::no_data(n);
        }
        let Some(geom) = self.geometry(input.vza, input.vaa, input.sza, input.saa, input.dem, input.aot)
        else {
            return SdrOutput::no_data(n);
        };

        let retrieval = self.retrieve(&geom, input);
        let sigma = retrieval.errors.covariance();
        let Some(sdr_error) = covariance::rectangular_diagonal_flat(&sigma) else {
            return SdrOutput::no_data(n);
        };
        let (ndvi, _) = self.ndvi(&retrieval.sdr, &sdr_error);

        // bad TOA flags the pixel but keeps what was computed
        let status = if has_bad_toa(input.toa) {
            Status::Invalid
        } else {
            Status::land_or_snow(input.snow)
        };

        SdrOutput {
            sdr: retrieval.sdr.to_vec(),
            sdr_error: sdr_error.to_vec(),
            ndvi,
            aot: input.aot,
            status,
        }
    }

    /// Full BBDR retrieval of a TOA pixel.
    pub fn compute_bbdr(&self, input: &PixelInput) -> BbdrOutput {
        if !input.land || has_bad_toa(input.toa) {
            return BbdrOutput::no_data();
        }
        let Some(geom) = self.geometry(input.vza, input.vaa, input.sza, input.saa, input.dem, input.aot)
        else {
            return BbdrOutput::no_data();
        };

        let retrieval = self.retrieve(&geom, input);
        self.broadband(&geom, &retrieval, input.aot_err, input.snow, self.sqrt_policy)
    }

    /// BBDR from an existing SDR product.
    ///
    /// Gas amounts are fixed, the TOA reflectance needed for the radiometric
    /// error is recomputed from the SDR and the error square root always takes
    /// the magnitude. Fill values in the SDR make the pixel INVALID.
    pub fn compute_bbdr_from_sdr(&self, input: &SdrPixelInput) -> BbdrOutput {
        if !input.status.is_retrievable() || !input.sdr.iter().all(|&v| covariance::is_valid(v)) {
            return BbdrOutput::no_data();
        }
        let Some(geom) = self.geometry(input.vza, input.vaa, input.sza, input.saa, input.dem, input.aot)
        else {
            return BbdrOutput::no_data();
        };

        let n = self.sensor.num_bands();
        let gas = GasValues {
            ozo: OZO_CONSTANT_VALUE,
            cwv: CWV_REFERENCE as f64,
            gas: OZO_CONSTANT_VALUE,
        };
        let kx_tg = self.aux.gas_lut().kx_tg(geom.amf as f32, gas.gas as f32);
        let atmos = self
            .aux
            .interpol_lut_momo_kx(geom.vza, geom.sza, geom.phi, geom.hsf, geom.aot);

        let sdr = Array1::from_iter(input.sdr.iter().copied());
        let mut toa = Array1::zeros(n);
        let mut diffuse = DiffuseRatios {
            rat_tdw: Array1::zeros(n),
            rat_tup: Array1::zeros(n),
            sab: Array1::zeros(n),
        };

        for i in 0..n {
            let f = &atmos[i];
            let rpw = f[0] * PI / geom.mus;
            let ttot = f[1] / geom.mus;
            let (s, sab) = (sdr[i], f[2]);

            toa[i] = (rpw + ttot * s - sab * rpw * s) / (1.0 - sab * s);
            diffuse.sab[i] = sab;
            diffuse.rat_tdw[i] = 1.0 - f[3];
            diffuse.rat_tup[i] = 1.0 - f[4];
        }

        let errors = self.error_terms(&atmos, &kx_tg, &gas, &sdr, &toa, input.aot_err, input.toa_var);
        let retrieval = Retrieval { sdr, errors, diffuse };
        self.broadband(&geom, &retrieval, input.aot_err, input.snow, SqrtPolicy::Abs)
    }

    /// NDVI, narrowband to broadband conversion and kernels.
    fn broadband(
        &self,
        geom: &Geometry,
        retrieval: &Retrieval,
        aot_err: f64,
        snow: bool,
        policy: SqrtPolicy,
    ) -> BbdrOutput {
        let n2b = self.aux.n2b();
        let sigma_sdr = retrieval.errors.covariance();
        let Some(sigma_diag) = covariance::rectangular_diagonal_flat(&sigma_sdr) else {
            return BbdrOutput::no_data();
        };
        let (ndvi, sig_ndvi) = self.ndvi(&retrieval.sdr, &sigma_diag);

        let bbdr = n2b.coef.dot(&retrieval.sdr) + &n2b.intercept;
        let sigma_bbdr = covariance::propagate(n2b, &sigma_sdr);
        let sig_bbdr = covariance::extract_errors(&sigma_bbdr, policy);

        let base = kernels::brdf_kernels(geom.vza, geom.sza, geom.phi);
        let weighted: [Kernels; N_SPC] = if self.params.nsky_coupling {
            let nsky = self.aux.interpol_lut_nsky(geom.sza, geom.vza, geom.hsf, geom.aot);
            kernels::nsky_weighted_kernels(
                base,
                n2b,
                &retrieval.diffuse,
                bbdr[0],
                &nsky,
                (self.aux.kpp_vol(), self.aux.kpp_geo()),
            )
        } else {
            [base; N_SPC]
        };

        BbdrOutput {
            bbdr: [bbdr[0], bbdr[1], bbdr[2]],
            sig_bbdr,
            kernels: weighted.map(|k| (k.kvol, k.kgeo)),
            ndvi,
            sig_ndvi,
            vza: geom.vza,
            sza: geom.sza,
            raa: geom.phi,
            dem: geom.hsf,
            snow_mask: if snow { 1.0 } else { 0.0 },
            aod: geom.aot,
            sig_aod: aot_err,
            status: Status::land_or_snow(snow),
        }
    }
}

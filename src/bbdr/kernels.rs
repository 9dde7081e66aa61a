use std::f64::consts::{FRAC_PI_2, FRAC_PI_4, PI};

use ndarray::Array1;

use crate::auxdata::{N2bCoefficients, N_SPC};

/// Crown height to width ratio of the geometric kernel.
pub const HB: f64 = 2.0;

/// Volumetric and geometric BRDF kernel pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Kernels {
    pub kvol: f64,
    pub kgeo: f64,
}

/// Ross-thick volumetric and Li-sparse geometric kernels; angles in degrees.
pub fn brdf_kernels(vza: f64, sza: f64, phi: f64) -> Kernels {
    let (vza_r, sza_r, phi_r) = (vza.to_radians(), sza.to_radians(), phi.to_radians());
    let muv = vza_r.cos();
    let mus = sza_r.cos();
    let mu_phi = phi_r.cos();

    let mu_ph_ang = mus * muv + vza_r.sin() * sza_r.sin() * mu_phi;
    // rounding may push the cosine just past one
    let ph_ang = mu_ph_ang.clamp(-1.0, 1.0).acos();

    let kvol = ((FRAC_PI_2 - ph_ang) * ph_ang.cos() + ph_ang.sin()) / (mus + muv) - FRAC_PI_4;

    let tan_v = vza_r.tan();
    let tan_s = sza_r.tan();
    let sec_v = 1.0 / muv;
    let sec_s = 1.0 / mus;

    let d2 = tan_v * tan_v + tan_s * tan_s - 2.0 * tan_v * tan_s * mu_phi;
    let cost = (HB * (d2 + (tan_v * tan_s * phi_r.sin()).powi(2)).sqrt() / (sec_v + sec_s)).min(1.0);
    let t = cost.acos();
    let overlap = (t - t.sin() * cost) * (sec_v + sec_s) / PI;

    let kgeo = 0.5 * (1.0 + mu_ph_ang) * sec_s * sec_v + overlap - sec_v - sec_s;

    Kernels { kvol, kgeo }
}

/// Per-band diffuse terms from the AOT LUT used to weight the kernels.
#[derive(Debug, Clone)]
pub struct DiffuseRatios {
    pub rat_tdw: Array1<f64>,
    pub rat_tup: Array1<f64>,
    pub sab: Array1<f64>,
}

/// Kernels per broadband weighted with the diffuse sky contribution.
///
/// `nsky[i]` holds `[dw vol, dw geo, up vol, up geo]` of broadband `i`.
pub fn nsky_weighted_kernels(
    kernels: Kernels,
    n2b: &N2bCoefficients,
    diffuse: &DiffuseRatios,
    bbdr_vis: f64,
    nsky: &[[f64; 4]; N_SPC],
    kpp: (f64, f64),
) -> [Kernels; N_SPC] {
    std::array::from_fn(|i| {
        let coef = n2b.coef_d.row(i);
        let c = n2b.intercept_d[i];
        let rat_tdw = coef.dot(&diffuse.rat_tdw) + c;
        let rat_tup = coef.dot(&diffuse.rat_tup) + c;

        // 1 / (1 - delta) = (1 - rho * S)^2
        let dinv = (1.0 - bbdr_vis * (coef.dot(&diffuse.sab) + c)).powi(2);

        let t0 = (1.0 - rat_tdw) * (1.0 - rat_tup) * dinv;
        let t1 = (1.0 - rat_tdw) * rat_tup * dinv;
        let t2 = rat_tdw * (1.0 - rat_tup) * dinv;
        let t3 = (rat_tdw * rat_tup - (1.0 - 1.0 / dinv)) * dinv;

        Kernels {
            kvol: t0 * kernels.kvol + t1 * nsky[i][0] + t2 * nsky[i][2] + t3 * kpp.0,
            kgeo: t0 * kernels.kgeo + t1 * nsky[i][1] + t2 * nsky[i][3] + t3 * kpp.1,
        }
    })
}

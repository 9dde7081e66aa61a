use std::io::Read;
use std::path::Path;

use super::error::LutError;
use super::reader::LutReader;

/// Reference water vapour column used when CWV is not measured per pixel.
pub const CWV_REFERENCE: f32 = 1.5;

const N_KX_CASE: usize = 2;
const N_KX: usize = 2;

/// Which gas varies per pixel; the other one is fixed at a reference value
/// when the table is loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GasStrategy {
    /// Ozone per pixel, CWV resolved at [`CWV_REFERENCE`].
    OzonePerPixel,
    /// CWV per pixel, ozone resolved at an image mean.
    CwvPerPixel,
}

/// First index `i` with `value < array[i]`, minus one (never below zero).
/// Values beyond the last node return `len - 2`.
pub fn index_before(value: f32, array: &[f32]) -> usize {
    for (i, &node) in array.iter().enumerate() {
        if value < node {
            return i.saturating_sub(1);
        }
    }
    array.len() - 2
}

/// Geometric air mass factor of a zenith angle node: `2 / cos(ang)`.
pub fn angles_to_amf(angles: &[f32]) -> Vec<f32> {
    angles
        .iter()
        .map(|&ang| (2.0 / (ang as f64).to_radians().cos()) as f32)
        .collect()
}

/// Gas transmission table reduced to `(air mass factor, gas)` per band.
#[derive(Debug, Clone)]
pub struct GasLookupTable {
    strategy: GasStrategy,
    reference: f32,
    n_wvl: usize,
    amf: Vec<f32>,
    cwv: Vec<f32>,
    ozone: Vec<f32>,
    // [wvl][gas][amf]
    tg: Vec<f32>,
    // [wvl][gas][amf][kxcase][kx]
    kx: Vec<f32>,
}

struct GasAxes {
    ang: Vec<f32>,
    cwv: Vec<f32>,
    ozone: Vec<f32>,
}

impl GasLookupTable {
    pub fn from_files<P: AsRef<Path>>(
        gas_path: P,
        kx_path: P,
        n_wvl: usize,
        strategy: GasStrategy,
        reference: f32,
    ) -> Result<Self, LutError> {
        let mut gas_reader = LutReader::open(gas_path)?;
        let mut kx_reader = LutReader::open(kx_path)?;
        Self::read(&mut gas_reader, &mut kx_reader, n_wvl, strategy, reference)
    }

    /// Loads both gas tables and resolves them at `reference`.
    ///
    /// For [`GasStrategy::OzonePerPixel`] the reference is a CWV value, for
    /// [`GasStrategy::CwvPerPixel`] it is an ozone value.
    pub fn read<R: Read, K: Read>(
        gas_reader: &mut LutReader<R>,
        kx_reader: &mut LutReader<K>,
        n_wvl: usize,
        strategy: GasStrategy,
        reference: f32,
    ) -> Result<Self, LutError> {
        let n_ang = gas_reader.read_count()?;
        let n_cwv = gas_reader.read_count()?;
        let n_ozo = gas_reader.read_count()?;
        let axes = GasAxes {
            ang: gas_reader.read_f32_vec(n_ang)?,
            cwv: gas_reader.read_f32_vec(n_cwv)?,
            ozone: gas_reader.read_f32_vec(n_ozo)?,
        };
        for (name, axis) in [("angle", &axes.ang), ("cwv", &axes.cwv), ("ozone", &axes.ozone)] {
            if axis.len() < 2 {
                return Err(LutError::format(
                    gas_reader.path(),
                    format!("{} axis needs at least 2 nodes", name),
                ));
            }
        }

        // stored with the band index varying fastest
        let mut raw = vec![0.0f32; gas_reader.element_count(&[n_wvl, n_ozo, n_cwv, n_ang])?];
        for i_ang in 0..n_ang {
            for i_cwv in 0..n_cwv {
                for i_ozo in 0..n_ozo {
                    for i_wvl in 0..n_wvl {
                        raw[((i_wvl * n_ozo + i_ozo) * n_cwv + i_cwv) * n_ang + i_ang] =
                            gas_reader.read_f32()?;
                    }
                }
            }
        }

        let kx_raw = Self::read_kx_cube(kx_reader, &axes, n_wvl)?;

        let tg = resolve(&raw, &axes, n_wvl, 1, strategy, reference);
        let kx = resolve(&kx_raw, &axes, n_wvl, N_KX_CASE * N_KX, strategy, reference);

        log::debug!(
            "Loaded gas LUT {}: {} bands, {} angles, {} cwv, {} ozone, {:?} at {}",
            gas_reader.path(),
            n_wvl,
            n_ang,
            n_cwv,
            n_ozo,
            strategy,
            reference
        );

        Ok(Self {
            strategy,
            reference,
            n_wvl,
            amf: angles_to_amf(&axes.ang),
            cwv: axes.cwv,
            ozone: axes.ozone,
            tg,
            kx,
        })
    }

    fn read_kx_cube<K: Read>(
        reader: &mut LutReader<K>,
        axes: &GasAxes,
        n_wvl: usize,
    ) -> Result<Vec<f32>, LutError> {
        let ang = reader.read_dimension()?;
        let cwv = reader.read_dimension()?;
        let ozone = reader.read_dimension()?;
        if ang.len() != axes.ang.len() || cwv.len() != axes.cwv.len() || ozone.len() != axes.ozone.len()
        {
            return Err(LutError::format(
                reader.path(),
                format!(
                    "gas Kx axes {}x{}x{} do not match gas axes {}x{}x{}",
                    ang.len(),
                    cwv.len(),
                    ozone.len(),
                    axes.ang.len(),
                    axes.cwv.len(),
                    axes.ozone.len()
                ),
            ));
        }

        // [wvl][ozo][cwv][ang][kxcase][kx] in file order
        let n = reader.element_count(&[n_wvl, ozone.len(), cwv.len(), ang.len(), N_KX_CASE, N_KX])?;
        reader.read_f32_vec(n)
    }

    pub fn strategy(&self) -> GasStrategy {
        self.strategy
    }

    pub fn reference(&self) -> f32 {
        self.reference
    }

    pub fn amf_array(&self) -> &[f32] {
        &self.amf
    }

    pub fn cwv_array(&self) -> &[f32] {
        &self.cwv
    }

    pub fn ozone_array(&self) -> &[f32] {
        &self.ozone
    }

    /// Nodes of the per-pixel gas axis.
    pub fn gas_array(&self) -> &[f32] {
        match self.strategy {
            GasStrategy::OzonePerPixel => &self.ozone,
            GasStrategy::CwvPerPixel => &self.cwv,
        }
    }

    fn weights(&self, amf: f32, gas: f32) -> (usize, f32, usize, f32) {
        let gas_nodes = self.gas_array();
        let ia = index_before(amf, &self.amf);
        let ap = (amf - self.amf[ia]) / (self.amf[ia + 1] - self.amf[ia]);
        let ig = index_before(gas, gas_nodes);
        let gp = (gas - gas_nodes[ig]) / (gas_nodes[ig + 1] - gas_nodes[ig]);
        (ia, ap, ig, gp)
    }

    /// Gas transmission per band.
    pub fn tg(&self, amf: f32, gas: f32) -> Vec<f64> {
        let (ia, ap, ig, gp) = self.weights(amf, gas);
        let n_gas = self.gas_array().len();
        let n_amf = self.amf.len();
        let at = |w: usize, g: usize, a: usize| self.tg[(w * n_gas + g) * n_amf + a];

        (0..self.n_wvl)
            .map(|w| {
                ((1.0 - ap) * (1.0 - gp) * at(w, ig, ia)
                    + gp * (1.0 - ap) * at(w, ig + 1, ia)
                    + (1.0 - gp) * ap * at(w, ig, ia + 1)
                    + ap * gp * at(w, ig + 1, ia + 1)) as f64
            })
            .collect()
    }

    /// Transmission sensitivities per band: `[cwv | ozone][offset, slope]`.
    pub fn kx_tg(&self, amf: f32, gas: f32) -> Vec<[[f64; N_KX]; N_KX_CASE]> {
        let (ia, ap, ig, gp) = self.weights(amf, gas);
        let n_gas = self.gas_array().len();
        let n_amf = self.amf.len();
        let at = |w: usize, g: usize, a: usize, c: usize, k: usize| {
            self.kx[(((w * n_gas + g) * n_amf + a) * N_KX_CASE + c) * N_KX + k]
        };

        (0..self.n_wvl)
            .map(|w| {
                let mut kx = [[0.0; N_KX]; N_KX_CASE];
                for (c, row) in kx.iter_mut().enumerate() {
                    for (k, value) in row.iter_mut().enumerate() {
                        *value = ((1.0 - ap) * (1.0 - gp) * at(w, ig, ia, c, k)
                            + gp * (1.0 - ap) * at(w, ig + 1, ia, c, k)
                            + (1.0 - gp) * ap * at(w, ig, ia + 1, c, k)
                            + ap * gp * at(w, ig + 1, ia + 1, c, k))
                            as f64;
                    }
                }
                kx
            })
            .collect()
    }
}

/// Collapses a `[wvl][ozo][cwv][ang][inner]` cube to `[wvl][gas][ang][inner]`
/// by linear interpolation of the fixed gas at `reference`.
fn resolve(
    raw: &[f32],
    axes: &GasAxes,
    n_wvl: usize,
    inner: usize,
    strategy: GasStrategy,
    reference: f32,
) -> Vec<f32> {
    let (n_ang, n_cwv, n_ozo) = (axes.ang.len(), axes.cwv.len(), axes.ozone.len());
    let at = |w: usize, o: usize, c: usize, a: usize, k: usize| {
        raw[(((w * n_ozo + o) * n_cwv + c) * n_ang + a) * inner + k]
    };

    let mut out = Vec::new();
    match strategy {
        GasStrategy::OzonePerPixel => {
            let ic = index_before(reference, &axes.cwv);
            let term = (reference - axes.cwv[ic]) / (axes.cwv[ic + 1] - axes.cwv[ic]);
            out.reserve(n_wvl * n_ozo * n_ang * inner);
            for w in 0..n_wvl {
                for o in 0..n_ozo {
                    for a in 0..n_ang {
                        for k in 0..inner {
                            let lo = at(w, o, ic, a, k);
                            out.push(lo + (at(w, o, ic + 1, a, k) - lo) * term);
                        }
                    }
                }
            }
        }
        GasStrategy::CwvPerPixel => {
            let io = index_before(reference, &axes.ozone);
            let term = (reference - axes.ozone[io]) / (axes.ozone[io + 1] - axes.ozone[io]);
            out.reserve(n_wvl * n_cwv * n_ang * inner);
            for w in 0..n_wvl {
                for c in 0..n_cwv {
                    for a in 0..n_ang {
                        for k in 0..inner {
                            let lo = at(w, io, c, a, k);
                            out.push(lo + (at(w, io + 1, c, a, k) - lo) * term);
                        }
                    }
                }
            }
        }
    }
    out
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::super::reader::test_support::LutBytes;

    pub const ANGLES: [f32; 7] = [0.0, 20.0, 40.0, 50.0, 60.0, 65.0, 70.0];
    pub const CWV: [f32; 4] = [0.0, 1.0, 3.0, 5.0];
    pub const OZONE: [f32; 4] = [0.1, 0.3, 0.45, 0.6];

    /// Transmission linear in every axis index and gas value.
    pub fn transmission(w: usize, ozone: f32, cwv: f32, i_ang: usize) -> f32 {
        1.0 - 0.01 * w as f32 - 0.05 * ozone - 0.02 * cwv - 0.003 * i_ang as f32
    }

    pub fn gas_lut(n_wvl: usize) -> Vec<u8> {
        let mut b = LutBytes::default();
        b.i32(ANGLES.len() as i32)
            .i32(CWV.len() as i32)
            .i32(OZONE.len() as i32)
            .floats(&ANGLES)
            .floats(&CWV)
            .floats(&OZONE);
        for a in 0..ANGLES.len() {
            for &c in &CWV {
                for &o in &OZONE {
                    for w in 0..n_wvl {
                        b.f32(transmission(w, o, c, a));
                    }
                }
            }
        }
        b.bytes
    }

    /// Sensitivities constant over the grid: `kx[w][case][k] = w + 10 case + 100 k`
    /// unless `value` is given.
    pub fn gas_kx_lut(n_wvl: usize, value: Option<[[f32; 2]; 2]>) -> Vec<u8> {
        let mut b = LutBytes::default();
        b.dimension(&ANGLES).dimension(&CWV).dimension(&OZONE);
        for w in 0..n_wvl {
            for _ in 0..OZONE.len() {
                for _ in 0..CWV.len() {
                    for _ in 0..ANGLES.len() {
                        for case in 0..2 {
                            for k in 0..2 {
                                let v = match value {
                                    Some(v) => v[case][k],
                                    None => (w + 10 * case + 100 * k) as f32,
                                };
                                b.f32(v);
                            }
                        }
                    }
                }
            }
        }
        b.bytes
    }
}

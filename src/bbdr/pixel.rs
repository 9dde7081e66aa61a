use crate::auxdata::N_SPC;

/// Pixel classification written to the `status` band.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Invalid = 0,
    Land = 1,
    Water = 2,
    Snow = 3,
    Cloud = 4,
    CloudShadow = 5,
    CloudBuffer = 6,
    UclCloud = 10,
}

impl Status {
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(Status::Invalid),
            1 => Some(Status::Land),
            2 => Some(Status::Water),
            3 => Some(Status::Snow),
            4 => Some(Status::Cloud),
            5 => Some(Status::CloudShadow),
            6 => Some(Status::CloudBuffer),
            10 => Some(Status::UclCloud),
            _ => None,
        }
    }

    /// Clear land or snow, the only classes that are retrieved.
    pub fn is_retrievable(self) -> bool {
        matches!(self, Status::Land | Status::Snow)
    }

    pub fn land_or_snow(snow: bool) -> Self {
        if snow { Status::Snow } else { Status::Land }
    }
}

/// One pixel of a TOA product.
///
/// Angles in degrees (elevation angles for AATSR), elevation in metres,
/// TOA reflectance and its local variance per sensor band.
#[derive(Debug, Clone)]
pub struct PixelInput<'a> {
    pub vza: f64,
    pub vaa: f64,
    pub sza: f64,
    pub saa: f64,
    pub dem: f64,
    pub aot: f64,
    pub aot_err: f64,
    /// Ozone in Dobson units, only read for MERIS.
    pub ozone: f64,
    /// Water vapour column, only read for VGT.
    pub cwv: f64,
    pub land: bool,
    pub snow: bool,
    pub toa: &'a [f64],
    pub toa_var: &'a [f64],
}

/// One pixel of an SDR product, input of the BBDR-from-SDR mode.
#[derive(Debug, Clone)]
pub struct SdrPixelInput<'a> {
    pub vza: f64,
    pub vaa: f64,
    pub sza: f64,
    pub saa: f64,
    pub dem: f64,
    pub aot: f64,
    pub aot_err: f64,
    pub snow: bool,
    pub status: Status,
    pub sdr: &'a [f64],
    pub toa_var: &'a [f64],
}

pub const BBDR_BAND_COUNT: usize = 25;

pub const BBDR_BAND_NAMES: [&str; BBDR_BAND_COUNT] = [
    "BB_VIS",
    "BB_NIR",
    "BB_SW",
    "sig_BB_VIS_VIS",
    "sig_BB_VIS_NIR",
    "sig_BB_VIS_SW",
    "sig_BB_NIR_NIR",
    "sig_BB_NIR_SW",
    "sig_BB_SW_SW",
    "Kvol_BRDF_VIS",
    "Kgeo_BRDF_VIS",
    "Kvol_BRDF_NIR",
    "Kgeo_BRDF_NIR",
    "Kvol_BRDF_SW",
    "Kgeo_BRDF_SW",
    "NDVI",
    "sig_NDVI",
    "VZA",
    "SZA",
    "RAA",
    "DEM",
    "snow_mask",
    "AOD550",
    "sig_AOD550",
    "status",
];

/// Per-pixel result of the BBDR retrieval.
#[derive(Debug, Clone, PartialEq)]
pub struct BbdrOutput {
    pub bbdr: [f64; N_SPC],
    /// Upper triangle of the broadband error matrix: VIS-VIS, VIS-NIR, VIS-SW,
    /// NIR-NIR, NIR-SW, SW-SW.
    pub sig_bbdr: [f64; 6],
    /// `(kvol, kgeo)` per broadband.
    pub kernels: [(f64, f64); N_SPC],
    pub ndvi: f64,
    pub sig_ndvi: f64,
    pub vza: f64,
    pub sza: f64,
    pub raa: f64,
    /// Elevation in km.
    pub dem: f64,
    pub snow_mask: f64,
    pub aod: f64,
    pub sig_aod: f64,
    pub status: Status,
}

impl BbdrOutput {
    pub fn no_data() -> Self {
        Self {
            bbdr: [f64::NAN; N_SPC],
            sig_bbdr: [f64::NAN; 6],
            kernels: [(f64::NAN, f64::NAN); N_SPC],
            ndvi: f64::NAN,
            sig_ndvi: f64::NAN,
            vza: f64::NAN,
            sza: f64::NAN,
            raa: f64::NAN,
            dem: f64::NAN,
            snow_mask: f64::NAN,
            aod: f64::NAN,
            sig_aod: f64::NAN,
            status: Status::Invalid,
        }
    }

    /// Values in [`BBDR_BAND_NAMES`] order.
    pub fn values(&self) -> [f64; BBDR_BAND_COUNT] {
        let mut out = [0.0; BBDR_BAND_COUNT];
        out[..3].copy_from_slice(&self.bbdr);
        out[3..9].copy_from_slice(&self.sig_bbdr);
        for (i, (kvol, kgeo)) in self.kernels.iter().enumerate() {
            out[9 + 2 * i] = *kvol;
            out[10 + 2 * i] = *kgeo;
        }
        out[15] = self.ndvi;
        out[16] = self.sig_ndvi;
        out[17] = self.vza;
        out[18] = self.sza;
        out[19] = self.raa;
        out[20] = self.dem;
        out[21] = self.snow_mask;
        out[22] = self.aod;
        out[23] = self.sig_aod;
        out[24] = self.status.code() as f64;
        out
    }
}

/// `sdr_1..n`, `sdr_error_1..n`, `ndvi`, `aot`, `status`.
pub fn sdr_band_names(num_bands: usize) -> Vec<String> {
    let mut names: Vec<String> = (1..=num_bands).map(|i| format!("sdr_{}", i)).collect();
    names.extend((1..=num_bands).map(|i| format!("sdr_error_{}", i)));
    names.extend(["ndvi", "aot", "status"].iter().map(|s| s.to_string()));
    names
}

/// Per-pixel result of the SDR-only mode.
#[derive(Debug, Clone, PartialEq)]
pub struct SdrOutput {
    pub sdr: Vec<f64>,
    /// Diagonal of the SDR error matrix.
    pub sdr_error: Vec<f64>,
    pub ndvi: f64,
    pub aot: f64,
    pub status: Status,
}

impl SdrOutput {
    pub fn no_data(num_bands: usize) -> Self {
        Self {
            sdr: vec![f64::NAN; num_bands],
            sdr_error: vec![f64::NAN; num_bands],
            ndvi: f64::NAN,
            aot: f64::NAN,
            status: Status::Invalid,
        }
    }

    /// Values in [`sdr_band_names`] order.
    pub fn values(&self) -> Vec<f64> {
        let mut out = Vec::with_capacity(2 * self.sdr.len() + 3);
        out.extend_from_slice(&self.sdr);
        out.extend_from_slice(&self.sdr_error);
        out.push(self.ndvi);
        out.push(self.aot);
        out.push(self.status.code() as f64);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(Status::UclCloud.code(), 10);
        assert_eq!(Status::from_code(3), Some(Status::Snow));
        assert_eq!(Status::from_code(7), None);
        assert!(Status::Land.is_retrievable());
        assert!(!Status::Cloud.is_retrievable());
        assert_eq!(Status::land_or_snow(true), Status::Snow);
    }

    #[test]
    fn test_no_data_values() {
        let values = BbdrOutput::no_data().values();
        assert!(values[..24].iter().all(|v| v.is_nan()));
        assert_eq!(values[24], 0.0);
    }

    #[test]
    fn test_bbdr_values_follow_band_order() {
        let mut out = BbdrOutput::no_data();
        out.kernels = [(1.0, 2.0), (3.0, 4.0), (5.0, 6.0)];
        out.raa = 42.0;
        out.status = Status::Snow;
        let values = out.values();

        let at = |name: &str| values[BBDR_BAND_NAMES.iter().position(|n| *n == name).unwrap()];
        assert_eq!(at("Kvol_BRDF_VIS"), 1.0);
        assert_eq!(at("Kgeo_BRDF_NIR"), 4.0);
        assert_eq!(at("Kgeo_BRDF_SW"), 6.0);
        assert_eq!(at("RAA"), 42.0);
        assert_eq!(at("status"), 3.0);
    }

    #[test]
    fn test_sdr_layout() {
        let names = sdr_band_names(2);
        assert_eq!(
            names,
            vec!["sdr_1", "sdr_2", "sdr_error_1", "sdr_error_2", "ndvi", "aot", "status"]
        );

        let out = SdrOutput {
            sdr: vec![0.1, 0.2],
            sdr_error: vec![0.01, 0.02],
            ndvi: 0.3,
            aot: 0.15,
            status: Status::Land,
        };
        assert_eq!(out.values(), vec![0.1, 0.2, 0.01, 0.02, 0.3, 0.15, 1.0]);
        assert_eq!(SdrOutput::no_data(2).values().len(), names.len());
    }
}

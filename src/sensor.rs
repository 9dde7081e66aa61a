use std::fmt::Display;
use std::str::FromStr;

use crate::lut::GasStrategy;
use crate::lut::gas::CWV_REFERENCE;

/// Ozone column (atm-cm) assumed for sensors without an ozone band.
pub const OZO_CONSTANT_VALUE: f64 = 0.32;
/// Upper bound applied to per-pixel water vapour.
pub const CWV_MAX: f64 = 4.45;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sensor {
    Meris,
    Aatsr,
    AatsrFward,
    Vgt,
    ProbaV,
    Avhrr,
}

/// Names of the per-pixel input bands in a product.
#[derive(Debug)]
pub struct BandNames {
    pub vza: &'static str,
    pub vaa: &'static str,
    pub sza: &'static str,
    pub saa: &'static str,
    pub dem: &'static str,
    pub aot: &'static str,
    pub aot_err: &'static str,
    pub ozone: Option<&'static str>,
    pub cwv: Option<&'static str>,
    pub land_mask: &'static str,
    pub snow_mask: &'static str,
    pub toa: &'static [&'static str],
}

#[derive(Debug)]
pub struct SensorParams {
    /// Instrument whose LUTs and N2B tables are used.
    pub lut_instrument: &'static str,
    pub wavelengths: &'static [f32],
    /// Cross calibration to MERIS, divides the TOA reflectance.
    pub cal2meris: &'static [f64],
    pub solar_irradiance: &'static [f32],
    pub index_red: usize,
    pub index_nir: usize,
    pub andvi: f64,
    pub bndvi: f64,
    pub radiometric_error: f64,
    pub cwv_error: f64,
    pub ozo_error: f64,
    pub err_coreg_scale: f64,
    pub land_expr: &'static str,
    pub gas_strategy: GasStrategy,
    /// Weight the BRDF kernels with the sky coupling terms.
    pub nsky_coupling: bool,
    /// Geometry is given as elevation angles and TOA in percent.
    pub elevation_geometry: bool,
    pub bands: BandNames,
}

/// Ozone, water vapour and the gas value used for the transmission lookup.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GasValues {
    pub ozo: f64,
    pub cwv: f64,
    pub gas: f64,
}

const MERIS_WAVELENGTHS: [f32; 15] = [
    412.0, 442.0, 490.0, 510.0, 560.0, 620.0, 665.0, 681.0, 708.0, 753.0, 760.0, 778.0, 865.0,
    885.0, 900.0,
];
const MERIS_SOLAR_IRRADIANCES: [f32; 15] = [
    1714.49, 1879.69, 1929.27, 1928.54, 1803.06, 1650.77, 1531.52, 1472.16, 1407.89, 1266.08,
    1254.74, 1177.28, 958.059, 930.005, 895.347,
];
const MERIS_TOA_BANDS: [&str; 15] = [
    "reflectance_1",
    "reflectance_2",
    "reflectance_3",
    "reflectance_4",
    "reflectance_5",
    "reflectance_6",
    "reflectance_7",
    "reflectance_8",
    "reflectance_9",
    "reflectance_10",
    "reflectance_11",
    "reflectance_12",
    "reflectance_13",
    "reflectance_14",
    "reflectance_15",
];

const AATSR_WAVELENGTHS: [f32; 4] = [550.0, 665.0, 865.0, 1610.0];
const AATSR_SOLAR_IRRADIANCES: [f32; 4] = [1819.54, 1521.89, 950.683, 254.484];

const VGT_WAVELENGTHS: [f32; 4] = [450.0, 645.0, 835.0, 1665.0];
const VGT_SOLAR_IRRADIANCES: [f32; 4] = [1938.27, 1582.68, 1036.09, 224.581];

const AVHRR_WAVELENGTHS: [f32; 2] = [630.0, 860.0];
const AVHRR_SOLAR_IRRADIANCES: [f32; 2] = [1596.0, 1033.0];

const CLEAR_LAND_OR_SNOW: &str = "cloud_classif_flags.F_CLEAR_LAND OR cloud_classif_flags.F_CLEAR_SNOW";

static MERIS: SensorParams = SensorParams {
    lut_instrument: "MERIS",
    wavelengths: &MERIS_WAVELENGTHS,
    cal2meris: &[1.0; 15],
    solar_irradiance: &MERIS_SOLAR_IRRADIANCES,
    index_red: 6,
    index_nir: 12,
    andvi: 1.0,
    bndvi: 1.0,
    radiometric_error: 0.02,
    cwv_error: 0.04,
    ozo_error: 0.04,
    err_coreg_scale: 0.1,
    land_expr: "NOT l1_flags.INVALID AND NOT l1_flags.COSMETIC AND (cloud_classif_flags.F_CLEAR_LAND OR cloud_classif_flags.F_CLEAR_SNOW)",
    gas_strategy: GasStrategy::OzonePerPixel,
    nsky_coupling: true,
    elevation_geometry: false,
    bands: BandNames {
        vza: "view_zenith",
        vaa: "view_azimuth",
        sza: "sun_zenith",
        saa: "sun_azimuth",
        dem: "elevation",
        aot: "aot",
        aot_err: "aot_err",
        ozone: Some("ozone"),
        cwv: None,
        land_mask: "land_mask",
        snow_mask: "snow_mask",
        toa: &MERIS_TOA_BANDS,
    },
};

static AATSR: SensorParams = SensorParams {
    lut_instrument: "AATSR",
    wavelengths: &AATSR_WAVELENGTHS,
    cal2meris: &[1.0253, 1.0093, 1.0265, 1.0],
    solar_irradiance: &AATSR_SOLAR_IRRADIANCES,
    index_red: 1,
    index_nir: 2,
    andvi: 1.0,
    bndvi: 1.0,
    radiometric_error: 0.05,
    cwv_error: 0.04,
    ozo_error: 0.04,
    err_coreg_scale: 0.1,
    land_expr: CLEAR_LAND_OR_SNOW,
    gas_strategy: GasStrategy::OzonePerPixel,
    nsky_coupling: true,
    elevation_geometry: true,
    bands: BandNames {
        vza: "view_elev_nadir",
        vaa: "view_azimuth_nadir",
        sza: "sun_elev_nadir",
        saa: "sun_azimuth_nadir",
        dem: "altitude",
        aot: "aot",
        aot_err: "aot_err",
        ozone: None,
        cwv: None,
        land_mask: "land_mask",
        snow_mask: "snow_mask",
        toa: &[
            "reflec_nadir_550",
            "reflec_nadir_670",
            "reflec_nadir_870",
            "reflec_nadir_1600",
        ],
    },
};

static AATSR_FWARD: SensorParams = SensorParams {
    lut_instrument: "AATSR",
    wavelengths: &AATSR_WAVELENGTHS,
    cal2meris: &[1.0253, 1.0093, 1.0265, 1.0],
    solar_irradiance: &AATSR_SOLAR_IRRADIANCES,
    index_red: 1,
    index_nir: 2,
    andvi: 1.0,
    bndvi: 1.0,
    radiometric_error: 0.05,
    cwv_error: 0.04,
    ozo_error: 0.04,
    err_coreg_scale: 0.1,
    land_expr: CLEAR_LAND_OR_SNOW,
    gas_strategy: GasStrategy::OzonePerPixel,
    nsky_coupling: true,
    elevation_geometry: true,
    bands: BandNames {
        vza: "view_elev_fward",
        vaa: "view_azimuth_fward",
        sza: "sun_elev_fward",
        saa: "sun_azimuth_fward",
        dem: "altitude",
        aot: "aot",
        aot_err: "aot_err",
        ozone: None,
        cwv: None,
        land_mask: "land_mask",
        snow_mask: "snow_mask",
        toa: &[
            "reflec_fward_550",
            "reflec_fward_670",
            "reflec_fward_870",
            "reflec_fward_1600",
        ],
    },
};

static VGT: SensorParams = SensorParams {
    lut_instrument: "VGT",
    wavelengths: &VGT_WAVELENGTHS,
    cal2meris: &[1.012, 0.953, 0.971, 1.0],
    solar_irradiance: &VGT_SOLAR_IRRADIANCES,
    index_red: 1,
    index_nir: 2,
    andvi: 1.0,
    bndvi: 1.0,
    radiometric_error: 0.05,
    cwv_error: 0.04,
    ozo_error: 0.04,
    err_coreg_scale: 0.1,
    land_expr: "SM.B0_GOOD AND SM.B2_GOOD AND SM.B3_GOOD AND (cloud_classif_flags.F_CLEAR_LAND OR cloud_classif_flags.F_CLEAR_SNOW)",
    gas_strategy: GasStrategy::CwvPerPixel,
    nsky_coupling: true,
    elevation_geometry: false,
    bands: BandNames {
        vza: "VZA",
        vaa: "VAA",
        sza: "SZA",
        saa: "SAA",
        dem: "elevation",
        aot: "aot",
        aot_err: "aot_err",
        ozone: Some("OG"),
        cwv: Some("WVG"),
        land_mask: "land_mask",
        snow_mask: "snow_mask",
        toa: &["B0", "B2", "B3", "MIR"],
    },
};

static PROBAV: SensorParams = SensorParams {
    lut_instrument: "VGT",
    wavelengths: &VGT_WAVELENGTHS,
    cal2meris: &[1.0, 1.0, 1.0, 1.0],
    solar_irradiance: &VGT_SOLAR_IRRADIANCES,
    index_red: 1,
    index_nir: 2,
    andvi: 1.0,
    bndvi: 1.0,
    radiometric_error: 0.05,
    cwv_error: 0.04,
    ozo_error: 0.04,
    err_coreg_scale: 0.1,
    land_expr: "SM_FLAGS.GOOD_BLUE AND SM_FLAGS.GOOD_RED AND SM_FLAGS.GOOD_NIR AND (cloud_classif_flags.F_CLEAR_LAND OR cloud_classif_flags.F_CLEAR_SNOW)",
    gas_strategy: GasStrategy::OzonePerPixel,
    nsky_coupling: true,
    elevation_geometry: false,
    bands: BandNames {
        vza: "VZA_VNIR",
        vaa: "VAA_VNIR",
        sza: "SZA",
        saa: "SAA",
        dem: "elevation",
        aot: "aot",
        aot_err: "aot_err",
        ozone: None,
        cwv: None,
        land_mask: "land_mask",
        snow_mask: "snow_mask",
        toa: &["TOA_REFL_BLUE", "TOA_REFL_RED", "TOA_REFL_NIR", "TOA_REFL_SWIR"],
    },
};

static AVHRR: SensorParams = SensorParams {
    lut_instrument: "AVHRR",
    wavelengths: &AVHRR_WAVELENGTHS,
    cal2meris: &[1.0, 1.0],
    solar_irradiance: &AVHRR_SOLAR_IRRADIANCES,
    index_red: 0,
    index_nir: 1,
    andvi: 1.0,
    bndvi: 1.0,
    radiometric_error: 0.05,
    cwv_error: 0.04,
    ozo_error: 0.04,
    err_coreg_scale: 0.1,
    land_expr: "AVHRR_MSSL_FLAG.F_CLEAR_LAND OR AVHRR_MSSL_FLAG.F_CLEAR_SNOW",
    gas_strategy: GasStrategy::OzonePerPixel,
    nsky_coupling: false,
    elevation_geometry: false,
    bands: BandNames {
        vza: "VZA",
        vaa: "VAA",
        sza: "SZA",
        saa: "SAA",
        dem: "elevation",
        aot: "aot",
        aot_err: "aot_err",
        ozone: None,
        cwv: None,
        land_mask: "land_mask",
        snow_mask: "snow_mask",
        toa: &["SREFL_CH1", "SREFL_CH2"],
    },
};

impl Sensor {
    pub const ALL: [Sensor; 6] = [
        Sensor::Meris,
        Sensor::Aatsr,
        Sensor::AatsrFward,
        Sensor::Vgt,
        Sensor::ProbaV,
        Sensor::Avhrr,
    ];

    pub fn params(&self) -> &'static SensorParams {
        match self {
            Sensor::Meris => &MERIS,
            Sensor::Aatsr => &AATSR,
            Sensor::AatsrFward => &AATSR_FWARD,
            Sensor::Vgt => &VGT,
            Sensor::ProbaV => &PROBAV,
            Sensor::Avhrr => &AVHRR,
        }
    }

    pub fn num_bands(&self) -> usize {
        self.params().wavelengths.len()
    }

    /// Ozone, CWV and the value driving the gas transmission lookup.
    ///
    /// `ozone` is the per-pixel ozone band (Dobson units) where one exists,
    /// `ozone_mean` the image mean in atm-cm.
    pub fn gas_values(&self, ozone: f64, cwv: f64, ozone_mean: f64) -> GasValues {
        match self {
            Sensor::Meris => {
                let ozo = 0.001 * ozone;
                GasValues {
                    ozo,
                    cwv: CWV_REFERENCE as f64,
                    gas: ozo,
                }
            }
            Sensor::Vgt => {
                let cwv = cwv.min(CWV_MAX);
                GasValues {
                    ozo: ozone_mean,
                    cwv,
                    gas: cwv,
                }
            }
            Sensor::Aatsr | Sensor::AatsrFward | Sensor::ProbaV | Sensor::Avhrr => GasValues {
                ozo: OZO_CONSTANT_VALUE,
                cwv: CWV_REFERENCE as f64,
                gas: OZO_CONSTANT_VALUE,
            },
        }
    }

    /// Reference value at which the gas table is resolved when loading.
    pub fn gas_reference(&self, ozone_mean: f64) -> f32 {
        match self.params().gas_strategy {
            GasStrategy::OzonePerPixel => CWV_REFERENCE,
            GasStrategy::CwvPerPixel => ozone_mean as f32,
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unsupported sensor '{0}'")]
pub struct UnknownSensor(pub String);

impl FromStr for Sensor {
    type Err = UnknownSensor;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "MERIS" => Ok(Sensor::Meris),
            "AATSR" => Ok(Sensor::Aatsr),
            "AATSR_FWARD" => Ok(Sensor::AatsrFward),
            "VGT" => Ok(Sensor::Vgt),
            "PROBAV" => Ok(Sensor::ProbaV),
            "AVHRR" => Ok(Sensor::Avhrr),
            _ => Err(UnknownSensor(s.to_string())),
        }
    }
}

impl Display for Sensor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Sensor::Meris => write!(f, "MERIS"),
            Sensor::Aatsr => write!(f, "AATSR"),
            Sensor::AatsrFward => write!(f, "AATSR_FWARD"),
            Sensor::Vgt => write!(f, "VGT"),
            Sensor::ProbaV => write!(f, "PROBAV"),
            Sensor::Avhrr => write!(f, "AVHRR"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_band_tables_are_consistent() {
        for sensor in Sensor::ALL {
            let p = sensor.params();
            let n = sensor.num_bands();
            assert_eq!(p.cal2meris.len(), n, "{sensor}");
            assert_eq!(p.solar_irradiance.len(), n, "{sensor}");
            assert_eq!(p.bands.toa.len(), n, "{sensor}");
            assert!(p.index_red < n && p.index_nir < n, "{sensor}");
            assert!(p.wavelengths.windows(2).all(|w| w[0] < w[1]), "{sensor}");
        }
    }

    #[test]
    fn test_lut_instrument_mapping() {
        assert_eq!(Sensor::ProbaV.params().lut_instrument, "VGT");
        assert_eq!(Sensor::AatsrFward.params().lut_instrument, "AATSR");
        assert_eq!(Sensor::Meris.params().lut_instrument, "MERIS");
    }

    #[test]
    fn test_parse_and_display_round_trip() {
        for sensor in Sensor::ALL {
            assert_eq!(sensor.to_string().parse::<Sensor>().unwrap(), sensor);
        }
        assert_eq!("meris".parse::<Sensor>().unwrap(), Sensor::Meris);
        assert!("SEVIRI".parse::<Sensor>().is_err());
    }

    #[test]
    fn test_gas_values_per_sensor() {
        let meris = Sensor::Meris.gas_values(320.0, 9.0, 0.0);
        assert_abs_diff_eq!(meris.ozo, 0.32, epsilon = 1e-12);
        assert_eq!(meris.gas, meris.ozo);
        assert_eq!(meris.cwv, 1.5);

        let aatsr = Sensor::Aatsr.gas_values(f64::NAN, f64::NAN, 0.0);
        assert_eq!(aatsr.gas, OZO_CONSTANT_VALUE);
        assert_eq!(aatsr.cwv, 1.5);

        let vgt = Sensor::Vgt.gas_values(0.0, 6.0, 0.29);
        assert_eq!(vgt, GasValues { ozo: 0.29, cwv: CWV_MAX, gas: CWV_MAX });

        let vgt = Sensor::Vgt.gas_values(0.0, 2.0, 0.29);
        assert_eq!(vgt.gas, 2.0);
    }

    #[test]
    fn test_gas_reference() {
        assert_eq!(Sensor::Meris.gas_reference(0.3), 1.5);
        assert_eq!(Sensor::Vgt.gas_reference(0.3), 0.3);
    }

    #[test]
    fn test_only_avhrr_skips_sky_coupling() {
        for sensor in Sensor::ALL {
            assert_eq!(sensor.params().nsky_coupling, sensor != Sensor::Avhrr);
        }
    }
}

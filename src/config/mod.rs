use chrono::NaiveDate;

use serde::Deserialize;
use serde::Deserializer;
use serde::de::Error;

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use crate::bbdr::SqrtPolicy;
use crate::sensor::Sensor;

pub mod error;
pub use error::ConfigError;

/// What the batch runner produces from each product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// TOA product to BBDR.
    #[default]
    Bbdr,
    /// TOA product to spectral SDR.
    Sdr,
    /// SDR product to BBDR.
    BbdrFromSdr,
}

#[derive(Debug, Clone)]
pub struct Config {
    sensor: Sensor,
    lut_root: PathBuf,
    input_directory: PathBuf,
    output_directory: PathBuf,
    mode: Mode,
    covariance_sqrt: SqrtPolicy,
    ozone_mean: Option<f64>,
    acquisition_date: Option<NaiveDate>,
}

// Deserializes through a helper so the sensor name and date are parsed and
// checked before a Config exists.
impl<'de> Deserialize<'de> for Config {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct ConfigHelper {
            sensor: String,
            lut_root: PathBuf,
            input_directory: PathBuf,
            output_directory: PathBuf,
            #[serde(default)]
            mode: Mode,
            #[serde(default)]
            covariance_sqrt: SqrtPolicy,
            ozone_mean: Option<f64>,
            acquisition_date: Option<String>,
        }

        let helper = ConfigHelper::deserialize(deserializer)?;

        let sensor: Sensor = helper
            .sensor
            .parse()
            .map_err(|e| D::Error::custom(ConfigError::Sensor(e)))?;

        if helper.lut_root.as_os_str().is_empty() {
            return Err(D::Error::custom(ConfigError::EmptyLutRoot));
        }

        if let Some(ozone) = helper.ozone_mean.filter(|o| *o <= 0.0) {
            return Err(D::Error::custom(ConfigError::OzoneMean(ozone)));
        }

        let acquisition_date = helper
            .acquisition_date
            .map(|d| NaiveDate::parse_from_str(&d, "%Y-%m-%d"))
            .transpose()
            .map_err(|e| D::Error::custom(ConfigError::DateParse(e)))?;

        Ok(Config {
            sensor,
            lut_root: helper.lut_root,
            input_directory: helper.input_directory,
            output_directory: helper.output_directory,
            mode: helper.mode,
            covariance_sqrt: helper.covariance_sqrt,
            ozone_mean: helper.ozone_mean,
            acquisition_date,
        })
    }
}

impl Config {
    pub fn new(sensor: Sensor, lut_root: PathBuf, input_directory: PathBuf, output_directory: PathBuf) -> Self {
        Self {
            sensor,
            lut_root,
            input_directory,
            output_directory,
            mode: Mode::default(),
            covariance_sqrt: SqrtPolicy::default(),
            ozone_mean: None,
            acquisition_date: None,
        }
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);

        let config: Config = serde_json::from_reader(reader).map_err(ConfigError::from)?;

        if !config.lut_root.is_dir() {
            return Err(ConfigError::LutRoot(config.lut_root));
        }

        Ok(config)
    }

    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_covariance_sqrt(mut self, policy: SqrtPolicy) -> Self {
        self.covariance_sqrt = policy;
        self
    }

    pub fn with_ozone_mean(mut self, ozone_mean: f64) -> Self {
        self.ozone_mean = Some(ozone_mean);
        self
    }

    pub fn sensor(&self) -> Sensor {
        self.sensor
    }

    pub fn lut_root(&self) -> &Path {
        &self.lut_root
    }

    pub fn input_directory(&self) -> &Path {
        &self.input_directory
    }

    pub fn output_directory(&self) -> &Path {
        &self.output_directory
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn covariance_sqrt(&self) -> SqrtPolicy {
        self.covariance_sqrt
    }

    pub fn ozone_mean(&self) -> Option<f64> {
        self.ozone_mean
    }

    pub fn acquisition_date(&self) -> Option<NaiveDate> {
        self.acquisition_date
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    fn write_config(dir: &Path, body: &str) -> PathBuf {
        let file_path = dir.join("config.json");
        let mut file = File::create(&file_path).unwrap();
        file.write_all(body.as_bytes()).unwrap();
        file_path
    }

    #[test]
    fn test_from_file() {
        let dir = tempdir().unwrap();
        let lut_root = dir.path().to_str().unwrap().replace('\\', "/");
        let config_data = format!(
            r#"
    {{
        "sensor": "vgt",
        "lut_root": "{}",
        "input_directory": "./data/input",
        "output_directory": "./data/output",
        "mode": "bbdr_from_sdr",
        "covariance_sqrt": "abs",
        "ozone_mean": 0.31,
        "acquisition_date": "2005-05-09"
    }}
    "#,
            lut_root
        );

        let config = Config::from_file(write_config(dir.path(), &config_data)).unwrap();

        assert_eq!(config.sensor(), Sensor::Vgt);
        assert_eq!(config.mode(), Mode::BbdrFromSdr);
        assert_eq!(config.covariance_sqrt(), SqrtPolicy::Abs);
        assert_eq!(config.ozone_mean(), Some(0.31));
        assert_eq!(
            config.acquisition_date(),
            Some(NaiveDate::from_ymd_opt(2005, 5, 9).expect("Invalid date"))
        );
    }

    #[test]
    fn test_defaults() {
        let config: Config = serde_json::from_str(
            r#"{"sensor": "MERIS", "lut_root": "/aux", "input_directory": "in", "output_directory": "out"}"#,
        )
        .unwrap();

        assert_eq!(config.mode(), Mode::Bbdr);
        assert_eq!(config.covariance_sqrt(), SqrtPolicy::Raw);
        assert_eq!(config.ozone_mean(), None);
        assert_eq!(config.acquisition_date(), None);
    }

    #[test]
    fn test_unknown_sensor() {
        let result: Result<Config, _> = serde_json::from_str(
            r#"{"sensor": "SEVIRI", "lut_root": "/aux", "input_directory": "in", "output_directory": "out"}"#,
        );
        let message = result.unwrap_err().to_string();
        assert!(message.contains("SEVIRI"), "{message}");
    }

    #[test]
    fn test_invalid_date_and_empty_root() {
        let result: Result<Config, _> = serde_json::from_str(
            r#"{"sensor": "VGT", "lut_root": "/aux", "input_directory": "in", "output_directory": "out", "acquisition_date": "2005-13-01"}"#,
        );
        assert!(result.is_err());

        let result: Result<Config, _> = serde_json::from_str(
            r#"{"sensor": "VGT", "lut_root": "", "input_directory": "in", "output_directory": "out"}"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_lut_root_directory() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("nope").to_str().unwrap().replace('\\', "/");
        let body = format!(
            r#"{{"sensor": "AVHRR", "lut_root": "{}", "input_directory": "in", "output_directory": "out"}}"#,
            missing
        );
        let result = Config::from_file(write_config(dir.path(), &body));
        assert!(matches!(result, Err(ConfigError::LutRoot(_))));
    }

    #[test]
    fn test_builder() {
        let config = Config::new(Sensor::Meris, "/aux".into(), "in".into(), "out".into())
            .with_mode(Mode::Sdr)
            .with_covariance_sqrt(SqrtPolicy::Abs)
            .with_ozone_mean(0.3);
        assert_eq!(config.mode(), Mode::Sdr);
        assert_eq!(config.covariance_sqrt(), SqrtPolicy::Abs);
        assert_eq!(config.ozone_mean(), Some(0.3));
    }
}

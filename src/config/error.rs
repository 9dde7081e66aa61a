use std::path::PathBuf;

use crate::sensor::UnknownSensor;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error(transparent)]
    Sensor(#[from] UnknownSensor),

    #[error("Failed to parse date: {0}")]
    DateParse(#[from] chrono::ParseError),

    #[error("lut_root must not be empty")]
    EmptyLutRoot,

    #[error("lut_root {} is not a directory", .0.display())]
    LutRoot(PathBuf),

    #[error("ozone_mean must be positive, got {0}")]
    OzoneMean(f64),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),
}

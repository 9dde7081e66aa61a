use std::path::PathBuf;

use crate::auxdata::AuxdataError;
use crate::config::ConfigError;
use crate::lut::LutError;
use crate::readers::ReadError;

#[derive(Debug, thiserror::Error)]
pub enum BbdrError {
    #[error(transparent)]
    Lut(#[from] LutError),

    #[error(transparent)]
    Auxdata(#[from] AuxdataError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Read(#[from] ReadError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("no products found below {}", .0.display())]
    NoProducts(PathBuf),
}

pub type BbdrResult<T> = Result<T, BbdrError>;

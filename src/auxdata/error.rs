use std::io;

use crate::lut::LutError;

#[derive(Debug, thiserror::Error)]
pub enum AuxdataError {
    #[error(transparent)]
    Lut(#[from] LutError),

    #[error("I/O error while reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("{path}:{line}: {reason}")]
    Coefficients {
        path: String,
        line: usize,
        reason: String,
    },

    #[error("inconsistent auxiliary data: {0}")]
    Inconsistent(String),
}

use std::io;

#[derive(Debug, thiserror::Error)]
pub enum LutError {
    #[error("I/O error while reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("invalid dimension: {0}")]
    InvalidDimension(String),

    #[error("LUT holds {actual} values but its dimensions require {expected}")]
    SizeMismatch { expected: usize, actual: usize },

    #[error("malformed LUT {path}: {reason}")]
    Format { path: String, reason: String },
}

impl LutError {
    pub(crate) fn io(path: &str, source: io::Error) -> Self {
        LutError::Io {
            path: path.to_string(),
            source,
        }
    }

    pub(crate) fn format(path: &str, reason: impl Into<String>) -> Self {
        LutError::Format {
            path: path.to_string(),
            reason: reason.into(),
        }
    }
}

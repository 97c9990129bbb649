//! Error taxonomy for the engine, per the config/transient-I/O/protocol split.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum MrError {
    #[error("invalid n_reduce: {0} (must be >= 1)")]
    InvalidNReduce(i64),

    #[error("no input files given")]
    NoInputFiles,

    #[error("i/o error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed record in {path}: {line:?}")]
    MalformedRecord { path: PathBuf, line: String },
}

impl MrError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        MrError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, MrError>;

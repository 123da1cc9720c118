use std::path::{Path, PathBuf};

use thiserror::Error;

/// Errors raised while preparing or streaming datasets.
#[derive(Error, Debug)]
pub enum Error {
    /// IO error on a specific file or directory.
    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// A JSON record could not be parsed.
    #[error("Malformed record in {path} line {line}: {source}")]
    Record {
        path: PathBuf,
        line: usize,
        #[source]
        source: serde_json::Error,
    },
    /// JSON (de)serialization error for vocabularies and manifests.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    /// Binary shard encoding error.
    #[error("Shard encoding error: {0}")]
    Shard(#[from] bincode::Error),
    /// The processed directory for a dataset split does not exist.
    #[error("Dataset not preprocessed: {0} (run with --preprocess)")]
    NotPreprocessed(PathBuf),
    /// Invalid streamer or corpus configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    /// A loader worker stopped before delivering its shard.
    #[error("Loader thread failed: {0}")]
    Loader(String),
}

impl Error {
    pub(crate) fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}

/// Result type alias for synkge-core.
pub type Result<T> = std::result::Result<T, Error>;

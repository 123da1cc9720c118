//! Error types for synkge-kge.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Pipeline stage a failure happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Configuration,
    Preprocess,
    BatchLoad,
    ModelLoad,
    ForwardPass,
    Checkpoint,
    Export,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Configuration => "configuration",
            Stage::Preprocess => "preprocessing",
            Stage::BatchLoad => "batch loading",
            Stage::ModelLoad => "model loading",
            Stage::ForwardPass => "forward pass",
            Stage::Checkpoint => "checkpoint",
            Stage::Export => "export",
        })
    }
}

/// Coarse classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad flags or inconsistent hyperparameters.
    Configuration,
    /// Missing or malformed input files.
    Data,
    /// Tensor, IO or thread failures while running.
    Runtime,
}

/// Errors raised by training, evaluation and export.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Core(#[from] synkge_core::Error),

    #[error(transparent)]
    Model(#[from] synkge_nn::Error),

    #[error("tensor error: {0}")]
    Tensor(#[from] candle_core::Error),

    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("archive encoding error: {0}")]
    Archive(#[from] bincode::Error),

    #[error("array shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// A lower error annotated with where it happened.
    #[error("{stage} failed for dataset `{dataset}`{}: {source}", epoch_suffix(.epoch))]
    Staged {
        stage: Stage,
        dataset: String,
        epoch: Option<usize>,
        #[source]
        source: Box<Error>,
    },
}

fn epoch_suffix(epoch: &Option<usize>) -> String {
    epoch.map(|e| format!(" at epoch {e}")).unwrap_or_default()
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidConfig(_) => ErrorKind::Configuration,
            Error::Core(e) => match e {
                synkge_core::Error::InvalidConfig(_) => ErrorKind::Configuration,
                synkge_core::Error::Loader(_) => ErrorKind::Runtime,
                _ => ErrorKind::Data,
            },
            Error::Model(e) => match e {
                synkge_nn::Error::InvalidConfig(_) => ErrorKind::Configuration,
                _ => ErrorKind::Runtime,
            },
            Error::Staged { source, .. } => source.kind(),
            Error::Tensor(_) | Error::Io { .. } | Error::Archive(_) | Error::Shape(_) => ErrorKind::Runtime,
        }
    }

    /// Stage of the outermost annotation, if any.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Error::Staged { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Attach stage, dataset and epoch to any error convertible into [`Error`].
pub trait StageContext<T> {
    fn at_stage(self, stage: Stage, dataset: &str, epoch: Option<usize>) -> Result<T>;
}

impl<T, E: Into<Error>> StageContext<T> for std::result::Result<T, E> {
    fn at_stage(self, stage: Stage, dataset: &str, epoch: Option<usize>) -> Result<T> {
        self.map_err(|e| Error::Staged {
            stage,
            dataset: dataset.to_string(),
            epoch,
            source: Box::new(e.into()),
        })
    }
}

//! Run configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use synkge_nn::{EncoderConfig, ModelConfig};

use crate::error::{Error, Result};

/// Every setting of one training run. Built once, then only read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Dataset name, a directory under `data_root` (default: "WN18RR").
    pub dataset: String,
    pub data_root: PathBuf,
    /// Directory of definition files (`*.txt`/`*.tsv`).
    pub definitions: PathBuf,
    pub save_dir: PathBuf,
    pub model_suffix: String,
    pub batch_size: usize,
    pub test_batch_size: usize,
    pub epochs: usize,
    pub lr: f64,
    /// Learning rate multiplier applied after every epoch (default: 1.0).
    pub lr_decay: f64,
    /// Weight decay (default: 0.0).
    pub l2: f64,
    pub label_smoothing: f64,
    pub seed: u64,
    /// Batches between hook log lines (default: 100).
    pub log_interval: usize,
    pub loader_threads: usize,
    pub preprocess: bool,
    pub resume: bool,
    /// Lookup-head checkpoint evaluated as a baseline before training.
    pub initialize: Option<PathBuf>,
    /// Export path for definition representations.
    pub represent: Option<PathBuf>,
    pub max_definition_len: Option<usize>,
    /// Epochs between dev/test evaluations.
    pub eval_every: usize,
    pub model: ModelConfig,
    pub encoder: EncoderConfig,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            dataset: "WN18RR".to_string(),
            data_root: PathBuf::from("data"),
            definitions: PathBuf::from("definitions"),
            save_dir: PathBuf::from("saved_models"),
            model_suffix: String::new(),
            batch_size: 128,
            test_batch_size: 128,
            epochs: 1000,
            lr: 0.003,
            lr_decay: 1.0,
            l2: 0.0,
            label_smoothing: 0.1,
            seed: 17,
            log_interval: 100,
            loader_threads: 4,
            preprocess: false,
            resume: false,
            initialize: None,
            represent: None,
            max_definition_len: None,
            eval_every: 5,
            model: ModelConfig::default(),
            encoder: EncoderConfig::default(),
        }
    }
}

impl RunConfig {
    pub fn new(dataset: impl Into<String>) -> Self {
        Self {
            dataset: dataset.into(),
            ..Default::default()
        }
    }

    pub fn with_data_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.data_root = root.into();
        self
    }

    pub fn with_definitions(mut self, dir: impl Into<PathBuf>) -> Self {
        self.definitions = dir.into();
        self
    }

    pub fn with_save_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.save_dir = dir.into();
        self
    }

    pub fn with_model_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.model_suffix = suffix.into();
        self
    }

    pub fn with_batch_sizes(mut self, train: usize, test: usize) -> Self {
        self.batch_size = train;
        self.test_batch_size = test;
        self
    }

    pub fn with_epochs(mut self, epochs: usize) -> Self {
        self.epochs = epochs;
        self
    }

    pub fn with_lr(mut self, lr: f64) -> Self {
        self.lr = lr;
        self
    }

    pub fn with_lr_decay(mut self, decay: f64) -> Self {
        self.lr_decay = decay;
        self
    }

    pub fn with_l2(mut self, l2: f64) -> Self {
        self.l2 = l2;
        self
    }

    pub fn with_label_smoothing(mut self, s: f64) -> Self {
        self.label_smoothing = s;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_log_interval(mut self, n: usize) -> Self {
        self.log_interval = n;
        self
    }

    pub fn with_loader_threads(mut self, n: usize) -> Self {
        self.loader_threads = n;
        self
    }

    pub fn with_preprocess(mut self, preprocess: bool) -> Self {
        self.preprocess = preprocess;
        self
    }

    pub fn with_resume(mut self, resume: bool) -> Self {
        self.resume = resume;
        self
    }

    pub fn with_initialize(mut self, path: impl Into<PathBuf>) -> Self {
        self.initialize = Some(path.into());
        self
    }

    pub fn with_represent(mut self, path: impl Into<PathBuf>) -> Self {
        self.represent = Some(path.into());
        self
    }

    pub fn with_max_definition_len(mut self, len: usize) -> Self {
        self.max_definition_len = Some(len);
        self
    }

    pub fn with_eval_every(mut self, n: usize) -> Self {
        self.eval_every = n;
        self
    }

    pub fn with_model(mut self, model: ModelConfig) -> Self {
        self.model = model;
        self
    }

    pub fn with_encoder(mut self, encoder: EncoderConfig) -> Self {
        self.encoder = encoder;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.resume && self.initialize.is_some() {
            return Err(Error::InvalidConfig(
                "--resume and --initialize are mutually exclusive".into(),
            ));
        }
        if self.dataset.is_empty() {
            return Err(Error::InvalidConfig("dataset name is empty".into()));
        }
        if self.batch_size == 0 || self.test_batch_size == 0 {
            return Err(Error::InvalidConfig("batch sizes must be > 0".into()));
        }
        if self.loader_threads == 0 {
            return Err(Error::InvalidConfig("loader_threads must be > 0".into()));
        }
        if self.eval_every == 0 {
            return Err(Error::InvalidConfig("eval_every must be > 0".into()));
        }
        if self.lr.is_nan() || self.lr <= 0.0 {
            return Err(Error::InvalidConfig(format!("lr must be > 0, got {}", self.lr)));
        }
        if self.lr_decay.is_nan() || self.lr_decay <= 0.0 {
            return Err(Error::InvalidConfig(format!("lr_decay must be > 0, got {}", self.lr_decay)));
        }
        if self.l2 < 0.0 {
            return Err(Error::InvalidConfig(format!("l2 must be >= 0, got {}", self.l2)));
        }
        if !(0.0..1.0).contains(&self.label_smoothing) {
            return Err(Error::InvalidConfig(format!(
                "label_smoothing must be in [0, 1), got {}",
                self.label_smoothing
            )));
        }
        if self.max_definition_len == Some(0) {
            return Err(Error::InvalidConfig("max_definition_len must be > 0".into()));
        }
        self.model.validate()?;
        self.encoder.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        assert!(RunConfig::default().validate().is_ok());
    }

    #[test]
    fn test_resume_and_initialize_conflict() {
        let cfg = RunConfig::new("toy").with_resume(true).with_initialize("base.model");
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("mutually exclusive"));
    }

    #[test]
    fn test_bad_model_config_surfaces() {
        let cfg = RunConfig::new("toy").with_model(ModelConfig::default().with_hidden_size(1));
        assert!(matches!(cfg.validate(), Err(Error::Model(_))));
    }

    #[test]
    fn test_serializes_to_json() {
        let json = serde_json::to_string(&RunConfig::new("toy")).unwrap();
        assert!(json.contains("\"dataset\":\"toy\""));
        assert!(json.contains("\"kind\":\"conve\""));
    }
}

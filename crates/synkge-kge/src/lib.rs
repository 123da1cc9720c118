//! Training, evaluation and export for definition-encoded link prediction.
//!
//! A [`Trainer`] ties the pieces together: batches stream from
//! [`synkge_core`], head entities are replaced by their encoded definitions
//! ([`synkge_nn::LinkPredictor`]), targets are label-smoothed, and every
//! few epochs the model is ranked on dev/test with filtered
//! [`RankMetrics`]. The best dev model is checkpointed to a path derived
//! from the run's hyperparameters ([`checkpoint_path`]).
//!
//! ```rust,ignore
//! use synkge_kge::{RunConfig, Trainer};
//!
//! let config = RunConfig::new("WN18RR").with_definitions("definitions").with_epochs(100);
//! let mut trainer = Trainer::new(config, &candle_core::Device::Cpu)?;
//! let report = trainer.run()?;
//! println!("best dev MRR {:.4}", report.best_dev_mrr);
//! ```

pub mod checkpoint;
pub mod config;
pub mod error;
pub mod evaluation;
pub mod export;
pub mod smoothing;
pub mod training;

pub use checkpoint::{checkpoint_path, format_rate};
pub use config::RunConfig;
pub use error::{Error, ErrorKind, Result, Stage, StageContext};
pub use evaluation::{filtered_rank, ranking_and_hits, RankMetrics};
pub use export::{export_representations, projected_path, ExportReport, RepresentationArchive};
pub use smoothing::smooth_labels;
pub use training::{EpochSummary, PreTrainingEval, Trainer, TrainingReport};

//! Candle models for synset link prediction.
//!
//! - [`models`]: ConvE, DistMult and ComplEx scorers behind the [`Scorer`] trait
//! - [`encoder`]: BiLSTM definition encoder producing head vectors
//! - [`model`]: [`LinkPredictor`], a scorer bound to a head source, with
//!   safetensors checkpoints
//!
//! ```rust,ignore
//! use synkge_nn::{LinkPredictor, ModelConfig, ModelKind};
//! use candle_core::Device;
//!
//! let config = ModelConfig::default().with_kind(ModelKind::DistMult);
//! let model = LinkPredictor::with_lookup(&config, num_entities, num_relations, &Device::Cpu)?;
//! let logits = model.score_entities(&[0, 1], &[3, 3], false)?;
//! ```

pub mod config;
pub mod encoder;
pub mod error;
pub mod model;
pub mod models;

pub use config::{EncoderConfig, ModelConfig, ModelKind};
pub use encoder::{DefinitionEncoder, EncodedDefinitions};
pub use error::{Error, Result};
pub use model::{bce_with_logits, HeadSource, LinkPredictor, ParamEntry, ParamReport};
pub use models::{build_scorer, ComplEx, ConvE, DistMult, Scorer};

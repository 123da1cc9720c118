//! Data plumbing for definition-encoded link prediction.
//!
//! Knowledge-graph datasets arrive as JSON-lines files of
//! `(e1, rel) -> {e2, ...}` records. This crate turns them into
//! vocabularies and compressed shards, streams shuffled or ordered
//! batches back with background loader threads, and maps entity indices
//! to the tokenized text of their synset definitions.
//!
//! # Modules
//!
//! - [`vocab`]: token/index vocabularies with reserved padding and `UNK`
//! - [`record`]: raw JSON records and their indexed [`Example`] form
//! - [`pipeline`]: one-shot preprocessing into `processed/`
//! - [`shard`]: gzip + bincode shard files and split manifests
//! - [`batching`]: the prefetching [`StreamBatcher`]
//! - [`hooks`]: per-batch observers (ETA, loss)
//! - [`definitions`]: synset definition corpus and padded batches
//!
//! # Example
//!
//! ```rust,ignore
//! use synkge_core::{BatcherConfig, Pipeline, Split, StreamBatcher};
//!
//! let pipeline = Pipeline::new("data", "WN18RR");
//! pipeline.execute(true)?;
//! let vocabs = pipeline.load_vocabs()?;
//!
//! let config = BatcherConfig { batch_size: 128, randomize: true, ..Default::default() };
//! let mut train = StreamBatcher::open(pipeline.paths().split_dir(Split::Train), "train", config)?;
//! for batch in train.epoch()? {
//!     let batch = batch?;
//!     let targets = batch.multi_hot_tails(vocabs.num_entities());
//! }
//! ```

pub mod batching;
pub mod definitions;
mod error;
pub mod hooks;
pub mod pipeline;
pub mod record;
pub mod shard;
pub mod vocab;

pub use batching::{multi_hot, Batch, BatcherConfig, Epoch, StreamBatcher, StreamState};
pub use definitions::{tokenize, DefinitionBatch, DefinitionCorpus, DefinitionResolver};
pub use error::{Error, Result};
pub use hooks::{BatchHook, EtaHook, LossHook};
pub use pipeline::{DatasetPaths, Pipeline, PreprocessReport, Split};
pub use record::{Example, RawRecord};
pub use shard::Manifest;
pub use vocab::{Vocab, Vocabularies};

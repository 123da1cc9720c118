//! Prefetching batch streamer over materialized splits.
//!
//! Every epoch spawns `loader_threads` workers. Worker `w` decodes shards
//! `w, w + T, w + 2T, ...` into its own bounded channel, and the consumer
//! reads the channels round-robin, so shard order is preserved while at
//! most `2 × T` decoded shards wait in memory.

use std::collections::VecDeque;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{sync_channel, Receiver};
use std::thread::{self, JoinHandle};

use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_xorshift::XorShiftRng;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::hooks::BatchHook;
use crate::record::Example;
use crate::shard::{read_shard, shard_path, Manifest};

/// Shards buffered per worker before it blocks.
const PREFETCH_PER_WORKER: usize = 2;

/// A batch of examples in column layout.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Batch {
    pub e1: Vec<u32>,
    pub rel: Vec<u32>,
    pub rel_eval: Vec<u32>,
    pub e2: Vec<u32>,
    pub e2_multi1: Vec<Vec<u32>>,
    pub e2_multi2: Vec<Vec<u32>>,
}

impl Batch {
    pub fn from_examples(examples: impl IntoIterator<Item = Example>) -> Self {
        let mut batch = Batch::default();
        for ex in examples {
            batch.e1.push(ex.e1);
            batch.rel.push(ex.rel);
            batch.rel_eval.push(ex.rel_eval);
            batch.e2.push(ex.e2);
            batch.e2_multi1.push(ex.e2_multi1);
            batch.e2_multi2.push(ex.e2_multi2);
        }
        batch
    }

    pub fn len(&self) -> usize {
        self.e1.len()
    }

    pub fn is_empty(&self) -> bool {
        self.e1.is_empty()
    }

    /// Row-major `len × num_entities` multi-hot matrix over `e2_multi1`.
    pub fn multi_hot_tails(&self, num_entities: usize) -> Vec<f32> {
        multi_hot(&self.e2_multi1, num_entities)
    }
}

/// Row-major multi-hot encoding; indices `>= num_entities` are ignored.
pub fn multi_hot(targets: &[Vec<u32>], num_entities: usize) -> Vec<f32> {
    let mut out = vec![0.0f32; targets.len() * num_entities];
    for (row, idxs) in targets.iter().enumerate() {
        for &i in idxs {
            let i = i as usize;
            if i < num_entities {
                out[row * num_entities + i] = 1.0;
            }
        }
    }
    out
}

/// Progress visible to hooks.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StreamState {
    /// Epoch counter of this streamer, starting at 0.
    pub epoch: usize,
    /// Index of the batch being handed out.
    pub batch: usize,
    pub num_batches: usize,
    /// Loss recorded by the consumer since the previous batch, if any.
    pub loss: Option<f32>,
}

/// Streamer settings.
#[derive(Debug, Clone, Copy)]
pub struct BatcherConfig {
    pub batch_size: usize,
    /// Reshuffle shard and example order every epoch.
    pub randomize: bool,
    pub loader_threads: usize,
    pub seed: u64,
}

impl Default for BatcherConfig {
    fn default() -> Self {
        Self {
            batch_size: 128,
            randomize: false,
            loader_threads: 4,
            seed: 17,
        }
    }
}

/// Streams batches of one split, epoch after epoch.
pub struct StreamBatcher {
    name: String,
    dir: PathBuf,
    manifest: Manifest,
    config: BatcherConfig,
    hooks: Vec<Box<dyn BatchHook>>,
    rng: XorShiftRng,
    epoch: usize,
}

impl std::fmt::Debug for StreamBatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamBatcher")
            .field("name", &self.name)
            .field("dir", &self.dir)
            .field("manifest", &self.manifest)
            .field("config", &self.config)
            .field("hooks", &self.hooks.len())
            .finish()
    }
}

impl StreamBatcher {
    /// Open a split directory written by the preprocessing pipeline.
    pub fn open(dir: impl AsRef<Path>, name: impl Into<String>, config: BatcherConfig) -> Result<Self> {
        if config.batch_size == 0 {
            return Err(Error::InvalidConfig("batch_size must be > 0".into()));
        }
        if config.loader_threads == 0 {
            return Err(Error::InvalidConfig("loader_threads must be > 0".into()));
        }
        let dir = dir.as_ref().to_path_buf();
        let manifest = Manifest::load(&dir)?;
        Ok(Self {
            name: name.into(),
            dir,
            manifest,
            config,
            hooks: Vec::new(),
            rng: XorShiftRng::seed_from_u64(config.seed),
            epoch: 0,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn num_examples(&self) -> usize {
        self.manifest.num_examples
    }

    pub fn num_batches(&self) -> usize {
        self.manifest.num_examples.div_ceil(self.config.batch_size)
    }

    /// Append a hook. Hooks run in registration order.
    pub fn subscribe(&mut self, hook: Box<dyn BatchHook>) {
        self.hooks.push(hook);
    }

    /// Start a pass over the split.
    ///
    /// Fails with [`Error::Loader`] if any loader thread cannot be spawned,
    /// since shards are already dealt out per worker.
    pub fn epoch(&mut self) -> Result<Epoch<'_>> {
        let mut order: Vec<usize> = (0..self.manifest.num_shards).collect();
        if self.config.randomize {
            order.shuffle(&mut self.rng);
        }
        let jobs: Vec<(PathBuf, Option<u64>)> = order
            .into_iter()
            .map(|i| {
                let seed = self.config.randomize.then(|| self.rng.gen::<u64>());
                (shard_path(&self.dir, i), seed)
            })
            .collect();

        let threads = self.config.loader_threads.min(jobs.len()).max(1);
        let (receivers, workers) =
            spawn_loaders(&self.name, &jobs, threads, |builder, job| builder.spawn(job))?;

        let state = StreamState {
            epoch: self.epoch,
            batch: 0,
            num_batches: self.num_batches(),
            loss: None,
        };
        self.epoch += 1;
        debug!(streamer = %self.name, epoch = state.epoch, shards = jobs.len(), "epoch started");
        for hook in self.hooks.iter_mut() {
            hook.on_epoch_start(&state);
        }

        Ok(Epoch {
            hooks: &mut self.hooks,
            receivers,
            workers,
            next_shard: 0,
            num_shards: jobs.len(),
            buffer: VecDeque::new(),
            batch_size: self.config.batch_size,
            state,
            last_loss: None,
            failed: false,
        })
    }
}

type LoaderJob = Box<dyn FnOnce() + Send + 'static>;
type Loaders = (Vec<Receiver<Result<Vec<Example>>>>, Vec<JoinHandle<()>>);

/// Start `threads` workers; worker `w` decodes `jobs[w], jobs[w + threads], ...`.
///
/// On a spawn failure the workers already started are shut down and joined.
fn spawn_loaders<S>(name: &str, jobs: &[(PathBuf, Option<u64>)], threads: usize, mut spawn: S) -> Result<Loaders>
where
    S: FnMut(thread::Builder, LoaderJob) -> io::Result<JoinHandle<()>>,
{
    let mut receivers = Vec::with_capacity(threads);
    let mut workers = Vec::with_capacity(threads);
    for w in 0..threads {
        let (tx, rx) = sync_channel::<Result<Vec<Example>>>(PREFETCH_PER_WORKER);
        let mine: Vec<(PathBuf, Option<u64>)> = jobs.iter().skip(w).step_by(threads).cloned().collect();
        let job: LoaderJob = Box::new(move || {
            for (path, seed) in mine {
                let loaded = read_shard(&path).map(|mut examples| {
                    if let Some(seed) = seed {
                        examples.shuffle(&mut XorShiftRng::seed_from_u64(seed));
                    }
                    examples
                });
                if tx.send(loaded).is_err() {
                    break;
                }
            }
        });
        match spawn(thread::Builder::new().name(format!("{name}-loader-{w}")), job) {
            Ok(handle) => {
                receivers.push(rx);
                workers.push(handle);
            }
            Err(e) => {
                drop(receivers);
                for handle in workers {
                    if handle.join().is_err() {
                        warn!(streamer = %name, "loader thread panicked");
                    }
                }
                return Err(Error::Loader(format!(
                    "failed to spawn loader thread {w} of {threads} for `{name}`: {e}"
                )));
            }
        }
    }
    Ok((receivers, workers))
}

/// One pass over a split. Yields batches and dispatches hooks.
pub struct Epoch<'a> {
    hooks: &'a mut Vec<Box<dyn BatchHook>>,
    receivers: Vec<Receiver<Result<Vec<Example>>>>,
    workers: Vec<JoinHandle<()>>,
    next_shard: usize,
    num_shards: usize,
    buffer: VecDeque<Example>,
    batch_size: usize,
    state: StreamState,
    last_loss: Option<f32>,
    failed: bool,
}

impl Epoch<'_> {
    /// Record the loss of the batch just processed; hooks see it with the next batch.
    pub fn record_loss(&mut self, loss: f32) {
        self.state.loss = Some(loss);
        self.last_loss = Some(loss);
    }

    /// Most recently recorded loss of this epoch.
    pub fn last_loss(&self) -> Option<f32> {
        self.last_loss
    }

    fn fill(&mut self) -> Result<()> {
        while self.buffer.len() < self.batch_size && self.next_shard < self.num_shards {
            if self.receivers.is_empty() {
                return Err(Error::Loader("no loader threads running".into()));
            }
            let rx = &self.receivers[self.next_shard % self.receivers.len()];
            let examples = rx
                .recv()
                .map_err(|_| Error::Loader(format!("shard {} was never delivered", self.next_shard)))??;
            self.buffer.extend(examples);
            self.next_shard += 1;
        }
        Ok(())
    }
}

impl Iterator for Epoch<'_> {
    type Item = Result<Batch>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        if let Err(e) = self.fill() {
            self.failed = true;
            return Some(Err(e));
        }
        if self.buffer.is_empty() {
            return None;
        }
        let take = self.batch_size.min(self.buffer.len());
        let batch = Batch::from_examples(self.buffer.drain(..take));

        for hook in self.hooks.iter_mut() {
            hook.on_batch(&self.state);
        }
        self.state.loss = None;
        self.state.batch += 1;
        Some(Ok(batch))
    }
}

impl Drop for Epoch<'_> {
    fn drop(&mut self) {
        // Closing the channels unblocks workers still sending.
        self.receivers.clear();
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                warn!("loader thread panicked");
            }
        }
    }
}

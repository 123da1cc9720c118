//! synkge - train link predictors whose head entities are encoded from
//! their synset definitions.
//!
//! # Usage
//!
//! ```bash
//! # Preprocess WN18RR and train ConvE with a definition encoder
//! synkge --data WN18RR --definitions definitions/ --preprocess --model conve
//!
//! # Continue from the best checkpoint of an identical configuration
//! synkge --data WN18RR --definitions definitions/ --resume
//!
//! # Evaluate a lookup-table baseline first, then train the encoder model
//! synkge --data WN18RR --definitions definitions/ --initialize saved_models/WN18RR_conve.model
//!
//! # Export definition representations without further training
//! synkge --data WN18RR --definitions definitions/ --resume --epochs 0 --represent reps/wn.bin
//! ```
//!
//! Log verbosity follows `RUST_LOG` (default `info`).

use std::path::PathBuf;

use anyhow::{Context, Result};
use candle_core::Device;
use clap::{Parser, ValueEnum};
use tracing::info;
use tracing_subscriber::EnvFilter;

use synkge_kge::{RunConfig, Trainer};
use synkge_nn::{EncoderConfig, ModelConfig, ModelKind};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModelArg {
    Conve,
    Distmult,
    Complex,
}

impl From<ModelArg> for ModelKind {
    fn from(m: ModelArg) -> Self {
        match m {
            ModelArg::Conve => ModelKind::ConvE,
            ModelArg::Distmult => ModelKind::DistMult,
            ModelArg::Complex => ModelKind::ComplEx,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "synkge")]
#[command(about = "Link prediction for knowledge graphs with definition-encoded heads", long_about = None)]
struct Args {
    /// Dataset name, a directory under --data-root
    #[arg(long, default_value = "WN18RR")]
    data: String,

    #[arg(long, default_value = "data")]
    data_root: PathBuf,

    /// Directory of `id<TAB>[alias<TAB>]definition` files
    #[arg(long, default_value = "definitions")]
    definitions: PathBuf,

    #[arg(long, default_value = "saved_models")]
    save_dir: PathBuf,

    #[arg(long, value_enum, default_value = "conve")]
    model: ModelArg,

    /// Extra tag in the checkpoint file name
    #[arg(long, default_value = "")]
    model_suffix: String,

    #[arg(long, default_value = "128")]
    batch_size: usize,

    #[arg(long, default_value = "128")]
    test_batch_size: usize,

    #[arg(long, default_value = "1000")]
    epochs: usize,

    #[arg(long, default_value = "0.003")]
    lr: f64,

    /// Multiply the learning rate by this factor after every epoch
    #[arg(long, default_value = "1.0")]
    lr_decay: f64,

    /// Weight decay
    #[arg(long, default_value = "0.0")]
    l2: f64,

    #[arg(long, default_value = "0.1")]
    label_smoothing: f64,

    #[arg(long, default_value = "17")]
    seed: u64,

    /// Batches between progress log lines
    #[arg(long, default_value = "100")]
    log_interval: usize,

    /// Epochs between dev/test evaluations
    #[arg(long, default_value = "5")]
    eval_every: usize,

    /// Rebuild vocabularies and shards before training
    #[arg(long)]
    preprocess: bool,

    /// Load the checkpoint of this configuration before training
    #[arg(long, conflicts_with = "initialize")]
    resume: bool,

    /// Lookup-table checkpoint to evaluate as a baseline
    #[arg(long)]
    initialize: Option<PathBuf>,

    /// Write definition representations here after training
    #[arg(long)]
    represent: Option<PathBuf>,

    #[arg(long, default_value = "4")]
    loader_threads: usize,

    #[arg(long, default_value = "200")]
    embedding_dim: usize,

    /// First side of the reshaped 2D embedding (ConvE)
    #[arg(long, default_value = "20")]
    embedding_shape1: usize,

    #[arg(long, default_value = "0.2")]
    input_drop: f32,

    #[arg(long, default_value = "0.3")]
    hidden_drop: f32,

    #[arg(long, default_value = "0.2")]
    feat_drop: f32,

    /// Flattened ConvE feature size; checked against the embedding shape
    #[arg(long)]
    hidden_size: Option<usize>,

    /// Use a bias in the ConvE convolution
    #[arg(long)]
    use_bias: bool,

    #[arg(long, default_value = "100")]
    word_dim: usize,

    /// Hidden size of each encoder LSTM direction
    #[arg(long, default_value = "150")]
    encoder_hidden: usize,

    /// Truncate definitions to this many tokens
    #[arg(long)]
    max_definition_len: Option<usize>,

    /// Run on the CPU even if CUDA is available
    #[arg(long)]
    cpu: bool,
}

impl Args {
    fn run_config(&self) -> RunConfig {
        let mut model = ModelConfig::default()
            .with_kind(self.model.into())
            .with_embedding_dim(self.embedding_dim)
            .with_embedding_shape1(self.embedding_shape1)
            .with_dropout(self.input_drop, self.hidden_drop, self.feat_drop)
            .with_bias(self.use_bias);
        if let Some(h) = self.hidden_size {
            model = model.with_hidden_size(h);
        }
        let encoder = EncoderConfig::default()
            .with_word_dim(self.word_dim)
            .with_hidden_dim(self.encoder_hidden);

        let mut config = RunConfig::new(&self.data)
            .with_data_root(&self.data_root)
            .with_definitions(&self.definitions)
            .with_save_dir(&self.save_dir)
            .with_model_suffix(&self.model_suffix)
            .with_batch_sizes(self.batch_size, self.test_batch_size)
            .with_epochs(self.epochs)
            .with_lr(self.lr)
            .with_lr_decay(self.lr_decay)
            .with_l2(self.l2)
            .with_label_smoothing(self.label_smoothing)
            .with_seed(self.seed)
            .with_log_interval(self.log_interval)
            .with_eval_every(self.eval_every)
            .with_loader_threads(self.loader_threads)
            .with_preprocess(self.preprocess)
            .with_resume(self.resume)
            .with_model(model)
            .with_encoder(encoder);
        if let Some(path) = &self.initialize {
            config = config.with_initialize(path);
        }
        if let Some(path) = &self.represent {
            config = config.with_represent(path);
        }
        if let Some(len) = self.max_definition_len {
            config = config.with_max_definition_len(len);
        }
        config
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing();

    let device = if args.cpu {
        Device::Cpu
    } else {
        Device::cuda_if_available(0).context("Failed to probe for a CUDA device")?
    };
    info!(device = ?device, "starting");

    let mut trainer = Trainer::new(args.run_config(), &device)
        .with_context(|| format!("Failed to set up training for {}", args.data))?;
    let report = trainer.run().with_context(|| format!("Training on {} failed", args.data))?;

    let summary = serde_json::json!({
        "dataset": args.data,
        "model": ModelKind::from(args.model).to_string(),
        "epochs": report.epochs.len(),
        "final_loss": report.epochs.last().map(|e| e.last_loss),
        "initial_dev_mrr": report.initial_dev.mrr,
        "best_dev_mrr": report.best_dev_mrr,
        "checkpoints_saved": report.checkpoints_saved,
        "checkpoint": trainer.checkpoint_path().display().to_string(),
        "last_test_mrr": report.last_test.as_ref().map(|m| m.mrr),
        "export": report.export.as_ref().map(|e| e.pooled_path.display().to_string()),
    });
    println!("{summary}");
    Ok(())
}

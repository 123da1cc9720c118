//! Training orchestration for definition-encoded link prediction.
//!
//! ```text
//! Trainer::new
//!   validate config -> [preprocess] -> vocabularies + definitions
//!   -> train / dev_ranking / test_ranking streamers
//!   -> [--initialize: evaluate a lookup baseline, then drop it]
//!   -> definition model -> [--resume: load checkpoint, evaluate]
//! Trainer::run
//!   dev evaluation
//!   for epoch: train -> (every `eval_every`, epoch > 0) dev, checkpoint on
//!              improvement, test -> lr decay
//!   [--represent: export]
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use candle_core::{Device, Tensor};
use candle_nn::optim::{AdamW, Optimizer, ParamsAdamW};
use tracing::{debug, info};

use synkge_core::{
    Batch, BatcherConfig, DefinitionCorpus, DefinitionResolver, EtaHook, LossHook, Pipeline, Split,
    StreamBatcher, Vocabularies,
};
use synkge_nn::{bce_with_logits, LinkPredictor, ParamReport};

use crate::checkpoint::checkpoint_path;
use crate::config::RunConfig;
use crate::error::{Error, Result, Stage, StageContext};
use crate::evaluation::{ranking_and_hits, RankMetrics};
use crate::export::{export_representations, ExportReport};
use crate::smoothing::smooth_labels;

/// Loss statistics of one training epoch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpochSummary {
    pub epoch: usize,
    pub batches: usize,
    pub mean_loss: f32,
    /// Loss of the final batch.
    pub last_loss: f32,
}

/// Test and dev results of a model evaluated before training.
#[derive(Debug, Clone, PartialEq)]
pub struct PreTrainingEval {
    pub test: RankMetrics,
    pub dev: RankMetrics,
}

/// What a call to [`Trainer::run`] did.
#[derive(Debug, Clone, Default)]
pub struct TrainingReport {
    pub initial_dev: RankMetrics,
    pub epochs: Vec<EpochSummary>,
    pub best_dev_mrr: f64,
    /// `(epoch, dev MRR)` of every in-training evaluation, in order.
    pub dev_mrrs: Vec<(usize, f64)>,
    pub checkpoints_saved: usize,
    pub last_dev: Option<RankMetrics>,
    pub last_test: Option<RankMetrics>,
    pub export: Option<ExportReport>,
}

/// Owns the streamers, the model and the optimizer of one run.
pub struct Trainer {
    config: RunConfig,
    vocabs: Vocabularies,
    corpus: Arc<DefinitionCorpus>,
    resolver: DefinitionResolver,
    train: StreamBatcher,
    dev: StreamBatcher,
    test: StreamBatcher,
    model: LinkPredictor,
    optimizer: AdamW,
    checkpoint: PathBuf,
    best_dev_mrr: f64,
    baseline: Option<PreTrainingEval>,
    resumed: Option<PreTrainingEval>,
}

impl Trainer {
    pub fn new(config: RunConfig, device: &Device) -> Result<Self> {
        let ds = config.dataset.clone();
        config.validate().at_stage(Stage::Configuration, &ds, None)?;
        let resolved = serde_json::to_string(&config)
            .map_err(|e| Error::InvalidConfig(format!("configuration is not serializable: {e}")))
            .at_stage(Stage::Configuration, &ds, None)?;
        info!(config = %resolved, device = ?device, "resolved configuration");
        if device.is_cuda() {
            device.set_seed(config.seed).at_stage(Stage::Configuration, &ds, None)?;
        }

        let pipeline = Pipeline::new(&config.data_root, &ds);
        if config.preprocess {
            let report = pipeline.execute(true).at_stage(Stage::Preprocess, &ds, None)?;
            info!(
                entities = report.num_entities,
                relations = report.num_relations,
                "preprocessing finished"
            );
        }
        let vocabs = pipeline.load_vocabs().at_stage(Stage::BatchLoad, &ds, None)?;

        let mut corpus =
            DefinitionCorpus::load_dir(&config.definitions).at_stage(Stage::BatchLoad, &ds, None)?;
        if let Some(max_len) = config.max_definition_len {
            corpus = corpus.with_max_len(max_len);
        }
        let corpus = Arc::new(corpus);
        let resolver = DefinitionResolver::new(&vocabs.entity, Arc::clone(&corpus));
        let (covered, total) = resolver.coverage();
        info!(covered, total, "entities with a definition");

        let paths = pipeline.paths();
        let train_cfg = BatcherConfig {
            batch_size: config.batch_size,
            randomize: true,
            loader_threads: config.loader_threads,
            seed: config.seed,
        };
        let eval_cfg = BatcherConfig {
            batch_size: config.test_batch_size,
            randomize: false,
            ..train_cfg
        };
        let mut train = StreamBatcher::open(paths.split_dir(Split::Train), "train", train_cfg)
            .at_stage(Stage::BatchLoad, &ds, None)?;
        train.subscribe(Box::new(EtaHook::new("train", config.log_interval)));
        train.subscribe(Box::new(LossHook::new("train", config.log_interval)));
        let mut dev = StreamBatcher::open(paths.split_dir(Split::DevRanking), "dev_ranking", eval_cfg)
            .at_stage(Stage::BatchLoad, &ds, None)?;
        let mut test = StreamBatcher::open(paths.split_dir(Split::TestRanking), "test_ranking", eval_cfg)
            .at_stage(Stage::BatchLoad, &ds, None)?;

        let num_entities = vocabs.num_entities();
        let num_relations = vocabs.num_relations();

        let baseline = match &config.initialize {
            Some(path) => {
                let mut base = LinkPredictor::with_lookup(&config.model, num_entities, num_relations, device)
                    .at_stage(Stage::ModelLoad, &ds, None)?;
                base.load(path).at_stage(Stage::ModelLoad, &ds, None)?;
                info!(path = %path.display(), "loaded baseline model");
                log_parameters(&base).at_stage(Stage::ModelLoad, &ds, None)?;
                Some(evaluate_pair(&base, &mut test, &mut dev, None, &ds)?)
            }
            None => None,
        };

        let mut model = LinkPredictor::with_definition_encoder(
            &config.model,
            &config.encoder,
            corpus.word_vocab_size(),
            num_entities,
            num_relations,
            device,
        )
        .at_stage(Stage::ModelLoad, &ds, None)?;

        let checkpoint = checkpoint_path(
            &config.save_dir,
            &ds,
            config.model.kind,
            config.model.input_drop,
            config.model.hidden_drop,
            &config.model_suffix,
        );
        let resumed = if config.resume {
            model.load(&checkpoint).at_stage(Stage::ModelLoad, &ds, None)?;
            info!(path = %checkpoint.display(), "resumed from checkpoint");
            log_parameters(&model).at_stage(Stage::ModelLoad, &ds, None)?;
            Some(evaluate_pair(&model, &mut test, &mut dev, Some(&resolver), &ds)?)
        } else {
            None
        };

        let report = log_parameters(&model).at_stage(Stage::ModelLoad, &ds, None)?;
        debug!(tensors = report.entries.len(), "model assembled");

        let params = ParamsAdamW {
            lr: config.lr,
            weight_decay: config.l2,
            ..Default::default()
        };
        let optimizer = AdamW::new(model.vars(), params).at_stage(Stage::Configuration, &ds, None)?;

        Ok(Self {
            config,
            vocabs,
            corpus,
            resolver,
            train,
            dev,
            test,
            model,
            optimizer,
            checkpoint,
            // restarts at zero on resume, so the first evaluation always saves
            best_dev_mrr: 0.0,
            baseline,
            resumed,
        })
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn model(&self) -> &LinkPredictor {
        &self.model
    }

    pub fn vocabularies(&self) -> &Vocabularies {
        &self.vocabs
    }

    pub fn checkpoint_path(&self) -> &Path {
        &self.checkpoint
    }

    pub fn best_dev_mrr(&self) -> f64 {
        self.best_dev_mrr
    }

    /// Baseline results of `--initialize`, if it ran.
    pub fn baseline(&self) -> Option<&PreTrainingEval> {
        self.baseline.as_ref()
    }

    /// Results of the restored model of `--resume`, if it ran.
    pub fn resumed(&self) -> Option<&PreTrainingEval> {
        self.resumed.as_ref()
    }

    fn evaluate_dev(&mut self) -> Result<RankMetrics> {
        ranking_and_hits(&self.model, &mut self.dev, Some(&self.resolver), "dev_evaluation")
            .at_stage(Stage::ForwardPass, &self.config.dataset, None)
    }

    /// Train for the configured number of epochs, then export if requested.
    pub fn run(&mut self) -> Result<TrainingReport> {
        let ds = self.config.dataset.clone();
        let mut report = TrainingReport {
            initial_dev: self.evaluate_dev()?,
            ..Default::default()
        };

        for epoch in 0..self.config.epochs {
            let summary = self.train_epoch(epoch)?;
            info!(
                epoch,
                batches = summary.batches,
                mean_loss = summary.mean_loss,
                last_loss = summary.last_loss,
                "epoch finished"
            );
            report.epochs.push(summary);

            if epoch % self.config.eval_every == 0 && epoch > 0 {
                let dev = ranking_and_hits(&self.model, &mut self.dev, Some(&self.resolver), "dev_evaluation")
                    .at_stage(Stage::ForwardPass, &ds, Some(epoch))?;
                report.dev_mrrs.push((epoch, dev.mrr));
                if dev.mrr > self.best_dev_mrr {
                    info!(
                        path = %self.checkpoint.display(),
                        "saving, MRR {:.4} -> {:.4}",
                        self.best_dev_mrr,
                        dev.mrr
                    );
                    self.save_checkpoint().at_stage(Stage::Checkpoint, &ds, Some(epoch))?;
                    self.best_dev_mrr = dev.mrr;
                    report.checkpoints_saved += 1;
                }
                report.last_dev = Some(dev);

                let test = ranking_and_hits(&self.model, &mut self.test, Some(&self.resolver), "test_evaluation")
                    .at_stage(Stage::ForwardPass, &ds, Some(epoch))?;
                report.last_test = Some(test);
            }

            if self.config.lr_decay != 1.0 {
                let lr = self.optimizer.learning_rate() * self.config.lr_decay;
                self.optimizer.set_learning_rate(lr);
                debug!(epoch, lr, "learning rate decayed");
            }
        }
        report.best_dev_mrr = self.best_dev_mrr;

        if let Some(path) = self.config.represent.clone() {
            report.export = Some(self.export(&path)?);
        }
        Ok(report)
    }

    /// Write pooled and projected representations of every corpus synset.
    pub fn export(&self, path: &Path) -> Result<ExportReport> {
        export_representations(&self.model, &self.corpus, self.config.test_batch_size, path, true)
            .at_stage(Stage::Export, &self.config.dataset, None)
    }

    fn train_epoch(&mut self, epoch: usize) -> Result<EpochSummary> {
        let ds = self.config.dataset.as_str();
        let smoothing = self.config.label_smoothing;
        let mut batches = self.train.epoch().at_stage(Stage::BatchLoad, ds, Some(epoch))?;
        let mut total = 0.0f32;
        let mut count = 0usize;
        let mut last = f32::NAN;

        while let Some(batch) = batches.next() {
            let batch = batch.at_stage(Stage::BatchLoad, ds, Some(epoch))?;
            let loss = train_step(&self.model, &mut self.optimizer, &self.resolver, &batch, smoothing)
                .at_stage(Stage::ForwardPass, ds, Some(epoch))?;
            batches.record_loss(loss);
            total += loss;
            count += 1;
            last = loss;
        }

        Ok(EpochSummary {
            epoch,
            batches: count,
            mean_loss: if count == 0 { f32::NAN } else { total / count as f32 },
            last_loss: last,
        })
    }

    fn save_checkpoint(&self) -> Result<()> {
        std::fs::create_dir_all(&self.config.save_dir).map_err(|source| Error::Io {
            path: self.config.save_dir.clone(),
            source,
        })?;
        self.model.save(&self.checkpoint)?;
        Ok(())
    }
}

/// One optimizer step on a batch: encode head definitions, score, BCE against smoothed targets.
fn train_step(
    model: &LinkPredictor,
    optimizer: &mut AdamW,
    resolver: &DefinitionResolver,
    batch: &Batch,
    smoothing: f64,
) -> Result<f32> {
    let definitions = resolver.resolve(&batch.e1);
    let encoded = model.encode(&definitions, true)?;

    let n = model.num_entities();
    let targets = Tensor::from_vec(batch.multi_hot_tails(n), (batch.len(), n), model.device())?;
    let targets = smooth_labels(&targets, smoothing)?;

    let logits = model.score_heads(&encoded.projected, &batch.rel, true)?;
    let loss = bce_with_logits(&logits, &targets)?;
    optimizer.backward_step(&loss)?;
    Ok(loss.to_scalar::<f32>()?)
}

fn evaluate_pair(
    model: &LinkPredictor,
    test: &mut StreamBatcher,
    dev: &mut StreamBatcher,
    resolver: Option<&DefinitionResolver>,
    dataset: &str,
) -> Result<PreTrainingEval> {
    let test = ranking_and_hits(model, test, resolver, "test_evaluation")
        .at_stage(Stage::ForwardPass, dataset, None)?;
    let dev = ranking_and_hits(model, dev, resolver, "dev_evaluation")
        .at_stage(Stage::ForwardPass, dataset, None)?;
    Ok(PreTrainingEval { test, dev })
}

fn log_parameters(model: &LinkPredictor) -> Result<ParamReport> {
    let report = model.param_report()?;
    for entry in &report.entries {
        debug!(name = %entry.name, shape = ?entry.shape, count = entry.count, "parameter");
    }
    info!(
        kind = %model.kind(),
        tensors = report.entries.len(),
        total = report.total(),
        "model parameters"
    );
    Ok(report)
}

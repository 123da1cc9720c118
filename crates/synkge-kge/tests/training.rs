//! End-to-end runs on a five-entity toy graph.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use candle_core::Device;
use synkge_core::Pipeline;
use synkge_kge::{ErrorKind, RepresentationArchive, RunConfig, Stage, Trainer};
use synkge_nn::{EncoderConfig, LinkPredictor, ModelConfig, ModelKind};

// 10 triples over dog, wolf, canine, animal, tail
const TRAIN: &str = r#"{"e1": "dog", "rel": "hypernym", "rel_eval": "None", "e2": "None", "e2_multi1": "canine animal", "e2_multi2": "None"}
{"e1": "wolf", "rel": "hypernym", "rel_eval": "None", "e2": "None", "e2_multi1": "canine animal", "e2_multi2": "None"}
{"e1": "canine", "rel": "hypernym", "rel_eval": "None", "e2": "None", "e2_multi1": "animal", "e2_multi2": "None"}
{"e1": "tail", "rel": "part_of", "rel_eval": "None", "e2": "None", "e2_multi1": "dog wolf canine animal", "e2_multi2": "None"}
{"e1": "dog", "rel": "part_of", "rel_eval": "None", "e2": "None", "e2_multi1": "animal", "e2_multi2": "None"}
"#;

const DEV: &str = r#"{"e1": "dog", "rel": "hypernym", "rel_eval": "hypernym_reverse", "e2": "canine", "e2_multi1": "canine animal", "e2_multi2": "dog wolf"}
"#;

const TEST: &str = r#"{"e1": "wolf", "rel": "hypernym", "rel_eval": "hypernym_reverse", "e2": "animal", "e2_multi1": "canine animal", "e2_multi2": "dog wolf canine"}
"#;

const DEFINITIONS: &str = "dog\tdomestic carnivore that barks
wolf\twild carnivore related to the dog
canine\tany carnivore of the dog family
animal\ta living organism that moves
tail\tthe rear part of an animal body
";

fn write_toy(root: &Path) {
    let dir = root.join("data").join("toy");
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("e1rel_to_e2_train.json"), TRAIN).unwrap();
    fs::write(dir.join("e1rel_to_e2_ranking_dev.json"), DEV).unwrap();
    fs::write(dir.join("e1rel_to_e2_ranking_test.json"), TEST).unwrap();
    fs::write(dir.join("e1rel_to_e2_full.json"), format!("{TRAIN}{DEV}{TEST}")).unwrap();
    let defs = root.join("definitions");
    fs::create_dir_all(&defs).unwrap();
    fs::write(defs.join("toy.txt"), DEFINITIONS).unwrap();
}

/// Flattened values of every `encoder.*` variable.
fn encoder_snapshot(model: &LinkPredictor) -> BTreeMap<String, Vec<f32>> {
    let data = model.varmap().data().lock().unwrap();
    data.iter()
        .filter(|(name, _)| name.starts_with("encoder."))
        .map(|(name, var)| {
            let values = var.as_tensor().flatten_all().unwrap().to_vec1::<f32>().unwrap();
            (name.clone(), values)
        })
        .collect()
}

fn toy_config(root: &Path, kind: ModelKind) -> RunConfig {
    RunConfig::new("toy")
        .with_data_root(root.join("data"))
        .with_definitions(root.join("definitions"))
        .with_save_dir(root.join("saved_models"))
        .with_preprocess(true)
        .with_batch_sizes(5, 2)
        .with_loader_threads(2)
        .with_log_interval(1)
        .with_model(
            ModelConfig::default()
                .with_kind(kind)
                .with_embedding_dim(12)
                .with_embedding_shape1(3)
                .with_dropout(0.0, 0.0, 0.0),
        )
        .with_encoder(EncoderConfig::default().with_word_dim(8).with_hidden_dim(6))
}

#[test]
fn test_single_epoch_leaves_no_checkpoint() {
    let root = tempfile::tempdir().unwrap();
    write_toy(root.path());
    let mut trainer = Trainer::new(toy_config(root.path(), ModelKind::ConvE).with_epochs(1), &Device::Cpu).unwrap();

    let report = trainer.run().unwrap();
    assert_eq!(report.epochs.len(), 1);
    assert_eq!(report.epochs[0].batches, 1);
    assert!(report.epochs[0].last_loss.is_finite());
    assert_eq!(report.checkpoints_saved, 0);
    assert!(report.last_dev.is_none());
    assert!(!trainer.checkpoint_path().exists());
    assert!(report.initial_dev.num_queries > 0);
}

#[test]
fn test_loss_decreases() {
    let root = tempfile::tempdir().unwrap();
    write_toy(root.path());
    let config = toy_config(root.path(), ModelKind::DistMult)
        .with_epochs(40)
        .with_lr(0.01)
        .with_label_smoothing(0.0)
        .with_eval_every(1000);
    let mut trainer = Trainer::new(config, &Device::Cpu).unwrap();

    let report = trainer.run().unwrap();
    let first = report.epochs.first().unwrap().mean_loss;
    let last = report.epochs.last().unwrap().mean_loss;
    assert!(last < first, "loss went from {first} to {last}");
}

#[test]
fn test_resume_reproduces_saved_mrr() {
    let root = tempfile::tempdir().unwrap();
    write_toy(root.path());
    let config = toy_config(root.path(), ModelKind::DistMult).with_epochs(2).with_eval_every(1);
    let mut trainer = Trainer::new(config.clone(), &Device::Cpu).unwrap();
    let report = trainer.run().unwrap();
    assert_eq!(report.checkpoints_saved, 1);
    assert!(trainer.checkpoint_path().exists());
    let saved_mrr = report.best_dev_mrr;
    assert!(saved_mrr > 0.0);

    let resumed = Trainer::new(config.with_preprocess(false).with_resume(true), &Device::Cpu).unwrap();
    let eval = resumed.resumed().unwrap();
    assert!((eval.dev.mrr - saved_mrr).abs() < 1e-6, "{} vs {saved_mrr}", eval.dev.mrr);
    // the tracker restarts for the resumed run
    assert_eq!(resumed.best_dev_mrr(), 0.0);
}

#[test]
fn test_training_updates_every_encoder_parameter() {
    let root = tempfile::tempdir().unwrap();
    write_toy(root.path());
    let config = toy_config(root.path(), ModelKind::DistMult).with_epochs(1);
    let mut trainer = Trainer::new(config, &Device::Cpu).unwrap();
    let before = encoder_snapshot(trainer.model());
    assert!(!before.is_empty());

    trainer.run().unwrap();
    let after = encoder_snapshot(trainer.model());
    assert_eq!(before.keys().collect::<Vec<_>>(), after.keys().collect::<Vec<_>>());
    for (name, old) in &before {
        assert_ne!(old, &after[name], "`{name}` received no update");
    }
}

#[test]
fn test_resume_overwrites_checkpoint_at_first_evaluation() {
    let root = tempfile::tempdir().unwrap();
    write_toy(root.path());
    let config = toy_config(root.path(), ModelKind::DistMult).with_epochs(2).with_eval_every(1);
    let mut first = Trainer::new(config.clone(), &Device::Cpu).unwrap();
    assert_eq!(first.run().unwrap().checkpoints_saved, 1);
    let saved = fs::read(first.checkpoint_path()).unwrap();

    let mut resumed = Trainer::new(config.with_preprocess(false).with_resume(true), &Device::Cpu).unwrap();
    let report = resumed.run().unwrap();
    assert_eq!(report.dev_mrrs.len(), 1);
    assert_eq!(report.checkpoints_saved, 1);
    let overwritten = fs::read(resumed.checkpoint_path()).unwrap();
    assert_ne!(saved, overwritten);
}

#[test]
fn test_checkpoint_saved_only_on_strict_improvement() {
    let root = tempfile::tempdir().unwrap();
    write_toy(root.path());
    let config = toy_config(root.path(), ModelKind::DistMult)
        .with_epochs(10)
        .with_eval_every(1)
        .with_lr(0.01);
    let mut trainer = Trainer::new(config.clone(), &Device::Cpu).unwrap();
    let report = trainer.run().unwrap();

    let epochs: Vec<usize> = report.dev_mrrs.iter().map(|&(epoch, _)| epoch).collect();
    assert_eq!(epochs, (1..10).collect::<Vec<_>>());

    let mut best = 0.0;
    let mut improvements = 0;
    for &(_, mrr) in &report.dev_mrrs {
        if mrr > best {
            best = mrr;
            improvements += 1;
        }
    }
    assert_eq!(report.checkpoints_saved, improvements);
    assert_eq!(report.best_dev_mrr, best);

    // the file on disk holds the last improvement
    let resumed = Trainer::new(config.with_preprocess(false).with_resume(true), &Device::Cpu).unwrap();
    let eval = resumed.resumed().unwrap();
    assert!((eval.dev.mrr - best).abs() < 1e-6, "{} vs {best}", eval.dev.mrr);
}

#[test]
fn test_export_rows_match_synsets() {
    let root = tempfile::tempdir().unwrap();
    write_toy(root.path());
    let out = root.path().join("reps").join("toy.bin");
    let config = toy_config(root.path(), ModelKind::ComplEx)
        .with_epochs(0)
        .with_represent(&out);
    let mut trainer = Trainer::new(config, &Device::Cpu).unwrap();

    let report = trainer.run().unwrap();
    let export = report.export.unwrap();
    assert_eq!(export.rows, 5);
    assert_eq!(export.projected_path, root.path().join("reps").join("toy_projected.bin"));

    let pooled = RepresentationArchive::read(&export.pooled_path).unwrap();
    let projected = RepresentationArchive::read(&export.projected_path).unwrap();
    assert_eq!(pooled.synsets, ["dog", "wolf", "canine", "animal", "tail"]);
    assert_eq!(pooled.embeddings.dim(), (5, 12));
    // ComplEx heads are [real | imag]
    assert_eq!(projected.embeddings.dim(), (5, 24));

    let corpus = synkge_core::DefinitionCorpus::from_lines(DEFINITIONS.lines());
    for (row, id) in [(0usize, "dog"), (3, "animal")] {
        let again = trainer.model().encode(&corpus.batch(&[id]), false).unwrap();
        let again = again.projected.to_vec2::<f32>().unwrap().remove(0);
        for (a, b) in again.iter().zip(projected.embeddings.row(row).iter()) {
            assert!((a - b).abs() < 1e-5, "{id}: {a} vs {b}");
        }
    }
}

#[test]
fn test_initialize_evaluates_baseline_then_trains_encoder() {
    let root = tempfile::tempdir().unwrap();
    write_toy(root.path());
    let pipeline = Pipeline::new(root.path().join("data"), "toy");
    pipeline.execute(true).unwrap();
    let vocabs = pipeline.load_vocabs().unwrap();

    let config = toy_config(root.path(), ModelKind::DistMult).with_epochs(1);
    let baseline_path = root.path().join("baseline.model");
    LinkPredictor::with_lookup(&config.model, vocabs.num_entities(), vocabs.num_relations(), &Device::Cpu)
        .unwrap()
        .save(&baseline_path)
        .unwrap();

    let mut trainer = Trainer::new(config.with_initialize(&baseline_path), &Device::Cpu).unwrap();
    let baseline = trainer.baseline().unwrap();
    assert_eq!(baseline.dev.num_queries, 2);
    assert_eq!(baseline.test.num_queries, 2);
    assert!(trainer.model().uses_definitions());
    trainer.run().unwrap();
}

#[test]
fn test_missing_preprocessing_is_a_data_error() {
    let root = tempfile::tempdir().unwrap();
    write_toy(root.path());
    let config = toy_config(root.path(), ModelKind::DistMult).with_preprocess(false);
    let err = Trainer::new(config, &Device::Cpu).err().unwrap();
    assert_eq!(err.stage(), Some(Stage::BatchLoad));
    assert_eq!(err.kind(), ErrorKind::Data);
    assert!(err.to_string().contains("--preprocess"));
}

#[test]
fn test_conflicting_restore_flags_rejected() {
    let root = tempfile::tempdir().unwrap();
    write_toy(root.path());
    let config = toy_config(root.path(), ModelKind::DistMult)
        .with_resume(true)
        .with_initialize(root.path().join("x.model"));
    let err = Trainer::new(config, &Device::Cpu).err().unwrap();
    assert_eq!(err.stage(), Some(Stage::Configuration));
    assert_eq!(err.kind(), ErrorKind::Configuration);
}

#[cfg(unix)]
#[test]
fn test_unserializable_config_fails_at_configuration() {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;

    let root = tempfile::tempdir().unwrap();
    write_toy(root.path());
    let save_dir = Path::new(OsStr::from_bytes(b"saved_\xff"));
    let config = toy_config(root.path(), ModelKind::DistMult).with_save_dir(save_dir);
    let err = Trainer::new(config, &Device::Cpu).err().unwrap();
    assert_eq!(err.stage(), Some(Stage::Configuration));
    assert_eq!(err.kind(), ErrorKind::Configuration);
    assert!(err.to_string().contains("not serializable"), "{err}");
}

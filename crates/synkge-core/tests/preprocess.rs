//! Preprocessing integration tests on a toy WordNet-style dataset.

use std::fs;
use std::path::Path;

use synkge_core::shard::{read_shard, shard_path};
use synkge_core::{BatcherConfig, Pipeline, Split, StreamBatcher};

const TRAIN: &str = r#"{"e1": "dog", "rel": "hypernym", "rel_eval": "None", "e2": "None", "e2_multi1": "animal", "e2_multi2": "None"}
{"e1": "wolf", "rel": "hypernym", "rel_eval": "None", "e2": "None", "e2_multi1": "animal", "e2_multi2": "None"}
{"e1": "cat", "rel": "hypernym", "rel_eval": "None", "e2": "None", "e2_multi1": "animal", "e2_multi2": "None"}
{"e1": "lion", "rel": "hypernym", "rel_eval": "None", "e2": "None", "e2_multi1": "animal", "e2_multi2": "None"}
{"e1": "dog", "rel": "similar_to", "rel_eval": "None", "e2": "None", "e2_multi1": "wolf cat", "e2_multi2": "None"}
{"e1": "wolf", "rel": "similar_to", "rel_eval": "None", "e2": "None", "e2_multi1": "dog lion", "e2_multi2": "None"}
"#;

const DEV: &str = r#"{"e1": "Dog", "rel": "hypernym", "rel_eval": "hypernym", "e2": "animal", "e2_multi1": "animal", "e2_multi2": "dog wolf cat lion"}
"#;

const TEST: &str = r#"{"e1": "cat", "rel": "similar_to", "rel_eval": "similar_to", "e2": "lion", "e2_multi1": "lion", "e2_multi2": "cat"}
"#;

fn write_dataset(root: &Path) {
    let dir = root.join("toy");
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("e1rel_to_e2_train.json"), TRAIN).unwrap();
    fs::write(dir.join("e1rel_to_e2_ranking_dev.json"), DEV).unwrap();
    fs::write(dir.join("e1rel_to_e2_ranking_test.json"), TEST).unwrap();
    fs::write(dir.join("e1rel_to_e2_full.json"), format!("{TRAIN}{DEV}{TEST}")).unwrap();
}

#[test]
fn test_preprocess_is_idempotent() {
    let root = tempfile::tempdir().unwrap();
    write_dataset(root.path());
    let pipeline = Pipeline::new(root.path(), "toy").with_samples_per_shard(4);

    let first = pipeline.execute(true).unwrap();
    let vocab_first = pipeline.load_vocabs().unwrap();
    let shard_first = read_shard(&shard_path(&pipeline.paths().split_dir(Split::Train), 1)).unwrap();

    let second = pipeline.execute(true).unwrap();
    let vocab_second = pipeline.load_vocabs().unwrap();
    let shard_second = read_shard(&shard_path(&pipeline.paths().split_dir(Split::Train), 1)).unwrap();

    assert_eq!(first, second);
    assert_eq!(vocab_first, vocab_second);
    assert_eq!(shard_first, shard_second);

    // "", UNK, dog, none, animal, wolf, cat, lion
    assert_eq!(first.num_entities, 8);
    // "", UNK, hypernym, none, similar_to
    assert_eq!(first.num_relations, 5);
    assert_eq!(first.splits[0].1.num_examples, 6);
    assert_eq!(first.splits[0].1.num_shards, 2);
}

#[test]
fn test_tokens_are_lowercased_consistently() {
    let root = tempfile::tempdir().unwrap();
    write_dataset(root.path());
    let pipeline = Pipeline::new(root.path(), "toy");
    pipeline.execute(false).unwrap();
    let vocabs = pipeline.load_vocabs().unwrap();

    let dev = read_shard(&shard_path(&pipeline.paths().split_dir(Split::DevRanking), 0)).unwrap();
    assert_eq!(dev[0].e1, vocabs.entity.lookup("dog").unwrap());
    assert_eq!(dev[0].e2_multi2.len(), 4);
}

#[test]
fn test_stream_after_preprocess() {
    let root = tempfile::tempdir().unwrap();
    write_dataset(root.path());
    let pipeline = Pipeline::new(root.path(), "toy").with_samples_per_shard(4);
    pipeline.execute(true).unwrap();
    let vocabs = pipeline.load_vocabs().unwrap();

    let config = BatcherConfig {
        batch_size: 4,
        randomize: true,
        loader_threads: 2,
        seed: 1,
    };
    let mut train = StreamBatcher::open(pipeline.paths().split_dir(Split::Train), "train", config).unwrap();
    let batches: Vec<_> = train.epoch().unwrap().collect::<Result<Vec<_>, _>>().unwrap();
    assert_eq!(batches.iter().map(|b| b.len()).sum::<usize>(), 6);

    let targets = batches[0].multi_hot_tails(vocabs.num_entities());
    assert_eq!(targets.len(), batches[0].len() * vocabs.num_entities());
    let animal = vocabs.entity.lookup("animal").unwrap() as usize;
    let hot: usize = targets.iter().filter(|&&v| v == 1.0).count();
    assert!(hot >= batches[0].len());
    // four of the six records point at "animal", so any four of them include one
    assert!(targets.chunks(vocabs.num_entities()).any(|row| row[animal] == 1.0));
}

#[test]
fn test_missing_processed_dir() {
    let root = tempfile::tempdir().unwrap();
    let err = StreamBatcher::open(root.path().join("toy/processed/train"), "train", BatcherConfig::default())
        .unwrap_err();
    assert!(err.to_string().contains("--preprocess"));
}

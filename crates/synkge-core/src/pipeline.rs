//! Dataset preprocessing: vocabulary construction and shard materialization.
//!
//! Expected layout under `<data_root>/<dataset>/`:
//!
//! ```text
//! e1rel_to_e2_full.json           # vocabulary source
//! e1rel_to_e2_train.json
//! e1rel_to_e2_ranking_dev.json
//! e1rel_to_e2_ranking_test.json
//! processed/
//!   vocab.json
//!   train/{manifest.json, shard_00000.bin, ...}
//!   dev_ranking/...
//!   test_ranking/...
//! ```

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::record::{read_records, Example};
use crate::shard::{write_split, Manifest};
use crate::vocab::Vocabularies;

/// Default number of examples per shard file.
pub const SAMPLES_PER_SHARD: usize = 1000;

/// A materialized dataset split.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Split {
    Train,
    DevRanking,
    TestRanking,
}

impl Split {
    pub const ALL: [Split; 3] = [Split::Train, Split::DevRanking, Split::TestRanking];

    pub fn name(&self) -> &'static str {
        match self {
            Split::Train => "train",
            Split::DevRanking => "dev_ranking",
            Split::TestRanking => "test_ranking",
        }
    }

    fn source_file(&self) -> &'static str {
        match self {
            Split::Train => "e1rel_to_e2_train.json",
            Split::DevRanking => "e1rel_to_e2_ranking_dev.json",
            Split::TestRanking => "e1rel_to_e2_ranking_test.json",
        }
    }
}

impl fmt::Display for Split {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// File locations for one dataset.
#[derive(Debug, Clone)]
pub struct DatasetPaths {
    root: PathBuf,
}

impl DatasetPaths {
    pub fn new(data_root: impl AsRef<Path>, dataset: &str) -> Self {
        Self {
            root: data_root.as_ref().join(dataset),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn full(&self) -> PathBuf {
        self.root.join("e1rel_to_e2_full.json")
    }

    pub fn source(&self, split: Split) -> PathBuf {
        self.root.join(split.source_file())
    }

    pub fn processed(&self) -> PathBuf {
        self.root.join("processed")
    }

    pub fn vocab(&self) -> PathBuf {
        self.processed().join("vocab.json")
    }

    pub fn split_dir(&self, split: Split) -> PathBuf {
        self.processed().join(split.name())
    }
}

/// Outcome of a preprocessing run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreprocessReport {
    pub num_entities: usize,
    pub num_relations: usize,
    pub splits: Vec<(Split, Manifest)>,
}

/// Converts raw JSON triples into vocabularies and shards.
#[derive(Debug, Clone)]
pub struct Pipeline {
    paths: DatasetPaths,
    samples_per_shard: usize,
}

impl Pipeline {
    pub fn new(data_root: impl AsRef<Path>, dataset: &str) -> Self {
        Self {
            paths: DatasetPaths::new(data_root, dataset),
            samples_per_shard: SAMPLES_PER_SHARD,
        }
    }

    pub fn with_samples_per_shard(mut self, n: usize) -> Self {
        self.samples_per_shard = n;
        self
    }

    pub fn paths(&self) -> &DatasetPaths {
        &self.paths
    }

    /// Build vocabularies from the full file and write every split.
    ///
    /// With `delete_existing`, any previous `processed/` directory is
    /// removed first.
    pub fn execute(&self, delete_existing: bool) -> Result<PreprocessReport> {
        let processed = self.paths.processed();
        if delete_existing && processed.exists() {
            debug!(path = %processed.display(), "removing previous preprocessing output");
            fs::remove_dir_all(&processed).map_err(|e| Error::io(&processed, e))?;
        }
        fs::create_dir_all(&processed).map_err(|e| Error::io(&processed, e))?;

        let vocabs = self.build_vocabs()?;
        vocabs.save(self.paths.vocab())?;
        info!(
            entities = vocabs.num_entities(),
            relations = vocabs.num_relations(),
            "vocabulary built"
        );

        let mut splits = Vec::with_capacity(Split::ALL.len());
        for split in Split::ALL {
            let records = read_records(self.paths.source(split))?;
            let examples: Vec<Example> = records.iter().map(|r| r.to_example(&vocabs)).collect();
            let manifest = write_split(&self.paths.split_dir(split), &examples, self.samples_per_shard)?;
            info!(
                split = %split,
                examples = manifest.num_examples,
                shards = manifest.num_shards,
                "split materialized"
            );
            splits.push((split, manifest));
        }

        Ok(PreprocessReport {
            num_entities: vocabs.num_entities(),
            num_relations: vocabs.num_relations(),
            splits,
        })
    }

    fn build_vocabs(&self) -> Result<Vocabularies> {
        let records = read_records(self.paths.full())?;
        let mut vocabs = Vocabularies::default();
        for record in &records {
            let [e1, rel, rel_eval, e2] = record.scalars();
            vocabs.entity.add_token(&e1);
            vocabs.relation.add_token(&rel);
            vocabs.relation.add_token(&rel_eval);
            vocabs.entity.add_token(&e2);
            for t in record.tails().iter().chain(record.heads().iter()) {
                vocabs.entity.add_token(t);
            }
        }
        Ok(vocabs)
    }

    pub fn load_vocabs(&self) -> Result<Vocabularies> {
        Vocabularies::load(self.paths.vocab())
    }
}

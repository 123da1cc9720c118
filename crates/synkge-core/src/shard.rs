//! On-disk shards of indexed examples.
//!
//! Each split directory holds `shard_NNNNN.bin` files (gzip-compressed
//! bincode `Vec<Example>`) and a `manifest.json`.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::record::Example;

pub const MANIFEST_FILE: &str = "manifest.json";

/// Summary of a materialized split.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub num_examples: usize,
    pub num_shards: usize,
    pub samples_per_shard: usize,
}

impl Manifest {
    pub fn save(&self, dir: impl AsRef<Path>) -> Result<()> {
        let path = dir.as_ref().join(MANIFEST_FILE);
        let json = serde_json::to_string_pretty(self)?;
        fs::write(&path, json).map_err(|e| Error::io(&path, e))
    }

    pub fn load(dir: impl AsRef<Path>) -> Result<Self> {
        let path = dir.as_ref().join(MANIFEST_FILE);
        if !path.exists() {
            return Err(Error::NotPreprocessed(dir.as_ref().to_path_buf()));
        }
        let text = fs::read_to_string(&path).map_err(|e| Error::io(&path, e))?;
        Ok(serde_json::from_str(&text)?)
    }
}

pub fn shard_path(dir: &Path, index: usize) -> PathBuf {
    dir.join(format!("shard_{index:05}.bin"))
}

pub fn write_shard(path: &Path, examples: &[Example]) -> Result<()> {
    let file = File::create(path).map_err(|e| Error::io(path, e))?;
    let mut encoder = GzEncoder::new(BufWriter::new(file), Compression::default());
    bincode::serialize_into(&mut encoder, examples)?;
    let mut inner = encoder.finish().map_err(|e| Error::io(path, e))?;
    inner.flush().map_err(|e| Error::io(path, e))
}

pub fn read_shard(path: &Path) -> Result<Vec<Example>> {
    let file = File::open(path).map_err(|e| Error::io(path, e))?;
    let decoder = GzDecoder::new(BufReader::new(file));
    Ok(bincode::deserialize_from(decoder)?)
}

/// Write `examples` into `dir` in chunks of `samples_per_shard`.
pub fn write_split(dir: &Path, examples: &[Example], samples_per_shard: usize) -> Result<Manifest> {
    if samples_per_shard == 0 {
        return Err(Error::InvalidConfig("samples_per_shard must be > 0".into()));
    }
    fs::create_dir_all(dir).map_err(|e| Error::io(dir, e))?;
    let mut num_shards = 0;
    for (i, chunk) in examples.chunks(samples_per_shard).enumerate() {
        write_shard(&shard_path(dir, i), chunk)?;
        num_shards += 1;
    }
    let manifest = Manifest {
        num_examples: examples.len(),
        num_shards,
        samples_per_shard,
    };
    manifest.save(dir)?;
    Ok(manifest)
}

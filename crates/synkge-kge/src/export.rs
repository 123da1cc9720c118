//! Export of encoded definition representations.
//!
//! Two archives are written side by side: `<name>.<ext>` with the pooled
//! BiLSTM states and `<stem>_projected.<ext>` with the projected head
//! vectors. Both are gzip-compressed bincode of [`RepresentationArchive`],
//! and row `i` of `embeddings` belongs to `synsets[i]`.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use indicatif::{ProgressBar, ProgressStyle};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use tracing::info;

use synkge_core::DefinitionCorpus;
use synkge_nn::LinkPredictor;

use crate::error::{Error, Result};

/// Synset ids and one embedding row per id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepresentationArchive {
    pub synsets: Vec<String>,
    pub embeddings: Array2<f32>,
}

impl RepresentationArchive {
    pub fn write(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let io_err = |source| Error::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        let file = File::create(path).map_err(io_err)?;
        let mut encoder = GzEncoder::new(BufWriter::new(file), Compression::default());
        bincode::serialize_into(&mut encoder, self)?;
        encoder.finish().map_err(io_err)?;
        Ok(())
    }

    pub fn read(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(bincode::deserialize_from(GzDecoder::new(BufReader::new(file)))?)
    }
}

/// `dir/name.ext` -> `dir/name_projected.ext`
pub fn projected_path(path: &Path) -> PathBuf {
    let stem = path.file_stem().map(|s| s.to_string_lossy()).unwrap_or_default();
    let name = match path.extension() {
        Some(ext) => format!("{stem}_projected.{}", ext.to_string_lossy()),
        None => format!("{stem}_projected"),
    };
    path.with_file_name(name)
}

/// Paths and sizes of a finished export.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportReport {
    pub pooled_path: PathBuf,
    pub projected_path: PathBuf,
    pub rows: usize,
    pub pooled_dim: usize,
    pub projected_dim: usize,
}

/// Encode every synset of `corpus`, in corpus order, and write both archives.
pub fn export_representations(
    model: &LinkPredictor,
    corpus: &DefinitionCorpus,
    batch_size: usize,
    path: impl AsRef<Path>,
    show_progress: bool,
) -> Result<ExportReport> {
    let path = path.as_ref();
    let encoder = model
        .encoder()
        .ok_or_else(|| Error::InvalidConfig("export needs a definition encoder".into()))?;
    let pooled_dim = encoder.config().pooled_dim();
    let projected_dim = encoder.out_dim();
    let synsets = corpus.synsets().to_vec();
    let batch_size = batch_size.max(1);

    let progress = if show_progress {
        let pb = ProgressBar::new(synsets.len().div_ceil(batch_size) as u64);
        if let Ok(style) = ProgressStyle::with_template("{bar:40} {pos}/{len} batches {elapsed}") {
            pb.set_style(style);
        }
        pb
    } else {
        ProgressBar::hidden()
    };

    let mut pooled = Vec::with_capacity(synsets.len() * pooled_dim);
    let mut projected = Vec::with_capacity(synsets.len() * projected_dim);
    for chunk in synsets.chunks(batch_size) {
        let batch = corpus.batch(chunk);
        let encoded = model.encode(&batch, false)?;
        pooled.extend(encoded.pooled.flatten_all()?.to_vec1::<f32>()?);
        projected.extend(encoded.projected.flatten_all()?.to_vec1::<f32>()?);
        progress.inc(1);
    }
    progress.finish_and_clear();

    let rows = synsets.len();
    let pooled_archive = RepresentationArchive {
        synsets: synsets.clone(),
        embeddings: Array2::from_shape_vec((rows, pooled_dim), pooled)?,
    };
    let projected_archive = RepresentationArchive {
        synsets,
        embeddings: Array2::from_shape_vec((rows, projected_dim), projected)?,
    };

    let projected_out = projected_path(path);
    pooled_archive.write(path)?;
    projected_archive.write(&projected_out)?;
    info!(
        rows,
        pooled_dim,
        projected_dim,
        path = %path.display(),
        projected = %projected_out.display(),
        "exported definition representations"
    );
    Ok(ExportReport {
        pooled_path: path.to_path_buf(),
        projected_path: projected_out,
        rows,
        pooled_dim,
        projected_dim,
    })
}

//! Scorer plus head source, with parameters held in one [`VarMap`].

use std::path::Path;

use candle_core::{DType, Device, Tensor, Var};
use candle_nn::{VarBuilder, VarMap};
use tracing::debug;

use synkge_core::DefinitionBatch;

use crate::config::{EncoderConfig, ModelConfig, ModelKind};
use crate::encoder::{DefinitionEncoder, EncodedDefinitions};
use crate::error::{Error, Result};
use crate::models::{build_scorer, Scorer};

/// Where head vectors come from.
pub enum HeadSource {
    /// The scorer's own entity table.
    Lookup,
    /// Encoded synset definitions.
    Definitions(DefinitionEncoder),
}

/// One named parameter in a [`ParamReport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamEntry {
    pub name: String,
    pub shape: Vec<usize>,
    pub count: usize,
}

/// Per-tensor parameter sizes, sorted by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParamReport {
    pub entries: Vec<ParamEntry>,
}

impl ParamReport {
    pub fn total(&self) -> usize {
        self.entries.iter().map(|e| e.count).sum()
    }
}

/// Link predictor: a scorer whose head vectors come from a fixed [`HeadSource`].
///
/// Scorer weights live under `scorer.*` and encoder weights under `encoder.*`,
/// so a lookup-only checkpoint loads into the scorer half of a definition model.
pub struct LinkPredictor {
    varmap: VarMap,
    scorer: Box<dyn Scorer>,
    heads: HeadSource,
    config: ModelConfig,
    device: Device,
    num_entities: usize,
}

impl LinkPredictor {
    /// Entity-lookup model (the baseline).
    pub fn with_lookup(
        config: &ModelConfig,
        num_entities: usize,
        num_relations: usize,
        device: &Device,
    ) -> Result<Self> {
        config.validate()?;
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, device);
        let scorer = build_scorer(config, num_entities, num_relations, vb.pp("scorer"))?;
        Ok(Self {
            varmap,
            scorer,
            heads: HeadSource::Lookup,
            config: config.clone(),
            device: device.clone(),
            num_entities,
        })
    }

    /// Model whose head vectors come from a definition encoder.
    pub fn with_definition_encoder(
        config: &ModelConfig,
        encoder: &EncoderConfig,
        word_vocab_size: usize,
        num_entities: usize,
        num_relations: usize,
        device: &Device,
    ) -> Result<Self> {
        config.validate()?;
        encoder.validate()?;
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, device);
        let scorer = build_scorer(config, num_entities, num_relations, vb.pp("scorer"))?;
        let encoder = DefinitionEncoder::new(encoder, word_vocab_size, scorer.head_dim(), vb.pp("encoder"))?;
        Ok(Self {
            varmap,
            scorer,
            heads: HeadSource::Definitions(encoder),
            config: config.clone(),
            device: device.clone(),
            num_entities,
        })
    }

    pub fn kind(&self) -> ModelKind {
        self.scorer.kind()
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn num_entities(&self) -> usize {
        self.num_entities
    }

    pub fn head_dim(&self) -> usize {
        self.scorer.head_dim()
    }

    pub fn encoder(&self) -> Option<&DefinitionEncoder> {
        match &self.heads {
            HeadSource::Definitions(enc) => Some(enc),
            HeadSource::Lookup => None,
        }
    }

    pub fn uses_definitions(&self) -> bool {
        self.encoder().is_some()
    }

    /// Trainable variables (batch-norm running statistics included; they get no gradient).
    pub fn vars(&self) -> Vec<Var> {
        self.varmap.all_vars()
    }

    pub fn varmap(&self) -> &VarMap {
        &self.varmap
    }

    /// Score all tails for head entities looked up in the scorer's table.
    pub fn score_entities(&self, heads: &[u32], relations: &[u32], train: bool) -> Result<Tensor> {
        if self.uses_definitions() {
            return Err(Error::HeadSource(
                "model encodes definitions; entity lookup is disabled".into(),
            ));
        }
        let heads = Tensor::new(heads, &self.device)?;
        let heads = self.scorer.lookup_heads(&heads)?;
        self.score_heads(&heads, relations, train)
    }

    /// Encode definitions into head vectors.
    pub fn encode(&self, batch: &DefinitionBatch, train: bool) -> Result<EncodedDefinitions> {
        match &self.heads {
            HeadSource::Definitions(enc) => Ok(enc.forward(batch, &self.device, train)?),
            HeadSource::Lookup => Err(Error::HeadSource("model has no definition encoder".into())),
        }
    }

    /// Score all tails for precomputed head vectors (`B x head_dim`).
    pub fn score_heads(&self, heads: &Tensor, relations: &[u32], train: bool) -> Result<Tensor> {
        let (rows, width) = heads.dims2()?;
        if width != self.scorer.head_dim() {
            return Err(Error::DimensionMismatch {
                expected: self.scorer.head_dim(),
                got: width,
            });
        }
        if rows != relations.len() {
            return Err(Error::DimensionMismatch {
                expected: rows,
                got: relations.len(),
            });
        }
        let relations = Tensor::new(relations, &self.device)?;
        Ok(self.scorer.forward(heads, &relations, train)?)
    }

    /// Logits for a batch, taking heads from whichever source this model has.
    pub fn forward(
        &self,
        heads: &[u32],
        definitions: Option<&DefinitionBatch>,
        relations: &[u32],
        train: bool,
    ) -> Result<Tensor> {
        match (&self.heads, definitions) {
            (HeadSource::Lookup, _) => self.score_entities(heads, relations, train),
            (HeadSource::Definitions(_), Some(batch)) => {
                let encoded = self.encode(batch, train)?;
                self.score_heads(&encoded.projected, relations, train)
            }
            (HeadSource::Definitions(_), None) => Err(Error::HeadSource(
                "definition model called without definitions".into(),
            )),
        }
    }

    /// Write all parameters as safetensors, via a temporary sibling and a rename.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let tmp = path.with_extension("tmp");
        self.varmap.save(&tmp)?;
        std::fs::rename(&tmp, path)?;
        debug!(path = %path.display(), "saved model");
        Ok(())
    }

    /// Overwrite parameters from a safetensors file written by [`LinkPredictor::save`].
    ///
    /// Every variable of this model must be present in the file.
    pub fn load(&mut self, path: impl AsRef<Path>) -> Result<()> {
        self.varmap.load(path.as_ref())?;
        Ok(())
    }

    pub fn param_report(&self) -> Result<ParamReport> {
        let data = self
            .varmap
            .data()
            .lock()
            .map_err(|_| Error::InvalidConfig("parameter map lock poisoned".into()))?;
        let mut entries: Vec<ParamEntry> = data
            .iter()
            .map(|(name, var)| ParamEntry {
                name: name.clone(),
                shape: var.dims().to_vec(),
                count: var.elem_count(),
            })
            .collect();
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(ParamReport { entries })
    }
}

/// Mean binary cross-entropy on logits, `max(x, 0) - x*t + log(1 + exp(-|x|))`.
pub fn bce_with_logits(logits: &Tensor, targets: &Tensor) -> Result<Tensor> {
    let relu = logits.relu()?;
    let xt = (logits * targets)?;
    let softplus = logits.abs()?.neg()?.exp()?.affine(1.0, 1.0)?.log()?;
    Ok(((relu - xt)? + softplus)?.mean_all()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use synkge_core::DefinitionCorpus;

    fn small_config(kind: ModelKind) -> ModelConfig {
        ModelConfig::default()
            .with_kind(kind)
            .with_embedding_dim(12)
            .with_embedding_shape1(3)
    }

    #[test]
    fn test_lookup_model_rejects_encoding() {
        let model = LinkPredictor::with_lookup(&small_config(ModelKind::DistMult), 5, 2, &Device::Cpu).unwrap();
        let batch = DefinitionCorpus::from_lines(["x\tsome text"]).batch(&["x"]);
        assert!(matches!(model.encode(&batch, false), Err(Error::HeadSource(_))));
        assert_eq!(model.score_entities(&[0, 1], &[0, 1], false).unwrap().dims(), &[2, 5]);
    }

    #[test]
    fn test_definition_model_rejects_lookup() {
        let corpus = DefinitionCorpus::from_lines(["x\tsome text", "y\tother words here"]);
        let model = LinkPredictor::with_definition_encoder(
            &small_config(ModelKind::ComplEx),
            &EncoderConfig::default().with_word_dim(4).with_hidden_dim(3),
            corpus.word_vocab_size(),
            5,
            2,
            &Device::Cpu,
        )
        .unwrap();
        assert!(model.score_entities(&[0], &[0], false).is_err());
        let batch = corpus.batch(&["x", "y"]);
        let encoded = model.encode(&batch, false).unwrap();
        assert_eq!(encoded.projected.dims(), &[2, 24]);
        let logits = model.forward(&[0, 1], Some(&batch), &[0, 1], true).unwrap();
        assert_eq!(logits.dims(), &[2, 5]);
    }

    #[test]
    fn test_head_width_checked() {
        let model = LinkPredictor::with_lookup(&small_config(ModelKind::DistMult), 5, 2, &Device::Cpu).unwrap();
        let wrong = Tensor::zeros((1, 7), DType::F32, &Device::Cpu).unwrap();
        assert!(matches!(
            model.score_heads(&wrong, &[0], false),
            Err(Error::DimensionMismatch { expected: 12, got: 7 })
        ));
    }

    #[test]
    fn test_save_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("base.model");
        let config = small_config(ModelKind::DistMult);
        let base = LinkPredictor::with_lookup(&config, 5, 2, &Device::Cpu).unwrap();
        base.save(&path).unwrap();
        assert!(!path.with_extension("tmp").exists());

        let mut copy = LinkPredictor::with_lookup(&config, 5, 2, &Device::Cpu).unwrap();
        copy.load(&path).unwrap();
        let a = base.score_entities(&[3], &[1], false).unwrap().to_vec2::<f32>().unwrap();
        let b = copy.score_entities(&[3], &[1], false).unwrap().to_vec2::<f32>().unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_param_report_counts() {
        let model = LinkPredictor::with_lookup(&small_config(ModelKind::DistMult), 5, 2, &Device::Cpu).unwrap();
        let report = model.param_report().unwrap();
        let names: Vec<_> = report.entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["scorer.emb_e.weight", "scorer.emb_rel.weight"]);
        assert_eq!(report.total(), 5 * 12 + 2 * 12);
    }

    #[test]
    fn test_bce_matches_closed_form() {
        let device = Device::Cpu;
        let logits = Tensor::new(&[[0.0f32, 2.0], [-3.0, 50.0]], &device).unwrap();
        let targets = Tensor::new(&[[1.0f32, 0.0], [0.0, 1.0]], &device).unwrap();
        let loss = bce_with_logits(&logits, &targets).unwrap().to_scalar::<f32>().unwrap();
        let expected = [
            (2.0f32).ln(),
            (1.0 + 2.0f32.exp()).ln(),
            (1.0 + (-3.0f32).exp()).ln(),
            0.0,
        ];
        let expected = expected.iter().sum::<f32>() / 4.0;
        assert!((loss - expected).abs() < 1e-5, "{loss} vs {expected}");
    }
}

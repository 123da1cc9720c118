use candle_core::{Module, Result, Tensor};
use candle_nn::{embedding, Dropout, Embedding, VarBuilder};

use super::Scorer;
use crate::config::{ModelConfig, ModelKind};

/// Bilinear-diagonal scorer: `score(h, r, t) = <e_h, w_r, e_t>`.
pub struct DistMult {
    emb_e: Embedding,
    emb_rel: Embedding,
    inp_drop: Dropout,
    dim: usize,
}

impl DistMult {
    pub fn new(
        config: &ModelConfig,
        num_entities: usize,
        num_relations: usize,
        vb: VarBuilder,
    ) -> Result<Self> {
        let dim = config.embedding_dim;
        Ok(Self {
            emb_e: embedding(num_entities, dim, vb.pp("emb_e"))?,
            emb_rel: embedding(num_relations, dim, vb.pp("emb_rel"))?,
            inp_drop: Dropout::new(config.input_drop),
            dim,
        })
    }
}

impl Scorer for DistMult {
    fn kind(&self) -> ModelKind {
        ModelKind::DistMult
    }

    fn head_dim(&self) -> usize {
        self.dim
    }

    fn lookup_heads(&self, entities: &Tensor) -> Result<Tensor> {
        self.emb_e.forward(entities)
    }

    fn forward(&self, head: &Tensor, relations: &Tensor, train: bool) -> Result<Tensor> {
        let e1 = self.inp_drop.forward(head, train)?;
        let rel = self.inp_drop.forward(&self.emb_rel.forward(relations)?, train)?;
        (e1 * rel)?.matmul(&self.emb_e.embeddings().t()?)
    }
}

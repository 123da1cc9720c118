use candle_core::{Module, Result, Tensor};
use candle_nn::{embedding, Dropout, Embedding, VarBuilder};

use super::Scorer;
use crate::config::{ModelConfig, ModelKind};

/// Complex-valued bilinear scorer: `Re(<e_h, w_r, conj(e_t)>)`.
///
/// Real and imaginary parts live in separate tables. A head vector is the
/// concatenation `[real | imag]`, so its width is `2 * embedding_dim`.
///
/// # Reference
///
/// Trouillon et al., "Complex Embeddings for Simple Link Prediction", ICML 2016.
pub struct ComplEx {
    emb_e_real: Embedding,
    emb_e_img: Embedding,
    emb_rel_real: Embedding,
    emb_rel_img: Embedding,
    inp_drop: Dropout,
    dim: usize,
}

impl ComplEx {
    pub fn new(
        config: &ModelConfig,
        num_entities: usize,
        num_relations: usize,
        vb: VarBuilder,
    ) -> Result<Self> {
        let dim = config.embedding_dim;
        Ok(Self {
            emb_e_real: embedding(num_entities, dim, vb.pp("emb_e_real"))?,
            emb_e_img: embedding(num_entities, dim, vb.pp("emb_e_img"))?,
            emb_rel_real: embedding(num_relations, dim, vb.pp("emb_rel_real"))?,
            emb_rel_img: embedding(num_relations, dim, vb.pp("emb_rel_img"))?,
            inp_drop: Dropout::new(config.input_drop),
            dim,
        })
    }
}

impl Scorer for ComplEx {
    fn kind(&self) -> ModelKind {
        ModelKind::ComplEx
    }

    fn head_dim(&self) -> usize {
        2 * self.dim
    }

    fn lookup_heads(&self, entities: &Tensor) -> Result<Tensor> {
        let real = self.emb_e_real.forward(entities)?;
        let img = self.emb_e_img.forward(entities)?;
        Tensor::cat(&[&real, &img], 1)
    }

    fn forward(&self, head: &Tensor, relations: &Tensor, train: bool) -> Result<Tensor> {
        let dropout = |t: &Tensor| self.inp_drop.forward(t, train);
        let e1_real = dropout(&head.narrow(1, 0, self.dim)?)?;
        let e1_img = dropout(&head.narrow(1, self.dim, self.dim)?)?;
        let rel_real = dropout(&self.emb_rel_real.forward(relations)?)?;
        let rel_img = dropout(&self.emb_rel_img.forward(relations)?)?;

        let all_real = self.emb_e_real.embeddings().t()?;
        let all_img = self.emb_e_img.embeddings().t()?;

        let real_real_real = (&e1_real * &rel_real)?.matmul(&all_real)?;
        let real_img_img = (&e1_real * &rel_img)?.matmul(&all_img)?;
        let img_real_img = (&e1_img * &rel_real)?.matmul(&all_img)?;
        let img_img_real = (&e1_img * &rel_img)?.matmul(&all_real)?;

        ((real_real_real + real_img_img)? + img_real_img)? - img_img_real
    }
}

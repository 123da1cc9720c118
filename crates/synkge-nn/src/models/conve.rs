use candle_core::{Module, ModuleT, Result, Tensor};
use candle_nn::{
    batch_norm, conv2d, conv2d_no_bias, embedding, linear, BatchNorm, BatchNormConfig, Conv2d,
    Conv2dConfig, Dropout, Embedding, Init, Linear, VarBuilder,
};

use super::Scorer;
use crate::config::{ModelConfig, ModelKind, CONVE_CHANNELS, CONVE_KERNEL};

/// Convolutional 2D knowledge graph embeddings.
///
/// Head and relation embeddings are reshaped to `shape1 x shape2` images,
/// stacked along the height, convolved, projected back to `dim`, and matched
/// against every entity embedding plus a per-entity bias.
///
/// # Reference
///
/// Dettmers et al., "Convolutional 2D Knowledge Graph Embeddings", AAAI 2018.
pub struct ConvE {
    emb_e: Embedding,
    emb_rel: Embedding,
    inp_drop: Dropout,
    hidden_drop: Dropout,
    feature_drop: Dropout,
    conv1: Conv2d,
    bn0: BatchNorm,
    bn1: BatchNorm,
    bn2: BatchNorm,
    fc: Linear,
    bias: Tensor,
    dim: usize,
    shape1: usize,
    shape2: usize,
}

impl ConvE {
    pub fn new(
        config: &ModelConfig,
        num_entities: usize,
        num_relations: usize,
        vb: VarBuilder,
    ) -> Result<Self> {
        let dim = config.embedding_dim;
        let conv_cfg = Conv2dConfig::default();
        let conv1 = if config.use_bias {
            conv2d(1, CONVE_CHANNELS, CONVE_KERNEL, conv_cfg, vb.pp("conv1"))?
        } else {
            conv2d_no_bias(1, CONVE_CHANNELS, CONVE_KERNEL, conv_cfg, vb.pp("conv1"))?
        };
        Ok(Self {
            emb_e: embedding(num_entities, dim, vb.pp("emb_e"))?,
            emb_rel: embedding(num_relations, dim, vb.pp("emb_rel"))?,
            inp_drop: Dropout::new(config.input_drop),
            hidden_drop: Dropout::new(config.hidden_drop),
            feature_drop: Dropout::new(config.feat_drop),
            conv1,
            bn0: batch_norm(1, BatchNormConfig::default(), vb.pp("bn0"))?,
            bn1: batch_norm(CONVE_CHANNELS, BatchNormConfig::default(), vb.pp("bn1"))?,
            bn2: batch_norm(dim, BatchNormConfig::default(), vb.pp("bn2"))?,
            fc: linear(config.conv_output_size(), dim, vb.pp("fc"))?,
            bias: vb.get_with_hints(num_entities, "b", Init::Const(0.0))?,
            dim,
            shape1: config.embedding_shape1,
            shape2: config.embedding_shape2(),
        })
    }
}

impl Scorer for ConvE {
    fn kind(&self) -> ModelKind {
        ModelKind::ConvE
    }

    fn head_dim(&self) -> usize {
        self.dim
    }

    fn lookup_heads(&self, entities: &Tensor) -> Result<Tensor> {
        self.emb_e.forward(entities)
    }

    fn forward(&self, head: &Tensor, relations: &Tensor, train: bool) -> Result<Tensor> {
        let b = head.dim(0)?;
        let e1 = head.reshape((b, 1, self.shape1, self.shape2))?;
        let rel = self
            .emb_rel
            .forward(relations)?
            .reshape((b, 1, self.shape1, self.shape2))?;

        // (B, 1, 2*shape1, shape2)
        let x = Tensor::cat(&[&e1, &rel], 2)?;
        let x = self.bn0.forward_t(&x, train)?;
        let x = self.inp_drop.forward(&x, train)?;
        let x = self.conv1.forward(&x)?;
        let x = self.bn1.forward_t(&x, train)?.relu()?;
        let x = self.feature_drop.forward(&x, train)?;
        let x = self.fc.forward(&x.flatten_from(1)?)?;
        let x = self.hidden_drop.forward(&x, train)?;
        let x = self.bn2.forward_t(&x, train)?.relu()?;

        x.matmul(&self.emb_e.embeddings().t()?)?
            .broadcast_add(&self.bias)
    }
}

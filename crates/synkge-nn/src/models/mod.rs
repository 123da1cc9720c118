//! Link-prediction scoring functions.
//!
//! Every scorer maps a batch of head vectors and relation indices to logits
//! over all entities (`B x N`). The head vector normally comes from the
//! scorer's own entity table ([`Scorer::lookup_heads`]), but any producer of
//! a `B x head_dim` tensor can stand in for it, which is how the definition
//! encoder plugs in.
//!
//! - [`ConvE`]: 2D convolution over stacked head/relation embeddings (Dettmers et al., 2018)
//! - [`DistMult`]: bilinear diagonal (Yang et al., 2015)
//! - [`ComplEx`]: complex-valued bilinear (Trouillon et al., 2016)

mod complex;
mod conve;
mod distmult;

pub use complex::ComplEx;
pub use conve::ConvE;
pub use distmult::DistMult;

use candle_core::{Result, Tensor};
use candle_nn::VarBuilder;

use crate::config::{ModelConfig, ModelKind};

/// A scoring function over all candidate tail entities.
pub trait Scorer: Send + Sync {
    fn kind(&self) -> ModelKind;

    /// Width of the head vector consumed by [`Scorer::forward`].
    fn head_dim(&self) -> usize;

    /// Look up head vectors for entity indices (`B` u32 -> `B x head_dim`).
    fn lookup_heads(&self, entities: &Tensor) -> Result<Tensor>;

    /// Score every entity as the tail of `(head, relation)`.
    ///
    /// `relations` holds `B` u32 indices. Returns raw logits of shape `B x N`.
    fn forward(&self, head: &Tensor, relations: &Tensor, train: bool) -> Result<Tensor>;
}

/// Build the scorer named by `config.kind`.
pub fn build_scorer(
    config: &ModelConfig,
    num_entities: usize,
    num_relations: usize,
    vb: VarBuilder,
) -> Result<Box<dyn Scorer>> {
    Ok(match config.kind {
        ModelKind::ConvE => Box::new(ConvE::new(config, num_entities, num_relations, vb)?),
        ModelKind::DistMult => Box::new(DistMult::new(config, num_entities, num_relations, vb)?),
        ModelKind::ComplEx => Box::new(ComplEx::new(config, num_entities, num_relations, vb)?),
    })
}

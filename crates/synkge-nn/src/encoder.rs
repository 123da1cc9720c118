//! Bidirectional LSTM encoder over synset definitions.
//!
//! ```text
//! tokens (B x L) -> word embeddings (B x L x word_dim)
//!                -> forward LSTM over the sequence, backward LSTM over each
//!                   row's reversed valid prefix
//!                -> masked max-pool over time, per direction
//!                -> pooled (B x 2*hidden) -> linear -> projected (B x out_dim)
//! ```
//!
//! `projected` is sized to the scorer's head width, so it can replace an entity
//! lookup one-for-one. Padding positions are pushed to `-1e4` before pooling and
//! never win the max.

use candle_core::{Device, Module, Result, Tensor};
use candle_nn::rnn::Direction;
use candle_nn::{embedding, linear, lstm, Dropout, Embedding, LSTMConfig, Linear, VarBuilder, LSTM, RNN};

use synkge_core::DefinitionBatch;

use crate::config::EncoderConfig;

const MASK_PENALTY: f64 = 1e4;

/// Output of [`DefinitionEncoder::forward`].
#[derive(Debug, Clone)]
pub struct EncodedDefinitions {
    /// Head vectors for the scorer (`B x out_dim`).
    pub projected: Tensor,
    /// Max-pooled BiLSTM states before projection (`B x 2*hidden`).
    pub pooled: Tensor,
}

pub struct DefinitionEncoder {
    words: Embedding,
    forward_lstm: LSTM,
    backward_lstm: LSTM,
    projection: Linear,
    dropout: Dropout,
    config: EncoderConfig,
    out_dim: usize,
}

impl DefinitionEncoder {
    /// Create an encoder over `vocab_size` words whose output is `out_dim` wide.
    pub fn new(config: &EncoderConfig, vocab_size: usize, out_dim: usize, vb: VarBuilder) -> Result<Self> {
        let words = embedding(vocab_size, config.word_dim, vb.pp("words"))?;
        // both directions share a prefix; candle suffixes the backward weights with `_reverse`
        let forward_lstm = lstm(config.word_dim, config.hidden_dim, LSTMConfig::default(), vb.pp("lstm"))?;
        let backward_cfg = LSTMConfig {
            direction: Direction::Backward,
            ..Default::default()
        };
        let backward_lstm = lstm(config.word_dim, config.hidden_dim, backward_cfg, vb.pp("lstm"))?;
        let projection = linear(config.pooled_dim(), out_dim, vb.pp("projection"))?;
        Ok(Self {
            words,
            forward_lstm,
            backward_lstm,
            projection,
            dropout: Dropout::new(config.dropout),
            config: config.clone(),
            out_dim,
        })
    }

    pub fn config(&self) -> &EncoderConfig {
        &self.config
    }

    pub fn out_dim(&self) -> usize {
        self.out_dim
    }

    pub fn forward(&self, batch: &DefinitionBatch, device: &Device, train: bool) -> Result<EncodedDefinitions> {
        let shape = (batch.batch_size(), batch.max_len);
        let forward_ids = Tensor::from_vec(batch.tokens.clone(), shape, device)?;
        let backward_ids = Tensor::from_vec(batch.reversed_tokens(), shape, device)?;
        // additive mask, 0 on valid tokens and -1e4 on padding
        let penalty = Tensor::from_vec(batch.mask(), (shape.0, shape.1, 1), device)?
            .affine(MASK_PENALTY, -MASK_PENALTY)?;

        let fwd = self.pool_direction(&self.forward_lstm, &forward_ids, &penalty)?;
        let bwd = self.pool_direction(&self.backward_lstm, &backward_ids, &penalty)?;
        let pooled = Tensor::cat(&[&fwd, &bwd], 1)?;
        let projected = self
            .projection
            .forward(&self.dropout.forward(&pooled, train)?)?;
        Ok(EncodedDefinitions { projected, pooled })
    }

    fn pool_direction(&self, cell: &LSTM, ids: &Tensor, penalty: &Tensor) -> Result<Tensor> {
        let xs = self.words.forward(ids)?;
        let states = cell.seq(&xs)?;
        // (B, L, hidden)
        let hidden = cell.states_to_tensor(&states)?;
        hidden.broadcast_add(penalty)?.max(1)
    }
}

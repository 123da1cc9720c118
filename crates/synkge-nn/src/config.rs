//! Model and encoder hyperparameters.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Output channels of the ConvE convolution.
pub const CONVE_CHANNELS: usize = 32;
/// ConvE kernel side.
pub const CONVE_KERNEL: usize = 3;

/// Scoring function family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    ConvE,
    DistMult,
    ComplEx,
}

impl ModelKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelKind::ConvE => "conve",
            ModelKind::DistMult => "distmult",
            ModelKind::ComplEx => "complex",
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "conve" => Ok(ModelKind::ConvE),
            "distmult" => Ok(ModelKind::DistMult),
            "complex" => Ok(ModelKind::ComplEx),
            other => Err(Error::InvalidConfig(format!(
                "unknown model `{other}`, choose from conve, distmult, complex"
            ))),
        }
    }
}

/// Scoring model configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    pub kind: ModelKind,
    /// Embedding dimension (default: 200).
    pub embedding_dim: usize,
    /// First side of the reshaped 2D embedding; the second is inferred (default: 20).
    pub embedding_shape1: usize,
    /// Dropout on input embeddings (default: 0.2).
    pub input_drop: f32,
    /// Dropout on the hidden layer (default: 0.3).
    pub hidden_drop: f32,
    /// Dropout on convolutional features (default: 0.2).
    pub feat_drop: f32,
    /// Bias in the convolution (default: false).
    pub use_bias: bool,
    /// Expected flattened convolution size; derived when `None`.
    pub hidden_size: Option<usize>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            kind: ModelKind::ConvE,
            embedding_dim: 200,
            embedding_shape1: 20,
            input_drop: 0.2,
            hidden_drop: 0.3,
            feat_drop: 0.2,
            use_bias: false,
            hidden_size: None,
        }
    }
}

impl ModelConfig {
    pub fn with_kind(mut self, kind: ModelKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_embedding_dim(mut self, dim: usize) -> Self {
        self.embedding_dim = dim;
        self
    }

    pub fn with_embedding_shape1(mut self, shape1: usize) -> Self {
        self.embedding_shape1 = shape1;
        self
    }

    pub fn with_dropout(mut self, input: f32, hidden: f32, feat: f32) -> Self {
        self.input_drop = input;
        self.hidden_drop = hidden;
        self.feat_drop = feat;
        self
    }

    pub fn with_hidden_size(mut self, hidden_size: usize) -> Self {
        self.hidden_size = Some(hidden_size);
        self
    }

    pub fn with_bias(mut self, use_bias: bool) -> Self {
        self.use_bias = use_bias;
        self
    }

    /// Second side of the reshaped embedding.
    pub fn embedding_shape2(&self) -> usize {
        self.embedding_dim / self.embedding_shape1.max(1)
    }

    /// Width of the head vector the scorer consumes.
    pub fn head_dim(&self) -> usize {
        match self.kind {
            ModelKind::ComplEx => 2 * self.embedding_dim,
            _ => self.embedding_dim,
        }
    }

    /// Flattened size after the ConvE convolution over the stacked `2·shape1 × shape2` image.
    pub fn conv_output_size(&self) -> usize {
        let h = (2 * self.embedding_shape1).saturating_sub(CONVE_KERNEL - 1);
        let w = self.embedding_shape2().saturating_sub(CONVE_KERNEL - 1);
        CONVE_CHANNELS * h * w
    }

    pub fn validate(&self) -> Result<()> {
        if self.embedding_dim == 0 {
            return Err(Error::InvalidConfig("embedding_dim must be > 0".into()));
        }
        for (name, p) in [
            ("input_drop", self.input_drop),
            ("hidden_drop", self.hidden_drop),
            ("feat_drop", self.feat_drop),
        ] {
            if !(0.0..1.0).contains(&p) {
                return Err(Error::InvalidConfig(format!("{name} must be in [0, 1), got {p}")));
            }
        }
        if self.kind == ModelKind::ConvE {
            if self.embedding_shape1 == 0 || self.embedding_dim % self.embedding_shape1 != 0 {
                return Err(Error::InvalidConfig(format!(
                    "embedding_dim {} is not divisible by embedding_shape1 {}",
                    self.embedding_dim, self.embedding_shape1
                )));
            }
            if self.embedding_shape2() < CONVE_KERNEL {
                return Err(Error::InvalidConfig(format!(
                    "reshaped embedding {}x{} is smaller than the {CONVE_KERNEL}x{CONVE_KERNEL} kernel",
                    self.embedding_shape1,
                    self.embedding_shape2()
                )));
            }
            let derived = self.conv_output_size();
            if let Some(configured) = self.hidden_size {
                if configured != derived {
                    return Err(Error::InvalidConfig(format!(
                        "hidden_size {configured} does not match the convolution output {derived} \
                         for embedding {}x{}",
                        self.embedding_shape1,
                        self.embedding_shape2()
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Definition encoder configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncoderConfig {
    /// Word embedding size (default: 100).
    pub word_dim: usize,
    /// Hidden size of each LSTM direction (default: 150).
    pub hidden_dim: usize,
    /// Dropout on the pooled representation during training (default: 0.0).
    pub dropout: f32,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            word_dim: 100,
            hidden_dim: 150,
            dropout: 0.0,
        }
    }
}

impl EncoderConfig {
    pub fn with_word_dim(mut self, dim: usize) -> Self {
        self.word_dim = dim;
        self
    }

    pub fn with_hidden_dim(mut self, dim: usize) -> Self {
        self.hidden_dim = dim;
        self
    }

    /// Width of the pooled (unprojected) representation.
    pub fn pooled_dim(&self) -> usize {
        2 * self.hidden_dim
    }

    pub fn validate(&self) -> Result<()> {
        if self.word_dim == 0 || self.hidden_dim == 0 {
            return Err(Error::InvalidConfig("encoder dimensions must be > 0".into()));
        }
        if !(0.0..1.0).contains(&self.dropout) {
            return Err(Error::InvalidConfig(format!(
                "encoder dropout must be in [0, 1), got {}",
                self.dropout
            )));
        }
        Ok(())
    }
}

//! Token vocabularies for entities, relations and definition words.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Padding token, always index 0.
pub const PAD_TOKEN: &str = "";
/// Unknown token, always index 1.
pub const UNK_TOKEN: &str = "UNK";
/// Index of [`PAD_TOKEN`].
pub const PAD: u32 = 0;
/// Index of [`UNK_TOKEN`].
pub const UNK: u32 = 1;

/// Bidirectional token/index mapping.
///
/// Indices are assigned by first insertion, after the two reserved
/// tokens, so building the same stream twice gives the same vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct Vocab {
    idx2token: Vec<String>,
    token2idx: HashMap<String, u32>,
}

impl Vocab {
    pub fn new() -> Self {
        let mut vocab = Self {
            idx2token: Vec::new(),
            token2idx: HashMap::new(),
        };
        vocab.add_token(PAD_TOKEN);
        vocab.add_token(UNK_TOKEN);
        vocab
    }

    /// Insert a token if absent and return its index.
    pub fn add_token(&mut self, token: &str) -> u32 {
        if let Some(&idx) = self.token2idx.get(token) {
            return idx;
        }
        let idx = self.idx2token.len() as u32;
        self.idx2token.push(token.to_string());
        self.token2idx.insert(token.to_string(), idx);
        idx
    }

    /// Index of a token, or `None` if it was never added.
    pub fn lookup(&self, token: &str) -> Option<u32> {
        self.token2idx.get(token).copied()
    }

    /// Index of a token, falling back to [`UNK`].
    pub fn get_idx(&self, token: &str) -> u32 {
        self.lookup(token).unwrap_or(UNK)
    }

    /// Reverse mapping: index to original token.
    pub fn token(&self, idx: u32) -> Option<&str> {
        self.idx2token.get(idx as usize).map(String::as_str)
    }

    /// Number of tokens, reserved ones included.
    pub fn num_token(&self) -> usize {
        self.idx2token.len()
    }

    pub fn tokens(&self) -> &[String] {
        &self.idx2token
    }
}

impl Default for Vocab {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Vec<String>> for Vocab {
    fn from(idx2token: Vec<String>) -> Self {
        let token2idx = idx2token
            .iter()
            .enumerate()
            .map(|(i, t)| (t.clone(), i as u32))
            .collect();
        Self {
            idx2token,
            token2idx,
        }
    }
}

impl From<Vocab> for Vec<String> {
    fn from(vocab: Vocab) -> Self {
        vocab.idx2token
    }
}

/// Entity and relation vocabularies of one dataset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vocabularies {
    pub entity: Vocab,
    pub relation: Vocab,
}

impl Vocabularies {
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string(self)?;
        fs::write(path, json).map_err(|e| Error::io(path, e))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::NotPreprocessed(path.to_path_buf()));
        }
        let text = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn num_entities(&self) -> usize {
        self.entity.num_token()
    }

    pub fn num_relations(&self) -> usize {
        self.relation.num_token()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserved_tokens() {
        let vocab = Vocab::new();
        assert_eq!(vocab.num_token(), 2);
        assert_eq!(vocab.lookup(PAD_TOKEN), Some(PAD));
        assert_eq!(vocab.lookup(UNK_TOKEN), Some(UNK));
    }

    #[test]
    fn test_first_occurrence_order() {
        let mut vocab = Vocab::new();
        assert_eq!(vocab.add_token("dog"), 2);
        assert_eq!(vocab.add_token("cat"), 3);
        assert_eq!(vocab.add_token("dog"), 2);
        assert_eq!(vocab.token(3), Some("cat"));
        assert_eq!(vocab.get_idx("horse"), UNK);
    }

    #[test]
    fn test_serde_rebuilds_index() {
        let mut vocab = Vocab::new();
        vocab.add_token("a");
        vocab.add_token("b");
        let json = serde_json::to_string(&vocab).unwrap();
        assert_eq!(json, r#"["","UNK","a","b"]"#);
        let back: Vocab = serde_json::from_str(&json).unwrap();
        assert_eq!(back, vocab);
        assert_eq!(back.lookup("b"), Some(3));
    }

    proptest::proptest! {
        #[test]
        fn prop_indices_are_dense_and_invertible(tokens in proptest::collection::vec("[a-z]{1,6}", 0..40)) {
            let mut vocab = Vocab::new();
            for t in &tokens {
                vocab.add_token(t);
            }
            let distinct: std::collections::HashSet<&String> = tokens.iter().collect();
            proptest::prop_assert_eq!(vocab.num_token(), 2 + distinct.len());
            for t in &tokens {
                let idx = vocab.get_idx(t);
                proptest::prop_assert!(idx >= 2);
                proptest::prop_assert_eq!(vocab.token(idx), Some(t.as_str()));
            }
        }
    }
}

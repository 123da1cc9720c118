//! Synset definition corpus and padded token batches.
//!
//! A corpus directory holds tab-separated text files, one synset per line:
//!
//! ```text
//! 02084071<TAB>a member of the genus Canis
//! 02084071<TAB>__dog_NN_1<TAB>a member of the genus Canis
//! ```
//!
//! The optional middle column is an alias under which the same definition
//! is reachable. Lookups are case-insensitive.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::vocab::{Vocab, PAD, UNK};

/// Lower-case and split on anything that is not alphanumeric.
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Padded definitions, row-major `batch_size × max_len`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefinitionBatch {
    pub tokens: Vec<u32>,
    /// Number of valid tokens per row, always ≥ 1.
    pub lengths: Vec<usize>,
    pub max_len: usize,
}

impl DefinitionBatch {
    pub fn batch_size(&self) -> usize {
        self.lengths.len()
    }

    /// Each row's valid prefix reversed, padding kept at the end.
    pub fn reversed_tokens(&self) -> Vec<u32> {
        let mut out = vec![PAD; self.tokens.len()];
        for (row, &len) in self.lengths.iter().enumerate() {
            let base = row * self.max_len;
            for t in 0..len {
                out[base + t] = self.tokens[base + len - 1 - t];
            }
        }
        out
    }

    /// Row-major `batch_size × max_len` mask, 1.0 on valid positions.
    pub fn mask(&self) -> Vec<f32> {
        let mut out = vec![0.0f32; self.tokens.len()];
        for (row, &len) in self.lengths.iter().enumerate() {
            let base = row * self.max_len;
            out[base..base + len].iter_mut().for_each(|m| *m = 1.0);
        }
        out
    }
}

/// Definitions keyed by synset id, tokenized against a word vocabulary.
#[derive(Debug, Clone)]
pub struct DefinitionCorpus {
    synsets: Vec<String>,
    keys: HashMap<String, usize>,
    definitions: Vec<Vec<u32>>,
    words: Vocab,
    max_len: Option<usize>,
}

impl DefinitionCorpus {
    /// Load every `.txt`/`.tsv` file of `dir`, in file-name order.
    pub fn load_dir(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let entries = fs::read_dir(dir).map_err(|e| Error::io(dir, e))?;
        let mut files: Vec<PathBuf> = entries
            .filter_map(|e| e.ok().map(|e| e.path()))
            .filter(|p| {
                p.is_file()
                    && matches!(p.extension().and_then(|x| x.to_str()), Some("txt") | Some("tsv"))
            })
            .collect();
        files.sort();
        if files.is_empty() {
            return Err(Error::InvalidConfig(format!(
                "no definition files (*.txt, *.tsv) in {}",
                dir.display()
            )));
        }

        let mut text = String::new();
        for file in &files {
            debug!(file = %file.display(), "reading definitions");
            text.push_str(&fs::read_to_string(file).map_err(|e| Error::io(file, e))?);
            text.push('\n');
        }
        let corpus = Self::from_lines(text.lines());
        info!(
            synsets = corpus.len(),
            words = corpus.word_vocab_size(),
            dir = %dir.display(),
            "definition corpus loaded"
        );
        Ok(corpus)
    }

    /// Build from `id<TAB>[alias<TAB>]definition` lines. Repeated ids keep the first definition.
    pub fn from_lines<'a>(lines: impl IntoIterator<Item = &'a str>) -> Self {
        let mut corpus = Self {
            synsets: Vec::new(),
            keys: HashMap::new(),
            definitions: Vec::new(),
            words: Vocab::new(),
            max_len: None,
        };
        for line in lines {
            let fields: Vec<&str> = line.split('\t').map(str::trim).collect();
            let (id, alias, definition) = match fields.as_slice() {
                [id, definition] => (*id, None, *definition),
                [id, alias, definition, ..] => (*id, Some(*alias), *definition),
                _ => continue,
            };
            if id.is_empty() {
                continue;
            }
            let key = id.to_lowercase();
            if corpus.keys.contains_key(&key) {
                continue;
            }
            let tokens = tokenize(definition)
                .iter()
                .map(|w| corpus.words.add_token(w))
                .collect();
            let idx = corpus.definitions.len();
            corpus.definitions.push(tokens);
            corpus.synsets.push(id.to_string());
            corpus.keys.insert(key, idx);
            if let Some(alias) = alias.filter(|a| !a.is_empty()) {
                corpus.keys.entry(alias.to_lowercase()).or_insert(idx);
            }
        }
        corpus
    }

    /// Truncate definitions longer than `max_len` tokens when batching.
    pub fn with_max_len(mut self, max_len: usize) -> Self {
        self.max_len = (max_len > 0).then_some(max_len);
        self
    }

    /// Synset ids in corpus order.
    pub fn synsets(&self) -> &[String] {
        &self.synsets
    }

    pub fn len(&self) -> usize {
        self.synsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.synsets.is_empty()
    }

    pub fn word_vocab_size(&self) -> usize {
        self.words.num_token()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.keys.contains_key(&id.to_lowercase())
    }

    /// Token ids of a synset's definition.
    pub fn tokens(&self, id: &str) -> Option<&[u32]> {
        self.keys
            .get(&id.to_lowercase())
            .map(|&i| self.definitions[i].as_slice())
    }

    /// Pad the definitions of `ids`. Unknown ids and empty definitions become `[UNK]`.
    pub fn batch<S: AsRef<str>>(&self, ids: &[S]) -> DefinitionBatch {
        let rows: Vec<&[u32]> = ids
            .iter()
            .map(|id| match self.tokens(id.as_ref()) {
                Some(t) if !t.is_empty() => match self.max_len {
                    Some(m) => &t[..t.len().min(m)],
                    None => t,
                },
                _ => &[UNK][..],
            })
            .collect();
        let max_len = rows.iter().map(|r| r.len()).max().unwrap_or(1);
        let mut tokens = vec![PAD; rows.len() * max_len];
        for (i, row) in rows.iter().enumerate() {
            tokens[i * max_len..i * max_len + row.len()].copy_from_slice(row);
        }
        DefinitionBatch {
            tokens,
            lengths: rows.iter().map(|r| r.len()).collect(),
            max_len,
        }
    }
}

/// Maps entity indices to definition batches through the reverse vocabulary.
#[derive(Debug, Clone)]
pub struct DefinitionResolver {
    idx2synset: Vec<String>,
    corpus: Arc<DefinitionCorpus>,
}

impl DefinitionResolver {
    pub fn new(entity_vocab: &Vocab, corpus: Arc<DefinitionCorpus>) -> Self {
        Self {
            idx2synset: entity_vocab.tokens().to_vec(),
            corpus,
        }
    }

    /// Entities that have a definition, out of all vocabulary entries.
    pub fn coverage(&self) -> (usize, usize) {
        let known = self
            .idx2synset
            .iter()
            .filter(|s| self.corpus.contains(s))
            .count();
        (known, self.idx2synset.len())
    }

    pub fn resolve(&self, entities: &[u32]) -> DefinitionBatch {
        let ids: Vec<&str> = entities
            .iter()
            .map(|&i| self.idx2synset.get(i as usize).map(String::as_str).unwrap_or(""))
            .collect();
        self.corpus.batch(&ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corpus() -> DefinitionCorpus {
        DefinitionCorpus::from_lines([
            "02084071\t__dog_NN_1\ta member of the genus Canis",
            "02121620\tfeline mammal usually having thick soft fur",
            "bad line without tabs",
            "00000001\t",
        ])
    }

    #[test]
    fn test_tokenize() {
        assert_eq!(tokenize("A member, of the genus-Canis!"), vec!["a", "member", "of", "the", "genus", "canis"]);
    }

    #[test]
    fn test_alias_and_case_insensitive_lookup() {
        let c = corpus();
        assert_eq!(c.len(), 3);
        assert_eq!(c.tokens("__DOG_nn_1"), c.tokens("02084071"));
        assert_eq!(c.synsets()[1], "02121620");
    }

    #[test]
    fn test_batch_padding_and_unknowns() {
        let c = corpus().with_max_len(4);
        let b = c.batch(&["02084071", "missing", "00000001"]);
        assert_eq!(b.max_len, 4);
        assert_eq!(b.lengths, vec![4, 1, 1]);
        assert_eq!(&b.tokens[4..8], &[UNK, PAD, PAD, PAD]);
        assert_eq!(&b.tokens[8..12], &[UNK, PAD, PAD, PAD]);
    }

    #[test]
    fn test_reversed_tokens_keep_padding_last() {
        let b = DefinitionBatch {
            tokens: vec![5, 6, 7, 2, 3, 0],
            lengths: vec![3, 2],
            max_len: 3,
        };
        assert_eq!(b.reversed_tokens(), vec![7, 6, 5, 3, 2, 0]);
        assert_eq!(b.mask(), vec![1.0, 1.0, 1.0, 1.0, 1.0, 0.0]);
    }

    #[test]
    fn test_resolver_uses_reverse_vocab() {
        let mut vocab = Vocab::new();
        vocab.add_token("02121620");
        let resolver = DefinitionResolver::new(&vocab, Arc::new(corpus()));
        assert_eq!(resolver.coverage(), (1, 3));
        let b = resolver.resolve(&[2]);
        assert_eq!(b.lengths, vec![7]);
    }
}

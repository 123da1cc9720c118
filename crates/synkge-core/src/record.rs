//! JSON-lines relation records and their indexed form.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::vocab::Vocabularies;

/// Placeholder used by the dataset files for absent fields.
pub const NONE_TOKEN: &str = "None";

fn none() -> String {
    NONE_TOKEN.to_string()
}

/// One line of an `e1rel_to_e2_*.json` file.
///
/// `e2_multi1` lists every valid tail for `(e1, rel)`; `e2_multi2`
/// every valid head for `(e2, rel_eval)`. Both are space separated.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RawRecord {
    pub e1: String,
    pub rel: String,
    #[serde(default = "none")]
    pub rel_eval: String,
    #[serde(default = "none")]
    pub e2: String,
    #[serde(default = "none")]
    pub e2_multi1: String,
    #[serde(default = "none")]
    pub e2_multi2: String,
}

impl RawRecord {
    /// Lower-cased single-token fields: `e1, rel, rel_eval, e2`.
    pub fn scalars(&self) -> [String; 4] {
        [
            self.e1.to_lowercase(),
            self.rel.to_lowercase(),
            self.rel_eval.to_lowercase(),
            self.e2.to_lowercase(),
        ]
    }

    pub fn tails(&self) -> Vec<String> {
        split_multi(&self.e2_multi1)
    }

    pub fn heads(&self) -> Vec<String> {
        split_multi(&self.e2_multi2)
    }

    /// Convert to vocabulary indices; unknown tokens map to `UNK`.
    pub fn to_example(&self, vocabs: &Vocabularies) -> Example {
        let [e1, rel, rel_eval, e2] = self.scalars();
        Example {
            e1: vocabs.entity.get_idx(&e1),
            rel: vocabs.relation.get_idx(&rel),
            rel_eval: vocabs.relation.get_idx(&rel_eval),
            e2: vocabs.entity.get_idx(&e2),
            e2_multi1: self.tails().iter().map(|t| vocabs.entity.get_idx(t)).collect(),
            e2_multi2: self.heads().iter().map(|t| vocabs.entity.get_idx(t)).collect(),
        }
    }
}

fn split_multi(field: &str) -> Vec<String> {
    field
        .split(' ')
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// A record after vocabulary conversion, as stored in shards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Example {
    pub e1: u32,
    pub rel: u32,
    pub rel_eval: u32,
    pub e2: u32,
    pub e2_multi1: Vec<u32>,
    pub e2_multi2: Vec<u32>,
}

/// Read a JSON-lines file. Blank lines are skipped.
pub fn read_records(path: impl AsRef<Path>) -> Result<Vec<RawRecord>> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| Error::io(path, e))?;
    let mut records = Vec::new();
    for (i, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(|e| Error::io(path, e))?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let record = serde_json::from_str(line).map_err(|source| Error::Record {
            path: path.to_path_buf(),
            line: i + 1,
            source,
        })?;
        records.push(record);
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_fields_default_to_none() {
        let r: RawRecord =
            serde_json::from_str(r#"{"e1": "Dog", "rel": "_hypernym", "e2_multi1": "a B"}"#)
                .unwrap();
        assert_eq!(r.e2, NONE_TOKEN);
        assert_eq!(r.tails(), vec!["a", "b"]);
        assert_eq!(r.scalars()[0], "dog");
    }

    #[test]
    fn test_to_example_maps_unknown() {
        let mut vocabs = Vocabularies::default();
        vocabs.entity.add_token("dog");
        vocabs.relation.add_token("r");
        let r: RawRecord =
            serde_json::from_str(r#"{"e1": "dog", "rel": "r", "e2_multi1": "dog cat"}"#).unwrap();
        let ex = r.to_example(&vocabs);
        assert_eq!(ex.e1, 2);
        assert_eq!(ex.rel, 2);
        assert_eq!(ex.e2_multi1, vec![2, crate::vocab::UNK]);
        // absent field reads as the literal "None", which was never added
        assert_eq!(ex.e2_multi2, vec![crate::vocab::UNK]);
    }
}

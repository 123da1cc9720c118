//! Filtered rank evaluation over a ranking split.
//!
//! Every example is queried in both directions:
//!
//! | Direction | Query | True answer | Filtered out |
//! |-----------|-------|-------------|--------------|
//! | Tail | `(e1, rel, ?)` | `e2` | `e2_multi1` |
//! | Head | `(e2, rel_eval, ?)` | `e1` | `e2_multi2` |
//!
//! The rank of the true answer is `1 + #{other non-filtered entities scoring
//! strictly higher}`, so ties resolve in the answer's favour. Ranking uses raw
//! logits; the sigmoid is monotone and would only introduce saturation ties.

use rayon::prelude::*;
use tracing::info;

use synkge_core::{DefinitionResolver, StreamBatcher};
use synkge_nn::LinkPredictor;

use crate::error::Result;

/// Rank-based evaluation results.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RankMetrics {
    /// Mean Reciprocal Rank: E\[1/rank\]
    pub mrr: f64,
    /// Mean Rank: E\[rank\]
    pub mr: f64,
    pub hits_at_1: f64,
    pub hits_at_3: f64,
    pub hits_at_10: f64,
    /// Number of ranked queries
    pub num_queries: usize,
}

impl RankMetrics {
    /// Compute metrics from a list of 1-based ranks.
    pub fn from_ranks(ranks: &[usize]) -> Self {
        if ranks.is_empty() {
            return Self::default();
        }

        let n = ranks.len() as f64;
        let hits = |k: usize| ranks.iter().filter(|&&r| r <= k).count() as f64 / n;
        Self {
            mrr: ranks.iter().map(|&r| 1.0 / r as f64).sum::<f64>() / n,
            mr: ranks.iter().map(|&r| r as f64).sum::<f64>() / n,
            hits_at_1: hits(1),
            hits_at_3: hits(3),
            hits_at_10: hits(10),
            num_queries: ranks.len(),
        }
    }

    /// Query-weighted average of several results.
    pub fn merge(metrics: &[Self]) -> Self {
        let total: usize = metrics.iter().map(|m| m.num_queries).sum();
        if total == 0 {
            return Self::default();
        }
        let weighted = |f: fn(&Self) -> f64| {
            metrics.iter().map(|m| f(m) * m.num_queries as f64).sum::<f64>() / total as f64
        };
        Self {
            mrr: weighted(|m| m.mrr),
            mr: weighted(|m| m.mr),
            hits_at_1: weighted(|m| m.hits_at_1),
            hits_at_3: weighted(|m| m.hits_at_3),
            hits_at_10: weighted(|m| m.hits_at_10),
            num_queries: total,
        }
    }

    pub fn summary(&self) -> String {
        format!(
            "MRR: {:.4} | MR: {:.1} | H@1: {:.3} | H@3: {:.3} | H@10: {:.3} (n={})",
            self.mrr, self.mr, self.hits_at_1, self.hits_at_3, self.hits_at_10, self.num_queries
        )
    }
}

/// Rank of `target` in `scores`, ignoring the entities listed in `known`.
///
/// `known` must be sorted. An out-of-range target gets the worst rank.
pub fn filtered_rank(scores: &[f32], target: usize, known: &[u32]) -> usize {
    let Some(&target_score) = scores.get(target) else {
        return scores.len().max(1);
    };
    let higher = scores
        .iter()
        .enumerate()
        .filter(|&(i, &s)| s > target_score && i != target && known.binary_search(&(i as u32)).is_err())
        .count();
    1 + higher
}

fn rank_rows(scores: &[Vec<f32>], targets: &[u32], known: &[Vec<u32>]) -> Vec<usize> {
    scores
        .par_iter()
        .zip(targets.par_iter())
        .zip(known.par_iter())
        .map(|((row, &target), known)| {
            let mut known = known.clone();
            known.sort_unstable();
            filtered_rank(row, target as usize, &known)
        })
        .collect()
}

fn score_queries(
    model: &LinkPredictor,
    resolver: Option<&DefinitionResolver>,
    heads: &[u32],
    relations: &[u32],
) -> Result<Vec<Vec<f32>>> {
    let definitions = match resolver {
        Some(r) if model.uses_definitions() => Some(r.resolve(heads)),
        _ => None,
    };
    let logits = model.forward(heads, definitions.as_ref(), relations, false)?;
    Ok(logits.to_vec2::<f32>()?)
}

/// Evaluate `model` on every batch of `batcher`, in eval mode.
///
/// `resolver` supplies definitions when the model encodes them; lookup
/// models ignore it. Logs tail, head and combined metrics under `name`.
pub fn ranking_and_hits(
    model: &LinkPredictor,
    batcher: &mut StreamBatcher,
    resolver: Option<&DefinitionResolver>,
    name: &str,
) -> Result<RankMetrics> {
    let mut tail_ranks = Vec::with_capacity(batcher.num_examples());
    let mut head_ranks = Vec::with_capacity(batcher.num_examples());

    for batch in batcher.epoch()? {
        let batch = batch?;
        let tail_scores = score_queries(model, resolver, &batch.e1, &batch.rel)?;
        tail_ranks.extend(rank_rows(&tail_scores, &batch.e2, &batch.e2_multi1));

        let head_scores = score_queries(model, resolver, &batch.e2, &batch.rel_eval)?;
        head_ranks.extend(rank_rows(&head_scores, &batch.e1, &batch.e2_multi2));
    }

    let tail = RankMetrics::from_ranks(&tail_ranks);
    let head = RankMetrics::from_ranks(&head_ranks);
    let combined = RankMetrics::merge(&[tail.clone(), head.clone()]);
    info!(split = name, direction = "tail", "{}", tail.summary());
    info!(split = name, direction = "head", "{}", head.summary());
    info!(split = name, "{}", combined.summary());
    Ok(combined)
}

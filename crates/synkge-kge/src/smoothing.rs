//! Label smoothing of multi-hot targets.

use candle_core::{Result, Tensor};

/// `t ↦ (1 - s)·t + s/N`, where `N` is the size of the last dimension.
///
/// A row with `k` positives sums to `(1 - s)·k + s`, and every entry stays
/// in `[s/N, 1 - s + s/N]`.
pub fn smooth_labels(targets: &Tensor, smoothing: f64) -> Result<Tensor> {
    let n = targets.dim(candle_core::D::Minus1)?;
    if n == 0 {
        return Ok(targets.clone());
    }
    targets.affine(1.0 - smoothing, smoothing / n as f64)
}

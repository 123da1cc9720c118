//! Checkpoint naming.

use std::path::{Path, PathBuf};

use synkge_nn::ModelKind;

/// Shortest round-trip rendering that always keeps a decimal point
/// (`0.2`, `0.0`, `1.0`).
pub fn format_rate(value: f32) -> String {
    let s = value.to_string();
    if s.contains('.') || !value.is_finite() {
        s
    } else {
        format!("{s}.0")
    }
}

/// `<save_dir>/<dataset>_<model>_<input_drop>_<hidden_drop>_<suffix>_defn.model`
pub fn checkpoint_path(
    save_dir: &Path,
    dataset: &str,
    kind: ModelKind,
    input_drop: f32,
    hidden_drop: f32,
    suffix: &str,
) -> PathBuf {
    save_dir.join(format!(
        "{dataset}_{kind}_{}_{}_{suffix}_defn.model",
        format_rate(input_drop),
        format_rate(hidden_drop),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_rate() {
        assert_eq!(format_rate(0.2), "0.2");
        assert_eq!(format_rate(0.0), "0.0");
        assert_eq!(format_rate(1.0), "1.0");
        assert_eq!(format_rate(0.35), "0.35");
    }

    #[test]
    fn test_checkpoint_path_is_deterministic() {
        let a = checkpoint_path(Path::new("saved_models"), "WN18RR", ModelKind::ConvE, 0.2, 0.3, "run1");
        let b = checkpoint_path(Path::new("saved_models"), "WN18RR", ModelKind::ConvE, 0.2, 0.3, "run1");
        assert_eq!(a, b);
        assert_eq!(a, PathBuf::from("saved_models/WN18RR_conve_0.2_0.3_run1_defn.model"));
    }

    #[test]
    fn test_checkpoint_path_distinguishes_inputs() {
        let base = checkpoint_path(Path::new("s"), "d", ModelKind::DistMult, 0.2, 0.3, "");
        assert_eq!(base, PathBuf::from("s/d_distmult_0.2_0.3__defn.model"));
        assert_ne!(base, checkpoint_path(Path::new("s"), "d", ModelKind::ComplEx, 0.2, 0.3, ""));
        assert_ne!(base, checkpoint_path(Path::new("s"), "d", ModelKind::DistMult, 0.0, 0.3, ""));
    }
}

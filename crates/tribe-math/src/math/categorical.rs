//! Categorical draws from unnormalized log weights.
//!
//! The caller supplies the uniform variate so this crate stays free of any
//! particular random generator; the sampler threads its own per-worker RNG.

use super::stable::normalize_log_probs;

/// Draw an index proportionally to `exp(log_weights)`.
///
/// `u` must lie in `[0, 1)`. Returns None when the distribution is degenerate
/// (empty, all -inf, or containing NaN).
pub fn draw_from_log_weights(log_weights: &[f64], u: f64) -> Option<usize> {
    if !(0.0..1.0).contains(&u) {
        return None;
    }
    let probs = normalize_log_probs(log_weights)?;
    let mut cumulative = 0.0;
    let mut last_positive = None;
    for (i, p) in probs.iter().enumerate() {
        if *p <= 0.0 {
            continue;
        }
        cumulative += p;
        last_positive = Some(i);
        if u < cumulative {
            return Some(i);
        }
    }
    // Rounding can leave the cumulative sum a hair under 1.
    last_positive
}

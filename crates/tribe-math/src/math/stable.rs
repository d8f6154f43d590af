//! Numerically stable primitives for log-domain sampling weights.
//!
//! Topic weights in the Gibbs sampler are products of many small factors
//! (one per visited site plus one per residency gap), so they are carried in
//! log space and only exponentiated after the maximum has been subtracted.

/// Stable log(sum(exp(values))).
///
/// Returns NEG_INFINITY for empty input or all -inf inputs.
pub fn log_sum_exp(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NEG_INFINITY;
    }
    if values.iter().any(|v| v.is_nan()) {
        return f64::NAN;
    }
    let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    if max == f64::NEG_INFINITY {
        return f64::NEG_INFINITY;
    }
    if max == f64::INFINITY {
        return f64::INFINITY;
    }
    let sum: f64 = values.iter().map(|v| (*v - max).exp()).sum();
    max + sum.ln()
}

/// Stable log(exp(a) + exp(b)).
pub fn log_add_exp(a: f64, b: f64) -> f64 {
    if a.is_nan() || b.is_nan() {
        return f64::NAN;
    }
    if a == f64::NEG_INFINITY {
        return b;
    }
    if b == f64::NEG_INFINITY {
        return a;
    }
    if a == f64::INFINITY || b == f64::INFINITY {
        return f64::INFINITY;
    }
    let m = a.max(b);
    let diff = (a - b).abs();
    m + (-diff).exp().ln_1p()
}

/// Natural log that maps exact zero to NEG_INFINITY and rejects negatives.
///
/// Probabilities coming out of `dir_posterior` and kernel densities may be
/// exactly zero; those must become "impossible" rather than NaN.
pub fn ln_prob(p: f64) -> f64 {
    if p.is_nan() || p < 0.0 {
        return f64::NAN;
    }
    if p == 0.0 {
        return f64::NEG_INFINITY;
    }
    p.ln()
}

/// Normalize log weights into linear probabilities that sum to 1.
///
/// Returns None when every weight is -inf (no candidate has mass) or any
/// weight is NaN.
pub fn normalize_log_probs(log_weights: &[f64]) -> Option<Vec<f64>> {
    let lse = log_sum_exp(log_weights);
    if !lse.is_finite() {
        return None;
    }
    Some(log_weights.iter().map(|w| (w - lse).exp()).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: f64, b: f64, tol: f64) -> bool {
        if a.is_nan() || b.is_nan() {
            return false;
        }
        (a - b).abs() <= tol
    }

    #[test]
    fn log_sum_exp_basic() {
        let out = log_sum_exp(&[0.0, 0.0]);
        assert!(approx_eq(out, 2.0f64.ln(), 1e-12));
    }

    #[test]
    fn log_sum_exp_dominance() {
        let out = log_sum_exp(&[-1000.0, 0.0]);
        assert!(approx_eq(out, 0.0, 1e-12));
    }

    #[test]
    fn log_sum_exp_all_neg_inf() {
        let out = log_sum_exp(&[f64::NEG_INFINITY, f64::NEG_INFINITY]);
        assert!(out.is_infinite() && out.is_sign_negative());
    }

    #[test]
    fn log_sum_exp_nan_propagates() {
        assert!(log_sum_exp(&[0.0, f64::NAN]).is_nan());
    }

    #[test]
    fn log_add_exp_matches_lse() {
        let a = 1.234;
        let b = -0.75;
        assert!(approx_eq(log_add_exp(a, b), log_sum_exp(&[a, b]), 1e-12));
    }

    #[test]
    fn log_add_exp_infinity_rules() {
        let out = log_add_exp(f64::INFINITY, 1.0);
        assert!(out.is_infinite() && out.is_sign_positive());
        assert!(approx_eq(log_add_exp(f64::NEG_INFINITY, 2.0), 2.0, 1e-12));
    }

    #[test]
    fn ln_prob_edges() {
        assert_eq!(ln_prob(0.0), f64::NEG_INFINITY);
        assert!(ln_prob(-0.5).is_nan());
        assert!(approx_eq(ln_prob(1.0), 0.0, 1e-15));
    }

    #[test]
    fn normalize_log_probs_sums_to_one() {
        let probs = normalize_log_probs(&[-800.0, -801.0, -799.5]).unwrap();
        let sum: f64 = probs.iter().sum();
        assert!(approx_eq(sum, 1.0, 1e-12));
        assert!(probs[2] > probs[0] && probs[0] > probs[1]);
    }

    #[test]
    fn normalize_log_probs_degenerate() {
        assert!(normalize_log_probs(&[f64::NEG_INFINITY, f64::NEG_INFINITY]).is_none());
        assert!(normalize_log_probs(&[]).is_none());
        assert!(normalize_log_probs(&[0.0, f64::NAN]).is_none());
    }
}

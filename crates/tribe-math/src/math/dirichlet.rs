//! Dirichlet smoothing for count tables.
//!
//! The topic model estimates every categorical distribution (topic given
//! hyper-entity, site given topic) from co-occurrence counts with a symmetric
//! Dirichlet prior. With prior mass `smooth` on each of `K` outcomes the
//! posterior predictive for one outcome is:
//!
//! ```text
//! P = (smooth + joint) / (global + smooth * K)
//! ```
//!
//! where `joint` counts the outcome together with the conditioning value and
//! `global` counts the conditioning value over all outcomes.

use ndarray::{Array2, Axis};

/// Dirichlet posterior predictive for one cell of a count table.
///
/// Returns 0 when the denominator is exactly zero instead of dividing.
pub fn dir_posterior(joint_count: f64, global_count: f64, num_occurrences: f64, smooth: f64) -> f64 {
    let numerator = smooth + joint_count;
    let denominator = global_count + smooth * num_occurrences;
    if denominator == 0.0 {
        return 0.0;
    }
    numerator / denominator
}

/// Normalize every column of `target` to sum to 1.
///
/// Columns whose sum is zero (or not finite) are left untouched.
pub fn col_normalize(target: &mut Array2<f64>) {
    let sums = target.sum_axis(Axis(0));
    for (mut column, sum) in target.axis_iter_mut(Axis(1)).zip(sums.iter()) {
        if *sum == 0.0 || !sum.is_finite() {
            continue;
        }
        column.mapv_inplace(|v| v / sum);
    }
}

/// Largest absolute deviation of any column sum from 1.
///
/// Zero-sum columns count as a deviation of 1.
pub fn max_column_deviation(matrix: &Array2<f64>) -> f64 {
    matrix
        .sum_axis(Axis(0))
        .iter()
        .map(|s| (s - 1.0).abs())
        .fold(0.0, f64::max)
}

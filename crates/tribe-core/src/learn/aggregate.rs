//! Turning counts into posterior probability tables.

use ndarray::Array2;
use serde::Serialize;
use tribe_math::{col_normalize, dir_posterior};

use crate::data::CountTables;

/// Column-normalised posteriors.
///
/// `theta_zh` is topics × hypers (`P(z | h)`), `psi_sz` is sites × topics
/// (`P(s | z)`).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Posteriors {
    pub theta_zh: Array2<f64>,
    pub psi_sz: Array2<f64>,
}

/// Smooth every cell with `dir_posterior`, then column-normalise.
pub fn aggregate(counts: &CountTables, alpha_zh: f64, beta_zs: f64) -> Posteriors {
    let n_topics = counts.n_topics();
    let n_hypers = counts.n_hypers();
    let n_sites = counts.n_sites();

    let mut theta_zh = Array2::from_shape_fn((n_topics, n_hypers), |(z, h)| {
        dir_posterior(
            counts.count_zh[[z, h]] as f64,
            counts.count_h[h] as f64,
            n_topics as f64,
            alpha_zh,
        )
    });
    let mut psi_sz = Array2::from_shape_fn((n_sites, n_topics), |(s, z)| {
        dir_posterior(
            counts.count_sz[[s, z]] as f64,
            counts.count_z[z] as f64,
            n_sites as f64,
            beta_zs,
        )
    });
    col_normalize(&mut theta_zh);
    col_normalize(&mut psi_sz);
    Posteriors { theta_zh, psi_sz }
}

/// Running sum of posteriors over post-burn-in iterations.
#[derive(Debug, Clone)]
pub struct PosteriorAccumulator {
    sum: Option<Posteriors>,
    samples: usize,
}

impl PosteriorAccumulator {
    pub fn new() -> Self {
        Self { sum: None, samples: 0 }
    }

    pub fn add(&mut self, sample: &Posteriors) {
        match &mut self.sum {
            Some(sum) => {
                sum.theta_zh += &sample.theta_zh;
                sum.psi_sz += &sample.psi_sz;
            }
            None => self.sum = Some(sample.clone()),
        }
        self.samples += 1;
    }

    pub fn samples(&self) -> usize {
        self.samples
    }

    /// The column-normalised average, or None if nothing was added.
    pub fn finish(self) -> Option<Posteriors> {
        let mut sum = self.sum?;
        col_normalize(&mut sum.theta_zh);
        col_normalize(&mut sum.psi_sz);
        Some(sum)
    }
}

impl Default for PosteriorAccumulator {
    fn default() -> Self {
        Self::new()
    }
}

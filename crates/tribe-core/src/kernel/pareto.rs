//! Lomax (shifted Pareto) dwell times: heavy-tailed, per-topic shape `α`.

use ndarray::Array2;
use tribe_common::Result;
use tribe_config::KernelFamily;

use super::{check_shape, Kernel, KernelState};
use crate::data::StampLists;

#[derive(Debug, Clone)]
pub struct ParetoKernel {
    prior_shape: f64,
    prior_rate: f64,
    scale: f64,
    alphas: Array2<f64>,
}

impl ParetoKernel {
    pub fn new(n_topics: usize, prior_shape: f64, prior_rate: f64, scale: f64) -> Self {
        Self {
            prior_shape,
            prior_rate,
            scale,
            alphas: Array2::from_elem((n_topics, 1), prior_shape / prior_rate),
        }
    }

    pub fn alpha(&self, topic: usize) -> f64 {
        self.alphas[[topic, 0]]
    }
}

impl Kernel for ParetoKernel {
    fn family(&self) -> KernelFamily {
        KernelFamily::Pareto
    }

    fn n_topics(&self) -> usize {
        self.alphas.nrows()
    }

    fn refit(&mut self, stamps: &StampLists) {
        for z in 0..self.n_topics() {
            let n = stamps.len(z) as f64;
            let log_total: f64 = stamps.iter(z).map(|t| (t / self.scale).ln_1p()).sum();
            self.alphas[[z, 0]] = (self.prior_shape + n) / (self.prior_rate + log_total);
        }
    }

    fn density(&self, topic: usize, elapsed: f64) -> f64 {
        (1.0 + elapsed / self.scale)
            .powf(-self.alpha(topic))
            .clamp(0.0, 1.0)
    }

    fn state(&self) -> KernelState {
        self.alphas.clone()
    }

    fn set_state(&mut self, state: &KernelState) -> Result<()> {
        check_shape("pareto kernel state", self.alphas.dim(), state.dim())?;
        self.alphas.assign(state);
        Ok(())
    }

    fn boxed_clone(&self) -> Box<dyn Kernel> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refit_and_density() {
        let mut k = ParetoKernel::new(1, 1.0, 1.0, 1.0);
        let mut stamps = StampLists::new(1);
        stamps.push(0, 1.0);
        k.refit(&stamps);
        let expected = 2.0 / (1.0 + 2.0f64.ln());
        assert!((k.alpha(0) - expected).abs() < 1e-12);

        assert_eq!(k.density(0, 0.0), 1.0);
        let d = k.density(0, 3.0);
        assert!(d > 0.0 && d < 1.0);
        // Heavier tail than an exponential with the same initial rate.
        assert!(k.density(0, 50.0) > (-expected * 50.0f64).exp());
    }
}

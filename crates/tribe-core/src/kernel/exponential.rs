//! Exponential dwell times with a conjugate Gamma prior on each topic's rate.

use ndarray::Array2;
use tribe_common::Result;
use tribe_config::KernelFamily;

use super::{check_shape, Kernel, KernelState};
use crate::data::StampLists;

#[derive(Debug, Clone)]
pub struct ExponentialKernel {
    shape: f64,
    rate: f64,
    /// One column: λ per topic.
    lambdas: Array2<f64>,
}

impl ExponentialKernel {
    /// Rates start at the prior mean `shape / rate`.
    pub fn new(n_topics: usize, shape: f64, rate: f64) -> Self {
        Self {
            shape,
            rate,
            lambdas: Array2::from_elem((n_topics, 1), shape / rate),
        }
    }

    pub fn lambda(&self, topic: usize) -> f64 {
        self.lambdas[[topic, 0]]
    }
}

impl Kernel for ExponentialKernel {
    fn family(&self) -> KernelFamily {
        KernelFamily::Exponential
    }

    fn n_topics(&self) -> usize {
        self.lambdas.nrows()
    }

    fn refit(&mut self, stamps: &StampLists) {
        for z in 0..self.n_topics() {
            let n = stamps.len(z) as f64;
            let total: f64 = stamps.iter(z).sum();
            self.lambdas[[z, 0]] = (self.shape + n) / (self.rate + total);
        }
    }

    fn density(&self, topic: usize, elapsed: f64) -> f64 {
        (-self.lambda(topic) * elapsed).exp().clamp(0.0, 1.0)
    }

    fn state(&self) -> KernelState {
        self.lambdas.clone()
    }

    fn set_state(&mut self, state: &KernelState) -> Result<()> {
        check_shape("exponential kernel state", self.lambdas.dim(), state.dim())?;
        self.lambdas.assign(state);
        Ok(())
    }

    fn boxed_clone(&self) -> Box<dyn Kernel> {
        Box::new(self.clone())
    }
}

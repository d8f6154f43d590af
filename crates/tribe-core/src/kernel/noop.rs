use ndarray::Array2;
use tribe_common::Result;
use tribe_config::KernelFamily;

use super::{check_shape, Kernel, KernelState};
use crate::data::StampLists;

/// Ignores gaps: every topic explains every dwell time equally well.
#[derive(Debug, Clone)]
pub struct NoopKernel {
    n_topics: usize,
}

impl NoopKernel {
    pub fn new(n_topics: usize) -> Self {
        Self { n_topics }
    }
}

impl Kernel for NoopKernel {
    fn family(&self) -> KernelFamily {
        KernelFamily::Noop
    }

    fn n_topics(&self) -> usize {
        self.n_topics
    }

    fn refit(&mut self, _stamps: &StampLists) {}

    fn density(&self, _topic: usize, _elapsed: f64) -> f64 {
        1.0
    }

    fn state(&self) -> KernelState {
        Array2::zeros((self.n_topics, 0))
    }

    fn set_state(&mut self, state: &KernelState) -> Result<()> {
        check_shape("noop kernel state", (self.n_topics, 0), state.dim())
    }

    fn boxed_clone(&self) -> Box<dyn Kernel> {
        Box::new(self.clone())
    }
}

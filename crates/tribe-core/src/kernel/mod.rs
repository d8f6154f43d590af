//! Residency-time kernels.
//!
//! A kernel scores how plausible an observed gap is under each topic and is
//! refit (M-step) from the per-topic stamp lists. Workers each own a replica;
//! replicas are reconciled during pairing through [`Kernel::merge`].

mod exponential;
mod noop;
mod pareto;

pub use exponential::ExponentialKernel;
pub use noop::NoopKernel;
pub use pareto::ParetoKernel;

use ndarray::Array2;
use tribe_common::{Error, Result};
use tribe_config::KernelFamily;

use crate::data::StampLists;

/// Kernel parameters as a topic × parameter matrix.
pub type KernelState = Array2<f64>;

pub trait Kernel: Send + std::fmt::Debug {
    fn family(&self) -> KernelFamily;

    fn n_topics(&self) -> usize;

    /// Re-estimate every topic's parameters from its stamps.
    fn refit(&mut self, stamps: &StampLists);

    /// Survival probability of `elapsed` under `topic`, in `[0, 1]`.
    fn density(&self, topic: usize, elapsed: f64) -> f64;

    fn state(&self) -> KernelState;

    fn set_state(&mut self, state: &KernelState) -> Result<()>;

    /// Reconcile with a partner's parameters. Cell-wise mean by default.
    fn merge(&mut self, other: &KernelState) -> Result<()> {
        let mut mine = self.state();
        check_shape("kernel state", mine.dim(), other.dim())?;
        mine.zip_mut_with(other, |a, b| *a = 0.5 * (*a + *b));
        self.set_state(&mine)
    }

    fn boxed_clone(&self) -> Box<dyn Kernel>;
}

impl Clone for Box<dyn Kernel> {
    fn clone(&self) -> Self {
        self.boxed_clone()
    }
}

/// Build a kernel of `family` for `n_topics` topics.
///
/// `priors` must already have the family's arity; see
/// `HyperParams::effective_residency_priors`.
pub fn from_family(family: KernelFamily, n_topics: usize, priors: &[f64]) -> Result<Box<dyn Kernel>> {
    if priors.len() != family.prior_arity() {
        return Err(Error::InvalidHyperParams {
            field: "residency_priors".to_string(),
            message: format!(
                "kernel {} takes {} priors, got {}",
                family,
                family.prior_arity(),
                priors.len()
            ),
        });
    }
    Ok(match family {
        KernelFamily::Noop => Box::new(NoopKernel::new(n_topics)),
        KernelFamily::Exponential => Box::new(ExponentialKernel::new(n_topics, priors[0], priors[1])),
        KernelFamily::Pareto => Box::new(ParetoKernel::new(n_topics, priors[0], priors[1], priors[2])),
    })
}

pub(crate) fn check_shape(what: &str, expected: (usize, usize), actual: (usize, usize)) -> Result<()> {
    if expected != actual {
        return Err(Error::ShapeMismatch {
            what: what.to_string(),
            expected,
            actual,
        });
    }
    Ok(())
}

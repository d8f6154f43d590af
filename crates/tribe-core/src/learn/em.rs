//! Single-threaded Gibbs EM over the whole trace.
//!
//! Same sampling step and seeding as a lone worker of the parallel engine,
//! which makes it the reference for the one-worker case.

use serde::Serialize;
use tribe_common::{Error, Result, WorkerId};
use tribe_config::HyperParams;

use super::aggregate::{aggregate, PosteriorAccumulator, Posteriors};
use super::sampler::{GibbsSampler, SamplingContext};
use crate::data::{CountTables, InputData, Trace};
use crate::kernel::{self, Kernel, KernelState};

#[derive(Debug, Clone, Serialize)]
pub struct EmOutput {
    #[serde(flatten)]
    pub posteriors: Posteriors,
    pub topics: Vec<usize>,
    #[serde(skip)]
    pub counts: CountTables,
    pub kernel_state: KernelState,
}

/// Count tables for a full assignment.
pub fn fast_populate(
    trace: &Trace,
    topics: &[usize],
    n_topics: usize,
    n_hypers: usize,
    n_sites: usize,
) -> Result<CountTables> {
    CountTables::populate(trace, topics, n_topics, n_hypers, n_sites)
}

/// Kernel for `hyper` at its prior parameters. Only the M-step refits it.
pub(crate) fn initial_kernel(hyper: &HyperParams, input: &InputData) -> Result<Box<dyn Kernel>> {
    kernel::from_family(hyper.kernel, input.n_topics, &hyper.effective_residency_priors())
}

pub(crate) fn check_topic_count(hyper: &HyperParams, input: &InputData) -> Result<()> {
    if hyper.n_topics != input.n_topics {
        return Err(Error::Config(format!(
            "hyperparameters ask for {} topics but the input was initialised with {}",
            hyper.n_topics, input.n_topics
        )));
    }
    Ok(())
}

/// Run `n_iter` E/M iterations over the whole trace.
///
/// With `average_posteriors` the returned posteriors are the normalised mean
/// over post-burn-in iterations; otherwise they come from the final counts.
pub fn em(hyper: &HyperParams, input: &InputData) -> Result<EmOutput> {
    tribe_config::validate_hyper_params(hyper)?;
    check_topic_count(hyper, input)?;
    let ctx = SamplingContext {
        worker: WorkerId(0),
        alpha_zh: hyper.alpha_zh,
        beta_zs: hyper.beta_zs,
        n_topics: input.n_topics,
        n_sites: input.n_sites(),
    };
    let mut sampler = GibbsSampler::new(
        ctx,
        input.counts.clone(),
        input.stamps.clone(),
        initial_kernel(hyper, input)?,
        WorkerId(0).seed(hyper.random_seed),
    );
    let mut topics = input.topics.clone();
    let mut acc = PosteriorAccumulator::new();

    for iteration in 0..hyper.n_iter {
        sampler.e_step(&input.trace, 0..input.n_events(), &mut topics)?;
        if hyper.refits_kernel_at(iteration) {
            sampler.m_step();
        }
        if hyper.average_posteriors && hyper.is_post_burn_in(iteration) {
            acc.add(&aggregate(&sampler.counts, hyper.alpha_zh, hyper.beta_zs));
        }
        tracing::trace!(iteration, "serial iteration done");
    }

    let posteriors = match acc.finish() {
        Some(avg) => avg,
        None => aggregate(&sampler.counts, hyper.alpha_zh, hyper.beta_zs),
    };
    Ok(EmOutput {
        posteriors,
        topics,
        kernel_state: sampler.kernel.state(),
        counts: sampler.counts,
    })
}

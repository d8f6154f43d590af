//! Collapsed Gibbs resampling of one event's topic.
//!
//! The unnormalised weight of topic `z` for an event of hyper-entity `h`
//! visiting sites `s_1..s_B` with final gap `dt` is
//!
//! ```text
//! P(z | h) * Π_b P(s_b | z) * kernel(z, dt)
//! ```
//!
//! with both categorical terms estimated by `dir_posterior` from the counts
//! that exclude the event itself. Only the final gap is scored: it is the
//! stamp the M-step refits from. Weights are combined in log space.

use std::ops::Range;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tribe_common::{Error, Result, WorkerId};
use tribe_math::{dir_posterior, draw_from_log_weights, ln_prob};

use crate::data::{CountTables, StampLists, Trace};
use crate::kernel::Kernel;

/// Constants every resampling call needs.
#[derive(Debug, Clone, Copy)]
pub struct SamplingContext {
    pub worker: WorkerId,
    pub alpha_zh: f64,
    pub beta_zs: f64,
    pub n_topics: usize,
    pub n_sites: usize,
}

/// Fill `out` with the log weight of every topic for `event`.
pub fn topic_log_weights(
    ctx: &SamplingContext,
    trace: &Trace,
    event: usize,
    counts: &CountTables,
    kernel: &dyn Kernel,
    out: &mut Vec<f64>,
) {
    let h = trace.hyper(event);
    let sites = trace.sites(event);
    let stamp = trace.stamp(event);
    let n_topics = ctx.n_topics as f64;
    let n_sites = ctx.n_sites as f64;

    out.clear();
    for z in 0..ctx.n_topics {
        let mut w = ln_prob(dir_posterior(
            counts.count_zh[[z, h]] as f64,
            counts.count_h[h] as f64,
            n_topics,
            ctx.alpha_zh,
        ));
        for &s in sites {
            w += ln_prob(dir_posterior(
                counts.count_sz[[s, z]] as f64,
                counts.count_z[z] as f64,
                n_sites,
                ctx.beta_zs,
            ));
        }
        w += ln_prob(kernel.density(z, stamp));
        out.push(w);
    }
}

/// Remove `event` from topic `current`, draw a new topic, and reinsert it.
///
/// On a degenerate distribution the event goes back to `current` and the
/// call fails, so the tables stay consistent for error reporting.
#[allow(clippy::too_many_arguments)]
pub fn resample_topic<R: Rng>(
    ctx: &SamplingContext,
    trace: &Trace,
    event: usize,
    current: usize,
    counts: &mut CountTables,
    stamps: &mut StampLists,
    kernel: &dyn Kernel,
    rng: &mut R,
    scratch: &mut Vec<f64>,
) -> Result<usize> {
    let h = trace.hyper(event);
    let sites = trace.sites(event);
    let stamp = trace.stamp(event);

    counts.remove_event(h, sites, current)?;
    if !stamps.remove(current, stamp) {
        counts.add_event(h, sites, current);
        return Err(Error::InconsistentCounts(format!(
            "stamp {} of event {} missing from topic {}",
            stamp, event, current
        )));
    }

    topic_log_weights(ctx, trace, event, counts, kernel, scratch);
    let u: f64 = rng.random();
    let next = draw_from_log_weights(scratch, u);

    let topic = next.unwrap_or(current);
    counts.add_event(h, sites, topic);
    stamps.push(topic, stamp);

    match next {
        Some(z) => Ok(z),
        None => Err(Error::DegenerateDistribution {
            worker: ctx.worker.0,
            event,
        }),
    }
}

/// One replica of the model state plus the generator that drives it.
#[derive(Debug)]
pub struct GibbsSampler {
    ctx: SamplingContext,
    pub counts: CountTables,
    pub stamps: StampLists,
    pub kernel: Box<dyn Kernel>,
    rng: StdRng,
    scratch: Vec<f64>,
}

impl GibbsSampler {
    pub fn new(
        ctx: SamplingContext,
        counts: CountTables,
        stamps: StampLists,
        kernel: Box<dyn Kernel>,
        seed: u64,
    ) -> Self {
        Self {
            ctx,
            counts,
            stamps,
            kernel,
            rng: StdRng::seed_from_u64(seed),
            scratch: Vec::with_capacity(ctx.n_topics),
        }
    }

    pub fn context(&self) -> &SamplingContext {
        &self.ctx
    }

    /// Resample every event in `range`, in index order.
    ///
    /// `topics[k]` holds the assignment of event `range.start + k`.
    pub fn e_step(&mut self, trace: &Trace, range: Range<usize>, topics: &mut [usize]) -> Result<()> {
        if topics.len() != range.len() {
            return Err(Error::Data(format!(
                "{} assignments for a shard of {} events",
                topics.len(),
                range.len()
            )));
        }
        for (event, topic) in range.zip(topics.iter_mut()) {
            *topic = resample_topic(
                &self.ctx,
                trace,
                event,
                *topic,
                &mut self.counts,
                &mut self.stamps,
                self.kernel.as_ref(),
                &mut self.rng,
                &mut self.scratch,
            )?;
        }
        Ok(())
    }

    /// Refit the kernel from the current stamp lists.
    pub fn m_step(&mut self) {
        self.kernel.refit(&self.stamps);
    }
}

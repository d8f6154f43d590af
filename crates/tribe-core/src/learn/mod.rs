//! The sampling step: collapsed Gibbs E-step, kernel M-step, aggregation.
//!
//! Nothing in here is concurrent. Workers (and the serial driver in [`em`])
//! call these functions on tables they exclusively own.

pub mod aggregate;
pub mod em;
pub mod sampler;

pub use aggregate::{aggregate, PosteriorAccumulator, Posteriors};
pub use em::{em, fast_populate, EmOutput};
pub use sampler::{resample_topic, topic_log_weights, GibbsSampler, SamplingContext};

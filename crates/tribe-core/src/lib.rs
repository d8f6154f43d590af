//! TribeFlow core library.
//!
//! - `data`: trace ingestion, count tables, per-topic stamps
//! - `kernel`: residency-time kernels
//! - `learn`: the Gibbs sampling step and the serial EM driver
//! - `parallel`: master/worker engine with pairwise delta merges
//! - `logging`: tracing setup and stable event names
//!
//! The `tribe` binary entry point is in `main.rs`.

pub mod data;
pub mod exit_codes;
pub mod kernel;
pub mod learn;
pub mod logging;
pub mod parallel;

pub use data::{InitialTopics, InputData};
pub use parallel::{Master, StopSignal, TrainOutput};

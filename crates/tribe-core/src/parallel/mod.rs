//! Parallel Gibbs-EM: one master, N worker threads, pairwise delta merges.
//!
//! Workers own private replicas of every count table. Information crosses
//! threads only as copied snapshots handed over a [`protocol::PairLink`]
//! the master creates for each pair, so no table is ever shared mutably.

pub mod master;
pub mod merge;
pub mod pairing;
pub mod protocol;
pub mod shard;
mod worker;

pub use master::{IterationObserver, IterationSummary, Master, PairingRecord, StopSignal, TrainOutput};
pub use merge::PartnerSnapshots;
pub use pairing::{Pairing, PairingScheduler};
pub use protocol::{StatusMachine, WorkerStats, WorkerStatus};
pub use shard::workloads;

//! Stable event names, training stages and log correlation context.

use serde::{Deserialize, Serialize};
use tribe_common::{RunId, WorkerId};

/// Phases of a training run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Trace parsing and initial assignment.
    Load,
    /// Shard construction and worker startup.
    Init,
    /// E-step and M-step iterations.
    Sample,
    /// Pairing rounds and delta merges.
    Merge,
    /// Reassembly and posterior normalisation.
    Aggregate,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Stage::Load => "load",
            Stage::Init => "init",
            Stage::Sample => "sample",
            Stage::Merge => "merge",
            Stage::Aggregate => "aggregate",
        };
        write!(f, "{}", s)
    }
}

/// Standard event names used in logging.
pub mod event_names {
    pub const TRACE_LOADED: &str = "load.trace_loaded";
    pub const TRAIN_STARTED: &str = "train.started";
    pub const ITERATION_DONE: &str = "train.iteration_done";
    pub const PAIRING_CHOSEN: &str = "merge.pairing_chosen";
    pub const WORKER_MERGED: &str = "merge.worker_merged";
    pub const WORKER_FAILED: &str = "worker.failed";
    pub const TRAIN_FINISHED: &str = "train.finished";
}

/// Correlation fields attached to every engine log line.
#[derive(Debug, Clone)]
pub struct LogContext {
    pub run_id: RunId,
    pub worker_id: Option<WorkerId>,
}

impl LogContext {
    pub fn new(run_id: RunId) -> Self {
        LogContext {
            run_id,
            worker_id: None,
        }
    }

    /// Same run, scoped to one worker.
    pub fn for_worker(&self, worker: WorkerId) -> Self {
        LogContext {
            run_id: self.run_id.clone(),
            worker_id: Some(worker),
        }
    }
}

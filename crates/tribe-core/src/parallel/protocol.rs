//! Messages and the worker status machine.
//!
//! ```text
//! Started -> Learn -> PairMe -> Paired -> Learn -> ... -> Stop -> Finished
//!                       \-> Learn (idle this round)
//! ```
//!
//! Any non-terminal state may move to `Stop`. `Misc` is an out-of-band
//! diagnostic and never changes the current state.

use std::ops::Range;
use std::sync::mpsc::{channel, Receiver, Sender};

use ndarray::Array2;
use serde::{Deserialize, Serialize};
use tribe_common::{Error, Result, WorkerId};

use crate::data::CountTables;
use crate::kernel::KernelState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum WorkerStatus {
    Started,
    Learn,
    PairMe,
    Paired { partner: WorkerId },
    Stop,
    Finished,
    Misc,
}

impl std::fmt::Display for WorkerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkerStatus::Started => write!(f, "started"),
            WorkerStatus::Learn => write!(f, "learn"),
            WorkerStatus::PairMe => write!(f, "pair_me"),
            WorkerStatus::Paired { partner } => write!(f, "paired({})", partner),
            WorkerStatus::Stop => write!(f, "stop"),
            WorkerStatus::Finished => write!(f, "finished"),
            WorkerStatus::Misc => write!(f, "misc"),
        }
    }
}

/// Guarded transitions between [`WorkerStatus`] values.
#[derive(Debug, Clone)]
pub struct StatusMachine {
    worker: WorkerId,
    current: WorkerStatus,
}

impl StatusMachine {
    pub fn new(worker: WorkerId) -> Self {
        Self {
            worker,
            current: WorkerStatus::Started,
        }
    }

    pub fn current(&self) -> WorkerStatus {
        self.current
    }

    pub fn is_terminal(&self) -> bool {
        self.current == WorkerStatus::Finished
    }

    /// Move to `next`, or fail with a protocol error if the edge is illegal.
    pub fn advance(&mut self, next: WorkerStatus) -> Result<WorkerStatus> {
        use WorkerStatus::*;
        let legal = match (self.current, next) {
            (Finished, _) => false,
            (_, Misc) => return Ok(self.current),
            (Stop, Finished) => true,
            (Stop, _) => false,
            (_, Stop) => true,
            (Started, Learn) => true,
            (Learn, PairMe) => true,
            (PairMe, Paired { partner }) => partner != self.worker,
            (PairMe, Learn) => true,
            (Paired { .. }, Learn) => true,
            _ => false,
        };
        if !legal {
            return Err(Error::Protocol(format!(
                "worker {} cannot move from {} to {}",
                self.worker, self.current, next
            )));
        }
        self.current = next;
        Ok(next)
    }
}

/// Local work counters returned with the final result.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerStats {
    pub e_steps_started: usize,
    pub merges: usize,
    pub m_steps: usize,
}

/// What one side of a pair hands to the other.
#[derive(Debug, Clone)]
pub struct InterWorkerData {
    pub from: WorkerId,
    pub count_sz: Array2<u64>,
    pub kernel_state: KernelState,
}

/// A worker's final state.
#[derive(Debug, Clone)]
pub struct ResultData {
    pub worker: WorkerId,
    pub range: Range<usize>,
    pub topics: Vec<usize>,
    pub counts: CountTables,
    pub kernel_state: KernelState,
    pub stats: WorkerStats,
}

#[derive(Debug)]
pub enum ReportKind {
    Started,
    /// Local E-step (and M-step) done; the worker now waits for a command.
    /// Carries the shard's assignment when the master averages posteriors.
    IterationDone {
        iteration: usize,
        topics: Option<Vec<usize>>,
    },
    Finished(Box<ResultData>),
    Failed(Error),
    Misc(String),
}

/// Worker to master message.
#[derive(Debug)]
pub struct WorkerReport {
    pub worker: WorkerId,
    pub kind: ReportKind,
}

/// Master to worker message.
#[derive(Debug)]
pub enum Command {
    Pair { partner: WorkerId, link: PairLink },
    /// Idle this round and start the next iteration.
    Learn,
    Stop,
}

/// One endpoint of a bidirectional exchange between two paired workers.
#[derive(Debug)]
pub struct PairLink {
    tx: Sender<InterWorkerData>,
    rx: Receiver<InterWorkerData>,
}

impl PairLink {
    /// Two connected endpoints.
    pub fn pair() -> (PairLink, PairLink) {
        let (tx_a, rx_b) = channel();
        let (tx_b, rx_a) = channel();
        (PairLink { tx: tx_a, rx: rx_a }, PairLink { tx: tx_b, rx: rx_b })
    }

    /// Send our snapshot, then block for the partner's.
    ///
    /// Sends never block, so both sides can call this concurrently.
    pub fn exchange(self, outgoing: InterWorkerData) -> Result<InterWorkerData> {
        let from = outgoing.from;
        self.tx
            .send(outgoing)
            .map_err(|_| Error::ChannelClosed(format!("partner of worker {} hung up before exchange", from)))?;
        self.rx
            .recv()
            .map_err(|_| Error::ChannelClosed(format!("partner of worker {} hung up during exchange", from)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use WorkerStatus::*;

    #[test]
    fn happy_path_transitions() {
        let mut m = StatusMachine::new(WorkerId(0));
        for next in [Learn, PairMe, Paired { partner: WorkerId(1) }, Learn, PairMe, Learn, PairMe, Stop, Finished] {
            m.advance(next).unwrap();
        }
        assert!(m.is_terminal());
    }

    #[test]
    fn illegal_transitions_rejected() {
        let mut m = StatusMachine::new(WorkerId(0));
        assert!(m.advance(PairMe).is_err());
        m.advance(Learn).unwrap();
        assert!(m.advance(Paired { partner: WorkerId(1) }).is_err());
        m.advance(PairMe).unwrap();
        assert!(m.advance(Paired { partner: WorkerId(0) }).is_err(), "self pairing");
        assert!(m.advance(Finished).is_err());
    }

    #[test]
    fn stop_reachable_from_any_live_state() {
        for path in [vec![], vec![Learn], vec![Learn, PairMe]] {
            let mut m = StatusMachine::new(WorkerId(2));
            for s in path {
                m.advance(s).unwrap();
            }
            m.advance(Stop).unwrap();
            assert!(m.advance(Learn).is_err());
            m.advance(Finished).unwrap();
            assert!(m.advance(Stop).is_err());
        }
    }

    #[test]
    fn misc_does_not_change_state() {
        let mut m = StatusMachine::new(WorkerId(0));
        m.advance(Learn).unwrap();
        assert_eq!(m.advance(Misc).unwrap(), Learn);
        assert_eq!(m.current(), Learn);
    }

    #[test]
    fn pair_link_exchanges_both_ways() {
        let (a, b) = PairLink::pair();
        let snap = |id| InterWorkerData {
            from: WorkerId(id),
            count_sz: Array2::zeros((1, 1)),
            kernel_state: Array2::zeros((1, 0)),
        };
        let handle = std::thread::spawn(move || b.exchange(snap(1)).unwrap().from);
        assert_eq!(a.exchange(snap(0)).unwrap().from, WorkerId(1));
        assert_eq!(handle.join().unwrap(), WorkerId(0));
    }

    #[test]
    fn exchange_with_dropped_partner_fails() {
        let (a, b) = PairLink::pair();
        drop(b);
        let err = a
            .exchange(InterWorkerData {
                from: WorkerId(0),
                count_sz: Array2::zeros((1, 1)),
                kernel_state: Array2::zeros((1, 0)),
            })
            .unwrap_err();
        assert_eq!(err.code(), 33);
    }
}

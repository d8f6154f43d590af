//! Which workers exchange counts at each barrier.
//!
//! The matching for iteration `k` depends only on the seed, the worker count
//! and `k`, never on any worker's counts, so a fixed seed replays the same
//! schedule.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tribe_common::{derive_seed, WorkerId};
use tribe_config::{PairingPolicy, PairingTopology};

const PAIRING_STREAM: u64 = 0x7061_6972_696e_6721;

/// Pairs for one barrier plus the workers that sit it out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pairing {
    pub pairs: Vec<(WorkerId, WorkerId)>,
    pub idle: Vec<WorkerId>,
}

impl Pairing {
    /// Everyone idles.
    pub fn none(n_workers: usize) -> Self {
        Self {
            pairs: Vec::new(),
            idle: (0..n_workers).map(WorkerId).collect(),
        }
    }

    fn from_order(order: &[usize]) -> Self {
        let mut pairs = Vec::with_capacity(order.len() / 2);
        for chunk in order.chunks_exact(2) {
            let (a, b) = (chunk[0].min(chunk[1]), chunk[0].max(chunk[1]));
            pairs.push((WorkerId(a), WorkerId(b)));
        }
        let idle = order.chunks_exact(2).remainder().iter().map(|&w| WorkerId(w)).collect();
        Self { pairs, idle }
    }

    /// Partner of `worker`, if it is paired.
    pub fn partner_of(&self, worker: WorkerId) -> Option<WorkerId> {
        self.pairs.iter().find_map(|&(a, b)| {
            if a == worker {
                Some(b)
            } else if b == worker {
                Some(a)
            } else {
                None
            }
        })
    }
}

#[derive(Debug, Clone)]
pub struct PairingScheduler {
    policy: PairingPolicy,
    n_workers: usize,
    seed: u64,
}

impl PairingScheduler {
    pub fn new(policy: PairingPolicy, n_workers: usize, seed: u64) -> Self {
        Self {
            policy,
            n_workers,
            seed,
        }
    }

    pub fn pairing_for(&self, iteration: usize) -> Pairing {
        if self.n_workers < 2 || !self.policy.pairs_at(iteration) {
            return Pairing::none(self.n_workers);
        }
        let mut order: Vec<usize> = (0..self.n_workers).collect();
        match self.policy.topology {
            PairingTopology::RandomMatching => {
                let mut rng = StdRng::seed_from_u64(derive_seed(self.seed ^ PAIRING_STREAM, iteration as u64));
                order.shuffle(&mut rng);
            }
            PairingTopology::Ring => {
                let round = iteration / self.policy.every.max(1);
                if round % 2 == 1 {
                    order.rotate_left(1);
                }
            }
        }
        Pairing::from_order(&order)
    }
}

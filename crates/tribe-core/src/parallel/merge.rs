//! Delta merge of a partner's site/topic counts.
//!
//! A partner's `count_sz` already contains everything it learned from
//! earlier merges, including things it may have learned from us. Adding its
//! full table every round would count shared history again, so each worker
//! remembers the last snapshot received from every partner and only adds the
//! cell-wise growth since then. Before a first encounter the reference is the
//! initial global table every worker started from.

use std::collections::HashMap;

use ndarray::{Array2, Zip};
use tribe_common::{Error, Result, WorkerId};

use super::protocol::InterWorkerData;
use crate::data::CountTables;

#[derive(Debug, Clone)]
pub struct PartnerSnapshots {
    baseline: Array2<u64>,
    previous: HashMap<WorkerId, Array2<u64>>,
}

impl PartnerSnapshots {
    pub fn new(baseline: Array2<u64>) -> Self {
        Self {
            baseline,
            previous: HashMap::new(),
        }
    }

    /// Last snapshot seen from `partner`, or the baseline.
    pub fn last_seen(&self, partner: WorkerId) -> &Array2<u64> {
        self.previous.get(&partner).unwrap_or(&self.baseline)
    }

    /// Add `max(incoming - last_seen, 0)` into `local.count_sz`, remember
    /// `incoming`, and refresh the marginals. Returns the number of site
    /// visits added.
    pub fn merge_into(&mut self, local: &mut CountTables, incoming: &InterWorkerData) -> Result<u64> {
        let expected = local.count_sz.dim();
        if incoming.count_sz.dim() != expected {
            return Err(Error::ShapeMismatch {
                what: format!("Count_sz from worker {}", incoming.from),
                expected,
                actual: incoming.count_sz.dim(),
            });
        }
        let previous = self.last_seen(incoming.from);
        if previous.dim() != expected {
            return Err(Error::ShapeMismatch {
                what: format!("stored snapshot of worker {}", incoming.from),
                expected,
                actual: previous.dim(),
            });
        }

        let mut added = 0u64;
        Zip::from(&mut local.count_sz)
            .and(&incoming.count_sz)
            .and(previous)
            .for_each(|cell, &fresh, &seen| {
                let delta = fresh.saturating_sub(seen);
                *cell += delta;
                added += delta;
            });

        self.previous.insert(incoming.from, incoming.count_sz.clone());
        local.refresh_marginals();
        Ok(added)
    }
}

//! Dense co-occurrence count tables.
//!
//! - `count_zh[z, h]`: events of hyper-entity `h` assigned topic `z`
//! - `count_sz[s, z]`: site visits to `s` inside events assigned topic `z`
//! - `count_h[h]`, `count_z[z]`: the matching marginals
//!
//! Every mutation keeps `count_h == column sums of count_zh` and
//! `count_z == column sums of count_sz`; [`CountTables::check_marginals`]
//! verifies it.

use ndarray::{Array1, Array2, ArrayView1, Axis};
use serde::{Deserialize, Serialize};
use tribe_common::{Error, Result};

use super::trace::Trace;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountTables {
    pub count_zh: Array2<u64>,
    pub count_sz: Array2<u64>,
    pub count_h: Array1<u64>,
    pub count_z: Array1<u64>,
}

impl CountTables {
    pub fn zeros(n_topics: usize, n_hypers: usize, n_sites: usize) -> Self {
        Self {
            count_zh: Array2::zeros((n_topics, n_hypers)),
            count_sz: Array2::zeros((n_sites, n_topics)),
            count_h: Array1::zeros(n_hypers),
            count_z: Array1::zeros(n_topics),
        }
    }

    /// Count every event of `trace` under its assignment in `topics`.
    pub fn populate(
        trace: &Trace,
        topics: &[usize],
        n_topics: usize,
        n_hypers: usize,
        n_sites: usize,
    ) -> Result<Self> {
        if topics.len() != trace.len() {
            return Err(Error::Data(format!(
                "{} topic assignments for {} events",
                topics.len(),
                trace.len()
            )));
        }
        let mut counts = Self::zeros(n_topics, n_hypers, n_sites);
        for (i, &z) in topics.iter().enumerate() {
            if z >= n_topics {
                return Err(Error::Data(format!(
                    "event {} assigned topic {} but only {} topics exist",
                    i, z, n_topics
                )));
            }
            let h = trace.hyper(i);
            if h >= n_hypers {
                return Err(Error::Data(format!("event {} has unknown hyper-entity {}", i, h)));
            }
            if let Some(s) = trace.sites(i).iter().find(|&&s| s >= n_sites) {
                return Err(Error::Data(format!("event {} visits unknown site {}", i, s)));
            }
            counts.add_event(h, trace.sites(i), z);
        }
        Ok(counts)
    }

    pub fn n_topics(&self) -> usize {
        self.count_z.len()
    }

    pub fn n_hypers(&self) -> usize {
        self.count_h.len()
    }

    pub fn n_sites(&self) -> usize {
        self.count_sz.nrows()
    }

    pub fn add_event(&mut self, hyper: usize, sites: ArrayView1<'_, usize>, topic: usize) {
        self.count_zh[[topic, hyper]] += 1;
        self.count_h[hyper] += 1;
        for &s in sites {
            self.count_sz[[s, topic]] += 1;
            self.count_z[topic] += 1;
        }
    }

    /// Undo [`CountTables::add_event`]. Fails rather than wrapping if any
    /// affected cell is already zero.
    pub fn remove_event(&mut self, hyper: usize, sites: ArrayView1<'_, usize>, topic: usize) -> Result<()> {
        let underflow = self.count_zh[[topic, hyper]] == 0
            || self.count_h[hyper] == 0
            || (self.count_z[topic] as usize) < sites.len()
            || sites.iter().any(|&s| {
                let needed = sites.iter().filter(|&&other| other == s).count() as u64;
                self.count_sz[[s, topic]] < needed
            });
        if underflow {
            return Err(Error::InconsistentCounts(format!(
                "removing hyper {} from topic {} would drive a count negative",
                hyper, topic
            )));
        }
        self.count_zh[[topic, hyper]] -= 1;
        self.count_h[hyper] -= 1;
        for &s in sites {
            self.count_sz[[s, topic]] -= 1;
            self.count_z[topic] -= 1;
        }
        Ok(())
    }

    /// Recompute both marginals from the joint tables.
    pub fn refresh_marginals(&mut self) {
        self.count_h = self.count_zh.sum_axis(Axis(0));
        self.count_z = self.count_sz.sum_axis(Axis(0));
    }

    pub fn check_marginals(&self) -> Result<()> {
        if self.count_zh.sum_axis(Axis(0)) != self.count_h {
            return Err(Error::InconsistentCounts(
                "count_h does not match the column sums of Count_zh".to_string(),
            ));
        }
        if self.count_sz.sum_axis(Axis(0)) != self.count_z {
            return Err(Error::InconsistentCounts(
                "count_z does not match the column sums of Count_sz".to_string(),
            ));
        }
        Ok(())
    }
}

//! Per-topic timestamp multisets.
//!
//! The kernel M-step needs, for every topic, the timestamps (final gap) of
//! the events currently assigned to it. Topic reassignment moves one stamp
//! between two topics, so each topic keeps an ordered multiset keyed by the
//! IEEE bit pattern of the stamp. For non-negative finite values the bit
//! order equals the numeric order.

use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StampLists {
    topics: Vec<BTreeMap<u64, usize>>,
    lens: Vec<usize>,
}

fn key(stamp: f64) -> u64 {
    // -0.0 and 0.0 must share a key.
    if stamp == 0.0 {
        0.0f64.to_bits()
    } else {
        stamp.to_bits()
    }
}

impl StampLists {
    pub fn new(n_topics: usize) -> Self {
        Self {
            topics: vec![BTreeMap::new(); n_topics],
            lens: vec![0; n_topics],
        }
    }

    pub fn n_topics(&self) -> usize {
        self.topics.len()
    }

    pub fn push(&mut self, topic: usize, stamp: f64) {
        *self.topics[topic].entry(key(stamp)).or_insert(0) += 1;
        self.lens[topic] += 1;
    }

    /// Remove one occurrence of `stamp` from `topic`. Returns false if absent.
    pub fn remove(&mut self, topic: usize, stamp: f64) -> bool {
        let k = key(stamp);
        let list = &mut self.topics[topic];
        match list.get_mut(&k) {
            Some(n) if *n > 1 => *n -= 1,
            Some(_) => {
                list.remove(&k);
            }
            None => return false,
        }
        self.lens[topic] -= 1;
        true
    }

    pub fn len(&self, topic: usize) -> usize {
        self.lens[topic]
    }

    pub fn total(&self) -> usize {
        self.lens.iter().sum()
    }

    /// Stamps of `topic` in ascending order, repeated by multiplicity.
    pub fn iter(&self, topic: usize) -> impl Iterator<Item = f64> + '_ {
        self.topics[topic]
            .iter()
            .flat_map(|(bits, n)| std::iter::repeat(f64::from_bits(*bits)).take(*n))
    }
}

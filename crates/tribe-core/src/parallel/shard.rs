//! Contiguous partition of the event index range.

use std::ops::Range;

/// Split `[0, n_events)` into `n_workers` contiguous shards.
///
/// Every shard but the last holds `ceil(n_events / n_workers)` events; the
/// last takes the remainder. When the division is very uneven trailing
/// shards can be empty.
pub fn workloads(n_events: usize, n_workers: usize) -> Vec<Range<usize>> {
    if n_workers == 0 {
        return Vec::new();
    }
    let size = n_events.div_ceil(n_workers);
    (0..n_workers)
        .map(|i| {
            let start = (i * size).min(n_events);
            let end = ((i + 1) * size).min(n_events);
            start..end
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn even_split() {
        assert_eq!(workloads(6, 2), vec![0..3, 3..6]);
    }

    #[test]
    fn remainder_goes_last() {
        assert_eq!(workloads(7, 3), vec![0..3, 3..6, 6..7]);
    }

    #[test]
    fn uneven_split_may_leave_empty_tail() {
        assert_eq!(workloads(5, 4), vec![0..2, 2..4, 4..5, 5..5]);
    }

    #[test]
    fn single_worker_takes_everything() {
        assert_eq!(workloads(9, 1), vec![0..9]);
        assert!(workloads(3, 0).is_empty());
    }
}

//! Property tests for shards and the delta merge.

use ndarray::Array2;
use proptest::prelude::*;
use tribe_common::WorkerId;
use tribe_core::data::{CountTables, InitialTopics, InputData, RawEvent};
use tribe_core::parallel::protocol::InterWorkerData;
use tribe_core::parallel::{workloads, PartnerSnapshots};

fn snapshot(from: usize, cells: &[u64], n_sites: usize, n_topics: usize) -> InterWorkerData {
    InterWorkerData {
        from: WorkerId(from),
        count_sz: Array2::from_shape_vec((n_sites, n_topics), cells.to_vec()).unwrap(),
        kernel_state: Array2::zeros((n_topics, 1)),
    }
}

fn local_tables(n_sites: usize, n_topics: usize, seed: u64) -> CountTables {
    let events = (0..12)
        .map(|i| {
            let a = format!("s{}", i % n_sites);
            let b = format!("s{}", (i * 7 + seed as usize) % n_sites);
            RawEvent::new(vec![i as f64], "h", &[a.as_str(), b.as_str()])
        })
        .collect();
    let data = InputData::from_events(events, n_topics, InitialTopics::Random, seed).unwrap();
    // Pad to the requested site count in case some were never visited.
    let mut counts = CountTables::zeros(n_topics, 1, n_sites);
    let visited = data.counts.n_sites();
    counts
        .count_sz
        .slice_mut(ndarray::s![..visited, ..])
        .assign(&data.counts.count_sz);
    counts.count_zh.assign(&data.counts.count_zh);
    counts.refresh_marginals();
    counts
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn shards_partition_the_trace(n_events in 1usize..500, workers in 1usize..64) {
        let n_workers = workers.min(n_events);
        let shards = workloads(n_events, n_workers);
        prop_assert_eq!(shards.len(), n_workers);
        prop_assert_eq!(shards[0].start, 0);
        prop_assert_eq!(shards[n_workers - 1].end, n_events);
        for pair in shards.windows(2) {
            prop_assert_eq!(pair[0].end, pair[1].start);
        }
        let total: usize = shards.iter().map(|r| r.len()).sum();
        prop_assert_eq!(total, n_events);
    }

    #[test]
    fn merges_never_shrink_cells_and_keep_marginals(
        seed in 0u64..1000,
        rounds in prop::collection::vec((1usize..4, prop::collection::vec(0u64..20, 8)), 1..12),
    ) {
        let (n_sites, n_topics) = (4, 2);
        let mut local = local_tables(n_sites, n_topics, seed);
        let mut snaps = PartnerSnapshots::new(local.count_sz.clone());
        for (partner, cells) in rounds {
            let before = local.count_sz.clone();
            snaps.merge_into(&mut local, &snapshot(partner, &cells, n_sites, n_topics)).unwrap();
            for (after, was) in local.count_sz.iter().zip(before.iter()) {
                prop_assert!(after >= was);
            }
            prop_assert!(local.check_marginals().is_ok());
        }
    }

    #[test]
    fn merging_an_unchanged_snapshot_twice_is_noop(
        seed in 0u64..1000,
        cells in prop::collection::vec(0u64..50, 8),
    ) {
        let mut local = local_tables(4, 2, seed);
        let mut snaps = PartnerSnapshots::new(local.count_sz.clone());
        let incoming = snapshot(1, &cells, 4, 2);
        snaps.merge_into(&mut local, &incoming).unwrap();
        let once = local.clone();
        let added = snaps.merge_into(&mut local, &incoming).unwrap();
        prop_assert_eq!(added, 0);
        prop_assert_eq!(local, once);
    }
}

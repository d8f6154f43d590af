//! End-to-end tests for the master/worker engine.

use std::sync::{Arc, Mutex};

use tribe_common::{Error, ErrorCategory, WorkerId};
use tribe_config::{HyperParams, KernelFamily, PairingPolicy, PairingTopology};
use tribe_core::data::RawEvent;
use tribe_core::parallel::{IterationSummary, StopSignal};
use tribe_core::{InitialTopics, InputData, Master};
use tribe_math::max_column_deviation;

// ============================================================================
// Fixtures
// ============================================================================

/// 6 events, one gap each, hyper-entities u1/u2, sites a/b/c.
fn six_events() -> Vec<RawEvent> {
    vec![
        RawEvent::new(vec![0.5], "u1", &["a", "b"]),
        RawEvent::new(vec![1.5], "u2", &["b", "c"]),
        RawEvent::new(vec![2.0], "u1", &["a", "a"]),
        RawEvent::new(vec![0.7], "u2", &["c", "c"]),
        RawEvent::new(vec![3.2], "u1", &["b", "a"]),
        RawEvent::new(vec![1.1], "u2", &["c", "b"]),
    ]
}

fn many_events(n: usize) -> Vec<RawEvent> {
    (0..n)
        .map(|i| {
            let hyper = format!("u{}", i % 4);
            let sites = [["a", "b"], ["b", "c"], ["c", "d"], ["d", "a"], ["e", "e"]][i % 5];
            RawEvent::new(vec![(i % 7) as f64 + 0.25], hyper, &sites)
        })
        .collect()
}

fn input(events: Vec<RawEvent>, n_topics: usize, seed: u64) -> InputData {
    InputData::from_events(events, n_topics, InitialTopics::Random, seed).unwrap()
}

fn scenario() -> HyperParams {
    HyperParams::default()
        .with_topics(2)
        .with_iterations(5, 2)
        .with_workers(2)
        .with_seed(7)
}

// ============================================================================
// Scenario
// ============================================================================

#[test]
fn six_event_scenario_terminates_with_normalised_posteriors() {
    let output = Master::new(scenario(), input(six_events(), 2, 7))
        .unwrap()
        .train()
        .unwrap();

    assert_eq!(output.theta_zh.dim(), (2, 2));
    assert_eq!(output.psi_sz.dim(), (3, 2));
    assert!(max_column_deviation(&output.theta_zh) < 1e-9);
    assert!(max_column_deviation(&output.psi_sz) < 1e-9);

    assert_eq!(output.iterations_completed, 5);
    assert!(!output.stopped_early);
    assert_eq!(output.topics.len(), 6);
    assert!(output.topics.iter().all(|&z| z < 2));
    assert_eq!(output.hyper2id.len(), 2);
    assert_eq!(output.site2id.len(), 3);
    assert_eq!(output.kernel_state.dim(), (2, 1));
    output.counts.check_marginals().unwrap();

    // Two workers always pair, except after the final iteration.
    assert_eq!(output.pairing_log.len(), 4);
    for record in &output.pairing_log {
        assert_eq!(record.pairs, vec![(WorkerId(0), WorkerId(1))]);
    }
    assert_eq!(output.worker_stats.len(), 2);
    for stats in &output.worker_stats {
        assert_eq!(stats.e_steps_started, 5);
        assert_eq!(stats.merges, 4);
        assert_eq!(stats.m_steps, 0);
    }
}

#[test]
fn averaged_posteriors_are_normalised() {
    let hyper = scenario().with_averaging(true).with_dynamic(true, 2);
    let output = Master::new(hyper, input(six_events(), 2, 7))
        .unwrap()
        .train()
        .unwrap();
    assert!(max_column_deviation(&output.theta_zh) < 1e-9);
    assert!(max_column_deviation(&output.psi_sz) < 1e-9);
    // Iterations 0, 2 and 4 refit the kernel.
    for stats in &output.worker_stats {
        assert_eq!(stats.m_steps, 3);
    }
}

#[test]
fn worker_replicas_keep_marginals_through_merges() {
    let hyper = scenario()
        .with_workers(4)
        .with_iterations(8, 2)
        .with_dynamic(true, 1);
    let output = Master::new(hyper, input(many_events(40), 2, 5))
        .unwrap()
        .train()
        .unwrap();

    assert_eq!(output.replica_counts.len(), 4);
    for (w, replica) in output.replica_counts.iter().enumerate() {
        replica.check_marginals().unwrap();
        assert_eq!(replica.count_zh.dim(), output.counts.count_zh.dim(), "worker {w}");
        assert_eq!(replica.count_sz.dim(), output.counts.count_sz.dim(), "worker {w}");
    }
    for stats in &output.worker_stats {
        assert!(stats.merges > 0);
    }
}

#[test]
fn static_kernel_keeps_prior_parameters() {
    let hyper = scenario()
        .with_kernel(KernelFamily::Exponential)
        .with_residency_priors(vec![1.0, 1.0])
        .with_dynamic(false, 1);
    let output = Master::new(hyper, input(six_events(), 2, 7))
        .unwrap()
        .train()
        .unwrap();
    assert_eq!(output.kernel_state, ndarray::Array2::from_elem((2, 1), 1.0));
    for stats in &output.worker_stats {
        assert_eq!(stats.m_steps, 0);
    }
}

#[test]
fn odd_worker_count_and_empty_shard_still_finish() {
    // 5 events over 4 workers leaves the last shard empty.
    let mut events = six_events();
    events.pop();
    let hyper = scenario().with_workers(4).with_iterations(4, 0);
    let output = Master::new(hyper, input(events, 2, 3)).unwrap().train().unwrap();
    assert_eq!(output.topics.len(), 5);
    assert_eq!(output.worker_stats.len(), 4);
    assert!(max_column_deviation(&output.theta_zh) < 1e-9);

    let hyper = scenario().with_workers(3).with_iterations(4, 0);
    let output = Master::new(hyper, input(six_events(), 2, 3)).unwrap().train().unwrap();
    for record in &output.pairing_log {
        assert_eq!(record.pairs.len(), 1);
    }
}

// ============================================================================
// Determinism
// ============================================================================

#[test]
fn pairing_schedule_and_result_reproducible() {
    let hyper = HyperParams::default()
        .with_topics(3)
        .with_iterations(8, 2)
        .with_workers(4)
        .with_seed(99);
    let run = || {
        Master::new(hyper.clone(), input(many_events(40), 3, 99))
            .unwrap()
            .train()
            .unwrap()
    };
    let first = run();
    let second = run();
    assert_eq!(first.pairing_log, second.pairing_log);
    assert_eq!(first.pairing_log.len(), 7);
    assert_eq!(first.topics, second.topics);
    assert_eq!(first.theta_zh, second.theta_zh);
}

#[test]
fn ring_topology_alternates() {
    let hyper = HyperParams::default()
        .with_topics(2)
        .with_iterations(4, 0)
        .with_workers(4)
        .with_pairing(PairingPolicy {
            topology: PairingTopology::Ring,
            every: 1,
        });
    let output = Master::new(hyper, input(many_events(12), 2, 1))
        .unwrap()
        .train()
        .unwrap();
    let w = WorkerId;
    assert_eq!(output.pairing_log[0].pairs, vec![(w(0), w(1)), (w(2), w(3))]);
    assert_eq!(output.pairing_log[1].pairs, vec![(w(1), w(2)), (w(0), w(3))]);
    assert_eq!(output.pairing_log[2].pairs, output.pairing_log[0].pairs);
}

// ============================================================================
// Control surface
// ============================================================================

#[test]
fn stop_after_iteration_prevents_further_e_steps() {
    let stop = StopSignal::new();
    let seen: Arc<Mutex<Vec<IterationSummary>>> = Arc::new(Mutex::new(Vec::new()));

    let trigger = stop.clone();
    let log = Arc::clone(&seen);
    let hyper = HyperParams::default()
        .with_topics(2)
        .with_iterations(20, 0)
        .with_workers(3);
    let output = Master::new(hyper, input(many_events(15), 2, 5))
        .unwrap()
        .with_stop_signal(stop)
        .with_observer(move |summary: &IterationSummary| {
            log.lock().unwrap().push(summary.clone());
            if summary.iteration == 1 {
                trigger.request_stop();
            }
        })
        .train()
        .unwrap();

    assert!(output.stopped_early);
    assert_eq!(output.iterations_completed, 2);
    for stats in &output.worker_stats {
        assert_eq!(stats.e_steps_started, 2);
    }
    // The pairing proposed at the stopping barrier is never carried out.
    assert_eq!(output.pairing_log.len(), 1);
    assert_eq!(seen.lock().unwrap().len(), 2);
    assert!(max_column_deviation(&output.theta_zh) < 1e-9);
}

#[test]
fn degenerate_distribution_aborts_whole_run() {
    let events: Vec<RawEvent> = (0..8)
        .map(|i| RawEvent::new(vec![100.0 + i as f64], "u", &["a", "b"]))
        .collect();
    let hyper = HyperParams::default()
        .with_topics(2)
        .with_iterations(3, 0)
        .with_workers(2)
        .with_kernel(KernelFamily::Exponential)
        .with_residency_priors(vec![1e6, 1e-6]);
    let err = Master::new(hyper, input(events, 2, 0)).unwrap().train().unwrap_err();
    assert!(matches!(err, Error::DegenerateDistribution { .. }), "{err}");
    assert_eq!(err.category(), ErrorCategory::Worker);
}

#[test]
fn configuration_errors_fail_before_training() {
    let too_many_workers = scenario().with_workers(7);
    let err = Master::new(too_many_workers, input(six_events(), 2, 7)).err().unwrap();
    assert_eq!(err.code(), 11);

    let topic_mismatch = scenario().with_topics(3);
    let err = Master::new(topic_mismatch, input(six_events(), 2, 7)).err().unwrap();
    assert_eq!(err.category(), ErrorCategory::Config);
}

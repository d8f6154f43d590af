//! A single worker never pairs, so the engine must collapse to serial EM.

use tribe_config::{HyperParams, KernelFamily};
use tribe_core::data::RawEvent;
use tribe_core::learn::em;
use tribe_core::{InitialTopics, InputData, Master};

fn trace() -> InputData {
    let events = (0..30)
        .map(|i| {
            let hyper = ["ana", "bob", "cat"][i % 3];
            let a = ["home", "work", "gym", "bar"][i % 4];
            let b = ["work", "home", "bar"][(i / 2) % 3];
            RawEvent::new(vec![(i % 5) as f64 * 0.4, 1.0 + (i % 11) as f64], hyper, &[a, b, a])
        })
        .collect();
    InputData::from_events(events, 4, InitialTopics::Random, 17).unwrap()
}

fn assert_same_run(hyper: HyperParams) {
    let data = trace();
    let serial = em(&hyper, &data).unwrap();
    let parallel = Master::new(hyper.with_workers(1), data).unwrap().train().unwrap();

    assert_eq!(parallel.topics, serial.topics);
    assert_eq!(parallel.counts, serial.counts);
    assert_eq!(parallel.theta_zh, serial.posteriors.theta_zh);
    assert_eq!(parallel.psi_sz, serial.posteriors.psi_sz);
    assert_eq!(parallel.kernel_state, serial.kernel_state);
    assert!(parallel.pairing_log.is_empty());
}

#[test]
fn single_worker_matches_serial_em() {
    assert_same_run(
        HyperParams::default()
            .with_topics(4)
            .with_iterations(6, 0)
            .with_seed(17),
    );
}

#[test]
fn single_worker_matches_serial_em_with_dynamic_kernel_and_averaging() {
    assert_same_run(
        HyperParams::default()
            .with_topics(4)
            .with_iterations(7, 3)
            .with_seed(5)
            .with_kernel(KernelFamily::Pareto)
            .with_dynamic(true, 2)
            .with_averaging(true),
    );
}

//! The coordinating side of a training run.
//!
//! [`Master::train`] runs three phases on the calling thread:
//!
//! 1. `start`: shard the trace, give every worker a private replica of the
//!    initial counts and kernel, spawn one thread per worker.
//! 2. `run_to_completion`: per iteration, wait for every worker's report,
//!    pick a pairing, hand each pair a fresh link and release everyone.
//! 3. `collect_and_aggregate`: gather final results, rebuild the full
//!    assignment in index order, recount from scratch and normalise.
//!
//! Any worker failure aborts the run; nothing partial is returned.

use std::collections::BTreeMap;
use std::ops::Range;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Arc;
use std::thread::JoinHandle;

use ndarray::Array2;
use serde::Serialize;
use tribe_common::{Error, Result, RunId, WorkerId};
use tribe_config::{validate_against_trace, validate_hyper_params, HyperParams};

use super::merge::PartnerSnapshots;
use super::pairing::{Pairing, PairingScheduler};
use super::protocol::{Command, PairLink, ReportKind, ResultData, StatusMachine, WorkerReport, WorkerStats, WorkerStatus};
use super::shard::workloads;
use super::worker::Worker;
use crate::data::{CountTables, InputData, Trace};
use crate::kernel::KernelState;
use crate::learn::em::{check_topic_count, initial_kernel};
use crate::learn::{aggregate, GibbsSampler, PosteriorAccumulator, SamplingContext};
use crate::log_event;
use crate::logging::{event_names, LogContext, Stage};

/// Cooperative stop request, checked by the master at every barrier.
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stop_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// What the master decided at one barrier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IterationSummary {
    pub iteration: usize,
    pub pairs: Vec<(WorkerId, WorkerId)>,
    pub idle: Vec<WorkerId>,
}

/// Called synchronously at each barrier, after every worker has reported
/// and before any command is sent. Requesting a stop from inside the
/// callback stops the run at this barrier.
pub trait IterationObserver: Send + Sync {
    fn on_iteration(&self, summary: &IterationSummary);
}

impl<F> IterationObserver for F
where
    F: Fn(&IterationSummary) + Send + Sync,
{
    fn on_iteration(&self, summary: &IterationSummary) {
        self(summary)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PairingRecord {
    pub iteration: usize,
    pub pairs: Vec<(WorkerId, WorkerId)>,
}

/// Result of a completed training run.
#[derive(Debug, Clone, Serialize)]
pub struct TrainOutput {
    pub run_id: RunId,
    /// Topics × hyper-entities, columns sum to 1.
    pub theta_zh: Array2<f64>,
    /// Sites × topics, columns sum to 1.
    pub psi_sz: Array2<f64>,
    /// Final assignment, in time-sorted event order.
    pub topics: Vec<usize>,
    pub kernel_state: KernelState,
    pub hyper2id: BTreeMap<String, usize>,
    pub site2id: BTreeMap<String, usize>,
    pub iterations_completed: usize,
    pub stopped_early: bool,
    pub pairing_log: Vec<PairingRecord>,
    pub worker_stats: Vec<WorkerStats>,
    /// Counts re-derived from `topics`.
    #[serde(skip)]
    pub counts: CountTables,
    /// Each worker's final private tables, merges included.
    #[serde(skip)]
    pub replica_counts: Vec<CountTables>,
}

pub struct Master {
    hyper: Arc<HyperParams>,
    input: InputData,
    stop: StopSignal,
    observer: Option<Box<dyn IterationObserver>>,
    log: LogContext,
}

struct Running {
    handles: Vec<JoinHandle<()>>,
    inboxes: Vec<Sender<Command>>,
    reports: Receiver<WorkerReport>,
    ranges: Vec<Range<usize>>,
    states: Vec<StatusMachine>,
}

struct Progress {
    iterations_completed: usize,
    stopped_early: bool,
    pairing_log: Vec<PairingRecord>,
    accumulator: PosteriorAccumulator,
}

impl Master {
    /// Validate everything up front; no thread exists until [`Master::train`].
    pub fn new(hyper: HyperParams, input: InputData) -> Result<Self> {
        validate_hyper_params(&hyper)?;
        validate_against_trace(&hyper, input.n_events())?;
        check_topic_count(&hyper, &input)?;
        input.counts.check_marginals()?;
        Ok(Self {
            hyper: Arc::new(hyper),
            input,
            stop: StopSignal::new(),
            observer: None,
            log: LogContext::new(RunId::new()),
        })
    }

    pub fn with_stop_signal(mut self, stop: StopSignal) -> Self {
        self.stop = stop;
        self
    }

    pub fn with_observer(mut self, observer: impl IterationObserver + 'static) -> Self {
        self.observer = Some(Box::new(observer));
        self
    }

    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    pub fn run_id(&self) -> &RunId {
        &self.log.run_id
    }

    pub fn n_events(&self) -> usize {
        self.input.n_events()
    }

    pub fn train(self) -> Result<TrainOutput> {
        let trace = Arc::new(self.input.trace.clone());
        log_event!(self.log, INFO, event_names::TRAIN_STARTED, Stage::Init, "training started",
            workers = self.hyper.n_workers, events = trace.len(), topics = self.hyper.n_topics,
            iterations = self.hyper.n_iter);

        let mut running = self.start(&trace)?;
        let progress = match self.run_to_completion(&mut running) {
            Ok(progress) => progress,
            Err(err) => {
                abort(running);
                return Err(err);
            }
        };
        self.collect_and_aggregate(running, progress, &trace)
    }

    fn start(&self, trace: &Arc<Trace>) -> Result<Running> {
        let n = self.hyper.n_workers;
        let ranges = workloads(trace.len(), n);
        let kernel = initial_kernel(&self.hyper, &self.input)?;
        let (report_tx, report_rx) = channel();
        let mut running = Running {
            handles: Vec::with_capacity(n),
            inboxes: Vec::with_capacity(n),
            reports: report_rx,
            ranges: ranges.clone(),
            states: (0..n).map(|w| StatusMachine::new(WorkerId(w))).collect(),
        };

        for (w, range) in ranges.into_iter().enumerate() {
            let id = WorkerId(w);
            let (cmd_tx, cmd_rx) = channel();
            let ctx = SamplingContext {
                worker: id,
                alpha_zh: self.hyper.alpha_zh,
                beta_zs: self.hyper.beta_zs,
                n_topics: self.input.n_topics,
                n_sites: self.input.n_sites(),
            };
            let worker = Worker {
                id,
                topics: self.input.topics[range.clone()].to_vec(),
                range,
                sampler: GibbsSampler::new(
                    ctx,
                    self.input.counts.clone(),
                    self.input.stamps.clone(),
                    kernel.clone(),
                    id.seed(self.hyper.random_seed),
                ),
                snapshots: PartnerSnapshots::new(self.input.counts.count_sz.clone()),
                hyper: Arc::clone(&self.hyper),
                trace: Arc::clone(trace),
                commands: cmd_rx,
                reports: report_tx.clone(),
                log: self.log.for_worker(id),
            };
            match worker.spawn() {
                Ok(handle) => {
                    running.handles.push(handle);
                    running.inboxes.push(cmd_tx);
                }
                Err(err) => {
                    abort(running);
                    return Err(err);
                }
            }
        }
        Ok(running)
    }

    fn run_to_completion(&self, running: &mut Running) -> Result<Progress> {
        let n = self.hyper.n_workers;
        let scheduler = PairingScheduler::new(self.hyper.pairing, n, self.hyper.random_seed);
        let mut progress = Progress {
            iterations_completed: 0,
            stopped_early: false,
            pairing_log: Vec::new(),
            accumulator: PosteriorAccumulator::new(),
        };
        let mut shard_topics: Vec<Option<Vec<usize>>> = vec![None; n];

        for iteration in 0..self.hyper.n_iter {
            self.barrier(running, iteration, &mut shard_topics)?;
            progress.iterations_completed = iteration + 1;

            if self.hyper.average_posteriors && self.hyper.is_post_burn_in(iteration) {
                let topics = reassemble_partial(&running.ranges, &mut shard_topics, self.input.n_events())?;
                let counts = self.recount(&topics)?;
                progress
                    .accumulator
                    .add(&aggregate(&counts, self.hyper.alpha_zh, self.hyper.beta_zs));
            }

            let last = iteration + 1 == self.hyper.n_iter;
            let pairing = if last {
                Pairing::none(n)
            } else {
                scheduler.pairing_for(iteration)
            };
            log_event!(self.log, DEBUG, event_names::ITERATION_DONE, Stage::Sample, "iteration done",
                iteration = iteration, pairs = pairing.pairs.len());

            if let Some(observer) = &self.observer {
                observer.on_iteration(&IterationSummary {
                    iteration,
                    pairs: pairing.pairs.clone(),
                    idle: pairing.idle.clone(),
                });
            }

            if last || self.stop.is_stop_requested() {
                progress.stopped_early = !last;
                for w in 0..n {
                    running.states[w].advance(WorkerStatus::Stop)?;
                    send(running, w, Command::Stop)?;
                }
                break;
            }

            self.dispatch(running, &pairing)?;
            if !pairing.pairs.is_empty() {
                log_event!(self.log, DEBUG, event_names::PAIRING_CHOSEN, Stage::Merge, "pairing dispatched",
                    iteration = iteration, pairs = pairing.pairs.len(), idle = pairing.idle.len());
                progress.pairing_log.push(PairingRecord {
                    iteration,
                    pairs: pairing.pairs,
                });
            }
        }
        Ok(progress)
    }

    /// Block until every worker reported `iteration` as done.
    fn barrier(&self, running: &mut Running, iteration: usize, shard_topics: &mut [Option<Vec<usize>>]) -> Result<()> {
        let n = running.states.len();
        let mut done = vec![false; n];
        let mut remaining = n;
        while remaining > 0 {
            let report = recv(running)?;
            let w = checked_worker(report.worker, n)?;
            match report.kind {
                ReportKind::Started => {
                    tracing::trace!(worker = w, "worker started");
                }
                ReportKind::Misc(message) => {
                    running.states[w].advance(WorkerStatus::Misc)?;
                    tracing::debug!(worker = w, message = %message, "worker diagnostic");
                }
                ReportKind::IterationDone { iteration: reported, topics } => {
                    if reported != iteration || done[w] {
                        return Err(Error::Protocol(format!(
                            "worker {} reported iteration {} while the master waits on {}",
                            w, reported, iteration
                        )));
                    }
                    running.states[w].advance(WorkerStatus::Learn)?;
                    running.states[w].advance(WorkerStatus::PairMe)?;
                    shard_topics[w] = topics;
                    done[w] = true;
                    remaining -= 1;
                }
                ReportKind::Failed(err) => return Err(err),
                ReportKind::Finished(_) => {
                    return Err(Error::Protocol(format!("worker {} finished before being stopped", w)));
                }
            }
        }
        Ok(())
    }

    fn dispatch(&self, running: &mut Running, pairing: &Pairing) -> Result<()> {
        for &(a, b) in &pairing.pairs {
            let (link_a, link_b) = PairLink::pair();
            running.states[a.0].advance(WorkerStatus::Paired { partner: b })?;
            running.states[b.0].advance(WorkerStatus::Paired { partner: a })?;
            send(running, a.0, Command::Pair { partner: b, link: link_a })?;
            send(running, b.0, Command::Pair { partner: a, link: link_b })?;
        }
        for &w in &pairing.idle {
            send(running, w.0, Command::Learn)?;
        }
        Ok(())
    }

    fn collect_and_aggregate(self, mut running: Running, progress: Progress, trace: &Trace) -> Result<TrainOutput> {
        let results = match collect_results(&mut running) {
            Ok(results) => results,
            Err(err) => {
                abort(running);
                return Err(err);
            }
        };
        for (w, handle) in running.handles.into_iter().enumerate() {
            handle.join().map_err(|_| Error::WorkerPanicked { worker: w })?;
        }

        let mut topics = vec![0usize; trace.len()];
        let mut kernel_sum: Option<KernelState> = None;
        let n_results = results.len();
        let mut worker_stats = Vec::with_capacity(n_results);
        let mut replica_counts = Vec::with_capacity(n_results);
        for (w, result) in results.into_iter().enumerate() {
            if result.range != running.ranges[w] || result.topics.len() != result.range.len() {
                return Err(Error::Protocol(format!(
                    "worker {} returned {} assignments for shard {:?}",
                    w,
                    result.topics.len(),
                    running.ranges[w]
                )));
            }
            topics[result.range.clone()].copy_from_slice(&result.topics);
            match &mut kernel_sum {
                Some(sum) => {
                    if sum.dim() != result.kernel_state.dim() {
                        return Err(Error::ShapeMismatch {
                            what: format!("kernel state of worker {}", w),
                            expected: sum.dim(),
                            actual: result.kernel_state.dim(),
                        });
                    }
                    *sum += &result.kernel_state;
                }
                None => kernel_sum = Some(result.kernel_state),
            }
            worker_stats.push(result.stats);
            replica_counts.push(result.counts);
        }
        let kernel_state = kernel_sum
            .map(|sum| sum / n_results as f64)
            .ok_or_else(|| Error::Protocol("no worker results".to_string()))?;

        let counts = self.recount(&topics)?;
        let posteriors = match progress.accumulator.finish() {
            Some(avg) => avg,
            None => aggregate(&counts, self.hyper.alpha_zh, self.hyper.beta_zs),
        };

        log_event!(self.log, INFO, event_names::TRAIN_FINISHED, Stage::Aggregate, "training finished",
            iterations = progress.iterations_completed, stopped_early = progress.stopped_early,
            pairing_rounds = progress.pairing_log.len());

        Ok(TrainOutput {
            run_id: self.log.run_id.clone(),
            theta_zh: posteriors.theta_zh,
            psi_sz: posteriors.psi_sz,
            topics,
            kernel_state,
            hyper2id: self.input.hyper2id,
            site2id: self.input.site2id,
            iterations_completed: progress.iterations_completed,
            stopped_early: progress.stopped_early,
            pairing_log: progress.pairing_log,
            worker_stats,
            counts,
            replica_counts,
        })
    }

    /// Global counts straight from an assignment, ignoring worker replicas.
    fn recount(&self, topics: &[usize]) -> Result<CountTables> {
        let counts = CountTables::populate(
            &self.input.trace,
            topics,
            self.input.n_topics,
            self.input.n_hypers(),
            self.input.n_sites(),
        )?;
        counts.check_marginals()?;
        Ok(counts)
    }
}

fn collect_results(running: &mut Running) -> Result<Vec<ResultData>> {
    let n = running.states.len();
    let mut results: Vec<Option<ResultData>> = (0..n).map(|_| None).collect();
    let mut remaining = n;
    while remaining > 0 {
        let report = recv(running)?;
        let w = checked_worker(report.worker, n)?;
        match report.kind {
            ReportKind::Finished(result) => {
                running.states[w].advance(WorkerStatus::Finished)?;
                results[w] = Some(*result);
                remaining -= 1;
            }
            ReportKind::Failed(err) => return Err(err),
            ReportKind::Misc(message) => {
                tracing::debug!(worker = w, message = %message, "worker diagnostic");
            }
            ReportKind::Started | ReportKind::IterationDone { .. } => {
                return Err(Error::Protocol(format!("worker {} kept sampling after stop", w)));
            }
        }
    }
    Ok(results.into_iter().flatten().collect())
}

fn reassemble_partial(
    ranges: &[Range<usize>],
    shard_topics: &mut [Option<Vec<usize>>],
    n_events: usize,
) -> Result<Vec<usize>> {
    let mut topics = vec![0usize; n_events];
    for (w, (range, shard)) in ranges.iter().zip(shard_topics.iter_mut()).enumerate() {
        let shard = shard
            .take()
            .ok_or_else(|| Error::Protocol(format!("worker {} did not send its assignment", w)))?;
        if shard.len() != range.len() {
            return Err(Error::Protocol(format!(
                "worker {} sent {} assignments for shard {:?}",
                w,
                shard.len(),
                range
            )));
        }
        topics[range.clone()].copy_from_slice(&shard);
    }
    Ok(topics)
}

fn checked_worker(worker: WorkerId, n: usize) -> Result<usize> {
    if worker.0 >= n {
        return Err(Error::Protocol(format!("report from unknown worker {}", worker)));
    }
    Ok(worker.0)
}

fn recv(running: &Running) -> Result<WorkerReport> {
    running
        .reports
        .recv()
        .map_err(|_| Error::ChannelClosed("every worker hung up".to_string()))
}

/// Deliver a command, preferring a queued worker failure over the bare
/// disconnect if the worker already died.
fn send(running: &Running, worker: usize, command: Command) -> Result<()> {
    if running.inboxes[worker].send(command).is_ok() {
        return Ok(());
    }
    while let Ok(report) = running.reports.try_recv() {
        if let ReportKind::Failed(err) = report.kind {
            return Err(err);
        }
    }
    Err(Error::ChannelClosed(format!("worker {} inbox closed", worker)))
}

/// Stop everyone and wait for the threads; results are discarded.
fn abort(running: Running) {
    for inbox in &running.inboxes {
        let _ = inbox.send(Command::Stop);
    }
    drop(running.inboxes);
    for handle in running.handles {
        let _ = handle.join();
    }
    tracing::warn!("training aborted");
}

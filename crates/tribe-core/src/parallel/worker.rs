//! Worker thread: sample its shard, report, obey the master, merge.

use std::ops::Range;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::mpsc::{Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tribe_common::{Error, Result, WorkerId};
use tribe_config::HyperParams;

use super::merge::PartnerSnapshots;
use super::protocol::{
    Command, InterWorkerData, PairLink, ReportKind, ResultData, StatusMachine, WorkerReport, WorkerStats, WorkerStatus,
};
use crate::data::Trace;
use crate::learn::GibbsSampler;
use crate::log_event;
use crate::logging::{event_names, LogContext, Stage};

/// Everything a worker owns for the lifetime of the run.
pub(crate) struct Worker {
    pub id: WorkerId,
    pub range: Range<usize>,
    pub topics: Vec<usize>,
    pub sampler: GibbsSampler,
    pub snapshots: PartnerSnapshots,
    pub hyper: Arc<HyperParams>,
    pub trace: Arc<Trace>,
    pub commands: Receiver<Command>,
    pub reports: Sender<WorkerReport>,
    pub log: LogContext,
}

impl Worker {
    /// Start the worker on its own named thread.
    pub fn spawn(self) -> Result<JoinHandle<()>> {
        let id = self.id;
        thread::Builder::new()
            .name(format!("tribe-worker-{}", id))
            .spawn(move || self.run_guarded())
            .map_err(|e| Error::worker(id.0, format!("failed to spawn thread: {}", e)))
    }

    fn run_guarded(self) {
        let id = self.id;
        let reports = self.reports.clone();
        let log = self.log.clone();
        let kind = match catch_unwind(AssertUnwindSafe(move || self.run())) {
            Ok(Ok(result)) => ReportKind::Finished(Box::new(result)),
            Ok(Err(err)) => ReportKind::Failed(err),
            Err(_) => ReportKind::Failed(Error::WorkerPanicked { worker: id.0 }),
        };
        if let ReportKind::Failed(err) = &kind {
            let message = err.to_string();
            log_event!(log, ERROR, event_names::WORKER_FAILED, Stage::Sample, "worker failed",
                error = message.as_str());
        }
        // The master may already be gone after an abort.
        let _ = reports.send(WorkerReport { worker: id, kind });
    }

    fn report(&self, kind: ReportKind) -> Result<()> {
        self.reports
            .send(WorkerReport { worker: self.id, kind })
            .map_err(|_| Error::ChannelClosed(format!("master stopped listening to worker {}", self.id)))
    }

    fn run(mut self) -> Result<ResultData> {
        let mut status = StatusMachine::new(self.id);
        let mut stats = WorkerStats::default();
        self.report(ReportKind::Started)?;
        if self.range.is_empty() {
            self.report(ReportKind::Misc("empty shard".to_string()))?;
            status.advance(WorkerStatus::Misc)?;
        }

        let mut iteration = 0usize;
        loop {
            status.advance(WorkerStatus::Learn)?;
            stats.e_steps_started += 1;
            self.sampler
                .e_step(&self.trace, self.range.clone(), &mut self.topics)?;
            self.sampler.counts.check_marginals()?;
            if self.hyper.refits_kernel_at(iteration) {
                self.sampler.m_step();
                stats.m_steps += 1;
            }

            status.advance(WorkerStatus::PairMe)?;
            let topics = (self.hyper.average_posteriors && self.hyper.is_post_burn_in(iteration))
                .then(|| self.topics.clone());
            self.report(ReportKind::IterationDone { iteration, topics })?;

            let command = self
                .commands
                .recv()
                .map_err(|_| Error::ChannelClosed(format!("master hung up on worker {}", self.id)))?;
            match command {
                Command::Pair { partner, link } => {
                    status.advance(WorkerStatus::Paired { partner })?;
                    self.merge_with(partner, link)?;
                    stats.merges += 1;
                }
                Command::Learn => {}
                Command::Stop => {
                    status.advance(WorkerStatus::Stop)?;
                    break;
                }
            }
            iteration += 1;
        }

        status.advance(WorkerStatus::Finished)?;
        tracing::debug!(worker = %self.id, iterations = iteration + 1, merges = stats.merges, "worker finished");
        Ok(ResultData {
            worker: self.id,
            range: self.range,
            topics: self.topics,
            kernel_state: self.sampler.kernel.state(),
            counts: self.sampler.counts,
            stats,
        })
    }

    fn merge_with(&mut self, partner: WorkerId, link: PairLink) -> Result<()> {
        let outgoing = InterWorkerData {
            from: self.id,
            count_sz: self.sampler.counts.count_sz.clone(),
            kernel_state: self.sampler.kernel.state(),
        };
        let incoming = link.exchange(outgoing)?;
        if incoming.from != partner {
            return Err(Error::Protocol(format!(
                "worker {} expected a snapshot from {} but got one from {}",
                self.id, partner, incoming.from
            )));
        }
        let added = self.snapshots.merge_into(&mut self.sampler.counts, &incoming)?;
        self.sampler.counts.check_marginals()?;
        self.sampler.kernel.merge(&incoming.kernel_state)?;
        log_event!(self.log, DEBUG, event_names::WORKER_MERGED, Stage::Merge, "merged partner counts",
            partner = partner.0, added = added);
        Ok(())
    }
}

//! Runs a [`SyncPlan`] and assembles the [`SyncReport`]
//!
//! Jobs run concurrently up to `max_concurrent_jobs`. Inside a job, writes go
//! through a per-sink semaphore, and writes of the same identifier to the
//! same sink are serialised across jobs. A failing job never stops the
//! others; its error ends up in its own report entry.

use crate::config::Settings;
use crate::core::data::{PromptRecord, resolve_latest};
use crate::core::plan::{PlannedJob, SyncJob, SyncPlan};
use crate::core::report::{JobReport, JobState, RecordOutcome, RecordStatus, SyncReport};
use crate::core::scope::ScopeRoot;
use crate::core::traits::{FetchedBatch, PromptSink, WriteOutcome, WriteStatus};
use crate::utils::error::{ErrorKind, SyncError};
use chrono::Utc;
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

const CANCELLED: &str = "cancelled";
const DRY_RUN: &str = "dry run";

pub struct SyncOrchestrator {
    max_concurrent_jobs: usize,
    timeout: Duration,
    cancel: CancellationToken,
}

impl SyncOrchestrator {
    pub fn new(max_concurrent_jobs: usize, timeout: Duration) -> Self {
        Self {
            max_concurrent_jobs: max_concurrent_jobs.max(1),
            timeout,
            cancel: CancellationToken::new(),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            settings.max_concurrent_jobs,
            Duration::from_secs(settings.timeout_seconds),
        )
    }

    /// Token that cancels the pass when triggered. Jobs and writes that have
    /// not started are reported as skipped; in-flight writes complete.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub async fn run(&self, plan: SyncPlan) -> SyncReport {
        let started_at = Utc::now();
        let state = Arc::new(PassState::new(self.timeout, self.cancel.clone()));
        let permits = Arc::new(Semaphore::new(self.max_concurrent_jobs));

        let mut slots: Vec<Option<JobReport>> = Vec::with_capacity(plan.jobs.len());
        let mut placeholders = Vec::with_capacity(plan.jobs.len());
        let mut tasks = JoinSet::new();

        for (index, planned) in plan.jobs.into_iter().enumerate() {
            match planned {
                PlannedJob::Rejected(job) => {
                    error!(job = %job.name, source = %job.source, sink = %job.sink, error = %job.error, "job rejected");
                    slots.push(Some(JobReport::new(&job.name, &job.source, &job.sink).errored(&job.error)));
                    placeholders.push(None);
                }
                PlannedJob::Ready(job) => {
                    slots.push(None);
                    placeholders.push(Some(JobReport::new(&job.name, job.source.name(), job.sink.name())));
                    let permits = permits.clone();
                    let state = state.clone();
                    tasks.spawn(async move {
                        let _permit = permits.acquire_owned().await.ok();
                        (index, run_job(job, state).await)
                    });
                }
            }
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, report)) => slots[index] = Some(report),
                Err(join_error) => error!(error = %join_error, "job task failed"),
            }
        }

        let jobs = slots
            .into_iter()
            .zip(placeholders)
            .filter_map(|(slot, placeholder)| {
                slot.or_else(|| {
                    placeholder.map(|p| {
                        let err = SyncError::sink_unavailable(p.sink.clone(), "job task failed");
                        p.errored(&err)
                    })
                })
            })
            .collect();

        let report = SyncReport::assemble(jobs, started_at);
        info!(
            status = ?report.status,
            written = report.totals.written,
            skipped = report.totals.skipped,
            failed = report.totals.failed,
            "sync pass finished"
        );
        report
    }
}

/// State shared by all jobs of one pass.
struct PassState {
    timeout: Duration,
    cancel: CancellationToken,
    unavailable_sources: Mutex<HashMap<String, SyncError>>,
    unavailable_sinks: Mutex<HashMap<String, SyncError>>,
    sink_permits: Mutex<HashMap<String, Arc<Semaphore>>>,
    write_locks: Mutex<HashMap<(String, String), Arc<tokio::sync::Mutex<()>>>>,
}

impl PassState {
    fn new(timeout: Duration, cancel: CancellationToken) -> Self {
        Self {
            timeout,
            cancel,
            unavailable_sources: Mutex::new(HashMap::new()),
            unavailable_sinks: Mutex::new(HashMap::new()),
            sink_permits: Mutex::new(HashMap::new()),
            write_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Fetch through the job's source, unless that source already failed in
    /// this pass.
    async fn fetch(&self, job: &SyncJob) -> Result<FetchedBatch, SyncError> {
        let source = job.source.name();
        let known_failure = self
            .unavailable_sources
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(source)
            .cloned();
        if let Some(err) = known_failure {
            return Err(err);
        }

        let result = match tokio::time::timeout(self.timeout, job.source.fetch(&job.filter)).await {
            Ok(result) => result,
            Err(_) => Err(SyncError::source_unavailable(
                source,
                format!("fetch timed out after {}s", self.timeout.as_secs()),
            )),
        };

        if let Err(err) = &result
            && err.kind() == ErrorKind::SourceUnavailable
        {
            self.unavailable_sources
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(source.to_string(), err.clone());
        }
        result
    }

    /// Write one record, unless the sink already went down in this pass.
    async fn write(&self, sink: &dyn PromptSink, record: &PromptRecord, scope: &ScopeRoot) -> Result<WriteOutcome, SyncError> {
        let known_failure = self
            .unavailable_sinks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(sink.name())
            .cloned();
        if let Some(err) = known_failure {
            return Err(err);
        }

        let result = match tokio::time::timeout(self.timeout, sink.write(record, scope)).await {
            Ok(result) => result,
            Err(_) => Err(SyncError::sink_unavailable(
                sink.name(),
                format!("write timed out after {}s", self.timeout.as_secs()),
            )),
        };

        if let Err(err) = &result
            && err.kind() == ErrorKind::SinkUnavailable
        {
            self.unavailable_sinks
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .entry(sink.name().to_string())
                .or_insert_with(|| err.clone());
        }
        result
    }

    fn sink_permits(&self, sink: &dyn PromptSink) -> Arc<Semaphore> {
        self.sink_permits
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(sink.name().to_string())
            .or_insert_with(|| Arc::new(Semaphore::new(sink.max_concurrent_writes().max(1))))
            .clone()
    }

    fn write_lock(&self, sink: &str, identifier: &str) -> Arc<tokio::sync::Mutex<()>> {
        self.write_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry((sink.to_string(), identifier.to_string()))
            .or_default()
            .clone()
    }
}

async fn run_job(job: SyncJob, state: Arc<PassState>) -> JobReport {
    let mut report = JobReport::new(&job.name, job.source.name(), job.sink.name());

    if state.cancel.is_cancelled() {
        info!(job = %job.name, "job not started, pass cancelled");
        report.cancelled = true;
        report.state = JobState::Done;
        return report;
    }

    report.state = JobState::Fetching;
    info!(job = %job.name, source = %report.source, "fetching");
    let batch = match state.fetch(&job).await {
        Ok(batch) => batch,
        Err(err) => {
            error!(job = %job.name, source = %report.source, error = %err, "fetch failed");
            return report.errored(&err);
        }
    };

    report.state = JobState::Filtering;
    report.fetched = batch.fetched();
    let (latest, tied) = resolve_latest(batch.records, job.source.name());
    let selected = job.filter.apply(latest);
    report.filtered_in = selected.len();
    info!(job = %job.name, fetched = report.fetched, filtered_in = report.filtered_in, "filtered");

    let mut outcomes: Vec<RecordOutcome> = batch
        .rejected
        .iter()
        .chain(tied.iter())
        .map(|rejected| {
            warn!(job = %job.name, record = %rejected.identifier, error = %rejected.error, "record rejected");
            RecordOutcome::failed(&rejected.identifier, job.sink.name(), &rejected.error)
        })
        .collect();

    report.state = JobState::Writing;
    if !job.dry_run && !selected.is_empty() {
        job.sink.prepare(&selected, &job.scope).await;
    }
    let permits = state.sink_permits(job.sink.as_ref());
    let mut writes = JoinSet::new();
    let mut pending = BTreeSet::new();

    for record in selected {
        if job.dry_run {
            debug!(job = %job.name, record = record.identifier(), "dry run, not writing");
            outcomes.push(RecordOutcome::skipped(record.identifier(), job.sink.name(), DRY_RUN));
            continue;
        }

        pending.insert(record.identifier().to_string());
        let sink = job.sink.clone();
        let scope = job.scope.clone();
        let permits = permits.clone();
        let state = state.clone();
        writes.spawn(async move {
            let _permit = permits.acquire_owned().await.ok();
            if state.cancel.is_cancelled() {
                return RecordOutcome::skipped(record.identifier(), sink.name(), CANCELLED);
            }

            let lock = state.write_lock(sink.name(), record.identifier());
            let _guard = lock.lock().await;
            let result = state.write(sink.as_ref(), &record, &scope).await;
            record_outcome(record.identifier(), sink.name(), result)
        });
    }

    while let Some(joined) = writes.join_next().await {
        let outcome = match joined {
            Ok(outcome) => outcome,
            Err(join_error) => {
                error!(job = %job.name, error = %join_error, "write task failed");
                continue;
            }
        };
        pending.remove(&outcome.identifier);
        match outcome.status {
            RecordStatus::Failed => {
                warn!(job = %job.name, record = %outcome.identifier, error = ?outcome.error, "write failed");
            }
            _ => debug!(job = %job.name, record = %outcome.identifier, status = ?outcome.status, "record done"),
        }
        outcomes.push(outcome);
    }

    // Writes whose task died without reporting back.
    for identifier in pending {
        let err = SyncError::sink_unavailable(job.sink.name(), "write task failed");
        outcomes.push(RecordOutcome::failed(identifier, job.sink.name(), &err));
    }

    outcomes.sort_by(|a, b| a.identifier.cmp(&b.identifier));
    report.cancelled = outcomes.iter().any(|o| o.reason.as_deref() == Some(CANCELLED));
    report.outcomes = outcomes;
    report.state = JobState::Done;

    let tally = report.tally();
    info!(
        job = %job.name,
        written = tally.written,
        skipped = tally.skipped,
        failed = tally.failed,
        "job done"
    );
    report
}

fn record_outcome(identifier: &str, sink: &str, result: Result<WriteOutcome, SyncError>) -> RecordOutcome {
    match result {
        Ok(outcome) => RecordOutcome {
            identifier: identifier.to_string(),
            sink: sink.to_string(),
            status: match outcome.status {
                WriteStatus::Written => RecordStatus::Written,
                WriteStatus::Skipped => RecordStatus::Skipped,
            },
            target: outcome.target,
            reason: outcome.reason,
            error: None,
        },
        Err(err) => RecordOutcome::failed(identifier, sink, &err),
    }
}

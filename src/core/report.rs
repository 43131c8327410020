//! Structured result of a sync pass

use crate::utils::error::{ErrorKind, SyncError};
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    Written,
    Skipped,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutcomeError {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&SyncError> for OutcomeError {
    fn from(err: &SyncError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// What happened to one record in one sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordOutcome {
    pub identifier: String,
    pub sink: String,
    pub status: RecordStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<OutcomeError>,
}

impl RecordOutcome {
    pub fn failed(identifier: impl Into<String>, sink: impl Into<String>, err: &SyncError) -> Self {
        Self {
            identifier: identifier.into(),
            sink: sink.into(),
            status: RecordStatus::Failed,
            target: None,
            reason: None,
            error: Some(err.into()),
        }
    }

    pub fn skipped(identifier: impl Into<String>, sink: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            sink: sink.into(),
            status: RecordStatus::Skipped,
            target: None,
            reason: Some(reason.into()),
            error: None,
        }
    }
}

/// Job lifecycle. `Done` and `Errored` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Pending,
    Fetching,
    Filtering,
    Writing,
    Done,
    Errored,
}

/// Why a job ended in [`JobState::Errored`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobError {
    pub kind: ErrorKind,
    pub source: String,
    pub sink: String,
    pub message: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Tally {
    pub written: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl Tally {
    fn add(&mut self, status: RecordStatus) {
        match status {
            RecordStatus::Written => self.written += 1,
            RecordStatus::Skipped => self.skipped += 1,
            RecordStatus::Failed => self.failed += 1,
        }
    }

    fn merge(&mut self, other: Tally) {
        self.written += other.written;
        self.skipped += other.skipped;
        self.failed += other.failed;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobReport {
    pub name: String,
    pub source: String,
    pub sink: String,
    pub state: JobState,
    pub fetched: usize,
    pub filtered_in: usize,
    pub outcomes: Vec<RecordOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JobError>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub cancelled: bool,
}

impl JobReport {
    pub fn new(name: impl Into<String>, source: impl Into<String>, sink: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
            sink: sink.into(),
            state: JobState::Pending,
            fetched: 0,
            filtered_in: 0,
            outcomes: Vec::new(),
            error: None,
            cancelled: false,
        }
    }

    /// Move the job into [`JobState::Errored`], discarding any outcomes.
    pub fn errored(mut self, err: &SyncError) -> Self {
        self.error = Some(JobError {
            kind: err.kind(),
            source: self.source.clone(),
            sink: self.sink.clone(),
            message: err.to_string(),
        });
        self.outcomes.clear();
        self.state = JobState::Errored;
        self
    }

    pub fn tally(&self) -> Tally {
        let mut tally = Tally::default();
        for outcome in &self.outcomes {
            tally.add(outcome.status);
        }
        tally
    }
}

/// Overall status of a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PassStatus {
    Success,
    Partial,
    Failure,
}

impl PassStatus {
    pub fn exit_code(self) -> u8 {
        match self {
            PassStatus::Success => 0,
            PassStatus::Partial => 1,
            PassStatus::Failure => 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub status: PassStatus,
    pub totals: Tally,
    pub jobs: Vec<JobReport>,
}

impl SyncReport {
    /// Aggregate finished job reports.
    ///
    /// A configuration error on any job makes the pass a `failure`. Record
    /// failures, runtime job errors (an unavailable source) and cancellation
    /// make it `partial`.
    pub fn assemble(jobs: Vec<JobReport>, started_at: DateTime<Utc>) -> Self {
        let mut totals = Tally::default();
        for job in &jobs {
            totals.merge(job.tally());
        }

        let config_error = jobs
            .iter()
            .filter_map(|j| j.error.as_ref())
            .any(|e| e.kind.is_configuration());
        let runtime_error = jobs.iter().any(|j| j.error.is_some() || j.cancelled);

        let status = if config_error {
            PassStatus::Failure
        } else if runtime_error || totals.failed > 0 {
            PassStatus::Partial
        } else {
            PassStatus::Success
        };

        Self {
            started_at,
            finished_at: Utc::now(),
            status,
            totals,
            jobs,
        }
    }

    pub fn job(&self, name: &str) -> Option<&JobReport> {
        self.jobs.iter().find(|j| j.name == name)
    }
}

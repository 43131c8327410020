//! Capability traits for the two ends of a sync job
//!
//! Every source and sink type implements one of these traits; the orchestrator
//! only ever talks to `dyn PromptSource` / `dyn PromptSink`.

use crate::core::data::{PromptRecord, RejectedRecord};
use crate::core::filter::TagFilter;
use crate::core::scope::{ScopeModel, ScopeRoot};
use crate::utils::error::SyncError;
use async_trait::async_trait;

/// What a source returned for one fetch.
#[derive(Debug, Clone, Default)]
pub struct FetchedBatch {
    pub records: Vec<PromptRecord>,
    /// Records dropped by validation; reported as failed outcomes.
    pub rejected: Vec<RejectedRecord>,
}

impl FetchedBatch {
    pub fn fetched(&self) -> usize {
        self.records.len() + self.rejected.len()
    }
}

/// Retrieves the current prompt set from an upstream system.
#[async_trait]
pub trait PromptSource: Send + Sync {
    fn name(&self) -> &str;

    /// Fetch records, optionally narrowed by `filter`.
    ///
    /// Implementations may push the filter down partially; the caller always
    /// applies it in full afterwards. Network and auth failures surface as
    /// [`SyncError::SourceUnavailable`].
    async fn fetch(&self, filter: &TagFilter) -> Result<FetchedBatch, SyncError>;
}

/// Static properties of a sink type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    /// Whether metadata and tags are written alongside the body.
    pub supports_metadata: bool,
    pub scope_model: ScopeModel,
    /// Directory appended to the home or project root for scoped sinks.
    pub scope_dir: Option<&'static str>,
}

impl Capabilities {
    pub const fn unscoped(supports_metadata: bool) -> Self {
        Self {
            supports_metadata,
            scope_model: ScopeModel::None,
            scope_dir: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteStatus {
    Written,
    Skipped,
}

/// Successful result of a single write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteOutcome {
    pub status: WriteStatus,
    /// File path or remote resource the record landed in.
    pub target: Option<String>,
    pub reason: Option<String>,
}

impl WriteOutcome {
    pub fn written(target: impl Into<String>) -> Self {
        Self {
            status: WriteStatus::Written,
            target: Some(target.into()),
            reason: None,
        }
    }

    pub fn skipped(reason: impl Into<String>) -> Self {
        Self {
            status: WriteStatus::Skipped,
            target: None,
            reason: Some(reason.into()),
        }
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }
}

/// Persists records into a downstream system in its native format.
#[async_trait]
pub trait PromptSink: Send + Sync {
    fn name(&self) -> &str;

    fn capabilities(&self) -> Capabilities;

    /// Configuration-time check run before any fetch.
    fn check(&self) -> Result<(), SyncError> {
        Ok(())
    }

    /// Upper bound on concurrent writes through this sink.
    fn max_concurrent_writes(&self) -> usize {
        1
    }

    /// Called once per job with every record about to be written, before the
    /// first write. Sinks that derive file names from records reserve them
    /// here in identifier order, so the mapping does not depend on which
    /// write finishes first.
    async fn prepare(&self, _records: &[PromptRecord], _scope: &ScopeRoot) {}

    /// Write one record. Writing the same identifier and version twice yields
    /// the same destination artifact.
    async fn write(&self, record: &PromptRecord, scope: &ScopeRoot) -> Result<WriteOutcome, SyncError>;
}

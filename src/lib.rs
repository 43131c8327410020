//! prompt-pidgeon: one prompt library, many consumers
//!
//! Fetches prompts from a prompt-management platform, selects them by tag and
//! writes each one into downstream tools in their native format. A pass is
//! driven by a declarative configuration of sources, sinks and sync jobs.

pub mod cli;
pub mod commands;
pub mod config;
pub mod core;
pub mod sync;
pub mod utils;

pub use core::{
    data::{Metadata, MetadataValue, PromptRecord, RecordDraft},
    filter::TagFilter,
    orchestrator::SyncOrchestrator,
    plan::{AdapterFactory, PlanOptions, SyncPlan, build_plan},
    report::{JobReport, JobState, PassStatus, RecordStatus, SyncReport},
    scope::{Scope, ScopeContext, ScopeRoot},
    traits::{Capabilities, FetchedBatch, PromptSink, PromptSource, WriteOutcome},
};
pub use utils::error::{AppError, AppResult, ErrorKind, SyncError};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

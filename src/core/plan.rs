//! Turning configuration into a validated set of jobs
//!
//! Every job is checked here, before anything is fetched: references,
//! adapter construction, platform support and scope. A job that fails is kept
//! in the plan as [`PlannedJob::Rejected`] so the report can show it, while
//! the rest of the plan runs normally.

use crate::config::{Config, SinkConfig, SourceConfig, SyncJobConfig};
use crate::core::filter::TagFilter;
use crate::core::scope::{ScopeContext, ScopeRoot, resolve_scope};
use crate::core::traits::{PromptSink, PromptSource};
use crate::utils::error::{AppError, AppResult, SyncError};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Builds adapters for configured sources and sinks.
pub trait AdapterFactory {
    fn source(&self, config: &SourceConfig) -> Result<Arc<dyn PromptSource>, SyncError>;
    fn sink(&self, config: &SinkConfig) -> Result<Arc<dyn PromptSink>, SyncError>;
}

/// A job that passed validation and is ready to run.
#[derive(Clone)]
pub struct SyncJob {
    pub name: String,
    pub source: Arc<dyn PromptSource>,
    pub sink: Arc<dyn PromptSink>,
    pub filter: TagFilter,
    pub scope: ScopeRoot,
    pub dry_run: bool,
}

impl std::fmt::Debug for SyncJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncJob")
            .field("name", &self.name)
            .field("source", &self.source.name())
            .field("sink", &self.sink.name())
            .field("filter", &self.filter)
            .field("scope", &self.scope)
            .field("dry_run", &self.dry_run)
            .finish()
    }
}

/// A job that failed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct RejectedJob {
    pub name: String,
    pub source: String,
    pub sink: String,
    pub error: SyncError,
}

#[derive(Debug, Clone)]
pub enum PlannedJob {
    Ready(SyncJob),
    Rejected(RejectedJob),
}

impl PlannedJob {
    pub fn name(&self) -> &str {
        match self {
            PlannedJob::Ready(job) => &job.name,
            PlannedJob::Rejected(job) => &job.name,
        }
    }
}

/// Jobs in configuration order.
#[derive(Debug, Clone, Default)]
pub struct SyncPlan {
    pub jobs: Vec<PlannedJob>,
}

impl SyncPlan {
    pub fn ready(&self) -> impl Iterator<Item = &SyncJob> {
        self.jobs.iter().filter_map(|j| match j {
            PlannedJob::Ready(job) => Some(job),
            PlannedJob::Rejected(_) => None,
        })
    }

    pub fn rejected(&self) -> impl Iterator<Item = &RejectedJob> {
        self.jobs.iter().filter_map(|j| match j {
            PlannedJob::Rejected(job) => Some(job),
            PlannedJob::Ready(_) => None,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct PlanOptions {
    /// Force dry run for every job.
    pub dry_run: bool,
    /// Run only these jobs. Empty means all enabled jobs.
    pub only_jobs: Vec<String>,
}

/// Adapters built so far, so jobs sharing a source or sink share one instance.
#[derive(Default)]
struct AdapterCache {
    sources: HashMap<String, Result<Arc<dyn PromptSource>, SyncError>>,
    sinks: HashMap<String, Result<Arc<dyn PromptSink>, SyncError>>,
}

impl AdapterCache {
    fn source(&mut self, factory: &dyn AdapterFactory, config: &SourceConfig) -> Result<Arc<dyn PromptSource>, SyncError> {
        self.sources
            .entry(config.name.clone())
            .or_insert_with(|| factory.source(config))
            .clone()
    }

    fn sink(&mut self, factory: &dyn AdapterFactory, config: &SinkConfig) -> Result<Arc<dyn PromptSink>, SyncError> {
        self.sinks
            .entry(config.name.clone())
            .or_insert_with(|| factory.sink(config).and_then(|sink| sink.check().map(|_| sink)))
            .clone()
    }
}

/// Validate `config` and build the jobs of one pass.
///
/// Structural problems with the file as a whole are returned as an error;
/// problems with a single job only reject that job.
pub fn build_plan(
    config: &Config,
    factory: &dyn AdapterFactory,
    ctx: &ScopeContext,
    options: &PlanOptions,
) -> AppResult<SyncPlan> {
    config.validate()?;

    for name in &options.only_jobs {
        match config.sync.iter().find(|j| &j.name == name) {
            None => return Err(AppError::Config(format!("no sync job named '{}'", name))),
            Some(job) if !job.enabled => {
                return Err(AppError::Config(format!("sync job '{}' is disabled", name)));
            }
            Some(_) => {}
        }
    }

    let mut cache = AdapterCache::default();
    let jobs = config
        .enabled_jobs()
        .filter(|j| options.only_jobs.is_empty() || options.only_jobs.contains(&j.name))
        .map(|job| match plan_job(config, job, factory, &mut cache, ctx, options) {
            Ok(ready) => {
                debug!(job = %job.name, scope = ?ready.scope, "job ready");
                PlannedJob::Ready(ready)
            }
            Err(error) => {
                debug!(job = %job.name, %error, "job rejected");
                PlannedJob::Rejected(RejectedJob {
                    name: job.name.clone(),
                    source: job.source.clone(),
                    sink: job.sink.clone(),
                    error,
                })
            }
        })
        .collect();

    Ok(SyncPlan { jobs })
}

fn plan_job(
    config: &Config,
    job: &SyncJobConfig,
    factory: &dyn AdapterFactory,
    cache: &mut AdapterCache,
    ctx: &ScopeContext,
    options: &PlanOptions,
) -> Result<SyncJob, SyncError> {
    let subject = || format!("sync job '{}'", job.name);

    let source_config = config
        .source(&job.source)
        .ok_or_else(|| SyncError::validation(subject(), format!("unknown source '{}'", job.source)))?;
    let sink_config = config
        .sink(&job.sink)
        .ok_or_else(|| SyncError::validation(subject(), format!("unknown sink '{}'", job.sink)))?;

    if !source_config.enabled {
        return Err(SyncError::validation(subject(), format!("source '{}' is disabled", job.source)));
    }
    if !sink_config.enabled {
        return Err(SyncError::validation(subject(), format!("sink '{}' is disabled", job.sink)));
    }

    let sink = cache.sink(factory, sink_config)?;

    let ctx = match &sink_config.project_path {
        Some(dir) => ctx.with_project_dir(dir),
        None => ctx.clone(),
    };
    let scope = resolve_scope(
        &sink_config.name,
        &sink.capabilities(),
        job.scope.or(sink_config.scope),
        &ctx,
    )?;

    let source = cache.source(factory, source_config)?;

    Ok(SyncJob {
        name: job.name.clone(),
        source,
        sink,
        filter: job.filter.clone().unwrap_or_default(),
        scope,
        dry_run: options.dry_run || job.dry_run,
    })
}

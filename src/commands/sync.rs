use anyhow::{Context, Result};
use crate::cli::{ReportFormat, SyncArgs};
use crate::config::Config;
use crate::core::orchestrator::SyncOrchestrator;
use crate::core::plan::{PlanOptions, build_plan};
use crate::core::scope::ScopeContext;
use crate::sync::Registry;
use crate::utils::output::render_report;
use crate::utils::print_warning;
use std::time::Duration;
use tracing::warn;

pub async fn handle_sync_command(config: Config, args: &SyncArgs) -> Result<u8> {
    let ctx = ScopeContext::from_environment()?;
    let registry = Registry::from_process_env(Duration::from_secs(config.settings.timeout_seconds));
    let options = PlanOptions {
        dry_run: args.dry_run,
        only_jobs: args.jobs.clone(),
    };

    let plan = build_plan(&config, &registry, &ctx, &options)?;
    if plan.is_empty() {
        print_warning("No enabled sync jobs. Nothing to do.");
        return Ok(0);
    }

    let orchestrator = SyncOrchestrator::from_settings(&config.settings);
    let cancel = orchestrator.cancellation_token();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, finishing in-flight writes");
            cancel.cancel();
        }
    });

    let report = orchestrator.run(plan).await;
    interrupt.abort();

    match args.format {
        ReportFormat::Text => print!("{}", render_report(&report, args.verbose)),
        ReportFormat::Json => {
            let json = serde_json::to_string_pretty(&report).context("Failed to serialize sync report")?;
            println!("{}", json);
        }
    }

    Ok(report.status.exit_code())
}

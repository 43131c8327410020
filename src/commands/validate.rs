use anyhow::Result;
use crate::config::Config;
use crate::core::plan::{PlanOptions, build_plan};
use crate::core::scope::ScopeContext;
use crate::sync::Registry;
use crate::utils::{OutputStyle, print_error, print_success};
use std::time::Duration;

/// Build the sync plan without running it and report every rejected job.
pub fn handle_validate_command(config: &Config) -> Result<u8> {
    let ctx = ScopeContext::from_environment()?;
    let registry = Registry::from_process_env(Duration::from_secs(config.settings.timeout_seconds));

    let plan = match build_plan(config, &registry, &ctx, &PlanOptions::default()) {
        Ok(plan) => plan,
        Err(err) => {
            print_error(&err.to_string());
            return Ok(2);
        }
    };

    let ready = plan.ready().count();
    let rejected: Vec<_> = plan.rejected().collect();

    for job in plan.ready() {
        println!("  {} {} ({} → {})", OutputStyle::success("ok"), job.name, job.source.name(), job.sink.name());
    }
    for job in &rejected {
        println!(
            "  {} {} ({} → {}): {} {}",
            OutputStyle::error("error"),
            job.name,
            job.source,
            job.sink,
            job.error.kind(),
            job.error
        );
    }

    if rejected.is_empty() {
        print_success(&format!("Configuration is valid ({} job(s) ready)", ready));
        Ok(0)
    } else {
        print_error(&format!("{} of {} job(s) are invalid", rejected.len(), ready + rejected.len()));
        Ok(2)
    }
}

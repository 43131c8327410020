use anyhow::Result;
use crate::config::Config;
use crate::utils::OutputStyle;

/// Print the resolved configuration. Credentials live in the environment
/// and only the variable names are shown.
pub fn handle_config_command(config: &Config) -> Result<u8> {
    OutputStyle::print_header("⚙️  prompt-pidgeon configuration");

    println!("{}", OutputStyle::header("Settings"));
    OutputStyle::print_field("Version", &config.version);
    OutputStyle::print_field("Log level", &config.settings.log_level);
    OutputStyle::print_field("Max jobs", &config.settings.max_concurrent_jobs.to_string());
    OutputStyle::print_field("Timeout", &format!("{}s", config.settings.timeout_seconds));

    println!();
    println!("{}", OutputStyle::header("Sources"));
    for source in &config.sources {
        println!("  {} [{}]{}", source.name, source.kind, disabled_marker(source.enabled));
        if let Some(host) = &source.host {
            OutputStyle::print_field("Host", host);
        }
        if let Some(label) = &source.label {
            OutputStyle::print_field("Label", label);
        }
        if let Some(var) = &source.public_key_env {
            OutputStyle::print_field("Public key env", var);
        }
        if let Some(var) = &source.secret_key_env {
            OutputStyle::print_field("Secret key env", var);
        }
    }

    println!();
    println!("{}", OutputStyle::header("Sinks"));
    for sink in &config.sinks {
        println!("  {} [{}]{}", sink.name, sink.kind, disabled_marker(sink.enabled));
        if let Some(path) = &sink.path {
            OutputStyle::print_field("Path", &path.display().to_string());
        }
        if let Some(url) = &sink.url {
            OutputStyle::print_field("URL", url);
        }
        if let Some(scope) = sink.scope {
            OutputStyle::print_field("Scope", &scope.to_string());
        }
        if let Some(var) = &sink.api_key_env {
            OutputStyle::print_field("API key env", var);
        }
        if !sink.base_models.is_empty() {
            let models: Vec<_> = sink.base_models.iter().map(|m| m.id.as_str()).collect();
            OutputStyle::print_field("Base models", &models.join(", "));
        }
    }

    println!();
    println!("{}", OutputStyle::header("Sync jobs"));
    for job in &config.sync {
        println!("  {}: {} → {}{}", job.name, job.source, job.sink, disabled_marker(job.enabled));
        if let Some(filter) = &job.filter {
            if !filter.tags.is_empty() {
                let tags: Vec<_> = filter.tags.iter().map(String::as_str).collect();
                OutputStyle::print_field("Tags", &tags.join(", "));
            }
            if !filter.exclude.is_empty() {
                let tags: Vec<_> = filter.exclude.iter().map(String::as_str).collect();
                OutputStyle::print_field("Exclude", &tags.join(", "));
            }
        }
        if let Some(scope) = job.scope {
            OutputStyle::print_field("Scope", &scope.to_string());
        }
        if job.dry_run {
            OutputStyle::print_field("Dry run", "yes");
        }
    }

    Ok(0)
}

fn disabled_marker(enabled: bool) -> String {
    if enabled {
        String::new()
    } else {
        format!(" {}", OutputStyle::muted("(disabled)"))
    }
}

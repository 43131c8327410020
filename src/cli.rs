use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use anyhow::Result;
use crate::config::Config;
use crate::commands::{configure, sync, validate};

#[derive(Parser)]
#[command(name = "prompt-pidgeon")]
#[command(about = "Sync prompts from prompt-management platforms into the tools that use them")]
#[command(version)]
pub struct Cli {
    #[arg(short, long, value_name = "FILE", env = "PROMPT_PIDGEON_CONFIG_FILE")]
    pub config: Option<PathBuf>,

    #[arg(short, long, help = "Shorthand for --log-level debug")]
    pub debug: bool,

    #[arg(long, value_name = "LEVEL", env = "PROMPT_PIDGEON_LOG_LEVEL", help = "Log level (overrides settings.log_level)")]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Level handed to the logger: `--debug`, then `--log-level`, then the
    /// configured default.
    pub fn effective_log_level<'a>(&'a self, config: Option<&'a Config>) -> &'a str {
        if self.debug {
            return "debug";
        }
        self.log_level
            .as_deref()
            .or_else(|| config.map(|c| c.settings.log_level.as_str()))
            .unwrap_or("info")
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the configured sync jobs
    Sync(SyncArgs),

    /// Check the configuration without fetching or writing anything
    Validate,

    /// Show the resolved configuration
    Config,
}

impl Commands {
    /// Execute the command and return the process exit code.
    pub async fn execute(self, config: Config) -> Result<u8> {
        match self {
            Commands::Sync(args) => sync::handle_sync_command(config, &args).await,
            Commands::Validate => validate::handle_validate_command(&config),
            Commands::Config => configure::handle_config_command(&config),
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct SyncArgs {
    #[arg(long, env = "PROMPT_PIDGEON_DRY_RUN", help = "Filter and report without writing")]
    pub dry_run: bool,

    #[arg(short, long = "job", value_name = "NAME", help = "Run only this job (repeatable)")]
    pub jobs: Vec<String>,

    #[arg(short, long, value_enum, default_value_t = ReportFormat::Text)]
    pub format: ReportFormat,

    #[arg(short, long, help = "List every record outcome, not only failures")]
    pub verbose: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReportFormat {
    Text,
    Json,
}

use clap::Parser;
use std::process::ExitCode;

use prompt_pidgeon::cli::Cli;
use prompt_pidgeon::config::Config;
use prompt_pidgeon::utils::{logging, print_error, report_error};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(config_path) => Config::load_custom(config_path),
        None => Config::load(),
    };

    let config = match loaded {
        Ok(config) => config,
        Err(err) => {
            let _ = logging::init(cli.effective_log_level(None));
            report_error(&err);
            return ExitCode::from(2);
        }
    };

    if let Err(err) = logging::init(cli.effective_log_level(Some(&config))) {
        print_error(&format!("Failed to initialize logging: {}", err));
    }

    match cli.command.execute(config).await {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            print_error(&format!("{:#}", err));
            ExitCode::from(2)
        }
    }
}

//! Mirror CLI Binary
//!
//! Process entry point and the only place a run error becomes an exit
//! status.

use clap::error::ErrorKind;
use clap::Parser;
use mirror::cli::{map_error, version_text, Cli, Invocation, RunContext, RunOutcome};
use mirror::config::ConfigLoader;
use mirror::logging::{init_logging, LoggingConfig};
use std::process;
use tracing::{error, info};

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let code = match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
                _ => 1,
            };
            let _ = e.print();
            process::exit(code);
        }
    };

    if cli.version {
        println!("{}", version_text());
        return;
    }

    let invocation = match Invocation::from_cli(&cli) {
        Ok(invocation) => invocation,
        Err(e) => {
            eprintln!("{}", map_error(&e));
            process::exit(1);
        }
    };

    // Build logging config from CLI args, env vars, and config file
    let logging_config = build_logging_config(&cli);
    if let Err(e) = init_logging(Some(&logging_config)) {
        eprintln!("Failed to initialize logging: {}", e);
        process::exit(1);
    }

    info!("Mirror CLI starting");

    let context = match RunContext::new(cli.config.as_deref()) {
        Ok(ctx) => ctx,
        Err(e) => {
            error!("Error loading configuration: {}", e);
            eprintln!("{}", map_error(&e));
            process::exit(1);
        }
    };

    let stdout = std::io::stdout();
    match context.execute(&invocation, stdout.lock()) {
        Ok(RunOutcome::Created(summary)) => {
            info!(files = summary.files, "Command completed successfully");
        }
        Ok(RunOutcome::Verified(summary)) => {
            info!(findings = summary.findings, "Command completed successfully");
        }
        Err(e) => {
            error!("Command failed: {}", e);
            eprintln!("{}", map_error(&e));
            process::exit(1);
        }
    }
}

/// Build logging configuration from CLI args and config file
fn build_logging_config(cli: &Cli) -> LoggingConfig {
    let mut config = match cli.config {
        Some(ref config_path) => ConfigLoader::load_from_file(config_path)
            .ok()
            .map(|c| c.logging)
            .unwrap_or_default(),
        None => ConfigLoader::load()
            .ok()
            .map(|c| c.logging)
            .unwrap_or_default(),
    };

    // Override with CLI arguments (highest priority)
    if cli.verbose {
        config.level = "debug".to_string();
    }
    if let Some(ref level) = cli.log_level {
        config.level = level.clone();
    }
    if let Some(ref format) = cli.log_format {
        config.format = format.clone();
    }
    if let Some(ref output) = cli.log_output {
        config.output = output.clone();
    }
    if let Some(ref file) = cli.log_file {
        config.file = Some(file.clone());
    }

    config
}

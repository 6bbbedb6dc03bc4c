use clap::Parser;
use eyre::{Context, Result};
use log::info;
use std::fs;

mod cli;
mod commands;
mod config;

use cli::{Cli, Commands};
use config::{Config, LogLevel};
use commands::run::RunOptions;

fn setup_logging(log_level: &LogLevel) -> Result<()> {
    // Create log directory
    let log_dir = Config::log_dir();

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    let log_file = log_dir.join("buildlog.log");

    // Diagnostics never share a stream with the build log
    let target = Box::new(
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .context("Failed to open log file")?,
    );

    // RUST_LOG env var takes precedence, otherwise use config log_level
    let mut builder = env_logger::Builder::new();

    if std::env::var("RUST_LOG").is_ok() {
        builder.parse_default_env();
    } else {
        builder.filter_level(log_level.as_filter());
    }

    builder.target(env_logger::Target::Pipe(target)).init();

    info!("Logging initialized, writing to: {}", log_file.display());
    info!(
        "Log level: {} (from {})",
        log_level.as_filter(),
        if std::env::var("RUST_LOG").is_ok() { "RUST_LOG env" } else { "config" }
    );
    Ok(())
}

/// Dispatch a command; the returned code becomes the process exit code
fn run(cli: Cli, config: Config) -> Result<i32> {
    match cli.command {
        Commands::Run {
            output,
            append,
            charset,
            remote,
            command,
        } => commands::run::run(
            RunOptions {
                output,
                append,
                charset,
                remote,
            },
            &command,
            &config,
        ),
        Commands::Agent { listener, command } => commands::agent::run(&listener, &command),
        Commands::Config { action } => commands::config::run(action, &config).map(|_| 0),
        Commands::Completions { shell } => commands::completions::run(shell).map(|_| 0),
    }
}

fn main() -> Result<()> {
    // Parse CLI arguments first
    let cli = Cli::parse();

    // Load configuration (before logging, so log messages in Config::load are silent)
    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    // Setup logging with log level from config (or RUST_LOG env var)
    setup_logging(&config.log_level).context("Failed to setup logging")?;

    info!("Starting buildlog with config from: {:?}", cli.config);

    let code = run(cli, config).context("Command failed")?;
    if code != 0 {
        std::process::exit(code);
    }

    Ok(())
}

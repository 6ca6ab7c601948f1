//! swgate - offline cache lifecycle and update handshake
//!
//! CLI entry point that dispatches to subcommands.

use clap::Parser;
use console::style;
use std::process::ExitCode;
use swgate::cli::args::ConfigAction;
use swgate::cli::{Cli, Commands};
use swgate::config::{Config, ConfigManager};
use swgate::error::{SwgateError, SwgateResult};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            if let Some(hint) = e.hint() {
                eprintln!("{} {}", style("Hint:").yellow(), hint);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run() -> SwgateResult<()> {
    let cli = Cli::parse();

    let config_manager = match cli.config {
        Some(ref path) => ConfigManager::with_path(path.clone()),
        None => ConfigManager::new(),
    };

    // An explicit config path must exist, except when creating or locating it
    let initializing = matches!(
        cli.command,
        Commands::Config(swgate::cli::args::ConfigArgs {
            action: Some(ConfigAction::Init { .. } | ConfigAction::Path)
        })
    );
    if cli.config.is_some() && !initializing && !config_manager.path().exists() {
        return Err(SwgateError::ConfigNotFound(
            config_manager.path().to_path_buf(),
        ));
    }

    let config = if initializing {
        Config::default()
    } else {
        config_manager.load().await?
    };

    // 0 = warn, 1 = info, 2+ = debug; RUST_LOG overrides
    let default_filter = match cli.verbose {
        0 => "swgate=warn",
        1 => "swgate=info",
        _ => "swgate=debug",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    if config.general.log_format == "json" {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .without_time()
            .with_writer(std::io::stderr)
            .init();
    }
    debug!("Using config {}", config_manager.path().display());

    match cli.command {
        Commands::Resolve(args) => swgate::cli::commands::resolve(args).await,
        Commands::Routes(args) => swgate::cli::commands::routes(args).await,
        Commands::Simulate(args) => swgate::cli::commands::simulate(args, &config).await,
        Commands::Cache(args) => swgate::cli::commands::cache(args, &config).await,
        Commands::Config(args) => {
            swgate::cli::commands::config(args, &config_manager, &config).await
        }
    }
}

//! Cachet - streaming build cache for CI pipelines
//!
//! CLI entry point that dispatches to subcommands.

use cachet::cli::{Cli, Commands};
use cachet::config::ConfigManager;
use cachet::error::CachetResult;
use clap::Parser;
use console::style;
use std::process::ExitCode;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging: 0 = info, 1 = debug, 2+ = trace
    let filter = match cli.verbose {
        0 => EnvFilter::new("cachet=info"),
        1 => EnvFilter::new("cachet=debug"),
        _ => EnvFilter::new("cachet=trace"),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .init();

    let (result, strict) = run(cli).await;

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            if let Some(hint) = e.hint() {
                eprintln!("{} {}", style("Hint:").yellow(), hint);
            }

            if e.is_recognized() && !strict {
                // an unusable cache must not break the build
                warn!("continuing with a cold cache");
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
    }
}

async fn run(cli: Cli) -> (CachetResult<()>, bool) {
    let config_manager = if let Some(ref path) = cli.config {
        ConfigManager::with_path(path.clone())
    } else {
        ConfigManager::new()
    };

    // Find local config unless --no-local is set
    let local_config_path = if cli.no_local {
        debug!("Local config discovery disabled (--no-local)");
        None
    } else {
        match std::env::current_dir() {
            Ok(cwd) => {
                let found = ConfigManager::find_local_config(&cwd);
                if let Some(ref path) = found {
                    debug!("Found local config: {}", path.display());
                }
                found
            }
            Err(_) => None,
        }
    };

    let config = match config_manager
        .load_merged(local_config_path.as_deref())
        .await
    {
        Ok(config) => config,
        Err(e) => return (Err(e), false),
    };
    debug!(?config, "configuration loaded");

    let strict = cli.fail_on_error() || config.defaults.fail_on_error;

    let result = match cli.command {
        Commands::Rebuild(args) => cachet::cli::commands::rebuild(args, &config).await,
        Commands::Restore(args) => cachet::cli::commands::restore(args, &config).await,
        Commands::Flush(args) => cachet::cli::commands::flush(args, &config).await,
    };

    (result, strict)
}

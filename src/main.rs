//! A2A Gateway - authorize callers, route task-protocol calls to backends

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};

use a2a_gateway::{
    cli::{Cli, Command},
    config::Config,
    gateway::Gateway,
    setup_tracing,
    store::ConfigStore,
};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.command {
        Some(Command::Check { ref file }) => {
            let path = file.clone().unwrap_or_else(|| cli.config.clone());
            run_check(&path, &cli)
        }
        Some(Command::Serve) | None => run_server(cli).await,
    }
}

/// Validate a config file and report what it contains.
fn run_check(path: &Path, cli: &Cli) -> ExitCode {
    if let Err(e) = setup_tracing(cli.log_level.as_deref().unwrap_or("info"), cli.log_format.as_deref()) {
        eprintln!("Failed to setup tracing: {e}");
        return ExitCode::FAILURE;
    }

    match Config::load(path) {
        Ok(config) => {
            println!("{} is valid", path.display());
            println!("  authorization: {}", config.server.authorization.as_str());
            println!("  users:         {}", config.users.len());
            println!("  backends:      {}", config.backends.len());
            for slug in config.backends.keys() {
                println!("    - {slug}");
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{}: {e}", path.display());
            ExitCode::FAILURE
        }
    }
}

/// Run the gateway server.
async fn run_server(cli: Cli) -> ExitCode {
    // Read the config once up front so the file's log level can seed tracing
    // before the store (which logs) is opened.
    let config = match Config::load(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{}: {e}", cli.config.display());
            return ExitCode::FAILURE;
        }
    };

    let level = cli
        .log_level
        .clone()
        .unwrap_or_else(|| config.server.log_level.clone());
    if let Err(e) = setup_tracing(&level, cli.log_format.as_deref()) {
        eprintln!("Failed to setup tracing: {e}");
        return ExitCode::FAILURE;
    }

    let store = match ConfigStore::open(&cli.config) {
        Ok(s) => Arc::new(s),
        Err(e) => {
            error!(error = %e, "Failed to open configuration store");
            return ExitCode::FAILURE;
        }
    };

    info!(config = %cli.config.display(), "Starting gateway");

    match Gateway::new(store).run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Gateway failed");
            ExitCode::FAILURE
        }
    }
}

//! Command-line interface

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// A2A task-protocol gateway - authorize callers, route to agent backends
#[derive(Parser, Debug)]
#[command(name = "a2a-gateway")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file (YAML)
    #[arg(
        short,
        long,
        default_value = "gateway.yaml",
        env = "A2A_GATEWAY_CONFIG",
        global = true
    )]
    pub config: PathBuf,

    /// Log level (trace, debug, info, warn, error); defaults to the
    /// config file's `server.log_level`
    #[arg(long, env = "A2A_GATEWAY_LOG_LEVEL", global = true)]
    pub log_level: Option<String>,

    /// Log format (text, json)
    #[arg(long, env = "A2A_GATEWAY_LOG_FORMAT", global = true)]
    pub log_format: Option<String>,

    /// Subcommand (optional - defaults to server mode)
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the gateway server (default)
    Serve,

    /// Validate a configuration file and exit
    Check {
        /// Path to the file to validate (defaults to --config)
        file: Option<PathBuf>,
    },
}

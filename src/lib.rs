//! A2A Gateway Library
//!
//! A trust-boundary gateway for the A2A (Agent2Agent) task protocol.
//!
//! # Features
//!
//! - **Hot-reloadable authorization**: per-user access keys and backend
//!   subscriptions reloaded from YAML without blocking readers
//! - **Task protocol relay**: `tasks/send`, `tasks/get`, `tasks/cancel`,
//!   `tasks/sendSubscribe` forwarded to named agent backends
//! - **Streaming**: live status/artifact events via SSE, relayed in order
//! - **Graceful shutdown**: file watcher and server join cleanly

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod gateway;
pub mod protocol;
pub mod store;

pub use error::{Error, Result};

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Setup tracing/logging
pub fn setup_tracing(level: &str, format: Option<&str>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::registry().with(filter);

    match format {
        Some("json") => {
            subscriber.with(fmt::layer().json()).init();
        }
        _ => {
            subscriber.with(fmt::layer()).init();
        }
    }

    Ok(())
}

//! Keyrace server binary.
//!
//! Configured through `KEYRACE_*` environment variables (see
//! [`config`]); log verbosity through `RUST_LOG`.

mod config;

use keyrace::prelude::*;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::ServerConfig;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let config = ServerConfig::from_env()?;
    let mut builder = KeyraceServer::builder()
        .bind(&config.bind)
        .room_config(config.room.clone())
        .idle_timeout(config.idle_timeout)
        .keepalive_interval(config.keepalive_interval)
        .handshake_timeout(config.handshake_timeout);
    if let Some(snippets) = config.load_snippets()? {
        tracing::info!(count = snippets.len(), "loaded snippets");
        builder = builder.snippets(snippets);
    }

    let server = builder.build().await?;

    tokio::select! {
        res = server.run() => res?,
        _ = tokio::signal::ctrl_c() => tracing::info!("shutting down"),
    }
    Ok(())
}

fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

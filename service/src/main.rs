//! Reportdesk HTTP server.
//!
//! # Usage
//!
//! ```bash
//! # Start infrastructure
//! docker compose up -d
//!
//! # Run server
//! cargo run --bin reportdesk-server
//! ```

use anyhow::Context;
use reportdesk_service::{Application, Config};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,reportdesk=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Reportdesk server");

    let config = Config::from_env().context("Invalid configuration")?;
    tracing::info!(
        redpanda = %config.redpanda.brokers,
        address = %config.server.address(),
        transitions = ?config.policy.transitions,
        "Configuration loaded"
    );

    let app = Application::build(config).await?;
    app.run().await
}

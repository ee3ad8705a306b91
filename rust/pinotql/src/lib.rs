pub mod assembler;
pub mod codec;
pub mod config;
pub mod error;
pub mod interpolate;
pub mod model;
pub mod params;
pub mod preview;
pub mod resources;
pub mod server;
pub mod state;
pub mod telemetry;
pub mod time;

use crate::{config::AppConfig, server::Server};

/// Bootstraps the editor service using environment configuration.
pub async fn run() -> anyhow::Result<()> {
    let config = AppConfig::from_env()?;
    Server::new(config).run().await
}

//! Storefront - online shop API server

use anyhow::{Context, Result};
use storefront::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let config = Config::from_env().context("loading configuration")?;
    storefront::telemetry::init(config.json_logs);
    storefront::run(config).await.context("running storefront")?;
    Ok(())
}

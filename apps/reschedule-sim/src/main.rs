use anyhow::{Context, Result};
use dotenv::dotenv;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod scenario;

use scenario::Scenario;
use shared_config::SchedulingConfig;

#[tokio::main]
async fn main() -> Result<()> {
    // Loading Env Vars
    dotenv().ok();

    // Initialize tracing; stdout carries the report, so logs go to stderr
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let path = std::env::args()
        .nth(1)
        .context("usage: reschedule-sim <scenario.json>")?;

    info!("Replaying reschedule scenario {}", path);

    let config = SchedulingConfig::from_env();

    let raw = std::fs::read_to_string(&path).with_context(|| format!("cannot read {}", path))?;
    let scenario = Scenario::from_json(&raw)?;

    let report = scenario::run(scenario, &config).await?;

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

//! CO2 Alert Monitor - Main Entry Point

use co2_monitor::settings::Settings;
use co2_monitor::telemetry::init_logging;
use tracing::info;

const DEFAULT_CONFIG_PATH: &str = "conf/app.toml";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let path = std::env::var("CO2_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let mock = std::env::args().skip(1).any(|arg| arg == "--mock");

    let settings = Settings::load(&path)?;
    init_logging(&settings.log)?;

    info!("=== CO2 Alert Monitor v{} ===", env!("CARGO_PKG_VERSION"));
    info!("Loaded configuration from {}", path);

    co2_monitor::run(settings, mock).await
}

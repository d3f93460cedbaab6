use std::sync::Arc;

use anyhow::{Context, Result};
use wxbot_core::Config;
use wxbot_services::{Dispatcher, SqliteSubscriberStore, TwilioTransport};
use wxbot_weather::{ForecastDay, OpenWeatherProvider};

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env is fine; real deployments set the environment directly
    dotenvy::dotenv().ok();
    wxbot_core::init();

    let (config, _) = Config::load_validated()
        .inspect_err(|e| tracing::error!(hint = e.hint(), "{}", e))
        .context("Failed to load configuration")?;
    let day = ForecastDay::from_tomorrow_flag(config.dispatch.tomorrow);

    let store = SqliteSubscriberStore::open(&config.store.db_path, config.store.max_subscribers)
        .with_context(|| format!("Failed to open subscriber store at {}", config.store.db_path.display()))?;

    let source = OpenWeatherProvider::new(&config.forecast, &config.http)
        .context("Failed to build forecast client")?;
    let transport = TwilioTransport::new(&config.transport, &config.http)
        .context("Failed to build messaging client")?;

    let dispatcher = Dispatcher::new(Arc::new(source), Arc::new(transport), &config.dispatch);

    tracing::info!("Dispatching {} forecasts", day);
    let report = dispatcher
        .run_from_store(&store, day)
        .await
        .context("Failed to list subscribers")?;

    tracing::info!("Done: {} sent, {} failed", report.succeeded(), report.failed());

    Ok(())
}

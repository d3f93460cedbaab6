pub mod config;
pub mod error;
pub mod retry;

pub use config::{
    Config, DispatchConfig, ForecastConfig, HttpConfig, StoreConfig, TransportConfig,
    ValidationResult,
};
pub use error::ConfigError;
pub use retry::{with_retry, RetryConfig, RetryDecision};

/// Initialize tracing/logging for the process.
///
/// Honors `RUST_LOG`; falls back to `info`.
pub fn init() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    tracing::info!("wxbot core initialized");
}

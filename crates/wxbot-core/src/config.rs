use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

use crate::error::ConfigError;
use crate::retry::RetryConfig;

/// Environment variable naming an explicit config file.
pub const CONFIG_PATH_ENV: &str = "WXBOT_CONFIG";

/// Configuration validation errors
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Result of config validation
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationResult {
    /// Returns true if there are no errors (warnings are OK)
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    pub fn add_warning(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Join all errors into a single line
    pub fn error_summary(&self) -> String {
        self.errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub forecast: ForecastConfig,

    #[serde(default)]
    pub transport: TransportConfig,

    /// Timeout and retry policy shared by every outbound HTTP adapter
    #[serde(default)]
    pub http: HttpConfig,

    #[serde(default)]
    pub dispatch: DispatchConfig,

    #[serde(default)]
    pub store: StoreConfig,
}

/// OpenWeatherMap forecast API settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastConfig {
    #[serde(default = "default_forecast_base_url")]
    pub base_url: String,

    /// API key; `WEATHER_API_KEY` overrides
    #[serde(default)]
    pub api_key: String,

    #[serde(default = "default_units")]
    pub units: String,
}

fn default_forecast_base_url() -> String {
    "https://api.openweathermap.org/data/2.5".to_string()
}

fn default_units() -> String {
    "metric".to_string()
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            base_url: default_forecast_base_url(),
            api_key: String::new(),
            units: default_units(),
        }
    }
}

/// Twilio messaging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    #[serde(default = "default_transport_base_url")]
    pub base_url: String,

    #[serde(default)]
    pub account_sid: String,

    #[serde(default)]
    pub auth_token: String,

    /// Sender number, with or without the `whatsapp:` prefix
    #[serde(default)]
    pub from: String,
}

fn default_transport_base_url() -> String {
    "https://api.twilio.com/2010-04-01".to_string()
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            base_url: default_transport_base_url(),
            account_sid: String::new(),
            auth_token: String::new(),
            from: String::new(),
        }
    }
}

impl TransportConfig {
    /// Check if credentials are configured
    pub fn is_configured(&self) -> bool {
        !self.account_sid.is_empty() && !self.auth_token.is_empty() && !self.from.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Extra attempts after the first one; 0 means a single attempt
    #[serde(default)]
    pub max_retries: u32,

    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

fn default_timeout_secs() -> u64 {
    8
}

fn default_initial_delay_ms() -> u64 {
    100
}

fn default_max_delay_ms() -> u64 {
    5000
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            max_retries: 0,
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry(&self) -> RetryConfig {
        RetryConfig::new(self.max_retries, self.initial_delay_ms, self.max_delay_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Send tomorrow's forecast instead of today's; `TOMORROW` overrides
    #[serde(default = "default_tomorrow")]
    pub tomorrow: bool,

    /// Upper bound for each forecast fetch and each send
    #[serde(default = "default_call_timeout_secs")]
    pub call_timeout_secs: u64,

    /// Subscribers processed at once; 1 is strictly sequential
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// When non-empty only these phone numbers receive messages
    #[serde(default)]
    pub only_recipients: Vec<String>,
}

fn default_tomorrow() -> bool {
    true
}

fn default_call_timeout_secs() -> u64 {
    10
}

fn default_max_concurrency() -> usize {
    1
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            tomorrow: default_tomorrow(),
            call_timeout_secs: default_call_timeout_secs(),
            max_concurrency: default_max_concurrency(),
            only_recipients: Vec::new(),
        }
    }
}

impl DispatchConfig {
    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// SQLite database path; `DB_PATH` overrides
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    #[serde(default = "default_max_subscribers")]
    pub max_subscribers: usize,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("/data/subscribers.db")
}

fn default_max_subscribers() -> usize {
    150
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            max_subscribers: default_max_subscribers(),
        }
    }
}

impl Config {
    /// Load configuration from `WXBOT_CONFIG` or the default path, then
    /// apply environment overrides.
    ///
    /// A missing file at the default path yields defaults; a missing file
    /// named explicitly through `WXBOT_CONFIG` is an error.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match std::env::var(CONFIG_PATH_ENV) {
            Ok(explicit) => {
                let path = PathBuf::from(explicit);
                if !path.exists() {
                    return Err(ConfigError::NotFound(path.display().to_string()));
                }
                Self::from_file(&path)?
            }
            Err(_) => match Self::default_path() {
                Some(path) if path.exists() => Self::from_file(&path)?,
                _ => {
                    tracing::debug!("No config file found, using defaults");
                    Self::default()
                }
            },
        };

        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Load configuration and validate it
    ///
    /// Logs warnings; returns an error if validation fails.
    pub fn load_validated() -> Result<(Self, ValidationResult), ConfigError> {
        let config = Self::load()?;
        let validation = config.validate();

        if !validation.is_valid() {
            return Err(ConfigError::Invalid(validation.error_summary()));
        }

        for warning in &validation.warnings {
            tracing::warn!("Config warning: {}", warning);
        }

        Ok((config, validation))
    }

    /// Parse a TOML file without applying environment overrides
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        toml::from_str(&contents).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Overlay values taken from the environment.
    ///
    /// `lookup` is `std::env::var` in production.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup("WEATHER_API_KEY") {
            self.forecast.api_key = key;
        }
        if let Some(sid) = lookup("TWILIO_ACCOUNT_SID") {
            self.transport.account_sid = sid;
        }
        if let Some(token) = lookup("TWILIO_AUTH_TOKEN") {
            self.transport.auth_token = token;
        }
        if let Some(from) = lookup("WHATSAPP_FROM") {
            self.transport.from = from;
        }
        if let Some(path) = lookup("DB_PATH") {
            self.store.db_path = PathBuf::from(path);
        }
        if let Some(tomorrow) = lookup("TOMORROW") {
            if !tomorrow.is_empty() {
                self.dispatch.tomorrow = tomorrow.eq_ignore_ascii_case("true");
            }
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::default();

        validate_url(&self.forecast.base_url, "forecast.base_url", &mut result);
        validate_url(&self.transport.base_url, "transport.base_url", &mut result);

        if self.forecast.api_key.is_empty() {
            result.add_warning("forecast.api_key", "No API key set - forecast requests will fail");
        }

        if !self.transport.is_configured() {
            result.add_warning(
                "transport",
                "Twilio credentials incomplete - sends will be rejected",
            );
        }

        if self.http.timeout_secs == 0 {
            result.add_error("http.timeout_secs", "Timeout must be greater than 0");
        }

        if self.http.max_retries > 0 {
            result.add_warning(
                "http.max_retries",
                format!("Retrying up to {} extra times per call", self.http.max_retries),
            );
        }

        if self.http.initial_delay_ms > self.http.max_delay_ms {
            result.add_warning(
                "http.initial_delay_ms",
                "Initial delay exceeds max delay; every retry waits max_delay_ms",
            );
        }

        if self.dispatch.call_timeout_secs == 0 {
            result.add_error("dispatch.call_timeout_secs", "Timeout must be greater than 0");
        }

        if self.dispatch.max_concurrency == 0 {
            result.add_error("dispatch.max_concurrency", "Concurrency must be at least 1");
        }

        if self.store.max_subscribers == 0 {
            result.add_error("store.max_subscribers", "Capacity must be at least 1");
        }

        result
    }

    /// Default config file location (`<config dir>/wxbot/config.toml`)
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("wxbot").join("config.toml"))
    }
}

fn validate_url(url_str: &str, field_name: &str, result: &mut ValidationResult) {
    match Url::parse(url_str) {
        Ok(url) => {
            if url.scheme() != "http" && url.scheme() != "https" {
                result.add_error(
                    field_name,
                    format!("URL must use http or https scheme, got: {}", url.scheme()),
                );
            }

            if url.host().is_none() {
                result.add_error(field_name, "URL must have a host");
            }
        }
        Err(e) => {
            result.add_error(field_name, format!("Invalid URL: {}", e));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_valid_default_config() {
        let config = Config::default();
        let result = config.validate();
        assert!(result.is_valid(), "Default config should be valid: {:?}", result.errors);
    }

    #[test]
    fn test_missing_credentials_are_warnings() {
        let result = Config::default().validate();
        assert!(result.warnings.iter().any(|w| w.field == "forecast.api_key"));
        assert!(result.warnings.iter().any(|w| w.field == "transport"));
    }

    #[test]
    fn test_invalid_url_scheme() {
        let mut config = Config::default();
        config.forecast.base_url = "ftp://example.com".to_string();
        let result = config.validate();
        assert!(!result.is_valid());
        assert!(result.errors.iter().any(|e| e.message.contains("http or https")));
    }

    #[test]
    fn test_invalid_url() {
        let mut config = Config::default();
        config.transport.base_url = "not-a-url".to_string();
        let result = config.validate();
        assert!(result.errors.iter().any(|e| e.field == "transport.base_url"));
    }

    #[test]
    fn test_zero_concurrency_and_timeouts() {
        let mut config = Config::default();
        config.dispatch.max_concurrency = 0;
        config.http.timeout_secs = 0;
        config.dispatch.call_timeout_secs = 0;
        let result = config.validate();
        assert_eq!(result.errors.len(), 3);
        assert!(result.error_summary().contains("dispatch.max_concurrency"));
    }

    #[test]
    fn test_defaults_single_attempt() {
        let config = Config::default();
        assert_eq!(config.http.max_retries, 0);
        assert_eq!(config.http.retry().max_retries, 0);
        assert_eq!(config.dispatch.max_concurrency, 1);
        assert_eq!(config.store.max_subscribers, 150);
        assert!(config.dispatch.tomorrow);
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("WEATHER_API_KEY", "abc"),
            ("TWILIO_ACCOUNT_SID", "AC123"),
            ("TWILIO_AUTH_TOKEN", "secret"),
            ("WHATSAPP_FROM", "whatsapp:+14155238886"),
            ("DB_PATH", "/tmp/subs.db"),
            ("TOMORROW", "False"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_env(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.forecast.api_key, "abc");
        assert!(config.transport.is_configured());
        assert_eq!(config.store.db_path, PathBuf::from("/tmp/subs.db"));
        assert!(!config.dispatch.tomorrow);
    }

    #[test]
    fn test_empty_tomorrow_keeps_default() {
        let mut config = Config::default();
        config.apply_env(|k| (k == "TOMORROW").then(String::new));
        assert!(config.dispatch.tomorrow);
    }

    #[test]
    fn test_from_file_partial_sections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[dispatch]
tomorrow = false
max_concurrency = 4
only_recipients = ["whatsapp:+46700000000"]

[http]
timeout_secs = 3
"#,
        )
        .unwrap();

        let config = Config::from_file(&path).unwrap();
        assert!(!config.dispatch.tomorrow);
        assert_eq!(config.dispatch.max_concurrency, 4);
        assert_eq!(config.dispatch.only_recipients.len(), 1);
        assert_eq!(config.http.timeout(), Duration::from_secs(3));
        assert_eq!(config.http.max_delay_ms, 5000);
        assert_eq!(config.forecast.units, "metric");
    }

    #[test]
    fn test_from_file_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[dispatch\n").unwrap();

        let err = Config::from_file(&path).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn test_validation_result_error_summary() {
        let mut result = ValidationResult::default();
        result.add_error("field1", "error1");
        result.add_error("field2", "error2");
        let summary = result.error_summary();
        assert_eq!(summary, "field1: error1; field2: error2");
    }
}

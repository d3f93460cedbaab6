//! Forecast-specific error types.

use chrono::NaiveDate;
use thiserror::Error;

/// Failure to obtain forecast points from the upstream API.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Client error {status}: {body}")]
    Client { status: u16, body: String },

    #[error("Server error {status}: {body}")]
    Server { status: u16, body: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Malformed forecast payload: {0}")]
    Parse(String),
}

impl FetchError {
    /// Classify a non-success HTTP status
    pub fn from_status(status: u16, body: String) -> Self {
        if status >= 500 {
            Self::Server { status, body }
        } else {
            Self::Client { status, body }
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_decode() {
            Self::Parse(err.to_string())
        } else if let Some(status) = err.status() {
            Self::from_status(status.as_u16(), err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

/// Failure to turn a forecast into a message for one subscriber.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SummaryError {
    #[error("No forecast points for {0}")]
    NoForecastForDate(NaiveDate),

    #[error("Composed message has no content lines")]
    EmptyComposition,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert!(matches!(
            FetchError::from_status(401, "bad key".into()),
            FetchError::Client { status: 401, .. }
        ));
        assert!(matches!(
            FetchError::from_status(503, String::new()),
            FetchError::Server { status: 503, .. }
        ));
    }

    #[test]
    fn test_display() {
        let err = FetchError::from_status(404, "city not found".into());
        assert_eq!(err.to_string(), "Client error 404: city not found");

        let date = NaiveDate::from_ymd_opt(2025, 6, 11).unwrap();
        assert_eq!(
            SummaryError::NoForecastForDate(date).to_string(),
            "No forecast points for 2025-06-11"
        );
    }
}

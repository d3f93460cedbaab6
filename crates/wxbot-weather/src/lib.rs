//! Forecast reduction for wxbot
//!
//! Fetches 3-hour forecasts, reduces them to a target day and renders the
//! short text message subscribers receive.

pub mod classify;
pub mod compose;
pub mod error;
pub mod provider;
pub mod summary;
pub mod types;
pub mod window;

pub use classify::{classify, Classification, RainLevel, WindLevel};
pub use compose::compose;
pub use error::{FetchError, SummaryError};
pub use provider::{ForecastSource, OpenWeatherProvider};
pub use summary::summarize;
pub use types::*;
pub use window::aggregate;

//! Message text sent to subscribers.
//!
//! ```text
//! Lund tomorrow:
//! - 21° / 16°
//! - light breeze
//! - no rain
//! ```
//!
//! The wind line is omitted when the day portion had no data. Labels are
//! user-visible and must not change wording.

use crate::classify::Classification;
use crate::error::SummaryError;
use crate::types::{Aggregate, ForecastDay};

/// Round half to even and drop the sign of zero
pub fn display_degrees(value: f64) -> i64 {
    value.round_ties_even() as i64
}

pub fn compose(
    location: &str,
    day: ForecastDay,
    aggregate: &Aggregate,
    classification: &Classification,
) -> Result<String, SummaryError> {
    let mut lines: Vec<String> = Vec::with_capacity(4);
    lines.push(format!("{} {}:", location, day));

    lines.push(format!(
        "- {}° / {}°",
        display_degrees(aggregate.max_feels_like),
        display_degrees(aggregate.min_feels_like)
    ));

    if let Some(wind) = classification.wind {
        lines.push(format!("- {}", wind.label()));
    }

    lines.push(format!("- {}", classification.rain.label()));

    if lines.len() < 2 {
        return Err(SummaryError::EmptyComposition);
    }

    Ok(lines.iter().map(|line| format!("{}\n", line)).collect())
}

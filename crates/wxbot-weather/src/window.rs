//! Target-day selection and aggregate statistics.
//!
//! Temperature extremes use every slot of the target day. Wind, rain, cloud
//! and condition statistics only use the day portion (local hours 7..=22),
//! since overnight slots say little about the day ahead. Forecast slots fall
//! on 3-hour boundaries, so restricting the extremes to the day portion
//! would lose the early-morning lows.

use std::collections::HashMap;

use chrono::{NaiveDate, Timelike};

use crate::error::SummaryError;
use crate::types::{Aggregate, ForecastPoint, RainDepth, Reading, WeatherCondition};

/// First local hour of the day portion
pub const DAY_PORTION_START_HOUR: u32 = 7;
/// Last local hour of the day portion (inclusive)
pub const DAY_PORTION_END_HOUR: u32 = 22;

/// Slots on `date`, in input order
pub fn full_day(points: &[ForecastPoint], date: NaiveDate) -> Vec<&ForecastPoint> {
    points
        .iter()
        .filter(|p| p.timestamp.date_naive() == date)
        .collect()
}

pub fn in_day_portion(point: &ForecastPoint) -> bool {
    (DAY_PORTION_START_HOUR..=DAY_PORTION_END_HOUR).contains(&point.timestamp.hour())
}

/// Reduce a forecast to the statistics for `date`.
///
/// Values are left unrounded.
pub fn aggregate(points: &[ForecastPoint], date: NaiveDate) -> Result<Aggregate, SummaryError> {
    let day = full_day(points, date);
    if day.is_empty() {
        return Err(SummaryError::NoForecastForDate(date));
    }

    let (max_feels_like, min_feels_like) = day.iter().fold(
        (f64::NEG_INFINITY, f64::INFINITY),
        |(hi, lo), p| (hi.max(p.feels_like), lo.min(p.feels_like)),
    );

    let portion: Vec<&ForecastPoint> = day.iter().copied().filter(|p| in_day_portion(p)).collect();

    let wind_speed = mean(portion.iter().map(|p| p.wind_speed));
    let rain = mean(portion.iter().map(|p| p.rain_3h.unwrap_or(0.0)))
        .map(|per_3h| RainDepth { per_3h });
    let cloud_cover = mean(portion.iter().map(|p| p.cloud_cover));

    Ok(Aggregate {
        date,
        max_feels_like,
        min_feels_like,
        wind_speed,
        rain,
        cloud_cover,
        dominant_conditions: dominant_conditions(&portion, 2),
    })
}

fn mean<I: Iterator<Item = f64>>(values: I) -> Reading<f64> {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, n), v| (sum + v, n + 1));
    if count == 0 {
        Reading::NoData
    } else {
        Reading::Observed(sum / count as f64)
    }
}

/// Most frequent conditions first; ties keep first-seen order
fn dominant_conditions(points: &[&ForecastPoint], limit: usize) -> Vec<WeatherCondition> {
    let mut counts: HashMap<WeatherCondition, usize> = HashMap::new();
    let mut order: Vec<WeatherCondition> = Vec::new();

    for point in points {
        let condition = point.condition();
        let count = counts.entry(condition).or_insert(0);
        if *count == 0 {
            order.push(condition);
        }
        *count += 1;
    }

    // Stable sort keeps first-seen order among equal counts
    order.sort_by(|a, b| counts[b].cmp(&counts[a]));
    order.truncate(limit);
    order
}

//! Forecast points to finished message for one location.

use chrono::{DateTime, Offset, Utc};

use crate::classify::classify;
use crate::compose::compose;
use crate::error::SummaryError;
use crate::types::{ForecastDay, ForecastPoint};
use crate::window::aggregate;

/// Build the message for `location` on `day`.
///
/// The target date is resolved in the forecast's own UTC offset, so
/// "tomorrow" means tomorrow at the subscriber's location.
pub fn summarize(
    points: &[ForecastPoint],
    location: &str,
    day: ForecastDay,
    now: DateTime<Utc>,
) -> Result<String, SummaryError> {
    let offset = points
        .first()
        .map_or_else(|| Utc.fix(), |p| *p.timestamp.offset());
    let date = day.target_date(now, offset);

    let aggregate = aggregate(points, date)?;
    let conditions: Vec<&str> = aggregate
        .dominant_conditions
        .iter()
        .map(|c| c.description())
        .collect();
    tracing::debug!(
        location,
        %date,
        max = aggregate.max_feels_like,
        min = aggregate.min_feels_like,
        wind = ?aggregate.wind_speed,
        rain = ?aggregate.rain,
        clouds = ?aggregate.cloud_cover,
        conditions = ?conditions,
        "Aggregated forecast"
    );

    let classification = classify(&aggregate);
    compose(location, day, &aggregate, &classification)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::window::tests::{at, point};
    use chrono::TimeZone;

    #[test]
    fn test_summarize_tomorrow() {
        let now = Utc.with_ymd_and_hms(2025, 6, 10, 18, 0, 0).unwrap();
        let mut points = Vec::new();
        for (hour, feels, wind, rain) in [(3, 12.0, 9.0, None), (9, 16.2, 3.0, Some(0.3)), (15, 21.4, 4.0, None)] {
            let mut p = point(at(2, 2025, 6, 11, hour), feels);
            p.wind_speed = wind;
            p.rain_3h = rain;
            points.push(p);
        }
        // Noise on the following day must be ignored
        points.push(point(at(2, 2025, 6, 12, 12), 40.0));

        let message = summarize(&points, "Lund", ForecastDay::Tomorrow, now).unwrap();
        // wind mean 3.5 -> a bit windy; rain 0.15/3 = 0.05 mm/h -> no rain
        assert_eq!(message, "Lund tomorrow:\n- 21° / 12°\n- a bit windy\n- no rain\n");
    }

    #[test]
    fn test_summarize_missing_day() {
        let now = Utc.with_ymd_and_hms(2025, 6, 10, 18, 0, 0).unwrap();
        let points = vec![point(at(2, 2025, 6, 10, 21), 10.0)];
        let err = summarize(&points, "Lund", ForecastDay::Tomorrow, now).unwrap_err();
        assert!(matches!(err, SummaryError::NoForecastForDate(_)));
    }

    #[test]
    fn test_summarize_empty_forecast() {
        let now = Utc.with_ymd_and_hms(2025, 6, 10, 18, 0, 0).unwrap();
        assert!(summarize(&[], "Lund", ForecastDay::Today, now).is_err());
    }
}

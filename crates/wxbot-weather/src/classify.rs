//! Threshold tables mapping aggregate statistics to message phrases.
//!
//! Tables are ordered highest-first and the first threshold the value
//! reaches wins, so a value exactly on a threshold takes the higher class.
//! Anything below the last threshold (including NaN) is the lowest class.

use serde::{Deserialize, Serialize};

use crate::types::{Aggregate, Reading};

/// Canonical 3h rain depths (mm) are divided by this before being compared
/// with a day-average hourly rate, because averaging over the day hides
/// short bursts.
pub const RAIN_DILUTION_FACTOR: f64 = 5.0;

/// Day-average rain rate classes (mm/h)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RainLevel {
    Dry,
    Possible,
    Light,
    Rainy,
    Heavy,
}

/// Highest first: {4.5, 2.4, 1.1, 0.3} / RAIN_DILUTION_FACTOR
const RAIN_THRESHOLDS: [(f64, RainLevel); 4] = [
    (0.90, RainLevel::Heavy),
    (0.48, RainLevel::Rainy),
    (0.22, RainLevel::Light),
    (0.06, RainLevel::Possible),
];

impl RainLevel {
    pub fn classify(mm_per_hour: f64) -> Self {
        RAIN_THRESHOLDS
            .iter()
            .find(|(threshold, _)| mm_per_hour >= *threshold)
            .map_or(Self::Dry, |(_, level)| *level)
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Heavy => "a lot of rain",
            Self::Rainy => "rainy",
            Self::Light => "some rain",
            Self::Possible => "maybe some rain",
            Self::Dry => "no rain",
        }
    }
}

/// Day-average wind speed classes (m/s)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindLevel {
    Calm,
    LightBreeze,
    ABitWindy,
    Windy,
    Strong,
    SuperWindy,
}

const WIND_THRESHOLDS: [(f64, WindLevel); 5] = [
    (7.8, WindLevel::SuperWindy),
    (6.5, WindLevel::Strong),
    (4.7, WindLevel::Windy),
    (3.5, WindLevel::ABitWindy),
    (2.8, WindLevel::LightBreeze),
];

impl WindLevel {
    pub fn classify(meters_per_second: f64) -> Self {
        WIND_THRESHOLDS
            .iter()
            .find(|(threshold, _)| meters_per_second >= *threshold)
            .map_or(Self::Calm, |(_, level)| *level)
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::SuperWindy => "super windy",
            Self::Strong => "strong wind",
            Self::Windy => "windy",
            Self::ABitWindy => "a bit windy",
            Self::LightBreeze => "light breeze",
            Self::Calm => "calm",
        }
    }
}

/// Phrases chosen for one aggregate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    /// `None` when the day portion had no wind data
    pub wind: Option<WindLevel>,
    pub rain: RainLevel,
}

/// Classify an aggregate. Rain without data classifies as 0 mm/h.
pub fn classify(aggregate: &Aggregate) -> Classification {
    let rain_rate = match aggregate.rain {
        Reading::Observed(depth) => depth.per_hour(),
        Reading::NoData => 0.0,
    };

    Classification {
        wind: aggregate.wind_speed.observed().map(WindLevel::classify),
        rain: RainLevel::classify(rain_rate),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RainDepth;
    use chrono::NaiveDate;

    #[test]
    fn test_rain_exact_thresholds() {
        assert_eq!(RainLevel::classify(0.90), RainLevel::Heavy);
        assert_eq!(RainLevel::classify(0.48), RainLevel::Rainy);
        assert_eq!(RainLevel::classify(0.22), RainLevel::Light);
        assert_eq!(RainLevel::classify(0.06), RainLevel::Possible);
        assert_eq!(RainLevel::classify(0.0), RainLevel::Dry);
    }

    #[test]
    fn test_rain_just_below_thresholds() {
        assert_eq!(RainLevel::classify(0.89999), RainLevel::Rainy);
        assert_eq!(RainLevel::classify(0.89), RainLevel::Rainy);
        assert_eq!(RainLevel::classify(0.47), RainLevel::Light);
        assert_eq!(RainLevel::classify(0.21), RainLevel::Possible);
        assert_eq!(RainLevel::classify(0.05), RainLevel::Dry);
    }

    #[test]
    fn test_rain_just_above_thresholds() {
        assert_eq!(RainLevel::classify(0.91), RainLevel::Heavy);
        assert_eq!(RainLevel::classify(0.49), RainLevel::Rainy);
        assert_eq!(RainLevel::classify(0.23), RainLevel::Light);
        assert_eq!(RainLevel::classify(0.07), RainLevel::Possible);
        assert_eq!(RainLevel::classify(25.0), RainLevel::Heavy);
    }

    #[test]
    fn test_rain_thresholds_follow_dilution() {
        for (canonical, (threshold, _)) in [4.5, 2.4, 1.1, 0.3].iter().zip(RAIN_THRESHOLDS) {
            assert!((canonical / RAIN_DILUTION_FACTOR - threshold).abs() < 1e-9);
        }
    }

    #[test]
    fn test_wind_exact_thresholds() {
        assert_eq!(WindLevel::classify(7.8), WindLevel::SuperWindy);
        assert_eq!(WindLevel::classify(6.5), WindLevel::Strong);
        assert_eq!(WindLevel::classify(4.7), WindLevel::Windy);
        assert_eq!(WindLevel::classify(3.5), WindLevel::ABitWindy);
        assert_eq!(WindLevel::classify(2.8), WindLevel::LightBreeze);
        assert_eq!(WindLevel::classify(0.0), WindLevel::Calm);
    }

    #[test]
    fn test_wind_just_below_thresholds() {
        assert_eq!(WindLevel::classify(7.79999), WindLevel::Strong);
        assert_eq!(WindLevel::classify(7.79), WindLevel::Strong);
        assert_eq!(WindLevel::classify(6.49), WindLevel::Windy);
        assert_eq!(WindLevel::classify(4.69), WindLevel::ABitWindy);
        assert_eq!(WindLevel::classify(3.49), WindLevel::LightBreeze);
        assert_eq!(WindLevel::classify(2.79), WindLevel::Calm);
    }

    #[test]
    fn test_wind_just_above_thresholds() {
        assert_eq!(WindLevel::classify(7.81), WindLevel::SuperWindy);
        assert_eq!(WindLevel::classify(6.51), WindLevel::Strong);
        assert_eq!(WindLevel::classify(4.71), WindLevel::Windy);
        assert_eq!(WindLevel::classify(3.51), WindLevel::ABitWindy);
        assert_eq!(WindLevel::classify(2.81), WindLevel::LightBreeze);
    }

    #[test]
    fn test_nan_is_lowest_class() {
        assert_eq!(RainLevel::classify(f64::NAN), RainLevel::Dry);
        assert_eq!(WindLevel::classify(f64::NAN), WindLevel::Calm);
    }

    #[test]
    fn test_labels_verbatim() {
        let rain: Vec<_> = [RainLevel::Heavy, RainLevel::Rainy, RainLevel::Light, RainLevel::Possible, RainLevel::Dry]
            .iter()
            .map(|l| l.label())
            .collect();
        assert_eq!(rain, ["a lot of rain", "rainy", "some rain", "maybe some rain", "no rain"]);

        let wind: Vec<_> = [
            WindLevel::SuperWindy,
            WindLevel::Strong,
            WindLevel::Windy,
            WindLevel::ABitWindy,
            WindLevel::LightBreeze,
            WindLevel::Calm,
        ]
        .iter()
        .map(|l| l.label())
        .collect();
        assert_eq!(wind, ["super windy", "strong wind", "windy", "a bit windy", "light breeze", "calm"]);
    }

    fn aggregate(wind: Reading<f64>, rain: Reading<RainDepth>) -> Aggregate {
        Aggregate {
            date: NaiveDate::from_ymd_opt(2025, 6, 10).unwrap(),
            max_feels_like: 20.0,
            min_feels_like: 10.0,
            wind_speed: wind,
            rain,
            cloud_cover: Reading::NoData,
            dominant_conditions: Vec::new(),
        }
    }

    #[test]
    fn test_classify_aggregate_uses_hourly_rate() {
        // 3 mm per 3h -> 1 mm/h
        let c = classify(&aggregate(Reading::Observed(5.0), Reading::Observed(RainDepth { per_3h: 3.0 })));
        assert_eq!(c.wind, Some(WindLevel::Windy));
        assert_eq!(c.rain, RainLevel::Heavy);
    }

    #[test]
    fn test_classify_aggregate_without_day_portion() {
        let c = classify(&aggregate(Reading::NoData, Reading::NoData));
        assert_eq!(c.wind, None);
        assert_eq!(c.rain, RainLevel::Dry);
    }
}

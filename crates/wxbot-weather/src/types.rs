use chrono::{DateTime, Duration, FixedOffset, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Weather condition categories mapped from OpenWeatherMap condition codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WeatherCondition {
    #[default]
    Clear,
    PartlyCloudy,
    Cloudy,
    Fog,
    Drizzle,
    Rain,
    HeavyRain,
    Snow,
    Sleet,
    Thunderstorm,
}

impl WeatherCondition {
    /// Convert an OpenWeatherMap condition id to a WeatherCondition
    /// See: https://openweathermap.org/weather-conditions
    pub fn from_owm_code(code: u16) -> Self {
        match code {
            200..=299 => Self::Thunderstorm,
            300..=399 => Self::Drizzle,
            502..=504 | 522 | 531 => Self::HeavyRain,
            511 => Self::Sleet, // Freezing rain
            500..=599 => Self::Rain,
            611..=616 => Self::Sleet,
            600..=699 => Self::Snow,
            700..=799 => Self::Fog,
            800 => Self::Clear,
            801 | 802 => Self::PartlyCloudy,
            803 | 804 => Self::Cloudy,
            _ => Self::Clear, // Unknown codes default to clear
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Clear => "Clear",
            Self::PartlyCloudy => "Partly Cloudy",
            Self::Cloudy => "Cloudy",
            Self::Fog => "Fog",
            Self::Drizzle => "Drizzle",
            Self::Rain => "Rain",
            Self::HeavyRain => "Heavy Rain",
            Self::Snow => "Snow",
            Self::Sleet => "Sleet",
            Self::Thunderstorm => "Thunderstorm",
        }
    }
}

/// One 3-hour forecast slot.
///
/// `timestamp` carries the UTC offset of the forecast location, so its
/// calendar date and hour are the location's local ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub timestamp: DateTime<FixedOffset>,
    pub temperature: f64,
    pub feels_like: f64,
    /// m/s
    pub wind_speed: f64,
    pub gust_speed: Option<f64>,
    pub cloud_cover: f64,
    /// mm over the 3h slot; `None` when the upstream payload has no rain field
    pub rain_3h: Option<f64>,
    pub condition_code: u16,
    pub description: String,
}

impl ForecastPoint {
    pub fn condition(&self) -> WeatherCondition {
        WeatherCondition::from_owm_code(self.condition_code)
    }
}

/// Which day a batch reports on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ForecastDay {
    Today,
    Tomorrow,
}

impl ForecastDay {
    pub fn from_tomorrow_flag(tomorrow: bool) -> Self {
        if tomorrow {
            Self::Tomorrow
        } else {
            Self::Today
        }
    }

    /// Calendar date this selector points at, seen from `offset`
    pub fn target_date(self, now: DateTime<Utc>, offset: FixedOffset) -> NaiveDate {
        let local_today = now.with_timezone(&offset).date_naive();
        match self {
            Self::Today => local_today,
            Self::Tomorrow => local_today + Duration::days(1),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Today => "today",
            Self::Tomorrow => "tomorrow",
        }
    }
}

impl std::fmt::Display for ForecastDay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// A statistic that is either observed or explicitly absent.
///
/// Absence is an ordinary outcome (e.g. a forecast whose target day only
/// has overnight slots), not an error.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Reading<T> {
    Observed(T),
    NoData,
}

impl<T> Reading<T> {
    pub fn observed(self) -> Option<T> {
        match self {
            Self::Observed(v) => Some(v),
            Self::NoData => None,
        }
    }

    pub fn is_no_data(&self) -> bool {
        matches!(self, Self::NoData)
    }

    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Reading<U> {
        match self {
            Self::Observed(v) => Reading::Observed(f(v)),
            Self::NoData => Reading::NoData,
        }
    }
}

/// Average rain depth over the day portion
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RainDepth {
    /// Mean mm per 3h slot
    pub per_3h: f64,
}

impl RainDepth {
    /// Hourly rate assuming rain spreads evenly over each 3h slot
    pub fn per_hour(&self) -> f64 {
        self.per_3h / 3.0
    }
}

/// Statistics for one subscriber's target day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Aggregate {
    pub date: NaiveDate,
    /// Full-day extremes
    pub max_feels_like: f64,
    pub min_feels_like: f64,
    /// Day-portion means
    pub wind_speed: Reading<f64>,
    pub rain: Reading<RainDepth>,
    pub cloud_cover: Reading<f64>,
    /// Up to two most frequent day-portion conditions, most frequent first
    pub dominant_conditions: Vec<WeatherCondition>,
}

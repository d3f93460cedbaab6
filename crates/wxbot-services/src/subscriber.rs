//! Subscriber records and input validation.

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

/// Prefix Twilio uses for WhatsApp addresses
pub const WHATSAPP_PREFIX: &str = "whatsapp:";

pub const MIN_FORECAST_DAYS: u8 = 1;
pub const MAX_FORECAST_DAYS: u8 = 7;

/// Messaging channel a subscriber is reached on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    #[default]
    Whatsapp,
    Sms,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Whatsapp => "whatsapp",
            Self::Sms => "sms",
        }
    }

    /// Parse a stored channel name; unknown values fall back to WhatsApp
    pub fn from_db(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "sms" => Self::Sms,
            _ => Self::Whatsapp,
        }
    }
}

/// A stored subscriber.
///
/// `forecast_days`, the feature flags and the send times are stored and
/// passed through; the dispatcher does not act on them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subscriber {
    pub id: i64,
    pub phone_number: String,
    pub location: String,
    pub longitude: f64,
    pub latitude: f64,
    pub channel: Channel,
    pub forecast_days: u8,
    pub wind: bool,
    pub gust: bool,
    pub gif: bool,
    pub only_weird_weather: bool,
    pub send_time_morning: Option<NaiveTime>,
    pub send_time_afternoon: Option<NaiveTime>,
}

impl Subscriber {
    /// Address handed to the message transport
    pub fn recipient(&self) -> String {
        recipient_address(self.channel, &self.phone_number)
    }
}

/// Address for `phone` on `channel`: WhatsApp numbers carry the
/// `whatsapp:` prefix, SMS numbers never do.
pub fn recipient_address(channel: Channel, phone: &str) -> String {
    let bare = bare_phone(phone);
    match channel {
        Channel::Whatsapp => format!("{}{}", WHATSAPP_PREFIX, bare),
        Channel::Sms => bare.to_string(),
    }
}

/// Phone number without channel prefix or surrounding whitespace
pub fn bare_phone(phone: &str) -> &str {
    let trimmed = phone.trim();
    trimmed.strip_prefix(WHATSAPP_PREFIX).unwrap_or(trimmed).trim()
}

/// Subscriber data as submitted, before it has an id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewSubscriber {
    pub phone_number: String,
    pub location: String,
    pub longitude: f64,
    pub latitude: f64,
    #[serde(default)]
    pub channel: Channel,
    #[serde(default = "default_forecast_days")]
    pub forecast_days: u8,
    #[serde(default)]
    pub wind: bool,
    #[serde(default)]
    pub gust: bool,
    #[serde(default)]
    pub gif: bool,
    #[serde(default)]
    pub only_weird_weather: bool,
    #[serde(default)]
    pub send_time_morning: Option<String>,
    #[serde(default)]
    pub send_time_afternoon: Option<String>,
}

fn default_forecast_days() -> u8 {
    MIN_FORECAST_DAYS
}

impl NewSubscriber {
    pub fn new(phone_number: impl Into<String>, location: impl Into<String>, longitude: f64, latitude: f64) -> Self {
        Self {
            phone_number: phone_number.into(),
            location: location.into(),
            longitude,
            latitude,
            channel: Channel::default(),
            forecast_days: default_forecast_days(),
            wind: false,
            gust: false,
            gif: false,
            only_weird_weather: false,
            send_time_morning: None,
            send_time_afternoon: None,
        }
    }

    /// Check every field and report all problems at once.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        let phone = bare_phone(&self.phone_number);
        if phone.is_empty() {
            errors.push("Phone number is required.".to_string());
        } else if !is_valid_phone(phone) {
            errors.push("Phone number looks invalid. Use international format, e.g. +4676...".to_string());
        }

        if self.location.trim().is_empty() {
            errors.push("Location is required.".to_string());
        }

        if !(-180.0..=180.0).contains(&self.longitude) {
            errors.push("Longitude must be between -180 and 180.".to_string());
        }
        if !(-90.0..=90.0).contains(&self.latitude) {
            errors.push("Latitude must be between -90 and 90.".to_string());
        }

        for (value, name) in [
            (&self.send_time_morning, "Morning"),
            (&self.send_time_afternoon, "Afternoon"),
        ] {
            if let Some(time) = value {
                if parse_send_time(time).is_none() {
                    errors.push(format!("{} send time must be HH:MM 24-hour format.", name));
                }
            }
        }

        if !(MIN_FORECAST_DAYS..=MAX_FORECAST_DAYS).contains(&self.forecast_days) {
            errors.push(format!(
                "forecast_days must be between {} and {}.",
                MIN_FORECAST_DAYS, MAX_FORECAST_DAYS
            ));
        }

        errors
    }

    /// Phone number in stored form: bare, whatever the channel
    pub fn normalized_phone(&self) -> String {
        bare_phone(&self.phone_number).to_string()
    }
}

/// `+?[0-9]{6,15}`
fn is_valid_phone(phone: &str) -> bool {
    let digits = phone.strip_prefix('+').unwrap_or(phone);
    (6..=15).contains(&digits.len()) && digits.chars().all(|c| c.is_ascii_digit())
}

/// Strict `HH:MM`, 24-hour
pub fn parse_send_time(value: &str) -> Option<NaiveTime> {
    if value.len() != 5 {
        return None;
    }
    NaiveTime::parse_from_str(value, "%H:%M").ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> NewSubscriber {
        NewSubscriber::new("+46761234567", "Lund", 13.19, 55.7)
    }

    #[test]
    fn test_valid_subscriber() {
        assert!(valid().validate().is_empty());
    }

    #[test]
    fn test_phone_with_whatsapp_prefix_accepted() {
        let mut sub = valid();
        sub.phone_number = "whatsapp:+46761234567".into();
        assert!(sub.validate().is_empty());
        assert_eq!(sub.normalized_phone(), "+46761234567");

        sub.channel = Channel::Sms;
        assert_eq!(sub.normalized_phone(), "+46761234567");
    }

    #[test]
    fn test_invalid_phone() {
        for phone in ["", "12345", "+46-76-123", "1234567890123456", "whatsapp:"] {
            let mut sub = valid();
            sub.phone_number = phone.into();
            assert_eq!(sub.validate().len(), 1, "phone {:?}", phone);
        }
    }

    #[test]
    fn test_collects_all_errors() {
        let mut sub = valid();
        sub.location = "  ".into();
        sub.latitude = 91.0;
        sub.longitude = -181.0;
        sub.forecast_days = 8;
        sub.send_time_morning = Some("7:30".into());
        sub.send_time_afternoon = Some("25:00".into());
        assert_eq!(sub.validate().len(), 6);
    }

    #[test]
    fn test_send_time_parsing() {
        assert_eq!(parse_send_time("07:30"), NaiveTime::from_hms_opt(7, 30, 0));
        assert_eq!(parse_send_time("23:59"), NaiveTime::from_hms_opt(23, 59, 0));
        assert_eq!(parse_send_time("24:00"), None);
        assert_eq!(parse_send_time("7:30"), None);
        assert_eq!(parse_send_time("07:60"), None);
    }

    #[test]
    fn test_forecast_days_bounds() {
        let mut sub = valid();
        sub.forecast_days = 0;
        assert_eq!(sub.validate().len(), 1);
        sub.forecast_days = 7;
        assert!(sub.validate().is_empty());
    }

    #[test]
    fn test_recipient_address() {
        assert_eq!(recipient_address(Channel::Whatsapp, "+4670"), "whatsapp:+4670");
        assert_eq!(recipient_address(Channel::Whatsapp, "whatsapp:+4670"), "whatsapp:+4670");
        assert_eq!(recipient_address(Channel::Sms, "whatsapp:+4670"), "+4670");
        assert_eq!(recipient_address(Channel::Sms, " +4670 "), "+4670");
    }

    #[test]
    fn test_channel_from_db() {
        assert_eq!(Channel::from_db("SMS"), Channel::Sms);
        assert_eq!(Channel::from_db("whatsapp"), Channel::Whatsapp);
        assert_eq!(Channel::from_db("carrier pigeon"), Channel::Whatsapp);
        assert_eq!(Channel::Sms.as_str(), "sms");
    }

    #[test]
    fn test_deserialize_defaults() {
        let sub: NewSubscriber = serde_json::from_value(serde_json::json!({
            "phone_number": "+46761234567",
            "location": "Lund",
            "longitude": 13.19,
            "latitude": 55.7
        }))
        .unwrap();
        assert_eq!(sub.channel, Channel::Whatsapp);
        assert_eq!(sub.forecast_days, 1);
        assert!(!sub.wind);
    }
}

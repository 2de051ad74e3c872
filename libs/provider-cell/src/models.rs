use std::collections::HashMap;

use chrono::{DateTime, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

/// Sentinel stored for weekdays the provider does not work.
pub const NOT_AVAILABLE: &str = "Not Available";

const WEEKDAY_KEYS: [&str; 7] = [
    "monday",
    "tuesday",
    "wednesday",
    "thursday",
    "friday",
    "saturday",
    "sunday",
];

pub fn weekday_key(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Mon => "monday",
        Weekday::Tue => "tuesday",
        Weekday::Wed => "wednesday",
        Weekday::Thu => "thursday",
        Weekday::Fri => "friday",
        Weekday::Sat => "saturday",
        Weekday::Sun => "sunday",
    }
}

/// Parse a working-hours range of the form `"H:MM AM/PM - H:MM AM/PM"`.
/// Tolerant of case and surrounding whitespace; anything else is `None`.
pub fn parse_time_range(raw: &str) -> Option<(NaiveTime, NaiveTime)> {
    let raw = raw.trim();
    if raw.is_empty() || raw.eq_ignore_ascii_case(NOT_AVAILABLE) {
        return None;
    }

    let (lhs, rhs) = raw.split_once('-')?;
    let start = parse_clock(lhs)?;
    let end = parse_clock(rhs)?;

    // Degenerate and inverted ranges produce no bookable time.
    (start < end).then_some((start, end))
}

fn parse_clock(raw: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(&raw.trim().to_ascii_uppercase(), "%I:%M %p").ok()
}

/// A provider's recurring weekly schedule: one raw range string per weekday,
/// keyed by lowercase weekday name. Values are kept as entered; parsing
/// happens at the point of use so one malformed day never poisons the rest
/// of the week.
#[derive(Debug, Clone, PartialEq)]
pub struct WeeklySchedule {
    days: HashMap<String, String>,
}

impl WeeklySchedule {
    /// The system default handed to providers without a stored schedule:
    /// weekdays 9:00 AM - 5:00 PM, weekends off.
    pub fn standard_office_hours() -> Self {
        let mut days = HashMap::new();
        for key in &WEEKDAY_KEYS[..5] {
            days.insert(key.to_string(), "9:00 AM - 5:00 PM".to_string());
        }
        for key in &WEEKDAY_KEYS[5..] {
            days.insert(key.to_string(), NOT_AVAILABLE.to_string());
        }
        Self { days }
    }

    pub fn from_days(days: HashMap<String, String>) -> Self {
        let days = days
            .into_iter()
            .map(|(key, value)| (key.trim().to_ascii_lowercase(), value))
            .collect();
        Self { days }
    }

    /// Decode the JSON-encoded schedule stored on the provider record.
    /// A garbled document degrades to an empty schedule (every day treated
    /// as not available) rather than failing the request.
    pub fn from_json(raw: &str) -> Self {
        match serde_json::from_str::<HashMap<String, String>>(raw) {
            Ok(days) => Self::from_days(days),
            Err(e) => {
                warn!("Unparsable availability document, treating all days as unavailable: {}", e);
                Self {
                    days: HashMap::new(),
                }
            }
        }
    }

    pub fn raw_for(&self, weekday: Weekday) -> Option<&str> {
        self.days.get(weekday_key(weekday)).map(String::as_str)
    }

    /// The parsed working range for a weekday. Missing entries, the
    /// `"Not Available"` sentinel, and unparsable ranges all resolve to
    /// `None`; unparsable ranges are additionally logged.
    pub fn range_for(&self, weekday: Weekday) -> Option<(NaiveTime, NaiveTime)> {
        let raw = self.raw_for(weekday)?;
        if raw.trim().eq_ignore_ascii_case(NOT_AVAILABLE) {
            return None;
        }
        let parsed = parse_time_range(raw);
        if parsed.is_none() {
            warn!("Unparsable availability range for {}: {:?}", weekday_key(weekday), raw);
        }
        parsed
    }

    /// Write-path validation: every present entry must be the sentinel or a
    /// parseable range, and keys must be real weekday names.
    pub fn validate(&self) -> Result<(), String> {
        for (key, value) in &self.days {
            if !WEEKDAY_KEYS.contains(&key.as_str()) {
                return Err(format!("Unknown weekday: {}", key));
            }
            if value.trim().eq_ignore_ascii_case(NOT_AVAILABLE) {
                continue;
            }
            if parse_time_range(value).is_none() {
                return Err(format!(
                    "Invalid time range for {}: {:?} (expected e.g. \"9:00 AM - 5:00 PM\" or \"{}\")",
                    key, value, NOT_AVAILABLE
                ));
            }
        }
        Ok(())
    }

    /// Normalized JSON document for storage: all seven weekdays present, in
    /// order, with missing days filled with the sentinel.
    pub fn to_json_value(&self) -> serde_json::Value {
        let mut map = serde_json::Map::new();
        for key in WEEKDAY_KEYS {
            let value = self
                .days
                .get(key)
                .cloned()
                .unwrap_or_else(|| NOT_AVAILABLE.to_string());
            map.insert(key.to_string(), serde_json::Value::String(value));
        }
        serde_json::Value::Object(map)
    }

    pub fn to_json_string(&self) -> String {
        self.to_json_value().to_string()
    }
}

/// Immutable scheduling defaults injected into the services that need them.
#[derive(Debug, Clone)]
pub struct SchedulingDefaults {
    pub schedule: WeeklySchedule,
    pub slot_minutes: u32,
}

impl Default for SchedulingDefaults {
    fn default() -> Self {
        Self {
            schedule: WeeklySchedule::standard_office_hours(),
            slot_minutes: 30,
        }
    }
}

/// Provider record as stored in the `doctors` table. The weekly schedule
/// lives in the `availability` column as a JSON-encoded string.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Doctor {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub specialty: Option<String>,
    #[serde(default)]
    pub telehealth_enabled: bool,
    pub availability: Option<String>,
    pub slot_minutes: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Doctor {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    pub fn weekly_schedule(&self, defaults: &SchedulingDefaults) -> WeeklySchedule {
        match self.availability.as_deref() {
            Some(raw) => WeeklySchedule::from_json(raw),
            None => defaults.schedule.clone(),
        }
    }

    pub fn slot_granularity(&self, defaults: &SchedulingDefaults) -> u32 {
        self.slot_minutes
            .filter(|minutes| *minutes > 0)
            .map(|minutes| minutes as u32)
            .unwrap_or(defaults.slot_minutes)
    }
}

/// A bookable interval on one calendar date. Slots are always derived on
/// demand, never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

#[derive(Debug, Deserialize)]
pub struct UpdateAvailabilityRequest {
    pub availability: HashMap<String, String>,
}

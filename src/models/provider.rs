use std::fmt;

use chrono::{DateTime, NaiveDate, Utc, Weekday};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::geo::GeoPoint;

pub const MINUTES_PER_DAY: u16 = 24 * 60;

/// Minute of day, serialized as `HH:MM`. `24:00` is accepted so a window can
/// run to midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TimeOfDay(u16);

impl TimeOfDay {
    pub fn from_minutes(minutes: u16) -> Option<Self> {
        (minutes <= MINUTES_PER_DAY).then_some(Self(minutes))
    }

    pub fn from_hm(hour: u16, minute: u16) -> Option<Self> {
        if minute >= 60 || hour > 24 {
            return None;
        }
        Self::from_minutes(hour * 60 + minute)
    }

    pub fn minutes(self) -> u16 {
        self.0
    }
}

impl TryFrom<String> for TimeOfDay {
    type Error = String;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        let (hour, minute) = raw
            .split_once(':')
            .ok_or_else(|| format!("invalid time of day {raw:?}, expected HH:MM"))?;

        let hour: u16 = hour
            .trim()
            .parse()
            .map_err(|_| format!("invalid hour in {raw:?}"))?;
        let minute: u16 = minute
            .trim()
            .parse()
            .map_err(|_| format!("invalid minute in {raw:?}"))?;

        Self::from_hm(hour, minute).ok_or_else(|| format!("time of day {raw:?} out of range"))
    }
}

impl From<TimeOfDay> for String {
    fn from(value: TimeOfDay) -> Self {
        value.to_string()
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.0 / 60, self.0 % 60)
    }
}

/// Half-open `[start, end)` interval within a single day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: TimeOfDay,
    pub end: TimeOfDay,
}

impl TimeWindow {
    pub fn contains(&self, start_minute: u32, duration_minutes: u32) -> bool {
        let window_start = u32::from(self.start.minutes());
        let window_end = u32::from(self.end.minutes());

        start_minute >= window_start
            && start_minute
                .checked_add(duration_minutes)
                .is_some_and(|end| end <= window_end)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExceptionKind {
    Unavailable,
    Custom,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvailabilityException {
    pub date: NaiveDate,
    #[serde(rename = "type")]
    pub kind: ExceptionKind,
    #[serde(default, rename = "timeSlots", skip_serializing_if = "Option::is_none")]
    pub custom_windows: Option<Vec<TimeWindow>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Recurring weekly schedule plus date-specific overrides.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeeklyAvailability {
    pub monday: Vec<TimeWindow>,
    pub tuesday: Vec<TimeWindow>,
    pub wednesday: Vec<TimeWindow>,
    pub thursday: Vec<TimeWindow>,
    pub friday: Vec<TimeWindow>,
    pub saturday: Vec<TimeWindow>,
    pub sunday: Vec<TimeWindow>,
    pub exceptions: Vec<AvailabilityException>,
}

impl WeeklyAvailability {
    pub fn windows_for(&self, weekday: Weekday) -> &[TimeWindow] {
        match weekday {
            Weekday::Mon => &self.monday,
            Weekday::Tue => &self.tuesday,
            Weekday::Wed => &self.wednesday,
            Weekday::Thu => &self.thursday,
            Weekday::Fri => &self.friday,
            Weekday::Sat => &self.saturday,
            Weekday::Sun => &self.sunday,
        }
    }

    pub fn windows_for_mut(&mut self, weekday: Weekday) -> &mut Vec<TimeWindow> {
        match weekday {
            Weekday::Mon => &mut self.monday,
            Weekday::Tue => &mut self.tuesday,
            Weekday::Wed => &mut self.wednesday,
            Weekday::Thu => &mut self.thursday,
            Weekday::Fri => &mut self.friday,
            Weekday::Sat => &mut self.saturday,
            Weekday::Sun => &mut self.sunday,
        }
    }

    pub fn exception_on(&self, date: NaiveDate) -> Option<&AvailabilityException> {
        self.exceptions.iter().find(|exception| exception.date == date)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerificationStatus {
    Pending,
    Verified,
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationPreferences {
    pub email: bool,
    pub sms: bool,
    pub push: bool,
}

impl Default for NotificationPreferences {
    fn default() -> Self {
        Self {
            email: true,
            sms: false,
            push: false,
        }
    }
}

/// Read projection of a provider profile used for matching.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderCandidate {
    pub provider_id: Uuid,
    pub business_name: String,
    pub verification_status: VerificationStatus,
    pub is_active: bool,
    pub service_location: Option<GeoPoint>,
    pub service_radius_miles: Option<f64>,
    pub availability: WeeklyAvailability,
    pub phone: Option<String>,
    pub preferences: NotificationPreferences,
    pub updated_at: DateTime<Utc>,
}

impl ProviderCandidate {
    pub fn is_eligible(&self) -> bool {
        self.verification_status == VerificationStatus::Verified && self.is_active
    }

    pub fn wants_sms(&self) -> Option<&str> {
        if !self.preferences.sms {
            return None;
        }
        self.phone.as_deref().filter(|phone| !phone.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::{TimeOfDay, TimeWindow};

    #[test]
    fn parses_and_formats_hh_mm() {
        let time = TimeOfDay::try_from("09:30".to_string()).unwrap();
        assert_eq!(time.minutes(), 570);
        assert_eq!(time.to_string(), "09:30");
    }

    #[test]
    fn accepts_midnight_end_and_rejects_overflow() {
        assert_eq!(
            TimeOfDay::try_from("24:00".to_string()).unwrap().minutes(),
            1440
        );
        assert!(TimeOfDay::try_from("24:01".to_string()).is_err());
        assert!(TimeOfDay::try_from("10:60".to_string()).is_err());
        assert!(TimeOfDay::try_from("ten".to_string()).is_err());
    }

    #[test]
    fn rejects_hours_that_would_wrap() {
        assert!(TimeOfDay::try_from("1093:00".to_string()).is_err());
        assert!(TimeOfDay::try_from("65535:00".to_string()).is_err());
        assert!(TimeOfDay::from_hm(u16::MAX, 59).is_none());

        let window: Result<TimeWindow, _> =
            serde_json::from_str(r#"{ "start": "1093:00", "end": "1100:00" }"#);
        assert!(window.is_err());
    }

    #[test]
    fn huge_duration_does_not_fit_any_window() {
        let window = TimeWindow {
            start: TimeOfDay::from_hm(8, 0).unwrap(),
            end: TimeOfDay::from_hm(17, 0).unwrap(),
        };

        assert!(window.contains(600, 60));
        assert!(!window.contains(600, u32::MAX));
        assert!(!window.contains(u32::MAX, 1));
    }

    #[test]
    fn window_deserializes_from_json_strings() {
        let window: TimeWindow =
            serde_json::from_str(r#"{ "start": "08:00", "end": "12:00" }"#).unwrap();
        assert_eq!(window.start.minutes(), 480);
        assert_eq!(window.end.minutes(), 720);
    }
}

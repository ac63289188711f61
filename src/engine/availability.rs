use std::collections::HashSet;

use chrono::{Datelike, NaiveDateTime, Timelike, Weekday};
use thiserror::Error;

use crate::models::provider::{ExceptionKind, TimeWindow, WeeklyAvailability};

const WEEKDAYS: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AvailabilityError {
    #[error("{scope}: window {start}-{end} must end after it starts")]
    EmptyWindow {
        scope: String,
        start: String,
        end: String,
    },

    #[error("{scope}: windows {first} and {second} overlap")]
    Overlap {
        scope: String,
        first: String,
        second: String,
    },

    #[error("exception on {0} is custom but has no time slots")]
    MissingCustomWindows(String),

    #[error("more than one exception on {0}")]
    DuplicateException(String),
}

/// Whether `[start, start + duration)` fits entirely inside one open window
/// on the day of `start`.
///
/// `start` is the wall-clock time at the job site; no timezone conversion
/// happens here. A date exception replaces the weekday's windows outright.
pub fn is_available(
    availability: &WeeklyAvailability,
    start: NaiveDateTime,
    duration_minutes: u32,
) -> bool {
    let windows = match availability.exception_on(start.date()) {
        Some(exception) => match exception.kind {
            ExceptionKind::Unavailable => return false,
            ExceptionKind::Custom => exception.custom_windows.as_deref().unwrap_or(&[]),
        },
        None => availability.windows_for(start.weekday()),
    };

    let slot_start = start.hour() * 60 + start.minute();

    windows
        .iter()
        .any(|window| window.contains(slot_start, duration_minutes))
}

/// Sorts every window list and rejects empty, overlapping, or ambiguous
/// entries. Adjacent windows (one ends where the next starts) are allowed.
pub fn normalize_availability(
    mut availability: WeeklyAvailability,
) -> Result<WeeklyAvailability, AvailabilityError> {
    for weekday in WEEKDAYS {
        normalize_windows(availability.windows_for_mut(weekday), &weekday.to_string())?;
    }

    let mut seen_dates = HashSet::new();
    for exception in &mut availability.exceptions {
        let date = exception.date.to_string();
        if !seen_dates.insert(exception.date) {
            return Err(AvailabilityError::DuplicateException(date));
        }

        match exception.kind {
            ExceptionKind::Unavailable => exception.custom_windows = None,
            ExceptionKind::Custom => match exception.custom_windows.as_mut() {
                Some(windows) if !windows.is_empty() => normalize_windows(windows, &date)?,
                _ => return Err(AvailabilityError::MissingCustomWindows(date)),
            },
        }
    }

    availability.exceptions.sort_by_key(|exception| exception.date);
    Ok(availability)
}

fn normalize_windows(windows: &mut [TimeWindow], scope: &str) -> Result<(), AvailabilityError> {
    if let Some(window) = windows.iter().find(|window| window.start >= window.end) {
        return Err(AvailabilityError::EmptyWindow {
            scope: scope.to_string(),
            start: window.start.to_string(),
            end: window.end.to_string(),
        });
    }

    windows.sort_by_key(|window| window.start);

    if let Some(pair) = windows.windows(2).find(|pair| pair[1].start < pair[0].end) {
        return Err(AvailabilityError::Overlap {
            scope: scope.to_string(),
            first: format!("{}-{}", pair[0].start, pair[0].end),
            second: format!("{}-{}", pair[1].start, pair[1].end),
        });
    }

    Ok(())
}

//! Values that are recomputed from stored facts on every read.
//!
//! Nothing here touches storage or the clock. Callers pass `now` explicitly so
//! two reads at different instants can never share a stale answer.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

const SECONDS_PER_DAY: i64 = 86_400;

/// Upper bound for a maintenance frequency, one hundred years.
pub const MAX_FREQUENCY_DAYS: i64 = 36_500;

const CRITICAL_HOURS: f64 = 10.0;
const WARNING_HOURS: f64 = 50.0;

const DEFAULT_INTERVALS: &[f64] = &[500.0, 1000.0, 5000.0];

/// Service interval staircases keyed by system type.
const SERVICE_INTERVALS: &[(&str, &[f64])] = &[
    ("מנועים", &[250.0, 500.0, 1000.0, 2000.0]),
    ("גנרטורים", &[250.0, 500.0, 1000.0, 3000.0]),
    ("מדחסים", &[500.0, 1000.0, 2000.0, 4000.0]),
    ("משאבות", &[500.0, 1000.0, 3000.0, 6000.0]),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertLevel {
    Normal,
    Warning,
    Critical,
}

impl AlertLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            AlertLevel::Normal => "normal",
            AlertLevel::Warning => "warning",
            AlertLevel::Critical => "critical",
        }
    }

    pub fn from_remaining(hours_until_service: f64) -> Self {
        if hours_until_service <= CRITICAL_HOURS {
            AlertLevel::Critical
        } else if hours_until_service <= WARNING_HOURS {
            AlertLevel::Warning
        } else {
            AlertLevel::Normal
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaintenanceDates {
    pub next_due: DateTime<Utc>,
    pub days_until_due: i64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ServiceStatus {
    pub next_service_hours: f64,
    pub hours_until_service: f64,
    pub alert_level: AlertLevel,
}

/// `next_due = last_performed + frequency_days`, and the whole days left until
/// then, floored (an item due earlier today is already `-1`). `None` when the
/// due date falls outside the representable calendar.
pub fn maintenance_dates(
    last_performed: DateTime<Utc>,
    frequency_days: i64,
    now: DateTime<Utc>,
) -> Option<MaintenanceDates> {
    let next_due = last_performed.checked_add_signed(Duration::try_days(frequency_days)?)?;
    let seconds = (next_due - now).num_seconds();
    Some(MaintenanceDates {
        next_due,
        days_until_due: seconds.div_euclid(SECONDS_PER_DAY),
    })
}

pub fn frequency_in_range(frequency_days: i64) -> bool {
    (1..=MAX_FREQUENCY_DAYS).contains(&frequency_days)
}

pub fn intervals_for(system_type: &str) -> &'static [f64] {
    SERVICE_INTERVALS
        .iter()
        .find(|(name, _)| *name == system_type)
        .map(|(_, intervals)| *intervals)
        .unwrap_or(DEFAULT_INTERVALS)
}

/// Next service threshold for the given run-hours. Unknown types use the
/// default table; past the last step the threshold is the last step doubled.
pub fn service_hours(system_type: &str, current_hours: f64) -> ServiceStatus {
    let intervals = intervals_for(system_type);
    let next_service_hours = intervals
        .iter()
        .copied()
        .find(|interval| *interval > current_hours)
        .unwrap_or_else(|| {
            let last = intervals.last().copied().unwrap_or(DEFAULT_INTERVALS[2]);
            last + last
        });
    let hours_until_service = next_service_hours - current_hours;
    ServiceStatus {
        next_service_hours,
        hours_until_service,
        alert_level: AlertLevel::from_remaining(hours_until_service),
    }
}

/// Parse a stored record date. Accepts `YYYY-MM-DD`, RFC 3339 and a naive
/// `YYYY-MM-DDTHH:MM:SS` timestamp (treated as UTC).
pub fn parse_record_date(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive.and_utc());
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

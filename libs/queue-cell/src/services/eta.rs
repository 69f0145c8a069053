// libs/queue-cell/src/services/eta.rs
//
// ETA arithmetic. Everything here is pure: callers pass the current local
// time in, and failures come back as `None` rather than errors so that a
// bad doctor record never blocks registration.

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use tracing::warn;

/// Formats accepted for free-text consult start times, tried in order.
const TIME_FORMATS: [&str; 7] = [
    "%H:%M",
    "%H:%M:%S",
    "%I:%M %p",
    "%H.%M",
    "%I.%M %p",
    "%H%M",
    "%I%M%p",
];

const DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%d-%m-%Y"];

/// Upper bound on `average * position`, one year of minutes.
const MAX_ETA_OFFSET_MINUTES: i64 = 60 * 24 * 366;

const SECONDS_PER_DAY: i64 = 24 * 60 * 60;

/// Consult start time used when a doctor has none configured.
pub fn default_start_time() -> NaiveTime {
    NaiveTime::MIN + Duration::hours(18)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartTimeInput<'a> {
    Time(NaiveTime),
    Text(&'a str),
}

impl From<NaiveTime> for StartTimeInput<'_> {
    fn from(t: NaiveTime) -> Self {
        StartTimeInput::Time(t)
    }
}

impl<'a> From<&'a str> for StartTimeInput<'a> {
    fn from(s: &'a str) -> Self {
        StartTimeInput::Text(s)
    }
}

fn truncate_to_minute(t: NaiveTime) -> NaiveTime {
    NaiveTime::MIN + Duration::minutes(i64::from(t.hour() * 60 + t.minute()))
}

/// Normalises a consult start time to minute precision.
///
/// Missing or blank input yields the 18:00 default. Text that matches none
/// of the accepted formats yields `None`.
pub fn normalize_time_input(input: Option<StartTimeInput<'_>>) -> Option<NaiveTime> {
    let text = match input {
        Some(StartTimeInput::Time(t)) => return Some(truncate_to_minute(t)),
        Some(StartTimeInput::Text(s)) if !s.trim().is_empty() => s.trim(),
        _ => return Some(default_start_time()),
    };

    let parsed = TIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveTime::parse_from_str(text, fmt).ok())
        .map(truncate_to_minute);

    if parsed.is_none() {
        warn!("Unable to parse start time: {}", text);
    }
    parsed
}

/// Parses `YYYY-MM-DD` or `DD-MM-YYYY`, falling back to `today`.
pub fn parse_date_flexible(input: Option<&str>, today: NaiveDate) -> NaiveDate {
    let Some(text) = input.map(str::trim).filter(|s| !s.is_empty()) else {
        return today;
    };

    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
        .unwrap_or(today)
}

/// Rounds to the nearest 5-minute mark: `:x2` rounds down, `:x3` rounds up.
/// Seconds are discarded and the result wraps past midnight.
pub fn round_to_nearest_5min(t: NaiveTime) -> NaiveTime {
    let minutes = (t.minute() + 2) / 5 * 5;
    let seconds = i64::from(t.hour() * 3600 + minutes * 60) % SECONDS_PER_DAY;
    NaiveTime::MIN + Duration::seconds(seconds)
}

/// ETA for a patient with `position_ahead` consults in front of them.
///
/// On the appointment day the queue cannot start before `now`; on other
/// days it starts at the doctor's consult start time. Returns `None` for a
/// non-positive average, a negative position or an unparseable start time.
pub fn calculate_eta_time(
    start_time: Option<StartTimeInput<'_>>,
    average_consult_minutes: i64,
    position_ahead: i64,
    appointment_on: NaiveDate,
    now: NaiveDateTime,
) -> Option<NaiveTime> {
    if average_consult_minutes <= 0 || position_ahead < 0 {
        warn!(
            average_consult_minutes,
            position_ahead, "ETA calculation failed: invalid average minutes or queue position"
        );
        return None;
    }

    let start = normalize_time_input(start_time)?;

    let offset = match average_consult_minutes.checked_mul(position_ahead) {
        Some(minutes) if minutes <= MAX_ETA_OFFSET_MINUTES => minutes,
        _ => {
            warn!(
                average_consult_minutes,
                position_ahead, "ETA calculation failed: offset out of range"
            );
            return None;
        }
    };

    let effective_start = if appointment_on == now.date() {
        start.max(now.time())
    } else {
        start
    };

    let Some(eta) = appointment_on
        .and_time(effective_start)
        .checked_add_signed(Duration::minutes(offset))
    else {
        warn!(%appointment_on, offset, "ETA calculation failed: date out of range");
        return None;
    };
    Some(round_to_nearest_5min(truncate_to_minute(eta.time())))
}

/// `HH:MM`, or `N/A` when there is no ETA.
pub fn format_eta(eta: Option<NaiveTime>) -> String {
    eta.map(|t| t.format("%H:%M").to_string())
        .unwrap_or_else(|| "N/A".to_string())
}

/// Half-hour window containing the ETA, e.g. `06:00 PM – 06:30 PM`.
pub fn format_eta_window(eta: Option<NaiveTime>) -> String {
    let Some(eta) = eta else {
        return "N/A".to_string();
    };

    let start = NaiveTime::MIN + Duration::minutes(i64::from(eta.hour() * 60 + eta.minute() / 30 * 30));
    let end = start + Duration::minutes(30);
    format!("{} – {}", start.format("%I:%M %p"), end.format("%I:%M %p"))
}

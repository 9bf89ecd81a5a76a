//! Peak-hour windows and the clock used to evaluate them.

use chrono::{DateTime, FixedOffset, NaiveTime, Offset, Utc};

use crate::ConfigError;

/// Source of "now" for peak-hour decisions.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Reads the system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Always returns the same instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// A daily wall-clock window, start inclusive, end exclusive.
///
/// A window whose end is not after its start wraps past midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeakWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl PeakWindow {
    #[must_use]
    pub fn contains(&self, time: NaiveTime) -> bool {
        if self.start < self.end {
            time >= self.start && time < self.end
        } else {
            time >= self.start || time < self.end
        }
    }
}

impl std::fmt::Display for PeakWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}-{}",
            self.start.format("%H:%M"),
            self.end.format("%H:%M")
        )
    }
}

/// Peak windows evaluated in a fixed local offset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeakSchedule {
    pub windows: Vec<PeakWindow>,
    pub utc_offset: FixedOffset,
}

fn hour(h: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, 0, 0).unwrap_or(NaiveTime::MIN)
}

impl Default for PeakSchedule {
    /// Lunch 11:00-13:00 and dinner 18:00-20:00, UTC.
    fn default() -> Self {
        Self {
            windows: vec![
                PeakWindow {
                    start: hour(11),
                    end: hour(13),
                },
                PeakWindow {
                    start: hour(18),
                    end: hour(20),
                },
            ],
            utc_offset: Utc.fix(),
        }
    }
}

impl PeakSchedule {
    /// True when `at`, read in the schedule's offset, falls in any window.
    #[must_use]
    pub fn is_peak(&self, at: DateTime<Utc>) -> bool {
        let local = at.with_timezone(&self.utc_offset).time();
        self.windows.iter().any(|w| w.contains(local))
    }
}

/// Parse `"11:00-13:00,18:00-20:30"` into windows. Empty input means no peak.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidEnvVar`] for `PEAK_HOUR_WINDOWS` when a
/// window is malformed or empty.
pub fn parse_peak_windows(raw: &str) -> Result<Vec<PeakWindow>, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidEnvVar {
        var: "PEAK_HOUR_WINDOWS".to_string(),
        reason,
    };

    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|window| {
            let (start, end) = window
                .split_once('-')
                .ok_or_else(|| invalid(format!("'{window}' must look like HH:MM-HH:MM")))?;
            let parse = |t: &str| {
                NaiveTime::parse_from_str(t.trim(), "%H:%M")
                    .map_err(|e| invalid(format!("'{window}': {e}")))
            };
            let window_value = PeakWindow {
                start: parse(start)?,
                end: parse(end)?,
            };
            if window_value.start == window_value.end {
                return Err(invalid(format!("'{window}' is empty")));
            }
            Ok(window_value)
        })
        .collect()
}

/// Parse an offset such as `+08:00`, `-05:30`, or `Z`.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidEnvVar`] for `COURIER_TIMEZONE_OFFSET`.
pub fn parse_utc_offset(raw: &str) -> Result<FixedOffset, ConfigError> {
    let invalid = || ConfigError::InvalidEnvVar {
        var: "COURIER_TIMEZONE_OFFSET".to_string(),
        reason: format!("'{raw}' must look like +HH:MM"),
    };

    let raw = raw.trim();
    if raw.eq_ignore_ascii_case("z") || raw.eq_ignore_ascii_case("utc") {
        return Ok(Utc.fix());
    }

    let (sign, rest) = match raw.chars().next() {
        Some('+') => (1, &raw[1..]),
        Some('-') => (-1, &raw[1..]),
        _ => return Err(invalid()),
    };
    let (hours, minutes) = rest.split_once(':').ok_or_else(invalid)?;
    let hours: i32 = hours.parse().map_err(|_| invalid())?;
    let minutes: i32 = minutes.parse().map_err(|_| invalid())?;
    if !(0..=14).contains(&hours) || !(0..60).contains(&minutes) {
        return Err(invalid());
    }

    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60)).ok_or_else(invalid)
}

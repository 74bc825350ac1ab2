//! Wall-clock helpers for alarms and bedtime.
//!
//! Everything here works in the local timezone: alarms and bedtime are
//! expressed as a time of day, and the daemon compares them against the
//! current local time on every scheduler tick.
//!
//! [`Clock`] abstracts "now" so the scheduler and the session state machine
//! can be driven by a [`ManualClock`] in tests.

use std::fmt;
use std::str::FromStr;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Local, NaiveDate, NaiveTime, TimeZone, Timelike};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors produced when parsing or building a time of day.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimeError {
    /// The string is not of the form `H:MM` / `HH:MM`.
    #[error("invalid time of day: {0:?} (expected HH:MM)")]
    InvalidFormat(String),

    /// Hour or minute outside 0..=23 / 0..=59.
    #[error("time of day out of range: {hour}:{minute:02}")]
    OutOfRange { hour: u32, minute: u32 },
}

/// A wall-clock time of day with minute precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ClockTime {
    hour: u8,
    minute: u8,
}

impl ClockTime {
    /// Builds a time of day, validating the ranges.
    pub fn new(hour: u32, minute: u32) -> Result<Self, TimeError> {
        if hour > 23 || minute > 59 {
            return Err(TimeError::OutOfRange { hour, minute });
        }
        Ok(Self {
            hour: hour as u8,
            minute: minute as u8,
        })
    }

    /// Returns the hour (0-23).
    pub fn hour(&self) -> u32 {
        u32::from(self.hour)
    }

    /// Returns the minute (0-59).
    pub fn minute(&self) -> u32 {
        u32::from(self.minute)
    }

    /// Returns the time of day of a local datetime, truncated to the minute.
    pub fn of(dt: &DateTime<Local>) -> Self {
        Self {
            hour: dt.hour() as u8,
            minute: dt.minute() as u8,
        }
    }

    /// Returns true if `dt` falls in the same hour and minute.
    pub fn matches(&self, dt: &DateTime<Local>) -> bool {
        dt.hour() == self.hour() && dt.minute() == self.minute()
    }

    /// Converts to a chrono `NaiveTime` at second zero.
    pub fn to_naive_time(&self) -> NaiveTime {
        NaiveTime::from_hms_opt(self.hour(), self.minute(), 0).unwrap_or(NaiveTime::MIN)
    }

    /// Formats as `H:MM` (no hour padding), the form used on the bus.
    pub fn short(&self) -> String {
        format!("{}:{:02}", self.hour, self.minute)
    }
}

impl fmt::Display for ClockTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

impl FromStr for ClockTime {
    type Err = TimeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let (hour, minute) = trimmed
            .split_once(':')
            .ok_or_else(|| TimeError::InvalidFormat(s.to_string()))?;

        if hour.is_empty() || hour.len() > 2 || minute.len() != 2 {
            return Err(TimeError::InvalidFormat(s.to_string()));
        }

        let hour: u32 = hour
            .parse()
            .map_err(|_| TimeError::InvalidFormat(s.to_string()))?;
        let minute: u32 = minute
            .parse()
            .map_err(|_| TimeError::InvalidFormat(s.to_string()))?;

        Self::new(hour, minute)
    }
}

/// Resolves a local date and time of day into a concrete instant.
///
/// Ambiguous times (DST fall-back) resolve to the earlier instant. Times that
/// do not exist (DST spring-forward gap) are pushed forward by one hour.
pub fn resolve_local(date: NaiveDate, time: ClockTime) -> DateTime<Local> {
    let naive = date.and_time(time.to_naive_time());
    Local
        .from_local_datetime(&naive)
        .earliest()
        .or_else(|| {
            Local
                .from_local_datetime(&(naive + Duration::hours(1)))
                .earliest()
        })
        .unwrap_or_else(|| Local.from_utc_datetime(&naive))
}

/// Returns the occurrence of `time` on the same calendar day as `now`.
pub fn occurrence_today(now: &DateTime<Local>, time: ClockTime) -> DateTime<Local> {
    resolve_local(now.date_naive(), time)
}

/// Returns the next occurrence of `time` at or after `now`, minute-aligned.
///
/// If today's occurrence is already in the past it rolls to tomorrow.
pub fn next_occurrence(now: &DateTime<Local>, time: ClockTime) -> DateTime<Local> {
    let today = occurrence_today(now, time);
    if today >= truncate_to_minute(now) {
        return today;
    }
    match now.date_naive().succ_opt() {
        Some(tomorrow) => resolve_local(tomorrow, time),
        None => today,
    }
}

/// Returns true if `now` is in `[target, target + window)`.
pub fn within_window(now: &DateTime<Local>, target: &DateTime<Local>, window: Duration) -> bool {
    let elapsed = *now - *target;
    elapsed >= Duration::zero() && elapsed < window
}

/// Drops the seconds and sub-second part of a local datetime.
pub fn truncate_to_minute(dt: &DateTime<Local>) -> DateTime<Local> {
    dt.with_second(0)
        .and_then(|d| d.with_nanosecond(0))
        .unwrap_or(*dt)
}

/// A source of the current local time.
pub trait Clock: Send + Sync {
    /// Returns the current local time.
    fn now(&self) -> DateTime<Local>;
}

/// The real wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Local>>,
}

impl ManualClock {
    /// Creates a clock frozen at `now`.
    pub fn new(now: DateTime<Local>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    /// Jumps to `now`.
    pub fn set(&self, now: DateTime<Local>) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = now;
    }

    /// Moves forward by `delta`.
    pub fn advance(&self, delta: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += delta;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Local> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

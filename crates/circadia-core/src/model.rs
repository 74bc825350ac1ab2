//! Domain types shared by the daemon, the store and the CLI.

use std::path::PathBuf;

use chrono::{DateTime, Duration, Local};
use serde::{Deserialize, Serialize};

use crate::time::{ClockTime, TimeError};

/// Stable identity of an alarm row.
pub type AlarmId = i64;

/// Setting keys understood by the store and the daemon.
pub mod keys {
    pub const BEDTIME: &str = "bedtime";
    pub const NOTIFY_BEDTIME: &str = "notify_bedtime";
    pub const SMART_WAKE_UP: &str = "smart_wake_up";
    pub const SLEEP_START_TIME: &str = "sleep_start_time";
    pub const ALARM_AUDIO_PATH: &str = "alarm_audio_path";
    pub const SNOOZE_DURATION: &str = "snooze_duration";
    pub const SNOOZE_ENABLED: &str = "snooze_enabled";
}

/// Default bedtime when none is stored.
pub const DEFAULT_BEDTIME: &str = "23:00";

/// Default snooze length in minutes.
pub const DEFAULT_SNOOZE_MINUTES: u32 = 15;

/// A wake-up alarm.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alarm {
    pub id: AlarmId,
    pub hour: u32,
    pub minute: u32,
    pub enabled: bool,
}

impl Alarm {
    /// Returns the alarm's time of day.
    pub fn time(&self) -> Result<ClockTime, TimeError> {
        ClockTime::new(self.hour, self.minute)
    }
}

/// A finished, persisted sleep interval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SleepSession {
    pub id: i64,
    pub start: DateTime<Local>,
    pub end: DateTime<Local>,
    pub snooze_count: u32,
}

impl SleepSession {
    /// Time between going to sleep and stopping the alarm.
    pub fn duration(&self) -> Duration {
        self.end - self.start
    }
}

/// Averages over a set of sessions, as shown on the history view.
#[derive(Debug, Clone, PartialEq)]
pub struct HistorySummary {
    pub sessions: usize,
    pub average_duration: Duration,
    pub average_snoozes: f64,
}

impl HistorySummary {
    /// Summarizes `sessions`; `None` when there is nothing to average.
    pub fn from_sessions(sessions: &[SleepSession]) -> Option<Self> {
        if sessions.is_empty() {
            return None;
        }
        let count = sessions.len() as i64;
        let total_secs: i64 = sessions.iter().map(|s| s.duration().num_seconds()).sum();
        let total_snoozes: u64 = sessions.iter().map(|s| u64::from(s.snooze_count)).sum();

        Some(Self {
            sessions: sessions.len(),
            average_duration: Duration::seconds(total_secs / count),
            average_snoozes: total_snoozes as f64 / count as f64,
        })
    }
}

/// Snapshot of every setting the daemon reads, with defaults filled in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub bedtime: String,
    pub notify_bedtime: bool,
    pub smart_wake_up: bool,
    pub sleep_start: Option<DateTime<Local>>,
    pub alarm_audio_path: Option<PathBuf>,
    pub snooze_minutes: u32,
    pub snooze_enabled: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bedtime: DEFAULT_BEDTIME.to_string(),
            notify_bedtime: true,
            smart_wake_up: false,
            sleep_start: None,
            alarm_audio_path: None,
            snooze_minutes: DEFAULT_SNOOZE_MINUTES,
            snooze_enabled: true,
        }
    }
}

/// Formats a duration as `7h 35m`.
pub fn format_hours_minutes(d: Duration) -> String {
    let minutes = d.num_minutes().max(0);
    format!("{}h {:02}m", minutes / 60, minutes % 60)
}

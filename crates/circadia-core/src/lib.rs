//! Core types: wall-clock math, alarms, sleep sessions, tracing

pub mod model;
pub mod time;
pub mod tracing;

pub use model::{
    Alarm, AlarmId, DEFAULT_BEDTIME, DEFAULT_SNOOZE_MINUTES, HistorySummary, Settings,
    SleepSession, format_hours_minutes, keys,
};
pub use time::{
    Clock, ClockTime, ManualClock, SystemClock, TimeError, next_occurrence, occurrence_today,
    resolve_local, truncate_to_minute, within_window,
};
pub use tracing::{TracingConfig, TracingError, TracingOutputFormat, init_tracing};

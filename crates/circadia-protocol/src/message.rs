//! The bus message vocabulary.
//!
//! Every message is a flat `kind` or `kind:payload` string. There is no
//! nesting and no escaping: the payload is everything after the first `:`.

use std::fmt;
use std::str::FromStr;

use circadia_core::ClockTime;

use crate::error::{ProtocolError, ProtocolResult};

/// A single event bus message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusMessage {
    /// Bedtime setting edited; notification dedup must re-arm.
    BedtimeChanged,
    /// An alarm (or a snooze re-ring) started sounding.
    AlarmTriggered(ClockTime),
    /// Sleep tracking toggled.
    SleepModeChanged(bool),
    /// Smart wake-up toggled; the scheduler must restart.
    SmartWakeUpToggled(bool),
    /// Bedtime notification toggle changed.
    BedtimeNotificationsChanged,
    /// Explicit user stop of the ringing alarm.
    StopAlarm,
    /// Snooze the ringing alarm.
    SnoozeAlarm,
}

impl BusMessage {
    pub const BEDTIME_CHANGED: &'static str = "bedtimeChanged";
    pub const ALARM_TRIGGERED: &'static str = "alarmTriggered";
    pub const SLEEP_MODE_CHANGED: &'static str = "sleepModeChanged";
    pub const SMART_WAKE_UP_TOGGLED: &'static str = "smartWakeUpToggled";
    pub const BEDTIME_NOTIFICATIONS_CHANGED: &'static str = "bedtimeNotificationsChanged";
    pub const STOP_ALARM: &'static str = "stopAlarm";
    pub const SNOOZE_ALARM: &'static str = "snoozeAlarm";

    /// Returns the `kind` part of the wire form.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::BedtimeChanged => Self::BEDTIME_CHANGED,
            Self::AlarmTriggered(_) => Self::ALARM_TRIGGERED,
            Self::SleepModeChanged(_) => Self::SLEEP_MODE_CHANGED,
            Self::SmartWakeUpToggled(_) => Self::SMART_WAKE_UP_TOGGLED,
            Self::BedtimeNotificationsChanged => Self::BEDTIME_NOTIFICATIONS_CHANGED,
            Self::StopAlarm => Self::STOP_ALARM,
            Self::SnoozeAlarm => Self::SNOOZE_ALARM,
        }
    }
}

impl fmt::Display for BusMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlarmTriggered(time) => write!(f, "{}:{}", self.kind(), time.short()),
            Self::SleepModeChanged(enabled) | Self::SmartWakeUpToggled(enabled) => {
                write!(f, "{}:{}", self.kind(), enabled)
            }
            _ => f.write_str(self.kind()),
        }
    }
}

impl FromStr for BusMessage {
    type Err = ProtocolError;

    fn from_str(s: &str) -> ProtocolResult<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ProtocolError::EmptyMessage);
        }

        let (kind, payload) = match s.split_once(':') {
            Some((kind, payload)) => (kind, Some(payload)),
            None => (s, None),
        };

        match kind {
            Self::BEDTIME_CHANGED => bare(Self::BEDTIME_CHANGED, payload, Self::BedtimeChanged),
            Self::BEDTIME_NOTIFICATIONS_CHANGED => bare(
                Self::BEDTIME_NOTIFICATIONS_CHANGED,
                payload,
                Self::BedtimeNotificationsChanged,
            ),
            Self::STOP_ALARM => bare(Self::STOP_ALARM, payload, Self::StopAlarm),
            Self::SNOOZE_ALARM => bare(Self::SNOOZE_ALARM, payload, Self::SnoozeAlarm),
            Self::ALARM_TRIGGERED => {
                let payload = required(Self::ALARM_TRIGGERED, payload)?;
                payload
                    .parse::<ClockTime>()
                    .map(Self::AlarmTriggered)
                    .map_err(|_| ProtocolError::InvalidPayload {
                        kind: Self::ALARM_TRIGGERED,
                        payload: payload.to_string(),
                    })
            }
            Self::SLEEP_MODE_CHANGED => {
                parse_bool(Self::SLEEP_MODE_CHANGED, payload).map(Self::SleepModeChanged)
            }
            Self::SMART_WAKE_UP_TOGGLED => {
                parse_bool(Self::SMART_WAKE_UP_TOGGLED, payload).map(Self::SmartWakeUpToggled)
            }
            other => Err(ProtocolError::UnknownKind(other.to_string())),
        }
    }
}

fn bare(kind: &'static str, payload: Option<&str>, message: BusMessage) -> ProtocolResult<BusMessage> {
    match payload {
        None => Ok(message),
        Some(payload) => Err(ProtocolError::UnexpectedPayload {
            kind,
            payload: payload.to_string(),
        }),
    }
}

fn required<'a>(kind: &'static str, payload: Option<&'a str>) -> ProtocolResult<&'a str> {
    match payload {
        Some(p) if !p.is_empty() => Ok(p),
        _ => Err(ProtocolError::MissingPayload { kind }),
    }
}

fn parse_bool(kind: &'static str, payload: Option<&str>) -> ProtocolResult<bool> {
    match required(kind, payload)? {
        "true" => Ok(true),
        "false" => Ok(false),
        other => Err(ProtocolError::InvalidPayload {
            kind,
            payload: other.to_string(),
        }),
    }
}

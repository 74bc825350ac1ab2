//! Alarm commands.
//!
//! The scheduler re-reads the alarm table on every tick, so edits need no
//! bus message.

use chrono::{DateTime, Local};

use circadia_core::{Alarm, AlarmId, ClockTime, format_hours_minutes, next_occurrence};
use circadia_store::Store;

use crate::error::ClientResult;

pub fn add(store: &Store, time: ClockTime) -> ClientResult<AlarmId> {
    let id = store.add_alarm(time)?;
    println!("Alarm {} set for {}.", id, time);
    Ok(id)
}

pub fn list(store: &Store) -> ClientResult<()> {
    println!("{}", render_alarms(&store.alarms()?, Local::now()));
    Ok(())
}

pub fn edit(store: &Store, id: AlarmId, time: ClockTime) -> ClientResult<()> {
    store.update_alarm(id, time)?;
    println!("Alarm {} moved to {}.", id, time);
    Ok(())
}

pub fn set_enabled(store: &Store, id: AlarmId, enabled: bool) -> ClientResult<()> {
    store.set_alarm_enabled(id, enabled)?;
    println!("Alarm {} {}.", id, if enabled { "enabled" } else { "disabled" });
    Ok(())
}

pub fn remove(store: &Store, id: AlarmId) -> ClientResult<()> {
    store.delete_alarm(id)?;
    println!("Alarm {} removed.", id);
    Ok(())
}

/// One line per alarm, with the time left until each enabled one rings.
pub fn render_alarms(alarms: &[Alarm], now: DateTime<Local>) -> String {
    if alarms.is_empty() {
        return "No alarms.".to_string();
    }

    alarms
        .iter()
        .map(|alarm| {
            let Ok(time) = alarm.time() else {
                return format!("{:>4}  {:02}:{:02}  invalid", alarm.id, alarm.hour, alarm.minute);
            };
            if alarm.enabled {
                let until = next_occurrence(&now, time) - now;
                format!("{:>4}  {}  on   rings in {}", alarm.id, time, format_hours_minutes(until))
            } else {
                format!("{:>4}  {}  off", alarm.id, time)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

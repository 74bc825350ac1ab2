//! Key/value settings with typed accessors.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, SecondsFormat};
use rusqlite::{OptionalExtension, params};
use tracing::warn;

use circadia_core::{ClockTime, DEFAULT_BEDTIME, DEFAULT_SNOOZE_MINUTES, Settings, keys};

use crate::Store;
use crate::error::{StoreError, StoreResult};

impl Store {
    /// Reads a raw setting.
    pub fn get_setting(&self, key: &str) -> StoreResult<Option<String>> {
        let value = self
            .conn()
            .query_row(
                "SELECT value FROM settings WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    /// Writes a raw setting, replacing any previous value.
    pub fn set_setting(&self, key: &str, value: &str) -> StoreResult<()> {
        self.conn().execute(
            "INSERT INTO settings (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }

    /// Writes a setting only if it has no value yet.
    pub fn set_default(&self, key: &str, value: &str) -> StoreResult<()> {
        self.conn().execute(
            "INSERT OR IGNORE INTO settings (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    fn bool_setting(&self, key: &str, default: bool) -> StoreResult<bool> {
        match self.get_setting(key)?.as_deref() {
            None | Some("") => Ok(default),
            Some("true") | Some("1") => Ok(true),
            Some("false") | Some("0") => Ok(false),
            Some(other) => Err(StoreError::invalid_value(key, other)),
        }
    }

    fn set_bool(&self, key: &str, value: bool) -> StoreResult<()> {
        self.set_setting(key, if value { "true" } else { "false" })
    }

    /// Bedtime as stored (`HH:MM`).
    pub fn bedtime(&self) -> StoreResult<String> {
        Ok(self
            .get_setting(keys::BEDTIME)?
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_BEDTIME.to_string()))
    }

    pub fn set_bedtime(&self, bedtime: ClockTime) -> StoreResult<()> {
        self.set_setting(keys::BEDTIME, &bedtime.to_string())
    }

    pub fn notify_bedtime(&self) -> StoreResult<bool> {
        self.bool_setting(keys::NOTIFY_BEDTIME, true)
    }

    pub fn set_notify_bedtime(&self, enabled: bool) -> StoreResult<()> {
        self.set_bool(keys::NOTIFY_BEDTIME, enabled)
    }

    pub fn smart_wake_up(&self) -> StoreResult<bool> {
        self.bool_setting(keys::SMART_WAKE_UP, false)
    }

    pub fn set_smart_wake_up(&self, enabled: bool) -> StoreResult<()> {
        self.set_bool(keys::SMART_WAKE_UP, enabled)
    }

    pub fn snooze_enabled(&self) -> StoreResult<bool> {
        self.bool_setting(keys::SNOOZE_ENABLED, true)
    }

    pub fn set_snooze_enabled(&self, enabled: bool) -> StoreResult<()> {
        self.set_bool(keys::SNOOZE_ENABLED, enabled)
    }

    /// Snooze length in minutes. Missing or non-positive values read as 15.
    pub fn snooze_duration(&self) -> StoreResult<u32> {
        let Some(raw) = self.get_setting(keys::SNOOZE_DURATION)? else {
            return Ok(DEFAULT_SNOOZE_MINUTES);
        };
        if raw.is_empty() {
            return Ok(DEFAULT_SNOOZE_MINUTES);
        }
        let minutes: i64 = raw
            .trim()
            .parse()
            .map_err(|_| StoreError::invalid_value(keys::SNOOZE_DURATION, raw.as_str()))?;
        if minutes <= 0 {
            return Ok(DEFAULT_SNOOZE_MINUTES);
        }
        Ok(u32::try_from(minutes).unwrap_or(DEFAULT_SNOOZE_MINUTES))
    }

    pub fn set_snooze_duration(&self, minutes: u32) -> StoreResult<()> {
        self.set_setting(keys::SNOOZE_DURATION, &minutes.to_string())
    }

    /// Custom alarm sound, if one is configured.
    pub fn alarm_audio_path(&self) -> StoreResult<Option<PathBuf>> {
        Ok(self
            .get_setting(keys::ALARM_AUDIO_PATH)?
            .filter(|v| !v.is_empty())
            .map(PathBuf::from))
    }

    pub fn set_alarm_audio_path(&self, path: Option<&Path>) -> StoreResult<()> {
        let value = path.map(|p| p.to_string_lossy().into_owned()).unwrap_or_default();
        self.set_setting(keys::ALARM_AUDIO_PATH, &value)
    }

    /// Start of the in-progress sleep session. `None` means not sleeping.
    pub fn sleep_start(&self) -> StoreResult<Option<DateTime<Local>>> {
        match self.get_setting(keys::SLEEP_START_TIME)? {
            None => Ok(None),
            Some(raw) if raw.is_empty() => Ok(None),
            Some(raw) => DateTime::parse_from_rfc3339(&raw)
                .map(|dt| Some(dt.with_timezone(&Local)))
                .map_err(|_| StoreError::invalid_value(keys::SLEEP_START_TIME, raw)),
        }
    }

    /// Records or clears the in-progress session start.
    pub fn set_sleep_start(&self, start: Option<DateTime<Local>>) -> StoreResult<()> {
        let value = start
            .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Secs, false))
            .unwrap_or_default();
        self.set_setting(keys::SLEEP_START_TIME, &value)
    }

    /// Reads every daemon setting, substituting defaults for unreadable ones.
    pub fn load_settings(&self) -> Settings {
        let defaults = Settings::default();
        Settings {
            bedtime: or_default(keys::BEDTIME, self.bedtime(), defaults.bedtime),
            notify_bedtime: or_default(
                keys::NOTIFY_BEDTIME,
                self.notify_bedtime(),
                defaults.notify_bedtime,
            ),
            smart_wake_up: or_default(
                keys::SMART_WAKE_UP,
                self.smart_wake_up(),
                defaults.smart_wake_up,
            ),
            sleep_start: or_default(keys::SLEEP_START_TIME, self.sleep_start(), None),
            alarm_audio_path: or_default(keys::ALARM_AUDIO_PATH, self.alarm_audio_path(), None),
            snooze_minutes: or_default(
                keys::SNOOZE_DURATION,
                self.snooze_duration(),
                defaults.snooze_minutes,
            ),
            snooze_enabled: or_default(
                keys::SNOOZE_ENABLED,
                self.snooze_enabled(),
                defaults.snooze_enabled,
            ),
        }
    }
}

fn or_default<T>(key: &str, result: StoreResult<T>, default: T) -> T {
    result.unwrap_or_else(|e| {
        warn!(key, error = %e, "Failed to read setting, using default");
        default
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn seeded_defaults() {
        let store = Store::open_in_memory().unwrap();
        assert_eq!(store.bedtime().unwrap(), "23:00");
        assert!(store.notify_bedtime().unwrap());
        assert!(!store.smart_wake_up().unwrap());
        assert!(store.snooze_enabled().unwrap());
        assert_eq!(store.snooze_duration().unwrap(), 15);
        assert!(store.alarm_audio_path().unwrap().is_none());
        assert!(store.sleep_start().unwrap().is_none());
    }

    #[test]
    fn set_setting_upserts() {
        let store = Store::open_in_memory().unwrap();
        store.set_setting("custom", "a").unwrap();
        store.set_setting("custom", "b").unwrap();
        assert_eq!(store.get_setting("custom").unwrap().as_deref(), Some("b"));

        store.set_default("custom", "c").unwrap();
        assert_eq!(store.get_setting("custom").unwrap().as_deref(), Some("b"));
    }

    #[test]
    fn sleep_start_round_trip_and_clear() {
        let store = Store::open_in_memory().unwrap();
        let start = Local.with_ymd_and_hms(2025, 1, 10, 23, 30, 0).unwrap();

        store.set_sleep_start(Some(start)).unwrap();
        assert_eq!(store.sleep_start().unwrap(), Some(start));

        store.set_sleep_start(None).unwrap();
        assert_eq!(store.sleep_start().unwrap(), None);
        assert_eq!(
            store.get_setting(keys::SLEEP_START_TIME).unwrap().as_deref(),
            Some("")
        );
    }

    #[test]
    fn snooze_duration_falls_back() {
        let store = Store::open_in_memory().unwrap();
        store.set_setting(keys::SNOOZE_DURATION, "0").unwrap();
        assert_eq!(store.snooze_duration().unwrap(), 15);

        store.set_setting(keys::SNOOZE_DURATION, "-3").unwrap();
        assert_eq!(store.snooze_duration().unwrap(), 15);

        store.set_snooze_duration(9).unwrap();
        assert_eq!(store.snooze_duration().unwrap(), 9);

        store.set_setting(keys::SNOOZE_DURATION, "soon").unwrap();
        assert!(matches!(
            store.snooze_duration(),
            Err(StoreError::InvalidValue { .. })
        ));
    }

    #[test]
    fn load_settings_substitutes_defaults() {
        let store = Store::open_in_memory().unwrap();
        store.set_setting(keys::SNOOZE_DURATION, "soon").unwrap();
        store.set_setting(keys::SMART_WAKE_UP, "maybe").unwrap();
        store.set_setting(keys::SLEEP_START_TIME, "last night").unwrap();
        store.set_snooze_enabled(false).unwrap();

        let settings = store.load_settings();
        assert_eq!(settings.snooze_minutes, 15);
        assert!(!settings.smart_wake_up);
        assert!(settings.sleep_start.is_none());
        assert!(!settings.snooze_enabled);
    }

    #[test]
    fn audio_path_clear() {
        let store = Store::open_in_memory().unwrap();
        store
            .set_alarm_audio_path(Some(Path::new("/tmp/wake.mp3")))
            .unwrap();
        assert_eq!(
            store.alarm_audio_path().unwrap(),
            Some(PathBuf::from("/tmp/wake.mp3"))
        );
        store.set_alarm_audio_path(None).unwrap();
        assert!(store.alarm_audio_path().unwrap().is_none());
    }
}

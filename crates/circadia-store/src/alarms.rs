//! Alarm CRUD.

use rusqlite::params;

use circadia_core::{Alarm, AlarmId, ClockTime};

use crate::Store;
use crate::error::{StoreError, StoreResult};

impl Store {
    /// Adds an enabled alarm and returns its id.
    pub fn add_alarm(&self, time: ClockTime) -> StoreResult<AlarmId> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO alarms (hour, minute, enabled) VALUES (?1, ?2, 1)",
            params![time.hour(), time.minute()],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// All alarms ordered by time of day.
    pub fn alarms(&self) -> StoreResult<Vec<Alarm>> {
        let conn = self.conn();
        let mut stmt =
            conn.prepare("SELECT id, hour, minute, enabled FROM alarms ORDER BY hour, minute, id")?;
        let alarms = stmt
            .query_map([], |row| {
                Ok(Alarm {
                    id: row.get(0)?,
                    hour: row.get(1)?,
                    minute: row.get(2)?,
                    enabled: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(alarms)
    }

    /// Enabled alarms ordered by time of day.
    pub fn enabled_alarms(&self) -> StoreResult<Vec<Alarm>> {
        Ok(self.alarms()?.into_iter().filter(|a| a.enabled).collect())
    }

    /// Moves an alarm to a new time.
    pub fn update_alarm(&self, id: AlarmId, time: ClockTime) -> StoreResult<()> {
        let changed = self.conn().execute(
            "UPDATE alarms SET hour = ?1, minute = ?2 WHERE id = ?3",
            params![time.hour(), time.minute(), id],
        )?;
        expect_row(changed, id)
    }

    /// Enables or disables an alarm.
    pub fn set_alarm_enabled(&self, id: AlarmId, enabled: bool) -> StoreResult<()> {
        let changed = self.conn().execute(
            "UPDATE alarms SET enabled = ?1 WHERE id = ?2",
            params![enabled, id],
        )?;
        expect_row(changed, id)
    }

    /// Flips the enabled flag and returns the new value.
    pub fn toggle_alarm(&self, id: AlarmId) -> StoreResult<bool> {
        let conn = self.conn();
        let changed = conn.execute(
            "UPDATE alarms SET enabled = NOT enabled WHERE id = ?1",
            params![id],
        )?;
        expect_row(changed, id)?;
        let enabled = conn.query_row(
            "SELECT enabled FROM alarms WHERE id = ?1",
            params![id],
            |row| row.get(0),
        )?;
        Ok(enabled)
    }

    pub fn delete_alarm(&self, id: AlarmId) -> StoreResult<()> {
        let changed = self
            .conn()
            .execute("DELETE FROM alarms WHERE id = ?1", params![id])?;
        expect_row(changed, id)
    }
}

fn expect_row(changed: usize, id: AlarmId) -> StoreResult<()> {
    if changed == 0 {
        return Err(StoreError::AlarmNotFound(id));
    }
    Ok(())
}

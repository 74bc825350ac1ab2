//! Sleep history with a rolling retention window.

use chrono::{DateTime, Duration, Local};
use rusqlite::{OptionalExtension, params};
use tracing::debug;

use circadia_core::SleepSession;

use crate::Store;
use crate::error::{StoreError, StoreResult};

/// Sessions that started longer ago than this are pruned on insert.
pub const RETENTION_DAYS: i64 = 30;

type RawSession = (i64, i64, i64, u32);

impl Store {
    /// Persists a finished session and prunes expired rows.
    ///
    /// Rows whose start is older than `now - RETENTION_DAYS` are deleted,
    /// except the row inserted by this call.
    pub fn add_sleep_session(
        &self,
        start: DateTime<Local>,
        end: DateTime<Local>,
        snooze_count: u32,
        now: DateTime<Local>,
    ) -> StoreResult<i64> {
        let (start_ts, end_ts) = (start.timestamp(), end.timestamp());
        if end_ts <= start_ts {
            return Err(StoreError::InvalidSession {
                start: start_ts,
                end: end_ts,
            });
        }

        let mut conn = self.conn();
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO sleep_history (start_time, end_time, snooze_count) VALUES (?1, ?2, ?3)",
            params![start_ts, end_ts, snooze_count],
        )?;
        let id = tx.last_insert_rowid();

        let cutoff = (now - Duration::days(RETENTION_DAYS)).timestamp();
        let pruned = tx.execute(
            "DELETE FROM sleep_history WHERE start_time < ?1 AND id != ?2",
            params![cutoff, id],
        )?;
        tx.commit()?;

        if pruned > 0 {
            debug!(pruned, "Pruned expired sleep sessions");
        }
        Ok(id)
    }

    /// Sessions that started within the last `days` days, oldest first.
    pub fn history(&self, days: u32, now: DateTime<Local>) -> StoreResult<Vec<SleepSession>> {
        let cutoff = (now - Duration::days(i64::from(days))).timestamp();
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, start_time, end_time, snooze_count FROM sleep_history
             WHERE start_time >= ?1 ORDER BY start_time ASC",
        )?;
        let rows = stmt
            .query_map(params![cutoff], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
            })?
            .collect::<Result<Vec<RawSession>, _>>()?;

        rows.into_iter().map(to_session).collect()
    }

    /// The session that ended most recently.
    pub fn last_sleep_session(&self) -> StoreResult<Option<SleepSession>> {
        let row: Option<RawSession> = self
            .conn()
            .query_row(
                "SELECT id, start_time, end_time, snooze_count FROM sleep_history
                 ORDER BY end_time DESC LIMIT 1",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )
            .optional()?;
        row.map(to_session).transpose()
    }
}

fn to_session((id, start, end, snooze_count): RawSession) -> StoreResult<SleepSession> {
    Ok(SleepSession {
        id,
        start: from_timestamp(start)?,
        end: from_timestamp(end)?,
        snooze_count,
    })
}

fn from_timestamp(ts: i64) -> StoreResult<DateTime<Local>> {
    DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.with_timezone(&Local))
        .ok_or_else(|| StoreError::invalid_value("timestamp", ts.to_string()))
}

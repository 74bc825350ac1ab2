//! Sleep session state and the persistence gate.

use chrono::{DateTime, Duration, Local};
use tokio::task::JoinHandle;
use tracing::debug;

use circadia_core::{AlarmId, ClockTime};
use circadia_store::{Store, StoreResult};

/// Sessions at most this long are only kept when the user stopped an alarm.
pub const MIN_SESSION_MINUTES: i64 = 60;

/// Where the session state machine currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Idle,
    Sleeping,
    Ringing,
    /// Ringing, paused until the snooze timer fires.
    Snoozed,
}

/// The alarm that is currently sounding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActiveAlarm {
    /// `None` for a snooze re-ring.
    pub alarm_id: Option<AlarmId>,
    pub time: ClockTime,
}

/// In-memory part of the session. The start timestamp lives in the store.
#[derive(Debug, Default)]
pub(crate) struct SessionState {
    pub active: Option<ActiveAlarm>,
    pub snooze_count: u32,
    pub snooze_timer: Option<JoinHandle<()>>,
    /// Bumped whenever a snooze timer is armed or cancelled, so a timer that
    /// lost the race to a cancel does nothing when it fires.
    pub snooze_generation: u64,
    pub enforcer: Option<JoinHandle<()>>,
}

impl SessionState {
    pub fn phase(&self, sleeping: bool) -> SessionPhase {
        if self.active.is_some() {
            SessionPhase::Ringing
        } else if self.snooze_timer.is_some() {
            SessionPhase::Snoozed
        } else if sleeping {
            SessionPhase::Sleeping
        } else {
            SessionPhase::Idle
        }
    }

    /// Disarms any pending snooze re-ring.
    pub fn cancel_snooze(&mut self) {
        self.snooze_generation += 1;
        if let Some(timer) = self.snooze_timer.take() {
            timer.abort();
            debug!("Snooze timer cancelled");
        }
    }

    /// Arms a new snooze timer, replacing the previous one.
    ///
    /// Returns the generation the new timer must present when it fires.
    pub fn arm_snooze(&mut self, spawn: impl FnOnce(u64) -> JoinHandle<()>) -> u64 {
        self.cancel_snooze();
        let generation = self.snooze_generation;
        self.snooze_timer = Some(spawn(generation));
        generation
    }

    pub fn replace_enforcer(&mut self, enforcer: Option<JoinHandle<()>>) {
        if let Some(previous) = std::mem::replace(&mut self.enforcer, enforcer) {
            previous.abort();
        }
    }
}

/// Writes the session `[start, end]` to history if it qualifies.
///
/// Sessions with a non-positive duration are never written. Otherwise a
/// session is written when `bypass_gate` is set or when it lasted longer
/// than [`MIN_SESSION_MINUTES`]. Returns whether a row was written.
pub fn finalize_sleep_session(
    store: &Store,
    start: DateTime<Local>,
    end: DateTime<Local>,
    snooze_count: u32,
    bypass_gate: bool,
) -> StoreResult<bool> {
    let duration = end - start;
    if duration <= Duration::zero() {
        debug!(%start, %end, "Ignoring session with no duration");
        return Ok(false);
    }
    if !bypass_gate && duration <= Duration::minutes(MIN_SESSION_MINUTES) {
        debug!(minutes = duration.num_minutes(), "Session too short to keep");
        return Ok(false);
    }

    store.add_sleep_session(start, end, snooze_count, end)?;
    Ok(true)
}

//! Daemon events for the presentation layer.
//!
//! Observers subscribe once at startup and receive events in order on their
//! own receiver, never on the daemon's background tasks.

use tokio::sync::broadcast;
use tracing::trace;

use circadia_core::ClockTime;

/// Something the presentation layer may want to react to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DaemonEvent {
    /// An alarm or snooze re-ring started.
    AlarmTriggered(ClockTime),
    /// Sleep tracking turned on or off.
    SleepModeChanged(bool),
    /// A finished session was written to history.
    SleepSessionSaved,
    /// Smart wake-up turned on or off.
    SmartWakeUpToggled(bool),
}

/// Fan-out point for [`DaemonEvent`]s.
#[derive(Debug, Clone)]
pub struct EventHub {
    tx: broadcast::Sender<DaemonEvent>,
}

impl Default for EventHub {
    fn default() -> Self {
        let (tx, _) = broadcast::channel(64);
        Self { tx }
    }
}

impl EventHub {
    /// Registers an observer.
    pub fn subscribe(&self) -> broadcast::Receiver<DaemonEvent> {
        self.tx.subscribe()
    }

    /// Delivers `event` to every current observer.
    pub fn emit(&self, event: DaemonEvent) {
        if self.tx.send(event).is_err() {
            trace!(?event, "No event observers");
        }
    }
}

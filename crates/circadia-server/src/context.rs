//! The daemon context: one owned object every task works through.
//!
//! It holds the store, the audio subsystem, the bus publisher and the
//! in-memory session state, and implements the session transitions:
//!
//! ```text
//! Idle --sleep on--> Sleeping --alarm--> Ringing --stop--> Idle
//!                        ^                 |  ^
//!                        |              snooze |
//!                    sleep off             v  | timer
//!                                        Snoozed
//! ```

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Local};
use tokio::sync::{broadcast, watch};
use tracing::{debug, error, info, warn};

use circadia_core::{Alarm, Clock, ClockTime, DEFAULT_SNOOZE_MINUTES, Settings};
use circadia_protocol::BusMessage;
use circadia_store::Store;

use crate::audio::AudioAssurance;
use crate::bus::Publisher;
use crate::events::{DaemonEvent, EventHub};
use crate::session::{ActiveAlarm, SessionPhase, SessionState, finalize_sleep_session};

/// Shared state and behavior of the running daemon.
pub struct DaemonContext {
    store: Arc<Store>,
    audio: Arc<AudioAssurance>,
    publisher: Arc<dyn Publisher>,
    clock: Arc<dyn Clock>,
    events: EventHub,
    session: Mutex<SessionState>,
    ringing_tx: watch::Sender<bool>,
}

impl DaemonContext {
    pub fn new(
        store: Arc<Store>,
        audio: Arc<AudioAssurance>,
        publisher: Arc<dyn Publisher>,
        clock: Arc<dyn Clock>,
    ) -> Arc<Self> {
        let (ringing_tx, _) = watch::channel(false);
        Arc::new(Self {
            store,
            audio,
            publisher,
            clock,
            events: EventHub::default(),
            session: Mutex::new(SessionState::default()),
            ringing_tx,
        })
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn audio(&self) -> &Arc<AudioAssurance> {
        &self.audio
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    pub fn events(&self) -> &EventHub {
        &self.events
    }

    /// Registers a presentation-layer observer.
    pub fn subscribe(&self) -> broadcast::Receiver<DaemonEvent> {
        self.events.subscribe()
    }

    /// Current settings, with defaults substituted for unreadable values.
    pub fn settings(&self) -> Settings {
        self.store.load_settings()
    }

    fn session(&self) -> MutexGuard<'_, SessionState> {
        self.session.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn sleep_start(&self) -> Option<DateTime<Local>> {
        self.store.sleep_start().unwrap_or_else(|e| {
            warn!(error = %e, "Failed to read sleep start");
            None
        })
    }

    fn set_sleep_start(&self, start: Option<DateTime<Local>>) {
        if let Err(e) = self.store.set_sleep_start(start) {
            error!(error = %e, "Failed to store sleep start");
        }
    }

    pub fn is_sleep_mode_enabled(&self) -> bool {
        self.sleep_start().is_some()
    }

    /// True while an alarm sounds. Snoozed does not count.
    pub fn is_ringing(&self) -> bool {
        *self.ringing_tx.borrow()
    }

    pub fn phase(&self) -> SessionPhase {
        let sleeping = self.is_sleep_mode_enabled();
        self.session().phase(sleeping)
    }

    pub fn active_alarm(&self) -> Option<ActiveAlarm> {
        self.session().active
    }

    pub fn snooze_count(&self) -> u32 {
        self.session().snooze_count
    }

    /// User toggle of sleep tracking. Announces the change on the bus.
    pub async fn toggle_sleep_mode(&self, enabled: bool) {
        self.apply_sleep_mode(enabled);
        self.publish(BusMessage::SleepModeChanged(enabled)).await;
    }

    /// Moves the session to match `enabled` without publishing.
    ///
    /// Turning on starts a session if none runs. Turning off silences any
    /// alarm and finalizes the session through the duration gate. Returns
    /// whether anything changed.
    pub fn apply_sleep_mode(&self, enabled: bool) -> bool {
        let start = self.sleep_start();

        if enabled {
            if start.is_some() {
                return false;
            }
            let now = self.clock.now();
            self.set_sleep_start(Some(now));
            self.session().snooze_count = 0;
            info!(start = %now, "Sleep tracking started");
            return true;
        }

        let Some(start) = start else {
            return false;
        };
        let snooze_count = {
            let mut session = self.session();
            session.active = None;
            session.cancel_snooze();
            std::mem::take(&mut session.snooze_count)
        };
        self.silence();
        self.finalize(start, snooze_count, false);
        self.set_sleep_start(None);
        info!("Sleep tracking stopped");
        true
    }

    /// Starts ringing for `alarm` unless it is already the ringing alarm.
    ///
    /// A pending snooze is superseded by the new alarm.
    pub async fn trigger_alarm(self: &Arc<Self>, alarm: &Alarm) -> bool {
        let time = match alarm.time() {
            Ok(time) => time,
            Err(e) => {
                warn!(alarm_id = alarm.id, error = %e, "Ignoring alarm with invalid time");
                return false;
            }
        };

        {
            let mut session = self.session();
            if session
                .active
                .is_some_and(|active| active.alarm_id == Some(alarm.id))
            {
                debug!(alarm_id = alarm.id, "Alarm already ringing");
                return false;
            }
            session.cancel_snooze();
            session.active = Some(ActiveAlarm {
                alarm_id: Some(alarm.id),
                time,
            });
            self.ringing_tx.send_replace(true);
        }

        info!(alarm_id = alarm.id, time = %time, "Alarm triggered");
        self.ring(time).await;
        true
    }

    /// Starts audio and enforcement, then announces the alarm.
    ///
    /// The caller sets the marker and the ringing flag under the session
    /// lock. A stop or snooze that lands before playback starts wins.
    async fn ring(self: &Arc<Self>, time: ClockTime) {
        let custom = self.settings().alarm_audio_path;
        match self.audio.play_alarm(custom.as_deref()) {
            Ok(path) => debug!(path = %path.display(), "Alarm sound started"),
            Err(e) => error!(error = %e, "Failed to start alarm sound"),
        }

        {
            let mut session = self.session();
            if session.active.is_none() {
                drop(session);
                debug!("Alarm silenced before playback started");
                self.silence();
                return;
            }
            session.replace_enforcer(Some(self.spawn_enforcer()));
        }

        self.publish(BusMessage::AlarmTriggered(time)).await;
    }

    fn spawn_enforcer(&self) -> tokio::task::JoinHandle<()> {
        let audio = Arc::clone(&self.audio);
        let ringing = self.ringing_tx.subscribe();
        let delay = audio.config().enforce_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Err(e) = audio.enforce_sink(ringing).await {
                warn!(error = %e, "Sink enforcement unavailable");
            }
        })
    }

    /// Silences the ringing alarm and arms a re-ring.
    ///
    /// Ignored when snoozing is disabled or nothing rings.
    pub fn snooze_alarm(self: &Arc<Self>) -> bool {
        let settings = self.settings();
        if !settings.snooze_enabled {
            info!("Snooze is disabled, ignoring request");
            return false;
        }
        let minutes = if settings.snooze_minutes == 0 {
            DEFAULT_SNOOZE_MINUTES
        } else {
            settings.snooze_minutes
        };

        let count = {
            let mut session = self.session();
            if session.active.take().is_none() {
                debug!("Nothing ringing to snooze");
                return false;
            }
            session.snooze_count += 1;
            let this = Arc::clone(self);
            session.arm_snooze(move |generation| {
                tokio::spawn(async move {
                    tokio::time::sleep(Duration::from_secs(u64::from(minutes) * 60)).await;
                    this.ring_after_snooze(generation).await;
                })
            });
            session.snooze_count
        };

        self.silence();
        info!(minutes, snooze_count = count, "Alarm snoozed");
        true
    }

    async fn ring_after_snooze(self: &Arc<Self>, generation: u64) {
        let time = {
            let mut session = self.session();
            if session.snooze_generation != generation {
                debug!("Stale snooze timer fired, ignoring");
                return;
            }
            // Detach our own handle; the timer task is about to finish.
            session.snooze_timer = None;
            let time = ClockTime::of(&self.clock.now());
            session.active = Some(ActiveAlarm {
                alarm_id: None,
                time,
            });
            self.ringing_tx.send_replace(true);
            time
        };

        info!(time = %time, "Snooze over, ringing again");
        self.ring(time).await;
    }

    /// Explicit stop: silences the alarm and ends the sleep session.
    ///
    /// Stopping a ringing or snoozed alarm always saves the session. With
    /// nothing ringing the session goes through the duration gate, like a
    /// manual sleep-mode off. Returns false when there was nothing to stop.
    pub async fn stop_alarm(&self) -> bool {
        let (was_alarming, snooze_count) = {
            let mut session = self.session();
            let was = session.active.take().is_some() || session.snooze_timer.is_some();
            session.cancel_snooze();
            (was, std::mem::take(&mut session.snooze_count))
        };
        self.silence();

        let Some(start) = self.sleep_start() else {
            if was_alarming {
                info!("Alarm stopped");
            }
            return was_alarming;
        };

        self.finalize(start, snooze_count, was_alarming);
        self.set_sleep_start(None);
        info!(was_alarming, "Alarm stopped, sleep session ended");
        self.publish(BusMessage::SleepModeChanged(false)).await;
        true
    }

    /// Stops a preview. Leaves a ringing alarm alone.
    pub fn stop_sound(&self) {
        if self.is_ringing() {
            debug!("Not stopping sound while an alarm rings");
            return;
        }
        self.audio.stop();
    }

    /// Releases timers and the audio slot. The session itself survives in
    /// the store.
    pub fn shutdown(&self) {
        {
            let mut session = self.session();
            session.cancel_snooze();
            session.replace_enforcer(None);
        }
        self.silence();
        debug!("Daemon context shut down");
    }

    fn silence(&self) {
        self.ringing_tx.send_replace(false);
        self.audio.stop();
    }

    fn finalize(&self, start: DateTime<Local>, snooze_count: u32, bypass_gate: bool) -> bool {
        let end = self.clock.now();
        match finalize_sleep_session(&self.store, start, end, snooze_count, bypass_gate) {
            Ok(true) => {
                info!(%start, %end, snooze_count, "Sleep session saved");
                self.events.emit(DaemonEvent::SleepSessionSaved);
                true
            }
            Ok(false) => false,
            Err(e) => {
                error!(error = %e, "Failed to save sleep session");
                false
            }
        }
    }

    async fn publish(&self, message: BusMessage) {
        if let Err(e) = self.publisher.publish(message).await {
            warn!(message = %message, error = %e, "Failed to publish bus message");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::DaemonEvent;
    use crate::testing::{Harness, local};
    use chrono::Duration as ChronoDuration;

    fn alarm(id: i64, hour: u32, minute: u32) -> Alarm {
        Alarm {
            id,
            hour,
            minute,
            enabled: true,
        }
    }

    #[tokio::test]
    async fn sleep_on_records_start_and_publishes() {
        let h = Harness::at(local(10, 23, 30));
        h.ctx.toggle_sleep_mode(true).await;

        assert_eq!(h.ctx.store().sleep_start().unwrap(), Some(local(10, 23, 30)));
        assert_eq!(h.ctx.phase(), SessionPhase::Sleeping);
        assert_eq!(h.publisher.messages(), vec![BusMessage::SleepModeChanged(true)]);

        // Reconciling an already-sleeping session changes nothing.
        assert!(!h.ctx.apply_sleep_mode(true));
        assert_eq!(h.ctx.store().sleep_start().unwrap(), Some(local(10, 23, 30)));
    }

    #[tokio::test]
    async fn same_alarm_twice_rings_once() {
        let h = Harness::at(local(11, 7, 0));
        h.ctx.apply_sleep_mode(true);

        assert!(h.ctx.trigger_alarm(&alarm(1, 7, 0)).await);
        assert!(!h.ctx.trigger_alarm(&alarm(1, 7, 0)).await);

        assert_eq!(h.output.plays().len(), 1);
        let triggered: Vec<_> = h
            .publisher
            .messages()
            .into_iter()
            .filter(|m| matches!(m, BusMessage::AlarmTriggered(_)))
            .collect();
        assert_eq!(triggered.len(), 1);
        assert!(h.ctx.is_ringing());
    }

    #[tokio::test]
    async fn different_alarm_replaces_the_marker() {
        let h = Harness::at(local(11, 7, 0));
        assert!(h.ctx.trigger_alarm(&alarm(1, 7, 0)).await);
        assert!(h.ctx.trigger_alarm(&alarm(2, 7, 0)).await);
        assert_eq!(h.ctx.active_alarm().unwrap().alarm_id, Some(2));
        assert_eq!(h.output.plays().len(), 2);
    }

    #[tokio::test]
    async fn ringing_at_seven_publishes_short_time() {
        let h = Harness::at(local(10, 23, 30));
        h.ctx.apply_sleep_mode(true);
        h.clock.set(local(11, 7, 0));

        h.ctx.trigger_alarm(&alarm(1, 7, 0)).await;

        assert_eq!(h.ctx.phase(), SessionPhase::Ringing);
        assert_eq!(h.output.plays().len(), 1);
        assert!(h.output.plays()[0].1, "alarm sound loops");
        let last = h.publisher.messages().pop().unwrap();
        assert_eq!(last.to_string(), "alarmTriggered:7:00");
    }

    #[tokio::test]
    async fn stop_saves_session_and_clears_everything() {
        let h = Harness::at(local(10, 23, 30));
        let mut events = h.ctx.subscribe();
        h.ctx.apply_sleep_mode(true);
        h.clock.set(local(11, 7, 0));
        h.ctx.trigger_alarm(&alarm(1, 7, 0)).await;

        h.clock.set(local(11, 7, 5));
        assert!(h.ctx.stop_alarm().await);

        let session = h.ctx.store().last_sleep_session().unwrap().unwrap();
        assert_eq!(session.start, local(10, 23, 30));
        assert_eq!(session.end, local(11, 7, 5));
        assert_eq!(session.snooze_count, 0);

        assert!(h.ctx.active_alarm().is_none());
        assert!(!h.ctx.is_ringing());
        assert!(!h.ctx.is_sleep_mode_enabled());
        assert_eq!(h.ctx.phase(), SessionPhase::Idle);
        assert!(h.output.stops() >= 1);
        assert_eq!(events.recv().await.unwrap(), DaemonEvent::SleepSessionSaved);
        assert_eq!(
            h.publisher.messages().last(),
            Some(&BusMessage::SleepModeChanged(false))
        );
    }

    #[tokio::test]
    async fn explicit_stop_saves_even_short_sessions() {
        let h = Harness::at(local(11, 6, 40));
        h.ctx.apply_sleep_mode(true);
        h.clock.set(local(11, 7, 0));
        h.ctx.trigger_alarm(&alarm(1, 7, 0)).await;
        h.ctx.stop_alarm().await;

        assert!(h.ctx.store().last_sleep_session().unwrap().is_some());
    }

    #[tokio::test]
    async fn manual_sleep_off_uses_the_gate() {
        let h = Harness::at(local(11, 1, 0));
        let mut events = h.ctx.subscribe();
        h.ctx.apply_sleep_mode(true);

        h.clock.set(local(11, 1, 45));
        h.ctx.toggle_sleep_mode(false).await;
        assert!(h.ctx.store().last_sleep_session().unwrap().is_none());
        assert!(!h.ctx.is_sleep_mode_enabled());
        assert!(events.try_recv().is_err());

        h.ctx.apply_sleep_mode(true);
        h.clock.advance(ChronoDuration::hours(2));
        assert!(h.ctx.apply_sleep_mode(false));
        assert!(h.ctx.store().last_sleep_session().unwrap().is_some());
        assert_eq!(events.recv().await.unwrap(), DaemonEvent::SleepSessionSaved);
    }

    #[tokio::test]
    async fn stop_while_only_sleeping_uses_the_gate() {
        let h = Harness::at(local(11, 1, 0));
        let mut events = h.ctx.subscribe();
        h.ctx.apply_sleep_mode(true);

        h.clock.set(local(11, 1, 15));
        assert!(h.ctx.stop_alarm().await);

        assert!(h.ctx.store().last_sleep_session().unwrap().is_none());
        assert_eq!(h.ctx.store().sleep_start().unwrap(), None);
        assert_eq!(h.ctx.phase(), SessionPhase::Idle);
        assert!(events.try_recv().is_err());
        assert_eq!(
            h.publisher.messages().last(),
            Some(&BusMessage::SleepModeChanged(false))
        );

        // A long enough night still gets saved without an alarm.
        h.ctx.apply_sleep_mode(true);
        h.clock.advance(ChronoDuration::hours(3));
        assert!(h.ctx.stop_alarm().await);
        assert!(h.ctx.store().last_sleep_session().unwrap().is_some());
    }

    #[tokio::test]
    async fn stop_with_nothing_going_on() {
        let h = Harness::at(local(11, 12, 0));
        assert!(!h.ctx.stop_alarm().await);
        assert!(h.publisher.messages().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn snooze_counts_and_rerings_after_the_delay() {
        let h = Harness::at(local(10, 23, 30));
        h.ctx.store().set_snooze_duration(10).unwrap();
        h.ctx.apply_sleep_mode(true);
        h.clock.set(local(11, 7, 0));
        h.ctx.trigger_alarm(&alarm(1, 7, 0)).await;

        assert!(h.ctx.snooze_alarm());
        assert_eq!(h.ctx.snooze_count(), 1);
        assert_eq!(h.ctx.phase(), SessionPhase::Snoozed);
        assert!(!h.ctx.is_ringing());
        assert_eq!(h.ctx.store().sleep_start().unwrap(), Some(local(10, 23, 30)));

        h.clock.set(local(11, 7, 10));
        tokio::time::sleep(Duration::from_secs(10 * 60 + 1)).await;

        assert_eq!(h.ctx.phase(), SessionPhase::Ringing);
        let active = h.ctx.active_alarm().unwrap();
        assert_eq!(active.alarm_id, None);
        assert_eq!(active.time, ClockTime::new(7, 10).unwrap());
        assert_eq!(h.output.plays().len(), 2);
        assert_eq!(
            h.publisher.messages().last(),
            Some(&BusMessage::AlarmTriggered(ClockTime::new(7, 10).unwrap()))
        );

        // Snoozing the re-ring counts again; stopping keeps the total.
        assert!(h.ctx.snooze_alarm());
        assert_eq!(h.ctx.snooze_count(), 2);
        h.ctx.stop_alarm().await;
        assert_eq!(
            h.ctx.store().last_sleep_session().unwrap().unwrap().snooze_count,
            2
        );
    }

    #[tokio::test(start_paused = true)]
    async fn stop_cancels_pending_snooze() {
        let h = Harness::at(local(11, 7, 0));
        h.ctx.trigger_alarm(&alarm(1, 7, 0)).await;
        h.ctx.snooze_alarm();
        h.ctx.stop_alarm().await;

        tokio::time::sleep(Duration::from_secs(16 * 60)).await;
        assert_eq!(h.output.plays().len(), 1);
        assert_eq!(h.ctx.phase(), SessionPhase::Idle);
    }

    #[tokio::test]
    async fn snooze_disabled_is_ignored() {
        let h = Harness::at(local(11, 7, 0));
        h.ctx.store().set_snooze_enabled(false).unwrap();
        h.ctx.trigger_alarm(&alarm(1, 7, 0)).await;

        assert!(!h.ctx.snooze_alarm());
        assert!(h.ctx.is_ringing());
        assert_eq!(h.ctx.snooze_count(), 0);
    }

    #[tokio::test]
    async fn publish_failure_does_not_block_ringing() {
        let h = Harness::at(local(11, 7, 0));
        h.publisher.fail(true);
        assert!(h.ctx.trigger_alarm(&alarm(3, 7, 0)).await);
        assert!(h.ctx.is_ringing());
    }

    #[tokio::test]
    async fn stop_sound_spares_a_ringing_alarm() {
        let h = Harness::at(local(11, 7, 0));
        h.ctx.trigger_alarm(&alarm(1, 7, 0)).await;
        let stops = h.output.stops();
        h.ctx.stop_sound();
        assert_eq!(h.output.stops(), stops);
    }

    #[tokio::test]
    async fn stop_before_playback_keeps_the_alarm_quiet() {
        let h = Harness::at(local(11, 7, 0));
        // The marker is already gone when playback starts, as after a
        // stop racing the trigger.
        h.ctx.ring(ClockTime::new(7, 0).unwrap()).await;

        assert!(!h.ctx.is_ringing());
        assert_eq!(h.ctx.phase(), SessionPhase::Idle);
        assert!(h.output.stops() >= 1);
        assert!(h.publisher.messages().is_empty());
    }

    #[tokio::test]
    async fn ringing_flag_is_set_with_the_marker() {
        let h = Harness::at(local(11, 7, 0));
        let mut ringing = h.ctx.ringing_tx.subscribe();
        h.ctx.trigger_alarm(&alarm(1, 7, 0)).await;
        assert!(*ringing.borrow_and_update());

        h.ctx.stop_alarm().await;
        assert!(!*ringing.borrow_and_update());
    }
}

//! Periodic alarm scheduler.
//!
//! One tick evaluates, in this order:
//! 1. bedtime reminders (30 minutes before, and at bedtime)
//! 2. audio preload for an alarm coming up soon
//! 3. the 60 second re-trigger debounce
//! 4. exact hour:minute alarm matches
//! 5. smart wake-up inside the lookahead window
//!
//! Ticks run on a single task, so the dedup state below has one writer.
//! The interval is 30 seconds, or 29 minutes with smart wake-up on.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local};
use tokio::sync::{mpsc, watch};
use tokio::time::{Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use circadia_core::{
    Alarm, AlarmId, ClockTime, DEFAULT_BEDTIME, next_occurrence, resolve_local, within_window,
};

use crate::context::DaemonContext;
use crate::notify::{BedtimeNotifier, BedtimeReminder};
use crate::session::SessionPhase;

/// Scheduler configuration.
///
/// Tick periods are monotonic durations; the windows are wall-clock spans.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Tick period with smart wake-up off.
    pub interval: Duration,
    /// Tick period with smart wake-up on.
    pub smart_interval: Duration,
    /// Minimum spacing between two exact-match triggers.
    pub alarm_debounce: chrono::Duration,
    /// How far ahead smart wake-up may ring.
    pub smart_lookahead: chrono::Duration,
    /// Preload lead time with smart wake-up off.
    pub preload_window: chrono::Duration,
    /// Preload lead time with smart wake-up on.
    pub smart_preload_window: chrono::Duration,
    /// Width of the window in which a bedtime reminder counts as due.
    pub notification_window: chrono::Duration,
    /// Lead time of the wind-down reminder.
    pub wind_down_lead: chrono::Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
            smart_interval: Duration::from_secs(29 * 60),
            alarm_debounce: chrono::Duration::seconds(60),
            smart_lookahead: chrono::Duration::minutes(30),
            preload_window: chrono::Duration::minutes(5),
            smart_preload_window: chrono::Duration::minutes(35),
            notification_window: chrono::Duration::minutes(1),
            wind_down_lead: chrono::Duration::minutes(30),
        }
    }
}

impl SchedulerConfig {
    /// Builder: set both tick periods.
    pub fn with_intervals(mut self, normal: Duration, smart: Duration) -> Self {
        self.interval = normal;
        self.smart_interval = smart;
        self
    }

    pub fn period(&self, smart_wake_up: bool) -> Duration {
        if smart_wake_up {
            self.smart_interval
        } else {
            self.interval
        }
    }

    pub fn preload_window(&self, smart_wake_up: bool) -> chrono::Duration {
        if smart_wake_up {
            self.smart_preload_window
        } else {
            self.preload_window
        }
    }
}

/// Commands that can be sent to the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerCommand {
    /// Re-read the smart wake-up setting and rebuild the timer.
    Restart,
    /// Forget which bedtime reminder fired last.
    ResetNotifications,
    /// Run a tick now.
    TickNow,
    /// Stop the scheduler.
    Stop,
}

/// Why a tick started ringing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Exact(AlarmId),
    SmartWake(AlarmId),
}

/// What one tick did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TickReport {
    pub reminders: Vec<BedtimeReminder>,
    pub preload_started: bool,
    pub debounced: bool,
    pub trigger: Option<Trigger>,
}

#[derive(Debug, Default)]
struct TickState {
    /// `<kind>:<bedtime>` of the reminder delivered last.
    last_notified: Option<String>,
    last_triggered: Option<DateTime<Local>>,
}

/// Drives alarm evaluation for a [`DaemonContext`].
pub struct Scheduler {
    config: SchedulerConfig,
    ctx: Arc<DaemonContext>,
    notifier: Arc<dyn BedtimeNotifier>,
    state: TickState,
    command_tx: mpsc::Sender<SchedulerCommand>,
    command_rx: Option<mpsc::Receiver<SchedulerCommand>>,
    ticks_tx: watch::Sender<u64>,
}

impl Scheduler {
    pub fn new(
        config: SchedulerConfig,
        ctx: Arc<DaemonContext>,
        notifier: Arc<dyn BedtimeNotifier>,
    ) -> Self {
        let (command_tx, command_rx) = mpsc::channel(16);
        let (ticks_tx, _) = watch::channel(0);
        Self {
            config,
            ctx,
            notifier,
            state: TickState::default(),
            command_tx,
            command_rx: Some(command_rx),
            ticks_tx,
        }
    }

    /// Returns a handle for sending commands to the scheduler.
    pub fn handle(&self) -> SchedulerHandle {
        SchedulerHandle {
            command_tx: self.command_tx.clone(),
            ticks: self.ticks_tx.subscribe(),
        }
    }

    fn smart_wake_up(&self) -> bool {
        self.ctx.store().smart_wake_up().unwrap_or_else(|e| {
            warn!(error = %e, "Failed to read smart wake-up setting");
            false
        })
    }

    fn ticker(&self, period: Duration) -> Interval {
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker
    }

    /// Runs until a [`SchedulerCommand::Stop`] arrives.
    ///
    /// A restart swaps the timer between two ticks of this loop, so no tick
    /// ever runs against a half-replaced timer.
    pub async fn run(mut self) {
        let Some(mut command_rx) = self.command_rx.take() else {
            warn!("Scheduler already ran");
            return;
        };

        let mut period = self.config.period(self.smart_wake_up());
        info!(interval_secs = period.as_secs(), "Scheduler started");

        self.run_tick().await;
        let mut ticker = self.ticker(period);

        loop {
            tokio::select! {
                _ = ticker.tick() => self.run_tick().await,
                cmd = command_rx.recv() => match cmd {
                    Some(SchedulerCommand::Restart) => {
                        period = self.config.period(self.smart_wake_up());
                        ticker = self.ticker(period);
                        info!(interval_secs = period.as_secs(), "Scheduler restarted");
                    }
                    Some(SchedulerCommand::ResetNotifications) => {
                        debug!("Bedtime reminder dedup reset");
                        self.state.last_notified = None;
                    }
                    Some(SchedulerCommand::TickNow) => self.run_tick().await,
                    Some(SchedulerCommand::Stop) | None => {
                        info!("Scheduler stopping");
                        break;
                    }
                }
            }
        }
    }

    async fn run_tick(&mut self) {
        let now = self.ctx.clock().now();
        let report = self.tick(now).await;
        self.ticks_tx.send_modify(|count| *count += 1);
        debug!(now = %now, ?report, "Tick");
    }

    /// Evaluates everything due at `now`.
    pub async fn tick(&mut self, now: DateTime<Local>) -> TickReport {
        let mut report = TickReport {
            reminders: self.check_bedtime(now),
            ..TickReport::default()
        };

        let smart = self.smart_wake_up();
        let alarms = self.ctx.store().enabled_alarms().unwrap_or_else(|e| {
            warn!(error = %e, "Failed to load alarms");
            Vec::new()
        });
        let alarms: Vec<(Alarm, ClockTime)> = alarms
            .into_iter()
            .filter_map(|alarm| match alarm.time() {
                Ok(time) => Some((alarm, time)),
                Err(e) => {
                    warn!(alarm_id = alarm.id, error = %e, "Skipping alarm with invalid time");
                    None
                }
            })
            .collect();

        report.preload_started = self.check_preload(now, smart, &alarms);

        report.debounced = self
            .state
            .last_triggered
            .is_some_and(|last| now - last < self.config.alarm_debounce);

        if !report.debounced
            && let Some((alarm, _)) = alarms.iter().find(|(_, time)| time.matches(&now))
        {
            self.state.last_triggered = Some(now);
            self.ctx.trigger_alarm(alarm).await;
            report.trigger = Some(Trigger::Exact(alarm.id));
            return report;
        }

        if smart && self.ctx.phase() == SessionPhase::Sleeping {
            let lookahead = self.config.smart_lookahead;
            let due = alarms.iter().find(|(_, time)| {
                let until = next_occurrence(&now, *time) - now;
                until > chrono::Duration::zero() && until <= lookahead
            });
            if let Some((alarm, time)) = due {
                info!(alarm_id = alarm.id, alarm_time = %time, "Smart wake-up");
                self.ctx.trigger_alarm(alarm).await;
                report.trigger = Some(Trigger::SmartWake(alarm.id));
            }
        }

        report
    }

    fn check_bedtime(&mut self, now: DateTime<Local>) -> Vec<BedtimeReminder> {
        let store = self.ctx.store();
        let enabled = store.notify_bedtime().unwrap_or_else(|e| {
            warn!(error = %e, "Failed to read bedtime notification setting");
            true
        });
        if !enabled {
            return Vec::new();
        }

        let raw = store.bedtime().unwrap_or_else(|e| {
            warn!(error = %e, "Failed to read bedtime");
            DEFAULT_BEDTIME.to_string()
        });
        let bedtime: ClockTime = match raw.parse() {
            Ok(bedtime) => bedtime,
            Err(e) => {
                warn!(bedtime = %raw, error = %e, "Invalid bedtime setting");
                return Vec::new();
            }
        };

        // Tomorrow's occurrence covers a wind-down that starts before midnight.
        let today = now.date_naive();
        let occurrences: Vec<DateTime<Local>> = [Some(today), today.succ_opt()]
            .into_iter()
            .flatten()
            .map(|date| resolve_local(date, bedtime))
            .collect();

        let mut sent = Vec::new();
        for (reminder, lead) in [
            (BedtimeReminder::WindDown, self.config.wind_down_lead),
            (BedtimeReminder::Bedtime, chrono::Duration::zero()),
        ] {
            let key = format!("{}:{}", reminder.key_prefix(), raw);
            if self.state.last_notified.as_deref() == Some(key.as_str()) {
                continue;
            }
            let due = occurrences
                .iter()
                .any(|at| within_window(&now, &(*at - lead), self.config.notification_window));
            if !due {
                continue;
            }
            match self.notifier.notify(reminder, bedtime) {
                Ok(()) => {
                    self.state.last_notified = Some(key);
                    sent.push(reminder);
                }
                Err(e) => warn!(?reminder, error = %e, "Bedtime notification failed"),
            }
        }
        sent
    }

    fn check_preload(&self, now: DateTime<Local>, smart: bool, alarms: &[(Alarm, ClockTime)]) -> bool {
        let window = self.config.preload_window(smart);
        let upcoming = alarms.iter().find(|(_, time)| {
            let until = next_occurrence(&now, *time) - now;
            until > chrono::Duration::zero() && until <= window
        });

        let Some((alarm, _)) = upcoming else {
            return false;
        };
        let audio = self.ctx.audio();
        if !audio.preload_due(now, window) {
            return false;
        }
        debug!(alarm_id = alarm.id, window_mins = window.num_minutes(), "Preloading audio");
        audio.start_preload()
    }
}

/// Handle for sending commands to a running scheduler.
#[derive(Clone, Debug)]
pub struct SchedulerHandle {
    command_tx: mpsc::Sender<SchedulerCommand>,
    ticks: watch::Receiver<u64>,
}

impl SchedulerHandle {
    /// Number of ticks the loop has run so far.
    pub fn ticks(&self) -> watch::Receiver<u64> {
        self.ticks.clone()
    }

    /// Rebuilds the timer with the current smart wake-up interval.
    pub async fn restart(&self) -> Result<(), mpsc::error::SendError<SchedulerCommand>> {
        self.command_tx.send(SchedulerCommand::Restart).await
    }

    /// Re-arms both bedtime reminders.
    pub async fn reset_notifications(
        &self,
    ) -> Result<(), mpsc::error::SendError<SchedulerCommand>> {
        self.command_tx
            .send(SchedulerCommand::ResetNotifications)
            .await
    }

    /// Runs a tick immediately.
    pub async fn tick_now(&self) -> Result<(), mpsc::error::SendError<SchedulerCommand>> {
        self.command_tx.send(SchedulerCommand::TickNow).await
    }

    /// Stops the scheduler.
    pub async fn stop(&self) -> Result<(), mpsc::error::SendError<SchedulerCommand>> {
        self.command_tx.send(SchedulerCommand::Stop).await
    }
}

//! Routes inbound bus messages to the daemon.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tracing::{debug, info, warn};

use circadia_protocol::BusMessage;

use crate::context::DaemonContext;
use crate::error::ServerResult;
use crate::events::DaemonEvent;
use crate::scheduler::SchedulerHandle;
use crate::socket::Connection;

/// Applies bus messages to the context and the scheduler.
pub struct BusDispatcher {
    ctx: Arc<DaemonContext>,
    scheduler: SchedulerHandle,
}

impl BusDispatcher {
    pub fn new(ctx: Arc<DaemonContext>, scheduler: SchedulerHandle) -> Self {
        Self { ctx, scheduler }
    }

    /// Reads one message from `conn` and dispatches it.
    pub async fn handle_connection(&self, mut conn: Connection) -> ServerResult<()> {
        match conn.read_message().await? {
            Some(message) => self.dispatch(message).await,
            None => debug!("Bus connection closed without a message"),
        }
        Ok(())
    }

    pub async fn dispatch(&self, message: BusMessage) {
        debug!(message = %message, "Bus message received");

        match message {
            BusMessage::BedtimeChanged => {
                if self.scheduler.reset_notifications().await.is_err() {
                    warn!("Scheduler not running, bedtime reminders not re-armed");
                }
            }
            BusMessage::BedtimeNotificationsChanged => {
                info!("Bedtime notification setting changed");
            }
            BusMessage::AlarmTriggered(time) => {
                self.ctx.events().emit(DaemonEvent::AlarmTriggered(time));
            }
            BusMessage::SleepModeChanged(enabled) => {
                if self.ctx.apply_sleep_mode(enabled) {
                    info!(enabled, "Sleep mode reconciled from bus");
                }
                self.ctx.events().emit(DaemonEvent::SleepModeChanged(enabled));
            }
            BusMessage::SmartWakeUpToggled(enabled) => {
                if self.scheduler.restart().await.is_err() {
                    warn!("Scheduler not running, interval not updated");
                }
                self.ctx
                    .events()
                    .emit(DaemonEvent::SmartWakeUpToggled(enabled));
            }
            BusMessage::StopAlarm => {
                self.ctx.stop_alarm().await;
            }
            BusMessage::SnoozeAlarm => {
                self.ctx.snooze_alarm();
            }
        }
    }
}

/// Creates a connection handler for [`SocketServer::run`](crate::SocketServer::run).
///
/// Malformed messages are logged and dropped; the listener keeps going.
pub fn make_connection_handler(
    dispatcher: Arc<BusDispatcher>,
) -> impl Fn(Connection) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync + 'static {
    move |conn| {
        let dispatcher = dispatcher.clone();
        Box::pin(async move {
            if let Err(e) = dispatcher.handle_connection(conn).await {
                warn!(error = %e, "Dropped bus message");
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use circadia_core::ClockTime;
    use tempfile::tempdir;
    use tokio::io::AsyncWriteExt;
    use tokio::net::UnixStream;

    use crate::bus::SocketPublisher;
    use crate::config::ServerConfig;
    use crate::scheduler::{Scheduler, SchedulerConfig};
    use crate::socket::SocketServer;
    use crate::testing::{Harness, RecordingNotifier, local};

    fn dispatcher(h: &Harness) -> (Arc<BusDispatcher>, Scheduler) {
        let scheduler = Scheduler::new(
            SchedulerConfig::default(),
            h.ctx.clone(),
            Arc::new(RecordingNotifier::default()),
        );
        let dispatcher = Arc::new(BusDispatcher::new(h.ctx.clone(), scheduler.handle()));
        (dispatcher, scheduler)
    }

    #[tokio::test]
    async fn sleep_mode_message_reconciles_and_notifies() {
        let h = Harness::at(local(10, 23, 30));
        let (dispatcher, _scheduler) = dispatcher(&h);
        let mut events = h.ctx.subscribe();

        dispatcher.dispatch(BusMessage::SleepModeChanged(true)).await;

        assert!(h.ctx.is_sleep_mode_enabled());
        assert_eq!(events.recv().await.unwrap(), DaemonEvent::SleepModeChanged(true));
        // Reconciling does not echo back onto the bus.
        assert!(h.publisher.messages().is_empty());
    }

    #[tokio::test]
    async fn alarm_triggered_is_forwarded_to_observers() {
        let h = Harness::at(local(11, 7, 0));
        let (dispatcher, _scheduler) = dispatcher(&h);
        let mut events = h.ctx.subscribe();

        let seven = ClockTime::new(7, 0).unwrap();
        dispatcher.dispatch(BusMessage::AlarmTriggered(seven)).await;
        assert_eq!(events.recv().await.unwrap(), DaemonEvent::AlarmTriggered(seven));
    }

    #[tokio::test]
    async fn control_messages_drive_the_session() {
        let h = Harness::at(local(11, 7, 0));
        let (dispatcher, _scheduler) = dispatcher(&h);
        let alarm = circadia_core::Alarm {
            id: 4,
            hour: 7,
            minute: 0,
            enabled: true,
        };

        h.ctx.trigger_alarm(&alarm).await;
        dispatcher.dispatch(BusMessage::SnoozeAlarm).await;
        assert_eq!(h.ctx.snooze_count(), 1);

        dispatcher.dispatch(BusMessage::StopAlarm).await;
        assert!(!h.ctx.is_ringing());
        assert!(h.ctx.active_alarm().is_none());
    }

    #[tokio::test]
    async fn messages_without_scheduler_are_harmless() {
        let h = Harness::at(local(11, 7, 0));
        let (dispatcher, scheduler) = dispatcher(&h);
        drop(scheduler);

        dispatcher.dispatch(BusMessage::BedtimeChanged).await;
        dispatcher.dispatch(BusMessage::SmartWakeUpToggled(true)).await;
        dispatcher.dispatch(BusMessage::BedtimeNotificationsChanged).await;
    }

    #[tokio::test]
    async fn listener_survives_malformed_messages() {
        let h = Harness::at(local(10, 23, 30));
        let (dispatcher, _scheduler) = dispatcher(&h);
        let dir = tempdir().unwrap();
        let socket_path = dir.path().join("bus.sock");
        let server = SocketServer::new(ServerConfig::new(&socket_path)).await.unwrap();
        let mut events = h.ctx.subscribe();

        let serve = tokio::spawn(async move {
            let _ = server.run(make_connection_handler(dispatcher)).await;
        });

        for garbage in [&b"sleepModeChanged:maybe\n"[..], b"teleport\n", b"\n"] {
            let mut stream = UnixStream::connect(&socket_path).await.unwrap();
            stream.write_all(garbage).await.unwrap();
            stream.shutdown().await.unwrap();
        }
        SocketPublisher::new(&socket_path)
            .send(BusMessage::SleepModeChanged(true))
            .await
            .unwrap();

        let event = tokio::time::timeout(Duration::from_secs(2), events.recv()).await;
        assert_eq!(event.unwrap().unwrap(), DaemonEvent::SleepModeChanged(true));
        assert!(h.ctx.is_sleep_mode_enabled());
        serve.abort();
    }
}

//! Daemon command: runs the daemon in the foreground.
//!
//! The CLI is the presentation layer here: it subscribes to daemon events
//! before the daemon starts and logs them as they arrive.

use tokio::sync::broadcast;
use tracing::{info, warn};

use circadia_server::{Daemon, DaemonEvent};

use crate::config::ClientConfig;
use crate::error::ClientResult;

/// Starts the daemon and blocks until SIGINT or SIGTERM.
pub async fn run(config: &ClientConfig) -> ClientResult<()> {
    let daemon_config = config.daemon_config();
    info!(
        socket = %daemon_config.server.socket_path.display(),
        database = %daemon_config.database_path.display(),
        "Starting daemon"
    );

    let daemon = Daemon::bind(daemon_config).await?;
    let observer = tokio::spawn(log_events(daemon.subscribe()));

    let result = daemon.run().await;
    observer.abort();
    Ok(result?)
}

async fn log_events(mut events: broadcast::Receiver<DaemonEvent>) {
    loop {
        match events.recv().await {
            Ok(event) => info!("{}", describe(event)),
            Err(broadcast::error::RecvError::Lagged(missed)) => {
                warn!(missed, "Event observer fell behind");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

fn describe(event: DaemonEvent) -> String {
    match event {
        DaemonEvent::AlarmTriggered(time) => format!("Alarm ringing ({})", time),
        DaemonEvent::SleepModeChanged(true) => "Sleep tracking started".to_string(),
        DaemonEvent::SleepModeChanged(false) => "Sleep tracking ended".to_string(),
        DaemonEvent::SleepSessionSaved => "Sleep session saved".to_string(),
        DaemonEvent::SmartWakeUpToggled(enabled) => {
            format!("Smart wake-up {}", if enabled { "on" } else { "off" })
        }
    }
}

//! Bus commands: publish a message and return.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use circadia_protocol::BusMessage;
use circadia_server::{Publisher, SocketPublisher};

use crate::error::{ClientError, ClientResult};

/// Publishes bus messages to the daemon.
pub struct BusClient {
    socket_path: PathBuf,
    publisher: Arc<dyn Publisher>,
}

impl BusClient {
    pub fn new(socket_path: impl Into<PathBuf>) -> Self {
        let socket_path = socket_path.into();
        let publisher = Arc::new(SocketPublisher::new(&socket_path));
        Self {
            socket_path,
            publisher,
        }
    }

    /// Uses `publisher` instead of the socket.
    pub fn with_publisher(socket_path: impl Into<PathBuf>, publisher: Arc<dyn Publisher>) -> Self {
        Self {
            socket_path: socket_path.into(),
            publisher,
        }
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Sends `message`, failing when no daemon listens.
    pub async fn send(&self, message: BusMessage) -> ClientResult<()> {
        debug!(message = %message, socket = %self.socket_path.display(), "Publishing");
        self.publisher
            .publish(message)
            .await
            .map_err(|e| ClientError::unreachable(&self.socket_path, e))
    }
}

/// Starts or ends sleep tracking.
pub async fn sleep(bus: &BusClient, enabled: bool) -> ClientResult<()> {
    bus.send(BusMessage::SleepModeChanged(enabled)).await?;
    println!("Sleep mode {}.", if enabled { "on" } else { "off" });
    Ok(())
}

/// Stops the ringing alarm.
pub async fn stop(bus: &BusClient) -> ClientResult<()> {
    bus.send(BusMessage::StopAlarm).await
}

/// Snoozes the ringing alarm.
pub async fn snooze(bus: &BusClient) -> ClientResult<()> {
    bus.send(BusMessage::SnoozeAlarm).await
}

/// Parses and sends a raw `kind[:payload]` line.
pub async fn send_raw(bus: &BusClient, raw: &str) -> ClientResult<BusMessage> {
    let message: BusMessage = raw.parse()?;
    bus.send(message).await?;
    Ok(message)
}

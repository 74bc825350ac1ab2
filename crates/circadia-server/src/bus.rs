//! Publishing side of the event bus.
//!
//! Publishing is fire-and-forget: open the socket, write one line, close.
//! Nothing is queued or retried when the listener is absent.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::UnixStream;
use tracing::debug;

use circadia_protocol::{BusMessage, ProtocolError, encode_line};

use crate::error::{ServerError, ServerResult};

/// A boxed future, used for async methods on trait objects.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Something that can put a message on the bus.
pub trait Publisher: Send + Sync {
    /// Sends `message`. Fails only when the transport is unavailable.
    fn publish(&self, message: BusMessage) -> BoxFuture<'_, ServerResult<()>>;
}

/// Publishes by connecting to the daemon's socket.
#[derive(Debug, Clone)]
pub struct SocketPublisher {
    socket_path: PathBuf,
    timeout: Duration,
}

impl SocketPublisher {
    pub fn new(socket_path: impl Into<PathBuf>) -> Self {
        Self {
            socket_path: socket_path.into(),
            timeout: Duration::from_secs(2),
        }
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Connects, writes one line and closes.
    pub async fn send(&self, message: BusMessage) -> ServerResult<()> {
        let line = encode_line(&message)?;

        let deliver = async {
            let mut stream = UnixStream::connect(&self.socket_path).await?;
            stream.write_all(&line).await?;
            stream.shutdown().await?;
            Ok::<_, std::io::Error>(())
        };

        match tokio::time::timeout(self.timeout, deliver).await {
            Ok(Ok(())) => {
                debug!(message = %message, "Published bus message");
                Ok(())
            }
            Ok(Err(e)) => Err(ServerError::Io(e)),
            Err(_) => Err(ServerError::Protocol(ProtocolError::Timeout {
                operation: format!("publish {}", message.kind()),
            })),
        }
    }
}

impl Publisher for SocketPublisher {
    fn publish(&self, message: BusMessage) -> BoxFuture<'_, ServerResult<()>> {
        Box::pin(self.send(message))
    }
}

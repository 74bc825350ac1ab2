//! Daemon: scheduler, sleep session, event bus, audio assurance.
//!
//! This crate provides the circadia daemon that handles:
//! - Unix socket event bus (listener and publisher)
//! - Periodic alarm, smart wake-up and bedtime reminder evaluation
//! - The sleep session state machine and its persistence gate
//! - Alarm playback with output warm-up and sink enforcement
//!
//! # Example
//!
//! ```rust,no_run
//! use circadia_server::{Daemon, DaemonConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let daemon = Daemon::bind(DaemonConfig::default()).await?;
//!     let mut events = daemon.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("{event:?}");
//!         }
//!     });
//!     daemon.run().await?;
//!     Ok(())
//! }
//! ```

pub mod audio;
mod bus;
mod config;
mod context;
mod daemon;
mod dispatch;
mod error;
mod events;
mod notify;
mod scheduler;
mod session;
mod signals;
mod socket;
#[cfg(test)]
mod testing;

pub use audio::{AudioAssurance, AudioConfig, PreparedOutput, default_sound_paths};
pub use bus::{BoxFuture, Publisher, SocketPublisher};
pub use config::{DaemonConfig, ServerConfig, default_database_path, default_socket_path};
pub use context::DaemonContext;
pub use daemon::Daemon;
pub use dispatch::{BusDispatcher, make_connection_handler};
pub use error::{AudioError, AudioResult, ServerError, ServerResult};
pub use events::{DaemonEvent, EventHub};
pub use notify::{BedtimeNotifier, BedtimeReminder, DesktopNotifier};
pub use scheduler::{
    Scheduler, SchedulerCommand, SchedulerConfig, SchedulerHandle, TickReport, Trigger,
};
pub use session::{ActiveAlarm, MIN_SESSION_MINUTES, SessionPhase, finalize_sleep_session};
pub use signals::{ReloadListener, ShutdownHandle, ShutdownSignal, SignalHandler};
pub use socket::{Connection, SocketServer};

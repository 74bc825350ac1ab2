//! Daemon configuration.

use std::path::PathBuf;
use std::time::Duration;

use crate::audio::AudioConfig;
use crate::scheduler::SchedulerConfig;

/// Event bus listener configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Path to the Unix socket.
    pub socket_path: PathBuf,

    /// How long a sender may take to deliver its line.
    pub connection_timeout: Duration,

    /// Maximum concurrent connections.
    pub max_connections: usize,

    /// Whether to remove a stale socket on startup.
    pub cleanup_stale_socket: bool,

    /// Whether to create the socket's parent directory (mode 0700).
    pub create_parent_dir: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            socket_path: default_socket_path(),
            connection_timeout: Duration::from_secs(5),
            max_connections: 32,
            cleanup_stale_socket: true,
            create_parent_dir: true,
        }
    }
}

impl ServerConfig {
    /// Creates a new server configuration with the given socket path.
    pub fn new(socket_path: impl Into<PathBuf>) -> Self {
        Self {
            socket_path: socket_path.into(),
            ..Default::default()
        }
    }

    /// Builder: set connection timeout.
    pub fn with_connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = timeout;
        self
    }

    /// Builder: set max connections.
    pub fn with_max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    /// Builder: set cleanup stale socket.
    pub fn with_cleanup_stale_socket(mut self, cleanup: bool) -> Self {
        self.cleanup_stale_socket = cleanup;
        self
    }

    /// Builder: set parent directory creation.
    pub fn with_create_parent_dir(mut self, create: bool) -> Self {
        self.create_parent_dir = create;
        self
    }
}

/// Everything the daemon needs to start.
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    pub server: ServerConfig,
    pub scheduler: SchedulerConfig,
    pub audio: AudioConfig,
    /// SQLite database holding settings, alarms and history.
    pub database_path: PathBuf,
    /// Application name shown on desktop notifications.
    pub app_name: String,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            scheduler: SchedulerConfig::default(),
            audio: AudioConfig::default(),
            database_path: default_database_path(),
            app_name: "Circadia".to_string(),
        }
    }
}

impl DaemonConfig {
    /// Builder: set the socket path.
    pub fn with_socket_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.server.socket_path = path.into();
        self
    }

    /// Builder: set the database path.
    pub fn with_database_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.database_path = path.into();
        self
    }

    /// Builder: set the audio configuration.
    pub fn with_audio(mut self, audio: AudioConfig) -> Self {
        self.audio = audio;
        self
    }
}

/// Returns the current user's id.
pub(crate) fn current_uid() -> u32 {
    #[cfg(unix)]
    let uid = unsafe { libc::getuid() };
    #[cfg(not(unix))]
    let uid = 0;
    uid
}

/// Returns the default socket path.
///
/// Uses `$XDG_RUNTIME_DIR/circadia/daemon.sock` if available,
/// otherwise falls back to `/tmp/circadia-$UID/daemon.sock`.
pub fn default_socket_path() -> PathBuf {
    match std::env::var_os("XDG_RUNTIME_DIR") {
        Some(runtime_dir) if !runtime_dir.is_empty() => {
            PathBuf::from(runtime_dir).join("circadia").join("daemon.sock")
        }
        _ => PathBuf::from(format!("/tmp/circadia-{}", current_uid())).join("daemon.sock"),
    }
}

/// Returns the default database path.
///
/// Uses `$XDG_DATA_HOME/circadia/user.db`, falling back to
/// `~/.local/share/circadia/user.db`.
pub fn default_database_path() -> PathBuf {
    let data_home = std::env::var_os("XDG_DATA_HOME")
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .or_else(|| {
            std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".local").join("share"))
        })
        .unwrap_or_else(|| PathBuf::from("."));
    data_home.join("circadia").join("user.db")
}

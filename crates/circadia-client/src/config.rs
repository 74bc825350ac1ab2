//! Client configuration.
//!
//! All settings live in a single `config.toml` file at
//! `~/.config/circadia/config.toml` by default. Command-line flags and
//! `CIRCADIA_*` environment variables override what the file says.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use circadia_server::{AudioConfig, DaemonConfig, default_database_path, default_socket_path};

/// Configuration for the circadia CLI and the daemon it launches.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Debug mode.
    pub debug: bool,

    /// Socket and database locations.
    pub daemon: DaemonSettings,

    /// Playback settings for the daemon.
    pub audio: AudioSettings,
}

/// Where the daemon listens and keeps its data.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonSettings {
    /// Path to the bus socket.
    pub socket_path: Option<PathBuf>,

    /// Path to the SQLite database.
    pub database_path: Option<PathBuf>,
}

/// Audio settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioSettings {
    /// Audio server endpoint tried before the defaults, e.g.
    /// `unix:/run/user/1000/pulse/native`.
    pub server: Option<String>,

    /// Sound tried before the built-in alarm sounds.
    pub default_sound: Option<PathBuf>,
}

impl ClientConfig {
    /// Loads configuration from the default path.
    pub fn load() -> Result<Self, String> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Loads configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self, String> {
        let content =
            std::fs::read_to_string(path).map_err(|e| format!("failed to read config: {}", e))?;
        toml::from_str(&content).map_err(|e| format!("failed to parse config: {}", e))
    }

    /// Returns the default configuration file path.
    pub fn default_path() -> PathBuf {
        Self::default_config_dir().join("config.toml")
    }

    /// Returns the default configuration directory.
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("circadia")
    }

    /// Applies command-line overrides.
    pub fn with_overrides(mut self, socket_path: Option<PathBuf>, database: Option<PathBuf>) -> Self {
        if socket_path.is_some() {
            self.daemon.socket_path = socket_path;
        }
        if database.is_some() {
            self.daemon.database_path = database;
        }
        self
    }

    /// The bus socket, configured or default.
    pub fn socket_path(&self) -> PathBuf {
        self.daemon
            .socket_path
            .clone()
            .unwrap_or_else(default_socket_path)
    }

    /// The database file, configured or default.
    pub fn database_path(&self) -> PathBuf {
        self.daemon
            .database_path
            .clone()
            .unwrap_or_else(default_database_path)
    }

    /// Audio assurance settings derived from the `[audio]` section.
    pub fn audio_config(&self) -> AudioConfig {
        let mut audio = AudioConfig::default();
        if let Some(ref server) = self.audio.server {
            audio = audio.with_endpoint(server.clone());
        }
        if let Some(ref sound) = self.audio.default_sound {
            audio = audio.with_default_sound(sound.clone());
        }
        audio
    }

    /// Full daemon configuration.
    pub fn daemon_config(&self) -> DaemonConfig {
        DaemonConfig::default()
            .with_socket_path(self.socket_path())
            .with_database_path(self.database_path())
            .with_audio(self.audio_config())
    }
}

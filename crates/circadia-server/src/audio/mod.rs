//! Audio assurance: alarm playback, output warm-up and sink enforcement.
//!
//! Playback goes through an [`AudioOutput`]; routing goes through an
//! [`AudioServer`] opened by an [`AudioServerConnector`]. Both are traits so
//! the session and scheduler logic can be exercised without a sound card.

mod enforce;
pub mod pactl;
pub mod player;
mod preload;
pub mod routing;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use circadia_core::Clock;

use crate::error::{AudioError, AudioResult};
use player::AudioOutput;
use preload::PreloadTracker;
use routing::{AudioServer, AudioServerConnector, SinkInfo, SinkWeights, endpoint_candidates, select_sink};

/// Audio assurance configuration.
#[derive(Debug, Clone)]
pub struct AudioConfig {
    /// Audio server endpoint tried before the defaults.
    pub explicit_endpoint: Option<String>,
    /// `application.name` values that identify our own playback streams.
    pub app_names: Vec<String>,
    /// Volume (percent) forced on the chosen sink.
    pub reference_volume: u32,
    /// Pause between enforcement rounds.
    pub enforce_interval: Duration,
    /// Pause after a failed enforcement round.
    pub enforce_retry: Duration,
    /// Delay between the start of playback and the first enforcement round.
    pub enforce_delay: Duration,
    /// Pause between preload attempts.
    pub preload_retry: Duration,
    /// Total time a preload loop keeps trying.
    pub preload_timeout: Duration,
    /// Alarm sounds tried, in order, when no custom sound is usable.
    pub sound_paths: Vec<PathBuf>,
    pub weights: SinkWeights,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            explicit_endpoint: None,
            app_names: vec!["circadia".to_string(), "circadia-daemon".to_string()],
            reference_volume: 100,
            enforce_interval: Duration::from_millis(500),
            enforce_retry: Duration::from_secs(1),
            enforce_delay: Duration::from_millis(500),
            preload_retry: Duration::from_secs(10),
            preload_timeout: Duration::from_secs(40 * 60),
            sound_paths: default_sound_paths(),
            weights: SinkWeights::default(),
        }
    }
}

impl AudioConfig {
    /// Builder: set the explicit audio server endpoint.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.explicit_endpoint = Some(endpoint.into());
        self
    }

    /// Builder: put `path` in front of the default sound search list.
    pub fn with_default_sound(mut self, path: impl Into<PathBuf>) -> Self {
        self.sound_paths.insert(0, path.into());
        self
    }

    /// Builder: replace the sound search list.
    pub fn with_sound_paths(mut self, paths: Vec<PathBuf>) -> Self {
        self.sound_paths = paths;
        self
    }
}

/// Default alarm sound locations: source tree, system install, flatpak.
pub fn default_sound_paths() -> Vec<PathBuf> {
    [
        "assets/alarm/default.ogg",
        "/usr/share/circadia/alarm/default.ogg",
        "/app/share/circadia/assets/alarm/default.ogg",
    ]
    .into_iter()
    .map(PathBuf::from)
    .collect()
}

/// A connected audio server with our preferred sink already set up.
pub struct PreparedOutput {
    pub server: Box<dyn AudioServer>,
    pub sink: SinkInfo,
}

/// Playback plus routing, shared by the session and the scheduler.
pub struct AudioAssurance {
    config: AudioConfig,
    output: Arc<dyn AudioOutput>,
    connector: Arc<dyn AudioServerConnector>,
    clock: Arc<dyn Clock>,
    preload: PreloadTracker,
}

impl AudioAssurance {
    pub fn new(
        config: AudioConfig,
        output: Arc<dyn AudioOutput>,
        connector: Arc<dyn AudioServerConnector>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            config,
            output,
            connector,
            clock,
            preload: PreloadTracker::default(),
        }
    }

    pub fn config(&self) -> &AudioConfig {
        &self.config
    }

    /// Picks the sound to ring with.
    ///
    /// `custom` wins when it names an existing file; otherwise the first
    /// existing default sound is used.
    pub fn resolve_alarm_sound(&self, custom: Option<&Path>) -> AudioResult<PathBuf> {
        if let Some(custom) = custom.filter(|p| !p.as_os_str().is_empty()) {
            if custom.is_file() {
                return Ok(custom.to_path_buf());
            }
            warn!(path = %custom.display(), "Custom alarm sound missing, using default");
        }
        self.config
            .sound_paths
            .iter()
            .find(|p| p.is_file())
            .cloned()
            .ok_or(AudioError::NoSound)
    }

    /// Starts the looping alarm sound and returns the file used.
    pub fn play_alarm(&self, custom: Option<&Path>) -> AudioResult<PathBuf> {
        let path = self.resolve_alarm_sound(custom)?;
        self.output.play(&path, true)?;
        Ok(path)
    }

    /// Plays `path` once, or the resolved alarm sound when `path` is empty.
    pub fn preview(&self, path: Option<&Path>, custom: Option<&Path>) -> AudioResult<PathBuf> {
        self.output.stop();
        let path = match path.filter(|p| !p.as_os_str().is_empty()) {
            Some(path) => path.to_path_buf(),
            None => self.resolve_alarm_sound(custom)?,
        };
        self.output.play(&path, false)?;
        Ok(path)
    }

    /// Stops whatever is playing.
    pub fn stop(&self) {
        self.output.stop();
    }

    pub fn is_playing(&self) -> bool {
        self.output.is_playing()
    }

    /// Connects to the first endpoint that answers.
    pub async fn connect(&self) -> AudioResult<Box<dyn AudioServer>> {
        let candidates = endpoint_candidates(self.config.explicit_endpoint.as_deref());
        for endpoint in &candidates {
            match self.connector.connect(endpoint).await {
                Ok(server) => {
                    debug!(%endpoint, "Connected to audio server");
                    return Ok(server);
                }
                Err(e) => debug!(%endpoint, error = %e, "Audio server endpoint unavailable"),
            }
        }
        Err(AudioError::ServerUnreachable { tried: candidates })
    }

    /// Connects, selects the best sink, makes it the default at reference
    /// volume and unmutes it.
    pub async fn prepare_output(&self) -> AudioResult<PreparedOutput> {
        let server = self.connect().await?;
        let sinks = server.list_sinks().await?;
        let sink = select_sink(&sinks, &self.config.weights)
            .cloned()
            .ok_or(AudioError::NoSink)?;

        server.set_default_sink(&sink.name).await?;
        self.restore_level(server.as_ref(), &sink).await;

        info!(sink = %sink.name, description = %sink.description, "Alarm output prepared");
        Ok(PreparedOutput { server, sink })
    }

    /// Forces the reference volume and unmutes `sink`.
    ///
    /// Some sinks reject volume or mute changes; routing still matters more
    /// than level, so failures are only logged.
    pub(crate) async fn restore_level(&self, server: &dyn AudioServer, sink: &SinkInfo) {
        if let Err(e) = server
            .set_sink_volume(&sink.name, self.config.reference_volume)
            .await
        {
            warn!(sink = %sink.name, error = %e, "Could not set sink volume");
        }
        if let Err(e) = server.set_sink_mute(&sink.name, false).await {
            warn!(sink = %sink.name, error = %e, "Could not unmute sink");
        }
    }
}

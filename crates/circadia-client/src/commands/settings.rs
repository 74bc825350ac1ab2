//! Settings commands: bedtime, smart wake-up, snooze and alarm sound.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use circadia_core::{ClockTime, SystemClock};
use circadia_protocol::BusMessage;
use circadia_server::AudioAssurance;
use circadia_server::audio::pactl::PactlConnector;
use circadia_server::audio::player::RodioOutput;
use circadia_store::Store;

use super::bus::BusClient;
use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};

/// How often preview checks whether the sound has ended.
const PREVIEW_POLL: Duration = Duration::from_millis(200);

pub async fn set_bedtime(store: &Store, bus: &BusClient, time: ClockTime) -> ClientResult<()> {
    store.set_bedtime(time)?;
    println!("Bedtime set to {}.", time);
    bus.send(BusMessage::BedtimeChanged).await
}

pub async fn set_bedtime_notify(store: &Store, bus: &BusClient, enabled: bool) -> ClientResult<()> {
    store.set_notify_bedtime(enabled)?;
    println!("Bedtime reminders {}.", if enabled { "on" } else { "off" });
    bus.send(BusMessage::BedtimeNotificationsChanged).await
}

pub async fn set_smart_wake(store: &Store, bus: &BusClient, enabled: bool) -> ClientResult<()> {
    store.set_smart_wake_up(enabled)?;
    println!("Smart wake-up {}.", if enabled { "on" } else { "off" });
    bus.send(BusMessage::SmartWakeUpToggled(enabled)).await
}

/// Updates the snooze settings; the daemon reads them when snoozing.
pub fn snooze_settings(
    store: &Store,
    enabled: Option<bool>,
    duration: Option<u32>,
) -> ClientResult<String> {
    if let Some(enabled) = enabled {
        store.set_snooze_enabled(enabled)?;
    }
    if let Some(minutes) = duration {
        store.set_snooze_duration(minutes)?;
    }

    let summary = if store.snooze_enabled()? {
        format!("Snooze on, {} minutes.", store.snooze_duration()?)
    } else {
        "Snooze off.".to_string()
    };
    println!("{}", summary);
    Ok(summary)
}

/// Stores a custom alarm sound. The file must exist.
pub fn set_sound(store: &Store, path: &Path) -> ClientResult<PathBuf> {
    if !path.is_file() {
        return Err(ClientError::InvalidArgument(format!(
            "{} is not a file",
            path.display()
        )));
    }
    let path = std::fs::canonicalize(path)?;
    store.set_alarm_audio_path(Some(&path))?;
    println!("Alarm sound set to {}.", path.display());
    Ok(path)
}

pub fn clear_sound(store: &Store) -> ClientResult<()> {
    store.set_alarm_audio_path(None)?;
    println!("Alarm sound reset to the default.");
    Ok(())
}

/// Plays `path` (or the current alarm sound) once, until it ends or Ctrl+C.
pub async fn preview_sound(
    config: &ClientConfig,
    store: &Store,
    path: Option<&Path>,
) -> ClientResult<()> {
    let audio = AudioAssurance::new(
        config.audio_config(),
        Arc::new(RodioOutput::new()),
        Arc::new(PactlConnector::default()),
        Arc::new(SystemClock),
    );
    let custom = store.alarm_audio_path()?;
    let playing = audio.preview(path, custom.as_deref())?;
    println!("Playing {} (Ctrl+C to stop)", playing.display());

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                debug!("Preview interrupted");
                break;
            }
            _ = tokio::time::sleep(PREVIEW_POLL) => {
                if !audio.is_playing() {
                    break;
                }
            }
        }
    }
    audio.stop();
    Ok(())
}

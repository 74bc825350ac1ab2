//! Alarm sound playback.
//!
//! [`RodioOutput`] owns a single playback slot: starting a new sound stops
//! and releases the previous one first. The output stream itself lives on a
//! dedicated thread because the device handle cannot move between threads;
//! only the cloneable stream handle is shared.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::mpsc;
use std::sync::{Mutex, MutexGuard};

use rodio::source::UniformSourceIterator;
use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink, Source};
use tracing::{debug, info};

use crate::error::{AudioError, AudioResult};

/// Sample rate everything is resampled to before playback.
pub const OUTPUT_SAMPLE_RATE: u32 = 48_000;

type BoxedSource = Box<dyn Source<Item = i16> + Send>;

/// A sink for alarm sounds.
pub trait AudioOutput: Send + Sync {
    /// Starts playing `path`, replacing whatever is playing.
    fn play(&self, path: &Path, looped: bool) -> AudioResult<()>;

    /// Stops playback. Safe to call when nothing plays.
    fn stop(&self);

    /// Returns true while a sound is audible.
    fn is_playing(&self) -> bool;
}

/// Container formats picked by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioFormat {
    Mp3,
    Wav,
    /// Ogg/Vorbis, also the fallback for unknown extensions.
    Vorbis,
}

impl AudioFormat {
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match ext.as_deref() {
            Some("mp3") => Self::Mp3,
            Some("wav") => Self::Wav,
            _ => Self::Vorbis,
        }
    }
}

struct StreamKeeper {
    handle: OutputStreamHandle,
    // Dropping the sender wakes the keeper thread, which then drops the stream.
    _shutdown: mpsc::Sender<()>,
}

/// Plays sounds on the default output device.
#[derive(Default)]
pub struct RodioOutput {
    stream: Mutex<Option<StreamKeeper>>,
    slot: Mutex<Option<Sink>>,
}

impl RodioOutput {
    /// Creates the output; the device is opened on first playback.
    pub fn new() -> Self {
        Self::default()
    }

    fn stream_handle(&self) -> AudioResult<OutputStreamHandle> {
        let mut stream = lock(&self.stream);
        if let Some(keeper) = stream.as_ref() {
            return Ok(keeper.handle.clone());
        }
        let keeper = open_stream()?;
        let handle = keeper.handle.clone();
        *stream = Some(keeper);
        Ok(handle)
    }
}

impl AudioOutput for RodioOutput {
    fn play(&self, path: &Path, looped: bool) -> AudioResult<()> {
        let source = prepare(decode(path)?, looped);
        let handle = self.stream_handle()?;
        let sink = Sink::try_new(&handle).map_err(|e| AudioError::Device(e.to_string()))?;

        let mut slot = lock(&self.slot);
        if let Some(previous) = slot.take() {
            previous.stop();
        }
        sink.append(source);
        *slot = Some(sink);

        info!(path = %path.display(), looped, "Playing sound");
        Ok(())
    }

    fn stop(&self) {
        if let Some(sink) = lock(&self.slot).take() {
            sink.stop();
            debug!("Playback stopped");
        }
    }

    fn is_playing(&self) -> bool {
        lock(&self.slot).as_ref().is_some_and(|sink| !sink.empty())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

fn open_stream() -> AudioResult<StreamKeeper> {
    let (ready_tx, ready_rx) = mpsc::channel();
    let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();

    std::thread::Builder::new()
        .name("circadia-audio".to_string())
        .spawn(move || match OutputStream::try_default() {
            Ok((stream, handle)) => {
                let _ = ready_tx.send(Ok(handle));
                // Blocks until the keeper is dropped.
                let _ = shutdown_rx.recv();
                drop(stream);
            }
            Err(e) => {
                let _ = ready_tx.send(Err(e.to_string()));
            }
        })
        .map_err(|e| AudioError::Device(e.to_string()))?;

    match ready_rx.recv() {
        Ok(Ok(handle)) => {
            debug!(sample_rate = OUTPUT_SAMPLE_RATE, "Audio output opened");
            Ok(StreamKeeper {
                handle,
                _shutdown: shutdown_tx,
            })
        }
        Ok(Err(message)) => Err(AudioError::Device(message)),
        Err(_) => Err(AudioError::Device("audio thread exited".to_string())),
    }
}

/// Opens and decodes `path` according to its extension.
pub fn decode(path: &Path) -> AudioResult<BoxedSource> {
    let file = File::open(path).map_err(|source| AudioError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    let reader = BufReader::new(file);

    let decoded = match AudioFormat::from_path(path) {
        AudioFormat::Mp3 => Decoder::new_mp3(reader),
        AudioFormat::Wav => Decoder::new_wav(reader),
        AudioFormat::Vorbis => Decoder::new_vorbis(reader),
    }
    .map_err(|e| AudioError::Decode {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    Ok(Box::new(decoded))
}

fn prepare(source: BoxedSource, looped: bool) -> BoxedSource {
    let source: BoxedSource = if looped {
        Box::new(source.repeat_infinite())
    } else {
        source
    };

    if source.sample_rate() == OUTPUT_SAMPLE_RATE {
        return source;
    }
    let channels = source.channels();
    Box::new(UniformSourceIterator::<_, i16>::new(
        source,
        channels,
        OUTPUT_SAMPLE_RATE,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::tempdir;

    #[test]
    fn format_by_extension() {
        assert_eq!(AudioFormat::from_path(Path::new("a/b.MP3")), AudioFormat::Mp3);
        assert_eq!(AudioFormat::from_path(Path::new("chime.wav")), AudioFormat::Wav);
        assert_eq!(AudioFormat::from_path(Path::new("default.ogg")), AudioFormat::Vorbis);
        assert_eq!(AudioFormat::from_path(Path::new("noext")), AudioFormat::Vorbis);
    }

    #[test]
    fn decode_missing_file() {
        let result = decode(&PathBuf::from("/nonexistent/alarm.ogg"));
        assert!(matches!(result, Err(AudioError::Open { .. })));
    }

    #[test]
    fn decode_garbage_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.wav");
        std::fs::write(&path, b"definitely not a riff header").unwrap();
        assert!(matches!(decode(&path), Err(AudioError::Decode { .. })));
    }

    #[test]
    fn stop_without_playback_is_noop() {
        let output = RodioOutput::new();
        output.stop();
        output.stop();
        assert!(!output.is_playing());
    }
}

//! Recording fakes for the daemon's trait seams.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Local, NaiveDate};
use tempfile::TempDir;

use circadia_core::{Clock, ClockTime, ManualClock, resolve_local};
use circadia_protocol::BusMessage;
use circadia_store::Store;

use crate::audio::player::AudioOutput;
use crate::audio::routing::{AudioServer, AudioServerConnector, SinkInfo, SinkInput};
use crate::audio::{AudioAssurance, AudioConfig};
use crate::bus::{BoxFuture, Publisher};
use crate::context::DaemonContext;
use crate::error::{AudioError, AudioResult, ServerError, ServerResult};
use crate::notify::{BedtimeNotifier, BedtimeReminder};

/// A local time on June `day`, 2026.
pub fn local(day: u32, hour: u32, minute: u32) -> DateTime<Local> {
    let date = NaiveDate::from_ymd_opt(2026, 6, day).unwrap();
    resolve_local(date, ClockTime::new(hour, minute).unwrap())
}

pub fn fixed_clock(hour: u32, minute: u32) -> Arc<dyn Clock> {
    Arc::new(ManualClock::new(local(11, hour, minute)))
}

#[derive(Default)]
pub struct RecordingOutput {
    plays: Mutex<Vec<(PathBuf, bool)>>,
    stops: AtomicUsize,
    playing: AtomicBool,
}

impl RecordingOutput {
    pub fn plays(&self) -> Vec<(PathBuf, bool)> {
        self.plays.lock().unwrap().clone()
    }

    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }
}

impl AudioOutput for RecordingOutput {
    fn play(&self, path: &Path, looped: bool) -> AudioResult<()> {
        self.plays.lock().unwrap().push((path.to_path_buf(), looped));
        self.playing.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
        self.playing.store(false, Ordering::SeqCst);
    }

    fn is_playing(&self) -> bool {
        self.playing.load(Ordering::SeqCst)
    }
}

#[derive(Default)]
struct FakeServerState {
    sinks: Vec<SinkInfo>,
    inputs: Vec<SinkInput>,
    calls: Vec<String>,
    failing_input_listings: u32,
    rejects_volume: bool,
}

/// In-memory audio server. Clones share state.
#[derive(Clone, Default)]
pub struct FakeAudioServer {
    state: Arc<Mutex<FakeServerState>>,
}

impl FakeAudioServer {
    pub const SPEAKER: &'static str = "alsa_output.pci-0000_00_1f.3.analog-stereo";
    pub const SPEAKER_INDEX: u32 = 47;
    pub const BLUETOOTH: &'static str = "bluez_output.AC_80_0A.1";
    pub const BLUETOOTH_INDEX: u32 = 112;

    /// Built-in speaker plus a pair of Bluetooth headphones.
    pub fn laptop() -> Self {
        let server = Self::default();
        server.state.lock().unwrap().sinks = vec![
            SinkInfo {
                index: Self::BLUETOOTH_INDEX,
                name: Self::BLUETOOTH.to_string(),
                description: "WH-1000XM4".to_string(),
            },
            SinkInfo {
                index: Self::SPEAKER_INDEX,
                name: Self::SPEAKER.to_string(),
                description: "Built-in Audio Speaker".to_string(),
            },
        ];
        server
    }

    pub fn add_input(&self, input: SinkInput) {
        self.state.lock().unwrap().inputs.push(input);
    }

    pub fn input_sink(&self, index: u32) -> Option<u32> {
        let state = self.state.lock().unwrap();
        state.inputs.iter().find(|i| i.index == index).map(|i| i.sink)
    }

    /// Moves a stream the way another application would.
    pub fn move_input_directly(&self, index: u32, sink: u32) {
        let mut state = self.state.lock().unwrap();
        if let Some(input) = state.inputs.iter_mut().find(|i| i.index == index) {
            input.sink = sink;
        }
    }

    pub fn fail_input_listings(&self, times: u32) {
        self.state.lock().unwrap().failing_input_listings = times;
    }

    /// Makes every volume change fail, like a sink without volume control.
    pub fn reject_volume(&self, rejects: bool) {
        self.state.lock().unwrap().rejects_volume = rejects;
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    fn record(&self, call: String) {
        self.state.lock().unwrap().calls.push(call);
    }

    fn sink_index(&self, name: &str) -> AudioResult<u32> {
        let state = self.state.lock().unwrap();
        state
            .sinks
            .iter()
            .find(|s| s.name == name)
            .map(|s| s.index)
            .ok_or_else(|| AudioError::command("fake", format!("no sink {name}")))
    }
}

impl AudioServer for FakeAudioServer {
    fn list_sinks(&self) -> BoxFuture<'_, AudioResult<Vec<SinkInfo>>> {
        Box::pin(async move { Ok(self.state.lock().unwrap().sinks.clone()) })
    }

    fn list_sink_inputs(&self) -> BoxFuture<'_, AudioResult<Vec<SinkInput>>> {
        Box::pin(async move {
            let mut state = self.state.lock().unwrap();
            if state.failing_input_listings > 0 {
                state.failing_input_listings -= 1;
                return Err(AudioError::command("fake", "connection reset"));
            }
            Ok(state.inputs.clone())
        })
    }

    fn set_default_sink<'a>(&'a self, sink: &'a str) -> BoxFuture<'a, AudioResult<()>> {
        Box::pin(async move {
            self.sink_index(sink)?;
            self.record(format!("set-default-sink {sink}"));
            Ok(())
        })
    }

    fn set_sink_volume<'a>(&'a self, sink: &'a str, percent: u32) -> BoxFuture<'a, AudioResult<()>> {
        Box::pin(async move {
            if self.state.lock().unwrap().rejects_volume {
                return Err(AudioError::command("fake", "volume not supported"));
            }
            self.record(format!("set-sink-volume {sink} {percent}"));
            Ok(())
        })
    }

    fn set_sink_mute<'a>(&'a self, sink: &'a str, muted: bool) -> BoxFuture<'a, AudioResult<()>> {
        Box::pin(async move {
            self.record(format!("set-sink-mute {sink} {muted}"));
            Ok(())
        })
    }

    fn move_sink_input<'a>(&'a self, input: u32, sink: &'a str) -> BoxFuture<'a, AudioResult<()>> {
        Box::pin(async move {
            let target = self.sink_index(sink)?;
            self.move_input_directly(input, target);
            self.record(format!("move-sink-input {input} {sink}"));
            Ok(())
        })
    }
}

/// Hands out a [`FakeAudioServer`], or refuses every endpoint.
pub struct FakeConnector {
    server: Option<FakeAudioServer>,
    attempts: Arc<AtomicUsize>,
}

impl FakeConnector {
    pub fn accepting(server: FakeAudioServer) -> Self {
        Self {
            server: Some(server),
            attempts: Arc::default(),
        }
    }

    pub fn refusing() -> Self {
        Self {
            server: None,
            attempts: Arc::default(),
        }
    }

    pub fn attempts_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.attempts)
    }
}

impl AudioServerConnector for FakeConnector {
    fn connect<'a>(&'a self, endpoint: &'a str) -> BoxFuture<'a, AudioResult<Box<dyn AudioServer>>> {
        Box::pin(async move {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            match &self.server {
                Some(server) => Ok(Box::new(server.clone()) as Box<dyn AudioServer>),
                None => Err(AudioError::command(
                    format!("connect {endpoint}"),
                    "Connection refused",
                )),
            }
        })
    }
}

#[derive(Default)]
pub struct RecordingPublisher {
    messages: Mutex<Vec<BusMessage>>,
    failing: AtomicBool,
}

impl RecordingPublisher {
    pub fn messages(&self) -> Vec<BusMessage> {
        self.messages.lock().unwrap().clone()
    }

    /// Makes every publish fail as if no daemon listened.
    pub fn fail(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

impl Publisher for RecordingPublisher {
    fn publish(&self, message: BusMessage) -> BoxFuture<'_, ServerResult<()>> {
        Box::pin(async move {
            if self.failing.load(Ordering::SeqCst) {
                return Err(ServerError::Io(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "no listener",
                )));
            }
            self.messages.lock().unwrap().push(message);
            Ok(())
        })
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(BedtimeReminder, ClockTime)>>,
    failing: AtomicBool,
}

impl RecordingNotifier {
    pub fn sent(&self) -> Vec<(BedtimeReminder, ClockTime)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn fail(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

impl BedtimeNotifier for RecordingNotifier {
    fn notify(&self, reminder: BedtimeReminder, bedtime: ClockTime) -> Result<(), String> {
        if self.failing.load(Ordering::SeqCst) {
            return Err("notification daemon not running".to_string());
        }
        self.sent.lock().unwrap().push((reminder, bedtime));
        Ok(())
    }
}

/// A context wired to fakes, with a default alarm sound on disk.
pub struct Harness {
    pub ctx: Arc<DaemonContext>,
    pub clock: Arc<ManualClock>,
    pub output: Arc<RecordingOutput>,
    pub publisher: Arc<RecordingPublisher>,
    pub server: FakeAudioServer,
    _sounds: TempDir,
}

impl Harness {
    pub fn at(now: DateTime<Local>) -> Self {
        let sounds = tempfile::tempdir().unwrap();
        let sound = sounds.path().join("default.ogg");
        std::fs::write(&sound, b"OggS").unwrap();

        let clock = Arc::new(ManualClock::new(now));
        let output = Arc::new(RecordingOutput::default());
        let publisher = Arc::new(RecordingPublisher::default());
        let server = FakeAudioServer::laptop();

        let audio = Arc::new(AudioAssurance::new(
            AudioConfig::default().with_sound_paths(vec![sound]),
            output.clone(),
            Arc::new(FakeConnector::accepting(server.clone())),
            clock.clone(),
        ));
        let ctx = DaemonContext::new(
            Arc::new(Store::open_in_memory().unwrap()),
            audio,
            publisher.clone(),
            clock.clone(),
        );

        Self {
            ctx,
            clock,
            output,
            publisher,
            server,
            _sounds: sounds,
        }
    }
}

//! Audio server model and sink selection.
//!
//! The desktop audio server may route the alarm to headphones, a muted
//! Bluetooth speaker or a USB dock that is switched off. The types here
//! describe just enough of the server to pick a physically reliable sink
//! and keep our stream on it.

use std::path::PathBuf;

use crate::bus::BoxFuture;
use crate::config::current_uid;
use crate::error::AudioResult;

/// An output device known to the audio server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkInfo {
    pub index: u32,
    pub name: String,
    pub description: String,
}

/// A playback stream attached to a sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkInput {
    pub index: u32,
    /// Index of the sink the stream currently plays on.
    pub sink: u32,
    pub process_id: Option<u32>,
    pub application_name: Option<String>,
}

/// A connection to the desktop audio server.
pub trait AudioServer: Send + Sync {
    fn list_sinks(&self) -> BoxFuture<'_, AudioResult<Vec<SinkInfo>>>;

    fn list_sink_inputs(&self) -> BoxFuture<'_, AudioResult<Vec<SinkInput>>>;

    fn set_default_sink<'a>(&'a self, sink: &'a str) -> BoxFuture<'a, AudioResult<()>>;

    /// Sets every channel of `sink` to `percent` of nominal volume.
    fn set_sink_volume<'a>(&'a self, sink: &'a str, percent: u32)
    -> BoxFuture<'a, AudioResult<()>>;

    fn set_sink_mute<'a>(&'a self, sink: &'a str, muted: bool) -> BoxFuture<'a, AudioResult<()>>;

    fn move_sink_input<'a>(&'a self, input: u32, sink: &'a str) -> BoxFuture<'a, AudioResult<()>>;
}

/// Opens [`AudioServer`] connections.
pub trait AudioServerConnector: Send + Sync {
    /// Connects to the server listening at `endpoint`.
    fn connect<'a>(&'a self, endpoint: &'a str) -> BoxFuture<'a, AudioResult<Box<dyn AudioServer>>>;
}

/// Score adjustments used to rank sinks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SinkWeights {
    /// Name or description mentions a speaker, or the name says primary.
    pub speaker: i32,
    /// Name looks like an on-board card (`pci`, `platform`).
    pub internal: i32,
    /// Name looks removable (`usb`, `bluez`).
    pub removable: i32,
}

impl Default for SinkWeights {
    fn default() -> Self {
        Self {
            speaker: 10,
            internal: 2,
            removable: -5,
        }
    }
}

/// Scores a sink: higher means more likely to be the built-in speaker.
pub fn score_sink(sink: &SinkInfo, weights: &SinkWeights) -> i32 {
    let name = sink.name.to_ascii_lowercase();
    let description = sink.description.to_ascii_lowercase();
    let mut score = 0;

    if name.contains("speaker") || description.contains("speaker") || name.contains("primary") {
        score += weights.speaker;
    }
    if name.contains("pci") || name.contains("platform") {
        score += weights.internal;
    }
    if name.contains("usb") || name.contains("bluez") {
        score += weights.removable;
    }
    score
}

/// Picks the highest-scoring sink; the first one listed wins ties.
pub fn select_sink<'a>(sinks: &'a [SinkInfo], weights: &SinkWeights) -> Option<&'a SinkInfo> {
    let mut best: Option<(&SinkInfo, i32)> = None;
    for sink in sinks {
        let score = score_sink(sink, weights);
        if best.is_none_or(|(_, best_score)| score > best_score) {
            best = Some((sink, score));
        }
    }
    best.map(|(sink, _)| sink)
}

/// Endpoints to try, in order: explicit, `$PULSE_SERVER`, then the per-user
/// runtime directory defaults.
pub fn endpoint_candidates(explicit: Option<&str>) -> Vec<String> {
    let uid = current_uid();
    let mut candidates: Vec<String> = Vec::new();
    let mut push = |endpoint: String| {
        if !endpoint.is_empty() && !candidates.contains(&endpoint) {
            candidates.push(endpoint);
        }
    };

    if let Some(explicit) = explicit {
        push(explicit.to_string());
    }
    if let Ok(env) = std::env::var("PULSE_SERVER") {
        push(env);
    }
    if let Some(runtime) = std::env::var_os("XDG_RUNTIME_DIR").filter(|v| !v.is_empty()) {
        let native = PathBuf::from(runtime).join("pulse").join("native");
        push(format!("unix:{}", native.display()));
    }
    push(format!("unix:/run/user/{uid}/pulse/native"));
    push(format!("unix:@/run/user/{uid}/pulse/native"));
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sink(index: u32, name: &str, description: &str) -> SinkInfo {
        SinkInfo {
            index,
            name: name.to_string(),
            description: description.to_string(),
        }
    }

    #[test]
    fn scoring_weights() {
        let w = SinkWeights::default();
        assert_eq!(
            score_sink(&sink(0, "alsa_output.pci-0000_00_1f.3.analog-stereo", "Built-in Audio Speaker"), &w),
            12
        );
        assert_eq!(score_sink(&sink(1, "alsa_output.platform-sound.HiFi__hw_sofsoundwire__sink", ""), &w), 2);
        assert_eq!(score_sink(&sink(2, "bluez_output.AA_BB.1", "Headphones"), &w), -5);
        assert_eq!(score_sink(&sink(3, "alsa_output.usb-Speaker_Co", ""), &w), 5);
        assert_eq!(score_sink(&sink(4, "primary_output", ""), &w), 10);
        assert_eq!(score_sink(&sink(5, "null", "Dummy Output"), &w), 0);
    }

    #[test]
    fn selects_built_in_speaker() {
        let sinks = vec![
            sink(0, "bluez_output.AA_BB.1", "WH-1000XM4"),
            sink(1, "alsa_output.usb-Dock", "USB Dock"),
            sink(2, "alsa_output.pci-0000_00_1f.3.analog-stereo", "Speaker + Headphones"),
        ];
        let best = select_sink(&sinks, &SinkWeights::default()).unwrap();
        assert_eq!(best.index, 2);
    }

    #[test]
    fn ties_keep_first_and_negative_scores_still_select() {
        let w = SinkWeights::default();
        let tied = vec![sink(7, "alsa_output.pci-a", ""), sink(8, "alsa_output.pci-b", "")];
        assert_eq!(select_sink(&tied, &w).unwrap().index, 7);

        let only_bluetooth = vec![sink(3, "bluez_output.X", "")];
        assert_eq!(select_sink(&only_bluetooth, &w).unwrap().index, 3);

        assert!(select_sink(&[], &w).is_none());
    }

    #[test]
    fn explicit_endpoint_comes_first_and_defaults_follow() {
        let candidates = endpoint_candidates(Some("tcp:127.0.0.1:4713"));
        assert_eq!(candidates[0], "tcp:127.0.0.1:4713");

        let uid = current_uid();
        assert!(candidates.contains(&format!("unix:/run/user/{uid}/pulse/native")));
        assert_eq!(
            candidates.last().unwrap(),
            &format!("unix:@/run/user/{uid}/pulse/native")
        );

        let mut deduped = candidates.clone();
        deduped.dedup();
        assert_eq!(deduped.len(), candidates.len());
    }
}

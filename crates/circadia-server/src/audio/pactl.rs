//! [`AudioServer`] backed by the `pactl` command-line client.
//!
//! Works against PulseAudio and PipeWire's pulse compatibility layer. Every
//! call is one `pactl --server=<endpoint> ...` invocation; listings use the
//! JSON output format.

use std::collections::HashMap;
use std::time::Duration;

use serde::Deserialize;
use tokio::process::Command;
use tracing::trace;

use crate::audio::routing::{AudioServer, AudioServerConnector, SinkInfo, SinkInput};
use crate::bus::BoxFuture;
use crate::error::{AudioError, AudioResult};

/// Connects by probing `pactl info` against the endpoint.
#[derive(Debug, Clone)]
pub struct PactlConnector {
    program: String,
    timeout: Duration,
}

impl Default for PactlConnector {
    fn default() -> Self {
        Self {
            program: "pactl".to_string(),
            timeout: Duration::from_secs(3),
        }
    }
}

impl PactlConnector {
    /// Uses a different binary (a wrapper script, a pinned path).
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }
}

impl AudioServerConnector for PactlConnector {
    fn connect<'a>(&'a self, endpoint: &'a str) -> BoxFuture<'a, AudioResult<Box<dyn AudioServer>>> {
        Box::pin(async move {
            let server = PactlServer {
                program: self.program.clone(),
                endpoint: endpoint.to_string(),
                timeout: self.timeout,
            };
            server.run(&["info"]).await?;
            Ok(Box::new(server) as Box<dyn AudioServer>)
        })
    }
}

/// One audio server endpoint driven through `pactl`.
#[derive(Debug, Clone)]
pub struct PactlServer {
    program: String,
    endpoint: String,
    timeout: Duration,
}

impl PactlServer {
    async fn run(&self, args: &[&str]) -> AudioResult<String> {
        let command = format!("{} {}", self.program, args.join(" "));
        trace!(endpoint = %self.endpoint, %command, "Running pactl");

        let output = Command::new(&self.program)
            .arg(format!("--server={}", self.endpoint))
            .args(args)
            .kill_on_drop(true)
            .output();

        let output = match tokio::time::timeout(self.timeout, output).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return Err(AudioError::command(command, e.to_string())),
            Err(_) => return Err(AudioError::command(command, "timed out")),
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(AudioError::command(command, stderr));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl AudioServer for PactlServer {
    fn list_sinks(&self) -> BoxFuture<'_, AudioResult<Vec<SinkInfo>>> {
        Box::pin(async move {
            let json = self.run(&["--format=json", "list", "sinks"]).await?;
            parse_sinks(&json)
        })
    }

    fn list_sink_inputs(&self) -> BoxFuture<'_, AudioResult<Vec<SinkInput>>> {
        Box::pin(async move {
            let json = self.run(&["--format=json", "list", "sink-inputs"]).await?;
            parse_sink_inputs(&json)
        })
    }

    fn set_default_sink<'a>(&'a self, sink: &'a str) -> BoxFuture<'a, AudioResult<()>> {
        Box::pin(async move { self.run(&["set-default-sink", sink]).await.map(drop) })
    }

    fn set_sink_volume<'a>(&'a self, sink: &'a str, percent: u32) -> BoxFuture<'a, AudioResult<()>> {
        Box::pin(async move {
            let volume = format!("{percent}%");
            self.run(&["set-sink-volume", sink, &volume]).await.map(drop)
        })
    }

    fn set_sink_mute<'a>(&'a self, sink: &'a str, muted: bool) -> BoxFuture<'a, AudioResult<()>> {
        Box::pin(async move {
            let flag = if muted { "1" } else { "0" };
            self.run(&["set-sink-mute", sink, flag]).await.map(drop)
        })
    }

    fn move_sink_input<'a>(&'a self, input: u32, sink: &'a str) -> BoxFuture<'a, AudioResult<()>> {
        Box::pin(async move {
            let input = input.to_string();
            self.run(&["move-sink-input", &input, sink]).await.map(drop)
        })
    }
}

#[derive(Debug, Deserialize)]
struct RawSink {
    index: u32,
    name: String,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct RawSinkInput {
    index: u32,
    sink: u32,
    #[serde(default)]
    properties: HashMap<String, serde_json::Value>,
}

/// Parses `pactl --format=json list sinks`.
pub fn parse_sinks(json: &str) -> AudioResult<Vec<SinkInfo>> {
    let raw: Vec<RawSink> = serde_json::from_str(json)?;
    Ok(raw
        .into_iter()
        .map(|s| SinkInfo {
            index: s.index,
            name: s.name,
            description: s.description,
        })
        .collect())
}

/// Parses `pactl --format=json list sink-inputs`.
pub fn parse_sink_inputs(json: &str) -> AudioResult<Vec<SinkInput>> {
    let raw: Vec<RawSinkInput> = serde_json::from_str(json)?;
    Ok(raw
        .into_iter()
        .map(|input| {
            let property = |key: &str| match input.properties.get(key) {
                Some(serde_json::Value::String(s)) => Some(s.clone()),
                Some(serde_json::Value::Number(n)) => Some(n.to_string()),
                _ => None,
            };
            SinkInput {
                index: input.index,
                sink: input.sink,
                process_id: property("application.process.id").and_then(|p| p.parse().ok()),
                application_name: property("application.name"),
            }
        })
        .collect())
}

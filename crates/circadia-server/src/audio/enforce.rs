//! Keeps the ringing alarm on the chosen sink.
//!
//! Desktop audio servers move streams around when devices appear or the
//! user's default changes. While the alarm rings we periodically re-assert
//! the default sink and pull our own stream back onto it.

use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::AudioAssurance;
use super::routing::{AudioServer, SinkInfo, SinkInput};
use crate::error::AudioResult;

impl AudioAssurance {
    /// Runs until `ringing` reads false.
    ///
    /// Fails only if the initial connection or sink setup fails; later
    /// round-trip errors are logged and retried.
    pub async fn enforce_sink(&self, ringing: watch::Receiver<bool>) -> AudioResult<()> {
        if !*ringing.borrow() {
            return Ok(());
        }

        let prepared = self.prepare_output().await?;
        let pid = std::process::id();
        info!(sink = %prepared.sink.name, pid, "Sink enforcement started");

        let mut rounds = 0u64;
        loop {
            if !*ringing.borrow() {
                break;
            }
            rounds += 1;
            match self
                .enforce_round(prepared.server.as_ref(), &prepared.sink, pid)
                .await
            {
                Ok(moved) if moved > 0 => {
                    info!(moved, sink = %prepared.sink.name, "Re-homed alarm stream");
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(error = %e, "Sink enforcement round failed");
                    tokio::time::sleep(self.config.enforce_retry).await;
                    continue;
                }
            }
            tokio::time::sleep(self.config.enforce_interval).await;
        }

        debug!(rounds, "Sink enforcement finished");
        Ok(())
    }

    async fn enforce_round(
        &self,
        server: &dyn AudioServer,
        sink: &SinkInfo,
        pid: u32,
    ) -> AudioResult<usize> {
        server.set_default_sink(&sink.name).await?;

        let inputs = server.list_sink_inputs().await?;
        let mut moved = 0;
        for input in inputs.iter().filter(|i| self.is_own_stream(i, pid)) {
            if input.sink == sink.index {
                continue;
            }
            if let Err(e) = server.move_sink_input(input.index, &sink.name).await {
                warn!(input = input.index, sink = %sink.name, error = %e, "Could not move alarm stream");
                continue;
            }
            self.restore_level(server, sink).await;
            moved += 1;
        }
        Ok(moved)
    }

    /// Process id match first, then the application name tag.
    fn is_own_stream(&self, input: &SinkInput, pid: u32) -> bool {
        if input.process_id == Some(pid) {
            return true;
        }
        input.application_name.as_deref().is_some_and(|name| {
            self.config
                .app_names
                .iter()
                .any(|ours| ours.eq_ignore_ascii_case(name))
        })
    }
}

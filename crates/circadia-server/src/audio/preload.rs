//! Background warm-up of the audio output ahead of an alarm.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Local};
use tracing::{debug, info, warn};

use super::AudioAssurance;

#[derive(Debug, Default)]
pub(super) struct PreloadTracker {
    active: AtomicBool,
    last_success: Mutex<Option<DateTime<Local>>>,
}

impl PreloadTracker {
    fn last_success(&self) -> Option<DateTime<Local>> {
        *self.last_success.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn record_success(&self, at: DateTime<Local>) {
        *self.last_success.lock().unwrap_or_else(|e| e.into_inner()) = Some(at);
    }
}

/// Clears the active flag when the loop ends, however it ends.
struct ActiveGuard<'a>(&'a AtomicBool);

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl AudioAssurance {
    /// Returns true if no preload runs and none succeeded within `window`.
    pub fn preload_due(&self, now: DateTime<Local>, window: Duration) -> bool {
        if self.preload_running() {
            return false;
        }
        self.preload
            .last_success()
            .is_none_or(|last| now - last >= window)
    }

    pub fn preload_running(&self) -> bool {
        self.preload.active.load(Ordering::SeqCst)
    }

    /// Time of the last successful preload.
    pub fn last_preload(&self) -> Option<DateTime<Local>> {
        self.preload.last_success()
    }

    /// Spawns the preload loop unless one is already running.
    ///
    /// The loop tries to prepare the output immediately and then every
    /// `preload_retry` until it succeeds or `preload_timeout` elapses.
    pub fn start_preload(self: &Arc<Self>) -> bool {
        if self.preload.active.swap(true, Ordering::SeqCst) {
            debug!("Audio preload already running");
            return false;
        }

        let this = Arc::clone(self);
        tokio::spawn(async move {
            let _guard = ActiveGuard(&this.preload.active);
            this.run_preload().await;
        });
        true
    }

    async fn run_preload(&self) {
        let attempts = async {
            let mut ticker = tokio::time::interval(self.config.preload_retry);
            let mut attempt = 0u32;
            loop {
                ticker.tick().await;
                attempt += 1;
                match self.prepare_output().await {
                    Ok(prepared) => {
                        self.preload.record_success(self.clock.now());
                        info!(attempt, sink = %prepared.sink.name, "Audio output preloaded");
                        return;
                    }
                    Err(e) => debug!(attempt, error = %e, "Audio preload attempt failed"),
                }
            }
        };

        if tokio::time::timeout(self.config.preload_timeout, attempts)
            .await
            .is_err()
        {
            warn!(
                timeout_mins = self.config.preload_timeout.as_secs() / 60,
                "Audio preload gave up"
            );
        }
    }
}

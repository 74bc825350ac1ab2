//! Bedtime reminders as desktop notifications.

use std::time::Duration;

use notify_rust::Notification;
#[cfg(target_os = "linux")]
use notify_rust::Urgency;
use tracing::{debug, info};

use circadia_core::ClockTime;

/// Which of the two daily bedtime reminders is due.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BedtimeReminder {
    /// Half an hour before bedtime.
    WindDown,
    /// At bedtime.
    Bedtime,
}

impl BedtimeReminder {
    /// Prefix of the dedup key recorded after delivery.
    pub fn key_prefix(&self) -> &'static str {
        match self {
            Self::WindDown => "30min",
            Self::Bedtime => "bedtime",
        }
    }

    pub fn summary(&self) -> &'static str {
        match self {
            Self::WindDown => "Wind Down",
            Self::Bedtime => "It's Bedtime",
        }
    }

    pub fn body(&self) -> &'static str {
        match self {
            Self::WindDown => "Bedtime in 30 minutes.",
            Self::Bedtime => "Sleep tight!",
        }
    }
}

/// Delivers bedtime reminders.
pub trait BedtimeNotifier: Send + Sync {
    fn notify(&self, reminder: BedtimeReminder, bedtime: ClockTime) -> Result<(), String>;
}

/// Shows reminders through the desktop notification service.
#[derive(Debug, Clone)]
pub struct DesktopNotifier {
    app_name: String,
    timeout: Duration,
}

impl DesktopNotifier {
    pub fn new(app_name: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
            timeout: Duration::from_secs(10),
        }
    }
}

impl BedtimeNotifier for DesktopNotifier {
    fn notify(&self, reminder: BedtimeReminder, bedtime: ClockTime) -> Result<(), String> {
        debug!(?reminder, bedtime = %bedtime, "Sending bedtime notification");

        let mut notification = Notification::new();
        notification
            .appname(&self.app_name)
            .summary(reminder.summary())
            .body(reminder.body())
            .timeout(self.timeout);

        #[cfg(target_os = "linux")]
        notification.urgency(match reminder {
            BedtimeReminder::WindDown => Urgency::Low,
            BedtimeReminder::Bedtime => Urgency::Normal,
        });

        notification.show().map_err(|e| e.to_string())?;
        info!(?reminder, bedtime = %bedtime, "Bedtime notification sent");
        Ok(())
    }
}

//! Command-line interface definition.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use circadia_core::{AlarmId, ClockTime};

/// circadia - alarms, smart wake-up and sleep tracking
#[derive(Debug, Parser)]
#[command(name = "circadia")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, short, env = "CIRCADIA_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable debug output
    #[arg(long, short = 'v')]
    pub debug: bool,

    /// Path to the daemon socket
    #[arg(long, env = "CIRCADIA_SOCKET")]
    pub socket_path: Option<PathBuf>,

    /// Path to the database
    #[arg(long, env = "CIRCADIA_DATABASE")]
    pub database: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// An on/off switch argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Toggle {
    On,
    Off,
}

impl Toggle {
    pub fn enabled(self) -> bool {
        matches!(self, Self::On)
    }
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the daemon in the foreground
    Daemon {
        /// Log format: pretty, compact or json
        #[arg(long, env = "CIRCADIA_LOG_FORMAT")]
        log_format: Option<String>,
    },

    /// Start or end sleep tracking
    Sleep { state: Toggle },

    /// Stop the ringing alarm
    Stop,

    /// Snooze the ringing alarm
    Snooze,

    /// Manage alarms
    Alarm {
        #[command(subcommand)]
        action: AlarmAction,
    },

    /// Bedtime and its reminders
    Bedtime {
        #[command(subcommand)]
        action: BedtimeAction,
    },

    /// Turn smart wake-up on or off
    SmartWake { state: Toggle },

    /// Change snooze behaviour
    SnoozeSettings {
        /// Allow snoozing
        #[arg(long)]
        enabled: Option<bool>,

        /// Snooze length in minutes
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..=120))]
        duration: Option<u32>,
    },

    /// Manage the alarm sound
    Sound {
        #[command(subcommand)]
        action: SoundAction,
    },

    /// Show recent sleep sessions
    History {
        /// How many days back to look
        #[arg(long, default_value_t = 7)]
        days: u32,
    },

    /// Send a raw bus message, e.g. `sleepModeChanged:true`
    Send { raw: String },

    /// Configuration commands
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Alarm actions.
#[derive(Debug, Subcommand)]
pub enum AlarmAction {
    /// Add an enabled alarm at HH:MM
    Add { time: ClockTime },

    /// List alarms
    List,

    /// Move an alarm to a new time
    Edit { id: AlarmId, time: ClockTime },

    /// Enable an alarm
    Enable { id: AlarmId },

    /// Disable an alarm
    Disable { id: AlarmId },

    /// Delete an alarm
    Remove { id: AlarmId },
}

/// Bedtime actions.
#[derive(Debug, Subcommand)]
pub enum BedtimeAction {
    /// Set bedtime to HH:MM
    Set { time: ClockTime },

    /// Turn bedtime reminders on or off
    Notify { state: Toggle },
}

/// Alarm sound actions.
#[derive(Debug, Subcommand)]
pub enum SoundAction {
    /// Use a custom sound file
    Set { path: PathBuf },

    /// Go back to the default sound
    Clear,

    /// Play a sound once, or the current alarm sound
    Preview { path: Option<PathBuf> },
}

/// Configuration actions.
#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Dump current configuration
    Dump,

    /// Show configuration file path
    Path,
}

//! circadia CLI entry point.

use std::process::ExitCode;
use std::str::FromStr;

use clap::Parser;
use tracing::warn;

use circadia_client::cli::{
    AlarmAction, BedtimeAction, Cli, Command, ConfigAction, SoundAction,
};
use circadia_client::commands::{self, alarm, bus, history, settings};
use circadia_client::config::ClientConfig;
use circadia_client::{BusClient, ClientError, ClientResult};
use circadia_core::{TracingConfig, TracingOutputFormat, init_tracing};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// Picks the log setup: JSON for the daemon, quiet compact output otherwise.
fn tracing_config(cli: &Cli, config: &ClientConfig) -> ClientResult<TracingConfig> {
    let debug = cli.debug || config.debug;
    match cli.command {
        Command::Daemon { ref log_format } => {
            let mut tracing = if debug {
                TracingConfig::cli_debug()
            } else {
                TracingConfig::daemon()
            };
            if let Some(format) = log_format {
                tracing = tracing.with_format(TracingOutputFormat::from_str(format)?);
            }
            Ok(tracing)
        }
        _ if debug => Ok(TracingConfig::cli_debug()),
        _ => Ok(TracingConfig::default()),
    }
}

async fn run(cli: Cli) -> ClientResult<()> {
    // Load configuration
    let (config, load_error) = match cli.config {
        Some(ref path) => (ClientConfig::load_from(path).map_err(ClientError::Config)?, None),
        None => match ClientConfig::load() {
            Ok(config) => (config, None),
            Err(e) => (ClientConfig::default(), Some(e)),
        },
    };
    let config = config.with_overrides(cli.socket_path.clone(), cli.database.clone());

    init_tracing(tracing_config(&cli, &config)?)?;
    if let Some(e) = load_error {
        warn!(error = %e, "Ignoring unreadable config file");
    }

    let client = BusClient::new(config.socket_path());

    match cli.command {
        Command::Daemon { .. } => commands::daemon::run(&config).await,
        Command::Sleep { state } => bus::sleep(&client, state.enabled()).await,
        Command::Stop => bus::stop(&client).await,
        Command::Snooze => bus::snooze(&client).await,
        Command::Send { raw } => {
            let sent = bus::send_raw(&client, &raw).await?;
            println!("Sent {}.", sent);
            Ok(())
        }
        Command::Alarm { action } => {
            let store = commands::open_store(&config)?;
            match action {
                AlarmAction::Add { time } => alarm::add(&store, time).map(|_| ()),
                AlarmAction::List => alarm::list(&store),
                AlarmAction::Edit { id, time } => alarm::edit(&store, id, time),
                AlarmAction::Enable { id } => alarm::set_enabled(&store, id, true),
                AlarmAction::Disable { id } => alarm::set_enabled(&store, id, false),
                AlarmAction::Remove { id } => alarm::remove(&store, id),
            }
        }
        Command::Bedtime { action } => {
            let store = commands::open_store(&config)?;
            match action {
                BedtimeAction::Set { time } => settings::set_bedtime(&store, &client, time).await,
                BedtimeAction::Notify { state } => {
                    settings::set_bedtime_notify(&store, &client, state.enabled()).await
                }
            }
        }
        Command::SmartWake { state } => {
            let store = commands::open_store(&config)?;
            settings::set_smart_wake(&store, &client, state.enabled()).await
        }
        Command::SnoozeSettings { enabled, duration } => {
            let store = commands::open_store(&config)?;
            settings::snooze_settings(&store, enabled, duration).map(|_| ())
        }
        Command::Sound { action } => {
            let store = commands::open_store(&config)?;
            match action {
                SoundAction::Set { path } => settings::set_sound(&store, &path).map(|_| ()),
                SoundAction::Clear => settings::clear_sound(&store),
                SoundAction::Preview { path } => {
                    settings::preview_sound(&config, &store, path.as_deref()).await
                }
            }
        }
        Command::History { days } => {
            let store = commands::open_store(&config)?;
            history::show(&store, days)
        }
        Command::Config { action } => match action {
            ConfigAction::Dump => commands::config::dump(&config),
            ConfigAction::Path => commands::config::path(),
        },
    }
}

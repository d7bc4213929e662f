// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of GridWatch.
//
// Licensed under the Creative Commons Attribution-NonCommercial-NoDerivatives 4.0 International
// (CC BY-NC-ND 4.0). You may use and share this file for non-commercial purposes only and you may not
// create derivatives. See <https://creativecommons.org/licenses/by-nc-nd/4.0/>.
//
// This software is provided "AS IS", without warranty of any kind.
//
// For commercial licensing, please contact: info@solare.cz

mod commands;
mod config;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// GridWatch - backup power monitor for Victron installations
#[derive(Parser, Debug)]
#[command(name = "gridwatch", version, about)]
#[command(
    long_about = "Polls a Victron installation, alerts a Telegram chat on grid and \
    inverter events, drives Tuya switches on grid loss/restore and ahead of \
    published outages.\n\
    \nExamples:\n  \
    gridwatch                              # Run the monitor (config.toml)\n  \
    gridwatch --config /etc/gridwatch.toml check-config\n  \
    gridwatch schedule show\n  \
    gridwatch simulate fixtures/outage.json --fast\n  \
    gridwatch devices off"
)]
struct Cli {
    /// Configuration file (TOML, or JSON by extension)
    #[arg(long, short, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the monitor loop (default)
    Run,

    /// Validate the configuration and print every issue
    CheckConfig,

    /// Inspect or refresh the outage schedule cache
    Schedule {
        #[command(subcommand)]
        action: ScheduleAction,
    },

    /// Replay a JSON list of snapshots through the monitor
    Simulate {
        /// Fixture file with telemetry snapshots
        #[arg(value_name = "FIXTURE")]
        fixture: PathBuf,

        /// Do not wait the refresh period between frames
        #[arg(long, default_value_t = false)]
        fast: bool,
    },

    /// Switch the configured Tuya devices once
    Devices {
        #[arg(value_enum)]
        state: DeviceState,
    },
}

#[derive(Subcommand, Debug)]
enum ScheduleAction {
    /// Print the cached schedules for today and tomorrow
    Show,
    /// Force a refresh, persist it and print the result
    Fetch,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum DeviceState {
    On,
    Off,
}

fn init_tracing(log_level: &str) {
    // RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let loaded = config::load(cli.config.as_deref())?;

    init_tracing(loaded.config.system.log_level.trim());

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("Failed to create tokio runtime");

    runtime.block_on(async move {
        match cli.command.unwrap_or(Command::Run) {
            Command::Run => commands::run(loaded).await,
            Command::CheckConfig => commands::check_config(&loaded),
            Command::Schedule {
                action: ScheduleAction::Show,
            } => commands::schedule_show(&loaded.config),
            Command::Schedule {
                action: ScheduleAction::Fetch,
            } => commands::schedule_fetch(&loaded.config).await,
            Command::Simulate { fixture, fast } => commands::simulate(loaded, &fixture, fast).await,
            Command::Devices { state } => {
                commands::devices(&loaded.config, state == DeviceState::On).await
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_default_command_is_run() {
        let cli = Cli::parse_from(["gridwatch"]);
        assert!(cli.command.is_none());
        assert!(cli.config.is_none());
    }

    #[test]
    fn test_subcommands_parse() {
        let cli = Cli::parse_from(["gridwatch", "--config", "x.toml", "devices", "off"]);
        assert_eq!(cli.config, Some(PathBuf::from("x.toml")));
        assert!(matches!(
            cli.command,
            Some(Command::Devices {
                state: DeviceState::Off
            })
        ));

        let cli = Cli::parse_from(["gridwatch", "simulate", "frames.json", "--fast"]);
        assert!(matches!(cli.command, Some(Command::Simulate { fast: true, .. })));

        let cli = Cli::parse_from(["gridwatch", "schedule", "fetch"]);
        assert!(matches!(
            cli.command,
            Some(Command::Schedule {
                action: ScheduleAction::Fetch
            })
        ));
    }
}

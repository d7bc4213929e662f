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

//! Shared data model for GridWatch: telemetry snapshots, outage schedules and
//! the configuration value object consumed by the decision core.

pub mod config;
pub mod schedule;
pub mod telemetry;

pub use config::{
    AlertThresholds, Config, DayNumbering, MonitorSettings, QuietPolicy, ScheduleConfig,
    SystemSettings, TelegramConfig, TuyaConfig, VictronConfig,
};
pub use schedule::{ClockTime, OutagePeriod, OutageSchedule, ScheduleError};
pub use telemetry::{GridState, Phase, StatusReading, TelemetrySnapshot, VeBusMode};

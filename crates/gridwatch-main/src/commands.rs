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

//! Subcommand bodies

use crate::config::{FileConfigProvider, LoadedConfig};
use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use gridwatch_adapters::{HttpCollaborators, ReplicateExtractor, TuyaClient};
use gridwatch_core::schedule::local_now;
use gridwatch_core::{
    ActuationReport, ActuatorController, ConfigProvider, DeviceOutcome, Monitor,
    OutageScheduleCache, ScheduleExtractor, ScriptedTelemetry, StaticConfig, SwitchState,
    TIMESTAMP_FORMAT,
};
use gridwatch_types::{Config, OutageSchedule};
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info, warn};

fn report_loaded(loaded: &LoadedConfig) {
    match &loaded.path {
        Some(path) => info!("✅ Loaded configuration from {}", path.display()),
        None => warn!("No configuration file found, using defaults with environment overrides"),
    }
    for issue in &loaded.validation.warnings {
        warn!("⚠️ {}", issue);
    }
    for issue in &loaded.validation.errors {
        error!("❌ {}", issue);
    }
}

fn ensure_valid(loaded: &LoadedConfig) -> Result<()> {
    if loaded.validation.has_errors() {
        bail!(
            "Configuration has {} error(s), run `gridwatch check-config` for details",
            loaded.validation.errors.len()
        );
    }
    Ok(())
}

/// File-backed configurations are hot-reloaded, env-only ones are fixed
fn provider(loaded: &LoadedConfig) -> Arc<dyn ConfigProvider> {
    match &loaded.path {
        Some(path) => Arc::new(FileConfigProvider::new(path.clone(), loaded.config.clone())),
        None => Arc::new(StaticConfig(loaded.config.clone())),
    }
}

fn log_summary(config: &Config) {
    info!("🚀 Starting GridWatch");
    info!("📋 Configuration Summary:");
    info!("   VRM installation: {}", config.victron.installation_id);
    info!(
        "   Refresh period: {}s, timezone: {}, language: {}",
        config.monitor.refresh_period_secs, config.monitor.timezone, config.monitor.language
    );
    info!(
        "   Battery alerts: low {}%, critical {}%",
        config.thresholds.battery_low_soc, config.thresholds.battery_critical_soc
    );
    info!("   Tuya devices: {}", config.tuya.device_ids().len());
    info!(
        "   Schedule automation: {} (queue {}, {} min lead)",
        if config.schedule.enabled { "on" } else { "off" },
        config.schedule.queue,
        config.schedule.pre_outage_minutes
    );
}

fn log_report(report: &ActuationReport) {
    for (id, outcome) in &report.devices {
        match outcome {
            DeviceOutcome::Reached { attempts } => {
                info!("🔌 {} is {} after {} attempt(s)", id, report.state, attempts);
            }
            DeviceOutcome::Failed { attempts } => {
                warn!("⚠️ {} did not reach {} after {} attempt(s)", id, report.state, attempts);
            }
        }
    }
}

pub async fn run(loaded: LoadedConfig) -> Result<()> {
    report_loaded(&loaded);
    ensure_valid(&loaded)?;
    log_summary(&loaded.config);

    let monitor = Monitor::new(provider(&loaded), Arc::new(HttpCollaborators));

    tokio::select! {
        () = monitor.run() => {}
        result = tokio::signal::ctrl_c() => {
            result.context("Failed to listen for Ctrl+C")?;
            info!("👋 Shutting down");
        }
    }
    Ok(())
}

pub fn check_config(loaded: &LoadedConfig) -> Result<()> {
    match &loaded.path {
        Some(path) => println!("Configuration: {}", path.display()),
        None => println!("Configuration: defaults with environment overrides"),
    }

    let validation = &loaded.validation;
    for issue in validation.errors.iter().chain(&validation.warnings) {
        println!("  {:<8} {issue}", issue.severity.label());
    }

    if loaded.validation.has_errors() {
        bail!("Configuration is invalid");
    }
    println!("Configuration is valid");
    Ok(())
}

fn describe(date: NaiveDate, schedule: Option<&OutageSchedule>) -> String {
    let day = date.format("%d.%m.%Y");
    match schedule {
        None => format!("{day}: unknown"),
        Some(s) if !s.has_outages() => format!("{day}: no outages"),
        Some(s) => {
            let periods: Vec<String> = s.periods.iter().map(ToString::to_string).collect();
            format!("{day}: {}", periods.join(", "))
        }
    }
}

pub fn schedule_show(config: &Config) -> Result<()> {
    let cache = OutageScheduleCache::load(config.system.schedule_cache_path());
    let today = local_now(config.monitor.tz()).date_naive();

    println!("Queue {}", config.schedule.queue);
    for date in [Some(today), today.succ_opt()].into_iter().flatten() {
        println!("  {}", describe(date, cache.get(date)));
    }
    match cache.last_updated() {
        Some(at) => println!("Last updated: {}", at.format(TIMESTAMP_FORMAT)),
        None => println!("Never updated"),
    }
    Ok(())
}

pub async fn schedule_fetch(config: &Config) -> Result<()> {
    let extractor = ReplicateExtractor::new(&config.schedule)
        .context("Schedule fetching is not configured")?;
    let tz = config.monitor.tz();

    let candidates = extractor.fetch_latest(tz).await?;
    if candidates.is_empty() {
        println!("No readable schedule found");
    } else {
        let mut cache = OutageScheduleCache::load(config.system.schedule_cache_path());
        let updated = cache.apply(candidates, local_now(tz).fixed_offset());
        cache.save()?;
        println!("{} schedule(s) changed", updated.len());
    }

    schedule_show(config)
}

pub async fn simulate(loaded: LoadedConfig, fixture: &Path, fast: bool) -> Result<()> {
    report_loaded(&loaded);
    ensure_valid(&loaded)?;

    let telemetry = ScriptedTelemetry::from_file(fixture)?;
    let frames = telemetry.len();
    let period = loaded.config.monitor.refresh_period();

    let mut monitor = Monitor::new(provider(&loaded), Arc::new(HttpCollaborators));
    let handle = monitor.handle();
    handle.start_simulation(Arc::new(telemetry));

    for frame in 1..=frames {
        info!("🎬 Frame {}/{}", frame, frames);
        if let Err(e) = monitor.run_cycle().await {
            error!("❌ Cycle failed: {:#}", e);
        }
        if let Some(report) = monitor.wait_for_actuation().await {
            log_report(&report);
        }
        if !fast && frame < frames {
            tokio::time::sleep(period).await;
        }
    }

    handle.stop_simulation();
    info!("🎬 Simulation finished after {} frame(s)", frames);
    Ok(())
}

pub async fn devices(config: &Config, on: bool) -> Result<()> {
    if !config.tuya.is_configured() {
        bail!("Tuya device control is not configured");
    }

    let transport = Arc::new(TuyaClient::new(&config.tuya)?);
    let controller = ActuatorController::from_config(transport, &config.tuya);
    let state = if on { SwitchState::On } else { SwitchState::Off };

    let report = controller.set_desired_state(state).await;
    log_report(&report);

    if !report.is_complete() {
        bail!("Failed to switch {}", report.failed_devices().join(", "));
    }
    println!("All devices are {state}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridwatch_types::OutagePeriod;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 1).unwrap()
    }

    #[test]
    fn test_describe_schedule() {
        assert_eq!(describe(date(), None), "01.05.2024: unknown");

        let empty = OutageSchedule::new(date(), "3.1", Vec::new());
        assert_eq!(describe(date(), Some(&empty)), "01.05.2024: no outages");

        let busy = OutageSchedule::new(
            date(),
            "3.1",
            vec![
                OutagePeriod::parse("08:00", "12:00").unwrap(),
                OutagePeriod::parse("20:00", "24:00").unwrap(),
            ],
        );
        assert_eq!(
            describe(date(), Some(&busy)),
            "01.05.2024: 08:00-12:00, 20:00-24:00"
        );
    }

    #[tokio::test]
    async fn test_devices_requires_tuya() {
        assert!(devices(&Config::default(), false).await.is_err());
    }
}

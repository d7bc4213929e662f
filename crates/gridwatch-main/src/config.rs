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

//! Configuration loading, validation and environment overrides

mod reload;
mod validation;

pub use reload::FileConfigProvider;
pub use validation::ValidationResult;

use anyhow::{Context, Result};
use gridwatch_types::Config;
use std::path::{Path, PathBuf};

/// Environment variable naming the configuration file
pub const CONFIG_ENV: &str = "GRIDWATCH_CONFIG";

const DEFAULT_FILES: [&str; 2] = ["config.toml", "config.json"];
const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Configuration plus where it came from
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: Config,
    /// Backing file, `None` when running from defaults and environment
    pub path: Option<PathBuf>,
    pub validation: ValidationResult,
}

/// Pick the configuration file: explicit path, `$GRIDWATCH_CONFIG`, then
/// `config.toml` / `config.json` in the working directory
pub fn resolve_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }

    if let Ok(path) = std::env::var(CONFIG_ENV)
        && !path.trim().is_empty()
    {
        return Some(PathBuf::from(path.trim()));
    }

    DEFAULT_FILES
        .iter()
        .map(PathBuf::from)
        .find(|path| path.is_file())
}

/// Parse a TOML or JSON (by extension) configuration file
pub fn load_file(path: &Path) -> Result<Config> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

    if is_json {
        serde_json::from_str(&text).with_context(|| format!("Failed to parse {}", path.display()))
    } else {
        toml::from_str(&text).with_context(|| format!("Failed to parse {}", path.display()))
    }
}

/// Load the configuration without logging; the caller reports the result
/// once tracing is installed.
pub fn load(explicit: Option<&Path>) -> Result<LoadedConfig> {
    let (config, path) = match resolve_path(explicit) {
        Some(path) => (load_file(&path)?, Some(path)),
        None => (from_env(), None),
    };

    let validation = validate_detailed(&config);
    Ok(LoadedConfig {
        config,
        path,
        validation,
    })
}

/// Defaults with environment variable overrides
pub fn from_env() -> Config {
    from_lookup(|key| std::env::var(key).ok())
}

fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Config {
    let mut config = Config::default();

    if let Some(id) = lookup("VRM_INSTALLATION_ID") {
        config.victron.installation_id = id;
    }
    if let Some(token) = lookup("VRM_API_TOKEN") {
        config.victron.api_token = token;
    }
    if let Some(token) = lookup("TELEGRAM_BOT_TOKEN") {
        config.telegram.bot_token = token;
    }
    if let Some(chat) = lookup("TELEGRAM_CHAT_ID") {
        config.telegram.chat_id = chat;
    }
    if let Some(period) = lookup("REFRESH_PERIOD_SECS")
        && let Ok(secs) = period.trim().parse::<u64>()
    {
        config.monitor.refresh_period_secs = secs;
    }
    if let Some(level) = lookup("LOG_LEVEL") {
        config.system.log_level = level.trim().to_lowercase();
    }

    config
}

fn check_ratio(result: &mut ValidationResult, field: &str, value: f64, min: f64, max: f64) {
    if !(min..=max).contains(&value) {
        result.add_error(field, format!("Must be between {min} and {max} (got {value})"));
    }
}

/// Validate configuration with field-level reporting
pub fn validate_detailed(config: &Config) -> ValidationResult {
    let mut result = ValidationResult::success();

    // Monitor
    if config.monitor.refresh_period_secs == 0 {
        result.add_error("monitor.refresh_period_secs", "Refresh period must be at least 1 second");
    }
    if config.monitor.timezone.trim().parse::<chrono_tz::Tz>().is_err() {
        result.add_error(
            "monitor.timezone",
            format!("Unknown timezone '{}'", config.monitor.timezone),
        );
    }

    // Thresholds
    let t = &config.thresholds;
    if t.nominal_voltage <= 0.0 {
        result.add_error("thresholds.nominal_voltage", "Nominal voltage must be positive");
    }
    check_ratio(&mut result, "thresholds.voltage_low_ratio", t.voltage_low_ratio, 0.0, 1.0);
    check_ratio(&mut result, "thresholds.voltage_high_ratio", t.voltage_high_ratio, 1.0, 2.0);
    check_ratio(&mut result, "thresholds.battery_low_soc", t.battery_low_soc, 0.0, 100.0);
    check_ratio(
        &mut result,
        "thresholds.battery_critical_soc",
        t.battery_critical_soc,
        0.0,
        100.0,
    );
    if t.battery_critical_soc > t.battery_low_soc {
        result.add_warning(
            "thresholds.battery_critical_soc",
            "Critical level is above the low level; the low alert will never fire first",
        );
    }
    if t.max_power_w.is_some_and(|p| p <= 0.0) {
        result.add_error("thresholds.max_power_w", "Maximum power must be positive");
    }
    if t.max_passthru_current_a.is_some_and(|a| a <= 0.0) {
        result.add_error(
            "thresholds.max_passthru_current_a",
            "Maximum passthru current must be positive",
        );
    }

    // Quiet policy
    let q = &config.quiet;
    for (field, hour) in [("quiet.hours_start", q.hours_start), ("quiet.hours_end", q.hours_end)] {
        if hour.is_some_and(|h| h > 23) {
            result.add_error(field, "Hour must be between 0 and 23");
        }
    }
    if q.hours_start.is_some() != q.hours_end.is_some() {
        result.add_warning(
            "quiet.hours_start",
            "Quiet hours need both hours_start and hours_end; the window is ignored",
        );
    }
    if let Some(day) = q.days.iter().find(|d| !(1..=7).contains(*d)) {
        result.add_error("quiet.days", format!("Weekday {day} is outside 1-7"));
    }

    // Collaborators
    if !config.victron.is_configured() {
        result.add_warning(
            "victron",
            "VRM installation ID or token missing; telemetry is disabled",
        );
    }
    if !config.telegram.is_configured() {
        result.add_warning(
            "telegram",
            "Bot token or chat ID missing; notifications are disabled",
        );
    }
    if config.tuya.max_attempts == 0 {
        result.add_error("tuya.max_attempts", "At least one attempt is required");
    }
    if !config.tuya.is_configured() {
        result.add_warning("tuya", "Tuya credentials or devices missing; device control is disabled");
    }

    // Schedule automation
    let s = &config.schedule;
    if s.enabled {
        if !s.is_configured() {
            result.add_warning(
                "schedule",
                "Replicate token, queue or image URLs missing; schedule automation is disabled",
            );
        }
        if !config.tuya.is_configured() {
            result.add_warning(
                "schedule.enabled",
                "Schedule automation needs Tuya device control",
            );
        }
        if s.image_urls.len() > 2 {
            result.add_warning("schedule.image_urls", "Only the first two images are read");
        }
    }
    if s.refresh_minutes == 0 {
        result.add_warning("schedule.refresh_minutes", "Refresh interval is raised to 1 minute");
    }
    if s.pre_outage_minutes > 24 * 60 {
        result.add_error("schedule.pre_outage_minutes", "Lead time cannot exceed one day");
    }

    // System
    if !LOG_LEVELS.contains(&config.system.log_level.trim().to_lowercase().as_str()) {
        result.add_error(
            "system.log_level",
            format!(
                "Invalid log level '{}' (must be one of: {})",
                config.system.log_level,
                LOG_LEVELS.join(", ")
            ),
        );
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn configured() -> Config {
        let mut config = Config::default();
        config.victron.installation_id = "12345".to_owned();
        config.victron.api_token = "vrm".to_owned();
        config.telegram.bot_token = "1:abc".to_owned();
        config.telegram.chat_id = "-100".to_owned();
        config.tuya.access_id = "id".to_owned();
        config.tuya.access_key = "key".to_owned();
        config.tuya.api_endpoint = "https://openapi.tuyaeu.com".to_owned();
        config.tuya.device_ids = vec!["dev1".to_owned()];
        config
    }

    #[test]
    fn test_defaults_only_warn() {
        let result = validate_detailed(&Config::default());
        assert!(result.valid);
        assert!(result.mentions("victron"));
        assert!(result.mentions("telegram"));
        assert!(result.mentions("tuya"));
        assert!(
            result
                .warnings
                .iter()
                .all(|w| w.severity.label() == "WARNING")
        );
    }

    #[test]
    fn test_configured_is_clean() {
        let result = validate_detailed(&configured());
        assert!(result.valid);
        assert!(result.warnings.is_empty(), "{:?}", result.warnings);
    }

    #[test]
    fn test_out_of_range_values() {
        let mut config = configured();
        config.monitor.refresh_period_secs = 0;
        config.monitor.timezone = "Mars/Olympus".to_owned();
        config.thresholds.voltage_low_ratio = 1.2;
        config.thresholds.battery_low_soc = 120.0;
        config.quiet.hours_start = Some(24);
        config.quiet.hours_end = Some(7);
        config.quiet.days = vec![0, 3];
        config.system.log_level = "loud".to_owned();

        let result = validate_detailed(&config);
        assert!(!result.valid);
        for field in [
            "monitor.refresh_period_secs",
            "monitor.timezone",
            "thresholds.voltage_low_ratio",
            "thresholds.battery_low_soc",
            "quiet.hours_start",
            "quiet.days",
            "system.log_level",
        ] {
            assert!(result.mentions(field), "missing issue for {field}");
        }
    }

    #[test]
    fn test_schedule_without_tuya_warns() {
        let mut config = configured();
        config.tuya.device_ids.clear();
        config.schedule.enabled = true;

        let result = validate_detailed(&config);
        assert!(result.valid);
        assert!(result.mentions("schedule.enabled"));
        assert!(result.mentions("schedule"));
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("VRM_INSTALLATION_ID", "777"),
            ("VRM_API_TOKEN", "tok"),
            ("TELEGRAM_CHAT_ID", "-42"),
            ("REFRESH_PERIOD_SECS", "15"),
            ("LOG_LEVEL", "DEBUG"),
        ]);
        let config = from_lookup(|key| vars.get(key).map(|v| (*v).to_owned()));

        assert_eq!(config.victron.installation_id, "777");
        assert_eq!(config.victron.api_token, "tok");
        assert_eq!(config.telegram.chat_id, "-42");
        assert!(config.telegram.bot_token.is_empty());
        assert_eq!(config.monitor.refresh_period_secs, 15);
        assert_eq!(config.system.log_level, "debug");
    }

    #[test]
    fn test_invalid_env_number_is_ignored() {
        let config = from_lookup(|key| (key == "REFRESH_PERIOD_SECS").then(|| "soon".to_owned()));
        assert_eq!(config.monitor.refresh_period_secs, 5);
    }

    #[test]
    fn test_load_toml_and_json() {
        let dir = tempfile::tempdir().unwrap();

        let toml_path = dir.path().join("gridwatch.toml");
        std::fs::write(
            &toml_path,
            "[monitor]\nrefresh_period_secs = 10\nlanguage = \"uk\"\n\n[tuya]\ndevice_ids = [\"a\", \"b\"]\n",
        )
        .unwrap();
        let config = load_file(&toml_path).unwrap();
        assert_eq!(config.monitor.refresh_period_secs, 10);
        assert_eq!(config.tuya.device_ids, vec!["a", "b"]);

        let json_path = dir.path().join("gridwatch.json");
        std::fs::write(&json_path, r#"{"schedule": {"enabled": true, "queue": "4.2"}}"#).unwrap();
        let config = load_file(&json_path).unwrap();
        assert!(config.schedule.enabled);
        assert_eq!(config.schedule.queue, "4.2");
        assert_eq!(config.schedule.refresh_minutes, 60);
    }

    #[test]
    fn test_explicit_path_wins() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(&path, "[system]\nlog_level = \"warn\"\n").unwrap();

        let loaded = load(Some(&path)).unwrap();
        assert_eq!(loaded.path.as_deref(), Some(path.as_path()));
        assert_eq!(loaded.config.system.log_level, "warn");
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load(Some(&dir.path().join("absent.toml"))).is_err());
    }
}

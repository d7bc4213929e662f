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

//! Configuration value object.
//!
//! The decision core treats this as read-only input that is re-read every
//! cycle. Loading, validation and environment overrides live in the binary.

use chrono_tz::Tz;
use gridwatch_i18n::Language;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// File name of the persisted outage schedule cache inside `system.data_dir`
pub const SCHEDULE_CACHE_FILE: &str = "outage_schedule_cache.json";

/// Complete GridWatch configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Victron VRM telemetry source
    pub victron: VictronConfig,

    /// Telegram notification target
    pub telegram: TelegramConfig,

    /// Polling loop settings
    pub monitor: MonitorSettings,

    /// Alert thresholds
    pub thresholds: AlertThresholds,

    /// Quiet hours / quiet days policy
    pub quiet: QuietPolicy,

    /// Tuya switches driven on grid loss/restore
    pub tuya: TuyaConfig,

    /// Outage schedule automation
    pub schedule: ScheduleConfig,

    /// Process-level settings
    pub system: SystemSettings,
}

/// Victron VRM API access
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VictronConfig {
    /// VRM installation ID
    pub installation_id: String,

    /// VRM access token
    pub api_token: String,

    /// VRM API base URL
    pub api_base_url: String,
}

impl Default for VictronConfig {
    fn default() -> Self {
        Self {
            installation_id: String::new(),
            api_token: String::new(),
            api_base_url: "https://vrmapi.victronenergy.com".to_owned(),
        }
    }
}

impl VictronConfig {
    #[must_use]
    pub fn is_configured(&self) -> bool {
        !self.installation_id.trim().is_empty() && !self.api_token.trim().is_empty()
    }

    /// Diagnostics endpoint of the configured installation
    #[must_use]
    pub fn diagnostics_url(&self) -> String {
        format!(
            "{}/v2/installations/{}/diagnostics",
            self.api_base_url.trim_end_matches('/'),
            self.installation_id.trim()
        )
    }
}

/// Telegram Bot API access
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    /// Bot token from BotFather
    pub bot_token: String,

    /// Target chat or channel ID (e.g. "-1234567890123")
    pub chat_id: String,

    /// Bot API base URL
    pub api_base_url: String,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            chat_id: String::new(),
            api_base_url: "https://api.telegram.org".to_owned(),
        }
    }
}

impl TelegramConfig {
    #[must_use]
    pub fn is_configured(&self) -> bool {
        !self.bot_token.trim().is_empty() && !self.chat_id.trim().is_empty()
    }
}

/// Polling loop settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorSettings {
    /// Delay between telemetry cycles (seconds)
    pub refresh_period_secs: u64,

    /// IANA timezone used for timestamps, quiet hours and schedules
    pub timezone: String,

    /// Notification language
    pub language: Language,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            refresh_period_secs: 5,
            timezone: "UTC".to_owned(),
            language: Language::English,
        }
    }
}

impl MonitorSettings {
    #[must_use]
    pub fn refresh_period(&self) -> Duration {
        Duration::from_secs(self.refresh_period_secs.max(1))
    }

    /// Configured timezone, UTC when the name is not a known zone
    #[must_use]
    pub fn tz(&self) -> Tz {
        self.timezone.trim().parse().unwrap_or(Tz::UTC)
    }
}

/// Hand-tuned alert thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertThresholds {
    /// Nominal grid voltage (V)
    pub nominal_voltage: f64,

    /// Input voltage below `nominal * ratio` raises a low-voltage alert
    pub voltage_low_ratio: f64,

    /// Input voltage above `nominal * ratio` raises a high-voltage alert
    pub voltage_high_ratio: f64,

    /// Battery SOC (%) at or below which a low-battery alert fires
    pub battery_low_soc: f64,

    /// Battery SOC (%) at or below which a critical-battery alert fires
    pub battery_critical_soc: f64,

    /// Maximum inverter output power per phase (W); disables the load check when unset
    pub max_power_w: Option<f64>,

    /// Maximum passthru current per phase (A); disables the passthru check when unset
    pub max_passthru_current_a: Option<f64>,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            nominal_voltage: 230.0,
            voltage_low_ratio: 0.90,
            voltage_high_ratio: 1.10,
            battery_low_soc: 20.0,
            battery_critical_soc: 10.0,
            max_power_w: None,
            max_passthru_current_a: None,
        }
    }
}

/// How weekday numbers in `quiet.days` are interpreted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DayNumbering {
    /// 1 = Monday .. 7 = Sunday
    #[default]
    MondayFirst,
    /// 1 = Sunday .. 7 = Saturday
    SundayFirst,
}

/// Quiet hours / quiet days: messages are still sent, but silently
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuietPolicy {
    /// First silent hour (0-23)
    pub hours_start: Option<u8>,

    /// First non-silent hour after the quiet window (0-23)
    pub hours_end: Option<u8>,

    /// Weekdays silenced all day
    pub days: Vec<u8>,

    /// Numbering used by `days`
    pub day_numbering: DayNumbering,
}

/// Tuya cloud switches
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TuyaConfig {
    /// Cloud project Access ID
    pub access_id: String,

    /// Cloud project Access Secret
    pub access_key: String,

    /// Regional endpoint (e.g. "https://openapi.tuyaeu.com")
    pub api_endpoint: String,

    /// Single-switch device IDs
    pub device_ids: Vec<String>,

    /// Command + verify attempts per device
    pub max_attempts: u32,

    /// Delay between a failed verification and the next attempt (seconds)
    pub verify_delay_secs: u64,
}

impl Default for TuyaConfig {
    fn default() -> Self {
        Self {
            access_id: String::new(),
            access_key: String::new(),
            api_endpoint: String::new(),
            device_ids: Vec::new(),
            max_attempts: 100,
            verify_delay_secs: 2,
        }
    }
}

impl TuyaConfig {
    #[must_use]
    pub fn is_configured(&self) -> bool {
        !self.access_id.trim().is_empty()
            && !self.access_key.trim().is_empty()
            && !self.api_endpoint.trim().is_empty()
            && !self.device_ids().is_empty()
    }

    /// Device IDs with blanks removed
    #[must_use]
    pub fn device_ids(&self) -> Vec<String> {
        self.device_ids
            .iter()
            .map(|id| id.trim())
            .filter(|id| !id.is_empty())
            .map(str::to_owned)
            .collect()
    }

    #[must_use]
    pub fn verify_delay(&self) -> Duration {
        Duration::from_secs(self.verify_delay_secs)
    }
}

/// Outage schedule automation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Switch Tuya devices off ahead of scheduled outages
    pub enabled: bool,

    /// Utility queue identifier (e.g. "3.1")
    pub queue: String,

    /// Replicate API token used for schedule image transcription
    pub replicate_api_token: String,

    /// Replicate model used for transcription
    pub replicate_model: String,

    /// Published schedule images to transcribe (at most two are read)
    pub image_urls: Vec<String>,

    /// Schedule refresh interval (minutes)
    pub refresh_minutes: u64,

    /// Lead time before an outage at which devices are switched off (minutes)
    pub pre_outage_minutes: u32,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            queue: "3.1".to_owned(),
            replicate_api_token: String::new(),
            replicate_model: "openai/gpt-5-nano".to_owned(),
            image_urls: Vec::new(),
            refresh_minutes: 60,
            pre_outage_minutes: 5,
        }
    }
}

impl ScheduleConfig {
    /// Credentials and sources present for fetching schedules
    #[must_use]
    pub fn is_configured(&self) -> bool {
        !self.replicate_api_token.trim().is_empty()
            && !self.queue.trim().is_empty()
            && self.image_urls.iter().any(|u| !u.trim().is_empty())
    }

    /// Regular refresh interval, never shorter than one minute
    #[must_use]
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs((self.refresh_minutes.saturating_mul(60)).max(60))
    }

    #[must_use]
    pub fn pre_outage_lead(&self) -> chrono::Duration {
        chrono::Duration::minutes(i64::from(self.pre_outage_minutes))
    }
}

/// Process-level settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemSettings {
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,

    /// Directory for persisted state
    pub data_dir: PathBuf,
}

impl Default for SystemSettings {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            data_dir: PathBuf::from("./data"),
        }
    }
}

impl SystemSettings {
    #[must_use]
    pub fn schedule_cache_path(&self) -> PathBuf {
        self.data_dir.join(SCHEDULE_CACHE_FILE)
    }
}

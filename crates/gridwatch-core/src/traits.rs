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

//! Contracts of the external collaborators the decision core drives.
//!
//! Business logic only ever sees these traits; the HTTP shims that implement
//! them live in `gridwatch-adapters`.

use anyhow::Result;
use async_trait::async_trait;
use chrono_tz::Tz;
use gridwatch_types::{
    Config, OutageSchedule, ScheduleConfig, TelegramConfig, TelemetrySnapshot, TuyaConfig,
    VictronConfig,
};
use std::sync::Arc;
use thiserror::Error;

/// Supplies one telemetry snapshot per polling cycle
#[async_trait]
pub trait TelemetrySource: Send + Sync {
    /// Read the current snapshot; `None` on any transport, timeout or parse error
    async fn fetch(&self) -> Option<TelemetrySnapshot>;

    /// Get data source name for logging
    fn name(&self) -> &str;
}

/// Delivery flags for a single outgoing message
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SendOptions {
    /// Deliver without a sound/notification on the receiving side
    pub silent: bool,
    /// Text is HTML formatted
    pub html: bool,
}

/// Message delivery (fire-and-forget from the core's point of view)
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, text: &str, options: SendOptions) -> Result<()>;

    fn name(&self) -> &str;
}

/// Failures reported by a device transport
#[derive(Debug, Error)]
pub enum TransportError {
    /// Session token expired or was rejected
    #[error("Authentication rejected: {0}")]
    Unauthorized(String),

    /// Network, HTTP or API-level failure
    #[error("Device request failed: {0}")]
    Request(String),
}

pub type TransportResult<T> = std::result::Result<T, TransportError>;

/// Command transport for remote binary switches
#[async_trait]
pub trait DeviceTransport: Send + Sync {
    /// Send a `switch` command with the given value
    async fn send_switch(&self, device_id: &str, on: bool) -> TransportResult<()>;

    /// Read the reported `switch` value; `Ok(None)` when the device does not report one
    async fn switch_status(&self, device_id: &str) -> TransportResult<Option<bool>>;

    /// Re-establish the API session
    async fn reauthenticate(&self) -> TransportResult<()>;

    fn name(&self) -> &str;
}

/// Image-to-schedule extraction
#[async_trait]
pub trait ScheduleExtractor: Send + Sync {
    /// Fetch the latest published schedules, already filtered by the configured queue.
    ///
    /// May return an empty list when nothing readable was found.
    async fn fetch_latest(&self, tz: Tz) -> Result<Vec<OutageSchedule>>;

    fn name(&self) -> &str;
}

/// Source of the configuration, consulted at the top of every cycle
pub trait ConfigProvider: Send + Sync {
    /// Current configuration. Implementations fall back to the last good
    /// configuration when the backing store is unreadable.
    fn current(&self) -> Config;
}

/// Fixed configuration, used by one-shot commands and tests
#[derive(Debug, Clone)]
pub struct StaticConfig(pub Config);

impl ConfigProvider for StaticConfig {
    fn current(&self) -> Config {
        self.0.clone()
    }
}

/// Builds the transport collaborators bound to each configuration section.
///
/// The monitor calls these only for sections that are configured, and again
/// whenever the bound section changes.
pub trait CollaboratorFactory: Send + Sync {
    fn telemetry(&self, config: &VictronConfig) -> Result<Arc<dyn TelemetrySource>>;

    fn notifier(&self, config: &TelegramConfig) -> Result<Arc<dyn Notifier>>;

    fn device_transport(&self, config: &TuyaConfig) -> Result<Arc<dyn DeviceTransport>>;

    fn schedule_extractor(&self, config: &ScheduleConfig) -> Result<Arc<dyn ScheduleExtractor>>;
}

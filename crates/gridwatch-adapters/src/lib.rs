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

//! HTTP transports behind the GridWatch collaborator traits.
//!
//! - [`VrmClient`]: Victron VRM diagnostics as telemetry snapshots
//! - [`TelegramNotifier`]: alert delivery through a Telegram bot
//! - [`TuyaClient`]: signed Tuya cloud calls for single-switch devices
//! - [`ReplicateExtractor`]: schedule image transcription
//!
//! [`HttpCollaborators`] wires them into the monitor.

pub mod errors;
pub mod replicate;
pub mod telegram;
pub mod tuya;
pub mod vrm;

pub use errors::{
    ReplicateError, ReplicateResult, TelegramError, TelegramResult, TuyaError, TuyaResult,
    VrmError, VrmResult,
};
pub use replicate::ReplicateExtractor;
pub use telegram::TelegramNotifier;
pub use tuya::TuyaClient;
pub use vrm::VrmClient;

use anyhow::Result;
use gridwatch_core::{
    CollaboratorFactory, DeviceTransport, Notifier, ScheduleExtractor, TelemetrySource,
};
use gridwatch_types::{ScheduleConfig, TelegramConfig, TuyaConfig, VictronConfig};
use std::sync::Arc;

/// Builds the production HTTP collaborators
#[derive(Debug, Clone, Copy, Default)]
pub struct HttpCollaborators;

impl CollaboratorFactory for HttpCollaborators {
    fn telemetry(&self, config: &VictronConfig) -> Result<Arc<dyn TelemetrySource>> {
        Ok(Arc::new(VrmClient::new(config)?))
    }

    fn notifier(&self, config: &TelegramConfig) -> Result<Arc<dyn Notifier>> {
        Ok(Arc::new(TelegramNotifier::new(config)?))
    }

    fn device_transport(&self, config: &TuyaConfig) -> Result<Arc<dyn DeviceTransport>> {
        Ok(Arc::new(TuyaClient::new(config)?))
    }

    fn schedule_extractor(&self, config: &ScheduleConfig) -> Result<Arc<dyn ScheduleExtractor>> {
        Ok(Arc::new(ReplicateExtractor::new(config)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factory_rejects_unconfigured_sections() {
        let factory = HttpCollaborators;
        assert!(factory.telemetry(&VictronConfig::default()).is_err());
        assert!(factory.notifier(&TelegramConfig::default()).is_err());
        assert!(factory.device_transport(&TuyaConfig::default()).is_err());
        assert!(factory.schedule_extractor(&ScheduleConfig::default()).is_err());
    }

    #[test]
    fn test_factory_builds_configured_sections() {
        let factory = HttpCollaborators;
        let telemetry = factory
            .telemetry(&VictronConfig {
                installation_id: "1".to_owned(),
                api_token: "t".to_owned(),
                ..VictronConfig::default()
            })
            .unwrap();
        assert_eq!(telemetry.name(), "Victron VRM");

        let transport = factory
            .device_transport(&TuyaConfig {
                access_id: "id".to_owned(),
                access_key: "key".to_owned(),
                api_endpoint: "https://openapi.tuyaeu.com".to_owned(),
                ..TuyaConfig::default()
            })
            .unwrap();
        assert_eq!(transport.name(), "Tuya");
    }
}

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

//! Actuator controller: drives every configured switch to a desired state
//! with bounded retry-and-verify.

use crate::traits::{DeviceTransport, TransportError};
use futures_util::future::join_all;
use gridwatch_types::TuyaConfig;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Desired switch position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SwitchState {
    On,
    Off,
}

impl SwitchState {
    #[must_use]
    pub fn as_bool(self) -> bool {
        matches!(self, Self::On)
    }
}

impl fmt::Display for SwitchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::On => f.write_str("ON"),
            Self::Off => f.write_str("OFF"),
        }
    }
}

/// Result of one device's retry loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceOutcome {
    /// Verified in the desired state after `attempts` attempts
    Reached { attempts: u32 },
    /// Retry budget exhausted
    Failed { attempts: u32 },
}

/// Summary of one `set_desired_state` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActuationReport {
    pub state: SwitchState,
    pub devices: Vec<(String, DeviceOutcome)>,
}

impl ActuationReport {
    /// All devices verified in the desired state
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.devices
            .iter()
            .all(|(_, outcome)| matches!(outcome, DeviceOutcome::Reached { .. }))
    }

    /// Devices that never reached the desired state
    #[must_use]
    pub fn failed_devices(&self) -> Vec<&str> {
        self.devices
            .iter()
            .filter(|(_, outcome)| matches!(outcome, DeviceOutcome::Failed { .. }))
            .map(|(id, _)| id.as_str())
            .collect()
    }
}

/// Drives a fixed set of remote switches.
///
/// Device membership is fixed at construction; a changed device list means a
/// new controller.
#[derive(Clone)]
pub struct ActuatorController {
    transport: Arc<dyn DeviceTransport>,
    device_ids: Vec<String>,
    max_attempts: u32,
    verify_delay: Duration,
}

impl fmt::Debug for ActuatorController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActuatorController")
            .field("transport", &self.transport.name())
            .field("device_ids", &self.device_ids)
            .field("max_attempts", &self.max_attempts)
            .field("verify_delay", &self.verify_delay)
            .finish()
    }
}

impl ActuatorController {
    pub fn new(
        transport: Arc<dyn DeviceTransport>,
        device_ids: Vec<String>,
        max_attempts: u32,
        verify_delay: Duration,
    ) -> Self {
        Self {
            transport,
            device_ids,
            max_attempts: max_attempts.max(1),
            verify_delay,
        }
    }

    /// Controller for the devices and retry settings of a Tuya section
    pub fn from_config(transport: Arc<dyn DeviceTransport>, config: &TuyaConfig) -> Self {
        Self::new(
            transport,
            config.device_ids(),
            config.max_attempts,
            config.verify_delay(),
        )
    }

    #[must_use]
    pub fn device_ids(&self) -> &[String] {
        &self.device_ids
    }

    /// Drive every device to `state` concurrently and wait for all of them.
    ///
    /// Never fails: exhausted retries are logged and reported.
    pub async fn set_desired_state(&self, state: SwitchState) -> ActuationReport {
        info!(
            "🔌 Setting {} device(s) to {} via {}",
            self.device_ids.len(),
            state,
            self.transport.name()
        );

        let outcomes = join_all(
            self.device_ids
                .iter()
                .map(|device_id| self.drive_device(device_id, state)),
        )
        .await;

        let report = ActuationReport {
            state,
            devices: self.device_ids.iter().cloned().zip(outcomes).collect(),
        };

        if report.is_complete() {
            info!("✅ All devices set to {}", state);
        } else {
            error!(
                "❌ Devices not set to {}: {:?}",
                state,
                report.failed_devices()
            );
        }
        report
    }

    async fn drive_device(&self, device_id: &str, state: SwitchState) -> DeviceOutcome {
        let desired = state.as_bool();
        let mut reauthenticated = false;

        for attempt in 1..=self.max_attempts {
            info!(
                "🔁 Attempt {}/{} to set device {} to {}",
                attempt, self.max_attempts, device_id, state
            );

            match self.transport.send_switch(device_id, desired).await {
                Ok(()) => info!("📤 Command sent to device {}", device_id),
                Err(TransportError::Unauthorized(msg)) if !reauthenticated => {
                    warn!("🔑 Token rejected for {} ({}), re-authenticating", device_id, msg);
                    reauthenticated = true;
                    self.reauthenticate().await;
                    if let Err(e) = self.transport.send_switch(device_id, desired).await {
                        error!(
                            "❌ Failed to send command to {} after re-authentication: {}",
                            device_id, e
                        );
                    }
                }
                Err(e) => error!("❌ Failed to send command to {}: {}", device_id, e),
            }

            match self.transport.switch_status(device_id).await {
                Ok(Some(reported)) if reported == desired => {
                    info!("✅ Device {} state verified: {}", device_id, state);
                    return DeviceOutcome::Reached { attempts: attempt };
                }
                Ok(Some(_)) => warn!("⏳ Device {} not in desired state yet", device_id),
                Ok(None) => warn!("⚠️ Device {} reported no switch value", device_id),
                Err(TransportError::Unauthorized(msg)) if !reauthenticated => {
                    warn!("🔑 Token rejected for {} ({}), re-authenticating", device_id, msg);
                    reauthenticated = true;
                    self.reauthenticate().await;
                }
                Err(e) => error!("❌ Unable to verify device {} state: {}", device_id, e),
            }

            if attempt < self.max_attempts {
                tokio::time::sleep(self.verify_delay).await;
            }
        }

        error!(
            "❌ Failed to set device {} to {} after {} attempts",
            device_id, state, self.max_attempts
        );
        DeviceOutcome::Failed {
            attempts: self.max_attempts,
        }
    }

    async fn reauthenticate(&self) {
        match self.transport.reauthenticate().await {
            Ok(()) => info!("🔑 Re-authenticated with {}", self.transport.name()),
            Err(e) => error!("❌ Failed to re-authenticate: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::TransportResult;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::HashMap;

    /// Fake transport: a device reaches the commanded state after `lag` sends
    #[derive(Default)]
    struct FakeTransport {
        lag: HashMap<String, u32>,
        sends: Mutex<HashMap<String, u32>>,
        state: Mutex<HashMap<String, bool>>,
        unauthorized_sends: Mutex<u32>,
        reauths: Mutex<u32>,
    }

    #[async_trait]
    impl DeviceTransport for FakeTransport {
        async fn send_switch(&self, device_id: &str, on: bool) -> TransportResult<()> {
            {
                let mut remaining = self.unauthorized_sends.lock();
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(TransportError::Unauthorized("token invalid".to_owned()));
                }
            }
            let mut sends = self.sends.lock();
            let count = sends.entry(device_id.to_owned()).or_insert(0);
            *count += 1;
            if *count > self.lag.get(device_id).copied().unwrap_or(0) {
                self.state.lock().insert(device_id.to_owned(), on);
            }
            Ok(())
        }

        async fn switch_status(&self, device_id: &str) -> TransportResult<Option<bool>> {
            Ok(self.state.lock().get(device_id).copied())
        }

        async fn reauthenticate(&self) -> TransportResult<()> {
            *self.reauths.lock() += 1;
            Ok(())
        }

        fn name(&self) -> &str {
            "fake"
        }
    }

    fn controller(transport: Arc<FakeTransport>, ids: &[&str], attempts: u32) -> ActuatorController {
        ActuatorController::new(
            transport,
            ids.iter().map(|s| (*s).to_owned()).collect(),
            attempts,
            Duration::from_secs(2),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_reaches_state_first_attempt() {
        let transport = Arc::new(FakeTransport::default());
        let report = controller(transport.clone(), &["a", "b"], 5)
            .set_desired_state(SwitchState::On)
            .await;

        assert!(report.is_complete());
        assert_eq!(report.devices[0], ("a".to_owned(), DeviceOutcome::Reached { attempts: 1 }));
        assert_eq!(transport.state.lock().get("b"), Some(&true));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_until_verified() {
        let transport = Arc::new(FakeTransport {
            lag: HashMap::from([("slow".to_owned(), 3)]),
            ..FakeTransport::default()
        });
        let report = controller(transport.clone(), &["slow", "fast"], 10)
            .set_desired_state(SwitchState::Off)
            .await;

        assert!(report.is_complete());
        assert_eq!(report.devices[0].1, DeviceOutcome::Reached { attempts: 4 });
        assert_eq!(report.devices[1].1, DeviceOutcome::Reached { attempts: 1 });
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_budget_reports_failure() {
        let transport = Arc::new(FakeTransport {
            lag: HashMap::from([("stuck".to_owned(), u32::MAX)]),
            ..FakeTransport::default()
        });
        let report = controller(transport.clone(), &["stuck", "ok"], 3)
            .set_desired_state(SwitchState::On)
            .await;

        assert!(!report.is_complete());
        assert_eq!(report.failed_devices(), vec!["stuck"]);
        assert_eq!(transport.sends.lock().get("stuck"), Some(&3));
        assert_eq!(transport.state.lock().get("ok"), Some(&true));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reauthenticates_once_without_resetting_budget() {
        let transport = Arc::new(FakeTransport {
            lag: HashMap::from([("dev".to_owned(), u32::MAX)]),
            unauthorized_sends: Mutex::new(u32::MAX),
            ..FakeTransport::default()
        });
        let report = controller(transport.clone(), &["dev"], 4)
            .set_desired_state(SwitchState::Off)
            .await;

        assert_eq!(*transport.reauths.lock(), 1);
        assert_eq!(report.devices[0].1, DeviceOutcome::Failed { attempts: 4 });
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_after_token_refresh() {
        let transport = Arc::new(FakeTransport {
            unauthorized_sends: Mutex::new(1),
            ..FakeTransport::default()
        });
        let report = controller(transport.clone(), &["dev"], 4)
            .set_desired_state(SwitchState::On)
            .await;

        assert_eq!(*transport.reauths.lock(), 1);
        assert_eq!(report.devices[0].1, DeviceOutcome::Reached { attempts: 1 });
    }

    #[test]
    fn test_switch_state_display() {
        assert_eq!(SwitchState::On.to_string(), "ON");
        assert!(!SwitchState::Off.as_bool());
    }
}

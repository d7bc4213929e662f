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

//! Victron VRM diagnostics client

use crate::errors::{VrmError, VrmResult};
use async_trait::async_trait;
use gridwatch_core::TelemetrySource;
use gridwatch_types::{StatusReading, TelemetrySnapshot, VeBusMode, VictronConfig};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use tracing::{debug, error, trace};

pub const GRID_ALARM_ID: i64 = 559;
pub const VE_BUS_ERROR_ID: i64 = 41;
pub const VE_BUS_STATE_ID: i64 = 40;
pub const SOC_ID: i64 = 51;
/// Input voltage L1..L3
pub const INPUT_VOLTAGE_IDS: [i64; 3] = [8, 9, 10];
/// Output voltage L1..L3
pub const OUTPUT_VOLTAGE_IDS: [i64; 3] = [20, 21, 22];
/// Output current L1..L3
pub const OUTPUT_CURRENT_IDS: [i64; 3] = [23, 24, 25];

#[derive(Debug, Deserialize)]
struct DiagnosticsResponse {
    #[serde(default)]
    records: Vec<DiagnosticRecord>,
}

#[derive(Debug, Deserialize)]
struct DiagnosticRecord {
    #[serde(rename = "idDataAttribute")]
    id: i64,
    #[serde(rename = "rawValue", default)]
    raw_value: Value,
    #[serde(rename = "formattedValue", default)]
    formatted_value: Option<String>,
}

impl DiagnosticRecord {
    /// `rawValue` comes as a number or a numeric string depending on the attribute
    fn number(&self) -> Option<f64> {
        match &self.raw_value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    fn code(&self) -> Option<i64> {
        self.number().map(|v| v.round() as i64)
    }

    fn status(&self) -> Option<StatusReading> {
        let label = self.formatted_value.clone().unwrap_or_default();
        self.code().map(|code| StatusReading::new(code, label))
    }
}

/// Reads one installation's diagnostics as a [`TelemetrySnapshot`]
#[derive(Clone)]
pub struct VrmClient {
    url: String,
    token: String,
    client: Client,
}

impl fmt::Debug for VrmClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VrmClient")
            .field("url", &self.url)
            .finish_non_exhaustive()
    }
}

impl VrmClient {
    pub fn new(config: &VictronConfig) -> VrmResult<Self> {
        if !config.is_configured() {
            return Err(VrmError::ConfigError(
                "VRM installation ID and access token are required".to_owned(),
            ));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| VrmError::ConfigError(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            url: config.diagnostics_url(),
            token: config.api_token.trim().to_owned(),
            client,
        })
    }

    /// Fetch and decode the diagnostics of the installation
    pub async fn diagnostics(&self) -> VrmResult<TelemetrySnapshot> {
        debug!("🔍 [VRM] Fetching diagnostics: {}", self.url);

        let response = self
            .client
            .get(&self.url)
            .header("x-authorization", format!("Token {}", self.token))
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => {
                let body = response.json::<DiagnosticsResponse>().await?;
                trace!("   {} diagnostic records", body.records.len());
                Ok(snapshot_from_records(&body.records))
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(VrmError::AuthenticationFailed),
            status => {
                let message = response.text().await.unwrap_or_default();
                Err(VrmError::ApiError {
                    status: status.as_u16(),
                    message,
                })
            }
        }
    }
}

fn snapshot_from_records(records: &[DiagnosticRecord]) -> TelemetrySnapshot {
    let mut snapshot = TelemetrySnapshot::default();

    for record in records {
        match record.id {
            GRID_ALARM_ID => snapshot.grid = record.status(),
            VE_BUS_ERROR_ID => snapshot.ve_bus_error = record.status(),
            VE_BUS_STATE_ID => snapshot.ve_bus_mode = record.code().map(VeBusMode::from),
            SOC_ID => snapshot.battery_soc = record.number(),
            id => {
                if let Some(i) = INPUT_VOLTAGE_IDS.iter().position(|&x| x == id) {
                    snapshot.input_voltage[i] = record.number();
                } else if let Some(i) = OUTPUT_VOLTAGE_IDS.iter().position(|&x| x == id) {
                    snapshot.output_voltage[i] = record.number();
                } else if let Some(i) = OUTPUT_CURRENT_IDS.iter().position(|&x| x == id) {
                    snapshot.output_current[i] = record.number();
                }
            }
        }
    }

    snapshot
}

#[async_trait]
impl TelemetrySource for VrmClient {
    async fn fetch(&self) -> Option<TelemetrySnapshot> {
        match self.diagnostics().await {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                error!("❌ [VRM] Diagnostics fetch failed: {}", e);
                None
            }
        }
    }

    fn name(&self) -> &str {
        "Victron VRM"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridwatch_types::{GridState, Phase};
    use mockito::Server;
    use serde_json::json;

    fn config(server: &Server) -> VictronConfig {
        VictronConfig {
            installation_id: "12345".to_owned(),
            api_token: "secret".to_owned(),
            api_base_url: server.url(),
        }
    }

    #[tokio::test]
    async fn test_diagnostics_maps_records() {
        let mut server = Server::new_async().await;

        let mock = server
            .mock("GET", "/v2/installations/12345/diagnostics")
            .match_header("x-authorization", "Token secret")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "success": true,
                    "records": [
                        {"idDataAttribute": 559, "rawValue": "2", "formattedValue": "Alarm"},
                        {"idDataAttribute": 41, "rawValue": 0, "formattedValue": "No error"},
                        {"idDataAttribute": 40, "rawValue": "9", "formattedValue": "Passthru"},
                        {"idDataAttribute": 51, "rawValue": 87.5, "formattedValue": "87.5 %"},
                        {"idDataAttribute": 9, "rawValue": 231.2, "formattedValue": "231.2 V"},
                        {"idDataAttribute": 22, "rawValue": 229.0, "formattedValue": "229 V"},
                        {"idDataAttribute": 23, "rawValue": 4.2, "formattedValue": "4.2 A"},
                        {"idDataAttribute": 999, "rawValue": 1, "formattedValue": "ignored"}
                    ]
                })
                .to_string(),
            )
            .create_async()
            .await;

        let client = VrmClient::new(&config(&server)).unwrap();
        let snapshot = client.diagnostics().await.unwrap();

        mock.assert_async().await;
        assert_eq!(snapshot.grid_state(), Some(GridState::Down));
        assert_eq!(snapshot.grid.as_ref().unwrap().label, "Alarm");
        assert_eq!(snapshot.ve_bus_error.as_ref().unwrap().code, 0);
        assert!(snapshot.is_passthru());
        assert_eq!(snapshot.battery_soc, Some(87.5));
        assert_eq!(snapshot.input_voltage(Phase::L2), Some(231.2));
        assert_eq!(snapshot.input_voltage(Phase::L1), None);
        assert_eq!(snapshot.output_voltage(Phase::L3), Some(229.0));
        assert_eq!(snapshot.output_current(Phase::L1), Some(4.2));
    }

    #[tokio::test]
    async fn test_fetch_returns_none_on_auth_failure() {
        let mut server = Server::new_async().await;

        let mock = server
            .mock("GET", "/v2/installations/12345/diagnostics")
            .with_status(401)
            .with_body("{\"success\":false}")
            .expect(2)
            .create_async()
            .await;

        let client = VrmClient::new(&config(&server)).unwrap();
        assert!(matches!(
            client.diagnostics().await,
            Err(VrmError::AuthenticationFailed)
        ));
        assert!(client.fetch().await.is_none());

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_fetch_returns_none_on_malformed_body() {
        let mut server = Server::new_async().await;

        let _mock = server
            .mock("GET", "/v2/installations/12345/diagnostics")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body("not json")
            .create_async()
            .await;

        let client = VrmClient::new(&config(&server)).unwrap();
        assert!(client.fetch().await.is_none());
    }

    #[test]
    fn test_unconfigured_is_rejected() {
        assert!(matches!(
            VrmClient::new(&VictronConfig::default()),
            Err(VrmError::ConfigError(_))
        ));
    }
}

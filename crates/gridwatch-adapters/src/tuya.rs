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

//! Tuya cloud OpenAPI client for single-switch devices.
//!
//! Requests are signed with HMAC-SHA256 over
//! `client_id [+ access_token] + t + stringToSign`, where `stringToSign` is
//! `METHOD\nsha256(body)\n\npath`. The access token is cached and dropped as
//! soon as the cloud reports it invalid.

use crate::errors::{TuyaError, TuyaResult};
use async_trait::async_trait;
use chrono::Utc;
use gridwatch_core::{DeviceTransport, TransportResult};
use gridwatch_types::TuyaConfig;
use hmac::{Hmac, Mac};
use parking_lot::Mutex;
use reqwest::{Client, Method};
use serde::Deserialize;
use serde_json::{Value, json};
use sha2::{Digest, Sha256};
use std::fmt;
use std::time::Duration;
use tracing::{debug, info, warn};

type HmacSha256 = Hmac<Sha256>;

const TOKEN_PATH: &str = "/v1.0/token?grant_type=1";
/// Business code returned for an expired or unknown access token
const TOKEN_INVALID_CODE: i64 = 1010;
const SWITCH_CODE: &str = "switch";

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    code: Option<i64>,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    result: Value,
}

#[derive(Debug, Deserialize)]
struct TokenResult {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct StatusEntry {
    code: String,
    value: Value,
}

fn content_sha256(body: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(body);
    format!("{:x}", hasher.finalize())
}

fn string_to_sign(method: &Method, body: &[u8], path: &str) -> String {
    format!("{}\n{}\n\n{}", method.as_str(), content_sha256(body), path)
}

/// Uppercase hex HMAC-SHA256 of `payload`
fn sign(secret: &str, payload: &str) -> TuyaResult<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| TuyaError::ConfigError(format!("Invalid access secret: {e}")))?;
    mac.update(payload.as_bytes());
    Ok(format!("{:X}", mac.finalize().into_bytes()))
}

pub struct TuyaClient {
    endpoint: String,
    access_id: String,
    access_key: String,
    client: Client,
    token: Mutex<Option<String>>,
}

impl fmt::Debug for TuyaClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TuyaClient")
            .field("endpoint", &self.endpoint)
            .field("access_id", &self.access_id)
            .finish_non_exhaustive()
    }
}

impl TuyaClient {
    pub fn new(config: &TuyaConfig) -> TuyaResult<Self> {
        if config.access_id.trim().is_empty()
            || config.access_key.trim().is_empty()
            || config.api_endpoint.trim().is_empty()
        {
            return Err(TuyaError::ConfigError(
                "Access ID, access secret and endpoint are required".to_owned(),
            ));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| TuyaError::ConfigError(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            endpoint: config.api_endpoint.trim().trim_end_matches('/').to_owned(),
            access_id: config.access_id.trim().to_owned(),
            access_key: config.access_key.trim().to_owned(),
            client,
            token: Mutex::new(None),
        })
    }

    /// Request a fresh access token, replacing the cached one
    pub async fn refresh_token(&self) -> TuyaResult<String> {
        self.token.lock().take();

        let result = self.call(Method::GET, TOKEN_PATH, None, None).await?;
        let token: TokenResult = serde_json::from_value(result)
            .map_err(|e| TuyaError::InvalidResponse(format!("token result: {e}")))?;

        info!("🔑 [TUYA] Obtained access token");
        *self.token.lock() = Some(token.access_token.clone());
        Ok(token.access_token)
    }

    async fn access_token(&self) -> TuyaResult<String> {
        let cached = self.token.lock().clone();
        match cached {
            Some(token) => Ok(token),
            None => self.refresh_token().await,
        }
    }

    async fn call(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        token: Option<&str>,
    ) -> TuyaResult<Value> {
        let body_bytes = match body {
            Some(b) => serde_json::to_vec(b)
                .map_err(|e| TuyaError::InvalidResponse(format!("request body: {e}")))?,
            None => Vec::new(),
        };

        let t = Utc::now().timestamp_millis().to_string();
        let payload = format!(
            "{}{}{}{}",
            self.access_id,
            token.unwrap_or_default(),
            t,
            string_to_sign(&method, &body_bytes, path)
        );
        let signature = sign(&self.access_key, &payload)?;

        debug!("🔌 [TUYA] {} {}", method, path);
        let mut request = self
            .client
            .request(method, format!("{}{}", self.endpoint, path))
            .header("client_id", &self.access_id)
            .header("sign", signature)
            .header("t", &t)
            .header("sign_method", "HMAC-SHA256");
        if let Some(token) = token {
            request = request.header("access_token", token);
        }
        if body.is_some() {
            request = request
                .header("Content-Type", "application/json")
                .body(body_bytes);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(TuyaError::ApiError {
                code: i64::from(status.as_u16()),
                message,
            });
        }

        let envelope: Envelope = response.json().await?;
        if envelope.success {
            return Ok(envelope.result);
        }

        let message = envelope.msg.unwrap_or_default();
        match envelope.code {
            Some(TOKEN_INVALID_CODE) => Err(TuyaError::Unauthorized(message)),
            code => Err(TuyaError::ApiError {
                code: code.unwrap_or_default(),
                message,
            }),
        }
    }

    async fn authorized_call(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> TuyaResult<Value> {
        let token = self.access_token().await?;
        let result = self.call(method, path, body, Some(&token)).await;
        if let Err(TuyaError::Unauthorized(msg)) = &result {
            warn!("⚠️ [TUYA] Access token rejected: {}", msg);
            self.token.lock().take();
        }
        result
    }

    /// Send a `switch` command to one device
    pub async fn send_switch_command(&self, device_id: &str, on: bool) -> TuyaResult<()> {
        let path = format!("/v1.0/iot-03/devices/{device_id}/commands");
        let body = json!({ "commands": [{ "code": SWITCH_CODE, "value": on }] });

        let result = self.authorized_call(Method::POST, &path, Some(&body)).await?;
        if result == Value::Bool(false) {
            return Err(TuyaError::InvalidResponse(format!(
                "command not accepted by {device_id}"
            )));
        }
        Ok(())
    }

    /// Reported `switch` value of one device
    pub async fn switch_value(&self, device_id: &str) -> TuyaResult<Option<bool>> {
        let path = format!("/v1.0/iot-03/devices/{device_id}/status");
        let result = self.authorized_call(Method::GET, &path, None).await?;

        let entries: Vec<StatusEntry> = serde_json::from_value(result)
            .map_err(|e| TuyaError::InvalidResponse(format!("status result: {e}")))?;

        Ok(entries
            .into_iter()
            .find(|entry| entry.code == SWITCH_CODE)
            .and_then(|entry| entry.value.as_bool()))
    }
}

#[async_trait]
impl DeviceTransport for TuyaClient {
    async fn send_switch(&self, device_id: &str, on: bool) -> TransportResult<()> {
        Ok(self.send_switch_command(device_id, on).await?)
    }

    async fn switch_status(&self, device_id: &str) -> TransportResult<Option<bool>> {
        Ok(self.switch_value(device_id).await?)
    }

    async fn reauthenticate(&self) -> TransportResult<()> {
        self.refresh_token().await?;
        Ok(())
    }

    fn name(&self) -> &str {
        "Tuya"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridwatch_core::TransportError;
    use mockito::{Matcher, Server, ServerGuard};

    fn client(server: &Server) -> TuyaClient {
        TuyaClient::new(&TuyaConfig {
            access_id: "client".to_owned(),
            access_key: "secret".to_owned(),
            api_endpoint: server.url(),
            device_ids: vec!["dev1".to_owned()],
            ..TuyaConfig::default()
        })
        .unwrap()
    }

    async fn token_mock(server: &mut ServerGuard, hits: usize) -> mockito::Mock {
        server
            .mock("GET", "/v1.0/token")
            .match_query(Matcher::UrlEncoded("grant_type".into(), "1".into()))
            .match_header("client_id", "client")
            .match_header("sign_method", "HMAC-SHA256")
            .match_header("access_token", Matcher::Missing)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "success": true,
                    "t": 1,
                    "result": {"access_token": "tok", "expire_time": 7200, "uid": "u"}
                })
                .to_string(),
            )
            .expect(hits)
            .create_async()
            .await
    }

    #[test]
    fn test_signature() {
        let payload = format!(
            "client1700000000000{}",
            string_to_sign(&Method::GET, b"", TOKEN_PATH)
        );
        assert_eq!(
            string_to_sign(&Method::GET, b"", TOKEN_PATH),
            "GET\ne3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855\n\n/v1.0/token?grant_type=1"
        );
        assert_eq!(
            sign("secret", &payload).unwrap(),
            "AF2D781BBC570A91B529BBFF7CFE5C2BBA595904016B31D6BD47EEB5ED2CB62B"
        );
    }

    #[tokio::test]
    async fn test_send_switch_uses_cached_token() {
        let mut server = Server::new_async().await;
        let token = token_mock(&mut server, 1).await;

        let command = server
            .mock("POST", "/v1.0/iot-03/devices/dev1/commands")
            .match_header("access_token", "tok")
            .match_body(Matcher::Json(
                json!({"commands": [{"code": "switch", "value": false}]}),
            ))
            .with_status(200)
            .with_body(json!({"success": true, "result": true}).to_string())
            .expect(2)
            .create_async()
            .await;

        let client = client(&server);
        client.send_switch("dev1", false).await.unwrap();
        client.send_switch("dev1", false).await.unwrap();

        token.assert_async().await;
        command.assert_async().await;
    }

    #[tokio::test]
    async fn test_switch_status() {
        let mut server = Server::new_async().await;
        let _token = token_mock(&mut server, 1).await;

        let _status = server
            .mock("GET", "/v1.0/iot-03/devices/dev1/status")
            .with_status(200)
            .with_body(
                json!({
                    "success": true,
                    "result": [
                        {"code": "countdown_1", "value": 0},
                        {"code": "switch", "value": true}
                    ]
                })
                .to_string(),
            )
            .create_async()
            .await;

        let _other = server
            .mock("GET", "/v1.0/iot-03/devices/dev2/status")
            .with_status(200)
            .with_body(json!({"success": true, "result": []}).to_string())
            .create_async()
            .await;

        let client = client(&server);
        assert_eq!(client.switch_status("dev1").await.unwrap(), Some(true));
        assert_eq!(client.switch_status("dev2").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_invalid_token_maps_to_unauthorized() {
        let mut server = Server::new_async().await;
        let token = token_mock(&mut server, 2).await;

        let _command = server
            .mock("POST", "/v1.0/iot-03/devices/dev1/commands")
            .with_status(200)
            .with_body(json!({"success": false, "code": 1010, "msg": "token invalid"}).to_string())
            .create_async()
            .await;

        let client = client(&server);
        let err = client.send_switch("dev1", true).await.unwrap_err();
        assert!(matches!(err, TransportError::Unauthorized(_)));

        client.reauthenticate().await.unwrap();
        token.assert_async().await;
    }

    #[tokio::test]
    async fn test_business_error_is_request_error() {
        let mut server = Server::new_async().await;
        let _token = token_mock(&mut server, 1).await;

        let _command = server
            .mock("POST", "/v1.0/iot-03/devices/dev1/commands")
            .with_status(200)
            .with_body(
                json!({"success": false, "code": 2008, "msg": "command or value not support"})
                    .to_string(),
            )
            .create_async()
            .await;

        let err = client(&server).send_switch("dev1", true).await.unwrap_err();
        assert!(matches!(err, TransportError::Request(_)));
    }
}

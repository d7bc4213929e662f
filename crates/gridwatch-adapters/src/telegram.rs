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

//! Telegram Bot API notifier

use crate::errors::{TelegramError, TelegramResult};
use async_trait::async_trait;
use gridwatch_core::{Notifier, SendOptions};
use gridwatch_types::TelegramConfig;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: &'a str,
    text: &'a str,
    disable_notification: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    parse_mode: Option<&'static str>,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

/// Sends messages to one chat through a bot
#[derive(Clone)]
pub struct TelegramNotifier {
    url: String,
    chat_id: String,
    client: Client,
}

impl fmt::Debug for TelegramNotifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelegramNotifier")
            .field("chat_id", &self.chat_id)
            .finish_non_exhaustive()
    }
}

impl TelegramNotifier {
    pub fn new(config: &TelegramConfig) -> TelegramResult<Self> {
        if !config.is_configured() {
            return Err(TelegramError::ConfigError(
                "Bot token and chat ID are required".to_owned(),
            ));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| TelegramError::ConfigError(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            url: format!(
                "{}/bot{}/sendMessage",
                config.api_base_url.trim_end_matches('/'),
                config.bot_token.trim()
            ),
            chat_id: config.chat_id.trim().to_owned(),
            client,
        })
    }

    pub async fn send_message(&self, text: &str, options: SendOptions) -> TelegramResult<()> {
        let request = SendMessageRequest {
            chat_id: &self.chat_id,
            text,
            disable_notification: options.silent,
            parse_mode: options.html.then_some("HTML"),
        };

        let response = self.client.post(&self.url).json(&request).send().await?;
        let status = response.status();

        if status.is_success() {
            debug!("📨 [TELEGRAM] Message delivered (silent: {})", options.silent);
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        let description = serde_json::from_str::<ApiResponse>(&body)
            .ok()
            .filter(|r| !r.ok)
            .and_then(|r| r.description)
            .unwrap_or(body);

        warn!("⚠️ [TELEGRAM] Delivery failed ({}): {}", status, description);
        Err(TelegramError::ApiError {
            status: status.as_u16(),
            description,
        })
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, text: &str, options: SendOptions) -> anyhow::Result<()> {
        self.send_message(text, options).await?;
        Ok(())
    }

    fn name(&self) -> &str {
        "Telegram"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};
    use serde_json::json;

    fn notifier(server: &Server) -> TelegramNotifier {
        TelegramNotifier::new(&TelegramConfig {
            bot_token: "123:ABC".to_owned(),
            chat_id: "-100200".to_owned(),
            api_base_url: server.url(),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_plain_loud_message() {
        let mut server = Server::new_async().await;

        let mock = server
            .mock("POST", "/bot123:ABC/sendMessage")
            .match_body(Matcher::Json(json!({
                "chat_id": "-100200",
                "text": "⚠️ Grid is down!",
                "disable_notification": false
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(json!({"ok": true, "result": {}}).to_string())
            .create_async()
            .await;

        notifier(&server)
            .send("⚠️ Grid is down!", SendOptions::default())
            .await
            .unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_silent_html_message() {
        let mut server = Server::new_async().await;

        let mock = server
            .mock("POST", "/bot123:ABC/sendMessage")
            .match_body(Matcher::PartialJson(json!({
                "disable_notification": true,
                "parse_mode": "HTML"
            })))
            .with_status(200)
            .with_body(json!({"ok": true}).to_string())
            .create_async()
            .await;

        let options = SendOptions {
            silent: true,
            html: true,
        };
        notifier(&server).send("<b>x</b>", options).await.unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_api_error_carries_description() {
        let mut server = Server::new_async().await;

        let _mock = server
            .mock("POST", "/bot123:ABC/sendMessage")
            .with_status(400)
            .with_body(
                json!({"ok": false, "description": "Bad Request: chat not found"}).to_string(),
            )
            .create_async()
            .await;

        let err = notifier(&server)
            .send_message("hi", SendOptions::default())
            .await
            .unwrap_err();

        match err {
            TelegramError::ApiError {
                status,
                description,
            } => {
                assert_eq!(status, 400);
                assert_eq!(description, "Bad Request: chat not found");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}

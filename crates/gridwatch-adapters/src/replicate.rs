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

//! Outage schedule transcription through a Replicate-hosted vision model

use crate::errors::{ReplicateError, ReplicateResult};
use async_trait::async_trait;
use chrono::{Datelike, Utc};
use chrono_tz::Tz;
use gridwatch_core::{ScheduleExtractor, parse_schedule_reply};
use gridwatch_types::{OutageSchedule, ScheduleConfig};
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;
use tracing::{debug, info, warn};

pub const DEFAULT_API_BASE_URL: &str = "https://api.replicate.com";
/// Published schedules come as at most two images per post
pub const MAX_IMAGES: usize = 2;

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);
const DEFAULT_MAX_POLLS: u32 = 60;

/// Instruction given to the model for one schedule image
#[must_use]
pub fn transcription_prompt(queue: &str, current_year: i32) -> String {
    format!(
        "You are an assistant that reads Ukrainian power outage schedules from images. \
         The image contains a table with outage schedules for several queues. \
         You must read ONLY the row for 'Черга {queue}' in the city of Kyiv and return its outage schedule. \
         IMPORTANT: The current year is {current_year}. Make sure the date in YYYY-MM-DD format uses the correct year {current_year}. \
         Return STRICTLY one JSON object with no extra text in the following format: \
         {{\"date\": \"YYYY-MM-DD\", \"queue\": \"{queue}\", \"periods\": [[\"HH:MM\", \"HH:MM\"], ...]}} . \
         If there are no outages for this queue on that date, return \"periods\": []. \
         If the row for this queue is not present in this image or you cannot read it clearly, do NOT guess: \
         return {{\"date\": null, \"queue\": \"{queue}\", \"periods\": []}}."
    )
}

#[derive(Debug, Serialize)]
struct PredictionInput<'a> {
    prompt: &'a str,
    messages: [Value; 0],
    verbosity: &'static str,
    image_input: [&'a str; 1],
    reasoning_effort: &'static str,
}

#[derive(Debug, Serialize)]
struct PredictionRequest<'a> {
    input: PredictionInput<'a>,
}

#[derive(Debug, Deserialize)]
struct Prediction {
    id: String,
    status: String,
    #[serde(default)]
    output: Value,
    #[serde(default)]
    error: Value,
    #[serde(default)]
    urls: PredictionUrls,
}

#[derive(Debug, Default, Deserialize)]
struct PredictionUrls {
    #[serde(default)]
    get: Option<String>,
}

impl Prediction {
    fn is_terminal(&self) -> bool {
        matches!(self.status.as_str(), "succeeded" | "failed" | "canceled")
    }

    /// Model output as text; streamed outputs arrive as a list of fragments
    fn output_text(&self) -> String {
        match &self.output {
            Value::Null => String::new(),
            Value::String(s) => s.clone(),
            Value::Array(parts) => parts
                .iter()
                .map(|part| match part {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect(),
            other => other.to_string(),
        }
    }
}

/// Reads the configured queue's schedule from published images
pub struct ReplicateExtractor {
    base_url: String,
    token: String,
    model: String,
    queue: String,
    image_urls: Vec<String>,
    client: Client,
    poll_interval: Duration,
    max_polls: u32,
}

impl fmt::Debug for ReplicateExtractor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReplicateExtractor")
            .field("model", &self.model)
            .field("queue", &self.queue)
            .field("image_urls", &self.image_urls)
            .finish_non_exhaustive()
    }
}

impl ReplicateExtractor {
    pub fn new(config: &ScheduleConfig) -> ReplicateResult<Self> {
        Self::with_base_url(config, DEFAULT_API_BASE_URL)
    }

    pub fn with_base_url(config: &ScheduleConfig, base_url: &str) -> ReplicateResult<Self> {
        if !config.is_configured() {
            return Err(ReplicateError::ConfigError(
                "Replicate token, queue and at least one image URL are required".to_owned(),
            ));
        }

        // Model calls are slow; `Prefer: wait` holds the connection up to a minute
        let client = Client::builder()
            .timeout(Duration::from_secs(90))
            .build()
            .map_err(|e| ReplicateError::ConfigError(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_owned(),
            token: config.replicate_api_token.trim().to_owned(),
            model: config.replicate_model.trim().to_owned(),
            queue: config.queue.trim().to_owned(),
            image_urls: config
                .image_urls
                .iter()
                .map(|u| u.trim())
                .filter(|u| !u.is_empty())
                .take(MAX_IMAGES)
                .map(str::to_owned)
                .collect(),
            client,
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_polls: DEFAULT_MAX_POLLS,
        })
    }

    #[must_use]
    pub fn with_polling(mut self, interval: Duration, max_polls: u32) -> Self {
        self.poll_interval = interval;
        self.max_polls = max_polls;
        self
    }

    async fn send(&self, request: RequestBuilder) -> ReplicateResult<Prediction> {
        let response = request.bearer_auth(&self.token).send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ReplicateError::ApiError {
                status: status.as_u16(),
                message,
            });
        }
        Ok(response.json::<Prediction>().await?)
    }

    /// Run the model on one image and return its raw text reply
    pub async fn transcribe(&self, prompt: &str, image_url: &str) -> ReplicateResult<String> {
        let url = format!("{}/v1/models/{}/predictions", self.base_url, self.model);
        let body = PredictionRequest {
            input: PredictionInput {
                prompt,
                messages: [],
                verbosity: "low",
                image_input: [image_url],
                reasoning_effort: "high",
            },
        };

        debug!("🖼️ [REPLICATE] Transcribing {}", image_url);
        let mut prediction = self
            .send(self.client.post(&url).header("Prefer", "wait").json(&body))
            .await?;

        let mut polls = 0;
        while !prediction.is_terminal() {
            let Some(get_url) = prediction.urls.get.clone() else {
                return Err(ReplicateError::PredictionFailed {
                    id: prediction.id,
                    status: prediction.status,
                    message: "no polling URL".to_owned(),
                });
            };
            if polls >= self.max_polls {
                return Err(ReplicateError::Timeout {
                    id: prediction.id,
                    attempts: polls,
                });
            }
            polls += 1;
            tokio::time::sleep(self.poll_interval).await;
            prediction = self.send(self.client.get(&get_url)).await?;
        }

        if prediction.status != "succeeded" {
            return Err(ReplicateError::PredictionFailed {
                message: prediction.error.to_string(),
                id: prediction.id,
                status: prediction.status,
            });
        }

        Ok(prediction.output_text())
    }
}

#[async_trait]
impl ScheduleExtractor for ReplicateExtractor {
    async fn fetch_latest(&self, tz: Tz) -> anyhow::Result<Vec<OutageSchedule>> {
        let current_year = Utc::now().with_timezone(&tz).year();
        let prompt = transcription_prompt(&self.queue, current_year);

        // Later images win for the same date
        let mut by_date = BTreeMap::new();
        for image_url in &self.image_urls {
            let text = self.transcribe(&prompt, image_url).await?;
            match parse_schedule_reply(&text, &self.queue, current_year) {
                Some(schedule) => {
                    by_date.insert(schedule.date, schedule);
                }
                None => warn!("⚠️ [REPLICATE] No readable schedule in {}", image_url),
            }
        }

        info!(
            "📅 [REPLICATE] {} schedule(s) read from {} image(s)",
            by_date.len(),
            self.image_urls.len()
        );
        Ok(by_date.into_values().collect())
    }

    fn name(&self) -> &str {
        "Replicate"
    }
}

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

//! Error types for the HTTP transports

use gridwatch_core::TransportError;
use thiserror::Error;

/// Victron VRM API errors
#[derive(Error, Debug)]
pub enum VrmError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("VRM rejected the access token")]
    AuthenticationFailed,

    #[error("VRM API error (status {status}): {message}")]
    ApiError { status: u16, message: String },

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

pub type VrmResult<T> = Result<T, VrmError>;

/// Telegram Bot API errors
#[derive(Error, Debug)]
pub enum TelegramError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Telegram API error (status {status}): {description}")]
    ApiError { status: u16, description: String },

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

pub type TelegramResult<T> = Result<T, TelegramError>;

/// Tuya OpenAPI errors
#[derive(Error, Debug)]
pub enum TuyaError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Access token invalid: {0}")]
    Unauthorized(String),

    #[error("Tuya API error {code}: {message}")]
    ApiError { code: i64, message: String },

    #[error("Unexpected response: {0}")]
    InvalidResponse(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

pub type TuyaResult<T> = Result<T, TuyaError>;

impl From<TuyaError> for TransportError {
    fn from(error: TuyaError) -> Self {
        match error {
            TuyaError::Unauthorized(msg) => TransportError::Unauthorized(msg),
            other => TransportError::Request(other.to_string()),
        }
    }
}

/// Replicate prediction API errors
#[derive(Error, Debug)]
pub enum ReplicateError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Replicate API error (status {status}): {message}")]
    ApiError { status: u16, message: String },

    #[error("Prediction {id} ended with status {status}: {message}")]
    PredictionFailed {
        id: String,
        status: String,
        message: String,
    },

    #[error("Prediction {id} still running after {attempts} polls")]
    Timeout { id: String, attempts: u32 },

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

pub type ReplicateResult<T> = Result<T, ReplicateError>;

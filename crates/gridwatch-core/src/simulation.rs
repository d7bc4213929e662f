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

//! Scripted telemetry used in simulation mode.

use crate::traits::TelemetrySource;
use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use gridwatch_types::TelemetrySnapshot;
use parking_lot::Mutex;
use std::path::Path;
use tracing::debug;

/// Replays a fixed list of snapshots in order; the last one repeats
#[derive(Debug)]
pub struct ScriptedTelemetry {
    name: String,
    frames: Vec<TelemetrySnapshot>,
    cursor: Mutex<usize>,
}

impl ScriptedTelemetry {
    pub fn new(name: impl Into<String>, frames: Vec<TelemetrySnapshot>) -> Result<Self> {
        if frames.is_empty() {
            bail!("Simulation script contains no snapshots");
        }
        Ok(Self {
            name: name.into(),
            frames,
            cursor: Mutex::new(0),
        })
    }

    /// Load a JSON array of snapshots
    pub fn from_file(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read simulation script {}", path.display()))?;
        let frames: Vec<TelemetrySnapshot> = serde_json::from_str(&json)
            .with_context(|| format!("Failed to parse simulation script {}", path.display()))?;
        Self::new(format!("simulation:{}", path.display()), frames)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

#[async_trait]
impl TelemetrySource for ScriptedTelemetry {
    async fn fetch(&self) -> Option<TelemetrySnapshot> {
        let mut cursor = self.cursor.lock();
        let index = (*cursor).min(self.frames.len() - 1);
        if *cursor < self.frames.len() {
            *cursor += 1;
        }
        debug!("🎬 Simulated frame {}/{}", index + 1, self.frames.len());
        self.frames.get(index).cloned()
    }

    fn name(&self) -> &str {
        &self.name
    }
}

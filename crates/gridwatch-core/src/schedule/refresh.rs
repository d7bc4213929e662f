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

//! Refresh cadence for the outage schedule cache: regular interval on
//! success, bounded exponential backoff on failure.

use super::cache::OutageScheduleCache;
use crate::traits::ScheduleExtractor;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use gridwatch_types::OutageSchedule;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

const BACKOFF_BASE_SECS: u64 = 5;
const BACKOFF_MAX_EXPONENT: u32 = 6;

/// What one refresh tick did
#[derive(Debug, Clone, PartialEq)]
pub enum RefreshOutcome {
    /// Not due yet
    Skipped,
    /// Fetch succeeded; these schedules were new or changed
    Updated(Vec<OutageSchedule>),
    /// Fetch failed; next attempt after `retry_in`
    Failed { retry_in: Duration },
}

/// Backoff after `failures` consecutive failures, never longer than `interval`
#[must_use]
pub fn backoff_delay(failures: u32, interval: Duration) -> Duration {
    let exponent = failures.min(BACKOFF_MAX_EXPONENT);
    let secs = BACKOFF_BASE_SECS * 2u64.pow(exponent);
    interval.min(Duration::from_secs(secs))
}

/// Tracks when the next schedule fetch is due
#[derive(Debug, Clone, Default)]
pub struct ScheduleRefresher {
    next_due: Option<Instant>,
    failures: u32,
}

impl ScheduleRefresher {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_due(&self, now: Instant) -> bool {
        self.next_due.is_none_or(|due| now >= due)
    }

    #[must_use]
    pub fn failures(&self) -> u32 {
        self.failures
    }

    /// Record a successful fetch; next one after the full interval
    pub fn record_success(&mut self, now: Instant, interval: Duration) {
        self.failures = 0;
        self.next_due = Some(now + interval);
    }

    /// Record a failed fetch and return the delay before the next attempt
    pub fn record_failure(&mut self, now: Instant, interval: Duration) -> Duration {
        self.failures = self.failures.saturating_add(1);
        let delay = backoff_delay(self.failures, interval);
        self.next_due = Some(now + delay);
        delay
    }

    /// Fetch, merge and persist if due.
    ///
    /// Persistence failures are logged; the in-memory cache is still updated.
    pub async fn tick(
        &mut self,
        extractor: &dyn ScheduleExtractor,
        cache: &mut OutageScheduleCache,
        interval: Duration,
        now: DateTime<Tz>,
    ) -> RefreshOutcome {
        let started = Instant::now();
        if !self.is_due(started) {
            return RefreshOutcome::Skipped;
        }

        debug!("🗓️ Fetching outage schedules via {}", extractor.name());
        match extractor.fetch_latest(now.timezone()).await {
            Ok(candidates) => {
                self.record_success(started, interval);
                if candidates.is_empty() {
                    info!("🗓️ No readable schedule found");
                    return RefreshOutcome::Updated(Vec::new());
                }

                let updated = cache.apply(candidates, now.fixed_offset());
                if let Err(e) = cache.save() {
                    error!("❌ Failed to persist schedule cache: {:#}", e);
                }
                RefreshOutcome::Updated(updated)
            }
            Err(e) => {
                let retry_in = self.record_failure(started, interval);
                warn!(
                    "⚠️ Schedule fetch failed ({} in a row), retrying in {:?}: {:#}",
                    self.failures, retry_in, e
                );
                RefreshOutcome::Failed { retry_in }
            }
        }
    }
}

/// Current wall-clock time in `tz`
#[must_use]
pub fn local_now(tz: Tz) -> DateTime<Tz> {
    Utc::now().with_timezone(&tz)
}

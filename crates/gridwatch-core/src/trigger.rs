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

//! Pre-outage trigger: switches devices off shortly before each scheduled
//! outage, at most once per outage start.

use crate::schedule::OutageScheduleCache;
use chrono::{DateTime, Days, TimeDelta, TimeZone};
use chrono_tz::Tz;
use std::collections::BTreeSet;
use std::time::Duration;
use tracing::{debug, info};

const MIN_WINDOW_SECS: i64 = 60;
const MAX_PERIOD_SECS: i64 = 86_400;

/// Ledger of outage starts that already fired
#[derive(Debug, Clone, Default)]
pub struct OutageTrigger {
    fired: BTreeSet<DateTime<Tz>>,
}

impl OutageTrigger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Trigger window width for a given polling period
    #[must_use]
    pub fn window(refresh_period: Duration) -> TimeDelta {
        let period = i64::try_from(refresh_period.as_secs())
            .unwrap_or(i64::MAX)
            .min(MAX_PERIOD_SECS);
        TimeDelta::seconds(MIN_WINDOW_SECS.max(period.saturating_mul(2)))
    }

    /// Outage starts whose pre-outage window contains `now` and which have
    /// not fired yet. Returned starts are recorded in the ledger.
    pub fn due(
        &mut self,
        now: DateTime<Tz>,
        cache: &OutageScheduleCache,
        lead: TimeDelta,
        refresh_period: Duration,
    ) -> Vec<DateTime<Tz>> {
        self.prune(now);

        let tz = now.timezone();
        let window = Self::window(refresh_period);
        let today = now.date_naive();
        let mut due = Vec::new();

        for date in [Some(today), today.checked_add_days(Days::new(1))]
            .into_iter()
            .flatten()
        {
            let Some(schedule) = cache.get(date) else {
                continue;
            };

            for period in &schedule.periods {
                let local = date.and_time(period.start().to_naive_time());
                // Starts inside a DST gap do not exist locally
                let Some(start) = tz.from_local_datetime(&local).earliest() else {
                    debug!("Skipping non-existent local time {}", local);
                    continue;
                };

                let trigger_at = start - lead;
                let elapsed = now - trigger_at;
                if elapsed < TimeDelta::zero() || elapsed > window {
                    continue;
                }
                if self.fired.insert(start) {
                    info!(
                        "⏰ Outage at {} starts in {} min, switching devices off",
                        start.format("%Y-%m-%d %H:%M"),
                        (start - now).num_minutes()
                    );
                    due.push(start);
                }
            }
        }

        due
    }

    /// Drop entries older than one day
    pub fn prune(&mut self, now: DateTime<Tz>) {
        let horizon = now - TimeDelta::days(1);
        self.fired.retain(|start| *start > horizon);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.fired.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fired.is_empty()
    }
}

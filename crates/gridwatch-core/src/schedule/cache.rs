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

//! Outage schedule cache with a rolling today/tomorrow window.
//!
//! Persisted as JSON after every successful update using an atomic
//! temp-file + rename write.

use anyhow::{Context, Result};
use chrono::{DateTime, Days, FixedOffset, NaiveDate};
use gridwatch_types::OutageSchedule;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// On-disk format
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct CacheFile {
    #[serde(default)]
    last_updated: Option<DateTime<FixedOffset>>,
    #[serde(default)]
    schedules: BTreeMap<NaiveDate, OutageSchedule>,
}

/// Date-keyed outage schedules, persisted at `path`
#[derive(Debug, Clone)]
pub struct OutageScheduleCache {
    path: PathBuf,
    schedules: BTreeMap<NaiveDate, OutageSchedule>,
    last_updated: Option<DateTime<FixedOffset>>,
}

impl OutageScheduleCache {
    /// Empty cache that will persist to `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            schedules: BTreeMap::new(),
            last_updated: None,
        }
    }

    /// Load the cache, treating a missing or corrupt file as empty
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();

        if !path.exists() {
            debug!("No schedule cache at {}, starting empty", path.display());
            return Self::new(path);
        }

        let parsed = fs::read_to_string(&path)
            .context("read failed")
            .and_then(|json| serde_json::from_str::<CacheFile>(&json).context("parse failed"));

        match parsed {
            Ok(file) => {
                info!(
                    "📂 Loaded {} cached schedule(s) from {}",
                    file.schedules.len(),
                    path.display()
                );
                Self {
                    path,
                    schedules: file.schedules,
                    last_updated: file.last_updated,
                }
            }
            Err(e) => {
                warn!(
                    "⚠️ Ignoring unreadable schedule cache {}: {:#}",
                    path.display(),
                    e
                );
                Self::new(path)
            }
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn get(&self, date: NaiveDate) -> Option<&OutageSchedule> {
        self.schedules.get(&date)
    }

    #[must_use]
    pub fn dates(&self) -> Vec<NaiveDate> {
        self.schedules.keys().copied().collect()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.schedules.is_empty()
    }

    #[must_use]
    pub fn last_updated(&self) -> Option<DateTime<FixedOffset>> {
        self.last_updated
    }

    /// Merge fetched candidates and prune to `{today, tomorrow}`.
    ///
    /// Returns the candidates that were new or differed from the cached
    /// entry for their date, in input order. Later candidates for the same
    /// date overwrite earlier ones.
    pub fn apply(
        &mut self,
        candidates: Vec<OutageSchedule>,
        now: DateTime<FixedOffset>,
    ) -> Vec<OutageSchedule> {
        let mut updated = Vec::new();

        for candidate in candidates {
            let changed = self.schedules.get(&candidate.date) != Some(&candidate);
            if changed {
                info!(
                    "🗓️ Schedule for {} (queue {}) changed: {} period(s)",
                    candidate.date,
                    candidate.queue,
                    candidate.periods.len()
                );
                updated.push(candidate.clone());
            }
            self.schedules.insert(candidate.date, candidate);
        }

        self.prune(now.date_naive());
        self.last_updated = Some(now);
        updated
    }

    /// Keep only `today` and the following day
    pub fn prune(&mut self, today: NaiveDate) {
        let tomorrow = today.checked_add_days(Days::new(1)).unwrap_or(today);
        self.schedules
            .retain(|date, _| *date == today || *date == tomorrow);
    }

    /// Persist atomically (write temp file, then rename over the target)
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }

        let file = CacheFile {
            last_updated: self.last_updated,
            schedules: self.schedules.clone(),
        };
        let json = serde_json::to_string_pretty(&file).context("Failed to serialize schedules")?;

        let temp_path = self.path.with_extension("json.tmp");
        fs::write(&temp_path, &json)
            .with_context(|| format!("Failed to write temp file {}", temp_path.display()))?;
        fs::rename(&temp_path, &self.path).with_context(|| {
            format!(
                "Failed to rename temp file to {}",
                self.path.display()
            )
        })?;

        debug!("💾 Schedule cache saved to {}", self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use gridwatch_types::OutagePeriod;
    use tempfile::tempdir;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    fn schedule(d: u32, periods: &[(&str, &str)]) -> OutageSchedule {
        OutageSchedule::new(
            date(d),
            "3.1",
            periods
                .iter()
                .map(|(s, e)| OutagePeriod::parse(s, e).unwrap())
                .collect(),
        )
    }

    fn noon(d: u32) -> DateTime<FixedOffset> {
        FixedOffset::east_opt(2 * 3600)
            .unwrap()
            .with_ymd_and_hms(2024, 1, d, 12, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempdir().unwrap();
        let cache = OutageScheduleCache::load(dir.path().join("missing.json"));
        assert!(cache.is_empty());
        assert!(cache.last_updated().is_none());
    }

    #[test]
    fn test_load_corrupt_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cache.json");
        fs::write(&path, "{ not json").unwrap();

        let cache = OutageScheduleCache::load(&path);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_prune_keeps_today_and_tomorrow() {
        let dir = tempdir().unwrap();
        let mut cache = OutageScheduleCache::new(dir.path().join("cache.json"));
        cache.apply(
            vec![schedule(1, &[]), schedule(2, &[]), schedule(3, &[])],
            noon(1),
        );
        assert_eq!(cache.dates(), vec![date(1), date(2)]);

        cache.apply(vec![schedule(3, &[])], noon(2));
        assert_eq!(cache.dates(), vec![date(2), date(3)]);
    }

    #[test]
    fn test_apply_reports_only_changes() {
        let dir = tempdir().unwrap();
        let mut cache = OutageScheduleCache::new(dir.path().join("cache.json"));

        let first = cache.apply(vec![schedule(2, &[("08:00", "12:00")])], noon(2));
        assert_eq!(first.len(), 1);

        let same = cache.apply(vec![schedule(2, &[("08:00", "12:00")])], noon(2));
        assert!(same.is_empty());

        let changed = cache.apply(
            vec![schedule(2, &[("08:00", "12:00"), ("18:00", "20:00")])],
            noon(2),
        );
        assert_eq!(changed.len(), 1);
        assert_eq!(cache.get(date(2)).unwrap().periods.len(), 2);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("cache.json");
        let mut cache = OutageScheduleCache::new(&path);
        cache.apply(
            vec![schedule(2, &[("08:00", "12:00"), ("22:00", "24:00")])],
            noon(2),
        );
        cache.save().unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(
            raw["schedules"]["2024-01-02"]["periods"][1],
            serde_json::json!(["22:00", "24:00"])
        );
        assert_eq!(raw["schedules"]["2024-01-02"]["queue"], "3.1");

        let reloaded = OutageScheduleCache::load(&path);
        assert_eq!(reloaded.get(date(2)), cache.get(date(2)));
        assert_eq!(reloaded.last_updated(), Some(noon(2)));
        assert!(!path.with_extension("json.tmp").exists());
    }
}

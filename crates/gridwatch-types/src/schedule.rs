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

//! Outage schedules for one utility queue.
//!
//! Times are local wall-clock `HH:MM`. `24:00` is accepted as the end of a
//! period and means the following midnight.

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

const MINUTES_PER_DAY: u16 = 24 * 60;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("Invalid time of day: '{0}' (expected HH:MM)")]
    InvalidTime(String),

    #[error("Period {start}-{end} is empty or reversed")]
    InvalidPeriod { start: ClockTime, end: ClockTime },
}

/// Wall-clock time of day with minute resolution, `24:00` allowed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ClockTime(u16);

impl ClockTime {
    pub const MIDNIGHT: ClockTime = ClockTime(0);
    pub const END_OF_DAY: ClockTime = ClockTime(MINUTES_PER_DAY);

    /// Build from hour and minute, `None` when out of range
    #[must_use]
    pub fn from_hm(hour: u16, minute: u16) -> Option<Self> {
        if minute >= 60 {
            return None;
        }
        match hour {
            0..=23 => Some(Self(hour * 60 + minute)),
            24 if minute == 0 => Some(Self::END_OF_DAY),
            _ => None,
        }
    }

    #[must_use]
    pub fn minutes(self) -> u16 {
        self.0
    }

    #[must_use]
    pub fn is_end_of_day(self) -> bool {
        self == Self::END_OF_DAY
    }

    /// Time of day; the `24:00` sentinel maps to midnight
    #[must_use]
    pub fn to_naive_time(self) -> NaiveTime {
        let minutes = u32::from(self.0 % MINUTES_PER_DAY);
        NaiveTime::from_hms_opt(minutes / 60, minutes % 60, 0).unwrap_or(NaiveTime::MIN)
    }
}

impl FromStr for ClockTime {
    type Err = ScheduleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let invalid = || ScheduleError::InvalidTime(s.to_owned());

        let (hours, minutes) = trimmed.split_once(':').ok_or_else(invalid)?;
        if hours.is_empty()
            || hours.len() > 2
            || minutes.len() != 2
            || !hours.chars().chain(minutes.chars()).all(|c| c.is_ascii_digit())
        {
            return Err(invalid());
        }

        let hour: u16 = hours.parse().map_err(|_| invalid())?;
        let minute: u16 = minutes.parse().map_err(|_| invalid())?;
        Self::from_hm(hour, minute).ok_or_else(invalid)
    }
}

impl TryFrom<String> for ClockTime {
    type Error = ScheduleError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ClockTime> for String {
    fn from(time: ClockTime) -> Self {
        time.to_string()
    }
}

impl fmt::Display for ClockTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.0 / 60, self.0 % 60)
    }
}

/// Half-open outage interval `[start, end)`, serialized as `["HH:MM", "HH:MM"]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "(ClockTime, ClockTime)", into = "(ClockTime, ClockTime)")]
pub struct OutagePeriod {
    start: ClockTime,
    end: ClockTime,
}

impl OutagePeriod {
    pub fn new(start: ClockTime, end: ClockTime) -> Result<Self, ScheduleError> {
        if start.is_end_of_day() || start >= end {
            return Err(ScheduleError::InvalidPeriod { start, end });
        }
        Ok(Self { start, end })
    }

    /// Parse a pair of `HH:MM` strings
    pub fn parse(start: &str, end: &str) -> Result<Self, ScheduleError> {
        Self::new(start.parse()?, end.parse()?)
    }

    #[must_use]
    pub fn start(&self) -> ClockTime {
        self.start
    }

    #[must_use]
    pub fn end(&self) -> ClockTime {
        self.end
    }
}

impl TryFrom<(ClockTime, ClockTime)> for OutagePeriod {
    type Error = ScheduleError;

    fn try_from((start, end): (ClockTime, ClockTime)) -> Result<Self, Self::Error> {
        Self::new(start, end)
    }
}

impl From<OutagePeriod> for (ClockTime, ClockTime) {
    fn from(period: OutagePeriod) -> Self {
        (period.start, period.end)
    }
}

impl fmt::Display for OutagePeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// Outage periods of one queue on one calendar day.
///
/// Two schedules are equal iff date, queue and period list are all equal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutageSchedule {
    pub date: NaiveDate,
    pub queue: String,
    #[serde(default)]
    pub periods: Vec<OutagePeriod>,
}

impl OutageSchedule {
    pub fn new(date: NaiveDate, queue: impl Into<String>, periods: Vec<OutagePeriod>) -> Self {
        Self {
            date,
            queue: queue.into(),
            periods,
        }
    }

    #[must_use]
    pub fn has_outages(&self) -> bool {
        !self.periods.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_clock_time() {
        assert_eq!("08:30".parse::<ClockTime>().unwrap().minutes(), 510);
        assert_eq!("8:05".parse::<ClockTime>().unwrap().minutes(), 485);
        assert!("24:00".parse::<ClockTime>().unwrap().is_end_of_day());
        assert!("24:01".parse::<ClockTime>().is_err());
        assert!("12:60".parse::<ClockTime>().is_err());
        assert!("1230".parse::<ClockTime>().is_err());
        assert!("ab:cd".parse::<ClockTime>().is_err());
        assert!("".parse::<ClockTime>().is_err());
    }

    #[test]
    fn test_end_of_day_is_midnight() {
        assert_eq!(ClockTime::END_OF_DAY.to_naive_time(), NaiveTime::MIN);
        assert_eq!(ClockTime::END_OF_DAY.to_string(), "24:00");
    }

    #[test]
    fn test_period_validation() {
        assert!(OutagePeriod::parse("20:00", "24:00").is_ok());
        assert!(OutagePeriod::parse("10:00", "10:00").is_err());
        assert!(OutagePeriod::parse("12:00", "08:00").is_err());
        assert!(OutagePeriod::parse("24:00", "24:00").is_err());
    }

    #[test]
    fn test_schedule_wire_format() {
        let schedule = OutageSchedule::new(
            NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
            "3.1",
            vec![OutagePeriod::parse("08:00", "12:30").unwrap()],
        );

        let json = serde_json::to_value(&schedule).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "date": "2024-01-02",
                "queue": "3.1",
                "periods": [["08:00", "12:30"]]
            })
        );

        let back: OutageSchedule = serde_json::from_value(json).unwrap();
        assert_eq!(back, schedule);
    }

    #[test]
    fn test_reversed_period_rejected_on_deserialize() {
        let json = r#"{"date": "2024-01-02", "queue": "3.1", "periods": [["12:00", "08:00"]]}"#;
        assert!(serde_json::from_str::<OutageSchedule>(json).is_err());
    }

    #[test]
    fn test_schedule_equality_covers_queue_and_periods() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let a = OutageSchedule::new(date, "3.1", vec![OutagePeriod::parse("08:00", "12:00").unwrap()]);
        let mut b = a.clone();
        assert_eq!(a, b);

        b.queue = "3.2".to_owned();
        assert_ne!(a, b);

        let c = OutageSchedule::new(date, "3.1", vec![OutagePeriod::parse("08:00", "12:30").unwrap()]);
        assert_ne!(a, c);
    }
}

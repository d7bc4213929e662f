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

use chrono::{DateTime, Datelike, TimeZone, Timelike};
use gridwatch_types::{DayNumbering, QuietPolicy};

/// Whether a message sent at `now` should be delivered silently.
///
/// Quiet days silence the whole day. Otherwise the hour window `[start, end)`
/// applies when both bounds are set; it wraps past midnight when
/// `start >= end`, so equal bounds silence every hour.
pub fn should_silence<Tz: TimeZone>(now: &DateTime<Tz>, policy: &QuietPolicy) -> bool {
    let weekday = match policy.day_numbering {
        DayNumbering::MondayFirst => now.weekday().number_from_monday(),
        DayNumbering::SundayFirst => now.weekday().number_from_sunday(),
    };
    if policy.days.iter().any(|day| u32::from(*day) == weekday) {
        return true;
    }

    let (Some(start), Some(end)) = (policy.hours_start, policy.hours_end) else {
        return false;
    };
    let (start, end) = (u32::from(start), u32::from(end));
    let hour = now.hour();

    if start < end {
        (start..end).contains(&hour)
    } else {
        hour >= start || hour < end
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    // 2024-01-03 is a Wednesday
    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 3, hour, 15, 0).unwrap()
    }

    fn hours(start: u8, end: u8) -> QuietPolicy {
        QuietPolicy {
            hours_start: Some(start),
            hours_end: Some(end),
            ..QuietPolicy::default()
        }
    }

    #[test]
    fn test_no_policy_never_silences() {
        assert!(!should_silence(&at(3), &QuietPolicy::default()));
    }

    #[test]
    fn test_window_across_midnight() {
        let policy = hours(22, 6);
        assert!(should_silence(&at(23), &policy));
        assert!(should_silence(&at(2), &policy));
        assert!(should_silence(&at(22), &policy));
        assert!(!should_silence(&at(6), &policy));
        assert!(!should_silence(&at(10), &policy));
    }

    #[test]
    fn test_window_within_day() {
        let policy = hours(13, 15);
        assert!(should_silence(&at(13), &policy));
        assert!(should_silence(&at(14), &policy));
        assert!(!should_silence(&at(15), &policy));
        assert!(!should_silence(&at(12), &policy));
    }

    #[test]
    fn test_single_bound_disables_hours() {
        let policy = QuietPolicy {
            hours_start: Some(22),
            ..QuietPolicy::default()
        };
        assert!(!should_silence(&at(23), &policy));
    }

    #[test]
    fn test_equal_bounds_silence_all_hours() {
        let policy = hours(8, 8);
        assert!(should_silence(&at(0), &policy));
        assert!(should_silence(&at(12), &policy));
    }

    #[test]
    fn test_quiet_days_numbering() {
        let wednesday = at(12);
        let monday_first = QuietPolicy {
            days: vec![3],
            ..QuietPolicy::default()
        };
        assert!(should_silence(&wednesday, &monday_first));

        let sunday_first = QuietPolicy {
            days: vec![3],
            day_numbering: DayNumbering::SundayFirst,
            ..QuietPolicy::default()
        };
        assert!(!should_silence(&wednesday, &sunday_first));

        let sunday_first_wed = QuietPolicy {
            days: vec![4],
            day_numbering: DayNumbering::SundayFirst,
            ..QuietPolicy::default()
        };
        assert!(should_silence(&wednesday, &sunday_first_wed));
    }
}

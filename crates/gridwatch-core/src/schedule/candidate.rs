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

//! Strict validation of schedule candidates read from untrusted model output.

use chrono::{Datelike, NaiveDate};
use gridwatch_types::{OutagePeriod, OutageSchedule};
use serde_json::Value;
use tracing::debug;

/// Parse the model's reply into a schedule for `queue`.
///
/// Returns `None` whenever anything does not validate: the candidate is
/// dropped and the cache stays untouched.
pub fn parse_schedule_reply(text: &str, queue: &str, current_year: i32) -> Option<OutageSchedule> {
    let object = extract_json_object(text)?;
    let Value::Object(map) = object else {
        debug!("Schedule reply is not a JSON object");
        return None;
    };

    // `null` date means the model could not read the row
    let date = parse_date(map.get("date")?, current_year)?;

    match map.get("queue") {
        None | Some(Value::Null) => {}
        Some(value) => {
            let reply_queue = scalar_to_string(value)?;
            if !reply_queue.is_empty() && reply_queue != queue {
                debug!("Schedule reply is for queue {}, expected {}", reply_queue, queue);
                return None;
            }
        }
    }

    let Value::Array(items) = map.get("periods")? else {
        debug!("Schedule reply periods are not a list");
        return None;
    };
    let periods = items
        .iter()
        .map(parse_period)
        .collect::<Option<Vec<OutagePeriod>>>()?;

    Some(OutageSchedule::new(date, queue, periods))
}

/// Whole text as JSON, else the outermost `{...}` block
fn extract_json_object(text: &str) -> Option<Value> {
    let text = text.trim();
    if let Ok(value) = serde_json::from_str(text) {
        return Some(value);
    }
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str(&text[start..=end]).ok()
}

fn parse_date(value: &Value, current_year: i32) -> Option<NaiveDate> {
    let Value::String(raw) = value else {
        return None;
    };
    let date = NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").ok()?;
    if date.year() < current_year - 1 {
        // Source tables omit the year; stale years are the model guessing
        return date.with_year(current_year);
    }
    Some(date)
}

fn parse_period(item: &Value) -> Option<OutagePeriod> {
    let Value::Array(pair) = item else {
        return None;
    };
    let [Value::String(start), Value::String(end)] = pair.as_slice() else {
        return None;
    };
    OutagePeriod::parse(start, end).ok()
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_owned()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

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

//! Renders alert events and schedule updates into notification text.

use crate::signals::AlertEvent;
use chrono::{DateTime, TimeZone};
use gridwatch_i18n::{I18n, I18nError, Language};
use gridwatch_types::OutageSchedule;
use std::fmt;

/// Timestamp format appended to every alert
pub const TIMESTAMP_FORMAT: &str = "%d.%m.%Y %H:%M";

const PERIOD_INDENT: &str = "   ";

pub struct MessageRenderer {
    i18n: I18n,
}

impl fmt::Debug for MessageRenderer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageRenderer")
            .field("language", &self.i18n.language())
            .finish()
    }
}

impl MessageRenderer {
    pub fn new(language: Language) -> Result<Self, I18nError> {
        Ok(Self {
            i18n: I18n::new(language)?,
        })
    }

    #[must_use]
    pub fn language(&self) -> Language {
        self.i18n.language()
    }

    /// Plain-text alert with the local timestamp of `now`
    pub fn render_alert<Tz>(&self, event: &AlertEvent, now: &DateTime<Tz>) -> Result<String, I18nError>
    where
        Tz: TimeZone,
        Tz::Offset: fmt::Display,
    {
        let mut params = event.params();
        params.push(("timestamp", now.format(TIMESTAMP_FORMAT).to_string()));
        self.i18n.format_with(event.message_id(), params)
    }

    /// HTML announcement of a new or changed schedule
    pub fn render_schedule_update(&self, schedule: &OutageSchedule) -> Result<String, I18nError> {
        let mut lines = vec![
            self.i18n.get("schedule-updated-title")?,
            String::new(),
            format!("<b>{}:</b>", schedule.date.format("%d.%m.%Y")),
        ];

        if schedule.periods.is_empty() {
            lines.push(format!("{PERIOD_INDENT}{}", self.i18n.get("schedule-no-outages")?));
        }
        for period in &schedule.periods {
            let line = self.i18n.format_with(
                "schedule-period",
                [
                    ("start", period.start().to_string()),
                    ("end", period.end().to_string()),
                ],
            )?;
            lines.push(format!("{PERIOD_INDENT}{line}"));
        }

        Ok(lines.join("\n"))
    }

    /// Prefix marking messages produced while simulating
    pub fn with_test_banner(&self, text: &str) -> Result<String, I18nError> {
        Ok(format!("{}\n{text}", self.i18n.get("test-message-prefix")?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use chrono_tz::Europe::Kyiv;
    use gridwatch_types::{OutagePeriod, Phase};

    #[test]
    fn test_render_alert_uses_local_time() {
        let renderer = MessageRenderer::new(Language::English).unwrap();
        let now = chrono::Utc
            .with_ymd_and_hms(2024, 6, 1, 21, 30, 0)
            .unwrap()
            .with_timezone(&Kyiv);

        let text = renderer
            .render_alert(
                &AlertEvent::VoltageHigh { phase: Phase::L2, voltage: 255.04 },
                &now,
            )
            .unwrap();
        assert_eq!(
            text,
            "📈 Input voltage on phase 2 is too high: 255.0V.\n02.06.2024 00:30"
        );
    }

    #[test]
    fn test_render_schedule_update_ukrainian() {
        let renderer = MessageRenderer::new(Language::Ukrainian).unwrap();
        let schedule = OutageSchedule::new(
            NaiveDate::from_ymd_opt(2025, 3, 14).unwrap(),
            "3.1",
            vec![
                OutagePeriod::parse("08:00", "11:30").unwrap(),
                OutagePeriod::parse("20:00", "24:00").unwrap(),
            ],
        );

        assert_eq!(
            renderer.render_schedule_update(&schedule).unwrap(),
            "<b>ℹ️ Оновлено графік відключення електропостачання</b>\n\n<b>14.03.2025:</b>\n   🪫 з <b>08:00</b> до <b>11:30</b>\n   🪫 з <b>20:00</b> до <b>24:00</b>"
        );
    }

    #[test]
    fn test_render_schedule_without_outages() {
        let renderer = MessageRenderer::new(Language::English).unwrap();
        let schedule =
            OutageSchedule::new(NaiveDate::from_ymd_opt(2025, 3, 14).unwrap(), "3.1", vec![]);
        assert!(
            renderer
                .render_schedule_update(&schedule)
                .unwrap()
                .ends_with("<b>14.03.2025:</b>\n   ✅ no outages")
        );
    }

    #[test]
    fn test_test_banner() {
        let renderer = MessageRenderer::new(Language::English).unwrap();
        assert_eq!(
            renderer.with_test_banner("⚠️ Grid is down!").unwrap(),
            "👨🏻‍💻 TEST MESSAGE\n⚠️ Grid is down!"
        );
    }
}

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

use gridwatch_i18n::{I18n, Language};

const REQUIRED_KEYS: &[&str] = &[
    "grid-down",
    "grid-up",
    "ve-bus-error",
    "ve-bus-recovered",
    "battery-low",
    "battery-critical",
    "voltage-low",
    "voltage-high",
    "voltage-normal",
    "critical-load",
    "passthru-overload",
    "test-message-prefix",
    "schedule-updated-title",
    "schedule-period",
    "schedule-no-outages",
];

#[test]
fn test_all_languages_load() {
    for lang in Language::ALL {
        let i18n = I18n::new(lang);
        assert!(i18n.is_ok(), "failed to load {lang}: {:?}", i18n.err());
    }
}

#[test]
fn test_every_language_has_every_key() {
    for lang in Language::ALL {
        let i18n = I18n::new(lang).unwrap();
        for key in REQUIRED_KEYS {
            assert!(i18n.has_message(key), "{lang} is missing '{key}'");
        }
    }
}

#[test]
fn test_ukrainian_schedule_title() {
    let i18n = I18n::new(Language::Ukrainian).unwrap();
    assert_eq!(
        i18n.get("schedule-updated-title").unwrap(),
        "<b>ℹ️ Оновлено графік відключення електропостачання</b>"
    );
}

#[test]
fn test_grid_down_includes_timestamp() {
    let i18n = I18n::new(Language::English).unwrap();
    let text = i18n
        .format_with("grid-down", [("timestamp", "01.02.2024 03:04".to_owned())])
        .unwrap();
    assert!(text.ends_with("\n01.02.2024 03:04"));
    assert!(text.starts_with("⚠️"));
}

#[test]
fn test_language_serde_codes() {
    #[derive(serde::Deserialize)]
    struct Wrapper {
        language: Language,
    }
    let w: Wrapper = serde_json::from_str(r#"{"language":"uk"}"#).unwrap();
    assert_eq!(w.language, Language::Ukrainian);
    let w: Wrapper = serde_json::from_str(r#"{"language":"en"}"#).unwrap();
    assert_eq!(w.language, Language::English);
}

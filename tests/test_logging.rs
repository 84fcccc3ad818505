//! Logging settings as resolved from environment-style lookups

use salespulse::observability::logging::{parse_level, LogFormat, LogSettings};
use tracing::Level;

#[test]
fn test_format_names_are_case_insensitive() {
    for raw in ["json", "JSON", "\tjson\n"] {
        assert_eq!(LogFormat::parse(raw), LogFormat::Json, "input {raw:?}");
    }
    for raw in ["pretty", "PRETTY", " Pretty "] {
        assert_eq!(LogFormat::parse(raw), LogFormat::Pretty, "input {raw:?}");
    }
    assert_eq!(LogFormat::parse("CoMpAcT"), LogFormat::Compact);
}

#[test]
fn test_unknown_format_falls_back_to_json() {
    for raw in ["", "xml", "yaml", "123"] {
        assert_eq!(LogFormat::parse(raw), LogFormat::Json, "input {raw:?}");
    }
}

#[test]
fn test_levels() {
    let cases = [
        ("ERROR", Level::ERROR),
        ("warn", Level::WARN),
        ("Info", Level::INFO),
        ("debug", Level::DEBUG),
        ("trace", Level::TRACE),
        ("verbose", Level::INFO),
    ];
    for (raw, expected) in cases {
        assert_eq!(parse_level(raw), expected, "input {raw:?}");
    }
}

#[test]
fn test_settings_from_partial_environment() {
    let settings = LogSettings::from_lookup(|name| match name {
        "LOG_FORMAT" => Some("pretty".to_string()),
        _ => None,
    });

    assert_eq!(settings.format, LogFormat::Pretty);
    assert_eq!(settings.level, Level::INFO);
    assert!(!settings.include_spans);
}

#[test]
fn test_span_flag_requires_true() {
    for (raw, expected) in [("true", true), ("True", true), ("1", false), ("", false)] {
        let settings = LogSettings::from_lookup(|name| {
            (name == "LOG_SPANS").then(|| raw.to_string())
        });
        assert_eq!(settings.include_spans, expected, "input {raw:?}");
    }
}

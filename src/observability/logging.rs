//! Structured logging on `tracing`
//!
//! Output format, level and span events are read from the environment:
//!
//! - `LOG_LEVEL`: ERROR, WARN, INFO, DEBUG or TRACE (default INFO)
//! - `LOG_FORMAT`: `json`, `pretty` or `compact` (default json)
//! - `LOG_SPANS`: `true` to log span open/close events
//! - `RUST_LOG`: replaces the computed filter entirely
//!
//! ```bash
//! LOG_FORMAT=pretty LOG_LEVEL=DEBUG ./salespulse serve
//! ```
//!
//! The span macros below tag uploads, API requests and lifecycle events so a
//! request's log lines can be correlated in JSON output.

use std::env;
use tracing::Level;
use tracing_subscriber::filter::Directive;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Dependencies that log too much below WARN
const QUIET_TARGETS: [&str; 4] = ["hyper", "warp", "tokio", "calamine"];

/// Log output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// One JSON object per line
    Json,
    /// Multi-line, colored
    Pretty,
    /// Single-line, colored, without targets
    Compact,
}

impl LogFormat {
    /// Unknown values fall back to JSON
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "pretty" => LogFormat::Pretty,
            "compact" => LogFormat::Compact,
            _ => LogFormat::Json,
        }
    }
}

/// `LOG_LEVEL` value to a level, INFO when unrecognised
pub fn parse_level(s: &str) -> Level {
    match s.trim().to_uppercase().as_str() {
        "ERROR" => Level::ERROR,
        "WARN" | "WARNING" => Level::WARN,
        "DEBUG" => Level::DEBUG,
        "TRACE" => Level::TRACE,
        _ => Level::INFO,
    }
}

/// Resolved logging settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogSettings {
    pub level: Level,
    pub format: LogFormat,
    pub include_spans: bool,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            format: LogFormat::Json,
            include_spans: false,
        }
    }
}

impl LogSettings {
    /// Settings from `LOG_LEVEL`, `LOG_FORMAT` and `LOG_SPANS` as returned by
    /// `lookup`
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Self {
            level: lookup("LOG_LEVEL").map_or(defaults.level, |v| parse_level(&v)),
            format: lookup("LOG_FORMAT").map_or(defaults.format, |v| LogFormat::parse(&v)),
            include_spans: lookup("LOG_SPANS")
                .is_some_and(|v| v.trim().eq_ignore_ascii_case("true")),
        }
    }

    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }
}

/// Filter at `level` with noisy dependencies held at WARN, unless `rust_log`
/// overrides it
fn env_filter(level: Level, rust_log: Option<String>) -> EnvFilter {
    if let Some(rust_log) = rust_log {
        return EnvFilter::new(rust_log);
    }
    QUIET_TARGETS
        .iter()
        .filter_map(|target| format!("{target}=warn").parse::<Directive>().ok())
        .fold(EnvFilter::new(level.to_string()), EnvFilter::add_directive)
}

fn span_events(include_spans: bool) -> FmtSpan {
    if include_spans {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    }
}

/// Install the global subscriber
pub fn init_logging(level: Level, format: LogFormat, include_spans: bool) {
    let filter = env_filter(level, env::var("RUST_LOG").ok());
    let subscriber = tracing_subscriber::registry().with(filter);
    let events = span_events(include_spans);

    match format {
        LogFormat::Json => subscriber
            .with(fmt::layer().json().with_span_events(events))
            .init(),
        LogFormat::Pretty => subscriber
            .with(fmt::layer().pretty().with_ansi(true).with_span_events(events))
            .init(),
        LogFormat::Compact => subscriber
            .with(
                fmt::layer()
                    .compact()
                    .with_ansi(true)
                    .with_target(false)
                    .with_span_events(events),
            )
            .init(),
    }
}

/// Install the global subscriber from environment settings
pub fn init_default_logging() {
    let settings = LogSettings::from_env();
    init_logging(settings.level, settings.format, settings.include_spans);
}

/// Span around one upload, from decode to write
#[macro_export]
macro_rules! upload_span {
    ($($field:tt)*) => {
        tracing::info_span!("upload_processing", $($field)*)
    };
}

/// Span around one API request
#[macro_export]
macro_rules! request_span {
    ($($field:tt)*) => {
        tracing::info_span!("api_request", $($field)*)
    };
}

#[macro_export]
macro_rules! lifecycle_span {
    ($($field:tt)*) => {
        tracing::info_span!("lifecycle_event", $($field)*)
    };
}

pub use {lifecycle_span, request_span, upload_span};

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_log_format_parse() {
        assert_eq!(LogFormat::parse("JSON"), LogFormat::Json);
        assert_eq!(LogFormat::parse(" Pretty "), LogFormat::Pretty);
        assert_eq!(LogFormat::parse("compact"), LogFormat::Compact);
        assert_eq!(LogFormat::parse("xml"), LogFormat::Json);
    }

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("error"), Level::ERROR);
        assert_eq!(parse_level("Warning"), Level::WARN);
        assert_eq!(parse_level("TRACE"), Level::TRACE);
        assert_eq!(parse_level("loud"), Level::INFO);
    }

    #[test]
    fn test_settings_default_without_environment() {
        assert_eq!(LogSettings::from_lookup(lookup(&[])), LogSettings::default());
    }

    #[test]
    fn test_settings_from_lookup() {
        let settings = LogSettings::from_lookup(lookup(&[
            ("LOG_LEVEL", "debug"),
            ("LOG_FORMAT", "compact"),
            ("LOG_SPANS", "TRUE"),
        ]));
        assert_eq!(settings.level, Level::DEBUG);
        assert_eq!(settings.format, LogFormat::Compact);
        assert!(settings.include_spans);

        let settings = LogSettings::from_lookup(lookup(&[("LOG_SPANS", "yes")]));
        assert!(!settings.include_spans);
    }

    #[test]
    fn test_rust_log_replaces_filter() {
        let filter = env_filter(Level::INFO, Some("salespulse=trace".to_string()));
        assert_eq!(filter.to_string(), "salespulse=trace");

        let filter = env_filter(Level::DEBUG, None).to_string();
        assert!(filter.to_lowercase().contains("debug"));
        assert!(filter.contains("warp=warn"));
    }

    #[test]
    fn test_span_events() {
        assert_eq!(span_events(false), FmtSpan::NONE);
        assert_eq!(span_events(true), FmtSpan::NEW | FmtSpan::CLOSE);
    }

    #[test]
    fn test_span_macros_build_spans() {
        let _upload = upload_span!(file = "april.csv", branch = "Hyderabad Branch");
        let _request = request_span!(route = "data");
        let _lifecycle = lifecycle_span!(event = "startup");
    }
}

use std::collections::HashMap;
use std::fmt;
use std::sync::OnceLock;

use chrono::{DateTime, SecondsFormat, Utc};
use log::debug;
use regex::Regex;
use scraper::{Html, Selector};
use serde::{Deserialize, Deserializer};

/// Locator key naming the e2e test an event is attributed to.
const TEST_LOCATOR_KEY: &str = "e2e-test";
const NOT_A_TEST: &str = "Not a test";

fn spyglass_file_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"e2e-timelines_spyglass_.*\.json$").expect("invalid spyglass file regex")
    })
}

/// Treats an explicit JSON `null` like a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub enum Level {
    Error,
    Warning,
    Info,
    #[default]
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Locator {
    #[serde(rename = "type", default, deserialize_with = "null_as_default")]
    pub kind: String,
    /// `None` when the trace carries no keys at all
    #[serde(default)]
    pub keys: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    #[serde(default, deserialize_with = "null_as_default")]
    pub reason: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub cause: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub human_message: String,
}

/// One interval of a spyglass timeline trace.
#[derive(Debug, Clone, Deserialize)]
pub struct EventInterval {
    #[serde(default, deserialize_with = "null_as_default")]
    pub level: Level,
    #[serde(default, deserialize_with = "null_as_default")]
    pub source: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub locator: Locator,
    #[serde(default, deserialize_with = "null_as_default")]
    pub message: Message,
    #[serde(default)]
    pub from: Option<DateTime<Utc>>,
    #[serde(default)]
    pub to: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Report {
    #[serde(default, deserialize_with = "null_as_default")]
    pub items: Vec<EventInterval>,
}

impl EventInterval {
    pub fn is_error_or_warning(&self) -> bool {
        matches!(self.level, Level::Error | Level::Warning)
    }

    pub fn test_locator(&self) -> Option<&str> {
        self.locator
            .keys
            .as_ref()
            .and_then(|keys| keys.get(TEST_LOCATOR_KEY))
            .map(String::as_str)
    }

    /// Renders the event as one line, or `None` if it lacks a source, a human
    /// message, locator keys or either timestamp.
    pub fn render(&self) -> Option<String> {
        if self.source.is_empty() || self.message.human_message.is_empty() {
            return None;
        }
        self.locator.keys.as_ref()?;
        let from = self.from?;
        let to = self.to?;

        let reason = if self.message.cause.is_empty() {
            self.message.reason.clone()
        } else {
            format!("{} ({})", self.message.reason, self.message.cause)
        };

        Some(format!(
            "Source: {} Type: {} Locator: 'test: {}' Reason: {} HumanMessage: {} From: {} To: {}",
            self.source,
            self.locator.kind,
            self.test_locator().unwrap_or(NOT_A_TEST),
            reason,
            self.message.human_message,
            from.to_rfc3339_opts(SecondsFormat::Secs, true),
            to.to_rfc3339_opts(SecondsFormat::Secs, true),
        ))
    }
}

/// All Error and Warning events of a trace, in trace order.
pub fn error_and_warning_events(report: &Report) -> Vec<&EventInterval> {
    report
        .items
        .iter()
        .filter(|event| event.is_error_or_warning())
        .collect()
}

/// Outcome of correlating a trace with a test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Correlation {
    /// The trace has no Error or Warning events
    NoErrorsOrWarnings,
    /// Error/Warning events exist but none are complete enough to render
    NoCompleteEvents,
    /// Complete events exist but none is attributed to the test
    NoTestMatch { test_name: String },
    /// Rendered events, ending with the first hit unless all matches were requested
    Matched(Vec<String>),
}

impl fmt::Display for Correlation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoErrorsOrWarnings => f.write_str("no errors and warnings!"),
            Self::NoCompleteEvents => f.write_str("no relevant data"),
            Self::NoTestMatch { test_name } => {
                write!(f, "no error or warning events reference test '{test_name}'")
            }
            Self::Matched(lines) => {
                for line in lines {
                    writeln!(f, "{line}")?;
                }
                Ok(())
            }
        }
    }
}

/// Lists complete Error/Warning events leading up to the first one attributed
/// to `test_name`.
///
/// Scanning stops right after that first hit unless `return_all_matches` is
/// set, in which case every complete event is listed.
pub fn correlate(report: &Report, test_name: &str, return_all_matches: bool) -> Correlation {
    let events = error_and_warning_events(report);
    if events.is_empty() {
        return Correlation::NoErrorsOrWarnings;
    }

    let mut lines = Vec::new();
    let mut matched = false;
    for event in events {
        let Some(line) = event.render() else {
            continue;
        };
        lines.push(line);

        if event.test_locator() == Some(test_name) {
            matched = true;
            if !return_all_matches {
                break;
            }
        }
    }

    debug!("Rendered {} events for test '{test_name}' (matched: {matched})", lines.len());

    if lines.is_empty() {
        Correlation::NoCompleteEvents
    } else if !matched {
        Correlation::NoTestMatch {
            test_name: test_name.to_string(),
        }
    } else {
        Correlation::Matched(lines)
    }
}

/// Names of timeline trace files linked from an artifact directory listing.
///
/// Matches on the visible text of each link, with nested markup stripped.
pub fn spyglass_file_names(listing_html: &str) -> Vec<String> {
    let Ok(anchors) = Selector::parse("a") else {
        return Vec::new();
    };
    let document = Html::parse_document(listing_html);
    document
        .select(&anchors)
        .map(|anchor| anchor.text().collect::<String>())
        .map(|text| text.trim().to_string())
        .filter(|text| spyglass_file_regex().is_match(text))
        .collect()
}

//! crates/study_planner_core/src/text_actions.rs
//!
//! Scans free-form task text for things the user can act on directly:
//! email addresses, phone numbers, links, places, meetings, writing work
//! and research topics. Each pass is independent; overlapping matches are
//! not merged and false positives are expected.

use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;
use url::Url;

static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?-u:\b)[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Z|a-z]{2,}(?-u:\b)")
        .expect("valid email regex")
});

static PHONE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\+?[0-9]{1,4}[-.\s]?)?(\(?[0-9]{3}\)?[-.\s]?[0-9]{3}[-.\s]?[0-9]{4}|[0-9]{10})")
        .expect("valid phone regex")
});

static LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"https?://[^\s]+").expect("valid url regex"));

static PLACE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?-u:\b)(?:visit|go to|meet at|address|location)\s+([^.!?]+)")
        .expect("valid address regex")
});

static MEETING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?-u:\b)(?:meeting|schedule|appointment|call|event)(?-u:\b)")
        .expect("valid meeting regex")
});

static WRITING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?-u:\b)(?:write|create|draft|document|report|proposal|presentation)(?-u:\b)")
        .expect("valid document regex")
});

static RESEARCH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?-u:\b)(?:research|search|find|look up|investigate)\s+([^.!?]+)")
        .expect("valid research regex")
});

const MIN_PHONE_DIGITS: usize = 10;
const DOCUMENT_CREATE_URL: &str = "https://docs.google.com/document/create";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Email,
    Phone,
    Website,
    Maps,
    Calendar,
    Document,
    Search,
}

/// A deep link surfaced from the task text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SuggestedAction {
    pub kind: ActionKind,
    pub label: String,
    pub url: String,
}

/// Runs every heuristic over `text` and returns the actions in pass order.
pub fn extract_actions(text: &str) -> Vec<SuggestedAction> {
    let mut actions = Vec::new();

    for m in EMAIL.find_iter(text) {
        let email = m.as_str();
        actions.push(SuggestedAction {
            kind: ActionKind::Email,
            label: format!("Email {email}"),
            url: format!("mailto:{email}"),
        });
    }

    for m in PHONE.find_iter(text) {
        let written = m.as_str();
        let digits: String = written.chars().filter(|c| c.is_ascii_digit()).collect();
        if digits.len() >= MIN_PHONE_DIGITS {
            actions.push(SuggestedAction {
                kind: ActionKind::Phone,
                label: format!("Call {written}"),
                url: format!("tel:{digits}"),
            });
        }
    }

    for m in LINK.find_iter(text) {
        let link = m.as_str();
        let Some(host) = Url::parse(link).ok().and_then(|u| u.host_str().map(str::to_string))
        else {
            continue;
        };
        actions.push(SuggestedAction {
            kind: ActionKind::Website,
            label: format!("Visit {host}"),
            url: link.to_string(),
        });
    }

    for caps in PLACE.captures_iter(text) {
        let location = caps[1].trim();
        if location.chars().count() > 3 {
            actions.push(SuggestedAction {
                kind: ActionKind::Maps,
                label: format!("Navigate to {location}"),
                url: format!(
                    "https://maps.google.com/?q={}",
                    urlencoding::encode(location)
                ),
            });
        }
    }

    if MEETING.is_match(text) {
        actions.push(SuggestedAction {
            kind: ActionKind::Calendar,
            label: "Add to Calendar".to_string(),
            url: format!(
                "https://calendar.google.com/calendar/render?action=TEMPLATE&text={}",
                urlencoding::encode(text)
            ),
        });
    }

    if WRITING.is_match(text) {
        actions.push(SuggestedAction {
            kind: ActionKind::Document,
            label: "Create Document".to_string(),
            url: DOCUMENT_CREATE_URL.to_string(),
        });
    }

    for caps in RESEARCH.captures_iter(text) {
        let query = caps[1].trim();
        if query.chars().count() > 2 {
            actions.push(SuggestedAction {
                kind: ActionKind::Search,
                label: format!("Search for \"{query}\""),
                url: format!(
                    "https://www.google.com/search?q={}",
                    urlencoding::encode(query)
                ),
            });
        }
    }

    actions
}

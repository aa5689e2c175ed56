//! Repairs classifier replies into a normalized `{phone, message}` record.
//!
//! The model frequently violates its own format contract: it wraps the
//! JSON in prose, emits raw newlines inside string values, or skips JSON
//! entirely. Extraction is therefore layered, strictest first:
//!
//! 1. parse the whole reply as JSON;
//! 2. scan for an embedded object carrying both keys, repair raw line
//!    breaks inside it, and parse that;
//! 3. fall back to the reply text itself, scavenging phone numbers and
//!    `@`-handles for the contact field.
//!
//! `extract` is total and pure — a malformed reply must never abort a
//! pipeline run. Garbage replies come out as short records the acceptance
//! filter discards.

use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;

/// Normalized classification result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedRecord {
    /// Phone number, `@`-handle, or link. May be empty.
    pub phone: String,
    /// Candidate listing body, HTML-bearing.
    pub message: String,
}

#[derive(Debug, Deserialize)]
struct RecordFields {
    #[serde(default)]
    phone: String,
    message: String,
}

/// Non-greedy brace pair. Candidates are validated for the two keys
/// separately, so a `{...}` in surrounding prose is skipped over.
static BRACE_PAIR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)\{.*?\}").unwrap());

/// Belarusian country-code phone (optional separators) or a Telegram-style
/// handle. `\B@` keeps the handle branch from firing inside e-mail
/// addresses.
static CONTACT_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\+?375(?:[\s\-()]*\d){9}|\B@[A-Za-z][A-Za-z0-9_]{3,31}").unwrap()
});

/// Turn a raw classifier reply into an `ExtractedRecord`. Never fails.
pub fn extract(raw: &str) -> ExtractedRecord {
    if let Some(record) = parse_strict(raw) {
        return record;
    }
    if let Some(candidate) = find_candidate(raw)
        && let Some(record) = parse_candidate(candidate)
    {
        return record;
    }
    heuristic_record(raw)
}

/// Layer 1: the whole trimmed reply is the JSON object.
fn parse_strict(raw: &str) -> Option<ExtractedRecord> {
    serde_json::from_str::<RecordFields>(raw.trim())
        .ok()
        .map(into_record)
}

/// Layer 2a: locate a JSON-object-shaped substring holding both keys.
fn find_candidate(raw: &str) -> Option<&str> {
    BRACE_PAIR
        .find_iter(raw)
        .map(|m| m.as_str())
        .find(|c| c.contains("\"phone\"") && c.contains("\"message\""))
}

/// Layer 2b: repair raw line breaks inside the candidate, then parse.
///
/// The model sometimes emits literal newlines inside a JSON string value,
/// which is structurally invalid. Re-escaping the whole candidate is safe
/// for the single-line objects the instruction asks for; anything else
/// fails the parse and drops through to the heuristic layer.
fn parse_candidate(candidate: &str) -> Option<ExtractedRecord> {
    let repaired = candidate.replace('\r', "\\r").replace('\n', "\\n");
    serde_json::from_str::<RecordFields>(&repaired)
        .ok()
        .map(into_record)
}

/// Layer 3: the reply itself becomes the message body; the contact field
/// collects every phone- or handle-shaped token, in order of first
/// appearance, joined with ", ".
fn heuristic_record(raw: &str) -> ExtractedRecord {
    let tokens: Vec<&str> = CONTACT_TOKEN.find_iter(raw).map(|m| m.as_str()).collect();
    ExtractedRecord {
        phone: tokens.join(", "),
        message: raw.to_string(),
    }
}

fn into_record(fields: RecordFields) -> ExtractedRecord {
    ExtractedRecord {
        phone: fields.phone,
        message: fields.message,
    }
}

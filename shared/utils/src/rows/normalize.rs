//! Row Normalizer
//!
//! Coerces a raw record returned by the vision model into a canonical
//! [`ExtractedRow`]. Total: malformed values become `None`, never an error.

use chrono::{SecondsFormat, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

use cardex_models::ExtractedRow;

/// A row object exactly as the model produced it.
pub type RawRow = Map<String, Value>;

static EMAIL_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^@]+@[^@]+\.[^@]+$").expect("email pattern is valid"));

/// Apply the normalization rules to a single extracted row.
pub fn normalize_row(raw: &RawRow) -> ExtractedRow {
    ExtractedRow {
        timestamp: default_timestamp(raw.get("timestamp")),
        full_name: to_text(raw.get("fullName")),
        job_title: to_text(raw.get("jobTitle")),
        company: to_text(raw.get("company")),
        phone1: normalize_phone(raw.get("phone1")),
        phone2: normalize_phone(raw.get("phone2")),
        email1: normalize_email(raw.get("email1")),
        email2: normalize_email(raw.get("email2")),
        website: normalize_website(raw.get("website")),
        address: to_text(raw.get("address")),
        notes: to_text(raw.get("notes")),
        confidence: clamp_confidence(raw.get("confidence")),
        raw_text: to_text(raw.get("rawText")),
        file_name: to_text(raw.get("fileName")),
        file_id: to_text(raw.get("fileId")),
        file_link: to_text(raw.get("fileLink")),
    }
}

/// String form of a JSON value; `None` for null or a missing key.
fn stringify(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Trim; empty or whitespace-only becomes `None`.
fn to_text(value: Option<&Value>) -> Option<String> {
    let text = stringify(value)?;
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Keep ASCII digits only.
fn normalize_phone(value: Option<&Value>) -> Option<String> {
    let digits: String = stringify(value)?
        .chars()
        .filter(char::is_ascii_digit)
        .collect();
    (!digits.is_empty()).then_some(digits)
}

/// Lowercase, then a permissive `local@domain.tld` shape check.
fn normalize_email(value: Option<&Value>) -> Option<String> {
    let email = stringify(value)?.trim().to_lowercase();
    EMAIL_PATTERN.is_match(&email).then_some(email)
}

fn normalize_website(value: Option<&Value>) -> Option<String> {
    let site: String = stringify(value)?
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    (!site.is_empty()).then_some(site)
}

fn clamp_confidence(value: Option<&Value>) -> Option<f64> {
    let confidence = match value? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        Value::Bool(flag) => f64::from(u8::from(*flag)),
        _ => return None,
    };
    if confidence.is_nan() {
        return None;
    }
    Some(confidence.clamp(0.0, 1.0))
}

/// The provided value verbatim when non-blank, otherwise UTC now in ISO-8601.
fn default_timestamp(value: Option<&Value>) -> String {
    to_text(value).unwrap_or_else(|| Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false))
}

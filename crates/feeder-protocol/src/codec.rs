//! Payload codec for the feeder HTTP API.
//!
//! Responses are JSON. The `setFeedTimes` payload is JSON too when it comes
//! from the bundled web page, but older pages and hand-typed URLs send
//! looser text such as `[{h:8,m:0,r:2},{h:"20",m:30}]`. [`decode_feed_times`]
//! accepts both.

use std::sync::OnceLock;

use feeder_core::{RawSlotInput, MAX_SLOTS};
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::messages::StatusResponse;

/// Errors that can occur during message encoding.
#[derive(Debug, Error)]
pub enum CodecError {
    /// JSON serialization failed.
    #[error("Failed to serialize message: {0}")]
    SerializeError(#[from] serde_json::Error),
}

/// Encode the status document.
pub fn encode_status(status: &StatusResponse) -> Result<String, CodecError> {
    encode(status)
}

/// Encode any response body as JSON.
pub fn encode<T: Serialize + ?Sized>(body: &T) -> Result<String, CodecError> {
    serde_json::to_string(body).map_err(CodecError::from)
}

/// Decode a `setFeedTimes` payload into raw slot records.
///
/// Never fails. Each top-level object becomes one record; fields that are
/// missing or unreadable are left as `None`. At most [`MAX_SLOTS`] records
/// are returned, in payload order.
pub fn decode_feed_times(payload: &str) -> Vec<RawSlotInput> {
    let payload = payload.trim();
    let records = match serde_json::from_str::<Value>(payload) {
        Ok(value) => from_json(&value),
        Err(e) => {
            debug!("Feed times payload is not strict JSON ({}), scanning", e);
            scan_objects(payload)
        }
    };
    if records.is_empty() && !payload.is_empty() {
        warn!("No feed time records found in payload");
    }
    records
}

fn from_json(value: &Value) -> Vec<RawSlotInput> {
    match value {
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_object)
            .take(MAX_SLOTS)
            .map(|obj| RawSlotInput {
                hour: json_field(obj, &["h", "hour"]),
                minute: json_field(obj, &["m", "minute"]),
                repeat_count: json_field(obj, &["r", "repeats"]),
            })
            .collect(),
        Value::Object(obj) => vec![RawSlotInput {
            hour: json_field(obj, &["h", "hour"]),
            minute: json_field(obj, &["m", "minute"]),
            repeat_count: json_field(obj, &["r", "repeats"]),
        }],
        _ => Vec::new(),
    }
}

fn json_field(obj: &serde_json::Map<String, Value>, names: &[&str]) -> Option<i64> {
    let value = names.iter().find_map(|name| obj.get(*name))?;
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => leading_int(s),
        _ => None,
    }
}

/// Split loose text into top-level `{...}` bodies and read fields from each.
fn scan_objects(text: &str) -> Vec<RawSlotInput> {
    let mut records = Vec::new();
    let mut depth = 0usize;
    let mut start = None;

    for (idx, c) in text.char_indices() {
        if records.len() >= MAX_SLOTS {
            break;
        }
        match c {
            '{' => {
                if depth == 0 {
                    start = Some(idx + 1);
                }
                depth += 1;
            }
            '}' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    if let Some(begin) = start.take() {
                        records.push(scan_record(&text[begin..idx]));
                    }
                }
            }
            _ => {}
        }
    }
    records
}

fn scan_record(body: &str) -> RawSlotInput {
    RawSlotInput {
        hour: scan_field(body, field_pattern(&HOUR, "h|hour")),
        minute: scan_field(body, field_pattern(&MINUTE, "m|minute")),
        repeat_count: scan_field(body, field_pattern(&REPEATS, "r|repeats")),
    }
}

static HOUR: OnceLock<Option<Regex>> = OnceLock::new();
static MINUTE: OnceLock<Option<Regex>> = OnceLock::new();
static REPEATS: OnceLock<Option<Regex>> = OnceLock::new();

/// `key: value` where the key may be quoted and the value may be quoted or
/// padded, e.g. `"h": 8`, `h:8`, `'r':"3"`.
fn field_pattern<'a>(cell: &'a OnceLock<Option<Regex>>, keys: &str) -> Option<&'a Regex> {
    cell.get_or_init(|| {
        Regex::new(&format!(
            r#"(?:^|[^A-Za-z0-9_])["']?(?:{})["']?\s*:[\s"']*(-?\d+)"#,
            keys
        ))
        .ok()
    })
    .as_ref()
}

fn scan_field(body: &str, pattern: Option<&Regex>) -> Option<i64> {
    let captures = pattern?.captures(body)?;
    captures.get(1)?.as_str().parse().ok()
}

/// Parse an optional sign and leading digits, ignoring surrounding quotes
/// and whitespace. `"12abc"` reads as 12, `"abc"` as nothing.
pub fn leading_int(text: &str) -> Option<i64> {
    let text = text.trim_matches(|c: char| c.is_whitespace() || c == '"' || c == '\'');
    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text.strip_prefix('+').unwrap_or(text)),
    };
    let end = digits
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit())
        .map_or(digits.len(), |(i, _)| i);
    if end == 0 {
        return None;
    }
    let value: i64 = digits[..end].parse().ok()?;
    Some(if negative { -value } else { value })
}

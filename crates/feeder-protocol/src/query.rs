//! Query-string parameters.
//!
//! Every endpoint takes its arguments as `GET` query parameters. Values are
//! read the way the bundled web pages send them: numbers are taken from the
//! leading digits of the value, and text that is not a number reads as zero.
//! A parameter that is absent is `None`, which the callers treat as "keep
//! the current value" or "use the default".

use std::collections::HashMap;

use feeder_core::RawSlotInput;

use crate::codec::{decode_feed_times, leading_int};

/// Decoded query parameters of one request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams(HashMap<String, String>);

impl QueryParams {
    /// Parse `a=1&b=two`. Keys and values are percent-decoded and `+` reads
    /// as a space. The first occurrence of a key wins.
    pub fn parse(query: &str) -> Self {
        let mut params = HashMap::new();
        for pair in query.split('&').filter(|p| !p.is_empty()) {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            params
                .entry(percent_decode(key))
                .or_insert_with(|| percent_decode(value));
        }
        Self(params)
    }

    /// Parse the query part of a request URI such as `/api/setSpeed?speed=5`.
    pub fn from_uri(uri: &str) -> Self {
        uri.split_once('?')
            .map(|(_, query)| Self::parse(query))
            .unwrap_or_default()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn int(&self, name: &str) -> Option<i64> {
        self.get(name).map(lenient_int)
    }

    pub fn float(&self, name: &str) -> Option<f32> {
        self.get(name).map(lenient_float)
    }

    /// Only the exact value `true` is true.
    pub fn flag(&self, name: &str) -> Option<bool> {
        self.get(name).map(|v| v == "true")
    }
}

impl From<HashMap<String, String>> for QueryParams {
    fn from(params: HashMap<String, String>) -> Self {
        Self(params)
    }
}

/// Leading integer of `text`, or 0.
pub fn lenient_int(text: &str) -> i64 {
    leading_int(text).unwrap_or(0)
}

/// Leading decimal number of `text`, or 0.
pub fn lenient_float(text: &str) -> f32 {
    let text = text.trim();
    let mut end = 0;
    let mut seen_digit = false;
    let mut seen_dot = false;
    for (i, c) in text.char_indices() {
        match c {
            '+' | '-' if i == 0 => {}
            '0'..='9' => seen_digit = true,
            '.' if !seen_dot => seen_dot = true,
            _ => break,
        }
        end = i + c.len_utf8();
    }
    if !seen_digit {
        return 0.0;
    }
    text[..end].parse().unwrap_or(0.0)
}

/// Schedule records of a `setFeedTimes` request.
///
/// The `data` parameter carries the full slot list. Without it, the legacy
/// two-slot form `h1,m1,r1,h2,m2,r2` is read; any of those that is missing
/// takes the slot default.
pub fn feed_times(params: &QueryParams) -> Vec<RawSlotInput> {
    if let Some(data) = params.get("data") {
        return decode_feed_times(data);
    }
    (1..=2)
        .map(|n| RawSlotInput {
            hour: params.int(&format!("h{}", n)),
            minute: params.int(&format!("m{}", n)),
            repeat_count: params.int(&format!("r{}", n)),
        })
        .collect()
}

/// `ssid` and `password`, when both are present.
pub fn wifi_credentials(params: &QueryParams) -> Option<(String, String)> {
    let ssid = params.get("ssid")?;
    let password = params.get("password")?;
    Some((ssid.to_string(), password.to_string()))
}

fn percent_decode(text: &str) -> String {
    let bytes = text.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'+' => out.push(b' '),
            b'%' if i + 2 < bytes.len() => {
                match (hex_value(bytes[i + 1]), hex_value(bytes[i + 2])) {
                    (Some(hi), Some(lo)) => {
                        out.push((hi << 4) | lo);
                        i += 2;
                    }
                    _ => out.push(b'%'),
                }
            }
            b => out.push(b),
        }
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_decode() {
        let params = QueryParams::from_uri("/api/setWiFi?ssid=My%20Net&password=a+b%26c");
        assert_eq!(params.get("ssid"), Some("My Net"));
        assert_eq!(params.get("password"), Some("a b&c"));
        assert_eq!(
            wifi_credentials(&params),
            Some(("My Net".to_string(), "a b&c".to_string()))
        );
    }

    #[test]
    fn test_missing_wifi_parameter() {
        assert_eq!(wifi_credentials(&QueryParams::parse("ssid=Home")), None);
        assert_eq!(
            wifi_credentials(&QueryParams::parse("ssid=Home&password=")),
            Some(("Home".to_string(), String::new()))
        );
    }

    #[test]
    fn test_lenient_numbers() {
        let params = QueryParams::parse("speed=7.5x&repeats=abc&angle=-20");
        assert_eq!(params.float("speed"), Some(7.5));
        assert_eq!(params.int("repeats"), Some(0));
        assert_eq!(params.int("angle"), Some(-20));
        assert_eq!(params.int("missing"), None);
        assert_eq!(lenient_float("abc"), 0.0);
        assert_eq!(lenient_float("-.5"), -0.5);
    }

    #[test]
    fn test_flag() {
        assert_eq!(QueryParams::parse("enabled=true").flag("enabled"), Some(true));
        assert_eq!(QueryParams::parse("enabled=1").flag("enabled"), Some(false));
        assert_eq!(QueryParams::parse("").flag("enabled"), None);
    }

    #[test]
    fn test_feed_times_from_data() {
        let params = QueryParams::parse("data=%5B%7B%22h%22%3A8%2C%22m%22%3A15%7D%5D");
        let slots: Vec<_> = feed_times(&params).into_iter().map(RawSlotInput::into_slot).collect();
        assert_eq!(slots.len(), 1);
        assert_eq!((slots[0].hour, slots[0].minute, slots[0].repeat_count), (8, 15, 1));
    }

    #[test]
    fn test_feed_times_legacy_form() {
        let params = QueryParams::parse("h1=7&m1=30&r1=2&h2=19&m2=0");
        let slots: Vec<_> = feed_times(&params).into_iter().map(RawSlotInput::into_slot).collect();
        let tuples: Vec<_> = slots.iter().map(|s| (s.hour, s.minute, s.repeat_count)).collect();
        assert_eq!(tuples, vec![(7, 30, 2), (19, 0, 1)]);
    }

    #[test]
    fn test_truncated_escape_kept_literally() {
        assert_eq!(QueryParams::parse("a=50%").get("a"), Some("50%"));
        assert_eq!(QueryParams::parse("a=%zz").get("a"), Some("%zz"));
    }
}

//! Lenient date, price and JSON scalar parsing.
//!
//! Everything here degrades to `None` instead of failing.

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use serde_json::{Map, Value};

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Numeric or written-month date anywhere in a string.
pub(crate) static DATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(\d{1,2}/\d{1,2}/\d{2,4}|(?:jan|feb|mar|apr|may|jun|jul|aug|sep|sept|oct|nov|dec)[a-z]*\.?\s+\d{1,2},\s+\d{4})\b",
    )
    .unwrap()
});

static ISO_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{4})-(\d{2})-(\d{2})").unwrap());

static SLASH_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{1,2}/\d{1,2}/(\d{2}|\d{4})$").unwrap());

static SEPT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)^sept\b\.?").unwrap());

static PRICE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\s*([0-9][0-9,]*(?:\.[0-9]+)?)").unwrap());

/// Collapse runs of whitespace and trim.
pub fn normalize_whitespace(text: &str) -> String {
    WHITESPACE.replace_all(text, " ").trim().to_string()
}

/// Parse a date to ISO `YYYY-MM-DD`.
///
/// Accepts `m/d/Y`, `m/d/y`, `Mon d, Y`, `Month d, Y` and anything starting
/// with an ISO date. Falls back to the first date-looking substring.
pub fn parse_date(text: &str) -> Option<String> {
    let text = normalize_whitespace(text);
    if text.is_empty() {
        return None;
    }

    if let Some(caps) = ISO_PREFIX.captures(&text) {
        let year = caps[1].parse().ok()?;
        let month = caps[2].parse().ok()?;
        let day = caps[3].parse().ok()?;
        return NaiveDate::from_ymd_opt(year, month, day).map(|d| d.to_string());
    }

    if let Some(date) = parse_exact(&text) {
        return Some(date.to_string());
    }

    DATE_RE
        .find(&text)
        .filter(|m| m.as_str() != text)
        .and_then(|m| parse_exact(m.as_str()))
        .map(|d| d.to_string())
}

fn parse_exact(text: &str) -> Option<NaiveDate> {
    if let Some(caps) = SLASH_DATE.captures(text) {
        let format = if caps[1].len() == 4 { "%m/%d/%Y" } else { "%m/%d/%y" };
        return NaiveDate::parse_from_str(text, format).ok();
    }

    // Neither %B nor %b accepts "Sept" or "Jan."
    let cleaned = SEPT.replace(text, "Sep").replacen('.', "", 1);
    ["%B %d, %Y", "%b %d, %Y"]
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(&cleaned, format).ok())
}

/// First `$`-prefixed amount in the text.
pub fn parse_price(text: &str) -> Option<f64> {
    let caps = PRICE_RE.captures(text)?;
    caps[1].replace(',', "").parse().ok()
}

/// Number from a JSON number or a string such as `"$1,200"`.
pub fn value_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let cleaned: String = s
                .chars()
                .filter(|c| !matches!(c, ',' | '$') && !c.is_whitespace())
                .collect();
            cleaned.parse::<f64>().ok().filter(|n| n.is_finite())
        }
        _ => None,
    }
}

/// Whole number; fractional input is truncated.
pub fn value_i32(value: &Value) -> Option<i32> {
    let n = value_f64(value)?;
    if n.abs() > i32::MAX as f64 {
        return None;
    }
    Some(n.trunc() as i32)
}

/// Text for a scalar JSON value.
pub fn value_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// First alias holding something other than null or an empty string.
pub fn first_value<'a>(map: &'a Map<String, Value>, aliases: &[&str]) -> Option<&'a Value> {
    aliases.iter().filter_map(|key| map.get(*key)).find(|v| match v {
        Value::Null => false,
        Value::String(s) => !s.trim().is_empty(),
        _ => true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_date_formats() {
        let cases = [
            ("3/5/2019", Some("2019-03-05")),
            ("03/05/19", Some("2019-03-05")),
            ("Mar 5, 2019", Some("2019-03-05")),
            ("March 5, 2019", Some("2019-03-05")),
            ("Sept 12, 2017", Some("2017-09-12")),
            ("Sept. 12, 2017", Some("2017-09-12")),
            ("September 12, 2017", Some("2017-09-12")),
            ("Jan. 3, 2020", Some("2020-01-03")),
            ("Sold on June 10, 2018 for $1", Some("2018-06-10")),
            ("2018-11-02T00:00:00Z", Some("2018-11-02")),
            ("Listed on  4/1/2020 by owner", Some("2020-04-01")),
            ("yesterday", None),
            ("13/45/2019", None),
            ("", None),
        ];
        for (input, expected) in cases {
            assert_eq!(parse_date(input).as_deref(), expected, "parse_date({:?})", input);
        }
    }

    #[test]
    fn test_parse_price() {
        assert_eq!(parse_price("$1,250,000"), Some(1_250_000.0));
        assert_eq!(parse_price("was $ 3,100.50/mo"), Some(3100.5));
        assert_eq!(parse_price("1,250,000"), None);
        assert_eq!(parse_price("$"), None);
    }

    #[test]
    fn test_value_helpers_degrade_to_none() {
        assert_eq!(value_f64(&json!("$2,500")), Some(2500.0));
        assert_eq!(value_f64(&json!(1.5)), Some(1.5));
        assert_eq!(value_f64(&json!("n/a")), None);
        assert_eq!(value_f64(&json!([1])), None);
        assert_eq!(value_i32(&json!("2.5")), Some(2));
        assert_eq!(value_i32(&json!(1e12)), None);
        assert_eq!(value_string(&json!("  ")), None);
        assert_eq!(value_string(&json!(42)), Some("42".to_string()));
    }

    #[test]
    fn test_first_value_skips_blank_aliases() {
        let map = json!({"price": "", "listingPrice": 900000, "listing_price": 1});
        let map = map.as_object().unwrap();
        assert_eq!(
            first_value(map, &["price", "listingPrice", "listing_price"]),
            Some(&json!(900000))
        );
        assert_eq!(first_value(map, &["missing"]), None);
    }
}

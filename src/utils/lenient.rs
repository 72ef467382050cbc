//! Tolerant readers for provider JSON.
//!
//! Provider payloads mix numbers, numeric strings, percent strings and
//! placeholders like `"NA"` or `"-"`. Everything here maps what it cannot
//! understand to `None` instead of failing.

use chrono::NaiveDate;
use serde_json::Value;

const PLACEHOLDERS: [&str; 6] = ["", "na", "n/a", "-", "null", "none"];

pub fn f64_from(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let cleaned = s.trim().trim_end_matches('%').replace(',', "");
            if PLACEHOLDERS.contains(&cleaned.to_lowercase().as_str()) {
                None
            } else {
                cleaned.parse::<f64>().ok()
            }
        }
        _ => None,
    };
    parsed.filter(|v| v.is_finite())
}

pub fn i64_from(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.round() as i64)),
        other => f64_from(other).map(|f| f.round() as i64),
    }
}

pub fn string_from(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            if PLACEHOLDERS.contains(&trimmed.to_lowercase().as_str()) {
                None
            } else {
                Some(trimmed.to_string())
            }
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Accepts `YYYY-MM-DD`, optionally followed by a time component.
pub fn date_from(value: &Value) -> Option<NaiveDate> {
    let raw = string_from(value)?;
    let date_part = raw.split(|c| c == ' ' || c == 'T').next()?;
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()
}

/// First non-null field present under any of the given names.
pub fn field<'a>(object: &'a Value, names: &[&str]) -> Option<&'a Value> {
    let map = object.as_object()?;
    names
        .iter()
        .filter_map(|name| map.get(*name))
        .find(|v| !v.is_null())
}

pub fn f64_field(object: &Value, names: &[&str]) -> Option<f64> {
    field(object, names).and_then(f64_from)
}

pub fn i64_field(object: &Value, names: &[&str]) -> Option<i64> {
    field(object, names).and_then(i64_from)
}

pub fn string_field(object: &Value, names: &[&str]) -> Option<String> {
    field(object, names).and_then(string_from)
}

pub fn date_field(object: &Value, names: &[&str]) -> Option<NaiveDate> {
    field(object, names).and_then(date_from)
}

/// Nested object under any of the names; wrong JSON types count as missing.
pub fn object_field<'a>(object: &'a Value, names: &[&str]) -> Option<&'a Value> {
    field(object, names).filter(|v| v.is_object())
}

/// Keyed collection delivered either as an object (`{"AAPL.US": {...}}`) or
/// as an array. Array entries get no key. `None` when the field is absent or
/// not a collection.
pub fn entries<'a>(object: &'a Value, names: &[&str]) -> Option<Vec<(Option<&'a str>, &'a Value)>> {
    match field(object, names)? {
        Value::Object(map) => Some(map.iter().map(|(k, v)| (Some(k.as_str()), v)).collect()),
        Value::Array(items) => Some(items.iter().map(|v| (None, v)).collect()),
        _ => None,
    }
}

/// Lowercase with spaces, underscores and dashes removed, for matching
/// category keys such as `Stock non-US` / `Stock_Non_US`.
pub fn normalize_key(key: &str) -> String {
    key.chars()
        .filter(|c| !matches!(c, ' ' | '_' | '-'))
        .flat_map(char::to_lowercase)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn numbers_and_numeric_strings_parse() {
        assert_eq!(f64_from(&json!(1.5)), Some(1.5));
        assert_eq!(f64_from(&json!("2.25")), Some(2.25));
        assert_eq!(f64_from(&json!(" 12.5% ")), Some(12.5));
        assert_eq!(f64_from(&json!("1,234.5")), Some(1234.5));
    }

    #[test]
    fn placeholders_are_unavailable() {
        assert_eq!(f64_from(&json!("NA")), None);
        assert_eq!(f64_from(&json!("")), None);
        assert_eq!(f64_from(&json!(null)), None);
        assert_eq!(f64_from(&json!({"nested": 1})), None);
        assert_eq!(string_from(&json!("N/A")), None);
    }

    #[test]
    fn dates_accept_time_suffix() {
        let expected = NaiveDate::from_ymd_opt(2024, 3, 15);
        assert_eq!(date_from(&json!("2024-03-15")), expected);
        assert_eq!(date_from(&json!("2024-03-15 00:00:00")), expected);
        assert_eq!(date_from(&json!("2024-03-15T10:00:00Z")), expected);
        assert_eq!(date_from(&json!("03/15/2024")), None);
    }

    #[test]
    fn entries_accept_objects_and_arrays() {
        let obj = json!({"Holdings": {"AAPL.US": {"Code": "AAPL"}}, "List": [{"Code": "X"}], "Bad": 3});
        let holdings = entries(&obj, &["Holdings"]).unwrap();
        assert_eq!(holdings[0].0, Some("AAPL.US"));
        let list = entries(&obj, &["List"]).unwrap();
        assert_eq!(list[0].0, None);
        assert!(entries(&obj, &["Bad"]).is_none());
        assert!(entries(&obj, &["Missing"]).is_none());
    }

    #[test]
    fn keys_normalize_across_spellings() {
        assert_eq!(normalize_key("Stock non-US"), "stocknonus");
        assert_eq!(normalize_key("Stock_Non_US"), "stocknonus");
    }

    #[test]
    fn field_falls_back_through_aliases() {
        let obj = json!({"Assets %": "4.2"});
        let value = field(&obj, &["Assets_%", "Assets %"]).unwrap();
        assert_eq!(f64_from(value), Some(4.2));
        assert!(field(&obj, &["Weight"]).is_none());
    }
}

//! Tolerant accessors over the untyped key-value maps returned by cost and
//! infrastructure APIs. Values may arrive as native numbers, integers, or
//! decimal strings depending on the upstream serializer; missing keys
//! degrade to the caller's default, never to an error.

use serde_json::{Map, Value};

pub type ValueMap = Map<String, Value>;

pub fn get_f64(map: &ValueMap, key: &str, fallback: f64) -> f64 {
    match map.get(key) {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(fallback),
        Some(Value::String(s)) => s.trim().parse::<f64>().unwrap_or(fallback),
        _ => fallback,
    }
}

pub fn get_str<'a>(map: &'a ValueMap, key: &str, fallback: &'a str) -> &'a str {
    match map.get(key) {
        Some(Value::String(s)) => s.as_str(),
        _ => fallback,
    }
}

pub fn get_map<'a>(map: &'a ValueMap, key: &str) -> Option<&'a ValueMap> {
    match map.get(key) {
        Some(Value::Object(inner)) => Some(inner),
        _ => None,
    }
}

/// Percentage change from `old_val` to `new_val`. A zero baseline yields 1.0
/// when the new value is non-zero and 0.0 otherwise.
pub fn pct_change(new_val: f64, old_val: f64) -> f64 {
    if old_val == 0.0 {
        if new_val != 0.0 {
            return 1.0;
        }
        return 0.0;
    }
    (new_val - old_val) / old_val
}

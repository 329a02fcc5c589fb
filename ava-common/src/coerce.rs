//! Best-effort coercion of loosely typed upstream JSON

use serde_json::Value;

/// Integer from a JSON number or numeric string; fractions are truncated.
pub fn coerce_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>().ok().or_else(|| {
                s.parse::<f64>()
                    .ok()
                    .filter(|f| f.is_finite())
                    .map(|f| f.trunc() as i64)
            })
        }
        _ => None,
    }
}

/// Float from a JSON number or numeric string.
pub fn coerce_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
        _ => None,
    }
}

/// Non-blank string value
pub fn non_blank(value: &Value) -> Option<&str> {
    value.as_str().map(str::trim).filter(|s| !s.is_empty())
}

/// Transcript text from either a plain string or a `{ "text": ... }` object.
pub fn extract_transcript(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Object(map) => map
            .get("text")
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
            .map(str::to_string),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_coerce_i64() {
        assert_eq!(coerce_i64(&json!(42)), Some(42));
        assert_eq!(coerce_i64(&json!(42.9)), Some(42));
        assert_eq!(coerce_i64(&json!(" 17 ")), Some(17));
        assert_eq!(coerce_i64(&json!("12.5")), Some(12));
        assert_eq!(coerce_i64(&json!("abc")), None);
        assert_eq!(coerce_i64(&json!(null)), None);
        assert_eq!(coerce_i64(&json!(true)), None);
    }

    #[test]
    fn test_coerce_f64() {
        assert_eq!(coerce_f64(&json!(0.25)), Some(0.25));
        assert_eq!(coerce_f64(&json!("1.5")), Some(1.5));
        assert_eq!(coerce_f64(&json!("NaN")), None);
        assert_eq!(coerce_f64(&json!([1])), None);
    }

    #[test]
    fn test_extract_transcript() {
        assert_eq!(extract_transcript(&json!("hi")), Some("hi".to_string()));
        assert_eq!(
            extract_transcript(&json!({"text": "nested"})),
            Some("nested".to_string())
        );
        assert_eq!(extract_transcript(&json!("   ")), None);
        assert_eq!(extract_transcript(&json!({"text": 3})), None);
        assert_eq!(extract_transcript(&json!(null)), None);
    }
}

//! Canonical JSON encoding.
//!
//! Semantically equal values always produce identical bytes:
//! - object keys are sorted byte-wise, recursively
//! - array order is preserved
//! - integral numbers (including floats with no fractional part that fit in
//!   an `i64`) are written in minimal integer form, everything else in plain
//!   decimal form without an exponent
//! - no insignificant whitespace
//!
//! Content hashes are always taken over this form, never over the caller's
//! original serialization.

use crate::error::EncodingError;
use serde::Serialize;
use serde_json::{Map, Number, Value};

/// `i64::MIN` and `i64::MAX + 1` as floats. Both are exactly representable.
const I64_MIN_F: f64 = -9_223_372_036_854_775_808.0;
const I64_END_F: f64 = 9_223_372_036_854_775_808.0;

/// Encode a JSON value into its canonical byte form.
pub fn canonicalize(value: &Value) -> Result<Vec<u8>, EncodingError> {
    let mut out = Vec::with_capacity(64);
    write_value(&mut out, value)?;
    Ok(out)
}

/// Serialize any value through serde and encode it canonically.
///
/// Fails for shapes JSON cannot express, e.g. maps with non-string keys.
pub fn canonicalize_serializable<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, EncodingError> {
    let value = serde_json::to_value(value)?;
    canonicalize(&value)
}

/// Normalize a value so that it holds exactly what its canonical encoding
/// says. Integral floats become integers; map order becomes sorted.
pub fn canonical_value(value: &Value) -> Result<Value, EncodingError> {
    Ok(match value {
        Value::Null | Value::Bool(_) | Value::String(_) => value.clone(),
        Value::Number(n) => Value::Number(normalize_number(n)?),
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(canonical_value)
                .collect::<Result<Vec<_>, _>>()?,
        ),
        Value::Object(map) => {
            let mut out = Map::new();
            for key in sorted_keys(map) {
                out.insert(key.clone(), canonical_value(&map[key])?);
            }
            Value::Object(out)
        }
    })
}

fn sorted_keys(map: &Map<String, Value>) -> Vec<&String> {
    let mut keys: Vec<&String> = map.keys().collect();
    keys.sort_by(|a, b| a.as_bytes().cmp(b.as_bytes()));
    keys
}

fn write_value(out: &mut Vec<u8>, value: &Value) -> Result<(), EncodingError> {
    match value {
        Value::Null => out.extend_from_slice(b"null"),
        Value::Bool(true) => out.extend_from_slice(b"true"),
        Value::Bool(false) => out.extend_from_slice(b"false"),
        Value::Number(n) => write_number(out, n)?,
        Value::String(s) => write_string(out, s)?,
        Value::Array(items) => {
            out.push(b'[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_value(out, item)?;
            }
            out.push(b']');
        }
        Value::Object(map) => {
            out.push(b'{');
            for (i, key) in sorted_keys(map).into_iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_string(out, key)?;
                out.push(b':');
                write_value(out, &map[key])?;
            }
            out.push(b'}');
        }
    }
    Ok(())
}

fn write_string(out: &mut Vec<u8>, s: &str) -> Result<(), EncodingError> {
    serde_json::to_writer(&mut *out, s)?;
    Ok(())
}

fn write_number(out: &mut Vec<u8>, n: &Number) -> Result<(), EncodingError> {
    let norm = normalize_number(n)?;
    let text = match norm.as_f64() {
        Some(f) if norm.is_f64() => format_decimal(f)?,
        _ => norm.to_string(),
    };
    out.extend_from_slice(text.as_bytes());
    Ok(())
}

/// Collapse integral floats into integers.
fn normalize_number(n: &Number) -> Result<Number, EncodingError> {
    if n.is_i64() || n.is_u64() {
        return Ok(n.clone());
    }
    let f = n
        .as_f64()
        .ok_or_else(|| EncodingError::UnsupportedNumber(n.to_string()))?;
    if !f.is_finite() {
        return Err(EncodingError::UnsupportedNumber(n.to_string()));
    }
    if f.fract() == 0.0 && (I64_MIN_F..I64_END_F).contains(&f) {
        // -0.0 lands here as well and becomes 0.
        return Ok(Number::from(f as i64));
    }
    Ok(n.clone())
}

/// Plain decimal with the shortest digits that round-trip; never an exponent.
fn format_decimal(f: f64) -> Result<String, EncodingError> {
    if !f.is_finite() {
        return Err(EncodingError::UnsupportedNumber(f.to_string()));
    }
    Ok(format!("{}", f))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    fn canon(v: Value) -> String {
        String::from_utf8(canonicalize(&v).unwrap()).unwrap()
    }

    #[test]
    fn test_sorted_keys_no_whitespace() {
        assert_eq!(
            canon(json!({"z": 1, "a": {"y": [3, 2, 1], "b": "x"}})),
            r#"{"a":{"b":"x","y":[3,2,1]},"z":1}"#
        );
    }

    #[test]
    fn test_integral_float_collapses() {
        assert_eq!(canon(json!(1.0)), "1");
        assert_eq!(canon(json!(-42.0)), "-42");
        assert_eq!(canon(json!(-0.0)), "0");
        assert_eq!(canon(json!(1.5)), "1.5");
        assert_eq!(canon(json!(0.1)), "0.1");
    }

    #[test]
    fn test_large_values() {
        assert_eq!(canon(json!(u64::MAX)), u64::MAX.to_string());
        assert_eq!(canon(json!(i64::MIN)), i64::MIN.to_string());
        // Beyond the i64 range the float keeps its decimal form.
        assert_eq!(canon(json!(1e20)), "100000000000000000000");
        assert!(!canon(json!(1.25e-7)).contains('e'));
    }

    #[test]
    fn test_string_escaping() {
        assert_eq!(canon(json!("a\"b\n")), r#""a\"b\n""#);
        assert_eq!(canon(json!({"é": "ü"})), "{\"é\":\"ü\"}");
    }

    #[test]
    fn test_byte_wise_key_order() {
        // 'Z' (0x5a) sorts before 'a' (0x61).
        assert_eq!(canon(json!({"a": 1, "Z": 2, "_": 3})), r#"{"Z":2,"_":3,"a":1}"#);
    }

    #[test]
    fn test_canonical_value_matches_encoding() {
        let v = json!({"b": [1.0, 2.5, {"d": 4.0}], "a": null});
        let normalized = canonical_value(&v).unwrap();
        assert_eq!(normalized, json!({"a": null, "b": [1, 2.5, {"d": 4}]}));
        assert_eq!(canonicalize(&normalized).unwrap(), canonicalize(&v).unwrap());
    }

    #[test]
    fn test_serializable_non_string_keys_fail() {
        let mut map = HashMap::new();
        map.insert(vec![1u8], 1);
        let err = canonicalize_serializable(&map).unwrap_err();
        assert!(matches!(err, EncodingError::Unrepresentable(_)));
    }

    #[test]
    fn test_serializable_struct() {
        #[derive(Serialize)]
        struct Sample {
            zeta: u32,
            alpha: &'static str,
        }
        let bytes = canonicalize_serializable(&Sample { zeta: 1, alpha: "x" }).unwrap();
        assert_eq!(bytes, br#"{"alpha":"x","zeta":1}"#.to_vec());
    }
}

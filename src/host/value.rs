//! Ruby-flavoured semantics over `serde_json::Value`
//!
//! Symbols evaluate to strings and ranges to arrays, so every host value is plain
//! JSON. Only `nil` and `false` are falsy.

use crate::error::RenderError;
use serde_json::{Number, Value};
use std::cmp::Ordering;

pub fn truthy(value: &Value) -> bool {
    !matches!(value, Value::Null | Value::Bool(false))
}

/// Ruby class name, used in error messages.
pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "nil",
        Value::Bool(true) => "true",
        Value::Bool(false) => "false",
        Value::Number(n) if n.is_f64() => "Float",
        Value::Number(_) => "Integer",
        Value::String(_) => "String",
        Value::Array(_) => "Array",
        Value::Object(_) => "Hash",
    }
}

/// `to_s`
pub fn to_s(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Number(n) => number_to_s(n),
        Value::Bool(b) => b.to_string(),
        Value::Array(_) | Value::Object(_) => inspect(value),
    }
}

/// `inspect`
pub fn inspect(value: &Value) -> String {
    match value {
        Value::Null => "nil".to_string(),
        Value::String(s) => format!("{:?}", s),
        Value::Array(items) => {
            let items: Vec<String> = items.iter().map(inspect).collect();
            format!("[{}]", items.join(", "))
        }
        Value::Object(map) => {
            let entries: Vec<String> = map
                .iter()
                .map(|(k, v)| format!("{:?}=>{}", k, inspect(v)))
                .collect();
            format!("{{{}}}", entries.join(", "))
        }
        other => to_s(other),
    }
}

fn number_to_s(n: &Number) -> String {
    match (n.as_i64(), n.as_f64()) {
        (Some(i), _) => i.to_string(),
        (None, Some(f)) if f.fract() == 0.0 && f.abs() < 1e16 => format!("{:.1}", f),
        _ => n.to_string(),
    }
}

pub fn int(i: i64) -> Value {
    Value::Number(Number::from(i))
}

pub fn float(f: f64) -> Result<Value, RenderError> {
    Number::from_f64(f)
        .map(Value::Number)
        .ok_or_else(|| RenderError::Type(format!("{} is not a finite Float", f)))
}

/// Numeric view of a value: integers stay exact.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Num {
    Int(i64),
    Float(f64),
}

impl Num {
    pub fn of(value: &Value) -> Option<Num> {
        match value {
            Value::Number(n) => match n.as_i64() {
                Some(i) => Some(Num::Int(i)),
                None => n.as_f64().map(Num::Float),
            },
            _ => None,
        }
    }

    pub fn as_f64(self) -> f64 {
        match self {
            Num::Int(i) => i as f64,
            Num::Float(f) => f,
        }
    }

    pub fn into_value(self) -> Result<Value, RenderError> {
        match self {
            Num::Int(i) => Ok(int(i)),
            Num::Float(f) => float(f),
        }
    }
}

/// `==`, with `1 == 1.0`.
pub fn equal(a: &Value, b: &Value) -> bool {
    match (Num::of(a), Num::of(b)) {
        (Some(Num::Int(x)), Some(Num::Int(y))) => x == y,
        (Some(x), Some(y)) => x.as_f64() == y.as_f64(),
        _ => match (a, b) {
            (Value::Array(xs), Value::Array(ys)) => {
                xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| equal(x, y))
            }
            _ => a == b,
        },
    }
}

/// `<=>`: `None` when the values are not comparable.
pub fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (Num::of(a), Num::of(b)) {
        (Some(Num::Int(x)), Some(Num::Int(y))) => Some(x.cmp(&y)),
        (Some(x), Some(y)) => x.as_f64().partial_cmp(&y.as_f64()),
        _ => match (a, b) {
            (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
            (Value::Array(xs), Value::Array(ys)) => {
                for (x, y) in xs.iter().zip(ys) {
                    match compare(x, y)? {
                        Ordering::Equal => continue,
                        other => return Some(other),
                    }
                }
                Some(xs.len().cmp(&ys.len()))
            }
            _ => None,
        },
    }
}

pub fn compare_or_fail(a: &Value, b: &Value) -> Result<Ordering, RenderError> {
    compare(a, b).ok_or_else(|| {
        RenderError::Type(format!(
            "comparison of {} with {} failed",
            type_name(a),
            inspect(b)
        ))
    })
}

/// Hash keys are strings; other key values are converted with `to_s`.
pub fn key(value: &Value) -> String {
    to_s(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_truthiness() {
        assert!(!truthy(&Value::Null));
        assert!(!truthy(&json!(false)));
        assert!(truthy(&json!(0)));
        assert!(truthy(&json!("")));
        assert!(truthy(&json!([])));
    }

    #[test]
    fn test_to_s_and_inspect() {
        assert_eq!(to_s(&Value::Null), "");
        assert_eq!(to_s(&json!(2.0)), "2.0");
        assert_eq!(to_s(&json!(2.5)), "2.5");
        assert_eq!(to_s(&json!([1, "a", null])), r#"[1, "a", nil]"#);
        assert_eq!(to_s(&json!({"a": 1})), r#"{"a"=>1}"#);
        assert_eq!(inspect(&json!("x")), r#""x""#);
    }

    #[test]
    fn test_numeric_equality_and_ordering() {
        assert!(equal(&json!(1), &json!(1.0)));
        assert!(!equal(&json!(1), &json!("1")));
        assert_eq!(compare(&json!(2), &json!(10)), Some(Ordering::Less));
        assert_eq!(compare(&json!("b"), &json!("a")), Some(Ordering::Greater));
        assert_eq!(compare(&json!(1), &json!("a")), None);
        assert!(compare_or_fail(&json!(1), &Value::Null).is_err());
    }
}

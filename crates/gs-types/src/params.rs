//! Concrete parameter values and combinations.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A concrete parameter value handed to an estimator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Int(i64),
    Float(f64),
    Json(serde_json::Value),
}

impl ParamValue {
    /// Convert a JSON candidate value. Integral numbers become `Int`, other
    /// numbers `Float`, everything else is kept as JSON.
    pub fn from_json(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Self::Int(i)
                } else if let Some(f) = n.as_f64() {
                    Self::Float(f)
                } else {
                    Self::Json(value.clone())
                }
            }
            other => Self::Json(other.clone()),
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(v) => Some(*v as f64),
            Self::Float(v) => Some(*v),
            Self::Json(v) => v.as_f64(),
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Json(v) => v.as_bool(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Json(v) => v.as_str(),
            _ => None,
        }
    }

    /// Render the value the way the reference library prints it in messages.
    pub fn repr(&self) -> String {
        match self {
            Self::Int(v) => v.to_string(),
            Self::Float(v) => repr_float(*v),
            Self::Json(v) => repr_json(v),
        }
    }
}

impl std::fmt::Display for ParamValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Float(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Json(serde_json::Value::String(s)) => write!(f, "{s}"),
            Self::Json(v) => write!(f, "{v}"),
        }
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        Self::Json(serde_json::Value::Bool(v))
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        Self::Json(serde_json::Value::String(v.to_string()))
    }
}

/// One concrete assignment of values to parameter names. Keys iterate in
/// sorted order.
pub type ParamCombination = BTreeMap<String, ParamValue>;

/// Render a combination as `{'a': 1, 'b': 'x'}`.
pub fn repr_combination(combination: &ParamCombination) -> String {
    let body: Vec<String> = combination
        .iter()
        .map(|(k, v)| format!("'{k}': {}", v.repr()))
        .collect();
    format!("{{{}}}", body.join(", "))
}

fn repr_float(v: f64) -> String {
    if v.is_nan() {
        "nan".to_string()
    } else if v.is_infinite() {
        let text = if v > 0.0 { "inf" } else { "-inf" };
        text.to_string()
    } else if v.fract() == 0.0 && v.abs() < 1e16 {
        format!("{v:.1}")
    } else {
        format!("{v}")
    }
}

/// Render a JSON value using the reference library's literal syntax
/// (`'text'`, `True`, `None`, `[1, 2]`, `{'k': 1}`).
pub fn repr_json(value: &serde_json::Value) -> String {
    use serde_json::Value;
    match value {
        Value::Null => "None".to_string(),
        Value::Bool(true) => "True".to_string(),
        Value::Bool(false) => "False".to_string(),
        Value::Number(n) => match (n.as_i64(), n.as_u64(), n.as_f64()) {
            (Some(i), _, _) => i.to_string(),
            (None, Some(u), _) => u.to_string(),
            (None, None, Some(f)) => repr_float(f),
            _ => n.to_string(),
        },
        Value::String(s) => format!("'{}'", s.replace('\\', "\\\\").replace('\'', "\\'")),
        Value::Array(items) => {
            let parts: Vec<String> = items.iter().map(repr_json).collect();
            format!("[{}]", parts.join(", "))
        }
        Value::Object(map) => {
            let parts: Vec<String> = map
                .iter()
                .map(|(k, v)| format!("'{k}': {}", repr_json(v)))
                .collect();
            format!("{{{}}}", parts.join(", "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_numbers_split_into_int_and_float() {
        assert_eq!(ParamValue::from_json(&json!(3)), ParamValue::Int(3));
        assert_eq!(ParamValue::from_json(&json!(0.1)), ParamValue::Float(0.1));
        assert_eq!(
            ParamValue::from_json(&json!("rbf")),
            ParamValue::Json(json!("rbf"))
        );
    }

    #[test]
    fn repr_matches_reference_literals() {
        assert_eq!(repr_json(&json!(0)), "0");
        assert_eq!(repr_json(&json!("foo")), "'foo'");
        assert_eq!(repr_json(&json!(null)), "None");
        assert_eq!(repr_json(&json!([1, true])), "[1, True]");
        assert_eq!(repr_json(&json!({"a": 1.0})), "{'a': 1.0}");
        assert_eq!(ParamValue::Float(2.0).repr(), "2.0");
        assert_eq!(ParamValue::Float(f64::NAN).repr(), "nan");
    }

    #[test]
    fn combination_repr_is_sorted() {
        let mut combo = ParamCombination::new();
        combo.insert("kernel".into(), "rbf".into());
        combo.insert("C".into(), ParamValue::Int(10));
        assert_eq!(repr_combination(&combo), "{'C': 10, 'kernel': 'rbf'}");
    }

    #[test]
    fn untagged_serde_round_trip() {
        let values = vec![
            ParamValue::Int(4),
            ParamValue::Float(0.5),
            ParamValue::Json(json!("linear")),
        ];
        let text = serde_json::to_string(&values).unwrap();
        assert_eq!(text, r#"[4,0.5,"linear"]"#);
        let back: Vec<ParamValue> = serde_json::from_str(&text).unwrap();
        assert_eq!(back, values);
    }
}

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

/// Declared type of a parameter. Raw values are coerced into this type
/// during resolution; a value that cannot be coerced is a configuration
/// error, not a runtime error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamType {
    String,
    Bool,
    Int,
    Array,
    Hash,
    Callback,
    Raw,
}

impl ParamType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParamType::String => "string",
            ParamType::Bool => "bool",
            ParamType::Int => "int",
            ParamType::Array => "array",
            ParamType::Hash => "hash",
            ParamType::Callback => "callback",
            ParamType::Raw => "raw",
        }
    }
}

/// A callback passed as a parameter value (e.g. an error handler an action
/// hands to a delegate). Takes the callback input and returns a value.
pub type ParamCallback = Arc<dyn Fn(&Value) -> Value + Send + Sync>;

/// A parameter or context value. Callbacks are a distinct variant because
/// they cannot be represented as JSON data.
#[derive(Clone)]
pub enum ParamValue {
    Data(Value),
    Callback(ParamCallback),
}

impl ParamValue {
    pub fn callback(f: impl Fn(&Value) -> Value + Send + Sync + 'static) -> Self {
        ParamValue::Callback(Arc::new(f))
    }

    pub fn as_value(&self) -> Option<&Value> {
        match self {
            ParamValue::Data(v) => Some(v),
            ParamValue::Callback(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        self.as_value().and_then(|v| v.as_str())
    }

    pub fn as_bool(&self) -> Option<bool> {
        self.as_value().and_then(|v| v.as_bool())
    }

    pub fn as_i64(&self) -> Option<i64> {
        self.as_value().and_then(|v| v.as_i64())
    }

    pub fn as_array(&self) -> Option<&Vec<Value>> {
        self.as_value().and_then(|v| v.as_array())
    }

    pub fn as_callback(&self) -> Option<&ParamCallback> {
        match self {
            ParamValue::Callback(f) => Some(f),
            ParamValue::Data(_) => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, ParamValue::Data(Value::Null))
    }

    /// Human-readable type name, used in type-mismatch errors.
    pub fn type_name(&self) -> &'static str {
        match self {
            ParamValue::Callback(_) => "callback",
            ParamValue::Data(Value::Null) => "null",
            ParamValue::Data(Value::Bool(_)) => "bool",
            ParamValue::Data(Value::Number(_)) => "number",
            ParamValue::Data(Value::String(_)) => "string",
            ParamValue::Data(Value::Array(_)) => "array",
            ParamValue::Data(Value::Object(_)) => "hash",
        }
    }

    /// Rendering used in logs and error details. Callers are responsible
    /// for redacting sensitive values before calling this.
    pub fn rendered(&self) -> String {
        match self {
            ParamValue::Data(v) => v.to_string(),
            ParamValue::Callback(_) => "<callback>".to_string(),
        }
    }
}

impl fmt::Debug for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Data(v) => write!(f, "Data({})", v),
            ParamValue::Callback(_) => write!(f, "Callback(..)"),
        }
    }
}

// Callbacks are never equal; data values compare by JSON equality. This is
// enough for the idempotence guarantees the resolver provides.
impl PartialEq for ParamValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ParamValue::Data(a), ParamValue::Data(b)) => a == b,
            _ => false,
        }
    }
}

impl From<Value> for ParamValue {
    fn from(v: Value) -> Self {
        ParamValue::Data(v)
    }
}

impl From<&str> for ParamValue {
    fn from(s: &str) -> Self {
        ParamValue::Data(Value::String(s.to_string()))
    }
}

impl From<String> for ParamValue {
    fn from(s: String) -> Self {
        ParamValue::Data(Value::String(s))
    }
}

impl From<bool> for ParamValue {
    fn from(b: bool) -> Self {
        ParamValue::Data(Value::Bool(b))
    }
}

impl From<i64> for ParamValue {
    fn from(n: i64) -> Self {
        ParamValue::Data(Value::from(n))
    }
}

/// Coerce a raw value into the declared parameter type.
///
/// Values already of the right shape pass through. Strings convert to bool
/// ("true"/"false"), int (parsed) and array (comma-split); scalars render
/// into strings. Anything else is a type mismatch.
pub fn coerce(value: ParamValue, target: ParamType, key: &str) -> Result<ParamValue> {
    if target == ParamType::Raw {
        return Ok(value);
    }

    if target == ParamType::Callback {
        return match value {
            ParamValue::Callback(_) => Ok(value),
            other => Err(Error::params_type_mismatch(
                key,
                target.as_str(),
                other.type_name(),
            )),
        };
    }

    let data = match value {
        ParamValue::Data(v) => v,
        other @ ParamValue::Callback(_) => {
            return Err(Error::params_type_mismatch(
                key,
                target.as_str(),
                other.type_name(),
            ));
        }
    };

    let coerced = match (target, data) {
        (ParamType::String, Value::String(s)) => Value::String(s),
        (ParamType::String, Value::Number(n)) => Value::String(n.to_string()),
        (ParamType::String, Value::Bool(b)) => Value::String(b.to_string()),

        (ParamType::Bool, Value::Bool(b)) => Value::Bool(b),
        (ParamType::Bool, Value::String(s)) => match s.to_ascii_lowercase().as_str() {
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            _ => {
                return Err(Error::params_type_mismatch(key, "bool", "string"));
            }
        },

        (ParamType::Int, v @ Value::Number(_)) if v.as_i64().is_some() => v,
        (ParamType::Int, Value::String(s)) => match s.trim().parse::<i64>() {
            Ok(n) => Value::from(n),
            Err(_) => {
                return Err(Error::params_type_mismatch(key, "int", "string"));
            }
        },

        (ParamType::Array, Value::Array(a)) => Value::Array(a),
        (ParamType::Array, Value::String(s)) => Value::Array(
            s.split(',')
                .map(|part| Value::String(part.trim().to_string()))
                .collect(),
        ),

        (ParamType::Hash, Value::Object(o)) => Value::Object(o),

        (expected, actual) => {
            return Err(Error::params_type_mismatch(
                key,
                expected.as_str(),
                ParamValue::Data(actual).type_name(),
            ));
        }
    };

    Ok(ParamValue::Data(coerced))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn passthrough_for_matching_types() {
        let v = coerce(ParamValue::from("hello"), ParamType::String, "k").unwrap();
        assert_eq!(v.as_str(), Some("hello"));
    }

    #[test]
    fn string_coerces_to_bool() {
        let v = coerce(ParamValue::from("true"), ParamType::Bool, "k").unwrap();
        assert_eq!(v.as_bool(), Some(true));
        let v = coerce(ParamValue::from("FALSE"), ParamType::Bool, "k").unwrap();
        assert_eq!(v.as_bool(), Some(false));
    }

    #[test]
    fn string_coerces_to_int() {
        let v = coerce(ParamValue::from("42"), ParamType::Int, "build").unwrap();
        assert_eq!(v.as_i64(), Some(42));
    }

    #[test]
    fn string_coerces_to_array_by_splitting() {
        let v = coerce(ParamValue::from("a, b,c"), ParamType::Array, "k").unwrap();
        assert_eq!(v.as_value().unwrap(), &json!(["a", "b", "c"]));
    }

    #[test]
    fn mismatch_is_a_type_error() {
        let err = coerce(ParamValue::from("nope"), ParamType::Int, "build").unwrap_err();
        assert_eq!(err.code.as_str(), "params.type_mismatch");
        assert_eq!(err.details["key"], "build");
    }

    #[test]
    fn callback_only_accepts_callbacks() {
        let err = coerce(ParamValue::from("x"), ParamType::Callback, "cb").unwrap_err();
        assert_eq!(err.code.as_str(), "params.type_mismatch");

        let ok = coerce(
            ParamValue::callback(|v| v.clone()),
            ParamType::Callback,
            "cb",
        );
        assert!(ok.is_ok());
    }

    #[test]
    fn scalars_render_into_strings() {
        let v = coerce(ParamValue::from(7i64), ParamType::String, "k").unwrap();
        assert_eq!(v.as_str(), Some("7"));
    }
}

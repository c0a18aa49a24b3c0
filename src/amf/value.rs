//! AMF value types
//!
//! Unified representation of the AMF0 value set produced by the decoder
//! and consumed by the `onFI` extractor. Values that end up in a timing
//! record's `extra_data` are converted to JSON via [`AmfValue::to_json`].

use std::collections::HashMap;

/// Decoded AMF0 value
#[derive(Debug, Clone, PartialEq)]
pub enum AmfValue {
    /// Null (0x05)
    Null,

    /// Undefined (0x06)
    Undefined,

    /// Boolean (0x01)
    Boolean(bool),

    /// IEEE 754 double-precision number (0x00)
    Number(f64),

    /// UTF-8 string, short (0x02) or long (0x0C)
    String(String),

    /// Dense array (strict array, 0x0A)
    Array(Vec<AmfValue>),

    /// Key-value object (0x03); keys are always strings
    Object(HashMap<String, AmfValue>),

    /// Associative array with a count hint (0x08)
    EcmaArray(HashMap<String, AmfValue>),

    /// Date as milliseconds since the Unix epoch (0x0B)
    Date(f64),
}

impl AmfValue {
    /// Try to get this value as a string reference
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AmfValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get this value as a number
    pub fn as_number(&self) -> Option<f64> {
        match self {
            AmfValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Try to get this value as a boolean
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AmfValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Try to get this value as an object reference
    ///
    /// ECMA arrays are associative and count as objects here.
    pub fn as_object(&self) -> Option<&HashMap<String, AmfValue>> {
        match self {
            AmfValue::Object(m) => Some(m),
            AmfValue::EcmaArray(m) => Some(m),
            _ => None,
        }
    }

    /// Try to get this value as an array reference
    pub fn as_array(&self) -> Option<&Vec<AmfValue>> {
        match self {
            AmfValue::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Check if this value is null or undefined
    pub fn is_null_or_undefined(&self) -> bool {
        matches!(self, AmfValue::Null | AmfValue::Undefined)
    }

    /// Get a property from an object value
    pub fn get(&self, key: &str) -> Option<&AmfValue> {
        self.as_object()?.get(key)
    }

    /// Get a string property from an object value
    pub fn get_string(&self, key: &str) -> Option<&str> {
        self.get(key)?.as_str()
    }

    /// Get a number property from an object value
    pub fn get_number(&self, key: &str) -> Option<f64> {
        self.get(key)?.as_number()
    }

    /// Convert to a JSON value
    ///
    /// Non-finite numbers have no JSON representation and map to null.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value;
        match self {
            AmfValue::Null | AmfValue::Undefined => Value::Null,
            AmfValue::Boolean(b) => Value::Bool(*b),
            AmfValue::Number(n) | AmfValue::Date(n) => serde_json::Number::from_f64(*n)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            AmfValue::String(s) => Value::String(s.clone()),
            AmfValue::Array(a) => Value::Array(a.iter().map(AmfValue::to_json).collect()),
            AmfValue::Object(m) | AmfValue::EcmaArray(m) => {
                Value::Object(m.iter().map(|(k, v)| (k.clone(), v.to_json())).collect())
            }
        }
    }
}

impl Default for AmfValue {
    fn default() -> Self {
        AmfValue::Null
    }
}

impl From<bool> for AmfValue {
    fn from(v: bool) -> Self {
        AmfValue::Boolean(v)
    }
}

impl From<f64> for AmfValue {
    fn from(v: f64) -> Self {
        AmfValue::Number(v)
    }
}

impl From<i32> for AmfValue {
    fn from(v: i32) -> Self {
        AmfValue::Number(v as f64)
    }
}

impl From<u32> for AmfValue {
    fn from(v: u32) -> Self {
        AmfValue::Number(v as f64)
    }
}

impl From<String> for AmfValue {
    fn from(v: String) -> Self {
        AmfValue::String(v)
    }
}

impl From<&str> for AmfValue {
    fn from(v: &str) -> Self {
        AmfValue::String(v.to_string())
    }
}

impl<V: Into<AmfValue>> From<Vec<V>> for AmfValue {
    fn from(v: Vec<V>) -> Self {
        AmfValue::Array(v.into_iter().map(|x| x.into()).collect())
    }
}

impl<V: Into<AmfValue>> From<HashMap<String, V>> for AmfValue {
    fn from(v: HashMap<String, V>) -> Self {
        AmfValue::Object(v.into_iter().map(|(k, v)| (k, v.into())).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_accessors() {
        let s = AmfValue::String("test".into());
        assert_eq!(s.as_str(), Some("test"));
        assert_eq!(s.as_number(), None);

        let n = AmfValue::Number(42.0);
        assert_eq!(n.as_number(), Some(42.0));
        assert_eq!(n.as_str(), None);

        let mut obj = HashMap::new();
        obj.insert("key".to_string(), AmfValue::String("value".into()));
        let o = AmfValue::Object(obj);
        assert_eq!(o.get_string("key"), Some("value"));
    }

    #[test]
    fn test_as_object_with_ecma_array() {
        let mut props = HashMap::new();
        props.insert("ts".to_string(), AmfValue::Number(1234.0));
        let ecma = AmfValue::EcmaArray(props);

        assert!(ecma.as_object().is_some());
        assert_eq!(ecma.get_number("ts"), Some(1234.0));
    }

    #[test]
    fn test_get_on_non_object() {
        assert!(AmfValue::Null.get("key").is_none());
        assert!(AmfValue::Number(42.0).get("key").is_none());
        assert!(AmfValue::Array(vec![]).get("0").is_none());
    }

    #[test]
    fn test_is_null_or_undefined() {
        assert!(AmfValue::Null.is_null_or_undefined());
        assert!(AmfValue::Undefined.is_null_or_undefined());
        assert!(!AmfValue::Boolean(false).is_null_or_undefined());
        assert!(!AmfValue::Number(0.0).is_null_or_undefined());
    }

    #[test]
    fn test_from_conversions() {
        let v: AmfValue = "test".into();
        assert!(matches!(v, AmfValue::String(_)));

        let v: AmfValue = 42.0.into();
        assert!(matches!(v, AmfValue::Number(_)));

        let v: AmfValue = true.into();
        assert!(matches!(v, AmfValue::Boolean(true)));

        let v: AmfValue = vec![1.0f64, 2.0].into();
        assert_eq!(v.as_array().map(|a| a.len()), Some(2));
    }

    #[test]
    fn test_to_json() {
        let mut inner = HashMap::new();
        inner.insert("n".to_string(), AmfValue::Number(1.5));
        inner.insert("s".to_string(), AmfValue::String("x".into()));
        inner.insert("u".to_string(), AmfValue::Undefined);

        let json = AmfValue::Object(inner).to_json();
        assert_eq!(json["n"], serde_json::json!(1.5));
        assert_eq!(json["s"], serde_json::json!("x"));
        assert!(json["u"].is_null());
    }

    #[test]
    fn test_to_json_non_finite_number() {
        assert!(AmfValue::Number(f64::NAN).to_json().is_null());
        assert!(AmfValue::Number(f64::INFINITY).to_json().is_null());
    }

    #[test]
    fn test_to_json_date_and_array() {
        let v = AmfValue::Array(vec![
            AmfValue::Date(1_700_000_000_000.0),
            AmfValue::Boolean(true),
        ]);
        let json = v.to_json();
        assert_eq!(json[0], serde_json::json!(1_700_000_000_000.0));
        assert_eq!(json[1], serde_json::json!(true));
    }
}

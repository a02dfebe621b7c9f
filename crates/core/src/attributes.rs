use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::CoreError;

/// Open-ended key/value fields of a record that are not promoted to typed
/// columns. Stored as JSON text.
///
/// Equality is structural over the decoded mapping: key order never matters,
/// nested objects and arrays are compared recursively.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttributeBag(Map<String, Value>);

impl AttributeBag {
    pub fn new() -> Self {
        Self(Map::new())
    }

    pub fn from_map(map: Map<String, Value>) -> Self {
        Self(map)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(Value::as_bool)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn to_json(&self) -> Result<String, CoreError> {
        serde_json::to_string(&self.0).map_err(|e| CoreError::Serialization(e.to_string()))
    }

    /// Decode a stored bag. NULL and empty text decode to the empty bag so a
    /// missing column never compares unequal to `{}`.
    pub fn from_json(text: Option<&str>) -> Result<Self, CoreError> {
        match text.map(str::trim) {
            None | Some("") | Some("null") => Ok(Self::new()),
            Some(text) => match serde_json::from_str::<Value>(text) {
                Ok(Value::Object(map)) => Ok(Self(map)),
                Ok(other) => Err(CoreError::InvalidData(format!(
                    "attribute bag must be a JSON object, got {other}"
                ))),
                Err(e) => Err(CoreError::Serialization(e.to_string())),
            },
        }
    }
}

impl PartialEq for AttributeBag {
    fn eq(&self, other: &Self) -> bool {
        self.0.len() == other.0.len()
            && self
                .0
                .iter()
                .all(|(key, value)| other.0.get(key).is_some_and(|o| values_equal(value, o)))
    }
}

impl Eq for AttributeBag {}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Object(a), Value::Object(b)) => {
            a.len() == b.len()
                && a.iter().all(|(k, v)| b.get(k).is_some_and(|w| values_equal(v, w)))
        }
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(v, w)| values_equal(v, w))
        }
        // 3 and 3.0 decode to different Number variants but mean the same field value.
        (Value::Number(a), Value::Number(b)) => match (a.as_i64(), b.as_i64()) {
            (Some(x), Some(y)) => x == y,
            _ => match (a.as_u64(), b.as_u64()) {
                (Some(x), Some(y)) => x == y,
                _ => a.as_f64() == b.as_f64(),
            },
        },
        _ => a == b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn bag(text: &str) -> AttributeBag {
        AttributeBag::from_json(Some(text)).unwrap()
    }

    #[test]
    fn key_order_does_not_affect_equality() {
        let a = bag(r#"{"mtu": 1420, "tags": ["a", "b"], "meta": {"x": 1, "y": 2}}"#);
        let b = bag(r#"{"meta": {"y": 2, "x": 1}, "tags": ["a", "b"], "mtu": 1420}"#);
        assert_eq!(a, b);
    }

    #[test]
    fn array_order_matters() {
        assert_ne!(bag(r#"{"tags": ["a", "b"]}"#), bag(r#"{"tags": ["b", "a"]}"#));
    }

    #[test]
    fn nested_difference_is_detected() {
        assert_ne!(
            bag(r#"{"meta": {"x": 1, "y": 2}}"#),
            bag(r#"{"meta": {"x": 1, "y": 3}}"#)
        );
        assert_ne!(bag(r#"{"a": 1}"#), bag(r#"{"a": 1, "b": null}"#));
    }

    #[test]
    fn integral_float_equals_integer() {
        assert_eq!(bag(r#"{"mtu": 1420}"#), bag(r#"{"mtu": 1420.0}"#));
        assert_ne!(bag(r#"{"mtu": 1420}"#), bag(r#"{"mtu": 1420.5}"#));
    }

    #[test]
    fn null_and_empty_decode_to_empty_bag() {
        assert_eq!(AttributeBag::from_json(None).unwrap(), AttributeBag::new());
        assert_eq!(AttributeBag::from_json(Some("null")).unwrap(), AttributeBag::new());
        assert_eq!(AttributeBag::from_json(Some("")).unwrap(), AttributeBag::new());
        assert_eq!(bag("{}"), AttributeBag::new());
    }

    #[test]
    fn non_object_is_rejected() {
        assert!(AttributeBag::from_json(Some("[1, 2]")).is_err());
        assert!(AttributeBag::from_json(Some("{not json")).is_err());
    }

    #[test]
    fn json_roundtrip_preserves_contents() {
        let original = AttributeBag::new()
            .with("source_node", "alpha")
            .with("is_allowed", true)
            .with("ports", json!([51821, 51822]));
        let text = original.to_json().unwrap();
        assert_eq!(AttributeBag::from_json(Some(&text)).unwrap(), original);
        assert_eq!(original.get_str("source_node"), Some("alpha"));
        assert_eq!(original.get_bool("is_allowed"), Some(true));
    }
}

//! Typed access to transformer parameters
//!
//! Parameters are the remaining keys of a column or extra mapping. A JSON
//! `null` counts as absent, so `scale: ~` reads the same as no `scale`.

use crate::error::TransformerError;
use serde_json::{Map, Value as JsonValue};

/// Borrowed view over the parameter mapping of one column or extra.
#[derive(Debug, Clone, Copy)]
pub struct Params<'a> {
    map: &'a Map<String, JsonValue>,
}

impl<'a> Params<'a> {
    pub fn new(map: &'a Map<String, JsonValue>) -> Self {
        Self { map }
    }

    pub fn get(&self, key: &str) -> Option<&'a JsonValue> {
        match self.map.get(key) {
            Some(JsonValue::Null) | None => None,
            Some(value) => Some(value),
        }
    }

    pub fn required(&self, key: &'static str) -> Result<&'a JsonValue, TransformerError> {
        self.get(key).ok_or(TransformerError::MissingParameter(key))
    }

    pub fn required_str(&self, key: &'static str) -> Result<&'a str, TransformerError> {
        self.required(key)?
            .as_str()
            .ok_or(TransformerError::InvalidParameter {
                param: key,
                expected: "a string",
            })
    }

    pub fn non_empty_str(&self, key: &'static str) -> Result<&'a str, TransformerError> {
        let value = self.required_str(key)?;
        if value.is_empty() {
            return Err(TransformerError::EmptyParameter(key));
        }
        Ok(value)
    }

    pub fn optional_str(&self, key: &'static str) -> Result<Option<&'a str>, TransformerError> {
        match self.get(key) {
            None => Ok(None),
            Some(value) => value
                .as_str()
                .map(Some)
                .ok_or(TransformerError::InvalidParameter {
                    param: key,
                    expected: "a string",
                }),
        }
    }

    pub fn required_mapping(
        &self,
        key: &'static str,
    ) -> Result<&'a Map<String, JsonValue>, TransformerError> {
        self.required(key)?
            .as_object()
            .ok_or(TransformerError::InvalidParameter {
                param: key,
                expected: "a mapping",
            })
    }

    /// Loose boolean flags (`raw`, `boolean`, `verbose`).
    pub fn flag(&self, key: &str) -> bool {
        self.get(key).is_some_and(is_affirmative_json)
    }

    /// Per-signal tag override list.
    pub fn tags(&self) -> Result<Option<Vec<String>>, TransformerError> {
        let Some(value) = self.get("tags") else {
            return Ok(None);
        };
        let invalid = TransformerError::InvalidParameter {
            param: "tags",
            expected: "a list of strings",
        };
        let items = value.as_array().ok_or_else(|| invalid.clone())?;
        items
            .iter()
            .map(|item| item.as_str().map(str::to_string).ok_or_else(|| invalid.clone()))
            .collect::<Result<Vec<_>, _>>()
            .map(Some)
    }
}

/// Truthiness of a configuration value: `yes`/`true`/`1`/`y`/`on` strings,
/// non-zero numbers and `true`.
pub fn is_affirmative_json(value: &JsonValue) -> bool {
    match value {
        JsonValue::Bool(b) => *b,
        JsonValue::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        JsonValue::String(s) => is_affirmative_str(s),
        _ => false,
    }
}

pub fn is_affirmative_str(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "yes" | "true" | "1" | "y" | "on"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(value: JsonValue) -> Map<String, JsonValue> {
        match value {
            JsonValue::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn test_null_is_absent() {
        let params = map(json!({"scale": null}));
        let params = Params::new(&params);
        assert_eq!(
            params.required("scale"),
            Err(TransformerError::MissingParameter("scale"))
        );
        assert_eq!(params.optional_str("scale"), Ok(None));
    }

    #[test]
    fn test_string_parameters() {
        let params = map(json!({"part": 5, "expression": ""}));
        let params = Params::new(&params);
        assert_eq!(
            params.required_str("part").map_err(|e| e.to_string()),
            Err("the `part` parameter must be a string".to_string())
        );
        assert_eq!(
            params.non_empty_str("expression").map_err(|e| e.to_string()),
            Err("the `expression` parameter must not be empty".to_string())
        );
    }

    #[test]
    fn test_flags() {
        let params = map(json!({"raw": true, "boolean": "on", "verbose": 0}));
        let params = Params::new(&params);
        assert!(params.flag("raw"));
        assert!(params.flag("boolean"));
        assert!(!params.flag("verbose"));
        assert!(!params.flag("missing"));
    }

    #[test]
    fn test_tag_override() {
        let ok = map(json!({"tags": ["override:ok"]}));
        assert_eq!(
            Params::new(&ok).tags(),
            Ok(Some(vec!["override:ok".to_string()]))
        );
        let bad = map(json!({"tags": "override:ok"}));
        assert!(Params::new(&bad).tags().is_err());
    }
}

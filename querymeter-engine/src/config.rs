//! Check configuration
//!
//! Two scopes, as laid out in a check's YAML file: `init_config` holds
//! queries shared by every instance, each `instances` entry holds its own.

use crate::error::ConfigError;
use querymeter_compiler::is_affirmative_json;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value as JsonValue;

/// How an instance combines its own queries with the global ones.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GlobalQueryPolicy {
    /// Instance queries if any, otherwise the global queries.
    #[default]
    Default,
    /// Instance queries plus the global queries they do not override.
    Extend,
    /// Instance queries only.
    Disabled,
}

impl GlobalQueryPolicy {
    /// `"extend"` extends, affirmative values keep the default, anything
    /// else disables.
    pub fn from_json(value: &JsonValue) -> Self {
        match value {
            JsonValue::String(text) if text.eq_ignore_ascii_case("extend") => {
                GlobalQueryPolicy::Extend
            }
            other if is_affirmative_json(other) => GlobalQueryPolicy::Default,
            _ => GlobalQueryPolicy::Disabled,
        }
    }
}

impl<'de> Deserialize<'de> for GlobalQueryPolicy {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = JsonValue::deserialize(deserializer)?;
        Ok(Self::from_json(&value))
    }
}

/// The `init_config` scope.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InitConfig {
    #[serde(default)]
    pub global_custom_queries: Vec<JsonValue>,
}

/// One `instances` entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InstanceConfig {
    #[serde(default)]
    pub custom_queries: Vec<JsonValue>,
    #[serde(default)]
    pub use_global_custom_queries: GlobalQueryPolicy,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Parse an `init_config` document.
pub fn load_init_config(yaml: &str) -> Result<InitConfig, ConfigError> {
    Ok(serde_yaml::from_str(yaml)?)
}

/// Parse one instance document.
pub fn load_instance_config(yaml: &str) -> Result<InstanceConfig, ConfigError> {
    Ok(serde_yaml::from_str(yaml)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_policy_values() {
        assert_eq!(GlobalQueryPolicy::from_json(&json!("extend")), GlobalQueryPolicy::Extend);
        assert_eq!(GlobalQueryPolicy::from_json(&json!("EXTEND")), GlobalQueryPolicy::Extend);
        assert_eq!(GlobalQueryPolicy::from_json(&json!(true)), GlobalQueryPolicy::Default);
        assert_eq!(GlobalQueryPolicy::from_json(&json!("yes")), GlobalQueryPolicy::Default);
        assert_eq!(GlobalQueryPolicy::from_json(&json!(1)), GlobalQueryPolicy::Default);
        assert_eq!(GlobalQueryPolicy::from_json(&json!(false)), GlobalQueryPolicy::Disabled);
        assert_eq!(GlobalQueryPolicy::from_json(&json!("off")), GlobalQueryPolicy::Disabled);
        assert_eq!(GlobalQueryPolicy::from_json(&JsonValue::Null), GlobalQueryPolicy::Disabled);
    }

    #[test]
    fn test_instance_defaults() -> Result<(), ConfigError> {
        let instance = load_instance_config("tags: [\"test:foo\"]\n")?;
        assert_eq!(instance.use_global_custom_queries, GlobalQueryPolicy::Default);
        assert!(instance.custom_queries.is_empty());
        assert_eq!(instance.tags, vec!["test:foo".to_string()]);
        Ok(())
    }

    #[test]
    fn test_load_yaml_queries() -> Result<(), ConfigError> {
        let init = load_init_config(
            r#"
global_custom_queries:
  - name: global
    query: SELECT 1
    columns:
      - name: one
        type: gauge
"#,
        )?;
        assert_eq!(init.global_custom_queries.len(), 1);
        assert_eq!(init.global_custom_queries[0]["columns"][0]["type"], json!("gauge"));

        let instance = load_instance_config(
            r#"
use_global_custom_queries: extend
custom_queries:
  - query: SELECT 2
    columns: [~, {name: two, type: count}]
"#,
        )?;
        assert_eq!(instance.use_global_custom_queries, GlobalQueryPolicy::Extend);
        assert_eq!(instance.custom_queries[0]["columns"][0], JsonValue::Null);
        Ok(())
    }

    #[test]
    fn test_invalid_yaml() {
        let err = load_instance_config("custom_queries: {not: [a list").map(|_| ());
        assert!(matches!(err, Err(ConfigError::Yaml(_))));
    }
}

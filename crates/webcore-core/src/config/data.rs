use std::fmt;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::error::ConfigError;

type Result<T> = std::result::Result<T, ConfigError>;

/// Supported configuration file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// JSON format (.json)
    Json,
    /// YAML format (.yaml, .yml) - requires "yaml-config" feature
    #[cfg(feature = "yaml-config")]
    Yaml,
    /// TOML format (.toml) - requires "toml-config" feature
    #[cfg(feature = "toml-config")]
    Toml,
}

impl ConfigFormat {
    /// Get the file extension for this format
    pub fn extension(&self) -> &'static str {
        match self {
            ConfigFormat::Json => "json",
            #[cfg(feature = "yaml-config")]
            ConfigFormat::Yaml => "yaml",
            #[cfg(feature = "toml-config")]
            ConfigFormat::Toml => "toml",
        }
    }

    /// Determine format from file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| match ext.to_lowercase().as_str() {
                "json" => Some(ConfigFormat::Json),
                #[cfg(feature = "yaml-config")]
                "yaml" | "yml" => Some(ConfigFormat::Yaml),
                #[cfg(feature = "toml-config")]
                "toml" => Some(ConfigFormat::Toml),
                _ => None,
            })
    }
}

impl fmt::Display for ConfigFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// A configuration tree addressed by dotted keys (`database.host`).
///
/// The root is always a JSON object. Intermediate objects are created on
/// `set`, and `merge` is deep: nested objects are merged key by key while any
/// other value in `other` replaces the existing one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfigData {
    values: Map<String, Value>,
}

impl ConfigData {
    /// Create a new empty configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a JSON value. `null` yields an empty tree; anything other
    /// than an object is rejected.
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Null => Ok(Self::new()),
            Value::Object(values) => Ok(Self { values }),
            other => Err(ConfigError::invalid_value(
                "<root>",
                format!("expected an object, found {}", type_name(&other)),
            )),
        }
    }

    /// Build from any serializable value, typically a struct's `Default`.
    pub fn from_serialize<T: Serialize>(value: &T) -> Result<Self> {
        let value = serde_json::to_value(value).map_err(|e| ConfigError::serialization("json", e))?;
        Self::from_value(value)
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.values)
    }

    /// Raw value at a dotted key.
    pub fn get_value(&self, key: &str) -> Option<&Value> {
        let mut parts = key.split('.');
        let mut current = self.values.get(parts.next()?)?;
        for part in parts {
            current = current.as_object()?.get(part)?;
        }
        Some(current)
    }

    /// Typed value at a dotted key. `None` when missing or of another type.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.get_value(key)
            .and_then(|value| serde_json::from_value(value.clone()).ok())
    }

    /// Get a configuration value with default
    pub fn get_or<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        self.get(key).unwrap_or(default)
    }

    /// Set a value at a dotted key, creating (or replacing non-object)
    /// intermediate nodes.
    pub fn set<T: Serialize>(&mut self, key: &str, value: T) -> Result<()> {
        let value = serde_json::to_value(value).map_err(|e| ConfigError::serialization("json", e))?;
        self.set_value(key, value)
    }

    pub fn set_value(&mut self, key: &str, value: Value) -> Result<()> {
        if key.is_empty() || key.split('.').any(str::is_empty) {
            return Err(ConfigError::invalid_value(key, "empty key segment"));
        }
        let (parents, leaf) = match key.rsplit_once('.') {
            Some((parents, leaf)) => (Some(parents), leaf),
            None => (None, key),
        };
        let mut node = &mut self.values;
        if let Some(parents) = parents {
            for part in parents.split('.') {
                let entry = node
                    .entry(part.to_string())
                    .or_insert_with(|| Value::Object(Map::new()));
                if !entry.is_object() {
                    *entry = Value::Object(Map::new());
                }
                node = match entry {
                    Value::Object(map) => map,
                    _ => return Err(ConfigError::invalid_value(key, "cannot descend into a non-object")),
                };
            }
        }
        node.insert(leaf.to_string(), value);
        Ok(())
    }

    /// Remove the value at a dotted key.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        match key.rsplit_once('.') {
            None => self.values.remove(key),
            Some((parents, leaf)) => {
                let mut node = &mut self.values;
                for part in parents.split('.') {
                    node = node.get_mut(part)?.as_object_mut()?;
                }
                node.remove(leaf)
            }
        }
    }

    /// Check if key exists
    pub fn contains_key(&self, key: &str) -> bool {
        self.get_value(key).is_some()
    }

    /// Top-level keys.
    pub fn keys(&self) -> Vec<String> {
        self.values.keys().cloned().collect()
    }

    /// Dotted paths of every non-object value in the tree.
    pub fn leaf_keys(&self) -> Vec<String> {
        let mut keys = Vec::new();
        collect_leaves(&self.values, "", &mut keys);
        keys
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Deep merge, `other` wins on conflicts.
    pub fn merge(&mut self, other: &ConfigData) {
        merge_maps(&mut self.values, &other.values);
    }

    /// The subtree under a dotted prefix; empty when the prefix is missing or
    /// does not name an object.
    pub fn section(&self, prefix: &str) -> ConfigData {
        match self.get_value(prefix) {
            Some(Value::Object(map)) => ConfigData { values: map.clone() },
            _ => ConfigData::new(),
        }
    }

    /// Bind the whole tree to `T`.
    pub fn bind<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(Value::Object(self.values.clone()))
            .map_err(|e| ConfigError::deserialization(std::any::type_name::<T>(), e))
    }

    /// Serialize to string based on format
    pub fn serialize(&self, format: ConfigFormat) -> Result<String> {
        match format {
            ConfigFormat::Json => {
                serde_json::to_string_pretty(&self).map_err(|e| ConfigError::serialization("json", e))
            }
            #[cfg(feature = "yaml-config")]
            ConfigFormat::Yaml => {
                serde_yaml::to_string(&self).map_err(|e| ConfigError::serialization("yaml", e))
            }
            #[cfg(feature = "toml-config")]
            ConfigFormat::Toml => {
                toml::to_string_pretty(&self).map_err(|e| ConfigError::serialization("toml", e))
            }
        }
    }

    /// Deserialize from string based on format
    pub fn deserialize(data: &str, format: ConfigFormat) -> Result<Self> {
        let value: Value = match format {
            ConfigFormat::Json => {
                serde_json::from_str(data).map_err(|e| ConfigError::deserialization("json", e))?
            }
            #[cfg(feature = "yaml-config")]
            ConfigFormat::Yaml => {
                serde_yaml::from_str(data).map_err(|e| ConfigError::deserialization("yaml", e))?
            }
            #[cfg(feature = "toml-config")]
            ConfigFormat::Toml => {
                toml::from_str(data).map_err(|e| ConfigError::deserialization("toml", e))?
            }
        };
        Self::from_value(value)
    }
}

fn merge_maps(target: &mut Map<String, Value>, source: &Map<String, Value>) {
    for (key, value) in source {
        match (target.get_mut(key), value) {
            (Some(Value::Object(existing)), Value::Object(incoming)) => merge_maps(existing, incoming),
            _ => {
                target.insert(key.clone(), value.clone());
            }
        }
    }
}

fn collect_leaves(map: &Map<String, Value>, prefix: &str, out: &mut Vec<String>) {
    for (key, value) in map {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{}.{}", prefix, key)
        };
        match value {
            Value::Object(child) if !child.is_empty() => collect_leaves(child, &path, out),
            _ => out.push(path),
        }
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

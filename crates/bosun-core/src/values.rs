//! Chart values with text-keyed normalization

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value as JsonValue;
use serde_yaml::Value as YamlValue;
use std::path::{Path, PathBuf};

use crate::error::{CoreError, Result};

/// File name of the values payload written next to a release's staged files
pub const VALUES_FILE_NAME: &str = "values.yaml";

/// Values document for a release
///
/// YAML allows arbitrary map keys (`1: a`, `true: b`), the driver does not.
/// Values are normalized once, while the configuration is loaded: every map
/// key becomes its textual form and YAML tags are dropped in favour of the
/// tagged value. The result is a plain tree of scalars, ordered lists and
/// ordered text-keyed maps.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Values(JsonValue);

impl Default for Values {
    fn default() -> Self {
        Self::new()
    }
}

impl Values {
    /// Create empty values
    pub fn new() -> Self {
        Self(JsonValue::Object(serde_json::Map::new()))
    }

    /// Parse values from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let raw: YamlValue = serde_yaml::from_str(yaml)?;
        Self::from_yaml_value(raw)
    }

    /// Normalize a raw YAML tree into values
    ///
    /// A null document is treated as empty values. Any other non-mapping
    /// document is rejected.
    pub fn from_yaml_value(raw: YamlValue) -> Result<Self> {
        match normalize(raw)? {
            JsonValue::Null => Ok(Self::new()),
            obj @ JsonValue::Object(_) => Ok(Self(obj)),
            other => Err(CoreError::ValuesNormalization {
                message: format!("values must be a mapping, found {}", kind_name(&other)),
            }),
        }
    }

    /// Get a value by dotted path (e.g. `ingress.enabled`)
    pub fn get(&self, path: &str) -> Option<&JsonValue> {
        path.split('.')
            .try_fold(&self.0, |value, key| value.as_object()?.get(key))
    }

    /// Get the inner JSON value
    pub fn inner(&self) -> &JsonValue {
        &self.0
    }

    /// Check if values are empty
    pub fn is_empty(&self) -> bool {
        match &self.0 {
            JsonValue::Object(map) => map.is_empty(),
            JsonValue::Null => true,
            _ => false,
        }
    }

    /// Serialize the driver payload
    ///
    /// The payload is JSON, which the driver reads as YAML. Every string stays
    /// quoted, so YAML 1.1 readers cannot turn `"yes"` into a boolean or
    /// `"1:20"` into a number.
    pub fn to_payload(&self) -> Result<String> {
        serde_json::to_string_pretty(&self.0)
            .map_err(|e| CoreError::PayloadSerialize(e.to_string()))
    }

    /// Write the values payload into `dir`, returning the file path
    pub fn write_file(&self, dir: &Path) -> Result<PathBuf> {
        let path = dir.join(VALUES_FILE_NAME);
        std::fs::write(&path, self.to_payload()?)?;
        Ok(path)
    }
}

impl<'de> Deserialize<'de> for Values {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = YamlValue::deserialize(deserializer)?;
        Values::from_yaml_value(raw).map_err(serde::de::Error::custom)
    }
}

fn normalize(value: YamlValue) -> Result<JsonValue> {
    Ok(match value {
        YamlValue::Null => JsonValue::Null,
        YamlValue::Bool(b) => JsonValue::Bool(b),
        YamlValue::Number(n) => normalize_number(&n)?,
        YamlValue::String(s) => JsonValue::String(s),
        YamlValue::Sequence(items) => JsonValue::Array(
            items
                .into_iter()
                .map(normalize)
                .collect::<Result<Vec<_>>>()?,
        ),
        YamlValue::Mapping(mapping) => {
            let mut map = serde_json::Map::with_capacity(mapping.len());
            for (key, value) in mapping {
                let key = key_text(key)?;
                if map.contains_key(&key) {
                    tracing::warn!(
                        key = %key,
                        "values keys collapse to the same text; last one wins"
                    );
                }
                map.insert(key, normalize(value)?);
            }
            JsonValue::Object(map)
        }
        YamlValue::Tagged(tagged) => normalize(tagged.value)?,
    })
}

fn normalize_number(n: &serde_yaml::Number) -> Result<JsonValue> {
    if let Some(i) = n.as_i64() {
        return Ok(JsonValue::from(i));
    }
    if let Some(u) = n.as_u64() {
        return Ok(JsonValue::from(u));
    }
    n.as_f64()
        .and_then(serde_json::Number::from_f64)
        .map(JsonValue::Number)
        .ok_or_else(|| CoreError::ValuesNormalization {
            message: format!("unsupported number '{}'", n),
        })
}

fn key_text(key: YamlValue) -> Result<String> {
    Ok(match key {
        YamlValue::String(s) => s,
        YamlValue::Bool(b) => b.to_string(),
        YamlValue::Number(n) => n.to_string(),
        YamlValue::Null => "null".to_string(),
        YamlValue::Tagged(tagged) => key_text(tagged.value)?,
        complex @ (YamlValue::Sequence(_) | YamlValue::Mapping(_)) => {
            normalize(complex)?.to_string()
        }
    })
}

fn kind_name(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "a boolean",
        JsonValue::Number(_) => "a number",
        JsonValue::String(_) => "a string",
        JsonValue::Array(_) => "a list",
        JsonValue::Object(_) => "a mapping",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_non_string_keys_become_text() {
        let values = Values::from_yaml(
            r#"
1: one
true: yes-key
nested:
  2.5: float-key
  ~: null-key
"#,
        )
        .unwrap();

        assert_eq!(values.get("1").unwrap(), "one");
        assert_eq!(values.get("true").unwrap(), "yes-key");
        assert_eq!(values.inner()["nested"]["2.5"], "float-key");
        assert_eq!(values.get("nested.null").unwrap(), "null-key");
    }

    #[test]
    fn test_keys_inside_lists_are_normalized() {
        let values = Values::from_yaml(
            r#"
env:
  - 80: http
  - name: plain
"#,
        )
        .unwrap();

        let env = values.get("env").unwrap().as_array().unwrap();
        assert_eq!(env[0]["80"], "http");
        assert_eq!(env[1]["name"], "plain");
    }

    #[test]
    fn test_booleans_are_not_coerced() {
        let values = Values::from_yaml("ingress:\n  enabled: true\n").unwrap();
        assert_eq!(values.get("ingress.enabled").unwrap(), &JsonValue::Bool(true));
    }

    #[test]
    fn test_tags_are_dropped() {
        let values = Values::from_yaml("port: !custom 8080\n").unwrap();
        assert_eq!(values.get("port").unwrap(), 8080);
    }

    #[test]
    fn test_null_document_is_empty() {
        let values = Values::from_yaml("~").unwrap();
        assert!(values.is_empty());
    }

    #[test]
    fn test_non_mapping_document_is_rejected() {
        let err = Values::from_yaml("- a\n- b\n").unwrap_err();
        assert!(err.to_string().contains("a list"));
    }

    #[test]
    fn test_key_order_is_preserved() {
        let values = Values::from_yaml("zeta: 1\nalpha: 2\nmid: 3\n").unwrap();
        let keys: Vec<_> = values.inner().as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys, vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn test_values_file_roundtrip() {
        let dir = TempDir::new().unwrap();
        let values = Values::from_yaml("replicaCount: 2\ningress:\n  enabled: true\n").unwrap();

        let path = values.write_file(dir.path()).unwrap();
        assert_eq!(path, dir.path().join(VALUES_FILE_NAME));

        let reparsed = Values::from_yaml(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(reparsed, values);
        assert_eq!(reparsed.get("replicaCount").unwrap(), 2);
        assert_eq!(reparsed.get("ingress.enabled").unwrap(), &JsonValue::Bool(true));
        assert_eq!(reparsed.inner().as_object().unwrap().len(), 2);
    }

    #[test]
    fn test_yaml_1_1_keywords_stay_strings() {
        let dir = TempDir::new().unwrap();
        let values = Values::from_yaml(
            "a: \"yes\"\nb: \"on\"\nc: \"off\"\nd: \"y\"\ne: \"0755\"\nf: \"1:20\"\ng: \"no\"\nh: true\n",
        )
        .unwrap();

        let path = values.write_file(dir.path()).unwrap();
        let payload = std::fs::read_to_string(&path).unwrap();

        for (key, text) in [
            ("a", "yes"),
            ("b", "on"),
            ("c", "off"),
            ("d", "y"),
            ("e", "0755"),
            ("f", "1:20"),
            ("g", "no"),
        ] {
            let line = format!("\"{}\": \"{}\"", key, text);
            assert!(payload.contains(&line), "unquoted {} in:\n{}", key, payload);
        }
        assert!(payload.contains("\"h\": true"));

        let reparsed = Values::from_yaml(&payload).unwrap();
        assert_eq!(reparsed, values);
    }

    #[test]
    fn test_payload_keeps_key_order() {
        let values = Values::from_yaml("zeta: 1\nalpha:\n  z: a\n  b: c\n").unwrap();
        let payload = values.to_payload().unwrap();
        let zeta = payload.find("\"zeta\"").unwrap();
        let alpha = payload.find("\"alpha\"").unwrap();
        let z = payload.find("\"z\"").unwrap();
        let b = payload.find("\"b\"").unwrap();
        assert!(zeta < alpha && z < b);
    }
}

//! YAML parsing using yaml-rust2
//!
//! Rendered configuration templates are YAML. They are loaded with yaml-rust2,
//! converted to `serde_json::Value`, and deserialized into typed structs from
//! there so that every object shares one serde representation.

use serde::de::DeserializeOwned;
use serde_json::{Map, Number, Value};
use thiserror::Error;
use yaml_rust2::{Yaml, YamlLoader};

/// Error type for YAML parsing
#[derive(Debug, Clone, Error, PartialEq)]
pub enum YamlError {
    /// The text is not valid YAML
    #[error("invalid YAML: {0}")]
    Parse(String),
    /// The YAML uses a construct with no JSON equivalent
    #[error("unsupported YAML: {0}")]
    Unsupported(String),
    /// The YAML parsed but does not have the expected shape
    #[error("unexpected document shape: {0}")]
    Shape(String),
}

/// Parse a YAML string into a serde_json::Value.
///
/// Only the first document is read. Empty input yields `Value::Null`.
pub fn parse_yaml(input: &str) -> Result<Value, YamlError> {
    let docs = YamlLoader::load_from_str(input).map_err(|e| YamlError::Parse(e.to_string()))?;
    match docs.into_iter().next() {
        Some(doc) => yaml_to_json(doc),
        None => Ok(Value::Null),
    }
}

/// Parse a YAML string straight into a typed value.
///
/// An empty document deserializes as `{}` so that types with all-default
/// fields accept an empty file.
pub fn parse_yaml_into<T: DeserializeOwned>(input: &str) -> Result<T, YamlError> {
    let value = match parse_yaml(input)? {
        Value::Null => Value::Object(Map::new()),
        other => other,
    };
    serde_json::from_value(value).map_err(|e| YamlError::Shape(e.to_string()))
}

fn yaml_to_json(yaml: Yaml) -> Result<Value, YamlError> {
    match yaml {
        Yaml::Null => Ok(Value::Null),
        Yaml::Boolean(b) => Ok(Value::Bool(b)),
        Yaml::Integer(i) => Ok(Value::Number(i.into())),
        Yaml::Real(s) => {
            let f: f64 = s
                .parse()
                .map_err(|e: std::num::ParseFloatError| YamlError::Parse(e.to_string()))?;
            Ok(Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null))
        }
        Yaml::String(s) => Ok(Value::String(s)),
        Yaml::Array(arr) => arr
            .into_iter()
            .map(yaml_to_json)
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        Yaml::Hash(map) => map
            .into_iter()
            .map(|(k, v)| {
                let key = match k {
                    Yaml::String(s) => s,
                    Yaml::Integer(i) => i.to_string(),
                    Yaml::Real(r) => r,
                    Yaml::Boolean(b) => b.to_string(),
                    _ => return Err(YamlError::Unsupported("non-scalar mapping key".into())),
                };
                yaml_to_json(v).map(|v| (key, v))
            })
            .collect::<Result<Map<String, Value>, _>>()
            .map(Value::Object),
        Yaml::Alias(_) => Err(YamlError::Unsupported("aliases".into())),
        Yaml::BadValue => Err(YamlError::Parse("bad value".into())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Default, Deserialize, PartialEq)]
    #[serde(rename_all = "camelCase")]
    struct Tier {
        #[serde(default)]
        omit: bool,
        #[serde(default)]
        services: Vec<Value>,
    }

    #[test]
    fn parses_nested_objects_and_lists() {
        let yaml = r#"
console:
  deploymentConfigs:
    - metadata:
        name: demo-rhpamcentr
      spec:
        replicas: 1
"#;
        let result = parse_yaml(yaml).unwrap();
        let dc = &result["console"]["deploymentConfigs"][0];
        assert_eq!(dc["metadata"]["name"], "demo-rhpamcentr");
        assert_eq!(dc["spec"]["replicas"], 1);
    }

    #[test]
    fn quoted_scalars_stay_strings() {
        let result = parse_yaml("annotations:\n  delete: \"true\"\n  port: \"8080\"").unwrap();
        assert_eq!(result["annotations"]["delete"], "true");
        assert_eq!(result["annotations"]["port"], "8080");
    }

    #[test]
    fn reals_become_numbers() {
        let result = parse_yaml("ratio: 0.5").unwrap();
        assert_eq!(result["ratio"], 0.5);
    }

    #[test]
    fn empty_input_is_null() {
        assert_eq!(parse_yaml("").unwrap(), Value::Null);
    }

    #[test]
    fn invalid_yaml_is_a_parse_error() {
        let result = parse_yaml("not: valid: yaml: {{");
        assert!(matches!(result, Err(YamlError::Parse(_))));
    }

    #[test]
    fn typed_parse_accepts_empty_document() {
        let tier: Tier = parse_yaml_into("").unwrap();
        assert_eq!(tier, Tier::default());
    }

    #[test]
    fn typed_parse_reports_shape_errors() {
        let result: Result<Tier, _> = parse_yaml_into("omit: [1, 2]");
        assert!(matches!(result, Err(YamlError::Shape(_))));
    }
}

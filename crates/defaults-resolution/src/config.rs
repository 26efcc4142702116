//! Cluster-wide defaulter configuration.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use storage_namespace::ResourceType;
use thiserror::Error;

pub const USE_FORMATTING_KEY: &str = "use_formatting";

/// Static configuration established once at startup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefaulterConfig {
    /// Expose `{account}`, `{container}` and `{object}` to default values.
    #[serde(default)]
    pub use_formatting: bool,
    /// Lowest-precedence defaults keyed `default-<resource>-<attribute>`.
    #[serde(default)]
    pub cluster_defaults: BTreeMap<String, String>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse config toml: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("unsupported value for {key}: {detail}")]
    InvalidValue { key: String, detail: String },
}

impl DefaulterConfig {
    /// Build from string pairs; later pairs override earlier ones and
    /// unrecognised keys are ignored.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut config = Self::default();
        for (key, value) in pairs {
            let (key, value) = (key.as_ref().trim(), value.as_ref());
            if key.eq_ignore_ascii_case(USE_FORMATTING_KEY) {
                config.use_formatting = config_true_value(value);
            } else if is_cluster_default_key(key) {
                config
                    .cluster_defaults
                    .insert(key.to_string(), value.to_string());
            }
        }
        config
    }

    /// Merge a global and a local layer, local entries winning.
    pub fn from_layers(
        global: &BTreeMap<String, String>,
        local: &BTreeMap<String, String>,
    ) -> Self {
        Self::from_pairs(global.iter().chain(local.iter()))
    }

    /// Parse a flat TOML table of string, boolean, or numeric values.
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let table: toml::Table = raw.parse()?;
        let mut pairs = Vec::with_capacity(table.len());
        for (key, value) in table {
            let rendered = match value {
                toml::Value::String(text) => text,
                toml::Value::Boolean(flag) => flag.to_string(),
                toml::Value::Integer(number) => number.to_string(),
                toml::Value::Float(number) => number.to_string(),
                other => {
                    return Err(ConfigError::InvalidValue {
                        key,
                        detail: format!("expected a scalar, found {}", other.type_str()),
                    })
                }
            };
            pairs.push((key, rendered));
        }
        Ok(Self::from_pairs(pairs))
    }

    /// Payload published to capability discovery.
    #[must_use]
    pub fn capability_info(&self) -> Value {
        let mut info = Map::new();
        info.insert(USE_FORMATTING_KEY.into(), Value::Bool(self.use_formatting));
        for (key, value) in &self.cluster_defaults {
            info.insert(key.clone(), Value::String(value.clone()));
        }
        Value::Object(info)
    }
}

fn is_cluster_default_key(key: &str) -> bool {
    [
        ResourceType::Account,
        ResourceType::Container,
        ResourceType::Object,
    ]
    .into_iter()
    .any(|kind| {
        let prefix = format!("default-{}-", kind.as_str());
        key.len() > prefix.len()
            && key
                .get(..prefix.len())
                .is_some_and(|head| head.eq_ignore_ascii_case(&prefix))
    })
}

/// Interpret the usual truthy spellings used in pipeline configuration files.
#[must_use]
pub fn config_true_value(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "yes" | "on" | "t" | "y"
    )
}

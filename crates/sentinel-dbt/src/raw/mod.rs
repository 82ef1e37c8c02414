//! Raw serde models, one per artifact schema generation.
//!
//! These mirror the JSON closely and are only used inside the crate; the
//! public API exposes the normalized types from `resources`.

pub(crate) mod manifest;
pub(crate) mod run_results;
pub(crate) mod catalog;

use serde::{Deserialize, Deserializer};

/// `null` and absent both become `T::default()`
pub(crate) fn null_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// A value written either as a single string or as a list of strings
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub(crate) enum StringOrList {
    One(String),
    Many(Vec<String>),
}

impl Default for StringOrList {
    fn default() -> Self {
        Self::Many(Vec::new())
    }
}

impl StringOrList {
    pub(crate) fn into_vec(self) -> Vec<String> {
        match self {
            Self::One(value) => vec![value],
            Self::Many(values) => values,
        }
    }
}

/// Node `resource_type`. Kinds no check looks at collapse into `Other`.
///
/// Older artifacts write bare lowercase strings (`"model"`); newer
/// generators may emit enum-style tags (`"Model"`, `"NodeType.Model"`).
/// Both are accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ResourceType {
    Model,
    Seed,
    Snapshot,
    Test,
    Other,
}

impl ResourceType {
    pub(crate) fn from_tag(raw: &str) -> Self {
        let tag = raw.rsplit('.').next().unwrap_or(raw).to_ascii_lowercase();
        match tag.as_str() {
            "model" => Self::Model,
            "seed" => Self::Seed,
            "snapshot" => Self::Snapshot,
            "test" => Self::Test,
            _ => Self::Other,
        }
    }
}

impl<'de> Deserialize<'de> for ResourceType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::from_tag(&raw))
    }
}

/// Model versions are numbers or strings in the manifest
pub(crate) fn version_string(value: Option<serde_json::Value>) -> Option<String> {
    match value? {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}

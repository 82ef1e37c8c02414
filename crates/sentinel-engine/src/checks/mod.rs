//! Built-in checks
//!
//! Each check is a struct holding its parameters. The struct is
//! deserialized straight from the configuration entry, so field names are
//! the parameter names users write.

mod catalog;
mod coverage;
mod data_tests;
mod exposures;
mod lineage;
mod macros;
mod models;
mod run_results;
mod seeds;
mod sources;

use serde::Deserialize;
use sentinel_dbt::Meta;
use crate::registry::CheckKind;

/// Every built-in check kind
pub(crate) fn builtin() -> Vec<CheckKind> {
    let mut kinds = Vec::new();
    kinds.extend(models::kinds());
    kinds.extend(lineage::kinds());
    kinds.extend(coverage::kinds());
    kinds.extend(sources::kinds());
    kinds.extend(macros::kinds());
    kinds.extend(seeds::kinds());
    kinds.extend(exposures::kinds());
    kinds.extend(data_tests::kinds());
    kinds.extend(run_results::kinds());
    kinds.extend(catalog::kinds());
    kinds
}

pub(crate) fn default_min_description_length() -> usize {
    4
}

/// How a list of required tags is matched
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum TagCriteria {
    /// At least one of the tags
    Any,
    /// Every tag
    #[default]
    All,
    /// Exactly one of the tags
    One,
}

impl TagCriteria {
    pub(crate) fn is_met(&self, actual: &[String], required: &[String]) -> bool {
        let present = required.iter().filter(|t| actual.contains(t)).count();
        match self {
            Self::Any => present > 0,
            Self::All => present == required.len(),
            Self::One => present == 1,
        }
    }

    /// Failure message for a resource displayed as `name`
    pub(crate) fn failure(&self, name: &str, actual: &[String], required: &[String]) -> String {
        match self {
            Self::Any => format!("`{name}` does not have any of the required tags: {required:?}."),
            Self::All => {
                let missing: Vec<&String> = required.iter().filter(|t| !actual.contains(t)).collect();
                format!("`{name}` is missing required tags: {missing:?}.")
            }
            Self::One => format!("`{name}` must have exactly one of the required tags: {required:?}."),
        }
    }
}

/// Required meta keys: plain keys, or a key whose value must itself
/// contain the nested keys
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub(crate) enum MetaKey {
    Key(String),
    Nested(std::collections::BTreeMap<String, Vec<MetaKey>>),
}

/// Dotted paths of every required key absent from `meta`
pub(crate) fn missing_meta_keys(required: &[MetaKey], meta: &Meta) -> Vec<String> {
    let mut missing = Vec::new();
    collect_missing(required, meta, "", &mut missing);
    missing
}

fn collect_missing(required: &[MetaKey], meta: &Meta, prefix: &str, missing: &mut Vec<String>) {
    for key in required {
        match key {
            MetaKey::Key(name) => {
                if !meta.contains_key(name) {
                    missing.push(format!("{prefix}{name}"));
                }
            }
            MetaKey::Nested(children) => {
                for (name, nested) in children {
                    match meta.get(name).and_then(|v| v.as_object()) {
                        Some(inner) => collect_missing(nested, inner, &format!("{prefix}{name}."), missing),
                        None => missing.push(format!("{prefix}{name}")),
                    }
                }
            }
        }
    }
}

/// `config.meta` wins over the top-level `meta` for keys present in both
pub(crate) fn merged_meta(meta: &Meta, config_meta: &Meta) -> Meta {
    let mut merged = meta.clone();
    merged.extend(config_meta.iter().map(|(k, v)| (k.clone(), v.clone())));
    merged
}

/// Percentage of `covered` out of `total`; an empty set counts as fully covered
pub(crate) fn coverage_pct(covered: usize, total: usize) -> f64 {
    if total == 0 {
        100.0
    } else {
        covered as f64 * 100.0 / total as f64
    }
}

/// Percentage parameters must lie in 0..=100
pub(crate) fn validate_pct(field: &str, value: f64) -> Result<(), String> {
    if (0.0..=100.0).contains(&value) {
        Ok(())
    } else {
        Err(format!("`{field}` must be between 0 and 100, got {value}"))
    }
}

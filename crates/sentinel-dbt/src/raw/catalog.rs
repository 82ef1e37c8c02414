//! catalog.json v1

use serde::Deserialize;
use std::collections::BTreeMap;
use super::null_default;

#[derive(Debug, Deserialize)]
pub(crate) struct RawCatalogMetadata {
    #[serde(default)]
    pub dbt_version: Option<String>,
    #[serde(default)]
    pub generated_at: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawCatalog {
    pub metadata: RawCatalogMetadata,
    pub nodes: BTreeMap<String, RawCatalogTable>,
    pub sources: BTreeMap<String, RawCatalogTable>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawTableMetadata {
    #[serde(rename = "type", default)]
    pub relation_type: String,
    #[serde(default)]
    pub database: Option<String>,
    #[serde(default)]
    pub schema: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawCatalogColumn {
    #[serde(rename = "type", default)]
    pub data_type: String,
    #[serde(default)]
    pub index: i64,
    pub name: String,
    #[serde(default)]
    pub comment: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawCatalogTable {
    /// Nullable in the schema; the mapping key is used instead
    #[serde(default)]
    pub unique_id: Option<String>,
    pub metadata: RawTableMetadata,
    #[serde(default, deserialize_with = "null_default")]
    pub columns: BTreeMap<String, RawCatalogColumn>,
}

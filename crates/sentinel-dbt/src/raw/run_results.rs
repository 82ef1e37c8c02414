//! run_results.json v4 (legacy) and v5 / v6 (current)

use serde::Deserialize;
use super::null_default;
use crate::resources::Meta;

#[derive(Debug, Deserialize)]
pub(crate) struct RawRunResultsMetadata {
    #[serde(default)]
    pub dbt_version: Option<String>,
    #[serde(default)]
    pub generated_at: Option<String>,
    #[serde(default)]
    pub invocation_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawRunResults<R> {
    pub metadata: RawRunResultsMetadata,
    pub results: Vec<R>,
    #[serde(default)]
    pub elapsed_time: Option<f64>,
}

/// v4 result
#[derive(Debug, Deserialize)]
pub(crate) struct LegacyRunResult {
    pub unique_id: String,
    pub status: String,
    #[serde(default)]
    pub execution_time: f64,
    #[serde(default, deserialize_with = "null_default")]
    pub adapter_response: Meta,
    #[serde(default)]
    pub message: Option<String>,
}

/// v5 / v6 result
#[derive(Debug, Deserialize)]
pub(crate) struct CurrentRunResult {
    #[serde(flatten)]
    pub base: LegacyRunResult,
    #[serde(default)]
    pub compiled_code: Option<String>,
    #[serde(default)]
    pub relation_name: Option<String>,
}

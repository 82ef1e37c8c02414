//! dbt run_results.json parsing

use serde_json::Value;
use std::path::Path;
use crate::error::{ArtifactError, ArtifactKind, Result};
use crate::manifest::{package_of, Manifest};
use crate::raw::run_results::{
    CurrentRunResult, LegacyRunResult, RawRunResults, RawRunResultsMetadata,
};
use crate::resources::RunResult;
use crate::schema::{RunResultsSchema, SchemaVersion};

#[derive(Debug, Clone, PartialEq)]
pub struct RunResultsMetadata {
    pub schema: RunResultsSchema,
    pub dbt_version: Option<String>,
    pub generated_at: Option<String>,
    pub invocation_id: Option<String>,
    /// Wall-clock seconds of the whole invocation
    pub elapsed_time: Option<f64>,
}

/// Normalized run results, sorted by unique_id
#[derive(Debug, Clone)]
pub struct RunResults {
    pub metadata: RunResultsMetadata,
    pub results: Vec<RunResult>,
}

impl RunResults {
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| ArtifactError::Io {
            artifact: ArtifactKind::RunResults,
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        Self::from_str(&contents)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(json: &str) -> Result<Self> {
        let document: Value = serde_json::from_str(json)
            .map_err(|e| ArtifactError::malformed(ArtifactKind::RunResults, e))?;

        Self::from_value(document)
    }

    pub fn from_value(document: Value) -> Result<Self> {
        let schema = RunResultsSchema::detect(&document)?;
        let malformed = |e: serde_json::Error| ArtifactError::malformed(ArtifactKind::RunResults, e);

        let (metadata, elapsed_time, mut results) = if schema.is_legacy() {
            let raw: RawRunResults<LegacyRunResult> =
                serde_json::from_value(document).map_err(malformed)?;
            let results: Vec<RunResult> =
                raw.results.into_iter().map(|r| normalize(r, None, None)).collect();
            (raw.metadata, raw.elapsed_time, results)
        } else {
            let raw: RawRunResults<CurrentRunResult> =
                serde_json::from_value(document).map_err(malformed)?;
            let results: Vec<RunResult> = raw
                .results
                .into_iter()
                .map(|r| normalize(r.base, r.compiled_code, r.relation_name))
                .collect();
            (raw.metadata, raw.elapsed_time, results)
        };

        results.sort_by(|a, b| a.unique_id.cmp(&b.unique_id));

        let RawRunResultsMetadata {
            dbt_version,
            generated_at,
            invocation_id,
        } = metadata;

        Ok(Self {
            metadata: RunResultsMetadata {
                schema,
                dbt_version,
                generated_at,
                invocation_id,
                elapsed_time,
            },
            results,
        })
    }

    /// Copy `original_file_path` over from the manifest resources
    pub fn link(&mut self, manifest: &Manifest) {
        for result in &mut self.results {
            if let Some(path) = manifest.original_file_path(&result.unique_id) {
                result.original_file_path = path.to_string();
            }
        }
    }

    /// Keep only results whose unique_id belongs to `package`
    pub fn retain_package(&mut self, package: &str) {
        self.results.retain(|r| package_of(&r.unique_id) == Some(package));
    }
}

fn normalize(
    raw: LegacyRunResult,
    compiled_code: Option<String>,
    relation_name: Option<String>,
) -> RunResult {
    RunResult {
        unique_id: raw.unique_id,
        original_file_path: String::new(),
        status: raw.status,
        execution_time: raw.execution_time,
        adapter_response: raw.adapter_response,
        message: raw.message,
        compiled_code,
        relation_name,
    }
}

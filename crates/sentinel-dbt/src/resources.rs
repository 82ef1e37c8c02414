//! Normalized resources
//!
//! One shape per resource kind, whatever schema version it was read from.
//! Fields that only exist in some versions are optional here.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Free-form `meta` mapping
pub type Meta = serde_json::Map<String, serde_json::Value>;

/// Reserved meta key holding per-resource settings for this tool
pub const META_NAMESPACE: &str = "dbt-sentinel";

/// Key below `META_NAMESPACE` listing check names to skip for a resource
pub const SKIP_CHECKS_KEY: &str = "skip_checks";

/// Kinds of resource checks can iterate over
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Model,
    Source,
    Macro,
    Seed,
    Snapshot,
    Exposure,
    SemanticModel,
    Test,
    UnitTest,
    RunResult,
    CatalogNode,
    CatalogSource,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match *self {
            Self::Model => "model",
            Self::Source => "source",
            Self::Macro => "macro",
            Self::Seed => "seed",
            Self::Snapshot => "snapshot",
            Self::Exposure => "exposure",
            Self::SemanticModel => "semantic_model",
            Self::Test => "test",
            Self::UnitTest => "unit_test",
            Self::RunResult => "run_result",
            Self::CatalogNode => "catalog_node",
            Self::CatalogSource => "catalog_source",
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Model access level
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Access {
    Private,
    #[default]
    Protected,
    Public,
}

impl Access {
    pub fn as_str(&self) -> &'static str {
        match *self {
            Self::Private => "private",
            Self::Protected => "protected",
            Self::Public => "public",
        }
    }
}

impl std::fmt::Display for Access {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Declared column of a model, seed, snapshot or source
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub description: String,
    pub data_type: Option<String>,
    pub tags: Vec<String>,
    pub meta: Meta,
}

/// A dbt model
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Model {
    pub unique_id: String,
    pub name: String,
    pub package_name: String,
    /// Forward-slash path relative to the project root
    pub original_file_path: String,
    pub patch_path: Option<String>,
    pub description: String,
    pub tags: Vec<String>,
    pub meta: Meta,
    pub config_meta: Meta,
    /// Declared materialization (`table`, `view`, `incremental`, ...)
    pub materialized: Option<String>,
    pub access: Access,
    pub columns: BTreeMap<String, Column>,
    /// unique_ids this model selects from
    pub depends_on: Vec<String>,
    pub depends_on_macros: Vec<String>,
    pub raw_code: Option<String>,
    pub version: Option<String>,
    pub latest_version: Option<String>,
    pub database: Option<String>,
    pub schema: Option<String>,
    pub alias: Option<String>,
}

/// Source freshness threshold
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FreshnessThreshold {
    pub count: Option<i64>,
    pub period: Option<String>,
}

impl FreshnessThreshold {
    fn is_set(&self) -> bool {
        self.count.is_some() && self.period.is_some()
    }
}

/// Source freshness configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Freshness {
    pub warn_after: Option<FreshnessThreshold>,
    pub error_after: Option<FreshnessThreshold>,
}

impl Freshness {
    /// True if a warn or error threshold is fully specified
    pub fn is_populated(&self) -> bool {
        [&self.warn_after, &self.error_after]
            .into_iter()
            .flatten()
            .any(FreshnessThreshold::is_set)
    }
}

/// A source table
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub unique_id: String,
    /// Table name
    pub name: String,
    /// Name of the source the table belongs to
    pub source_name: String,
    pub package_name: String,
    pub original_file_path: String,
    pub description: String,
    pub source_description: String,
    pub loader: String,
    pub freshness: Option<Freshness>,
    pub loaded_at_field: Option<String>,
    pub tags: Vec<String>,
    pub meta: Meta,
    pub config_meta: Meta,
    pub columns: BTreeMap<String, Column>,
    pub database: Option<String>,
    pub schema: Option<String>,
    pub identifier: Option<String>,
}

/// Documented macro argument
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MacroArgument {
    pub name: String,
    pub description: String,
    pub data_type: Option<String>,
}

/// A macro
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Macro {
    pub unique_id: String,
    pub name: String,
    pub package_name: String,
    pub original_file_path: String,
    pub description: String,
    pub macro_sql: String,
    pub arguments: Vec<MacroArgument>,
    pub meta: Meta,
}

/// A seed
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Seed {
    pub unique_id: String,
    pub name: String,
    pub package_name: String,
    pub original_file_path: String,
    pub description: String,
    pub tags: Vec<String>,
    pub meta: Meta,
    pub config_meta: Meta,
    pub columns: BTreeMap<String, Column>,
}

/// A snapshot
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub unique_id: String,
    pub name: String,
    pub package_name: String,
    pub original_file_path: String,
    pub description: String,
    pub tags: Vec<String>,
    pub meta: Meta,
    pub config_meta: Meta,
    pub columns: BTreeMap<String, Column>,
    pub depends_on: Vec<String>,
}

/// Owner of an exposure. Older manifests allow a single email only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExposureOwner {
    pub name: Option<String>,
    pub email: Vec<String>,
}

/// An exposure (dashboard, notebook, application, ...)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Exposure {
    pub unique_id: String,
    pub name: String,
    pub package_name: String,
    pub original_file_path: String,
    pub description: String,
    pub exposure_type: String,
    pub maturity: Option<String>,
    pub owner: ExposureOwner,
    pub depends_on: Vec<String>,
    pub tags: Vec<String>,
    pub meta: Meta,
}

/// A semantic model
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SemanticModel {
    pub unique_id: String,
    pub name: String,
    pub package_name: String,
    pub original_file_path: String,
    pub description: String,
    pub depends_on: Vec<String>,
    pub meta: Meta,
}

/// Generic test metadata (absent for singular tests)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TestMetadata {
    pub name: String,
    pub namespace: Option<String>,
    pub kwargs: Meta,
}

impl TestMetadata {
    /// `namespace.name`, or just `name` for tests from dbt core
    pub fn qualified_name(&self) -> String {
        match &self.namespace {
            Some(ns) => format!("{ns}.{}", self.name),
            None => self.name.clone(),
        }
    }
}

/// A data test, generic or singular
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Test {
    pub unique_id: String,
    pub name: String,
    pub package_name: String,
    pub original_file_path: String,
    pub description: String,
    pub tags: Vec<String>,
    pub meta: Meta,
    pub config_meta: Meta,
    pub test_metadata: Option<TestMetadata>,
    /// Node the test is attached to, for generic tests
    pub attached_node: Option<String>,
    pub column_name: Option<String>,
    pub depends_on: Vec<String>,
}

impl Test {
    pub fn is_singular(&self) -> bool {
        self.test_metadata.is_none()
    }
}

/// Fixture format of a unit test input or expectation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitTestFixture {
    /// `ref('...')` / `source('...')` for inputs, empty for the expectation
    pub input: String,
    /// `dict`, `csv` or `sql`
    pub format: String,
}

/// A unit test (manifest v12 onwards)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UnitTest {
    pub unique_id: String,
    pub name: String,
    pub package_name: String,
    pub original_file_path: String,
    pub description: String,
    /// Name of the model under test
    pub model: String,
    pub given: Vec<UnitTestFixture>,
    pub expect: UnitTestFixture,
    pub depends_on: Vec<String>,
    pub tags: Vec<String>,
    pub meta: Meta,
}

/// One entry of run_results.json
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    pub unique_id: String,
    /// Path of the node the result belongs to
    pub original_file_path: String,
    pub status: String,
    /// Seconds
    pub execution_time: f64,
    pub adapter_response: Meta,
    pub message: Option<String>,
    /// Absent before run-results v5
    pub compiled_code: Option<String>,
    /// Absent before run-results v5
    pub relation_name: Option<String>,
}

/// Observed column in the warehouse
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogColumn {
    pub name: String,
    pub data_type: String,
    pub index: i64,
    pub comment: Option<String>,
}

/// Physical counterpart of a model, seed, snapshot or source
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogNode {
    pub unique_id: String,
    /// Path of the manifest resource with the same unique_id
    pub original_file_path: String,
    pub relation_type: String,
    pub database: Option<String>,
    pub schema: String,
    pub name: String,
    pub columns: BTreeMap<String, CatalogColumn>,
}

/// A resource of any kind, borrowed from the loaded artifacts
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Resource<'a> {
    Model(&'a Model),
    Source(&'a Source),
    Macro(&'a Macro),
    Seed(&'a Seed),
    Snapshot(&'a Snapshot),
    Exposure(&'a Exposure),
    SemanticModel(&'a SemanticModel),
    Test(&'a Test),
    UnitTest(&'a UnitTest),
    RunResult(&'a RunResult),
    CatalogNode(&'a CatalogNode),
    CatalogSource(&'a CatalogNode),
}

impl<'a> Resource<'a> {
    pub fn kind(&self) -> ResourceKind {
        match *self {
            Self::Model(_) => ResourceKind::Model,
            Self::Source(_) => ResourceKind::Source,
            Self::Macro(_) => ResourceKind::Macro,
            Self::Seed(_) => ResourceKind::Seed,
            Self::Snapshot(_) => ResourceKind::Snapshot,
            Self::Exposure(_) => ResourceKind::Exposure,
            Self::SemanticModel(_) => ResourceKind::SemanticModel,
            Self::Test(_) => ResourceKind::Test,
            Self::UnitTest(_) => ResourceKind::UnitTest,
            Self::RunResult(_) => ResourceKind::RunResult,
            Self::CatalogNode(_) => ResourceKind::CatalogNode,
            Self::CatalogSource(_) => ResourceKind::CatalogSource,
        }
    }

    pub fn unique_id(&self) -> &'a str {
        match *self {
            Self::Model(r) => &r.unique_id,
            Self::Source(r) => &r.unique_id,
            Self::Macro(r) => &r.unique_id,
            Self::Seed(r) => &r.unique_id,
            Self::Snapshot(r) => &r.unique_id,
            Self::Exposure(r) => &r.unique_id,
            Self::SemanticModel(r) => &r.unique_id,
            Self::Test(r) => &r.unique_id,
            Self::UnitTest(r) => &r.unique_id,
            Self::RunResult(r) => &r.unique_id,
            Self::CatalogNode(r) | Self::CatalogSource(r) => &r.unique_id,
        }
    }

    /// Normalized path include/exclude patterns are matched against
    pub fn original_file_path(&self) -> &'a str {
        match *self {
            Self::Model(r) => &r.original_file_path,
            Self::Source(r) => &r.original_file_path,
            Self::Macro(r) => &r.original_file_path,
            Self::Seed(r) => &r.original_file_path,
            Self::Snapshot(r) => &r.original_file_path,
            Self::Exposure(r) => &r.original_file_path,
            Self::SemanticModel(r) => &r.original_file_path,
            Self::Test(r) => &r.original_file_path,
            Self::UnitTest(r) => &r.original_file_path,
            Self::RunResult(r) => &r.original_file_path,
            Self::CatalogNode(r) | Self::CatalogSource(r) => &r.original_file_path,
        }
    }

    /// Declared materialization. Only models have one.
    pub fn materialized(&self) -> Option<&'a str> {
        match *self {
            Self::Model(m) => m.materialized.as_deref(),
            _ => None,
        }
    }

    /// Meta mappings of the resource, top-level first, then `config.meta`
    fn metas(&self) -> Vec<&'a Meta> {
        match *self {
            Self::Model(r) => vec![&r.meta, &r.config_meta],
            Self::Source(r) => vec![&r.meta, &r.config_meta],
            Self::Seed(r) => vec![&r.meta, &r.config_meta],
            Self::Snapshot(r) => vec![&r.meta, &r.config_meta],
            Self::Test(r) => vec![&r.meta, &r.config_meta],
            Self::Macro(r) => vec![&r.meta],
            Self::Exposure(r) => vec![&r.meta],
            Self::SemanticModel(r) => vec![&r.meta],
            Self::UnitTest(r) => vec![&r.meta],
            Self::RunResult(_) | Self::CatalogNode(_) | Self::CatalogSource(_) => Vec::new(),
        }
    }

    /// Check names listed under `meta.dbt-sentinel.skip_checks`, from both
    /// the resource's `meta` and its `config.meta`
    pub fn skip_checks(&self) -> Vec<&'a str> {
        let mut names: Vec<&'a str> = self
            .metas()
            .into_iter()
            .filter_map(|meta| meta.get(META_NAMESPACE)?.get(SKIP_CHECKS_KEY))
            .flat_map(|value| match value {
                serde_json::Value::String(name) => vec![name.as_str()],
                serde_json::Value::Array(items) => items.iter().filter_map(|v| v.as_str()).collect(),
                _ => Vec::new(),
            })
            .collect();
        names.sort_unstable();
        names.dedup();
        names
    }
}

/// Normalize a path to forward-slash form
pub fn clean_path(path: &str) -> String {
    path.replace('\\', "/")
}

/// Whether a description is long enough to count as documentation
pub fn is_description_populated(description: &str, min_length: usize) -> bool {
    description.trim().chars().count() >= min_length
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn meta(value: serde_json::Value) -> Meta {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn skip_list_merges_meta_and_config_meta() {
        let model = Model {
            unique_id: "model.shop.orders".to_string(),
            meta: meta(json!({ "dbt-sentinel": { "skip_checks": ["check_model_names"] } })),
            config_meta: meta(json!({ "dbt-sentinel": { "skip_checks": "check_model_has_tags" } })),
            ..Model::default()
        };

        assert_eq!(
            Resource::Model(&model).skip_checks(),
            vec!["check_model_has_tags", "check_model_names"]
        );
    }

    #[test]
    fn materialization_only_for_models() {
        let seed = Seed::default();
        assert_eq!(Resource::Seed(&seed).materialized(), None);

        let model = Model {
            materialized: Some("view".to_string()),
            ..Model::default()
        };
        assert_eq!(Resource::Model(&model).materialized(), Some("view"));
    }

    #[test]
    fn freshness_needs_count_and_period() {
        let partial = Freshness {
            warn_after: Some(FreshnessThreshold { count: Some(1), period: None }),
            error_after: None,
        };
        assert!(!partial.is_populated());

        let full = Freshness {
            warn_after: None,
            error_after: Some(FreshnessThreshold { count: Some(1), period: Some("day".to_string()) }),
        };
        assert!(full.is_populated());
    }

    #[test]
    fn windows_paths_are_cleaned() {
        assert_eq!(clean_path("models\\staging\\stg_orders.sql"), "models/staging/stg_orders.sql");
    }

    #[test]
    fn description_length_is_trimmed() {
        assert!(!is_description_populated("   ", 4));
        assert!(!is_description_populated(" abc ", 4));
        assert!(is_description_populated("Orders", 4));
    }
}

//! manifest.json v10 / v11 (legacy) and v12 (current)
//!
//! The generations share almost every shape. They differ in the exposure
//! owner (`email` is a single string before v12) and in `unit_tests`, which
//! only exist from v12 onwards.

use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use super::{null_default, version_string, ResourceType, StringOrList};
use crate::resources::{
    clean_path, Access, Column, Exposure, ExposureOwner, Freshness, FreshnessThreshold, Macro,
    MacroArgument, Meta, Model, SemanticModel, Seed, Snapshot, Source, Test, TestMetadata,
    UnitTest, UnitTestFixture,
};

#[derive(Debug, Deserialize)]
pub(crate) struct RawMetadata {
    pub dbt_schema_version: String,
    pub dbt_version: String,
    #[serde(default)]
    pub project_name: Option<String>,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub adapter_type: Option<String>,
    #[serde(default)]
    pub generated_at: Option<String>,
    #[serde(default)]
    pub invocation_id: Option<String>,
}

/// Fields common to every manifest generation, generic over the exposure owner shape
#[derive(Debug, Deserialize)]
pub(crate) struct RawManifest<O> {
    pub metadata: RawMetadata,
    pub nodes: BTreeMap<String, RawNode>,
    pub sources: BTreeMap<String, RawSource>,
    pub macros: BTreeMap<String, RawMacro>,
    #[serde(default = "BTreeMap::new")]
    pub exposures: BTreeMap<String, RawExposure<O>>,
    #[serde(default)]
    pub semantic_models: BTreeMap<String, RawSemanticModel>,
    #[serde(default)]
    pub parent_map: Option<BTreeMap<String, Vec<String>>>,
    #[serde(default)]
    pub child_map: Option<BTreeMap<String, Vec<String>>>,
}

/// manifest v10 / v11
pub(crate) type LegacyManifest = RawManifest<LegacyOwner>;

/// manifest v12
#[derive(Debug, Deserialize)]
pub(crate) struct CurrentManifest {
    #[serde(flatten)]
    pub base: RawManifest<CurrentOwner>,
    #[serde(default)]
    pub unit_tests: BTreeMap<String, RawUnitTest>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct RawDependsOn {
    #[serde(default, deserialize_with = "null_default")]
    pub nodes: Vec<String>,
    #[serde(default, deserialize_with = "null_default")]
    pub macros: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct RawColumn {
    #[serde(default)]
    pub name: String,
    #[serde(default, deserialize_with = "null_default")]
    pub description: String,
    #[serde(default)]
    pub data_type: Option<String>,
    #[serde(default, deserialize_with = "null_default")]
    pub tags: Vec<String>,
    #[serde(default, deserialize_with = "null_default")]
    pub meta: Meta,
}

impl RawColumn {
    fn normalize(self, key: String) -> (String, Column) {
        let name = if self.name.is_empty() { key.clone() } else { self.name };
        (key, Column {
            name,
            description: self.description,
            data_type: self.data_type,
            tags: self.tags,
            meta: self.meta,
        })
    }
}

fn columns(raw: BTreeMap<String, RawColumn>) -> BTreeMap<String, Column> {
    raw.into_iter().map(|(key, column)| column.normalize(key)).collect()
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct RawNodeConfig {
    #[serde(default)]
    pub materialized: Option<String>,
    #[serde(default, deserialize_with = "null_default")]
    pub meta: Meta,
    #[serde(default, deserialize_with = "null_default")]
    pub tags: StringOrList,
    #[serde(default)]
    pub access: Option<Access>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawTestMetadata {
    pub name: String,
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default, deserialize_with = "null_default")]
    pub kwargs: Meta,
}

/// Entry of `nodes`: models, seeds, snapshots, tests and anything else dbt puts there
#[derive(Debug, Deserialize)]
pub(crate) struct RawNode {
    pub unique_id: String,
    pub name: String,
    pub resource_type: ResourceType,
    pub package_name: String,
    pub original_file_path: String,
    #[serde(default)]
    pub patch_path: Option<String>,
    #[serde(default, deserialize_with = "null_default")]
    pub description: String,
    #[serde(default, deserialize_with = "null_default")]
    pub tags: StringOrList,
    #[serde(default, deserialize_with = "null_default")]
    pub meta: Meta,
    #[serde(default, deserialize_with = "null_default")]
    pub config: RawNodeConfig,
    #[serde(default, deserialize_with = "null_default")]
    pub columns: BTreeMap<String, RawColumn>,
    #[serde(default, deserialize_with = "null_default")]
    pub depends_on: RawDependsOn,
    #[serde(default)]
    pub access: Option<Access>,
    #[serde(default)]
    pub raw_code: Option<String>,
    #[serde(default)]
    pub version: Option<Value>,
    #[serde(default)]
    pub latest_version: Option<Value>,
    #[serde(default)]
    pub test_metadata: Option<RawTestMetadata>,
    #[serde(default)]
    pub attached_node: Option<String>,
    #[serde(default)]
    pub column_name: Option<String>,
    #[serde(default)]
    pub database: Option<String>,
    #[serde(default)]
    pub schema: Option<String>,
    #[serde(default)]
    pub alias: Option<String>,
}

/// A manifest node sorted by kind
pub(crate) enum NodeEntry {
    Model(Model),
    Seed(Seed),
    Snapshot(Snapshot),
    Test(Test),
    Other,
}

impl RawNode {
    fn merged_tags(&self) -> Vec<String> {
        let mut tags: Vec<String> = match &self.tags {
            StringOrList::One(tag) => vec![tag.clone()],
            StringOrList::Many(tags) => tags.clone(),
        };
        for tag in self.config.tags.clone().into_vec() {
            if !tags.contains(&tag) {
                tags.push(tag);
            }
        }
        tags
    }

    pub(crate) fn normalize(self) -> NodeEntry {
        let tags = self.merged_tags();
        let original_file_path = clean_path(&self.original_file_path);

        match self.resource_type {
            ResourceType::Model => NodeEntry::Model(Model {
                access: self.access.or(self.config.access).unwrap_or_default(),
                unique_id: self.unique_id,
                name: self.name,
                package_name: self.package_name,
                original_file_path,
                patch_path: self.patch_path.map(|p| clean_path(&p)),
                description: self.description,
                tags,
                meta: self.meta,
                config_meta: self.config.meta,
                materialized: self.config.materialized,
                columns: columns(self.columns),
                depends_on: self.depends_on.nodes,
                depends_on_macros: self.depends_on.macros,
                raw_code: self.raw_code,
                version: version_string(self.version),
                latest_version: version_string(self.latest_version),
                database: self.database,
                schema: self.schema,
                alias: self.alias,
            }),
            ResourceType::Seed => NodeEntry::Seed(Seed {
                unique_id: self.unique_id,
                name: self.name,
                package_name: self.package_name,
                original_file_path,
                description: self.description,
                tags,
                meta: self.meta,
                config_meta: self.config.meta,
                columns: columns(self.columns),
            }),
            ResourceType::Snapshot => NodeEntry::Snapshot(Snapshot {
                unique_id: self.unique_id,
                name: self.name,
                package_name: self.package_name,
                original_file_path,
                description: self.description,
                tags,
                meta: self.meta,
                config_meta: self.config.meta,
                columns: columns(self.columns),
                depends_on: self.depends_on.nodes,
            }),
            ResourceType::Test => NodeEntry::Test(Test {
                unique_id: self.unique_id,
                name: self.name,
                package_name: self.package_name,
                original_file_path,
                description: self.description,
                tags,
                meta: self.meta,
                config_meta: self.config.meta,
                test_metadata: self.test_metadata.map(|t| TestMetadata {
                    name: t.name,
                    namespace: t.namespace,
                    kwargs: t.kwargs,
                }),
                attached_node: self.attached_node,
                column_name: self.column_name,
                depends_on: self.depends_on.nodes,
            }),
            ResourceType::Other => NodeEntry::Other,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct RawThreshold {
    #[serde(default)]
    pub count: Option<i64>,
    #[serde(default)]
    pub period: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct RawFreshness {
    #[serde(default)]
    pub warn_after: Option<RawThreshold>,
    #[serde(default)]
    pub error_after: Option<RawThreshold>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct RawSourceConfig {
    #[serde(default, deserialize_with = "null_default")]
    pub meta: Meta,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawSource {
    pub unique_id: String,
    pub name: String,
    pub source_name: String,
    pub package_name: String,
    pub original_file_path: String,
    #[serde(default, deserialize_with = "null_default")]
    pub description: String,
    #[serde(default, deserialize_with = "null_default")]
    pub source_description: String,
    #[serde(default, deserialize_with = "null_default")]
    pub loader: String,
    #[serde(default)]
    pub freshness: Option<RawFreshness>,
    #[serde(default)]
    pub loaded_at_field: Option<String>,
    #[serde(default, deserialize_with = "null_default")]
    pub tags: Vec<String>,
    #[serde(default, deserialize_with = "null_default")]
    pub meta: Meta,
    #[serde(default, deserialize_with = "null_default")]
    pub config: RawSourceConfig,
    #[serde(default, deserialize_with = "null_default")]
    pub columns: BTreeMap<String, RawColumn>,
    #[serde(default)]
    pub database: Option<String>,
    #[serde(default)]
    pub schema: Option<String>,
    #[serde(default)]
    pub identifier: Option<String>,
}

fn threshold(raw: Option<RawThreshold>) -> Option<FreshnessThreshold> {
    raw.map(|t| FreshnessThreshold {
        count: t.count,
        period: t.period,
    })
}

impl From<RawSource> for Source {
    fn from(raw: RawSource) -> Self {
        Self {
            original_file_path: clean_path(&raw.original_file_path),
            unique_id: raw.unique_id,
            name: raw.name,
            source_name: raw.source_name,
            package_name: raw.package_name,
            description: raw.description,
            source_description: raw.source_description,
            loader: raw.loader,
            freshness: raw.freshness.map(|f| Freshness {
                warn_after: threshold(f.warn_after),
                error_after: threshold(f.error_after),
            }),
            loaded_at_field: raw.loaded_at_field,
            tags: raw.tags,
            meta: raw.meta,
            config_meta: raw.config.meta,
            columns: columns(raw.columns),
            database: raw.database,
            schema: raw.schema,
            identifier: raw.identifier,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawMacroArgument {
    pub name: String,
    #[serde(default, rename = "type")]
    pub data_type: Option<String>,
    #[serde(default, deserialize_with = "null_default")]
    pub description: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawMacro {
    pub unique_id: String,
    pub name: String,
    pub package_name: String,
    pub original_file_path: String,
    #[serde(default, deserialize_with = "null_default")]
    pub description: String,
    #[serde(default, deserialize_with = "null_default")]
    pub macro_sql: String,
    #[serde(default, deserialize_with = "null_default")]
    pub arguments: Vec<RawMacroArgument>,
    #[serde(default, deserialize_with = "null_default")]
    pub meta: Meta,
}

impl From<RawMacro> for Macro {
    fn from(raw: RawMacro) -> Self {
        Self {
            original_file_path: clean_path(&raw.original_file_path),
            unique_id: raw.unique_id,
            name: raw.name,
            package_name: raw.package_name,
            description: raw.description,
            macro_sql: raw.macro_sql,
            arguments: raw
                .arguments
                .into_iter()
                .map(|a| MacroArgument {
                    name: a.name,
                    description: a.description,
                    data_type: a.data_type,
                })
                .collect(),
            meta: raw.meta,
        }
    }
}

/// Exposure owner before manifest v12
#[derive(Debug, Default, Deserialize)]
pub(crate) struct LegacyOwner {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

impl From<LegacyOwner> for ExposureOwner {
    fn from(owner: LegacyOwner) -> Self {
        Self {
            name: owner.name,
            email: owner.email.into_iter().collect(),
        }
    }
}

/// Exposure owner from manifest v12: `email` may be a list
#[derive(Debug, Default, Deserialize)]
pub(crate) struct CurrentOwner {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<StringOrList>,
}

impl From<CurrentOwner> for ExposureOwner {
    fn from(owner: CurrentOwner) -> Self {
        Self {
            name: owner.name,
            email: owner.email.map(StringOrList::into_vec).unwrap_or_default(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawExposure<O> {
    pub unique_id: String,
    pub name: String,
    pub package_name: String,
    pub original_file_path: String,
    #[serde(default, deserialize_with = "null_default")]
    pub description: String,
    #[serde(rename = "type", default)]
    pub exposure_type: String,
    #[serde(default)]
    pub maturity: Option<String>,
    pub owner: O,
    #[serde(default, deserialize_with = "null_default")]
    pub depends_on: RawDependsOn,
    #[serde(default, deserialize_with = "null_default")]
    pub tags: Vec<String>,
    #[serde(default, deserialize_with = "null_default")]
    pub meta: Meta,
}

impl<O: Into<ExposureOwner>> From<RawExposure<O>> for Exposure {
    fn from(raw: RawExposure<O>) -> Self {
        Self {
            original_file_path: clean_path(&raw.original_file_path),
            unique_id: raw.unique_id,
            name: raw.name,
            package_name: raw.package_name,
            description: raw.description,
            exposure_type: raw.exposure_type,
            maturity: raw.maturity,
            owner: raw.owner.into(),
            depends_on: raw.depends_on.nodes,
            tags: raw.tags,
            meta: raw.meta,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct RawSemanticModelConfig {
    #[serde(default, deserialize_with = "null_default")]
    pub meta: Meta,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawSemanticModel {
    pub unique_id: String,
    pub name: String,
    pub package_name: String,
    pub original_file_path: String,
    #[serde(default, deserialize_with = "null_default")]
    pub description: String,
    #[serde(default, deserialize_with = "null_default")]
    pub depends_on: RawDependsOn,
    #[serde(default, deserialize_with = "null_default")]
    pub config: RawSemanticModelConfig,
}

impl From<RawSemanticModel> for SemanticModel {
    fn from(raw: RawSemanticModel) -> Self {
        Self {
            original_file_path: clean_path(&raw.original_file_path),
            unique_id: raw.unique_id,
            name: raw.name,
            package_name: raw.package_name,
            description: raw.description,
            depends_on: raw.depends_on.nodes,
            meta: raw.config.meta,
        }
    }
}

fn default_fixture_format() -> String {
    "dict".to_string()
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawUnitTestInput {
    #[serde(default)]
    pub input: String,
    #[serde(default = "default_fixture_format")]
    pub format: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawUnitTestExpect {
    #[serde(default = "default_fixture_format")]
    pub format: String,
}

impl Default for RawUnitTestExpect {
    fn default() -> Self {
        Self {
            format: default_fixture_format(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct RawUnitTestConfig {
    #[serde(default, deserialize_with = "null_default")]
    pub tags: StringOrList,
    #[serde(default, deserialize_with = "null_default")]
    pub meta: Meta,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawUnitTest {
    pub unique_id: String,
    pub name: String,
    pub package_name: String,
    pub original_file_path: String,
    pub model: String,
    #[serde(default, deserialize_with = "null_default")]
    pub description: String,
    #[serde(default, deserialize_with = "null_default")]
    pub given: Vec<RawUnitTestInput>,
    #[serde(default)]
    pub expect: RawUnitTestExpect,
    #[serde(default, deserialize_with = "null_default")]
    pub depends_on: RawDependsOn,
    #[serde(default, deserialize_with = "null_default")]
    pub config: RawUnitTestConfig,
}

impl From<RawUnitTest> for UnitTest {
    fn from(raw: RawUnitTest) -> Self {
        Self {
            original_file_path: clean_path(&raw.original_file_path),
            unique_id: raw.unique_id,
            name: raw.name,
            package_name: raw.package_name,
            description: raw.description,
            model: raw.model,
            given: raw
                .given
                .into_iter()
                .map(|g| UnitTestFixture {
                    input: g.input,
                    format: g.format,
                })
                .collect(),
            expect: UnitTestFixture {
                input: String::new(),
                format: raw.expect.format,
            },
            depends_on: raw.depends_on.nodes,
            tags: raw.config.tags.into_vec(),
            meta: raw.config.meta,
        }
    }
}

//! dbt manifest.json parsing
//!
//! Detects the schema generation, enforces the minimum dbt version, and
//! normalizes every supported generation into one [`Manifest`].

use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use crate::error::{ArtifactError, ArtifactKind, Result};
use crate::raw::manifest::{CurrentManifest, LegacyManifest, NodeEntry, RawManifest, RawMetadata};
use crate::schema::{check_dbt_version, ManifestSchema, SchemaVersion, MIN_DBT_VERSION};
use crate::resources::{
    Exposure, ExposureOwner, Macro, Model, Resource, ResourceKind, SemanticModel, Seed, Snapshot,
    Source, Test, UnitTest,
};

/// Manifest metadata
#[derive(Debug, Clone, PartialEq)]
pub struct ManifestMetadata {
    pub schema: ManifestSchema,
    pub dbt_schema_version: String,
    pub dbt_version: String,
    pub project_name: Option<String>,
    pub project_id: Option<String>,
    pub adapter_type: Option<String>,
    pub generated_at: Option<String>,
    pub invocation_id: Option<String>,
}

/// Normalized manifest. Every resource vector is sorted by unique_id.
#[derive(Debug, Clone)]
pub struct Manifest {
    pub metadata: ManifestMetadata,
    pub models: Vec<Model>,
    pub sources: Vec<Source>,
    pub macros: Vec<Macro>,
    pub seeds: Vec<Seed>,
    pub snapshots: Vec<Snapshot>,
    pub tests: Vec<Test>,
    pub exposures: Vec<Exposure>,
    pub semantic_models: Vec<SemanticModel>,
    /// Always empty for manifests before v12
    pub unit_tests: Vec<UnitTest>,
    /// node -> direct parents
    pub parent_map: BTreeMap<String, Vec<String>>,
    /// node -> direct children
    pub child_map: BTreeMap<String, Vec<String>>,
    by_unique_id: HashMap<String, (ResourceKind, usize)>,
}

impl Manifest {
    /// Load manifest from file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| ArtifactError::Io {
            artifact: ArtifactKind::Manifest,
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        Self::from_str(&contents)
    }

    /// Parse manifest from JSON string
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(json: &str) -> Result<Self> {
        let document: Value = serde_json::from_str(json)
            .map_err(|e| ArtifactError::malformed(ArtifactKind::Manifest, e))?;

        Self::from_value(document)
    }

    /// Normalize an already parsed document
    pub fn from_value(document: Value) -> Result<Self> {
        let schema = ManifestSchema::detect(&document)?;

        if let Some(raw) = document.pointer("/metadata/dbt_version").and_then(Value::as_str) {
            check_dbt_version(raw, &MIN_DBT_VERSION)?;
        }

        let malformed = |e: serde_json::Error| ArtifactError::malformed(ArtifactKind::Manifest, e);

        let manifest = if schema.is_legacy() {
            let raw: LegacyManifest = serde_json::from_value(document).map_err(malformed)?;
            Self::normalize(schema, raw, Vec::new())
        } else {
            let raw: CurrentManifest = serde_json::from_value(document).map_err(malformed)?;
            let unit_tests = raw.unit_tests.into_values().map(UnitTest::from).collect();
            Self::normalize(schema, raw.base, unit_tests)
        };

        tracing::debug!(
            schema = ?manifest.metadata.schema,
            dbt_version = %manifest.metadata.dbt_version,
            models = manifest.models.len(),
            sources = manifest.sources.len(),
            "Parsed manifest"
        );

        Ok(manifest)
    }

    fn normalize<O>(schema: ManifestSchema, raw: RawManifest<O>, unit_tests: Vec<UnitTest>) -> Self
    where
        O: Into<ExposureOwner>,
    {
        let mut models = Vec::new();
        let mut seeds = Vec::new();
        let mut snapshots = Vec::new();
        let mut tests = Vec::new();

        for node in raw.nodes.into_values() {
            match node.normalize() {
                NodeEntry::Model(m) => models.push(m),
                NodeEntry::Seed(s) => seeds.push(s),
                NodeEntry::Snapshot(s) => snapshots.push(s),
                NodeEntry::Test(t) => tests.push(t),
                NodeEntry::Other => {}
            }
        }

        let RawMetadata {
            dbt_schema_version,
            dbt_version,
            project_name,
            project_id,
            adapter_type,
            generated_at,
            invocation_id,
        } = raw.metadata;

        let mut manifest = Self {
            metadata: ManifestMetadata {
                schema,
                dbt_schema_version,
                dbt_version,
                project_name,
                project_id,
                adapter_type,
                generated_at,
                invocation_id,
            },
            models,
            sources: raw.sources.into_values().map(Source::from).collect(),
            macros: raw.macros.into_values().map(Macro::from).collect(),
            seeds,
            snapshots,
            tests,
            exposures: raw.exposures.into_values().map(Exposure::from).collect(),
            semantic_models: raw.semantic_models.into_values().map(SemanticModel::from).collect(),
            unit_tests,
            parent_map: BTreeMap::new(),
            child_map: BTreeMap::new(),
            by_unique_id: HashMap::new(),
        };

        match (raw.parent_map, raw.child_map) {
            (Some(parents), Some(children)) => {
                manifest.parent_map = parents;
                manifest.child_map = children;
            }
            _ => manifest.derive_lineage(),
        }

        manifest.sort();
        manifest.reindex();
        manifest
    }

    /// Build parent/child maps from `depends_on.nodes`
    fn derive_lineage(&mut self) {
        let mut parents: BTreeMap<String, Vec<String>> = BTreeMap::new();

        {
            let mut add = |id: &str, deps: &[String]| {
                parents.insert(id.to_string(), deps.to_vec());
            };
            for m in &self.models {
                add(&m.unique_id, &m.depends_on);
            }
            for s in &self.snapshots {
                add(&s.unique_id, &s.depends_on);
            }
            for t in &self.tests {
                add(&t.unique_id, &t.depends_on);
            }
            for e in &self.exposures {
                add(&e.unique_id, &e.depends_on);
            }
            for s in &self.semantic_models {
                add(&s.unique_id, &s.depends_on);
            }
            for s in &self.seeds {
                add(&s.unique_id, &[]);
            }
            for s in &self.sources {
                add(&s.unique_id, &[]);
            }
        }

        let mut children: BTreeMap<String, Vec<String>> =
            parents.keys().map(|id| (id.clone(), Vec::new())).collect();
        for (child, deps) in &parents {
            for parent in deps {
                children.entry(parent.clone()).or_default().push(child.clone());
            }
        }
        for list in children.values_mut() {
            list.sort();
            list.dedup();
        }

        self.parent_map = parents;
        self.child_map = children;
    }

    fn sort(&mut self) {
        self.models.sort_by(|a, b| a.unique_id.cmp(&b.unique_id));
        self.sources.sort_by(|a, b| a.unique_id.cmp(&b.unique_id));
        self.macros.sort_by(|a, b| a.unique_id.cmp(&b.unique_id));
        self.seeds.sort_by(|a, b| a.unique_id.cmp(&b.unique_id));
        self.snapshots.sort_by(|a, b| a.unique_id.cmp(&b.unique_id));
        self.tests.sort_by(|a, b| a.unique_id.cmp(&b.unique_id));
        self.exposures.sort_by(|a, b| a.unique_id.cmp(&b.unique_id));
        self.semantic_models.sort_by(|a, b| a.unique_id.cmp(&b.unique_id));
        self.unit_tests.sort_by(|a, b| a.unique_id.cmp(&b.unique_id));
    }

    fn reindex(&mut self) {
        let mut index = HashMap::new();
        let mut put = |kind: ResourceKind, ids: Vec<&String>| {
            for (position, id) in ids.into_iter().enumerate() {
                index.insert(id.clone(), (kind, position));
            }
        };

        put(ResourceKind::Model, self.models.iter().map(|r| &r.unique_id).collect());
        put(ResourceKind::Source, self.sources.iter().map(|r| &r.unique_id).collect());
        put(ResourceKind::Macro, self.macros.iter().map(|r| &r.unique_id).collect());
        put(ResourceKind::Seed, self.seeds.iter().map(|r| &r.unique_id).collect());
        put(ResourceKind::Snapshot, self.snapshots.iter().map(|r| &r.unique_id).collect());
        put(ResourceKind::Test, self.tests.iter().map(|r| &r.unique_id).collect());
        put(ResourceKind::Exposure, self.exposures.iter().map(|r| &r.unique_id).collect());
        put(
            ResourceKind::SemanticModel,
            self.semantic_models.iter().map(|r| &r.unique_id).collect(),
        );
        put(ResourceKind::UnitTest, self.unit_tests.iter().map(|r| &r.unique_id).collect());

        self.by_unique_id = index;
    }

    /// Keep only resources that belong to `package`.
    ///
    /// `parent_map` and `child_map` are left whole so lineage into other
    /// packages stays visible.
    pub fn retain_package(&mut self, package: &str) {
        self.models.retain(|r| r.package_name == package);
        self.sources.retain(|r| r.package_name == package);
        self.macros.retain(|r| r.package_name == package);
        self.seeds.retain(|r| r.package_name == package);
        self.snapshots.retain(|r| r.package_name == package);
        self.tests.retain(|r| r.package_name == package);
        self.exposures.retain(|r| r.package_name == package);
        self.semantic_models.retain(|r| r.package_name == package);
        self.unit_tests.retain(|r| r.package_name == package);
        self.reindex();
    }

    /// Project name recorded by dbt, if any
    pub fn project_name(&self) -> Option<&str> {
        self.metadata.project_name.as_deref()
    }

    /// Look up any manifest resource
    pub fn resource(&self, unique_id: &str) -> Option<Resource<'_>> {
        let &(kind, i) = self.by_unique_id.get(unique_id)?;
        let resource = match kind {
            ResourceKind::Model => Resource::Model(&self.models[i]),
            ResourceKind::Source => Resource::Source(&self.sources[i]),
            ResourceKind::Macro => Resource::Macro(&self.macros[i]),
            ResourceKind::Seed => Resource::Seed(&self.seeds[i]),
            ResourceKind::Snapshot => Resource::Snapshot(&self.snapshots[i]),
            ResourceKind::Test => Resource::Test(&self.tests[i]),
            ResourceKind::Exposure => Resource::Exposure(&self.exposures[i]),
            ResourceKind::SemanticModel => Resource::SemanticModel(&self.semantic_models[i]),
            ResourceKind::UnitTest => Resource::UnitTest(&self.unit_tests[i]),
            ResourceKind::RunResult | ResourceKind::CatalogNode | ResourceKind::CatalogSource => {
                return None
            }
        };
        Some(resource)
    }

    pub fn model(&self, unique_id: &str) -> Option<&Model> {
        match self.resource(unique_id)? {
            Resource::Model(m) => Some(m),
            _ => None,
        }
    }

    pub fn source(&self, unique_id: &str) -> Option<&Source> {
        match self.resource(unique_id)? {
            Resource::Source(s) => Some(s),
            _ => None,
        }
    }

    /// Path of a manifest resource, used to annotate catalog and run results
    pub fn original_file_path(&self, unique_id: &str) -> Option<&str> {
        self.resource(unique_id).map(|r| r.original_file_path())
    }

    /// Generic and singular tests attached to `unique_id`
    pub fn tests_for<'a>(&'a self, unique_id: &'a str) -> impl Iterator<Item = &'a Test> + 'a {
        self.tests.iter().filter(move |t| {
            t.attached_node.as_deref() == Some(unique_id) || t.depends_on.iter().any(|d| d == unique_id)
        })
    }

    /// Unit tests whose model under test is `model`
    pub fn unit_tests_for<'a>(&'a self, model: &'a Model) -> impl Iterator<Item = &'a UnitTest> + 'a {
        self.unit_tests.iter().filter(move |t| {
            t.model == model.name || t.depends_on.iter().any(|d| d == &model.unique_id)
        })
    }
}

/// Package segment of a unique_id (`model.<package>.name`)
pub fn package_of(unique_id: &str) -> Option<&str> {
    unique_id.split('.').nth(1)
}

//! dbt catalog.json parsing
//!
//! The catalog describes what actually exists in the warehouse. Entries are
//! keyed by the same unique_id as the manifest.

use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use crate::error::{ArtifactError, ArtifactKind, Result};
use crate::manifest::{package_of, Manifest};
use crate::raw::catalog::{RawCatalog, RawCatalogTable};
use crate::resources::{CatalogColumn, CatalogNode};
use crate::schema::{CatalogSchema, SchemaVersion};

#[derive(Debug, Clone, PartialEq)]
pub struct CatalogMetadata {
    pub schema: CatalogSchema,
    pub dbt_version: Option<String>,
    pub generated_at: Option<String>,
}

/// Normalized catalog
#[derive(Debug, Clone)]
pub struct Catalog {
    pub metadata: CatalogMetadata,
    /// Models, seeds and snapshots, sorted by unique_id
    pub nodes: Vec<CatalogNode>,
    /// Sources, sorted by unique_id
    pub sources: Vec<CatalogNode>,
}

impl Catalog {
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| ArtifactError::Io {
            artifact: ArtifactKind::Catalog,
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        Self::from_str(&contents)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(json: &str) -> Result<Self> {
        let document: Value = serde_json::from_str(json)
            .map_err(|e| ArtifactError::malformed(ArtifactKind::Catalog, e))?;

        Self::from_value(document)
    }

    pub fn from_value(document: Value) -> Result<Self> {
        let schema = CatalogSchema::detect(&document)?;
        let raw: RawCatalog = serde_json::from_value(document)
            .map_err(|e| ArtifactError::malformed(ArtifactKind::Catalog, e))?;

        Ok(Self {
            metadata: CatalogMetadata {
                schema,
                dbt_version: raw.metadata.dbt_version,
                generated_at: raw.metadata.generated_at,
            },
            nodes: tables(raw.nodes),
            sources: tables(raw.sources),
        })
    }

    /// Copy `original_file_path` over from the manifest resources
    pub fn link(&mut self, manifest: &Manifest) {
        for node in self.nodes.iter_mut().chain(self.sources.iter_mut()) {
            if let Some(path) = manifest.original_file_path(&node.unique_id) {
                node.original_file_path = path.to_string();
            }
        }
    }

    /// Keep only entries whose unique_id belongs to `package`
    pub fn retain_package(&mut self, package: &str) {
        self.nodes.retain(|n| package_of(&n.unique_id) == Some(package));
        self.sources.retain(|n| package_of(&n.unique_id) == Some(package));
    }

    pub fn node(&self, unique_id: &str) -> Option<&CatalogNode> {
        find(&self.nodes, unique_id)
    }

    pub fn source(&self, unique_id: &str) -> Option<&CatalogNode> {
        find(&self.sources, unique_id)
    }
}

fn find<'a>(entries: &'a [CatalogNode], unique_id: &str) -> Option<&'a CatalogNode> {
    entries
        .binary_search_by(|n| n.unique_id.as_str().cmp(unique_id))
        .ok()
        .map(|i| &entries[i])
}

fn tables(raw: BTreeMap<String, RawCatalogTable>) -> Vec<CatalogNode> {
    let mut nodes: Vec<CatalogNode> = raw
        .into_iter()
        .map(|(key, table)| CatalogNode {
            unique_id: table.unique_id.unwrap_or(key),
            original_file_path: String::new(),
            relation_type: table.metadata.relation_type,
            database: table.metadata.database,
            schema: table.metadata.schema,
            name: table.metadata.name,
            columns: table
                .columns
                .into_iter()
                .map(|(key, c)| {
                    (key, CatalogColumn {
                        name: c.name,
                        data_type: c.data_type,
                        index: c.index,
                        comment: c.comment,
                    })
                })
                .collect(),
        })
        .collect();

    nodes.sort_by(|a, b| a.unique_id.cmp(&b.unique_id));
    nodes
}

//! Dependency graph (DAG) traversal
//!
//! A borrowed view over the manifest's parent and child maps, used by the
//! lineage checks.

use std::collections::BTreeMap;
use crate::manifest::Manifest;

/// Node identifier (unique_id from manifest)
pub type NodeId = String;

/// Dependency graph with forward and reverse edges
#[derive(Debug, Clone, Copy)]
pub struct DependencyGraph<'a> {
    /// node -> nodes it depends on
    parents: &'a BTreeMap<NodeId, Vec<NodeId>>,

    /// node -> nodes that depend on it
    children: &'a BTreeMap<NodeId, Vec<NodeId>>,
}

impl<'a> DependencyGraph<'a> {
    pub fn from_manifest(manifest: &'a Manifest) -> Self {
        Self {
            parents: &manifest.parent_map,
            children: &manifest.child_map,
        }
    }

    /// Immediate parents (dependencies) of a node
    pub fn parents(&self, node_id: &str) -> &'a [NodeId] {
        self.parents.get(node_id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Immediate children (dependents) of a node
    pub fn children(&self, node_id: &str) -> &'a [NodeId] {
        self.children.get(node_id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Direct parents whose unique_id starts with `<prefix>.` (`model`, `source`, `seed`, ...)
    pub fn parents_of_type(&self, node_id: &str, prefix: &str) -> Vec<&'a str> {
        Self::of_type(self.parents(node_id), prefix)
    }

    /// Direct children whose unique_id starts with `<prefix>.`
    pub fn children_of_type(&self, node_id: &str, prefix: &str) -> Vec<&'a str> {
        Self::of_type(self.children(node_id), prefix)
    }

    fn of_type(ids: &'a [NodeId], prefix: &str) -> Vec<&'a str> {
        ids.iter()
            .map(String::as_str)
            .filter(|id| resource_type_of(id) == Some(prefix))
            .collect()
    }
}

/// Resource type segment of a unique_id (`model.<package>.name` -> `model`)
pub fn resource_type_of(unique_id: &str) -> Option<&str> {
    unique_id.split_once('.').map(|(kind, _)| kind)
}

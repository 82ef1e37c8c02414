//! dbt artifact parsing and normalization
//!
//! This crate handles:
//! - Detecting the schema version of manifest.json, catalog.json and run_results.json
//! - Parsing every supported version into one normalized, read-only model
//! - Rejecting artifacts produced by dbt versions below the supported floor
//! - Restricting resources to the project's own package
//! - Lineage lookups (direct parents and children, optionally by resource type)

pub mod error;
pub mod schema;
mod raw;
pub mod resources;
pub mod manifest;
pub mod catalog;
pub mod run_results;
pub mod dag;
pub mod loader;

pub use error::{ArtifactError, ArtifactKind, Result};
pub use schema::{CatalogSchema, ManifestSchema, RunResultsSchema, MIN_DBT_VERSION};
pub use resources::{
    clean_path, is_description_populated, Access, CatalogColumn, CatalogNode, Column, Exposure,
    ExposureOwner, Freshness, FreshnessThreshold, Macro, MacroArgument, Meta, Model, Resource,
    ResourceKind, RunResult, Seed, SemanticModel, Snapshot, Source, Test, TestMetadata, UnitTest,
    UnitTestFixture, META_NAMESPACE, SKIP_CHECKS_KEY,
};
pub use manifest::{package_of, Manifest, ManifestMetadata};
pub use catalog::Catalog;
pub use run_results::RunResults;
pub use dag::{resource_type_of, DependencyGraph, NodeId};
pub use loader::ArtifactLoader;

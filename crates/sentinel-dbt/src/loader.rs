//! Locating and loading artifacts from the dbt target directory

use std::path::{Path, PathBuf};
use sentinel_core::ConfigDocument;
use crate::catalog::Catalog;
use crate::error::{ArtifactError, ArtifactKind, Result};
use crate::manifest::Manifest;
use crate::run_results::RunResults;

/// Loads artifacts from one directory and restricts them to one package.
///
/// The package is the configured `package_name` if set, otherwise the
/// project name recorded in the manifest.
#[derive(Debug, Clone)]
pub struct ArtifactLoader {
    dir: PathBuf,
    package_name: Option<String>,
}

impl ArtifactLoader {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            package_name: None,
        }
    }

    pub fn from_config(config: &ConfigDocument) -> Self {
        Self::new(config.artifacts_dir()).with_package_name(config.package_name.clone())
    }

    pub fn with_package_name(mut self, package_name: Option<String>) -> Self {
        self.package_name = package_name;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Full path of an artifact file
    pub fn path(&self, artifact: ArtifactKind) -> PathBuf {
        self.dir.join(artifact.file_name())
    }

    fn existing_path(&self, artifact: ArtifactKind) -> Result<PathBuf> {
        let path = self.path(artifact);
        if !path.is_file() {
            return Err(ArtifactError::ArtifactNotFound { artifact, path });
        }
        Ok(path)
    }

    fn package_for<'a>(&'a self, manifest: &'a Manifest) -> Option<&'a str> {
        self.package_name.as_deref().or_else(|| manifest.project_name())
    }

    /// Load manifest.json and keep only the project's own resources
    pub fn load_manifest(&self) -> Result<Manifest> {
        let path = self.existing_path(ArtifactKind::Manifest)?;
        let mut manifest = Manifest::from_file(&path)?;

        if let Some(package) = self.package_for(&manifest).map(str::to_string) {
            manifest.retain_package(&package);
        } else {
            tracing::warn!(
                "manifest has no project_name and no package_name is configured, keeping every package"
            );
        }

        tracing::info!(
            path = %path.display(),
            dbt_version = %manifest.metadata.dbt_version,
            models = manifest.models.len(),
            sources = manifest.sources.len(),
            macros = manifest.macros.len(),
            seeds = manifest.seeds.len(),
            snapshots = manifest.snapshots.len(),
            tests = manifest.tests.len(),
            exposures = manifest.exposures.len(),
            semantic_models = manifest.semantic_models.len(),
            unit_tests = manifest.unit_tests.len(),
            "Loaded manifest"
        );

        Ok(manifest)
    }

    /// Load catalog.json, linked to `manifest` for file paths
    pub fn load_catalog(&self, manifest: &Manifest) -> Result<Catalog> {
        let path = self.existing_path(ArtifactKind::Catalog)?;
        let mut catalog = Catalog::from_file(&path)?;

        catalog.link(manifest);
        if let Some(package) = self.package_for(manifest) {
            catalog.retain_package(package);
        }

        tracing::info!(
            path = %path.display(),
            nodes = catalog.nodes.len(),
            sources = catalog.sources.len(),
            "Loaded catalog"
        );

        Ok(catalog)
    }

    /// Load run_results.json, linked to `manifest` for file paths
    pub fn load_run_results(&self, manifest: &Manifest) -> Result<RunResults> {
        let path = self.existing_path(ArtifactKind::RunResults)?;
        let mut run_results = RunResults::from_file(&path)?;

        run_results.link(manifest);
        if let Some(package) = self.package_for(manifest) {
            run_results.retain_package(package);
        }

        tracing::info!(
            path = %path.display(),
            results = run_results.results.len(),
            "Loaded run results"
        );

        Ok(run_results)
    }
}

//! Shared, read-only state handed to every check execution

use sentinel_dbt::{
    ArtifactLoader, Catalog, DependencyGraph, Manifest, RunResults, Result as ArtifactResult,
};
use crate::check::CheckError;

/// Artifacts loaded for one run
#[derive(Debug, Clone)]
pub struct Artifacts {
    pub manifest: Manifest,
    pub catalog: Option<Catalog>,
    pub run_results: Option<RunResults>,
}

/// Which optional artifacts the selected checks need
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Requirements {
    pub catalog: bool,
    pub run_results: bool,
}

impl Artifacts {
    pub fn new(manifest: Manifest) -> Self {
        Self {
            manifest,
            catalog: None,
            run_results: None,
        }
    }

    /// Load the manifest plus whichever other artifacts are required
    pub fn load(loader: &ArtifactLoader, requirements: Requirements) -> ArtifactResult<Self> {
        let manifest = loader.load_manifest()?;
        let catalog = if requirements.catalog {
            Some(loader.load_catalog(&manifest)?)
        } else {
            None
        };
        let run_results = if requirements.run_results {
            Some(loader.load_run_results(&manifest)?)
        } else {
            None
        };

        Ok(Self {
            manifest,
            catalog,
            run_results,
        })
    }

    pub fn with_catalog(mut self, catalog: Catalog) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub fn with_run_results(mut self, run_results: RunResults) -> Self {
        self.run_results = Some(run_results);
        self
    }

    pub fn context(&self) -> Context<'_> {
        Context {
            manifest: &self.manifest,
            catalog: self.catalog.as_ref(),
            run_results: self.run_results.as_ref(),
            graph: DependencyGraph::from_manifest(&self.manifest),
        }
    }
}

/// Everything a check may look at besides its own target
#[derive(Debug, Clone, Copy)]
pub struct Context<'a> {
    pub manifest: &'a Manifest,
    catalog: Option<&'a Catalog>,
    run_results: Option<&'a RunResults>,
    pub graph: DependencyGraph<'a>,
}

impl<'a> Context<'a> {
    pub fn catalog(&self) -> Result<&'a Catalog, CheckError> {
        self.catalog
            .ok_or_else(|| CheckError::execution("catalog.json was not loaded"))
    }

    pub fn run_results(&self) -> Result<&'a RunResults, CheckError> {
        self.run_results
            .ok_or_else(|| CheckError::execution("run_results.json was not loaded"))
    }
}

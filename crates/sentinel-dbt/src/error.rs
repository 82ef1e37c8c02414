//! Artifact errors
//!
//! Every variant is fatal: it is raised while loading artifacts, before any
//! check runs.

use std::path::PathBuf;

/// The three artifact files dbt writes to its target directory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    Manifest,
    Catalog,
    RunResults,
}

impl ArtifactKind {
    /// File name inside the artifacts directory
    pub fn file_name(&self) -> &'static str {
        match self {
            Self::Manifest => "manifest.json",
            Self::Catalog => "catalog.json",
            Self::RunResults => "run_results.json",
        }
    }

    /// dbt command that produces this artifact
    pub fn produced_by(&self) -> &'static str {
        match self {
            Self::Manifest => "dbt parse",
            Self::Catalog => "dbt docs generate",
            Self::RunResults => "dbt run / dbt build",
        }
    }
}

impl std::fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.file_name())
    }
}

/// Artifact loading errors
#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error("No {artifact} found at {}. Run '{}' first.", .path.display(), .artifact.produced_by())]
    ArtifactNotFound {
        artifact: ArtifactKind,
        path: PathBuf,
    },

    #[error("Failed to read {artifact} at {}: {reason}", .path.display())]
    Io {
        artifact: ArtifactKind,
        path: PathBuf,
        reason: String,
    },

    #[error("Unsupported {artifact} schema version '{version}', expected one of: {expected}")]
    UnsupportedSchemaVersion {
        artifact: ArtifactKind,
        version: String,
        expected: String,
    },

    #[error("Malformed {artifact}: {reason}")]
    MalformedArtifact {
        artifact: ArtifactKind,
        reason: String,
    },

    #[error("The supplied manifest.json was generated with dbt version {found}, this is below the minimum supported version of {minimum}.")]
    UnsupportedDbtVersion {
        found: String,
        minimum: String,
    },
}

impl ArtifactError {
    pub(crate) fn malformed(artifact: ArtifactKind, reason: impl std::fmt::Display) -> Self {
        Self::MalformedArtifact {
            artifact,
            reason: reason.to_string(),
        }
    }
}

/// Result alias for artifact operations
pub type Result<T> = std::result::Result<T, ArtifactError>;

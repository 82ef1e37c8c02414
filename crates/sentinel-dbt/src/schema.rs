//! Schema version detection
//!
//! Every artifact embeds `metadata.dbt_schema_version`, a URI naming the JSON
//! schema it conforms to. Dispatch on that URI is exhaustive: an unknown URI
//! is a hard error, never a best-effort parse.

use semver::Version;
use serde_json::Value;
use crate::error::{ArtifactError, ArtifactKind, Result};

/// Oldest dbt release whose artifacts are accepted
pub const MIN_DBT_VERSION: Version = Version::new(1, 7, 0);

const SCHEMA_BASE: &str = "https://schemas.getdbt.com/dbt";

/// Supported manifest.json schemas
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ManifestSchema {
    V10,
    V11,
    V12,
}

impl ManifestSchema {
    pub const ALL: [ManifestSchema; 3] = [Self::V10, Self::V11, Self::V12];

    pub fn uri(&self) -> String {
        let version = match self {
            Self::V10 => "v10",
            Self::V11 => "v11",
            Self::V12 => "v12",
        };
        format!("{SCHEMA_BASE}/manifest/{version}.json")
    }

    /// Manifests before v12 carry a single owner email and no unit tests
    pub fn is_legacy(&self) -> bool {
        matches!(self, Self::V10 | Self::V11)
    }
}

/// Supported run_results.json schemas
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RunResultsSchema {
    V4,
    V5,
    V6,
}

impl RunResultsSchema {
    pub const ALL: [RunResultsSchema; 3] = [Self::V4, Self::V5, Self::V6];

    pub fn uri(&self) -> String {
        let version = match self {
            Self::V4 => "v4",
            Self::V5 => "v5",
            Self::V6 => "v6",
        };
        format!("{SCHEMA_BASE}/run-results/{version}.json")
    }

    /// v4 results carry neither `compiled_code` nor `relation_name`
    pub fn is_legacy(&self) -> bool {
        matches!(self, Self::V4)
    }
}

/// Supported catalog.json schemas
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CatalogSchema {
    V1,
}

impl CatalogSchema {
    pub const ALL: [CatalogSchema; 1] = [Self::V1];

    pub fn uri(&self) -> String {
        match self {
            Self::V1 => format!("{SCHEMA_BASE}/catalog/v1.json"),
        }
    }
}

/// Implemented by each schema enum so detection is written once
pub(crate) trait SchemaVersion: Copy + Sized + 'static {
    const ARTIFACT: ArtifactKind;

    fn all() -> &'static [Self];

    fn uri(&self) -> String;

    fn detect(document: &Value) -> Result<Self> {
        let uri = schema_uri(Self::ARTIFACT, document)?;

        Self::all()
            .iter()
            .copied()
            .find(|schema| schema.uri() == uri)
            .ok_or_else(|| ArtifactError::UnsupportedSchemaVersion {
                artifact: Self::ARTIFACT,
                version: uri.to_string(),
                expected: Self::all().iter().map(Self::uri).collect::<Vec<_>>().join(", "),
            })
    }
}

impl SchemaVersion for ManifestSchema {
    const ARTIFACT: ArtifactKind = ArtifactKind::Manifest;

    fn all() -> &'static [Self] {
        &Self::ALL
    }

    fn uri(&self) -> String {
        ManifestSchema::uri(self)
    }
}

impl SchemaVersion for RunResultsSchema {
    const ARTIFACT: ArtifactKind = ArtifactKind::RunResults;

    fn all() -> &'static [Self] {
        &Self::ALL
    }

    fn uri(&self) -> String {
        RunResultsSchema::uri(self)
    }
}

impl SchemaVersion for CatalogSchema {
    const ARTIFACT: ArtifactKind = ArtifactKind::Catalog;

    fn all() -> &'static [Self] {
        &Self::ALL
    }

    fn uri(&self) -> String {
        CatalogSchema::uri(self)
    }
}

fn schema_uri(artifact: ArtifactKind, document: &Value) -> Result<&str> {
    let metadata = document
        .get("metadata")
        .ok_or_else(|| ArtifactError::malformed(artifact, "missing top-level key 'metadata'"))?;

    metadata
        .get("dbt_schema_version")
        .and_then(Value::as_str)
        .ok_or_else(|| ArtifactError::malformed(artifact, "missing 'metadata.dbt_schema_version'"))
}

/// Parse the numeric part of a dbt version string.
///
/// dbt versions carry suffixes such as `1.8.0b1` or `1.9.0-rc1`, which are
/// ignored. A missing patch component counts as 0.
pub fn parse_dbt_version(raw: &str) -> Option<Version> {
    let mut parts = raw.trim().trim_start_matches('v').splitn(3, '.');
    let major = leading_number(parts.next()?)?;
    let minor = leading_number(parts.next()?)?;
    let patch = parts.next().map_or(Some(0), leading_number)?;

    Some(Version::new(major, minor, patch))
}

fn leading_number(part: &str) -> Option<u64> {
    let end = part.find(|c: char| !c.is_ascii_digit()).unwrap_or(part.len());
    part[..end].parse().ok()
}

/// Reject artifacts produced by dbt versions below `minimum`
pub fn check_dbt_version(raw: &str, minimum: &Version) -> Result<Version> {
    let version = parse_dbt_version(raw).ok_or_else(|| {
        ArtifactError::malformed(ArtifactKind::Manifest, format!("unrecognized dbt_version '{raw}'"))
    })?;

    if &version < minimum {
        return Err(ArtifactError::UnsupportedDbtVersion {
            found: raw.to_string(),
            minimum: minimum.to_string(),
        });
    }

    Ok(version)
}

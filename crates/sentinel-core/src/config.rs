//! Configuration document (dbt-sentinel.yml / pyproject.toml)
//!
//! Loading happens in two steps. The document is first parsed into a
//! `ConfigDocument`, rejecting unknown top-level keys. `ConfigDocument::resolve`
//! then turns every list entry into `CheckSettings`, applying global
//! defaults, compiling patterns, and assigning per-name indexes. Every problem
//! found along the way is collected so the user sees all of them at once.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use crate::pattern::Pattern;
use crate::result::Severity;

/// Default config file name looked up in the working directory
pub const CONFIG_FILE_NAME: &str = "dbt-sentinel.yml";

/// Table holding the config inside pyproject.toml (`[tool.dbt-sentinel]`)
pub const PYPROJECT_SECTION: &str = "dbt-sentinel";

/// Default artifacts directory, relative to the config file
pub const DEFAULT_ARTIFACTS_DIR: &str = "./target";

/// Keys shared by every check; everything else is a kind-specific parameter
const COMMON_KEYS: [&str; 6] = ["name", "severity", "include", "exclude", "materialization", "description"];

/// Which artifact a group of checks runs against
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CheckCategory {
    #[serde(rename = "catalog_checks")]
    Catalog,
    #[serde(rename = "manifest_checks")]
    Manifest,
    #[serde(rename = "run_results_checks")]
    RunResults,
}

impl CheckCategory {
    pub const ALL: [CheckCategory; 3] = [Self::Catalog, Self::Manifest, Self::RunResults];

    /// Config key of this category
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Catalog => "catalog_checks",
            Self::Manifest => "manifest_checks",
            Self::RunResults => "run_results_checks",
        }
    }
}

impl std::fmt::Display for CheckCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CheckCategory {
    type Err = String;

    /// Accepts `manifest_checks` as well as the short form `manifest`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == s || c.as_str().trim_end_matches("_checks") == s)
            .ok_or_else(|| {
                format!("Unknown check category '{s}', expected one of catalog_checks, manifest_checks, run_results_checks")
            })
    }
}

/// Physical strategy of a model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Materialization {
    Ephemeral,
    Incremental,
    Table,
    View,
}

impl Materialization {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ephemeral => "ephemeral",
            Self::Incremental => "incremental",
            Self::Table => "table",
            Self::View => "view",
        }
    }
}

impl std::fmt::Display for Materialization {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A check name known to the caller, with the category it belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KnownCheck<'a> {
    pub name: &'a str,
    pub category: CheckCategory,
}

/// Settings shared by every check definition, after defaults are applied
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckSettings {
    /// Check kind
    pub name: String,

    /// 0-based, unique among definitions sharing `name`
    pub index: usize,

    /// Category the definition was listed under
    pub category: CheckCategory,

    /// Local value, else the global default, else `error`
    pub severity: Severity,

    /// Paths to include (prefix match)
    pub include: Option<Pattern>,

    /// Paths to exclude (prefix match), takes precedence over `include`
    pub exclude: Option<Pattern>,

    /// Only applies to model resources
    pub materialization: Option<Materialization>,

    /// Free-text description of why the check exists
    pub description: Option<String>,
}

/// Raw configuration document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigDocument {
    /// Checks run against catalog.json
    #[serde(default)]
    pub catalog_checks: Vec<Value>,

    /// Checks run against manifest.json
    #[serde(default)]
    pub manifest_checks: Vec<Value>,

    /// Checks run against run_results.json
    #[serde(default)]
    pub run_results_checks: Vec<Value>,

    /// Default severity for every check
    #[serde(default)]
    pub severity: Option<Severity>,

    /// Default include pattern for every check
    #[serde(default)]
    pub include: Option<String>,

    /// Default exclude pattern for every check
    #[serde(default)]
    pub exclude: Option<String>,

    /// Directory holding the artifacts, relative to the config file
    #[serde(default, alias = "artifacts_dir")]
    pub dbt_artifacts_dir: Option<PathBuf>,

    /// Package whose resources are checked (defaults to the project name)
    #[serde(default)]
    pub package_name: Option<String>,

    /// Directory of the config file, used to resolve relative paths
    #[serde(skip)]
    pub base_dir: PathBuf,
}

impl ConfigDocument {
    /// Load a config file, picking the parser from its name
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(path.display().to_string(), e.to_string()))?;

        let file_name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
        let extension = path.extension().and_then(|e| e.to_str()).unwrap_or_default();

        let mut document = match extension {
            "yml" | "yaml" => Self::from_yaml(&contents)?,
            "toml" if file_name == "pyproject.toml" => Self::from_pyproject(&contents)?,
            "toml" => Self::from_toml(&contents)?,
            _ => return Err(ConfigError::UnsupportedFormat(path.display().to_string())),
        };

        if let Some(parent) = path.parent() {
            document.base_dir = parent.to_path_buf();
        }

        tracing::debug!(
            path = %path.display(),
            checks = document.entry_count(),
            "Loaded configuration"
        );

        Ok(document)
    }

    /// Parse a YAML document
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let value: Value = serde_yaml::from_str(yaml)
            .map_err(|e| ConfigError::ParseError(e.to_string()))?;
        Self::from_value(value)
    }

    /// Parse a standalone TOML document
    pub fn from_toml(toml: &str) -> Result<Self, ConfigError> {
        let value: toml::Value = toml::from_str(toml)
            .map_err(|e| ConfigError::ParseError(e.to_string()))?;
        Self::from_value(toml_to_json(value)?)
    }

    /// Parse the `[tool.dbt-sentinel]` table of a pyproject.toml
    pub fn from_pyproject(toml: &str) -> Result<Self, ConfigError> {
        let value = pyproject_section(toml)?
            .ok_or(ConfigError::MissingSection(PYPROJECT_SECTION))?;
        Self::from_value(toml_to_json(value)?)
    }

    fn from_value(value: Value) -> Result<Self, ConfigError> {
        match value {
            // An empty file configures nothing
            Value::Null => Ok(Self::default()),
            value => serde_json::from_value(value)
                .map_err(|e| ConfigError::ParseError(e.to_string())),
        }
    }

    /// Find the config file to use when none was given explicitly.
    ///
    /// `dbt-sentinel.yml` in `start` wins; otherwise the nearest
    /// pyproject.toml (in `start` or a parent) with a `[tool.dbt-sentinel]` table.
    pub fn discover(start: &Path) -> Result<PathBuf, ConfigError> {
        let candidate = start.join(CONFIG_FILE_NAME);
        if candidate.is_file() {
            return Ok(candidate);
        }

        for dir in start.ancestors() {
            let pyproject = dir.join("pyproject.toml");
            if !pyproject.is_file() {
                continue;
            }

            let contents = std::fs::read_to_string(&pyproject)
                .map_err(|e| ConfigError::IoError(pyproject.display().to_string(), e.to_string()))?;
            if pyproject_section(&contents)?.is_some() {
                return Ok(pyproject);
            }
            tracing::debug!(path = %pyproject.display(), "pyproject.toml has no [tool.{}] table", PYPROJECT_SECTION);
        }

        Err(ConfigError::NotFound(start.display().to_string()))
    }

    /// Absolute (or cwd-relative) directory holding the artifacts
    pub fn artifacts_dir(&self) -> PathBuf {
        let dir = self
            .dbt_artifacts_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_ARTIFACTS_DIR));
        self.base_dir.join(dir)
    }

    /// Entries listed under one category
    pub fn entries(&self, category: CheckCategory) -> &[Value] {
        match category {
            CheckCategory::Catalog => &self.catalog_checks,
            CheckCategory::Manifest => &self.manifest_checks,
            CheckCategory::RunResults => &self.run_results_checks,
        }
    }

    /// Total number of configured checks
    pub fn entry_count(&self) -> usize {
        CheckCategory::ALL.iter().map(|c| self.entries(*c).len()).sum()
    }

    /// Validate and resolve every entry.
    ///
    /// `build` receives the resolved settings and the remaining kind-specific
    /// parameters, and returns the caller's definition type or a reason the
    /// parameters are invalid. Nothing is returned unless every entry is valid.
    pub fn resolve<T, F>(&self, known: &[KnownCheck<'_>], mut build: F) -> Result<Vec<T>, ConfigError>
    where
        F: FnMut(&CheckSettings, Map<String, Value>) -> Result<T, String>,
    {
        let defaults = Defaults::compile(self);
        let mut issues = defaults.issues.clone();
        let mut indexes: HashMap<String, usize> = HashMap::new();
        let mut definitions = Vec::new();

        for category in CheckCategory::ALL {
            for (position, entry) in self.entries(category).iter().enumerate() {
                let resolved = resolve_entry(category, position, entry, known, &defaults)
                    .and_then(|(mut settings, params)| {
                        let counter = indexes.entry(settings.name.clone()).or_insert(0);
                        settings.index = *counter;
                        *counter += 1;

                        build(&settings, params).map_err(|reason| {
                            vec![ConfigIssue::InvalidParameters {
                                name: settings.name.clone(),
                                reason,
                            }]
                        })
                    });

                match resolved {
                    Ok(definition) => definitions.push(definition),
                    Err(mut entry_issues) => issues.append(&mut entry_issues),
                }
            }
        }

        if issues.is_empty() {
            Ok(definitions)
        } else {
            Err(ConfigError::Validation(issues))
        }
    }
}

/// Global defaults, with patterns compiled once
#[derive(Debug, Default)]
struct Defaults {
    severity: Option<Severity>,
    include: Option<Pattern>,
    exclude: Option<Pattern>,
    issues: Vec<ConfigIssue>,
}

impl Defaults {
    fn compile(document: &ConfigDocument) -> Self {
        let mut defaults = Self {
            severity: document.severity,
            ..Self::default()
        };

        let mut compile = |field: &'static str, source: &Option<String>| {
            source.as_deref().and_then(|s| match Pattern::new(s) {
                Ok(pattern) => Some(pattern),
                Err(e) => {
                    defaults.issues.push(ConfigIssue::InvalidGlobal {
                        field,
                        reason: e.to_string(),
                    });
                    None
                }
            })
        };

        let include = compile("include", &document.include);
        let exclude = compile("exclude", &document.exclude);
        defaults.include = include;
        defaults.exclude = exclude;
        defaults
    }
}

fn resolve_entry(
    category: CheckCategory,
    position: usize,
    entry: &Value,
    known: &[KnownCheck<'_>],
    defaults: &Defaults,
) -> Result<(CheckSettings, Map<String, Value>), Vec<ConfigIssue>> {
    let Value::Object(map) = entry else {
        return Err(vec![ConfigIssue::NotAMapping { category, entry: position + 1 }]);
    };

    let name = match map.get("name") {
        Some(Value::String(name)) => name.clone(),
        _ => return Err(vec![ConfigIssue::MissingName { category, entry: position + 1 }]),
    };

    match known.iter().find(|k| k.name == name) {
        None => return Err(vec![ConfigIssue::UnknownCheck {
            suggestion: suggest(&name, known),
            name,
        }]),
        Some(k) if k.category != category => return Err(vec![ConfigIssue::WrongCategory {
            name,
            expected: k.category,
            found: category,
        }]),
        Some(_) => {}
    }

    let mut issues = Vec::new();
    let field = |key: &'static str| -> Option<Value> {
        map.get(key).filter(|v| !v.is_null()).cloned()
    };

    let mut typed = |key: &'static str, value: Option<Value>| -> Option<Value> {
        value.and_then(|v| match v {
            Value::String(_) => Some(v),
            other if key == "description" => Some(Value::String(other.to_string())),
            other => {
                issues.push(ConfigIssue::InvalidField {
                    name: name.clone(),
                    field: key,
                    reason: format!("expected a string, found {other}"),
                });
                None
            }
        })
    };

    let severity_value = typed("severity", field("severity"));
    let include_value = typed("include", field("include"));
    let exclude_value = typed("exclude", field("exclude"));
    let materialization_value = typed("materialization", field("materialization"));
    let description = typed("description", field("description"))
        .and_then(|v| v.as_str().map(str::to_string));

    let severity = match severity_value.map(serde_json::from_value::<Severity>) {
        Some(Ok(severity)) => severity,
        Some(Err(_)) => {
            issues.push(ConfigIssue::InvalidField {
                name: name.clone(),
                field: "severity",
                reason: "expected one of 'error' or 'warn'".to_string(),
            });
            Severity::default()
        }
        None => defaults.severity.unwrap_or_default(),
    };

    let materialization = match materialization_value.map(serde_json::from_value::<Materialization>) {
        Some(Ok(m)) => Some(m),
        Some(Err(_)) => {
            issues.push(ConfigIssue::InvalidField {
                name: name.clone(),
                field: "materialization",
                reason: "expected one of 'ephemeral', 'incremental', 'table' or 'view'".to_string(),
            });
            None
        }
        None => None,
    };

    let mut pattern = |key: &'static str, value: Option<Value>, default: &Option<Pattern>| {
        match value.as_ref().and_then(Value::as_str) {
            Some(source) => match Pattern::new(source) {
                Ok(p) => Some(p),
                Err(e) => {
                    issues.push(ConfigIssue::InvalidField {
                        name: name.clone(),
                        field: key,
                        reason: e.to_string(),
                    });
                    None
                }
            },
            None => default.clone(),
        }
    };

    let include = pattern("include", include_value, &defaults.include);
    let exclude = pattern("exclude", exclude_value, &defaults.exclude);

    if !issues.is_empty() {
        return Err(issues);
    }

    let params: Map<String, Value> = map
        .iter()
        .filter(|(k, _)| !COMMON_KEYS.contains(&k.as_str()))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();

    let settings = CheckSettings {
        name,
        index: 0,
        category,
        severity,
        include,
        exclude,
        materialization,
        description,
    };

    Ok((settings, params))
}

/// Closest known check name, if any is close enough
fn suggest(name: &str, known: &[KnownCheck<'_>]) -> Option<String> {
    let names: Vec<&str> = known.iter().map(|k| k.name).collect();
    similar::get_close_matches(name, &names, 1, 0.6)
        .into_iter()
        .next()
        .map(str::to_string)
}

fn pyproject_section(toml: &str) -> Result<Option<toml::Value>, ConfigError> {
    let mut value: toml::Value = toml::from_str(toml)
        .map_err(|e| ConfigError::ParseError(e.to_string()))?;

    Ok(value
        .get_mut("tool")
        .and_then(|tool| tool.as_table_mut())
        .and_then(|tool| tool.remove(PYPROJECT_SECTION)))
}

fn toml_to_json(value: toml::Value) -> Result<Value, ConfigError> {
    serde_json::to_value(value).map_err(|e| ConfigError::ParseError(e.to_string()))
}

/// One problem found while resolving the configuration
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigIssue {
    #[error("Check '{name}' does not match any of the expected checks.{}", did_you_mean(.suggestion))]
    UnknownCheck {
        name: String,
        suggestion: Option<String>,
    },

    #[error("Check '{name}' belongs under '{expected}', not '{found}'.")]
    WrongCategory {
        name: String,
        expected: CheckCategory,
        found: CheckCategory,
    },

    #[error("Entry {entry} of '{category}' has no 'name'.")]
    MissingName {
        category: CheckCategory,
        entry: usize,
    },

    #[error("Entry {entry} of '{category}' is not a mapping.")]
    NotAMapping {
        category: CheckCategory,
        entry: usize,
    },

    #[error("Check '{name}' has an invalid '{field}': {reason}")]
    InvalidField {
        name: String,
        field: &'static str,
        reason: String,
    },

    #[error("Check '{name}' has invalid parameters: {reason}")]
    InvalidParameters {
        name: String,
        reason: String,
    },

    #[error("Global '{field}' is invalid: {reason}")]
    InvalidGlobal {
        field: &'static str,
        reason: String,
    },
}

fn did_you_mean(suggestion: &Option<String>) -> String {
    match suggestion {
        Some(s) => format!(" Did you mean '{s}'?"),
        None => String::new(),
    }
}

fn numbered(issues: &[ConfigIssue]) -> String {
    issues
        .iter()
        .enumerate()
        .map(|(i, issue)| format!("{}. {}", i + 1, issue))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Config error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {0}: {1}")]
    IoError(String, String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Unsupported config file '{0}', expected a .yml, .yaml or .toml file")]
    UnsupportedFormat(String),

    #[error("pyproject.toml has no [tool.{0}] table")]
    MissingSection(&'static str),

    #[error("No dbt-sentinel.yml or pyproject.toml with a [tool.dbt-sentinel] table found from {0}")]
    NotFound(String),

    #[error("{}", numbered(.0))]
    Validation(Vec<ConfigIssue>),
}

impl ConfigError {
    /// Validation issues, if this is a validation error
    pub fn issues(&self) -> &[ConfigIssue] {
        match self {
            Self::Validation(issues) => issues,
            _ => &[],
        }
    }
}

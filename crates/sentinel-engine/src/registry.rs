//! Check registry
//!
//! Maps every check name to its category, its iteration strategy and a
//! constructor that deserializes the kind-specific parameters. Built-in
//! checks are registered by [`Registry::builtin`]; extra kinds are added
//! with [`Registry::register`].

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use sentinel_core::{check_run_id, CheckCategory, CheckSettings, ConfigDocument, ConfigError, KnownCheck};
use crate::check::Check;
use crate::checks;

/// Which resources a check kind runs against
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum IterateOver {
    /// Runs once, against the project as a whole
    None,
    Models,
    Sources,
    Macros,
    Seeds,
    Snapshots,
    Exposures,
    SemanticModels,
    Tests,
    UnitTests,
    RunResults,
    CatalogNodes,
    CatalogSources,
}

impl IterateOver {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Models => "per-model",
            Self::Sources => "per-source",
            Self::Macros => "per-macro",
            Self::Seeds => "per-seed",
            Self::Snapshots => "per-snapshot",
            Self::Exposures => "per-exposure",
            Self::SemanticModels => "per-semantic-model",
            Self::Tests => "per-test",
            Self::UnitTests => "per-unit-test",
            Self::RunResults => "per-run-result",
            Self::CatalogNodes => "per-catalog-node",
            Self::CatalogSources => "per-catalog-source",
        }
    }
}

impl std::fmt::Display for IterateOver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

type Constructor = fn(Map<String, Value>) -> Result<Box<dyn Check>, String>;

fn construct<C>(params: Map<String, Value>) -> Result<Box<dyn Check>, String>
where
    C: Check + DeserializeOwned + 'static,
{
    let check: C = serde_json::from_value(Value::Object(params)).map_err(|e| e.to_string())?;
    check.validate()?;
    Ok(Box::new(check))
}

/// A registered check kind
#[derive(Debug, Clone)]
pub struct CheckKind {
    pub name: &'static str,
    pub category: CheckCategory,
    pub iterate_over: IterateOver,
    /// One-line description for `list-checks`
    pub summary: &'static str,
    constructor: Constructor,
}

impl CheckKind {
    /// A kind whose parameters deserialize into `C`.
    ///
    /// `C` should use `#[serde(deny_unknown_fields)]` so misspelt parameters
    /// are rejected.
    pub fn new<C>(
        name: &'static str,
        category: CheckCategory,
        iterate_over: IterateOver,
        summary: &'static str,
    ) -> Self
    where
        C: Check + DeserializeOwned + 'static,
    {
        Self {
            name,
            category,
            iterate_over,
            summary,
            constructor: construct::<C>,
        }
    }

    pub fn manifest<C>(name: &'static str, iterate_over: IterateOver, summary: &'static str) -> Self
    where
        C: Check + DeserializeOwned + 'static,
    {
        Self::new::<C>(name, CheckCategory::Manifest, iterate_over, summary)
    }

    pub fn catalog<C>(name: &'static str, iterate_over: IterateOver, summary: &'static str) -> Self
    where
        C: Check + DeserializeOwned + 'static,
    {
        Self::new::<C>(name, CheckCategory::Catalog, iterate_over, summary)
    }

    pub fn run_results<C>(name: &'static str, iterate_over: IterateOver, summary: &'static str) -> Self
    where
        C: Check + DeserializeOwned + 'static,
    {
        Self::new::<C>(name, CheckCategory::RunResults, iterate_over, summary)
    }

    /// Instantiate the check from its kind-specific parameters
    pub fn build(&self, params: Map<String, Value>) -> Result<Box<dyn Check>, String> {
        (self.constructor)(params)
    }
}

/// A validated configuration entry, ready to execute
#[derive(Debug)]
pub struct CheckDefinition {
    pub settings: CheckSettings,
    pub iterate_over: IterateOver,
    pub check: Box<dyn Check>,
}

impl CheckDefinition {
    pub fn name(&self) -> &str {
        &self.settings.name
    }

    pub fn category(&self) -> CheckCategory {
        self.settings.category
    }

    /// `check_run_id` of one execution of this definition
    pub fn run_id(&self, unique_id: Option<&str>) -> String {
        check_run_id(&self.settings.name, self.settings.index, unique_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("A check named '{0}' is already registered")]
    DuplicateCheck(String),
}

/// Every check kind that configuration entries may name
#[derive(Debug, Clone, Default)]
pub struct Registry {
    kinds: BTreeMap<&'static str, CheckKind>,
}

impl Registry {
    /// An empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every built-in check
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        for kind in checks::builtin() {
            registry.kinds.insert(kind.name, kind);
        }
        registry
    }

    /// Add a check kind. Names must be unique.
    pub fn register(&mut self, kind: CheckKind) -> Result<(), RegistryError> {
        if self.kinds.contains_key(kind.name) {
            return Err(RegistryError::DuplicateCheck(kind.name.to_string()));
        }
        tracing::debug!(check = kind.name, iterate_over = %kind.iterate_over, "Registered check");
        self.kinds.insert(kind.name, kind);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&CheckKind> {
        self.kinds.get(name)
    }

    /// Registered kinds, sorted by name
    pub fn kinds(&self) -> impl Iterator<Item = &CheckKind> {
        self.kinds.values()
    }

    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }

    fn known(&self) -> Vec<KnownCheck<'static>> {
        self.kinds
            .values()
            .map(|k| KnownCheck {
                name: k.name,
                category: k.category,
            })
            .collect()
    }

    /// Turn a configuration document into executable definitions.
    ///
    /// Every entry is checked (name, category, common fields, parameters)
    /// and all problems are reported together.
    pub fn validate(&self, config: &ConfigDocument) -> Result<Vec<CheckDefinition>, ConfigError> {
        let definitions = config.resolve(&self.known(), |settings, params| {
            let kind = self
                .get(&settings.name)
                .ok_or_else(|| format!("'{}' is not registered", settings.name))?;

            Ok(CheckDefinition {
                settings: settings.clone(),
                iterate_over: kind.iterate_over,
                check: kind.build(params)?,
            })
        })?;

        tracing::info!(definitions = definitions.len(), "Validated configuration");
        Ok(definitions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::check::{CheckOutcome, Target};
    use crate::context::Context;
    use pretty_assertions::assert_eq;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    #[serde(deny_unknown_fields)]
    struct AlwaysPasses {
        #[serde(default)]
        threshold: u32,
    }

    impl Check for AlwaysPasses {
        fn run(&self, _target: Target<'_>, _ctx: &Context<'_>) -> CheckOutcome {
            Ok(())
        }

        fn validate(&self) -> Result<(), String> {
            if self.threshold > 100 {
                return Err(format!("threshold must be at most 100, got {}", self.threshold));
            }
            Ok(())
        }
    }

    fn custom() -> CheckKind {
        CheckKind::manifest::<AlwaysPasses>("check_custom_rule", IterateOver::None, "Always passes.")
    }

    #[test]
    fn builtin_names_are_unique_and_prefixed() {
        let registry = Registry::builtin();
        assert_eq!(registry.len(), checks::builtin().len());
        assert!(registry.kinds().all(|k| k.name.starts_with("check_")));
    }

    #[test]
    fn custom_kinds_can_be_registered_once() {
        let mut registry = Registry::builtin();
        registry.register(custom()).unwrap();

        assert_eq!(
            registry.register(custom()),
            Err(RegistryError::DuplicateCheck("check_custom_rule".to_string()))
        );

        let config = ConfigDocument::from_yaml("manifest_checks:\n  - name: check_custom_rule\n").unwrap();
        let definitions = registry.validate(&config).unwrap();
        assert_eq!(definitions[0].iterate_over, IterateOver::None);
        assert_eq!(definitions[0].run_id(None), "check_custom_rule:0");
    }

    #[test]
    fn unknown_parameters_are_rejected() {
        let mut registry = Registry::new();
        registry.register(custom()).unwrap();

        let config = ConfigDocument::from_yaml(
            "manifest_checks:\n  - name: check_custom_rule\n    treshold: 3\n",
        )
        .unwrap();
        let err = registry.validate(&config).unwrap_err();

        assert_eq!(err.issues().len(), 1);
        assert!(err.to_string().contains("unknown field `treshold`"), "{err}");
    }

    #[test]
    fn parameter_validation_runs_after_deserialization() {
        let mut registry = Registry::new();
        registry.register(custom()).unwrap();

        let config = ConfigDocument::from_yaml(
            "manifest_checks:\n  - name: check_custom_rule\n    threshold: 150\n",
        )
        .unwrap();
        let err = registry.validate(&config).unwrap_err();
        assert!(err.to_string().contains("threshold must be at most 100"));
    }
}

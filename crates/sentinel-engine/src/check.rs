//! The check trait and the values a check sees

use sentinel_dbt::{
    CatalogNode, Exposure, Macro, Model, Resource, RunResult, Seed, SemanticModel, Snapshot,
    Source, Test, UnitTest,
};
use crate::context::Context;

/// Why a check did not pass
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CheckError {
    /// The resource violates the rule. Reported with the configured severity.
    #[error("{0}")]
    Failed(String),

    /// The check could not evaluate the rule. Always reported as an error.
    #[error("{0}")]
    Execution(String),
}

impl CheckError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }

    pub fn execution(message: impl Into<String>) -> Self {
        Self::Execution(message.into())
    }
}

pub type CheckOutcome = Result<(), CheckError>;

/// Fail with `message` unless `condition` holds
pub fn ensure(condition: bool, message: impl FnOnce() -> String) -> CheckOutcome {
    if condition {
        Ok(())
    } else {
        Err(CheckError::Failed(message()))
    }
}

/// Executable logic of one check kind.
///
/// An instance holds the kind-specific parameters from one configuration
/// entry and is shared by every execution of that entry, so `run` must not
/// mutate anything.
pub trait Check: std::fmt::Debug + Send + Sync {
    /// Evaluate the rule for one target
    fn run(&self, target: Target<'_>, ctx: &Context<'_>) -> CheckOutcome;

    /// Reject parameter combinations serde cannot express
    fn validate(&self) -> Result<(), String> {
        Ok(())
    }
}

/// What a single execution is bound to: a resource, or nothing for
/// checks that look at the project as a whole
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Target<'a> {
    resource: Option<Resource<'a>>,
}

macro_rules! target_accessor {
    ($(#[$doc:meta])* $fn_name:ident, $variant:ident, $ty:ty, $label:literal) => {
        $(#[$doc])*
        pub fn $fn_name(&self) -> Result<&'a $ty, CheckError> {
            match self.resource {
                Some(Resource::$variant(r)) => Ok(r),
                _ => Err(self.mismatch($label)),
            }
        }
    };
}

impl<'a> Target<'a> {
    pub fn none() -> Self {
        Self { resource: None }
    }

    pub fn resource(resource: Resource<'a>) -> Self {
        Self {
            resource: Some(resource),
        }
    }

    pub fn as_resource(&self) -> Option<Resource<'a>> {
        self.resource
    }

    fn mismatch(&self, expected: &str) -> CheckError {
        let found = match self.resource {
            Some(r) => format!("{} `{}`", r.kind(), r.unique_id()),
            None => "no resource".to_string(),
        };
        CheckError::Execution(format!("expected a {expected}, got {found}"))
    }

    target_accessor!(model, Model, Model, "model");
    target_accessor!(source, Source, Source, "source");
    target_accessor!(dbt_macro, Macro, Macro, "macro");
    target_accessor!(seed, Seed, Seed, "seed");
    target_accessor!(snapshot, Snapshot, Snapshot, "snapshot");
    target_accessor!(exposure, Exposure, Exposure, "exposure");
    target_accessor!(semantic_model, SemanticModel, SemanticModel, "semantic model");
    target_accessor!(test, Test, Test, "test");
    target_accessor!(unit_test, UnitTest, UnitTest, "unit test");
    target_accessor!(run_result, RunResult, RunResult, "run result");

    /// Catalog entry for a model, seed or snapshot
    pub fn catalog_node(&self) -> Result<&'a CatalogNode, CheckError> {
        match self.resource {
            Some(Resource::CatalogNode(r)) => Ok(r),
            _ => Err(self.mismatch("catalog node")),
        }
    }

    /// Catalog entry for a source
    pub fn catalog_source(&self) -> Result<&'a CatalogNode, CheckError> {
        match self.resource {
            Some(Resource::CatalogSource(r)) => Ok(r),
            _ => Err(self.mismatch("catalog source")),
        }
    }
}

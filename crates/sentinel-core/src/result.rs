//! Check results
//!
//! A `CheckResult` is created exactly once per executed (check, resource)
//! pair and never mutated afterwards. Field names are serialized as-is
//! into every output format.

use serde::{Deserialize, Serialize};

/// Check severity level
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Warning - reported but never fails the run
    Warn,

    /// Error - blocking issue that should fail CI
    #[default]
    Error,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one check execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    /// The check logic completed without signalling a problem
    Passed,

    /// The check logic signalled a rule violation
    Failed,

    /// The check logic could not run to completion
    Errored,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Passed => "passed",
            Self::Failed => "failed",
            Self::Errored => "errored",
        }
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized record of a single check execution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckResult {
    /// `{name}:{index}:{resource_short_name}` or `{name}:{index}`
    pub check_run_id: String,

    /// What happened
    pub outcome: Outcome,

    /// Severity the outcome is reported with
    pub severity: Severity,

    /// Present iff the outcome is not `passed`
    pub failure_message: Option<String>,
}

impl CheckResult {
    /// A passing result
    pub fn passed(check_run_id: impl Into<String>, severity: Severity) -> Self {
        Self {
            check_run_id: check_run_id.into(),
            outcome: Outcome::Passed,
            severity,
            failure_message: None,
        }
    }

    /// A rule violation, reported with the configured severity
    pub fn failed(check_run_id: impl Into<String>, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            check_run_id: check_run_id.into(),
            outcome: Outcome::Failed,
            severity,
            failure_message: Some(message.into()),
        }
    }

    /// An execution error. Always error severity, whatever was configured.
    pub fn errored(check_run_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            check_run_id: check_run_id.into(),
            outcome: Outcome::Errored,
            severity: Severity::Error,
            failure_message: Some(message.into()),
        }
    }

    /// The check name portion of `check_run_id`
    pub fn check_name(&self) -> &str {
        self.check_run_id
            .split_once(':')
            .map(|(name, _)| name)
            .unwrap_or(&self.check_run_id)
    }

    pub fn is_passed(&self) -> bool {
        self.outcome == Outcome::Passed
    }

    /// Whether this result alone makes the run fail
    pub fn is_blocking(&self) -> bool {
        match self.outcome {
            Outcome::Passed => false,
            Outcome::Failed => self.severity == Severity::Error,
            Outcome::Errored => true,
        }
    }
}

/// Short resource name used in `check_run_id`s.
///
/// Everything after the resource type and package segments of a
/// `unique_id`, so `source.shop.raw.orders` becomes `raw.orders` and
/// `model.shop.orders.v2` becomes `orders.v2`.
pub fn short_name(unique_id: &str) -> &str {
    let mut dots = unique_id.match_indices('.').map(|(i, _)| i);
    match (dots.next(), dots.next()) {
        (Some(_), Some(second)) => &unique_id[second + 1..],
        _ => unique_id,
    }
}

/// Build the identifier of one check execution
pub fn check_run_id(name: &str, index: usize, unique_id: Option<&str>) -> String {
    match unique_id {
        Some(id) => format!("{}:{}:{}", name, index, short_name(id)),
        None => format!("{}:{}", name, index),
    }
}

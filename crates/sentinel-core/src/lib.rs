//! dbt-sentinel Core
//!
//! Core domain model shared by every layer: check results, the
//! aggregated report, output formatters, and the configuration document.
//! Output field names are part of the public contract - never rename them.

pub mod result;
pub mod report;
pub mod formatters;
pub mod pattern;
pub mod config;

pub use result::{CheckResult, Outcome, Severity, check_run_id, short_name};
pub use report::{sort_results, Report, ReportSummary};
pub use formatters::{formatter_for, FormatError, OutputFormat, ResultFormatter};
pub use pattern::{Pattern, PatternError};
pub use config::{
    CheckCategory, CheckSettings, ConfigDocument, ConfigError, ConfigIssue,
    KnownCheck, Materialization,
};

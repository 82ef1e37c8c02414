//! Result aggregation
//!
//! Collects every `CheckResult` of a run, orders them deterministically,
//! and decides the process exit status.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use crate::result::{CheckResult, Outcome, Severity};

/// Summary statistics for a report
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSummary {
    /// Total number of results
    pub total: usize,

    /// Results with outcome `passed`
    pub passed: usize,

    /// Failed results with `warn` severity
    pub warnings: usize,

    /// Failed results with `error` severity
    pub errors: usize,

    /// Results with outcome `errored`
    pub errored: usize,
}

impl ReportSummary {
    fn from_results(results: &[CheckResult]) -> Self {
        let mut summary = Self {
            total: results.len(),
            ..Self::default()
        };

        for result in results {
            match (result.outcome, result.severity) {
                (Outcome::Passed, _) => summary.passed += 1,
                (Outcome::Failed, Severity::Warn) => summary.warnings += 1,
                (Outcome::Failed, Severity::Error) => summary.errors += 1,
                (Outcome::Errored, _) => summary.errored += 1,
            }
        }

        summary
    }
}

/// Aggregated outcome of one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    /// Timestamp (ISO 8601)
    pub generated_at: String,

    /// Summary statistics
    pub summary: ReportSummary,

    /// All results, in deterministic order
    pub results: Vec<CheckResult>,
}

impl Report {
    /// Build a report, stabilizing result order
    pub fn from_results(mut results: Vec<CheckResult>) -> Self {
        sort_results(&mut results);

        Self {
            generated_at: chrono::Utc::now().to_rfc3339(),
            summary: ReportSummary::from_results(&results),
            results,
        }
    }

    /// True unless an error-severity failure or any errored result exists
    pub fn is_success(&self) -> bool {
        !self.results.iter().any(CheckResult::is_blocking)
    }

    /// Process exit code for this report
    pub fn exit_code(&self) -> i32 {
        if self.is_success() { 0 } else { 1 }
    }

    /// Failed and errored results, in report order
    pub fn failures(&self) -> Vec<&CheckResult> {
        self.results.iter().filter(|r| !r.is_passed()).collect()
    }

    /// Failed and errored results grouped by check name
    pub fn failures_by_check(&self) -> BTreeMap<&str, Vec<&CheckResult>> {
        let mut groups: BTreeMap<&str, Vec<&CheckResult>> = BTreeMap::new();
        for result in self.failures() {
            groups.entry(result.check_name()).or_default().push(result);
        }
        groups
    }

    /// Results to write to an output file
    pub fn selected_results(&self, only_failures: bool) -> Vec<CheckResult> {
        self.results
            .iter()
            .filter(|r| !only_failures || !r.is_passed())
            .cloned()
            .collect()
    }
}

/// Sort key: check name, then numeric index, then resource.
///
/// Sorting the index numerically keeps `check:2` ahead of `check:10`.
fn sort_key(result: &CheckResult) -> (&str, usize, &str) {
    let mut parts = result.check_run_id.splitn(3, ':');
    let name = parts.next().unwrap_or_default();
    let index = parts
        .next()
        .and_then(|i| i.parse().ok())
        .unwrap_or(usize::MAX);
    let resource = parts.next().unwrap_or_default();
    (name, index, resource)
}

/// Order results deterministically, independent of execution order
pub fn sort_results(results: &mut [CheckResult]) {
    results.sort_by(|a, b| {
        sort_key(a)
            .cmp(&sort_key(b))
            .then_with(|| a.outcome.cmp(&b.outcome))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn empty_report_passes() {
        let report = Report::from_results(Vec::new());
        assert_eq!(report.summary.total, 0);
        assert!(report.is_success());
        assert_eq!(report.exit_code(), 0);
    }

    #[test]
    fn warn_failures_do_not_fail_the_run() {
        let report = Report::from_results(vec![
            CheckResult::passed("check_a:0:orders", Severity::Error),
            CheckResult::failed("check_b:0:orders", Severity::Warn, "missing tag"),
        ]);

        assert_eq!(report.summary.warnings, 1);
        assert!(report.is_success());
    }

    #[test]
    fn error_failures_fail_the_run() {
        let report = Report::from_results(vec![
            CheckResult::failed("check_b:0:orders", Severity::Error, "bad name"),
        ]);

        assert_eq!(report.summary.errors, 1);
        assert_eq!(report.exit_code(), 1);
    }

    #[test]
    fn errored_results_fail_the_run() {
        let report = Report::from_results(vec![CheckResult::errored("check_c:0", "no catalog")]);
        assert_eq!(report.summary.errored, 1);
        assert!(!report.is_success());
    }

    #[test]
    fn results_are_sorted_with_numeric_index() {
        let report = Report::from_results(vec![
            CheckResult::passed("check_b:10:x", Severity::Error),
            CheckResult::passed("check_b:2:x", Severity::Error),
            CheckResult::passed("check_a:0:z", Severity::Error),
            CheckResult::passed("check_a:0:y", Severity::Error),
        ]);

        let ids: Vec<&str> = report.results.iter().map(|r| r.check_run_id.as_str()).collect();
        assert_eq!(ids, vec!["check_a:0:y", "check_a:0:z", "check_b:2:x", "check_b:10:x"]);
    }

    #[test]
    fn failures_grouped_by_check_name() {
        let report = Report::from_results(vec![
            CheckResult::failed("check_b:0:a", Severity::Error, "x"),
            CheckResult::failed("check_a:0:a", Severity::Warn, "y"),
            CheckResult::failed("check_b:1:b", Severity::Error, "z"),
            CheckResult::passed("check_c:0", Severity::Error),
        ]);

        let groups = report.failures_by_check();
        assert_eq!(groups.keys().copied().collect::<Vec<_>>(), vec!["check_a", "check_b"]);
        assert_eq!(groups["check_b"].len(), 2);
        assert_eq!(report.selected_results(true).len(), 3);
    }
}

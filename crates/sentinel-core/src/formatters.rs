//! Output formatters
//!
//! Every formatter is a pure function of the result sequence it is given:
//! no timestamps, no host information. Callers decide which results to
//! pass (all of them, or failures only).

use serde::Serialize;
use serde_json::json;
use sha2::{Digest, Sha256};
use std::fmt::Write;
use std::path::Path;
use std::str::FromStr;
use crate::result::{CheckResult, Outcome, Severity};

/// Name reported as the producing tool
pub const TOOL_NAME: &str = "dbt-sentinel";

const SARIF_SCHEMA: &str =
    "https://raw.githubusercontent.com/oasis-tcs/sarif-spec/main/sarif-2.1/schema/sarif-schema-2.1.0.json";

/// Supported output formats
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum OutputFormat {
    #[default]
    Json,
    Csv,
    Junit,
    Sarif,
    Tap,
}

impl OutputFormat {
    pub const ALL: [OutputFormat; 5] = [Self::Json, Self::Csv, Self::Junit, Self::Sarif, Self::Tap];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Csv => "csv",
            Self::Junit => "junit",
            Self::Sarif => "sarif",
            Self::Tap => "tap",
        }
    }

    /// Infer the format from an output file extension
    pub fn from_extension(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()?.to_ascii_lowercase().as_str() {
            "json" => Some(Self::Json),
            "csv" => Some(Self::Csv),
            "xml" => Some(Self::Junit),
            "sarif" => Some(Self::Sarif),
            "tap" => Some(Self::Tap),
            _ => None,
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputFormat {
    type Err = FormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|f| f.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| FormatError::UnknownFormat(s.to_string()))
    }
}

/// Formatter errors
#[derive(Debug, thiserror::Error)]
pub enum FormatError {
    #[error("Unknown output format '{0}', expected one of json, csv, junit, sarif, tap")]
    UnknownFormat(String),

    #[error("Failed to serialize results: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Serializes a sequence of check results into one document
pub trait ResultFormatter {
    fn format(&self, results: &[CheckResult]) -> Result<String, FormatError>;
}

/// Get the formatter for an output format
pub fn formatter_for(format: OutputFormat) -> Box<dyn ResultFormatter> {
    match format {
        OutputFormat::Json => Box::new(JsonFormatter),
        OutputFormat::Csv => Box::new(CsvFormatter),
        OutputFormat::Junit => Box::new(JunitFormatter),
        OutputFormat::Sarif => Box::new(SarifFormatter),
        OutputFormat::Tap => Box::new(TapFormatter),
    }
}

/// JSON array of result objects
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonFormatter;

impl ResultFormatter for JsonFormatter {
    fn format(&self, results: &[CheckResult]) -> Result<String, FormatError> {
        Ok(serde_json::to_string_pretty(results)?)
    }
}

/// CSV with a header row
#[derive(Debug, Clone, Copy, Default)]
pub struct CsvFormatter;

impl CsvFormatter {
    const HEADER: [&'static str; 4] = ["check_run_id", "outcome", "severity", "failure_message"];

    fn field(value: &str) -> String {
        if value.contains([',', '"', '\n', '\r']) {
            format!("\"{}\"", value.replace('"', "\"\""))
        } else {
            value.to_string()
        }
    }
}

impl ResultFormatter for CsvFormatter {
    fn format(&self, results: &[CheckResult]) -> Result<String, FormatError> {
        let mut out = Self::HEADER.join(",");
        out.push_str("\r\n");

        for result in results {
            let row = [
                Self::field(&result.check_run_id),
                Self::field(result.outcome.as_str()),
                Self::field(result.severity.as_str()),
                Self::field(result.failure_message.as_deref().unwrap_or_default()),
            ];
            out.push_str(&row.join(","));
            out.push_str("\r\n");
        }

        Ok(out)
    }
}

/// JUnit XML, one test case per result
#[derive(Debug, Clone, Copy, Default)]
pub struct JunitFormatter;

impl ResultFormatter for JunitFormatter {
    fn format(&self, results: &[CheckResult]) -> Result<String, FormatError> {
        let failures = results.iter().filter(|r| r.outcome == Outcome::Failed).count();
        let errors = results.iter().filter(|r| r.outcome == Outcome::Errored).count();

        let mut xml = String::from("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n");
        // Writing into a String cannot fail.
        let _ = writeln!(xml, "<testsuites>");
        let _ = writeln!(
            xml,
            "  <testsuite name=\"{TOOL_NAME}\" tests=\"{}\" failures=\"{failures}\" errors=\"{errors}\">",
            results.len()
        );

        for result in results {
            let name = xml_escape(&result.check_run_id);
            let message = xml_escape(result.failure_message.as_deref().unwrap_or_default());

            match result.outcome {
                Outcome::Passed => {
                    let _ = writeln!(xml, "    <testcase name=\"{name}\" classname=\"{TOOL_NAME}\"/>");
                }
                Outcome::Failed => {
                    let _ = writeln!(xml, "    <testcase name=\"{name}\" classname=\"{TOOL_NAME}\">");
                    let _ = writeln!(
                        xml,
                        "      <failure message=\"{message}\" type=\"{}\"/>",
                        result.severity
                    );
                    let _ = writeln!(xml, "    </testcase>");
                }
                Outcome::Errored => {
                    let _ = writeln!(xml, "    <testcase name=\"{name}\" classname=\"{TOOL_NAME}\">");
                    let _ = writeln!(xml, "      <error message=\"{message}\" type=\"error\"/>");
                    let _ = writeln!(xml, "    </testcase>");
                }
            }
        }

        let _ = writeln!(xml, "  </testsuite>");
        let _ = writeln!(xml, "</testsuites>");
        Ok(xml)
    }
}

fn xml_escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            '\n' => escaped.push_str("&#10;"),
            c => escaped.push(c),
        }
    }
    escaped
}

/// SARIF 2.1.0 log with one result per check execution
#[derive(Debug, Clone, Copy, Default)]
pub struct SarifFormatter;

#[derive(Serialize)]
struct SarifResult<'a> {
    #[serde(rename = "ruleId")]
    rule_id: &'a str,
    level: &'static str,
    message: serde_json::Value,
    #[serde(rename = "partialFingerprints")]
    partial_fingerprints: serde_json::Value,
}

impl SarifFormatter {
    fn level(result: &CheckResult) -> &'static str {
        match (result.outcome, result.severity) {
            (Outcome::Passed, _) => "none",
            (Outcome::Failed, Severity::Warn) => "warning",
            _ => "error",
        }
    }

    fn fingerprint(check_run_id: &str) -> String {
        hex::encode(Sha256::digest(check_run_id.as_bytes()))
    }
}

impl ResultFormatter for SarifFormatter {
    fn format(&self, results: &[CheckResult]) -> Result<String, FormatError> {
        let sarif_results: Vec<SarifResult<'_>> = results
            .iter()
            .map(|r| {
                let text = match r.outcome {
                    Outcome::Passed => "Check passed",
                    _ => r.failure_message.as_deref().unwrap_or("Check failed"),
                };
                SarifResult {
                    rule_id: &r.check_run_id,
                    level: Self::level(r),
                    message: json!({ "text": text }),
                    partial_fingerprints: json!({ "checkRunId/v1": Self::fingerprint(&r.check_run_id) }),
                }
            })
            .collect();

        let log = json!({
            "$schema": SARIF_SCHEMA,
            "version": "2.1.0",
            "runs": [{
                "tool": {
                    "driver": {
                        "name": TOOL_NAME,
                        "version": env!("CARGO_PKG_VERSION"),
                    }
                },
                "results": sarif_results,
            }]
        });

        Ok(serde_json::to_string_pretty(&log)?)
    }
}

/// Test Anything Protocol, version 13
#[derive(Debug, Clone, Copy, Default)]
pub struct TapFormatter;

impl ResultFormatter for TapFormatter {
    fn format(&self, results: &[CheckResult]) -> Result<String, FormatError> {
        let mut lines = vec!["TAP version 13".to_string(), format!("1..{}", results.len())];

        for (i, result) in results.iter().enumerate() {
            let status = if result.is_passed() { "ok" } else { "not ok" };
            lines.push(format!("{} {} - {}", status, i + 1, result.check_run_id));

            if let Some(message) = &result.failure_message {
                lines.extend(message.lines().map(|line| format!("  # {line}")));
            }
        }

        let mut out = lines.join("\n");
        out.push('\n');
        Ok(out)
    }
}

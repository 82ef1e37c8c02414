//! Runs the `dbt-sentinel` binary against the fixture project

use pretty_assertions::assert_eq;
use std::path::PathBuf;
use std::process::{Command, Output};

fn fixtures() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../fixtures")
}

fn dbt_sentinel(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_dbt-sentinel"))
        .args(args)
        .env_remove("RUST_LOG")
        .env_remove("LOG_FORMAT")
        .env("NO_COLOR", "1")
        .env("CLICOLOR", "0")
        .output()
        .unwrap()
}

fn config(name: &str) -> String {
    fixtures().join("configs").join(name).display().to_string()
}

#[test]
fn failing_run_exits_one_and_writes_failures() {
    let dir = tempfile::tempdir().unwrap();
    let output_file = dir.path().join("results.json");

    let output = dbt_sentinel(&[
        "check",
        "--config-file",
        &config("dbt-sentinel.yml"),
        "--output-file",
        output_file.to_str().unwrap(),
        "--output-only-failures",
    ]);

    assert_eq!(output.status.code(), Some(1));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("SUCCESS=16 WARN=4 ERROR=4"), "{stdout}");

    let written: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&output_file).unwrap()).unwrap();
    let ids: Vec<&str> = written
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["check_run_id"].as_str().unwrap())
        .collect();
    assert_eq!(ids.len(), 8);
    assert_eq!(ids[0], "check_columns_are_all_documented:0:customers");
}

#[test]
fn selecting_only_warning_categories_passes() {
    // The catalog check is configured at warn severity
    let output = dbt_sentinel(&[
        "check",
        "--config-file",
        &config("dbt-sentinel.yml"),
        "--only",
        "catalog_checks",
    ]);

    assert_eq!(output.status.code(), Some(0));
}

#[test]
fn output_format_is_inferred_from_extension() {
    let dir = tempfile::tempdir().unwrap();
    let output_file = dir.path().join("nested/results.xml");

    dbt_sentinel(&[
        "check",
        "--config-file",
        &config("dbt-sentinel.yml"),
        "--output-file",
        output_file.to_str().unwrap(),
    ]);

    let written = std::fs::read_to_string(&output_file).unwrap();
    assert!(written.starts_with("<?xml"), "{written}");
}

#[test]
fn misspelt_check_is_fatal_with_a_suggestion() {
    let output = dbt_sentinel(&["check", "--config-file", &config("typo.yml")]);

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Did you mean 'check_model_has_unique_test'?"), "{stderr}");
}

#[test]
fn unsupported_artifacts_are_fatal() {
    let output = dbt_sentinel(&["check", "--config-file", &config("unsupported.yml")]);

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Failed to load dbt artifacts"), "{stderr}");
}

#[test]
fn dry_run_executes_nothing() {
    let output = dbt_sentinel(&["check", "--config-file", &config("dbt-sentinel.yml"), "--dry-run"]);

    assert_eq!(output.status.code(), Some(0));
    assert!(String::from_utf8_lossy(&output.stdout).starts_with("Dry run: 24 checks would execute"));
}

#[test]
fn list_checks_names_every_builtin() {
    let output = dbt_sentinel(&["list-checks"]);

    assert_eq!(output.status.code(), Some(0));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("check_model_names"));
    assert!(stdout.contains("check_source_columns_are_all_documented"));
    assert_eq!(stdout.lines().count(), 33);
}

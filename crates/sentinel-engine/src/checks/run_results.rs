//! Checks over run_results.json

use serde::Deserialize;
use sentinel_core::short_name;
use crate::check::{ensure, Check, CheckError, CheckOutcome, Target};
use crate::context::Context;
use crate::registry::{CheckKind, IterateOver};

pub(super) fn kinds() -> Vec<CheckKind> {
    vec![
        CheckKind::run_results::<MaxExecutionTime>(
            "check_run_results_max_execution_time",
            IterateOver::RunResults,
            "Each result can take a maximum duration (seconds).",
        ),
        CheckKind::run_results::<MaxGigabytesBilled>(
            "check_run_results_max_gigabytes_billed",
            IterateOver::RunResults,
            "Each result can have a maximum number of gigabytes billed (BigQuery only).",
        ),
    ]
}

fn non_negative(field: &str, value: f64) -> Result<(), String> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(format!("`{field}` must be a non-negative number, got {value}"))
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct MaxExecutionTime {
    max_execution_time_seconds: f64,
}

impl Check for MaxExecutionTime {
    fn run(&self, target: Target<'_>, _ctx: &Context<'_>) -> CheckOutcome {
        let result = target.run_result()?;
        ensure(result.execution_time <= self.max_execution_time_seconds, || {
            format!(
                "`{}` has an execution time ({}s) greater than permitted ({}s).",
                short_name(&result.unique_id),
                result.execution_time,
                self.max_execution_time_seconds
            )
        })
    }

    fn validate(&self) -> Result<(), String> {
        non_negative("max_execution_time_seconds", self.max_execution_time_seconds)
    }
}

const BYTES_PER_GIGABYTE: f64 = 1_000_000_000.0;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct MaxGigabytesBilled {
    max_gigabytes_billed: f64,
}

impl Check for MaxGigabytesBilled {
    fn run(&self, target: Target<'_>, _ctx: &Context<'_>) -> CheckOutcome {
        let result = target.run_result()?;
        let bytes_billed = result
            .adapter_response
            .get("bytes_billed")
            .and_then(|v| v.as_f64())
            .ok_or_else(|| {
                CheckError::execution(
                    "`bytes_billed` not found in adapter response. Are you using the `dbt-bigquery` adapter?",
                )
            })?;
        let gigabytes_billed = bytes_billed / BYTES_PER_GIGABYTE;

        ensure(gigabytes_billed <= self.max_gigabytes_billed, || {
            format!(
                "`{}` results in {gigabytes_billed} gigabytes billed, this is greater than permitted ({}).",
                short_name(&result.unique_id),
                self.max_gigabytes_billed
            )
        })
    }

    fn validate(&self) -> Result<(), String> {
        non_negative("max_gigabytes_billed", self.max_gigabytes_billed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checks::testing::manifest;
    use crate::context::Artifacts;
    use pretty_assertions::assert_eq;
    use sentinel_dbt::{Resource, RunResult};
    use serde_json::json;

    fn result(execution_time: f64, adapter_response: serde_json::Value) -> RunResult {
        RunResult {
            unique_id: "model.shop.orders".to_string(),
            status: "success".to_string(),
            execution_time,
            adapter_response: adapter_response.as_object().cloned().unwrap_or_default(),
            ..RunResult::default()
        }
    }

    #[test]
    fn execution_time() {
        let artifacts = Artifacts::new(manifest(json!({})));
        let slow = result(75.5, json!({}));
        let check = MaxExecutionTime { max_execution_time_seconds: 60.0 };

        assert_eq!(
            check.run(Target::resource(Resource::RunResult(&slow)), &artifacts.context()),
            Err(CheckError::failed("`orders` has an execution time (75.5s) greater than permitted (60s)."))
        );
    }

    #[test]
    fn gigabytes_billed() {
        let artifacts = Artifacts::new(manifest(json!({})));
        let ctx = artifacts.context();
        let check = MaxGigabytesBilled { max_gigabytes_billed: 1.0 };

        let cheap = result(1.0, json!({ "bytes_billed": 1048576 }));
        assert_eq!(check.run(Target::resource(Resource::RunResult(&cheap)), &ctx), Ok(()));

        let expensive = result(1.0, json!({ "bytes_billed": 5_000_000_000_u64 }));
        assert_eq!(
            check.run(Target::resource(Resource::RunResult(&expensive)), &ctx),
            Err(CheckError::failed(
                "`orders` results in 5 gigabytes billed, this is greater than permitted (1)."
            ))
        );
    }

    #[test]
    fn missing_bytes_billed_is_an_execution_error() {
        let artifacts = Artifacts::new(manifest(json!({})));
        let check = MaxGigabytesBilled { max_gigabytes_billed: 1.0 };
        let no_billing = result(1.0, json!({ "rows_affected": 3 }));

        assert!(matches!(
            check.run(Target::resource(Resource::RunResult(&no_billing)), &artifacts.context()),
            Err(CheckError::Execution(_))
        ));
    }

    #[test]
    fn limits_must_be_non_negative() {
        assert!(MaxExecutionTime { max_execution_time_seconds: -1.0 }.validate().is_err());
        assert!(MaxGigabytesBilled { max_gigabytes_billed: 0.0 }.validate().is_ok());
    }
}

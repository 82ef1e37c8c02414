//! Execution of one (check, target) pair
//!
//! Whatever the check does - pass, fail, return an execution error or
//! panic - the caller gets exactly one `CheckResult` back.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use sentinel_core::CheckResult;
use crate::check::{CheckError, Target};
use crate::context::Context;
use crate::registry::CheckDefinition;

/// Run `definition` against `target` and record the outcome
pub fn execute(definition: &CheckDefinition, target: Target<'_>, ctx: &Context<'_>) -> CheckResult {
    let unique_id = target.as_resource().map(|r| r.unique_id());
    let run_id = definition.run_id(unique_id);
    let severity = definition.settings.severity;

    // Checks only hold shared references to the context
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| definition.check.run(target, ctx)));

    match outcome {
        Ok(Ok(())) => {
            tracing::debug!(check_run_id = %run_id, "passed");
            CheckResult::passed(run_id, severity)
        }
        Ok(Err(CheckError::Failed(message))) => {
            tracing::debug!(check_run_id = %run_id, %severity, %message, "failed");
            CheckResult::failed(run_id, severity, message)
        }
        Ok(Err(CheckError::Execution(message))) => {
            tracing::error!(
                check_run_id = %run_id,
                check = definition.name(),
                unique_id = unique_id.unwrap_or_default(),
                params = ?definition.check,
                %message,
                "check could not be evaluated"
            );
            CheckResult::errored(run_id, message)
        }
        Err(payload) => {
            let message = format!("check panicked: {}", panic_message(payload.as_ref()));
            tracing::error!(
                check_run_id = %run_id,
                check = definition.name(),
                unique_id = unique_id.unwrap_or_default(),
                params = ?definition.check,
                %message,
                "check panicked"
            );
            CheckResult::errored(run_id, message)
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "unknown panic payload"
    }
}

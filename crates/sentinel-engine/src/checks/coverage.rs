//! Project-wide coverage checks. These run once, not per model.

use serde::Deserialize;
use sentinel_dbt::is_description_populated;
use crate::check::{ensure, Check, CheckOutcome, Target};
use crate::context::Context;
use crate::registry::{CheckKind, IterateOver};
use super::{coverage_pct, default_min_description_length, validate_pct};

pub(super) fn kinds() -> Vec<CheckKind> {
    vec![
        CheckKind::manifest::<ModelDocumentationCoverage>(
            "check_model_documentation_coverage",
            IterateOver::None,
            "Set the minimum percentage of models that have a populated description.",
        ),
        CheckKind::manifest::<ModelTestCoverage>(
            "check_model_test_coverage",
            IterateOver::None,
            "Set the minimum percentage of models that have at least one test.",
        ),
    ]
}

fn full_coverage() -> f64 {
    100.0
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct ModelDocumentationCoverage {
    #[serde(default = "full_coverage")]
    min_model_documentation_coverage_pct: f64,
}

impl Check for ModelDocumentationCoverage {
    fn run(&self, _target: Target<'_>, ctx: &Context<'_>) -> CheckOutcome {
        let models = &ctx.manifest.models;
        let documented = models
            .iter()
            .filter(|m| is_description_populated(&m.description, default_min_description_length()))
            .count();
        let pct = coverage_pct(documented, models.len());

        ensure(pct >= self.min_model_documentation_coverage_pct, || {
            format!(
                "Only {pct:.2}% of models have a populated description, this is less than the permitted minimum of {}%.",
                self.min_model_documentation_coverage_pct
            )
        })
    }

    fn validate(&self) -> Result<(), String> {
        validate_pct("min_model_documentation_coverage_pct", self.min_model_documentation_coverage_pct)
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct ModelTestCoverage {
    #[serde(default = "full_coverage")]
    min_model_test_coverage_pct: f64,
}

impl Check for ModelTestCoverage {
    fn run(&self, _target: Target<'_>, ctx: &Context<'_>) -> CheckOutcome {
        let manifest = ctx.manifest;
        let covered = manifest
            .models
            .iter()
            .filter(|m| manifest.tests_for(&m.unique_id).next().is_some())
            .count();
        let pct = coverage_pct(covered, manifest.models.len());

        ensure(pct >= self.min_model_test_coverage_pct, || {
            format!(
                "Only {pct:.2}% of models have at least one test, this is less than the permitted minimum of {}%.",
                self.min_model_test_coverage_pct
            )
        })
    }

    fn validate(&self) -> Result<(), String> {
        validate_pct("min_model_test_coverage_pct", self.min_model_test_coverage_pct)
    }
}

//! Dispatch loop
//!
//! Expands every definition into (definition, target) jobs according to its
//! iteration strategy and the resource selector, executes each job in
//! isolation and returns the results in a stable order.

use sentinel_core::{sort_results, CheckCategory, CheckResult};
use sentinel_dbt::Resource;
use crate::check::{CheckError, Target};
use crate::context::{Context, Requirements};
use crate::executor::execute;
use crate::registry::{CheckDefinition, IterateOver};
use crate::selector::applies;

/// One scheduled execution
#[derive(Debug, Clone, Copy)]
pub struct Job<'d, 'a> {
    pub definition: &'d CheckDefinition,
    pub target: Target<'a>,
}

/// Result of planning the run
#[derive(Debug)]
pub struct Plan<'d, 'a> {
    pub jobs: Vec<Job<'d, 'a>>,
    /// Definitions that could not be planned (a required artifact is missing)
    pub errored: Vec<CheckResult>,
}

impl Plan<'_, '_> {
    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

/// Resources of the kind `iterate_over` names
fn candidates<'a>(iterate_over: IterateOver, ctx: &Context<'a>) -> Result<Vec<Resource<'a>>, CheckError> {
    let manifest = ctx.manifest;

    let resources = match iterate_over {
        IterateOver::None => Vec::new(),
        IterateOver::Models => manifest.models.iter().map(Resource::Model).collect(),
        IterateOver::Sources => manifest.sources.iter().map(Resource::Source).collect(),
        IterateOver::Macros => manifest.macros.iter().map(Resource::Macro).collect(),
        IterateOver::Seeds => manifest.seeds.iter().map(Resource::Seed).collect(),
        IterateOver::Snapshots => manifest.snapshots.iter().map(Resource::Snapshot).collect(),
        IterateOver::Exposures => manifest.exposures.iter().map(Resource::Exposure).collect(),
        IterateOver::SemanticModels => {
            manifest.semantic_models.iter().map(Resource::SemanticModel).collect()
        }
        IterateOver::Tests => manifest.tests.iter().map(Resource::Test).collect(),
        IterateOver::UnitTests => manifest.unit_tests.iter().map(Resource::UnitTest).collect(),
        IterateOver::RunResults => {
            ctx.run_results()?.results.iter().map(Resource::RunResult).collect()
        }
        IterateOver::CatalogNodes => ctx.catalog()?.nodes.iter().map(Resource::CatalogNode).collect(),
        IterateOver::CatalogSources => {
            ctx.catalog()?.sources.iter().map(Resource::CatalogSource).collect()
        }
    };

    Ok(resources)
}

/// Expand definitions into jobs without running anything
pub fn plan<'d, 'a>(definitions: &'d [CheckDefinition], ctx: &Context<'a>) -> Plan<'d, 'a> {
    let mut jobs = Vec::new();
    let mut errored = Vec::new();

    for definition in definitions {
        if definition.iterate_over == IterateOver::None {
            jobs.push(Job { definition, target: Target::none() });
            continue;
        }

        match candidates(definition.iterate_over, ctx) {
            Ok(resources) => {
                let before = jobs.len();
                jobs.extend(
                    resources
                        .into_iter()
                        .filter(|r| applies(&definition.settings, *r))
                        .map(|r| Job { definition, target: Target::resource(r) }),
                );
                tracing::debug!(
                    check = definition.name(),
                    index = definition.settings.index,
                    jobs = jobs.len() - before,
                    "Planned check"
                );
            }
            Err(e) => {
                tracing::error!(check = definition.name(), error = %e, "Cannot plan check");
                errored.push(CheckResult::errored(definition.run_id(None), e.to_string()));
            }
        }
    }

    Plan { jobs, errored }
}

/// Execute every applicable (definition, resource) pair.
///
/// Results are sorted by check name, index and resource.
pub fn run(definitions: &[CheckDefinition], ctx: &Context<'_>) -> Vec<CheckResult> {
    let Plan { jobs, mut errored } = plan(definitions, ctx);
    tracing::info!(definitions = definitions.len(), executions = jobs.len(), "Running checks");

    let mut results: Vec<CheckResult> = jobs
        .iter()
        .map(|job| execute(job.definition, job.target, ctx))
        .collect();
    results.append(&mut errored);

    sort_results(&mut results);
    results
}

/// Keep only definitions listed under one of `categories`
pub fn select_categories(
    definitions: Vec<CheckDefinition>,
    categories: &[CheckCategory],
) -> Vec<CheckDefinition> {
    if categories.is_empty() {
        return definitions;
    }
    definitions
        .into_iter()
        .filter(|d| categories.contains(&d.category()))
        .collect()
}

/// Which optional artifacts these definitions need loaded
pub fn requirements(definitions: &[CheckDefinition]) -> Requirements {
    definitions.iter().fold(Requirements::default(), |mut req, d| {
        match d.category() {
            CheckCategory::Catalog => req.catalog = true,
            CheckCategory::RunResults => req.run_results = true,
            CheckCategory::Manifest => {}
        }
        req
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Artifacts;
    use crate::registry::Registry;
    use pretty_assertions::assert_eq;
    use sentinel_core::{ConfigDocument, Outcome};
    use sentinel_dbt::Manifest;
    use serde_json::json;

    fn artifacts() -> Artifacts {
        let model = |name: &str, path: &str, description: &str| {
            json!({
                "unique_id": format!("model.shop.{name}"),
                "name": name,
                "resource_type": "model",
                "package_name": "shop",
                "original_file_path": path,
                "description": description,
                "config": { "materialized": "view" }
            })
        };
        let manifest = Manifest::from_value(json!({
            "metadata": {
                "dbt_schema_version": "https://schemas.getdbt.com/dbt/manifest/v12.json",
                "dbt_version": "1.8.0",
                "project_name": "shop"
            },
            "nodes": {
                "model.shop.stg_orders": model("stg_orders", "models/staging/stg_orders.sql", "Staged orders"),
                "model.shop.orders": model("orders", "models/marts/orders.sql", "")
            },
            "sources": {},
            "macros": {}
        }))
        .unwrap();
        Artifacts::new(manifest)
    }

    fn definitions(yaml: &str) -> Vec<CheckDefinition> {
        Registry::builtin()
            .validate(&ConfigDocument::from_yaml(yaml).unwrap())
            .unwrap()
    }

    #[test]
    fn each_pair_yields_one_result() {
        let artifacts = artifacts();
        let definitions = definitions(
            "manifest_checks:\n  - name: check_model_description_populated\n  - name: check_model_documentation_coverage\n",
        );

        let results = run(&definitions, &artifacts.context());
        let ids: Vec<(&str, Outcome)> = results
            .iter()
            .map(|r| (r.check_run_id.as_str(), r.outcome))
            .collect();

        assert_eq!(
            ids,
            vec![
                ("check_model_description_populated:0:orders", Outcome::Failed),
                ("check_model_description_populated:0:stg_orders", Outcome::Passed),
                ("check_model_documentation_coverage:0", Outcome::Failed),
            ]
        );
    }

    #[test]
    fn disjoint_includes_split_resources() {
        let artifacts = artifacts();
        let definitions = definitions(
            "manifest_checks:\n\
             \x20 - name: check_model_names\n    include: ^models/staging\n    model_name_pattern: ^stg_\n\
             \x20 - name: check_model_names\n    include: ^models/marts\n    model_name_pattern: ^fct_|^dim_\n",
        );

        let results = run(&definitions, &artifacts.context());
        let ids: Vec<&str> = results.iter().map(|r| r.check_run_id.as_str()).collect();

        assert_eq!(ids, vec!["check_model_names:0:stg_orders", "check_model_names:1:orders"]);
        assert_eq!(results[0].outcome, Outcome::Passed);
        assert_eq!(results[1].outcome, Outcome::Failed);
    }

    #[test]
    fn missing_catalog_errors_the_definition() {
        let artifacts = artifacts();
        let definitions = definitions("catalog_checks:\n  - name: check_columns_are_all_documented\n");

        let results = run(&definitions, &artifacts.context());
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].check_run_id, "check_columns_are_all_documented:0");
        assert_eq!(results[0].outcome, Outcome::Errored);
    }

    #[test]
    fn dry_run_counts_jobs() {
        let artifacts = artifacts();
        let definitions = definitions(
            "manifest_checks:\n  - name: check_model_has_tags\n    tags: [pii]\n    materialization: table\n",
        );

        assert!(plan(&definitions, &artifacts.context()).is_empty());
    }

    #[test]
    fn categories_and_requirements() {
        let definitions = definitions(
            "manifest_checks:\n  - name: check_model_names\n    model_name_pattern: x\n\
             run_results_checks:\n  - name: check_run_results_max_execution_time\n    max_execution_time_seconds: 60\n",
        );
        assert_eq!(
            requirements(&definitions),
            Requirements { catalog: false, run_results: true }
        );

        let manifest_only = select_categories(definitions, &[CheckCategory::Manifest]);
        assert_eq!(manifest_only.len(), 1);
        assert_eq!(requirements(&manifest_only), Requirements::default());
    }
}

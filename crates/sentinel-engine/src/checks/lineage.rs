//! Lineage checks
//!
//! Upstream dependency counts are read from the model's `depends_on` (macros
//! are not part of the graph); everything else comes from the dependency graph.

use serde::Deserialize;
use sentinel_core::{short_name, Pattern};
use sentinel_dbt::resource_type_of;
use crate::check::{ensure, Check, CheckError, CheckOutcome, Target};
use crate::context::Context;
use crate::registry::{CheckKind, IterateOver};

pub(super) fn kinds() -> Vec<CheckKind> {
    vec![
        CheckKind::manifest::<ModelMaxUpstreamDependencies>(
            "check_model_max_upstream_dependencies",
            IterateOver::Models,
            "Limit the number of upstream macros, models and sources of a model.",
        ),
        CheckKind::manifest::<ModelMaxFanout>(
            "check_model_max_fanout",
            IterateOver::Models,
            "Models cannot have more than the specified number of downstream models.",
        ),
        CheckKind::manifest::<PermittedUpstreamModels>(
            "check_lineage_permitted_upstream_models",
            IterateOver::Models,
            "Upstream models must have a path matching the supplied regex.",
        ),
        CheckKind::manifest::<SeedCannotBeUsed>(
            "check_lineage_seed_cannot_be_used",
            IterateOver::Models,
            "Seeds cannot be referenced by models.",
        ),
        CheckKind::manifest::<SourceCannotBeUsed>(
            "check_lineage_source_cannot_be_used",
            IterateOver::Models,
            "Sources cannot be referenced by models.",
        ),
    ]
}

fn count_of_type(ids: &[String], prefix: &str) -> usize {
    ids.iter().filter(|id| resource_type_of(id) == Some(prefix)).count()
}

const fn five() -> usize {
    5
}

const fn one() -> usize {
    1
}

const fn three() -> usize {
    3
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct ModelMaxUpstreamDependencies {
    #[serde(default = "five")]
    max_upstream_macros: usize,
    #[serde(default = "five")]
    max_upstream_models: usize,
    #[serde(default = "one")]
    max_upstream_sources: usize,
}

impl Check for ModelMaxUpstreamDependencies {
    fn run(&self, target: Target<'_>, _ctx: &Context<'_>) -> CheckOutcome {
        let model = target.model()?;
        let name = short_name(&model.unique_id);

        let limits = [
            ("macros", model.depends_on_macros.len(), self.max_upstream_macros),
            ("models", count_of_type(&model.depends_on, "model"), self.max_upstream_models),
            ("sources", count_of_type(&model.depends_on, "source"), self.max_upstream_sources),
        ];

        for (what, count, max) in limits {
            ensure(count <= max, || {
                format!("`{name}` has {count} upstream {what}, which is more than the permitted maximum of {max}.")
            })?;
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct ModelMaxFanout {
    #[serde(default = "three")]
    max_downstream_models: usize,
}

impl Check for ModelMaxFanout {
    fn run(&self, target: Target<'_>, ctx: &Context<'_>) -> CheckOutcome {
        let model = target.model()?;
        let downstream = ctx.graph.children_of_type(&model.unique_id, "model").len();

        ensure(downstream <= self.max_downstream_models, || {
            format!(
                "`{}` has {downstream} downstream models, which is more than the permitted maximum of {}.",
                short_name(&model.unique_id),
                self.max_downstream_models
            )
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct PermittedUpstreamModels {
    upstream_path_pattern: Pattern,
}

impl Check for PermittedUpstreamModels {
    fn run(&self, target: Target<'_>, ctx: &Context<'_>) -> CheckOutcome {
        let model = target.model()?;

        // Models from other packages were filtered out of the manifest and are not judged
        let not_permitted: Vec<&str> = ctx
            .graph
            .parents_of_type(&model.unique_id, "model")
            .into_iter()
            .filter_map(|id| ctx.manifest.model(id))
            .filter(|upstream| !self.upstream_path_pattern.is_match(&upstream.original_file_path))
            .map(|upstream| upstream.name.as_str())
            .collect();

        ensure(not_permitted.is_empty(), || {
            format!(
                "`{}` references upstream models that are not permitted: {not_permitted:?}.",
                short_name(&model.unique_id)
            )
        })
    }
}

fn forbid_upstream(target: Target<'_>, ctx: &Context<'_>, prefix: &str) -> CheckOutcome {
    let model = target.model()?;
    if !ctx.graph.parents_of_type(&model.unique_id, prefix).is_empty() {
        return Err(CheckError::failed(format!(
            "`{}` references a {prefix} even though this is not permitted.",
            short_name(&model.unique_id)
        )));
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct SeedCannotBeUsed {}

impl Check for SeedCannotBeUsed {
    fn run(&self, target: Target<'_>, ctx: &Context<'_>) -> CheckOutcome {
        forbid_upstream(target, ctx, "seed")
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct SourceCannotBeUsed {}

impl Check for SourceCannotBeUsed {
    fn run(&self, target: Target<'_>, ctx: &Context<'_>) -> CheckOutcome {
        forbid_upstream(target, ctx, "source")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checks::testing::{manifest, model};
    use crate::context::Artifacts;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn artifacts() -> Artifacts {
        let depends = |nodes: serde_json::Value, macros: serde_json::Value| {
            json!({ "depends_on": { "nodes": nodes, "macros": macros } })
        };
        let mut stg = model("stg_orders", depends(json!(["source.shop.raw.orders"]), json!([])));
        stg["original_file_path"] = json!("models/staging/stg_orders.sql");

        let manifest = manifest(json!({
            "nodes": {
                "model.shop.stg_orders": stg,
                "model.shop.int_orders": model("int_orders", depends(json!(["model.shop.stg_orders"]), json!([]))),
                "model.shop.orders": model("orders", depends(
                    json!(["model.shop.stg_orders", "model.shop.int_orders", "seed.shop.countries"]),
                    json!(["macro.shop.a", "macro.shop.b"])
                )),
                "model.shop.customers": model("customers", depends(json!(["model.shop.stg_orders"]), json!([]))),
                "seed.shop.countries": {
                    "unique_id": "seed.shop.countries",
                    "name": "countries",
                    "resource_type": "seed",
                    "package_name": "shop",
                    "original_file_path": "seeds/countries.csv"
                }
            },
            "sources": {
                "source.shop.raw.orders": {
                    "unique_id": "source.shop.raw.orders",
                    "name": "orders",
                    "source_name": "raw",
                    "package_name": "shop",
                    "original_file_path": "models/staging/sources.yml"
                }
            }
        }));
        Artifacts::new(manifest)
    }

    fn run<C: Check + for<'de> Deserialize<'de>>(params: serde_json::Value, unique_id: &str) -> CheckOutcome {
        let check: C = serde_json::from_value(params).unwrap();
        let artifacts = artifacts();
        let ctx = artifacts.context();
        let resource = ctx.manifest.resource(unique_id).unwrap();
        check.run(Target::resource(resource), &ctx)
    }

    #[test]
    fn upstream_limits() {
        assert_eq!(
            run::<ModelMaxUpstreamDependencies>(json!({}), "model.shop.orders"),
            Ok(())
        );
        assert_eq!(
            run::<ModelMaxUpstreamDependencies>(json!({ "max_upstream_macros": 1 }), "model.shop.orders"),
            Err(CheckError::failed(
                "`orders` has 2 upstream macros, which is more than the permitted maximum of 1."
            ))
        );
        assert_eq!(
            run::<ModelMaxUpstreamDependencies>(json!({ "max_upstream_sources": 0 }), "model.shop.stg_orders"),
            Err(CheckError::failed(
                "`stg_orders` has 1 upstream sources, which is more than the permitted maximum of 0."
            ))
        );
    }

    #[test]
    fn fanout_counts_direct_model_children() {
        assert_eq!(run::<ModelMaxFanout>(json!({}), "model.shop.stg_orders"), Ok(()));
        assert_eq!(
            run::<ModelMaxFanout>(json!({ "max_downstream_models": 2 }), "model.shop.stg_orders"),
            Err(CheckError::failed(
                "`stg_orders` has 3 downstream models, which is more than the permitted maximum of 2."
            ))
        );
    }

    #[test]
    fn permitted_upstream_paths() {
        let params = json!({ "upstream_path_pattern": "^models/staging" });
        assert_eq!(run::<PermittedUpstreamModels>(params.clone(), "model.shop.customers"), Ok(()));
        assert_eq!(
            run::<PermittedUpstreamModels>(params, "model.shop.orders"),
            Err(CheckError::failed(
                "`orders` references upstream models that are not permitted: [\"int_orders\"]."
            ))
        );
    }

    #[test]
    fn seeds_and_sources_cannot_be_used() {
        assert_eq!(
            run::<SeedCannotBeUsed>(json!({}), "model.shop.orders"),
            Err(CheckError::failed("`orders` references a seed even though this is not permitted."))
        );
        assert_eq!(run::<SeedCannotBeUsed>(json!({}), "model.shop.customers"), Ok(()));
        assert!(run::<SourceCannotBeUsed>(json!({}), "model.shop.stg_orders").is_err());
    }

    #[test]
    fn parameterless_checks_reject_parameters() {
        assert!(serde_json::from_value::<SeedCannotBeUsed>(json!({ "strict": true })).is_err());
    }
}

//! Per-model checks

use serde::Deserialize;
use sentinel_core::{short_name, Pattern};
use sentinel_dbt::{is_description_populated, Access};
use crate::check::{ensure, Check, CheckOutcome, Target};
use crate::context::Context;
use crate::registry::{CheckKind, IterateOver};
use super::{default_min_description_length, merged_meta, missing_meta_keys, MetaKey, TagCriteria};

pub(super) fn kinds() -> Vec<CheckKind> {
    vec![
        CheckKind::manifest::<ModelNames>(
            "check_model_names",
            IterateOver::Models,
            "Model names must match the supplied regex.",
        ),
        CheckKind::manifest::<ModelDescriptionPopulated>(
            "check_model_description_populated",
            IterateOver::Models,
            "Models must have a populated description.",
        ),
        CheckKind::manifest::<ModelHasTags>(
            "check_model_has_tags",
            IterateOver::Models,
            "Models must have the specified tags.",
        ),
        CheckKind::manifest::<ModelHasUniqueTest>(
            "check_model_has_unique_test",
            IterateOver::Models,
            "Models must have a test for uniqueness of a column.",
        ),
        CheckKind::manifest::<ModelHasUnitTests>(
            "check_model_has_unit_tests",
            IterateOver::Models,
            "Models must have at least the specified number of unit tests.",
        ),
        CheckKind::manifest::<ModelAccess>(
            "check_model_access",
            IterateOver::Models,
            "Models must have the specified access level.",
        ),
        CheckKind::manifest::<ModelHasMetaKeys>(
            "check_model_has_meta_keys",
            IterateOver::Models,
            "Models must declare the specified keys in `meta`.",
        ),
    ]
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct ModelNames {
    model_name_pattern: Pattern,
}

impl Check for ModelNames {
    fn run(&self, target: Target<'_>, _ctx: &Context<'_>) -> CheckOutcome {
        let model = target.model()?;
        ensure(self.model_name_pattern.is_match(&model.name), || {
            format!(
                "`{}` does not match the supplied regex `{}`.",
                short_name(&model.unique_id),
                self.model_name_pattern.as_str()
            )
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct ModelDescriptionPopulated {
    #[serde(default = "default_min_description_length")]
    min_description_length: usize,
}

impl Check for ModelDescriptionPopulated {
    fn run(&self, target: Target<'_>, _ctx: &Context<'_>) -> CheckOutcome {
        let model = target.model()?;
        ensure(
            is_description_populated(&model.description, self.min_description_length),
            || format!("`{}` does not have a populated description.", short_name(&model.unique_id)),
        )
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct ModelHasTags {
    tags: Vec<String>,
    #[serde(default)]
    criteria: TagCriteria,
}

impl Check for ModelHasTags {
    fn run(&self, target: Target<'_>, _ctx: &Context<'_>) -> CheckOutcome {
        let model = target.model()?;
        ensure(self.criteria.is_met(&model.tags, &self.tags), || {
            self.criteria.failure(short_name(&model.unique_id), &model.tags, &self.tags)
        })
    }
}

fn default_uniqueness_tests() -> Vec<String> {
    [
        "dbt_expectations.expect_compound_columns_to_be_unique",
        "dbt_utils.unique_combination_of_columns",
        "unique",
    ]
        .into_iter()
        .map(String::from)
        .collect()
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct ModelHasUniqueTest {
    /// Test names, qualified with their namespace unless they come from dbt itself
    #[serde(default = "default_uniqueness_tests")]
    accepted_uniqueness_tests: Vec<String>,
}

impl Check for ModelHasUniqueTest {
    fn run(&self, target: Target<'_>, ctx: &Context<'_>) -> CheckOutcome {
        let model = target.model()?;
        // A relationships test on a child also depends on this model; only attached tests count
        let has_unique_test = ctx
            .manifest
            .tests_for(&model.unique_id)
            .filter(|test| test.attached_node.as_deref() == Some(model.unique_id.as_str()))
            .filter_map(|test| test.test_metadata.as_ref())
            .any(|meta| {
                let qualified = meta.qualified_name();
                self.accepted_uniqueness_tests.iter().any(|t| *t == qualified)
            });

        ensure(has_unique_test, || {
            format!(
                "`{}` does not have a test for uniqueness of a column.",
                short_name(&model.unique_id)
            )
        })
    }
}

fn default_min_unit_tests() -> usize {
    1
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct ModelHasUnitTests {
    #[serde(default = "default_min_unit_tests")]
    min_number_of_unit_tests: usize,
}

impl Check for ModelHasUnitTests {
    fn run(&self, target: Target<'_>, ctx: &Context<'_>) -> CheckOutcome {
        let model = target.model()?;

        // unit tests only exist from manifest v12 (dbt 1.8) onwards
        if ctx.manifest.metadata.schema.is_legacy() {
            tracing::warn!(
                unique_id = %model.unique_id,
                "check_model_has_unit_tests needs a manifest written by dbt 1.8.0 or later, skipping"
            );
            return Ok(());
        }

        let count = ctx.manifest.unit_tests_for(model).count();
        ensure(count >= self.min_number_of_unit_tests, || {
            format!(
                "`{}` has {count} unit tests, this is less than the minimum of {}.",
                short_name(&model.unique_id),
                self.min_number_of_unit_tests
            )
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct ModelAccess {
    access: Access,
}

impl Check for ModelAccess {
    fn run(&self, target: Target<'_>, _ctx: &Context<'_>) -> CheckOutcome {
        let model = target.model()?;
        ensure(model.access == self.access, || {
            format!(
                "`{}` has `{}` access, it should have access `{}`.",
                short_name(&model.unique_id),
                model.access,
                self.access
            )
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct ModelHasMetaKeys {
    keys: Vec<MetaKey>,
}

impl Check for ModelHasMetaKeys {
    fn run(&self, target: Target<'_>, _ctx: &Context<'_>) -> CheckOutcome {
        let model = target.model()?;
        let missing = missing_meta_keys(&self.keys, &merged_meta(&model.meta, &model.config_meta));
        ensure(missing.is_empty(), || {
            format!(
                "`{}` is missing the following keys from the `meta` config: {missing:?}",
                short_name(&model.unique_id)
            )
        })
    }

    fn validate(&self) -> Result<(), String> {
        if self.keys.is_empty() {
            return Err("`keys` must name at least one key".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::check::CheckError;
    use crate::checks::testing::{manifest, model};
    use crate::context::Artifacts;
    use pretty_assertions::assert_eq;
    use sentinel_dbt::{Manifest, Resource};
    use serde_json::json;

    fn check<C: for<'de> Deserialize<'de>>(params: serde_json::Value) -> C {
        serde_json::from_value(params).unwrap()
    }

    fn run_on<C: Check>(check: &C, manifest: &Manifest, unique_id: &str) -> CheckOutcome {
        let artifacts = Artifacts::new(manifest.clone());
        let ctx = artifacts.context();
        let resource = ctx.manifest.resource(unique_id).unwrap();
        check.run(Target::resource(resource), &ctx)
    }

    #[test]
    fn model_names() {
        let manifest = manifest(json!({
            "nodes": {
                "model.shop.stg_orders": model("stg_orders", json!({})),
                "model.shop.orders": model("orders", json!({}))
            }
        }));
        let names: ModelNames = check(json!({ "model_name_pattern": "^stg_" }));

        assert_eq!(run_on(&names, &manifest, "model.shop.stg_orders"), Ok(()));
        assert_eq!(
            run_on(&names, &manifest, "model.shop.orders"),
            Err(CheckError::failed("`orders` does not match the supplied regex `^stg_`."))
        );
    }

    #[test]
    fn empty_description_fails() {
        let manifest = manifest(json!({
            "nodes": { "model.shop.orders": model("orders", json!({ "description": "" })) }
        }));
        let populated: ModelDescriptionPopulated = check(json!({}));

        assert_eq!(
            run_on(&populated, &manifest, "model.shop.orders"),
            Err(CheckError::failed("`orders` does not have a populated description."))
        );
    }

    #[test]
    fn tags_by_criteria() {
        let manifest = manifest(json!({
            "nodes": { "model.shop.orders": model("orders", json!({ "tags": ["finance"] })) }
        }));

        let all: ModelHasTags = check(json!({ "tags": ["finance", "pii"] }));
        assert_eq!(
            run_on(&all, &manifest, "model.shop.orders"),
            Err(CheckError::failed("`orders` is missing required tags: [\"pii\"]."))
        );

        let any: ModelHasTags = check(json!({ "tags": ["finance", "pii"], "criteria": "any" }));
        assert_eq!(run_on(&any, &manifest, "model.shop.orders"), Ok(()));
    }

    #[test]
    fn unique_test_must_be_attached() {
        let test = |name: &str, namespace: serde_json::Value, attached: &str| {
            json!({
                "unique_id": format!("test.shop.{name}"),
                "name": name,
                "resource_type": "test",
                "package_name": "shop",
                "original_file_path": "models/schema.yml",
                "attached_node": attached,
                "test_metadata": { "name": name, "namespace": namespace }
            })
        };
        let manifest = manifest(json!({
            "nodes": {
                "model.shop.orders": model("orders", json!({})),
                "model.shop.customers": model("customers", json!({})),
                "model.shop.payments": model("payments", json!({})),
                "model.shop.refunds": model("refunds", json!({})),
                "test.shop.unique": test("unique", json!(null), "model.shop.orders"),
                "test.shop.unique_combination_of_columns": test(
                    "unique_combination_of_columns",
                    json!("dbt_utils"),
                    "model.shop.customers"
                ),
                "test.shop.expect_compound_columns_to_be_unique": test(
                    "expect_compound_columns_to_be_unique",
                    json!("dbt_expectations"),
                    "model.shop.payments"
                ),
                "test.shop.not_null": test("not_null", json!(null), "model.shop.refunds")
            }
        }));

        let default: ModelHasUniqueTest = check(json!({}));
        assert_eq!(run_on(&default, &manifest, "model.shop.orders"), Ok(()));
        assert_eq!(run_on(&default, &manifest, "model.shop.customers"), Ok(()));
        assert_eq!(run_on(&default, &manifest, "model.shop.payments"), Ok(()));
        assert_eq!(
            run_on(&default, &manifest, "model.shop.refunds"),
            Err(CheckError::failed("`refunds` does not have a test for uniqueness of a column."))
        );

        let strict: ModelHasUniqueTest = check(json!({ "accepted_uniqueness_tests": ["unique"] }));
        assert!(run_on(&strict, &manifest, "model.shop.customers").is_err());
    }

    #[test]
    fn unit_tests_are_counted() {
        let manifest = manifest(json!({
            "nodes": { "model.shop.orders": model("orders", json!({})) },
            "unit_tests": {
                "unit_test.shop.orders.test_totals": {
                    "unique_id": "unit_test.shop.orders.test_totals",
                    "name": "test_totals",
                    "package_name": "shop",
                    "original_file_path": "models/orders.yml",
                    "model": "orders",
                    "given": [],
                    "expect": { "format": "dict" },
                    "depends_on": { "nodes": ["model.shop.orders"] }
                }
            }
        }));

        let one: ModelHasUnitTests = check(json!({}));
        assert_eq!(run_on(&one, &manifest, "model.shop.orders"), Ok(()));

        let two: ModelHasUnitTests = check(json!({ "min_number_of_unit_tests": 2 }));
        assert_eq!(
            run_on(&two, &manifest, "model.shop.orders"),
            Err(CheckError::failed("`orders` has 1 unit tests, this is less than the minimum of 2."))
        );
    }

    #[test]
    fn access_level() {
        let manifest = manifest(json!({
            "nodes": { "model.shop.orders": model("orders", json!({ "access": "public" })) }
        }));
        let private: ModelAccess = check(json!({ "access": "private" }));

        assert_eq!(
            run_on(&private, &manifest, "model.shop.orders"),
            Err(CheckError::failed("`orders` has `public` access, it should have access `private`."))
        );
    }

    #[test]
    fn meta_keys_from_config_count() {
        let manifest = manifest(json!({
            "nodes": {
                "model.shop.orders": model("orders", json!({
                    "meta": { "owner": "finance" },
                    "config": { "materialized": "table", "meta": { "maturity": "high" } }
                }))
            }
        }));

        let keys: ModelHasMetaKeys = check(json!({ "keys": ["owner", "maturity"] }));
        assert_eq!(run_on(&keys, &manifest, "model.shop.orders"), Ok(()));

        let nested: ModelHasMetaKeys = check(json!({ "keys": [{ "governance": ["pii"] }] }));
        assert_eq!(
            run_on(&nested, &manifest, "model.shop.orders"),
            Err(CheckError::failed(
                "`orders` is missing the following keys from the `meta` config: [\"governance\"]"
            ))
        );
    }

    #[test]
    fn wrong_target_is_an_execution_error() {
        let names: ModelNames = check(json!({ "model_name_pattern": "^stg_" }));
        let artifacts = Artifacts::new(manifest(json!({})));
        let seed = sentinel_dbt::Seed::default();

        let outcome = names.run(Target::resource(Resource::Seed(&seed)), &artifacts.context());
        assert!(matches!(outcome, Err(CheckError::Execution(_))));
    }
}

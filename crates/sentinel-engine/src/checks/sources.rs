//! Per-source checks

use serde::Deserialize;
use sentinel_dbt::{is_description_populated, Source};
use crate::check::{ensure, Check, CheckOutcome, Target};
use crate::context::Context;
use crate::registry::{CheckKind, IterateOver};
use super::{default_min_description_length, TagCriteria};

pub(super) fn kinds() -> Vec<CheckKind> {
    vec![
        CheckKind::manifest::<SourceDescriptionPopulated>(
            "check_source_description_populated",
            IterateOver::Sources,
            "Sources must have a populated description.",
        ),
        CheckKind::manifest::<SourceFreshnessPopulated>(
            "check_source_freshness_populated",
            IterateOver::Sources,
            "Sources must have a populated freshness.",
        ),
        CheckKind::manifest::<SourceLoaderPopulated>(
            "check_source_loader_populated",
            IterateOver::Sources,
            "Sources must have a populated loader.",
        ),
        CheckKind::manifest::<SourceHasTags>(
            "check_source_has_tags",
            IterateOver::Sources,
            "Sources must have the specified tags.",
        ),
    ]
}

/// `source_name.name`, the way sources are referenced in SQL
fn display_name(source: &Source) -> String {
    format!("{}.{}", source.source_name, source.name)
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct SourceDescriptionPopulated {
    #[serde(default = "default_min_description_length")]
    min_description_length: usize,
}

impl Check for SourceDescriptionPopulated {
    fn run(&self, target: Target<'_>, _ctx: &Context<'_>) -> CheckOutcome {
        let source = target.source()?;
        ensure(
            is_description_populated(&source.description, self.min_description_length),
            || format!("`{}` does not have a populated description.", display_name(source)),
        )
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct SourceFreshnessPopulated {}

impl Check for SourceFreshnessPopulated {
    fn run(&self, target: Target<'_>, _ctx: &Context<'_>) -> CheckOutcome {
        let source = target.source()?;
        let populated = source.freshness.as_ref().is_some_and(|f| f.is_populated());
        ensure(populated, || {
            format!("`{}` does not have a populated freshness.", display_name(source))
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct SourceLoaderPopulated {}

impl Check for SourceLoaderPopulated {
    fn run(&self, target: Target<'_>, _ctx: &Context<'_>) -> CheckOutcome {
        let source = target.source()?;
        ensure(!source.loader.trim().is_empty(), || {
            format!("`{}` does not have a populated loader.", display_name(source))
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct SourceHasTags {
    tags: Vec<String>,
    #[serde(default)]
    criteria: TagCriteria,
}

impl Check for SourceHasTags {
    fn run(&self, target: Target<'_>, _ctx: &Context<'_>) -> CheckOutcome {
        let source = target.source()?;
        ensure(self.criteria.is_met(&source.tags, &self.tags), || {
            self.criteria.failure(&display_name(source), &source.tags, &self.tags)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::check::CheckError;
    use crate::checks::testing::manifest;
    use crate::context::Artifacts;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn run<C: Check + for<'de> Deserialize<'de>>(params: serde_json::Value, unique_id: &str) -> CheckOutcome {
        let source = |name: &str, extra: serde_json::Value| {
            let mut node = json!({
                "unique_id": format!("source.shop.raw.{name}"),
                "name": name,
                "source_name": "raw",
                "package_name": "shop",
                "original_file_path": "models/staging/sources.yml"
            });
            if let (Some(target), serde_json::Value::Object(fields)) = (node.as_object_mut(), extra) {
                target.extend(fields);
            }
            node
        };
        let artifacts = Artifacts::new(manifest(json!({
            "sources": {
                "source.shop.raw.orders": source("orders", json!({
                    "description": "Raw orders",
                    "loader": "fivetran",
                    "tags": ["raw", "finance"],
                    "freshness": { "warn_after": { "count": 12, "period": "hour" } }
                })),
                "source.shop.raw.customers": source("customers", json!({
                    "freshness": { "warn_after": { "count": null, "period": null } }
                }))
            }
        })));

        let check: C = serde_json::from_value(params).unwrap();
        let ctx = artifacts.context();
        let resource = ctx.manifest.resource(unique_id).unwrap();
        check.run(Target::resource(resource), &ctx)
    }

    #[test]
    fn populated_source() {
        for outcome in [
            run::<SourceDescriptionPopulated>(json!({}), "source.shop.raw.orders"),
            run::<SourceFreshnessPopulated>(json!({}), "source.shop.raw.orders"),
            run::<SourceLoaderPopulated>(json!({}), "source.shop.raw.orders"),
            run::<SourceHasTags>(json!({ "tags": ["raw"] }), "source.shop.raw.orders"),
        ] {
            assert_eq!(outcome, Ok(()));
        }
    }

    #[test]
    fn bare_source() {
        assert_eq!(
            run::<SourceDescriptionPopulated>(json!({}), "source.shop.raw.customers"),
            Err(CheckError::failed("`raw.customers` does not have a populated description."))
        );
        assert_eq!(
            run::<SourceFreshnessPopulated>(json!({}), "source.shop.raw.customers"),
            Err(CheckError::failed("`raw.customers` does not have a populated freshness."))
        );
        assert_eq!(
            run::<SourceLoaderPopulated>(json!({}), "source.shop.raw.customers"),
            Err(CheckError::failed("`raw.customers` does not have a populated loader."))
        );
        assert_eq!(
            run::<SourceHasTags>(json!({ "tags": ["raw"] }), "source.shop.raw.customers"),
            Err(CheckError::failed("`raw.customers` is missing required tags: [\"raw\"]."))
        );
    }

    #[test]
    fn tag_messages_follow_the_criteria() {
        assert_eq!(
            run::<SourceHasTags>(
                json!({ "tags": ["raw", "finance"], "criteria": "one" }),
                "source.shop.raw.orders"
            ),
            Err(CheckError::failed(
                "`raw.orders` must have exactly one of the required tags: [\"raw\", \"finance\"]."
            ))
        );
        assert_eq!(
            run::<SourceHasTags>(json!({ "tags": ["pii"], "criteria": "any" }), "source.shop.raw.orders"),
            Err(CheckError::failed("`raw.orders` does not have any of the required tags: [\"pii\"]."))
        );
    }
}

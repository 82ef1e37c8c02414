//! Seed and snapshot checks

use serde::Deserialize;
use sentinel_core::{short_name, Pattern};
use sentinel_dbt::is_description_populated;
use crate::check::{ensure, Check, CheckOutcome, Target};
use crate::context::Context;
use crate::registry::{CheckKind, IterateOver};
use super::default_min_description_length;

pub(super) fn kinds() -> Vec<CheckKind> {
    vec![
        CheckKind::manifest::<SeedNames>(
            "check_seed_names",
            IterateOver::Seeds,
            "Seed names must match the supplied regex.",
        ),
        CheckKind::manifest::<SeedDescriptionPopulated>(
            "check_seed_description_populated",
            IterateOver::Seeds,
            "Seeds must have a populated description.",
        ),
        CheckKind::manifest::<SnapshotNames>(
            "check_snapshot_names",
            IterateOver::Snapshots,
            "Snapshot names must match the supplied regex.",
        ),
    ]
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct SeedNames {
    seed_name_pattern: Pattern,
}

impl Check for SeedNames {
    fn run(&self, target: Target<'_>, _ctx: &Context<'_>) -> CheckOutcome {
        let seed = target.seed()?;
        ensure(self.seed_name_pattern.is_match(&seed.name), || {
            format!(
                "`{}` does not match the supplied regex `{}`.",
                short_name(&seed.unique_id),
                self.seed_name_pattern.as_str()
            )
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct SeedDescriptionPopulated {
    #[serde(default = "default_min_description_length")]
    min_description_length: usize,
}

impl Check for SeedDescriptionPopulated {
    fn run(&self, target: Target<'_>, _ctx: &Context<'_>) -> CheckOutcome {
        let seed = target.seed()?;
        ensure(
            is_description_populated(&seed.description, self.min_description_length),
            || format!("`{}` does not have a populated description.", short_name(&seed.unique_id)),
        )
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct SnapshotNames {
    snapshot_name_pattern: Pattern,
}

impl Check for SnapshotNames {
    fn run(&self, target: Target<'_>, _ctx: &Context<'_>) -> CheckOutcome {
        let snapshot = target.snapshot()?;
        ensure(self.snapshot_name_pattern.is_match(&snapshot.name), || {
            format!(
                "`{}` does not match the supplied regex `{}`.",
                snapshot.name,
                self.snapshot_name_pattern.as_str()
            )
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
    use sentinel_dbt::{Resource, Seed, Snapshot};
    use serde_json::json;

    #[test]
    fn seed_checks() {
        let artifacts = Artifacts::new(manifest(json!({})));
        let ctx = artifacts.context();
        let seed = Seed {
            unique_id: "seed.shop.countries".to_string(),
            name: "countries".to_string(),
            description: "ISO 3166 country codes".to_string(),
            ..Seed::default()
        };
        let target = Target::resource(Resource::Seed(&seed));

        let names: SeedNames = serde_json::from_value(json!({ "seed_name_pattern": "^raw_" })).unwrap();
        assert_eq!(
            names.run(target, &ctx),
            Err(CheckError::failed("`countries` does not match the supplied regex `^raw_`."))
        );

        let described: SeedDescriptionPopulated = serde_json::from_value(json!({})).unwrap();
        assert_eq!(described.run(target, &ctx), Ok(()));
    }

    #[test]
    fn snapshot_names() {
        let artifacts = Artifacts::new(manifest(json!({})));
        let snapshot = Snapshot {
            unique_id: "snapshot.shop.orders_snapshot".to_string(),
            name: "orders_snapshot".to_string(),
            ..Snapshot::default()
        };
        let check: SnapshotNames =
            serde_json::from_value(json!({ "snapshot_name_pattern": ".*_snapshot$" })).unwrap();

        assert_eq!(
            check.run(Target::resource(Resource::Snapshot(&snapshot)), &artifacts.context()),
            Ok(())
        );
    }
}

//! Data test and unit test checks

use serde::Deserialize;
use sentinel_core::short_name;
use crate::check::{ensure, Check, CheckOutcome, Target};
use crate::context::Context;
use crate::registry::{CheckKind, IterateOver};
use super::{merged_meta, missing_meta_keys, MetaKey};

pub(super) fn kinds() -> Vec<CheckKind> {
    vec![
        CheckKind::manifest::<SingularTestHasMetaKeys>(
            "check_singular_test_has_meta_keys",
            IterateOver::Tests,
            "Singular tests must declare the specified keys in `meta`.",
        ),
        CheckKind::manifest::<UnitTestExpectFormat>(
            "check_unit_test_expect_format",
            IterateOver::UnitTests,
            "Unit tests can only use the specified formats for `expect`.",
        ),
    ]
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct SingularTestHasMetaKeys {
    keys: Vec<MetaKey>,
}

impl Check for SingularTestHasMetaKeys {
    fn run(&self, target: Target<'_>, _ctx: &Context<'_>) -> CheckOutcome {
        let test = target.test()?;
        // generic tests carry the meta of the macro that defines them
        if !test.is_singular() {
            return Ok(());
        }

        let missing = missing_meta_keys(&self.keys, &merged_meta(&test.meta, &test.config_meta));
        ensure(missing.is_empty(), || {
            format!(
                "`{}` is missing the following keys from the `meta` config: {missing:?}",
                short_name(&test.unique_id)
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

/// Fixture formats dbt understands
const FIXTURE_FORMATS: [&str; 3] = ["csv", "dict", "sql"];

fn default_formats() -> Vec<String> {
    FIXTURE_FORMATS.iter().map(|f| f.to_string()).collect()
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct UnitTestExpectFormat {
    #[serde(default = "default_formats")]
    permitted_formats: Vec<String>,
}

impl Check for UnitTestExpectFormat {
    fn run(&self, target: Target<'_>, _ctx: &Context<'_>) -> CheckOutcome {
        let unit_test = target.unit_test()?;
        ensure(self.permitted_formats.contains(&unit_test.expect.format), || {
            format!(
                "Unit test `{}` has an `expect` format that is not permitted. Permitted formats are: {:?}.",
                unit_test.name, self.permitted_formats
            )
        })
    }

    fn validate(&self) -> Result<(), String> {
        match self.permitted_formats.iter().find(|f| !FIXTURE_FORMATS.contains(&f.as_str())) {
            Some(unknown) => Err(format!(
                "`{unknown}` is not a unit test format, expected one of {FIXTURE_FORMATS:?}"
            )),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::check::CheckError;
    use crate::checks::testing::manifest;
    use crate::context::Artifacts;
    use pretty_assertions::assert_eq;
    use sentinel_dbt::{Resource, Test, TestMetadata, UnitTest, UnitTestFixture};
    use serde_json::json;

    #[test]
    fn only_singular_tests_need_meta() {
        let artifacts = Artifacts::new(manifest(json!({})));
        let ctx = artifacts.context();
        let check: SingularTestHasMetaKeys = serde_json::from_value(json!({ "keys": ["owner"] })).unwrap();

        let singular = Test {
            unique_id: "test.shop.assert_positive_totals".to_string(),
            name: "assert_positive_totals".to_string(),
            ..Test::default()
        };
        assert_eq!(
            check.run(Target::resource(Resource::Test(&singular)), &ctx),
            Err(CheckError::failed(
                "`assert_positive_totals` is missing the following keys from the `meta` config: [\"owner\"]"
            ))
        );

        let generic = Test {
            test_metadata: Some(TestMetadata { name: "unique".to_string(), ..TestMetadata::default() }),
            ..singular.clone()
        };
        assert_eq!(check.run(Target::resource(Resource::Test(&generic)), &ctx), Ok(()));
    }

    #[test]
    fn expect_format() {
        let artifacts = Artifacts::new(manifest(json!({})));
        let unit_test = UnitTest {
            unique_id: "unit_test.shop.orders.test_orders_totals".to_string(),
            name: "test_orders_totals".to_string(),
            expect: UnitTestFixture { input: String::new(), format: "csv".to_string() },
            ..UnitTest::default()
        };
        let target = Target::resource(Resource::UnitTest(&unit_test));

        let default: UnitTestExpectFormat = serde_json::from_value(json!({})).unwrap();
        assert_eq!(default.run(target, &artifacts.context()), Ok(()));

        let dict_only: UnitTestExpectFormat =
            serde_json::from_value(json!({ "permitted_formats": ["dict"] })).unwrap();
        assert_eq!(
            dict_only.run(target, &artifacts.context()),
            Err(CheckError::failed(
                "Unit test `test_orders_totals` has an `expect` format that is not permitted. Permitted formats are: [\"dict\"]."
            ))
        );
    }

    #[test]
    fn unknown_formats_are_rejected() {
        let check: UnitTestExpectFormat =
            serde_json::from_value(json!({ "permitted_formats": ["yaml"] })).unwrap();
        assert!(check.validate().unwrap_err().contains("`yaml`"));
    }
}

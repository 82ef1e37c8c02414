//! Per-macro checks

use serde::Deserialize;
use sentinel_dbt::is_description_populated;
use crate::check::{ensure, Check, CheckOutcome, Target};
use crate::context::Context;
use crate::registry::{CheckKind, IterateOver};
use super::default_min_description_length;

pub(super) fn kinds() -> Vec<CheckKind> {
    vec![
        CheckKind::manifest::<MacroDescriptionPopulated>(
            "check_macro_description_populated",
            IterateOver::Macros,
            "Macros must have a populated description.",
        ),
        CheckKind::manifest::<MacroMaxNumberOfLines>(
            "check_macro_max_number_of_lines",
            IterateOver::Macros,
            "Macros cannot have more than the specified number of lines.",
        ),
    ]
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct MacroDescriptionPopulated {
    #[serde(default = "default_min_description_length")]
    min_description_length: usize,
}

impl Check for MacroDescriptionPopulated {
    fn run(&self, target: Target<'_>, _ctx: &Context<'_>) -> CheckOutcome {
        let dbt_macro = target.dbt_macro()?;
        ensure(
            is_description_populated(&dbt_macro.description, self.min_description_length),
            || format!("Macro `{}` does not have a populated description.", dbt_macro.name),
        )
    }
}

fn default_max_lines() -> usize {
    50
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct MacroMaxNumberOfLines {
    #[serde(default = "default_max_lines")]
    max_number_of_lines: usize,
}

impl Check for MacroMaxNumberOfLines {
    fn run(&self, target: Target<'_>, _ctx: &Context<'_>) -> CheckOutcome {
        let dbt_macro = target.dbt_macro()?;
        // a trailing newline counts as a line of its own
        let lines = dbt_macro.macro_sql.split('\n').count();

        ensure(lines <= self.max_number_of_lines, || {
            format!(
                "Macro `{}` has {lines} lines, this is more than the maximum permitted number of lines ({}).",
                dbt_macro.name, self.max_number_of_lines
            )
        })
    }
}

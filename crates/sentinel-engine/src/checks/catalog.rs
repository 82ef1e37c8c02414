//! Checks over catalog.json
//!
//! Warehouses disagree on identifier case, so column names are compared
//! case-insensitively with the columns declared in properties files.

use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use sentinel_core::{short_name, Pattern};
use sentinel_dbt::{resource_type_of, CatalogNode, Column};
use crate::check::{ensure, Check, CheckError, CheckOutcome, Target};
use crate::context::Context;
use crate::registry::{CheckKind, IterateOver};

pub(super) fn kinds() -> Vec<CheckKind> {
    vec![
        CheckKind::catalog::<ColumnsAreAllDocumented>(
            "check_columns_are_all_documented",
            IterateOver::CatalogNodes,
            "All columns in a model should be included in the model's properties file.",
        ),
        CheckKind::catalog::<ColumnNameCompliesToColumnType>(
            "check_column_name_complies_to_column_type",
            IterateOver::CatalogNodes,
            "Columns with the specified data types must match the supplied regex.",
        ),
        CheckKind::catalog::<SourceColumnsAreAllDocumented>(
            "check_source_columns_are_all_documented",
            IterateOver::CatalogSources,
            "All columns in a source should be included in the source's properties file.",
        ),
    ]
}

/// Catalog columns with no declared counterpart, in catalog order
fn undocumented<'a>(node: &'a CatalogNode, declared: &BTreeMap<String, Column>) -> Vec<&'a str> {
    let known: HashSet<String> = declared
        .iter()
        .flat_map(|(key, column)| [key.to_lowercase(), column.name.to_lowercase()])
        .collect();

    let mut columns: Vec<_> = node.columns.values().collect();
    columns.sort_by_key(|c| c.index);
    columns
        .into_iter()
        .filter(|c| !known.contains(&c.name.to_lowercase()))
        .map(|c| c.name.as_str())
        .collect()
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct ColumnsAreAllDocumented {}

impl Check for ColumnsAreAllDocumented {
    fn run(&self, target: Target<'_>, ctx: &Context<'_>) -> CheckOutcome {
        let node = target.catalog_node()?;
        // seeds and snapshots are catalogued too
        if resource_type_of(&node.unique_id) != Some("model") {
            return Ok(());
        }

        let model = ctx.manifest.model(&node.unique_id).ok_or_else(|| {
            CheckError::execution(format!("`{}` is in catalog.json but not in manifest.json", node.unique_id))
        })?;
        let missing = undocumented(node, &model.columns);

        ensure(missing.is_empty(), || {
            format!(
                "`{}` has columns that are not included in the models properties file: {missing:?}",
                short_name(&node.unique_id)
            )
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct ColumnNameCompliesToColumnType {
    column_name_pattern: Pattern,
    /// Warehouse data types, as reported in catalog.json
    types: Vec<String>,
}

impl Check for ColumnNameCompliesToColumnType {
    fn run(&self, target: Target<'_>, _ctx: &Context<'_>) -> CheckOutcome {
        let node = target.catalog_node()?;
        let non_complying: Vec<&str> = node
            .columns
            .values()
            .filter(|c| self.types.iter().any(|t| t.eq_ignore_ascii_case(&c.data_type)))
            .filter(|c| !self.column_name_pattern.is_match(&c.name))
            .map(|c| c.name.as_str())
            .collect();

        ensure(non_complying.is_empty(), || {
            format!(
                "`{}` has columns that don't comply with the specified regexp pattern (`{}`): {non_complying:?}",
                short_name(&node.unique_id),
                self.column_name_pattern.as_str()
            )
        })
    }

    fn validate(&self) -> Result<(), String> {
        if self.types.is_empty() {
            return Err("`types` must name at least one data type".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct SourceColumnsAreAllDocumented {}

impl Check for SourceColumnsAreAllDocumented {
    fn run(&self, target: Target<'_>, ctx: &Context<'_>) -> CheckOutcome {
        let node = target.catalog_source()?;
        let source = ctx.manifest.source(&node.unique_id).ok_or_else(|| {
            CheckError::execution(format!("`{}` is in catalog.json but not in manifest.json", node.unique_id))
        })?;
        let missing = undocumented(node, &source.columns);

        ensure(missing.is_empty(), || {
            format!(
                "`{}` has columns that are not included in the sources properties file: {missing:?}",
                node.unique_id
            )
        })
    }
}

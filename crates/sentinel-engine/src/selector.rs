//! Resource selection
//!
//! Decides whether a configured check applies to a resource. The order of
//! the filters is fixed: exclude, include, materialization, skip list.

use sentinel_core::CheckSettings;
use sentinel_dbt::{Resource, ResourceKind};

/// Whether the check configured by `settings` should run against `resource`
pub fn applies(settings: &CheckSettings, resource: Resource<'_>) -> bool {
    let path = resource.original_file_path();

    if let Some(exclude) = &settings.exclude {
        if exclude.is_match(path) {
            tracing::trace!(check = %settings.name, path, "excluded by path");
            return false;
        }
    }

    if let Some(include) = &settings.include {
        if !include.is_match(path) {
            tracing::trace!(check = %settings.name, path, "not included by path");
            return false;
        }
    }

    // Only models have a materialization; the filter is ignored for other kinds
    if let Some(wanted) = settings.materialization {
        if resource.kind() == ResourceKind::Model && resource.materialized() != Some(wanted.as_str()) {
            return false;
        }
    }

    if resource.skip_checks().contains(&settings.name.as_str()) {
        tracing::trace!(check = %settings.name, unique_id = resource.unique_id(), "skipped via meta");
        return false;
    }

    true
}

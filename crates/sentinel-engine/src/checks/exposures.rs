//! Exposure and semantic model checks
//!
//! Both look at the models they are built on. Upstream models outside the
//! project's package are not in the manifest and are ignored.

use serde::Deserialize;
use sentinel_dbt::{Access, Model};
use crate::check::{ensure, Check, CheckOutcome, Target};
use crate::context::Context;
use crate::registry::{CheckKind, IterateOver};

pub(super) fn kinds() -> Vec<CheckKind> {
    vec![
        CheckKind::manifest::<ExposureBasedOnView>(
            "check_exposure_based_on_view",
            IterateOver::Exposures,
            "Exposures should not be based on views.",
        ),
        CheckKind::manifest::<ExposureBasedOnNonPublicModels>(
            "check_exposure_based_on_non_public_models",
            IterateOver::Exposures,
            "Exposures should be based on public models only.",
        ),
        CheckKind::manifest::<SemanticModelBasedOnNonPublicModels>(
            "check_semantic_model_based_on_non_public_models",
            IterateOver::SemanticModels,
            "Semantic models should be based on public models only.",
        ),
    ]
}

fn upstream_models<'a>(ctx: &Context<'a>, depends_on: &'a [String]) -> impl Iterator<Item = &'a Model> + 'a {
    let manifest = ctx.manifest;
    depends_on.iter().filter_map(move |id| manifest.model(id))
}

fn non_public<'a>(ctx: &Context<'a>, depends_on: &'a [String]) -> Vec<&'a str> {
    upstream_models(ctx, depends_on)
        .filter(|m| m.access != Access::Public)
        .map(|m| m.name.as_str())
        .collect()
}

fn default_view_materializations() -> Vec<String> {
    vec!["ephemeral".to_string(), "view".to_string()]
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct ExposureBasedOnView {
    /// Materializations an exposure must not be built on
    #[serde(default = "default_view_materializations")]
    materializations_to_include: Vec<String>,
}

impl Check for ExposureBasedOnView {
    fn run(&self, target: Target<'_>, ctx: &Context<'_>) -> CheckOutcome {
        let exposure = target.exposure()?;
        let views: Vec<&str> = upstream_models(ctx, &exposure.depends_on)
            .filter(|m| {
                m.materialized
                    .as_ref()
                    .is_some_and(|mat| self.materializations_to_include.contains(mat))
            })
            .map(|m| m.name.as_str())
            .collect();

        ensure(views.is_empty(), || {
            format!("`{}` is based on a model that is not a table: {views:?}.", exposure.name)
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct ExposureBasedOnNonPublicModels {}

impl Check for ExposureBasedOnNonPublicModels {
    fn run(&self, target: Target<'_>, ctx: &Context<'_>) -> CheckOutcome {
        let exposure = target.exposure()?;
        let models = non_public(ctx, &exposure.depends_on);
        ensure(models.is_empty(), || {
            format!("`{}` is based on a model(s) that is not public: {models:?}.", exposure.name)
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct SemanticModelBasedOnNonPublicModels {}

impl Check for SemanticModelBasedOnNonPublicModels {
    fn run(&self, target: Target<'_>, ctx: &Context<'_>) -> CheckOutcome {
        let semantic_model = target.semantic_model()?;
        let models = non_public(ctx, &semantic_model.depends_on);
        ensure(models.is_empty(), || {
            format!(
                "Semantic model `{}` is based on a model(s) that is not public: {models:?}.",
                semantic_model.name
            )
        })
    }
}

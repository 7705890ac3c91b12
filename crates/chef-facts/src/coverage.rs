//! Coverage reduction
//!
//! Counts are a pure function of the extracted facts. Notes are advisory and never change a
//! count.
use crate::facts::{CustomResource, Recipe, RecipeBody};
use crate::issues::Issues;
use serde::Serialize;

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct CoverageReport {
    /// recipe files successfully parsed
    pub recipes: usize,
    /// resources in recipes and actions
    pub resources_total: usize,
    pub custom_resources: usize,
    pub properties_total: usize,
    /// template references, after enrichment
    pub templates_total: usize,
    pub dynamic_includes_total: usize,
    pub unknown_names_without_expr: usize,
    /// properties without a static name
    pub unresolved_properties: usize,
    pub unresolved_templates: usize,
    pub files_skipped: usize,
    pub notes: Vec<String>,
}

#[tracing::instrument(level = "trace", skip_all)]
pub(crate) fn aggregate(
    recipes: &[Recipe],
    custom_resources: &[CustomResource],
    issues: &Issues,
    unreferenced_templates: usize,
) -> CoverageReport {
    let recipe_bodies = recipes.iter().map(|recipe| &recipe.body);
    let action_bodies = custom_resources
        .iter()
        .flat_map(|custom_resource| &custom_resource.actions)
        .map(|action| &action.body);
    let bodies: Vec<&RecipeBody> = recipe_bodies.chain(action_bodies).collect();
    let properties = || custom_resources.iter().flat_map(|c| &c.properties);
    let templates = || bodies.iter().flat_map(|body| &body.templates);

    let mut report = CoverageReport {
        recipes: recipes.len(),
        resources_total: bodies.iter().map(|body| body.resources.len()).sum(),
        custom_resources: custom_resources.len(),
        properties_total: properties().count(),
        templates_total: templates().count(),
        dynamic_includes_total: bodies.iter().map(|body| body.includes_dynamic.len()).sum(),
        unknown_names_without_expr: bodies
            .iter()
            .flat_map(|body| &body.resources)
            .filter(|resource| resource.unknown_name_without_expr)
            .count(),
        unresolved_properties: properties()
            .filter(|property| property.name.is_none())
            .count(),
        unresolved_templates: templates()
            .filter(|template| template.unresolved.is_some())
            .count(),
        files_skipped: issues.files_skipped(),
        notes: issues.iter().map(ToString::to_string).collect(),
    };

    let recipe_resources: usize = recipes.iter().map(|r| r.body.resources.len()).sum();
    if recipe_resources == 0 && report.custom_resources > 0 {
        report.notes.push(
            "no resources declared in recipes, logic concentrated in custom resources".into(),
        );
    }
    if report.recipes == 0 && report.custom_resources == 0 {
        report
            .notes
            .push("no recipes or custom resources were extracted".into());
    }
    if unreferenced_templates > 0 {
        report.notes.push(format!(
            "{unreferenced_templates} template files unreferenced by any recipe or action"
        ));
    }
    if report.dynamic_includes_total > 0 {
        report.notes.push(format!(
            "{} dynamic includes could not be followed",
            report.dynamic_includes_total
        ));
    }
    if report.unknown_names_without_expr > 0 {
        report.notes.push(format!(
            "{} resources without a recoverable name",
            report.unknown_names_without_expr
        ));
    }
    if report.unresolved_properties > 0 {
        report.notes.push(format!(
            "{} properties without a static name",
            report.unresolved_properties
        ));
    }

    report
}

//! The fact document
//!
//! Everything in here is plain data: it owns its strings and refers to source positions only
//! through [Citation]s, so a [Cookbook] outlives the syntax trees it was extracted from.
//!
//! Serialization is the output contract consumed by downstream tooling. Field names and
//! ordering are part of that contract.
use crate::coverage::CoverageReport;
use crate::value::Value;
use indexmap::IndexMap;
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::PathBuf;

/// Where a fact was observed
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct Citation {
    /// path relative to the cookbook root, always `/`-separated
    pub file: String,
    /// 1-based
    pub line: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_line: Option<usize>,
}

impl Citation {
    pub fn new(file: impl Into<String>, line: usize, end_line: Option<usize>) -> Self {
        Self {
            file: file.into(),
            line,
            end_line: end_line.filter(|end| *end > line),
        }
    }
}

impl std::fmt::Display for Citation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

#[derive(Debug, Serialize)]
pub struct Cookbook {
    #[serde(skip)]
    pub root: PathBuf,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// as declared in the metadata, never resolved
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub depends: Vec<String>,
    pub recipes: Vec<Recipe>,
    pub custom_resources: Vec<CustomResource>,
    pub meta: Meta,
}

impl Cookbook {
    pub fn coverage(&self) -> &CoverageReport {
        &self.meta.coverage
    }

    /// Recipe bodies followed by action bodies
    pub fn bodies(&self) -> impl Iterator<Item = &RecipeBody> {
        let recipes = self.recipes.iter().map(|recipe| &recipe.body);
        let actions = self
            .custom_resources
            .iter()
            .flat_map(|resource| &resource.actions)
            .map(|action| &action.body);
        recipes.chain(actions)
    }
}

#[derive(Debug, Serialize)]
pub struct Meta {
    pub coverage: CoverageReport,
}

#[derive(Debug, Serialize)]
pub struct Recipe {
    pub file: Citation,
    /// `<cookbook>::<recipe>`
    pub name: String,
    #[serde(flatten)]
    pub body: RecipeBody,
}

/// What a recipe file or a custom resource action declares
#[derive(Debug, Default, Serialize)]
pub struct RecipeBody {
    pub resources: Vec<Resource>,
    pub includes: Vec<Include>,
    pub includes_dynamic: Vec<DynamicInclude>,
    pub attribute_reads: Vec<AttributeRead>,
    pub templates: Vec<Template>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Resource {
    #[serde(rename = "type")]
    pub kind: String,
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name_expr: Option<String>,
    pub attributes: IndexMap<String, Value>,
    pub citation: Citation,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub unknown_name_without_expr: bool,
}

impl Resource {
    pub fn new(
        kind: impl Into<String>,
        name: Option<String>,
        name_expr: Option<String>,
        attributes: IndexMap<String, Value>,
        citation: Citation,
    ) -> Self {
        // an expression is only kept when there is no literal name
        let name_expr = name_expr.filter(|_| name.is_none());
        let unknown_name_without_expr = name.is_none() && name_expr.is_none();

        Self {
            kind: kind.into(),
            name,
            name_expr,
            attributes,
            citation,
            unknown_name_without_expr,
        }
    }
}

/// `include_recipe` with a literal target
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Include {
    /// `<cookbook>::<recipe>`
    pub target: String,
    pub citation: Citation,
}

/// `include_recipe` with a computed target
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DynamicInclude {
    pub expr: String,
    pub citation: Citation,
}

/// A read of a node attribute, `node['a']['b']` or `node.a.b`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttributeRead {
    /// static segments; stops before the first computed one
    pub path: Vec<String>,
    pub expr: String,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub dynamic: bool,
    pub citation: Citation,
}

/// A `template` resource and what is known about the file it renders
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Template {
    pub source: Option<String>,
    /// the declaring resource
    pub citation: Citation,
    /// the resolved template file
    pub file: Option<Citation>,
    pub vars: IndexMap<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vars_expr: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance_vars: Option<BTreeSet<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attribute_reads: Option<BTreeSet<Vec<String>>>,
    /// instance variables the template uses but `variables` does not supply
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unsupplied_vars: Option<BTreeSet<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unresolved: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CustomResource {
    pub file: Citation,
    pub provides: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_action: Option<String>,
    pub properties: Vec<Property>,
    pub actions: Vec<Action>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Property {
    pub name: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    pub required: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub name_property: bool,
    pub citation: Citation,
}

#[derive(Debug, Serialize)]
pub struct Action {
    pub name: String,
    pub citation: Citation,
    #[serde(flatten)]
    pub body: RecipeBody,
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn single_line_citation_has_no_end() {
        let citation = Citation::new("recipes/default.rb", 3, Some(3));
        assert_eq!(citation.end_line, None);
        assert_eq!(citation.to_string(), "recipes/default.rb:3");
    }

    #[test]
    fn resource_name_invariant() {
        let at = Citation::new("recipes/default.rb", 1, None);

        let named = Resource::new(
            "package",
            Some("nginx".into()),
            Some("'nginx'".into()),
            Default::default(),
            at.clone(),
        );
        assert_eq!(named.name_expr, None);
        assert!(!named.unknown_name_without_expr);

        let unknown = Resource::new("package", None, None, Default::default(), at);
        assert!(unknown.unknown_name_without_expr);
    }

    #[test]
    fn resource_serialization() {
        let resource = Resource::new(
            "package",
            Some("nginx".into()),
            None,
            [("action".to_string(), Value::Symbol("install".into()))]
                .into_iter()
                .collect(),
            Citation::new("recipes/default.rb", 1, None),
        );

        let json = serde_json::to_value(&resource).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "type": "package",
                "name": "nginx",
                "attributes": { "action": ":install" },
                "citation": { "file": "recipes/default.rb", "line": 1 },
            })
        );
    }
}

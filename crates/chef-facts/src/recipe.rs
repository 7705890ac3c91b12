//! Recipe body analysis
//!
//! A recipe file and the body of a custom resource action are the same thing structurally,
//! so both go through [analyze_body].
//!
//! What counts as a resource declaration: a call without receiver, at statement position,
//! whose method is a plain identifier outside [NOT_RESOURCES] and that has a title argument,
//! a block without parameters or both. Control flow around it (`if`, `case`, `.each do`)
//! is looked through since nothing is evaluated. On the right of an assignment only a call
//! with a block counts.
use crate::attributes;
use crate::facts::{DynamicInclude, Include, Recipe, RecipeBody, Resource, Template};
use crate::issues::{Issue, Issues};
use crate::syntax::{Grammar, Pattern};
use crate::util::{Call, NodeExt, SourceFile};
use crate::value::Value;
use crate::visit::{Visit, VisitNodes, Walk};
use indexmap::IndexMap;
use std::collections::HashSet;
use std::sync::LazyLock;
use tree_sitter::Node;

static CALLS: LazyLock<Pattern> = LazyLock::new(|| {
    Pattern::new(Grammar::Ruby, "(call method: (identifier)) @call", "call")
        .expect("call query must compile")
});

/// DSL and ruby methods that look like resource declarations but are not
const NOT_RESOURCES: &[&str] = &[
    "include_recipe",
    "require",
    "require_relative",
    "raise",
    "fail",
    "puts",
    "print",
    "printf",
    "p",
    "pp",
    "warn",
    "sleep",
    "exit",
    "abort",
    "lazy",
    "loop",
    "lambda",
    "proc",
    "catch",
    "throw",
    "include",
    "extend",
    "private",
    "protected",
    "public",
    "define_method",
    "attr_accessor",
    "attr_reader",
    "attr_writer",
    "search",
    "data_bag",
    "data_bag_item",
    "value_for_platform",
    "value_for_platform_family",
    "resources",
    "find_resource",
    "delete_resource",
    "format",
    "sprintf",
    "load",
    "rand",
    "tag",
    "untag",
    "shell_out",
    "converge_by",
    "converge_if_changed",
    "load_current_value",
    "current_value_does_not_exist",
    "action_class",
    "property",
    "attribute",
    "provides",
    "resource_name",
    "default_action",
    "allowed_actions",
    "unified_mode",
    "use",
    "action",
    "with_run_context",
    "notifies",
    "subscribes",
    "only_if",
    "not_if",
];

/// Resource declarations that name their type in the first argument
const GENERIC_DECLARATIONS: &[&str] = &["declare_resource", "edit_resource"];

const TEMPLATE_RESOURCE: &str = "template";

/// Analyze a whole recipe file
#[tracing::instrument(level = "trace", skip_all, fields(path = file.path))]
pub(crate) fn analyze_recipe(file: &SourceFile, name: String, issues: &mut Issues) -> Recipe {
    let body = analyze_body(file, file.tree.root(), issues);
    Recipe {
        file: file.cite_file(),
        name,
        body,
    }
}

/// Analyze everything below `scope` as a recipe body
pub(crate) fn analyze_body<'t>(
    file: &SourceFile<'t>,
    scope: Node<'t>,
    issues: &mut Issues,
) -> RecipeBody {
    let mut collector = ResourceCollector::new(file, issues);
    scope.visit_nodes(&mut collector);
    let resources = collector.resources;

    let templates = resources
        .iter()
        .filter(|resource| resource.kind == TEMPLATE_RESOURCE)
        .map(|resource| template_reference(file.cookbook, resource))
        .collect();

    let (includes, includes_dynamic) = includes(file, scope, issues);

    RecipeBody {
        resources,
        includes,
        includes_dynamic,
        attribute_reads: attributes::reads(file, scope),
        templates,
    }
}

struct ResourceCollector<'a, 't> {
    file: &'a SourceFile<'t>,
    issues: &'a mut Issues,
    resources: Vec<Resource>,
}

impl<'a, 't> ResourceCollector<'a, 't> {
    fn new(file: &'a SourceFile<'t>, issues: &'a mut Issues) -> Self {
        Self {
            file,
            issues,
            resources: vec![],
        }
    }
}

impl<'a, 't> Visit<Node<'t>> for ResourceCollector<'a, 't> {
    fn visit(&mut self, node: Node<'t>) -> Walk {
        let Some(call) = Call::new(node) else {
            return Walk::Descend;
        };
        if !is_resource_declaration(self.file, &call) {
            return Walk::Descend;
        }

        if let Some(resource) = resource(self.file, &call, self.issues) {
            tracing::trace!(kind = %resource.kind, line = resource.citation.line, "resource");
            self.resources.push(resource);
        }

        // whatever is inside a resource block configures that resource
        Walk::Skip
    }
}

fn is_resource_declaration(file: &SourceFile, call: &Call) -> bool {
    let Some(method) = call.bare_name(file) else {
        return false;
    };

    if NOT_RESOURCES.contains(&method) || method.ends_with('?') || method.ends_with('!') {
        return false;
    }
    if call.arguments.is_empty() && call.block.is_none() {
        return false;
    }
    if call.has_block_parameters() {
        return false;
    }

    // `svc = service 'x' do ... end` declares, `port = format(...)` does not
    call.node.is_statement() || (call.block.is_some() && call.node.is_assignment_value())
}

fn resource(file: &SourceFile, call: &Call, issues: &mut Issues) -> Option<Resource> {
    let method = file.text(call.method);
    let mut positional = call.positional();

    let kind = if GENERIC_DECLARATIONS.contains(&method) {
        let kind = positional
            .next()
            .and_then(|node| Value::from_node(file, node).as_name().map(str::to_string));
        let Some(kind) = kind else {
            issues.log(Issue::MalformedNode {
                at: file.cite(call.node),
                reason: "resource type is not a literal",
            });
            return None;
        };
        kind
    } else {
        method.to_string()
    };

    let (name, name_expr) = match positional.next() {
        Some(title) => match Value::from_node(file, title) {
            Value::String(name) => (Some(name), None),
            _ => (None, Some(file.text(title).to_string())),
        },
        None => (None, None),
    };

    let attributes = call
        .block
        .map(|block| resource_attributes(file, block))
        .unwrap_or_default();

    Some(Resource::new(
        kind,
        name,
        name_expr,
        attributes,
        file.cite(call.node),
    ))
}

/// Attribute calls inside a resource block
///
/// Repeated attributes (e.g. several `notifies`) are collected into an array in source order.
fn resource_attributes<'t>(file: &SourceFile<'t>, block: Node<'t>) -> IndexMap<String, Value> {
    let mut attributes: IndexMap<String, Value> = IndexMap::new();
    let mut repeated = HashSet::new();

    block.visit_nodes(&mut |node: Node<'t>| {
        let Some(call) = Call::new(node) else {
            return Walk::Descend;
        };
        let Some(key) = call.bare_name(file).filter(|_| node.is_statement()) else {
            return Walk::Descend;
        };

        let value = attribute_value(file, &call);
        match attributes.get_mut(key) {
            None => {
                attributes.insert(key.to_string(), value);
            }
            Some(existing) => {
                if repeated.insert(key.to_string()) {
                    let first = std::mem::replace(existing, Value::Null);
                    *existing = Value::Array(vec![first, value]);
                } else if let Value::Array(occurrences) = existing {
                    occurrences.push(value);
                }
            }
        }

        Walk::Skip
    });

    attributes
}

fn attribute_value(file: &SourceFile, call: &Call) -> Value {
    match call.block {
        Some(block) => {
            let start = call.arguments.first().copied().unwrap_or(block);
            Value::Expression(file.text_between(start, block).to_string())
        }
        None => Value::from_arguments(file, &call.arguments),
    }
}

fn includes(
    file: &SourceFile,
    scope: Node,
    issues: &mut Issues,
) -> (Vec<Include>, Vec<DynamicInclude>) {
    let mut includes = vec![];
    let mut dynamic = vec![];

    for node in file.tree.find_all(&CALLS, scope) {
        let Some(call) = Call::new(node) else {
            continue;
        };
        if call.bare_name(file) != Some("include_recipe") {
            continue;
        }

        if call.arguments.is_empty() {
            issues.log(Issue::MalformedNode {
                at: file.cite(node),
                reason: "include_recipe without arguments",
            });
            continue;
        }

        for argument in &call.arguments {
            match Value::from_node(file, *argument) {
                Value::String(target) => includes.push(Include {
                    target: recipe_identifier(file.cookbook, &target),
                    citation: file.cite(node),
                }),
                _ => dynamic.push(DynamicInclude {
                    expr: file.text(*argument).to_string(),
                    citation: file.cite(node),
                }),
            }
        }
    }

    (includes, dynamic)
}

/// `apache2` is `apache2::default`, `::mod_ssl` refers to the current cookbook
pub(crate) fn recipe_identifier(cookbook: &str, target: &str) -> String {
    if let Some(recipe) = target.strip_prefix("::") {
        format!("{cookbook}::{recipe}")
    } else if target.contains("::") {
        target.to_string()
    } else {
        format!("{target}::default")
    }
}

/// Template reference of a `template` resource, before enrichment
fn template_reference(cookbook: &str, resource: &Resource) -> Template {
    let mut unresolved = None;

    let source = match resource.attributes.get("source") {
        Some(Value::String(source)) => Some(source.clone()),
        // the first entry is the preferred one
        Some(Value::Array(sources)) => sources.first().and_then(Value::as_str).map(str::to_string),
        Some(_) => None,
        None => resource.name.as_deref().map(|path| {
            let file_name = path.rsplit('/').next().unwrap_or(path);
            format!("{file_name}.erb")
        }),
    };
    if source.is_none() {
        unresolved = Some("template source is not a literal".to_string());
    }

    match resource.attributes.get("cookbook") {
        Some(Value::String(other)) if other != cookbook => {
            unresolved = Some(format!("template belongs to cookbook '{other}'"));
        }
        Some(value) if value.as_str().is_none() => {
            unresolved = Some("template cookbook is not a literal".to_string());
        }
        _ => {}
    }

    if resource.attributes.get("local") == Some(&Value::Boolean(true)) {
        unresolved = Some("local template outside the cookbook".to_string());
    }

    let (vars, vars_expr) = match resource.attributes.get("variables") {
        None => (IndexMap::new(), None),
        Some(Value::Object(vars)) => (vars.clone(), None),
        Some(Value::Expression(expr)) => (IndexMap::new(), Some(expr.clone())),
        Some(other) => (
            IndexMap::new(),
            Some(serde_json::to_string(other).unwrap_or_default()),
        ),
    };

    Template {
        source,
        citation: resource.citation.clone(),
        file: None,
        vars,
        vars_expr,
        instance_vars: None,
        attribute_reads: None,
        unsupplied_vars: None,
        unresolved,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::facts::Citation;
    use crate::util::test::{recipe_file, ruby};
    use pretty_assertions::assert_eq;

    fn analyze(source: &str) -> (Recipe, Issues) {
        let tree = ruby(source);
        let file = recipe_file(&tree);
        let mut issues = Issues::new();
        let recipe = analyze_recipe(&file, "test::default".into(), &mut issues);
        (recipe, issues)
    }

    #[test]
    fn literal_title() {
        let (recipe, _) = analyze("package 'nginx'\n");

        assert_eq!(
            recipe.body.resources,
            vec![Resource::new(
                "package",
                Some("nginx".into()),
                None,
                IndexMap::new(),
                Citation::new("recipes/default.rb", 1, None),
            )]
        );
    }

    #[test]
    fn dynamic_title() {
        let (recipe, _) = analyze("service node['app']['name'] do\n  action :start\nend\n");
        let resource = &recipe.body.resources[0];

        assert_eq!(resource.kind, "service");
        assert_eq!(resource.name, None);
        assert_eq!(resource.name_expr.as_deref(), Some("node['app']['name']"));
        assert!(!resource.unknown_name_without_expr);
        assert_eq!(resource.citation, Citation::new("recipes/default.rb", 1, Some(3)));
    }

    #[test]
    fn interpolated_title_is_expression() {
        let (recipe, _) = analyze("directory \"/srv/#{app}\"\n");
        let resource = &recipe.body.resources[0];

        assert_eq!(resource.name, None);
        assert_eq!(resource.name_expr.as_deref(), Some("\"/srv/#{app}\""));
    }

    #[test]
    fn missing_title_is_flagged() {
        let (recipe, _) = analyze("build_essential do\n  compile_time true\nend\n");
        let resource = &recipe.body.resources[0];

        assert_eq!(resource.kind, "build_essential");
        assert!(resource.unknown_name_without_expr);
    }

    #[test]
    fn attributes() {
        let (recipe, _) = analyze(
            r#"
template '/etc/nginx/nginx.conf' do
  owner 'root'
  mode '0644'
  sensitive true
  notifies :reload, 'service[nginx]', :delayed
  notifies :restart, 'service[php]'
  only_if { ::File.exist?('/etc/nginx') }
  content lazy { IO.read('/tmp/x') }
end
"#,
        );
        let attributes = &recipe.body.resources[0].attributes;

        assert_eq!(attributes["owner"], Value::from("root"));
        assert_eq!(attributes["mode"], Value::from("0644"));
        assert_eq!(attributes["sensitive"], Value::Boolean(true));
        assert_eq!(
            attributes["notifies"],
            Value::Array(vec![
                Value::Array(vec![
                    Value::Symbol("reload".into()),
                    Value::from("service[nginx]"),
                    Value::Symbol("delayed".into()),
                ]),
                Value::Array(vec![
                    Value::Symbol("restart".into()),
                    Value::from("service[php]"),
                ]),
            ])
        );
        assert_eq!(
            attributes["only_if"],
            Value::Expression("{ ::File.exist?('/etc/nginx') }".into())
        );
        assert!(!attributes["content"].is_literal());
    }

    #[test]
    fn control_flow_is_looked_through() {
        let (recipe, _) = analyze(
            r#"
if platform_family?('debian')
  package 'apt-transport-https'
else
  package 'yum-utils'
end

%w(git curl).each do |pkg|
  package pkg
end

case node['platform']
when 'ubuntu'
  service 'ufw'
end

log 'done' unless node['quiet']
"#,
        );

        let names: Vec<_> = recipe
            .body
            .resources
            .iter()
            .map(|r| (r.kind.as_str(), r.name.as_deref(), r.name_expr.as_deref()))
            .collect();

        assert_eq!(
            names,
            vec![
                ("package", Some("apt-transport-https"), None),
                ("package", Some("yum-utils"), None),
                ("package", None, Some("pkg")),
                ("service", Some("ufw"), None),
                ("log", Some("done"), None),
            ]
        );
    }

    #[test]
    fn helper_calls_are_not_resources() {
        let (recipe, _) = analyze(
            r#"
port = format('%d', 80)
pkgs = value_for_platform_family('debian' => 'apt')
svc = resources('service[nginx]')
existing = find_resource(:service, 'nginx')
delete_resource(:file, '/tmp/old')
load 'helpers.rb'
wait = rand(10)
label = sprintf('%s', 'x')
package 'nginx'
"#,
        );

        let kinds: Vec<_> = recipe.body.resources.iter().map(|r| r.kind.as_str()).collect();
        assert_eq!(kinds, vec!["package"]);
    }

    #[test]
    fn assigned_declaration_with_block() {
        let (recipe, _) = analyze(
            "conf = template '/etc/app.conf' do
  source 'app.erb'
end
name = node_name('x')
",
        );

        assert_eq!(recipe.body.resources.len(), 1);
        assert_eq!(recipe.body.resources[0].kind, "template");
        assert_eq!(recipe.body.resources[0].name.as_deref(), Some("/etc/app.conf"));
        assert_eq!(recipe.body.templates.len(), 1);
    }

    #[test]
    fn nested_calls_are_not_resources() {
        let (recipe, _) = analyze(
            "ruby_block 'x' do\n  block do\n    file '/tmp/y'\n  end\nend\nputs 'hello'\n",
        );

        assert_eq!(recipe.body.resources.len(), 1);
        assert_eq!(recipe.body.resources[0].kind, "ruby_block");
    }

    #[test]
    fn generic_declarations() {
        let (recipe, issues) = analyze(
            "declare_resource(:package, 'vim')\nedit_resource(kind, 'x')\n",
        );

        assert_eq!(recipe.body.resources.len(), 1);
        assert_eq!(recipe.body.resources[0].kind, "package");
        assert_eq!(recipe.body.resources[0].name.as_deref(), Some("vim"));
        assert_eq!(issues.iter().count(), 1);
    }

    #[test]
    fn includes() {
        let (recipe, issues) = analyze(
            r##"
include_recipe 'apt'
include_recipe '::users'
include_recipe 'nginx::service' if node['web']
include_recipe "#{cookbook_name}::#{node['flavor']}"
include_recipe
"##,
        );

        let targets: Vec<_> = recipe.body.includes.iter().map(|i| i.target.as_str()).collect();
        assert_eq!(targets, vec!["apt::default", "test::users", "nginx::service"]);

        assert_eq!(recipe.body.includes_dynamic.len(), 1);
        assert_eq!(
            recipe.body.includes_dynamic[0].expr,
            "\"#{cookbook_name}::#{node['flavor']}\""
        );
        assert_eq!(recipe.body.includes_dynamic[0].citation.line, 5);

        // bare `include_recipe` is an identifier, not a call
        assert!(issues.is_empty());
    }

    #[test]
    fn attribute_reads_anywhere() {
        let (recipe, _) = analyze(
            "port = node['app']['port']\npackage 'a' do\n  version node['a']['version']\nend\n",
        );

        let paths: Vec<_> = recipe
            .body
            .attribute_reads
            .iter()
            .map(|read| read.path.join("."))
            .collect();
        assert_eq!(paths, vec!["app.port", "a.version"]);
    }

    #[test]
    fn template_references() {
        let (recipe, _) = analyze(
            r#"
template '/etc/app/app.conf' do
  variables(port: 80, host: node['fqdn'])
end

template 'motd' do
  path '/etc/motd'
  source 'motd.erb'
  cookbook 'other'
end

template node['app']['config'] do
  source 'config.erb'
  variables lazy { config_vars }
end
"#,
        );

        let templates = &recipe.body.templates;
        assert_eq!(templates.len(), 3);

        assert_eq!(templates[0].source.as_deref(), Some("app.conf.erb"));
        assert_eq!(templates[0].vars["port"], Value::Integer(80));
        assert_eq!(
            templates[0].vars["host"],
            Value::Expression("node['fqdn']".into())
        );
        assert_eq!(templates[0].unresolved, None);

        assert_eq!(templates[1].source.as_deref(), Some("motd.erb"));
        assert_eq!(
            templates[1].unresolved.as_deref(),
            Some("template belongs to cookbook 'other'")
        );

        assert_eq!(templates[2].source.as_deref(), Some("config.erb"));
        assert!(templates[2].vars.is_empty());
        assert_eq!(templates[2].vars_expr.as_deref(), Some("lazy { config_vars }"));
    }

    #[test]
    fn recipe_identifiers() {
        assert_eq!(recipe_identifier("web", "apt"), "apt::default");
        assert_eq!(recipe_identifier("web", "::ssl"), "web::ssl");
        assert_eq!(recipe_identifier("web", "nginx::repo"), "nginx::repo");
    }
}

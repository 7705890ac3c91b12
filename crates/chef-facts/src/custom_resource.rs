//! Custom resource analysis
//!
//! Only top-level statements of a `resources/*.rb` file are declarations. Helpers inside
//! `action_class` and `load_current_value` are ignored, action bodies are handed to
//! [recipe::analyze_body].
use crate::facts::{Action, CustomResource, Property};
use crate::issues::{Issue, Issues};
use crate::recipe;
use crate::util::{Call, NodeExt, SourceFile};
use crate::value::Value;
use indexmap::IndexMap;
use tree_sitter::Node;

#[tracing::instrument(level = "trace", skip_all, fields(path = file.path))]
pub(crate) fn analyze_custom_resource(
    file: &SourceFile,
    stem: &str,
    issues: &mut Issues,
) -> CustomResource {
    let mut custom_resource = CustomResource {
        file: file.cite_file(),
        provides: vec![],
        default_action: None,
        properties: vec![],
        actions: vec![],
    };

    for statement in file.tree.root().named() {
        let Some(call) = Call::new(statement) else {
            continue;
        };
        let Some(method) = call.bare_name(file) else {
            continue;
        };

        match method {
            "provides" | "resource_name" => match first_name(file, &call) {
                Some(name) => {
                    if !custom_resource.provides.contains(&name) {
                        custom_resource.provides.push(name);
                    }
                }
                None => issues.log(Issue::MalformedNode {
                    at: file.cite(statement),
                    reason: "provides without a literal name",
                }),
            },
            "default_action" => custom_resource.default_action = first_name(file, &call),
            "property" | "attribute" => custom_resource.properties.push(property(file, &call)),
            "action" => {
                if let Some(action) = action(file, &call, issues) {
                    custom_resource.actions.push(action);
                }
            }
            _ => {}
        }
    }

    if custom_resource.provides.is_empty() {
        let name = format!("{}_{}", file.cookbook, stem);
        issues.log(Issue::ImplicitProvides {
            file: file.path.to_string(),
            name: name.clone(),
        });
        custom_resource.provides.push(name);
    }

    custom_resource
}

fn first_name(file: &SourceFile, call: &Call) -> Option<String> {
    call.positional()
        .next()
        .and_then(|node| Value::from_node(file, node).as_name().map(str::to_string))
}

/// `property :name, Type, option: value, ...`
///
/// Legacy `attribute :name, kind_of: Type` declarations are read the same way.
fn property(file: &SourceFile, call: &Call) -> Property {
    let mut positional = call.positional();
    let name = positional
        .next()
        .and_then(|node| Value::from_node(file, node).as_name().map(str::to_string));
    let declared_type = positional.next();

    let options: IndexMap<String, Node> = call
        .pairs()
        .filter_map(|pair| {
            let key = Value::key_of(file, pair.child_by_field_name("key")?)?;
            Some((key, pair.child_by_field_name("value")?))
        })
        .collect();
    let option = |key: &str| options.get(key).map(|node| Value::from_node(file, *node));

    let kind = declared_type
        .or_else(|| options.get("kind_of").copied())
        .map(|node| file.text(node).to_string());

    let required = match option("required") {
        Some(Value::Boolean(required)) => required,
        // required for a list of actions
        Some(Value::Array(actions)) => !actions.is_empty(),
        _ => false,
    };

    let name_property = [option("name_property"), option("name_attribute")]
        .contains(&Some(Value::Boolean(true)));

    Property {
        name,
        kind,
        default: option("default"),
        required,
        name_property,
        citation: file.cite(call.node),
    }
}

fn action(file: &SourceFile, call: &Call, issues: &mut Issues) -> Option<Action> {
    let Some(block) = call.block else {
        issues.log(Issue::MalformedNode {
            at: file.cite(call.node),
            reason: "action without a block",
        });
        return None;
    };

    let name = match call.positional().next() {
        Some(node) => match Value::from_node(file, node).as_name() {
            Some(name) => name.to_string(),
            None => file.text(node).to_string(),
        },
        None => {
            issues.log(Issue::MalformedNode {
                at: file.cite(call.node),
                reason: "action without a name",
            });
            return None;
        }
    };

    Some(Action {
        name,
        citation: file.cite(call.node),
        body: recipe::analyze_body(file, block, issues),
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::util::test::ruby;
    use pretty_assertions::assert_eq;

    fn analyze(source: &str) -> (CustomResource, Issues) {
        let tree = ruby(source);
        let file = SourceFile::new("web", "resources/site.rb", &tree);
        let mut issues = Issues::new();
        let custom_resource = analyze_custom_resource(&file, "site", &mut issues);
        (custom_resource, issues)
    }

    const SITE: &str = r#"
provides :web_site
unified_mode true
default_action :create

property :site_name, String, name_property: true
property :port, Integer, default: 80
property :root, String, required: true
property :aliases, [Array, String], default: lazy { [node['fqdn']] }
property :owner, kind_of: String, required: [:create]
property name_var

action :create do
  directory new_resource.root do
    owner new_resource.owner
  end

  template "/etc/nginx/sites-available/#{new_resource.site_name}" do
    source 'site.conf.erb'
    variables(port: new_resource.port)
  end
end

action :delete do
  include_recipe '::cleanup'
end

action_class do
  def helper
    file '/tmp/not-a-resource'
  end
end
"#;

    #[test]
    fn provides_and_default_action() {
        let (custom_resource, issues) = analyze(SITE);
        assert_eq!(custom_resource.provides, vec!["web_site"]);
        assert_eq!(custom_resource.default_action.as_deref(), Some("create"));
        assert!(issues.is_empty());
    }

    #[test]
    fn properties() {
        let (custom_resource, _) = analyze(SITE);
        let properties = &custom_resource.properties;
        assert_eq!(properties.len(), 6);

        assert_eq!(properties[0].name.as_deref(), Some("site_name"));
        assert_eq!(properties[0].kind.as_deref(), Some("String"));
        assert!(properties[0].name_property);
        assert!(!properties[0].required);

        assert_eq!(properties[1].default, Some(Value::Integer(80)));
        assert!(properties[2].required);
        assert_eq!(properties[3].kind.as_deref(), Some("[Array, String]"));
        assert!(!properties[3].default.as_ref().unwrap().is_literal());

        assert_eq!(properties[4].kind.as_deref(), Some("String"));
        assert!(properties[4].required);

        // name is not statically known, still emitted
        assert_eq!(properties[5].name, None);
        assert_eq!(properties[5].citation.line, 11);
    }

    #[test]
    fn actions() {
        let (custom_resource, _) = analyze(SITE);
        let actions = &custom_resource.actions;

        let names: Vec<_> = actions.iter().map(|action| action.name.as_str()).collect();
        assert_eq!(names, vec!["create", "delete"]);

        let create = &actions[0].body;
        assert_eq!(create.resources.len(), 2);
        assert_eq!(create.resources[0].kind, "directory");
        assert_eq!(
            create.resources[0].name_expr.as_deref(),
            Some("new_resource.root")
        );
        assert_eq!(create.templates.len(), 1);
        assert_eq!(create.templates[0].source.as_deref(), Some("site.conf.erb"));

        let delete = &actions[1].body;
        assert!(delete.resources.is_empty());
        assert_eq!(delete.includes[0].target, "web::cleanup");
    }

    #[test]
    fn implicit_provides() {
        let (custom_resource, issues) =
            analyze("property :x, String\n\naction :run do\n  log 'x'\nend\n");

        assert_eq!(custom_resource.provides, vec!["web_site"]);
        assert_eq!(
            issues.iter().map(ToString::to_string).collect::<Vec<_>>(),
            vec!["resources/site.rb: no provides declared, assuming 'web_site'"]
        );
    }

    #[test]
    fn action_without_block() {
        let (custom_resource, issues) = analyze("provides :x\naction :run\n");
        assert!(custom_resource.actions.is_empty());
        assert_eq!(issues.iter().count(), 1);
    }
}

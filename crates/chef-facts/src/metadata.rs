//! Cookbook metadata
//!
//! Only what can be read without evaluating anything: literal `name`, `version` and
//! `depends` calls at the top level of `metadata.rb`, or the same fields of `metadata.json`.
use crate::cookbook_files::{read_source, FileParseError};
use crate::syntax::{self, Grammar};
use crate::util::{Call, NodeExt, SourceFile};
use crate::value::Value;
use indexmap::IndexMap;
use std::path::Path;

#[derive(Debug, Default, Clone, PartialEq)]
pub struct Metadata {
    pub name: Option<String>,
    pub version: Option<String>,
    /// cookbook names, in declaration order
    pub depends: Vec<String>,
}

#[derive(serde::Deserialize)]
struct MetadataJson {
    name: Option<String>,
    version: Option<String>,
    #[serde(default)]
    dependencies: IndexMap<String, serde_json::Value>,
}

pub(crate) fn read_metadata(path: &Path) -> Result<Metadata, FileParseError> {
    let source = read_source(path)?;
    if path.extension().is_some_and(|extension| extension == "json") {
        from_json(&source)
    } else {
        from_ruby(&source)
    }
}

fn from_json(source: &str) -> Result<Metadata, FileParseError> {
    let json: MetadataJson = serde_json::from_str(source)?;
    Ok(Metadata {
        name: json.name,
        version: json.version,
        depends: json.dependencies.into_keys().collect(),
    })
}

fn from_ruby(source: &str) -> Result<Metadata, FileParseError> {
    let tree = syntax::parse(source, Grammar::Ruby)?;
    tree.check()?;
    let file = SourceFile::new("", "metadata.rb", &tree);

    let mut metadata = Metadata::default();
    for statement in tree.root().named() {
        let Some(call) = Call::new(statement) else {
            continue;
        };
        let Some(method) = call.bare_name(&file) else {
            continue;
        };
        let argument = call
            .positional()
            .next()
            .map(|node| Value::from_node(&file, node))
            .and_then(|value| value.as_str().map(str::to_string));

        match (method, argument) {
            ("name", Some(name)) => metadata.name = Some(name),
            ("version", Some(version)) => metadata.version = Some(version),
            ("depends", Some(cookbook)) => {
                if !metadata.depends.contains(&cookbook) {
                    metadata.depends.push(cookbook);
                }
            }
            _ => {}
        }
    }

    Ok(metadata)
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn ruby_metadata() {
        let metadata = from_ruby(
            r#"
name 'web'
maintainer 'Ops'
version '2.1.0'
chef_version '>= 16'

depends 'nginx', '~> 12.0'
depends 'apt'
depends node_dependency if ENV['EXTRA']
supports 'ubuntu'
"#,
        )
        .unwrap();

        assert_eq!(
            metadata,
            Metadata {
                name: Some("web".into()),
                version: Some("2.1.0".into()),
                depends: vec!["nginx".into(), "apt".into()],
            }
        );
    }

    #[test]
    fn json_metadata() {
        let metadata = from_json(
            r#"{"name": "web", "version": "2.1.0", "dependencies": {"nginx": "~> 12.0", "apt": ">= 0.0.0"}}"#,
        )
        .unwrap();

        assert_eq!(metadata.name.as_deref(), Some("web"));
        assert_eq!(metadata.depends, vec!["nginx", "apt"]);
    }

    #[test]
    fn broken_metadata() {
        assert!(matches!(
            from_ruby("name 'web\n"),
            Err(FileParseError::Parse(_))
        ));
        assert!(matches!(from_json("{"), Err(FileParseError::Json(_))));
    }
}

//! node attribute reads
//!
//! An attribute read is a chain rooted at `node`, in bracket (`node['a']['b']`) or dotted
//! (`node.a.b`) form, or a mix of both. Only the outermost chain is reported and assignment
//! targets (`node.default['a'] = 1`) are writes, not reads.
use crate::facts::AttributeRead;
use crate::syntax::{Grammar, Pattern};
use crate::util::{Call, NodeExt, SourceFile};
use crate::value::Value;
use std::sync::LazyLock;
use tree_sitter::Node;

static CHAINS: LazyLock<Pattern> = LazyLock::new(|| {
    Pattern::new(Grammar::Ruby, "[(element_reference) (call)] @chain", "chain")
        .expect("attribute chain query must compile")
});

/// Methods that end an attribute chain rather than extend it
const TERMINAL_METHODS: &[&str] = &[
    "to_s", "to_i", "to_f", "to_a", "to_h", "to_sym", "to_hash", "to_json", "each", "each_pair",
    "map", "select", "reject", "keys", "values", "size", "length", "count", "first", "last",
    "join", "split", "strip", "upcase", "downcase", "dup", "merge", "sort", "uniq", "compact",
    "flatten", "inspect",
];

pub(crate) fn reads<'t>(file: &SourceFile<'t>, scope: Node<'t>) -> Vec<AttributeRead> {
    file.tree
        .find_all(&CHAINS, scope)
        .into_iter()
        .filter(|node| !extends_chain(file, node.parent(), *node))
        .filter(|node| !node.is_assignment_target())
        .filter_map(|node| {
            let (path, dynamic) = chain_path(file, node)?;
            Some(AttributeRead {
                path,
                expr: file.text(node).to_string(),
                dynamic,
                citation: file.cite(node),
            })
        })
        .collect()
}

/// Static path segments of a chain and whether a computed segment was dropped
fn chain_path(file: &SourceFile, node: Node) -> Option<(Vec<String>, bool)> {
    let mut segments = vec![];
    let mut dynamic = false;
    let mut current = node;

    loop {
        match current.kind() {
            "identifier" if file.text(current) == "node" => break,
            "element_reference" => {
                let object = current.child_by_field_name("object")?;
                let keys: Vec<_> = current
                    .named()
                    .into_iter()
                    .filter(|child| *child != object)
                    .collect();

                match keys.as_slice() {
                    [key] => match Value::from_node(file, *key).as_name() {
                        Some(name) => segments.push(name.to_string()),
                        None => {
                            // keep the static prefix only
                            segments.clear();
                            dynamic = true;
                        }
                    },
                    _ => {
                        segments.clear();
                        dynamic = true;
                    }
                }

                current = object;
            }
            "call" => {
                let call = Call::new(current)?;
                let receiver = call.receiver?;
                if !is_segment(file, &call) {
                    return None;
                }

                segments.push(file.text(call.method).to_string());
                current = receiver;
            }
            _ => return None,
        }
    }

    segments.reverse();
    Some((segments, dynamic))
}

/// `call` is a plain `.name` step
fn is_segment(file: &SourceFile, call: &Call) -> bool {
    if !call.arguments.is_empty() || call.block.is_some() {
        return false;
    }
    if call.method.kind() != "identifier" {
        return false;
    }

    let method = file.text(call.method);
    !TERMINAL_METHODS.contains(&method) && !method.ends_with('?') && !method.ends_with('!')
}

fn extends_chain(file: &SourceFile, parent: Option<Node>, node: Node) -> bool {
    let Some(parent) = parent else {
        return false;
    };

    match parent.kind() {
        "element_reference" => parent.child_by_field_name("object") == Some(node),
        "call" => Call::new(parent)
            .is_some_and(|call| call.receiver == Some(node) && is_segment(file, &call)),
        _ => false,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::util::test::{recipe_file, ruby};
    use pretty_assertions::assert_eq;

    fn paths(source: &str) -> Vec<(Vec<String>, bool)> {
        let tree = ruby(source);
        let file = recipe_file(&tree);
        reads(&file, tree.root())
            .into_iter()
            .map(|read| (read.path, read.dynamic))
            .collect()
    }

    fn path(segments: &[&str]) -> Vec<String> {
        segments.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn bracket_and_dotted() {
        assert_eq!(
            paths("a = node['app']['name']\nb = node.app.port\n"),
            vec![
                (path(&["app", "name"]), false),
                (path(&["app", "port"]), false)
            ]
        );
    }

    #[test]
    fn symbols_and_mixed_forms() {
        assert_eq!(
            paths("x = node[:nginx].worker\n"),
            vec![(path(&["nginx", "worker"]), false)]
        );
    }

    #[test]
    fn computed_segment_keeps_prefix() {
        assert_eq!(
            paths("x = node['users'][name]['home']\n"),
            vec![(path(&["users"]), true)]
        );
    }

    #[test]
    fn writes_are_not_reads() {
        assert_eq!(paths("node.default['a'] = 1\n"), vec![]);
    }

    #[test]
    fn terminal_methods_end_chain() {
        assert_eq!(
            paths("x = node['port'].to_s\n"),
            vec![(path(&["port"]), false)]
        );
    }

    #[test]
    fn other_receivers_are_ignored() {
        assert_eq!(paths("x = config['a']\ny = new_resource.name\n"), vec![]);
    }

    #[test]
    fn citation_and_expression() {
        let tree = ruby("package 'a' do\n  version node['pkg']['version']\nend\n");
        let file = recipe_file(&tree);
        let reads = reads(&file, tree.root());

        assert_eq!(reads.len(), 1);
        assert_eq!(reads[0].expr, "node['pkg']['version']");
        assert_eq!(reads[0].citation.line, 2);
    }
}

use super::{Visit, Walk};
use tree_sitter::Node;

/// Recursively visit a syntax tree in document order (pre-order)
///
/// Anonymous nodes (keywords, punctuation, MISSING tokens) are visited as well.
pub trait VisitNodes<'t> {
    fn visit_nodes(self, visitor: &mut dyn Visit<Node<'t>>);
}

impl<'t> VisitNodes<'t> for Node<'t> {
    fn visit_nodes(self, visitor: &mut dyn Visit<Node<'t>>) {
        if visitor.visit(self) == Walk::Skip {
            return;
        }

        let mut cursor = self.walk();
        let children: Vec<_> = self.children(&mut cursor).collect();
        for child in children {
            child.visit_nodes(visitor);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::syntax::{parse, Grammar};
    use pretty_assertions::assert_eq;

    #[test]
    fn skip_prunes_subtree() {
        let tree = parse("package 'a' do\n  action :install\nend\n", Grammar::Ruby).unwrap();

        let mut seen = vec![];
        tree.root().visit_nodes(&mut |node: Node| {
            if node.is_named() {
                seen.push(node.kind());
            }
            if node.kind() == "string" {
                Walk::Skip
            } else {
                Walk::Descend
            }
        });

        assert_eq!(seen[..3], ["program", "call", "identifier"]);
        assert!(seen.contains(&"simple_symbol"));
        assert!(!seen.contains(&"string_content"));
    }
}

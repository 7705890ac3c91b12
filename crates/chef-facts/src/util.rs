use crate::facts::Citation;
use crate::syntax::SyntaxTree;
use tree_sitter::Node;

/// A parsed file and the names needed to cite it
#[derive(derive_new::new, Debug, Clone, Copy)]
pub(crate) struct SourceFile<'t> {
    pub cookbook: &'t str,
    /// relative to the cookbook root
    pub path: &'t str,
    pub tree: &'t SyntaxTree,
}

impl<'t> SourceFile<'t> {
    pub fn text(&self, node: Node) -> &'t str {
        self.tree.text(node)
    }

    /// Source text from the start of `first` to the end of `last`
    pub fn text_between(&self, first: Node, last: Node) -> &'t str {
        self.tree
            .source()
            .get(first.start_byte()..last.end_byte())
            .unwrap_or_default()
    }

    pub fn cite(&self, node: Node) -> Citation {
        let span = self.tree.span(node);
        Citation::new(self.path, span.start_line, Some(span.end_line))
    }

    /// Citation covering the whole file
    pub fn cite_file(&self) -> Citation {
        Citation::new(self.path, 1, Some(self.tree.line_count()))
    }
}

/// Parents whose children are statements
const STATEMENT_CONTAINERS: &[&str] = &[
    "program",
    "body_statement",
    "block_body",
    "do_block",
    "block",
    "then",
    "else",
    "do",
    "begin",
    "ensure",
    "parenthesized_statements",
];

/// Parents that hold a statement in their `body` field
const MODIFIERS: &[&str] = &[
    "if_modifier",
    "unless_modifier",
    "while_modifier",
    "until_modifier",
    "rescue_modifier",
];

pub(crate) trait NodeExt<'t> {
    /// Named children, comments excluded
    fn named(&self) -> Vec<Node<'t>>;
    /// Sits where a statement can be, possibly behind a modifier
    fn is_statement(&self) -> bool;
    /// Right-hand side of an assignment
    fn is_assignment_value(&self) -> bool;
    /// Left-hand side of an assignment
    fn is_assignment_target(&self) -> bool;
}

impl<'t> NodeExt<'t> for Node<'t> {
    fn named(&self) -> Vec<Node<'t>> {
        let mut cursor = self.walk();
        self.named_children(&mut cursor)
            .filter(|child| child.kind() != "comment")
            .collect()
    }

    fn is_statement(&self) -> bool {
        let Some(parent) = self.parent() else {
            return false;
        };

        let kind = parent.kind();
        if STATEMENT_CONTAINERS.contains(&kind) {
            return true;
        }
        if MODIFIERS.contains(&kind) {
            return parent.child_by_field_name("body") == Some(*self);
        }

        false
    }

    fn is_assignment_value(&self) -> bool {
        let Some(parent) = self.parent() else {
            return false;
        };

        parent.kind() == "assignment" && parent.child_by_field_name("right") == Some(*self)
    }

    fn is_assignment_target(&self) -> bool {
        let Some(parent) = self.parent() else {
            return false;
        };

        matches!(parent.kind(), "assignment" | "operator_assignment")
            && parent.child_by_field_name("left") == Some(*self)
    }
}

/// A method call, `receiver.method(arguments) { block }`
#[derive(Debug, Clone)]
pub(crate) struct Call<'t> {
    pub node: Node<'t>,
    pub receiver: Option<Node<'t>>,
    pub method: Node<'t>,
    pub arguments: Vec<Node<'t>>,
    pub block: Option<Node<'t>>,
}

impl<'t> Call<'t> {
    pub fn new(node: Node<'t>) -> Option<Self> {
        if node.kind() != "call" {
            return None;
        }

        let method = node.child_by_field_name("method")?;
        let arguments = node
            .child_by_field_name("arguments")
            .map(|arguments| arguments.named())
            .unwrap_or_default();

        Some(Self {
            node,
            receiver: node.child_by_field_name("receiver"),
            method,
            arguments,
            block: node.child_by_field_name("block"),
        })
    }

    /// Method name, for calls without receiver and an identifier as method
    pub fn bare_name<'s>(&self, file: &SourceFile<'s>) -> Option<&'s str> {
        if self.receiver.is_some() || self.method.kind() != "identifier" {
            return None;
        }
        Some(file.text(self.method))
    }

    /// The block takes parameters (`do |item| ... end`)
    pub fn has_block_parameters(&self) -> bool {
        self.block
            .is_some_and(|block| block.child_by_field_name("parameters").is_some())
    }

    /// Positional arguments, `key: value` pairs excluded
    pub fn positional(&self) -> impl Iterator<Item = Node<'t>> + '_ {
        self.arguments.iter().copied().filter(|arg| arg.kind() != "pair")
    }

    /// `key: value` arguments
    pub fn pairs(&self) -> impl Iterator<Item = Node<'t>> + '_ {
        self.arguments.iter().copied().filter(|arg| arg.kind() == "pair")
    }
}

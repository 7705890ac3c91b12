//! tree-sitter adapter
//!
//! Two grammars are in use:
//! - [Grammar::Ruby] for recipes, custom resources and `metadata.rb`
//! - [Grammar::EmbeddedTemplate] for ERB templates
//!
//! A [SyntaxTree] owns its source text, so every node can be turned into text and line spans
//! without the analyzers having to carry the source around separately.
//!
//! Parsing never fails because of a syntax error, tree-sitter recovers and marks the offending
//! region instead. Callers that want strict input use [SyntaxTree::check].
use crate::visit::{VisitNodes, Walk};
use tree_sitter::{Language, Node, Parser, Query, QueryCursor, Tree};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grammar {
    /// The cookbook DSL
    Ruby,
    /// ERB templates
    EmbeddedTemplate,
}

impl Grammar {
    pub fn language(self) -> Language {
        match self {
            Grammar::Ruby => tree_sitter_ruby::LANGUAGE.into(),
            Grammar::EmbeddedTemplate => tree_sitter_embedded_template::LANGUAGE.into(),
        }
    }
}

impl std::fmt::Display for Grammar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Grammar::Ruby => f.write_str("ruby"),
            Grammar::EmbeddedTemplate => f.write_str("erb"),
        }
    }
}

/// Parse `source` with the given grammar
#[tracing::instrument(level = "trace", skip(source))]
pub fn parse(source: impl Into<String>, grammar: Grammar) -> Result<SyntaxTree, ParseError> {
    let source = source.into();

    let mut parser = Parser::new();
    parser
        .set_language(&grammar.language())
        .map_err(|source| ParseError::Language { grammar, source })?;

    let tree = parser
        .parse(&source, None)
        .ok_or(ParseError::NoTree(grammar))?;

    Ok(SyntaxTree {
        source,
        tree,
        grammar,
    })
}

#[derive(thiserror::Error, Debug)]
pub enum ParseError {
    #[error("unable to load the {grammar} grammar")]
    Language {
        grammar: Grammar,
        #[source]
        source: tree_sitter::LanguageError,
    },
    #[error("{0} parser did not produce a tree")]
    NoTree(Grammar),
    #[error("syntax error at line {line}")]
    Syntax { line: usize },
    #[error("invalid query")]
    Query(#[from] tree_sitter::QueryError),
    #[error("query has no capture named {0:?}")]
    UnknownCapture(String),
}

/// Byte and (1-based) line span of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start_byte: usize,
    pub end_byte: usize,
    pub start_line: usize,
    pub end_line: usize,
}

#[derive(Debug)]
pub struct SyntaxTree {
    source: String,
    tree: Tree,
    grammar: Grammar,
}

impl SyntaxTree {
    pub fn root(&self) -> Node<'_> {
        self.tree.root_node()
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn grammar(&self) -> Grammar {
        self.grammar
    }

    pub fn text(&self, node: Node) -> &str {
        self.source.get(node.byte_range()).unwrap_or_default()
    }

    pub fn span(&self, node: Node) -> Span {
        Span {
            start_byte: node.start_byte(),
            end_byte: node.end_byte(),
            start_line: node.start_position().row + 1,
            end_line: node.end_position().row + 1,
        }
    }

    /// Number of lines, an empty source still has one
    pub fn line_count(&self) -> usize {
        self.source.lines().count().max(1)
    }

    /// Fails with [ParseError::Syntax] pointing at the first ERROR or MISSING node
    pub fn check(&self) -> Result<(), ParseError> {
        if !self.root().has_error() {
            return Ok(());
        }

        let line = self
            .first_error()
            .map(|node| node.start_position().row + 1)
            .unwrap_or(1);

        Err(ParseError::Syntax { line })
    }

    fn first_error<'t>(&'t self) -> Option<Node<'t>> {
        let mut found = None;
        self.root().visit_nodes(&mut |node: Node<'t>| {
            if found.is_some() {
                return Walk::Skip;
            }
            if node.is_error() || node.is_missing() {
                found = Some(node);
                return Walk::Skip;
            }
            if node.has_error() {
                Walk::Descend
            } else {
                Walk::Skip
            }
        });
        found
    }

    /// All nodes below (and including) `scope` captured by `pattern`, in document order
    pub fn find_all<'t>(&'t self, pattern: &Pattern, scope: Node<'t>) -> Vec<Node<'t>> {
        assert_eq!(
            pattern.grammar, self.grammar,
            "pattern used with a tree of another grammar"
        );

        let mut cursor = QueryCursor::new();
        let mut nodes = vec![];
        for query_match in cursor.matches(&pattern.query, scope, self.source.as_bytes()) {
            for capture in query_match.captures {
                if capture.index == pattern.capture {
                    nodes.push(capture.node);
                }
            }
        }

        nodes.sort_by_key(|node| (node.start_byte(), std::cmp::Reverse(node.end_byte())));
        nodes.dedup_by_key(|node| node.id());
        nodes
    }
}

/// A compiled tree-sitter query with the capture that [SyntaxTree::find_all] returns
#[derive(Debug)]
pub struct Pattern {
    query: Query,
    capture: u32,
    grammar: Grammar,
}

impl Pattern {
    pub fn new(grammar: Grammar, source: &str, capture: &str) -> Result<Self, ParseError> {
        let query = Query::new(&grammar.language(), source)?;
        let capture = query
            .capture_index_for_name(capture)
            .ok_or_else(|| ParseError::UnknownCapture(capture.to_string()))?;

        Ok(Self {
            query,
            capture,
            grammar,
        })
    }
}

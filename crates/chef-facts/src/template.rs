//! ERB templates
//!
//! A template is analyzed once per extraction, independently of who references it. The
//! results are kept in a [TemplateCache] and merged into every [Template] reference that
//! resolves to the file.
//!
//! The embedded ruby is parsed on its own: the template text is blanked out (newlines kept)
//! so the ruby tree has the same positions as the template itself. Template ruby is often
//! fragmentary, so syntax errors only produce a note.
use crate::attributes;
use crate::facts::{Citation, Template};
use crate::issues::{Issue, Issues};
use crate::syntax::{self, Grammar, ParseError, Pattern, SyntaxTree};
use crate::util::SourceFile;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;

static CODE: LazyLock<Pattern> = LazyLock::new(|| {
    Pattern::new(Grammar::EmbeddedTemplate, "(code) @code", "code")
        .expect("template code query must compile")
});

static INSTANCE_VARIABLES: LazyLock<Pattern> = LazyLock::new(|| {
    Pattern::new(Grammar::Ruby, "(instance_variable) @ivar", "ivar")
        .expect("instance variable query must compile")
});

/// What a template file uses, independent of any caller
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateFacts {
    pub file: Citation,
    /// without the leading `@`
    pub instance_vars: BTreeSet<String>,
    pub attribute_reads: BTreeSet<Vec<String>>,
}

#[tracing::instrument(level = "trace", skip(source))]
pub(crate) fn analyze_template(
    cookbook: &str,
    path: &str,
    source: &str,
) -> Result<(TemplateFacts, Issues), ParseError> {
    let mut issues = Issues::new();

    let template = syntax::parse(source, Grammar::EmbeddedTemplate)?;
    let ruby = syntax::parse(embedded_ruby(&template), Grammar::Ruby)?;
    if let Err(ParseError::Syntax { line }) = ruby.check() {
        issues.log(Issue::TemplateSyntax {
            file: path.to_string(),
            line,
        });
    }

    let instance_vars = ruby
        .find_all(&INSTANCE_VARIABLES, ruby.root())
        .into_iter()
        .map(|node| ruby.text(node).trim_start_matches('@').to_string())
        .filter(|name| !name.is_empty())
        .collect();

    let file = SourceFile::new(cookbook, path, &ruby);
    let attribute_reads = attributes::reads(&file, ruby.root())
        .into_iter()
        .map(|read| read.path)
        .filter(|path| !path.is_empty())
        .collect();

    let facts = TemplateFacts {
        file: SourceFile::new(cookbook, path, &template).cite_file(),
        instance_vars,
        attribute_reads,
    };
    Ok((facts, issues))
}

/// Template source with everything but the `code` of directives replaced by blanks
fn embedded_ruby(template: &SyntaxTree) -> String {
    let source = template.source().as_bytes();
    let mut ruby: Vec<u8> = source
        .iter()
        .map(|byte| if *byte == b'\n' { b'\n' } else { b' ' })
        .collect();

    let code = template.find_all(&CODE, template.root());
    for (index, node) in code.iter().enumerate() {
        let range = node.byte_range();
        ruby[range.clone()].copy_from_slice(&source[range.clone()]);

        // directives sharing a line are separate statements
        let next_start = code
            .get(index + 1)
            .map(|next| next.start_byte())
            .unwrap_or(source.len());
        let gap = &source[range.end..next_start];
        if !gap.is_empty() && !gap.contains(&b'\n') {
            ruby[range.end] = b';';
        }
    }

    String::from_utf8_lossy(&ruby).into_owned()
}

/// Analyzed templates of one extraction, keyed by path relative to the cookbook root
#[derive(Debug, Default)]
pub struct TemplateCache {
    templates: BTreeMap<String, TemplateFacts>,
}

impl TemplateCache {
    pub fn insert(&mut self, path: impl Into<String>, facts: TemplateFacts) {
        self.templates.insert(path.into(), facts);
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.templates.keys().map(String::as_str)
    }

    /// Find the template file for a `source` name
    ///
    /// `templates/<source>` first, then `templates/default/<source>`, then the first
    /// platform directory `templates/<dir>/<source>` in sorted order.
    pub fn resolve(&self, source: &str) -> Option<(&str, &TemplateFacts)> {
        let source = source.trim_start_matches('/');
        let exact = format!("templates/{source}");
        let default = format!("templates/default/{source}");

        [exact, default]
            .iter()
            .find_map(|path| self.templates.get_key_value(path.as_str()))
            .or_else(|| {
                self.templates.iter().find(|(path, _)| {
                    path.strip_prefix("templates/")
                        .and_then(|rest| rest.split_once('/'))
                        .is_some_and(|(_, rest)| rest == source)
                })
            })
            .map(|(path, facts)| (path.as_str(), facts))
    }
}

/// Merge the cached findings into a template reference
///
/// Returns the path of the resolved template file. Unresolved references keep their
/// enrichment fields empty and are reported.
pub(crate) fn enrich(
    cache: &TemplateCache,
    template: &mut Template,
    issues: &mut Issues,
) -> Option<String> {
    if template.unresolved.is_none() {
        let resolved = template
            .source
            .as_deref()
            .and_then(|source| cache.resolve(source));

        match resolved {
            Some((path, facts)) => {
                tracing::trace!(citation = %template.citation, path, "template resolved");
                template.file = Some(facts.file.clone());
                template.instance_vars = Some(facts.instance_vars.clone());
                template.attribute_reads = Some(facts.attribute_reads.clone());
                if template.vars_expr.is_none() {
                    template.unsupplied_vars = Some(
                        facts
                            .instance_vars
                            .iter()
                            .filter(|name| !template.vars.contains_key(name.as_str()))
                            .cloned()
                            .collect(),
                    );
                }
                return Some(path.to_string());
            }
            None => template.unresolved = Some("no template file matches".to_string()),
        }
    }

    issues.log(Issue::UnresolvedTemplate {
        at: template.citation.clone(),
        source: template.source.clone(),
        reason: template.unresolved.clone().unwrap_or_default(),
    });
    None
}

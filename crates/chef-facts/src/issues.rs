//! Recoverable problems found during extraction
//!
//! None of these abort an extraction. They end up as `meta.coverage.notes` in the fact document.
use crate::facts::Citation;

#[derive(derive_new::new, Debug, Default)]
pub struct Issues {
    #[new(default)]
    issues: Vec<Issue>,
}

impl Issues {
    pub fn log(&mut self, issue: Issue) {
        tracing::debug!(%issue, "issue found");
        self.issues.push(issue);
    }

    pub fn append(&mut self, other: Issues) {
        self.issues.extend(other.issues);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Issue> {
        self.issues.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn files_skipped(&self) -> usize {
        self.iter()
            .filter(|issue| matches!(issue, Issue::FileSkipped { .. }))
            .count()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Issue {
    /// file could not be read or parsed and contributes nothing
    FileSkipped { file: String, reason: String },
    /// structurally valid but not in a shape that can be extracted
    MalformedNode { at: Citation, reason: &'static str },
    UnresolvedTemplate {
        at: Citation,
        source: Option<String>,
        reason: String,
    },
    /// custom resource without `provides`/`resource_name`
    ImplicitProvides { file: String, name: String },
    /// embedded ruby in a template has syntax errors, findings may be incomplete
    TemplateSyntax { file: String, line: usize },
}

impl std::fmt::Display for Issue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Issue::FileSkipped { file, reason } => write!(f, "skipped {file}: {reason}"),
            Issue::MalformedNode { at, reason } => write!(f, "{at}: {reason}"),
            Issue::UnresolvedTemplate {
                at,
                source: Some(source),
                reason,
            } => write!(f, "{at}: template '{source}' unresolved: {reason}"),
            Issue::UnresolvedTemplate {
                at,
                source: None,
                reason,
            } => write!(f, "{at}: template unresolved: {reason}"),
            Issue::ImplicitProvides { file, name } => {
                write!(f, "{file}: no provides declared, assuming '{name}'")
            }
            Issue::TemplateSyntax { file, line } => {
                write!(f, "{file}:{line}: embedded ruby has syntax errors")
            }
        }
    }
}

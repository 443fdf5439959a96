//! Error types and diagnostic reporting

use std::collections::HashSet;

use codespan_reporting::diagnostic::{Diagnostic as CodespanDiagnostic, Label};
use codespan_reporting::files::SimpleFiles;
use codespan_reporting::term;
use codespan_reporting::term::termcolor::{Buffer, ColorChoice, StandardStream};
use thiserror::Error;

use super::Span;
use crate::entity::EntityId;

/// An entity left pending when the pipeline stopped making progress
#[derive(Debug, Clone, PartialEq)]
pub struct BlockedEntity {
    pub entity: EntityId,
    /// e.g. "struct 'A'"
    pub label: String,
    /// First thing the entity was waiting on in the final sweep
    pub waiting_on: String,
    pub span: Span,
}

/// Compile error with source location
#[derive(Error, Debug)]
pub enum CompileError {
    #[error("{message}")]
    Lexer { message: String, span: Span },

    #[error("{message}")]
    Parser { message: String, span: Span },

    #[error("'{name}' is already defined in this scope")]
    Redefinition {
        name: String,
        span: Span,
        previous: Option<Span>,
    },

    #[error("unresolved symbol '{name}'")]
    UnresolvedSymbol { name: String, span: Span },

    #[error("{message}")]
    TypeMismatch { message: String, span: Span },

    #[error("overloads of '{name}' have identical parameter types")]
    DuplicateOverload { name: String, span: Span, other: Span },

    #[error("circular dependency between {} declarations", blocked.len())]
    CircularDependency { blocked: Vec<BlockedEntity> },

    #[error("invalid intrinsic '{name}': {reason}")]
    InvalidIntrinsic {
        name: String,
        reason: String,
        span: Span,
    },

    #[error("{message}")]
    Semantic { message: String, span: Span },

    #[error("'{name}' cannot be used because its declaration failed to compile")]
    ErroneousDependency { name: String, span: Span },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CompileError {
    pub fn lexer(message: impl Into<String>, span: Span) -> Self {
        Self::Lexer {
            message: message.into(),
            span,
        }
    }

    pub fn parser(message: impl Into<String>, span: Span) -> Self {
        Self::Parser {
            message: message.into(),
            span,
        }
    }

    pub fn redefinition(name: impl Into<String>, span: Span, previous: Option<Span>) -> Self {
        Self::Redefinition {
            name: name.into(),
            span,
            previous,
        }
    }

    pub fn unresolved(name: impl Into<String>, span: Span) -> Self {
        Self::UnresolvedSymbol {
            name: name.into(),
            span,
        }
    }

    pub fn type_mismatch(message: impl Into<String>, span: Span) -> Self {
        Self::TypeMismatch {
            message: message.into(),
            span,
        }
    }

    pub fn invalid_intrinsic(name: impl Into<String>, reason: impl Into<String>, span: Span) -> Self {
        Self::InvalidIntrinsic {
            name: name.into(),
            reason: reason.into(),
            span,
        }
    }

    pub fn semantic(message: impl Into<String>, span: Span) -> Self {
        Self::Semantic {
            message: message.into(),
            span,
        }
    }

    /// Primary source location, if the error has one
    pub fn span(&self) -> Option<Span> {
        match self {
            Self::Lexer { span, .. }
            | Self::Parser { span, .. }
            | Self::Redefinition { span, .. }
            | Self::UnresolvedSymbol { span, .. }
            | Self::TypeMismatch { span, .. }
            | Self::DuplicateOverload { span, .. }
            | Self::InvalidIntrinsic { span, .. }
            | Self::Semantic { span, .. }
            | Self::ErroneousDependency { span, .. } => Some(*span),
            Self::CircularDependency { blocked } => blocked.first().map(|b| b.span),
            Self::Io(_) => None,
        }
    }

    /// Short category name used as the diagnostic headline
    pub fn category(&self) -> &'static str {
        match self {
            Self::Lexer { .. } => "Lexer error",
            Self::Parser { .. } => "Syntax error",
            Self::Redefinition { .. } => "Redefinition",
            Self::UnresolvedSymbol { .. } => "Unresolved symbol",
            Self::TypeMismatch { .. } => "Type error",
            Self::DuplicateOverload { .. } => "Duplicate overload",
            Self::CircularDependency { .. } => "Circular dependency",
            Self::InvalidIntrinsic { .. } => "Invalid intrinsic",
            Self::Semantic { .. } => "Semantic error",
            Self::ErroneousDependency { .. } => "Erroneous dependency",
            Self::Io(_) => "IO error",
        }
    }
}

pub type CompileResult<T> = Result<T, CompileError>;

/// A recorded error and the entity it was raised for
#[derive(Debug)]
pub struct Diagnostic {
    pub entity: Option<EntityId>,
    pub error: CompileError,
}

/// Error sink shared by the parser and the entity pipeline.
///
/// Reports are keyed on (entity, span, message) so a root cause seen again
/// on a later sweep is only stored once.
#[derive(Debug, Default)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
    seen: HashSet<(Option<EntityId>, Option<Span>, String)>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an error; returns false if it was a duplicate
    pub fn report(&mut self, entity: Option<EntityId>, error: CompileError) -> bool {
        let key = (entity, error.span(), error.to_string());
        if !self.seen.insert(key) {
            return false;
        }
        self.items.push(Diagnostic { entity, error });
        true
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn for_entity(&self, entity: EntityId) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter().filter(move |d| d.entity == Some(entity))
    }
}

/// Diagnostic reporter for pretty error output
pub struct DiagnosticReporter {
    files: SimpleFiles<String, String>,
    config: term::Config,
}

impl DiagnosticReporter {
    pub fn new() -> Self {
        Self {
            files: SimpleFiles::new(),
            config: term::Config::default(),
        }
    }

    /// Register a file; ids are handed out in registration order starting at 0
    pub fn add_file(&mut self, name: impl Into<String>, source: impl Into<String>) -> usize {
        self.files.add(name.into(), source.into())
    }

    fn to_codespan(error: &CompileError) -> CodespanDiagnostic<usize> {
        let headline = CodespanDiagnostic::error().with_message(error.category());
        let primary = |span: Span| Label::primary(span.file, span.start..span.end);

        match error {
            CompileError::Redefinition { span, previous, .. } => {
                let mut labels = vec![primary(*span).with_message(error.to_string())];
                if let Some(prev) = previous {
                    labels.push(
                        Label::secondary(prev.file, prev.start..prev.end)
                            .with_message("previous definition here"),
                    );
                }
                headline.with_labels(labels)
            }

            CompileError::DuplicateOverload { span, other, .. } => headline.with_labels(vec![
                primary(*span).with_message(error.to_string()),
                Label::secondary(other.file, other.start..other.end)
                    .with_message("conflicting overload"),
            ]),

            CompileError::CircularDependency { blocked } => headline
                .with_labels(
                    blocked
                        .iter()
                        .map(|b| {
                            Label::secondary(b.span.file, b.span.start..b.span.end)
                                .with_message(format!("{} waits on {}", b.label, b.waiting_on))
                        })
                        .collect(),
                )
                .with_notes(vec![error.to_string()]),

            CompileError::Io(err) => {
                CodespanDiagnostic::error().with_message(format!("IO error: {}", err))
            }

            other => match other.span() {
                Some(span) => headline.with_labels(vec![primary(span).with_message(other.to_string())]),
                None => headline.with_notes(vec![other.to_string()]),
            },
        }
    }

    pub fn report_error(&self, error: &CompileError) {
        let writer = StandardStream::stderr(ColorChoice::Auto);
        let diagnostic = Self::to_codespan(error);
        let _ = term::emit(&mut writer.lock(), &self.config, &self.files, &diagnostic);
    }

    /// Render without color, used by tests and `--dump-entities`
    pub fn render(&self, error: &CompileError) -> String {
        let mut buffer = Buffer::no_color();
        let diagnostic = Self::to_codespan(error);
        if term::emit(&mut buffer, &self.config, &self.files, &diagnostic).is_err() {
            return error.to_string();
        }
        String::from_utf8_lossy(buffer.as_slice()).into_owned()
    }
}

impl Default for DiagnosticReporter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_reports_are_dropped() {
        let mut diags = Diagnostics::new();
        let span = Span::new(3, 7);
        assert!(diags.report(Some(EntityId::from_raw(1)), CompileError::unresolved("x", span)));
        assert!(!diags.report(Some(EntityId::from_raw(1)), CompileError::unresolved("x", span)));
        // Same root cause raised for a different entity is kept
        assert!(diags.report(Some(EntityId::from_raw(2)), CompileError::unresolved("x", span)));
        assert_eq!(diags.len(), 2);
    }

    #[test]
    fn test_render_points_at_source() {
        let mut reporter = DiagnosticReporter::new();
        let file = reporter.add_file("main.onyx", "x :: y;\n");
        let error = CompileError::unresolved("y", Span::in_file(file, 5, 6));
        let text = reporter.render(&error);
        assert!(text.contains("Unresolved symbol"));
        assert!(text.contains("main.onyx"));
    }
}

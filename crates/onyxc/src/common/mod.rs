//! Common infrastructure shared by the parser and the entity pipeline

mod error;
mod span;

pub use error::{
    BlockedEntity, CompileError, CompileResult, Diagnostic, DiagnosticReporter, Diagnostics,
};
pub use span::{FileId, Span};

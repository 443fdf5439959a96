//! Entity pipeline
//!
//! Every top-level declaration is wrapped in an [`Entity`] when it is parsed.
//! The pipeline sweeps the entity list in declaration order, moving each
//! entity through
//!
//! ```text
//! Unresolved -> ResolvingTypes -> Finalized
//!          \__________\__________-> Error
//! ```
//!
//! A step that needs something not finalized yet returns
//! [`Stall::Blocked`] and is retried from scratch on the next sweep. A sweep
//! that advances nothing ends resolution with one circular dependency report
//! naming every entity still blocked.

mod checker;
mod layout;
mod pipeline;
mod resolver;
mod symbols;
mod types;

pub use layout::{DataLayout, DataSegment};
pub use pipeline::Pipeline;

use crate::ast::{Name, NodeId, TypeExprId};
use crate::common::{CompileError, Span};
use crate::scope::{PackageId, ScopeId};

define_handle!(EntityId);

/// Where a named constant binding lives, so an alias can be rebound
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Binding {
    pub scope: ScopeId,
    pub name: Name,
}

/// One pending top-level unit of work
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    UsePackage(NodeId),
    /// Reserves data for a string literal
    StringLiteral(NodeId),
    /// Reads a file and reserves data for its bytes
    FileContents(NodeId),
    Enum(TypeExprId),
    /// Any other named type: struct, alias, pointer, ...
    TypeAlias(TypeExprId),
    MemoryReservation(NodeId),
    FunctionHeader(NodeId),
    /// Function body; waits for the header of the same node
    Function(NodeId),
    GlobalHeader(NodeId),
    /// Global initializer; waits for the header of the same node
    Global(NodeId),
    /// Constant binding or bare top-level expression
    Expression {
        root: NodeId,
        binding: Option<Binding>,
    },
    OverloadedFunction(NodeId),
}

impl EntityKind {
    pub fn describe(&self) -> &'static str {
        match self {
            EntityKind::UsePackage(_) => "use package",
            EntityKind::StringLiteral(_) => "string literal",
            EntityKind::FileContents(_) => "file contents",
            EntityKind::Enum(_) => "enum",
            EntityKind::TypeAlias(_) => "type",
            EntityKind::MemoryReservation(_) => "memory reservation",
            EntityKind::FunctionHeader(_) => "procedure header",
            EntityKind::Function(_) => "procedure",
            EntityKind::GlobalHeader(_) => "global header",
            EntityKind::Global(_) => "global",
            EntityKind::Expression { .. } => "expression",
            EntityKind::OverloadedFunction(_) => "overloaded procedure",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityState {
    Unresolved,
    /// Symbols are resolved; types are being derived and checked
    ResolvingTypes,
    Finalized,
    Error,
}

impl EntityState {
    pub fn is_terminal(self) -> bool {
        matches!(self, EntityState::Finalized | EntityState::Error)
    }
}

#[derive(Debug, Clone)]
pub struct Entity {
    pub kind: EntityKind,
    pub package: PackageId,
    pub state: EntityState,
}

impl Entity {
    pub fn new(kind: EntityKind, package: PackageId) -> Self {
        Self {
            kind,
            package,
            state: EntityState::Unresolved,
        }
    }
}

/// What a blocked step is waiting for
#[derive(Debug, Clone, PartialEq)]
pub struct BlockedOn {
    pub what: String,
    pub span: Span,
}

/// Why a step stopped: not yet, or never
#[derive(Debug)]
pub enum Stall {
    Blocked(BlockedOn),
    Failed(CompileError),
}

impl Stall {
    pub fn blocked(what: impl Into<String>, span: Span) -> Self {
        Stall::Blocked(BlockedOn {
            what: what.into(),
            span,
        })
    }
}

impl From<CompileError> for Stall {
    fn from(error: CompileError) -> Self {
        Stall::Failed(error)
    }
}

pub type StepResult<T> = Result<T, Stall>;

//! Syntactic type expressions
//!
//! These are types as written. Named references start out as `Symbol` or
//! `Qualified` and are replaced by the declaring type expression during
//! symbol resolution; the semantic `Type` is derived from the result.

use super::{AstKind, Name, NodeId, TypeExprId};
use crate::common::Span;
use crate::scope::ScopeId;
use crate::types::BasicKind;

#[derive(Debug, Clone)]
pub struct TypeExpr {
    pub kind: TypeExprKind,
    pub span: Span,
    /// Binding name for declared types (`Vec2 :: struct { ... }`)
    pub name: Option<Name>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StructMember {
    pub name: Name,
    pub type_node: TypeExprId,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumDecl {
    pub backing: Option<TypeExprId>,
    /// `EnumValue` nodes in declaration order
    pub values: Vec<NodeId>,
    /// Holds the value names, searched by `Enum.Value`
    pub scope: ScopeId,
    pub flags: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TypeExprKind {
    Basic(BasicKind),
    /// Unresolved reference by name
    Symbol(Name),
    /// Unresolved `package.Name`
    Qualified { package: Name, name: Name },
    Pointer(TypeExprId),
    Function {
        params: Vec<TypeExprId>,
        ret: TypeExprId,
    },
    /// `[count] elem`, count is a constant integer expression
    Array { elem: TypeExprId, count: NodeId },
    Struct(Vec<StructMember>),
    Enum(EnumDecl),
    /// `#type T`, a transparent rename
    Alias(TypeExprId),
}

impl TypeExprKind {
    pub fn kind(&self) -> AstKind {
        match self {
            TypeExprKind::Basic(_) => AstKind::BasicType,
            TypeExprKind::Symbol(_) | TypeExprKind::Qualified { .. } => AstKind::Symbol,
            TypeExprKind::Pointer(_) => AstKind::PointerType,
            TypeExprKind::Function { .. } => AstKind::FunctionType,
            TypeExprKind::Array { .. } => AstKind::ArrayType,
            TypeExprKind::Struct(_) => AstKind::StructType,
            TypeExprKind::Enum(_) => AstKind::EnumType,
            TypeExprKind::Alias(_) => AstKind::TypeAlias,
        }
    }

    /// Whether this still names something instead of describing it
    pub fn is_unresolved(&self) -> bool {
        matches!(self, TypeExprKind::Symbol(_) | TypeExprKind::Qualified { .. })
    }
}

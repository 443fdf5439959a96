//! Value, statement and declaration nodes

use super::{AstKind, BinaryOp, FunctionAttrs, GlobalAttrs, LocalAttrs, Name, NodeId, TypeExprId, UnaryOp};
use crate::common::Span;
use crate::scope::PackageId;
use crate::types::{Intrinsic, TypeId};

/// An arena node.
///
/// `type_node` is the type as written (if any); `ty` is the resolved type,
/// empty until the owning entity has been type checked. A node with `ty` set
/// and no `type_node` had its type inferred.
#[derive(Debug, Clone)]
pub struct Node {
    pub kind: NodeKind,
    pub span: Span,
    pub type_node: Option<TypeExprId>,
    pub ty: Option<TypeId>,
}

impl Node {
    pub fn new(kind: NodeKind, span: Span) -> Self {
        Self {
            kind,
            span,
            type_node: None,
            ty: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NumLit {
    Int(i64),
    Float(f64),
}

/// One entry of `use package p { a, b as c }`
#[derive(Debug, Clone, PartialEq)]
pub struct ImportItem {
    pub name: Name,
    pub alias: Option<Name>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UseDecl {
    pub package: Name,
    pub alias: Option<Name>,
    /// `None` includes every public symbol
    pub only: Option<Vec<ImportItem>>,
    pub resolved: Option<PackageId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDecl {
    pub name: Name,
    /// `Local` nodes flagged as parameters
    pub params: Vec<NodeId>,
    /// `None` means void
    pub return_type: Option<TypeExprId>,
    pub body: Option<NodeId>,
    pub attrs: FunctionAttrs,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Package(PackageId),
    UsePackage(UseDecl),
    IncludeFile(String),
    /// Unresolved name; replaced by the declaring node during symbol resolution
    Symbol(Name),
    Function(FunctionDecl),
    /// Options are symbols until resolved, then `Function` nodes
    OverloadedFunction {
        name: Name,
        options: Vec<NodeId>,
    },
    Block(Vec<NodeId>),

    Local {
        name: Name,
        attrs: LocalAttrs,
    },
    Global {
        name: Name,
        initial: Option<NodeId>,
        attrs: GlobalAttrs,
    },
    Memres {
        name: Name,
        initial: Option<NodeId>,
        addr: Option<u32>,
    },
    Dereference(NodeId),
    ArrayAccess {
        addr: NodeId,
        index: NodeId,
        elem_size: Option<u32>,
    },
    FieldAccess {
        expr: NodeId,
        field: Name,
        offset: Option<u32>,
    },

    EnumValue {
        name: Name,
        value: Option<NodeId>,
        resolved: Option<i64>,
    },
    NumLit(NumLit),
    StrLit {
        data: Vec<u8>,
        addr: Option<u32>,
    },
    UnaryOp {
        op: UnaryOp,
        expr: NodeId,
    },
    BinaryOp {
        op: BinaryOp,
        left: NodeId,
        right: NodeId,
    },
    Call {
        callee: NodeId,
        args: Vec<NodeId>,
    },
    IntrinsicCall {
        intrinsic: Intrinsic,
        args: Vec<NodeId>,
    },
    AddressOf(NodeId),
    SizeOf {
        of: TypeExprId,
        size: Option<u32>,
    },
    AlignOf {
        of: TypeExprId,
        alignment: Option<u32>,
    },
    FileContents {
        path: String,
        addr: Option<u32>,
        size: Option<u32>,
    },
    StructLiteral {
        of: TypeExprId,
        values: Vec<NodeId>,
    },

    Return(Option<NodeId>),
    If {
        cond: NodeId,
        then_block: NodeId,
        else_block: Option<NodeId>,
    },
    For {
        var: NodeId,
        start: NodeId,
        end: NodeId,
        step: Option<NodeId>,
        body: NodeId,
    },
    While {
        cond: NodeId,
        body: NodeId,
    },
    Break,
    Continue,
    Defer(NodeId),
}

impl NodeKind {
    pub fn kind(&self) -> AstKind {
        match self {
            NodeKind::Package(_) => AstKind::Package,
            NodeKind::UsePackage(_) => AstKind::UsePackage,
            NodeKind::IncludeFile(_) => AstKind::IncludeFile,
            NodeKind::Symbol(_) => AstKind::Symbol,
            NodeKind::Function(_) => AstKind::Function,
            NodeKind::OverloadedFunction { .. } => AstKind::OverloadedFunction,
            NodeKind::Block(_) => AstKind::Block,
            NodeKind::Local { .. } => AstKind::Local,
            NodeKind::Global { .. } => AstKind::Global,
            NodeKind::Memres { .. } => AstKind::Memres,
            NodeKind::Dereference(_) => AstKind::Dereference,
            NodeKind::ArrayAccess { .. } => AstKind::ArrayAccess,
            NodeKind::FieldAccess { .. } => AstKind::FieldAccess,
            NodeKind::EnumValue { .. } => AstKind::EnumValue,
            NodeKind::NumLit(_) => AstKind::NumLit,
            NodeKind::StrLit { .. } => AstKind::StrLit,
            NodeKind::UnaryOp { .. } => AstKind::UnaryOp,
            NodeKind::BinaryOp { .. } => AstKind::BinaryOp,
            NodeKind::Call { .. } => AstKind::Call,
            NodeKind::IntrinsicCall { .. } => AstKind::IntrinsicCall,
            NodeKind::AddressOf(_) => AstKind::AddressOf,
            NodeKind::SizeOf { .. } => AstKind::SizeOf,
            NodeKind::AlignOf { .. } => AstKind::AlignOf,
            NodeKind::FileContents { .. } => AstKind::FileContents,
            NodeKind::StructLiteral { .. } => AstKind::StructLiteral,
            NodeKind::Return(_) => AstKind::Return,
            NodeKind::If { .. } => AstKind::If,
            NodeKind::For { .. } => AstKind::For,
            NodeKind::While { .. } => AstKind::While,
            NodeKind::Break => AstKind::Break,
            NodeKind::Continue => AstKind::Continue,
            NodeKind::Defer(_) => AstKind::Defer,
        }
    }

    /// Name bound by a declaration node
    pub fn decl_name(&self) -> Option<Name> {
        match self {
            NodeKind::Function(f) => Some(f.name),
            NodeKind::Local { name, .. }
            | NodeKind::Global { name, .. }
            | NodeKind::Memres { name, .. }
            | NodeKind::EnumValue { name, .. }
            | NodeKind::OverloadedFunction { name, .. }
            | NodeKind::Symbol(name) => Some(*name),
            _ => None,
        }
    }

    /// Value children in evaluation order.
    ///
    /// Declaration payloads (function bodies and parameters, global
    /// initializers, enum values) are not included; they are walked by the
    /// entity that owns them.
    pub fn children(&self) -> Vec<NodeId> {
        match self {
            NodeKind::Block(stmts) => stmts.clone(),
            NodeKind::Memres { initial, .. } => initial.iter().copied().collect(),
            NodeKind::Dereference(expr) | NodeKind::AddressOf(expr) | NodeKind::Defer(expr) => vec![*expr],
            NodeKind::ArrayAccess { addr, index, .. } => vec![*addr, *index],
            NodeKind::FieldAccess { expr, .. } => vec![*expr],
            NodeKind::UnaryOp { expr, .. } => vec![*expr],
            NodeKind::BinaryOp { left, right, .. } => vec![*left, *right],
            NodeKind::Call { callee, args } => std::iter::once(*callee).chain(args.iter().copied()).collect(),
            NodeKind::IntrinsicCall { args, .. } | NodeKind::StructLiteral { values: args, .. } => args.clone(),
            NodeKind::OverloadedFunction { options, .. } => options.clone(),
            NodeKind::Return(expr) => expr.iter().copied().collect(),
            NodeKind::If {
                cond,
                then_block,
                else_block,
            } => [Some(*cond), Some(*then_block), *else_block].into_iter().flatten().collect(),
            NodeKind::For {
                var,
                start,
                end,
                step,
                body,
            } => [Some(*var), Some(*start), Some(*end), *step, Some(*body)]
                .into_iter()
                .flatten()
                .collect(),
            NodeKind::While { cond, body } => vec![*cond, *body],
            _ => Vec::new(),
        }
    }

    /// Mutable slots for the same children `children` returns, same order
    pub fn child_slots_mut(&mut self) -> Vec<&mut NodeId> {
        match self {
            NodeKind::Block(stmts) => stmts.iter_mut().collect(),
            NodeKind::Memres { initial, .. } => initial.iter_mut().collect(),
            NodeKind::Dereference(expr) | NodeKind::AddressOf(expr) | NodeKind::Defer(expr) => vec![expr],
            NodeKind::ArrayAccess { addr, index, .. } => vec![addr, index],
            NodeKind::FieldAccess { expr, .. } => vec![expr],
            NodeKind::UnaryOp { expr, .. } => vec![expr],
            NodeKind::BinaryOp { left, right, .. } => vec![left, right],
            NodeKind::Call { callee, args } => std::iter::once(callee).chain(args.iter_mut()).collect(),
            NodeKind::IntrinsicCall { args, .. } | NodeKind::StructLiteral { values: args, .. } => {
                args.iter_mut().collect()
            }
            NodeKind::OverloadedFunction { options, .. } => options.iter_mut().collect(),
            NodeKind::Return(expr) => expr.iter_mut().collect(),
            NodeKind::If {
                cond,
                then_block,
                else_block,
            } => {
                let mut slots = vec![cond, then_block];
                slots.extend(else_block.as_mut());
                slots
            }
            NodeKind::For {
                var,
                start,
                end,
                step,
                body,
            } => {
                let mut slots = vec![var, start, end];
                slots.extend(step.as_mut());
                slots.push(body);
                slots
            }
            NodeKind::While { cond, body } => vec![cond, body],
            _ => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_child_slots_match_children() {
        let a = NodeId::from_raw(1);
        let b = NodeId::from_raw(2);
        let c = NodeId::from_raw(3);
        let mut kind = NodeKind::If {
            cond: a,
            then_block: b,
            else_block: Some(c),
        };
        assert_eq!(kind.children(), vec![a, b, c]);

        let d = NodeId::from_raw(9);
        let mut slots = kind.child_slots_mut();
        *slots[2] = d;
        assert_eq!(kind.children(), vec![a, b, d]);
    }

    #[test]
    fn test_call_children_start_with_callee() {
        let mut kind = NodeKind::Call {
            callee: NodeId::from_raw(5),
            args: vec![NodeId::from_raw(6), NodeId::from_raw(7)],
        };
        assert_eq!(kind.children()[0], NodeId::from_raw(5));
        assert_eq!(kind.child_slots_mut().len(), 3);
        assert_eq!(kind.kind(), AstKind::Call);
    }
}

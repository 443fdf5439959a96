//! Abstract syntax tree
//!
//! Nodes and type expressions live in two arenas owned by [`Ast`] and refer
//! to each other through `NodeId` / `TypeExprId` handles. Child lists are
//! plain ordered vectors. The tree is mutated in place during resolution:
//! symbol references are swapped for the handle of their declaration and
//! resolved types are written into `Node::ty`.

mod attrs;
mod kind;
mod node;
mod ops;
mod type_expr;

pub use attrs::{BuiltinGlobal, ForeignName, FunctionAttrs, GlobalAttrs, LocalAttrs};
pub use kind::AstKind;
pub use node::{FunctionDecl, ImportItem, Node, NodeKind, NumLit, UseDecl};
pub use ops::{BinaryOp, UnaryOp};
pub use type_expr::{EnumDecl, StructMember, TypeExpr, TypeExprKind};

use crate::common::Span;

/// Interned identifier
pub type Name = string_interner::DefaultSymbol;

define_handle!(NodeId);
define_handle!(TypeExprId);

/// What a scope binds a name to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Decl {
    Node(NodeId),
    Type(TypeExprId),
}

/// Arena storage for the whole compilation
#[derive(Debug, Default)]
pub struct Ast {
    nodes: Vec<Node>,
    type_exprs: Vec<TypeExpr>,
}

impl Ast {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, kind: NodeKind, span: Span) -> NodeId {
        self.add_node(Node::new(kind, span))
    }

    /// Add a node carrying a written type
    pub fn add_typed(&mut self, kind: NodeKind, span: Span, type_node: Option<TypeExprId>) -> NodeId {
        let mut node = Node::new(kind, span);
        node.type_node = type_node;
        self.add_node(node)
    }

    fn add_node(&mut self, node: Node) -> NodeId {
        let id = NodeId::from_raw(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.index()]
    }

    pub fn add_type(&mut self, kind: TypeExprKind, span: Span) -> TypeExprId {
        let id = TypeExprId::from_raw(self.type_exprs.len() as u32);
        self.type_exprs.push(TypeExpr {
            kind,
            span,
            name: None,
        });
        id
    }

    pub fn type_expr(&self, id: TypeExprId) -> &TypeExpr {
        &self.type_exprs[id.index()]
    }

    pub fn type_expr_mut(&mut self, id: TypeExprId) -> &mut TypeExpr {
        &mut self.type_exprs[id.index()]
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn type_count(&self) -> usize {
        self.type_exprs.len()
    }

    pub fn decl_span(&self, decl: Decl) -> Span {
        match decl {
            Decl::Node(id) => self.node(id).span,
            Decl::Type(id) => self.type_expr(id).span,
        }
    }
}

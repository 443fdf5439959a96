//! Node classification

/// Closed set of node kinds, shared by value nodes and type nodes.
///
/// Two ranges are load-bearing and must stay contiguous:
/// - `Local..=FieldAccess` are the lvalue-capable kinds (`is_lval`)
/// - `BasicType..=TypeAlias` are the type-expression kinds (`is_type`)
///
/// A new lvalue-capable or type kind goes inside its range, otherwise the
/// predicate below has to be updated together with it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AstKind {
    Package,
    UsePackage,
    IncludeFile,
    Symbol,
    Function,
    OverloadedFunction,
    Block,

    Local,
    Global,
    Memres,
    Dereference,
    ArrayAccess,
    FieldAccess,

    BasicType,
    PointerType,
    FunctionType,
    ArrayType,
    StructType,
    EnumType,
    TypeAlias,

    EnumValue,
    NumLit,
    StrLit,
    UnaryOp,
    BinaryOp,
    Call,
    IntrinsicCall,
    AddressOf,
    SizeOf,
    AlignOf,
    FileContents,
    StructLiteral,

    Return,
    If,
    For,
    While,
    Break,
    Continue,
    Defer,
}

impl AstKind {
    pub fn is_lval(self) -> bool {
        (AstKind::Local..=AstKind::FieldAccess).contains(&self)
    }

    pub fn is_type(self) -> bool {
        (AstKind::BasicType..=AstKind::TypeAlias).contains(&self)
    }

    /// Kinds that carry a resolved type once their entity is finalized
    pub fn is_typed(self) -> bool {
        matches!(self, AstKind::Function)
            || (AstKind::Local..=AstKind::FieldAccess).contains(&self)
            || (AstKind::EnumValue..=AstKind::StructLiteral).contains(&self)
    }

    pub fn is_statement(self) -> bool {
        (AstKind::Return..=AstKind::Defer).contains(&self) || self == AstKind::Block
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lval_kinds() {
        let lvals = [
            AstKind::Local,
            AstKind::Global,
            AstKind::Memres,
            AstKind::Dereference,
            AstKind::ArrayAccess,
            AstKind::FieldAccess,
        ];
        for kind in lvals {
            assert!(kind.is_lval(), "{kind:?}");
        }
        assert!(!AstKind::Call.is_lval());
        assert!(!AstKind::Symbol.is_lval());
        assert!(!AstKind::BasicType.is_lval());
    }

    #[test]
    fn test_type_kinds() {
        assert!(AstKind::BasicType.is_type());
        assert!(AstKind::StructType.is_type());
        assert!(AstKind::TypeAlias.is_type());
        assert!(!AstKind::FieldAccess.is_type());
        assert!(!AstKind::EnumValue.is_type());
        assert!(!AstKind::Symbol.is_type());
    }
}

//! Operator enumerations

use std::fmt;

/// Binary operators.
///
/// Declaration order is load-bearing: `is_compare` and `is_assignment` are
/// range checks, so comparisons must stay between `Equal` and `GreaterEqual`
/// and assignments between `Assign` and `AssignSar`. Compound assignment is
/// one tag per operator; there is no desugaring step before lowering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BinaryOp {
    Add,
    Minus,
    Multiply,
    Divide,
    Modulus,

    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,

    And,
    Or,
    Xor,
    Shl,
    Shr,
    Sar,

    BoolAnd,
    BoolOr,

    Assign,
    AssignAdd,
    AssignMinus,
    AssignMultiply,
    AssignDivide,
    AssignModulus,
    AssignAnd,
    AssignOr,
    AssignXor,
    AssignShl,
    AssignShr,
    AssignSar,

    Pipe,
}

impl BinaryOp {
    pub fn is_assignment(self) -> bool {
        (BinaryOp::Assign..=BinaryOp::AssignSar).contains(&self)
    }

    pub fn is_compare(self) -> bool {
        (BinaryOp::Equal..=BinaryOp::GreaterEqual).contains(&self)
    }

    pub fn is_bool(self) -> bool {
        matches!(self, BinaryOp::BoolAnd | BinaryOp::BoolOr)
    }

    pub fn is_arithmetic(self) -> bool {
        (BinaryOp::Add..=BinaryOp::Modulus).contains(&self)
    }

    pub fn is_bitwise(self) -> bool {
        (BinaryOp::And..=BinaryOp::Sar).contains(&self)
    }

    /// Binding strength for the expression parser, higher binds tighter.
    /// Assignments are statements and never chain, so they rank lowest.
    pub fn precedence(self) -> u8 {
        match self {
            BinaryOp::Pipe => 1,
            BinaryOp::BoolOr => 2,
            BinaryOp::BoolAnd => 3,
            BinaryOp::Equal
            | BinaryOp::NotEqual
            | BinaryOp::Less
            | BinaryOp::LessEqual
            | BinaryOp::Greater
            | BinaryOp::GreaterEqual => 4,
            BinaryOp::Or => 5,
            BinaryOp::Xor => 6,
            BinaryOp::And => 7,
            BinaryOp::Shl | BinaryOp::Shr | BinaryOp::Sar => 8,
            BinaryOp::Add | BinaryOp::Minus => 9,
            BinaryOp::Multiply | BinaryOp::Divide | BinaryOp::Modulus => 10,
            _ => 0,
        }
    }

    /// Operator applied by a compound assignment (`+=` -> `+`)
    pub fn compound_base(self) -> Option<BinaryOp> {
        Some(match self {
            BinaryOp::AssignAdd => BinaryOp::Add,
            BinaryOp::AssignMinus => BinaryOp::Minus,
            BinaryOp::AssignMultiply => BinaryOp::Multiply,
            BinaryOp::AssignDivide => BinaryOp::Divide,
            BinaryOp::AssignModulus => BinaryOp::Modulus,
            BinaryOp::AssignAnd => BinaryOp::And,
            BinaryOp::AssignOr => BinaryOp::Or,
            BinaryOp::AssignXor => BinaryOp::Xor,
            BinaryOp::AssignShl => BinaryOp::Shl,
            BinaryOp::AssignShr => BinaryOp::Shr,
            BinaryOp::AssignSar => BinaryOp::Sar,
            _ => return None,
        })
    }

    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Minus => "-",
            BinaryOp::Multiply => "*",
            BinaryOp::Divide => "/",
            BinaryOp::Modulus => "%",
            BinaryOp::Equal => "==",
            BinaryOp::NotEqual => "!=",
            BinaryOp::Less => "<",
            BinaryOp::LessEqual => "<=",
            BinaryOp::Greater => ">",
            BinaryOp::GreaterEqual => ">=",
            BinaryOp::And => "&",
            BinaryOp::Or => "|",
            BinaryOp::Xor => "^",
            BinaryOp::Shl => "<<",
            BinaryOp::Shr => ">>",
            BinaryOp::Sar => ">>>",
            BinaryOp::BoolAnd => "&&",
            BinaryOp::BoolOr => "||",
            BinaryOp::Assign => "=",
            BinaryOp::AssignAdd => "+=",
            BinaryOp::AssignMinus => "-=",
            BinaryOp::AssignMultiply => "*=",
            BinaryOp::AssignDivide => "/=",
            BinaryOp::AssignModulus => "%=",
            BinaryOp::AssignAnd => "&=",
            BinaryOp::AssignOr => "|=",
            BinaryOp::AssignXor => "^=",
            BinaryOp::AssignShl => "<<=",
            BinaryOp::AssignShr => ">>=",
            BinaryOp::AssignSar => ">>>=",
            BinaryOp::Pipe => "|>",
        }
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Unary operators. `Cast` takes its target from the node's type node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Negate,
    Not,
    Cast,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operator_ranges() {
        assert!(BinaryOp::Assign.is_assignment());
        assert!(BinaryOp::AssignSar.is_assignment());
        assert!(!BinaryOp::Pipe.is_assignment());
        assert!(!BinaryOp::BoolOr.is_assignment());

        assert!(BinaryOp::Equal.is_compare());
        assert!(BinaryOp::GreaterEqual.is_compare());
        assert!(!BinaryOp::Modulus.is_compare());
        assert!(!BinaryOp::And.is_compare());
    }

    #[test]
    fn test_compound_base() {
        assert_eq!(BinaryOp::AssignShl.compound_base(), Some(BinaryOp::Shl));
        assert_eq!(BinaryOp::Assign.compound_base(), None);
        // Every compound operator maps back into the non-assigning range
        for op in [BinaryOp::AssignAdd, BinaryOp::AssignXor, BinaryOp::AssignSar] {
            let base = op.compound_base().unwrap();
            assert!(!base.is_assignment());
        }
    }
}

//! Primitive types
//!
//! Every primitive has a fixed `TypeId` (see [`super::TypeId::of_basic`]) that
//! the type table pre-registers in `ALL` order, so two references to the same
//! primitive always compare equal by id.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BasicKind {
    Void,
    Bool,
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
    F32,
    F64,
    Rawptr,
}

impl BasicKind {
    pub const ALL: [BasicKind; 13] = [
        BasicKind::Void,
        BasicKind::Bool,
        BasicKind::I8,
        BasicKind::U8,
        BasicKind::I16,
        BasicKind::U16,
        BasicKind::I32,
        BasicKind::U32,
        BasicKind::I64,
        BasicKind::U64,
        BasicKind::F32,
        BasicKind::F64,
        BasicKind::Rawptr,
    ];

    pub fn name(self) -> &'static str {
        match self {
            BasicKind::Void => "void",
            BasicKind::Bool => "bool",
            BasicKind::I8 => "i8",
            BasicKind::U8 => "u8",
            BasicKind::I16 => "i16",
            BasicKind::U16 => "u16",
            BasicKind::I32 => "i32",
            BasicKind::U32 => "u32",
            BasicKind::I64 => "i64",
            BasicKind::U64 => "u64",
            BasicKind::F32 => "f32",
            BasicKind::F64 => "f64",
            BasicKind::Rawptr => "rawptr",
        }
    }

    /// Size in bytes on wasm32
    pub fn size(self) -> u32 {
        match self {
            BasicKind::Void => 0,
            BasicKind::Bool | BasicKind::I8 | BasicKind::U8 => 1,
            BasicKind::I16 | BasicKind::U16 => 2,
            BasicKind::I32 | BasicKind::U32 | BasicKind::F32 | BasicKind::Rawptr => 4,
            BasicKind::I64 | BasicKind::U64 | BasicKind::F64 => 8,
        }
    }

    pub fn alignment(self) -> u32 {
        self.size().max(1)
    }

    pub fn is_integer(self) -> bool {
        matches!(
            self,
            BasicKind::I8
                | BasicKind::U8
                | BasicKind::I16
                | BasicKind::U16
                | BasicKind::I32
                | BasicKind::U32
                | BasicKind::I64
                | BasicKind::U64
        )
    }

    pub fn is_signed(self) -> bool {
        matches!(
            self,
            BasicKind::I8 | BasicKind::I16 | BasicKind::I32 | BasicKind::I64
        )
    }

    pub fn is_float(self) -> bool {
        matches!(self, BasicKind::F32 | BasicKind::F64)
    }

    pub fn is_numeric(self) -> bool {
        self.is_integer() || self.is_float()
    }
}

impl fmt::Display for BasicKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

//! Per-kind attribute records
//!
//! Each declaration kind gets its own small record instead of sharing one
//! flag word, so an attribute can only be set where it means something.

use crate::types::Intrinsic;

/// Import name of a `#foreign` declaration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignName {
    pub module: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FunctionAttrs {
    /// `#export "name"`
    pub export_name: Option<String>,
    pub foreign: Option<ForeignName>,
    /// `#intrinsic` with the catalog name it was declared under
    pub intrinsic_name: Option<String>,
    /// Filled in when the header is finalized
    pub intrinsic: Option<Intrinsic>,
    pub inline: bool,
    pub private: bool,
}

impl FunctionAttrs {
    pub fn is_intrinsic(&self) -> bool {
        self.intrinsic_name.is_some()
    }

    /// Foreign and intrinsic procedures have no body
    pub fn is_bodiless(&self) -> bool {
        self.foreign.is_some() || self.intrinsic_name.is_some()
    }
}

/// Values the runtime provides for globals of the `builtin` package
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinGlobal {
    StackTop,
    HeapStart,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GlobalAttrs {
    pub export_name: Option<String>,
    pub foreign: Option<ForeignName>,
    pub builtin: Option<BuiltinGlobal>,
    pub private: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LocalAttrs {
    pub param: bool,
    /// Set by the checker when `^local` is taken; such locals live in memory
    pub address_taken: bool,
}

//! Type system
//!
//! Resolved types (as opposed to the syntactic type nodes in `ast`), the
//! primitive registry and the intrinsic catalog.

mod basic;
mod intrinsics;
mod ty;

pub use basic::BasicKind;
pub use intrinsics::Intrinsic;
pub use ty::{align_up, checked_align_up, EnumInfo, StructLayout, StructMemberInfo, Type, TypeId, TypeTable};

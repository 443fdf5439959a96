//! Resolved semantic types
//!
//! Types are interned: structurally equal pointer, array and function types
//! share one `TypeId`, so comparing ids is comparing types. Structs and enums
//! are nominal and keyed by their declaring type node. Their expensive parts
//! (member layout, enum backing) live in side tables that are written once.

use std::collections::HashMap;

use super::BasicKind;
use crate::ast::{Name, TypeExprId};

define_handle!(TypeId);

impl TypeId {
    pub const VOID: TypeId = TypeId::of_basic(BasicKind::Void);
    pub const BOOL: TypeId = TypeId::of_basic(BasicKind::Bool);
    pub const I8: TypeId = TypeId::of_basic(BasicKind::I8);
    pub const U8: TypeId = TypeId::of_basic(BasicKind::U8);
    pub const I16: TypeId = TypeId::of_basic(BasicKind::I16);
    pub const U16: TypeId = TypeId::of_basic(BasicKind::U16);
    pub const I32: TypeId = TypeId::of_basic(BasicKind::I32);
    pub const U32: TypeId = TypeId::of_basic(BasicKind::U32);
    pub const I64: TypeId = TypeId::of_basic(BasicKind::I64);
    pub const U64: TypeId = TypeId::of_basic(BasicKind::U64);
    pub const F32: TypeId = TypeId::of_basic(BasicKind::F32);
    pub const F64: TypeId = TypeId::of_basic(BasicKind::F64);
    pub const RAWPTR: TypeId = TypeId::of_basic(BasicKind::Rawptr);

    /// Primitives occupy the first slots of every type table
    pub const fn of_basic(kind: BasicKind) -> TypeId {
        TypeId::from_raw(kind as u32)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    Basic(BasicKind),
    Pointer(TypeId),
    Function { params: Vec<TypeId>, ret: TypeId },
    Array { elem: TypeId, count: u32 },
    /// Nominal struct, identified by its declaring type node
    Struct(TypeExprId),
    /// Nominal enum, identified by its declaring type node
    Enum(TypeExprId),
}

#[derive(Debug, Clone, PartialEq)]
pub struct StructMemberInfo {
    pub name: Name,
    pub ty: TypeId,
    pub offset: u32,
}

/// Derived layout of a struct declaration
#[derive(Debug, Clone, PartialEq)]
pub struct StructLayout {
    pub members: Vec<StructMemberInfo>,
    pub size: u32,
    pub align: u32,
}

impl StructLayout {
    pub fn member(&self, name: Name) -> Option<&StructMemberInfo> {
        self.members.iter().find(|m| m.name == name)
    }
}

/// Derived data of an enum declaration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnumInfo {
    pub backing: BasicKind,
    pub flags: bool,
}

/// Interned type storage plus the derive-once caches
#[derive(Debug)]
pub struct TypeTable {
    types: Vec<Type>,
    interned: HashMap<Type, TypeId>,
    struct_layouts: HashMap<TypeExprId, StructLayout>,
    enum_infos: HashMap<TypeExprId, EnumInfo>,
    derivations: u32,
}

impl TypeTable {
    pub fn new() -> Self {
        let mut table = Self {
            types: Vec::new(),
            interned: HashMap::new(),
            struct_layouts: HashMap::new(),
            enum_infos: HashMap::new(),
            derivations: 0,
        };
        for kind in BasicKind::ALL {
            let id = table.intern(Type::Basic(kind));
            debug_assert_eq!(id, TypeId::of_basic(kind));
        }
        table
    }

    pub fn intern(&mut self, ty: Type) -> TypeId {
        if let Some(id) = self.interned.get(&ty) {
            return *id;
        }
        let id = TypeId::from_raw(self.types.len() as u32);
        self.types.push(ty.clone());
        self.interned.insert(ty, id);
        id
    }

    pub fn get(&self, id: TypeId) -> &Type {
        &self.types[id.index()]
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn pointer_to(&mut self, elem: TypeId) -> TypeId {
        self.intern(Type::Pointer(elem))
    }

    pub fn function(&mut self, params: Vec<TypeId>, ret: TypeId) -> TypeId {
        self.intern(Type::Function { params, ret })
    }

    pub fn array(&mut self, elem: TypeId, count: u32) -> TypeId {
        self.intern(Type::Array { elem, count })
    }

    pub fn struct_type(&mut self, decl: TypeExprId) -> TypeId {
        self.intern(Type::Struct(decl))
    }

    pub fn enum_type(&mut self, decl: TypeExprId) -> TypeId {
        self.intern(Type::Enum(decl))
    }

    // ==================== Derive-once caches ====================

    pub fn struct_layout(&self, decl: TypeExprId) -> Option<&StructLayout> {
        self.struct_layouts.get(&decl)
    }

    /// Store a fully derived layout. Each declaration is derived exactly once.
    pub fn cache_struct_layout(&mut self, decl: TypeExprId, layout: StructLayout) {
        debug_assert!(!self.struct_layouts.contains_key(&decl));
        self.derivations += 1;
        self.struct_layouts.insert(decl, layout);
    }

    pub fn enum_info(&self, decl: TypeExprId) -> Option<EnumInfo> {
        self.enum_infos.get(&decl).copied()
    }

    pub fn cache_enum_info(&mut self, decl: TypeExprId, info: EnumInfo) {
        debug_assert!(!self.enum_infos.contains_key(&decl));
        self.derivations += 1;
        self.enum_infos.insert(decl, info);
    }

    /// Number of struct/enum derivations performed so far
    pub fn derivation_count(&self) -> u32 {
        self.derivations
    }

    // ==================== Type queries ====================

    pub fn basic(&self, id: TypeId) -> Option<BasicKind> {
        match self.get(id) {
            Type::Basic(kind) => Some(*kind),
            Type::Enum(decl) => self.enum_info(*decl).map(|info| info.backing),
            _ => None,
        }
    }

    pub fn is_integer(&self, id: TypeId) -> bool {
        matches!(self.get(id), Type::Basic(k) if k.is_integer())
    }

    pub fn is_float(&self, id: TypeId) -> bool {
        matches!(self.get(id), Type::Basic(k) if k.is_float())
    }

    pub fn is_numeric(&self, id: TypeId) -> bool {
        matches!(self.get(id), Type::Basic(k) if k.is_numeric())
    }

    pub fn is_bool(&self, id: TypeId) -> bool {
        id == TypeId::BOOL
    }

    /// Typed pointer or rawptr
    pub fn is_pointer(&self, id: TypeId) -> bool {
        id == TypeId::RAWPTR || matches!(self.get(id), Type::Pointer(_))
    }

    pub fn is_enum(&self, id: TypeId) -> bool {
        matches!(self.get(id), Type::Enum(_))
    }

    pub fn pointee(&self, id: TypeId) -> Option<TypeId> {
        match self.get(id) {
            Type::Pointer(elem) => Some(*elem),
            _ => None,
        }
    }

    pub fn struct_decl(&self, id: TypeId) -> Option<TypeExprId> {
        match self.get(id) {
            Type::Struct(decl) => Some(*decl),
            _ => None,
        }
    }

    /// Whether a value of `actual` may be stored where `expected` is required.
    /// rawptr converts to and from every pointer type.
    pub fn compatible(&self, expected: TypeId, actual: TypeId) -> bool {
        if expected == actual {
            return true;
        }
        (expected == TypeId::RAWPTR && self.is_pointer(actual))
            || (actual == TypeId::RAWPTR && self.is_pointer(expected))
    }

    /// Size in bytes; `None` while a struct or enum involved is not derived
    /// yet, or when the size does not fit in a `u32`
    pub fn size_of(&self, id: TypeId) -> Option<u32> {
        match self.get(id) {
            Type::Basic(kind) => Some(kind.size()),
            Type::Pointer(_) | Type::Function { .. } => Some(4),
            Type::Array { elem, count } => self.size_of(*elem)?.checked_mul(*count),
            Type::Struct(decl) => self.struct_layout(*decl).map(|l| l.size),
            Type::Enum(decl) => self.enum_info(*decl).map(|i| i.backing.size()),
        }
    }

    pub fn align_of(&self, id: TypeId) -> Option<u32> {
        match self.get(id) {
            Type::Basic(kind) => Some(kind.alignment()),
            Type::Pointer(_) | Type::Function { .. } => Some(4),
            Type::Array { elem, .. } => self.align_of(*elem),
            Type::Struct(decl) => self.struct_layout(*decl).map(|l| l.align),
            Type::Enum(decl) => self.enum_info(*decl).map(|i| i.backing.alignment()),
        }
    }
}

impl Default for TypeTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Round `offset` up to a multiple of `align`
pub fn align_up(offset: u32, align: u32) -> u32 {
    if align <= 1 {
        return offset;
    }
    offset.div_ceil(align) * align
}

/// `align_up` that gives `None` instead of passing `u32::MAX`
pub fn checked_align_up(offset: u32, align: u32) -> Option<u32> {
    if align <= 1 {
        return Some(offset);
    }
    offset.div_ceil(align).checked_mul(align)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primitive_identity() {
        let mut table = TypeTable::new();
        for a in BasicKind::ALL {
            for b in BasicKind::ALL {
                let ia = table.intern(Type::Basic(a));
                let ib = table.intern(Type::Basic(b));
                assert_eq!(ia == ib, a == b, "{a} vs {b}");
            }
        }
        assert_eq!(table.len(), BasicKind::ALL.len());
    }

    #[test]
    fn test_structural_types_are_interned() {
        let mut table = TypeTable::new();
        let p1 = table.pointer_to(TypeId::I32);
        let p2 = table.pointer_to(TypeId::I32);
        assert_eq!(p1, p2);
        assert_ne!(p1, table.pointer_to(TypeId::U32));

        let f1 = table.function(vec![TypeId::I32, p1], TypeId::VOID);
        let f2 = table.function(vec![TypeId::I32, p2], TypeId::VOID);
        assert_eq!(f1, f2);
    }

    #[test]
    fn test_rawptr_compatibility() {
        let mut table = TypeTable::new();
        let p = table.pointer_to(TypeId::U8);
        assert!(table.compatible(TypeId::RAWPTR, p));
        assert!(table.compatible(p, TypeId::RAWPTR));
        assert!(!table.compatible(TypeId::RAWPTR, TypeId::I32));
        assert!(!table.compatible(TypeId::I32, TypeId::U32));
    }

    #[test]
    fn test_sizes() {
        let mut table = TypeTable::new();
        let arr = table.array(TypeId::I16, 10);
        assert_eq!(table.size_of(arr), Some(20));
        assert_eq!(table.align_of(arr), Some(2));
        assert_eq!(table.size_of(TypeId::F64), Some(8));
        assert_eq!(align_up(5, 4), 8);
        assert_eq!(align_up(8, 4), 8);
        assert_eq!(align_up(3, 1), 3);
    }

    #[test]
    fn test_oversized_array_has_no_size() {
        let mut table = TypeTable::new();
        let big = table.array(TypeId::I64, 0x4000_0000);
        assert_eq!(table.size_of(big), None);
        assert_eq!(checked_align_up(u32::MAX - 2, 4), None);
        assert_eq!(checked_align_up(13, 4), Some(16));
    }
}

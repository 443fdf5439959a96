//! Type derivation
//!
//! Turns resolved type expressions into interned [`TypeId`]s and derives
//! struct layouts and enum values. Layouts and enum data are cached in the
//! type table the first time they are derived and never recomputed.

use tracing::trace;

use super::resolver::Resolver;
use super::{EntityState, Stall, StepResult};
use crate::ast::{Decl, NodeId, NodeKind, NumLit, TypeExprId, TypeExprKind, UnaryOp};
use crate::common::{CompileError, Span};
use crate::types::{BasicKind, EnumInfo, StructLayout, StructMemberInfo, Type, TypeId, checked_align_up};

impl Resolver<'_> {
    /// Semantic type of a resolved type expression
    pub(super) fn type_of(&mut self, id: TypeExprId) -> StepResult<TypeId> {
        let texpr = self.program.ast.type_expr(id);
        let span = texpr.span;
        let kind = texpr.kind.clone();

        let nominal = matches!(kind, TypeExprKind::Struct(_) | TypeExprKind::Enum(_));
        if !nominal && self.is_foreign(Decl::Type(id)) {
            self.require_symbols_resolved(Decl::Type(id), span)?;
        }

        match kind {
            TypeExprKind::Struct(_) => Ok(self.program.types.struct_type(id)),
            TypeExprKind::Enum(_) => Ok(self.program.types.enum_type(id)),
            TypeExprKind::Basic(basic) => Ok(TypeId::of_basic(basic)),
            TypeExprKind::Symbol(_) | TypeExprKind::Qualified { .. } => {
                Err(CompileError::semantic("type was not resolved", span).into())
            }
            TypeExprKind::Pointer(elem) => {
                let elem = self.type_of(elem)?;
                Ok(self.program.types.pointer_to(elem))
            }
            TypeExprKind::Function { params, ret } => {
                let mut resolved = Vec::with_capacity(params.len());
                for param in params {
                    resolved.push(self.type_of(param)?);
                }
                let ret = self.type_of(ret)?;
                Ok(self.program.types.function(resolved, ret))
            }
            TypeExprKind::Array { elem, count } => {
                let elem = self.type_of(elem)?;
                let count = self.array_count(count)?;
                Ok(self.program.types.array(elem, count))
            }
            TypeExprKind::Alias(inner) => self.type_of(inner),
        }
    }

    /// The names inside another entity's type are only settled once that
    /// entity has left `Unresolved`.
    fn require_symbols_resolved(&self, decl: Decl, span: Span) -> StepResult<()> {
        let Some(owner) = self.program.owner_of(decl) else {
            return Ok(());
        };
        match self.program.entity(owner).state {
            EntityState::Unresolved => Err(Stall::blocked(self.program.entity_label(owner), span)),
            EntityState::Error => Err(CompileError::ErroneousDependency {
                name: self.decl_name(decl),
                span,
            }
            .into()),
            EntityState::ResolvingTypes | EntityState::Finalized => Ok(()),
        }
    }

    fn array_count(&mut self, count: NodeId) -> StepResult<u32> {
        let span = self.program.ast.node(count).span;
        let value = self.const_int(count, &[])?;
        u32::try_from(value)
            .map_err(|_| CompileError::semantic(format!("invalid array length {value}"), span).into())
    }

    /// Value of a constant integer expression. `pending` holds enum values
    /// derived by the current step but not committed yet.
    fn const_int(&self, id: NodeId, pending: &[(NodeId, i64)]) -> StepResult<i64> {
        let node = self.program.ast.node(id);
        let span = node.span;
        match &node.kind {
            NodeKind::NumLit(NumLit::Int(value)) => Ok(*value),
            NodeKind::UnaryOp {
                op: UnaryOp::Negate,
                expr,
            } => Ok(self.const_int(*expr, pending)?.wrapping_neg()),
            NodeKind::EnumValue { resolved, .. } => {
                if let Some((_, value)) = pending.iter().find(|(node, _)| *node == id) {
                    return Ok(*value);
                }
                self.require_finalized(Decl::Node(id), span)?;
                resolved.ok_or_else(|| CompileError::semantic("enum value has no value", span).into())
            }
            _ => Err(CompileError::semantic("expected a constant integer", span).into()),
        }
    }

    // ==================== Layout ====================

    /// Size and alignment of a type, deriving struct and enum data on demand
    pub(super) fn size_and_align(&mut self, ty: TypeId, span: Span) -> StepResult<(u32, u32)> {
        match self.program.types.get(ty).clone() {
            Type::Basic(BasicKind::Void) => {
                return Err(CompileError::semantic("'void' has no size", span).into());
            }
            Type::Struct(decl) => self.ensure_layout(decl, span)?,
            Type::Enum(decl) => self.ensure_enum(decl, span)?,
            Type::Array { elem, count } => {
                let (size, align) = self.size_and_align(elem, span)?;
                let size = size.checked_mul(count).ok_or_else(|| too_large(span))?;
                return Ok((size, align));
            }
            Type::Basic(_) | Type::Pointer(_) | Type::Function { .. } => {}
        }

        let types = &self.program.types;
        match (types.size_of(ty), types.align_of(ty)) {
            (Some(size), Some(align)) => Ok((size, align)),
            _ => Err(Stall::blocked(format!("layout of '{}'", self.type_name(ty)), span)),
        }
    }

    /// Derive and cache the member layout of a struct declaration
    pub(super) fn ensure_layout(&mut self, decl: TypeExprId, span: Span) -> StepResult<()> {
        if self.program.types.struct_layout(decl).is_some() {
            return Ok(());
        }
        if self.is_foreign(Decl::Type(decl)) {
            self.require_finalized(Decl::Type(decl), span)?;
            if self.program.types.struct_layout(decl).is_some() {
                return Ok(());
            }
        }
        if !self.in_progress.insert(decl) {
            return Err(Stall::blocked(
                format!("layout of struct '{}'", self.decl_name(Decl::Type(decl))),
                span,
            ));
        }

        let layout = self.derive_layout(decl);
        self.in_progress.remove(&decl);
        let layout = layout?;

        trace!(
            name = %self.decl_name(Decl::Type(decl)),
            size = layout.size,
            align = layout.align,
            "derived struct layout"
        );
        self.program.types.cache_struct_layout(decl, layout);
        Ok(())
    }

    fn derive_layout(&mut self, decl: TypeExprId) -> StepResult<StructLayout> {
        let span = self.program.ast.type_expr(decl).span;
        let TypeExprKind::Struct(members) = self.program.ast.type_expr(decl).kind.clone() else {
            return Err(CompileError::semantic("expected a struct type", span).into());
        };

        let mut infos: Vec<StructMemberInfo> = Vec::with_capacity(members.len());
        let mut offset = 0;
        let mut align = 1;
        for member in &members {
            if infos.iter().any(|info| info.name == member.name) {
                return Err(CompileError::redefinition(self.text(member.name), member.span, None).into());
            }
            let ty = self.type_of(member.type_node)?;
            let (member_size, member_align) = self.size_and_align(ty, member.span)?;
            offset = checked_align_up(offset, member_align).ok_or_else(|| too_large(member.span))?;
            infos.push(StructMemberInfo {
                name: member.name,
                ty,
                offset,
            });
            offset = offset.checked_add(member_size).ok_or_else(|| too_large(member.span))?;
            align = align.max(member_align);
        }

        Ok(StructLayout {
            members: infos,
            size: checked_align_up(offset, align).ok_or_else(|| too_large(span))?,
            align,
        })
    }

    fn ensure_enum(&mut self, decl: TypeExprId, span: Span) -> StepResult<()> {
        if self.program.types.enum_info(decl).is_some() {
            return Ok(());
        }
        if self.is_foreign(Decl::Type(decl)) {
            return self.require_finalized(Decl::Type(decl), span);
        }
        self.derive_enum(decl)
    }

    // ==================== Enums ====================

    /// Assign every value of an enum and record its backing type.
    ///
    /// Values count up from 0, or for `#flags` enums start at 1 and double.
    /// An explicit value restarts the sequence.
    pub(super) fn derive_enum(&mut self, texpr: TypeExprId) -> StepResult<()> {
        if self.program.types.enum_info(texpr).is_some() {
            return Ok(());
        }
        let span = self.program.ast.type_expr(texpr).span;
        let TypeExprKind::Enum(decl) = self.program.ast.type_expr(texpr).kind.clone() else {
            return Ok(());
        };

        let backing = match decl.backing {
            Some(backing) => {
                let ty = self.type_of(backing)?;
                match self.program.types.get(ty) {
                    Type::Basic(kind) if kind.is_integer() => *kind,
                    _ => {
                        return Err(CompileError::semantic(
                            format!("enum backing type must be an integer type, found '{}'", self.type_name(ty)),
                            span,
                        )
                        .into());
                    }
                }
            }
            None => BasicKind::U32,
        };

        let mut next: i64 = if decl.flags { 1 } else { 0 };
        let mut values = Vec::with_capacity(decl.values.len());
        for value in &decl.values {
            let explicit = match self.program.ast.node(*value).kind {
                NodeKind::EnumValue { value: explicit, .. } => explicit,
                _ => None,
            };
            let assigned = match explicit {
                Some(expr) => self.const_int(expr, &values)?,
                None => next,
            };
            values.push((*value, assigned));
            next = if decl.flags {
                assigned.wrapping_shl(1)
            } else {
                assigned.wrapping_add(1)
            };
        }

        let ty = self.program.types.enum_type(texpr);
        for (value, assigned) in values {
            let node = self.program.ast.node_mut(value);
            node.ty = Some(ty);
            if let NodeKind::EnumValue { resolved, .. } = &mut node.kind {
                *resolved = Some(assigned);
            }
        }
        self.program.types.cache_enum_info(
            texpr,
            EnumInfo {
                backing,
                flags: decl.flags,
            },
        );
        Ok(())
    }
}

fn too_large(span: Span) -> CompileError {
    CompileError::semantic("type is too large for 32-bit linear memory", span)
}

//! Expression and statement checking
//!
//! Assigns a type to every value node of an entity, validates operators,
//! calls and control flow, and fills in derived data the backend needs
//! (field offsets, element sizes, `sizeof` results). Calls to overloaded
//! procedures are bound to one option here, and calls to intrinsic
//! procedures are rewritten into intrinsic calls.

use super::resolver::Resolver;
use super::StepResult;
use crate::ast::{BinaryOp, Decl, Name, NodeId, NodeKind, NumLit, TypeExprId, UnaryOp};
use crate::common::{CompileError, Span};
use crate::types::{Type, TypeId};

/// Per-body state while checking statements
pub(super) struct FnContext {
    ret: TypeId,
    loops: u32,
}

impl FnContext {
    pub(super) fn new(ret: TypeId) -> Self {
        Self { ret, loops: 0 }
    }
}

impl Resolver<'_> {
    pub(super) fn expect_compatible(&self, expected: TypeId, actual: TypeId, span: Span) -> StepResult<()> {
        if self.program.types.compatible(expected, actual) {
            return Ok(());
        }
        Err(CompileError::type_mismatch(
            format!(
                "expected '{}', found '{}'",
                self.type_name(expected),
                self.type_name(actual)
            ),
            span,
        )
        .into())
    }

    /// Type of a declaration owned by another entity
    fn foreign_type(&self, id: NodeId, span: Span) -> StepResult<TypeId> {
        self.require_finalized(Decl::Node(id), span)?;
        if let NodeKind::OverloadedFunction { name, .. } = self.program.ast.node(id).kind {
            return Err(CompileError::semantic(
                format!("overloaded procedure '{}' can only be called", self.text(name)),
                span,
            )
            .into());
        }
        self.program.ast.node(id).ty.ok_or_else(|| {
            CompileError::semantic(format!("'{}' has no type", self.decl_name(Decl::Node(id))), span).into()
        })
    }

    fn no_field(&self, object: TypeId, field: Name, span: Span) -> CompileError {
        CompileError::semantic(
            format!("'{}' has no field '{}'", self.type_name(object), self.text(field)),
            span,
        )
    }

    fn is_own_literal(&self, id: NodeId) -> bool {
        matches!(self.program.ast.node(id).kind, NodeKind::NumLit(_)) && !self.is_foreign(Decl::Node(id))
    }

    // ==================== Statements ====================

    pub(super) fn check_stmt(&mut self, id: NodeId, ctx: &mut FnContext) -> StepResult<()> {
        let span = self.program.ast.node(id).span;
        match self.program.ast.node(id).kind.clone() {
            NodeKind::Local { .. } => {
                if let Some(texpr) = self.program.ast.node(id).type_node {
                    let ty = self.type_of(texpr)?;
                    if ty == TypeId::VOID {
                        return Err(CompileError::semantic("local cannot have type 'void'", span).into());
                    }
                    self.program.ast.node_mut(id).ty = Some(ty);
                }
                Ok(())
            }
            NodeKind::Block(stmts) => {
                for stmt in stmts {
                    self.check_stmt(stmt, ctx)?;
                }
                Ok(())
            }
            NodeKind::Return(value) => match value {
                Some(value) => {
                    let value_span = self.program.ast.node(value).span;
                    if ctx.ret == TypeId::VOID {
                        return Err(CompileError::type_mismatch("procedure does not return a value", value_span).into());
                    }
                    let actual = self.check_expr(value, Some(ctx.ret))?;
                    self.expect_compatible(ctx.ret, actual, value_span)
                }
                None if ctx.ret != TypeId::VOID => Err(CompileError::type_mismatch(
                    format!("expected a return value of type '{}'", self.type_name(ctx.ret)),
                    span,
                )
                .into()),
                None => Ok(()),
            },
            NodeKind::If {
                cond,
                then_block,
                else_block,
            } => {
                self.check_condition(cond)?;
                self.check_stmt(then_block, ctx)?;
                match else_block {
                    Some(else_block) => self.check_stmt(else_block, ctx),
                    None => Ok(()),
                }
            }
            NodeKind::While { cond, body } => {
                self.check_condition(cond)?;
                self.check_loop_body(body, ctx)
            }
            NodeKind::For {
                var,
                start,
                end,
                step,
                body,
            } => {
                let start_ty = self.check_expr(start, None)?;
                if !self.program.types.is_integer(start_ty) {
                    return Err(CompileError::type_mismatch(
                        format!("loop range must be an integer, found '{}'", self.type_name(start_ty)),
                        self.program.ast.node(start).span,
                    )
                    .into());
                }
                for bound in std::iter::once(end).chain(step) {
                    let actual = self.check_expr(bound, Some(start_ty))?;
                    self.expect_compatible(start_ty, actual, self.program.ast.node(bound).span)?;
                }
                self.program.ast.node_mut(var).ty = Some(start_ty);
                self.check_loop_body(body, ctx)
            }
            NodeKind::Break | NodeKind::Continue => {
                if ctx.loops == 0 {
                    let keyword = if matches!(self.program.ast.node(id).kind, NodeKind::Break) {
                        "break"
                    } else {
                        "continue"
                    };
                    return Err(CompileError::semantic(format!("'{keyword}' outside of a loop"), span).into());
                }
                Ok(())
            }
            NodeKind::Defer(stmt) => self.check_stmt(stmt, ctx),
            _ => self.check_expr(id, None).map(|_| ()),
        }
    }

    fn check_loop_body(&mut self, body: NodeId, ctx: &mut FnContext) -> StepResult<()> {
        ctx.loops += 1;
        let result = self.check_stmt(body, ctx);
        ctx.loops -= 1;
        result
    }

    fn check_condition(&mut self, cond: NodeId) -> StepResult<()> {
        let actual = self.check_expr(cond, Some(TypeId::BOOL))?;
        self.expect_compatible(TypeId::BOOL, actual, self.program.ast.node(cond).span)
    }

    // ==================== Expressions ====================

    /// Check an expression and record its type. `expected` is a hint used
    /// to type untyped literals; it is not enforced here.
    pub(super) fn check_expr(&mut self, id: NodeId, expected: Option<TypeId>) -> StepResult<TypeId> {
        let span = self.program.ast.node(id).span;
        if self.is_foreign(Decl::Node(id)) {
            return self.foreign_type(id, span);
        }

        let ty = match self.program.ast.node(id).kind.clone() {
            NodeKind::Package(_) => {
                return Err(CompileError::semantic("a package cannot be used as a value", span).into());
            }
            NodeKind::OverloadedFunction { name, .. } => {
                return Err(CompileError::semantic(
                    format!("overloaded procedure '{}' can only be called", self.text(name)),
                    span,
                )
                .into());
            }
            NodeKind::Local { .. }
            | NodeKind::Global { .. }
            | NodeKind::Memres { .. }
            | NodeKind::Function(_)
            | NodeKind::EnumValue { .. } => {
                return self.program.ast.node(id).ty.ok_or_else(|| {
                    CompileError::semantic(
                        format!("'{}' is used before its type is known", self.decl_name(Decl::Node(id))),
                        span,
                    )
                    .into()
                });
            }
            NodeKind::NumLit(lit) => self.check_numlit(id, lit, expected)?,
            NodeKind::StrLit { .. } | NodeKind::FileContents { .. } => self.program.types.pointer_to(TypeId::U8),
            NodeKind::Dereference(inner) => {
                let ty = self.check_expr(inner, None)?;
                self.program.types.pointee(ty).ok_or_else(|| {
                    CompileError::type_mismatch(format!("cannot dereference '{}'", self.type_name(ty)), span)
                })?
            }
            NodeKind::AddressOf(inner) => self.check_address_of(inner, span)?,
            NodeKind::ArrayAccess { addr, index, .. } => self.check_array_access(id, addr, index)?,
            NodeKind::FieldAccess { expr, field, .. } => {
                let mut object = self.check_expr(expr, None)?;
                if let Some(pointee) = self.program.types.pointee(object) {
                    object = pointee;
                }
                let decl = self
                    .program
                    .types
                    .struct_decl(object)
                    .ok_or_else(|| self.no_field(object, field, span))?;
                self.ensure_layout(decl, span)?;
                let member = self
                    .program
                    .types
                    .struct_layout(decl)
                    .and_then(|layout| layout.member(field))
                    .cloned()
                    .ok_or_else(|| self.no_field(object, field, span))?;
                if let NodeKind::FieldAccess { offset, .. } = &mut self.program.ast.node_mut(id).kind {
                    *offset = Some(member.offset);
                }
                member.ty
            }
            NodeKind::UnaryOp { op, expr } => self.check_unary(id, op, expr, expected)?,
            NodeKind::BinaryOp { op, left, right } => {
                if op.is_assignment() {
                    self.check_assignment(op, left, right, span)?
                } else {
                    self.check_binary(op, left, right, expected, span)?
                }
            }
            NodeKind::Call { callee, args } => self.check_call(id, callee, args)?,
            NodeKind::IntrinsicCall { intrinsic, args } => {
                let (params, ret) = intrinsic.signature();
                if params.len() != args.len() {
                    return Err(CompileError::semantic(
                        format!(
                            "intrinsic '{}' expects {} arguments, found {}",
                            intrinsic.name(),
                            params.len(),
                            args.len()
                        ),
                        span,
                    )
                    .into());
                }
                for (arg, param) in args.iter().zip(params) {
                    let param = TypeId::of_basic(*param);
                    let actual = self.check_expr(*arg, Some(param))?;
                    self.expect_compatible(param, actual, self.program.ast.node(*arg).span)?;
                }
                TypeId::of_basic(ret)
            }
            NodeKind::SizeOf { of, .. } => {
                let ty = self.type_of(of)?;
                let (size, _) = self.size_and_align(ty, span)?;
                if let NodeKind::SizeOf { size: slot, .. } = &mut self.program.ast.node_mut(id).kind {
                    *slot = Some(size);
                }
                TypeId::U32
            }
            NodeKind::AlignOf { of, .. } => {
                let ty = self.type_of(of)?;
                let (_, align) = self.size_and_align(ty, span)?;
                if let NodeKind::AlignOf { alignment, .. } = &mut self.program.ast.node_mut(id).kind {
                    *alignment = Some(align);
                }
                TypeId::U32
            }
            NodeKind::StructLiteral { of, values } => self.check_struct_literal(of, &values, span)?,
            NodeKind::Symbol(name) => {
                return Err(CompileError::unresolved(self.text(name), span).into());
            }
            NodeKind::UsePackage(_)
            | NodeKind::IncludeFile(_)
            | NodeKind::Block(_)
            | NodeKind::Return(_)
            | NodeKind::If { .. }
            | NodeKind::For { .. }
            | NodeKind::While { .. }
            | NodeKind::Break
            | NodeKind::Continue
            | NodeKind::Defer(_) => {
                return Err(CompileError::semantic("expected an expression", span).into());
            }
        };

        self.program.ast.node_mut(id).ty = Some(ty);
        Ok(ty)
    }

    /// Untyped integer literals take a numeric expected type; untyped float
    /// literals take a float expected type. Otherwise i32 (i64 when the
    /// value does not fit) and f64.
    fn check_numlit(&mut self, id: NodeId, lit: NumLit, expected: Option<TypeId>) -> StepResult<TypeId> {
        if let Some(texpr) = self.program.ast.node(id).type_node {
            return self.type_of(texpr);
        }
        let types = &self.program.types;
        Ok(match lit {
            NumLit::Int(value) => match expected {
                Some(ty) if types.is_numeric(ty) => ty,
                _ if i32::try_from(value).is_ok() => TypeId::I32,
                _ => TypeId::I64,
            },
            NumLit::Float(_) => match expected {
                Some(ty) if types.is_float(ty) => ty,
                _ => TypeId::F64,
            },
        })
    }

    fn check_address_of(&mut self, inner: NodeId, span: Span) -> StepResult<TypeId> {
        if !self.program.ast.node(inner).kind.kind().is_lval() {
            return Err(CompileError::semantic("cannot take the address of this expression", span).into());
        }
        let ty = self.check_expr(inner, None)?;
        if !self.is_foreign(Decl::Node(inner)) {
            if let NodeKind::Local { attrs, .. } = &mut self.program.ast.node_mut(inner).kind {
                attrs.address_taken = true;
            }
        }
        Ok(self.program.types.pointer_to(ty))
    }

    fn check_array_access(&mut self, id: NodeId, addr: NodeId, index: NodeId) -> StepResult<TypeId> {
        let span = self.program.ast.node(id).span;
        let base = self.check_expr(addr, None)?;
        let index_ty = self.check_expr(index, Some(TypeId::U32))?;
        if !self.program.types.is_integer(index_ty) {
            return Err(CompileError::type_mismatch(
                format!("array index must be an integer, found '{}'", self.type_name(index_ty)),
                self.program.ast.node(index).span,
            )
            .into());
        }

        let elem = match self.program.types.get(base) {
            Type::Pointer(elem) => *elem,
            Type::Array { elem, .. } => *elem,
            _ => {
                return Err(CompileError::type_mismatch(format!("cannot index '{}'", self.type_name(base)), span).into());
            }
        };
        let (size, _) = self.size_and_align(elem, span)?;
        if let NodeKind::ArrayAccess { elem_size, .. } = &mut self.program.ast.node_mut(id).kind {
            *elem_size = Some(size);
        }
        Ok(elem)
    }

    fn check_unary(&mut self, id: NodeId, op: UnaryOp, expr: NodeId, expected: Option<TypeId>) -> StepResult<TypeId> {
        let span = self.program.ast.node(id).span;
        match op {
            UnaryOp::Negate => {
                let ty = self.check_expr(expr, expected)?;
                if !self.program.types.is_numeric(ty) {
                    return Err(CompileError::type_mismatch(format!("cannot negate '{}'", self.type_name(ty)), span).into());
                }
                Ok(ty)
            }
            UnaryOp::Not => {
                let ty = self.check_expr(expr, expected)?;
                if !self.program.types.is_bool(ty) && !self.program.types.is_integer(ty) {
                    return Err(CompileError::type_mismatch(format!("cannot apply '!' to '{}'", self.type_name(ty)), span).into());
                }
                Ok(ty)
            }
            UnaryOp::Cast => {
                let texpr = self
                    .program
                    .ast
                    .node(id)
                    .type_node
                    .ok_or_else(|| CompileError::semantic("cast without a target type", span))?;
                let target = self.type_of(texpr)?;
                let source = self.check_expr(expr, None)?;
                if !self.can_cast(source, target) {
                    return Err(CompileError::type_mismatch(
                        format!("cannot cast '{}' to '{}'", self.type_name(source), self.type_name(target)),
                        span,
                    )
                    .into());
                }
                Ok(target)
            }
        }
    }

    /// Scalars convert freely between each other; aggregates never do
    fn can_cast(&self, from: TypeId, to: TypeId) -> bool {
        let types = &self.program.types;
        let scalar = |ty| types.is_numeric(ty) || types.is_enum(ty) || types.is_pointer(ty) || types.is_bool(ty);
        types.compatible(to, from) || (scalar(from) && scalar(to))
    }

    fn check_binary(
        &mut self,
        op: BinaryOp,
        left: NodeId,
        right: NodeId,
        expected: Option<TypeId>,
        span: Span,
    ) -> StepResult<TypeId> {
        if op == BinaryOp::Pipe {
            return Err(CompileError::semantic("right side of '|>' must be a procedure call", span).into());
        }
        let hint = if op.is_arithmetic() || op.is_bitwise() { expected } else { None };

        // A literal on the left takes its type from the right side
        let (left_ty, right_ty) = if self.is_own_literal(left) && !self.is_own_literal(right) {
            let right_ty = self.check_expr(right, hint)?;
            (self.check_expr(left, Some(right_ty))?, right_ty)
        } else {
            let left_ty = self.check_expr(left, hint)?;
            (left_ty, self.check_expr(right, Some(left_ty))?)
        };
        self.binary_result(op, left_ty, right_ty, span)
    }

    fn binary_result(&self, op: BinaryOp, left: TypeId, right: TypeId, span: Span) -> StepResult<TypeId> {
        let types = &self.program.types;
        let mismatch = || -> StepResult<TypeId> {
            Err(CompileError::type_mismatch(
                format!(
                    "operator '{}' cannot be applied to '{}' and '{}'",
                    op,
                    self.type_name(left),
                    self.type_name(right)
                ),
                span,
            )
            .into())
        };

        if op.is_compare() {
            let comparable = types.compatible(left, right)
                && (types.is_numeric(left) || types.is_enum(left) || types.is_pointer(left) || types.is_bool(left));
            return if comparable { Ok(TypeId::BOOL) } else { mismatch() };
        }
        if op.is_bool() {
            return if types.is_bool(left) && types.is_bool(right) {
                Ok(TypeId::BOOL)
            } else {
                mismatch()
            };
        }
        if op.is_bitwise() {
            let integral = |ty| types.is_integer(ty) || types.is_enum(ty);
            return if left == right && integral(left) { Ok(left) } else { mismatch() };
        }
        if op.is_arithmetic() {
            if matches!(op, BinaryOp::Add | BinaryOp::Minus) && types.is_pointer(left) && types.is_integer(right) {
                return Ok(left);
            }
            return if left == right && types.is_numeric(left) { Ok(left) } else { mismatch() };
        }
        mismatch()
    }

    fn check_assignment(&mut self, op: BinaryOp, left: NodeId, right: NodeId, span: Span) -> StepResult<TypeId> {
        if !self.program.ast.node(left).kind.kind().is_lval() {
            return Err(CompileError::semantic("cannot assign to this expression", span).into());
        }

        // `x := value` gives an untyped local the type of its first value
        let untyped_local = !self.is_foreign(Decl::Node(left))
            && matches!(self.program.ast.node(left).kind, NodeKind::Local { .. })
            && self.program.ast.node(left).type_node.is_none();
        if op == BinaryOp::Assign && untyped_local {
            let ty = self.check_expr(right, None)?;
            if ty == TypeId::VOID {
                return Err(CompileError::type_mismatch("cannot assign a 'void' value", span).into());
            }
            self.program.ast.node_mut(left).ty = Some(ty);
            return Ok(TypeId::VOID);
        }

        let left_ty = self.check_expr(left, None)?;
        let right_ty = self.check_expr(right, Some(left_ty))?;
        match op.compound_base() {
            Some(base) => {
                let result = self.binary_result(base, left_ty, right_ty, span)?;
                self.expect_compatible(left_ty, result, span)?;
            }
            None => self.expect_compatible(left_ty, right_ty, self.program.ast.node(right).span)?,
        }
        Ok(TypeId::VOID)
    }

    // ==================== Calls ====================

    fn check_call(&mut self, id: NodeId, callee: NodeId, args: Vec<NodeId>) -> StepResult<TypeId> {
        let span = self.program.ast.node(id).span;

        let callee = match self.program.ast.node(callee).kind.clone() {
            NodeKind::OverloadedFunction { name, options } => {
                self.require_finalized(Decl::Node(callee), span)?;
                let name = self.text(name);
                let selected = self.select_overload(&name, &options, &args, span)?;
                if let NodeKind::Call { callee: slot, .. } = &mut self.program.ast.node_mut(id).kind {
                    *slot = selected;
                }
                selected
            }
            _ => callee,
        };

        let callee_ty = self.check_expr(callee, None)?;
        let Type::Function { params, ret } = self.program.types.get(callee_ty).clone() else {
            return Err(CompileError::type_mismatch(
                format!("cannot call a value of type '{}'", self.type_name(callee_ty)),
                span,
            )
            .into());
        };
        if params.len() != args.len() {
            return Err(CompileError::semantic(
                format!("expected {} arguments, found {}", params.len(), args.len()),
                span,
            )
            .into());
        }
        for (arg, param) in args.iter().zip(&params) {
            let actual = self.check_expr(*arg, Some(*param))?;
            self.expect_compatible(*param, actual, self.program.ast.node(*arg).span)?;
        }

        let intrinsic = match &self.program.ast.node(callee).kind {
            NodeKind::Function(decl) => decl.attrs.intrinsic,
            _ => None,
        };
        if let Some(intrinsic) = intrinsic {
            self.program.ast.node_mut(id).kind = NodeKind::IntrinsicCall { intrinsic, args };
        }
        Ok(ret)
    }

    /// First option, in declaration order, whose parameters accept the arguments
    fn select_overload(&mut self, name: &str, options: &[NodeId], args: &[NodeId], span: Span) -> StepResult<NodeId> {
        let mut arg_types = Vec::with_capacity(args.len());
        for arg in args {
            arg_types.push(self.check_expr(*arg, None)?);
        }

        for option in options {
            let Some(ty) = self.program.ast.node(*option).ty else {
                continue;
            };
            let Type::Function { params, .. } = self.program.types.get(ty) else {
                continue;
            };
            let accepted = params.len() == args.len()
                && args
                    .iter()
                    .zip(&arg_types)
                    .zip(params)
                    .all(|((arg, actual), param)| self.arg_matches(*arg, *actual, *param));
            if accepted {
                return Ok(*option);
            }
        }

        let found: Vec<String> = arg_types.iter().map(|ty| self.type_name(*ty)).collect();
        Err(CompileError::type_mismatch(
            format!("no overload of '{}' accepts ({})", name, found.join(", ")),
            span,
        )
        .into())
    }

    fn arg_matches(&self, arg: NodeId, actual: TypeId, param: TypeId) -> bool {
        let types = &self.program.types;
        if types.compatible(param, actual) {
            return true;
        }
        if !self.is_own_literal(arg) || self.program.ast.node(arg).type_node.is_some() {
            return false;
        }
        match self.program.ast.node(arg).kind {
            NodeKind::NumLit(NumLit::Int(_)) => types.is_numeric(param),
            NodeKind::NumLit(NumLit::Float(_)) => types.is_float(param),
            _ => false,
        }
    }

    fn check_struct_literal(&mut self, of: TypeExprId, values: &[NodeId], span: Span) -> StepResult<TypeId> {
        let ty = self.type_of(of)?;
        let decl = self.program.types.struct_decl(ty).ok_or_else(|| {
            CompileError::type_mismatch(format!("'{}' is not a struct type", self.type_name(ty)), span)
        })?;
        self.ensure_layout(decl, span)?;
        let members: Vec<TypeId> = self
            .program
            .types
            .struct_layout(decl)
            .map(|layout| layout.members.iter().map(|m| m.ty).collect())
            .unwrap_or_default();

        if members.len() != values.len() {
            return Err(CompileError::semantic(
                format!(
                    "'{}' has {} members, found {} values",
                    self.type_name(ty),
                    members.len(),
                    values.len()
                ),
                span,
            )
            .into());
        }
        for (value, member) in values.iter().zip(members) {
            let actual = self.check_expr(*value, Some(member))?;
            self.expect_compatible(member, actual, self.program.ast.node(*value).span)?;
        }
        Ok(ty)
    }
}

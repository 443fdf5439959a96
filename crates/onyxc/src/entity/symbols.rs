//! Symbol resolution
//!
//! Walks an entity's tree and replaces every name with the handle of the
//! node or type expression that declares it. Slots are written back as soon
//! as they resolve; a retry after a stall re-walks the tree and finds the
//! finished parts already pointing at declarations.
//!
//! Nodes owned by another entity are never entered.

use super::resolver::Resolver;
use super::{EntityKind, EntityState, Stall, StepResult};
use crate::ast::{BinaryOp, Decl, Name, NodeId, NodeKind, TypeExprId, TypeExprKind};
use crate::common::{CompileError, Span};
use crate::scope::{PackageId, ScopeId};

impl Resolver<'_> {
    // ==================== Lookup ====================

    /// Find `name` starting at `scope`.
    ///
    /// A miss is only final once every `use package` of this package has
    /// been processed; until then it could still be imported.
    pub(super) fn lookup(&self, scope: ScopeId, name: Name, span: Span) -> StepResult<Decl> {
        match self.program.scopes.lookup(scope, name) {
            Some(decl) => self.follow_alias(decl, span),
            None if self.imports_pending() => Err(Stall::blocked(format!("symbol '{}'", self.text(name)), span)),
            None => Err(CompileError::unresolved(self.text(name), span).into()),
        }
    }

    /// `pkg.name`: only the public tier of another package is visible
    fn lookup_in_package(&self, package: PackageId, name: Name, span: Span) -> StepResult<Decl> {
        let package = self.program.package(package);
        match self.program.scopes.lookup_local(package.public_scope, name) {
            Some(decl) => self.follow_alias(decl, span),
            None => Err(CompileError::unresolved(
                format!("{}.{}", self.text(package.name), self.text(name)),
                span,
            )
            .into()),
        }
    }

    /// `Enum.Value`
    fn lookup_enum_value(&self, texpr: TypeExprId, field: Name, span: Span) -> StepResult<Decl> {
        let mut current = texpr;
        loop {
            match &self.program.ast.type_expr(current).kind {
                TypeExprKind::Enum(decl) => {
                    return match self.program.scopes.lookup_local(decl.scope, field) {
                        Some(value) => Ok(value),
                        None => Err(CompileError::unresolved(
                            format!("{}.{}", self.decl_name(Decl::Type(texpr)), self.text(field)),
                            span,
                        )
                        .into()),
                    };
                }
                TypeExprKind::Alias(inner) => {
                    let inner = *inner;
                    // The alias target is only trustworthy once its entity is done
                    self.require_finalized(Decl::Type(current), span)?;
                    current = inner;
                }
                _ => {
                    return Err(CompileError::semantic(
                        format!("type '{}' has no members", self.decl_name(Decl::Type(current))),
                        span,
                    )
                    .into());
                }
            }
        }
    }

    /// A constant binding whose value is a name may be an alias. Scope
    /// entries copied by `use package` can predate the alias being resolved,
    /// so the target is looked up on every use.
    fn follow_alias(&self, decl: Decl, span: Span) -> StepResult<Decl> {
        let Decl::Node(node) = decl else {
            return Ok(decl);
        };
        if !matches!(
            self.program.ast.node(node).kind,
            NodeKind::Symbol(_) | NodeKind::FieldAccess { .. }
        ) {
            return Ok(decl);
        }
        let Some(owner) = self.program.owner_of(decl) else {
            return Ok(decl);
        };
        if owner == self.entity {
            return Ok(decl);
        }
        match self.program.entity(owner).state {
            EntityState::Unresolved => Err(Stall::blocked(self.program.entity_label(owner), span)),
            EntityState::Error => Err(CompileError::ErroneousDependency {
                name: self.program.entity_label(owner),
                span,
            }
            .into()),
            EntityState::ResolvingTypes | EntityState::Finalized => {
                Ok(self.program.alias_target(node).unwrap_or(decl))
            }
        }
    }

    fn imports_pending(&self) -> bool {
        self.program.entities().any(|(id, entity)| {
            id != self.entity
                && entity.package == self.package
                && matches!(entity.kind, EntityKind::UsePackage(_))
                && !entity.state.is_terminal()
        })
    }

    fn redefinition(&self, name: Name, span: Span, previous: Decl) -> Stall {
        CompileError::redefinition(self.text(name), span, Some(self.program.ast.decl_span(previous))).into()
    }

    fn define(&mut self, scope: ScopeId, name: Name, decl: Decl, span: Span) -> StepResult<()> {
        self.program
            .scopes
            .define(scope, name, decl)
            .map_err(|existing| self.redefinition(name, span, existing.previous))
    }

    // ==================== use package ====================

    pub(super) fn resolve_use(&mut self, node: NodeId) -> StepResult<()> {
        let span = self.program.ast.node(node).span;
        let NodeKind::UsePackage(decl) = self.program.ast.node(node).kind.clone() else {
            return Ok(());
        };
        let target = self
            .program
            .package_by_name(decl.package)
            .ok_or_else(|| CompileError::unresolved(format!("package {}", self.text(decl.package)), span))?;

        let include = self.program.package(self.package).include_scope;
        let public = self.program.package(target).public_scope;
        let package_node = self.program.package(target).node;

        if let Some(alias) = decl.alias {
            self.define(include, alias, Decl::Node(package_node), span)?;
        }

        match &decl.only {
            Some(items) => {
                for item in items {
                    let found = self.program.scopes.lookup_local(public, item.name).ok_or_else(|| {
                        CompileError::unresolved(
                            format!("{}.{}", self.text(decl.package), self.text(item.name)),
                            item.span,
                        )
                    })?;
                    let found = match found {
                        Decl::Node(node) => self.program.alias_target(node).unwrap_or(found),
                        Decl::Type(_) => found,
                    };
                    let bound = item.alias.unwrap_or(item.name);
                    if self.program.scopes.lookup_local(include, bound) != Some(found) {
                        self.define(include, bound, found, item.span)?;
                    }
                }
            }
            None if decl.alias.is_none() => self.program.scopes.include(include, public),
            None => {}
        }

        if let NodeKind::UsePackage(decl) = &mut self.program.ast.node_mut(node).kind {
            decl.resolved = Some(target);
        }
        Ok(())
    }

    // ==================== Types ====================

    pub(super) fn resolve_type_node(&mut self, node: NodeId, scope: ScopeId) -> StepResult<()> {
        if let Some(texpr) = self.program.ast.node(node).type_node {
            let resolved = self.resolve_type(texpr, scope)?;
            self.program.ast.node_mut(node).type_node = Some(resolved);
        }
        Ok(())
    }

    /// Resolve the names inside a type expression. Returns the handle to
    /// store in the referring slot, which differs from `id` when `id` was a
    /// name.
    pub(super) fn resolve_type(&mut self, id: TypeExprId, scope: ScopeId) -> StepResult<TypeExprId> {
        if self.is_foreign(Decl::Type(id)) {
            return Ok(id);
        }
        let texpr = self.program.ast.type_expr(id).clone();
        let span = texpr.span;

        let kind = match texpr.kind {
            TypeExprKind::Basic(_) => return Ok(id),
            TypeExprKind::Symbol(name) => {
                let decl = self.lookup(scope, name, span)?;
                return self.expect_type(decl, span);
            }
            TypeExprKind::Qualified { package, name } => {
                let package = self.expect_package(self.lookup(scope, package, span)?, span)?;
                let decl = self.lookup_in_package(package, name, span)?;
                return self.expect_type(decl, span);
            }
            TypeExprKind::Pointer(elem) => TypeExprKind::Pointer(self.resolve_type(elem, scope)?),
            TypeExprKind::Function { params, ret } => {
                let mut resolved = Vec::with_capacity(params.len());
                for param in params {
                    resolved.push(self.resolve_type(param, scope)?);
                }
                TypeExprKind::Function {
                    params: resolved,
                    ret: self.resolve_type(ret, scope)?,
                }
            }
            TypeExprKind::Array { elem, count } => TypeExprKind::Array {
                elem: self.resolve_type(elem, scope)?,
                count: self.resolve_expr(count, scope)?,
            },
            TypeExprKind::Struct(mut members) => {
                for member in &mut members {
                    member.type_node = self.resolve_type(member.type_node, scope)?;
                }
                TypeExprKind::Struct(members)
            }
            TypeExprKind::Enum(mut decl) => {
                if let Some(backing) = decl.backing {
                    decl.backing = Some(self.resolve_type(backing, scope)?);
                }
                for value in &decl.values {
                    self.resolve_enum_value(*value, scope)?;
                }
                TypeExprKind::Enum(decl)
            }
            TypeExprKind::Alias(inner) => TypeExprKind::Alias(self.resolve_type(inner, scope)?),
        };

        self.program.ast.type_expr_mut(id).kind = kind;
        Ok(id)
    }

    fn resolve_enum_value(&mut self, value: NodeId, scope: ScopeId) -> StepResult<()> {
        if let NodeKind::EnumValue {
            value: Some(expr), ..
        } = self.program.ast.node(value).kind
        {
            let resolved = self.resolve_expr(expr, scope)?;
            if let NodeKind::EnumValue { value: slot, .. } = &mut self.program.ast.node_mut(value).kind {
                *slot = Some(resolved);
            }
        }
        Ok(())
    }

    fn expect_type(&self, decl: Decl, span: Span) -> StepResult<TypeExprId> {
        match decl {
            Decl::Type(texpr) => Ok(texpr),
            Decl::Node(_) => Err(CompileError::semantic(format!("'{}' is not a type", self.decl_name(decl)), span).into()),
        }
    }

    fn expect_package(&self, decl: Decl, span: Span) -> StepResult<PackageId> {
        if let Decl::Node(node) = decl {
            if let NodeKind::Package(package) = self.program.ast.node(node).kind {
                return Ok(package);
            }
        }
        Err(CompileError::semantic(format!("'{}' is not a package", self.decl_name(decl)), span).into())
    }

    // ==================== Expressions ====================

    /// If `id` names a declaration (`x`, `pkg.x`, `Enum.Value`), look it up.
    ///
    /// `None` means `id` is an ordinary expression. For a field access on a
    /// value, the object part is resolved and written back.
    pub(super) fn resolve_reference(&mut self, id: NodeId, scope: ScopeId) -> StepResult<Option<Decl>> {
        let span = self.program.ast.node(id).span;
        match self.program.ast.node(id).kind.clone() {
            NodeKind::Symbol(name) => self.lookup(scope, name, span).map(Some),
            NodeKind::FieldAccess { expr, field, .. } => {
                let Some(base) = self.resolve_reference(expr, scope)? else {
                    return Ok(None);
                };
                match base {
                    Decl::Node(target) => {
                        if let NodeKind::Package(package) = self.program.ast.node(target).kind {
                            return self.lookup_in_package(package, field, span).map(Some);
                        }
                        if let NodeKind::FieldAccess { expr: slot, .. } = &mut self.program.ast.node_mut(id).kind {
                            *slot = target;
                        }
                        Ok(None)
                    }
                    Decl::Type(texpr) => self.lookup_enum_value(texpr, field, span).map(Some),
                }
            }
            _ => Ok(None),
        }
    }

    /// Resolve the names in an expression or statement. Returns the handle
    /// to store in the referring slot.
    pub(super) fn resolve_expr(&mut self, id: NodeId, scope: ScopeId) -> StepResult<NodeId> {
        if self.is_foreign(Decl::Node(id)) {
            return Ok(id);
        }
        let span = self.program.ast.node(id).span;

        match &self.program.ast.node(id).kind {
            // Already a reference to a declaration
            NodeKind::Local { .. }
            | NodeKind::Global { .. }
            | NodeKind::Memres { .. }
            | NodeKind::Function(_)
            | NodeKind::EnumValue { .. }
            | NodeKind::Package(_)
            | NodeKind::OverloadedFunction { .. } => return Ok(id),

            NodeKind::Symbol(_) | NodeKind::FieldAccess { .. } => {
                if let Some(decl) = self.resolve_reference(id, scope)? {
                    return match decl {
                        Decl::Node(target) => Ok(target),
                        Decl::Type(_) => Err(CompileError::semantic(
                            format!("'{}' is a type, not a value", self.decl_name(decl)),
                            span,
                        )
                        .into()),
                    };
                }
            }
            NodeKind::Block(_) => {
                let inner = self.program.scopes.create(Some(scope));
                self.resolve_block(id, inner)?;
                return Ok(id);
            }
            NodeKind::For { .. } => {
                self.resolve_for(id, scope)?;
                return Ok(id);
            }
            NodeKind::BinaryOp { op: BinaryOp::Pipe, .. } => {
                self.resolve_pipe(id, scope)?;
                return Ok(id);
            }
            NodeKind::SizeOf { of, .. } | NodeKind::AlignOf { of, .. } | NodeKind::StructLiteral { of, .. } => {
                let of = *of;
                let resolved = self.resolve_type(of, scope)?;
                match &mut self.program.ast.node_mut(id).kind {
                    NodeKind::SizeOf { of, .. } | NodeKind::AlignOf { of, .. } | NodeKind::StructLiteral { of, .. } => {
                        *of = resolved;
                    }
                    _ => {}
                }
            }
            _ => {}
        }

        self.resolve_type_node(id, scope)?;
        self.resolve_children(id, scope)?;
        Ok(id)
    }

    fn resolve_children(&mut self, id: NodeId, scope: ScopeId) -> StepResult<()> {
        let children = self.program.ast.node(id).kind.children();
        for (index, child) in children.into_iter().enumerate() {
            let resolved = self.resolve_expr(child, scope)?;
            if resolved != child {
                let mut slots = self.program.ast.node_mut(id).kind.child_slots_mut();
                *slots[index] = resolved;
            }
        }
        Ok(())
    }

    /// Statements see the locals declared before them in the same block
    fn resolve_block(&mut self, id: NodeId, scope: ScopeId) -> StepResult<()> {
        let NodeKind::Block(stmts) = self.program.ast.node(id).kind.clone() else {
            return Ok(());
        };
        for stmt in stmts {
            if let NodeKind::Local { name, .. } = self.program.ast.node(stmt).kind {
                self.declare_local(stmt, name, scope)?;
                continue;
            }
            if self.resolve_expr(stmt, scope)? != stmt {
                let span = self.program.ast.node(stmt).span;
                return Err(CompileError::semantic("statement has no effect", span).into());
            }
        }
        Ok(())
    }

    fn declare_local(&mut self, local: NodeId, name: Name, scope: ScopeId) -> StepResult<()> {
        let span = self.program.ast.node(local).span;
        self.resolve_type_node(local, scope)?;
        self.define(scope, name, Decl::Node(local), span)
    }

    fn resolve_for(&mut self, id: NodeId, scope: ScopeId) -> StepResult<()> {
        let NodeKind::For {
            var,
            start,
            end,
            step,
            body,
        } = self.program.ast.node(id).kind.clone()
        else {
            return Ok(());
        };

        let start = self.resolve_expr(start, scope)?;
        let end = self.resolve_expr(end, scope)?;
        let step = match step {
            Some(step) => Some(self.resolve_expr(step, scope)?),
            None => None,
        };

        let loop_scope = self.program.scopes.create(Some(scope));
        if let NodeKind::Local { name, .. } = self.program.ast.node(var).kind {
            self.declare_local(var, name, loop_scope)?;
        }
        self.resolve_expr(body, loop_scope)?;

        if let NodeKind::For {
            start: start_slot,
            end: end_slot,
            step: step_slot,
            ..
        } = &mut self.program.ast.node_mut(id).kind
        {
            *start_slot = start;
            *end_slot = end;
            *step_slot = step;
        }
        Ok(())
    }

    /// `a |> f(b)` becomes `f(a, b)` once both sides are resolved
    fn resolve_pipe(&mut self, id: NodeId, scope: ScopeId) -> StepResult<()> {
        let NodeKind::BinaryOp { left, right, .. } = self.program.ast.node(id).kind.clone() else {
            return Ok(());
        };
        let left = self.resolve_expr(left, scope)?;
        let right = self.resolve_expr(right, scope)?;

        match self.program.ast.node(right).kind.clone() {
            NodeKind::Call { callee, mut args } => {
                args.insert(0, left);
                self.program.ast.node_mut(id).kind = NodeKind::Call { callee, args };
                Ok(())
            }
            _ => Err(CompileError::semantic(
                "right side of '|>' must be a procedure call",
                self.program.ast.node(right).span,
            )
            .into()),
        }
    }

    // ==================== Declarations ====================

    pub(super) fn resolve_signature(&mut self, node: NodeId, scope: ScopeId) -> StepResult<()> {
        let NodeKind::Function(decl) = self.program.ast.node(node).kind.clone() else {
            return Ok(());
        };
        for param in &decl.params {
            self.resolve_type_node(*param, scope)?;
        }
        if let Some(ret) = decl.return_type {
            let resolved = self.resolve_type(ret, scope)?;
            if let NodeKind::Function(decl) = &mut self.program.ast.node_mut(node).kind {
                decl.return_type = Some(resolved);
            }
        }
        Ok(())
    }

    pub(super) fn resolve_body(&mut self, node: NodeId, scope: ScopeId) -> StepResult<()> {
        let NodeKind::Function(decl) = self.program.ast.node(node).kind.clone() else {
            return Ok(());
        };
        let Some(body) = decl.body else {
            return Ok(());
        };

        let fn_scope = self.program.scopes.create(Some(scope));
        for param in &decl.params {
            if let NodeKind::Local { name, .. } = self.program.ast.node(*param).kind {
                let span = self.program.ast.node(*param).span;
                self.define(fn_scope, name, Decl::Node(*param), span)?;
            }
        }
        self.resolve_expr(body, fn_scope).map(|_| ())
    }

    pub(super) fn resolve_overload_options(&mut self, node: NodeId, scope: ScopeId) -> StepResult<()> {
        let NodeKind::OverloadedFunction { options, .. } = self.program.ast.node(node).kind.clone() else {
            return Ok(());
        };

        let mut resolved = Vec::with_capacity(options.len());
        for option in options {
            let span = self.program.ast.node(option).span;
            let target = match self.resolve_reference(option, scope)? {
                Some(Decl::Node(target)) => target,
                Some(Decl::Type(_)) => {
                    return Err(CompileError::semantic("overload options must be procedures", span).into());
                }
                None => option,
            };
            if !matches!(self.program.ast.node(target).kind, NodeKind::Function(_)) {
                return Err(CompileError::semantic("overload options must be procedures", span).into());
            }
            resolved.push(target);
        }

        if let NodeKind::OverloadedFunction { options, .. } = &mut self.program.ast.node_mut(node).kind {
            *options = resolved;
        }
        Ok(())
    }
}

//! Per-entity resolution steps
//!
//! A `Resolver` is built for one step of one entity. `resolve_symbols` and
//! `resolve_types` dispatch on the entity kind; the helpers they use live in
//! `symbols.rs`, `types.rs` and `checker.rs`.

use std::collections::HashSet;

use tracing::trace;

use super::checker::FnContext;
use super::{EntityId, EntityKind, EntityState, Stall, StepResult};
use crate::ast::{AstKind, Decl, Name, NodeId, NodeKind, TypeExprId, TypeExprKind};
use crate::common::{CompileError, Span};
use crate::driver::FileLoader;
use crate::program::Program;
use crate::scope::{PackageId, ScopeId};
use crate::types::{BasicKind, Intrinsic, Type, TypeId};

pub(super) struct Resolver<'a> {
    pub(super) program: &'a mut Program,
    loader: &'a dyn FileLoader,
    pub(super) entity: EntityId,
    pub(super) package: PackageId,
    /// Lookups from this entity start here
    pub(super) scope: ScopeId,
    /// Struct layouts being derived by this step
    pub(super) in_progress: HashSet<TypeExprId>,
}

impl<'a> Resolver<'a> {
    pub(super) fn new(program: &'a mut Program, loader: &'a dyn FileLoader, entity: EntityId) -> Self {
        let package = program.entity(entity).package;
        let scope = program.package(package).private_scope;
        Self {
            program,
            loader,
            entity,
            package,
            scope,
            in_progress: HashSet::new(),
        }
    }

    // ==================== Ownership ====================

    /// Declared by a different entity than the one being resolved
    pub(super) fn is_foreign(&self, decl: Decl) -> bool {
        self.program.owner_of(decl).is_some_and(|owner| owner != self.entity)
    }

    /// Succeeds once the entity owning `decl` is finalized
    pub(super) fn require_finalized(&self, decl: Decl, span: Span) -> StepResult<()> {
        let Some(owner) = self.program.owner_of(decl) else {
            return Ok(());
        };
        if owner == self.entity {
            return Ok(());
        }
        match self.program.entity(owner).state {
            EntityState::Finalized => Ok(()),
            EntityState::Error => Err(CompileError::ErroneousDependency {
                name: self.decl_name(decl),
                span,
            }
            .into()),
            EntityState::Unresolved | EntityState::ResolvingTypes => {
                Err(Stall::blocked(self.program.entity_label(owner), span))
            }
        }
    }

    pub(super) fn decl_name(&self, decl: Decl) -> String {
        let name = match decl {
            Decl::Node(node) => self.program.ast.node(node).kind.decl_name(),
            Decl::Type(texpr) => self.program.ast.type_expr(texpr).name,
        };
        name.map_or_else(|| "<anonymous>".to_string(), |n| self.text(n))
    }

    pub(super) fn text(&self, name: Name) -> String {
        self.program.name(name).to_string()
    }

    pub(super) fn type_name(&self, ty: TypeId) -> String {
        self.program.type_name(ty)
    }

    // ==================== Symbol step ====================

    pub(super) fn resolve_symbols(&mut self, kind: EntityKind) -> StepResult<()> {
        let scope = self.scope;
        match kind {
            EntityKind::UsePackage(node) => self.resolve_use(node),
            EntityKind::StringLiteral(_) | EntityKind::FileContents(_) => Ok(()),
            EntityKind::Enum(texpr) | EntityKind::TypeAlias(texpr) => {
                self.resolve_type(texpr, scope).map(|_| ())
            }
            EntityKind::MemoryReservation(node) | EntityKind::GlobalHeader(node) => {
                self.resolve_type_node(node, scope)?;
                if let NodeKind::Memres {
                    initial: Some(initial),
                    ..
                } = self.program.ast.node(node).kind
                {
                    let resolved = self.resolve_expr(initial, scope)?;
                    if let NodeKind::Memres { initial, .. } = &mut self.program.ast.node_mut(node).kind {
                        *initial = Some(resolved);
                    }
                }
                Ok(())
            }
            EntityKind::Global(node) => {
                if let NodeKind::Global {
                    initial: Some(initial),
                    ..
                } = self.program.ast.node(node).kind
                {
                    let resolved = self.resolve_expr(initial, scope)?;
                    if let NodeKind::Global { initial, .. } = &mut self.program.ast.node_mut(node).kind {
                        *initial = Some(resolved);
                    }
                }
                Ok(())
            }
            EntityKind::FunctionHeader(node) => self.resolve_signature(node, scope),
            EntityKind::Function(node) => self.resolve_body(node, scope),
            EntityKind::Expression { root, binding } => {
                if let Some(binding) = binding {
                    if let Some(target) = self.resolve_reference(root, scope)? {
                        // `A :: B` makes A another name for B's declaration
                        self.program.scopes.rebind(binding.scope, binding.name, target);
                        self.program.set_alias_target(root, target);
                        return Ok(());
                    }
                }
                self.resolve_expr(root, scope).map(|_| ())
            }
            EntityKind::OverloadedFunction(node) => self.resolve_overload_options(node, scope),
        }
    }

    // ==================== Type step ====================

    pub(super) fn resolve_types(&mut self, kind: EntityKind) -> StepResult<()> {
        match kind {
            EntityKind::UsePackage(_) => Ok(()),
            EntityKind::StringLiteral(node) => {
                let NodeKind::StrLit { data, .. } = &self.program.ast.node(node).kind else {
                    return Ok(());
                };
                let data = data.clone();
                let span = self.program.ast.node(node).span;
                let addr = self.program.data.reserve_string(&data).ok_or_else(|| data_full(span))?;
                if let NodeKind::StrLit { addr: slot, .. } = &mut self.program.ast.node_mut(node).kind {
                    *slot = Some(addr);
                }
                Ok(())
            }
            EntityKind::FileContents(node) => self.place_file_contents(node),
            EntityKind::Enum(texpr) => self.derive_enum(texpr),
            EntityKind::TypeAlias(texpr) => {
                let span = self.program.ast.type_expr(texpr).span;
                self.type_of(texpr)?;
                if matches!(self.program.ast.type_expr(texpr).kind, TypeExprKind::Struct(_)) {
                    self.ensure_layout(texpr, span)?;
                }
                Ok(())
            }
            EntityKind::MemoryReservation(node) => self.check_memres(node),
            EntityKind::FunctionHeader(node) => self.check_signature(node),
            EntityKind::Function(node) => self.check_body(node),
            EntityKind::GlobalHeader(node) => self.check_global_header(node),
            EntityKind::Global(node) => self.check_global_initializer(node),
            EntityKind::Expression { root, .. } => match self.program.alias_target(root) {
                Some(target) => self.type_alias_root(root, target),
                None => self.check_expr(root, None).map(|_| ()),
            },
            EntityKind::OverloadedFunction(node) => self.check_overloads(node),
        }
    }

    /// An alias root takes the type of the declaration it names
    fn type_alias_root(&mut self, root: NodeId, target: Decl) -> StepResult<()> {
        let Decl::Node(target) = target else {
            return Ok(());
        };
        let span = self.program.ast.node(root).span;
        self.require_finalized(Decl::Node(target), span)?;
        let ty = self.program.ast.node(target).ty;
        self.program.ast.node_mut(root).ty = ty;
        Ok(())
    }

    fn place_file_contents(&mut self, node: NodeId) -> StepResult<()> {
        let span = self.program.ast.node(node).span;
        let NodeKind::FileContents { path, .. } = &self.program.ast.node(node).kind else {
            return Ok(());
        };
        let path = path.clone();
        let file = self
            .loader
            .load(&path)
            .map_err(|err| CompileError::semantic(format!("unable to read '{path}': {err}"), span))?;

        let size = file.bytes.len() as u32;
        let addr = self.program.data.reserve_bytes(file.bytes).ok_or_else(|| data_full(span))?;
        trace!(path = %path, addr, size, "placed file contents");
        if let NodeKind::FileContents {
            addr: addr_slot,
            size: size_slot,
            ..
        } = &mut self.program.ast.node_mut(node).kind
        {
            *addr_slot = Some(addr);
            *size_slot = Some(size);
        }
        Ok(())
    }

    fn check_memres(&mut self, node: NodeId) -> StepResult<()> {
        let span = self.program.ast.node(node).span;
        let NodeKind::Memres { initial, .. } = self.program.ast.node(node).kind.clone() else {
            return Ok(());
        };
        let declared = match self.program.ast.node(node).type_node {
            Some(texpr) => Some(self.type_of(texpr)?),
            None => None,
        };

        let ty = match (declared, initial) {
            (Some(ty), Some(initial)) => {
                let actual = self.check_expr(initial, Some(ty))?;
                self.expect_compatible(ty, actual, span)?;
                ty
            }
            (Some(ty), None) => ty,
            (None, Some(initial)) => self.check_expr(initial, None)?,
            (None, None) => {
                return Err(CompileError::semantic("memory reservation needs a type or a value", span).into());
            }
        };
        if let Some(initial) = initial {
            let kind = self.program.ast.node(initial).kind.kind();
            if !matches!(kind, AstKind::NumLit | AstKind::StrLit) {
                return Err(CompileError::semantic(
                    "memory reservation initializer must be a literal",
                    self.program.ast.node(initial).span,
                )
                .into());
            }
        }

        let (size, align) = self.size_and_align(ty, span)?;
        let addr = self.program.data.reserve(size, align).ok_or_else(|| data_full(span))?;
        let entry = self.program.ast.node_mut(node);
        entry.ty = Some(ty);
        if let NodeKind::Memres { addr: slot, .. } = &mut entry.kind {
            *slot = Some(addr);
        }
        Ok(())
    }

    fn check_signature(&mut self, node: NodeId) -> StepResult<()> {
        let span = self.program.ast.node(node).span;
        let NodeKind::Function(decl) = self.program.ast.node(node).kind.clone() else {
            return Ok(());
        };

        let mut params = Vec::with_capacity(decl.params.len());
        for param in &decl.params {
            let param_span = self.program.ast.node(*param).span;
            let texpr = self.program.ast.node(*param).type_node.ok_or_else(|| {
                CompileError::semantic("procedure parameters need a type", param_span)
            })?;
            params.push(self.type_of(texpr)?);
        }
        let ret = match decl.return_type {
            Some(texpr) => self.type_of(texpr)?,
            None => TypeId::VOID,
        };

        let intrinsic = match &decl.attrs.intrinsic_name {
            Some(name) => Some(self.validate_intrinsic(name, &params, ret, span)?),
            None => None,
        };

        // Nothing below can stall, so the writes happen all together
        let fn_ty = self.program.types.function(params.clone(), ret);
        for (param, ty) in decl.params.iter().zip(params) {
            self.program.ast.node_mut(*param).ty = Some(ty);
        }
        let entry = self.program.ast.node_mut(node);
        entry.ty = Some(fn_ty);
        if let NodeKind::Function(f) = &mut entry.kind {
            f.attrs.intrinsic = intrinsic;
        }
        if decl.attrs.foreign.is_some() {
            self.program.count_foreign_function();
        }
        Ok(())
    }

    fn validate_intrinsic(&self, name: &str, params: &[TypeId], ret: TypeId, span: Span) -> StepResult<Intrinsic> {
        let intrinsic = Intrinsic::from_name(name)
            .ok_or_else(|| CompileError::invalid_intrinsic(name, "not a known intrinsic", span))?;

        let (expected_params, expected_ret) = intrinsic.signature();
        let matches = params.len() == expected_params.len()
            && params
                .iter()
                .zip(expected_params)
                .all(|(ty, kind)| *ty == TypeId::of_basic(*kind))
            && ret == TypeId::of_basic(expected_ret);

        if !matches {
            let wanted: Vec<&str> = expected_params.iter().map(|k| BasicKind::name(*k)).collect();
            return Err(CompileError::invalid_intrinsic(
                name,
                format!("expected signature ({}) -> {}", wanted.join(", "), expected_ret),
                span,
            )
            .into());
        }
        Ok(intrinsic)
    }

    fn check_body(&mut self, node: NodeId) -> StepResult<()> {
        let span = self.program.ast.node(node).span;
        self.require_header(node, span)?;

        let NodeKind::Function(decl) = self.program.ast.node(node).kind.clone() else {
            return Ok(());
        };
        let Some(body) = decl.body else {
            return Ok(());
        };
        let ret = match decl.return_type {
            Some(texpr) => self.type_of(texpr)?,
            None => TypeId::VOID,
        };
        let mut ctx = FnContext::new(ret);
        self.check_stmt(body, &mut ctx)
    }

    fn check_global_header(&mut self, node: NodeId) -> StepResult<()> {
        let span = self.program.ast.node(node).span;
        let NodeKind::Global { attrs, .. } = self.program.ast.node(node).kind.clone() else {
            return Ok(());
        };
        let texpr = self
            .program
            .ast
            .node(node)
            .type_node
            .ok_or_else(|| CompileError::semantic("globals need a declared type", span))?;

        let ty = self.type_of(texpr)?;
        self.size_and_align(ty, span)?;
        self.program.ast.node_mut(node).ty = Some(ty);
        if attrs.foreign.is_some() {
            self.program.count_foreign_global();
        }
        Ok(())
    }

    fn check_global_initializer(&mut self, node: NodeId) -> StepResult<()> {
        let span = self.program.ast.node(node).span;
        self.require_header(node, span)?;

        let NodeKind::Global {
            initial: Some(initial),
            ..
        } = self.program.ast.node(node).kind
        else {
            return Ok(());
        };
        let Some(ty) = self.program.ast.node(node).ty else {
            return Ok(());
        };
        let actual = self.check_expr(initial, Some(ty))?;
        self.expect_compatible(ty, actual, self.program.ast.node(initial).span)
    }

    /// Bodies and initializers wait for the header entity of their node
    fn require_header(&self, node: NodeId, span: Span) -> StepResult<()> {
        self.require_finalized(Decl::Node(node), span)
    }

    fn check_overloads(&mut self, node: NodeId) -> StepResult<()> {
        let NodeKind::OverloadedFunction { name, options } = self.program.ast.node(node).kind.clone() else {
            return Ok(());
        };

        let mut signatures = Vec::with_capacity(options.len());
        for option in &options {
            let span = self.program.ast.node(*option).span;
            self.require_finalized(Decl::Node(*option), span)?;
            let params = match self.program.ast.node(*option).ty.map(|ty| self.program.types.get(ty)) {
                Some(Type::Function { params, .. }) => params.clone(),
                _ => Vec::new(),
            };
            signatures.push((*option, params));
        }

        let mut duplicate = None;
        'search: for (i, (first, params)) in signatures.iter().enumerate() {
            for (second, other) in &signatures[i + 1..] {
                if params == other {
                    duplicate = Some((*first, *second));
                    break 'search;
                }
            }
        }

        match duplicate {
            Some((first, second)) => Err(CompileError::DuplicateOverload {
                name: self.text(name),
                span: self.program.ast.node(second).span,
                other: self.program.ast.node(first).span,
            }
            .into()),
            None => Ok(()),
        }
    }
}

fn data_full(span: Span) -> CompileError {
    CompileError::semantic("static data does not fit in 32-bit linear memory", span)
}

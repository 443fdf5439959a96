//! Program registry
//!
//! The root aggregate: arenas, scopes, packages and the ordered entity list.
//! The parser fills it, the entity pipeline resolves it in place, and code
//! generation reads it once resolution has quiesced.

use std::collections::HashMap;

use string_interner::DefaultStringInterner;
use tracing::debug;

use crate::ast::{Ast, BuiltinGlobal, Decl, GlobalAttrs, Name, NodeId, NodeKind, NumLit, TypeExprId, TypeExprKind};
use crate::common::{CompileError, Diagnostics, Span};
use crate::driver::FileLoader;
use crate::entity::{Binding, DataLayout, Entity, EntityId, EntityKind, EntityState, Pipeline};
use crate::scope::{Package, PackageId, ScopeId, Scopes};
use crate::types::{BasicKind, Type, TypeId, TypeTable};

/// Package holding the runtime-provided symbols
pub const BUILTIN_PACKAGE: &str = "builtin";

/// Nodes of the `builtin` package that code generation fills in
#[derive(Debug, Clone, Copy)]
pub struct Builtins {
    pub package: PackageId,
    /// `__stack_top`, a rawptr global initialized by the emitter
    pub stack_top: NodeId,
    /// `__heap_start`, a rawptr constant patched after resolution
    pub heap_start: NodeId,
}

pub struct Program {
    pub ast: Ast,
    pub types: TypeTable,
    pub scopes: Scopes,
    pub names: DefaultStringInterner,
    pub diagnostics: Diagnostics,
    pub data: DataLayout,
    global_scope: ScopeId,
    basic_types: Vec<TypeExprId>,
    packages: Vec<Package>,
    package_names: HashMap<Name, PackageId>,
    entities: Vec<Entity>,
    /// Declaration handle -> entity responsible for resolving it
    owners: HashMap<Decl, EntityId>,
    /// Root of an `A :: B` binding -> the declaration it names
    aliases: HashMap<NodeId, Decl>,
    foreign_functions: u32,
    foreign_globals: u32,
    builtins: Option<Builtins>,
    resolving: bool,
}

impl Program {
    /// Create a registry with the primitive types and the `builtin` package.
    /// Static data is laid out starting at `data_base`.
    pub fn new(data_base: u32) -> Self {
        let mut scopes = Scopes::new();
        let global_scope = scopes.create(None);
        let mut program = Self {
            ast: Ast::new(),
            types: TypeTable::new(),
            scopes,
            names: DefaultStringInterner::default(),
            diagnostics: Diagnostics::new(),
            data: DataLayout::new(data_base),
            global_scope,
            basic_types: Vec::new(),
            packages: Vec::new(),
            package_names: HashMap::new(),
            entities: Vec::new(),
            owners: HashMap::new(),
            aliases: HashMap::new(),
            foreign_functions: 0,
            foreign_globals: 0,
            builtins: None,
            resolving: false,
        };

        for kind in BasicKind::ALL {
            let id = program.ast.add_type(TypeExprKind::Basic(kind), Span::default());
            let name = program.names.get_or_intern(kind.name());
            program.ast.type_expr_mut(id).name = Some(name);
            // The global scope is empty at this point
            let _ = program.scopes.define(global_scope, name, Decl::Type(id));
            program.basic_types.push(id);
        }

        program.builtins = Some(program.install_builtins());
        program
    }

    fn install_builtins(&mut self) -> Builtins {
        let package = self.register_package(BUILTIN_PACKAGE);
        let public = self.packages[package.index()].public_scope;
        let rawptr = self.basic_type(BasicKind::Rawptr);

        let stack_name = self.intern("__stack_top");
        let stack_top = self.ast.add_typed(
            NodeKind::Global {
                name: stack_name,
                initial: None,
                attrs: GlobalAttrs {
                    builtin: Some(BuiltinGlobal::StackTop),
                    ..GlobalAttrs::default()
                },
            },
            Span::default(),
            Some(rawptr),
        );
        let _ = self.scopes.define(public, stack_name, Decl::Node(stack_top));
        self.add_entity(Entity::new(EntityKind::GlobalHeader(stack_top), package));
        self.add_entity(Entity::new(EntityKind::Global(stack_top), package));

        let heap_name = self.intern("__heap_start");
        let heap_start = self.ast.add_typed(NodeKind::NumLit(NumLit::Int(0)), Span::default(), Some(rawptr));
        let _ = self.scopes.define(public, heap_name, Decl::Node(heap_start));
        self.add_entity(Entity::new(
            EntityKind::Expression {
                root: heap_start,
                binding: Some(Binding {
                    scope: public,
                    name: heap_name,
                }),
            },
            package,
        ));

        Builtins {
            package,
            stack_top,
            heap_start,
        }
    }

    // ==================== Names ====================

    pub fn intern(&mut self, name: &str) -> Name {
        self.names.get_or_intern(name)
    }

    /// Text of an interned name
    pub fn name(&self, name: Name) -> &str {
        self.names.resolve(name).unwrap_or("<unknown>")
    }

    pub fn global_scope(&self) -> ScopeId {
        self.global_scope
    }

    /// Type expression bound to a primitive's name in the global scope
    pub fn basic_type(&self, kind: BasicKind) -> TypeExprId {
        self.basic_types[kind as usize]
    }

    pub fn builtins(&self) -> Option<Builtins> {
        self.builtins
    }

    /// Source-like spelling of a resolved type, used in diagnostics
    pub fn type_name(&self, ty: TypeId) -> String {
        match self.types.get(ty) {
            Type::Basic(kind) => kind.name().to_string(),
            Type::Pointer(elem) => format!("^{}", self.type_name(*elem)),
            Type::Function { params, ret } => {
                let params: Vec<String> = params.iter().map(|p| self.type_name(*p)).collect();
                format!("({}) -> {}", params.join(", "), self.type_name(*ret))
            }
            Type::Array { elem, count } => format!("[{count}] {}", self.type_name(*elem)),
            Type::Struct(decl) | Type::Enum(decl) => self
                .ast
                .type_expr(*decl)
                .name
                .map_or_else(|| "<anonymous>".to_string(), |name| self.name(name).to_string()),
        }
    }

    // ==================== Packages ====================

    /// Get the package called `name`, creating it on first use.
    /// Names are case sensitive.
    pub fn register_package(&mut self, name: &str) -> PackageId {
        let name = self.intern(name);
        if let Some(id) = self.package_names.get(&name) {
            return *id;
        }

        let id = PackageId::from_raw(self.packages.len() as u32);
        let include_scope = self.scopes.create(Some(self.global_scope));
        let public_scope = self.scopes.create(Some(include_scope));
        let private_scope = self.scopes.create(Some(public_scope));
        let node = self.ast.add(NodeKind::Package(id), Span::default());

        if self.scopes.define(self.global_scope, name, Decl::Node(node)).is_err() {
            debug!(package = self.name(name), "package name shadowed by a global symbol");
        }

        self.packages.push(Package {
            name,
            node,
            public_scope,
            include_scope,
            private_scope,
        });
        self.package_names.insert(name, id);
        id
    }

    pub fn package(&self, id: PackageId) -> &Package {
        &self.packages[id.index()]
    }

    pub fn package_by_name(&self, name: Name) -> Option<PackageId> {
        self.package_names.get(&name).copied()
    }

    pub fn packages(&self) -> impl Iterator<Item = (PackageId, &Package)> {
        self.packages
            .iter()
            .enumerate()
            .map(|(i, p)| (PackageId::from_raw(i as u32), p))
    }

    // ==================== Entities ====================

    /// Queue a unit of work. Only the parser adds entities; once resolution
    /// has started the set is closed.
    pub fn add_entity(&mut self, entity: Entity) -> EntityId {
        debug_assert!(!self.resolving, "entities cannot be added during resolution");
        let id = EntityId::from_raw(self.entities.len() as u32);

        match entity.kind {
            EntityKind::FunctionHeader(node)
            | EntityKind::GlobalHeader(node)
            | EntityKind::MemoryReservation(node)
            | EntityKind::OverloadedFunction(node)
            | EntityKind::Expression { root: node, .. } => {
                self.owners.insert(Decl::Node(node), id);
            }
            EntityKind::TypeAlias(texpr) => {
                self.owners.insert(Decl::Type(texpr), id);
            }
            EntityKind::Enum(texpr) => {
                self.owners.insert(Decl::Type(texpr), id);
                if let TypeExprKind::Enum(decl) = &self.ast.type_expr(texpr).kind {
                    for value in &decl.values {
                        self.owners.insert(Decl::Node(*value), id);
                    }
                }
            }
            EntityKind::UsePackage(_)
            | EntityKind::StringLiteral(_)
            | EntityKind::FileContents(_)
            | EntityKind::Function(_)
            | EntityKind::Global(_) => {}
        }

        self.entities.push(entity);
        id
    }

    /// Mark an entity failed before resolution, e.g. on a redefinition
    pub fn fail_entity(&mut self, id: EntityId, error: CompileError) {
        self.entities[id.index()].state = EntityState::Error;
        self.diagnostics.report(Some(id), error);
    }

    pub fn entity(&self, id: EntityId) -> &Entity {
        &self.entities[id.index()]
    }

    pub(crate) fn set_state(&mut self, id: EntityId, state: EntityState) {
        self.entities[id.index()].state = state;
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub fn entities(&self) -> impl Iterator<Item = (EntityId, &Entity)> {
        self.entities
            .iter()
            .enumerate()
            .map(|(i, e)| (EntityId::from_raw(i as u32), e))
    }

    /// Entities that reached `Finalized`, in declaration order
    pub fn finalized_entities(&self) -> impl Iterator<Item = (EntityId, &Entity)> {
        self.entities().filter(|(_, e)| e.state == EntityState::Finalized)
    }

    /// Entity responsible for resolving a declaration
    pub fn owner_of(&self, decl: Decl) -> Option<EntityId> {
        self.owners.get(&decl).copied()
    }

    /// What an alias binding stands for, once its entity resolved the name.
    /// Scopes that copied the binding before that still hold `node`.
    pub fn alias_target(&self, node: NodeId) -> Option<Decl> {
        self.aliases.get(&node).copied()
    }

    pub(crate) fn set_alias_target(&mut self, node: NodeId, target: Decl) {
        self.aliases.insert(node, target);
    }

    /// Source location of the declaration behind an entity
    pub fn entity_span(&self, id: EntityId) -> Span {
        match self.entity(id).kind {
            EntityKind::Enum(texpr) | EntityKind::TypeAlias(texpr) => self.ast.type_expr(texpr).span,
            EntityKind::UsePackage(node)
            | EntityKind::StringLiteral(node)
            | EntityKind::FileContents(node)
            | EntityKind::MemoryReservation(node)
            | EntityKind::FunctionHeader(node)
            | EntityKind::Function(node)
            | EntityKind::GlobalHeader(node)
            | EntityKind::Global(node)
            | EntityKind::OverloadedFunction(node)
            | EntityKind::Expression { root: node, .. } => self.ast.node(node).span,
        }
    }

    /// Human readable name, e.g. `struct 'Vec2'`
    pub fn entity_label(&self, id: EntityId) -> String {
        let kind = self.entity(id).kind;
        let name = match kind {
            EntityKind::Enum(texpr) | EntityKind::TypeAlias(texpr) => {
                let texpr = self.ast.type_expr(texpr);
                if matches!(texpr.kind, TypeExprKind::Struct(_)) {
                    return match texpr.name {
                        Some(name) => format!("struct '{}'", self.name(name)),
                        None => "struct".to_string(),
                    };
                }
                texpr.name
            }
            EntityKind::Expression { binding, .. } => binding.map(|b| b.name),
            EntityKind::UsePackage(node) => match &self.ast.node(node).kind {
                NodeKind::UsePackage(decl) => Some(decl.package),
                _ => None,
            },
            EntityKind::MemoryReservation(node)
            | EntityKind::FunctionHeader(node)
            | EntityKind::Function(node)
            | EntityKind::GlobalHeader(node)
            | EntityKind::Global(node)
            | EntityKind::OverloadedFunction(node) => self.ast.node(node).kind.decl_name(),
            EntityKind::StringLiteral(_) | EntityKind::FileContents(_) => None,
        };

        match name {
            Some(name) => format!("{} '{}'", kind.describe(), self.name(name)),
            None => kind.describe().to_string(),
        }
    }

    // ==================== Resolution ====================

    /// Run the entity pipeline to quiescence. Returns true when no
    /// diagnostics were recorded.
    pub fn resolve(&mut self, loader: &dyn FileLoader) -> bool {
        self.resolving = true;
        let sweeps = Pipeline::new(self, loader).run();
        debug!(sweeps, entities = self.entities.len(), "resolution finished");

        if let Some(builtins) = self.builtins {
            let heap_start = i64::from(self.data.heap_start());
            self.ast.node_mut(builtins.heap_start).kind = NodeKind::NumLit(NumLit::Int(heap_start));
        }
        self.diagnostics.is_empty()
    }

    pub fn foreign_function_count(&self) -> u32 {
        self.foreign_functions
    }

    pub fn foreign_global_count(&self) -> u32 {
        self.foreign_globals
    }

    pub(crate) fn count_foreign_function(&mut self) {
        self.foreign_functions += 1;
    }

    pub(crate) fn count_foreign_global(&mut self) {
        self.foreign_globals += 1;
    }

    /// Look `name` up from inside `package`, as code in that package would
    #[cfg(test)]
    pub(crate) fn find(&self, package: &str, name: &str) -> Option<Decl> {
        let package = self.package_by_name(self.names.get(package)?)?;
        let name = self.names.get(name)?;
        self.scopes.lookup(self.package(package).private_scope, name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_package_is_idempotent() {
        let mut program = Program::new(8);
        let a = program.register_package("main");
        let b = program.register_package("main");
        let c = program.register_package("Main");
        assert_eq!(a, b);
        assert_ne!(a, c);

        let name = program.intern("main");
        assert_eq!(program.package_by_name(name), Some(a));
        let node = program.package(a).node;
        assert_eq!(program.scopes.lookup(program.global_scope(), name), Some(Decl::Node(node)));
    }

    #[test]
    fn test_primitive_names_are_global() {
        let mut program = Program::new(8);
        let name = program.intern("rawptr");
        assert_eq!(
            program.scopes.lookup(program.global_scope(), name),
            Some(Decl::Type(program.basic_type(BasicKind::Rawptr)))
        );
    }

    #[test]
    fn test_builtin_package_symbols() {
        let mut program = Program::new(8);
        let builtins = program.builtins().unwrap();
        let public = program.package(builtins.package).public_scope;
        let stack_top = program.intern("__stack_top");
        assert_eq!(
            program.scopes.lookup_local(public, stack_top),
            Some(Decl::Node(builtins.stack_top))
        );
        assert!(program.owner_of(Decl::Node(builtins.stack_top)).is_some());
    }
}

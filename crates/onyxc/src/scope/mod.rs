//! Symbol tables
//!
//! Scopes are arena entries with a parent link. Lookup walks towards the
//! root and never looks at siblings or children. Visibility between
//! packages is decided by the caller picking the scope to start from.

mod package;

pub use package::{Package, PackageId};

use std::collections::HashMap;

use crate::ast::{Decl, Name};

define_handle!(ScopeId);

#[derive(Debug, Default)]
pub struct Scope {
    parent: Option<ScopeId>,
    symbols: HashMap<Name, Decl>,
    /// Definition order, for deterministic iteration
    order: Vec<Name>,
}

impl Scope {
    pub fn parent(&self) -> Option<ScopeId> {
        self.parent
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Bindings in definition order
    pub fn iter(&self) -> impl Iterator<Item = (Name, Decl)> + '_ {
        self.order.iter().map(|name| (*name, self.symbols[name]))
    }
}

/// `define` hit an existing binding in the same scope
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Redefined {
    pub previous: Decl,
}

#[derive(Debug, Default)]
pub struct Scopes {
    scopes: Vec<Scope>,
}

impl Scopes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&mut self, parent: Option<ScopeId>) -> ScopeId {
        let id = ScopeId::from_raw(self.scopes.len() as u32);
        self.scopes.push(Scope {
            parent,
            ..Scope::default()
        });
        id
    }

    pub fn get(&self, scope: ScopeId) -> &Scope {
        &self.scopes[scope.index()]
    }

    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }

    /// Bind `name` in `scope`. Shadowing a parent binding is fine; a second
    /// binding in the same scope is not.
    pub fn define(&mut self, scope: ScopeId, name: Name, decl: Decl) -> Result<(), Redefined> {
        let entry = &mut self.scopes[scope.index()];
        if let Some(previous) = entry.symbols.get(&name) {
            return Err(Redefined { previous: *previous });
        }
        entry.symbols.insert(name, decl);
        entry.order.push(name);
        Ok(())
    }

    /// Point an existing binding somewhere else. Used once a constant alias
    /// (`A :: B`) knows what it stands for.
    pub fn rebind(&mut self, scope: ScopeId, name: Name, decl: Decl) {
        let entry = &mut self.scopes[scope.index()];
        if entry.symbols.insert(name, decl).is_none() {
            entry.order.push(name);
        }
    }

    /// Search `scope` and then its ancestors
    pub fn lookup(&self, scope: ScopeId, name: Name) -> Option<Decl> {
        let mut current = Some(scope);
        while let Some(id) = current {
            let entry = &self.scopes[id.index()];
            if let Some(decl) = entry.symbols.get(&name) {
                return Some(*decl);
            }
            current = entry.parent;
        }
        None
    }

    /// Search `scope` only
    pub fn lookup_local(&self, scope: ScopeId, name: Name) -> Option<Decl> {
        self.scopes[scope.index()].symbols.get(&name).copied()
    }

    /// Copy every binding of `source` into `target`. Names already bound in
    /// `target` keep their first definition.
    pub fn include(&mut self, target: ScopeId, source: ScopeId) {
        let bindings: Vec<(Name, Decl)> = self.get(source).iter().collect();
        for (name, decl) in bindings {
            let _ = self.define(target, name, decl);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::NodeId;
    use string_interner::DefaultStringInterner;

    fn node(raw: u32) -> Decl {
        Decl::Node(NodeId::from_raw(raw))
    }

    #[test]
    fn test_define_then_lookup() {
        let mut names = DefaultStringInterner::default();
        let x = names.get_or_intern("x");
        let mut scopes = Scopes::new();
        let root = scopes.create(None);

        scopes.define(root, x, node(1)).unwrap();
        assert_eq!(scopes.lookup(root, x), Some(node(1)));
        assert_eq!(scopes.lookup_local(root, x), Some(node(1)));
    }

    #[test]
    fn test_redefinition_in_same_scope() {
        let mut names = DefaultStringInterner::default();
        let x = names.get_or_intern("x");
        let mut scopes = Scopes::new();
        let root = scopes.create(None);

        scopes.define(root, x, node(1)).unwrap();
        let err = scopes.define(root, x, node(2)).unwrap_err();
        assert_eq!(err.previous, node(1));
        // The first binding survives
        assert_eq!(scopes.lookup(root, x), Some(node(1)));
    }

    #[test]
    fn test_shadowing_and_parent_walk() {
        let mut names = DefaultStringInterner::default();
        let x = names.get_or_intern("x");
        let y = names.get_or_intern("y");
        let mut scopes = Scopes::new();
        let root = scopes.create(None);
        let child = scopes.create(Some(root));
        let sibling = scopes.create(Some(root));

        scopes.define(root, x, node(1)).unwrap();
        scopes.define(child, x, node(2)).unwrap();
        scopes.define(child, y, node(3)).unwrap();

        assert_eq!(scopes.lookup(child, x), Some(node(2)));
        assert_eq!(scopes.lookup(root, x), Some(node(1)));
        // Siblings and children are never searched
        assert_eq!(scopes.lookup(sibling, y), None);
        assert_eq!(scopes.lookup(root, y), None);
        assert_eq!(scopes.lookup_local(child, x), Some(node(2)));
        assert_eq!(scopes.lookup_local(sibling, x), None);
    }

    #[test]
    fn test_include_keeps_first_definition() {
        let mut names = DefaultStringInterner::default();
        let a = names.get_or_intern("a");
        let b = names.get_or_intern("b");
        let mut scopes = Scopes::new();
        let source = scopes.create(None);
        let target = scopes.create(None);

        scopes.define(source, a, node(1)).unwrap();
        scopes.define(source, b, node(2)).unwrap();
        scopes.define(target, a, node(7)).unwrap();
        scopes.include(target, source);

        assert_eq!(scopes.lookup_local(target, a), Some(node(7)));
        assert_eq!(scopes.lookup_local(target, b), Some(node(2)));
        assert_eq!(scopes.get(target).len(), 2);
    }
}

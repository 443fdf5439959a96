//! Packages and their visibility tiers

use super::ScopeId;
use crate::ast::{Name, NodeId};

define_handle!(PackageId);

/// A named compilation unit.
///
/// The three scopes are chained `private -> public -> include -> global`:
/// code inside the package looks up from `private_scope` and so sees every
/// tier, with its own declarations shadowing imported names. Other packages
/// only ever search `public_scope`.
#[derive(Debug, Clone)]
pub struct Package {
    pub name: Name,
    /// `Package` node bound to the package name in the global scope
    pub node: NodeId,
    /// Symbols visible to importers
    pub public_scope: ScopeId,
    /// Symbols brought in by `use package`
    pub include_scope: ScopeId,
    /// `#private` symbols
    pub private_scope: ScopeId,
}

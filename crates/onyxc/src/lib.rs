//! Onyx Compiler - front-end semantic core
//!
//! This library turns parsed Onyx source into a fully resolved program that a
//! WebAssembly emitter can lower without any further name lookups.
//!
//! ## Architecture
//!
//! The compiler is organized into:
//! - **Frontend** (`frontend/`): Lexer and parser producing arena nodes and entities
//! - **AST** (`ast/`): Node, type-expression and operator model
//! - **Types** (`types/`): Resolved types, primitives and the intrinsic catalog
//! - **Scopes** (`scope/`): Symbol tables and packages
//! - **Entities** (`entity/`): The staged resolution pipeline
//! - **Program** (`program.rs`): The registry handed to code generation
//! - **Driver** (`driver/`): File loading and orchestration
//! - **Common** (`common/`): Shared infrastructure (errors, spans)

/// Declares a `u32` index handle into one of the compiler's arenas.
macro_rules! define_handle {
    ($name:ident) => {
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(u32);

        impl $name {
            pub const fn from_raw(raw: u32) -> Self {
                Self(raw)
            }

            pub const fn to_raw(self) -> u32 {
                self.0
            }

            pub const fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl std::fmt::Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, concat!(stringify!($name), "({})"), self.0)
            }
        }
    };
}

pub mod common;
pub mod ast;
pub mod types;
pub mod scope;
pub mod entity;
pub mod program;
pub mod frontend;
pub mod driver;

// Re-exports for convenience
pub use common::{CompileError, CompileResult, DiagnosticReporter, Diagnostics, Span};
pub use driver::{CompileConfig, Driver, FileLoader};
pub use entity::{Entity, EntityId, EntityKind, EntityState};
pub use program::Program;

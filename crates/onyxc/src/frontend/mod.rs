//! Onyx source frontend
//!
//! The lexer turns text into tokens; the parser turns tokens into arena
//! nodes and queues one entity per top-level unit of work. Neither looks a
//! name up: that is left to the entity pipeline.

pub mod lexer;
pub mod parser;

pub use lexer::{OnyxLexer, OnyxToken, OnyxTokenKind};
pub use parser::{parse_source, ParsedFile, DEFAULT_PACKAGE};

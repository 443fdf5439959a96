//! Onyx lexer module

mod scanner;
mod token;

pub use scanner::OnyxLexer;
pub use token::{OnyxToken, OnyxTokenKind};

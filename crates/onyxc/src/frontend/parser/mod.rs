//! Onyx recursive descent parser
//!
//! The parser writes straight into a [`Program`]: nodes go into the arena,
//! every top-level unit becomes an entity, and bound names are defined in
//! the package scopes as they are read. Lookups happen later, during the
//! entity pipeline, so declaration order never matters.

mod decl;
mod expr;

use crate::ast::{Decl, Name, NodeId, NodeKind, TypeExprId, TypeExprKind};
use crate::common::{CompileError, CompileResult, FileId, Span};
use crate::entity::{Entity, EntityId, EntityKind, EntityState};
use crate::frontend::lexer::{OnyxLexer, OnyxTokenKind};
use crate::program::Program;
use crate::scope::{PackageId, ScopeId};

/// Package of files without a `package` line
pub const DEFAULT_PACKAGE: &str = "main";

/// What the driver needs back from one file
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedFile {
    pub package: PackageId,
    /// `#include_file` paths in source order
    pub includes: Vec<String>,
}

/// Parse one source file into `program`
pub fn parse_source(program: &mut Program, source: &str, file: FileId) -> CompileResult<ParsedFile> {
    OnyxParser::new(program, source, file)?.parse_file()
}

pub struct OnyxParser<'a, 'p> {
    lexer: OnyxLexer<'a>,
    program: &'p mut Program,
    package: PackageId,
    includes: Vec<String>,
}

impl<'a, 'p> OnyxParser<'a, 'p> {
    /// Reads the optional `package` line so every node lands in the right package
    pub fn new(program: &'p mut Program, source: &'a str, file: FileId) -> CompileResult<Self> {
        let mut lexer = OnyxLexer::new(source, file);
        let package = if lexer.match_token(&OnyxTokenKind::Package)? {
            let token = lexer.expect(OnyxTokenKind::Identifier(String::new()))?;
            lexer.match_token(&OnyxTokenKind::Semi)?;
            match token.kind {
                OnyxTokenKind::Identifier(name) => program.register_package(&name),
                _ => program.register_package(DEFAULT_PACKAGE),
            }
        } else {
            program.register_package(DEFAULT_PACKAGE)
        };

        Ok(Self {
            lexer,
            program,
            package,
            includes: Vec::new(),
        })
    }

    pub fn parse_file(mut self) -> CompileResult<ParsedFile> {
        while !self.lexer.check(&OnyxTokenKind::Eof)? {
            self.parse_top_level()?;
        }
        Ok(ParsedFile {
            package: self.package,
            includes: self.includes,
        })
    }

    // ==================== Token helpers ====================

    fn check(&mut self, kind: &OnyxTokenKind) -> CompileResult<bool> {
        self.lexer.check(kind)
    }

    fn match_token(&mut self, kind: &OnyxTokenKind) -> CompileResult<bool> {
        self.lexer.match_token(kind)
    }

    fn expect(&mut self, kind: OnyxTokenKind) -> CompileResult<Span> {
        Ok(self.lexer.expect(kind)?.span)
    }

    fn peek_span(&mut self) -> CompileResult<Span> {
        Ok(self.lexer.peek()?.span)
    }

    fn check_directive(&mut self, name: &str) -> CompileResult<bool> {
        Ok(matches!(&self.lexer.peek()?.kind, OnyxTokenKind::Directive(d) if d == name))
    }

    fn match_directive(&mut self, name: &str) -> CompileResult<bool> {
        if self.check_directive(name)? {
            self.lexer.next_token()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn expect_identifier(&mut self) -> CompileResult<(Name, Span)> {
        let token = self.lexer.next_token()?;
        match token.kind {
            OnyxTokenKind::Identifier(name) => Ok((self.program.intern(&name), token.span)),
            other => Err(CompileError::parser(
                format!("expected identifier, found {}", other),
                token.span,
            )),
        }
    }

    /// String literal contents with escapes processed
    fn expect_string(&mut self) -> CompileResult<(String, Span)> {
        let token = self.lexer.next_token()?;
        match token.kind {
            OnyxTokenKind::StringLiteral(raw) => Ok((unescape(&raw[1..raw.len() - 1], token.span)?, token.span)),
            other => Err(CompileError::parser(
                format!("expected string literal, found {}", other),
                token.span,
            )),
        }
    }

    fn error_here<T>(&mut self, what: &str) -> CompileResult<T> {
        let token = self.lexer.next_token()?;
        Err(CompileError::parser(
            format!("expected {}, found {}", what, token.kind),
            token.span,
        ))
    }

    // ==================== Program helpers ====================

    fn add(&mut self, kind: NodeKind, span: Span) -> NodeId {
        self.program.ast.add(kind, span)
    }

    fn add_type(&mut self, kind: TypeExprKind, span: Span) -> TypeExprId {
        self.program.ast.add_type(kind, span)
    }

    fn add_entity(&mut self, kind: EntityKind) -> EntityId {
        self.program.add_entity(Entity::new(kind, self.package))
    }

    fn binding_scope(&self, private: bool) -> ScopeId {
        let package = self.program.package(self.package);
        if private { package.private_scope } else { package.public_scope }
    }

    /// Bind `name` for the entities just created. A clash fails them, the
    /// first one carrying the diagnostic.
    fn bind(&mut self, scope: ScopeId, name: Name, decl: Decl, span: Span, entities: &[EntityId]) {
        let Err(existing) = self.program.scopes.define(scope, name, decl) else {
            return;
        };
        let previous = self.program.ast.decl_span(existing.previous);
        let error = CompileError::redefinition(self.program.name(name), span, Some(previous));
        if let Some((first, rest)) = entities.split_first() {
            self.program.fail_entity(*first, error);
            for entity in rest {
                self.program.set_state(*entity, EntityState::Error);
            }
        }
    }
}

/// Process `\n`, `\t`, `\r`, `\0`, `\\` and `\"`
fn unescape(raw: &str, span: Span) -> CompileResult<String> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('0') => out.push('\0'),
            Some('\\') => out.push('\\'),
            Some('"') => out.push('"'),
            other => {
                return Err(CompileError::lexer(
                    format!("unknown escape sequence '\\{}'", other.map(String::from).unwrap_or_default()),
                    span,
                ));
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{AstKind, BinaryOp, NumLit};
    use pretty_assertions::assert_eq;

    /// Parse `source` and return the program with the kinds of the entities it added
    fn parse(source: &str) -> (Program, ParsedFile, Vec<EntityKind>) {
        let mut program = Program::new(8);
        let first = program.entity_count();
        let parsed = parse_source(&mut program, source, 0).unwrap();
        let kinds = program.entities().skip(first).map(|(_, e)| e.kind).collect();
        (program, parsed, kinds)
    }

    fn lookup(program: &mut Program, package: PackageId, name: &str) -> Option<Decl> {
        let name = program.intern(name);
        let scope = program.package(package).public_scope;
        program.scopes.lookup(scope, name)
    }

    fn root_of(kinds: &[EntityKind]) -> NodeId {
        match kinds.last() {
            Some(EntityKind::Expression { root, .. }) => *root,
            other => panic!("expected an expression entity, got {:?}", other),
        }
    }

    #[test]
    fn test_package_line_and_includes() {
        let (mut program, parsed, kinds) = parse(
            "package gfx\n#include_file \"util.onyx\"\n#include_file \"math.onyx\"\n",
        );
        let gfx = program.intern("gfx");
        assert_eq!(program.package_by_name(gfx), Some(parsed.package));
        assert_eq!(parsed.includes, vec!["util.onyx".to_string(), "math.onyx".to_string()]);
        assert!(kinds.is_empty());
    }

    #[test]
    fn test_default_package() {
        let (mut program, parsed, _) = parse("x :: 1;");
        let main = program.intern(DEFAULT_PACKAGE);
        assert_eq!(program.package_by_name(main), Some(parsed.package));
    }

    #[test]
    fn test_procedure_entities() {
        let (mut program, parsed, kinds) = parse(
            "add :: proc (a: i32, b: i32) -> i32 { return a + b; }\n\
             print :: proc #foreign \"host\" \"print\" (value: i32) ---\n",
        );
        assert!(matches!(
            kinds.as_slice(),
            [
                EntityKind::FunctionHeader(a),
                EntityKind::Function(b),
                EntityKind::FunctionHeader(_),
            ] if a == b
        ));

        let Some(Decl::Node(print)) = lookup(&mut program, parsed.package, "print") else {
            panic!("print is not bound");
        };
        let NodeKind::Function(decl) = &program.ast.node(print).kind else {
            panic!("print is not a function");
        };
        assert!(decl.body.is_none());
        assert_eq!(decl.attrs.foreign.as_ref().map(|f| f.name.as_str()), Some("print"));
        assert_eq!(decl.params.len(), 1);
    }

    #[test]
    fn test_intrinsic_defaults_to_binding_name() {
        let (mut program, parsed, _) = parse("memory_size :: proc #intrinsic () -> i32 ---");
        let Some(Decl::Node(node)) = lookup(&mut program, parsed.package, "memory_size") else {
            panic!("memory_size is not bound");
        };
        let NodeKind::Function(decl) = &program.ast.node(node).kind else {
            panic!("not a function");
        };
        assert_eq!(decl.attrs.intrinsic_name.as_deref(), Some("memory_size"));
    }

    #[test]
    fn test_missing_body_is_an_error() {
        let mut program = Program::new(8);
        let err = parse_source(&mut program, "f :: proc () ---", 0).unwrap_err();
        assert!(matches!(err, CompileError::Parser { .. }));
    }

    #[test]
    fn test_redefinition_fails_first_entity() {
        let (program, _, _) = parse("f :: proc () { }\nf :: proc () { }\n");
        let failed: Vec<_> = program
            .entities()
            .filter(|(_, e)| e.state == EntityState::Error)
            .map(|(id, _)| id)
            .collect();
        assert_eq!(failed.len(), 2);
        assert_eq!(program.diagnostics.len(), 1);
        assert!(matches!(
            program.diagnostics.iter().next().map(|d| &d.error),
            Some(CompileError::Redefinition { .. })
        ));
    }

    #[test]
    fn test_binary_precedence() {
        let (program, _, kinds) = parse("x :: 1 + 2 * 3;");
        let NodeKind::BinaryOp { op, right, .. } = program.ast.node(root_of(&kinds)).kind else {
            panic!("expected a binary operator");
        };
        assert_eq!(op, BinaryOp::Add);
        assert!(matches!(
            program.ast.node(right).kind,
            NodeKind::BinaryOp {
                op: BinaryOp::Multiply,
                ..
            }
        ));
    }

    #[test]
    fn test_pipe_binds_loosest() {
        let (program, _, kinds) = parse("x :: a + 1 |> f(2);");
        assert!(matches!(
            program.ast.node(root_of(&kinds)).kind,
            NodeKind::BinaryOp { op: BinaryOp::Pipe, .. }
        ));
    }

    #[test]
    fn test_local_with_initializer_expands() {
        let (program, _, _) = parse("main :: proc () { x: i32 = 4; y := x; }");
        let block = program
            .entities()
            .find_map(|(_, e)| match e.kind {
                EntityKind::Function(node) => match &program.ast.node(node).kind {
                    NodeKind::Function(decl) => decl.body,
                    _ => None,
                },
                _ => None,
            })
            .unwrap();
        let NodeKind::Block(stmts) = &program.ast.node(block).kind else {
            panic!("body is not a block");
        };
        let kinds: Vec<_> = stmts.iter().map(|s| program.ast.node(*s).kind.kind()).collect();
        assert_eq!(
            kinds,
            vec![AstKind::Local, AstKind::BinaryOp, AstKind::Local, AstKind::BinaryOp]
        );
        assert!(program.ast.node(stmts[0]).type_node.is_some());
        assert!(program.ast.node(stmts[2]).type_node.is_none());
    }

    #[test]
    fn test_types_and_struct_literals() {
        let (program, _, kinds) = parse(
            "Vec2 :: struct { x: f32, y: f32 }\n\
             Grid :: #type [4] ^gfx.Cell;\n\
             origin :: Vec2.{ 0.0f, 0.0f };\n",
        );
        assert!(matches!(kinds[0], EntityKind::TypeAlias(_)));
        let EntityKind::TypeAlias(grid) = kinds[1] else {
            panic!("expected an alias entity");
        };
        let TypeExprKind::Alias(array) = program.ast.type_expr(grid).kind else {
            panic!("expected an alias");
        };
        let TypeExprKind::Array { elem, .. } = program.ast.type_expr(array).kind else {
            panic!("expected an array");
        };
        let TypeExprKind::Pointer(cell) = program.ast.type_expr(elem).kind else {
            panic!("expected a pointer");
        };
        assert!(matches!(program.ast.type_expr(cell).kind, TypeExprKind::Qualified { .. }));

        let NodeKind::StructLiteral { of, values } = &program.ast.node(root_of(&kinds)).kind else {
            panic!("expected a struct literal");
        };
        assert_eq!(values.len(), 2);
        assert!(matches!(program.ast.type_expr(*of).kind, TypeExprKind::Symbol(_)));
    }

    #[test]
    fn test_enum_values_and_literals() {
        let (program, _, kinds) = parse(
            "Mode :: enum (u8) #flags { Read, Write, Exec :: 16 }\n\
             msg :: \"a\\tb\";\n",
        );
        let EntityKind::Enum(texpr) = kinds[0] else {
            panic!("expected an enum entity");
        };
        let TypeExprKind::Enum(decl) = &program.ast.type_expr(texpr).kind else {
            panic!("expected an enum");
        };
        assert!(decl.flags);
        assert_eq!(decl.values.len(), 3);
        assert_eq!(program.scopes.get(decl.scope).len(), 3);

        assert!(matches!(kinds[1], EntityKind::StringLiteral(_)));
        let NodeKind::StrLit { data, .. } = &program.ast.node(root_of(&kinds)).kind else {
            panic!("expected a string literal");
        };
        assert_eq!(data.as_slice(), b"a\tb");
    }

    #[test]
    fn test_number_literal_values() {
        let (program, _, kinds) = parse("x :: 0xFF_FF;");
        assert_eq!(
            program.ast.node(root_of(&kinds)).kind,
            NodeKind::NumLit(NumLit::Int(0xFFFF))
        );
    }

    #[test]
    fn test_use_package_forms() {
        let (program, _, kinds) = parse("use package core as c { print, exit as quit }\nuse package gfx;\n");
        assert_eq!(kinds.len(), 2);
        let EntityKind::UsePackage(node) = kinds[0] else {
            panic!("expected a use entity");
        };
        let NodeKind::UsePackage(decl) = &program.ast.node(node).kind else {
            panic!("expected a use node");
        };
        assert!(decl.alias.is_some());
        let only = decl.only.as_ref().unwrap();
        assert_eq!(only.len(), 2);
        assert!(only[1].alias.is_some());
    }

    #[test]
    fn test_unknown_escape() {
        assert!(unescape("\\q", Span::default()).is_err());
        assert_eq!(unescape("\\\"hi\\\"\\n", Span::default()).unwrap(), "\"hi\"\n");
    }
}

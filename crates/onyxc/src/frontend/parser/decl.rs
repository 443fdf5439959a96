//! Top-level declarations and type expressions

use super::OnyxParser;
use crate::ast::{
    Decl, EnumDecl, ForeignName, FunctionAttrs, FunctionDecl, GlobalAttrs, ImportItem, LocalAttrs, Name,
    NodeKind, StructMember, TypeExprId, TypeExprKind, UseDecl,
};
use crate::common::{CompileError, CompileResult, Span};
use crate::entity::{Binding, EntityKind};
use crate::frontend::lexer::OnyxTokenKind;
use crate::scope::ScopeId;
use crate::types::BasicKind;

impl OnyxParser<'_, '_> {
    pub(super) fn parse_top_level(&mut self) -> CompileResult<()> {
        if self.check(&OnyxTokenKind::Use)? {
            return self.parse_use();
        }
        if self.match_directive("include_file")? {
            let (path, _) = self.expect_string()?;
            self.match_token(&OnyxTokenKind::Semi)?;
            self.includes.push(path);
            return Ok(());
        }

        let private = self.match_directive("private")?;
        if !self.check(&OnyxTokenKind::Identifier(String::new()))? {
            return self.error_here("declaration");
        }
        self.parse_binding(private)
    }

    /// `use package p [as a] [{ x, y as z }]`
    fn parse_use(&mut self) -> CompileResult<()> {
        let start = self.expect(OnyxTokenKind::Use)?;
        self.expect(OnyxTokenKind::Package)?;
        let (package, _) = self.expect_identifier()?;
        let alias = self.parse_as()?;

        let only = if self.match_token(&OnyxTokenKind::LBrace)? {
            let mut items = Vec::new();
            while !self.check(&OnyxTokenKind::RBrace)? {
                let (name, name_span) = self.expect_identifier()?;
                let alias = self.parse_as()?;
                items.push(ImportItem {
                    name,
                    alias,
                    span: self.lexer.span_from(name_span),
                });
                if !self.match_token(&OnyxTokenKind::Comma)? {
                    break;
                }
            }
            self.expect(OnyxTokenKind::RBrace)?;
            Some(items)
        } else {
            None
        };
        self.match_token(&OnyxTokenKind::Semi)?;

        let span = self.lexer.span_from(start);
        let node = self.add(
            NodeKind::UsePackage(UseDecl {
                package,
                alias,
                only,
                resolved: None,
            }),
            span,
        );
        self.add_entity(EntityKind::UsePackage(node));
        Ok(())
    }

    fn parse_as(&mut self) -> CompileResult<Option<Name>> {
        if self.match_token(&OnyxTokenKind::As)? {
            Ok(Some(self.expect_identifier()?.0))
        } else {
            Ok(None)
        }
    }

    fn parse_binding(&mut self, private: bool) -> CompileResult<()> {
        let (name, name_span) = self.expect_identifier()?;

        if self.match_token(&OnyxTokenKind::ColonColon)? {
            return self.parse_constant(name, name_span, private);
        }

        let (type_node, initial) = if self.match_token(&OnyxTokenKind::ColonEq)? {
            (None, Some(self.parse_expr()?))
        } else if self.match_token(&OnyxTokenKind::Colon)? {
            let ty = self.parse_type()?;
            let initial = if self.match_token(&OnyxTokenKind::Eq)? {
                Some(self.parse_expr()?)
            } else {
                None
            };
            (Some(ty), initial)
        } else {
            return self.error_here("'::', ':' or ':='");
        };
        self.expect(OnyxTokenKind::Semi)?;

        let span = self.lexer.span_from(name_span);
        let node = self.program.ast.add_typed(
            NodeKind::Memres {
                name,
                initial,
                addr: None,
            },
            span,
            type_node,
        );
        let entity = self.add_entity(EntityKind::MemoryReservation(node));
        let scope = self.binding_scope(private);
        self.bind(scope, name, Decl::Node(node), name_span, &[entity]);
        Ok(())
    }

    /// Everything after `name ::`
    fn parse_constant(&mut self, name: Name, name_span: Span, private: bool) -> CompileResult<()> {
        let scope = self.binding_scope(private);

        if self.check(&OnyxTokenKind::Proc)? {
            return self.parse_proc(name, name_span, private);
        }
        if self.check(&OnyxTokenKind::Global)? {
            return self.parse_global(name, name_span, private);
        }
        if self.check(&OnyxTokenKind::Struct)? {
            let texpr = self.parse_struct_type()?;
            self.match_token(&OnyxTokenKind::Semi)?;
            return self.bind_type(texpr, name, name_span, scope, EntityKind::TypeAlias(texpr));
        }
        if self.check(&OnyxTokenKind::Enum)? {
            let texpr = self.parse_enum()?;
            self.match_token(&OnyxTokenKind::Semi)?;
            return self.bind_type(texpr, name, name_span, scope, EntityKind::Enum(texpr));
        }
        if self.check_directive("type")? {
            let start = self.expect(OnyxTokenKind::Directive(String::new()))?;
            let inner = self.parse_type()?;
            self.expect(OnyxTokenKind::Semi)?;
            let texpr = self.add_type(TypeExprKind::Alias(inner), self.lexer.span_from(start));
            return self.bind_type(texpr, name, name_span, scope, EntityKind::TypeAlias(texpr));
        }

        let root = self.parse_expr()?;
        self.expect(OnyxTokenKind::Semi)?;
        let entity = self.add_entity(EntityKind::Expression {
            root,
            binding: Some(Binding { scope, name }),
        });
        self.bind(scope, name, Decl::Node(root), name_span, &[entity]);
        Ok(())
    }

    fn bind_type(
        &mut self,
        texpr: TypeExprId,
        name: Name,
        name_span: Span,
        scope: ScopeId,
        kind: EntityKind,
    ) -> CompileResult<()> {
        self.program.ast.type_expr_mut(texpr).name = Some(name);
        let entity = self.add_entity(kind);
        self.bind(scope, name, Decl::Type(texpr), name_span, &[entity]);
        Ok(())
    }

    // ==================== Procedures ====================

    fn parse_proc(&mut self, name: Name, name_span: Span, private: bool) -> CompileResult<()> {
        let start = self.expect(OnyxTokenKind::Proc)?;
        let scope = self.binding_scope(private);

        if self.match_directive("overloaded")? {
            return self.parse_overloaded(start, name, name_span, scope);
        }

        let mut attrs = FunctionAttrs {
            private,
            ..FunctionAttrs::default()
        };
        self.parse_proc_directives(&mut attrs, name)?;

        self.expect(OnyxTokenKind::LParen)?;
        let mut params = Vec::new();
        while !self.check(&OnyxTokenKind::RParen)? {
            let (param, param_span) = self.expect_identifier()?;
            self.expect(OnyxTokenKind::Colon)?;
            let ty = self.parse_type()?;
            let node = self.program.ast.add_typed(
                NodeKind::Local {
                    name: param,
                    attrs: LocalAttrs {
                        param: true,
                        ..LocalAttrs::default()
                    },
                },
                param_span,
                Some(ty),
            );
            params.push(node);
            if !self.match_token(&OnyxTokenKind::Comma)? {
                break;
            }
        }
        self.expect(OnyxTokenKind::RParen)?;

        let return_type = if self.match_token(&OnyxTokenKind::Arrow)? {
            Some(self.parse_type()?)
        } else {
            None
        };
        self.parse_proc_directives(&mut attrs, name)?;

        let body = if self.match_token(&OnyxTokenKind::TripleDash)? {
            None
        } else {
            Some(self.parse_block()?)
        };
        self.match_token(&OnyxTokenKind::Semi)?;
        let span = self.lexer.span_from(start);

        if body.is_none() && !attrs.is_bodiless() {
            return Err(CompileError::parser(
                "procedure without a body must be #foreign or #intrinsic",
                span,
            ));
        }
        if body.is_some() && attrs.is_bodiless() {
            return Err(CompileError::parser(
                "#foreign and #intrinsic procedures cannot have a body",
                span,
            ));
        }

        let has_body = body.is_some();
        let node = self.add(
            NodeKind::Function(FunctionDecl {
                name,
                params,
                return_type,
                body,
                attrs,
            }),
            span,
        );
        let mut entities = vec![self.add_entity(EntityKind::FunctionHeader(node))];
        if has_body {
            entities.push(self.add_entity(EntityKind::Function(node)));
        }
        self.bind(scope, name, Decl::Node(node), name_span, &entities);
        Ok(())
    }

    /// `proc #overloaded { a, b, c }`
    fn parse_overloaded(
        &mut self,
        start: Span,
        name: Name,
        name_span: Span,
        scope: ScopeId,
    ) -> CompileResult<()> {
        self.expect(OnyxTokenKind::LBrace)?;
        let mut options = Vec::new();
        while !self.check(&OnyxTokenKind::RBrace)? {
            options.push(self.parse_expr()?);
            if !self.match_token(&OnyxTokenKind::Comma)? {
                break;
            }
        }
        self.expect(OnyxTokenKind::RBrace)?;
        self.match_token(&OnyxTokenKind::Semi)?;

        let span = self.lexer.span_from(start);
        let node = self.add(NodeKind::OverloadedFunction { name, options }, span);
        let entity = self.add_entity(EntityKind::OverloadedFunction(node));
        self.bind(scope, name, Decl::Node(node), name_span, &[entity]);
        Ok(())
    }

    fn parse_proc_directives(&mut self, attrs: &mut FunctionAttrs, name: Name) -> CompileResult<()> {
        loop {
            if self.match_directive("export")? {
                attrs.export_name = Some(self.expect_string()?.0);
            } else if self.match_directive("foreign")? {
                attrs.foreign = Some(self.parse_foreign_name()?);
            } else if self.match_directive("intrinsic")? {
                let catalog_name = if matches!(self.lexer.peek()?.kind, OnyxTokenKind::StringLiteral(_)) {
                    self.expect_string()?.0
                } else {
                    self.program.name(name).to_string()
                };
                attrs.intrinsic_name = Some(catalog_name);
            } else if self.match_directive("inline")? {
                attrs.inline = true;
            } else {
                return Ok(());
            }
        }
    }

    /// `"module" "name"` after `#foreign`
    fn parse_foreign_name(&mut self) -> CompileResult<ForeignName> {
        let (module, _) = self.expect_string()?;
        let (name, _) = self.expect_string()?;
        Ok(ForeignName { module, name })
    }

    // ==================== Globals ====================

    /// `global [#foreign "m" "n"] [#export "n"] T [= value];`
    fn parse_global(&mut self, name: Name, name_span: Span, private: bool) -> CompileResult<()> {
        let start = self.expect(OnyxTokenKind::Global)?;
        let mut attrs = GlobalAttrs {
            private,
            ..GlobalAttrs::default()
        };
        loop {
            if self.match_directive("foreign")? {
                attrs.foreign = Some(self.parse_foreign_name()?);
            } else if self.match_directive("export")? {
                attrs.export_name = Some(self.expect_string()?.0);
            } else {
                break;
            }
        }

        let ty = self.parse_type()?;
        let initial = if self.match_token(&OnyxTokenKind::Eq)? {
            Some(self.parse_expr()?)
        } else {
            None
        };
        self.expect(OnyxTokenKind::Semi)?;

        if initial.is_some() && attrs.foreign.is_some() {
            return Err(CompileError::parser(
                "#foreign globals cannot have an initializer",
                self.lexer.span_from(start),
            ));
        }

        let span = self.lexer.span_from(start);
        let node = self
            .program
            .ast
            .add_typed(NodeKind::Global { name, initial, attrs }, span, Some(ty));
        let header = self.add_entity(EntityKind::GlobalHeader(node));
        let value = self.add_entity(EntityKind::Global(node));
        let scope = self.binding_scope(private);
        self.bind(scope, name, Decl::Node(node), name_span, &[header, value]);
        Ok(())
    }

    // ==================== Types ====================

    pub(super) fn parse_type(&mut self) -> CompileResult<TypeExprId> {
        let start = self.peek_span()?;

        if self.match_token(&OnyxTokenKind::Caret)? {
            let inner = self.parse_type()?;
            return Ok(self.add_type(TypeExprKind::Pointer(inner), self.lexer.span_from(start)));
        }

        if self.match_token(&OnyxTokenKind::LBracket)? {
            let count = self.parse_expr()?;
            self.expect(OnyxTokenKind::RBracket)?;
            let elem = self.parse_type()?;
            return Ok(self.add_type(TypeExprKind::Array { elem, count }, self.lexer.span_from(start)));
        }

        if self.match_token(&OnyxTokenKind::LParen)? {
            let mut params = Vec::new();
            while !self.check(&OnyxTokenKind::RParen)? {
                params.push(self.parse_type()?);
                if !self.match_token(&OnyxTokenKind::Comma)? {
                    break;
                }
            }
            self.expect(OnyxTokenKind::RParen)?;
            let ret = if self.match_token(&OnyxTokenKind::Arrow)? {
                self.parse_type()?
            } else {
                self.program.basic_type(BasicKind::Void)
            };
            return Ok(self.add_type(TypeExprKind::Function { params, ret }, self.lexer.span_from(start)));
        }

        if self.check(&OnyxTokenKind::Struct)? {
            return self.parse_struct_type();
        }

        if !self.check(&OnyxTokenKind::Identifier(String::new()))? {
            return self.error_here("type");
        }
        let (name, _) = self.expect_identifier()?;
        let qualified = self.check(&OnyxTokenKind::Dot)?
            && self
                .lexer
                .check_lookahead(&OnyxTokenKind::Identifier(String::new()))?;
        let kind = if qualified {
            self.lexer.next_token()?;
            let (member, _) = self.expect_identifier()?;
            TypeExprKind::Qualified {
                package: name,
                name: member,
            }
        } else {
            TypeExprKind::Symbol(name)
        };
        Ok(self.add_type(kind, self.lexer.span_from(start)))
    }

    /// `struct { a: T, b: U }`, members split by `,` or `;`
    fn parse_struct_type(&mut self) -> CompileResult<TypeExprId> {
        let start = self.expect(OnyxTokenKind::Struct)?;
        self.expect(OnyxTokenKind::LBrace)?;
        let mut members = Vec::new();
        while !self.check(&OnyxTokenKind::RBrace)? {
            let (name, member_span) = self.expect_identifier()?;
            self.expect(OnyxTokenKind::Colon)?;
            let type_node = self.parse_type()?;
            members.push(StructMember {
                name,
                type_node,
                span: self.lexer.span_from(member_span),
            });
            if !self.match_token(&OnyxTokenKind::Comma)? && !self.match_token(&OnyxTokenKind::Semi)? {
                break;
            }
        }
        self.expect(OnyxTokenKind::RBrace)?;
        Ok(self.add_type(TypeExprKind::Struct(members), self.lexer.span_from(start)))
    }

    /// `enum [(T)] [#flags] { A, B :: 4, C }`
    fn parse_enum(&mut self) -> CompileResult<TypeExprId> {
        let start = self.expect(OnyxTokenKind::Enum)?;
        let backing = if self.match_token(&OnyxTokenKind::LParen)? {
            let ty = self.parse_type()?;
            self.expect(OnyxTokenKind::RParen)?;
            Some(ty)
        } else {
            None
        };
        let flags = self.match_directive("flags")?;

        self.expect(OnyxTokenKind::LBrace)?;
        let scope = self.program.scopes.create(None);
        let mut values = Vec::new();
        while !self.check(&OnyxTokenKind::RBrace)? {
            let (name, name_span) = self.expect_identifier()?;
            let value = if self.match_token(&OnyxTokenKind::ColonColon)? {
                Some(self.parse_expr()?)
            } else {
                None
            };
            let node = self.add(
                NodeKind::EnumValue {
                    name,
                    value,
                    resolved: None,
                },
                self.lexer.span_from(name_span),
            );
            if let Err(existing) = self.program.scopes.define(scope, name, Decl::Node(node)) {
                let previous = self.program.ast.decl_span(existing.previous);
                return Err(CompileError::redefinition(
                    self.program.name(name),
                    name_span,
                    Some(previous),
                ));
            }
            values.push(node);
            if !self.match_token(&OnyxTokenKind::Comma)? && !self.match_token(&OnyxTokenKind::Semi)? {
                break;
            }
        }
        self.expect(OnyxTokenKind::RBrace)?;

        Ok(self.add_type(
            TypeExprKind::Enum(EnumDecl {
                backing,
                values,
                scope,
                flags,
            }),
            self.lexer.span_from(start),
        ))
    }
}

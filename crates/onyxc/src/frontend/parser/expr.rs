//! Statements and expressions

use super::OnyxParser;
use crate::ast::{BinaryOp, LocalAttrs, NodeId, NodeKind, NumLit, TypeExprId, TypeExprKind, UnaryOp};
use crate::common::{CompileError, CompileResult, Span};
use crate::entity::EntityKind;
use crate::frontend::lexer::OnyxTokenKind;
use crate::types::BasicKind;

impl OnyxParser<'_, '_> {
    // ==================== Statements ====================

    pub(super) fn parse_block(&mut self) -> CompileResult<NodeId> {
        let start = self.expect(OnyxTokenKind::LBrace)?;
        let mut stmts = Vec::new();
        while !self.check(&OnyxTokenKind::RBrace)? {
            self.parse_stmt(&mut stmts)?;
        }
        self.expect(OnyxTokenKind::RBrace)?;
        Ok(self.add(NodeKind::Block(stmts), self.lexer.span_from(start)))
    }

    /// A declaration with an initializer expands to the local and its
    /// assignment, so one statement may push two nodes.
    fn parse_stmt(&mut self, stmts: &mut Vec<NodeId>) -> CompileResult<()> {
        let is_local = self.check(&OnyxTokenKind::Identifier(String::new()))?
            && (self.lexer.check_lookahead(&OnyxTokenKind::Colon)?
                || self.lexer.check_lookahead(&OnyxTokenKind::ColonEq)?);
        if !is_local {
            let stmt = self.parse_single_stmt()?;
            stmts.push(stmt);
            return Ok(());
        }

        let (name, name_span) = self.expect_identifier()?;
        let (type_node, initial) = if self.match_token(&OnyxTokenKind::ColonEq)? {
            (None, Some(self.parse_expr()?))
        } else {
            self.expect(OnyxTokenKind::Colon)?;
            let ty = self.parse_type()?;
            let initial = if self.match_token(&OnyxTokenKind::Eq)? {
                Some(self.parse_expr()?)
            } else {
                None
            };
            (Some(ty), initial)
        };
        self.expect(OnyxTokenKind::Semi)?;

        let local = self.program.ast.add_typed(
            NodeKind::Local {
                name,
                attrs: LocalAttrs::default(),
            },
            name_span,
            type_node,
        );
        stmts.push(local);

        if let Some(value) = initial {
            let target = self.add(NodeKind::Symbol(name), name_span);
            let assign = self.add(
                NodeKind::BinaryOp {
                    op: BinaryOp::Assign,
                    left: target,
                    right: value,
                },
                self.lexer.span_from(name_span),
            );
            stmts.push(assign);
        }
        Ok(())
    }

    fn parse_single_stmt(&mut self) -> CompileResult<NodeId> {
        let start = self.peek_span()?;

        if self.match_token(&OnyxTokenKind::Return)? {
            let value = if self.check(&OnyxTokenKind::Semi)? || self.check(&OnyxTokenKind::RBrace)? {
                None
            } else {
                Some(self.parse_expr()?)
            };
            self.match_token(&OnyxTokenKind::Semi)?;
            return Ok(self.add(NodeKind::Return(value), self.lexer.span_from(start)));
        }

        if self.check(&OnyxTokenKind::If)? {
            return self.parse_if();
        }

        if self.match_token(&OnyxTokenKind::While)? {
            let cond = self.parse_expr()?;
            let body = self.parse_block()?;
            return Ok(self.add(NodeKind::While { cond, body }, self.lexer.span_from(start)));
        }

        if self.match_token(&OnyxTokenKind::For)? {
            return self.parse_for(start);
        }

        if self.match_token(&OnyxTokenKind::Break)? {
            self.match_token(&OnyxTokenKind::Semi)?;
            return Ok(self.add(NodeKind::Break, start));
        }

        if self.match_token(&OnyxTokenKind::Continue)? {
            self.match_token(&OnyxTokenKind::Semi)?;
            return Ok(self.add(NodeKind::Continue, start));
        }

        if self.match_token(&OnyxTokenKind::Defer)? {
            let stmt = self.parse_single_stmt()?;
            return Ok(self.add(NodeKind::Defer(stmt), self.lexer.span_from(start)));
        }

        if self.check(&OnyxTokenKind::LBrace)? {
            return self.parse_block();
        }

        let mut expr = self.parse_expr()?;
        if let Some(op) = self.peek_assign_op()? {
            self.lexer.next_token()?;
            let value = self.parse_expr()?;
            expr = self.add(
                NodeKind::BinaryOp {
                    op,
                    left: expr,
                    right: value,
                },
                self.lexer.span_from(start),
            );
        }
        self.expect(OnyxTokenKind::Semi)?;
        Ok(expr)
    }

    fn parse_if(&mut self) -> CompileResult<NodeId> {
        let start = self.expect(OnyxTokenKind::If)?;
        let cond = self.parse_expr()?;
        let then_block = self.parse_block()?;
        let else_block = if self.match_token(&OnyxTokenKind::Else)? {
            if self.check(&OnyxTokenKind::If)? {
                Some(self.parse_if()?)
            } else {
                Some(self.parse_block()?)
            }
        } else {
            None
        };
        Ok(self.add(
            NodeKind::If {
                cond,
                then_block,
                else_block,
            },
            self.lexer.span_from(start),
        ))
    }

    /// `for i: start .. end [step s] { ... }`, after the `for`
    fn parse_for(&mut self, start: Span) -> CompileResult<NodeId> {
        let (name, name_span) = self.expect_identifier()?;
        self.expect(OnyxTokenKind::Colon)?;
        let from = self.parse_expr()?;
        self.expect(OnyxTokenKind::DotDot)?;
        let end = self.parse_expr()?;
        let step = if self.match_token(&OnyxTokenKind::Step)? {
            Some(self.parse_expr()?)
        } else {
            None
        };
        let body = self.parse_block()?;

        let var = self.add(
            NodeKind::Local {
                name,
                attrs: LocalAttrs::default(),
            },
            name_span,
        );
        Ok(self.add(
            NodeKind::For {
                var,
                start: from,
                end,
                step,
                body,
            },
            self.lexer.span_from(start),
        ))
    }

    fn peek_assign_op(&mut self) -> CompileResult<Option<BinaryOp>> {
        Ok(match &self.lexer.peek()?.kind {
            OnyxTokenKind::Eq => Some(BinaryOp::Assign),
            OnyxTokenKind::PlusEq => Some(BinaryOp::AssignAdd),
            OnyxTokenKind::MinusEq => Some(BinaryOp::AssignMinus),
            OnyxTokenKind::StarEq => Some(BinaryOp::AssignMultiply),
            OnyxTokenKind::SlashEq => Some(BinaryOp::AssignDivide),
            OnyxTokenKind::PercentEq => Some(BinaryOp::AssignModulus),
            OnyxTokenKind::AmpEq => Some(BinaryOp::AssignAnd),
            OnyxTokenKind::PipeEq => Some(BinaryOp::AssignOr),
            OnyxTokenKind::CaretEq => Some(BinaryOp::AssignXor),
            OnyxTokenKind::ShlEq => Some(BinaryOp::AssignShl),
            OnyxTokenKind::ShrEq => Some(BinaryOp::AssignShr),
            OnyxTokenKind::SarEq => Some(BinaryOp::AssignSar),
            _ => None,
        })
    }

    // ==================== Expressions ====================

    pub(super) fn parse_expr(&mut self) -> CompileResult<NodeId> {
        self.parse_expr_with_precedence(1)
    }

    fn parse_expr_with_precedence(&mut self, min_prec: u8) -> CompileResult<NodeId> {
        let start = self.peek_span()?;
        let mut left = self.parse_unary_expr()?;

        while let Some(op) = self.peek_binary_op()? {
            let prec = op.precedence();
            if prec < min_prec {
                break;
            }

            self.lexer.next_token()?; // consume operator
            let right = self.parse_expr_with_precedence(prec + 1)?;
            left = self.add(NodeKind::BinaryOp { op, left, right }, self.lexer.span_from(start));
        }

        Ok(left)
    }

    fn peek_binary_op(&mut self) -> CompileResult<Option<BinaryOp>> {
        Ok(match &self.lexer.peek()?.kind {
            OnyxTokenKind::Plus => Some(BinaryOp::Add),
            OnyxTokenKind::Minus => Some(BinaryOp::Minus),
            OnyxTokenKind::Star => Some(BinaryOp::Multiply),
            OnyxTokenKind::Slash => Some(BinaryOp::Divide),
            OnyxTokenKind::Percent => Some(BinaryOp::Modulus),
            OnyxTokenKind::EqEq => Some(BinaryOp::Equal),
            OnyxTokenKind::NotEq => Some(BinaryOp::NotEqual),
            OnyxTokenKind::Lt => Some(BinaryOp::Less),
            OnyxTokenKind::LtEq => Some(BinaryOp::LessEqual),
            OnyxTokenKind::Gt => Some(BinaryOp::Greater),
            OnyxTokenKind::GtEq => Some(BinaryOp::GreaterEqual),
            OnyxTokenKind::Amp => Some(BinaryOp::And),
            OnyxTokenKind::Pipe => Some(BinaryOp::Or),
            OnyxTokenKind::Caret => Some(BinaryOp::Xor),
            OnyxTokenKind::Shl => Some(BinaryOp::Shl),
            OnyxTokenKind::Shr => Some(BinaryOp::Shr),
            OnyxTokenKind::Sar => Some(BinaryOp::Sar),
            OnyxTokenKind::AmpAmp => Some(BinaryOp::BoolAnd),
            OnyxTokenKind::PipePipe => Some(BinaryOp::BoolOr),
            OnyxTokenKind::PipeGt => Some(BinaryOp::Pipe),
            _ => None,
        })
    }

    fn parse_unary_expr(&mut self) -> CompileResult<NodeId> {
        let start = self.peek_span()?;

        if self.match_token(&OnyxTokenKind::Minus)? {
            let expr = self.parse_unary_expr()?;
            return Ok(self.add(
                NodeKind::UnaryOp {
                    op: UnaryOp::Negate,
                    expr,
                },
                self.lexer.span_from(start),
            ));
        }
        if self.match_token(&OnyxTokenKind::Bang)? {
            let expr = self.parse_unary_expr()?;
            return Ok(self.add(
                NodeKind::UnaryOp { op: UnaryOp::Not, expr },
                self.lexer.span_from(start),
            ));
        }
        if self.match_token(&OnyxTokenKind::Caret)? {
            let expr = self.parse_unary_expr()?;
            return Ok(self.add(NodeKind::AddressOf(expr), self.lexer.span_from(start)));
        }
        if self.match_token(&OnyxTokenKind::Star)? {
            let expr = self.parse_unary_expr()?;
            return Ok(self.add(NodeKind::Dereference(expr), self.lexer.span_from(start)));
        }
        if self.match_token(&OnyxTokenKind::Cast)? {
            self.expect(OnyxTokenKind::LParen)?;
            let target = self.parse_type()?;
            self.expect(OnyxTokenKind::RParen)?;
            let expr = self.parse_unary_expr()?;
            return Ok(self.program.ast.add_typed(
                NodeKind::UnaryOp {
                    op: UnaryOp::Cast,
                    expr,
                },
                self.lexer.span_from(start),
                Some(target),
            ));
        }

        self.parse_postfix_expr()
    }

    fn parse_postfix_expr(&mut self) -> CompileResult<NodeId> {
        let start = self.peek_span()?;
        let mut expr = self.parse_primary_expr()?;

        loop {
            if self.check(&OnyxTokenKind::Dot)? {
                if self.lexer.check_lookahead(&OnyxTokenKind::LBrace)? {
                    expr = self.parse_struct_literal(expr, start)?;
                    continue;
                }
                self.lexer.next_token()?;
                let (field, _) = self.expect_identifier()?;
                expr = self.add(
                    NodeKind::FieldAccess {
                        expr,
                        field,
                        offset: None,
                    },
                    self.lexer.span_from(start),
                );
            } else if self.match_token(&OnyxTokenKind::LBracket)? {
                let index = self.parse_expr()?;
                self.expect(OnyxTokenKind::RBracket)?;
                expr = self.add(
                    NodeKind::ArrayAccess {
                        addr: expr,
                        index,
                        elem_size: None,
                    },
                    self.lexer.span_from(start),
                );
            } else if self.match_token(&OnyxTokenKind::LParen)? {
                let mut args = Vec::new();
                while !self.check(&OnyxTokenKind::RParen)? {
                    args.push(self.parse_expr()?);
                    if !self.match_token(&OnyxTokenKind::Comma)? {
                        break;
                    }
                }
                self.expect(OnyxTokenKind::RParen)?;
                expr = self.add(NodeKind::Call { callee: expr, args }, self.lexer.span_from(start));
            } else {
                return Ok(expr);
            }
        }
    }

    /// `T.{ a, b }` where `T` was already parsed as an expression
    fn parse_struct_literal(&mut self, target: NodeId, start: Span) -> CompileResult<NodeId> {
        let of = self.struct_literal_type(target)?;
        self.expect(OnyxTokenKind::Dot)?;
        self.expect(OnyxTokenKind::LBrace)?;
        let mut values = Vec::new();
        while !self.check(&OnyxTokenKind::RBrace)? {
            values.push(self.parse_expr()?);
            if !self.match_token(&OnyxTokenKind::Comma)? {
                break;
            }
        }
        self.expect(OnyxTokenKind::RBrace)?;
        Ok(self.add(NodeKind::StructLiteral { of, values }, self.lexer.span_from(start)))
    }

    /// Reinterpret `Name` or `package.Name` as a type expression
    fn struct_literal_type(&mut self, target: NodeId) -> CompileResult<TypeExprId> {
        let node = self.program.ast.node(target);
        let span = node.span;
        let kind = match &node.kind {
            NodeKind::Symbol(name) => TypeExprKind::Symbol(*name),
            NodeKind::FieldAccess { expr, field, .. } => match self.program.ast.node(*expr).kind {
                NodeKind::Symbol(package) => TypeExprKind::Qualified {
                    package,
                    name: *field,
                },
                _ => return Err(CompileError::parser("expected a struct type before '.{'", span)),
            },
            _ => return Err(CompileError::parser("expected a struct type before '.{'", span)),
        };
        Ok(self.add_type(kind, span))
    }

    fn parse_primary_expr(&mut self) -> CompileResult<NodeId> {
        let token = self.lexer.next_token()?;
        let span = token.span;

        match token.kind {
            OnyxTokenKind::IntLiteral(text) => {
                let value = text
                    .replace('_', "")
                    .parse::<i64>()
                    .map_err(|_| CompileError::parser(format!("integer literal '{}' out of range", text), span))?;
                Ok(self.add(NodeKind::NumLit(NumLit::Int(value)), span))
            }
            OnyxTokenKind::HexLiteral(text) => {
                let value = u64::from_str_radix(&text[2..].replace('_', ""), 16)
                    .map_err(|_| CompileError::parser(format!("integer literal '{}' out of range", text), span))?;
                Ok(self.add(NodeKind::NumLit(NumLit::Int(value as i64)), span))
            }
            OnyxTokenKind::FloatLiteral(text) => {
                let single = text.ends_with('f');
                let digits = text.trim_end_matches('f').replace('_', "");
                let value = digits
                    .parse::<f64>()
                    .map_err(|_| CompileError::parser(format!("invalid float literal '{}'", text), span))?;
                let type_node = single.then(|| self.program.basic_type(BasicKind::F32));
                Ok(self
                    .program
                    .ast
                    .add_typed(NodeKind::NumLit(NumLit::Float(value)), span, type_node))
            }
            OnyxTokenKind::True => Ok(self.bool_literal(true, span)),
            OnyxTokenKind::False => Ok(self.bool_literal(false, span)),
            OnyxTokenKind::StringLiteral(raw) => {
                let data = super::unescape(&raw[1..raw.len() - 1], span)?.into_bytes();
                let node = self.add(NodeKind::StrLit { data, addr: None }, span);
                self.add_entity(EntityKind::StringLiteral(node));
                Ok(node)
            }
            OnyxTokenKind::Identifier(name) => {
                let name = self.program.intern(&name);
                Ok(self.add(NodeKind::Symbol(name), span))
            }
            OnyxTokenKind::LParen => {
                let expr = self.parse_expr()?;
                self.expect(OnyxTokenKind::RParen)?;
                Ok(expr)
            }
            OnyxTokenKind::Sizeof => {
                let of = self.parse_type()?;
                Ok(self.add(NodeKind::SizeOf { of, size: None }, self.lexer.span_from(span)))
            }
            OnyxTokenKind::Alignof => {
                let of = self.parse_type()?;
                Ok(self.add(NodeKind::AlignOf { of, alignment: None }, self.lexer.span_from(span)))
            }
            OnyxTokenKind::Directive(ref name) if name == "file_contents" => {
                let (path, _) = self.expect_string()?;
                let node = self.add(
                    NodeKind::FileContents {
                        path,
                        addr: None,
                        size: None,
                    },
                    self.lexer.span_from(span),
                );
                self.add_entity(EntityKind::FileContents(node));
                Ok(node)
            }
            other => Err(CompileError::parser(format!("expected expression, found {}", other), span)),
        }
    }

    /// `true` and `false` are integer literals typed as bool
    fn bool_literal(&mut self, value: bool, span: Span) -> NodeId {
        let bool_type = self.program.basic_type(BasicKind::Bool);
        self.program
            .ast
            .add_typed(NodeKind::NumLit(NumLit::Int(value as i64)), span, Some(bool_type))
    }
}

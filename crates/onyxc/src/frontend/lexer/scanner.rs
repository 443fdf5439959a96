//! Onyx lexer implementation using logos

use super::token::{OnyxToken, OnyxTokenKind};
use crate::common::{CompileError, CompileResult, FileId, Span};
use logos::Logos;

/// Lexer for Onyx source code
pub struct OnyxLexer<'a> {
    inner: logos::Lexer<'a, OnyxTokenKind>,
    file: FileId,
    /// Buffer for peeked tokens (supports 2-token lookahead)
    peeked: Vec<OnyxToken>,
    at_eof: bool,
    /// End offset of the last consumed token
    last_end: usize,
}

impl<'a> OnyxLexer<'a> {
    pub fn new(source: &'a str, file: FileId) -> Self {
        Self {
            inner: OnyxTokenKind::lexer(source),
            file,
            peeked: Vec::new(),
            at_eof: false,
            last_end: 0,
        }
    }

    pub fn next_token(&mut self) -> CompileResult<OnyxToken> {
        let token = if self.peeked.is_empty() {
            self.scan_token()?
        } else {
            self.peeked.remove(0)
        };
        self.last_end = token.span.end;
        Ok(token)
    }

    /// Span from `start` to the end of the last consumed token
    pub fn span_from(&self, start: Span) -> Span {
        Span::in_file(self.file, start.start, self.last_end.max(start.start))
    }

    fn scan_token(&mut self) -> CompileResult<OnyxToken> {
        if self.at_eof {
            let len = self.inner.source().len();
            return Ok(OnyxToken::new(OnyxTokenKind::Eof, Span::in_file(self.file, len, len)));
        }

        match self.inner.next() {
            Some(Ok(kind)) => {
                let span = self.inner.span();
                Ok(OnyxToken::new(kind, Span::in_file(self.file, span.start, span.end)))
            }
            Some(Err(())) => {
                let span = self.inner.span();
                Err(CompileError::lexer(
                    format!("unexpected character '{}'", self.inner.slice()),
                    Span::in_file(self.file, span.start, span.end),
                ))
            }
            None => {
                self.at_eof = true;
                let len = self.inner.source().len();
                Ok(OnyxToken::new(OnyxTokenKind::Eof, Span::in_file(self.file, len, len)))
            }
        }
    }

    pub fn peek(&mut self) -> CompileResult<&OnyxToken> {
        self.peek_at(0)
    }

    /// Peek at the token at offset (0 = next, 1 = after next, etc.)
    pub fn peek_at(&mut self, offset: usize) -> CompileResult<&OnyxToken> {
        while self.peeked.len() <= offset {
            let token = self.scan_token()?;
            self.peeked.push(token);
        }
        Ok(&self.peeked[offset])
    }

    /// Check if the next token matches the expected kind
    pub fn check(&mut self, expected: &OnyxTokenKind) -> CompileResult<bool> {
        Ok(std::mem::discriminant(&self.peek()?.kind) == std::mem::discriminant(expected))
    }

    /// Same as `check`, one token further
    pub fn check_lookahead(&mut self, expected: &OnyxTokenKind) -> CompileResult<bool> {
        let token = self.peek_at(1)?;
        Ok(std::mem::discriminant(&token.kind) == std::mem::discriminant(expected))
    }

    /// Consume the next token if it matches, return true if consumed
    pub fn match_token(&mut self, expected: &OnyxTokenKind) -> CompileResult<bool> {
        if self.check(expected)? {
            self.next_token()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Expect a specific token kind, error if not found
    pub fn expect(&mut self, expected: OnyxTokenKind) -> CompileResult<OnyxToken> {
        let token = self.next_token()?;
        if std::mem::discriminant(&token.kind) == std::mem::discriminant(&expected) {
            Ok(token)
        } else {
            Err(CompileError::parser(
                format!("expected {}, found {}", expected, token.kind),
                token.span,
            ))
        }
    }

    /// Tokenize the entire source and return all tokens
    pub fn tokenize_all(mut self) -> CompileResult<Vec<OnyxToken>> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            let is_eof = matches!(token.kind, OnyxTokenKind::Eof);
            tokens.push(token);
            if is_eof {
                break;
            }
        }
        Ok(tokens)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<OnyxTokenKind> {
        OnyxLexer::new(source, 0)
            .tokenize_all()
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn test_keywords() {
        let mut lexer = OnyxLexer::new("package use proc struct enum global for step defer", 0);

        assert!(matches!(lexer.next_token().unwrap().kind, OnyxTokenKind::Package));
        assert!(matches!(lexer.next_token().unwrap().kind, OnyxTokenKind::Use));
        assert!(matches!(lexer.next_token().unwrap().kind, OnyxTokenKind::Proc));
        assert!(matches!(lexer.next_token().unwrap().kind, OnyxTokenKind::Struct));
        assert!(matches!(lexer.next_token().unwrap().kind, OnyxTokenKind::Enum));
        assert!(matches!(lexer.next_token().unwrap().kind, OnyxTokenKind::Global));
        assert!(matches!(lexer.next_token().unwrap().kind, OnyxTokenKind::For));
        assert!(matches!(lexer.next_token().unwrap().kind, OnyxTokenKind::Step));
        assert!(matches!(lexer.next_token().unwrap().kind, OnyxTokenKind::Defer));
    }

    #[test]
    fn test_directives() {
        let tokens = kinds("#foreign #include_file #type");
        assert!(matches!(&tokens[0], OnyxTokenKind::Directive(s) if s == "foreign"));
        assert!(matches!(&tokens[1], OnyxTokenKind::Directive(s) if s == "include_file"));
        assert!(matches!(&tokens[2], OnyxTokenKind::Directive(s) if s == "type"));
    }

    #[test]
    fn test_number_literals() {
        let tokens = kinds("42 0xFF 1.5 2.0f 1..5");
        assert!(matches!(&tokens[0], OnyxTokenKind::IntLiteral(s) if s == "42"));
        assert!(matches!(&tokens[1], OnyxTokenKind::HexLiteral(s) if s == "0xFF"));
        assert!(matches!(&tokens[2], OnyxTokenKind::FloatLiteral(s) if s == "1.5"));
        assert!(matches!(&tokens[3], OnyxTokenKind::FloatLiteral(s) if s == "2.0f"));
        assert!(matches!(&tokens[4], OnyxTokenKind::IntLiteral(s) if s == "1"));
        assert!(matches!(tokens[5], OnyxTokenKind::DotDot));
        assert!(matches!(&tokens[6], OnyxTokenKind::IntLiteral(s) if s == "5"));
    }

    #[test]
    fn test_binding_operators() {
        let tokens = kinds("x :: y := z : ---");
        assert!(matches!(tokens[1], OnyxTokenKind::ColonColon));
        assert!(matches!(tokens[3], OnyxTokenKind::ColonEq));
        assert!(matches!(tokens[5], OnyxTokenKind::Colon));
        assert!(matches!(tokens[6], OnyxTokenKind::TripleDash));
    }

    #[test]
    fn test_operators() {
        let tokens = kinds("|> >>> >>>= >> << -> ^ ..");
        assert!(matches!(tokens[0], OnyxTokenKind::PipeGt));
        assert!(matches!(tokens[1], OnyxTokenKind::Sar));
        assert!(matches!(tokens[2], OnyxTokenKind::SarEq));
        assert!(matches!(tokens[3], OnyxTokenKind::Shr));
        assert!(matches!(tokens[4], OnyxTokenKind::Shl));
        assert!(matches!(tokens[5], OnyxTokenKind::Arrow));
        assert!(matches!(tokens[6], OnyxTokenKind::Caret));
        assert!(matches!(tokens[7], OnyxTokenKind::DotDot));
    }

    #[test]
    fn test_comments_and_spans() {
        let tokens = OnyxLexer::new("main // line\n/* block */ ::", 3).tokenize_all().unwrap();
        assert!(matches!(&tokens[0].kind, OnyxTokenKind::Identifier(s) if s == "main"));
        assert!(matches!(tokens[1].kind, OnyxTokenKind::ColonColon));
        assert_eq!(tokens[1].span, Span::in_file(3, 25, 27));
        assert!(matches!(tokens[2].kind, OnyxTokenKind::Eof));
    }

    #[test]
    fn test_unexpected_character() {
        let mut lexer = OnyxLexer::new("@", 0);
        assert!(matches!(lexer.next_token(), Err(CompileError::Lexer { .. })));
    }

    #[test]
    fn test_lookahead() {
        let mut lexer = OnyxLexer::new("a : i32", 0);
        assert!(lexer.check_lookahead(&OnyxTokenKind::Colon).unwrap());
        assert!(lexer.check(&OnyxTokenKind::Identifier(String::new())).unwrap());
        assert!(!lexer.match_token(&OnyxTokenKind::Colon).unwrap());
        assert!(lexer.expect(OnyxTokenKind::Identifier(String::new())).is_ok());
        assert!(lexer.match_token(&OnyxTokenKind::Colon).unwrap());
        let start = lexer.peek().unwrap().span;
        lexer.next_token().unwrap();
        assert_eq!(lexer.span_from(start), Span::in_file(0, 4, 7));
    }
}

//! Onyx token definitions using logos

use crate::common::Span;
use logos::Logos;
use std::fmt;

/// A token with its kind and source location
#[derive(Debug, Clone)]
pub struct OnyxToken {
    pub kind: OnyxTokenKind,
    pub span: Span,
}

impl OnyxToken {
    pub fn new(kind: OnyxTokenKind, span: Span) -> Self {
        Self { kind, span }
    }
}

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\n\r\f]+")]
#[logos(skip r"//[^\n]*")]
#[logos(skip r"/\*([^*]|\*[^/])*\*/")]
pub enum OnyxTokenKind {
    // Keywords - Declarations
    #[token("package")]
    Package,
    #[token("use")]
    Use,
    #[token("as")]
    As,
    #[token("proc")]
    Proc,
    #[token("struct")]
    Struct,
    #[token("enum")]
    Enum,
    #[token("global")]
    Global,

    // Keywords - Control Flow
    #[token("if")]
    If,
    #[token("else")]
    Else,
    #[token("while")]
    While,
    #[token("for")]
    For,
    #[token("step")]
    Step,
    #[token("break")]
    Break,
    #[token("continue")]
    Continue,
    #[token("return")]
    Return,
    #[token("defer")]
    Defer,

    // Keywords - Expressions
    #[token("cast")]
    Cast,
    #[token("sizeof")]
    Sizeof,
    #[token("alignof")]
    Alignof,
    #[token("true")]
    True,
    #[token("false")]
    False,

    /// `#name`, without the hash
    #[regex(r"#[a-z_]+", |lex| lex.slice()[1..].to_string())]
    Directive(String),

    #[regex(r"0x[0-9a-fA-F][0-9a-fA-F_]*", priority = 3, callback = |lex| lex.slice().to_string())]
    HexLiteral(String),
    #[regex(r"[0-9][0-9_]*", priority = 2, callback = |lex| lex.slice().to_string())]
    IntLiteral(String),
    /// Optional `f` suffix makes it an f32
    #[regex(r"[0-9][0-9_]*\.[0-9][0-9_]*([eE][+-]?[0-9_]+)?f?", priority = 3, callback = |lex| lex.slice().to_string())]
    FloatLiteral(String),

    /// Includes the quotes; escapes are not processed
    #[regex(r#""([^"\\]|\\.)*""#, callback = |lex| lex.slice().to_string())]
    StringLiteral(String),

    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*", priority = 1, callback = |lex| lex.slice().to_string())]
    Identifier(String),

    // Multi-character operators (order matters - longer first)
    #[token("---")]
    TripleDash,
    #[token("::")]
    ColonColon,
    #[token(":=")]
    ColonEq,
    #[token("->")]
    Arrow,
    #[token("|>")]
    PipeGt,
    #[token("..")]
    DotDot,
    #[token(">>>=")]
    SarEq,
    #[token("<<=")]
    ShlEq,
    #[token(">>=")]
    ShrEq,
    #[token(">>>")]
    Sar,
    #[token("<<")]
    Shl,
    #[token(">>")]
    Shr,
    #[token("<=")]
    LtEq,
    #[token(">=")]
    GtEq,
    #[token("==")]
    EqEq,
    #[token("!=")]
    NotEq,
    #[token("&&")]
    AmpAmp,
    #[token("||")]
    PipePipe,
    #[token("+=")]
    PlusEq,
    #[token("-=")]
    MinusEq,
    #[token("*=")]
    StarEq,
    #[token("/=")]
    SlashEq,
    #[token("%=")]
    PercentEq,
    #[token("&=")]
    AmpEq,
    #[token("|=")]
    PipeEq,
    #[token("^=")]
    CaretEq,

    // Single-character operators
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("%")]
    Percent,
    #[token("&")]
    Amp,
    #[token("|")]
    Pipe,
    #[token("^")]
    Caret,
    #[token("!")]
    Bang,
    #[token("=")]
    Eq,
    #[token("<")]
    Lt,
    #[token(">")]
    Gt,

    // Delimiters
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,

    // Punctuation
    #[token(";")]
    Semi,
    #[token(",")]
    Comma,
    #[token(":")]
    Colon,
    #[token(".")]
    Dot,

    // Special
    Eof,
}

impl fmt::Display for OnyxTokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            // Keywords
            OnyxTokenKind::Package => write!(f, "package"),
            OnyxTokenKind::Use => write!(f, "use"),
            OnyxTokenKind::As => write!(f, "as"),
            OnyxTokenKind::Proc => write!(f, "proc"),
            OnyxTokenKind::Struct => write!(f, "struct"),
            OnyxTokenKind::Enum => write!(f, "enum"),
            OnyxTokenKind::Global => write!(f, "global"),
            OnyxTokenKind::If => write!(f, "if"),
            OnyxTokenKind::Else => write!(f, "else"),
            OnyxTokenKind::While => write!(f, "while"),
            OnyxTokenKind::For => write!(f, "for"),
            OnyxTokenKind::Step => write!(f, "step"),
            OnyxTokenKind::Break => write!(f, "break"),
            OnyxTokenKind::Continue => write!(f, "continue"),
            OnyxTokenKind::Return => write!(f, "return"),
            OnyxTokenKind::Defer => write!(f, "defer"),
            OnyxTokenKind::Cast => write!(f, "cast"),
            OnyxTokenKind::Sizeof => write!(f, "sizeof"),
            OnyxTokenKind::Alignof => write!(f, "alignof"),
            OnyxTokenKind::True => write!(f, "true"),
            OnyxTokenKind::False => write!(f, "false"),

            // Literals
            OnyxTokenKind::Directive(s) => write!(f, "#{}", s),
            OnyxTokenKind::HexLiteral(s) => write!(f, "{}", s),
            OnyxTokenKind::IntLiteral(s) => write!(f, "{}", s),
            OnyxTokenKind::FloatLiteral(s) => write!(f, "{}", s),
            OnyxTokenKind::StringLiteral(s) => write!(f, "{}", s),
            OnyxTokenKind::Identifier(s) => write!(f, "{}", s),

            // Operators
            OnyxTokenKind::TripleDash => write!(f, "---"),
            OnyxTokenKind::ColonColon => write!(f, "::"),
            OnyxTokenKind::ColonEq => write!(f, ":="),
            OnyxTokenKind::Arrow => write!(f, "->"),
            OnyxTokenKind::PipeGt => write!(f, "|>"),
            OnyxTokenKind::DotDot => write!(f, ".."),
            OnyxTokenKind::SarEq => write!(f, ">>>="),
            OnyxTokenKind::ShlEq => write!(f, "<<="),
            OnyxTokenKind::ShrEq => write!(f, ">>="),
            OnyxTokenKind::Sar => write!(f, ">>>"),
            OnyxTokenKind::Shl => write!(f, "<<"),
            OnyxTokenKind::Shr => write!(f, ">>"),
            OnyxTokenKind::LtEq => write!(f, "<="),
            OnyxTokenKind::GtEq => write!(f, ">="),
            OnyxTokenKind::EqEq => write!(f, "=="),
            OnyxTokenKind::NotEq => write!(f, "!="),
            OnyxTokenKind::AmpAmp => write!(f, "&&"),
            OnyxTokenKind::PipePipe => write!(f, "||"),
            OnyxTokenKind::PlusEq => write!(f, "+="),
            OnyxTokenKind::MinusEq => write!(f, "-="),
            OnyxTokenKind::StarEq => write!(f, "*="),
            OnyxTokenKind::SlashEq => write!(f, "/="),
            OnyxTokenKind::PercentEq => write!(f, "%="),
            OnyxTokenKind::AmpEq => write!(f, "&="),
            OnyxTokenKind::PipeEq => write!(f, "|="),
            OnyxTokenKind::CaretEq => write!(f, "^="),
            OnyxTokenKind::Plus => write!(f, "+"),
            OnyxTokenKind::Minus => write!(f, "-"),
            OnyxTokenKind::Star => write!(f, "*"),
            OnyxTokenKind::Slash => write!(f, "/"),
            OnyxTokenKind::Percent => write!(f, "%"),
            OnyxTokenKind::Amp => write!(f, "&"),
            OnyxTokenKind::Pipe => write!(f, "|"),
            OnyxTokenKind::Caret => write!(f, "^"),
            OnyxTokenKind::Bang => write!(f, "!"),
            OnyxTokenKind::Eq => write!(f, "="),
            OnyxTokenKind::Lt => write!(f, "<"),
            OnyxTokenKind::Gt => write!(f, ">"),

            // Delimiters
            OnyxTokenKind::LParen => write!(f, "("),
            OnyxTokenKind::RParen => write!(f, ")"),
            OnyxTokenKind::LBrace => write!(f, "{{"),
            OnyxTokenKind::RBrace => write!(f, "}}"),
            OnyxTokenKind::LBracket => write!(f, "["),
            OnyxTokenKind::RBracket => write!(f, "]"),

            // Punctuation
            OnyxTokenKind::Semi => write!(f, ";"),
            OnyxTokenKind::Comma => write!(f, ","),
            OnyxTokenKind::Colon => write!(f, ":"),
            OnyxTokenKind::Dot => write!(f, "."),

            OnyxTokenKind::Eof => write!(f, "EOF"),
        }
    }
}

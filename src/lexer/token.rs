use std::fmt::Display;

use num_bigint::BigInt;

use crate::interner::{self, Symbol};

/// Tokens of the Fern language, including the synthetic layout markers
/// injected by the punctuator.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Keywords
    Let,
    Mut,
    Pub,
    Type,
    Return,
    Mod,
    Struct,
    Enum,
    Class,
    Instance,
    If,
    Elif,
    Else,
    Match,

    // Fixed punctuation
    Equals,      // =
    Colon,       // :
    Comma,       // ,
    Dot,         // .
    DotDot,      // ..
    Tilde,       // ~
    LParen,      // (
    RParen,      // )
    LBracket,    // [
    RBracket,    // ]
    LBrace,      // {
    RBrace,      // }
    RArrow,      // ->
    RArrowAlt,   // =>

    // Synthetic layout tokens
    BlockStart,
    BlockEnd,
    LineFoldEnd,

    /// Lowercase-starting identifier: foo, _tmp
    Ident(Symbol),
    /// Uppercase-starting identifier: Foo, Maybe
    IdentAlt(Symbol),
    /// Custom operator run: +, ==, >>=
    Operator(Symbol),
    /// Operator run ending in `=` that is not a comparison: +=, *=
    Assignment(Symbol),

    /// Decimal integer literal
    Integer(BigInt),
    /// Double-quoted string literal (escapes already decoded)
    Str(String),

    /// A byte the scanner could not place in any token
    Invalid(char),

    /// End of input; the punctuator emits exactly one
    EndOfFile,
}

impl Token {
    /// Keywords that open an indented block for the fold they appear in.
    pub fn opens_block(&self) -> bool {
        matches!(
            self,
            Token::Let
                | Token::Class
                | Token::Instance
                | Token::If
                | Token::Elif
                | Token::Else
                | Token::Match
                | Token::Struct
                | Token::Enum
        )
    }

    /// Human-readable name for "expected one of ..." diagnostics.
    pub fn describe(&self) -> &'static str {
        match self {
            Token::Let => "'let'",
            Token::Mut => "'mut'",
            Token::Pub => "'pub'",
            Token::Type => "'type'",
            Token::Return => "'return'",
            Token::Mod => "'mod'",
            Token::Struct => "'struct'",
            Token::Enum => "'enum'",
            Token::Class => "'class'",
            Token::Instance => "'instance'",
            Token::If => "'if'",
            Token::Elif => "'elif'",
            Token::Else => "'else'",
            Token::Match => "'match'",
            Token::Equals => "'='",
            Token::Colon => "':'",
            Token::Comma => "','",
            Token::Dot => "'.'",
            Token::DotDot => "'..'",
            Token::Tilde => "'~'",
            Token::LParen => "'('",
            Token::RParen => "')'",
            Token::LBracket => "'['",
            Token::RBracket => "']'",
            Token::LBrace => "'{'",
            Token::RBrace => "'}'",
            Token::RArrow => "'->'",
            Token::RArrowAlt => "'=>'",
            Token::BlockStart => "start of an indented block",
            Token::BlockEnd => "end of an indented block",
            Token::LineFoldEnd => "end of a line fold",
            Token::Ident(_) => "an identifier",
            Token::IdentAlt(_) => "an uppercase identifier",
            Token::Operator(_) => "an operator",
            Token::Assignment(_) => "an assignment operator",
            Token::Integer(_) => "an integer literal",
            Token::Str(_) => "a string literal",
            Token::Invalid(_) => "an invalid character",
            Token::EndOfFile => "end of file",
        }
    }
}

impl Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::Ident(sym) | Token::IdentAlt(sym) => {
                write!(f, "{}", interner::resolve(*sym))
            }
            Token::Operator(sym) | Token::Assignment(sym) => {
                write!(f, "{}", interner::resolve(*sym))
            }
            Token::Integer(value) => write!(f, "{}", value),
            Token::Str(text) => write!(f, "{:?}", text),
            Token::Invalid(c) => write!(f, "{:?}", c),
            other => write!(f, "{}", other.describe().trim_matches('\'')),
        }
    }
}

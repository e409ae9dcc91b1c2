use logos::Logos;
use num_bigint::BigInt;

use crate::diagnostics::{Diagnostic, DiagnosticStore};
use crate::interner::{self, Symbol};
use crate::lexer::token::Token;
use crate::text::Span;

/// Raw tokens produced by the logos scanner, before layout processing.
/// Whitespace and `#` line comments are skipped; newlines leave no token
/// because the punctuator derives line structure from the text buffer.
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n]+")]
#[logos(skip r"#[^\n]*")]
pub enum RawToken {
    // Keywords
    #[token("let")]
    Let,
    #[token("mut")]
    Mut,
    #[token("pub")]
    Pub,
    #[token("type")]
    Type,
    #[token("return")]
    Return,
    #[token("mod")]
    Mod,
    #[token("struct")]
    Struct,
    #[token("enum")]
    Enum,
    #[token("class")]
    Class,
    #[token("instance")]
    Instance,
    #[token("if")]
    If,
    #[token("elif")]
    Elif,
    #[token("else")]
    Else,
    #[token("match")]
    Match,

    // Identifiers
    #[regex(r"[a-z_][a-zA-Z0-9_]*", |lex| interner::intern(lex.slice()))]
    Ident(Symbol),
    #[regex(r"[A-Z][a-zA-Z0-9_]*", |lex| interner::intern(lex.slice()))]
    IdentAlt(Symbol),

    // Maximal run of operator characters. Classified into
    // Operator/Assignment during conversion; reserved sequences such as
    // `->` and `=>` win by token priority on equal length.
    #[regex(r"[+\-*/<>=!%^&|?]+", priority = 1, callback = |lex| interner::intern(lex.slice()))]
    Op(Symbol),

    // Decimal integer literal, arbitrary precision
    #[regex(r"[0-9]+", |lex| lex.slice().parse::<BigInt>().ok())]
    Integer(BigInt),

    // Double-quoted string literal with a minimal escape set
    #[regex(r#""([^"\\\n]|\\.)*""#, |lex| {
        let s = lex.slice();
        unescape(&s[1..s.len() - 1])
    })]
    Str(String),

    // Fixed punctuation
    #[token("=")]
    Equals,
    #[token(":")]
    Colon,
    #[token(",")]
    Comma,
    #[token(".")]
    Dot,
    #[token("..")]
    DotDot,
    #[token("~")]
    Tilde,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("->")]
    RArrow,
    #[token("=>")]
    RArrowAlt,
}

/// Decode the escape sequences of a string literal body.
fn unescape(body: &str) -> Option<String> {
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('\\') => out.push('\\'),
            Some('"') => out.push('"'),
            // Unknown escape: keep the character literally
            Some(other) => out.push(other),
            None => break,
        }
    }
    Some(out)
}

impl RawToken {
    fn into_token(self, lexeme: &str) -> Token {
        match self {
            RawToken::Let => Token::Let,
            RawToken::Mut => Token::Mut,
            RawToken::Pub => Token::Pub,
            RawToken::Type => Token::Type,
            RawToken::Return => Token::Return,
            RawToken::Mod => Token::Mod,
            RawToken::Struct => Token::Struct,
            RawToken::Enum => Token::Enum,
            RawToken::Class => Token::Class,
            RawToken::Instance => Token::Instance,
            RawToken::If => Token::If,
            RawToken::Elif => Token::Elif,
            RawToken::Else => Token::Else,
            RawToken::Match => Token::Match,
            RawToken::Ident(sym) => Token::Ident(sym),
            RawToken::IdentAlt(sym) => Token::IdentAlt(sym),
            RawToken::Op(sym) => {
                // A run ending in `=` is an assignment operator unless it
                // is one of the comparison sequences.
                if lexeme.ends_with('=') && !matches!(lexeme, "==" | "<=" | ">=") {
                    Token::Assignment(sym)
                } else {
                    Token::Operator(sym)
                }
            }
            RawToken::Integer(value) => Token::Integer(value),
            RawToken::Str(text) => Token::Str(text),
            RawToken::Equals => Token::Equals,
            RawToken::Colon => Token::Colon,
            RawToken::Comma => Token::Comma,
            RawToken::Dot => Token::Dot,
            RawToken::DotDot => Token::DotDot,
            RawToken::Tilde => Token::Tilde,
            RawToken::LParen => Token::LParen,
            RawToken::RParen => Token::RParen,
            RawToken::LBracket => Token::LBracket,
            RawToken::RBracket => Token::RBracket,
            RawToken::LBrace => Token::LBrace,
            RawToken::RBrace => Token::RBrace,
            RawToken::RArrow => Token::RArrow,
            RawToken::RArrowAlt => Token::RArrowAlt,
        }
    }
}

/// Scan source text into spanned tokens. Bytes that fit no token become
/// `Invalid` tokens with an `InvalidCharacter` diagnostic; scanning never
/// stops early. The `EndOfFile` token is appended by the punctuator.
pub fn scan(text: &str, diags: &mut DiagnosticStore) -> Vec<(Token, Span)> {
    let mut lexer = RawToken::lexer(text);
    let mut tokens = Vec::new();

    while let Some(result) = lexer.next() {
        let span = Span::new(lexer.span().start, lexer.span().end);
        match result {
            Ok(raw) => {
                let token = raw.into_token(&text[span.start..span.end]);
                tokens.push((token, span));
            }
            Err(()) => {
                let ch = text[span.start..].chars().next().unwrap_or('\u{FFFD}');
                diags.push(Diagnostic::InvalidCharacter { span, ch });
                tokens.push((Token::Invalid(ch), span));
            }
        }
    }

    tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan_ok(text: &str) -> Vec<Token> {
        let mut diags = DiagnosticStore::new();
        let tokens = scan(text, &mut diags);
        assert!(diags.is_empty(), "unexpected diagnostics for {:?}", text);
        tokens.into_iter().map(|(t, _)| t).collect()
    }

    #[test]
    fn test_keywords() {
        let tokens = scan_ok("let mut pub return match instance elif");
        assert_eq!(
            tokens,
            vec![
                Token::Let,
                Token::Mut,
                Token::Pub,
                Token::Return,
                Token::Match,
                Token::Instance,
                Token::Elif,
            ]
        );
    }

    #[test]
    fn test_identifiers() {
        let tokens = scan_ok("foo Bar _tmp letter Matches");
        assert!(matches!(tokens[0], Token::Ident(_)));
        assert!(matches!(tokens[1], Token::IdentAlt(_)));
        assert!(matches!(tokens[2], Token::Ident(_)));
        // Keyword prefixes stay identifiers under maximal munch
        assert!(matches!(tokens[3], Token::Ident(_)));
        assert!(matches!(tokens[4], Token::IdentAlt(_)));
    }

    #[test]
    fn test_operator_classification() {
        let tokens = scan_ok("+ == <= >= += *= =");
        assert!(matches!(tokens[0], Token::Operator(_)));
        assert!(matches!(tokens[1], Token::Operator(_)));
        assert!(matches!(tokens[2], Token::Operator(_)));
        assert!(matches!(tokens[3], Token::Operator(_)));
        assert!(matches!(tokens[4], Token::Assignment(_)));
        assert!(matches!(tokens[5], Token::Assignment(_)));
        assert_eq!(tokens[6], Token::Equals);
    }

    #[test]
    fn test_arrows_and_punctuation() {
        let tokens = scan_ok("-> => . .. : ~ ( ) [ ] { }");
        assert_eq!(tokens[0], Token::RArrow);
        assert_eq!(tokens[1], Token::RArrowAlt);
        assert_eq!(tokens[2], Token::Dot);
        assert_eq!(tokens[3], Token::DotDot);
        assert_eq!(tokens[4], Token::Colon);
        assert_eq!(tokens[5], Token::Tilde);
    }

    #[test]
    fn test_integer_literals() {
        let tokens = scan_ok("0 42 340282366920938463463374607431768211456");
        assert_eq!(tokens[0], Token::Integer(BigInt::from(0)));
        assert_eq!(tokens[1], Token::Integer(BigInt::from(42)));
        // Larger than any machine integer
        let huge = "340282366920938463463374607431768211456".parse::<BigInt>().unwrap();
        assert_eq!(tokens[2], Token::Integer(huge));
    }

    #[test]
    fn test_string_escapes() {
        let tokens = scan_ok(r#""a\nb\t\"q\\""#);
        assert_eq!(tokens[0], Token::Str("a\nb\t\"q\\".to_string()));
    }

    #[test]
    fn test_comments_are_skipped() {
        let tokens = scan_ok("foo # rest of line\nbar");
        assert_eq!(tokens.len(), 2);
        assert!(matches!(tokens[0], Token::Ident(_)));
        assert!(matches!(tokens[1], Token::Ident(_)));
    }

    #[test]
    fn test_invalid_character_continues() {
        let mut diags = DiagnosticStore::new();
        let tokens = scan("a @ b", &mut diags);
        assert_eq!(diags.len(), 1);
        assert_eq!(tokens.len(), 3);
        assert_eq!(tokens[1].0, Token::Invalid('@'));
        assert!(matches!(tokens[2].0, Token::Ident(_)));
    }

    #[test]
    fn test_spans_are_sequential() {
        let mut diags = DiagnosticStore::new();
        let source = "let f x = x + 1";
        let tokens = scan(source, &mut diags);
        for pair in tokens.windows(2) {
            assert!(pair[0].1.end <= pair[1].1.start);
        }
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn prop_scan_never_panics(input in "\\PC*") {
                let mut diags = DiagnosticStore::new();
                let _ = scan(&input, &mut diags);
            }

            #[test]
            fn prop_spans_in_bounds(input in "[a-z0-9+*<>=\n\"\\\\]{0,40}") {
                let mut diags = DiagnosticStore::new();
                let tokens = scan(&input, &mut diags);
                for (_, span) in &tokens {
                    prop_assert!(span.start <= span.end);
                    prop_assert!(span.end <= input.len());
                }
            }
        }
    }
}

//! Pattern grammar: binders, literals, constructor applications, nesting.

use crate::cst::{Literal, NodeData, NodeId};
use crate::lexer::Token;
use crate::parser::{Parse, Parser};

impl Parser<'_> {
    /// Full pattern: a constructor may take argument patterns here.
    pub(super) fn parse_pattern(&mut self) -> Parse<NodeId> {
        if let Token::IdentAlt(name) = self.peek() {
            let name = *name;
            let start = self.advance().1;
            let mut args = Vec::new();
            while self.starts_pattern_atom() {
                args.push(self.parse_pattern_atom()?);
            }
            let span = self.span_from(start);
            return Ok(self.tree.alloc(NodeData::NamedPattern { name, args }, span));
        }
        self.parse_pattern_atom()
    }

    /// Atomic pattern: a constructor here takes no arguments.
    pub(super) fn parse_pattern_atom(&mut self) -> Parse<NodeId> {
        match self.peek().clone() {
            Token::Ident(name) => {
                let span = self.advance().1;
                Ok(self.tree.alloc(NodeData::BindPattern(name), span))
            }
            Token::IdentAlt(name) => {
                let span = self.advance().1;
                Ok(self.tree.alloc(
                    NodeData::NamedPattern {
                        name,
                        args: Vec::new(),
                    },
                    span,
                ))
            }
            Token::Integer(value) => {
                let span = self.advance().1;
                Ok(self
                    .tree
                    .alloc(NodeData::LiteralPattern(Literal::Int(value)), span))
            }
            Token::Str(text) => {
                let span = self.advance().1;
                Ok(self
                    .tree
                    .alloc(NodeData::LiteralPattern(Literal::Str(text)), span))
            }
            Token::LParen => {
                let start = self.advance().1;
                let inner = self.parse_pattern()?;
                self.expect(&Token::RParen)?;
                let span = self.span_from(start);
                Ok(self.tree.alloc(NodeData::NestedPattern(inner), span))
            }
            _ => Err(self.unexpected(&[
                "an identifier",
                "an uppercase identifier",
                "an integer literal",
                "a string literal",
                "'('",
            ])),
        }
    }

    pub(super) fn starts_pattern_atom(&self) -> bool {
        matches!(
            self.peek(),
            Token::Ident(_)
                | Token::IdentAlt(_)
                | Token::Integer(_)
                | Token::Str(_)
                | Token::LParen
        )
    }
}

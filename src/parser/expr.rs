//! Expression grammar: Pratt loop for infix operators, prefix operators,
//! juxtaposition for application, and the primary forms.

use crate::cst::{Literal, NodeData, NodeId, QualName};
use crate::lexer::Token;
use crate::parser::{Parse, Parser, Recover};
use crate::text::Span;

impl Parser<'_> {
    pub(super) fn parse_expr(&mut self) -> Parse<NodeId> {
        self.parse_infix_expr(0)
    }

    /// Pratt loop: consume infix operators of at least `min_prec`.
    /// Left-associative operators recurse one level tighter, right-
    /// associative operators at their own precedence.
    fn parse_infix_expr(&mut self, min_prec: u8) -> Parse<NodeId> {
        let mut lhs = self.parse_prefix_expr()?;
        loop {
            let (op, op_span, info) = match self.peek() {
                Token::Operator(sym) => match self.operators.get(*sym) {
                    Some(info) if info.is_infix() && info.precedence >= min_prec => {
                        (*sym, self.peek_span(), info)
                    }
                    _ => break,
                },
                _ => break,
            };
            self.advance();
            let next_min = if info.is_right_assoc() {
                info.precedence
            } else {
                info.precedence + 1
            };
            let rhs = self.parse_infix_expr(next_min)?;
            let span = self.tree.span(lhs).merge(self.tree.span(rhs));
            lhs = self.tree.alloc(
                NodeData::InfixExpr {
                    left: lhs,
                    op,
                    op_span,
                    right: rhs,
                },
                span,
            );
        }
        Ok(lhs)
    }

    fn parse_prefix_expr(&mut self) -> Parse<NodeId> {
        if let Token::Operator(sym) = self.peek() {
            let sym = *sym;
            if self.operators.get(sym).is_some_and(|info| info.is_prefix()) {
                let (_, op_span) = self.advance();
                let operand = self.parse_prefix_expr()?;
                let span = op_span.merge(self.tree.span(operand));
                return Ok(self.tree.alloc(
                    NodeData::PrefixExpr {
                        op: sym,
                        op_span,
                        operand,
                    },
                    span,
                ));
            }
        }
        self.parse_call_expr()
    }

    /// Juxtaposition is application: `f a b`.
    fn parse_call_expr(&mut self) -> Parse<NodeId> {
        let callee = self.parse_primary_expr()?;
        let mut args = Vec::new();
        while self.starts_primary_expr() {
            args.push(self.parse_primary_expr()?);
        }
        if args.is_empty() {
            return Ok(callee);
        }
        let span = self
            .tree
            .span(callee)
            .merge(self.tree.span(*args.last().unwrap()));
        Ok(self.tree.alloc(NodeData::CallExpr { callee, args }, span))
    }

    fn starts_primary_expr(&self) -> bool {
        matches!(
            self.peek(),
            Token::Ident(_)
                | Token::IdentAlt(_)
                | Token::Integer(_)
                | Token::Str(_)
                | Token::LParen
                | Token::LBrace
        )
    }

    fn parse_primary_expr(&mut self) -> Parse<NodeId> {
        let mut expr = match self.peek().clone() {
            Token::Ident(_) | Token::IdentAlt(_) => self.parse_ref_expr()?,
            Token::Integer(value) => {
                let span = self.advance().1;
                self.tree.alloc(NodeData::ConstExpr(Literal::Int(value)), span)
            }
            Token::Str(text) => {
                let span = self.advance().1;
                self.tree.alloc(NodeData::ConstExpr(Literal::Str(text)), span)
            }
            Token::LParen => self.parse_paren_expr()?,
            Token::LBrace => self.parse_record_expr()?,
            Token::Match => self.parse_match_expr()?,
            _ => {
                return Err(self.unexpected(&[
                    "an identifier",
                    "an integer literal",
                    "a string literal",
                    "'('",
                    "'{'",
                    "'match'",
                ]))
            }
        };

        // Member access binds tighter than application
        while self.at(&Token::Dot) && matches!(self.peek_at(1), Token::Ident(_)) {
            self.advance();
            let (field_token, field_span) = self.advance();
            let field = match field_token {
                Token::Ident(sym) => sym,
                _ => unreachable!(),
            };
            let span = self.tree.span(expr).merge(field_span);
            expr = self
                .tree
                .alloc(NodeData::MemberExpr { object: expr, field }, span);
        }
        Ok(expr)
    }

    /// `{ Mod '.' }* (ident | Ident)` — a module-qualified reference.
    fn parse_ref_expr(&mut self) -> Parse<NodeId> {
        let start = self.peek_span();
        let mut modules = Vec::new();
        while let Token::IdentAlt(sym) = self.peek() {
            let sym = *sym;
            if matches!(self.peek_at(1), Token::Dot)
                && matches!(self.peek_at(2), Token::Ident(_) | Token::IdentAlt(_))
            {
                modules.push(sym);
                self.advance();
                self.advance();
            } else {
                break;
            }
        }
        let name = match self.peek() {
            Token::Ident(sym) | Token::IdentAlt(sym) => {
                let sym = *sym;
                self.advance();
                sym
            }
            _ => return Err(self.unexpected(&["an identifier"])),
        };
        let span = self.span_from(start);
        Ok(self
            .tree
            .alloc(NodeData::RefExpr(QualName { modules, name }), span))
    }

    /// `()` unit, `(e)` nesting, `(a, b, ...)` tuple.
    fn parse_paren_expr(&mut self) -> Parse<NodeId> {
        let start = self.expect(&Token::LParen)?;
        if self.at(&Token::RParen) {
            self.advance();
            let span = self.span_from(start);
            return Ok(self.tree.alloc(NodeData::TupleExpr(Vec::new()), span));
        }
        let first = self.parse_expr()?;
        if self.at(&Token::Comma) {
            let mut elements = vec![first];
            while self.eat(&Token::Comma) {
                elements.push(self.parse_expr()?);
            }
            self.expect(&Token::RParen)?;
            let span = self.span_from(start);
            return Ok(self.tree.alloc(NodeData::TupleExpr(elements), span));
        }
        self.expect(&Token::RParen)?;
        let span = self.span_from(start);
        Ok(self.tree.alloc(NodeData::NestedExpr(first), span))
    }

    /// `{ field = expr, ... }`
    fn parse_record_expr(&mut self) -> Parse<NodeId> {
        let start = self.expect(&Token::LBrace)?;
        let mut fields = Vec::new();
        if !self.at(&Token::RBrace) {
            loop {
                let field_start = self.peek_span();
                let name = self.expect_ident()?;
                self.expect(&Token::Equals)?;
                let value = self.parse_expr()?;
                let field_span = self.span_from(field_start);
                fields.push(
                    self.tree
                        .alloc(NodeData::RecordExprField { name, value }, field_span),
                );
                if !self.eat(&Token::Comma) {
                    break;
                }
            }
        }
        self.expect(&Token::RBrace)?;
        let span = self.span_from(start);
        Ok(self.tree.alloc(NodeData::RecordExpr(fields), span))
    }

    /// `match expr BlockStart { pattern => expr LineFoldEnd } BlockEnd`
    fn parse_match_expr(&mut self) -> Parse<NodeId> {
        let start = self.expect(&Token::Match)?;
        let scrutinee = self.parse_expr()?;
        self.expect(&Token::BlockStart)?;
        let mut cases = Vec::new();
        while !self.at(&Token::BlockEnd) && !self.at(&Token::EndOfFile) {
            match self.parse_match_case() {
                Ok(case) => cases.push(case),
                Err(Recover) => {
                    self.recover();
                }
            }
        }
        self.expect(&Token::BlockEnd)?;
        let span = self.span_from(start);
        Ok(self
            .tree
            .alloc(NodeData::MatchExpr { scrutinee, cases }, span))
    }

    fn parse_match_case(&mut self) -> Parse<NodeId> {
        let start = self.peek_span();
        let pattern = self.parse_pattern()?;
        self.expect(&Token::RArrowAlt)?;
        let value = self.parse_expr()?;
        let span: Span = self.span_from(start);
        self.expect(&Token::LineFoldEnd)?;
        Ok(self.tree.alloc(NodeData::MatchCase { pattern, value }, span))
    }
}

//! Recursive-descent parser over the punctuated token stream.
//!
//! Expressions use a Pratt loop driven by the operator table; everything
//! else is straight descent with single-token dispatch. Parse errors push
//! an `UnexpectedToken` diagnostic, leave an `Error` sentinel node in the
//! tree, and resynchronize to the next line-fold or block boundary.

mod expr;
mod pat;
mod ty;

use std::collections::HashMap;

use crate::cst::{LetBody, NodeData, NodeId, Tree};
use crate::diagnostics::{Diagnostic, DiagnosticStore};
use crate::interner::{self, Symbol};
use crate::lexer::Token;
use crate::text::Span;

pub const PREFIX: u8 = 1 << 0;
pub const SUFFIX: u8 = 1 << 1;
pub const INFIX_LEFT: u8 = 1 << 2;
pub const INFIX_RIGHT: u8 = 1 << 3;

/// Fixity and precedence of one operator symbol.
#[derive(Debug, Clone, Copy)]
pub struct OperatorInfo {
    pub precedence: u8,
    pub flags: u8,
}

impl OperatorInfo {
    pub fn is_prefix(&self) -> bool {
        self.flags & PREFIX != 0
    }

    pub fn is_suffix(&self) -> bool {
        self.flags & SUFFIX != 0
    }

    pub fn is_infix(&self) -> bool {
        self.flags & (INFIX_LEFT | INFIX_RIGHT) != 0
    }

    pub fn is_right_assoc(&self) -> bool {
        self.flags & INFIX_RIGHT != 0
    }
}

/// Table of known operators, keyed by symbol text. Starts from the
/// built-in set and stays extensible for user declarations.
#[derive(Debug, Clone)]
pub struct OperatorTable {
    mapping: HashMap<Symbol, OperatorInfo>,
}

impl OperatorTable {
    pub fn empty() -> Self {
        Self {
            mapping: HashMap::new(),
        }
    }

    pub fn add(&mut self, name: &str, flags: u8, precedence: u8) {
        self.mapping
            .insert(interner::intern(name), OperatorInfo { precedence, flags });
    }

    pub fn get(&self, name: Symbol) -> Option<OperatorInfo> {
        self.mapping.get(&name).copied()
    }
}

impl Default for OperatorTable {
    fn default() -> Self {
        let mut table = Self::empty();
        table.add("||", INFIX_LEFT, 1);
        table.add("&&", INFIX_LEFT, 2);
        table.add("==", INFIX_LEFT, 3);
        table.add("<", INFIX_LEFT, 3);
        table.add("<=", INFIX_LEFT, 3);
        table.add(">", INFIX_LEFT, 3);
        table.add(">=", INFIX_LEFT, 3);
        table.add("++", INFIX_RIGHT, 4);
        table.add("+", INFIX_LEFT, 5);
        table.add("-", INFIX_LEFT | PREFIX, 5);
        table.add("*", INFIX_LEFT, 6);
        table.add("/", INFIX_LEFT, 6);
        table.add("%", INFIX_LEFT, 6);
        table.add("^", INFIX_RIGHT, 7);
        table.add("!", PREFIX, 0);
        table
    }
}

/// Marker for an already-reported parse error; the element-level loops
/// resynchronize and continue.
pub(crate) struct Recover;

pub(crate) type Parse<T> = Result<T, Recover>;

pub struct Parser<'a> {
    tokens: &'a [(Token, Span)],
    pos: usize,
    tree: Tree,
    diags: &'a mut DiagnosticStore,
    operators: OperatorTable,
    last_span: Span,
}

/// Parse a punctuated token stream into a CST. The stream must end with
/// `EndOfFile`, as produced by `lexer::tokenize`. Parent links are not yet
/// installed; run `Tree::link_parents` on the result.
pub fn parse(tokens: &[(Token, Span)], diags: &mut DiagnosticStore) -> Tree {
    let mut parser = Parser::new(tokens, diags);
    parser.parse_source_file();
    parser.tree
}

impl<'a> Parser<'a> {
    fn new(tokens: &'a [(Token, Span)], diags: &'a mut DiagnosticStore) -> Self {
        debug_assert!(matches!(tokens.last(), Some((Token::EndOfFile, _))));
        Self {
            tokens,
            pos: 0,
            tree: Tree::new(),
            diags,
            operators: OperatorTable::default(),
            last_span: Span::point(0),
        }
    }

    // ----- Cursor -----

    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)].0
    }

    fn peek_at(&self, offset: usize) -> &Token {
        let idx = (self.pos + offset).min(self.tokens.len() - 1);
        &self.tokens[idx].0
    }

    fn peek_span(&self) -> Span {
        self.tokens[self.pos.min(self.tokens.len() - 1)].1
    }

    fn advance(&mut self) -> (Token, Span) {
        let idx = self.pos.min(self.tokens.len() - 1);
        let (token, span) = self.tokens[idx].clone();
        if !matches!(token, Token::EndOfFile) {
            self.pos += 1;
        }
        self.last_span = span;
        (token, span)
    }

    fn at(&self, token: &Token) -> bool {
        self.peek() == token
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.at(token) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Span from the start of `start` to the end of the last consumed token.
    fn span_from(&self, start: Span) -> Span {
        Span::new(start.start, self.last_span.end.max(start.start))
    }

    // ----- Errors -----

    fn unexpected(&mut self, expected: &[&'static str]) -> Recover {
        self.diags.push(Diagnostic::UnexpectedToken {
            span: self.peek_span(),
            found: self.peek().clone(),
            expected: expected.to_vec(),
        });
        Recover
    }

    fn expect(&mut self, token: &Token) -> Parse<Span> {
        if self.at(token) {
            Ok(self.advance().1)
        } else {
            Err(self.unexpected(&[token.describe()]))
        }
    }

    fn expect_ident(&mut self) -> Parse<Symbol> {
        match self.peek() {
            Token::Ident(sym) => {
                let sym = *sym;
                self.advance();
                Ok(sym)
            }
            _ => Err(self.unexpected(&["an identifier"])),
        }
    }

    fn expect_ident_alt(&mut self) -> Parse<Symbol> {
        match self.peek() {
            Token::IdentAlt(sym) => {
                let sym = *sym;
                self.advance();
                Ok(sym)
            }
            _ => Err(self.unexpected(&["an uppercase identifier"])),
        }
    }

    /// Discard tokens until the current element can plausibly restart:
    /// past the next `LineFoldEnd` at this block depth, or just before the
    /// enclosing `BlockEnd`.
    fn recover(&mut self) {
        let mut depth = 0usize;
        loop {
            match self.peek() {
                Token::EndOfFile => return,
                Token::BlockStart => {
                    depth += 1;
                    self.advance();
                }
                Token::BlockEnd => {
                    if depth == 0 {
                        return;
                    }
                    depth -= 1;
                    self.advance();
                }
                Token::LineFoldEnd => {
                    self.advance();
                    if depth == 0 {
                        return;
                    }
                }
                _ => {
                    self.advance();
                }
            }
        }
    }

    fn error_node(&mut self) -> NodeId {
        self.tree.alloc(NodeData::Error, self.peek_span())
    }

    /// First token after any leading `pub`/`mut` modifiers.
    fn first_token_after_modifiers(&self) -> &Token {
        let mut offset = 0;
        loop {
            match self.peek_at(offset) {
                Token::Pub | Token::Mut => offset += 1,
                other => return other,
            }
        }
    }

    // ----- Top level -----

    fn parse_source_file(&mut self) {
        let start = self.peek_span();
        let mut elements = Vec::new();
        while !self.at(&Token::EndOfFile) {
            match self.parse_source_element() {
                Ok(element) => elements.push(element),
                Err(Recover) => {
                    elements.push(self.error_node());
                    self.recover();
                    // A stray BlockEnd at top level cannot restart anything
                    if self.at(&Token::BlockEnd) {
                        self.advance();
                    }
                }
            }
        }
        let span = self.span_from(start);
        let root = self.tree.alloc(NodeData::SourceFile { elements }, span);
        self.tree.set_root(root);
    }

    fn parse_source_element(&mut self) -> Parse<NodeId> {
        match self.first_token_after_modifiers() {
            Token::Let => self.parse_let_decl(),
            Token::Struct => self.parse_struct_decl(),
            Token::Enum => self.parse_enum_decl(),
            Token::Class => self.parse_class_decl(),
            Token::Instance => self.parse_instance_decl(),
            _ => self.parse_statement(),
        }
    }

    // ----- Statements -----

    fn parse_statement(&mut self) -> Parse<NodeId> {
        match self.peek() {
            Token::Return => self.parse_return_statement(),
            Token::If => self.parse_if_statement(),
            _ => self.parse_expression_statement(),
        }
    }

    fn parse_expression_statement(&mut self) -> Parse<NodeId> {
        let expr = self.parse_expr()?;
        let span = self.tree.span(expr);
        self.expect(&Token::LineFoldEnd)?;
        Ok(self.tree.alloc(NodeData::ExprStmt(expr), span))
    }

    fn parse_return_statement(&mut self) -> Parse<NodeId> {
        let start = self.expect(&Token::Return)?;
        let expr = if self.at(&Token::LineFoldEnd) {
            None
        } else {
            Some(self.parse_expr()?)
        };
        let span = self.span_from(start);
        self.expect(&Token::LineFoldEnd)?;
        Ok(self.tree.alloc(NodeData::ReturnStmt(expr), span))
    }

    fn parse_if_statement(&mut self) -> Parse<NodeId> {
        let start = self.peek_span();
        let mut parts = Vec::new();

        let first_start = self.expect(&Token::If)?;
        let condition = self.parse_expr()?;
        let body = self.parse_block()?;
        let part_span = self.span_from(first_start);
        self.expect(&Token::LineFoldEnd)?;
        parts.push(self.tree.alloc(
            NodeData::IfPart {
                condition: Some(condition),
                body,
            },
            part_span,
        ));

        loop {
            if self.at(&Token::Elif) {
                let part_start = self.advance().1;
                let condition = self.parse_expr()?;
                let body = self.parse_block()?;
                let part_span = self.span_from(part_start);
                self.expect(&Token::LineFoldEnd)?;
                parts.push(self.tree.alloc(
                    NodeData::IfPart {
                        condition: Some(condition),
                        body,
                    },
                    part_span,
                ));
            } else if self.at(&Token::Else) {
                let part_start = self.advance().1;
                let body = self.parse_block()?;
                let part_span = self.span_from(part_start);
                self.expect(&Token::LineFoldEnd)?;
                parts.push(self.tree.alloc(
                    NodeData::IfPart {
                        condition: None,
                        body,
                    },
                    part_span,
                ));
                break;
            } else {
                break;
            }
        }

        let span = self.span_from(start);
        Ok(self.tree.alloc(NodeData::IfStmt { parts }, span))
    }

    /// `BlockStart` elements `BlockEnd`, recovering per element.
    fn parse_block(&mut self) -> Parse<Vec<NodeId>> {
        self.expect(&Token::BlockStart)?;
        let mut elements = Vec::new();
        while !self.at(&Token::BlockEnd) && !self.at(&Token::EndOfFile) {
            match self.parse_block_element() {
                Ok(element) => elements.push(element),
                Err(Recover) => {
                    elements.push(self.error_node());
                    self.recover();
                }
            }
        }
        self.expect(&Token::BlockEnd)?;
        Ok(elements)
    }

    fn parse_block_element(&mut self) -> Parse<NodeId> {
        match self.first_token_after_modifiers() {
            Token::Let => self.parse_let_decl(),
            _ => self.parse_statement(),
        }
    }

    // ----- Declarations -----

    fn parse_let_decl(&mut self) -> Parse<NodeId> {
        let start = self.peek_span();
        let is_pub = self.eat(&Token::Pub);
        self.expect(&Token::Let)?;
        let is_mut = self.eat(&Token::Mut);

        let pattern = self.parse_pattern_atom()?;

        let mut params = Vec::new();
        loop {
            match self.peek() {
                Token::LineFoldEnd
                | Token::BlockStart
                | Token::Equals
                | Token::Colon
                | Token::EndOfFile => break,
                _ => params.push(self.parse_param()?),
            }
        }

        let annotation = if self.eat(&Token::Colon) {
            Some(self.parse_type_expr()?)
        } else {
            None
        };

        let body = match self.peek() {
            Token::BlockStart => Some(LetBody::Block(self.parse_block()?)),
            Token::Equals => {
                self.advance();
                Some(LetBody::Expr(self.parse_expr()?))
            }
            Token::LineFoldEnd => None,
            _ => {
                return Err(self.unexpected(&[
                    "'='",
                    "':'",
                    "start of an indented block",
                    "end of a line fold",
                ]))
            }
        };

        let span = self.span_from(start);
        self.expect(&Token::LineFoldEnd)?;
        Ok(self.tree.alloc(
            NodeData::LetDecl {
                is_pub,
                is_mut,
                pattern,
                params,
                annotation,
                body,
            },
            span,
        ))
    }

    fn parse_param(&mut self) -> Parse<NodeId> {
        let start = self.peek_span();
        if self.eat(&Token::LParen) {
            let pattern = self.parse_pattern()?;
            let annotation = if self.eat(&Token::Colon) {
                Some(self.parse_type_expr()?)
            } else {
                None
            };
            self.expect(&Token::RParen)?;
            let span = self.span_from(start);
            return Ok(self.tree.alloc(
                NodeData::Param {
                    pattern,
                    annotation,
                },
                span,
            ));
        }
        let pattern = self.parse_pattern_atom()?;
        let span = self.tree.span(pattern);
        Ok(self.tree.alloc(
            NodeData::Param {
                pattern,
                annotation: None,
            },
            span,
        ))
    }

    fn parse_struct_decl(&mut self) -> Parse<NodeId> {
        let start = self.peek_span();
        self.eat(&Token::Pub);
        self.expect(&Token::Struct)?;
        let name = self.expect_ident_alt()?;

        let mut fields = Vec::new();
        if self.at(&Token::BlockStart) {
            self.advance();
            while !self.at(&Token::BlockEnd) && !self.at(&Token::EndOfFile) {
                match self.parse_struct_field() {
                    Ok(field) => fields.push(field),
                    Err(Recover) => {
                        self.recover();
                    }
                }
            }
            self.expect(&Token::BlockEnd)?;
        }

        let span = self.span_from(start);
        self.expect(&Token::LineFoldEnd)?;
        Ok(self.tree.alloc(NodeData::StructDecl { name, fields }, span))
    }

    fn parse_struct_field(&mut self) -> Parse<NodeId> {
        let start = self.peek_span();
        let name = self.expect_ident()?;
        self.expect(&Token::Colon)?;
        let ty = self.parse_type_expr()?;
        let span = self.span_from(start);
        self.expect(&Token::LineFoldEnd)?;
        Ok(self.tree.alloc(NodeData::StructField { name, ty }, span))
    }

    fn parse_enum_decl(&mut self) -> Parse<NodeId> {
        let start = self.peek_span();
        self.eat(&Token::Pub);
        self.expect(&Token::Enum)?;
        let name = self.expect_ident_alt()?;

        let mut ty_vars = Vec::new();
        while let Token::Ident(sym) = self.peek() {
            ty_vars.push(*sym);
            self.advance();
        }

        let mut members = Vec::new();
        if self.at(&Token::BlockStart) {
            self.advance();
            while !self.at(&Token::BlockEnd) && !self.at(&Token::EndOfFile) {
                match self.parse_variant_member() {
                    Ok(member) => members.push(member),
                    Err(Recover) => {
                        self.recover();
                    }
                }
            }
            self.expect(&Token::BlockEnd)?;
        }

        let span = self.span_from(start);
        self.expect(&Token::LineFoldEnd)?;
        Ok(self.tree.alloc(
            NodeData::EnumDecl {
                name,
                ty_vars,
                members,
            },
            span,
        ))
    }

    fn parse_variant_member(&mut self) -> Parse<NodeId> {
        let start = self.peek_span();
        let name = self.expect_ident_alt()?;

        if self.eat(&Token::LBrace) {
            // Record-style member: Name { field: Type, ... }
            let mut fields = Vec::new();
            if !self.at(&Token::RBrace) {
                loop {
                    let field_start = self.peek_span();
                    let field_name = self.expect_ident()?;
                    self.expect(&Token::Colon)?;
                    let ty = self.parse_type_expr()?;
                    let field_span = self.span_from(field_start);
                    fields.push(self.tree.alloc(
                        NodeData::StructField {
                            name: field_name,
                            ty,
                        },
                        field_span,
                    ));
                    if !self.eat(&Token::Comma) {
                        break;
                    }
                }
            }
            self.expect(&Token::RBrace)?;
            let span = self.span_from(start);
            self.expect(&Token::LineFoldEnd)?;
            return Ok(self.tree.alloc(NodeData::RecordMember { name, fields }, span));
        }

        // Tuple-style member: Name Type1 Type2 ...
        let mut elements = Vec::new();
        while self.starts_primary_type() {
            elements.push(self.parse_primary_type()?);
        }
        let span = self.span_from(start);
        self.expect(&Token::LineFoldEnd)?;
        Ok(self.tree.alloc(NodeData::TupleMember { name, elements }, span))
    }

    fn parse_class_decl(&mut self) -> Parse<NodeId> {
        let start = self.peek_span();
        let is_pub = self.eat(&Token::Pub);
        self.expect(&Token::Class)?;
        let name = self.expect_ident_alt()?;

        let mut ty_vars = Vec::new();
        while let Token::Ident(sym) = self.peek() {
            ty_vars.push(*sym);
            self.advance();
        }

        let mut members = Vec::new();
        if self.at(&Token::BlockStart) {
            self.advance();
            while !self.at(&Token::BlockEnd) && !self.at(&Token::EndOfFile) {
                match self.parse_let_decl() {
                    Ok(member) => members.push(member),
                    Err(Recover) => {
                        self.recover();
                    }
                }
            }
            self.expect(&Token::BlockEnd)?;
        }

        let span = self.span_from(start);
        self.expect(&Token::LineFoldEnd)?;
        Ok(self.tree.alloc(
            NodeData::ClassDecl {
                is_pub,
                name,
                ty_vars,
                members,
            },
            span,
        ))
    }

    fn parse_instance_decl(&mut self) -> Parse<NodeId> {
        let start = self.peek_span();
        self.eat(&Token::Pub);
        self.expect(&Token::Instance)?;
        let class = self.expect_ident_alt()?;

        let mut args = Vec::new();
        while self.starts_primary_type() {
            args.push(self.parse_primary_type()?);
        }

        let mut members = Vec::new();
        if self.at(&Token::BlockStart) {
            self.advance();
            while !self.at(&Token::BlockEnd) && !self.at(&Token::EndOfFile) {
                match self.parse_let_decl() {
                    Ok(member) => members.push(member),
                    Err(Recover) => {
                        self.recover();
                    }
                }
            }
            self.expect(&Token::BlockEnd)?;
        }

        let span = self.span_from(start);
        self.expect(&Token::LineFoldEnd)?;
        Ok(self.tree.alloc(
            NodeData::InstanceDecl {
                class,
                args,
                members,
            },
            span,
        ))
    }
}

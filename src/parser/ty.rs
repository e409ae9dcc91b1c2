//! Type-expression grammar: qualified types, right-associative arrows,
//! juxtaposed applications, references, variables, tuples.

use crate::cst::{NodeData, NodeId, QualName};
use crate::lexer::Token;
use crate::parser::{Parse, Parser};

impl Parser<'_> {
    /// `C1 v, T ~ U => body` or a plain arrow type.
    pub(super) fn parse_type_expr(&mut self) -> Parse<NodeId> {
        if self.constraints_ahead() {
            let start = self.peek_span();
            let mut constraints = vec![self.parse_constraint()?];
            while self.eat(&Token::Comma) {
                constraints.push(self.parse_constraint()?);
            }
            self.expect(&Token::RArrowAlt)?;
            let body = self.parse_arrow_type()?;
            let span = self.span_from(start);
            return Ok(self
                .tree
                .alloc(NodeData::QualifiedType { constraints, body }, span));
        }
        self.parse_arrow_type()
    }

    /// Look ahead for a `=>` before the type expression can end; decides
    /// whether a constraint prefix is present.
    fn constraints_ahead(&self) -> bool {
        let mut depth = 0usize;
        let mut offset = 0;
        loop {
            match self.peek_at(offset) {
                Token::LParen | Token::LBracket | Token::LBrace => depth += 1,
                Token::RParen | Token::RBracket | Token::RBrace => {
                    if depth == 0 {
                        return false;
                    }
                    depth -= 1;
                }
                Token::RArrowAlt if depth == 0 => return true,
                Token::LineFoldEnd
                | Token::BlockStart
                | Token::BlockEnd
                | Token::Equals
                | Token::EndOfFile => return false,
                _ => {}
            }
            offset += 1;
        }
    }

    /// `ClassName v1 .. vn` or `T1 ~ T2`.
    fn parse_constraint(&mut self) -> Parse<NodeId> {
        if self.equality_ahead() {
            let start = self.peek_span();
            let left = self.parse_app_type()?;
            self.expect(&Token::Tilde)?;
            let right = self.parse_app_type()?;
            let span = self.span_from(start);
            return Ok(self
                .tree
                .alloc(NodeData::EqualityConstraint { left, right }, span));
        }
        let start = self.peek_span();
        let class = self.expect_ident_alt()?;
        let mut args = Vec::new();
        while let Token::Ident(sym) = self.peek() {
            let sym = *sym;
            let span = self.advance().1;
            args.push(self.tree.alloc(NodeData::VarType(sym), span));
        }
        let span = self.span_from(start);
        Ok(self
            .tree
            .alloc(NodeData::ClassConstraint { class, args }, span))
    }

    /// Look for a `~` before the current constraint ends.
    fn equality_ahead(&self) -> bool {
        let mut depth = 0usize;
        let mut offset = 0;
        loop {
            match self.peek_at(offset) {
                Token::LParen | Token::LBracket | Token::LBrace => depth += 1,
                Token::RParen | Token::RBracket | Token::RBrace => {
                    if depth == 0 {
                        return false;
                    }
                    depth -= 1;
                }
                Token::Tilde if depth == 0 => return true,
                Token::Comma | Token::RArrowAlt if depth == 0 => return false,
                Token::LineFoldEnd
                | Token::BlockStart
                | Token::BlockEnd
                | Token::EndOfFile => return false,
                _ => {}
            }
            offset += 1;
        }
    }

    /// Arrows are right associative: `A -> B -> C` is `A -> (B -> C)`.
    pub(super) fn parse_arrow_type(&mut self) -> Parse<NodeId> {
        let from = self.parse_app_type()?;
        if self.eat(&Token::RArrow) {
            let to = self.parse_arrow_type()?;
            let span = self.tree.span(from).merge(self.tree.span(to));
            return Ok(self.tree.alloc(NodeData::ArrowType { from, to }, span));
        }
        Ok(from)
    }

    /// Juxtaposition is type application: `Pair a b`.
    fn parse_app_type(&mut self) -> Parse<NodeId> {
        let callee = self.parse_primary_type()?;
        let mut args = Vec::new();
        while self.starts_primary_type() {
            args.push(self.parse_primary_type()?);
        }
        if args.is_empty() {
            return Ok(callee);
        }
        let span = self
            .tree
            .span(callee)
            .merge(self.tree.span(*args.last().unwrap()));
        Ok(self.tree.alloc(NodeData::AppType { callee, args }, span))
    }

    pub(super) fn starts_primary_type(&self) -> bool {
        matches!(
            self.peek(),
            Token::Ident(_) | Token::IdentAlt(_) | Token::LParen
        )
    }

    pub(super) fn parse_primary_type(&mut self) -> Parse<NodeId> {
        match self.peek().clone() {
            Token::Ident(sym) => {
                let span = self.advance().1;
                Ok(self.tree.alloc(NodeData::VarType(sym), span))
            }
            Token::IdentAlt(_) => {
                let start = self.peek_span();
                let mut modules = Vec::new();
                while let Token::IdentAlt(sym) = self.peek() {
                    let sym = *sym;
                    if matches!(self.peek_at(1), Token::Dot)
                        && matches!(self.peek_at(2), Token::IdentAlt(_))
                    {
                        modules.push(sym);
                        self.advance();
                        self.advance();
                    } else {
                        break;
                    }
                }
                let name = self.expect_ident_alt()?;
                let span = self.span_from(start);
                Ok(self
                    .tree
                    .alloc(NodeData::RefType(QualName { modules, name }), span))
            }
            Token::LParen => {
                let start = self.advance().1;
                if self.at(&Token::RParen) {
                    self.advance();
                    let span = self.span_from(start);
                    return Ok(self.tree.alloc(NodeData::TupleType(Vec::new()), span));
                }
                let first = self.parse_type_expr()?;
                if self.at(&Token::Comma) {
                    let mut elements = vec![first];
                    while self.eat(&Token::Comma) {
                        elements.push(self.parse_type_expr()?);
                    }
                    self.expect(&Token::RParen)?;
                    let span = self.span_from(start);
                    return Ok(self.tree.alloc(NodeData::TupleType(elements), span));
                }
                self.expect(&Token::RParen)?;
                let span = self.span_from(start);
                Ok(self.tree.alloc(NodeData::NestedType(first), span))
            }
            _ => Err(self.unexpected(&["a type"])),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cst::Tree;
    use crate::diagnostics::DiagnosticStore;
    use crate::lexer;
    use crate::text::TextBuffer;

    fn parse_annotation(source: &str) -> (Tree, NodeId) {
        let full = format!("let x : {}", source);
        let buffer = TextBuffer::new("test.fern", full.as_str());
        let mut diags = DiagnosticStore::new();
        let tokens = lexer::tokenize(&buffer, &mut diags);
        let tree = crate::parser::parse(&tokens, &mut diags);
        assert!(diags.is_empty(), "diagnostics for {:?}: {:?}", source, diags.into_vec());
        let annotation = match tree.data(tree.root()) {
            NodeData::SourceFile { elements } => match tree.data(elements[0]) {
                NodeData::LetDecl { annotation, .. } => annotation.expect("no annotation"),
                other => panic!("expected LetDecl, got {:?}", other),
            },
            _ => unreachable!(),
        };
        (tree, annotation)
    }

    #[test]
    fn test_reference_type() {
        let (tree, ty) = parse_annotation("Int");
        assert!(matches!(tree.data(ty), NodeData::RefType(_)));
    }

    #[test]
    fn test_type_variable() {
        let (tree, ty) = parse_annotation("a");
        assert!(matches!(tree.data(ty), NodeData::VarType(_)));
    }

    #[test]
    fn test_arrow_right_associative() {
        let (tree, ty) = parse_annotation("Int -> String -> Bool");
        match tree.data(ty) {
            NodeData::ArrowType { to, .. } => {
                assert!(matches!(tree.data(*to), NodeData::ArrowType { .. }));
            }
            other => panic!("expected ArrowType, got {:?}", other),
        }
    }

    #[test]
    fn test_application_left_nested() {
        let (tree, ty) = parse_annotation("Pair Int String");
        match tree.data(ty) {
            NodeData::AppType { args, .. } => assert_eq!(args.len(), 2),
            other => panic!("expected AppType, got {:?}", other),
        }
    }

    #[test]
    fn test_qualified_type_with_class_constraint() {
        let (tree, ty) = parse_annotation("Eq a => a -> a -> Bool");
        match tree.data(ty) {
            NodeData::QualifiedType { constraints, body } => {
                assert_eq!(constraints.len(), 1);
                assert!(matches!(
                    tree.data(constraints[0]),
                    NodeData::ClassConstraint { .. }
                ));
                assert!(matches!(tree.data(*body), NodeData::ArrowType { .. }));
            }
            other => panic!("expected QualifiedType, got {:?}", other),
        }
    }

    #[test]
    fn test_qualified_type_with_equality_constraint() {
        let (tree, ty) = parse_annotation("a ~ Int => a -> a");
        match tree.data(ty) {
            NodeData::QualifiedType { constraints, .. } => {
                assert!(matches!(
                    tree.data(constraints[0]),
                    NodeData::EqualityConstraint { .. }
                ));
            }
            other => panic!("expected QualifiedType, got {:?}", other),
        }
    }

    #[test]
    fn test_multiple_constraints() {
        let (tree, ty) = parse_annotation("Eq a, Ord b => a -> b");
        match tree.data(ty) {
            NodeData::QualifiedType { constraints, .. } => {
                assert_eq!(constraints.len(), 2);
            }
            other => panic!("expected QualifiedType, got {:?}", other),
        }
    }

    #[test]
    fn test_tuple_type() {
        let (tree, ty) = parse_annotation("(Int, String)");
        assert!(matches!(tree.data(ty), NodeData::TupleType(es) if es.len() == 2));
    }

    #[test]
    fn test_arrow_with_nested_domain() {
        let (tree, ty) = parse_annotation("(Int -> Int) -> Int");
        match tree.data(ty) {
            NodeData::ArrowType { from, .. } => {
                assert!(matches!(tree.data(*from), NodeData::NestedType(_)));
            }
            other => panic!("expected ArrowType, got {:?}", other),
        }
    }
}

//! Front-end for the Fern programming language.
//!
//! Fern is a small statically-typed functional language with type
//! classes, algebraic data types, records, and indentation-based layout.
//! The pipeline runs in four stages:
//! 1. logos-based scanner producing raw tokens
//! 2. punctuator deriving `BlockStart`/`BlockEnd`/`LineFoldEnd` from
//!    column structure
//! 3. recursive-descent parser with Pratt operator precedence, producing
//!    an arena-backed CST with parent links
//! 4. Hindley-Milner type inference with qualified types and a
//!    union-find constraint solver

pub mod cst;
pub mod diagnostics;
pub mod interner;
pub mod lexer;
pub mod parser;
pub mod scope;
pub mod text;
pub mod typecheck;

use cst::Tree;
use diagnostics::DiagnosticStore;
use text::TextBuffer;

/// Run the whole pipeline over one buffer. The returned diagnostics are
/// sorted by source position.
pub fn analyze_buffer(buffer: &TextBuffer) -> (Tree, DiagnosticStore) {
    let mut diags = DiagnosticStore::new();
    let tokens = lexer::tokenize(buffer, &mut diags);
    log::debug!("scanned {} tokens from {}", tokens.len(), buffer.path().display());
    let mut tree = parser::parse(&tokens, &mut diags);
    tree.link_parents();
    log::debug!("parsed {} nodes", tree.len());
    typecheck::check(&mut tree, &mut diags);
    diags.sort_by_position();
    (tree, diags)
}

/// Convenience wrapper building the text buffer in place.
pub fn analyze(path: &str, source: &str) -> (Tree, DiagnosticStore) {
    let buffer = TextBuffer::new(path, source);
    analyze_buffer(&buffer)
}

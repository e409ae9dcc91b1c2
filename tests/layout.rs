//! End-to-end tests for the scanner + punctuator token stream.

use fernc::diagnostics::DiagnosticStore;
use fernc::lexer::{self, Token};
use fernc::text::TextBuffer;

fn tokens_of(source: &str) -> Vec<Token> {
    let buffer = TextBuffer::new("layout.fern", source);
    let mut diags = DiagnosticStore::new();
    lexer::tokenize(&buffer, &mut diags)
        .into_iter()
        .map(|(t, _)| t)
        .collect()
}

fn count(tokens: &[Token], wanted: &Token) -> usize {
    tokens.iter().filter(|t| *t == wanted).count()
}

/// Block tokens balance and nest for every input.
fn assert_balanced(tokens: &[Token]) {
    let mut depth = 0i64;
    for token in tokens {
        match token {
            Token::BlockStart => depth += 1,
            Token::BlockEnd => depth -= 1,
            _ => {}
        }
        assert!(depth >= 0, "BlockEnd before BlockStart in {:?}", tokens);
    }
    assert_eq!(depth, 0, "unbalanced blocks in {:?}", tokens);
}

#[test]
fn test_every_statement_gets_one_fold_end() {
    let tokens = tokens_of("a\nb\nc");
    assert_eq!(count(&tokens, &Token::LineFoldEnd), 3);
    assert_balanced(&tokens);
}

#[test]
fn test_declaration_with_block_gets_nested_folds() {
    let tokens = tokens_of("let f x\n  return x\nlet g = 1");
    // return fold + f's fold + g's fold
    assert_eq!(count(&tokens, &Token::LineFoldEnd), 3);
    assert_eq!(count(&tokens, &Token::BlockStart), 1);
    assert_balanced(&tokens);
}

#[test]
fn test_no_trailing_newline_terminates_folds_and_blocks() {
    // Deeply nested and cut off mid-block
    let tokens = tokens_of("let f\n  let g\n    let h\n      1");
    assert_eq!(count(&tokens, &Token::BlockStart), 3);
    assert_eq!(count(&tokens, &Token::BlockEnd), 3);
    assert_eq!(tokens.last(), Some(&Token::EndOfFile));
    assert_balanced(&tokens);
}

#[test]
fn test_less_indented_opener_body_emits_no_block() {
    let tokens = tokens_of("match x\ny");
    assert_eq!(count(&tokens, &Token::BlockStart), 0);
    assert_eq!(count(&tokens, &Token::LineFoldEnd), 2);
    assert_balanced(&tokens);
}

#[test]
fn test_multi_level_dedent() {
    let tokens = tokens_of("let a\n  let b\n    1\n  2\n3");
    // folds: 1, b, 2, a, 3
    assert_eq!(count(&tokens, &Token::LineFoldEnd), 5);
    assert_eq!(count(&tokens, &Token::BlockStart), 2);
    assert_eq!(count(&tokens, &Token::BlockEnd), 2);
    assert_balanced(&tokens);
}

#[test]
fn test_continuation_lines_do_not_close_folds() {
    let tokens = tokens_of("let total = 1 +\n    2 +\n    3");
    assert_eq!(count(&tokens, &Token::LineFoldEnd), 1);
    assert_eq!(count(&tokens, &Token::BlockStart), 0);
}

#[test]
fn test_empty_input_is_just_eof() {
    assert_eq!(tokens_of(""), vec![Token::EndOfFile]);
    assert_eq!(tokens_of("\n\n"), vec![Token::EndOfFile]);
}

#[test]
fn test_blank_lines_between_statements() {
    let tokens = tokens_of("a\n\n\nb");
    assert_eq!(count(&tokens, &Token::LineFoldEnd), 2);
}

#[test]
fn test_invalid_bytes_still_produce_terminated_stream() {
    let buffer = TextBuffer::new("layout.fern", "a $ b\n@");
    let mut diags = DiagnosticStore::new();
    let tokens: Vec<Token> = lexer::tokenize(&buffer, &mut diags)
        .into_iter()
        .map(|(t, _)| t)
        .collect();
    assert_eq!(diags.len(), 2);
    assert_eq!(count(&tokens, &Token::LineFoldEnd), 2);
    assert_eq!(tokens.last(), Some(&Token::EndOfFile));
}

#[test]
fn test_synthetic_tokens_carry_trigger_location() {
    let source = "let f\n  1\nnext";
    let buffer = TextBuffer::new("layout.fern", source);
    let mut diags = DiagnosticStore::new();
    let tokens = lexer::tokenize(&buffer, &mut diags);
    let next_offset = source.find("next").unwrap();
    // The BlockEnd closing f's block is triggered by `next`
    let block_end = tokens
        .iter()
        .find(|(t, _)| matches!(t, Token::BlockEnd))
        .unwrap();
    assert_eq!(block_end.1.start, next_offset);
    assert_eq!(block_end.1.end, next_offset);
}

#[test]
fn test_token_stream_is_deterministic() {
    let source = "let f x\n  match x\n    A => 1\n    B => 2\nlet g = f A";
    assert_eq!(tokens_of(source), tokens_of(source));
}

use crate::lexer::token::Token;
use crate::text::{Span, TextBuffer};

/// Punctuator: wrap the scanner's output with synthetic `BlockStart`,
/// `BlockEnd` and `LineFoldEnd` tokens derived from column structure, and
/// terminate the stream with a single `EndOfFile`.
///
/// A stack of layout columns is kept with an implicit bottom entry at
/// column 1. When a token starts a new physical line:
///
/// - columns smaller than the top close the innermost fold and block
///   (`LineFoldEnd` then `BlockEnd`) per popped level;
/// - a column equal to the top closes the current fold (`LineFoldEnd`);
/// - a column greater than the top continues the current fold, unless a
///   block opener keyword armed this fold, in which case the column is
///   pushed and `BlockStart` emitted.
///
/// `=` and assignment operators disarm a pending opener: the body that
/// follows is an expression, not a block. Synthetic tokens carry a
/// zero-width span at the triggering token.
pub fn punctuate(tokens: Vec<(Token, Span)>, buffer: &TextBuffer) -> Vec<(Token, Span)> {
    let mut out = Vec::with_capacity(tokens.len() * 2 + 1);
    let mut stack: Vec<usize> = Vec::new();
    let mut pending_block = false;
    let mut fold_open = false;
    let mut last_line = 0;
    let mut end_offset = 0;

    for (token, span) in tokens {
        let pos = buffer.pos(span.start);
        let trigger = Span::point(span.start);

        if fold_open && pos.line > last_line {
            let top = stack.last().copied().unwrap_or(1);
            if pending_block && pos.column > top {
                stack.push(pos.column);
                out.push((Token::BlockStart, trigger));
            } else {
                while pos.column < stack.last().copied().unwrap_or(1) {
                    out.push((Token::LineFoldEnd, trigger));
                    out.push((Token::BlockEnd, trigger));
                    stack.pop();
                }
                if pos.column == stack.last().copied().unwrap_or(1) {
                    out.push((Token::LineFoldEnd, trigger));
                }
            }
            pending_block = false;
        }

        if token.opens_block() {
            pending_block = true;
        } else if matches!(token, Token::Equals | Token::Assignment(_)) {
            pending_block = false;
        }

        last_line = pos.line;
        end_offset = span.end;
        fold_open = true;
        out.push((token, span));
    }

    let eof = Span::point(end_offset);
    if fold_open {
        out.push((Token::LineFoldEnd, eof));
        while stack.pop().is_some() {
            out.push((Token::BlockEnd, eof));
            out.push((Token::LineFoldEnd, eof));
        }
    }
    out.push((Token::EndOfFile, eof));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::DiagnosticStore;
    use crate::lexer::scanner::scan;

    fn layout(source: &str) -> Vec<Token> {
        let buffer = TextBuffer::new("test.fern", source);
        let mut diags = DiagnosticStore::new();
        let tokens = scan(buffer.text(), &mut diags);
        punctuate(tokens, &buffer)
            .into_iter()
            .map(|(t, _)| t)
            .collect()
    }

    fn count(tokens: &[Token], wanted: &Token) -> usize {
        tokens.iter().filter(|t| *t == wanted).count()
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(layout(""), vec![Token::EndOfFile]);
    }

    #[test]
    fn test_single_statement() {
        assert_eq!(
            layout("1"),
            vec![
                Token::Integer(1.into()),
                Token::LineFoldEnd,
                Token::EndOfFile
            ]
        );
    }

    #[test]
    fn test_two_statements_fold_separation() {
        let tokens = layout("a\nb");
        assert_eq!(count(&tokens, &Token::LineFoldEnd), 2);
        assert_eq!(count(&tokens, &Token::BlockStart), 0);
    }

    #[test]
    fn test_continuation_line_is_one_fold() {
        let tokens = layout("a +\n  b");
        assert_eq!(count(&tokens, &Token::LineFoldEnd), 1);
    }

    #[test]
    fn test_let_block_body() {
        let tokens = layout("let f x\n  return x");
        assert_eq!(
            count(&tokens, &Token::BlockStart),
            count(&tokens, &Token::BlockEnd)
        );
        assert_eq!(count(&tokens, &Token::BlockStart), 1);
        // One fold for the inner statement, one for the declaration
        assert_eq!(count(&tokens, &Token::LineFoldEnd), 2);
        // The block closes before the declaration's fold ends
        let end = tokens.len();
        assert_eq!(tokens[end - 4..], [
            Token::LineFoldEnd,
            Token::BlockEnd,
            Token::LineFoldEnd,
            Token::EndOfFile
        ]);
    }

    #[test]
    fn test_equals_suppresses_block() {
        // `let x = 1` continued on the next line stays a single fold
        let tokens = layout("let x =\n  1");
        assert_eq!(count(&tokens, &Token::BlockStart), 0);
        assert_eq!(count(&tokens, &Token::LineFoldEnd), 1);
    }

    #[test]
    fn test_nested_blocks_unwind_in_order() {
        let tokens = layout("let f\n  let g\n    x\nlet h");
        assert_eq!(count(&tokens, &Token::BlockStart), 2);
        assert_eq!(count(&tokens, &Token::BlockEnd), 2);
        // x's fold, g's fold, f's fold, h's fold
        assert_eq!(count(&tokens, &Token::LineFoldEnd), 4);
        let h_at = tokens
            .iter()
            .rposition(|t| matches!(t, Token::Let))
            .unwrap();
        // Both blocks unwind, innermost fold first, before `let h` begins
        assert_eq!(
            tokens[h_at - 5..h_at],
            [
                Token::LineFoldEnd,
                Token::BlockEnd,
                Token::LineFoldEnd,
                Token::BlockEnd,
                Token::LineFoldEnd,
            ]
        );
    }

    #[test]
    fn test_less_indented_block_opener_gets_no_block() {
        // The opener arms a block, but the next line is not indented past
        // the enclosing column, so no BlockStart appears.
        let tokens = layout("let f\nx");
        assert_eq!(count(&tokens, &Token::BlockStart), 0);
        assert_eq!(count(&tokens, &Token::LineFoldEnd), 2);
    }

    #[test]
    fn test_no_trailing_newline_still_terminates() {
        let tokens = layout("let f x\n  return x");
        assert_eq!(tokens.last(), Some(&Token::EndOfFile));
        assert_eq!(
            count(&tokens, &Token::BlockStart),
            count(&tokens, &Token::BlockEnd)
        );
    }

    #[test]
    fn test_match_block() {
        let tokens = layout("match x\n  A => 1\n  B => 2");
        assert_eq!(count(&tokens, &Token::BlockStart), 1);
        assert_eq!(count(&tokens, &Token::BlockEnd), 1);
        // Two case folds plus the outer statement fold
        assert_eq!(count(&tokens, &Token::LineFoldEnd), 3);
    }

    #[test]
    fn test_blocks_balance_and_nest() {
        let source = "let outer\n  if a\n    return 1\n  else\n    return 2\nlet next = 1";
        let tokens = layout(source);
        let mut depth = 0usize;
        for token in &tokens {
            match token {
                Token::BlockStart => depth += 1,
                Token::BlockEnd => {
                    assert!(depth > 0, "BlockEnd without BlockStart");
                    depth -= 1;
                }
                _ => {}
            }
        }
        assert_eq!(depth, 0);
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn prop_blocks_balance(source in "[a-z \n]{0,60}") {
                let tokens = layout(&source);
                let mut depth = 0i64;
                for token in &tokens {
                    match token {
                        Token::BlockStart => depth += 1,
                        Token::BlockEnd => depth -= 1,
                        _ => {}
                    }
                    prop_assert!(depth >= 0);
                }
                prop_assert_eq!(depth, 0);
            }

            #[test]
            fn prop_single_eof(source in "[a-z0-9 \n=+]{0,60}") {
                let tokens = layout(&source);
                let eofs = tokens.iter().filter(|t| matches!(t, Token::EndOfFile)).count();
                prop_assert_eq!(eofs, 1);
                prop_assert!(matches!(tokens.last(), Some(Token::EndOfFile)));
            }
        }
    }
}

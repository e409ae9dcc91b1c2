pub mod layout;
pub mod scanner;
pub mod token;

pub use layout::punctuate;
pub use scanner::scan;
pub use token::Token;

use crate::diagnostics::DiagnosticStore;
use crate::text::{Span, TextBuffer};

/// Scan and punctuate a buffer in one step: the token stream every later
/// stage consumes, ending in `EndOfFile`.
pub fn tokenize(buffer: &TextBuffer, diags: &mut DiagnosticStore) -> Vec<(Token, Span)> {
    let raw = scan(buffer.text(), diags);
    punctuate(raw, buffer)
}

use thiserror::Error;

use crate::cst::NodeId;
use crate::interner::{self, Symbol};
use crate::lexer::Token;
use crate::scope::SymbolKind;
use crate::text::Span;
use crate::typecheck::types::{TyVarId, Type};

/// The closed set of diagnostics the pipeline can report. Every variant
/// carries the span it was created at plus the CST nodes involved, so the
/// caller can render against the text buffer.
#[derive(Debug, Clone, Error)]
pub enum Diagnostic {
    /// Parser: the token stream did not match any accepted production.
    #[error("unexpected {}{}", .found.describe(), expected_list(.expected))]
    UnexpectedToken {
        span: Span,
        found: Token,
        expected: Vec<&'static str>,
    },

    /// Scanner: a byte that cannot start any token.
    #[error("invalid character {ch:?}")]
    InvalidCharacter { span: Span, ch: char },

    /// Checker: two types failed to unify.
    #[error("could not match type {left} with {right}")]
    UnificationError {
        span: Span,
        node: NodeId,
        left: Type,
        right: Type,
    },

    /// Scopes: no binding for the path under the requested kind.
    #[error("unresolved {} {}", .kind.describe(), qualified_name(.modules, .name))]
    UnresolvedName {
        span: Span,
        node: NodeId,
        modules: Vec<Symbol>,
        name: Symbol,
        kind: SymbolKind,
    },

    /// Scopes: several bindings answered the same (name, kind) query.
    #[error("ambiguous {} {} ({} candidates)", .kind.describe(), name_text(.name), .candidates.len())]
    AmbiguousName {
        span: Span,
        node: NodeId,
        name: Symbol,
        kind: SymbolKind,
        candidates: Vec<NodeId>,
    },

    /// Checker: a class obligation had no, or no unique, matching instance.
    #[error("no instance for {}{}", name_text(.class), type_list(.args))]
    ClassResolutionError {
        span: Span,
        node: NodeId,
        class: Symbol,
        args: Vec<Type>,
    },

    /// Checker: a unification variable survived solving.
    #[error("ambiguous type: ?{} was never solved", .var.0)]
    AmbiguousType {
        span: Span,
        node: NodeId,
        var: TyVarId,
    },

    /// Scopes: a name was bound twice in the same scope.
    #[error("{} {} is already bound in this scope", .kind.describe(), name_text(.name))]
    ShadowingDisallowed {
        span: Span,
        name: Symbol,
        kind: SymbolKind,
        prior: NodeId,
        current: NodeId,
    },
}

impl Diagnostic {
    pub fn span(&self) -> Span {
        match self {
            Diagnostic::UnexpectedToken { span, .. }
            | Diagnostic::InvalidCharacter { span, .. }
            | Diagnostic::UnificationError { span, .. }
            | Diagnostic::UnresolvedName { span, .. }
            | Diagnostic::AmbiguousName { span, .. }
            | Diagnostic::ClassResolutionError { span, .. }
            | Diagnostic::AmbiguousType { span, .. }
            | Diagnostic::ShadowingDisallowed { span, .. } => *span,
        }
    }
}

fn name_text(name: &Symbol) -> String {
    interner::resolve(*name)
}

fn qualified_name(modules: &[Symbol], name: &Symbol) -> String {
    let mut out = String::new();
    for module in modules {
        out.push_str(&interner::resolve(*module));
        out.push('.');
    }
    out.push_str(&interner::resolve(*name));
    out
}

fn expected_list(expected: &[&'static str]) -> String {
    match expected {
        [] => String::new(),
        [one] => format!(", expected {}", one),
        many => format!(", expected one of {}", many.join(", ")),
    }
}

fn type_list(args: &[Type]) -> String {
    args.iter().map(|arg| format!(" {}", arg)).collect()
}

/// Collector the pipeline stages append structured reports into. The store
/// never renders; callers sort by position and format against the buffer.
#[derive(Debug, Default)]
pub struct DiagnosticStore {
    diagnostics: Vec<Diagnostic>,
}

impl DiagnosticStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    pub fn len(&self) -> usize {
        self.diagnostics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter()
    }

    /// Sort reports by start position. Byte order coincides with
    /// (line, column) order, which is the display contract.
    pub fn sort_by_position(&mut self) {
        self.diagnostics.sort_by_key(|d| d.span().start);
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.diagnostics
    }
}

use std::sync::{Mutex, OnceLock};
use string_interner::{DefaultBackend, DefaultSymbol, StringInterner};

/// Interned string handle used for identifiers and operator names.
pub type Symbol = DefaultSymbol;

type Interner = StringInterner<DefaultBackend>;

static INTERNER: OnceLock<Mutex<Interner>> = OnceLock::new();

fn with_interner<R>(f: impl FnOnce(&mut Interner) -> R) -> R {
    let mutex = INTERNER.get_or_init(|| Mutex::new(StringInterner::new()));
    let mut guard = mutex.lock().unwrap_or_else(|e| e.into_inner());
    f(&mut guard)
}

/// Intern a string, returning its symbol.
pub fn intern(s: &str) -> Symbol {
    with_interner(|interner| interner.get_or_intern(s))
}

/// Resolve a symbol back to its text.
pub fn resolve(sym: Symbol) -> String {
    with_interner(|interner| interner.resolve(sym).unwrap_or_default().to_string())
}

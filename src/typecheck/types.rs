use std::fmt;

use crate::interner::{self, Symbol};

/// Unique identifier for a unification variable. The binding lives in the
/// checker's union-find table, not here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TyVarId(pub u32);

/// Internal type representation the solver operates on, separate from the
/// CST's type expressions.
#[derive(Debug, Clone, PartialEq)]
pub enum Type {
    /// Unification variable, resolved through the union-find table
    Unif(TyVarId),

    /// Rigid type variable bound by a scheme or an instance head
    Var(Symbol),

    /// Named type constructor: Int, String, Bool, Maybe, ...
    Con(Symbol),

    /// Type application: `Maybe Int`
    App(Box<Type>, Box<Type>),

    /// Function type, curried: `a -> b`
    Fun(Box<Type>, Box<Type>),

    /// Tuple type; the empty tuple is the unit type
    Tuple(Vec<Type>),

    /// Placeholder for an expression that already failed to check; unifies
    /// with anything so one defect is reported once
    Error,
}

impl Type {
    pub fn int() -> Type {
        Type::Con(interner::intern("Int"))
    }

    pub fn string() -> Type {
        Type::Con(interner::intern("String"))
    }

    pub fn boolean() -> Type {
        Type::Con(interner::intern("Bool"))
    }

    pub fn unit() -> Type {
        Type::Tuple(Vec::new())
    }

    pub fn fun(from: Type, to: Type) -> Type {
        Type::Fun(Box::new(from), Box::new(to))
    }

    pub fn app(callee: Type, arg: Type) -> Type {
        Type::App(Box::new(callee), Box::new(arg))
    }

    /// `a -> b -> ... -> result`
    pub fn fun_from(params: impl DoubleEndedIterator<Item = Type>, result: Type) -> Type {
        params.rev().fold(result, |acc, p| Type::fun(p, acc))
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Unif(id) => write!(f, "?{}", id.0),
            Type::Var(sym) => write!(f, "{}", interner::resolve(*sym)),
            Type::Con(sym) => write!(f, "{}", interner::resolve(*sym)),
            Type::App(callee, arg) => write!(f, "({} {})", callee, arg),
            Type::Fun(from, to) => write!(f, "({} -> {})", from, to),
            Type::Tuple(elements) => {
                write!(f, "(")?;
                for (i, element) in elements.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", element)?;
                }
                write!(f, ")")
            }
            Type::Error => write!(f, "{{error}}"),
        }
    }
}

/// A class constraint over types: `Eq a`, `Ord Int`.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassConstraint {
    pub class: Symbol,
    pub args: Vec<Type>,
}

impl fmt::Display for ClassConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", interner::resolve(self.class))?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// A generalized binding: `forall vars. constraints => ty`. Quantified
/// variables appear as `Type::Var` in the body, so schemes are
/// self-contained and survive the solver state they were built in.
#[derive(Debug, Clone, PartialEq)]
pub struct Scheme {
    pub vars: Vec<Symbol>,
    pub constraints: Vec<ClassConstraint>,
    pub ty: Type,
}

impl Scheme {
    /// A monomorphic scheme: nothing quantified, nothing constrained.
    pub fn mono(ty: Type) -> Self {
        Scheme {
            vars: Vec::new(),
            constraints: Vec::new(),
            ty,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fun_from_builds_right_nested() {
        let ty = Type::fun_from(vec![Type::int(), Type::string()].into_iter(), Type::boolean());
        assert_eq!(
            ty,
            Type::fun(Type::int(), Type::fun(Type::string(), Type::boolean()))
        );
    }

    #[test]
    fn test_display() {
        let ty = Type::fun(Type::int(), Type::boolean());
        assert_eq!(format!("{}", ty), "(Int -> Bool)");
        assert_eq!(format!("{}", Type::unit()), "()");
    }
}

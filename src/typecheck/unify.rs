//! Union-find based unification with path compression and an occurs check.

use crate::typecheck::types::{TyVarId, Type};

#[derive(Debug, Clone)]
enum UfEntry {
    /// Unsolved root with a rank for balanced unions
    Root(u32),
    /// Link to another variable (compressed towards the root)
    Link(TyVarId),
    /// Solved to a concrete type
    Solved(Type),
}

/// The checker's unification-variable table. Variables are allocated here,
/// solved at most once, and survive until checking finishes.
#[derive(Debug, Default)]
pub struct UnifyState {
    entries: Vec<UfEntry>,
}

/// The two types that failed to match, zonked, innermost mismatch first.
pub type Mismatch = (Type, Type);

impl UnifyState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fresh_var(&mut self) -> TyVarId {
        let id = TyVarId(self.entries.len() as u32);
        self.entries.push(UfEntry::Root(0));
        id
    }

    pub fn fresh(&mut self) -> Type {
        Type::Unif(self.fresh_var())
    }

    fn find(&mut self, var: TyVarId) -> TyVarId {
        let idx = var.0 as usize;
        match &self.entries[idx] {
            UfEntry::Link(next) => {
                let next = *next;
                let root = self.find(next);
                if root != next {
                    self.entries[idx] = UfEntry::Link(root);
                }
                root
            }
            _ => var,
        }
    }

    /// The solution for a variable, if it has one.
    pub fn probe(&mut self, var: TyVarId) -> Option<Type> {
        let root = self.find(var);
        match &self.entries[root.0 as usize] {
            UfEntry::Solved(ty) => Some(ty.clone()),
            _ => None,
        }
    }

    /// Record a solution directly. Used by generalization to pin quantified
    /// variables to their scheme-level names.
    pub fn solve(&mut self, var: TyVarId, ty: Type) {
        let root = self.find(var);
        self.entries[root.0 as usize] = UfEntry::Solved(ty);
    }

    /// Replace solved variables in a type with their solutions.
    pub fn zonk(&mut self, ty: Type) -> Type {
        match ty {
            Type::Unif(v) => match self.probe(v) {
                Some(solved) => self.zonk(solved),
                None => Type::Unif(self.find(v)),
            },
            Type::App(callee, arg) => {
                let callee = self.zonk(*callee);
                let arg = self.zonk(*arg);
                Type::app(callee, arg)
            }
            Type::Fun(from, to) => {
                let from = self.zonk(*from);
                let to = self.zonk(*to);
                Type::fun(from, to)
            }
            Type::Tuple(elements) => {
                Type::Tuple(elements.into_iter().map(|e| self.zonk(e)).collect())
            }
            Type::Var(_) | Type::Con(_) | Type::Error => ty,
        }
    }

    /// Occurs check: would solving `var := ty` build an infinite type?
    fn occurs_in(&mut self, var: TyVarId, ty: &Type) -> bool {
        match ty {
            Type::Unif(v) => {
                if self.find(*v) == self.find(var) {
                    return true;
                }
                match self.probe(*v) {
                    Some(solved) => self.occurs_in(var, &solved),
                    None => false,
                }
            }
            Type::App(callee, arg) => self.occurs_in(var, callee) || self.occurs_in(var, arg),
            Type::Fun(from, to) => self.occurs_in(var, from) || self.occurs_in(var, to),
            Type::Tuple(elements) => elements.iter().any(|e| self.occurs_in(var, e)),
            Type::Var(_) | Type::Con(_) | Type::Error => false,
        }
    }

    /// Unify two types. On mismatch returns the innermost conflicting pair;
    /// the caller attaches the originating node. `Error` unifies with
    /// everything so cascaded failures stay quiet.
    pub fn unify(&mut self, left: &Type, right: &Type) -> Result<(), Mismatch> {
        let left = self.zonk(left.clone());
        let right = self.zonk(right.clone());

        match (&left, &right) {
            (Type::Error, _) | (_, Type::Error) => Ok(()),

            (Type::Unif(a), Type::Unif(b)) => {
                let ra = self.find(*a);
                let rb = self.find(*b);
                if ra == rb {
                    return Ok(());
                }
                let rank_a = match &self.entries[ra.0 as usize] {
                    UfEntry::Root(r) => *r,
                    _ => 0,
                };
                let rank_b = match &self.entries[rb.0 as usize] {
                    UfEntry::Root(r) => *r,
                    _ => 0,
                };
                if rank_a < rank_b {
                    self.entries[ra.0 as usize] = UfEntry::Link(rb);
                } else {
                    self.entries[rb.0 as usize] = UfEntry::Link(ra);
                    if rank_a == rank_b {
                        self.entries[ra.0 as usize] = UfEntry::Root(rank_a + 1);
                    }
                }
                Ok(())
            }

            (Type::Unif(a), t) | (t, Type::Unif(a)) => {
                let root = self.find(*a);
                if self.occurs_in(root, t) {
                    return Err((Type::Unif(root), t.clone()));
                }
                self.entries[root.0 as usize] = UfEntry::Solved(t.clone());
                Ok(())
            }

            (Type::Con(a), Type::Con(b)) if a == b => Ok(()),
            (Type::Var(a), Type::Var(b)) if a == b => Ok(()),

            (Type::App(c1, a1), Type::App(c2, a2)) => {
                self.unify(c1, c2)?;
                self.unify(a1, a2)
            }

            (Type::Fun(f1, t1), Type::Fun(f2, t2)) => {
                self.unify(f1, f2)?;
                self.unify(t1, t2)
            }

            (Type::Tuple(e1), Type::Tuple(e2)) if e1.len() == e2.len() => {
                for (a, b) in e1.iter().zip(e2) {
                    self.unify(a, b)?;
                }
                Ok(())
            }

            _ => Err((left, right)),
        }
    }

    /// Unsolved root variables occurring in a type, in first-seen order.
    pub fn free_unif_vars(&mut self, ty: &Type) -> Vec<TyVarId> {
        let mut vars = Vec::new();
        self.collect_free(ty, &mut vars);
        vars
    }

    fn collect_free(&mut self, ty: &Type, vars: &mut Vec<TyVarId>) {
        match ty {
            Type::Unif(v) => match self.probe(*v) {
                Some(solved) => self.collect_free(&solved, vars),
                None => {
                    let root = self.find(*v);
                    if !vars.contains(&root) {
                        vars.push(root);
                    }
                }
            },
            Type::App(callee, arg) => {
                self.collect_free(callee, vars);
                self.collect_free(arg, vars);
            }
            Type::Fun(from, to) => {
                self.collect_free(from, vars);
                self.collect_free(to, vars);
            }
            Type::Tuple(elements) => {
                for element in elements {
                    self.collect_free(element, vars);
                }
            }
            Type::Var(_) | Type::Con(_) | Type::Error => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_var_solves_to_type() {
        let mut state = UnifyState::new();
        let a = state.fresh();
        assert!(state.unify(&a, &Type::int()).is_ok());
        assert_eq!(state.zonk(a), Type::int());
    }

    #[test]
    fn test_unify_is_symmetric() {
        let mut forward = UnifyState::new();
        let a1 = forward.fresh();
        let r1 = forward.unify(&Type::fun(a1.clone(), Type::int()), &Type::fun(Type::string(), Type::int()));

        let mut backward = UnifyState::new();
        let a2 = backward.fresh();
        let r2 = backward.unify(&Type::fun(Type::string(), Type::int()), &Type::fun(a2.clone(), Type::int()));

        assert!(r1.is_ok() && r2.is_ok());
        assert_eq!(forward.zonk(a1), backward.zonk(a2));
    }

    #[test]
    fn test_con_mismatch() {
        let mut state = UnifyState::new();
        let err = state.unify(&Type::int(), &Type::string()).unwrap_err();
        assert_eq!(err, (Type::int(), Type::string()));
    }

    #[test]
    fn test_innermost_mismatch_is_reported() {
        let mut state = UnifyState::new();
        let left = Type::fun(Type::int(), Type::boolean());
        let right = Type::fun(Type::string(), Type::boolean());
        let err = state.unify(&left, &right).unwrap_err();
        assert_eq!(err, (Type::int(), Type::string()));
    }

    #[test]
    fn test_occurs_check_rejects_infinite_type() {
        let mut state = UnifyState::new();
        let a = state.fresh();
        let arrow = Type::fun(a.clone(), Type::int());
        assert!(state.unify(&a, &arrow).is_err());
    }

    #[test]
    fn test_error_unifies_with_anything() {
        let mut state = UnifyState::new();
        assert!(state.unify(&Type::Error, &Type::int()).is_ok());
        assert!(state.unify(&Type::string(), &Type::Error).is_ok());
    }

    #[test]
    fn test_path_compression_keeps_roots_stable() {
        let mut state = UnifyState::new();
        let a = state.fresh_var();
        let b = state.fresh_var();
        let c = state.fresh_var();
        state.unify(&Type::Unif(a), &Type::Unif(b)).unwrap();
        state.unify(&Type::Unif(b), &Type::Unif(c)).unwrap();
        state.unify(&Type::Unif(c), &Type::int()).unwrap();
        assert_eq!(state.zonk(Type::Unif(a)), Type::int());
        assert_eq!(state.zonk(Type::Unif(b)), Type::int());
    }

    #[test]
    fn test_tuple_arity_mismatch() {
        let mut state = UnifyState::new();
        let left = Type::Tuple(vec![Type::int()]);
        let right = Type::Tuple(vec![Type::int(), Type::int()]);
        assert!(state.unify(&left, &right).is_err());
    }
}

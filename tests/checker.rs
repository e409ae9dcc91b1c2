//! End-to-end checker tests: the concrete scenarios plus the universal
//! typing properties.

use fernc::analyze;
use fernc::cst::{NodeData, NodeId, Tree};
use fernc::diagnostics::Diagnostic;
use fernc::interner;
use fernc::typecheck::types::Type;

fn binder_named(tree: &Tree, name: &str) -> NodeId {
    let sym = interner::intern(name);
    for id in tree.ids() {
        if matches!(tree.data(id), NodeData::BindPattern(s) if *s == sym) {
            return id;
        }
    }
    panic!("no binder named {}", name);
}

fn assert_no_unsolved_vars(tree: &Tree) {
    fn has_unif(ty: &Type) -> bool {
        match ty {
            Type::Unif(_) => true,
            Type::App(c, a) => has_unif(c) || has_unif(a),
            Type::Fun(f, t) => has_unif(f) || has_unif(t),
            Type::Tuple(es) => es.iter().any(has_unif),
            Type::Var(_) | Type::Con(_) | Type::Error => false,
        }
    }
    for id in tree.ids() {
        if tree.data(id).is_expression() {
            if let Some(ty) = tree.ty(id) {
                assert!(
                    !has_unif(ty),
                    "expression {:?} kept an unsolved variable: {}",
                    tree.data(id),
                    ty
                );
            }
        }
    }
}

// ----- Concrete scenarios -----

#[test]
fn scenario_sole_integer_statement() {
    let (tree, diags) = analyze("s1.fern", "1");
    assert!(diags.is_empty(), "{:?}", diags.into_vec());
    match tree.data(tree.root()) {
        NodeData::SourceFile { elements } => match tree.data(elements[0]) {
            NodeData::ExprStmt(expr) => assert_eq!(tree.ty(*expr), Some(&Type::int())),
            other => panic!("expected expression statement, got {:?}", other),
        },
        _ => unreachable!(),
    }
}

#[test]
fn scenario_annotated_let_with_wrong_body() {
    let (_, diags) = analyze("s2.fern", "let a: Int = \"foo\"");
    let diags = diags.into_vec();
    assert_eq!(diags.len(), 1, "{:?}", diags);
    match &diags[0] {
        Diagnostic::UnificationError { left, right, .. } => {
            assert_eq!(*left, Type::int());
            assert_eq!(*right, Type::string());
        }
        other => panic!("expected UnificationError, got {:?}", other),
    }
}

#[test]
fn scenario_identity_instantiates_twice() {
    let source = "let id x = x\nlet _ = id 1\nlet _ = id \"s\"";
    let (tree, diags) = analyze("s3.fern", source);
    assert!(diags.is_empty(), "{:?}", diags.into_vec());

    // id : forall a. a -> a
    match tree.ty(binder_named(&tree, "id")) {
        Some(Type::Fun(from, to)) => {
            assert!(matches!(**from, Type::Var(_)));
            assert_eq!(from, to);
        }
        other => panic!("expected polymorphic arrow for id, got {:?}", other),
    }

    // The two applications come out at Int and String
    let mut call_types = Vec::new();
    for id in tree.ids() {
        if matches!(tree.data(id), NodeData::CallExpr { .. }) {
            call_types.push(tree.ty(id).cloned().unwrap());
        }
    }
    assert_eq!(call_types, vec![Type::int(), Type::string()]);
    assert_no_unsolved_vars(&tree);
}

#[test]
fn scenario_divergent_recursion() {
    let (tree, diags) = analyze("s4.fern", "let f x = f x");
    assert!(diags.is_empty(), "{:?}", diags.into_vec());
    // f : forall a b. a -> b
    match tree.ty(binder_named(&tree, "f")) {
        Some(Type::Fun(from, to)) => {
            assert!(matches!(**from, Type::Var(_)));
            assert!(matches!(**to, Type::Var(_)));
            assert_ne!(from, to);
        }
        other => panic!("expected arrow for f, got {:?}", other),
    }
}

#[test]
fn scenario_integer_condition_rejected() {
    let source = "let x: Int\n  if 1\n    return 1\n  else\n    return 2";
    let (_, diags) = analyze("s5.fern", source);
    let diags = diags.into_vec();
    assert_eq!(diags.len(), 1, "{:?}", diags);
    match &diags[0] {
        Diagnostic::UnificationError { left, right, .. } => {
            assert_eq!(*left, Type::boolean());
            assert_eq!(*right, Type::int());
        }
        other => panic!("expected UnificationError, got {:?}", other),
    }
}

#[test]
fn scenario_mutual_recursion_infers_int_to_bool() {
    let source = "\
let even n
  if n == 0
    return True
  else
    return odd (n - 1)
let odd n
  if n == 0
    return False
  else
    return even (n - 1)
";
    let (tree, diags) = analyze("s6.fern", source);
    assert!(diags.is_empty(), "{:?}", diags.into_vec());
    let expected = Type::fun(Type::int(), Type::boolean());
    assert_eq!(tree.ty(binder_named(&tree, "even")), Some(&expected));
    assert_eq!(tree.ty(binder_named(&tree, "odd")), Some(&expected));
    assert_no_unsolved_vars(&tree);
}

// ----- Universal properties -----

#[test]
fn property_checked_expressions_are_fully_solved() {
    let source = "\
enum List a
  Nil
  Cons a (List a)
let length xs = match xs
  Nil => 0
  Cons head tail => 1 + length tail
let total = length (Cons 1 (Cons 2 Nil))
";
    let (tree, diags) = analyze("list.fern", source);
    assert!(diags.is_empty(), "{:?}", diags.into_vec());
    assert_no_unsolved_vars(&tree);
    assert_eq!(tree.ty(binder_named(&tree, "total")), Some(&Type::int()));
}

#[test]
fn property_diagnostics_are_deterministic() {
    let source = "let a: Int = \"x\"\nmissing\nlet b = 1 == \"y\"";
    let (_, first) = analyze("det.fern", source);
    let (_, second) = analyze("det.fern", source);
    let first: Vec<String> = first.iter().map(|d| format!("{:?}", d)).collect();
    let second: Vec<String> = second.iter().map(|d| format!("{:?}", d)).collect();
    assert_eq!(first, second);
}

#[test]
fn property_diagnostics_sorted_by_position() {
    let source = "let a: Int = \"x\"\nmissing\nlet b: String = 2";
    let (_, diags) = analyze("sorted.fern", source);
    let spans: Vec<usize> = diags.iter().map(|d| d.span().start).collect();
    let mut sorted = spans.clone();
    sorted.sort_unstable();
    assert_eq!(spans, sorted);
    assert!(diags.len() >= 3);
}

#[test]
fn property_checker_survives_parse_errors() {
    // The bad line leaves an error sentinel; checking still covers the
    // rest and reports its own diagnostics
    let source = "~ ~\nlet a: Int = \"x\"";
    let (_, diags) = analyze("resync.fern", source);
    let diags = diags.into_vec();
    assert!(diags
        .iter()
        .any(|d| matches!(d, Diagnostic::UnexpectedToken { .. })));
    assert!(diags
        .iter()
        .any(|d| matches!(d, Diagnostic::UnificationError { .. })));
}

// ----- Broader end-to-end coverage -----

#[test]
fn test_shadowing_in_same_scope_is_reported() {
    let source = "let x = 1\nlet x = 2\nx";
    let (_, diags) = analyze("shadow.fern", source);
    assert!(
        diags
            .iter()
            .any(|d| matches!(d, Diagnostic::ShadowingDisallowed { .. })),
        "{:?}",
        diags.into_vec()
    );
}

#[test]
fn test_inner_let_may_shadow_outer() {
    let source = "let x = \"s\"\nlet f\n  let x = 1\n  return x + 1\nlet _ = f";
    let (_, diags) = analyze("shadow2.fern", source);
    assert!(diags.is_empty(), "{:?}", diags.into_vec());
}

#[test]
fn test_class_method_dispatch_through_instances() {
    let source = "\
struct Point
  x: Int
  y: Int
class Area a
  let area : a -> Int
instance Area Point
  let area p = p.x * p.y
let twice p = area p + area p
let _ = twice { x = 2, y = 3 }
";
    let (tree, diags) = analyze("class.fern", source);
    assert!(diags.is_empty(), "{:?}", diags.into_vec());
    assert_no_unsolved_vars(&tree);
}

#[test]
fn test_constraint_propagates_to_caller_scheme() {
    let source = "\
let max3 a b c
  if a > b && a > c
    return a
  elif b > c
    return b
  else
    return c
let _ = max3 1 2 3
let _ = max3 \"x\" \"y\" \"z\"
";
    let (_, diags) = analyze("ord.fern", source);
    let diags = diags.into_vec();
    // Ord String has no instance, Ord Int does
    assert_eq!(diags.len(), 1, "{:?}", diags);
    assert!(matches!(diags[0], Diagnostic::ClassResolutionError { .. }));
}

#[test]
fn test_wrong_arity_constructor_pattern_is_reported() {
    // A 2-field constructor matched with one sub-pattern must not
    // type-check by folding the leftover field into the result
    let source = "enum Pair a b\n  MkPair a b\nlet firstOf p = match p\n  MkPair x => x";
    let (_, diags) = analyze("arity.fern", source);
    let diags = diags.into_vec();
    assert_eq!(diags.len(), 1, "{:?}", diags);
    assert!(matches!(diags[0], Diagnostic::UnificationError { .. }));
}

#[test]
fn test_qualified_name_misses_without_module_table() {
    let (_, diags) = analyze("mod.fern", "Core.List.map");
    let diags = diags.into_vec();
    assert!(
        diags
            .iter()
            .any(|d| matches!(d, Diagnostic::UnresolvedName { .. })),
        "{:?}",
        diags
    );
}

#[test]
fn test_exit_status_contract_matches_store() {
    // The CLI exits nonzero iff the store is non-empty; model both sides
    let (_, clean) = analyze("ok.fern", "let x = 1");
    assert!(clean.is_empty());
    let (_, dirty) = analyze("bad.fern", "let x: Int = \"s\"");
    assert!(!dirty.is_empty());
}

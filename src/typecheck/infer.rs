//! Constraint generation and solving over the CST.
//!
//! Equality constraints are dispatched eagerly into the union-find solver;
//! class obligations are deferred and resolved against the instance table
//! after solving. Sibling `let`s are grouped into strongly connected
//! components of the reference graph and inferred monomorphically per
//! component before any member generalizes.

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

use crate::cst::{LetBody, Literal, NodeData, NodeId, QualName, Tree};
use crate::diagnostics::{Diagnostic, DiagnosticStore};
use crate::interner::{self, Symbol};
use crate::scope::{Lookup, SymbolKind};
use crate::text::Span;
use crate::typecheck::types::{ClassConstraint, Scheme, TyVarId, Type};
use crate::typecheck::unify::UnifyState;

/// One method of a class: its name, the binder node carrying the method's
/// scheme, and the scheme-level variables standing for the class
/// parameters (used to substitute instance arguments).
#[derive(Debug, Clone)]
pub struct MethodInfo {
    pub name: Symbol,
    pub binder: NodeId,
    pub class_vars: Vec<Type>,
}

#[derive(Debug, Clone)]
pub struct ClassInfo {
    pub ty_vars: Vec<Symbol>,
    pub methods: Vec<MethodInfo>,
    pub superclasses: Vec<ClassConstraint>,
}

/// A registered instance head; rigid `Var`s are the instance parameters.
#[derive(Debug, Clone)]
pub struct InstanceInfo {
    pub args: Vec<Type>,
}

/// A deferred class obligation, waiting for resolution after solving.
#[derive(Debug, Clone)]
struct Obligation {
    node: NodeId,
    span: Span,
    class: Symbol,
    args: Vec<Type>,
}

enum VarBinding {
    /// Type variables become rigid `Var`s (instance heads, data decls)
    Rigid,
    /// Type variables become fresh unification variables (annotations and
    /// signatures, so qualified types flow through the solver)
    Fresh,
}

/// Memoizes the meaning of each lowercase type variable within one type
/// expression conversion.
struct TypeVarEnv {
    binding: VarBinding,
    map: HashMap<Symbol, Type>,
}

impl TypeVarEnv {
    fn rigid() -> Self {
        Self {
            binding: VarBinding::Rigid,
            map: HashMap::new(),
        }
    }

    fn fresh() -> Self {
        Self {
            binding: VarBinding::Fresh,
            map: HashMap::new(),
        }
    }
}

pub struct InferCtx<'a> {
    state: UnifyState,
    tree: &'a mut Tree,
    diags: &'a mut DiagnosticStore,
    /// Generalized bindings, keyed by binder node
    schemes: HashMap<NodeId, Scheme>,
    /// Monomorphic bindings (parameters, match binds, `mut` lets, bindings
    /// currently under inference)
    mono: HashMap<NodeId, Type>,
    builtin_values: HashMap<Symbol, Scheme>,
    builtin_prefix: HashMap<Symbol, Scheme>,
    builtin_types: HashSet<Symbol>,
    classes: HashMap<Symbol, ClassInfo>,
    instances: HashMap<Symbol, Vec<InstanceInfo>>,
    /// Instance declarations whose method bodies are checked after the
    /// top-level bindings are known
    instance_decls: Vec<(NodeId, Symbol, Vec<Type>, Vec<NodeId>)>,
    structs: HashMap<Symbol, (NodeId, Vec<(Symbol, Type)>)>,
    enums: HashMap<Symbol, usize>,
    /// Declared field count per enum constructor, for pattern arity checks
    ctor_arity: HashMap<NodeId, usize>,
    obligations: Vec<Obligation>,
    /// Monomorphic environment frames; generalization must not quantify
    /// variables free in any frame
    env_frames: Vec<Vec<Type>>,
}

pub fn check(tree: &mut Tree, diags: &mut DiagnosticStore) {
    InferCtx::new(tree, diags).run();
}

impl<'a> InferCtx<'a> {
    pub fn new(tree: &'a mut Tree, diags: &'a mut DiagnosticStore) -> Self {
        let mut ctx = InferCtx {
            state: UnifyState::new(),
            tree,
            diags,
            schemes: HashMap::new(),
            mono: HashMap::new(),
            builtin_values: HashMap::new(),
            builtin_prefix: HashMap::new(),
            builtin_types: HashSet::new(),
            classes: HashMap::new(),
            instances: HashMap::new(),
            instance_decls: Vec::new(),
            structs: HashMap::new(),
            enums: HashMap::new(),
            ctor_arity: HashMap::new(),
            obligations: Vec::new(),
            env_frames: Vec::new(),
        };
        ctx.install_prelude();
        ctx
    }

    pub fn run(&mut self) {
        let root = self.tree.root();
        let elements = match self.tree.data(root) {
            NodeData::SourceFile { elements } => elements.clone(),
            _ => return,
        };

        // Type declarations: names first so bodies can refer forward
        for &element in &elements {
            match self.tree.data(element) {
                NodeData::StructDecl { name, .. } => {
                    let name = *name;
                    self.structs.insert(name, (element, Vec::new()));
                }
                NodeData::EnumDecl { name, ty_vars, .. } => {
                    let (name, arity) = (*name, ty_vars.len());
                    self.enums.insert(name, arity);
                }
                _ => {}
            }
        }
        for &element in &elements {
            match self.tree.data(element).clone() {
                NodeData::StructDecl { name, fields } => self.register_struct(name, &fields),
                NodeData::EnumDecl {
                    name,
                    ty_vars,
                    members,
                } => self.register_enum(name, &ty_vars, &members),
                _ => {}
            }
        }
        for &element in &elements {
            if matches!(self.tree.data(element), NodeData::ClassDecl { .. }) {
                self.register_class(element);
            }
        }
        for &element in &elements {
            if matches!(self.tree.data(element), NodeData::InstanceDecl { .. }) {
                self.register_instance(element);
            }
        }

        // Top-level bindings and statements
        let ret = self.state.fresh();
        self.check_block(&elements, &ret);

        // Instance method bodies, now that top-level schemes exist
        self.check_instance_bodies();

        // Remaining class obligations
        self.resolve_obligations();

        self.finalize();
    }

    // ----- Prelude -----

    fn install_prelude(&mut self) {
        for name in ["Int", "String", "Bool"] {
            self.builtin_types.insert(interner::intern(name));
        }

        let int2 = Type::fun(Type::int(), Type::fun(Type::int(), Type::int()));
        for op in ["+", "-", "*", "/", "%", "^"] {
            self.builtin_values
                .insert(interner::intern(op), Scheme::mono(int2.clone()));
        }
        let str2 = Type::fun(Type::string(), Type::fun(Type::string(), Type::string()));
        self.builtin_values
            .insert(interner::intern("++"), Scheme::mono(str2));
        let bool2 = Type::fun(Type::boolean(), Type::fun(Type::boolean(), Type::boolean()));
        for op in ["&&", "||"] {
            self.builtin_values
                .insert(interner::intern(op), Scheme::mono(bool2.clone()));
        }

        let a = interner::intern("a");
        let va = Type::Var(a);
        let cmp = Type::fun(va.clone(), Type::fun(va.clone(), Type::boolean()));
        let eq_class = interner::intern("Eq");
        let ord_class = interner::intern("Ord");
        self.builtin_values.insert(
            interner::intern("=="),
            Scheme {
                vars: vec![a],
                constraints: vec![ClassConstraint {
                    class: eq_class,
                    args: vec![va.clone()],
                }],
                ty: cmp.clone(),
            },
        );
        for op in ["<", "<=", ">", ">="] {
            self.builtin_values.insert(
                interner::intern(op),
                Scheme {
                    vars: vec![a],
                    constraints: vec![ClassConstraint {
                        class: ord_class,
                        args: vec![va.clone()],
                    }],
                    ty: cmp.clone(),
                },
            );
        }

        self.builtin_values
            .insert(interner::intern("True"), Scheme::mono(Type::boolean()));
        self.builtin_values
            .insert(interner::intern("False"), Scheme::mono(Type::boolean()));

        self.builtin_prefix.insert(
            interner::intern("-"),
            Scheme::mono(Type::fun(Type::int(), Type::int())),
        );
        self.builtin_prefix.insert(
            interner::intern("!"),
            Scheme::mono(Type::fun(Type::boolean(), Type::boolean())),
        );

        self.classes.insert(
            eq_class,
            ClassInfo {
                ty_vars: vec![a],
                methods: Vec::new(),
                superclasses: Vec::new(),
            },
        );
        self.classes.insert(
            ord_class,
            ClassInfo {
                ty_vars: vec![a],
                methods: Vec::new(),
                superclasses: vec![ClassConstraint {
                    class: eq_class,
                    args: vec![va],
                }],
            },
        );
        self.instances.insert(
            eq_class,
            vec![
                InstanceInfo {
                    args: vec![Type::int()],
                },
                InstanceInfo {
                    args: vec![Type::string()],
                },
                InstanceInfo {
                    args: vec![Type::boolean()],
                },
            ],
        );
        self.instances.insert(
            ord_class,
            vec![InstanceInfo {
                args: vec![Type::int()],
            }],
        );
    }

    // ----- Declaration registration -----

    fn register_struct(&mut self, name: Symbol, fields: &[NodeId]) {
        let mut env = TypeVarEnv::rigid();
        let mut converted = Vec::new();
        for &field in fields {
            if let NodeData::StructField { name: fname, ty } = self.tree.data(field).clone() {
                let ty = self.convert_type(ty, &mut env);
                converted.push((fname, ty));
            }
        }
        if let Some(entry) = self.structs.get_mut(&name) {
            entry.1 = converted;
        }
    }

    fn register_enum(&mut self, name: Symbol, ty_vars: &[Symbol], members: &[NodeId]) {
        let head = ty_vars
            .iter()
            .fold(Type::Con(name), |acc, v| Type::app(acc, Type::Var(*v)));
        for &member in members {
            let field_tys: Vec<NodeId> = match self.tree.data(member).clone() {
                NodeData::TupleMember { elements, .. } => elements,
                NodeData::RecordMember { fields, .. } => fields
                    .iter()
                    .filter_map(|&f| match self.tree.data(f) {
                        NodeData::StructField { ty, .. } => Some(*ty),
                        _ => None,
                    })
                    .collect(),
                _ => continue,
            };
            let mut env = TypeVarEnv::rigid();
            let converted: Vec<Type> = field_tys
                .iter()
                .map(|&t| self.convert_type(t, &mut env))
                .collect();
            self.ctor_arity.insert(member, converted.len());
            let ctor_ty = Type::fun_from(converted.into_iter(), head.clone());
            self.schemes.insert(
                member,
                Scheme {
                    vars: ty_vars.to_vec(),
                    constraints: Vec::new(),
                    ty: ctor_ty,
                },
            );
        }
    }

    fn register_class(&mut self, decl: NodeId) {
        let NodeData::ClassDecl {
            name,
            ty_vars,
            members,
            ..
        } = self.tree.data(decl).clone()
        else {
            return;
        };
        self.classes.insert(
            name,
            ClassInfo {
                ty_vars: ty_vars.clone(),
                methods: Vec::new(),
                superclasses: Vec::new(),
            },
        );

        for &member in &members {
            let NodeData::LetDecl {
                pattern,
                annotation,
                ..
            } = self.tree.data(member).clone()
            else {
                continue;
            };
            let Some(bind) = simple_bind(self.tree, pattern) else {
                continue;
            };
            let NodeData::BindPattern(method_name) = *self.tree.data(bind) else {
                continue;
            };

            let mark = self.obligations.len();
            // Fresh class parameters per method; the class constraint is
            // absorbed into the scheme by generalization
            let mut env = TypeVarEnv::fresh();
            let alphas: Vec<Type> = ty_vars
                .iter()
                .map(|&v| {
                    let t = self.state.fresh();
                    env.map.insert(v, t.clone());
                    t
                })
                .collect();
            self.obligations.push(Obligation {
                node: member,
                span: self.tree.span(member),
                class: name,
                args: alphas.clone(),
            });

            let sig = match annotation {
                Some(ann) => self.convert_type(ann, &mut env),
                None => self.state.fresh(),
            };
            self.mono.insert(bind, sig);
            self.tree.set_ty(bind, self.mono[&bind].clone());
            self.generalize(bind, mark);

            let class_vars: Vec<Type> =
                alphas.iter().map(|a| self.state.zonk(a.clone())).collect();
            if let Some(info) = self.classes.get_mut(&name) {
                info.methods.push(MethodInfo {
                    name: method_name,
                    binder: bind,
                    class_vars,
                });
            }
        }
    }

    fn register_instance(&mut self, decl: NodeId) {
        let NodeData::InstanceDecl {
            class,
            args,
            members,
        } = self.tree.data(decl).clone()
        else {
            return;
        };
        let span = self.tree.span(decl);
        let Some(info) = self.classes.get(&class) else {
            self.diags.push(Diagnostic::UnresolvedName {
                span,
                node: decl,
                modules: Vec::new(),
                name: class,
                kind: SymbolKind::Class,
            });
            return;
        };
        let arity = info.ty_vars.len();

        let mut env = TypeVarEnv::rigid();
        let arg_tys: Vec<Type> = args
            .iter()
            .map(|&a| self.convert_type(a, &mut env))
            .collect();
        if arg_tys.len() != arity {
            self.diags.push(Diagnostic::ClassResolutionError {
                span,
                node: decl,
                class,
                args: arg_tys,
            });
            return;
        }
        self.instances
            .entry(class)
            .or_default()
            .push(InstanceInfo {
                args: arg_tys.clone(),
            });
        self.instance_decls.push((decl, class, arg_tys, members));
    }

    fn check_instance_bodies(&mut self) {
        let instance_decls = std::mem::take(&mut self.instance_decls);
        for (_decl, class, arg_tys, members) in instance_decls {
            let Some(info) = self.classes.get(&class).cloned() else {
                continue;
            };
            for &member in &members {
                let NodeData::LetDecl { pattern, .. } = self.tree.data(member).clone() else {
                    continue;
                };
                let Some(bind) = simple_bind(self.tree, pattern) else {
                    continue;
                };
                let NodeData::BindPattern(method_name) = *self.tree.data(bind) else {
                    continue;
                };

                let Some(method) = info.methods.iter().find(|m| m.name == method_name) else {
                    self.diags.push(Diagnostic::UnresolvedName {
                        span: self.tree.span(member),
                        node: member,
                        modules: Vec::new(),
                        name: method_name,
                        kind: SymbolKind::Var,
                    });
                    continue;
                };

                let scheme = self.schemes[&method.binder].clone();
                let expected =
                    self.instantiate_for_instance(&scheme, method, &arg_tys, class, member);
                // The method may call itself through the instance scope
                self.mono.insert(bind, expected.clone());
                self.tree.set_ty(bind, expected.clone());
                let actual = self.infer_let_decl_body(member);
                self.unify_at(member, &expected, &actual);
            }
        }
    }

    // ----- Let groups (SCC) and blocks -----

    /// Infer the elements of one block: sibling `let`s first, grouped into
    /// strongly connected components, then statements in order. Returns
    /// the block's value type.
    fn check_block(&mut self, elements: &[NodeId], ret: &Type) -> Type {
        self.check_let_group(elements);
        let mut value = Type::unit();
        for &element in elements {
            value = match self.tree.data(element) {
                NodeData::LetDecl { .. }
                | NodeData::StructDecl { .. }
                | NodeData::EnumDecl { .. }
                | NodeData::ClassDecl { .. }
                | NodeData::InstanceDecl { .. } => Type::unit(),
                _ => self.infer_statement(element, ret),
            };
        }
        value
    }

    fn check_let_group(&mut self, elements: &[NodeId]) {
        let lets: Vec<NodeId> = elements
            .iter()
            .copied()
            .filter(|&e| matches!(self.tree.data(e), NodeData::LetDecl { .. }))
            .collect();
        if lets.is_empty() {
            return;
        }

        // Seed every binding with a monomorphic placeholder so recursive
        // and forward references resolve to the same variable
        let mut betas: Vec<Type> = Vec::new();
        let mut beta_ids: Vec<TyVarId> = Vec::new();
        let mut binds: Vec<Option<NodeId>> = Vec::new();
        let mut muts: Vec<bool> = Vec::new();
        for &decl in &lets {
            let NodeData::LetDecl {
                pattern, is_mut, ..
            } = self.tree.data(decl).clone()
            else {
                unreachable!()
            };
            let bind = simple_bind(self.tree, pattern);
            let beta = match bind.and_then(|b| self.mono.get(&b)).cloned() {
                // A forward reference already allocated this binding's var
                Some(existing) => existing,
                None => {
                    let fresh = self.state.fresh();
                    match bind {
                        Some(b) => {
                            self.mono.insert(b, fresh.clone());
                            self.tree.set_ty(b, fresh.clone());
                        }
                        None => self.infer_pattern(pattern, &fresh),
                    }
                    fresh
                }
            };
            let beta_id = match &beta {
                Type::Unif(id) => *id,
                _ => self.state.fresh_var(),
            };
            betas.push(beta);
            beta_ids.push(beta_id);
            binds.push(bind);
            muts.push(is_mut);
        }

        // Reference graph over sibling bindings
        let mut names: HashMap<Symbol, usize> = HashMap::new();
        for (i, &decl) in lets.iter().enumerate() {
            if let NodeData::LetDecl { pattern, .. } = self.tree.data(decl) {
                for sym in pattern_names(self.tree, *pattern) {
                    names.insert(sym, i);
                }
            }
        }
        let edges: Vec<BTreeSet<usize>> = lets
            .iter()
            .enumerate()
            .map(|(i, &decl)| collect_sibling_refs(self.tree, decl, &names, i))
            .collect();
        let components = tarjan_scc(lets.len(), &edges);

        self.env_frames.push(betas.clone());
        let frame_idx = self.env_frames.len() - 1;

        for component in components {
            let mark = self.obligations.len();
            for &i in &component {
                let actual = self.infer_let_decl_body(lets[i]);
                let beta = betas[i].clone();
                self.unify_at(lets[i], &beta, &actual);
            }
            // The component's own placeholders must not block its
            // generalization
            let removed: HashSet<TyVarId> = component.iter().map(|&i| beta_ids[i]).collect();
            self.env_frames[frame_idx]
                .retain(|t| !matches!(t, Type::Unif(id) if removed.contains(id)));
            for &i in &component {
                if let Some(bind) = binds[i] {
                    if !muts[i] {
                        self.generalize(bind, mark);
                    }
                }
            }
        }

        self.env_frames.pop();
    }

    /// Infer the value of one `let` declaration: parameters, body, and
    /// annotation, folded into a function type.
    fn infer_let_decl_body(&mut self, decl: NodeId) -> Type {
        let NodeData::LetDecl {
            params,
            annotation,
            body,
            ..
        } = self.tree.data(decl).clone()
        else {
            return Type::Error;
        };

        let mut param_tys = Vec::new();
        for &param in &params {
            let NodeData::Param {
                pattern,
                annotation,
            } = self.tree.data(param).clone()
            else {
                continue;
            };
            let alpha = self.state.fresh();
            self.infer_pattern(pattern, &alpha);
            if let Some(ann) = annotation {
                let mut env = TypeVarEnv::fresh();
                let expected = self.convert_type(ann, &mut env);
                self.unify_at(param, &expected, &alpha);
            }
            param_tys.push(alpha);
        }

        self.env_frames.push(param_tys.clone());
        let ret = self.state.fresh();
        let mut body_ty = match body {
            Some(LetBody::Expr(expr)) => self.infer_expr(expr),
            Some(LetBody::Block(elements)) => {
                let value = self.check_block(&elements, &ret);
                self.unify_at(decl, &ret, &value);
                ret
            }
            None => self.state.fresh(),
        };
        self.env_frames.pop();

        if let Some(ann) = annotation {
            let mut env = TypeVarEnv::fresh();
            let expected = self.convert_type(ann, &mut env);
            self.unify_at(decl, &expected, &body_ty);
            body_ty = expected;
        }

        Type::fun_from(param_tys.into_iter(), body_ty)
    }

    // ----- Statements -----

    fn infer_statement(&mut self, node: NodeId, ret: &Type) -> Type {
        match self.tree.data(node).clone() {
            NodeData::ExprStmt(expr) => self.infer_expr(expr),
            NodeData::ReturnStmt(expr) => {
                let value = match expr {
                    Some(e) => self.infer_expr(e),
                    None => Type::unit(),
                };
                self.unify_at(node, ret, &value);
                ret.clone()
            }
            NodeData::IfStmt { parts } => self.infer_if(node, &parts, ret),
            NodeData::Error => Type::Error,
            _ => Type::unit(),
        }
    }

    /// Conditions unify with Bool; with an `else` present the part values
    /// unify with each other and become the statement's value, otherwise
    /// the value is unit.
    fn infer_if(&mut self, node: NodeId, parts: &[NodeId], ret: &Type) -> Type {
        let mut values = Vec::new();
        let mut has_else = false;
        for &part in parts {
            let NodeData::IfPart { condition, body } = self.tree.data(part).clone() else {
                continue;
            };
            match condition {
                Some(cond) => {
                    let cond_ty = self.infer_expr(cond);
                    self.unify_at(cond, &Type::boolean(), &cond_ty);
                }
                None => has_else = true,
            }
            let value = self.check_block(&body, ret);
            values.push(value);
        }
        if has_else && !values.is_empty() {
            let first = values[0].clone();
            for value in &values[1..] {
                self.unify_at(node, &first, value);
            }
            first
        } else {
            Type::unit()
        }
    }

    // ----- Expressions -----

    fn infer_expr(&mut self, node: NodeId) -> Type {
        let ty = self.infer_expr_inner(node);
        self.tree.set_ty(node, ty.clone());
        ty
    }

    fn infer_expr_inner(&mut self, node: NodeId) -> Type {
        match self.tree.data(node).clone() {
            NodeData::ConstExpr(Literal::Int(_)) => Type::int(),
            NodeData::ConstExpr(Literal::Str(_)) => Type::string(),
            NodeData::RefExpr(name) => self.resolve_value_ref(node, &name),
            NodeData::CallExpr { callee, args } => {
                let callee_ty = self.infer_expr(callee);
                let arg_tys: Vec<Type> = args.iter().map(|&a| self.infer_expr(a)).collect();
                let result = self.state.fresh();
                let expected = Type::fun_from(arg_tys.into_iter(), result.clone());
                self.unify_at(node, &callee_ty, &expected);
                result
            }
            NodeData::InfixExpr {
                left,
                op,
                op_span,
                right,
            } => {
                let op_ty = match self.builtin_values.get(&op).cloned() {
                    Some(scheme) => self.instantiate(&scheme, node),
                    None => {
                        self.diags.push(Diagnostic::UnresolvedName {
                            span: op_span,
                            node,
                            modules: Vec::new(),
                            name: op,
                            kind: SymbolKind::Var,
                        });
                        Type::Error
                    }
                };
                let left_ty = self.infer_expr(left);
                let right_ty = self.infer_expr(right);
                let result = self.state.fresh();
                let expected =
                    Type::fun(left_ty, Type::fun(right_ty, result.clone()));
                self.unify_at(node, &op_ty, &expected);
                result
            }
            NodeData::PrefixExpr {
                op,
                op_span,
                operand,
            } => {
                let op_ty = match self.builtin_prefix.get(&op).cloned() {
                    Some(scheme) => self.instantiate(&scheme, node),
                    None => {
                        self.diags.push(Diagnostic::UnresolvedName {
                            span: op_span,
                            node,
                            modules: Vec::new(),
                            name: op,
                            kind: SymbolKind::Var,
                        });
                        Type::Error
                    }
                };
                let operand_ty = self.infer_expr(operand);
                let result = self.state.fresh();
                let expected = Type::fun(operand_ty, result.clone());
                self.unify_at(node, &op_ty, &expected);
                result
            }
            NodeData::MemberExpr { object, field } => {
                let object_ty = self.infer_expr(object);
                let zonked = self.state.zonk(object_ty);
                match &zonked {
                    Type::Error => Type::Error,
                    Type::Con(name) => {
                        if let Some((_, fields)) = self.structs.get(name) {
                            if let Some((_, field_ty)) =
                                fields.iter().find(|(fname, _)| *fname == field)
                            {
                                return field_ty.clone();
                            }
                        }
                        self.unknown_member(node, field)
                    }
                    _ => self.unknown_member(node, field),
                }
            }
            NodeData::TupleExpr(elements) => {
                Type::Tuple(elements.iter().map(|&e| self.infer_expr(e)).collect())
            }
            NodeData::NestedExpr(inner) => self.infer_expr(inner),
            NodeData::MatchExpr { scrutinee, cases } => {
                let scrutinee_ty = self.infer_expr(scrutinee);
                let result = self.state.fresh();
                for &case in &cases {
                    let NodeData::MatchCase { pattern, value } = self.tree.data(case).clone()
                    else {
                        continue;
                    };
                    self.infer_pattern(pattern, &scrutinee_ty);
                    let value_ty = self.infer_expr(value);
                    self.unify_at(value, &result, &value_ty);
                }
                result
            }
            NodeData::RecordExpr(fields) => self.infer_record(node, &fields),
            NodeData::Error => Type::Error,
            _ => Type::Error,
        }
    }

    fn unknown_member(&mut self, node: NodeId, field: Symbol) -> Type {
        self.diags.push(Diagnostic::UnresolvedName {
            span: self.tree.span(node),
            node,
            modules: Vec::new(),
            name: field,
            kind: SymbolKind::Var,
        });
        Type::Error
    }

    /// Record literals resolve nominally: the unique struct whose field
    /// name set matches the literal.
    fn infer_record(&mut self, node: NodeId, fields: &[NodeId]) -> Type {
        let mut literal: Vec<(Symbol, NodeId)> = Vec::new();
        for &field in fields {
            if let NodeData::RecordExprField { name, value } = self.tree.data(field) {
                literal.push((*name, *value));
            }
        }
        let field_names: BTreeSet<Symbol> = literal.iter().map(|(n, _)| *n).collect();

        let mut candidates: Vec<(Symbol, NodeId)> = self
            .structs
            .iter()
            .filter(|(_, (_, decl_fields))| {
                decl_fields.len() == field_names.len()
                    && decl_fields.iter().all(|(n, _)| field_names.contains(n))
            })
            .map(|(name, (decl, _))| (*name, *decl))
            .collect();
        candidates.sort_by_key(|(_, decl)| *decl);

        match candidates.as_slice() {
            [(struct_name, _)] => {
                let struct_name = *struct_name;
                let decl_fields = self.structs[&struct_name].1.clone();
                for (fname, value) in literal {
                    let value_ty = self.infer_expr(value);
                    if let Some((_, expected)) = decl_fields.iter().find(|(n, _)| *n == fname) {
                        self.unify_at(value, expected, &value_ty);
                    }
                }
                Type::Con(struct_name)
            }
            [] => {
                for (_, value) in literal {
                    self.infer_expr(value);
                }
                self.diags.push(Diagnostic::UnresolvedName {
                    span: self.tree.span(node),
                    node,
                    modules: Vec::new(),
                    name: interner::intern("record literal"),
                    kind: SymbolKind::Type,
                });
                Type::Error
            }
            many => {
                for (_, value) in literal {
                    self.infer_expr(value);
                }
                self.diags.push(Diagnostic::AmbiguousName {
                    span: self.tree.span(node),
                    node,
                    name: interner::intern("record literal"),
                    kind: SymbolKind::Type,
                    candidates: many.iter().map(|(_, decl)| *decl).collect(),
                });
                Type::Error
            }
        }
    }

    fn resolve_value_ref(&mut self, node: NodeId, name: &QualName) -> Type {
        match self.tree.lookup(node, name, SymbolKind::Var, self.diags) {
            Lookup::Found(binder) => {
                if let Some(scheme) = self.schemes.get(&binder).cloned() {
                    return self.instantiate(&scheme, node);
                }
                if let Some(ty) = self.mono.get(&binder).cloned() {
                    return ty;
                }
                // Forward reference to a sibling not yet seeded: allocate
                // its placeholder now, the group inference will reuse it
                let fresh = self.state.fresh();
                self.mono.insert(binder, fresh.clone());
                fresh
            }
            Lookup::Ambiguous(candidates) => {
                self.diags.push(Diagnostic::AmbiguousName {
                    span: self.tree.span(node),
                    node,
                    name: name.name,
                    kind: SymbolKind::Var,
                    candidates,
                });
                Type::Error
            }
            Lookup::Missing => {
                if name.modules.is_empty() {
                    if let Some(scheme) = self.builtin_values.get(&name.name).cloned() {
                        return self.instantiate(&scheme, node);
                    }
                }
                self.diags.push(Diagnostic::UnresolvedName {
                    span: self.tree.span(node),
                    node,
                    modules: name.modules.clone(),
                    name: name.name,
                    kind: SymbolKind::Var,
                });
                Type::Error
            }
        }
    }

    // ----- Patterns -----

    fn infer_pattern(&mut self, pattern: NodeId, expected: &Type) {
        match self.tree.data(pattern).clone() {
            NodeData::BindPattern(_) => {
                self.mono.insert(pattern, expected.clone());
                self.tree.set_ty(pattern, expected.clone());
            }
            NodeData::LiteralPattern(Literal::Int(_)) => {
                self.tree.set_ty(pattern, Type::int());
                self.unify_at(pattern, expected, &Type::int());
            }
            NodeData::LiteralPattern(Literal::Str(_)) => {
                self.tree.set_ty(pattern, Type::string());
                self.unify_at(pattern, expected, &Type::string());
            }
            NodeData::NamedPattern { name, args } => {
                let mut declared_arity = None;
                let ctor_ty = match self
                    .tree
                    .lookup(pattern, &QualName::plain(name), SymbolKind::Var, self.diags)
                {
                    Lookup::Found(binder) => {
                        declared_arity = self.ctor_arity.get(&binder).copied();
                        match self.schemes.get(&binder).cloned() {
                            Some(scheme) => self.instantiate(&scheme, pattern),
                            None => self.mono.get(&binder).cloned().unwrap_or(Type::Error),
                        }
                    }
                    _ => {
                        if let Some(scheme) = self.builtin_values.get(&name).cloned() {
                            self.instantiate(&scheme, pattern)
                        } else {
                            self.diags.push(Diagnostic::UnresolvedName {
                                span: self.tree.span(pattern),
                                node: pattern,
                                modules: Vec::new(),
                                name,
                                kind: SymbolKind::Var,
                            });
                            Type::Error
                        }
                    }
                };
                let arg_tys: Vec<Type> = args.iter().map(|_| self.state.fresh()).collect();
                let expected_ctor =
                    Type::fun_from(arg_tys.iter().cloned(), expected.clone());
                // Structural unification only catches over-application: an
                // under-applied constructor folds its leftover fields into
                // the result position. The declared field count decides.
                if declared_arity.is_some_and(|declared| declared != args.len()) {
                    let left = self.state.zonk(ctor_ty);
                    let right = self.state.zonk(expected_ctor);
                    self.diags.push(Diagnostic::UnificationError {
                        span: self.tree.span(pattern),
                        node: pattern,
                        left,
                        right,
                    });
                    // Suppress follow-on mismatches on the scrutinee
                    let _ = self.state.unify(expected, &Type::Error);
                    for (&arg, arg_ty) in args.iter().zip(&arg_tys) {
                        self.infer_pattern(arg, arg_ty);
                    }
                    self.tree.set_ty(pattern, Type::Error);
                    return;
                }
                self.unify_at(pattern, &ctor_ty, &expected_ctor);
                for (&arg, arg_ty) in args.iter().zip(&arg_tys) {
                    self.infer_pattern(arg, arg_ty);
                }
                self.tree.set_ty(pattern, expected.clone());
            }
            NodeData::NestedPattern(inner) => {
                self.infer_pattern(inner, expected);
                self.tree.set_ty(pattern, expected.clone());
            }
            _ => {}
        }
    }

    // ----- Schemes -----

    fn instantiate(&mut self, scheme: &Scheme, node: NodeId) -> Type {
        if scheme.vars.is_empty() && scheme.constraints.is_empty() {
            return scheme.ty.clone();
        }
        let mut subst: HashMap<Symbol, Type> = HashMap::new();
        for &v in &scheme.vars {
            let fresh = self.state.fresh();
            subst.insert(v, fresh);
        }
        for constraint in &scheme.constraints {
            let args = constraint
                .args
                .iter()
                .map(|a| subst_vars(a, &subst))
                .collect();
            self.obligations.push(Obligation {
                node,
                span: self.tree.span(node),
                class: constraint.class,
                args,
            });
        }
        subst_vars(&scheme.ty, &subst)
    }

    /// Instantiate a class method's scheme for an instance: class
    /// parameters take the instance's head types, other quantified
    /// variables stay fresh, and the class's own constraint is discharged
    /// by the instance under check.
    fn instantiate_for_instance(
        &mut self,
        scheme: &Scheme,
        method: &MethodInfo,
        inst_args: &[Type],
        class: Symbol,
        node: NodeId,
    ) -> Type {
        let mut subst: HashMap<Symbol, Type> = HashMap::new();
        for (cv, inst_ty) in method.class_vars.iter().zip(inst_args) {
            if let Type::Var(sym) = cv {
                subst.insert(*sym, inst_ty.clone());
            }
        }
        for &v in &scheme.vars {
            if !subst.contains_key(&v) {
                let fresh = self.state.fresh();
                subst.insert(v, fresh);
            }
        }
        for constraint in &scheme.constraints {
            if constraint.class == class && constraint.args == method.class_vars {
                continue;
            }
            let args = constraint
                .args
                .iter()
                .map(|a| subst_vars(a, &subst))
                .collect();
            self.obligations.push(Obligation {
                node,
                span: self.tree.span(node),
                class: constraint.class,
                args,
            });
        }
        subst_vars(&scheme.ty, &subst)
    }

    /// Generalize a binding: quantify the variables of its type that are
    /// free in no enclosing monomorphic frame and mentioned by no escaping
    /// obligation. Obligations wholly over quantified variables become the
    /// scheme's constraint prefix. Quantified variables are pinned to
    /// their scheme names in the solver so body annotations zonk cleanly.
    fn generalize(&mut self, bind: NodeId, mark: usize) {
        let Some(ty) = self.mono.get(&bind).cloned() else {
            return;
        };
        let ty = self.state.zonk(ty);

        let mut env_vars: HashSet<TyVarId> = HashSet::new();
        let frame_tys: Vec<Type> = self.env_frames.iter().flatten().cloned().collect();
        for t in frame_tys {
            for v in self.state.free_unif_vars(&t) {
                env_vars.insert(v);
            }
        }

        let candidates: Vec<TyVarId> = self
            .state
            .free_unif_vars(&ty)
            .into_iter()
            .filter(|v| !env_vars.contains(v))
            .collect();
        let mut candidate_set: HashSet<TyVarId> = candidates.iter().copied().collect();

        // A variable mentioned by a constraint that escapes this binding
        // must not be quantified
        loop {
            let mut to_remove: Vec<TyVarId> = Vec::new();
            for (i, obligation) in self.obligations.iter().enumerate() {
                let args = obligation.args.clone();
                let mut vars: Vec<TyVarId> = Vec::new();
                for arg in &args {
                    for v in self.state.free_unif_vars(arg) {
                        if !vars.contains(&v) {
                            vars.push(v);
                        }
                    }
                }
                if vars.is_empty() {
                    continue;
                }
                let any_inside = vars.iter().any(|v| candidate_set.contains(v));
                let all_inside = vars.iter().all(|v| candidate_set.contains(v));
                if any_inside && (i < mark || !all_inside) {
                    to_remove.extend(vars.into_iter().filter(|v| candidate_set.contains(v)));
                }
            }
            if to_remove.is_empty() {
                break;
            }
            for v in to_remove {
                candidate_set.remove(&v);
            }
        }

        // Constraints wholly inside the quantifier become the scheme prefix
        let mut absorbed: Vec<ClassConstraint> = Vec::new();
        let obligations = std::mem::take(&mut self.obligations);
        let mut kept = Vec::new();
        for (i, obligation) in obligations.into_iter().enumerate() {
            let mut vars: Vec<TyVarId> = Vec::new();
            for arg in &obligation.args {
                for v in self.state.free_unif_vars(arg) {
                    if !vars.contains(&v) {
                        vars.push(v);
                    }
                }
            }
            if i >= mark && !vars.is_empty() && vars.iter().all(|v| candidate_set.contains(v)) {
                absorbed.push(ClassConstraint {
                    class: obligation.class,
                    args: obligation.args,
                });
            } else {
                kept.push(obligation);
            }
        }
        self.obligations = kept;

        let mut var_names: Vec<Symbol> = Vec::new();
        for (i, v) in candidates
            .iter()
            .filter(|v| candidate_set.contains(*v))
            .enumerate()
        {
            let name = interner::intern(&scheme_var_name(i));
            self.state.solve(*v, Type::Var(name));
            var_names.push(name);
        }

        let ty = self.state.zonk(ty);
        let mut constraints: Vec<ClassConstraint> = Vec::new();
        for c in absorbed {
            let c = ClassConstraint {
                class: c.class,
                args: c.args.into_iter().map(|a| self.state.zonk(a)).collect(),
            };
            if !constraints.contains(&c) {
                constraints.push(c);
            }
        }

        self.schemes.insert(
            bind,
            Scheme {
                vars: var_names,
                constraints,
                ty,
            },
        );
        self.mono.remove(&bind);
    }

    // ----- Type expression conversion -----

    fn known_type(&self, name: Symbol) -> bool {
        self.builtin_types.contains(&name)
            || self.structs.contains_key(&name)
            || self.enums.contains_key(&name)
    }

    fn convert_type(&mut self, node: NodeId, env: &mut TypeVarEnv) -> Type {
        let ty = match self.tree.data(node).clone() {
            NodeData::RefType(name) => {
                if name.modules.is_empty() && self.known_type(name.name) {
                    Type::Con(name.name)
                } else {
                    self.diags.push(Diagnostic::UnresolvedName {
                        span: self.tree.span(node),
                        node,
                        modules: name.modules.clone(),
                        name: name.name,
                        kind: SymbolKind::Type,
                    });
                    Type::Error
                }
            }
            NodeData::VarType(sym) => {
                if let Some(existing) = env.map.get(&sym) {
                    existing.clone()
                } else {
                    let ty = match env.binding {
                        VarBinding::Rigid => Type::Var(sym),
                        VarBinding::Fresh => self.state.fresh(),
                    };
                    env.map.insert(sym, ty.clone());
                    ty
                }
            }
            NodeData::AppType { callee, args } => {
                let mut ty = self.convert_type(callee, env);
                for &arg in &args {
                    let arg_ty = self.convert_type(arg, env);
                    ty = Type::app(ty, arg_ty);
                }
                ty
            }
            NodeData::ArrowType { from, to } => {
                let from = self.convert_type(from, env);
                let to = self.convert_type(to, env);
                Type::fun(from, to)
            }
            NodeData::QualifiedType { constraints, body } => {
                for &constraint in &constraints {
                    self.convert_constraint(constraint, env);
                }
                self.convert_type(body, env)
            }
            NodeData::TupleType(elements) => Type::Tuple(
                elements
                    .iter()
                    .map(|&e| self.convert_type(e, env))
                    .collect(),
            ),
            NodeData::NestedType(inner) => self.convert_type(inner, env),
            _ => Type::Error,
        };
        self.tree.set_ty(node, ty.clone());
        ty
    }

    fn convert_constraint(&mut self, node: NodeId, env: &mut TypeVarEnv) {
        match self.tree.data(node).clone() {
            NodeData::ClassConstraint { class, args } => {
                if !self.classes.contains_key(&class) {
                    self.diags.push(Diagnostic::UnresolvedName {
                        span: self.tree.span(node),
                        node,
                        modules: Vec::new(),
                        name: class,
                        kind: SymbolKind::Class,
                    });
                    return;
                }
                let args = args.iter().map(|&a| self.convert_type(a, env)).collect();
                self.obligations.push(Obligation {
                    node,
                    span: self.tree.span(node),
                    class,
                    args,
                });
            }
            NodeData::EqualityConstraint { left, right } => {
                let left_ty = self.convert_type(left, env);
                let right_ty = self.convert_type(right, env);
                self.unify_at(node, &left_ty, &right_ty);
            }
            _ => {}
        }
    }

    // ----- Obligation resolution -----

    fn resolve_obligations(&mut self) {
        let mut queue: VecDeque<Obligation> = std::mem::take(&mut self.obligations).into();
        while let Some(obligation) = queue.pop_front() {
            let args: Vec<Type> = obligation
                .args
                .iter()
                .map(|a| self.state.zonk(a.clone()))
                .collect();
            if args.iter().any(contains_error) {
                continue;
            }

            let instances = self
                .instances
                .get(&obligation.class)
                .cloned()
                .unwrap_or_default();
            let matching: Vec<&InstanceInfo> = instances
                .iter()
                .filter(|inst| {
                    inst.args.len() == args.len() && {
                        let mut subst = HashMap::new();
                        inst.args
                            .iter()
                            .zip(&args)
                            .all(|(i, a)| head_matches(&mut self.state, i, a, &mut subst))
                    }
                })
                .collect();

            if matching.len() != 1 {
                self.diags.push(Diagnostic::ClassResolutionError {
                    span: obligation.span,
                    node: obligation.node,
                    class: obligation.class,
                    args,
                });
                continue;
            }

            // Commit: unify the head against the obligation, solving any
            // still-open argument variables
            let inst = matching[0];
            let mut rigid_subst: HashMap<Symbol, Type> = HashMap::new();
            for arg in &inst.args {
                for sym in rigid_vars(arg) {
                    if !rigid_subst.contains_key(&sym) {
                        let fresh = self.state.fresh();
                        rigid_subst.insert(sym, fresh);
                    }
                }
            }
            for (head_arg, arg) in inst.args.iter().zip(&args) {
                let head_arg = subst_vars(head_arg, &rigid_subst);
                if let Err((left, right)) = self.state.unify(&head_arg, arg) {
                    self.diags.push(Diagnostic::UnificationError {
                        span: obligation.span,
                        node: obligation.node,
                        left,
                        right,
                    });
                }
            }

            // Superclass obligations of the matched class
            if let Some(info) = self.classes.get(&obligation.class) {
                let superclasses = info.superclasses.clone();
                let ty_vars = info.ty_vars.clone();
                let class_subst: HashMap<Symbol, Type> =
                    ty_vars.into_iter().zip(args.iter().cloned()).collect();
                for superclass in superclasses {
                    queue.push_back(Obligation {
                        node: obligation.node,
                        span: obligation.span,
                        class: superclass.class,
                        args: superclass
                            .args
                            .iter()
                            .map(|a| subst_vars(a, &class_subst))
                            .collect(),
                    });
                }
            }
        }
    }

    // ----- Finalization -----

    /// Zonk every node annotation; unification variables that survived
    /// solving on expression nodes become `AmbiguousType` reports, one per
    /// variable.
    fn finalize(&mut self) {
        let mut reported: HashSet<TyVarId> = HashSet::new();
        let ids: Vec<NodeId> = self.tree.ids().collect();
        for id in ids {
            let Some(ty) = self.tree.ty(id).cloned() else {
                continue;
            };
            let zonked = self.state.zonk(ty);
            if self.tree.data(id).is_expression() {
                for v in self.state.free_unif_vars(&zonked) {
                    if reported.insert(v) {
                        self.diags.push(Diagnostic::AmbiguousType {
                            span: self.tree.span(id),
                            node: id,
                            var: v,
                        });
                    }
                }
            }
            self.tree.set_ty(id, zonked);
        }
    }

    fn unify_at(&mut self, node: NodeId, left: &Type, right: &Type) {
        if let Err((left, right)) = self.state.unify(left, right) {
            self.diags.push(Diagnostic::UnificationError {
                span: self.tree.span(node),
                node,
                left,
                right,
            });
        }
    }
}

// ----- Helpers -----

/// `a`, `b`, ..., `z`, `t26`, `t27`, ...
fn scheme_var_name(index: usize) -> String {
    if index < 26 {
        ((b'a' + index as u8) as char).to_string()
    } else {
        format!("t{}", index)
    }
}

fn subst_vars(ty: &Type, subst: &HashMap<Symbol, Type>) -> Type {
    match ty {
        Type::Var(sym) => subst.get(sym).cloned().unwrap_or_else(|| ty.clone()),
        Type::App(callee, arg) => Type::app(subst_vars(callee, subst), subst_vars(arg, subst)),
        Type::Fun(from, to) => Type::fun(subst_vars(from, subst), subst_vars(to, subst)),
        Type::Tuple(elements) => {
            Type::Tuple(elements.iter().map(|e| subst_vars(e, subst)).collect())
        }
        Type::Unif(_) | Type::Con(_) | Type::Error => ty.clone(),
    }
}

fn rigid_vars(ty: &Type) -> Vec<Symbol> {
    let mut out = Vec::new();
    fn walk(ty: &Type, out: &mut Vec<Symbol>) {
        match ty {
            Type::Var(sym) => {
                if !out.contains(sym) {
                    out.push(*sym);
                }
            }
            Type::App(callee, arg) => {
                walk(callee, out);
                walk(arg, out);
            }
            Type::Fun(from, to) => {
                walk(from, out);
                walk(to, out);
            }
            Type::Tuple(elements) => elements.iter().for_each(|e| walk(e, out)),
            Type::Unif(_) | Type::Con(_) | Type::Error => {}
        }
    }
    walk(ty, &mut out);
    out
}

fn contains_error(ty: &Type) -> bool {
    match ty {
        Type::Error => true,
        Type::App(callee, arg) => contains_error(callee) || contains_error(arg),
        Type::Fun(from, to) => contains_error(from) || contains_error(to),
        Type::Tuple(elements) => elements.iter().any(contains_error),
        Type::Unif(_) | Type::Var(_) | Type::Con(_) => false,
    }
}

/// Match an instance head type against a (zonked) obligation argument.
/// Rigid head `Var`s bind consistently; unsolved obligation variables
/// match anything.
fn head_matches(
    state: &mut UnifyState,
    head: &Type,
    actual: &Type,
    subst: &mut HashMap<Symbol, Type>,
) -> bool {
    let actual = state.zonk(actual.clone());
    match (head, &actual) {
        (Type::Var(v), t) => match subst.get(v) {
            Some(previous) => previous == t,
            None => {
                subst.insert(*v, t.clone());
                true
            }
        },
        (_, Type::Unif(_)) => true,
        (_, Type::Error) => true,
        (Type::Con(a), Type::Con(b)) => a == b,
        (Type::App(c1, a1), Type::App(c2, a2)) => {
            head_matches(state, c1, c2, subst) && head_matches(state, a1, a2, subst)
        }
        (Type::Fun(f1, t1), Type::Fun(f2, t2)) => {
            head_matches(state, f1, f2, subst) && head_matches(state, t1, t2, subst)
        }
        (Type::Tuple(e1), Type::Tuple(e2)) => {
            e1.len() == e2.len()
                && e1
                    .iter()
                    .zip(e2)
                    .all(|(a, b)| head_matches(state, a, b, subst))
        }
        _ => false,
    }
}

/// The single binder a `let` pattern names, looking through nesting.
fn simple_bind(tree: &Tree, pattern: NodeId) -> Option<NodeId> {
    match tree.data(pattern) {
        NodeData::BindPattern(_) => Some(pattern),
        NodeData::NestedPattern(inner) => simple_bind(tree, *inner),
        _ => None,
    }
}

/// All names a pattern binds.
fn pattern_names(tree: &Tree, pattern: NodeId) -> Vec<Symbol> {
    let mut out = Vec::new();
    fn walk(tree: &Tree, pattern: NodeId, out: &mut Vec<Symbol>) {
        match tree.data(pattern) {
            NodeData::BindPattern(sym) => out.push(*sym),
            NodeData::NamedPattern { args, .. } => {
                for &arg in args {
                    walk(tree, arg, out);
                }
            }
            NodeData::NestedPattern(inner) => walk(tree, *inner, out),
            _ => {}
        }
    }
    walk(tree, pattern, &mut out);
    out
}

/// References from one declaration's subtree to sibling bindings, by index.
fn collect_sibling_refs(
    tree: &Tree,
    decl: NodeId,
    names: &HashMap<Symbol, usize>,
    self_idx: usize,
) -> BTreeSet<usize> {
    let mut out = BTreeSet::new();
    let mut work = vec![decl];
    while let Some(id) = work.pop() {
        if let NodeData::RefExpr(name) = tree.data(id) {
            if name.modules.is_empty() {
                if let Some(&idx) = names.get(&name.name) {
                    if idx != self_idx {
                        out.insert(idx);
                    }
                }
            }
        }
        tree.for_each_child(id, &mut |child| work.push(child));
    }
    out
}

/// Tarjan's strongly connected components over the sibling reference
/// graph. Components come out in reverse topological order, dependencies
/// first, which is the order inference runs in.
fn tarjan_scc(n: usize, edges: &[BTreeSet<usize>]) -> Vec<Vec<usize>> {
    struct Walk<'a> {
        edges: &'a [BTreeSet<usize>],
        counter: usize,
        stack: Vec<usize>,
        on_stack: Vec<bool>,
        index: Vec<usize>,
        lowlink: Vec<usize>,
        sccs: Vec<Vec<usize>>,
    }

    fn strongconnect(v: usize, walk: &mut Walk) {
        walk.index[v] = walk.counter;
        walk.lowlink[v] = walk.counter;
        walk.counter += 1;
        walk.stack.push(v);
        walk.on_stack[v] = true;

        let deps: Vec<usize> = walk.edges[v].iter().copied().collect();
        for w in deps {
            if walk.index[w] == usize::MAX {
                strongconnect(w, walk);
                walk.lowlink[v] = walk.lowlink[v].min(walk.lowlink[w]);
            } else if walk.on_stack[w] {
                walk.lowlink[v] = walk.lowlink[v].min(walk.index[w]);
            }
        }

        if walk.lowlink[v] == walk.index[v] {
            let mut scc = Vec::new();
            while let Some(w) = walk.stack.pop() {
                walk.on_stack[w] = false;
                scc.push(w);
                if w == v {
                    break;
                }
            }
            scc.sort_unstable();
            walk.sccs.push(scc);
        }
    }

    let mut walk = Walk {
        edges,
        counter: 0,
        stack: Vec::new(),
        on_stack: vec![false; n],
        index: vec![usize::MAX; n],
        lowlink: vec![0; n],
        sccs: Vec::new(),
    };
    for v in 0..n {
        if walk.index[v] == usize::MAX {
            strongconnect(v, &mut walk);
        }
    }
    walk.sccs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tarjan_mutual_pair() {
        // 0 <-> 1, 2 depends on both
        let edges = vec![
            BTreeSet::from([1]),
            BTreeSet::from([0]),
            BTreeSet::from([0, 1]),
        ];
        let sccs = tarjan_scc(3, &edges);
        assert_eq!(sccs, vec![vec![0, 1], vec![2]]);
    }

    #[test]
    fn test_tarjan_chain_is_leaves_first() {
        // 0 -> 1 -> 2
        let edges = vec![BTreeSet::from([1]), BTreeSet::from([2]), BTreeSet::new()];
        let sccs = tarjan_scc(3, &edges);
        assert_eq!(sccs, vec![vec![2], vec![1], vec![0]]);
    }

    #[test]
    fn test_scheme_var_names() {
        assert_eq!(scheme_var_name(0), "a");
        assert_eq!(scheme_var_name(1), "b");
        assert_eq!(scheme_var_name(26), "t26");
    }
}

//! Concrete syntax tree for Fern.
//!
//! Nodes live in a flat arena owned by [`Tree`]; children are referenced
//! by [`NodeId`] so the parent back-links installed by [`Tree::link_parents`]
//! never form owning cycles. Each node carries its source span, an optional
//! type filled in by the checker, and an optional lazily-built scope.

use num_bigint::BigInt;

use crate::interner::Symbol;
use crate::scope::ScopeId;
use crate::text::Span;
use crate::typecheck::types::Type;

/// Index of a node in its tree's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A possibly module-qualified name: `Mod1.Mod2.name`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QualName {
    pub modules: Vec<Symbol>,
    pub name: Symbol,
}

impl QualName {
    pub fn plain(name: Symbol) -> Self {
        Self {
            modules: Vec::new(),
            name,
        }
    }
}

/// Literal payloads shared by constant expressions and literal patterns.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Int(BigInt),
    Str(String),
}

/// Body of a `let` declaration. Absent for abstract signatures such as
/// class members.
#[derive(Debug, Clone, PartialEq)]
pub enum LetBody {
    /// `= expr`
    Expr(NodeId),
    /// Indented statement block
    Block(Vec<NodeId>),
}

/// Tagged union over every node family: type expressions, constraints,
/// patterns, expressions, statements and declarations.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeData {
    // ----- Type expressions -----
    /// `Int`, `Mod.Pair`
    RefType(QualName),
    /// Lowercase type variable `a`
    VarType(Symbol),
    /// Juxtaposed application `Pair a b`
    AppType { callee: NodeId, args: Vec<NodeId> },
    /// `a -> b`, right associative
    ArrowType { from: NodeId, to: NodeId },
    /// `C a, T ~ U => body`
    QualifiedType { constraints: Vec<NodeId>, body: NodeId },
    /// `(a, b)`
    TupleType(Vec<NodeId>),
    /// `(t)`
    NestedType(NodeId),

    // ----- Constraint expressions -----
    /// `ClassName v1 .. vn`
    ClassConstraint { class: Symbol, args: Vec<NodeId> },
    /// `T1 ~ T2`
    EqualityConstraint { left: NodeId, right: NodeId },

    // ----- Patterns -----
    /// Lowercase binder
    BindPattern(Symbol),
    LiteralPattern(Literal),
    /// Constructor application `Some x`
    NamedPattern { name: Symbol, args: Vec<NodeId> },
    NestedPattern(NodeId),

    // ----- Expressions -----
    RefExpr(QualName),
    ConstExpr(Literal),
    /// Juxtaposed application `f a b`
    CallExpr { callee: NodeId, args: Vec<NodeId> },
    InfixExpr {
        left: NodeId,
        op: Symbol,
        op_span: Span,
        right: NodeId,
    },
    PrefixExpr {
        op: Symbol,
        op_span: Span,
        operand: NodeId,
    },
    /// `expr.field`
    MemberExpr { object: NodeId, field: Symbol },
    TupleExpr(Vec<NodeId>),
    NestedExpr(NodeId),
    MatchExpr {
        scrutinee: NodeId,
        cases: Vec<NodeId>,
    },
    /// One `pattern => expr` arm; a binding region for its pattern
    MatchCase { pattern: NodeId, value: NodeId },
    RecordExpr(Vec<NodeId>),
    RecordExprField { name: Symbol, value: NodeId },

    // ----- Statements -----
    ExprStmt(NodeId),
    ReturnStmt(Option<NodeId>),
    /// Ordered `if`/`elif`/`else` parts
    IfStmt { parts: Vec<NodeId> },
    /// One part; `condition` is absent for `else`
    IfPart {
        condition: Option<NodeId>,
        body: Vec<NodeId>,
    },

    // ----- Declarations -----
    /// Function or value parameter with optional type assertion
    Param {
        pattern: NodeId,
        annotation: Option<NodeId>,
    },
    LetDecl {
        is_pub: bool,
        is_mut: bool,
        pattern: NodeId,
        params: Vec<NodeId>,
        annotation: Option<NodeId>,
        body: Option<LetBody>,
    },
    StructDecl {
        name: Symbol,
        fields: Vec<NodeId>,
    },
    StructField { name: Symbol, ty: NodeId },
    EnumDecl {
        name: Symbol,
        ty_vars: Vec<Symbol>,
        members: Vec<NodeId>,
    },
    /// `Circle Int Int`
    TupleMember { name: Symbol, elements: Vec<NodeId> },
    /// `Circle { radius: Int }`
    RecordMember { name: Symbol, fields: Vec<NodeId> },
    ClassDecl {
        is_pub: bool,
        name: Symbol,
        ty_vars: Vec<Symbol>,
        members: Vec<NodeId>,
    },
    InstanceDecl {
        class: Symbol,
        args: Vec<NodeId>,
        members: Vec<NodeId>,
    },
    SourceFile { elements: Vec<NodeId> },

    /// Sentinel produced by parser error recovery
    Error,
}

impl NodeData {
    pub fn is_expression(&self) -> bool {
        matches!(
            self,
            NodeData::RefExpr(_)
                | NodeData::ConstExpr(_)
                | NodeData::CallExpr { .. }
                | NodeData::InfixExpr { .. }
                | NodeData::PrefixExpr { .. }
                | NodeData::MemberExpr { .. }
                | NodeData::TupleExpr(_)
                | NodeData::NestedExpr(_)
                | NodeData::MatchExpr { .. }
                | NodeData::RecordExpr(_)
        )
    }

    /// Nodes that introduce a binding region and may carry a scope.
    pub fn introduces_scope(&self) -> bool {
        matches!(
            self,
            NodeData::SourceFile { .. }
                | NodeData::LetDecl { .. }
                | NodeData::ClassDecl { .. }
                | NodeData::InstanceDecl { .. }
                | NodeData::MatchCase { .. }
        )
    }
}

#[derive(Debug, Clone)]
pub struct Node {
    pub data: NodeData,
    pub span: Span,
    pub parent: Option<NodeId>,
    pub ty: Option<Type>,
    pub scope: Option<ScopeId>,
}

/// Arena holding every node of one parsed source file. The tree owns all
/// nodes; ids are non-owning references valid for the tree's lifetime.
/// Scopes are stored alongside the nodes they attach to and built lazily
/// by the first lookup (see the `scope` module).
#[derive(Debug, Default)]
pub struct Tree {
    pub(crate) nodes: Vec<Node>,
    pub(crate) scopes: Vec<crate::scope::Scope>,
    root: Option<NodeId>,
}

impl Tree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc(&mut self, data: NodeData, span: Span) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node {
            data,
            span,
            parent: None,
            ty: None,
            scope: None,
        });
        id
    }

    pub fn set_root(&mut self, root: NodeId) {
        self.root = Some(root);
    }

    pub fn root(&self) -> NodeId {
        self.root.expect("tree has no root")
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = NodeId> {
        (0..self.nodes.len() as u32).map(NodeId)
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.index()]
    }

    pub fn data(&self, id: NodeId) -> &NodeData {
        &self.nodes[id.index()].data
    }

    pub fn span(&self, id: NodeId) -> Span {
        self.nodes[id.index()].span
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.index()].parent
    }

    pub fn ty(&self, id: NodeId) -> Option<&Type> {
        self.nodes[id.index()].ty.as_ref()
    }

    pub fn set_ty(&mut self, id: NodeId, ty: Type) {
        self.nodes[id.index()].ty = Some(ty);
    }

    /// Invoke `f` for each direct child of `id`, in source order.
    pub fn for_each_child(&self, id: NodeId, f: &mut impl FnMut(NodeId)) {
        let each = |ids: &[NodeId], f: &mut dyn FnMut(NodeId)| {
            for &c in ids {
                f(c);
            }
        };
        match self.data(id) {
            NodeData::RefType(_)
            | NodeData::VarType(_)
            | NodeData::BindPattern(_)
            | NodeData::LiteralPattern(_)
            | NodeData::RefExpr(_)
            | NodeData::ConstExpr(_)
            | NodeData::Error => {}
            NodeData::AppType { callee, args } => {
                f(*callee);
                each(args, f);
            }
            NodeData::ArrowType { from, to } => {
                f(*from);
                f(*to);
            }
            NodeData::QualifiedType { constraints, body } => {
                each(constraints, f);
                f(*body);
            }
            NodeData::TupleType(elems) | NodeData::TupleExpr(elems) => each(elems, f),
            NodeData::NestedType(inner)
            | NodeData::NestedPattern(inner)
            | NodeData::NestedExpr(inner)
            | NodeData::ExprStmt(inner) => f(*inner),
            NodeData::ClassConstraint { args, .. } => each(args, f),
            NodeData::EqualityConstraint { left, right } => {
                f(*left);
                f(*right);
            }
            NodeData::NamedPattern { args, .. } => each(args, f),
            NodeData::CallExpr { callee, args } => {
                f(*callee);
                each(args, f);
            }
            NodeData::InfixExpr { left, right, .. } => {
                f(*left);
                f(*right);
            }
            NodeData::PrefixExpr { operand, .. } => f(*operand),
            NodeData::MemberExpr { object, .. } => f(*object),
            NodeData::MatchExpr { scrutinee, cases } => {
                f(*scrutinee);
                each(cases, f);
            }
            NodeData::MatchCase { pattern, value } => {
                f(*pattern);
                f(*value);
            }
            NodeData::RecordExpr(fields) => each(fields, f),
            NodeData::RecordExprField { value, .. } => f(*value),
            NodeData::ReturnStmt(expr) => {
                if let Some(e) = expr {
                    f(*e);
                }
            }
            NodeData::IfStmt { parts } => each(parts, f),
            NodeData::IfPart { condition, body } => {
                if let Some(c) = condition {
                    f(*c);
                }
                each(body, f);
            }
            NodeData::Param { pattern, annotation } => {
                f(*pattern);
                if let Some(a) = annotation {
                    f(*a);
                }
            }
            NodeData::LetDecl {
                pattern,
                params,
                annotation,
                body,
                ..
            } => {
                f(*pattern);
                each(params, f);
                if let Some(a) = annotation {
                    f(*a);
                }
                match body {
                    Some(LetBody::Expr(e)) => f(*e),
                    Some(LetBody::Block(elements)) => each(elements, f),
                    None => {}
                }
            }
            NodeData::StructDecl { fields, .. } => each(fields, f),
            NodeData::StructField { ty, .. } => f(*ty),
            NodeData::EnumDecl { members, .. } => each(members, f),
            NodeData::TupleMember { elements, .. } => each(elements, f),
            NodeData::RecordMember { fields, .. } => each(fields, f),
            NodeData::ClassDecl { members, .. } | NodeData::InstanceDecl { members, .. } => {
                each(members, f)
            }
            NodeData::SourceFile { elements } => each(elements, f),
        }
    }

    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        self.for_each_child(id, &mut |c| out.push(c));
        out
    }

    /// Post-construction pass installing parent back-references on every
    /// node reachable from the root.
    pub fn link_parents(&mut self) {
        let root = self.root();
        let mut work = vec![root];
        while let Some(id) = work.pop() {
            for child in self.children(id) {
                self.nodes[child.index()].parent = Some(id);
                work.push(child);
            }
        }
    }

    /// Walk from `id` towards the root, yielding `id` itself first.
    pub fn ancestors(&self, id: NodeId) -> Ancestors<'_> {
        Ancestors {
            tree: self,
            next: Some(id),
        }
    }
}

pub struct Ancestors<'a> {
    tree: &'a Tree,
    next: Option<NodeId>,
}

impl Iterator for Ancestors<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.next?;
        self.next = self.tree.parent(current);
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parent_links_cover_all_children() {
        let mut tree = Tree::new();
        let lit = tree.alloc(NodeData::ConstExpr(Literal::Int(1.into())), Span::new(0, 1));
        let stmt = tree.alloc(NodeData::ExprStmt(lit), Span::new(0, 1));
        let root = tree.alloc(
            NodeData::SourceFile {
                elements: vec![stmt],
            },
            Span::new(0, 1),
        );
        tree.set_root(root);
        tree.link_parents();

        assert_eq!(tree.parent(lit), Some(stmt));
        assert_eq!(tree.parent(stmt), Some(root));
        assert_eq!(tree.parent(root), None);
        for id in tree.ids() {
            if let Some(parent) = tree.parent(id) {
                assert!(tree.children(parent).contains(&id));
            }
        }
    }

    #[test]
    fn test_ancestors_walk() {
        let mut tree = Tree::new();
        let lit = tree.alloc(NodeData::ConstExpr(Literal::Int(1.into())), Span::new(0, 1));
        let stmt = tree.alloc(NodeData::ExprStmt(lit), Span::new(0, 1));
        let root = tree.alloc(
            NodeData::SourceFile {
                elements: vec![stmt],
            },
            Span::new(0, 1),
        );
        tree.set_root(root);
        tree.link_parents();

        let chain: Vec<NodeId> = tree.ancestors(lit).collect();
        assert_eq!(chain, vec![lit, stmt, root]);
    }
}

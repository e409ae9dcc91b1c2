//! Name resolution over the CST.
//!
//! Scopes attach to binding regions only: the source file, `let`
//! declarations, class and instance declarations, and match cases. A scope
//! is built lazily by the first query against its region, with a shallow
//! scan: binders belonging to inner binding regions are left to those
//! regions' own scopes.

use std::collections::HashMap;

use crate::cst::{LetBody, NodeData, NodeId, QualName, Tree};
use crate::diagnostics::{Diagnostic, DiagnosticStore};
use crate::interner::{self, Symbol};

/// Index of a scope in its tree's scope table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(u32);

impl ScopeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Discriminator for the symbol namespaces a name may live in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SymbolKind {
    Var,
    Class,
    Type,
}

impl SymbolKind {
    pub fn describe(self) -> &'static str {
        match self {
            SymbolKind::Var => "value",
            SymbolKind::Class => "class",
            SymbolKind::Type => "type",
        }
    }
}

/// Per-region symbol table: a multimap so a name may coexist as a value
/// and a type, and so duplicate bindings can be reported at lookup.
#[derive(Debug)]
pub struct Scope {
    owner: NodeId,
    entries: HashMap<(Symbol, SymbolKind), Vec<NodeId>>,
}

impl Scope {
    fn new(owner: NodeId) -> Self {
        Self {
            owner,
            entries: HashMap::new(),
        }
    }

    pub fn owner(&self) -> NodeId {
        self.owner
    }

    pub fn get(&self, name: Symbol, kind: SymbolKind) -> &[NodeId] {
        self.entries
            .get(&(name, kind))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

/// Outcome of a name query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    Found(NodeId),
    Ambiguous(Vec<NodeId>),
    Missing,
}

impl Tree {
    /// The scope-introducing node at or above `id`.
    fn scope_owner(&self, id: NodeId) -> NodeId {
        self.ancestors(id)
            .find(|&n| self.data(n).introduces_scope())
            .unwrap_or_else(|| self.root())
    }

    /// Scope for the binding region containing `id`, built on first use.
    pub fn scope_of(&mut self, id: NodeId, diags: &mut DiagnosticStore) -> ScopeId {
        let owner = self.scope_owner(id);
        if let Some(existing) = self.node(owner).scope {
            return existing;
        }
        let scope = build_scope(self, owner, diags);
        let scope_id = ScopeId(self.scopes.len() as u32);
        self.scopes.push(scope);
        self.node_mut(owner).scope = Some(scope_id);
        scope_id
    }

    /// Query only the scope of the region containing `id`.
    pub fn lookup_direct(
        &mut self,
        id: NodeId,
        path: &QualName,
        kind: SymbolKind,
        diags: &mut DiagnosticStore,
    ) -> Lookup {
        if !path.modules.is_empty() {
            // Single-file compiles have an empty module table, so every
            // qualified path misses.
            return Lookup::Missing;
        }
        let scope_id = self.scope_of(id, diags);
        match self.scopes[scope_id.index()].get(path.name, kind) {
            [] => Lookup::Missing,
            [single] => Lookup::Found(*single),
            many => Lookup::Ambiguous(many.to_vec()),
        }
    }

    /// Query the scope chain from `id` outwards, stopping at the first
    /// scope with any entry for the name.
    pub fn lookup(
        &mut self,
        id: NodeId,
        path: &QualName,
        kind: SymbolKind,
        diags: &mut DiagnosticStore,
    ) -> Lookup {
        if !path.modules.is_empty() {
            return Lookup::Missing;
        }
        let mut at = id;
        loop {
            match self.lookup_direct(at, path, kind, diags) {
                Lookup::Missing => {}
                hit => return hit,
            }
            let owner = self.scope_owner(at);
            match self.parent(owner) {
                Some(parent) => at = parent,
                None => return Lookup::Missing,
            }
        }
    }
}

fn build_scope(tree: &Tree, owner: NodeId, diags: &mut DiagnosticStore) -> Scope {
    let mut scope = Scope::new(owner);
    match tree.data(owner) {
        NodeData::SourceFile { elements } => {
            scan_region(tree, elements, &mut scope, diags);
        }
        NodeData::LetDecl { params, body, .. } => {
            for &param in params {
                if let NodeData::Param { pattern, .. } = tree.data(param) {
                    bind_pattern(tree, *pattern, &mut scope, diags);
                }
            }
            if let Some(LetBody::Block(elements)) = body {
                scan_region(tree, elements, &mut scope, diags);
            }
        }
        NodeData::ClassDecl { members, .. } | NodeData::InstanceDecl { members, .. } => {
            for &member in members {
                if let NodeData::LetDecl { pattern, .. } = tree.data(member) {
                    bind_pattern(tree, *pattern, &mut scope, diags);
                }
            }
        }
        NodeData::MatchCase { pattern, .. } => {
            bind_pattern(tree, *pattern, &mut scope, diags);
        }
        _ => {}
    }
    scope
}

/// Collect the binders a list of block elements contributes to the scope
/// that owns the block. Descends through `if` parts, which are not binding
/// regions, but not into inner `let` bodies or match cases.
fn scan_region(tree: &Tree, elements: &[NodeId], scope: &mut Scope, diags: &mut DiagnosticStore) {
    for &element in elements {
        match tree.data(element) {
            NodeData::LetDecl { pattern, .. } => {
                bind_pattern(tree, *pattern, scope, diags);
            }
            NodeData::StructDecl { name, .. } => {
                add_symbol(scope, *name, SymbolKind::Type, element, diags, tree);
            }
            NodeData::EnumDecl { name, members, .. } => {
                add_symbol(scope, *name, SymbolKind::Type, element, diags, tree);
                for &member in members {
                    match tree.data(member) {
                        NodeData::TupleMember { name, .. }
                        | NodeData::RecordMember { name, .. } => {
                            add_symbol(scope, *name, SymbolKind::Var, member, diags, tree);
                        }
                        _ => {}
                    }
                }
            }
            NodeData::ClassDecl { name, members, .. } => {
                add_symbol(scope, *name, SymbolKind::Type, element, diags, tree);
                add_symbol(scope, *name, SymbolKind::Class, element, diags, tree);
                // Class methods are values of the enclosing region
                for &member in members {
                    if let NodeData::LetDecl { pattern, .. } = tree.data(member) {
                        bind_pattern(tree, *pattern, scope, diags);
                    }
                }
            }
            NodeData::IfStmt { parts } => {
                for &part in parts {
                    if let NodeData::IfPart { body, .. } = tree.data(part) {
                        scan_region(tree, body, scope, diags);
                    }
                }
            }
            _ => {}
        }
    }
}

/// Insert every name bound by a pattern, under `Var`, pointing at the
/// binder node itself. `_` binds nothing.
fn bind_pattern(tree: &Tree, pattern: NodeId, scope: &mut Scope, diags: &mut DiagnosticStore) {
    match tree.data(pattern) {
        NodeData::BindPattern(name) => {
            if interner::resolve(*name) != "_" {
                add_symbol(scope, *name, SymbolKind::Var, pattern, diags, tree);
            }
        }
        NodeData::NamedPattern { args, .. } => {
            for &arg in args {
                bind_pattern(tree, arg, scope, diags);
            }
        }
        NodeData::NestedPattern(inner) => bind_pattern(tree, *inner, scope, diags),
        _ => {}
    }
}

fn add_symbol(
    scope: &mut Scope,
    name: Symbol,
    kind: SymbolKind,
    node: NodeId,
    diags: &mut DiagnosticStore,
    tree: &Tree,
) {
    let slot = scope.entries.entry((name, kind)).or_default();
    if let Some(&prior) = slot.first() {
        diags.push(Diagnostic::ShadowingDisallowed {
            span: tree.span(node),
            name,
            kind,
            prior,
            current: node,
        });
    }
    slot.push(node);
}

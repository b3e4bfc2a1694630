//! Lexical scopes as an index arena.
//!
//! The first traversal allocates a node per scope-introducing construct in
//! visit order. Later traversals walk the same tree and re-enter those nodes
//! by ordinal, so tables filled in one stage are visible in the next.

use std::collections::HashMap;

use swc_core::ecma::atoms::Atom;

use crate::error::TransformError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    Program,
    Function,
    Block,
    Catch,
    /// Own-name scope of a named class expression.
    Class,
}

impl ScopeKind {
    /// `var` and function declarations hoist to these.
    pub fn is_var_scope(self) -> bool {
        matches!(self, ScopeKind::Program | ScopeKind::Function)
    }
}

#[derive(Debug)]
pub struct ScopeNode {
    pub kind: ScopeKind,
    pub parent: Option<ScopeId>,
    /// Original name → generated name, assigned on first use.
    pub local_names: HashMap<Atom, Option<Atom>>,
    pub label_names: HashMap<Atom, Option<Atom>>,
    /// Reached by direct `eval` or `with`; owned bindings keep their names.
    pub dynamic: bool,
}

#[derive(Debug, Default)]
pub struct ScopeTracker {
    nodes: Vec<ScopeNode>,
    stack: Vec<ScopeId>,
    cursor: usize,
    sealed: bool,
}

impl ScopeTracker {
    pub fn begin_traversal(&mut self) {
        self.stack.clear();
        self.cursor = 0;
    }

    pub fn end_traversal(&mut self) -> Result<(), TransformError> {
        if self.sealed && self.cursor != self.nodes.len() {
            return Err(TransformError::ScopeMismatch {
                expected: format!("{} scopes", self.nodes.len()),
                found: format!("{} scopes", self.cursor),
                location: "end of program".into(),
            });
        }
        self.sealed = true;
        self.stack.clear();
        Ok(())
    }

    pub fn enter(&mut self, kind: ScopeKind) -> Result<ScopeId, TransformError> {
        let id = ScopeId(self.cursor);
        if self.sealed {
            match self.nodes.get(self.cursor) {
                Some(node) if node.kind == kind => {}
                Some(node) => {
                    return Err(TransformError::ScopeMismatch {
                        expected: format!("{:?}", node.kind),
                        found: format!("{kind:?}"),
                        location: format!("scope #{}", self.cursor),
                    })
                }
                None => {
                    return Err(TransformError::ScopeMismatch {
                        expected: "no further scope".into(),
                        found: format!("{kind:?}"),
                        location: format!("scope #{}", self.cursor),
                    })
                }
            }
        } else {
            self.nodes.push(ScopeNode {
                kind,
                parent: self.stack.last().copied(),
                local_names: HashMap::new(),
                label_names: HashMap::new(),
                dynamic: false,
            });
        }
        self.cursor += 1;
        self.stack.push(id);
        Ok(id)
    }

    pub fn exit(&mut self) {
        self.stack.pop();
    }

    /// Nearest scope enclosing the node currently being visited.
    pub fn enclosing_scope(&self) -> Option<ScopeId> {
        self.stack.last().copied()
    }

    pub fn nearest_var_scope(&self) -> Option<ScopeId> {
        self.stack
            .iter()
            .rev()
            .copied()
            .find(|id| self.node(*id).kind.is_var_scope())
    }

    /// Catch clause between the current position and its var scope whose
    /// parameter binds `name`.
    pub fn shadowing_catch(&self, name: &Atom) -> Option<ScopeId> {
        self.stack
            .iter()
            .rev()
            .copied()
            .take_while(|id| !self.node(*id).kind.is_var_scope())
            .find(|id| {
                let node = self.node(*id);
                node.kind == ScopeKind::Catch && node.local_names.contains_key(name)
            })
    }

    pub fn node(&self, id: ScopeId) -> &ScopeNode {
        &self.nodes[id.0]
    }

    pub fn node_mut(&mut self, id: ScopeId) -> &mut ScopeNode {
        &mut self.nodes[id.0]
    }

    pub fn is_root(&self, id: ScopeId) -> bool {
        self.node(id).parent.is_none()
    }

    /// `id` followed by its parents up to the program scope.
    pub fn ancestors(&self, id: ScopeId) -> impl Iterator<Item = ScopeId> + '_ {
        std::iter::successors(Some(id), move |s| self.node(*s).parent)
    }

    pub fn mark_dynamic(&mut self, id: ScopeId) {
        let chain: Vec<ScopeId> = self.ancestors(id).collect();
        for s in chain {
            self.node_mut(s).dynamic = true;
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout(t: &mut ScopeTracker) -> Result<Vec<ScopeId>, TransformError> {
        t.begin_traversal();
        let root = t.enter(ScopeKind::Program)?;
        let f = t.enter(ScopeKind::Function)?;
        let b = t.enter(ScopeKind::Block)?;
        t.exit();
        t.exit();
        let c = t.enter(ScopeKind::Catch)?;
        t.exit();
        t.exit();
        t.end_traversal()?;
        Ok(vec![root, f, b, c])
    }

    #[test]
    fn builds_parent_links_on_first_traversal() {
        let mut t = ScopeTracker::default();
        let ids = layout(&mut t).unwrap();
        assert_eq!(t.len(), 4);
        assert!(t.is_root(ids[0]));
        assert_eq!(t.node(ids[2]).parent, Some(ids[1]));
        assert_eq!(t.node(ids[3]).parent, Some(ids[0]));
        let chain: Vec<_> = t.ancestors(ids[2]).collect();
        assert_eq!(chain, vec![ids[2], ids[1], ids[0]]);
    }

    #[test]
    fn second_traversal_reuses_nodes() {
        let mut t = ScopeTracker::default();
        let first = layout(&mut t).unwrap();
        t.node_mut(first[2]).local_names.insert("x".into(), None);
        let second = layout(&mut t).unwrap();
        assert_eq!(first, second);
        assert_eq!(t.len(), 4);
        assert!(t.node(second[2]).local_names.contains_key(&Atom::from("x")));
    }

    #[test]
    fn changed_layout_is_reported() {
        let mut t = ScopeTracker::default();
        layout(&mut t).unwrap();
        t.begin_traversal();
        t.enter(ScopeKind::Program).unwrap();
        let err = t.enter(ScopeKind::Block).unwrap_err();
        assert!(matches!(err, TransformError::ScopeMismatch { .. }));
    }

    #[test]
    fn var_scope_skips_blocks() {
        let mut t = ScopeTracker::default();
        t.begin_traversal();
        let root = t.enter(ScopeKind::Program).unwrap();
        t.enter(ScopeKind::Block).unwrap();
        t.enter(ScopeKind::Catch).unwrap();
        assert_eq!(t.nearest_var_scope(), Some(root));
        assert_ne!(t.enclosing_scope(), Some(root));
    }

    #[test]
    fn catch_parameter_shadowing_stops_at_the_function() {
        let mut t = ScopeTracker::default();
        t.begin_traversal();
        t.enter(ScopeKind::Program).unwrap();
        let c = t.enter(ScopeKind::Catch).unwrap();
        let e: Atom = "e".into();
        t.node_mut(c).local_names.insert(e.clone(), None);
        t.enter(ScopeKind::Block).unwrap();
        assert_eq!(t.shadowing_catch(&e), Some(c));
        assert_eq!(t.shadowing_catch(&Atom::from("other")), None);

        t.enter(ScopeKind::Function).unwrap();
        assert_eq!(t.shadowing_catch(&e), None);
    }

    #[test]
    fn dynamic_marks_reach_the_root() {
        let mut t = ScopeTracker::default();
        let ids = layout(&mut t).unwrap();
        t.mark_dynamic(ids[2]);
        assert!(t.node(ids[2]).dynamic);
        assert!(t.node(ids[1]).dynamic);
        assert!(t.node(ids[0]).dynamic);
        assert!(!t.node(ids[3]).dynamic);
    }
}

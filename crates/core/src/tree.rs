// SPDX-License-Identifier: MIT

//! The frozen, arena-addressed tree of [`NodeDefinition`]s (§3 tree
//! invariants) plus the pure topology queries component A needs
//! (`ancestors_of`, `lca`). Per the REDESIGN FLAGS note on "pseudo-cyclic
//! structure", parent/child references are represented as an arena indexed
//! by [`StateKey`] rather than as owned/`Rc` cross-links.
//!
//! The mutable half of component A — per-node data cells, subscriptions —
//! is runtime state (only meaningful while a machine is `Started`) and
//! lives in `tsm-runtime`'s store instead.

use crate::error::TreeBuildError;
use crate::key::StateKey;
use crate::kind::NodeKind;
use crate::node::NodeDefinition;
use std::collections::HashMap;

/// An index into a [`Tree`]'s arena. Cheap to copy; stable for the lifetime
/// of the `Tree` it was obtained from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeIndex(usize);

/// An immutable, validated state tree (§3 "Tree invariants"). Constructed
/// once via [`TreeBuilder::build`] and shared read-only thereafter (typically
/// behind an `Arc`) by every `NodeInstance` a running machine owns.
#[derive(Debug)]
pub struct Tree {
    nodes: Vec<NodeDefinition>,
    by_key: HashMap<StateKey, NodeIndex>,
    root: NodeIndex,
}

impl Tree {
    pub fn root_key(&self) -> &StateKey {
        &self.nodes[self.root.0].key
    }

    pub fn root_index(&self) -> NodeIndex {
        self.root
    }

    pub fn index_of(&self, key: &StateKey) -> Option<NodeIndex> {
        self.by_key.get(key).copied()
    }

    pub fn get(&self, key: &StateKey) -> Option<&NodeDefinition> {
        self.by_key.get(key).map(|idx| &self.nodes[idx.0])
    }

    pub fn get_at(&self, idx: NodeIndex) -> &NodeDefinition {
        &self.nodes[idx.0]
    }

    pub fn contains(&self, key: &StateKey) -> bool {
        self.by_key.contains_key(key)
    }

    pub fn parent_of(&self, key: &StateKey) -> Option<StateKey> {
        self.get(key).and_then(|n| n.parent.clone())
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &NodeDefinition> {
        self.nodes.iter()
    }

    /// Yields `key`, then its parent, ... then the root (inclusive both ends).
    pub fn ancestors_of(&self, key: StateKey) -> Ancestors<'_> {
        Ancestors { tree: self, current: Some(key) }
    }

    /// Least common ancestor of `a` and `b`. Always exists given a
    /// single-rooted tree; ties at equal depth resolve naturally since we
    /// stop at the first ancestor of `b` that is also an ancestor of `a`.
    pub fn lca(&self, a: &StateKey, b: &StateKey) -> StateKey {
        let a_chain: Vec<StateKey> = self.ancestors_of(a.clone()).collect();
        for candidate in self.ancestors_of(b.clone()) {
            if a_chain.contains(&candidate) {
                return candidate;
            }
        }
        self.root_key().clone()
    }

    /// Whether `ancestor` appears on `key`'s ancestor chain (inclusive of `key` itself).
    pub fn is_ancestor_or_self(&self, ancestor: &StateKey, key: &StateKey) -> bool {
        self.ancestors_of(key.clone()).any(|k| &k == ancestor)
    }
}

/// Walks a [`Tree`] from a starting key up to the root, inclusive at both ends.
pub struct Ancestors<'a> {
    tree: &'a Tree,
    current: Option<StateKey>,
}

impl Iterator for Ancestors<'_> {
    type Item = StateKey;

    fn next(&mut self) -> Option<StateKey> {
        let current = self.current.take()?;
        self.current = self.tree.parent_of(&current);
        Some(current)
    }
}

/// Assembles a caller-built list of [`NodeDefinition`]s into a validated
/// [`Tree`] (§3 "Tree invariants"). The fluent/declarative builder DSL that
/// would normally produce the node list is out of scope (§1) — this is the
/// minimal interface where the core touches it.
#[derive(Default)]
pub struct TreeBuilder {
    nodes: Vec<NodeDefinition>,
}

impl TreeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(mut self, def: NodeDefinition) -> Self {
        self.nodes.push(def);
        self
    }

    pub fn build(mut self) -> Result<Tree, TreeBuildError> {
        let mut by_key: HashMap<StateKey, usize> = HashMap::with_capacity(self.nodes.len());
        for (idx, node) in self.nodes.iter().enumerate() {
            if by_key.insert(node.key.clone(), idx).is_some() {
                return Err(TreeBuildError::DuplicateKey(node.key.clone()));
            }
        }

        let mut root: Option<usize> = None;
        for node in &self.nodes {
            if node.parent.is_none() {
                if let Some(existing) = root {
                    return Err(TreeBuildError::MultipleRoots(
                        self.nodes[existing].key.clone(),
                        node.key.clone(),
                    ));
                }
                root = Some(by_key[&node.key]);
            } else {
                let parent = node.parent.as_ref().expect("checked above");
                if !by_key.contains_key(parent) {
                    return Err(TreeBuildError::UnknownParent {
                        child: node.key.clone(),
                        parent: parent.clone(),
                    });
                }
            }
        }
        let root = root.ok_or(TreeBuildError::MissingRoot)?;

        // Compute children lists in insertion order from parent links.
        let mut children: Vec<Vec<StateKey>> = vec![Vec::new(); self.nodes.len()];
        for node in &self.nodes {
            if let Some(parent) = &node.parent {
                children[by_key[parent]].push(node.key.clone());
            }
        }
        for (idx, node) in self.nodes.iter_mut().enumerate() {
            node.children = std::mem::take(&mut children[idx]);
        }

        for node in &self.nodes {
            if node.kind.requires_initial_child() && node.initial_child.is_none() {
                return Err(TreeBuildError::MissingInitialChild(node.key.clone()));
            }
            if node.kind.is_leaf() && !node.children.is_empty() {
                return Err(TreeBuildError::LeafWithChildren(node.key.clone()));
            }
            if node.kind == NodeKind::FinalLeaf {
                let parent_is_root = node.parent.as_ref() == Some(&self.nodes[root].key);
                if !parent_is_root {
                    return Err(TreeBuildError::FinalLeafNotChildOfRoot(node.key.clone()));
                }
            }
            match (node.data_type, node.initial_data.is_some()) {
                (Some(_), false) => {
                    return Err(TreeBuildError::DataTypeWithoutInitialData {
                        key: node.key.clone(),
                        data_type: node.data_type_name().unwrap_or("<unknown>"),
                    })
                }
                (None, true) => {
                    return Err(TreeBuildError::InitialDataWithoutDataType { key: node.key.clone() })
                }
                _ => {}
            }
        }

        let by_key = by_key.into_iter().map(|(k, v)| (k, NodeIndex(v))).collect();
        Ok(Tree { nodes: self.nodes, by_key, root: NodeIndex(root) })
    }
}

#[cfg(test)]
#[path = "tree_tests.rs"]
mod tests;

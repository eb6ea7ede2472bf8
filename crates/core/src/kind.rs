// SPDX-License-Identifier: MIT

//! Node kinds. A sum type in place of the source's small class hierarchy
//! (`Root` / `Interior` / `Leaf` / `FinalLeaf`), per the REDESIGN FLAGS note
//! on "handler plurality via tagged variants".

/// The structural role of a node within the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// The single root of the tree. Requires `initial_child`.
    Root,
    /// A non-leaf, non-root node. Requires `initial_child`.
    Interior,
    /// An ordinary leaf. Can be the current state indefinitely.
    Leaf,
    /// A leaf that, once current, absorbs all messages as unhandled and
    /// allows no further transitions. Must be an immediate child of the root.
    FinalLeaf,
}

impl NodeKind {
    /// Whether a node of this kind is a leaf (no children, can be `current_leaf`).
    pub fn is_leaf(self) -> bool {
        matches!(self, NodeKind::Leaf | NodeKind::FinalLeaf)
    }

    /// Whether a node of this kind requires an `initial_child` selector.
    pub fn requires_initial_child(self) -> bool {
        matches!(self, NodeKind::Root | NodeKind::Interior)
    }
}

crate::simple_display! {
    NodeKind {
        Root => "root",
        Interior => "interior",
        Leaf => "leaf",
        FinalLeaf => "final_leaf",
    }
}

#[cfg(test)]
#[path = "kind_tests.rs"]
mod tests;

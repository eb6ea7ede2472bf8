// SPDX-License-Identifier: MIT

//! §4.B Transition Path Planner: pure functions over `Tree` topology, no
//! live machine state. Computes the *static* exited/entered chains; the
//! Executor appends further `entered` keys at run time when it has to
//! follow a (possibly dynamic) `initial_child` past the planned target
//! (§4.B step 5, "done by the Executor during entry, but planned here
//! lazily").

use tsm_core::error::EngineError;
use tsm_core::key::StateKey;
use tsm_core::tree::Tree;

/// The static part of a transition: everything the Planner can determine
/// without invoking a single handler.
#[derive(Debug, Clone)]
pub(crate) struct TransitionPlan {
    pub from: StateKey,
    /// The originally requested target (`TransitionContext::to()` for the
    /// whole transition, even after live descent moves the actual frontier
    /// past it).
    pub target: StateKey,
    pub lca: StateKey,
    /// Leaf-first, excluding `lca`.
    pub exited: Vec<StateKey>,
    /// LCA-first (root-to-leaf order), excluding `lca`, ending at `target`.
    pub entered: Vec<StateKey>,
}

/// Plan an ordinary `goto`/`goto_self`/`redirect` transition (§4.B steps 1-4).
pub(crate) fn plan_transition(
    tree: &Tree,
    current_leaf: &StateKey,
    target: &StateKey,
    reenter_target: bool,
) -> Result<TransitionPlan, EngineError> {
    let self_reentry = reenter_target && tree.is_ancestor_or_self(target, current_leaf);
    let lca = if self_reentry {
        tree.parent_of(target).ok_or(EngineError::ReenterRoot)?
    } else {
        tree.lca(current_leaf, target)
    };

    let exited: Vec<StateKey> = tree.ancestors_of(current_leaf.clone()).take_while(|k| k != &lca).collect();

    let mut entered: Vec<StateKey> = tree.ancestors_of(target.clone()).take_while(|k| k != &lca).collect();
    entered.reverse();

    Ok(TransitionPlan { from: current_leaf.clone(), target: target.clone(), lca, exited, entered })
}

/// Plan `Machine::start()` (§4.H): nothing is active yet, not even root, so
/// there is no LCA to exclude — `entered` begins at root itself. Scenario 2
/// (§8): `Transition{from=root, entered=[root, A, A1]}`.
pub(crate) fn plan_start(tree: &Tree, initial_target: Option<&StateKey>) -> TransitionPlan {
    let root = tree.root_key().clone();
    let mut entered = vec![root.clone()];
    let target = match initial_target {
        Some(target) => {
            let mut chain: Vec<StateKey> = tree.ancestors_of(target.clone()).take_while(|k| k != &root).collect();
            chain.reverse();
            entered.extend(chain);
            target.clone()
        }
        None => root.clone(),
    };
    TransitionPlan { from: root.clone(), target, lca: root, exited: Vec::new(), entered }
}

#[cfg(test)]
#[path = "planner_tests.rs"]
mod tests;

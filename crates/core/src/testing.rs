// SPDX-License-Identifier: MIT

//! Test-only tree fixtures, gated behind the `test-support` feature (mirrors
//! `oj-core`'s own `test_support` module). Shared by `tsm-runtime` and
//! `tsm-storage`'s test suites so every crate builds the canonical
//! switch/descent trees from spec §8 the same way.

use crate::future::ready;
use crate::key::StateKey;
use crate::kind::NodeKind;
use crate::node::{InitialChildFn, NodeDefinition, TransitionCtx};
use std::sync::Arc;

/// An `initial_child` selector that always returns the same key, for trees
/// where initial-child selection doesn't depend on the transition context.
pub fn fixed_initial_child(key: &str) -> InitialChildFn {
    let key = StateKey::new(key);
    Arc::new(move |_ctx: &dyn TransitionCtx| ready(Ok(key.clone())))
}

/// An ordinary leaf, no data, no handlers.
pub fn leaf(key: &str, parent: &str) -> NodeDefinition {
    NodeDefinition::new(key, NodeKind::Leaf).parent(parent)
}

/// A `FinalLeaf`; must be an immediate child of the root per §3.
pub fn final_leaf(key: &str, parent: &str) -> NodeDefinition {
    NodeDefinition::new(key, NodeKind::FinalLeaf).parent(parent)
}

/// An interior node with a fixed `initial_child`.
pub fn interior(key: &str, parent: &str, initial: &str) -> NodeDefinition {
    NodeDefinition::new(key, NodeKind::Interior).parent(parent).initial_child(fixed_initial_child(initial))
}

/// The root, with a fixed `initial_child`.
pub fn root(key: &str, initial: &str) -> NodeDefinition {
    NodeDefinition::new(key, NodeKind::Root).initial_child(fixed_initial_child(initial))
}

/// Drives a [`crate::future::BoxFuture`] that is expected to resolve on its
/// first poll (every synchronous handler in this crate's own tests does,
/// via [`crate::future::ready`]). Lets `tsm-core`'s tests exercise handler
/// closures without a `tokio` dev-dependency — `tsm-runtime`'s tests use
/// real `#[tokio::test]` instead since its handlers may genuinely suspend.
pub fn block_on_ready<T>(mut fut: crate::future::BoxFuture<T>) -> T {
    use std::pin::Pin;
    use std::task::{Context, Poll, RawWaker, RawWakerVTable, Waker};

    fn noop(_: *const ()) {}
    fn clone(_: *const ()) -> RawWaker {
        RawWaker::new(std::ptr::null(), &VTABLE)
    }
    static VTABLE: RawWakerVTable = RawWakerVTable::new(clone, noop, noop, noop);

    let raw = RawWaker::new(std::ptr::null(), &VTABLE);
    let waker = unsafe { Waker::from_raw(raw) };
    let mut cx = Context::from_waker(&waker);
    match Pin::new(&mut fut).poll(&mut cx) {
        Poll::Ready(value) => value,
        Poll::Pending => panic!("block_on_ready: future was not ready on first poll"),
    }
}

#[cfg(feature = "proptest")]
pub mod strategies {
    use crate::key::StateKey;
    use proptest::prelude::*;

    /// Short lowercase-identifier `StateKey`s, for property tests over tree
    /// shapes without pulling in arbitrary Unicode noise.
    pub fn state_key() -> impl Strategy<Value = StateKey> {
        "[a-z][a-z0-9_]{0,7}".prop_map(StateKey::new)
    }
}

#[cfg(test)]
#[path = "testing_tests.rs"]
mod tests;

//! Shared tree fixtures for the scenarios of spec §8, built once here so
//! each scenario file only has to describe what's distinctive about it.

use std::sync::Arc;
use std::time::Duration;

use tsm_core::config::MachineConfig;
use tsm_core::future::ready;
use tsm_core::kind::NodeKind;
use tsm_core::node::{MessageCtx, MessageHandlerFn, NodeDefinition, TransitionCtx};
use tsm_core::result::MessageResult;
use tsm_core::testing::{interior, leaf, root};
use tsm_core::tree::{Tree, TreeBuilder};
use tsm_runtime::Machine;

#[derive(Debug, Clone, PartialEq)]
pub struct Toggle;

#[derive(Debug, Clone, PartialEq)]
pub struct M;

#[derive(Debug, Clone, PartialEq)]
pub struct Stop;

#[derive(Debug, Clone, PartialEq)]
pub struct Tick;

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq)]
pub struct Count(pub i64);

pub fn goto_handler(target: &'static str) -> MessageHandlerFn {
    Arc::new(move |_ctx: &dyn MessageCtx| ready(Ok(MessageResult::goto(target))))
}

pub fn goto_self_handler() -> MessageHandlerFn {
    Arc::new(|_ctx: &dyn MessageCtx| ready(Ok(MessageResult::goto_self())))
}

/// Only reacts to `Stop`; everything else (e.g. a scheduled `Tick`) falls
/// through unhandled instead of also triggering the transition.
pub fn goto_on_stop(target: &'static str) -> MessageHandlerFn {
    Arc::new(move |ctx: &dyn MessageCtx| {
        let result = if ctx.message().is::<Stop>() { MessageResult::goto(target) } else { MessageResult::Unhandled };
        ready(Ok(result))
    })
}

pub fn machine(tree: Arc<Tree>) -> Machine {
    Machine::new(tree, MachineConfig::new())
}

/// Scenario 1 (*Switch*): `root -> {off, on}`, initial `off`; `Toggle` flips.
pub fn switch_tree() -> Arc<Tree> {
    Arc::new(
        TreeBuilder::new()
            .add(root("root", "off"))
            .add(leaf("off", "root").on_message(goto_handler("on")))
            .add(leaf("on", "root").on_message(goto_handler("off")))
            .build()
            .unwrap(),
    )
}

/// Scenario 2 (*Descent*): `root -> A -> {A1, A2}`, `B`; `root.initial = A`,
/// `A.initial = A1`.
pub fn descent_tree() -> Arc<Tree> {
    Arc::new(
        TreeBuilder::new()
            .add(root("root", "a"))
            .add(interior("a", "root", "a1"))
            .add(leaf("a1", "a"))
            .add(leaf("a2", "a"))
            .add(leaf("b", "root"))
            .build()
            .unwrap(),
    )
}

/// Scenario 3 (*Ancestor handling*): `A.on_message(M) = goto(B)`; `A1` has
/// no handler of its own.
pub fn ancestor_tree() -> Arc<Tree> {
    Arc::new(
        TreeBuilder::new()
            .add(root("root", "a"))
            .add(interior("a", "root", "a1").on_message(goto_handler("b")))
            .add(leaf("a1", "a"))
            .add(leaf("b", "root"))
            .build()
            .unwrap(),
    )
}

/// Scenario 4 (*Self-transition from interior*): `A.on_message(M) =
/// goto_self()` while the current leaf is `A1`.
pub fn self_transition_tree() -> Arc<Tree> {
    Arc::new(
        TreeBuilder::new()
            .add(root("root", "a"))
            .add(interior("a", "root", "a1").on_message(goto_self_handler()))
            .add(leaf("a1", "a"))
            .build()
            .unwrap(),
    )
}

/// Scenario 5 (*Payload*): `root -> {x, y}`; `y` is data-bearing with
/// `initial_data` reading the transition's payload. `x.on_message(M) =
/// goto(y, payload = 42)`.
pub fn payload_tree() -> Arc<Tree> {
    let y = NodeDefinition::new("y", NodeKind::Leaf).parent("root").with_data::<Count>(Arc::new(
        |ctx: &dyn TransitionCtx| {
            let carried = ctx.payload::<i64>().unwrap_or(0);
            ready(Ok(Box::new(Count(carried)) as Box<dyn std::any::Any + Send + Sync>))
        },
    ));
    let x = leaf("x", "root").on_message(Arc::new(|_ctx: &dyn MessageCtx| {
        ready(Ok(MessageResult::goto_with_payload("y", 42i64)))
    }));
    Arc::new(TreeBuilder::new().add(root("root", "x")).add(x).add(y).build().unwrap())
}

/// Scenario 6 (*Scheduled cancellation on exit*): `A.on_enter` schedules a
/// periodic `Tick` every 10ms; `A.on_message(Stop) = goto(B)`.
pub fn scheduled_cancellation_tree() -> Arc<Tree> {
    let a = leaf("a", "root")
        .on_enter(Arc::new(|ctx: &dyn TransitionCtx| {
            ctx.schedule_msg(Tick, Duration::from_millis(10), true);
            ready(Ok(()))
        }))
        .on_message(goto_on_stop("b"));
    Arc::new(TreeBuilder::new().add(root("root", "a")).add(a).add(leaf("b", "root")).build().unwrap())
}

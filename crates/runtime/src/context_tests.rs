use super::*;
use crate::pending::PendingQueue;
use crate::scheduler::Scheduler;
use std::time::Duration;
use tsm_core::kind::NodeKind;
use tsm_core::node::NodeDefinition;
use tsm_core::testing::leaf;
use tsm_core::tree::TreeBuilder;

fn store_with_leaf() -> DataStore {
    let root = NodeDefinition::new("root", NodeKind::Root).initial_child(tsm_core::testing::fixed_initial_child("a"));
    let tree = TreeBuilder::new().add(root).add(leaf("a", "root")).build().unwrap();
    DataStore::new(Arc::new(tree))
}

fn scheduler() -> Scheduler {
    let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
    Scheduler::new(tx)
}

#[derive(Debug)]
struct Ping;

#[tokio::test]
async fn message_context_posts_and_reports_handling_state() {
    let store = store_with_leaf();
    let pending = PendingQueue::new();
    let sched = scheduler();
    let handling = StateKey::new("a");
    let msg = Msg::new(Ping);

    let ctx = MessageContext::new(&msg, &handling, &store, &pending, &sched);
    assert_eq!(ctx.handling_state(), &handling);
    assert!(ctx.message().is::<Ping>());

    ctx.post(Msg::new(Ping));
    assert_eq!(pending.len(), 1);
}

#[tokio::test]
async fn zero_duration_schedule_posts_immediately_without_touching_scheduler() {
    let store = store_with_leaf();
    let pending = PendingQueue::new();
    let sched = scheduler();
    let handling = StateKey::new("a");
    let msg = Msg::new(Ping);

    let ctx = MessageContext::new(&msg, &handling, &store, &pending, &sched);
    let handle = ctx.schedule(Arc::new(|| Msg::new(Ping)), Duration::ZERO, false);
    assert_eq!(pending.len(), 1);
    handle.cancel();
}

#[tokio::test]
async fn transition_context_rejects_payload_type_mismatch() {
    let store = store_with_leaf();
    let pending = PendingQueue::new();
    let sched = scheduler();
    let from = StateKey::new("root");
    let to = StateKey::new("a");
    let payload = Payload::new(42u32);

    let ctx = TransitionContext::new(&from, &to, to.clone(), Some(&payload), &store, &pending, &sched, None);
    let err = ctx.payload_visit(TypeId::of::<String>(), "String", &mut |_| {});
    assert!(matches!(err, Err(EngineError::PayloadMismatch { .. })));
}

#[tokio::test]
async fn transition_context_visits_matching_payload() {
    let store = store_with_leaf();
    let pending = PendingQueue::new();
    let sched = scheduler();
    let from = StateKey::new("root");
    let to = StateKey::new("a");
    let payload = Payload::new(42u32);

    let ctx = TransitionContext::new(&from, &to, to.clone(), Some(&payload), &store, &pending, &sched, None);
    let mut seen = 0u32;
    ctx.payload_visit(TypeId::of::<u32>(), "u32", &mut |value| {
        seen = *value.downcast_ref::<u32>().unwrap();
    })
    .unwrap();
    assert_eq!(seen, 42);
}

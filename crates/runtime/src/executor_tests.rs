use super::*;
use crate::planner::{plan_start, plan_transition};
use std::any::TypeId;
use std::sync::atomic::{AtomicU32, Ordering};
use tsm_core::error::HandlerError;
use tsm_core::future::ready;
use tsm_core::kind::NodeKind;
use tsm_core::node::{NodeDefinition, TransitionCtx};
use tsm_core::testing::{interior, leaf, root};
use tsm_core::tree::TreeBuilder;

fn request<'a>(
    tree: &'a Tree,
    store: &'a DataStore,
    pending: &'a PendingQueue,
    scheduler: &'a Scheduler,
    plan: TransitionPlan,
) -> ExecuteRequest<'a> {
    ExecuteRequest {
        tree,
        store,
        pending,
        scheduler,
        plan,
        payload: None,
        action: None,
        receiving: StateKey::new("test"),
        trigger: "test".into(),
    }
}

fn scheduler() -> (Scheduler, tokio::sync::mpsc::UnboundedReceiver<tsm_core::message::Msg>) {
    let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
    (Scheduler::new(tx), rx)
}

fn switch_tree(order: Arc<parking_lot::Mutex<Vec<&'static str>>>) -> Tree {
    let exit_order = order.clone();
    let enter_order = order;
    TreeBuilder::new()
        .add(root("root", "off"))
        .add(leaf("off", "root").on_exit(Arc::new(move |_ctx| {
            exit_order.lock().push("exit off");
            ready(Ok(()))
        })))
        .add(leaf("on", "root").on_enter(Arc::new(move |_ctx| {
            enter_order.lock().push("enter on");
            ready(Ok(()))
        })))
        .build()
        .unwrap()
}

#[tokio::test]
async fn switch_runs_exit_then_entry() {
    let order = Arc::new(parking_lot::Mutex::new(Vec::<&'static str>::new()));
    let store = DataStore::new(Arc::new(switch_tree(order.clone())));
    let tree = switch_tree(order.clone());
    let pending = PendingQueue::new();
    let (sched, _rx) = scheduler();

    let plan = plan_transition(&tree, &StateKey::new("off"), &StateKey::new("on"), false).unwrap();
    let transition = execute(request(&tree, &store, &pending, &sched, plan)).await.unwrap();

    assert_eq!(transition.from, StateKey::new("off"));
    assert_eq!(transition.to, StateKey::new("on"));
    assert_eq!(transition.exited, vec![StateKey::new("off")]);
    assert_eq!(transition.entered, vec![StateKey::new("on")]);
    assert_eq!(*order.lock(), vec!["exit off", "enter on"]);
}

#[tokio::test]
async fn descent_from_start_follows_initial_child_to_a_leaf() {
    fn descent_tree() -> Tree {
        TreeBuilder::new()
            .add(root("root", "a"))
            .add(interior("a", "root", "a1"))
            .add(leaf("a1", "a"))
            .add(leaf("a2", "a"))
            .build()
            .unwrap()
    }

    let store = DataStore::new(Arc::new(descent_tree()));
    let tree = descent_tree();
    let pending = PendingQueue::new();
    let (sched, _rx) = scheduler();

    let plan = plan_start(&tree, None);
    let transition = execute(request(&tree, &store, &pending, &sched, plan)).await.unwrap();

    assert_eq!(transition.from, StateKey::new("root"));
    assert_eq!(transition.to, StateKey::new("a1"));
    assert_eq!(transition.entered, vec![StateKey::new("root"), StateKey::new("a"), StateKey::new("a1")]);
}

#[derive(Clone, Debug, PartialEq)]
struct Count(u32);

fn count_from_payload() -> Arc<
    dyn Fn(&dyn TransitionCtx) -> tsm_core::future::BoxFuture<Result<Box<dyn std::any::Any + Send + Sync>, HandlerError>>
        + Send
        + Sync,
> {
    Arc::new(|ctx: &dyn TransitionCtx| {
        let result = ctx
            .payload::<u32>()
            .map(|v| Box::new(Count(*v)) as Box<dyn std::any::Any + Send + Sync>)
            .map_err(|err| HandlerError::msg(err.to_string()));
        Box::pin(async move { result })
    })
}

fn payload_tree() -> Tree {
    let y = NodeDefinition::new("y", NodeKind::Leaf).parent("root").with_data::<Count>(count_from_payload());
    TreeBuilder::new().add(root("root", "x")).add(leaf("x", "root")).add(y).build().unwrap()
}

#[tokio::test]
async fn payload_feeds_initial_data() {
    let store = DataStore::new(Arc::new(payload_tree()));
    let tree = payload_tree();
    let pending = PendingQueue::new();
    let (sched, _rx) = scheduler();
    let plan = plan_transition(&tree, &StateKey::new("x"), &StateKey::new("y"), false).unwrap();

    let mut req = request(&tree, &store, &pending, &sched, plan);
    req.payload = Some(Payload::new(42u32));
    execute(req).await.unwrap();

    let mut seen = None;
    store
        .visit(&StateKey::new("y"), Some(&StateKey::new("y")), TypeId::of::<Count>(), &mut |value| {
            seen = value.downcast_ref::<Count>().cloned();
        })
        .unwrap();
    assert_eq!(seen, Some(Count(42)));
}

fn failing_entry_tree(calls: Arc<AtomicU32>) -> Tree {
    let y = NodeDefinition::new("y", NodeKind::Leaf)
        .parent("root")
        .with_data::<Count>(Arc::new(|_ctx: &dyn TransitionCtx| {
            ready(Ok(Box::new(Count(1)) as Box<dyn std::any::Any + Send + Sync>))
        }))
        .on_enter(Arc::new(move |_ctx| {
            calls.fetch_add(1, Ordering::SeqCst);
            ready(Err(HandlerError::msg("boom")))
        }));
    TreeBuilder::new().add(root("root", "x")).add(leaf("x", "root")).add(y).build().unwrap()
}

#[tokio::test]
async fn failed_entry_discards_the_half_entered_cell() {
    let calls = Arc::new(AtomicU32::new(0));
    let store = DataStore::new(Arc::new(failing_entry_tree(calls.clone())));
    let tree = failing_entry_tree(calls.clone());
    let pending = PendingQueue::new();
    let (sched, _rx) = scheduler();
    let plan = plan_transition(&tree, &StateKey::new("x"), &StateKey::new("y"), false).unwrap();

    let err = execute(request(&tree, &store, &pending, &sched, plan)).await.unwrap_err();
    assert!(matches!(err, EngineError::ProcessingError { .. }));

    let err = store.visit(&StateKey::new("y"), Some(&StateKey::new("y")), TypeId::of::<Count>(), &mut |_| {});
    assert!(matches!(err, Err(EngineError::DataUnavailable { .. })));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

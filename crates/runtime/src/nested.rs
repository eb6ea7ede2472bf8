// SPDX-License-Identifier: MIT

//! §4.G Nested-Machine Adapter: a leaf whose behavior is delegated to a
//! child [`crate::machine::Machine`]. The adapter holds the child's handle
//! plus a background task that watches its `transitions`/`lifecycle`
//! streams and reports completion/disposal back to the parent — through the
//! same external-injection channel the [`crate::scheduler::Scheduler`] uses
//! for its own ticks (`scheduler.rs`), so the notification lands on the
//! parent's dispatch loop exactly like any other externally-posted message.

use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, warn};
use tsm_core::error::HandlerError;
use tsm_core::future::{ready, BoxFuture};
use tsm_core::key::StateKey;
use tsm_core::kind::NodeKind;
use tsm_core::message::Msg;
use tsm_core::node::{MessageCtx, NodeDefinition, TransitionCtx};
use tsm_core::result::{Lifecycle, MessageResult, Transition};

use crate::machine::Machine;

/// Public snapshot exposed through the standard data API
/// (`Machine::data::<NestedMachineData>(leaf)`), refreshed after every
/// transition the child runs.
#[derive(Debug, Clone)]
pub struct NestedMachineData {
    pub current_leaf: StateKey,
    pub lifecycle: Lifecycle,
}

/// Posted to the parent once the child completes (reaches a `FinalLeaf`, or
/// `is_done` returns `true` for one of its transitions).
#[derive(Debug, Clone)]
pub struct MachineDone {
    pub final_state: StateKey,
}

/// Posted to the parent if the child is disposed without the parent having
/// asked for it (e.g. the child disposed itself).
#[derive(Debug, Clone)]
pub struct MachineDisposed;

/// Internal sentinel that keeps the adapter's public `NestedMachineData`
/// cell in sync with the child's actual state. Never observable outside
/// this module.
#[derive(Debug, Clone)]
struct RefreshNested {
    current_leaf: StateKey,
    lifecycle: Lifecycle,
}

/// Per-leaf configuration for [`nested_leaf`].
#[derive(Clone)]
pub struct NestedOptions {
    /// Forward messages the adapter's own ancestors don't claim first to
    /// the child (§4.G). When `false` the adapter always returns
    /// `Unhandled`, leaving the child to run purely off its own timers.
    pub forward_messages: bool,
    /// Dispose the child when this leaf is exited.
    pub dispose_on_exit: bool,
    /// Extra completion predicate, evaluated in addition to "child entered
    /// a `FinalLeaf`".
    pub is_done: Option<Arc<dyn Fn(&Transition) -> bool + Send + Sync>>,
}

impl Default for NestedOptions {
    fn default() -> Self {
        Self { forward_messages: true, dispose_on_exit: true, is_done: None }
    }
}

impl NestedOptions {
    pub fn new() -> Self {
        Self::default()
    }

    tsm_core::setters! {
        set { forward_messages: bool, dispose_on_exit: bool }
        option { is_done: Arc<dyn Fn(&Transition) -> bool + Send + Sync> }
    }
}

fn is_complete(child: &Machine, opts: &NestedOptions, transition: &Transition) -> bool {
    child.is_final_leaf(&transition.to) || opts.is_done.as_ref().is_some_and(|f| f(transition))
}

struct NestedRuntime {
    child: Machine,
    watcher: tokio::task::JoinHandle<()>,
}

fn spawn_watcher(child: Machine, opts: NestedOptions, ext_tx: mpsc::UnboundedSender<Msg>) -> tokio::task::JoinHandle<()> {
    let mut transitions = child.subscribe_transitions();
    let mut lifecycle = child.subscribe_lifecycle();

    tokio::spawn(async move {
        loop {
            tokio::select! {
                recv = transitions.recv() => {
                    match recv {
                        Ok(transition) => {
                            let _ = ext_tx.send(Msg::new(RefreshNested {
                                current_leaf: transition.to.clone(),
                                lifecycle: *lifecycle.borrow(),
                            }));
                            if is_complete(&child, &opts, &transition) {
                                debug!(state = %transition.to, "nested machine completed");
                                let _ = ext_tx.send(Msg::new(MachineDone { final_state: transition.to }));
                            }
                        }
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            warn!(skipped, "nested machine transition stream lagged");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
                changed = lifecycle.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let current = *lifecycle.borrow();
                    if current == Lifecycle::Disposed {
                        let _ = ext_tx.send(Msg::new(MachineDisposed));
                        break;
                    }
                }
            }
        }
    })
}

/// Build a leaf whose behavior is delegated to a nested [`Machine`] (§4.G).
/// `factory` constructs a fresh (not-yet-started) child each time this leaf
/// is entered. `ext_tx` is the parent's external-injection sender — obtain
/// one from [`crate::machine::ExternalQueue::sender`] before the parent
/// itself is constructed with [`crate::machine::Machine::with_external_queue`].
pub fn nested_leaf(
    key: impl Into<StateKey>,
    parent: impl Into<StateKey>,
    factory: Arc<dyn Fn() -> Machine + Send + Sync>,
    opts: NestedOptions,
    ext_tx: mpsc::UnboundedSender<Msg>,
) -> NodeDefinition {
    let runtime: Arc<Mutex<Option<NestedRuntime>>> = Arc::new(Mutex::new(None));

    let initial_data = {
        let runtime = runtime.clone();
        let opts = opts.clone();
        let ext_tx = ext_tx.clone();
        Arc::new(move |_ctx: &dyn TransitionCtx| {
            let runtime = runtime.clone();
            let opts = opts.clone();
            let ext_tx = ext_tx.clone();
            let factory = factory.clone();
            Box::pin(async move {
                let child = factory();
                child.start().await.map_err(|err| HandlerError::msg(err.to_string()))?;
                let watcher = spawn_watcher(child.clone(), opts, ext_tx);
                let snapshot = NestedMachineData { current_leaf: child.current_leaf(), lifecycle: child.lifecycle() };
                *runtime.lock() = Some(NestedRuntime { child, watcher });
                Ok(Box::new(snapshot) as Box<dyn std::any::Any + Send + Sync>)
            }) as BoxFuture<_>
        })
    };

    let on_message = {
        let runtime = runtime.clone();
        let forward_messages = opts.forward_messages;
        Arc::new(move |ctx: &dyn MessageCtx| {
            let msg = ctx.message();

            if let Some(refresh) = msg.downcast_ref::<RefreshNested>() {
                let snapshot = NestedMachineData { current_leaf: refresh.current_leaf.clone(), lifecycle: refresh.lifecycle };
                let result = ctx.replace_data::<NestedMachineData>(None, snapshot).map(|()| MessageResult::stay());
                return ready(result.map_err(|err| HandlerError::msg(err.to_string())));
            }

            if !forward_messages {
                return ready(Ok(MessageResult::unhandled()));
            }

            let maybe_child = runtime.lock().as_ref().map(|rt| rt.child.clone());
            let msg = msg.clone();
            Box::pin(async move {
                match maybe_child {
                    Some(child) => {
                        child.send_msg(msg).await.map_err(|err| HandlerError::msg(err.to_string()))?;
                        Ok(MessageResult::stay())
                    }
                    None => Ok(MessageResult::unhandled()),
                }
            }) as BoxFuture<_>
        })
    };

    let on_exit = {
        let runtime = runtime.clone();
        let dispose_on_exit = opts.dispose_on_exit;
        Arc::new(move |_ctx: &dyn TransitionCtx| {
            let taken = runtime.lock().take();
            Box::pin(async move {
                if let Some(rt) = taken {
                    rt.watcher.abort();
                    if dispose_on_exit {
                        rt.child.dispose().await;
                    }
                }
                Ok(())
            }) as BoxFuture<_>
        })
    };

    NodeDefinition::new(key, NodeKind::Leaf)
        .parent(parent)
        .with_data::<NestedMachineData>(initial_data)
        .on_message(on_message)
        .on_exit(on_exit)
}

#[cfg(test)]
#[path = "nested_tests.rs"]
mod tests;

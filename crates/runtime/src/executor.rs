// SPDX-License-Identifier: MIT

//! §4.C Transition Executor: runs a [`TransitionPlan`] against the live
//! `Tree`/`DataStore`/`Scheduler`, in the phased order the spec fixes and
//! never reorders. Tracing/error-wrapping style follows the teacher's own
//! effect executor (`crates/engine/src/executor.rs`): `debug!` before a
//! phase, `info!` on success, `error!` with the cause on failure.

use std::sync::Arc;
use tokio::sync::Notify;
use tracing::{debug, error, info};
use tsm_core::error::{EngineError, HandlerError};
use tsm_core::key::StateKey;
use tsm_core::message::Payload;
use tsm_core::node::TransitionActionFn;
use tsm_core::result::Transition;
use tsm_core::tree::Tree;

use crate::context::TransitionContext;
use crate::pending::PendingQueue;
use crate::planner::TransitionPlan;
use crate::scheduler::Scheduler;
use crate::store::DataStore;

fn node_missing(key: &StateKey) -> EngineError {
    EngineError::DataUnavailable { key: key.clone(), reason: "state key not present in this machine's tree" }
}

fn processing_error(receiving: &StateKey, message: &str, cause: HandlerError) -> EngineError {
    EngineError::ProcessingError { receiving: receiving.clone(), message: message.to_string(), cause }
}

/// Everything one call to [`execute`] needs beyond the plan itself.
pub(crate) struct ExecuteRequest<'a> {
    pub tree: &'a Tree,
    pub store: &'a DataStore,
    pub pending: &'a PendingQueue,
    pub scheduler: &'a Scheduler,
    pub plan: TransitionPlan,
    pub payload: Option<Payload>,
    pub action: Option<TransitionActionFn>,
    /// The leaf that was current when the triggering dispatch began —
    /// `ProcessingError::receiving` on failure (§7).
    pub receiving: StateKey,
    /// Human-readable description of whatever triggered this transition
    /// (a `Debug`-formatted message, or `"start"`/`"stop"` for lifecycle
    /// transitions), carried in `ProcessingError::message`.
    pub trigger: String,
}

/// Run `req.plan` to completion. On `Err`, every already-executed exit
/// stands (§9 "Open question — transition rollback"); the caller is
/// responsible for leaving `current_leaf` untouched.
pub(crate) async fn execute(req: ExecuteRequest<'_>) -> Result<Transition, EngineError> {
    let ExecuteRequest { tree, store, pending, scheduler, plan, payload, action, receiving, trigger } = req;
    let gate = Arc::new(Notify::new());

    debug!(from = %plan.from, target = %plan.target, "executing transition");

    if let Some(action) = action {
        let ctx = TransitionContext::new(
            &plan.from,
            &plan.target,
            plan.from.clone(),
            payload.as_ref(),
            store,
            pending,
            scheduler,
            Some(gate.clone()),
        );
        action(&ctx).await.map_err(|cause| processing_error(&receiving, &trigger, cause))?;
    }

    for key in &plan.exited {
        if let Err(err) = run_exit(tree, store, pending, scheduler, &gate, &plan, payload.as_ref(), key).await {
            let wrapped = processing_error(&receiving, &trigger, err);
            error!(%key, cause = %wrapped, "exit handler failed, aborting transition");
            return Err(wrapped);
        }
    }

    let mut entered = plan.entered.clone();
    for key in &plan.entered {
        if let Err(err) = enter_one(tree, store, pending, scheduler, &gate, &plan, payload.as_ref(), key).await {
            let wrapped = processing_error(&receiving, &trigger, err);
            error!(%key, cause = %wrapped, "entry handler failed, aborting transition");
            return Err(wrapped);
        }
    }

    let mut frontier = entered.last().cloned().unwrap_or_else(|| plan.target.clone());
    loop {
        let def = tree.get(&frontier).ok_or_else(|| node_missing(&frontier))?;
        if def.kind.is_leaf() {
            break;
        }
        let initial_child = def.initial_child.clone().ok_or_else(|| node_missing(&frontier))?;
        let ctx = TransitionContext::new(
            &plan.from,
            &plan.target,
            frontier.clone(),
            payload.as_ref(),
            store,
            pending,
            scheduler,
            Some(gate.clone()),
        );
        let child = initial_child(&ctx).await.map_err(|cause| processing_error(&receiving, &trigger, cause))?;
        if tree.parent_of(&child).as_ref() != Some(&frontier) {
            let wrapped = EngineError::MalformedInitialChild { parent: frontier.clone(), returned: child.clone() };
            error!(parent = %frontier, returned = %child, "initial_child returned a non-child key");
            return Err(wrapped);
        }
        if let Err(err) = enter_one(tree, store, pending, scheduler, &gate, &plan, payload.as_ref(), &child).await {
            let wrapped = processing_error(&receiving, &trigger, err);
            error!(key = %child, cause = %wrapped, "entry handler failed during initial-child descent");
            return Err(wrapped);
        }
        entered.push(child.clone());
        frontier = child;
    }

    gate.notify_waiters();

    info!(from = %plan.from, to = %frontier, exited = plan.exited.len(), entered = entered.len(), "transition completed");
    Ok(Transition { from: plan.from, to: frontier, exited: plan.exited, entered, payload })
}

async fn run_exit(
    tree: &Tree,
    store: &DataStore,
    pending: &PendingQueue,
    scheduler: &Scheduler,
    gate: &Arc<Notify>,
    plan: &TransitionPlan,
    payload: Option<&Payload>,
    key: &StateKey,
) -> Result<(), HandlerError> {
    let def = tree.get(key).ok_or_else(|| HandlerError::msg(format!("state key {key} not present in tree")))?;
    let ctx = TransitionContext::new(&plan.from, &plan.target, key.clone(), payload, store, pending, scheduler, Some(gate.clone()));
    def.on_exit.clone()(&ctx).await?;
    scheduler.cancel_owner(key);
    store.release(key).map_err(|err| HandlerError::msg(err.to_string()))?;
    Ok(())
}

/// Allocate `key`'s data cell (if data-bearing) via `initial_data`, anchored
/// on its parent (its own cell doesn't exist yet), then run `on_enter`
/// anchored on itself (§4.E: "on entry of N, N.data_cell exists before
/// on_enter runs"). If `on_enter` fails after a successful allocation, the
/// half-entered cell is discarded (§4.C).
async fn enter_one(
    tree: &Tree,
    store: &DataStore,
    pending: &PendingQueue,
    scheduler: &Scheduler,
    gate: &Arc<Notify>,
    plan: &TransitionPlan,
    payload: Option<&Payload>,
    key: &StateKey,
) -> Result<(), HandlerError> {
    let def = tree.get(key).ok_or_else(|| HandlerError::msg(format!("state key {key} not present in tree")))?;

    let mut allocated = false;
    if let Some(initial_data) = def.initial_data.clone() {
        let anchor = tree.parent_of(key).unwrap_or_else(|| key.clone());
        let ctx = TransitionContext::new(&plan.from, &plan.target, anchor, payload, store, pending, scheduler, Some(gate.clone()));
        let value = initial_data(&ctx).await?;
        store.allocate(key, value).map_err(|err| HandlerError::msg(err.to_string()))?;
        allocated = true;
    }

    let ctx = TransitionContext::new(&plan.from, &plan.target, key.clone(), payload, store, pending, scheduler, Some(gate.clone()));
    let result = def.on_enter.clone()(&ctx).await;
    if result.is_err() && allocated {
        let _ = store.release(key);
    }
    result
}

#[cfg(test)]
#[path = "executor_tests.rs"]
mod tests;

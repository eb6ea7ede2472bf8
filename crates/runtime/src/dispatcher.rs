// SPDX-License-Identifier: MIT

//! §4.D Message Dispatcher: the ancestor walk, filter-then-handler
//! resolution per node, and the redirect budget. Publishing onto the
//! `transitions`/`processed_messages`/`errors` streams is the caller's job
//! (`machine.rs`) — this module only computes the `ProcessResult`.

use tracing::{debug, warn};
use tsm_core::error::EngineError;
use tsm_core::key::StateKey;
use tsm_core::kind::NodeKind;
use tsm_core::message::Msg;
use tsm_core::node::NodeDefinition;
use tsm_core::result::{Handled, MessageResult, ProcessResult};
use tsm_core::tree::Tree;

use crate::context::MessageContext;
use crate::executor::{execute, ExecuteRequest};
use crate::pending::PendingQueue;
use crate::planner::plan_transition;
use crate::scheduler::Scheduler;
use crate::store::DataStore;

fn node_missing(key: &StateKey) -> EngineError {
    EngineError::DataUnavailable { key: key.clone(), reason: "state key not present in this machine's tree" }
}

async fn resolve_result(def: &NodeDefinition, ctx: &MessageContext<'_>) -> Result<MessageResult, EngineError> {
    for filter in &def.filters {
        if let Some(result) = filter(ctx).await.map_err(|cause| EngineError::ProcessingError {
            receiving: ctx.handling_state().clone(),
            message: format!("{:?}", ctx.message()),
            cause,
        })? {
            return Ok(result);
        }
    }
    (def.on_message)(ctx).await.map_err(|cause| EngineError::ProcessingError {
        receiving: ctx.handling_state().clone(),
        message: format!("{:?}", ctx.message()),
        cause,
    })
}

/// Run one `send(msg)` to completion, including any cascaded redirects.
/// `current_leaf` is read-only here; the caller applies the returned
/// transition's `to` as the new leaf.
#[allow(clippy::too_many_arguments)]
pub(crate) async fn dispatch(
    tree: &Tree,
    store: &DataStore,
    pending: &PendingQueue,
    scheduler: &Scheduler,
    redirect_limit: usize,
    current_leaf: &StateKey,
    msg: &Msg,
) -> Result<ProcessResult, EngineError> {
    let receiving = current_leaf.clone();

    if tree.get(current_leaf).ok_or_else(|| node_missing(current_leaf))?.kind == NodeKind::FinalLeaf {
        debug!(leaf = %current_leaf, "final leaf absorbs message unhandled");
        return Ok(ProcessResult::Unhandled { notified: Vec::new() });
    }

    let mut leaf = current_leaf.clone();
    let mut redirects = 0usize;

    loop {
        let mut notified = Vec::new();
        let mut redirected_to = None;

        for k in tree.ancestors_of(leaf.clone()) {
            notified.push(k.clone());
            let def = tree.get(&k).ok_or_else(|| node_missing(&k))?;
            let ctx = MessageContext::new(msg, &k, store, pending, scheduler);
            let result = resolve_result(def, &ctx).await?;

            match result {
                MessageResult::Unhandled => continue,
                MessageResult::Stay => {
                    return Ok(ProcessResult::Handled(Handled { receiving, handling: k, transition: None }));
                }
                MessageResult::GoTo { target, payload, action, reenter_target } => {
                    let plan = plan_transition(tree, &leaf, &target, reenter_target)?;
                    let req = ExecuteRequest {
                        tree,
                        store,
                        pending,
                        scheduler,
                        plan,
                        payload,
                        action,
                        receiving: receiving.clone(),
                        trigger: format!("{:?}", msg),
                    };
                    let transition = execute(req).await?;
                    return Ok(ProcessResult::Handled(Handled {
                        receiving,
                        handling: k,
                        transition: Some(transition),
                    }));
                }
                MessageResult::GoToSelf { action } => {
                    let plan = plan_transition(tree, &leaf, &k, true)?;
                    let req = ExecuteRequest {
                        tree,
                        store,
                        pending,
                        scheduler,
                        plan,
                        payload: None,
                        action,
                        receiving: receiving.clone(),
                        trigger: format!("{:?}", msg),
                    };
                    let transition = execute(req).await?;
                    return Ok(ProcessResult::Handled(Handled {
                        receiving,
                        handling: k,
                        transition: Some(transition),
                    }));
                }
                MessageResult::Redirect { target } => {
                    redirects += 1;
                    if redirects > redirect_limit {
                        return Err(EngineError::RedirectLoop { limit: redirect_limit, origin: receiving });
                    }
                    warn!(from = %k, %target, redirects, "redirecting, re-dispatching from new leaf");
                    let plan = plan_transition(tree, &leaf, &target, false)?;
                    let req = ExecuteRequest {
                        tree,
                        store,
                        pending,
                        scheduler,
                        plan,
                        payload: None,
                        action: None,
                        receiving: receiving.clone(),
                        trigger: format!("{:?}", msg),
                    };
                    let transition = execute(req).await?;
                    redirected_to = Some(transition.to);
                    break;
                }
            }
        }

        match redirected_to {
            Some(new_leaf) => leaf = new_leaf,
            None => return Ok(ProcessResult::Unhandled { notified }),
        }
    }
}

#[cfg(test)]
#[path = "dispatcher_tests.rs"]
mod tests;

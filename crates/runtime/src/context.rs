// SPDX-License-Identifier: MIT

//! Concrete `MessageCtx`/`TransitionCtx` implementations (§4.E). Borrowed,
//! call-scoped views over the live `DataStore`, pending queue, and
//! scheduler — the runtime side of the cycle-breaking trait split described
//! in `tsm_core::node`.
//!
//! The compile-time reason `StaleContext` (§7) is unreachable from these
//! types: every handler closure returns a `'static` `BoxFuture`, so the
//! borrow checker already forbids a handler from retaining `&dyn
//! MessageCtx`/`&dyn TransitionCtx` past the call that produced it. The
//! variant stays in `EngineError` for API completeness.

use crate::pending::PendingQueue;
use crate::scheduler::Scheduler;
use std::any::{Any, TypeId};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tsm_core::error::EngineError;
use tsm_core::key::StateKey;
use tsm_core::message::{Msg, Payload};
use tsm_core::node::{CancelHandle, MessageCtx, MessageProducer, TransitionCtx};

use crate::store::DataStore;

pub(crate) struct MessageContext<'a> {
    msg: &'a Msg,
    handling_state: &'a StateKey,
    store: &'a DataStore,
    pending: &'a PendingQueue,
    scheduler: &'a Scheduler,
}

impl<'a> MessageContext<'a> {
    pub(crate) fn new(
        msg: &'a Msg,
        handling_state: &'a StateKey,
        store: &'a DataStore,
        pending: &'a PendingQueue,
        scheduler: &'a Scheduler,
    ) -> Self {
        Self { msg, handling_state, store, pending, scheduler }
    }
}

impl MessageCtx for MessageContext<'_> {
    fn message(&self) -> &Msg {
        self.msg
    }

    fn handling_state(&self) -> &StateKey {
        self.handling_state
    }

    fn data_visit(
        &self,
        key: Option<&StateKey>,
        type_id: TypeId,
        _type_name: &'static str,
        visit: &mut dyn FnMut(&dyn Any),
    ) -> Result<(), EngineError> {
        self.store.visit(self.handling_state, key, type_id, visit)
    }

    fn data_mutate(
        &self,
        key: Option<&StateKey>,
        type_id: TypeId,
        _type_name: &'static str,
        mutate: &mut dyn FnMut(&mut dyn Any),
    ) -> Result<(), EngineError> {
        self.store.mutate(self.handling_state, key, type_id, mutate)
    }

    fn data_replace_dyn(
        &self,
        key: Option<&StateKey>,
        type_id: TypeId,
        _type_name: &'static str,
        value: Box<dyn Any + Send + Sync>,
    ) -> Result<(), EngineError> {
        self.store.replace(self.handling_state, key, type_id, value)
    }

    fn post(&self, msg: Msg) {
        self.pending.push(msg);
    }

    fn schedule(&self, producer: MessageProducer, duration: Duration, periodic: bool) -> CancelHandle {
        if duration.is_zero() && !periodic {
            self.pending.push(producer());
            return CancelHandle::new(|| {});
        }
        self.scheduler.schedule(self.handling_state.clone(), producer, duration, periodic, None)
    }
}

/// `anchor` is the node whose entry/exit/initial-child/initial-data hook is
/// currently running — data resolution (`key = None`) walks ancestors
/// starting there, per §4.E's per-phase anchoring (entering node during
/// `on_enter`, exiting node during `on_exit`, etc).
pub(crate) struct TransitionContext<'a> {
    from: &'a StateKey,
    to: &'a StateKey,
    anchor: StateKey,
    payload: Option<&'a Payload>,
    store: &'a DataStore,
    pending: &'a PendingQueue,
    scheduler: &'a Scheduler,
    /// Gate schedule() calls made during this transition until it completes
    /// (§4.E "schedule inside a transition defers the first tick").
    gate: Option<Arc<Notify>>,
}

impl<'a> TransitionContext<'a> {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        from: &'a StateKey,
        to: &'a StateKey,
        anchor: StateKey,
        payload: Option<&'a Payload>,
        store: &'a DataStore,
        pending: &'a PendingQueue,
        scheduler: &'a Scheduler,
        gate: Option<Arc<Notify>>,
    ) -> Self {
        Self { from, to, anchor, payload, store, pending, scheduler, gate }
    }
}

impl TransitionCtx for TransitionContext<'_> {
    fn from(&self) -> &StateKey {
        self.from
    }

    fn to(&self) -> &StateKey {
        self.to
    }

    fn payload_visit(
        &self,
        type_id: TypeId,
        type_name: &'static str,
        visit: &mut dyn FnMut(&dyn Any),
    ) -> Result<(), EngineError> {
        match self.payload {
            Some(payload) if payload.type_id() == type_id => {
                visit(payload.as_any());
                Ok(())
            }
            _ => Err(EngineError::PayloadMismatch { expected: type_name, reason: "absent or wrong type" }),
        }
    }

    fn data_visit(
        &self,
        key: Option<&StateKey>,
        type_id: TypeId,
        _type_name: &'static str,
        visit: &mut dyn FnMut(&dyn Any),
    ) -> Result<(), EngineError> {
        self.store.visit(&self.anchor, key, type_id, visit)
    }

    fn data_mutate(
        &self,
        key: Option<&StateKey>,
        type_id: TypeId,
        _type_name: &'static str,
        mutate: &mut dyn FnMut(&mut dyn Any),
    ) -> Result<(), EngineError> {
        self.store.mutate(&self.anchor, key, type_id, mutate)
    }

    fn data_replace_dyn(
        &self,
        key: Option<&StateKey>,
        type_id: TypeId,
        _type_name: &'static str,
        value: Box<dyn Any + Send + Sync>,
    ) -> Result<(), EngineError> {
        self.store.replace(&self.anchor, key, type_id, value)
    }

    fn post(&self, msg: Msg) {
        self.pending.push(msg);
    }

    fn schedule(&self, producer: MessageProducer, duration: Duration, periodic: bool) -> CancelHandle {
        if duration.is_zero() && !periodic {
            self.pending.push(producer());
            return CancelHandle::new(|| {});
        }
        self.scheduler.schedule(self.anchor.clone(), producer, duration, periodic, self.gate.clone())
    }
}

#[cfg(test)]
#[path = "context_tests.rs"]
mod tests;

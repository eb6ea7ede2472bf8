// SPDX-License-Identifier: MIT

//! The frozen [`NodeDefinition`] (§3) and the context traits handlers are
//! called with.
//!
//! `on_enter`/`on_exit`/`on_message`/`initial_child`/`initial_data` all need
//! a per-call view of the live machine (data access, payload, post,
//! schedule — §4.E). That view is built and owned by `tsm-runtime` (it
//! borrows the live data store and scheduler), but the handler closures
//! themselves are named on the *frozen* `NodeDefinition` that lives here in
//! `tsm-core`. [`MessageCtx`] and [`TransitionCtx`] break that cycle: they
//! are plain object-safe traits `tsm-runtime`'s concrete context structs
//! implement, the same type-erasure move already used for [`Msg`].

use crate::codec::DataCodec;
use crate::error::{EngineError, HandlerError};
use crate::future::BoxFuture;
use crate::key::StateKey;
use crate::kind::NodeKind;
use crate::message::{Message, Msg, Payload};
use crate::result::MessageResult;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// A message producer handed to `schedule` (§4.F): invoked once per tick to
/// build the message that gets posted.
pub type MessageProducer = Arc<dyn Fn() -> Msg + Send + Sync>;

/// Handle returned by `schedule`. Cancellation is owner-scoped and
/// idempotent (§4.F); the concrete cancel action is supplied by whichever
/// scheduler built the handle.
#[derive(Clone)]
pub struct CancelHandle(Arc<dyn Fn() + Send + Sync>);

impl CancelHandle {
    pub fn new(cancel: impl Fn() + Send + Sync + 'static) -> Self {
        Self(Arc::new(cancel))
    }

    /// Cancel the scheduled task. Double-cancel is a no-op; the closure
    /// supplied at construction is responsible for that guarantee.
    pub fn cancel(&self) {
        (self.0)()
    }
}

impl fmt::Debug for CancelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CancelHandle(..)")
    }
}

/// Per-call view given to `on_message` (§4.E `MessageContext`).
///
/// Single-use: the runtime invalidates the concrete implementation once the
/// handler call returns (`StaleContext` on reuse).
pub trait MessageCtx: Send + Sync {
    fn message(&self) -> &Msg;
    /// The state whose `on_message` is running — may differ from the
    /// current leaf (the "receiving" state) when an ancestor handles it.
    fn handling_state(&self) -> &StateKey;

    fn data_visit(
        &self,
        key: Option<&StateKey>,
        type_id: TypeId,
        type_name: &'static str,
        visit: &mut dyn FnMut(&dyn Any),
    ) -> Result<(), EngineError>;

    fn data_mutate(
        &self,
        key: Option<&StateKey>,
        type_id: TypeId,
        type_name: &'static str,
        mutate: &mut dyn FnMut(&mut dyn Any),
    ) -> Result<(), EngineError>;

    fn data_replace_dyn(
        &self,
        key: Option<&StateKey>,
        type_id: TypeId,
        type_name: &'static str,
        value: Box<dyn Any + Send + Sync>,
    ) -> Result<(), EngineError>;

    fn post(&self, msg: Msg);

    fn schedule(&self, producer: MessageProducer, duration: Duration, periodic: bool) -> CancelHandle;
}

/// Per-call view given to `on_enter`/`on_exit`/`initial_child`/
/// `initial_data`/a transition's `action` (§4.E `TransitionContext`).
pub trait TransitionCtx: Send + Sync {
    fn from(&self) -> &StateKey;
    fn to(&self) -> &StateKey;

    fn payload_visit(
        &self,
        type_id: TypeId,
        type_name: &'static str,
        visit: &mut dyn FnMut(&dyn Any),
    ) -> Result<(), EngineError>;

    fn data_visit(
        &self,
        key: Option<&StateKey>,
        type_id: TypeId,
        type_name: &'static str,
        visit: &mut dyn FnMut(&dyn Any),
    ) -> Result<(), EngineError>;

    fn data_mutate(
        &self,
        key: Option<&StateKey>,
        type_id: TypeId,
        type_name: &'static str,
        mutate: &mut dyn FnMut(&mut dyn Any),
    ) -> Result<(), EngineError>;

    fn data_replace_dyn(
        &self,
        key: Option<&StateKey>,
        type_id: TypeId,
        type_name: &'static str,
        value: Box<dyn Any + Send + Sync>,
    ) -> Result<(), EngineError>;

    fn post(&self, msg: Msg);

    fn schedule(&self, producer: MessageProducer, duration: Duration, periodic: bool) -> CancelHandle;
}

macro_rules! data_access_sugar {
    ($ty:ty) => {
        impl $ty {
            /// Data of the resolved node, cloned out of its guarded cell.
            /// `key = None` resolves to the nearest ancestor (including the
            /// handling/entering state) whose declared data type is `D`.
            pub fn data<D: Clone + 'static>(&self, key: Option<&StateKey>) -> Result<D, EngineError> {
                let mut out: Option<D> = None;
                self.data_visit(key, TypeId::of::<D>(), std::any::type_name::<D>(), &mut |any| {
                    out = any.downcast_ref::<D>().cloned();
                })?;
                out.ok_or_else(|| EngineError::DataUnavailable {
                    key: key.cloned().unwrap_or_else(|| StateKey::new("<ancestor>")),
                    reason: "type mismatch after lookup",
                })
            }

            /// Mutate the resolved node's data in place.
            pub fn update_data<D: 'static>(
                &self,
                key: Option<&StateKey>,
                mut mutator: impl FnMut(&mut D),
            ) -> Result<(), EngineError> {
                self.data_mutate(key, TypeId::of::<D>(), std::any::type_name::<D>(), &mut |any| {
                    if let Some(d) = any.downcast_mut::<D>() {
                        mutator(d);
                    }
                })
            }

            /// Replace the resolved node's data wholesale.
            pub fn replace_data<D: Send + Sync + 'static>(
                &self,
                key: Option<&StateKey>,
                value: D,
            ) -> Result<(), EngineError> {
                self.data_replace_dyn(key, TypeId::of::<D>(), std::any::type_name::<D>(), Box::new(value))
            }

            /// Enqueue `msg` for dispatch after the current handler/transition completes.
            pub fn post_msg<T: Message>(&self, msg: T) {
                self.post(Msg::new(msg));
            }

            /// Schedule a repeated/one-shot message, owned by whichever state is
            /// exiting/entering through this context.
            pub fn schedule_msg<T: Message + Clone>(
                &self,
                msg: T,
                duration: Duration,
                periodic: bool,
            ) -> CancelHandle {
                let producer: MessageProducer = Arc::new(move || Msg::new(msg.clone()));
                self.schedule(producer, duration, periodic)
            }
        }
    };
}

data_access_sugar!(dyn MessageCtx + '_);
data_access_sugar!(dyn TransitionCtx + '_);

impl dyn TransitionCtx + '_ {
    /// The payload attached to the `GoTo` that produced this transition.
    pub fn payload<P: Clone + 'static>(&self) -> Result<P, EngineError> {
        let mut out: Option<P> = None;
        self.payload_visit(TypeId::of::<P>(), std::any::type_name::<P>(), &mut |any| {
            out = any.downcast_ref::<P>().cloned();
        })?;
        out.ok_or(EngineError::PayloadMismatch {
            expected: std::any::type_name::<P>(),
            reason: "absent or wrong type",
        })
    }
}

pub type MessageHandlerFn =
    Arc<dyn Fn(&dyn MessageCtx) -> BoxFuture<Result<MessageResult, HandlerError>> + Send + Sync>;
pub type TransitionHookFn = Arc<dyn Fn(&dyn TransitionCtx) -> BoxFuture<Result<(), HandlerError>> + Send + Sync>;
pub type InitialChildFn = Arc<dyn Fn(&dyn TransitionCtx) -> BoxFuture<Result<StateKey, HandlerError>> + Send + Sync>;
pub type InitialDataFn = Arc<
    dyn Fn(&dyn TransitionCtx) -> BoxFuture<Result<Box<dyn Any + Send + Sync>, HandlerError>> + Send + Sync,
>;
pub type TransitionActionFn = Arc<dyn Fn(&dyn TransitionCtx) -> BoxFuture<Result<(), HandlerError>> + Send + Sync>;

/// A pre-`on_message` interceptor (§3 `NodeDefinition.filters`). Filters run
/// in order before the node's own `on_message`; the first one to return
/// `Some(result)` short-circuits the remaining filters and `on_message`
/// itself. Returning `None` falls through to the next filter, and finally
/// to `on_message` if every filter passes.
pub type MessageFilterFn =
    Arc<dyn Fn(&dyn MessageCtx) -> BoxFuture<Result<Option<MessageResult>, HandlerError>> + Send + Sync>;

/// Type-erased `Clone::clone` for a data-bearing node's declared type,
/// captured at `with_data::<D>` time while `D` is still known. The runtime
/// data store uses this to snapshot a node's data onto its `data_stream`
/// after every successful mutation (§4.A) without itself ever knowing `D`.
/// This is why every data-bearing node's type must be `Clone` — an implicit
/// requirement the dynamic-typed source didn't need but a statically typed
/// broadcast stream does (`tokio::sync::broadcast` requires `T: Clone`).
pub type DataCloneFn = Arc<dyn Fn(&dyn Any) -> Box<dyn Any + Send + Sync> + Send + Sync>;

fn noop_hook() -> TransitionHookFn {
    Arc::new(|_ctx| crate::future::ready(Ok(())))
}

fn default_on_message() -> MessageHandlerFn {
    Arc::new(|_ctx| crate::future::ready(Ok(MessageResult::Unhandled)))
}

/// A single node in a frozen state tree (§3). Built by [`crate::tree::TreeBuilder`]
/// from a caller-assembled list of these (the fluent/declarative builder DSL
/// that would normally produce them is an external collaborator, per the
/// engine's scope).
#[derive(Clone)]
pub struct NodeDefinition {
    pub key: StateKey,
    pub parent: Option<StateKey>,
    /// Filled in by `TreeBuilder::build` from the parent links of sibling
    /// nodes, in the order they were added; empty on a definition handed to
    /// `TreeBuilder::add`.
    pub children: Vec<StateKey>,
    pub kind: NodeKind,
    pub initial_child: Option<InitialChildFn>,
    pub(crate) data_type: Option<TypeId>,
    pub(crate) data_type_name: Option<&'static str>,
    pub(crate) data_clone: Option<DataCloneFn>,
    pub initial_data: Option<InitialDataFn>,
    pub on_enter: TransitionHookFn,
    pub on_exit: TransitionHookFn,
    pub on_message: MessageHandlerFn,
    pub data_codec: Option<Arc<dyn DataCodec>>,
    pub filters: Vec<MessageFilterFn>,
    pub metadata: HashMap<String, serde_json::Value>,
}

impl NodeDefinition {
    pub fn new(key: impl Into<StateKey>, kind: NodeKind) -> Self {
        Self {
            key: key.into(),
            parent: None,
            children: Vec::new(),
            kind,
            initial_child: None,
            data_type: None,
            data_type_name: None,
            data_clone: None,
            initial_data: None,
            on_enter: noop_hook(),
            on_exit: noop_hook(),
            on_message: default_on_message(),
            data_codec: None,
            filters: Vec::new(),
            metadata: HashMap::new(),
        }
    }

    pub fn is_data_bearing(&self) -> bool {
        self.data_type.is_some()
    }

    pub fn data_type(&self) -> Option<TypeId> {
        self.data_type
    }

    pub fn data_type_name(&self) -> Option<&'static str> {
        self.data_type_name
    }

    pub fn data_clone_fn(&self) -> Option<&DataCloneFn> {
        self.data_clone.as_ref()
    }

    crate::setters! {
        set {
            on_enter: TransitionHookFn,
            on_exit: TransitionHookFn,
            on_message: MessageHandlerFn,
            filters: Vec<MessageFilterFn>,
            metadata: HashMap<String, serde_json::Value>
        }
        option {
            parent: StateKey,
            initial_child: InitialChildFn,
            data_codec: Arc<dyn DataCodec>
        }
    }

    /// Declare this node data-bearing with type `D`, supplying its
    /// `initial_data` producer. `data_type`/`initial_data` must be set
    /// together — `TreeBuilder::build` rejects one without the other. `D`
    /// must be `Clone` (see [`DataCloneFn`]).
    pub fn with_data<D: Clone + Send + Sync + 'static>(mut self, initial_data: InitialDataFn) -> Self {
        self.data_type = Some(TypeId::of::<D>());
        self.data_type_name = Some(std::any::type_name::<D>());
        self.data_clone = Some(Arc::new(|any: &dyn Any| -> Box<dyn Any + Send + Sync> {
            Box::new(
                any.downcast_ref::<D>()
                    .expect("data_clone invoked on a value whose TypeId didn't match its declared data_type")
                    .clone(),
            )
        }));
        self.initial_data = Some(initial_data);
        self
    }

    pub fn with_filter(mut self, filter: MessageFilterFn) -> Self {
        self.filters.push(filter);
        self
    }
}

impl fmt::Debug for NodeDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeDefinition")
            .field("key", &self.key)
            .field("parent", &self.parent)
            .field("children", &self.children)
            .field("kind", &self.kind)
            .field("data_type_name", &self.data_type_name)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[path = "node_tests.rs"]
mod tests;

// SPDX-License-Identifier: MIT

//! The message envelope and transition payload.
//!
//! The source keys handler dispatch off the runtime type (and, for some
//! handlers, the runtime *value*) of an arbitrary message object. Rust has
//! no open runtime type hierarchy for an arbitrary `M`, so a machine's
//! message type is required to implement [`Message`] — a thin marker
//! blanket-implemented for any `'static + Send + Sync + Debug` type — and
//! handlers are registered against `Arc<dyn Message>` envelopes. See
//! [`crate::handler_table::HandlerTable`] for the by-value/by-type lookup
//! this enables.

use std::any::{Any, TypeId};
use std::fmt::Debug;
use std::sync::Arc;

/// Anything that can flow through a machine's dispatch queue.
///
/// Blanket-implemented; user message types need nothing beyond `Debug` to
/// qualify. Dispatch matches on the *concrete* runtime type of a `Msg`
/// envelope (see [`crate::handler_table::HandlerTable`]), not on `Message`
/// itself — this trait only exists to let the envelope type-erase an
/// arbitrary payload while keeping `Debug` available for logging.
pub trait Message: Any + Send + Sync {
    fn as_any(&self) -> &dyn Any;
    fn fmt_debug(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result;
}

impl<T: Any + Send + Sync + Debug> Message for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn fmt_debug(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Debug::fmt(self, f)
    }
}

impl Debug for dyn Message {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.fmt_debug(f)
    }
}

/// Downcast helper used by both message envelopes and payload cells.
pub(crate) fn downcast_ref<T: 'static>(value: &dyn Any) -> Option<&T> {
    value.downcast_ref::<T>()
}

/// A type-erased message envelope. `Machine` and everything in this crate
/// work exclusively in terms of `Msg` — any `T: Message` can be lifted into
/// one with [`Msg::new`], and handler registration (by concrete type or by
/// value) downcasts back out. Cheap to clone (an `Arc` bump); this is what
/// lets one posted message be both delivered to a handler and echoed onto
/// the `processed_messages` stream without cloning the payload.
#[derive(Clone)]
pub struct Msg(Arc<dyn Message>);

impl Msg {
    pub fn new<T: Message>(value: T) -> Self {
        Self(Arc::new(value))
    }

    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        downcast_ref(self.0.as_any())
    }

    pub fn is<T: 'static>(&self) -> bool {
        self.0.as_any().is::<T>()
    }

    /// The concrete runtime type carried by this envelope. Used by
    /// [`crate::handler_table::HandlerTable`] for exact-type handler lookup.
    pub fn type_id(&self) -> TypeId {
        self.0.as_any().type_id()
    }
}

impl Debug for Msg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Debug::fmt(&*self.0, f)
    }
}

/// Optional arbitrary data attached to a `GoTo`, carried from the
/// handler that emitted it to every exit/entry hook of that transition.
/// Exposed to hooks only for the duration of the transition (see
/// `TransitionContext::payload` in `tsm-runtime`).
///
/// Backed by an `Arc` rather than a `Box` so a [`crate::result::Transition`]
/// event carrying a payload can still be cheaply [`Clone`]d onto a broadcast
/// stream without requiring the payload type itself to implement `Clone`.
#[derive(Clone)]
pub struct Payload(Arc<dyn Any + Send + Sync>);

impl Payload {
    pub fn new<P: Send + Sync + 'static>(value: P) -> Self {
        Self(Arc::new(value))
    }

    pub fn downcast_ref<P: 'static>(&self) -> Option<&P> {
        downcast_ref(&*self.0)
    }

    pub fn is<P: 'static>(&self) -> bool {
        self.0.is::<P>()
    }

    /// The concrete runtime type carried by this payload. Lets a
    /// type-erased caller (`tsm-runtime`'s `TransitionContext`) check a
    /// match before visiting, the same way [`Msg::type_id`] does.
    pub fn type_id(&self) -> TypeId {
        (*self.0).type_id()
    }

    /// Type-erased access to the wrapped value, for callers that only know
    /// the expected `TypeId` at the point of the call (not the static type
    /// `P`). Returns `&dyn Any` unconditionally; callers compare
    /// [`Payload::type_id`] themselves before trusting a downcast.
    pub fn as_any(&self) -> &dyn Any {
        &*self.0
    }
}

impl Debug for Payload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Payload").finish()
    }
}

#[cfg(test)]
#[path = "message_tests.rs"]
mod tests;

// SPDX-License-Identifier: MIT

//! §6 "Message lookup for handler binding": value-keyed handlers match
//! before type-keyed ones, and a type-keyed handler matches only the exact
//! runtime type (no subtype widening). `HandlerTable` is one legal way to
//! assemble a [`crate::node::NodeDefinition::on_message`] closure out of
//! individual registrations; a hand-written closure is equally valid.

use crate::future::ready;
use crate::message::{Message, Msg};
use crate::node::{MessageCtx, MessageHandlerFn};
use crate::result::MessageResult;
use std::any::TypeId;
use std::collections::HashMap;
use std::sync::Arc;

struct ValueEntry {
    type_id: TypeId,
    matches: Box<dyn Fn(&Msg) -> bool + Send + Sync>,
    handler: MessageHandlerFn,
}

/// Assembles a single node's `on_message` from per-message-type and
/// per-message-value registrations. Lookup order on dispatch: value match
/// first, then exact-type match, else `Unhandled`.
#[derive(Default)]
pub struct HandlerTable {
    by_value: Vec<ValueEntry>,
    by_type: HashMap<TypeId, MessageHandlerFn>,
}

impl HandlerTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler that only fires for messages of type `T` equal to
    /// `value`. Checked before any type-keyed registration, in the order
    /// value registrations were added.
    pub fn on_value<T>(mut self, value: T, handler: MessageHandlerFn) -> Self
    where
        T: Message + PartialEq + Send + Sync + 'static,
    {
        let matches = Box::new(move |msg: &Msg| msg.downcast_ref::<T>().is_some_and(|m| *m == value));
        self.by_value.push(ValueEntry { type_id: TypeId::of::<T>(), matches, handler });
        self
    }

    /// Register a handler for every message whose concrete runtime type is
    /// exactly `T`.
    pub fn on_type<T: Message>(mut self, handler: MessageHandlerFn) -> Self {
        self.by_type.insert(TypeId::of::<T>(), handler);
        self
    }

    fn resolve(&self, msg: &Msg) -> Option<MessageHandlerFn> {
        for entry in &self.by_value {
            if (entry.matches)(msg) {
                return Some(entry.handler.clone());
            }
        }
        self.by_type.get(&msg.type_id()).cloned()
    }

    /// Whether this table registers both a value-keyed and a type-keyed
    /// handler for `T` — the configuration §6 flags as a smell (the value
    /// match always wins, so the type-keyed handler for `T` is reachable
    /// only for values other than the ones registered, which is easy to get
    /// wrong). Not rejected outright; callers may assert on this in tests.
    pub fn has_overlap_risk<T: Message>(&self) -> bool {
        self.by_type.contains_key(&TypeId::of::<T>()) && self.by_value.iter().any(|e| e.type_id == TypeId::of::<T>())
    }

    /// Freeze this table into a `NodeDefinition.on_message` closure.
    /// Messages matching nothing are `Unhandled`.
    pub fn into_handler(self) -> MessageHandlerFn {
        let table = Arc::new(self);
        Arc::new(move |ctx: &dyn MessageCtx| {
            let handler = table.resolve(ctx.message());
            match handler {
                Some(handler) => handler(ctx),
                None => ready(Ok(MessageResult::Unhandled)),
            }
        })
    }
}

#[cfg(test)]
#[path = "handler_table_tests.rs"]
mod tests;

// SPDX-License-Identifier: MIT

//! The mutable half of component A (§4.A): per-node data cells and their
//! broadcast subscriptions. Arena-addressed alongside `tsm_core::tree::Tree`
//! via `NodeIndex` as an opaque `HashMap` key — `Tree` never exposes the raw
//! arena position, so a parallel `Vec` indexed by it isn't an option.

use parking_lot::RwLock;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast;
use tsm_core::error::EngineError;
use tsm_core::key::StateKey;
use tsm_core::node::{DataCloneFn, NodeDefinition};
use tsm_core::tree::{NodeIndex, Tree};

const DATA_STREAM_CAPACITY: usize = 64;

struct NodeInstance {
    data_type: Option<TypeId>,
    data_clone: Option<DataCloneFn>,
    cell: RwLock<Option<Box<dyn Any + Send + Sync>>>,
    subscribers: broadcast::Sender<Arc<dyn Any + Send + Sync>>,
}

impl NodeInstance {
    fn new(def: &NodeDefinition) -> Self {
        let (subscribers, _rx) = broadcast::channel(DATA_STREAM_CAPACITY);
        Self { data_type: def.data_type(), data_clone: def.data_clone_fn().cloned(), cell: RwLock::new(None), subscribers }
    }
}

/// Per-node data cells + subscriptions (§4.A `NodeInstance`). One per
/// running `Machine`, built fresh from the machine's `Tree` at construction.
pub(crate) struct DataStore {
    tree: Arc<Tree>,
    nodes: HashMap<NodeIndex, NodeInstance>,
}

impl DataStore {
    pub(crate) fn new(tree: Arc<Tree>) -> Self {
        let nodes = tree
            .iter()
            .filter_map(|def| tree.index_of(&def.key).map(|idx| (idx, NodeInstance::new(def))))
            .collect();
        Self { tree, nodes }
    }

    fn instance(&self, key: &StateKey) -> Result<&NodeInstance, EngineError> {
        self.tree
            .index_of(key)
            .and_then(|idx| self.nodes.get(&idx))
            .ok_or_else(|| EngineError::DataUnavailable { key: key.clone(), reason: "no such node in tree" })
    }

    /// Resolve `key` (or, if `None`, the nearest ancestor of `anchor`
    /// inclusive) whose declared data type is `type_id`.
    fn resolve(&self, anchor: &StateKey, key: Option<&StateKey>, type_id: TypeId) -> Result<StateKey, EngineError> {
        match key {
            Some(k) => {
                let instance = self.instance(k)?;
                if instance.data_type != Some(type_id) {
                    return Err(EngineError::DataUnavailable { key: k.clone(), reason: "declared data type does not match" });
                }
                Ok(k.clone())
            }
            None => self
                .tree
                .ancestors_of(anchor.clone())
                .find(|k| self.instance(k).map(|i| i.data_type == Some(type_id)).unwrap_or(false))
                .ok_or_else(|| EngineError::DataUnavailable {
                    key: anchor.clone(),
                    reason: "no active ancestor declares this data type",
                }),
        }
    }

    pub(crate) fn visit(
        &self,
        anchor: &StateKey,
        key: Option<&StateKey>,
        type_id: TypeId,
        visit: &mut dyn FnMut(&dyn Any),
    ) -> Result<(), EngineError> {
        let resolved = self.resolve(anchor, key, type_id)?;
        let instance = self.instance(&resolved)?;
        let guard = instance.cell.read();
        match guard.as_deref() {
            Some(value) => {
                visit(value);
                Ok(())
            }
            None => Err(EngineError::DataUnavailable { key: resolved, reason: "node is not active" }),
        }
    }

    pub(crate) fn mutate(
        &self,
        anchor: &StateKey,
        key: Option<&StateKey>,
        type_id: TypeId,
        mutate: &mut dyn FnMut(&mut dyn Any),
    ) -> Result<(), EngineError> {
        let resolved = self.resolve(anchor, key, type_id)?;
        {
            let instance = self.instance(&resolved)?;
            let mut guard = instance.cell.write();
            match guard.as_deref_mut() {
                Some(value) => mutate(value),
                None => return Err(EngineError::DataUnavailable { key: resolved, reason: "node is not active" }),
            }
        }
        self.emit(&resolved)
    }

    pub(crate) fn replace(
        &self,
        anchor: &StateKey,
        key: Option<&StateKey>,
        type_id: TypeId,
        value: Box<dyn Any + Send + Sync>,
    ) -> Result<(), EngineError> {
        let resolved = self.resolve(anchor, key, type_id)?;
        {
            let instance = self.instance(&resolved)?;
            let mut guard = instance.cell.write();
            if guard.is_none() {
                return Err(EngineError::DataUnavailable { key: resolved, reason: "node is not active" });
            }
            *guard = Some(value);
        }
        self.emit(&resolved)
    }

    fn emit(&self, key: &StateKey) -> Result<(), EngineError> {
        let instance = self.instance(key)?;
        if let Some(clone_fn) = &instance.data_clone {
            let guard = instance.cell.read();
            if let Some(value) = guard.as_deref() {
                let cloned: Arc<dyn Any + Send + Sync> = Arc::from(clone_fn(value));
                let _ = instance.subscribers.send(cloned);
            }
        }
        Ok(())
    }

    /// Allocate `key`'s data cell on entry (§4.C step 3), from the value
    /// produced by its `initial_data`. Does not emit — `data_stream` only
    /// reports replace/update (§4.A).
    pub(crate) fn allocate(&self, key: &StateKey, value: Box<dyn Any + Send + Sync>) -> Result<(), EngineError> {
        *self.instance(key)?.cell.write() = Some(value);
        Ok(())
    }

    /// Release `key`'s data cell on exit (§4.C step 2), after `on_exit` returns.
    pub(crate) fn release(&self, key: &StateKey) -> Result<(), EngineError> {
        *self.instance(key)?.cell.write() = None;
        Ok(())
    }

    pub(crate) fn is_data_bearing(&self, key: &StateKey) -> Result<bool, EngineError> {
        Ok(self.instance(key)?.data_type.is_some())
    }

    pub(crate) fn subscribe(
        &self,
        key: &StateKey,
        type_id: TypeId,
    ) -> Result<broadcast::Receiver<Arc<dyn Any + Send + Sync>>, EngineError> {
        let instance = self.instance(key)?;
        if instance.data_type != Some(type_id) {
            return Err(EngineError::DataUnavailable { key: key.clone(), reason: "declared data type does not match" });
        }
        Ok(instance.subscribers.subscribe())
    }

    /// Read-only snapshot for `Machine::data::<D>(key)` (outside any
    /// in-flight handler, so resolution anchors on `current_leaf`).
    pub(crate) fn read(
        &self,
        current_leaf: &StateKey,
        key: Option<&StateKey>,
        type_id: TypeId,
        visit: &mut dyn FnMut(&dyn Any),
    ) -> Result<(), EngineError> {
        self.visit(current_leaf, key, type_id, visit)
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;

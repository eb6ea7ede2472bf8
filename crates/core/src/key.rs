// SPDX-License-Identifier: MIT

//! Opaque node identifiers.

use smol_str::SmolStr;
use std::any::TypeId;
use std::marker::PhantomData;

/// Opaque identifier of a node in a state tree. Value-equality, cheap to
/// clone and hash (backed by a small-string optimization since most state
/// names are short identifiers).
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct StateKey(SmolStr);

impl StateKey {
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(SmolStr::new(name.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl std::fmt::Debug for StateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "StateKey({:?})", self.0.as_str())
    }
}

impl std::fmt::Display for StateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.0.as_str())
    }
}

impl From<&str> for StateKey {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for StateKey {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl std::borrow::Borrow<str> for StateKey {
    fn borrow(&self) -> &str {
        self.0.as_str()
    }
}

/// A [`StateKey`] additionally tagged, at the type level, with the data type
/// `D` the referenced node is declared to own. Carrying one of these instead
/// of a bare `StateKey` lets callers skip the runtime type check that
/// `data::<D>(key)` otherwise performs — the tag is still checked against the
/// node's declared `TypeId` when the tree is built (see [`crate::tree::TreeBuilder`]).
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct DataStateKey<D> {
    key: StateKey,
    _marker: PhantomData<fn() -> D>,
}

impl<D: 'static> DataStateKey<D> {
    pub fn new(key: StateKey) -> Self {
        Self { key, _marker: PhantomData }
    }

    pub fn key(&self) -> &StateKey {
        &self.key
    }

    pub fn into_key(self) -> StateKey {
        self.key
    }

    pub fn data_type(&self) -> TypeId {
        TypeId::of::<D>()
    }
}

impl<D> std::fmt::Debug for DataStateKey<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "DataStateKey({:?})", self.key)
    }
}

impl<D> std::fmt::Display for DataStateKey<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.key, f)
    }
}

#[cfg(test)]
#[path = "key_tests.rs"]
mod tests;

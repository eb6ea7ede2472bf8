// SPDX-License-Identifier: MIT

//! The external interface a JSON (or other) codec must satisfy to make a
//! node's data persistable. Per §1, JSON codecs themselves are an external
//! collaborator — this crate defines only the trait surface `tsm-storage`'s
//! snapshot writer needs.

use std::any::Any;
use std::fmt;

/// Errors a [`DataCodec`] implementation may raise. Kept separate from
/// [`crate::error::EngineError`] since codec failures are a storage-layer
/// concern, not a dispatch/transition one.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("encode failed: {0}")]
    Encode(String),
    #[error("decode failed: {0}")]
    Decode(String),
}

/// `{encode, decode}` capability for one node's data type, type-erased so a
/// `NodeDefinition` (whose data type varies per node) can hold a
/// homogeneous `Arc<dyn DataCodec>` slot. Implementors typically wrap
/// `serde_json::to_value`/`from_value` for a single concrete `D`.
pub trait DataCodec: Send + Sync {
    fn encode(&self, value: &dyn Any) -> Result<serde_json::Value, CodecError>;
    fn decode(&self, value: serde_json::Value) -> Result<Box<dyn Any + Send + Sync>, CodecError>;
}

impl fmt::Debug for dyn DataCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DataCodec(..)")
    }
}

/// A [`DataCodec`] built from `serde`'s `Serialize`/`DeserializeOwned` for a
/// concrete data type `D`. The common case; hand-rolled codecs remain
/// possible for data types that don't round-trip cleanly through `serde`.
pub struct SerdeCodec<D>(std::marker::PhantomData<fn() -> D>);

impl<D> SerdeCodec<D> {
    pub fn new() -> Self {
        Self(std::marker::PhantomData)
    }
}

impl<D> Default for SerdeCodec<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D> DataCodec for SerdeCodec<D>
where
    D: serde::Serialize + serde::de::DeserializeOwned + Send + Sync + 'static,
{
    fn encode(&self, value: &dyn Any) -> Result<serde_json::Value, CodecError> {
        let value = value
            .downcast_ref::<D>()
            .ok_or_else(|| CodecError::Encode("data type mismatch".to_string()))?;
        serde_json::to_value(value).map_err(|e| CodecError::Encode(e.to_string()))
    }

    fn decode(&self, value: serde_json::Value) -> Result<Box<dyn Any + Send + Sync>, CodecError> {
        let decoded: D =
            serde_json::from_value(value).map_err(|e| CodecError::Decode(e.to_string()))?;
        Ok(Box::new(decoded))
    }
}

#[cfg(test)]
#[path = "codec_tests.rs"]
mod tests;

// SPDX-License-Identifier: MIT

//! Error taxonomy (§7). A flat `thiserror` enum per kind, in the same
//! style as the teacher's `ExecuteError` — plus a dedicated build-time
//! error type so a malformed tree is a distinct, fatal failure mode from
//! anything a `Machine` can raise once running.

use crate::key::StateKey;
use std::fmt;

/// Boxed handler failure, carried inside [`EngineError::ProcessingError`].
/// Wraps whatever error type a user's `on_enter`/`on_exit`/`on_message`/
/// `initial_child`/`initial_data` hook returned.
#[derive(Debug)]
pub struct HandlerError(pub Box<dyn std::error::Error + Send + Sync>);

impl fmt::Display for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for HandlerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.0.as_ref())
    }
}

impl HandlerError {
    pub fn new(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self(Box::new(err))
    }

    pub fn msg(msg: impl Into<String>) -> Self {
        #[derive(Debug)]
        struct Msg(String);
        impl fmt::Display for Msg {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
        impl std::error::Error for Msg {}
        Self(Box::new(Msg(msg.into())))
    }
}

/// Malformed tree definitions (§3 invariants). Raised at build time by
/// `TreeBuilder::build`, never wrapped in a `ProcessResult`.
#[derive(Debug, thiserror::Error)]
pub enum TreeBuildError {
    #[error("duplicate state key: {0}")]
    DuplicateKey(StateKey),

    #[error("no root node defined")]
    MissingRoot,

    #[error("more than one root node defined: {0} and {1}")]
    MultipleRoots(StateKey, StateKey),

    #[error("node {child} names unknown parent {parent}")]
    UnknownParent { child: StateKey, parent: StateKey },

    #[error("node {0} is kind=root/interior but has no initial_child selector")]
    MissingInitialChild(StateKey),

    #[error("final leaf {0} must be an immediate child of the root")]
    FinalLeafNotChildOfRoot(StateKey),

    #[error("node {0} is a leaf kind but declares children")]
    LeafWithChildren(StateKey),

    #[error("node {key} declares data type {data_type} but no initial_data producer")]
    DataTypeWithoutInitialData { key: StateKey, data_type: &'static str },

    #[error("node {key} declares initial_data but no data type tag")]
    InitialDataWithoutDataType { key: StateKey },
}

/// Runtime error kinds (§7). Everything except [`TreeBuildError`] is
/// captured by the dispatcher/executor and returned as the `ProcessResult`
/// of the triggering `send`, and published on the `errors` stream.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("send() called before start() or after dispose()")]
    NotRunning,

    #[error("data unavailable for {key}: {reason}")]
    DataUnavailable { key: StateKey, reason: &'static str },

    #[error("payload mismatch: expected {expected}, {reason}")]
    PayloadMismatch { expected: &'static str, reason: &'static str },

    #[error("context used after its handler call returned")]
    StaleContext,

    #[error("initial_child of {parent} returned {returned}, which is not one of its children")]
    MalformedInitialChild { parent: StateKey, returned: StateKey },

    #[error("cannot re-enter the root state")]
    ReenterRoot,

    #[error("redirect budget ({limit}) exceeded starting from {origin}")]
    RedirectLoop { limit: usize, origin: StateKey },

    #[error("handler at {receiving} failed while processing {message}: {cause}")]
    ProcessingError { receiving: StateKey, message: String, cause: HandlerError },

    #[error("snapshot incompatible with current tree: {reason}")]
    IncompatibleSnapshot { reason: String },

    #[error("machine has been disposed")]
    Disposed,
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;

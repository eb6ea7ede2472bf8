// SPDX-License-Identifier: MIT

//! Errors surfaced by [`crate::save_to`]/[`crate::load_from`] and their
//! file-path convenience wrappers.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// `tsm_runtime::MachineError` is an `Arc<EngineError>`, which (unlike
    /// `Box<dyn Error>`) has no blanket `std::error::Error` impl in std, so
    /// it can't be chained as a `#[from]` source directly; its `Display` is
    /// captured here instead.
    #[error("snapshot rejected by machine: {0}")]
    Machine(String),
}

// SPDX-License-Identifier: MIT

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! tsm-storage: the snapshot persistence layer (§4.H `save_to`/`load_from`)
//! sitting on top of `tsm-runtime`'s `Machine`, the same way `oj-storage`
//! sits below `oj-engine` — minus the WAL, since this spec only asks for
//! point-in-time snapshots, not append-only replay.

mod error;
mod snapshot;

pub use error::StorageError;
pub use snapshot::{load_from, load_from_path, save_to, save_to_path};

// SPDX-License-Identifier: MIT

//! §4.H persist/restore (`save_to`/`load_from`): turning a running
//! `Machine`'s snapshot into bytes and back, plus a small atomic file-path
//! convenience on top, following `oj-storage`'s split of persistence
//! concerns out of the engine crate (minus the WAL — §0 Non-goals: this is
//! point-in-time snapshots only, not append-only replay).

use std::fs;
use std::io::{Read, Write};
use std::path::Path;

use tracing::{debug, info};
use tsm_runtime::{Machine, Snapshot};

use crate::error::StorageError;

/// Serialize `machine`'s current active path and data (§4.H) as JSON onto
/// `sink`. Leaves `machine` running; this is a read-only snapshot.
pub fn save_to(machine: &Machine, mut sink: impl Write) -> Result<(), StorageError> {
    let snapshot = machine.save_snapshot().map_err(|err| StorageError::Machine(err.to_string()))?;
    serde_json::to_writer(&mut sink, &snapshot)?;
    debug!(states = snapshot.active_path.len(), "wrote snapshot");
    Ok(())
}

/// Restore `machine` (must be `Constructed`) from JSON read off `source`.
pub fn load_from(machine: &Machine, mut source: impl Read) -> Result<(), StorageError> {
    let snapshot: Snapshot = serde_json::from_reader(&mut source)?;
    let states = snapshot.active_path.len();
    machine.load_snapshot(snapshot).map_err(|err| StorageError::Machine(err.to_string()))?;
    debug!(states, "restored from snapshot");
    Ok(())
}

/// `save_to`, atomically: writes to a sibling `.tmp` file and renames it
/// over `path`, so a concurrent reader never observes a partial snapshot.
pub fn save_to_path(machine: &Machine, path: impl AsRef<Path>) -> Result<(), StorageError> {
    let path = path.as_ref();
    let tmp = path.with_extension("tmp");
    {
        let file = fs::File::create(&tmp)?;
        save_to(machine, file)?;
    }
    fs::rename(&tmp, path)?;
    info!(path = %path.display(), "snapshot saved");
    Ok(())
}

/// `load_from` reading straight off the file at `path`.
pub fn load_from_path(machine: &Machine, path: impl AsRef<Path>) -> Result<(), StorageError> {
    let path = path.as_ref();
    let file = fs::File::open(path)?;
    load_from(machine, file)?;
    info!(path = %path.display(), "snapshot loaded");
    Ok(())
}

#[cfg(test)]
#[path = "snapshot_tests.rs"]
mod tests;

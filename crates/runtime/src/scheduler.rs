// SPDX-License-Identifier: MIT

//! §4.F Scheduler: timer-driven message production, owner-scoped
//! cancellation, and the deferred-first-tick gate for `schedule()` calls
//! made from inside a transition hook.
//!
//! Each scheduled task is a spawned `tokio` task racing a `tokio_util`
//! `CancellationToken` against a `tokio::time::sleep`/`interval`; ticks are
//! posted through `ext_tx`, the same external-injection channel the
//! nested-machine adapter uses (§4.G), rather than reaching back into a
//! `Machine`'s `Inner` directly — grounded in the teacher's own use of
//! `tokio_util::sync::CancellationToken` to bound a background task's
//! lifetime (`crates/daemon/src/listener/mod.rs`).

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::trace;
use tsm_core::key::StateKey;
use tsm_core::message::Msg;
use tsm_core::node::{CancelHandle, MessageProducer};

struct ScheduledTask {
    token: CancellationToken,
}

pub(crate) struct Scheduler {
    ext_tx: mpsc::UnboundedSender<Msg>,
    tasks: Mutex<HashMap<StateKey, Vec<ScheduledTask>>>,
}

impl Scheduler {
    pub(crate) fn new(ext_tx: mpsc::UnboundedSender<Msg>) -> Self {
        Self { ext_tx, tasks: Mutex::new(HashMap::new()) }
    }

    /// Schedule `producer` to run after `duration`, repeating every
    /// `duration` if `periodic`. `gate`, if set, is awaited once before the
    /// first tick (and only the first tick) — the mechanism behind
    /// "schedule inside a transition defers until the transition completes"
    /// (§4.E).
    pub(crate) fn schedule(
        &self,
        owner: StateKey,
        producer: MessageProducer,
        duration: std::time::Duration,
        periodic: bool,
        gate: Option<Arc<Notify>>,
    ) -> CancelHandle {
        let token = CancellationToken::new();
        self.tasks.lock().entry(owner.clone()).or_default().push(ScheduledTask { token: token.clone() });

        let ext_tx = self.ext_tx.clone();
        let run_token = token.clone();
        tokio::spawn(async move {
            if let Some(gate) = gate {
                tokio::select! {
                    _ = gate.notified() => {}
                    _ = run_token.cancelled() => return,
                }
            }

            if !periodic {
                tokio::select! {
                    _ = tokio::time::sleep(duration) => {
                        let _ = ext_tx.send(producer());
                    }
                    _ = run_token.cancelled() => {}
                }
                return;
            }

            let mut interval = tokio::time::interval(duration);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            interval.tick().await;
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        if ext_tx.send(producer()).is_err() {
                            break;
                        }
                    }
                    _ = run_token.cancelled() => break,
                }
            }
            trace!(%owner, "scheduled task stopped");
        });

        let cancel_token = token;
        CancelHandle::new(move || cancel_token.cancel())
    }

    /// Cancel every task owned by `key` (§4.F: on exit, before the entry
    /// phase of the transition begins).
    pub(crate) fn cancel_owner(&self, key: &StateKey) {
        if let Some(owned) = self.tasks.lock().remove(key) {
            for task in owned {
                task.token.cancel();
            }
        }
    }

    /// Cancel everything. Used by `Machine::dispose` (§5).
    pub(crate) fn cancel_all(&self) {
        let mut guard = self.tasks.lock();
        for owned in guard.values() {
            for task in owned {
                task.token.cancel();
            }
        }
        guard.clear();
    }
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;

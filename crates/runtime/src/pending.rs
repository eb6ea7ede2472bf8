// SPDX-License-Identifier: MIT

//! The single in-dispatch post queue (§4.D "Concurrency contract", §5
//! ordering guarantees). Kept as a plain `parking_lot`-guarded `VecDeque`
//! rather than a channel: posts only ever happen synchronously from inside
//! a context method, and are only ever drained by the dispatch loop that's
//! already holding the machine's dispatch lock.

use parking_lot::Mutex;
use std::collections::VecDeque;
use tsm_core::message::Msg;

#[derive(Default)]
pub(crate) struct PendingQueue(Mutex<VecDeque<Msg>>);

impl PendingQueue {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&self, msg: Msg) {
        self.0.lock().push_back(msg);
    }

    pub(crate) fn pop(&self) -> Option<Msg> {
        self.0.lock().pop_front()
    }

    pub(crate) fn clear(&self) -> usize {
        let mut guard = self.0.lock();
        let n = guard.len();
        guard.clear();
        n
    }

    pub(crate) fn len(&self) -> usize {
        self.0.lock().len()
    }
}

#[cfg(test)]
#[path = "pending_tests.rs"]
mod tests;

// SPDX-License-Identifier: MIT

//! Configuration knobs (§6) for `Machine::new`, built with the teacher's
//! fluent `setters!` pattern over a `Default`-derived struct rather than an
//! on-disk config format — there is no file-based configuration surface for
//! an embeddable library.

use crate::key::StateKey;

/// What happens to queued-but-undelivered messages on `dispose()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DisposalPolicy {
    /// Drop anything still in the dispatch queue (default).
    #[default]
    DropPending,
    /// Deliver every queued message before finishing disposal.
    DrainPending,
}

crate::simple_display! {
    DisposalPolicy {
        DropPending => "drop_pending",
        DrainPending => "drain_pending",
    }
}

/// Construction-time configuration for a [`Machine`](crate) instance.
#[derive(Debug, Clone)]
pub struct MachineConfig {
    /// Maximum cascaded `Redirect`s per `send` before `RedirectLoop`.
    pub redirect_limit: usize,
    /// Policy applied to the dispatch queue on `dispose()`.
    pub disposal_policy: DisposalPolicy,
    /// Overrides the root's `initial_child` descent for the synthetic
    /// `start()` transition.
    pub initial_target: Option<StateKey>,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self { redirect_limit: 5, disposal_policy: DisposalPolicy::DropPending, initial_target: None }
    }
}

impl MachineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    crate::setters! {
        set { redirect_limit: usize, disposal_policy: DisposalPolicy }
        option { initial_target: StateKey }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;

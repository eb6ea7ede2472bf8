// SPDX-License-Identifier: MIT

//! The sum types a dispatch cycle produces: what a handler returns
//! ([`MessageResult`]), what a `send` call returns ([`ProcessResult`]), and
//! what gets published on the transitions stream ([`Transition`]). Per the
//! REDESIGN FLAGS note on "handler plurality via tagged variants", these
//! replace the source's small object hierarchies with plain enums.

use crate::key::StateKey;
use crate::message::Payload;
use crate::node::TransitionActionFn;

/// What a node's `on_message` (or a filter) decided to do with a message
/// (§4.D).
#[derive(Clone)]
pub enum MessageResult {
    /// Transition to `target`. `reenter_target = false` and `target` on the
    /// current ancestor chain means `target` itself is not re-entered.
    GoTo {
        target: StateKey,
        payload: Option<Payload>,
        action: Option<TransitionActionFn>,
        reenter_target: bool,
    },
    /// `goto(handling_state, reenter_target = true)` — see §4.B.
    GoToSelf { action: Option<TransitionActionFn> },
    /// Message absorbed; no transition.
    Stay,
    /// Not handled by this ancestor; continue walking toward the root.
    Unhandled,
    /// Like `GoTo`, but counts against the per-`send` redirect budget
    /// (§4.D) instead of consulting further ancestors.
    Redirect { target: StateKey },
}

impl MessageResult {
    pub fn goto(target: impl Into<StateKey>) -> Self {
        MessageResult::GoTo { target: target.into(), payload: None, action: None, reenter_target: false }
    }

    pub fn goto_reentrant(target: impl Into<StateKey>) -> Self {
        MessageResult::GoTo { target: target.into(), payload: None, action: None, reenter_target: true }
    }

    pub fn goto_with_payload<P: Send + Sync + 'static>(target: impl Into<StateKey>, payload: P) -> Self {
        MessageResult::GoTo {
            target: target.into(),
            payload: Some(Payload::new(payload)),
            action: None,
            reenter_target: false,
        }
    }

    pub fn goto_self() -> Self {
        MessageResult::GoToSelf { action: None }
    }

    pub fn stay() -> Self {
        MessageResult::Stay
    }

    pub fn unhandled() -> Self {
        MessageResult::Unhandled
    }

    pub fn redirect(target: impl Into<StateKey>) -> Self {
        MessageResult::Redirect { target: target.into() }
    }

    /// Attach a pre-transition action (invoked with the in-flight
    /// `TransitionContext` before any exit hook runs). No-op on `Stay` /
    /// `Unhandled` / `Redirect`.
    pub fn with_action(mut self, action: TransitionActionFn) -> Self {
        match &mut self {
            MessageResult::GoTo { action: slot, .. } => *slot = Some(action),
            MessageResult::GoToSelf { action: slot } => *slot = Some(action),
            _ => {}
        }
        self
    }

    pub fn is_unhandled(&self) -> bool {
        matches!(self, MessageResult::Unhandled)
    }
}

impl std::fmt::Debug for MessageResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageResult::GoTo { target, reenter_target, .. } => {
                f.debug_struct("GoTo").field("target", target).field("reenter_target", reenter_target).finish()
            }
            MessageResult::GoToSelf { .. } => f.write_str("GoToSelf"),
            MessageResult::Stay => f.write_str("Stay"),
            MessageResult::Unhandled => f.write_str("Unhandled"),
            MessageResult::Redirect { target } => f.debug_struct("Redirect").field("target", target).finish(),
        }
    }
}

/// A completed (possibly empty) transition, published on the `transitions`
/// stream (§4.H) and embedded in a `Handled` result (§4.D).
#[derive(Debug, Clone)]
pub struct Transition {
    pub from: StateKey,
    pub to: StateKey,
    /// Leaf-first, in the order exit hooks actually ran.
    pub exited: Vec<StateKey>,
    /// LCA-first (root-to-leaf order), in the order entry hooks actually ran.
    pub entered: Vec<StateKey>,
    pub payload: Option<Payload>,
}

impl Transition {
    /// A transition with identical `from`/`to` and no exits/entries — the
    /// `goto(current_leaf, reenter_target=false)` boundary case (§8).
    pub fn empty(at: StateKey) -> Self {
        Self { from: at.clone(), to: at, exited: Vec::new(), entered: Vec::new(), payload: None }
    }

    pub fn is_empty(&self) -> bool {
        self.exited.is_empty() && self.entered.is_empty()
    }
}

/// The successful outcome of a `send` whose ancestor walk found a handler
/// that wasn't `Unhandled` (§4.D).
#[derive(Debug, Clone)]
pub struct Handled {
    /// The current leaf *before* dispatch started.
    pub receiving: StateKey,
    /// The ancestor whose `on_message` produced the terminal result.
    pub handling: StateKey,
    /// `None` for `Stay`; `Some` (possibly empty) for `GoTo`/`GoToSelf`/`Redirect`.
    pub transition: Option<Transition>,
}

/// The return shape of `Machine::send` (§4.D, §6). Runtime failures are
/// surfaced as `Err(EngineError::ProcessingError)` by the caller, not as a
/// variant here — see SPEC_FULL §2.
#[derive(Debug, Clone)]
pub enum ProcessResult {
    Handled(Handled),
    /// No ancestor (including none, for a `FinalLeaf`) produced a terminal
    /// result. `notified` lists every ancestor whose `on_message` was
    /// actually invoked, in walk order.
    Unhandled { notified: Vec<StateKey> },
}

impl ProcessResult {
    pub fn is_handled(&self) -> bool {
        matches!(self, ProcessResult::Handled(_))
    }

    pub fn transition(&self) -> Option<&Transition> {
        match self {
            ProcessResult::Handled(h) => h.transition.as_ref(),
            ProcessResult::Unhandled { .. } => None,
        }
    }
}

/// The six lifecycle states of §4.H, in their only legal order (plus the
/// `Disposed` sink reachable from any of them).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Constructed,
    Starting,
    Started,
    Stopping,
    Stopped,
    Disposed,
}

crate::simple_display! {
    Lifecycle {
        Constructed => "constructed",
        Starting => "starting",
        Started => "started",
        Stopping => "stopping",
        Stopped => "stopped",
        Disposed => "disposed",
    }
}

impl Lifecycle {
    pub fn is_running(self) -> bool {
        matches!(self, Lifecycle::Started)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Lifecycle::Disposed)
    }
}

#[cfg(test)]
#[path = "result_tests.rs"]
mod tests;

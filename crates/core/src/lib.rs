// SPDX-License-Identifier: MIT

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! tsm-core: data model, result types, and error taxonomy for the
//! hierarchical state machine runtime.
//!
//! This crate has no async runtime dependency; it is the "plain types"
//! layer consumed by `tsm-runtime`. It does not execute a machine — it
//! defines the frozen [`NodeDefinition`]/[`Tree`] that a runtime walks,
//! the sum types handlers return, and the error kinds runtime code
//! raises.

pub mod macros;

pub mod clock;
pub mod codec;
pub mod config;
pub mod error;
pub mod handler_table;
pub mod key;
pub mod kind;
pub mod message;
pub mod node;
pub mod result;
pub mod tree;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use clock::{Clock, FakeClock, SystemClock};
pub use codec::DataCodec;
pub use config::{DisposalPolicy, MachineConfig};
pub use error::{EngineError, TreeBuildError};
pub use handler_table::HandlerTable;
pub use key::{DataStateKey, StateKey};
pub use kind::NodeKind;
pub use message::{Message, Msg, Payload};
pub use node::{
    InitialChildFn, InitialDataFn, MessageHandlerFn, NodeDefinition, TransitionActionFn,
    TransitionHookFn,
};
pub use result::{Handled, Lifecycle, MessageResult, ProcessResult, Transition};
pub use tree::{NodeIndex, Tree, TreeBuilder};

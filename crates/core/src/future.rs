// SPDX-License-Identifier: MIT

//! Shared boxed-future alias. Every hook/handler closure in this crate
//! returns one of these so synchronous and asynchronous user handlers
//! compose identically (§9 "Coroutine / async handlers"): a synchronous
//! handler wraps its result in `Box::pin(std::future::ready(result))`, an
//! asynchronous one returns its own future directly. The dispatcher awaits
//! either without interleaving another message.

use std::future::Future;
use std::pin::Pin;

pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

/// Lift an immediate value into a [`BoxFuture`], for synchronous handlers.
pub fn ready<T: Send + 'static>(value: T) -> BoxFuture<T> {
    Box::pin(std::future::ready(value))
}

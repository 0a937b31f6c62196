// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Runtime for serverless-style functions.
//!
//! Packages register HTTP, timer and event handlers on a
//! [`registry::RegistryBuilder`]. A host hands each request, timer firing
//! or event delivery to a [`Runtime`], which wraps the handler call with a
//! structured logger, a cancellation signal with soft and hard deadlines,
//! and success callbacks, then maps the outcome to something the host can
//! send back.

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

pub mod config;
pub mod context;
pub mod diagnostics;
pub mod error;
pub mod events;
pub mod handler;
pub mod http;
pub mod invocation;
pub mod logs;
pub mod registry;
pub mod runtime;

#[cfg(test)]
mod test_support;

pub use config::RuntimeConfig;
pub use context::Context;
pub use handler::handler_fn;
pub use invocation::InvocationOutcome;
pub use logs::logger::Logger;
pub use runtime::{Runtime, RuntimeBuilder};

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! swarm-daemon: the supervisor runtime.
//!
//! Owns the per-worker lifecycle state machine, the shared pool with
//! per-base admission queues and horizontal scaling, session-scoped
//! isolation for stateful workers, the reconnect and health watchdogs,
//! and the multi-client session layer dispatching tool calls into all
//! of that.

pub mod catalog;
pub mod event_bus;
pub mod http;
pub mod lifecycle;
pub mod mcp;
pub mod profiles;
pub mod queue;
pub mod sessions;
pub mod stdio_mode;
pub mod supervisor;

pub use event_bus::EventBus;
pub use queue::AdmissionQueue;
pub use supervisor::{DaemonSupervisor, Supervisor};

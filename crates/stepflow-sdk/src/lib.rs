// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Stepflow SDK - Declarative Operation Composition
//!
//! The user-facing half of stepflow. Tests are written as trees of three
//! descriptor kinds, composed up front with no side effects and stamped into
//! a fresh execution tree per run:
//!
//! | Descriptor      | Shape                        | Built by                       |
//! |-----------------|------------------------------|--------------------------------|
//! | [`Instruction`] | one-shot action → value      | [`do_once`], [`wait_for_seconds`], [`wait_for_frames`] |
//! | [`WaitCondition`] | poll until a value appears | [`wait_for_condition`]         |
//! | [`Responder`]   | wait for X, then do Y        | [`WaitCondition::then_respond_with`] |
//!
//! Combinators compose them: `select` maps, `and_then` continues, `then`
//! sequences, [`all_of`] joins, [`respond_to_all_of`] fans in with serialized
//! side effects, `expect_within` bounds anything with a timeout, and `until`
//! repeats a response until a condition lands. A failed run renders the whole
//! operation tree ([`render_tree`]) so the assertion message shows exactly
//! which leaf failed, where it was declared, and what everything else was
//! doing at the time.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use stepflow_sdk::{wait_for_condition, ManualScheduler, RunContext};
//!
//! #[tokio::main]
//! async fn main() {
//!     let manual = ManualScheduler::new();
//!     let ctx = RunContext::builder(manual.scheduler()).build();
//!
//!     let ready = wait_for_condition("server ready", || Ok(Some(42)))
//!         .expect_within(Duration::from_secs(5));
//!
//!     let value = manual
//!         .drive(ready.run(&ctx), Duration::from_millis(100))
//!         .await
//!         .unwrap();
//!     assert_eq!(value, 42);
//! }
//! ```
//!
//! Time is always the scheduler's virtual time. Nothing in a descriptor
//! touches the wall clock, so a test drives its own ticks and behaves
//! identically on every machine.

pub mod combinators;
pub mod diagnostics;
pub mod instruction;
pub mod responder;
pub mod runner;
pub mod wait_condition;

pub use combinators::{all_of, respond_to_all_of, respond_to_any_of};
pub use diagnostics::render_tree;
pub use instruction::{do_once, wait_for_frames, wait_for_seconds, Instruction};
pub use responder::{Responder, UntilOptions};
pub use runner::TestFailure;
pub use wait_condition::{wait_for_condition, WaitCondition};

// Engine types hosts touch directly.
pub use stepflow_core::{
    CancellationToken, ErrorKind, ErrorSignal, ExternalEventSource, FailureListener,
    ManualScheduler, NodeChild, OperationError, OperationStatus, RunContext, RunContextBuilder,
    Scheduler, SchedulerPort, StateListener, StateNode,
};

// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Stepflow Core - Poll-Driven Operation Execution Engine
//!
//! This crate is the execution half of stepflow: the operation-status state
//! machine, the live execution handle, the poll-driven scheduler, and the
//! cancellation/timeout racing layer. The declarative descriptor and
//! combinator layer lives in `stepflow-sdk`.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Host                                  │
//! │   clock (SchedulerPort) · per-tick poll() · port impls       │
//! └─────────────────────────────────────────────────────────────┘
//!                │ tick                        │ inject
//!                ▼                             ▼
//! ┌──────────────────────────┐   ┌─────────────────────────────┐
//! │  Scheduler + Poller      │◄──│  RunContext                 │
//! │  per-tick re-checks      │   │  ports · listeners · trail  │
//! └──────────────────────────┘   └─────────────────────────────┘
//!                │ wakes                       │ drives
//!                ▼                             ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  OperationState tree                                         │
//! │  StateNode (status) · NodeGuard (cleanup) · racing (amb)     │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Concurrency model
//!
//! One cooperative logical thread of control per running tree. Suspension
//! happens at wait-condition polls, timeout races, and nested awaits; fan-out
//! combinators spawn branches onto the ambient tokio runtime under child
//! cancellation tokens. No code in this crate generates ticks — they come
//! only from the host calling [`Scheduler::poll`].
//!
//! # Cancellation
//!
//! One `CancellationToken` per tree, threaded through every node. Cancelling
//! the root cancels every live descendant; cleanup (wait-context release,
//! poll-hook deregistration, terminal status stamping) is drop-based and runs
//! on every exit path unconditionally.

pub mod context;
pub mod error;
pub mod ports;
pub mod racing;
pub mod scheduler;
pub mod source;
pub mod state;
pub mod status;

pub use context::{RunContext, RunContextBuilder};
pub use error::{ErrorKind, Exec, Interrupted, OperationError, Result};
pub use ports::{ErrorSignal, ExternalEventSource, FailureListener, StateListener, StateListeners};
pub use racing::{amb, Deferred, MultipleTaskSource};
pub use scheduler::{ManualScheduler, PollCallback, Poller, Registration, Scheduler, SchedulerPort};
pub use source::{OperationName, SourceLocation, SourceTrail, TrailEntry};
pub use state::{NodeChild, NodeGuard, OperationState, StateNode};
pub use status::{Elapsed, OperationStatus, WaitContext};

// Re-export the token type hosts need to drive cancellation.
pub use tokio_util::sync::CancellationToken;

// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Operation status state machine.
//!
//! Transitions are forward-only: `NotExecuted → Waiting → {Completed, Failed,
//! Canceled}`. A status value belongs to exactly one execution and is never
//! reused across runs. Transition enforcement lives in
//! [`StateNode`](crate::state::StateNode); this module holds the value types.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::scheduler::SchedulerPort;
use crate::source::SourceTrail;

/// Time and frames spent between entering `Waiting` and a measurement point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Elapsed {
    /// Virtual time elapsed.
    pub time: Duration,
    /// Frames elapsed.
    pub frames: u64,
}

impl fmt::Display for Elapsed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:.2} s and {} frames",
            self.time.as_secs_f64(),
            self.frames
        )
    }
}

/// Snapshot of the scheduler clock taken when an operation starts waiting.
///
/// Opened exactly once per execution; [`elapsed`](Self::elapsed) measures
/// against the current clock on demand.
#[derive(Clone)]
pub struct WaitContext {
    start_time: Duration,
    start_frame: u64,
    port: Arc<dyn SchedulerPort>,
}

impl WaitContext {
    /// Snapshot the clock now.
    pub fn open(port: Arc<dyn SchedulerPort>) -> Self {
        Self {
            start_time: port.time_now(),
            start_frame: port.frame_now(),
            port,
        }
    }

    /// Time and frames spent waiting so far.
    pub fn elapsed(&self) -> Elapsed {
        Elapsed {
            time: self.port.time_now().saturating_sub(self.start_time),
            frames: self.port.frame_now().saturating_sub(self.start_frame),
        }
    }
}

impl fmt::Debug for WaitContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WaitContext")
            .field("start_time", &self.start_time)
            .field("start_frame", &self.start_frame)
            .finish_non_exhaustive()
    }
}

/// Status of one operation execution.
#[derive(Debug, Clone)]
pub enum OperationStatus {
    /// Not started yet.
    NotExecuted,
    /// Started and not yet finished.
    Waiting(WaitContext),
    /// Finished with a value.
    Completed(Elapsed),
    /// Finished with a failure.
    Failed {
        /// Time spent before failing.
        elapsed: Elapsed,
        /// Rendered failure message.
        message: String,
        /// Trail captured at the failure site.
        trail: SourceTrail,
    },
    /// Finished by cancellation.
    Canceled(Elapsed),
}

impl OperationStatus {
    /// One-cell marker used by the diagnostics renderer.
    pub fn marker(&self) -> &'static str {
        match self {
            OperationStatus::NotExecuted => "[ ]",
            OperationStatus::Waiting(_) => "[.]",
            OperationStatus::Completed(_) => "[✓]",
            OperationStatus::Failed { .. } => "[!]",
            OperationStatus::Canceled(_) => "[-]",
        }
    }

    /// Whether this status is `Waiting`.
    pub fn is_waiting(&self) -> bool {
        matches!(self, OperationStatus::Waiting(_))
    }

    /// Whether the execution has finished, in any way.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OperationStatus::Completed(_)
                | OperationStatus::Failed { .. }
                | OperationStatus::Canceled(_)
        )
    }

    /// Human-readable timing suffix, if the operation has started.
    pub fn timing(&self) -> Option<String> {
        match self {
            OperationStatus::NotExecuted => None,
            OperationStatus::Waiting(wait) => Some(format!("Waiting for {}", wait.elapsed())),
            OperationStatus::Completed(elapsed) => Some(format!("Completed in {elapsed}")),
            OperationStatus::Failed { elapsed, .. } => Some(format!("Failed after {elapsed}")),
            OperationStatus::Canceled(elapsed) => Some(format!("Canceled after {elapsed}")),
        }
    }
}

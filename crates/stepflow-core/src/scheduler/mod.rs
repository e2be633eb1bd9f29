// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Poll-driven scheduling.
//!
//! The engine never generates ticks itself. The host owns the clock
//! ([`SchedulerPort`]) and pumps [`Scheduler::poll`] once per external tick;
//! everything that waits does so by registering a per-tick re-check with the
//! [`Poller`]. Timers are just conditions over the host clock, which keeps
//! runs fully deterministic under a manual clock.

mod manual;
mod poller;

pub use manual::ManualScheduler;
pub use poller::{PollCallback, Poller, Registration};

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::error::Result;

/// Host-supplied clock: current frame and virtual time.
pub trait SchedulerPort: Send + Sync {
    /// Current frame number.
    fn frame_now(&self) -> u64;
    /// Current virtual time since the host started.
    fn time_now(&self) -> Duration;
}

/// The engine-side scheduler: a host clock plus the engine-owned poller.
///
/// The host keeps a handle and calls [`poll`](Self::poll) once per tick.
pub struct Scheduler {
    port: Arc<dyn SchedulerPort>,
    poller: Poller,
}

impl Scheduler {
    /// Build a scheduler over a host clock.
    pub fn new(port: Arc<dyn SchedulerPort>) -> Self {
        Self {
            port,
            poller: Poller::new(),
        }
    }

    /// The host clock.
    pub fn port(&self) -> &Arc<dyn SchedulerPort> {
        &self.port
    }

    /// The callback poller.
    pub fn poller(&self) -> &Poller {
        &self.poller
    }

    /// Current frame number.
    pub fn frame_now(&self) -> u64 {
        self.port.frame_now()
    }

    /// Current virtual time.
    pub fn time_now(&self) -> Duration {
        self.port.time_now()
    }

    /// Run one tick: dispatch every registered poll callback.
    pub fn poll(&self) {
        self.poller.poll();
    }

    /// Register a raw per-tick callback. See [`Poller::register`].
    pub fn register_poll_callback(&self, callback: PollCallback) -> Registration {
        self.poller.register(callback)
    }

    /// Resolve once `check` yields a value, re-checking per tick.
    pub fn poll_for_condition<T, F>(
        &self,
        check: F,
    ) -> impl Future<Output = Result<T>> + Send + 'static
    where
        T: Send + 'static,
        F: FnMut() -> Result<Option<T>> + Send + 'static,
    {
        self.poller.poll_for_condition(check)
    }

    /// Resolve once `duration` of virtual time has passed, measured from now.
    pub fn elapse(&self, duration: Duration) -> impl Future<Output = Result<()>> + Send + 'static {
        let port = Arc::clone(&self.port);
        let deadline = port.time_now() + duration;
        self.poller
            .poll_for_condition(move || Ok((port.time_now() >= deadline).then_some(())))
    }

    /// Resolve once `frames` frames have passed, measured from now.
    pub fn elapse_frames(&self, frames: u64) -> impl Future<Output = Result<()>> + Send + 'static {
        let port = Arc::clone(&self.port);
        let target = port.frame_now() + frames;
        self.poller
            .poll_for_condition(move || Ok((port.frame_now() >= target).then_some(())))
    }
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("frame_now", &self.port.frame_now())
            .field("time_now", &self.port.time_now())
            .field("callbacks", &self.poller.callback_count())
            .finish()
    }
}

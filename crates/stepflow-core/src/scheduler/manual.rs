// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Manually advanced scheduler for deterministic tests.
//!
//! Owns a virtual clock and a [`Scheduler`]; [`tick`](ManualScheduler::tick)
//! advances the clock by one frame and dispatches poll callbacks. Nothing here
//! touches wall-clock time, so a run behaves identically on every machine.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::{Scheduler, SchedulerPort};

#[derive(Default)]
struct ManualClock {
    frame: AtomicU64,
    time_nanos: AtomicU64,
}

impl SchedulerPort for ManualClock {
    fn frame_now(&self) -> u64 {
        self.frame.load(Ordering::SeqCst)
    }

    fn time_now(&self) -> Duration {
        Duration::from_nanos(self.time_nanos.load(Ordering::SeqCst))
    }
}

/// A scheduler whose clock only moves when the test says so.
#[derive(Clone)]
pub struct ManualScheduler {
    clock: Arc<ManualClock>,
    scheduler: Arc<Scheduler>,
}

impl Default for ManualScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualScheduler {
    /// Create a scheduler at frame 0, time 0.
    pub fn new() -> Self {
        let clock = Arc::new(ManualClock::default());
        let port: Arc<dyn SchedulerPort> = clock.clone();
        Self {
            clock,
            scheduler: Arc::new(Scheduler::new(port)),
        }
    }

    /// The scheduler handle to build a run context from.
    pub fn scheduler(&self) -> Arc<Scheduler> {
        self.scheduler.clone()
    }

    /// Advance one frame and `dt` of virtual time, then dispatch callbacks.
    pub fn tick(&self, dt: Duration) {
        self.clock.frame.fetch_add(1, Ordering::SeqCst);
        self.clock
            .time_nanos
            .fetch_add(dt.as_nanos() as u64, Ordering::SeqCst);
        self.scheduler.poll();
    }

    /// Advance `ticks` frames of `dt` each.
    pub fn tick_many(&self, ticks: usize, dt: Duration) {
        for _ in 0..ticks {
            self.tick(dt);
        }
    }

    /// Drive a future to completion, ticking between polls.
    ///
    /// Yields to the runtime before every tick so tasks spawned by racing
    /// combinators make progress. Use [`drive_bounded`](Self::drive_bounded)
    /// for futures that may never resolve.
    pub async fn drive<F: Future>(&self, fut: F, dt: Duration) -> F::Output {
        tokio::pin!(fut);
        loop {
            tokio::select! {
                biased;
                out = &mut fut => return out,
                _ = tokio::task::yield_now() => self.tick(dt),
            }
        }
    }

    /// Like [`drive`](Self::drive) but gives up after `max_ticks` ticks.
    pub async fn drive_bounded<F: Future>(
        &self,
        fut: F,
        dt: Duration,
        max_ticks: usize,
    ) -> Option<F::Output> {
        tokio::pin!(fut);
        for _ in 0..max_ticks {
            tokio::select! {
                biased;
                out = &mut fut => return Some(out),
                _ = tokio::task::yield_now() => self.tick(dt),
            }
        }
        None
    }
}

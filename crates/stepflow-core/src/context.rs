// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Run context: the injected environment a tree executes in.
//!
//! Carries the scheduler, the optional host ports, and the source trail for
//! the current nesting depth. There is deliberately no global registry; hosts
//! build a context and pass it in.

use std::fmt;
use std::sync::Arc;

use crate::ports::{ExternalEventSource, FailureListener, StateListener, StateListeners};
use crate::scheduler::Scheduler;
use crate::source::{OperationName, SourceTrail};

/// Execution environment for one or more runs. Cheap to clone.
#[derive(Clone)]
pub struct RunContext {
    scheduler: Arc<Scheduler>,
    external_events: Option<Arc<dyn ExternalEventSource>>,
    failure_listener: Option<Arc<dyn FailureListener>>,
    listeners: StateListeners,
    trail: SourceTrail,
}

impl RunContext {
    /// Start building a context over a scheduler.
    pub fn builder(scheduler: Arc<Scheduler>) -> RunContextBuilder {
        RunContextBuilder {
            scheduler,
            external_events: None,
            failure_listener: None,
            listeners: Vec::new(),
        }
    }

    /// The scheduler driving this context.
    pub fn scheduler(&self) -> &Arc<Scheduler> {
        &self.scheduler
    }

    /// The external error source, if the host installed one.
    pub fn external_events(&self) -> Option<&Arc<dyn ExternalEventSource>> {
        self.external_events.as_ref()
    }

    /// The failure sink, if the host installed one.
    pub fn failure_listener(&self) -> Option<&Arc<dyn FailureListener>> {
        self.failure_listener.as_ref()
    }

    /// The state-change notification fan-out.
    pub fn listeners(&self) -> &StateListeners {
        &self.listeners
    }

    /// The source trail accumulated down to this context.
    pub fn trail(&self) -> &SourceTrail {
        &self.trail
    }

    /// A context one nesting level deeper.
    pub fn descend(&self, name: &OperationName) -> RunContext {
        let mut ctx = self.clone();
        ctx.trail = self.trail.extended(name);
        ctx
    }
}

impl fmt::Debug for RunContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunContext")
            .field("scheduler", &self.scheduler)
            .field("external_events", &self.external_events.as_ref().map(|_| "..."))
            .field("failure_listener", &self.failure_listener.as_ref().map(|_| "..."))
            .field("trail_depth", &self.trail.entries().len())
            .finish()
    }
}

/// Builder for [`RunContext`].
pub struct RunContextBuilder {
    scheduler: Arc<Scheduler>,
    external_events: Option<Arc<dyn ExternalEventSource>>,
    failure_listener: Option<Arc<dyn FailureListener>>,
    listeners: Vec<Arc<dyn StateListener>>,
}

impl RunContextBuilder {
    /// Install an external error source raced against every leaf wait.
    pub fn external_events(mut self, source: Arc<dyn ExternalEventSource>) -> Self {
        self.external_events = Some(source);
        self
    }

    /// Install a failure sink for failed root runs.
    pub fn failure_listener(mut self, listener: Arc<dyn FailureListener>) -> Self {
        self.failure_listener = Some(listener);
        self
    }

    /// Attach a state-change listener. May be called repeatedly.
    pub fn state_listener(mut self, listener: Arc<dyn StateListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    /// Finish the context.
    pub fn build(self) -> RunContext {
        RunContext {
            scheduler: self.scheduler,
            external_events: self.external_events,
            failure_listener: self.failure_listener,
            listeners: StateListeners::new(self.listeners),
            trail: SourceTrail::default(),
        }
    }
}

impl fmt::Debug for RunContextBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunContextBuilder")
            .field("listeners", &self.listeners.len())
            .finish_non_exhaustive()
    }
}

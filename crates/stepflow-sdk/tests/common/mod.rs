// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Shared helpers for stepflow-sdk integration tests.
#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use stepflow_sdk::{FailureListener, ManualScheduler, OperationError, RunContext};
use tracing_subscriber::EnvFilter;

/// Tick size used across the suite: 100 ms of virtual time per frame.
pub const DT: Duration = Duration::from_millis(100);

/// Route engine tracing to the captured test output. Safe to call from every
/// test; only the first call in a binary installs the subscriber.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .with_test_writer()
        .try_init();
}

/// A manual scheduler plus a bare run context over it.
pub fn test_env() -> (ManualScheduler, RunContext) {
    init_tracing();
    let manual = ManualScheduler::new();
    let ctx = RunContext::builder(manual.scheduler()).build();
    (manual, ctx)
}

/// Thread-safe append-only event log for ordering assertions.
#[derive(Default)]
pub struct EventLog {
    entries: Mutex<Vec<String>>,
}

impl EventLog {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push(&self, entry: impl Into<String>) {
        self.entries
            .lock()
            .expect("event log lock poisoned")
            .push(entry.into());
    }

    pub fn snapshot(&self) -> Vec<String> {
        self.entries.lock().expect("event log lock poisoned").clone()
    }
}

/// Records every failure report handed to the host.
#[derive(Default)]
pub struct RecordingFailureListener {
    reports: Mutex<Vec<(String, String)>>,
}

impl RecordingFailureListener {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// `(error display, rendered tree)` pairs, in call order.
    pub fn reports(&self) -> Vec<(String, String)> {
        self.reports.lock().expect("reports lock poisoned").clone()
    }
}

impl FailureListener for RecordingFailureListener {
    fn on_operation_failed(&self, error: &OperationError, rendered: &str) {
        self.reports
            .lock()
            .expect("reports lock poisoned")
            .push((error.to_string(), rendered.to_string()));
    }
}

// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Host-facing ports.
//!
//! The engine consumes these through the run context; the host supplies the
//! implementations. [`ErrorSignal`] is a ready-made [`ExternalEventSource`]
//! for the common case of funneling a cross-thread error (an intercepted log
//! line, a crash report) into a running operation tree.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::OperationError;
use crate::state::StateNode;

/// An outside event that preempts a running wait with an error.
///
/// `await_error` must stay pending until an error is observed and must honor
/// the token; the engine races it against every leaf wait.
#[async_trait]
pub trait ExternalEventSource: Send + Sync {
    /// Resolves with the observed error, or `None` if the token fired first.
    async fn await_error(&self, token: CancellationToken) -> Option<OperationError>;
}

/// Host-specific sink for failed root executions.
pub trait FailureListener: Send + Sync {
    /// Called once per failed root run with the proximate error and the
    /// rendered operation tree.
    fn on_operation_failed(&self, error: &OperationError, rendered: &str);
}

/// Live notification stream over operation state changes.
pub trait StateListener: Send + Sync {
    /// An operation entered `Waiting`.
    fn on_started(&self, node: &Arc<StateNode>);
    /// An operation reached a terminal status.
    fn on_finished(&self, node: &Arc<StateNode>);
}

/// Shared, cheaply clonable fan-out over [`StateListener`]s.
#[derive(Clone, Default)]
pub struct StateListeners {
    listeners: Arc<Vec<Arc<dyn StateListener>>>,
}

impl StateListeners {
    /// Wrap a listener set.
    pub fn new(listeners: Vec<Arc<dyn StateListener>>) -> Self {
        Self {
            listeners: Arc::new(listeners),
        }
    }

    /// Whether any listener is attached.
    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Notify every listener of a started operation.
    pub fn notify_started(&self, node: &Arc<StateNode>) {
        for listener in self.listeners.iter() {
            listener.on_started(node);
        }
    }

    /// Notify every listener of a finished operation.
    pub fn notify_finished(&self, node: &Arc<StateNode>) {
        for listener in self.listeners.iter() {
            listener.on_finished(node);
        }
    }
}

/// Thread-safe, resolve-exactly-once error funnel.
///
/// Any thread may call [`resolve`](ErrorSignal::resolve); the first call wins
/// and wakes every waiter, later calls are ignored. Waiters that subscribe
/// after resolution observe the error immediately.
#[derive(Default)]
pub struct ErrorSignal {
    slot: Mutex<Option<OperationError>>,
    notify: Notify,
}

impl ErrorSignal {
    /// Create an unresolved signal.
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve with an error. Returns `false` if already resolved.
    pub fn resolve(&self, error: OperationError) -> bool {
        let mut slot = self.slot.lock().expect("error signal lock poisoned");
        if slot.is_some() {
            debug!("error signal already resolved; ignoring");
            return false;
        }
        *slot = Some(error);
        drop(slot);
        self.notify.notify_waiters();
        true
    }

    /// Whether the signal has been resolved.
    pub fn is_resolved(&self) -> bool {
        self.slot.lock().expect("error signal lock poisoned").is_some()
    }
}

#[async_trait]
impl ExternalEventSource for ErrorSignal {
    async fn await_error(&self, token: CancellationToken) -> Option<OperationError> {
        loop {
            // Subscribe before checking so a resolve between check and await
            // cannot be missed.
            let notified = self.notify.notified();
            if let Some(error) = self.slot.lock().expect("error signal lock poisoned").clone() {
                return Some(error);
            }
            tokio::select! {
                biased;
                _ = token.cancelled() => return None,
                _ = notified => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_resolve_exactly_once() {
        let signal = ErrorSignal::new();
        assert!(signal.resolve(OperationError::failure_msg("first")));
        assert!(!signal.resolve(OperationError::failure_msg("second")));

        let token = CancellationToken::new();
        let error = signal.await_error(token).await.expect("resolved");
        assert!(error.to_string().contains("first"));
    }

    #[tokio::test]
    async fn test_waiter_woken_by_resolve() {
        let signal = Arc::new(ErrorSignal::new());
        let token = CancellationToken::new();

        let waiter = tokio::spawn({
            let signal = signal.clone();
            let token = token.clone();
            async move { signal.await_error(token).await }
        });

        tokio::task::yield_now().await;
        signal.resolve(OperationError::failure_msg("boom"));
        let error = waiter.await.expect("join").expect("resolved");
        assert!(error.to_string().contains("boom"));
    }

    #[tokio::test]
    async fn test_cancellation_releases_waiter() {
        let signal = ErrorSignal::new();
        let token = CancellationToken::new();
        token.cancel();
        assert!(signal.await_error(token).await.is_none());
    }
}

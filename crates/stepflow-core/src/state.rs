// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Live execution handles.
//!
//! A descriptor stamps a fresh [`OperationState`] tree per run. Each state
//! owns exactly one status (held in a shared [`StateNode`] so diagnostics can
//! read a tree mid-run) and a take-once body. Status transitions are
//! forward-only; an illegal transition is an engine defect and panics, while
//! the one caller-reachable violation (executing the same state twice)
//! surfaces as an invariant failure.
//!
//! Cleanup is drop-based: [`NodeGuard`] stamps `Waiting → Canceled` when a
//! run future is dropped, which is how the losing side of a `select!` race
//! gets terminal statuses on every live descendant.

use std::sync::{Arc, Mutex};

use futures::future::BoxFuture;
use tokio_util::sync::CancellationToken;

use crate::context::RunContext;
use crate::error::{Exec, Interrupted, OperationError};
use crate::ports::StateListeners;
use crate::source::OperationName;
use crate::status::{OperationStatus, WaitContext};

/// One slot in a node's child list.
#[derive(Debug, Clone)]
pub enum NodeChild {
    /// A materialized child.
    Node(Arc<StateNode>),
    /// A continuation whose tree does not exist yet; rendered as `[ ] ...`.
    PendingContinuation,
}

/// Shared diagnostics node: name, status, children.
///
/// Kept behind `Arc` so a status window or the failure renderer can walk a
/// tree while it is executing.
#[derive(Debug)]
pub struct StateNode {
    name: OperationName,
    status: Mutex<OperationStatus>,
    children: Mutex<Vec<NodeChild>>,
}

impl StateNode {
    /// New node with no children.
    pub fn new(name: OperationName) -> Arc<Self> {
        Self::with_children(name, Vec::new())
    }

    /// New node with a fixed child list.
    pub fn with_children(name: OperationName, children: Vec<NodeChild>) -> Arc<Self> {
        Arc::new(Self {
            name,
            status: Mutex::new(OperationStatus::NotExecuted),
            children: Mutex::new(children),
        })
    }

    /// The operation's name and declaration site.
    pub fn name(&self) -> &OperationName {
        &self.name
    }

    /// Snapshot of the current status.
    pub fn status(&self) -> OperationStatus {
        self.status.lock().expect("status lock poisoned").clone()
    }

    /// Snapshot of the child list.
    pub fn children(&self) -> Vec<NodeChild> {
        self.children.lock().expect("children lock poisoned").clone()
    }

    /// Append a materialized child.
    pub fn push_child(&self, child: Arc<StateNode>) {
        self.children
            .lock()
            .expect("children lock poisoned")
            .push(NodeChild::Node(child));
    }

    /// Append a placeholder for a not-yet-constructed continuation.
    pub fn push_pending_continuation(&self) {
        self.children
            .lock()
            .expect("children lock poisoned")
            .push(NodeChild::PendingContinuation);
    }

    /// Replace the first pending continuation with a materialized child.
    ///
    /// Panics if no placeholder exists; a combinator resolving a continuation
    /// it never declared is an engine defect.
    pub fn resolve_continuation(&self, child: Arc<StateNode>) {
        let mut children = self.children.lock().expect("children lock poisoned");
        let slot = children
            .iter_mut()
            .find(|slot| matches!(slot, NodeChild::PendingContinuation));
        match slot {
            Some(slot) => *slot = NodeChild::Node(child),
            None => panic!(
                "no pending continuation to resolve on '{}'",
                self.name
            ),
        }
    }

    /// Transition `NotExecuted → Waiting`.
    pub fn begin(&self, wait: WaitContext) {
        let mut status = self.status.lock().expect("status lock poisoned");
        match &*status {
            OperationStatus::NotExecuted => *status = OperationStatus::Waiting(wait),
            other => panic!(
                "illegal status transition to Waiting from {} on '{}'",
                other.marker(),
                self.name
            ),
        }
    }

    /// Transition `Waiting → Completed`.
    pub fn complete(&self) {
        let mut status = self.status.lock().expect("status lock poisoned");
        let elapsed = match &*status {
            OperationStatus::Waiting(wait) => wait.elapsed(),
            other => panic!(
                "illegal status transition to Completed from {} on '{}'",
                other.marker(),
                self.name
            ),
        };
        *status = OperationStatus::Completed(elapsed);
    }

    /// Transition `Waiting → Failed`, recording the error.
    pub fn fail(&self, error: &OperationError) {
        let mut status = self.status.lock().expect("status lock poisoned");
        let elapsed = match &*status {
            OperationStatus::Waiting(wait) => wait.elapsed(),
            other => panic!(
                "illegal status transition to Failed from {} on '{}'",
                other.marker(),
                self.name
            ),
        };
        *status = OperationStatus::Failed {
            elapsed,
            message: error.to_string(),
            trail: error.trail().clone(),
        };
    }

    /// Transition `Waiting → Canceled` if waiting; no-op otherwise.
    ///
    /// Tolerates terminal states because it runs on every drop path.
    pub fn cancel_if_waiting(&self) -> bool {
        let mut status = self.status.lock().expect("status lock poisoned");
        if let OperationStatus::Waiting(wait) = &*status {
            let elapsed = wait.elapsed();
            *status = OperationStatus::Canceled(elapsed);
            true
        } else {
            false
        }
    }
}

/// Stamps a node's terminal status and fires the finished notification,
/// exactly once, on every exit path.
///
/// If dropped while the node is still `Waiting` (the owning future was
/// dropped mid-run), the node is stamped `Canceled`.
pub struct NodeGuard {
    node: Arc<StateNode>,
    listeners: StateListeners,
    armed: bool,
}

impl NodeGuard {
    /// Arm a guard for a node that just entered `Waiting`.
    pub fn new(node: Arc<StateNode>, listeners: StateListeners) -> Self {
        Self {
            node,
            listeners,
            armed: true,
        }
    }

    /// Stamp `Completed`.
    pub fn complete(mut self) {
        self.armed = false;
        self.node.complete();
        self.listeners.notify_finished(&self.node);
    }

    /// Stamp `Failed`.
    pub fn fail(mut self, error: &OperationError) {
        self.armed = false;
        self.node.fail(error);
        self.listeners.notify_finished(&self.node);
    }

    /// Stamp `Canceled`.
    pub fn cancel(mut self) {
        self.armed = false;
        self.node.cancel_if_waiting();
        self.listeners.notify_finished(&self.node);
    }

    /// Finish with whichever terminal status matches `outcome`.
    pub fn finish<T>(self, outcome: &Exec<T>) {
        match outcome {
            Ok(_) => self.complete(),
            Err(Interrupted::Failure(error)) => self.fail(error),
            Err(Interrupted::Canceled) => self.cancel(),
        }
    }
}

impl Drop for NodeGuard {
    fn drop(&mut self) {
        if self.armed && self.node.cancel_if_waiting() {
            self.listeners.notify_finished(&self.node);
        }
    }
}

type RunFn<T> =
    Box<dyn FnOnce(RunContext, CancellationToken) -> BoxFuture<'static, Exec<T>> + Send>;

/// A single-use execution handle over one node and a body.
pub struct OperationState<T> {
    node: Arc<StateNode>,
    run: Option<RunFn<T>>,
}

impl<T: Send + 'static> OperationState<T> {
    /// Pair a node with its body.
    pub fn new(
        node: Arc<StateNode>,
        run: impl FnOnce(RunContext, CancellationToken) -> BoxFuture<'static, Exec<T>>
        + Send
        + 'static,
    ) -> Self {
        Self {
            node,
            run: Some(Box::new(run)),
        }
    }

    /// The diagnostics node; stays readable after execution.
    pub fn node(&self) -> &Arc<StateNode> {
        &self.node
    }

    /// Snapshot of the current status.
    pub fn status(&self) -> OperationStatus {
        self.node.status()
    }

    /// Execute this state once.
    ///
    /// A second invocation on the same instance is an invariant failure.
    /// Enters `Waiting`, runs the body raced against the token, and stamps a
    /// terminal status on every exit path, including drop.
    pub async fn execute(&mut self, ctx: &RunContext, token: &CancellationToken) -> Exec<T> {
        let Some(run) = self.run.take() else {
            let error = OperationError::invariant(format!(
                "operation '{}' executed twice; create a fresh state per run",
                self.node.name()
            ))
            .with_trail_if_empty(&ctx.trail().extended(self.node.name()));
            return Err(Interrupted::Failure(error));
        };

        self.node
            .begin(WaitContext::open(Arc::clone(ctx.scheduler().port())));
        let child_ctx = ctx.descend(self.node.name());
        ctx.listeners().notify_started(&self.node);
        let guard = NodeGuard::new(Arc::clone(&self.node), ctx.listeners().clone());

        let body = run(child_ctx.clone(), token.clone());
        let outcome = tokio::select! {
            biased;
            _ = token.cancelled() => Err(Interrupted::Canceled),
            outcome = body => outcome,
        };

        let outcome = match outcome {
            Err(Interrupted::Failure(error)) => Err(Interrupted::Failure(
                error.with_trail_if_empty(child_ctx.trail()),
            )),
            other => other,
        };
        guard.finish(&outcome);
        outcome
    }
}

impl<T> std::fmt::Debug for OperationState<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperationState")
            .field("name", &self.node.name().name())
            .field("status", &self.node.status())
            .field("spent", &self.run.is_none())
            .finish()
    }
}

// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Responder descriptors.
//!
//! A responder bundles "wait for X, then run instruction Y" as one unit, with
//! the two phases separately drivable: [`ResponderState::wait`] resolves when
//! the wait phase completes and hands back a [`PendingResponse`] — the
//! ready-to-run instruction phase. Racing combinators exploit the split:
//! RespondToAllOf lets wait phases finish in any order but executes the
//! pending responses strictly one at a time, and Until may drop a
//! `PendingResponse` unexecuted, which cancels the response.

use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use tokio_util::sync::CancellationToken;

use stepflow_core::{
    Exec, Interrupted, NodeChild, NodeGuard, OperationError, OperationName, RunContext, StateNode,
    WaitContext,
};

use crate::combinators::{expect_within::ExpectWithinFactory, until::UntilFactory, Work};
use crate::instruction::Instruction;
use crate::wait_condition::WaitCondition;

/// Factory contract shared by every responder descriptor.
pub(crate) trait ResponderFactory<T>: Send + Sync {
    fn create_state(&self) -> ResponderState<T>;
}

/// A declarative, reusable "wait for X, then do Y" unit.
pub struct Responder<T> {
    inner: Arc<dyn ResponderFactory<T>>,
}

impl<T> Clone for Responder<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Send + 'static> Responder<T> {
    pub(crate) fn from_factory(inner: Arc<dyn ResponderFactory<T>>) -> Self {
        Self { inner }
    }

    /// Stamp a fresh, independent responder state for one run.
    pub fn create_state(&self) -> ResponderState<T> {
        self.inner.create_state()
    }

    /// Both phases as one startable unit: wait, then respond immediately.
    pub(crate) fn work(&self) -> Work<T> {
        let mut state = self.create_state();
        let node = Arc::clone(state.node());
        Work::new(node, move |ctx, token| {
            Box::pin(async move {
                match state.wait(&ctx, &token).await {
                    Ok(pending) => pending.execute(&token).await,
                    Err(interrupted) => Err(interrupted),
                }
            })
        })
    }

    /// Fail with a timeout unless the full response finishes within `timeout`.
    #[track_caller]
    pub fn expect_within(self, timeout: Duration) -> Instruction<T> {
        ExpectWithinFactory::instruction(timeout, move || self.work())
    }

    /// Respond repeatedly until `condition` is satisfied.
    ///
    /// The condition's result is captured exactly once; the moment it lands,
    /// the outstanding response — waiting or mid-instruction — is cancelled
    /// and the loop exits with the condition's result.
    #[track_caller]
    pub fn until<U: Send + 'static>(self, condition: WaitCondition<U>) -> WaitCondition<U> {
        self.until_with(condition, UntilOptions::default())
    }

    /// [`until`](Self::until) with an explicit repetition bound.
    #[track_caller]
    pub fn until_with<U: Send + 'static>(
        self,
        condition: WaitCondition<U>,
        options: UntilOptions,
    ) -> WaitCondition<U> {
        WaitCondition::from_factory(Arc::new(UntilFactory::new(
            OperationName::here("UNTIL"),
            self,
            condition,
            options,
        )))
    }
}

/// Options for [`Responder::until_with`].
#[derive(Debug, Clone, Copy)]
pub struct UntilOptions {
    /// Maximum number of instruction executions before the loop fails with a
    /// repetition-limit error instead of spinning forever.
    pub max_repeats: usize,
}

impl Default for UntilOptions {
    fn default() -> Self {
        Self { max_repeats: 100 }
    }
}

type WaitFn<T> = Box<
    dyn FnOnce(RunContext, CancellationToken, NodeGuard) -> BoxFuture<'static, Exec<PendingResponse<T>>>
        + Send,
>;

/// Live single-use handle for a responder's wait phase.
pub struct ResponderState<T> {
    node: Arc<StateNode>,
    wait: Option<WaitFn<T>>,
}

impl<T: Send + 'static> ResponderState<T> {
    pub(crate) fn new(node: Arc<StateNode>, wait: WaitFn<T>) -> Self {
        Self {
            node,
            wait: Some(wait),
        }
    }

    /// The responder's diagnostics node.
    pub fn node(&self) -> &Arc<StateNode> {
        &self.node
    }

    /// Drive the wait phase; resolves with the ready instruction phase.
    ///
    /// The responder node stays `Waiting` until the pending response is
    /// executed or dropped, so diagnostics show an in-flight response as
    /// still running.
    pub async fn wait(&mut self, ctx: &RunContext, token: &CancellationToken) -> Exec<PendingResponse<T>> {
        let Some(wait) = self.wait.take() else {
            let error = OperationError::invariant(format!(
                "responder '{}' waited twice; create a fresh state per run",
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

        let wait_fut = wait(child_ctx, token.clone(), guard);
        tokio::select! {
            biased;
            // Dropping the wait future trips the guard: node goes Canceled.
            _ = token.cancelled() => Err(Interrupted::Canceled),
            outcome = wait_fut => outcome,
        }
    }
}

type ResponseRun<T> = Box<dyn FnOnce(CancellationToken) -> BoxFuture<'static, Exec<T>> + Send>;

/// A response whose wait phase completed: a ready-to-run instruction.
///
/// Dropping it without executing cancels the response; the responder node is
/// stamped `Canceled` and the instruction tree stays `NotExecuted`.
pub struct PendingResponse<T> {
    guard: NodeGuard,
    run: ResponseRun<T>,
}

impl<T: Send + 'static> PendingResponse<T> {
    pub(crate) fn new(guard: NodeGuard, run: ResponseRun<T>) -> Self {
        Self { guard, run }
    }

    /// Execute the instruction phase and close out the responder node.
    pub async fn execute(self, token: &CancellationToken) -> Exec<T> {
        let outcome = (self.run)(token.clone()).await;
        self.guard.finish(&outcome);
        outcome
    }
}

pub(crate) struct RespondWithFactory<S, T> {
    name: OperationName,
    condition: WaitCondition<S>,
    respond: Arc<dyn Fn(S) -> Instruction<T> + Send + Sync>,
}

impl<S: Send + 'static, T: Send + 'static> RespondWithFactory<S, T> {
    pub(crate) fn new(
        name: OperationName,
        condition: WaitCondition<S>,
        respond: impl Fn(S) -> Instruction<T> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name,
            condition,
            respond: Arc::new(respond),
        }
    }
}

impl<S: Send + 'static, T: Send + 'static> ResponderFactory<T> for RespondWithFactory<S, T> {
    fn create_state(&self) -> ResponderState<T> {
        let mut cond_state = self.condition.create_state();
        let node = StateNode::with_children(
            self.name.clone(),
            vec![
                NodeChild::Node(Arc::clone(cond_state.node())),
                NodeChild::PendingContinuation,
            ],
        );
        let respond = Arc::clone(&self.respond);
        let resp_node = Arc::clone(&node);

        ResponderState::new(
            node,
            Box::new(move |ctx, token, guard| {
                Box::pin(async move {
                    match cond_state.execute(&ctx, &token).await {
                        Ok(value) => {
                            // The instruction tree is constructed lazily, only
                            // now that the wait produced a value.
                            let mut instr_state = respond(value).create_state();
                            resp_node.resolve_continuation(Arc::clone(instr_state.node()));
                            Ok(PendingResponse::new(
                                guard,
                                Box::new(move |run_token| {
                                    Box::pin(async move {
                                        instr_state.execute(&ctx, &run_token).await
                                    })
                                }),
                            ))
                        }
                        Err(interrupted) => {
                            match &interrupted {
                                Interrupted::Failure(error) => guard.fail(error),
                                Interrupted::Canceled => guard.cancel(),
                            }
                            Err(interrupted)
                        }
                    }
                })
            }),
        )
    }
}

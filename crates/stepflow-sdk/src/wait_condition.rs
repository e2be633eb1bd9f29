// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Wait-condition descriptors.
//!
//! A wait condition is a predicate-driven asynchronous wait producing a value
//! once satisfied. The predicate is checked once immediately and then once per
//! scheduler tick. With no timeout applied a condition waits indefinitely —
//! there is no spurious completion. When the run context carries an external
//! error source, every leaf wait races against it so an outside error can
//! preempt an otherwise unbounded wait.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use stepflow_core::{
    Exec, Interrupted, OperationError, OperationName, OperationState, Result, RunContext,
    StateNode,
};

use crate::combinators::{
    expect_within::ExpectWithinFactory, group::GroupWaitFactory, select::WaitSelectFactory, Work,
};
use crate::responder::{RespondWithFactory, Responder};

/// Factory contract shared by every wait-condition descriptor.
pub(crate) trait WaitConditionFactory<T>: Send + Sync {
    fn create_state(&self) -> OperationState<T>;
}

/// A declarative, reusable predicate-driven wait.
pub struct WaitCondition<T> {
    inner: Arc<dyn WaitConditionFactory<T>>,
}

impl<T> Clone for WaitCondition<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Send + 'static> WaitCondition<T> {
    pub(crate) fn from_factory(inner: Arc<dyn WaitConditionFactory<T>>) -> Self {
        Self { inner }
    }

    /// Stamp a fresh, independent operation tree for one run.
    pub fn create_state(&self) -> OperationState<T> {
        self.inner.create_state()
    }

    pub(crate) fn work(&self) -> Work<T> {
        Work::from_state(self.create_state())
    }

    /// Map the result through a fallible transform; see
    /// [`Instruction::select`](crate::Instruction::select).
    #[track_caller]
    pub fn select<U, F>(self, map: F) -> WaitCondition<U>
    where
        U: Send + 'static,
        F: Fn(T) -> anyhow::Result<U> + Send + Sync + 'static,
    {
        WaitCondition::from_factory(Arc::new(WaitSelectFactory::new(
            OperationName::here("SELECT"),
            self,
            map,
        )))
    }

    /// Bundle this wait with an instruction built from its result.
    #[track_caller]
    pub fn then_respond_with<U, F>(self, name: impl Into<String>, respond: F) -> Responder<U>
    where
        U: Send + 'static,
        F: Fn(T) -> crate::Instruction<U> + Send + Sync + 'static,
    {
        Responder::from_factory(Arc::new(RespondWithFactory::new(
            OperationName::here(name.into()),
            self,
            respond,
        )))
    }

    /// Fail with a timeout unless satisfied within `timeout` of virtual time.
    #[track_caller]
    pub fn expect_within(self, timeout: Duration) -> crate::Instruction<T> {
        ExpectWithinFactory::instruction(timeout, move || self.work())
    }

    /// Wrap under a named description node. Cosmetic only.
    #[track_caller]
    pub fn grouped_as(self, name: impl Into<String>) -> WaitCondition<T> {
        WaitCondition::from_factory(Arc::new(GroupWaitFactory::new(
            OperationName::here(name.into()),
            self,
        )))
    }
}

/// Race a leaf wait against the context's external error source, when one is
/// installed. Every leaf wait — predicate or timer — goes through here so an
/// outside error preempts it regardless of how long it would otherwise sit.
pub(crate) async fn race_external_errors<T>(
    ctx: &RunContext,
    token: &CancellationToken,
    wait: impl Future<Output = Result<T>> + Send,
) -> Exec<T> {
    match ctx.external_events().cloned() {
        Some(external) => {
            tokio::select! {
                biased;
                observed = external.await_error(token.clone()) => match observed {
                    Some(error) => Err(Interrupted::Failure(error)),
                    None => Err(Interrupted::Canceled),
                },
                outcome = wait => outcome.map_err(Interrupted::Failure),
            }
        }
        None => wait.await.map_err(Interrupted::Failure),
    }
}

struct PollConditionFactory<T> {
    name: OperationName,
    check: Arc<dyn Fn() -> anyhow::Result<Option<T>> + Send + Sync>,
}

impl<T: Send + 'static> WaitConditionFactory<T> for PollConditionFactory<T> {
    fn create_state(&self) -> OperationState<T> {
        let node = StateNode::new(self.name.clone());
        let check = Arc::clone(&self.check);
        OperationState::new(node, move |ctx, token| {
            Box::pin(async move {
                let wait = ctx
                    .scheduler()
                    .poll_for_condition(move || check().map_err(OperationError::failure));
                race_external_errors(&ctx, &token, wait).await
            })
        })
    }
}

/// Wait until `check` yields a value.
///
/// `check` runs once immediately and then once per tick; returning `Err`
/// fails the wait.
#[track_caller]
pub fn wait_for_condition<T, F>(name: impl Into<String>, check: F) -> WaitCondition<T>
where
    T: Send + 'static,
    F: Fn() -> anyhow::Result<Option<T>> + Send + Sync + 'static,
{
    WaitCondition::from_factory(Arc::new(PollConditionFactory {
        name: OperationName::here(name.into()),
        check: Arc::new(check),
    }))
}

// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Instruction descriptors.
//!
//! An instruction is a one-shot asynchronous action producing a result.
//! Descriptors are pure and reusable: building one has no side effects, and
//! every [`create_state`](Instruction::create_state) stamps an independent
//! operation tree. Constructors are `#[track_caller]` so diagnostics point at
//! the line the test author wrote.

use std::sync::Arc;
use std::time::Duration;

use stepflow_core::{
    Interrupted, OperationError, OperationName, OperationState, StateNode,
};

use crate::combinators::{
    continuation::ContinuationFactory, expect_within::ExpectWithinFactory,
    group::GroupInstructionFactory, select::SelectFactory, sequence::SequenceFactory, Work,
};
use crate::wait_condition::race_external_errors;

/// Factory contract shared by every instruction descriptor.
pub(crate) trait InstructionFactory<T>: Send + Sync {
    fn create_state(&self) -> OperationState<T>;
}

/// A declarative, reusable one-shot asynchronous action.
pub struct Instruction<T> {
    inner: Arc<dyn InstructionFactory<T>>,
}

impl<T> Clone for Instruction<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Send + 'static> Instruction<T> {
    pub(crate) fn from_factory(inner: Arc<dyn InstructionFactory<T>>) -> Self {
        Self { inner }
    }

    /// Stamp a fresh, independent operation tree for one run.
    pub fn create_state(&self) -> OperationState<T> {
        self.inner.create_state()
    }

    pub(crate) fn work(&self) -> Work<T> {
        Work::from_state(self.create_state())
    }

    /// Map the result through a fallible transform.
    ///
    /// A failure inside `map` is attributed to the `SELECT` node, keeping it
    /// apart from failures of the source instruction.
    #[track_caller]
    pub fn select<U, F>(self, map: F) -> Instruction<U>
    where
        U: Send + 'static,
        F: Fn(T) -> anyhow::Result<U> + Send + Sync + 'static,
    {
        Instruction::from_factory(Arc::new(SelectFactory::new(
            OperationName::here("SELECT"),
            self,
            map,
        )))
    }

    /// Run this instruction, then a second one built lazily from its result.
    ///
    /// Until the first result exists, diagnostics render the missing second
    /// tree as a `[ ] ...` placeholder.
    #[track_caller]
    pub fn and_then<U, F>(self, next: F) -> Instruction<U>
    where
        U: Send + 'static,
        F: Fn(T) -> Instruction<U> + Send + Sync + 'static,
    {
        Instruction::from_factory(Arc::new(ContinuationFactory::new(
            OperationName::here("CONTINUE WITH"),
            self,
            next,
        )))
    }

    /// Run this instruction, discard its result, then run `second`.
    #[track_caller]
    pub fn then<U>(self, second: Instruction<U>) -> Instruction<U>
    where
        U: Send + 'static,
    {
        Instruction::from_factory(Arc::new(SequenceFactory::new(
            OperationName::here("SEQUENCE"),
            self,
            second,
        )))
    }

    /// Fail unless this instruction finishes within `timeout` of virtual time.
    #[track_caller]
    pub fn expect_within(self, timeout: Duration) -> Instruction<T> {
        ExpectWithinFactory::instruction(timeout, move || self.work())
    }

    /// Wrap under a named description node. Cosmetic only.
    #[track_caller]
    pub fn grouped_as(self, name: impl Into<String>) -> Instruction<T> {
        Instruction::from_factory(Arc::new(GroupInstructionFactory::new(
            OperationName::here(name.into()),
            self,
        )))
    }
}

struct DoOnceFactory<T> {
    name: OperationName,
    body: Arc<dyn Fn() -> anyhow::Result<T> + Send + Sync>,
}

impl<T: Send + 'static> InstructionFactory<T> for DoOnceFactory<T> {
    fn create_state(&self) -> OperationState<T> {
        let node = StateNode::new(self.name.clone());
        let body = Arc::clone(&self.body);
        OperationState::new(node, move |_ctx, _token| {
            Box::pin(async move {
                body().map_err(|error| Interrupted::Failure(OperationError::failure(error)))
            })
        })
    }
}

/// A synchronous action run once per execution.
#[track_caller]
pub fn do_once<T, F>(name: impl Into<String>, body: F) -> Instruction<T>
where
    T: Send + 'static,
    F: Fn() -> anyhow::Result<T> + Send + Sync + 'static,
{
    Instruction::from_factory(Arc::new(DoOnceFactory {
        name: OperationName::here(name.into()),
        body: Arc::new(body),
    }))
}

struct WaitForSecondsFactory {
    name: OperationName,
    duration: Duration,
}

impl InstructionFactory<()> for WaitForSecondsFactory {
    fn create_state(&self) -> OperationState<()> {
        let node = StateNode::new(self.name.clone());
        let duration = self.duration;
        OperationState::new(node, move |ctx, token| {
            Box::pin(async move {
                let wait = ctx.scheduler().elapse(duration);
                race_external_errors(&ctx, &token, wait).await
            })
        })
    }
}

/// Completes once the given amount of virtual time has passed.
#[track_caller]
pub fn wait_for_seconds(duration: Duration) -> Instruction<()> {
    Instruction::from_factory(Arc::new(WaitForSecondsFactory {
        name: OperationName::here(format!("WAIT FOR {:.2} s", duration.as_secs_f64())),
        duration,
    }))
}

struct WaitForFramesFactory {
    name: OperationName,
    frames: u64,
}

impl InstructionFactory<()> for WaitForFramesFactory {
    fn create_state(&self) -> OperationState<()> {
        let node = StateNode::new(self.name.clone());
        let frames = self.frames;
        OperationState::new(node, move |ctx, token| {
            Box::pin(async move {
                let wait = ctx.scheduler().elapse_frames(frames);
                race_external_errors(&ctx, &token, wait).await
            })
        })
    }
}

/// Completes once the given number of frames has passed.
#[track_caller]
pub fn wait_for_frames(frames: u64) -> Instruction<()> {
    Instruction::from_factory(Arc::new(WaitForFramesFactory {
        name: OperationName::here(format!("WAIT FOR {frames} FRAME(S)")),
        frames,
    }))
}

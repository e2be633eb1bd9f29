// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Timeout as a race, not forced termination.
//!
//! The wrapped tree races a poll-driven deadline under linked cancellation.
//! On timeout the tree is cancelled (its nodes stamp `Canceled`) and the
//! wrapper fails with a timeout-kind error — a distinct classification that
//! is never conflated with a user failure from inside the tree.

use std::sync::Arc;
use std::time::Duration;

use stepflow_core::racing::{amb, Deferred};
use stepflow_core::{
    Exec, Interrupted, NodeChild, OperationError, OperationName, OperationState, Result, StateNode,
};

use crate::combinators::Work;
use crate::instruction::{Instruction, InstructionFactory};

enum RaceOutcome<T> {
    Work(Exec<T>),
    Timer(Result<()>),
    TokenFired,
}

pub(crate) struct ExpectWithinFactory<T> {
    name: OperationName,
    timeout: Duration,
    make_work: Box<dyn Fn() -> Work<T> + Send + Sync>,
}

impl<T: Send + 'static> ExpectWithinFactory<T> {
    #[track_caller]
    pub(crate) fn instruction(
        timeout: Duration,
        make_work: impl Fn() -> Work<T> + Send + Sync + 'static,
    ) -> Instruction<T> {
        Instruction::from_factory(Arc::new(Self {
            name: OperationName::here(format!(
                "EXPECT WITHIN {:.2} s",
                timeout.as_secs_f64()
            )),
            timeout,
            make_work: Box::new(make_work),
        }))
    }
}

impl<T: Send + 'static> InstructionFactory<T> for ExpectWithinFactory<T> {
    fn create_state(&self) -> OperationState<T> {
        let work = (self.make_work)();
        let node = StateNode::with_children(
            self.name.clone(),
            vec![NodeChild::Node(Arc::clone(work.node()))],
        );
        let timeout = self.timeout;

        OperationState::new(node, move |ctx, token| {
            Box::pin(async move {
                let scheduler = Arc::clone(ctx.scheduler());
                let work_branch: Deferred<RaceOutcome<T>> = {
                    let ctx = ctx.clone();
                    Box::new(move |branch_token| {
                        Box::pin(async move {
                            RaceOutcome::Work(work.start(ctx, branch_token).await)
                        })
                    })
                };
                let timer_branch: Deferred<RaceOutcome<T>> = Box::new(move |branch_token| {
                    Box::pin(async move {
                        tokio::select! {
                            biased;
                            _ = branch_token.cancelled() => RaceOutcome::TokenFired,
                            elapsed = scheduler.elapse(timeout) => RaceOutcome::Timer(elapsed),
                        }
                    })
                });

                match amb(&token, vec![work_branch, timer_branch]).await {
                    Some((_, RaceOutcome::Work(outcome))) => outcome,
                    Some((_, RaceOutcome::Timer(Ok(())))) => {
                        Err(Interrupted::Failure(OperationError::timeout(timeout)))
                    }
                    // The deadline check itself failed: scheduler went away.
                    Some((_, RaceOutcome::Timer(Err(error)))) => {
                        Err(Interrupted::Failure(error))
                    }
                    Some((_, RaceOutcome::TokenFired)) | None => Err(Interrupted::Canceled),
                }
            })
        })
    }
}

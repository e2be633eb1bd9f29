// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Concurrent join over wait conditions.
//!
//! All conditions run under linked child tokens and may finish in any order;
//! results come back in input order. The first real failure cancels the
//! remaining siblings promptly instead of letting them run to completion —
//! and a sibling's cancellation is never mistaken for that failure.

use std::sync::Arc;

use stepflow_core::racing::{Deferred, MultipleTaskSource};
use stepflow_core::{
    Exec, Interrupted, NodeChild, OperationError, OperationName, OperationState, StateNode,
};

use crate::wait_condition::{WaitCondition, WaitConditionFactory};

struct AllOfFactory<T> {
    name: OperationName,
    conditions: Vec<WaitCondition<T>>,
}

impl<T: Send + 'static> WaitConditionFactory<Vec<T>> for AllOfFactory<T> {
    fn create_state(&self) -> OperationState<Vec<T>> {
        let states: Vec<OperationState<T>> = self
            .conditions
            .iter()
            .map(WaitCondition::create_state)
            .collect();
        let children: Vec<NodeChild> = states
            .iter()
            .map(|state| NodeChild::Node(Arc::clone(state.node())))
            .collect();
        let node = StateNode::with_children(self.name.clone(), children);

        OperationState::new(node, move |ctx, token| {
            Box::pin(async move {
                let count = states.len();
                let branches: Vec<Deferred<Exec<T>>> = states
                    .into_iter()
                    .map(|state| {
                        let ctx = ctx.clone();
                        let branch: Deferred<Exec<T>> = Box::new(move |branch_token| {
                            Box::pin(async move {
                                let mut state = state;
                                state.execute(&ctx, &branch_token).await
                            })
                        });
                        branch
                    })
                    .collect();

                let mut source = MultipleTaskSource::start(&token, branches);
                let mut results: Vec<Option<T>> = (0..count).map(|_| None).collect();
                while let Some((index, outcome)) = source.next().await {
                    match outcome {
                        Ok(value) => results[index] = Some(value),
                        Err(interrupted) => {
                            source.cancel_remaining();
                            source.drain().await;
                            return Err(interrupted);
                        }
                    }
                }

                let mut values = Vec::with_capacity(count);
                for result in results {
                    match result {
                        Some(value) => values.push(value),
                        None => {
                            return Err(Interrupted::Failure(OperationError::invariant(
                                "all-of branch finished without a result",
                            )));
                        }
                    }
                }
                Ok(values)
            })
        })
    }
}

/// Wait for every condition, concurrently; results in input order.
#[track_caller]
pub fn all_of<T: Send + 'static>(conditions: Vec<WaitCondition<T>>) -> WaitCondition<Vec<T>> {
    WaitCondition::from_factory(Arc::new(AllOfFactory {
        name: OperationName::here("WAIT FOR ALL OF"),
        conditions,
    }))
}

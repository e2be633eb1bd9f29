// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Repeat a response until a condition is met.
//!
//! The condition future is polled inline, ahead of the response machinery on
//! every turn of the loop, and its result is captured exactly once. The
//! moment it lands no further response launches; an outstanding response —
//! still waiting or mid-instruction — is dropped, which cancels it, and the
//! loop exits with the condition's result. A repetition bound turns a
//! condition that never lands into a diagnosable failure instead of an
//! endless loop.

use std::pin::pin;
use std::sync::Arc;

use futures::future::poll_immediate;

use stepflow_core::{
    Interrupted, NodeChild, OperationError, OperationName, OperationState, StateNode,
};

use crate::responder::{Responder, UntilOptions};
use crate::wait_condition::{WaitCondition, WaitConditionFactory};

pub(crate) struct UntilFactory<T, U> {
    name: OperationName,
    responder: Responder<T>,
    condition: WaitCondition<U>,
    options: UntilOptions,
}

impl<T: Send + 'static, U: Send + 'static> UntilFactory<T, U> {
    pub(crate) fn new(
        name: OperationName,
        responder: Responder<T>,
        condition: WaitCondition<U>,
        options: UntilOptions,
    ) -> Self {
        Self {
            name,
            responder,
            condition,
            options,
        }
    }
}

impl<T: Send + 'static, U: Send + 'static> WaitConditionFactory<U> for UntilFactory<T, U> {
    fn create_state(&self) -> OperationState<U> {
        let mut cond_state = self.condition.create_state();
        let node = StateNode::with_children(
            self.name.clone(),
            vec![NodeChild::Node(Arc::clone(cond_state.node()))],
        );
        let responder = self.responder.clone();
        let max_repeats = self.options.max_repeats;
        let own_node = Arc::clone(&node);

        OperationState::new(node, move |ctx, token| {
            Box::pin(async move {
                let mut condition = pin!(cond_state.execute(&ctx, &token));
                let mut executed = 0usize;
                loop {
                    // The condition is observed before a response is even
                    // created, so a settled condition never gains another
                    // responder child or side effect.
                    if let Some(outcome) = poll_immediate(&mut condition).await {
                        return outcome;
                    }

                    let mut response = responder.create_state();
                    own_node.push_child(Arc::clone(response.node()));

                    tokio::select! {
                        biased;
                        outcome = &mut condition => return outcome,
                        waited = response.wait(&ctx, &token) => match waited {
                            Ok(pending) => {
                                if executed >= max_repeats {
                                    drop(pending);
                                    return Err(Interrupted::Failure(
                                        OperationError::repetition_limit(max_repeats),
                                    ));
                                }
                                executed += 1;
                                tokio::select! {
                                    biased;
                                    // Drops the pending response unexecuted,
                                    // which cancels it.
                                    outcome = &mut condition => return outcome,
                                    ran = pending.execute(&token) => {
                                        if let Err(interrupted) = ran {
                                            return Err(interrupted);
                                        }
                                    }
                                }
                            }
                            Err(interrupted) => return Err(interrupted),
                        },
                    }
                }
            })
        })
    }
}

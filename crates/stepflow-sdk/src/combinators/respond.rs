// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Fan-in over responders.
//!
//! `respond_to_all_of` launches every responder's wait phase concurrently but
//! executes the resulting instructions strictly one at a time, in wait-phase
//! completion order — side effects never interleave. `respond_to_any_of`
//! races the wait phases and responds only with the winner, cancelling the
//! losing waits.

use std::sync::Arc;

use stepflow_core::racing::{Deferred, MultipleTaskSource};
use stepflow_core::{
    Exec, Interrupted, NodeChild, OperationError, OperationName, OperationState, StateNode,
};

use crate::instruction::{Instruction, InstructionFactory};
use crate::responder::{PendingResponse, Responder, ResponderFactory, ResponderState};

fn wait_branches<T: Send + 'static>(
    states: Vec<ResponderState<T>>,
    ctx: &stepflow_core::RunContext,
) -> Vec<Deferred<Exec<PendingResponse<T>>>> {
    states
        .into_iter()
        .map(|state| {
            let ctx = ctx.clone();
            let branch: Deferred<Exec<PendingResponse<T>>> = Box::new(move |branch_token| {
                Box::pin(async move {
                    let mut state = state;
                    state.wait(&ctx, &branch_token).await
                })
            });
            branch
        })
        .collect()
}

struct RespondToAllOfFactory<T> {
    name: OperationName,
    responders: Vec<Responder<T>>,
}

impl<T: Send + 'static> InstructionFactory<Vec<T>> for RespondToAllOfFactory<T> {
    fn create_state(&self) -> OperationState<Vec<T>> {
        let states: Vec<ResponderState<T>> = self
            .responders
            .iter()
            .map(Responder::create_state)
            .collect();
        let children: Vec<NodeChild> = states
            .iter()
            .map(|state| NodeChild::Node(Arc::clone(state.node())))
            .collect();
        let node = StateNode::with_children(self.name.clone(), children);

        OperationState::new(node, move |ctx, token| {
            Box::pin(async move {
                let count = states.len();
                let mut source = MultipleTaskSource::start(&token, wait_branches(states, &ctx));
                let mut results: Vec<Option<T>> = (0..count).map(|_| None).collect();

                while let Some((index, waited)) = source.next().await {
                    match waited {
                        Ok(pending) => {
                            // Serialized: the other wait phases keep running,
                            // but no second instruction starts while this one
                            // executes.
                            match pending.execute(&token).await {
                                Ok(value) => results[index] = Some(value),
                                Err(interrupted) => {
                                    source.cancel_remaining();
                                    source.drain().await;
                                    return Err(interrupted);
                                }
                            }
                        }
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
                                "responder finished without a result",
                            )));
                        }
                    }
                }
                Ok(values)
            })
        })
    }
}

/// Respond to every condition; waits race freely, responses run serialized
/// in wait-completion order. Results in input order.
#[track_caller]
pub fn respond_to_all_of<T: Send + 'static>(responders: Vec<Responder<T>>) -> Instruction<Vec<T>> {
    Instruction::from_factory(Arc::new(RespondToAllOfFactory {
        name: OperationName::here("RESPOND TO ALL OF"),
        responders,
    }))
}

struct RespondToAnyOfFactory<T> {
    name: OperationName,
    responders: Vec<Responder<T>>,
}

impl<T: Send + 'static> ResponderFactory<T> for RespondToAnyOfFactory<T> {
    fn create_state(&self) -> ResponderState<T> {
        let states: Vec<ResponderState<T>> = self
            .responders
            .iter()
            .map(Responder::create_state)
            .collect();
        let children: Vec<NodeChild> = states
            .iter()
            .map(|state| NodeChild::Node(Arc::clone(state.node())))
            .collect();
        let node = StateNode::with_children(self.name.clone(), children);

        ResponderState::new(
            node,
            Box::new(move |ctx, token, guard| {
                Box::pin(async move {
                    let mut source = MultipleTaskSource::start(&token, wait_branches(states, &ctx));
                    loop {
                        match source.next().await {
                            Some((_, Ok(pending))) => {
                                source.cancel_remaining();
                                source.drain().await;
                                return Ok(PendingResponse::new(
                                    guard,
                                    Box::new(move |run_token| {
                                        Box::pin(async move { pending.execute(&run_token).await })
                                    }),
                                ));
                            }
                            Some((_, Err(Interrupted::Failure(error)))) => {
                                source.cancel_remaining();
                                source.drain().await;
                                guard.fail(&error);
                                return Err(Interrupted::Failure(error));
                            }
                            // A branch observed its token; keep collecting.
                            Some((_, Err(Interrupted::Canceled))) => {}
                            None => {
                                guard.cancel();
                                return Err(Interrupted::Canceled);
                            }
                        }
                    }
                })
            }),
        )
    }
}

/// Respond to whichever condition is met first; losing waits are cancelled.
#[track_caller]
pub fn respond_to_any_of<T: Send + 'static>(responders: Vec<Responder<T>>) -> Responder<T> {
    Responder::from_factory(Arc::new(RespondToAnyOfFactory {
        name: OperationName::here("RESPOND TO ANY OF"),
        responders,
    }))
}

// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Monadic continuation: the second tree is built lazily from the first
//! result. Until then, diagnostics render a `[ ] ...` placeholder where the
//! missing child will appear.

use std::sync::Arc;

use stepflow_core::{NodeChild, OperationName, OperationState, StateNode};

use crate::instruction::{Instruction, InstructionFactory};

pub(crate) struct ContinuationFactory<S, T> {
    name: OperationName,
    first: Instruction<S>,
    next: Arc<dyn Fn(S) -> Instruction<T> + Send + Sync>,
}

impl<S: Send + 'static, T: Send + 'static> ContinuationFactory<S, T> {
    pub(crate) fn new(
        name: OperationName,
        first: Instruction<S>,
        next: impl Fn(S) -> Instruction<T> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name,
            first,
            next: Arc::new(next),
        }
    }
}

impl<S: Send + 'static, T: Send + 'static> InstructionFactory<T> for ContinuationFactory<S, T> {
    fn create_state(&self) -> OperationState<T> {
        let mut first = self.first.create_state();
        let node = StateNode::with_children(
            self.name.clone(),
            vec![
                NodeChild::Node(Arc::clone(first.node())),
                NodeChild::PendingContinuation,
            ],
        );
        let next = Arc::clone(&self.next);
        let own_node = Arc::clone(&node);
        OperationState::new(node, move |ctx, token| {
            Box::pin(async move {
                let value = first.execute(&ctx, &token).await?;
                let mut second = next(value).create_state();
                own_node.resolve_continuation(Arc::clone(second.node()));
                second.execute(&ctx, &token).await
            })
        })
    }
}

// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Sequential composition: run the first, discard its result, run the second.

use std::sync::Arc;

use stepflow_core::{NodeChild, OperationName, OperationState, StateNode};

use crate::instruction::{Instruction, InstructionFactory};

pub(crate) struct SequenceFactory<S, T> {
    name: OperationName,
    first: Instruction<S>,
    second: Instruction<T>,
}

impl<S: Send + 'static, T: Send + 'static> SequenceFactory<S, T> {
    pub(crate) fn new(name: OperationName, first: Instruction<S>, second: Instruction<T>) -> Self {
        Self {
            name,
            first,
            second,
        }
    }
}

impl<S: Send + 'static, T: Send + 'static> InstructionFactory<T> for SequenceFactory<S, T> {
    fn create_state(&self) -> OperationState<T> {
        let mut first = self.first.create_state();
        let mut second = self.second.create_state();
        let node = StateNode::with_children(
            self.name.clone(),
            vec![
                NodeChild::Node(Arc::clone(first.node())),
                NodeChild::Node(Arc::clone(second.node())),
            ],
        );
        OperationState::new(node, move |ctx, token| {
            Box::pin(async move {
                first.execute(&ctx, &token).await?;
                second.execute(&ctx, &token).await
            })
        })
    }
}

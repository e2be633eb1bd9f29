// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Cosmetic description nesting. No behavior change.

use std::sync::Arc;

use stepflow_core::{NodeChild, OperationName, OperationState, StateNode};

use crate::instruction::{Instruction, InstructionFactory};
use crate::wait_condition::{WaitCondition, WaitConditionFactory};

fn group_state<T: Send + 'static>(
    name: OperationName,
    mut inner: OperationState<T>,
) -> OperationState<T> {
    let node = StateNode::with_children(name, vec![NodeChild::Node(Arc::clone(inner.node()))]);
    OperationState::new(node, move |ctx, token| {
        Box::pin(async move { inner.execute(&ctx, &token).await })
    })
}

pub(crate) struct GroupInstructionFactory<T> {
    name: OperationName,
    inner: Instruction<T>,
}

impl<T: Send + 'static> GroupInstructionFactory<T> {
    pub(crate) fn new(name: OperationName, inner: Instruction<T>) -> Self {
        Self { name, inner }
    }
}

impl<T: Send + 'static> InstructionFactory<T> for GroupInstructionFactory<T> {
    fn create_state(&self) -> OperationState<T> {
        group_state(self.name.clone(), self.inner.create_state())
    }
}

pub(crate) struct GroupWaitFactory<T> {
    name: OperationName,
    inner: WaitCondition<T>,
}

impl<T: Send + 'static> GroupWaitFactory<T> {
    pub(crate) fn new(name: OperationName, inner: WaitCondition<T>) -> Self {
        Self { name, inner }
    }
}

impl<T: Send + 'static> WaitConditionFactory<T> for GroupWaitFactory<T> {
    fn create_state(&self) -> OperationState<T> {
        group_state(self.name.clone(), self.inner.create_state())
    }
}

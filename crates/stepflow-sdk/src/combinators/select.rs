// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Result mapping with failure attribution.
//!
//! The transform runs under a synthetic `SELECT` node, so a failure inside it
//! carries the `SELECT` trail frame rather than the source operation's —
//! diagnostics can tell a bad source value from a bad mapping.

use std::sync::Arc;

use stepflow_core::{
    Interrupted, NodeChild, OperationError, OperationName, OperationState, StateNode,
};

use crate::instruction::{Instruction, InstructionFactory};
use crate::wait_condition::{WaitCondition, WaitConditionFactory};

pub(crate) struct SelectFactory<S, T> {
    name: OperationName,
    source: Instruction<S>,
    map: Arc<dyn Fn(S) -> anyhow::Result<T> + Send + Sync>,
}

impl<S: Send + 'static, T: Send + 'static> SelectFactory<S, T> {
    pub(crate) fn new(
        name: OperationName,
        source: Instruction<S>,
        map: impl Fn(S) -> anyhow::Result<T> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name,
            source,
            map: Arc::new(map),
        }
    }
}

fn select_state<S, T>(
    name: OperationName,
    mut source: OperationState<S>,
    map: Arc<dyn Fn(S) -> anyhow::Result<T> + Send + Sync>,
) -> OperationState<T>
where
    S: Send + 'static,
    T: Send + 'static,
{
    let node = StateNode::with_children(
        name,
        vec![NodeChild::Node(Arc::clone(source.node()))],
    );
    OperationState::new(node, move |ctx, token| {
        Box::pin(async move {
            let value = source.execute(&ctx, &token).await?;
            map(value).map_err(|error| Interrupted::Failure(OperationError::failure(error)))
        })
    })
}

impl<S: Send + 'static, T: Send + 'static> InstructionFactory<T> for SelectFactory<S, T> {
    fn create_state(&self) -> OperationState<T> {
        select_state(
            self.name.clone(),
            self.source.create_state(),
            Arc::clone(&self.map),
        )
    }
}

pub(crate) struct WaitSelectFactory<S, T> {
    name: OperationName,
    source: WaitCondition<S>,
    map: Arc<dyn Fn(S) -> anyhow::Result<T> + Send + Sync>,
}

impl<S: Send + 'static, T: Send + 'static> WaitSelectFactory<S, T> {
    pub(crate) fn new(
        name: OperationName,
        source: WaitCondition<S>,
        map: impl Fn(S) -> anyhow::Result<T> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name,
            source,
            map: Arc::new(map),
        }
    }
}

impl<S: Send + 'static, T: Send + 'static> WaitConditionFactory<T> for WaitSelectFactory<S, T> {
    fn create_state(&self) -> OperationState<T> {
        select_state(
            self.name.clone(),
            self.source.create_state(),
            Arc::clone(&self.map),
        )
    }
}

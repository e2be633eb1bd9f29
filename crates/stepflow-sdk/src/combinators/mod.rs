// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Combinators over descriptors.
//!
//! Every combinator builds a composite operation tree from child descriptors
//! at `create_state` time, so diagnostics can show the whole declared shape
//! before anything runs. Fan-out combinators race branches through
//! [`stepflow_core::racing`] under linked cancellation tokens.

pub(crate) mod all_of;
pub(crate) mod continuation;
pub(crate) mod expect_within;
pub(crate) mod group;
pub(crate) mod respond;
pub(crate) mod select;
pub(crate) mod sequence;
pub(crate) mod until;

pub use all_of::all_of;
pub use respond::{respond_to_all_of, respond_to_any_of};

use std::sync::Arc;

use futures::future::BoxFuture;
use tokio_util::sync::CancellationToken;

use stepflow_core::{Exec, OperationState, RunContext, StateNode};

/// A startable unit of work with a visible diagnostics node.
///
/// Uniform internal shape over instructions, wait conditions, and full
/// responder runs, used by combinators that race arbitrary subtrees.
pub(crate) struct Work<T> {
    node: Arc<StateNode>,
    start: Box<dyn FnOnce(RunContext, CancellationToken) -> BoxFuture<'static, Exec<T>> + Send>,
}

impl<T: Send + 'static> Work<T> {
    pub(crate) fn new(
        node: Arc<StateNode>,
        start: impl FnOnce(RunContext, CancellationToken) -> BoxFuture<'static, Exec<T>>
        + Send
        + 'static,
    ) -> Self {
        Self {
            node,
            start: Box::new(start),
        }
    }

    pub(crate) fn from_state(state: OperationState<T>) -> Self {
        let node = Arc::clone(state.node());
        Self::new(node, move |ctx, token| {
            Box::pin(async move {
                let mut state = state;
                state.execute(&ctx, &token).await
            })
        })
    }

    pub(crate) fn node(&self) -> &Arc<StateNode> {
        &self.node
    }

    pub(crate) fn start(
        self,
        ctx: RunContext,
        token: CancellationToken,
    ) -> BoxFuture<'static, Exec<T>> {
        (self.start)(ctx, token)
    }
}

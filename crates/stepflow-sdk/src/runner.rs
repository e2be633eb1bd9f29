// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Root run entry point.
//!
//! Any test runner can call this: build a tree, run it, get a result. On
//! failure the full tree is rendered once, handed to the host's
//! [`FailureListener`](stepflow_core::FailureListener) if one is installed,
//! and returned inside [`TestFailure`] so the assertion message carries the
//! whole picture.

use std::sync::Arc;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use stepflow_core::{Interrupted, OperationError, RunContext};

use crate::diagnostics::render_tree;
use crate::instruction::Instruction;

/// A failed or cancelled root run.
#[derive(Debug, Error)]
pub enum TestFailure {
    /// The tree failed; the description is the rendered operation tree.
    #[error("{error}\n{description}")]
    Failed {
        /// Proximate cause.
        error: OperationError,
        /// Tree-shaped status report at the moment of failure.
        description: String,
    },
    /// The run's cancellation token fired before the tree finished.
    #[error("operation run was canceled")]
    Canceled,
}

impl<T: Send + 'static> Instruction<T> {
    /// Execute this instruction to completion under a fresh root token.
    pub async fn run(&self, ctx: &RunContext) -> Result<T, TestFailure> {
        self.run_with_token(ctx, &CancellationToken::new()).await
    }

    /// Execute under a caller-owned cancellation token.
    pub async fn run_with_token(
        &self,
        ctx: &RunContext,
        token: &CancellationToken,
    ) -> Result<T, TestFailure> {
        let mut state = self.create_state();
        let node = Arc::clone(state.node());
        match state.execute(ctx, token).await {
            Ok(value) => Ok(value),
            Err(Interrupted::Failure(error)) => {
                let description = render_tree(&node);
                debug!(error = %error, "root run failed");
                if let Some(listener) = ctx.failure_listener() {
                    listener.on_operation_failed(&error, &description);
                }
                Err(TestFailure::Failed { error, description })
            }
            Err(Interrupted::Canceled) => Err(TestFailure::Canceled),
        }
    }
}

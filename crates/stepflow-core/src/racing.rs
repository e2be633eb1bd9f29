// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Cancellation-linked racing of deferred operations.
//!
//! [`MultipleTaskSource`] starts N deferred operations under child tokens
//! linked to one parent and yields their results in completion order.
//! [`amb`] is the "ambiguous choice" race built on top: first finisher wins,
//! the rest are cancelled and drained. Cancelling the parent token cascades
//! to every branch.

use futures::future::BoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};
use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;
use tracing::error;

/// A not-yet-started operation, given its cancellation token at launch.
pub type Deferred<T> = Box<dyn FnOnce(CancellationToken) -> BoxFuture<'static, T> + Send>;

/// N running operations, yielded in completion order. Single-use.
pub struct MultipleTaskSource<T> {
    pending: FuturesUnordered<BoxFuture<'static, (usize, Result<T, JoinError>)>>,
    tokens: Vec<CancellationToken>,
}

impl<T: Send + 'static> MultipleTaskSource<T> {
    /// Start every operation now, each under a child of `parent`.
    ///
    /// Requires an ambient tokio runtime; the operations progress as spawned
    /// tasks, so they keep running while the caller is busy elsewhere.
    pub fn start(parent: &CancellationToken, operations: Vec<Deferred<T>>) -> Self {
        let pending = FuturesUnordered::new();
        let mut tokens = Vec::with_capacity(operations.len());
        for (index, operation) in operations.into_iter().enumerate() {
            let token = parent.child_token();
            let handle = tokio::spawn(operation(token.clone()));
            tokens.push(token);
            pending.push(Box::pin(async move { (index, handle.await) })
                as BoxFuture<'static, (usize, Result<T, JoinError>)>);
        }
        Self { pending, tokens }
    }

    /// How many operations have not finished yet.
    pub fn remaining(&self) -> usize {
        self.pending.len()
    }

    /// The next operation to finish, with its launch index.
    ///
    /// A panicking operation is resumed here, never swallowed.
    pub async fn next(&mut self) -> Option<(usize, T)> {
        while let Some((index, joined)) = self.pending.next().await {
            match joined {
                Ok(value) => return Some((index, value)),
                Err(join_error) if join_error.is_panic() => {
                    std::panic::resume_unwind(join_error.into_panic());
                }
                Err(join_error) => {
                    // Task aborted out from under us; only possible during
                    // runtime shutdown.
                    error!(index, error = %join_error, "racing branch task vanished");
                }
            }
        }
        None
    }

    /// Cancel every branch that has not finished. Finished branches no-op.
    pub fn cancel_remaining(&self) {
        for token in &self.tokens {
            token.cancel();
        }
    }

    /// Await the remaining branches, discarding their results.
    ///
    /// Called after [`cancel_remaining`](Self::cancel_remaining) so losers
    /// observe their tokens and stamp their statuses before the race returns.
    pub async fn drain(&mut self) {
        while self.next().await.is_some() {}
    }
}

/// Race deferred operations: first to finish wins, the rest are cancelled
/// and awaited. Returns `None` only for an empty field.
pub async fn amb<T: Send + 'static>(
    parent: &CancellationToken,
    operations: Vec<Deferred<T>>,
) -> Option<(usize, T)> {
    let mut source = MultipleTaskSource::start(parent, operations);
    let winner = source.next().await?;
    source.cancel_remaining();
    source.drain().await;
    Some(winner)
}

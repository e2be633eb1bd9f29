// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error types for stepflow-core.
//!
//! The taxonomy keeps four failure kinds apart: user failures, timeouts,
//! repetition-limit guards, and internal invariant violations. Cancellation is
//! deliberately *not* part of [`ErrorKind`] — a canceled operation is a
//! terminal status, not an error, and travels through [`Interrupted::Canceled`]
//! so no combinator can mistake it for a failure.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::error;

use crate::source::SourceTrail;

/// Result type using [`OperationError`].
pub type Result<T> = std::result::Result<T, OperationError>;

/// Result of one execution step: a value, a failure, or cancellation.
///
/// This is the channel every operation body and combinator uses internally.
pub type Exec<T> = std::result::Result<T, Interrupted>;

/// The kind of a failed operation.
#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum ErrorKind {
    /// User code returned or raised a failure.
    #[error("{0}")]
    Failure(Arc<anyhow::Error>),

    /// A timeout race was lost. Never conflated with a user failure.
    #[error("timed out after {timeout:.2?}")]
    Timeout {
        /// The timeout that elapsed.
        timeout: Duration,
    },

    /// A repeating combinator hit its configured repetition bound.
    #[error("repetition limit of {limit} exceeded")]
    RepetitionLimit {
        /// The configured maximum number of repetitions.
        limit: usize,
    },

    /// The engine detected an illegal state internally (double execution,
    /// illegal status transition). Always loud, never absorbed.
    #[error("internal invariant violated: {details}")]
    InvariantViolation {
        /// What went wrong.
        details: String,
    },
}

/// A failure produced while executing an operation tree.
///
/// Carries the failure [`ErrorKind`] plus the deepest [`SourceTrail`]
/// accumulated at the point of failure. Outer combinators propagate the error
/// content unchanged; the trail is attached once, at the failure site.
#[derive(Debug, Clone, Error)]
#[error("{kind}")]
pub struct OperationError {
    #[source]
    kind: ErrorKind,
    trail: SourceTrail,
}

impl OperationError {
    /// Wrap a user failure.
    pub fn failure(error: anyhow::Error) -> Self {
        Self::from_kind(ErrorKind::Failure(Arc::new(error)))
    }

    /// Wrap a user failure from a plain message.
    pub fn failure_msg(message: impl Into<String>) -> Self {
        Self::failure(anyhow::anyhow!(message.into()))
    }

    /// A lost timeout race.
    pub fn timeout(timeout: Duration) -> Self {
        Self::from_kind(ErrorKind::Timeout { timeout })
    }

    /// A repetition bound was exceeded.
    pub fn repetition_limit(limit: usize) -> Self {
        Self::from_kind(ErrorKind::RepetitionLimit { limit })
    }

    /// An internal invariant was violated. Logged loudly at construction.
    pub fn invariant(details: impl Into<String>) -> Self {
        let details = details.into();
        error!(details = %details, "internal invariant violated");
        Self::from_kind(ErrorKind::InvariantViolation { details })
    }

    fn from_kind(kind: ErrorKind) -> Self {
        Self {
            kind,
            trail: SourceTrail::default(),
        }
    }

    /// The failure kind.
    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    /// The source trail captured at the failure site.
    pub fn trail(&self) -> &SourceTrail {
        &self.trail
    }

    /// Whether this is a timeout failure.
    pub fn is_timeout(&self) -> bool {
        matches!(self.kind, ErrorKind::Timeout { .. })
    }

    /// Attach a trail unless one was already captured deeper in the tree.
    pub fn with_trail_if_empty(mut self, trail: &SourceTrail) -> Self {
        if self.trail.is_empty() {
            self.trail = trail.clone();
        }
        self
    }
}

/// Why an execution step did not produce a value.
///
/// Cancellation gets its own variant so it never shares the failure channel:
/// a combinator reacting to `Failure` (for example by cancelling siblings)
/// must never react the same way to `Canceled`.
#[derive(Debug, Clone, Error)]
pub enum Interrupted {
    /// The operation failed.
    #[error(transparent)]
    Failure(#[from] OperationError),

    /// The operation was canceled through its token or by being dropped.
    #[error("operation canceled")]
    Canceled,
}

impl Interrupted {
    /// Whether this interruption is a cancellation.
    pub fn is_canceled(&self) -> bool {
        matches!(self, Interrupted::Canceled)
    }

    /// The failure, if this interruption is one.
    pub fn as_failure(&self) -> Option<&OperationError> {
        match self {
            Interrupted::Failure(error) => Some(error),
            Interrupted::Canceled => None,
        }
    }
}

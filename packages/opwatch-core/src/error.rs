//! Error taxonomy for polling long-running operations.
//!
//! Every failure mode a caller can observe is a distinct `PollError` variant,
//! so "still running, we gave up" (`Timeout`), "it failed" (`Failed`), and
//! "we couldn't even ask" (`Transport`) stay distinguishable at the call
//! boundary. Nothing is swallowed silently.

use std::time::Duration;

use crate::status::RemoteFailure;

// ---------------------------------------------------------------------------
// PollError
// ---------------------------------------------------------------------------

/// Errors surfaced when polling an operation or reading its outcome.
#[derive(Debug, thiserror::Error)]
pub enum PollError {
    /// The caller read a result before the operation completed. Local
    /// programming error; never retried.
    #[error("operation result is not ready yet")]
    NotReady,

    /// The status fetch failed repeatedly and the retry budget ran out.
    /// The operation may still be running server-side.
    #[error("status fetch failed after {attempts} attempts")]
    Transport {
        /// Number of fetch attempts made before giving up.
        attempts: u32,
        #[source]
        source: anyhow::Error,
    },

    /// The client-side deadline or attempt budget ran out while the
    /// operation was still pending. This is the client giving up, not a
    /// server terminal state: the operation may still complete remotely.
    #[error("operation still pending after {attempts} attempts ({elapsed:?} elapsed)")]
    Timeout {
        /// Number of fetch attempts made before giving up.
        attempts: u32,
        /// Wall-clock time spent in the poll loop.
        elapsed: Duration,
    },

    /// A terminal payload could not be decoded. Non-retryable: a malformed
    /// payload will not become well-formed on retry.
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// Cancellation was requested and observed by the poll loop.
    #[error("operation cancelled by caller")]
    Cancelled,

    /// The operation itself failed remotely. This is the operation's own
    /// outcome, not a client-side fault.
    #[error("operation failed remotely: {0}")]
    Failed(RemoteFailure),
}

// ---------------------------------------------------------------------------
// DecodeError
// ---------------------------------------------------------------------------

/// A malformed result or metadata payload.
#[derive(Debug, thiserror::Error)]
#[error("malformed {payload} payload: {reason}")]
pub struct DecodeError {
    /// Which payload failed to decode (`"result"` or `"metadata"`).
    pub payload: &'static str,
    /// Decoder-supplied description of what went wrong.
    pub reason: String,
}

impl DecodeError {
    /// A malformed result payload.
    #[must_use]
    pub fn result(reason: impl Into<String>) -> Self {
        Self {
            payload: "result",
            reason: reason.into(),
        }
    }

    /// A malformed metadata payload.
    #[must_use]
    pub fn metadata(reason: impl Into<String>) -> Self {
        Self {
            payload: "metadata",
            reason: reason.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

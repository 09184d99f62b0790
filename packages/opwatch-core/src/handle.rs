//! In-flight operation state.
//!
//! An `OperationHandle` tracks one server-side operation from pending to
//! terminal. State machine: `Running` -> exactly one of `Succeeded` or
//! `Failed`. Terminal states are frozen: once done, further status
//! applications are no-ops and the decode hooks are never invoked again.
//!
//! The handle is shared (typically behind `Arc`) between the caller that owns
//! it and the poll loop that borrows it for the duration of a polling
//! session. Reads and writes go through an internal `RwLock`; the
//! cancellation flag is a separate atomic so a cancel request never contends
//! with a state update.

use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;

use crate::codec::OperationCodec;
use crate::error::{DecodeError, PollError};
use crate::status::{RawStatus, RemoteFailure};

// ---------------------------------------------------------------------------
// HandleState
// ---------------------------------------------------------------------------

/// Internal state machine. The metadata snapshot survives the transition to
/// a terminal state so late readers still see the last reported progress.
enum HandleState<T, M> {
    Running { metadata: Option<M> },
    Succeeded { result: T, metadata: Option<M> },
    Failed { failure: RemoteFailure, metadata: Option<M> },
}

impl<T, M> HandleState<T, M> {
    fn is_done(&self) -> bool {
        !matches!(self, Self::Running { .. })
    }
}

// ---------------------------------------------------------------------------
// OperationHandle
// ---------------------------------------------------------------------------

/// Client-side view of one long-running operation.
///
/// `T` is the decoded success payload, `M` the decoded in-progress metadata.
pub struct OperationHandle<T, M> {
    id: String,
    state: RwLock<HandleState<T, M>>,
    cancel_requested: AtomicBool,
}

impl<T, M> OperationHandle<T, M> {
    /// Creates a pending handle for the operation the service named `id`.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            state: RwLock::new(HandleState::Running { metadata: None }),
            cancel_requested: AtomicBool::new(false),
        }
    }

    /// Creates a pending handle that already carries decoded metadata
    /// (e.g. from the triggering call's immediate response).
    #[must_use]
    pub fn with_initial_metadata(id: impl Into<String>, metadata: M) -> Self {
        Self {
            id: id.into(),
            state: RwLock::new(HandleState::Running {
                metadata: Some(metadata),
            }),
            cancel_requested: AtomicBool::new(false),
        }
    }

    /// The opaque identifier assigned by the remote service.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Whether the operation has reached a terminal state, per the latest
    /// applied status. Does not poll.
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.state.read().is_done()
    }

    /// The remote failure outcome, if the operation is terminal-and-failed.
    #[must_use]
    pub fn failure(&self) -> Option<RemoteFailure> {
        match &*self.state.read() {
            HandleState::Failed { failure, .. } => Some(failure.clone()),
            _ => None,
        }
    }

    /// Requests cooperative cancellation. The poll loop observes the flag at
    /// its next check point; this does not interrupt an in-flight fetch.
    pub fn request_cancel(&self) {
        self.cancel_requested.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation has been requested.
    #[must_use]
    pub fn cancel_requested(&self) -> bool {
        self.cancel_requested.load(Ordering::SeqCst)
    }
}

impl<T, M> OperationHandle<T, M>
where
    T: Clone,
    M: Clone,
{
    /// The decoded success payload.
    ///
    /// # Errors
    ///
    /// - `PollError::NotReady` if the operation is not terminal yet.
    /// - `PollError::Failed` if the operation ended in a remote failure.
    pub fn result(&self) -> Result<T, PollError> {
        match &*self.state.read() {
            HandleState::Running { .. } => Err(PollError::NotReady),
            HandleState::Succeeded { result, .. } => Ok(result.clone()),
            HandleState::Failed { failure, .. } => Err(PollError::Failed(failure.clone())),
        }
    }

    /// The latest decoded metadata snapshot. `None` if no status carrying
    /// metadata has been applied and no initial metadata was supplied.
    /// Possibly stale; never fails.
    #[must_use]
    pub fn metadata(&self) -> Option<M> {
        match &*self.state.read() {
            HandleState::Running { metadata }
            | HandleState::Succeeded { metadata, .. }
            | HandleState::Failed { metadata, .. } => metadata.clone(),
        }
    }

    /// Applies one raw status to the handle, decoding payloads through the
    /// codec. Returns whether the handle is now terminal.
    ///
    /// Applying to an already-terminal handle is a no-op that reports `true`
    /// without invoking any decode hook.
    ///
    /// # Errors
    ///
    /// Returns the `DecodeError` of a malformed payload. The handle stays
    /// not-done in that case: a malformed payload is not a terminal state.
    pub fn apply(
        &self,
        status: &RawStatus,
        codec: &OperationCodec<T, M>,
    ) -> Result<bool, DecodeError> {
        let mut state = self.state.write();
        if state.is_done() {
            // Terminal states are frozen; decoding must not re-run.
            return Ok(true);
        }

        let metadata = match &status.metadata {
            Some(payload) => Some(codec.decode_metadata(payload)?),
            None => None,
        };

        if !status.done {
            if let Some(metadata) = metadata {
                *state = HandleState::Running {
                    metadata: Some(metadata),
                };
            }
            return Ok(false);
        }

        // Keep the freshest metadata across the terminal transition.
        let metadata = metadata.or_else(|| match &*state {
            HandleState::Running { metadata } => metadata.clone(),
            _ => None,
        });

        if let Some(failure) = status.remote_failure() {
            tracing::debug!(id = %self.id, code = failure.code, "operation failed remotely");
            *state = HandleState::Failed { failure, metadata };
        } else {
            // An absent result payload decodes as the empty slice, so
            // payload-less operations (a delete's empty result) flow through
            // the same hook and a successful terminal handle always holds a
            // result.
            let payload = status.result.as_deref().unwrap_or(&[]);
            let result = codec.decode_result(payload)?;
            tracing::debug!(id = %self.id, "operation succeeded");
            *state = HandleState::Succeeded { result, metadata };
        }
        Ok(true)
    }
}

impl<T, M> std::fmt::Debug for OperationHandle<T, M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match &*self.state.read() {
            HandleState::Running { .. } => "running",
            HandleState::Succeeded { .. } => "succeeded",
            HandleState::Failed { .. } => "failed",
        };
        f.debug_struct("OperationHandle")
            .field("id", &self.id)
            .field("state", &state)
            .field("cancel_requested", &self.cancel_requested())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

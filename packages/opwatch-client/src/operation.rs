//! The high-level surface a caller holds for one long-running operation.
//!
//! An RPC invoker builds an `Operation` right after the triggering call
//! returns, pairing the operation id with the method's codec, the transport,
//! and the polling configuration. Callers then pick their style: await
//! `wait()` for the decoded result, drive polls by hand with `refresh()`, or
//! follow progress through the `metadata_updates()` watch feed.

use std::sync::Arc;

use tokio::sync::watch;

use opwatch_core::{DecodeError, OperationCodec, OperationHandle, PollError, RawStatus};

use crate::poller::{OperationPoller, PollOptions};
use crate::transport::OperationTransport;

// ---------------------------------------------------------------------------
// Operation
// ---------------------------------------------------------------------------

/// One in-flight long-running operation.
///
/// `T` is the decoded success payload, `M` the decoded in-progress metadata.
pub struct Operation<T, M> {
    handle: Arc<OperationHandle<T, M>>,
    codec: OperationCodec<T, M>,
    transport: Arc<dyn OperationTransport>,
    options: PollOptions,
    metadata_tx: watch::Sender<Option<M>>,
}

impl<T, M> Operation<T, M>
where
    T: Clone + Send + Sync,
    M: Clone + Send + Sync,
{
    /// Wraps a freshly created server-side operation.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        codec: OperationCodec<T, M>,
        transport: Arc<dyn OperationTransport>,
        options: PollOptions,
    ) -> Self {
        let (metadata_tx, _) = watch::channel(None);
        Self {
            handle: Arc::new(OperationHandle::new(id)),
            codec,
            transport,
            options,
            metadata_tx,
        }
    }

    /// Wraps an operation whose triggering call already returned a first
    /// status -- possibly a terminal one, in which case `wait()` resolves
    /// without ever touching the transport.
    ///
    /// # Errors
    ///
    /// Returns the `DecodeError` if a payload in the initial status is
    /// malformed.
    pub fn with_initial_status(
        id: impl Into<String>,
        status: &RawStatus,
        codec: OperationCodec<T, M>,
        transport: Arc<dyn OperationTransport>,
        options: PollOptions,
    ) -> Result<Self, DecodeError> {
        let operation = Self::new(id, codec, transport, options);
        operation.handle.apply(status, &operation.codec)?;
        operation.metadata_tx.send_replace(operation.handle.metadata());
        Ok(operation)
    }

    /// The opaque identifier assigned by the remote service.
    #[must_use]
    pub fn id(&self) -> &str {
        self.handle.id()
    }

    /// Whether the operation is known to be terminal. Does not poll.
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.handle.is_done()
    }

    /// The latest decoded metadata snapshot, if any.
    #[must_use]
    pub fn metadata(&self) -> Option<M> {
        self.handle.metadata()
    }

    /// The decoded result, if the operation is already terminal.
    ///
    /// # Errors
    ///
    /// `PollError::NotReady` before completion, `PollError::Failed` on a
    /// remote failure.
    pub fn result(&self) -> Result<T, PollError> {
        self.handle.result()
    }

    /// The underlying handle, for callers that want to share or inspect it.
    #[must_use]
    pub fn handle(&self) -> Arc<OperationHandle<T, M>> {
        Arc::clone(&self.handle)
    }

    /// A feed of decoded metadata snapshots, updated on every poll tick that
    /// carries metadata. Receivers see the latest value immediately.
    #[must_use]
    pub fn metadata_updates(&self) -> watch::Receiver<Option<M>> {
        self.metadata_tx.subscribe()
    }

    /// Polls the operation to completion and returns the decoded result.
    ///
    /// # Errors
    ///
    /// Every `PollError` kind the poll loop can produce; see
    /// [`OperationPoller::poll`].
    pub async fn wait(&self) -> Result<T, PollError> {
        let poller = OperationPoller::new(Arc::clone(&self.transport), self.options.clone());
        poller
            .poll_with_progress(&self.handle, &self.codec, |metadata| {
                // send_replace stores the value even while no receiver is
                // subscribed, so late subscribers still see the snapshot.
                self.metadata_tx.send_replace(Some(metadata.clone()));
            })
            .await?;
        self.handle.result()
    }

    /// Fetches and applies the status once, with no backoff. Returns whether
    /// the operation is now terminal.
    ///
    /// # Errors
    ///
    /// `PollError::Transport` if the single fetch fails, `PollError::Decode`
    /// on a malformed payload.
    pub async fn refresh(&self) -> Result<bool, PollError> {
        let status = self
            .transport
            .get_operation(self.handle.id())
            .await
            .map_err(|source| PollError::Transport {
                attempts: 1,
                source,
            })?;
        let done = self.handle.apply(&status, &self.codec)?;
        if status.metadata.is_some() {
            self.metadata_tx.send_replace(self.handle.metadata());
        }
        Ok(done)
    }

    /// Requests cancellation: sets the cooperative flag any active poll
    /// observes, and issues the best-effort cancel RPC. A transport failure
    /// of the cancel call is logged and swallowed -- best-effort by
    /// contract; subsequent polls observe the actual outcome.
    pub async fn cancel(&self) {
        self.handle.request_cancel();
        if let Err(err) = self.transport.cancel_operation(self.handle.id()).await {
            tracing::warn!(id = %self.handle.id(), error = %err, "cancel request failed");
        }
    }
}

impl<T, M> std::fmt::Debug for Operation<T, M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Operation")
            .field("handle", &self.handle)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

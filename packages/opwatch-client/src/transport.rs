//! The transport seam the poll loop calls through.
//!
//! Everything wire-related -- channel creation, credentials, request
//! serialization, resource-name formatting -- lives behind this trait. The
//! poller only ever asks two questions: "what is the status of operation X"
//! and "please try to cancel operation X". Keeping the seam this narrow is
//! what makes the loop fully testable against scripted fakes.

use async_trait::async_trait;

use opwatch_core::RawStatus;

/// Access to the remote operations surface for one service.
///
/// Implementations must be safe for concurrent calls across different
/// operation ids; concurrent calls for the *same* id only occur if a caller
/// violates the one-active-poll-per-handle precondition.
#[async_trait]
pub trait OperationTransport: Send + Sync {
    /// Fetches the current raw status of the operation named `id`.
    ///
    /// # Errors
    ///
    /// Returns any transport-level failure (connection refused, deadline,
    /// malformed frame). The poll loop treats such failures as retryable.
    async fn get_operation(&self, id: &str) -> anyhow::Result<RawStatus>;

    /// Asks the remote service to cancel the operation named `id`.
    ///
    /// Best-effort by contract: a successful return does not mean the
    /// operation stopped, only that the request was accepted. Subsequent
    /// polls observe the outcome.
    ///
    /// # Errors
    ///
    /// Returns any transport-level failure.
    async fn cancel_operation(&self, id: &str) -> anyhow::Result<()>;
}

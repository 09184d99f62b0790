//! `opwatch` Client — async long-running-operation polling over a narrow transport seam.
//!
//! The flow mirrors how a generated RPC client hands out operations:
//!
//! 1. The RPC invoker performs the triggering call and receives an
//!    operation id (and possibly a first status).
//! 2. It wraps the id in an [`Operation`] together with the method's
//!    [`OperationCodec`](opwatch_core::OperationCodec), the shared
//!    [`OperationTransport`], and [`PollOptions`].
//! 3. The caller awaits [`Operation::wait`], drives polls by hand with
//!    [`Operation::refresh`], or follows progress via
//!    [`Operation::metadata_updates`].

pub mod operation;
pub mod poller;
pub mod testing;
pub mod transport;

pub use operation::Operation;
pub use poller::{OperationPoller, PollOptions};
pub use transport::OperationTransport;

// Core types callers need alongside the client surface.
pub use opwatch_core::{
    BackoffSchedule, DecodeError, ExponentialBackoff, OperationCodec, OperationHandle, PollError,
    RawStatus, RemoteFailure,
};

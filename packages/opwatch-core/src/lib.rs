//! `opwatch` Core — operation handle state machine, decode hooks, backoff schedule.

pub mod backoff;
pub mod codec;
pub mod error;
pub mod handle;
pub mod status;

pub use backoff::{BackoffSchedule, ExponentialBackoff};
pub use codec::OperationCodec;
pub use error::{DecodeError, PollError};
pub use handle::OperationHandle;
pub use status::{RawStatus, RemoteFailure};

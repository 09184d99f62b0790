//! Transport-boundary status records for long-running operations.
//!
//! A `RawStatus` is what the transport hands back for a single poll of an
//! operation: a done flag plus undecoded payload bytes and an optional remote
//! error. The record is deliberately payload-agnostic -- decoding into typed
//! values is the job of the caller-supplied `OperationCodec` hooks.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// RawStatus
// ---------------------------------------------------------------------------

/// Undecoded status of a long-running operation, as reported by the transport.
///
/// Exactly one poll produces exactly one `RawStatus`. Payload fields stay as
/// raw bytes; `error_code`/`error_message` are only meaningful on a terminal
/// status (`done == true`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawStatus {
    /// Whether the operation has reached a terminal state server-side.
    pub done: bool,
    /// Encoded success payload. Present only on a terminal, successful status.
    #[serde(default, skip_serializing_if = "Option::is_none", with = "serde_bytes")]
    pub result: Option<Vec<u8>>,
    /// Encoded in-progress metadata. May be present on any status.
    #[serde(default, skip_serializing_if = "Option::is_none", with = "serde_bytes")]
    pub metadata: Option<Vec<u8>>,
    /// Remote error code. Present only on a terminal, failed status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<i32>,
    /// Remote error message accompanying `error_code`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl RawStatus {
    /// A status for an operation that is still running, with no metadata.
    #[must_use]
    pub fn pending() -> Self {
        Self::default()
    }

    /// A still-running status carrying encoded metadata.
    #[must_use]
    pub fn pending_with_metadata(metadata: impl Into<Vec<u8>>) -> Self {
        Self {
            metadata: Some(metadata.into()),
            ..Self::default()
        }
    }

    /// A terminal, successful status carrying the encoded result payload.
    #[must_use]
    pub fn succeeded(result: impl Into<Vec<u8>>) -> Self {
        Self {
            done: true,
            result: Some(result.into()),
            ..Self::default()
        }
    }

    /// A terminal, failed status carrying the remote error.
    #[must_use]
    pub fn failed(code: i32, message: impl Into<String>) -> Self {
        Self {
            done: true,
            error_code: Some(code),
            error_message: Some(message.into()),
            ..Self::default()
        }
    }

    /// Extracts the remote failure from a terminal status, if any.
    ///
    /// Returns `None` for non-terminal statuses even if an error code is
    /// (erroneously) present: failure is an *outcome*, and outcomes only
    /// exist once `done` is true.
    #[must_use]
    pub fn remote_failure(&self) -> Option<RemoteFailure> {
        if !self.done {
            return None;
        }
        self.error_code.map(|code| RemoteFailure {
            code,
            message: self.error_message.clone().unwrap_or_default(),
        })
    }
}

// ---------------------------------------------------------------------------
// RemoteFailure
// ---------------------------------------------------------------------------

/// The operation's own failure outcome, as reported by the remote service.
///
/// This is not a client-side fault: the poll succeeded in observing that the
/// operation itself failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteFailure {
    /// Remote status code.
    pub code: i32,
    /// Human-readable message; empty if the service supplied none.
    pub message: String,
}

impl std::fmt::Display for RemoteFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.message.is_empty() {
            write!(f, "code {}", self.code)
        } else {
            write!(f, "code {}: {}", self.code, self.message)
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

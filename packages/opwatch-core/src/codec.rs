//! Caller-supplied decode hooks for operation payloads.
//!
//! Each long-running method declares its own result and metadata payload
//! shapes; the matching pair of decoders travels with the operation as an
//! `OperationCodec` record instead of living in a process-wide registry
//! keyed by method name. Decoders must be deterministic and side-effect-free.

use std::sync::Arc;

use serde::de::DeserializeOwned;

use crate::error::DecodeError;

type DecodeFn<T> = Arc<dyn Fn(&[u8]) -> Result<T, DecodeError> + Send + Sync>;

// ---------------------------------------------------------------------------
// OperationCodec
// ---------------------------------------------------------------------------

/// The decode-hook pair for one kind of long-running operation.
///
/// Cheap to clone: both hooks are behind `Arc`, so a codec can be shared by
/// every operation a method spawns.
pub struct OperationCodec<T, M> {
    decode_result: DecodeFn<T>,
    decode_metadata: DecodeFn<M>,
}

impl<T, M> OperationCodec<T, M> {
    /// Builds a codec from the two decode hooks.
    pub fn new<F, G>(decode_result: F, decode_metadata: G) -> Self
    where
        F: Fn(&[u8]) -> Result<T, DecodeError> + Send + Sync + 'static,
        G: Fn(&[u8]) -> Result<M, DecodeError> + Send + Sync + 'static,
    {
        Self {
            decode_result: Arc::new(decode_result),
            decode_metadata: Arc::new(decode_metadata),
        }
    }

    /// Decodes a result payload.
    ///
    /// # Errors
    ///
    /// Returns the hook's `DecodeError` if the payload is malformed.
    pub fn decode_result(&self, payload: &[u8]) -> Result<T, DecodeError> {
        (self.decode_result)(payload)
    }

    /// Decodes a metadata payload.
    ///
    /// # Errors
    ///
    /// Returns the hook's `DecodeError` if the payload is malformed.
    pub fn decode_metadata(&self, payload: &[u8]) -> Result<M, DecodeError> {
        (self.decode_metadata)(payload)
    }
}

impl<T, M> OperationCodec<T, M>
where
    T: DeserializeOwned,
    M: DeserializeOwned,
{
    /// A codec for operations whose payloads are JSON on the wire.
    #[must_use]
    pub fn json() -> Self {
        Self::new(
            |payload| {
                serde_json::from_slice(payload).map_err(|err| DecodeError::result(err.to_string()))
            },
            |payload| {
                serde_json::from_slice(payload)
                    .map_err(|err| DecodeError::metadata(err.to_string()))
            },
        )
    }
}

impl<T, M> Clone for OperationCodec<T, M> {
    fn clone(&self) -> Self {
        Self {
            decode_result: Arc::clone(&self.decode_result),
            decode_metadata: Arc::clone(&self.decode_metadata),
        }
    }
}

impl<T, M> std::fmt::Debug for OperationCodec<T, M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // The hooks are opaque closures; there is nothing useful to print.
        f.debug_struct("OperationCodec").finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! Scripted transports for exercising the poll loop without a real service.
//!
//! Every test substitutes the `OperationTransport` seam and asserts on
//! recorded calls. Kept as a regular module so downstream crates can script
//! their own operation flows in integration tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use opwatch_core::RawStatus;

use crate::transport::OperationTransport;

// ---------------------------------------------------------------------------
// ScriptedTransport
// ---------------------------------------------------------------------------

/// Transport that replays a fixed script of `get_operation` outcomes.
///
/// Outcomes are served in order, one per fetch; running past the end of the
/// script is an error, so a test that expects N fetches fails loudly on the
/// N+1th instead of looping forever. Cancel requests always succeed and are
/// only counted.
pub struct ScriptedTransport {
    script: Mutex<VecDeque<anyhow::Result<RawStatus>>>,
    fetches: AtomicU32,
    cancels: AtomicU32,
}

impl ScriptedTransport {
    /// Builds a transport that serves the given outcomes in order.
    pub fn new(script: impl IntoIterator<Item = anyhow::Result<RawStatus>>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            fetches: AtomicU32::new(0),
            cancels: AtomicU32::new(0),
        }
    }

    /// Number of `get_operation` calls observed so far.
    #[must_use]
    pub fn fetch_count(&self) -> u32 {
        self.fetches.load(Ordering::SeqCst)
    }

    /// Number of `cancel_operation` calls observed so far.
    #[must_use]
    pub fn cancel_count(&self) -> u32 {
        self.cancels.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OperationTransport for ScriptedTransport {
    async fn get_operation(&self, id: &str) -> anyhow::Result<RawStatus> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.script
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(anyhow::anyhow!("scripted transport exhausted for {id}")))
    }

    async fn cancel_operation(&self, _id: &str) -> anyhow::Result<()> {
        self.cancels.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// NeverDone
// ---------------------------------------------------------------------------

/// Transport whose operation never completes: every fetch reports a pending
/// status. Useful for timeout and cancellation tests.
#[derive(Default)]
pub struct NeverDone {
    fetches: AtomicU32,
    cancels: AtomicU32,
}

impl NeverDone {
    /// Creates the transport with zeroed counters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `get_operation` calls observed so far.
    #[must_use]
    pub fn fetch_count(&self) -> u32 {
        self.fetches.load(Ordering::SeqCst)
    }

    /// Number of `cancel_operation` calls observed so far.
    #[must_use]
    pub fn cancel_count(&self) -> u32 {
        self.cancels.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OperationTransport for NeverDone {
    async fn get_operation(&self, _id: &str) -> anyhow::Result<RawStatus> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(RawStatus::pending())
    }

    async fn cancel_operation(&self, _id: &str) -> anyhow::Result<()> {
        self.cancels.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

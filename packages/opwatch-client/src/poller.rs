//! The poll loop that drives a pending operation to a terminal state.
//!
//! One `poll` call is one polling session: fetch the raw status, apply it to
//! the handle, and either resolve, give up (budget), or back off and repeat.
//! Transport errors are retried on the same backoff schedule as "still
//! running" responses; they only differ in which error the session ends with
//! once the budget runs out.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{sleep, Instant};

use opwatch_core::{ExponentialBackoff, OperationCodec, OperationHandle, PollError};

use crate::transport::OperationTransport;

// ---------------------------------------------------------------------------
// PollOptions
// ---------------------------------------------------------------------------

/// Per-session polling configuration.
///
/// The defaults poll forever: no attempt cap and no overall deadline. Both
/// budgets are opt-in because a long-running operation's duration is usually
/// unknown in advance.
#[derive(Debug, Clone, Default)]
pub struct PollOptions {
    /// Backoff schedule between polls.
    pub backoff: ExponentialBackoff,
    /// Overall wall-clock budget for the polling session. Exceeding it is a
    /// client-side giving-up, not a server terminal state.
    pub total_timeout: Option<Duration>,
    /// Maximum number of status fetches before giving up.
    pub max_attempts: Option<u32>,
}

// ---------------------------------------------------------------------------
// OperationPoller
// ---------------------------------------------------------------------------

/// Drives pending operation handles to completion over a transport.
///
/// Each `poll` call runs independently; polling *different* handles
/// concurrently is fine. The same handle must not be polled by two callers
/// at once -- that is a caller-side precondition, not enforced here.
#[derive(Clone)]
pub struct OperationPoller {
    transport: Arc<dyn OperationTransport>,
    options: PollOptions,
}

impl OperationPoller {
    /// Creates a poller over the given transport.
    #[must_use]
    pub fn new(transport: Arc<dyn OperationTransport>, options: PollOptions) -> Self {
        Self { transport, options }
    }

    /// The poller's configuration.
    #[must_use]
    pub fn options(&self) -> &PollOptions {
        &self.options
    }

    /// Polls until the handle is terminal or the session gives up.
    ///
    /// Polling an already-terminal handle returns immediately without
    /// touching the transport.
    ///
    /// # Errors
    ///
    /// - `PollError::Failed` if the operation ended in a remote failure.
    /// - `PollError::Decode` on a malformed terminal payload (no retry).
    /// - `PollError::Cancelled` once a cancellation request is observed.
    /// - `PollError::Timeout` / `PollError::Transport` when the attempt or
    ///   time budget runs out (pending vs. fetch-failure on the last attempt).
    pub async fn poll<T, M>(
        &self,
        handle: &OperationHandle<T, M>,
        codec: &OperationCodec<T, M>,
    ) -> Result<(), PollError>
    where
        T: Clone,
        M: Clone,
    {
        self.poll_with_progress(handle, codec, |_| {}).await
    }

    /// Same as [`poll`](Self::poll), invoking `on_metadata` after every
    /// applied status that carried a metadata payload.
    ///
    /// # Errors
    ///
    /// See [`poll`](Self::poll).
    pub async fn poll_with_progress<T, M, F>(
        &self,
        handle: &OperationHandle<T, M>,
        codec: &OperationCodec<T, M>,
        mut on_metadata: F,
    ) -> Result<(), PollError>
    where
        T: Clone,
        M: Clone,
        F: FnMut(&M) + Send,
    {
        if handle.is_done() {
            return Self::outcome(handle);
        }

        let started = Instant::now();
        let mut schedule = self.options.backoff.schedule();
        let mut attempts: u32 = 0;
        let mut last_transport_err: Option<anyhow::Error> = None;

        loop {
            if handle.cancel_requested() {
                return Err(PollError::Cancelled);
            }

            attempts += 1;
            match self.transport.get_operation(handle.id()).await {
                Ok(status) => {
                    last_transport_err = None;
                    let done = handle.apply(&status, codec)?;
                    if status.metadata.is_some() {
                        if let Some(metadata) = handle.metadata() {
                            on_metadata(&metadata);
                        }
                    }
                    if done {
                        return Self::outcome(handle);
                    }
                    tracing::debug!(id = %handle.id(), attempt = attempts, "operation still pending");
                }
                Err(err) => {
                    tracing::warn!(
                        id = %handle.id(),
                        attempt = attempts,
                        error = %err,
                        "status fetch failed; will retry"
                    );
                    last_transport_err = Some(err);
                }
            }

            // Cancellation is re-checked after the fetch so a request made
            // mid-flight skips the upcoming sleep.
            if handle.cancel_requested() {
                return Err(PollError::Cancelled);
            }

            if self.budget_exhausted(attempts, started) {
                return Err(Self::give_up(attempts, started, last_transport_err));
            }

            let delay = schedule.next_delay();
            if self.sleep_would_overrun(started, delay) {
                // Sleeping past the deadline only to time out on waking helps
                // nobody; give up now.
                return Err(Self::give_up(attempts, started, last_transport_err));
            }
            sleep(delay).await;
        }
    }

    fn budget_exhausted(&self, attempts: u32, started: Instant) -> bool {
        self.options
            .max_attempts
            .is_some_and(|max| attempts >= max)
            || self
                .options
                .total_timeout
                .is_some_and(|limit| started.elapsed() >= limit)
    }

    fn sleep_would_overrun(&self, started: Instant, delay: Duration) -> bool {
        self.options
            .total_timeout
            .is_some_and(|limit| started.elapsed() + delay >= limit)
    }

    /// Maps the handle's terminal state to the session outcome. The last
    /// attempt decides the error kind on give-up: a failed fetch means we
    /// couldn't even ask, a pending status means the server is just slow.
    fn give_up(attempts: u32, started: Instant, last_err: Option<anyhow::Error>) -> PollError {
        match last_err {
            Some(source) => PollError::Transport { attempts, source },
            None => PollError::Timeout {
                attempts,
                elapsed: started.elapsed(),
            },
        }
    }

    fn outcome<T, M>(handle: &OperationHandle<T, M>) -> Result<(), PollError>
    where
        T: Clone,
        M: Clone,
    {
        match handle.failure() {
            Some(failure) => Err(PollError::Failed(failure)),
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for OperationPoller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperationPoller")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use opwatch_core::{DecodeError, RawStatus};

    use super::*;
    use crate::testing::{NeverDone, ScriptedTransport};

    fn utf8_codec() -> OperationCodec<String, String> {
        OperationCodec::new(
            |payload| Ok(String::from_utf8_lossy(payload).into_owned()),
            |payload| Ok(String::from_utf8_lossy(payload).into_owned()),
        )
    }

    fn options(max_attempts: Option<u32>, total_timeout: Option<Duration>) -> PollOptions {
        PollOptions {
            max_attempts,
            total_timeout,
            ..PollOptions::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn immediate_success_polls_once_with_zero_sleeps() {
        let transport = Arc::new(ScriptedTransport::new([Ok(RawStatus::succeeded(
            b"ready".to_vec(),
        ))]));
        let poller = OperationPoller::new(transport.clone(), PollOptions::default());
        let handle = OperationHandle::new("op-a");

        let start = Instant::now();
        poller.poll(&handle, &utf8_codec()).await.unwrap();

        assert_eq!(start.elapsed(), Duration::ZERO, "no sleeps on first-try success");
        assert_eq!(transport.fetch_count(), 1);
        assert_eq!(handle.result().unwrap(), "ready");
    }

    #[tokio::test(start_paused = true)]
    async fn two_pending_then_success_sleeps_initial_then_scaled() {
        let transport = Arc::new(ScriptedTransport::new([
            Ok(RawStatus::pending()),
            Ok(RawStatus::pending()),
            Ok(RawStatus::succeeded(b"ready".to_vec())),
        ]));
        let poller = OperationPoller::new(transport.clone(), PollOptions::default());
        let handle = OperationHandle::new("op-b");

        let start = Instant::now();
        poller.poll(&handle, &utf8_codec()).await.unwrap();

        // Exactly two sleeps: 500ms, then 500 * 1.5 = 750ms.
        assert_eq!(start.elapsed(), Duration::from_millis(1250));
        assert_eq!(transport.fetch_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn always_pending_times_out_after_max_attempts() {
        let transport = Arc::new(NeverDone::new());
        let poller = OperationPoller::new(transport.clone(), options(Some(3), None));
        let handle: OperationHandle<String, String> = OperationHandle::new("op-c");

        let err = poller.poll(&handle, &utf8_codec()).await.unwrap_err();

        match err {
            PollError::Timeout { attempts, .. } => assert_eq!(attempts, 3),
            other => panic!("expected Timeout, got {other:?}"),
        }
        assert_eq!(transport.fetch_count(), 3, "exactly three fetch attempts");
        assert!(!handle.is_done(), "client gave up; operation is not terminal");
    }

    #[tokio::test(start_paused = true)]
    async fn remote_failure_rejects_with_decoded_failure() {
        let transport = Arc::new(ScriptedTransport::new([Ok(RawStatus::failed(1, "x"))]));
        let poller = OperationPoller::new(transport, PollOptions::default());
        let handle: OperationHandle<String, String> = OperationHandle::new("op-d");

        let err = poller.poll(&handle, &utf8_codec()).await.unwrap_err();

        match err {
            PollError::Failed(failure) => {
                assert_eq!(failure.code, 1);
                assert_eq!(failure.message, "x");
            }
            other => panic!("expected Failed, got {other:?}"),
        }
        assert!(handle.is_done());
    }

    #[tokio::test(start_paused = true)]
    async fn decode_error_is_not_retried() {
        let transport = Arc::new(ScriptedTransport::new([Ok(RawStatus::succeeded(
            b"junk".to_vec(),
        ))]));
        let codec: OperationCodec<String, String> = OperationCodec::new(
            |_| Err(DecodeError::result("semantically invalid")),
            |payload| Ok(String::from_utf8_lossy(payload).into_owned()),
        );
        let poller = OperationPoller::new(transport.clone(), PollOptions::default());
        let handle = OperationHandle::new("op-e");

        let err = poller.poll(&handle, &codec).await.unwrap_err();

        assert!(matches!(err, PollError::Decode(_)), "got {err:?}");
        assert_eq!(transport.fetch_count(), 1, "no retry on malformed payload");
        assert!(!handle.is_done());
    }

    #[tokio::test(start_paused = true)]
    async fn transport_errors_are_retried_then_surfaced() {
        let transport = Arc::new(ScriptedTransport::new([
            Err(anyhow::anyhow!("connection refused")),
            Err(anyhow::anyhow!("connection refused")),
            Err(anyhow::anyhow!("connection refused")),
        ]));
        let poller = OperationPoller::new(transport.clone(), options(Some(3), None));
        let handle: OperationHandle<String, String> = OperationHandle::new("op-f");

        let err = poller.poll(&handle, &utf8_codec()).await.unwrap_err();

        match err {
            PollError::Transport { attempts, .. } => assert_eq!(attempts, 3),
            other => panic!("expected Transport, got {other:?}"),
        }
        assert_eq!(transport.fetch_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn transport_error_then_success_recovers() {
        let transport = Arc::new(ScriptedTransport::new([
            Err(anyhow::anyhow!("flaky")),
            Ok(RawStatus::succeeded(b"ready".to_vec())),
        ]));
        let poller = OperationPoller::new(transport.clone(), PollOptions::default());
        let handle = OperationHandle::new("op-g");

        poller.poll(&handle, &utf8_codec()).await.unwrap();

        assert_eq!(transport.fetch_count(), 2);
        assert_eq!(handle.result().unwrap(), "ready");
    }

    #[tokio::test(start_paused = true)]
    async fn budget_exhausted_on_pending_status_is_timeout_not_transport() {
        // A transport error followed by a successful "still pending" fetch:
        // the last attempt decides the error kind.
        let transport = Arc::new(ScriptedTransport::new([
            Err(anyhow::anyhow!("flaky")),
            Ok(RawStatus::pending()),
        ]));
        let poller = OperationPoller::new(transport, options(Some(2), None));
        let handle: OperationHandle<String, String> = OperationHandle::new("op-h");

        let err = poller.poll(&handle, &utf8_codec()).await.unwrap_err();
        assert!(matches!(err, PollError::Timeout { attempts: 2, .. }), "got {err:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_before_poll_issues_no_fetch() {
        let transport = Arc::new(NeverDone::new());
        let poller = OperationPoller::new(transport.clone(), PollOptions::default());
        let handle: OperationHandle<String, String> = OperationHandle::new("op-i");
        handle.request_cancel();

        let err = poller.poll(&handle, &utf8_codec()).await.unwrap_err();

        assert!(matches!(err, PollError::Cancelled));
        assert_eq!(transport.fetch_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_mid_poll_stops_before_the_next_fetch() {
        let transport = Arc::new(NeverDone::new());
        let poller = OperationPoller::new(transport.clone(), PollOptions::default());
        let handle: Arc<OperationHandle<String, String>> = Arc::new(OperationHandle::new("op-j"));

        let canceller = {
            let handle = Arc::clone(&handle);
            tokio::spawn(async move {
                // Fires during the poller's first backoff sleep.
                tokio::time::sleep(Duration::from_millis(100)).await;
                handle.request_cancel();
            })
        };

        let err = poller.poll(&handle, &utf8_codec()).await.unwrap_err();
        canceller.await.unwrap();

        assert!(matches!(err, PollError::Cancelled));
        assert_eq!(
            transport.fetch_count(),
            1,
            "no further fetch beyond the one already completed"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn no_sleep_past_the_overall_deadline() {
        let transport = Arc::new(NeverDone::new());
        let poller = OperationPoller::new(
            transport.clone(),
            options(None, Some(Duration::from_secs(1))),
        );
        let handle: OperationHandle<String, String> = OperationHandle::new("op-k");

        let start = Instant::now();
        let err = poller.poll(&handle, &utf8_codec()).await.unwrap_err();

        // Fetches at t=0 and t=500ms; the next delay (750ms) would overrun
        // the 1s deadline, so the session gives up without sleeping it off.
        assert!(matches!(err, PollError::Timeout { attempts: 2, .. }), "got {err:?}");
        assert_eq!(start.elapsed(), Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn polling_a_terminal_handle_is_a_no_op() {
        let transport = Arc::new(NeverDone::new());
        let poller = OperationPoller::new(transport.clone(), PollOptions::default());
        let handle = OperationHandle::new("op-l");
        handle
            .apply(&RawStatus::succeeded(b"ready".to_vec()), &utf8_codec())
            .unwrap();

        poller.poll(&handle, &utf8_codec()).await.unwrap();
        assert_eq!(transport.fetch_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn polling_a_failed_handle_reports_the_failure() {
        let transport = Arc::new(NeverDone::new());
        let poller = OperationPoller::new(transport.clone(), PollOptions::default());
        let handle: OperationHandle<String, String> = OperationHandle::new("op-m");
        handle
            .apply(&RawStatus::failed(9, "gone"), &utf8_codec())
            .unwrap();

        let err = poller.poll(&handle, &utf8_codec()).await.unwrap_err();
        assert!(matches!(err, PollError::Failed(f) if f.code == 9));
        assert_eq!(transport.fetch_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn progress_callback_sees_each_metadata_update() {
        let transport = Arc::new(ScriptedTransport::new([
            Ok(RawStatus::pending_with_metadata(b"10%".to_vec())),
            Ok(RawStatus::pending()),
            Ok(RawStatus::pending_with_metadata(b"90%".to_vec())),
            Ok(RawStatus::succeeded(b"ready".to_vec())),
        ]));
        let poller = OperationPoller::new(transport, PollOptions::default());
        let handle = OperationHandle::new("op-n");

        let mut seen = Vec::new();
        poller
            .poll_with_progress(&handle, &utf8_codec(), |metadata: &String| {
                seen.push(metadata.clone());
            })
            .await
            .unwrap();

        // The metadata-less tick does not re-announce the stale snapshot.
        assert_eq!(seen, vec!["10%".to_string(), "90%".to_string()]);
    }
}

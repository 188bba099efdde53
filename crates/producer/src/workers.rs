use rollup_sync_primitives::{BlockRange, RollupInfoChunk};
use rollup_sync_providers::{L1ProviderError, L1RollupInfoProvider};
use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};
use tokio::{sync::mpsc, task::JoinSet};
use tokio_util::sync::CancellationToken;

/// The delay between head request attempts.
const HEAD_RETRY_DELAY: Duration = Duration::from_millis(50);

/// The result of one range fetch. Every response carries the originating
/// range so the dispatcher can reconcile it against its in-flight set.
#[derive(Debug)]
pub(crate) struct WorkerResponse {
    /// The range the fetch was dispatched for.
    pub(crate) range: BlockRange,
    /// The fetched rollup info, or the error that ended the fetch.
    pub(crate) result: Result<RollupInfoChunk, L1ProviderError>,
}

/// An error occurring at the worker pool.
#[derive(Debug, thiserror::Error)]
pub enum WorkerPoolError {
    /// Every worker is busy with a previously accepted job.
    #[error("all workers are busy")]
    NoFreeWorker,
    /// The L1 head could not be retrieved.
    #[error("L1 head unavailable after {attempts} attempts")]
    HeadUnavailable {
        /// The number of attempts made.
        attempts: usize,
        /// The error of the last attempt, `None` if it timed out.
        #[source]
        source: Option<L1ProviderError>,
    },
    /// The request was cancelled.
    #[error("worker pool request cancelled")]
    Cancelled,
}

/// A pool of workers, each owning one independent L1 client.
///
/// Accepted block-range jobs execute concurrently; their results are
/// multiplexed onto a single response channel in completion order, which
/// carries no relation to dispatch order. Per-range errors are surfaced as
/// responses and never retried here: retrying is dispatcher policy, so the
/// sync status can re-issue the failed range cleanly.
#[derive(Debug)]
pub(crate) struct WorkerPool<P> {
    slots: Vec<WorkerSlot<P>>,
    response_tx: mpsc::Sender<WorkerResponse>,
    response_rx: Option<mpsc::Receiver<WorkerResponse>>,
    tasks: JoinSet<()>,
    cancel: CancellationToken,
}

#[derive(Debug)]
struct WorkerSlot<P> {
    provider: Arc<P>,
    busy: Arc<AtomicBool>,
}

impl<P: L1RollupInfoProvider + 'static> WorkerPool<P> {
    /// Returns a new [`WorkerPool`] over the provided L1 clients.
    pub(crate) fn new(providers: Vec<P>, cancel: CancellationToken) -> Self {
        debug_assert!(!providers.is_empty(), "provider set is validated at construction");
        let (response_tx, response_rx) = mpsc::channel(providers.len().max(1));
        let slots = providers
            .into_iter()
            .map(|provider| WorkerSlot {
                provider: Arc::new(provider),
                busy: Arc::new(AtomicBool::new(false)),
            })
            .collect();
        Self { slots, response_tx, response_rx: Some(response_rx), tasks: JoinSet::new(), cancel }
    }

    /// Takes the receiving end of the multiplexed response channel. Yields a
    /// value on the first call only.
    pub(crate) fn take_response_receiver(&mut self) -> Option<mpsc::Receiver<WorkerResponse>> {
        self.response_rx.take()
    }

    /// Hands `range` to any free worker, without blocking. The fetch result
    /// is delivered on the response channel when the job completes.
    pub(crate) fn request_range(&mut self, range: BlockRange) -> Result<(), WorkerPoolError> {
        // reap completed jobs so the task set stays bounded.
        while self.tasks.try_join_next().is_some() {}

        let slot = self
            .slots
            .iter()
            .find(|slot| !slot.busy.load(Ordering::Acquire))
            .ok_or(WorkerPoolError::NoFreeWorker)?;
        slot.busy.store(true, Ordering::Release);

        let provider = slot.provider.clone();
        let busy = slot.busy.clone();
        let response_tx = self.response_tx.clone();
        let cancel = self.cancel.clone();
        self.tasks.spawn(async move {
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(L1ProviderError::Cancelled),
                result = provider.get_rollup_info_by_range(range) => result,
            };
            // the client call has returned, so the slot frees up before the
            // response is posted: the channel send orders the store ahead of
            // the dispatch that the response wakes.
            busy.store(false, Ordering::Release);
            // responses are worthless after cancellation, the consumer side
            // is shutting down.
            if !cancel.is_cancelled() {
                let _ = response_tx.send(WorkerResponse { range, result }).await;
            }
        });
        Ok(())
    }

    /// Retrieves the L1 head, retrying transient failures up to
    /// `max_retries` attempts, each bounded by `timeout`. Attempts rotate
    /// over the pool's clients. Cancellation is honored between attempts.
    pub(crate) async fn request_head(
        &self,
        timeout: Duration,
        max_retries: usize,
    ) -> Result<u64, WorkerPoolError> {
        let mut last_error = None;
        for attempt in 0..max_retries.max(1) {
            if self.cancel.is_cancelled() {
                return Err(WorkerPoolError::Cancelled);
            }
            if attempt > 0 {
                tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => return Err(WorkerPoolError::Cancelled),
                    _ = tokio::time::sleep(HEAD_RETRY_DELAY) => {}
                }
            }

            let provider = &self.slots[attempt % self.slots.len()].provider;
            let attempt_result = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(WorkerPoolError::Cancelled),
                result = tokio::time::timeout(timeout, provider.get_head()) => result,
            };
            match attempt_result {
                Ok(Ok(head)) => return Ok(head),
                Ok(Err(error)) if error.is_transient() => {
                    tracing::debug!(
                        target: "rollup_sync::workers",
                        attempt,
                        ?error,
                        "transient error retrieving the L1 head, retrying"
                    );
                    last_error = Some(error);
                }
                Ok(Err(error)) => {
                    return Err(WorkerPoolError::HeadUnavailable {
                        attempts: attempt + 1,
                        source: Some(error),
                    })
                }
                Err(_elapsed) => {
                    tracing::debug!(
                        target: "rollup_sync::workers",
                        attempt,
                        ?timeout,
                        "timed out retrieving the L1 head, retrying"
                    );
                    last_error = None;
                }
            }
        }
        Err(WorkerPoolError::HeadUnavailable {
            attempts: max_retries.max(1),
            source: last_error,
        })
    }

    /// Waits until every accepted job has produced a response.
    pub(crate) async fn wait_idle(&mut self) {
        while self.tasks.join_next().await.is_some() {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rollup_sync_providers::test_utils::MockL1Provider;

    fn range(from: u64, to: u64) -> BlockRange {
        BlockRange::new(from, to).unwrap()
    }

    #[tokio::test]
    async fn test_rejects_range_when_all_workers_busy() {
        let provider = MockL1Provider::default();
        provider.script_range(
            range(0, 4),
            Duration::from_secs(5),
            Ok(rollup_sync_providers::test_utils::chunk(range(0, 4))),
        );
        let mut pool = WorkerPool::new(vec![provider], CancellationToken::new());

        pool.request_range(range(0, 4)).unwrap();
        assert!(matches!(
            pool.request_range(range(5, 9)),
            Err(WorkerPoolError::NoFreeWorker)
        ));
    }

    #[tokio::test]
    async fn test_multiplexes_responses_of_all_workers() {
        let providers = vec![MockL1Provider::default(), MockL1Provider::default()];
        let mut pool = WorkerPool::new(providers, CancellationToken::new());
        let mut responses = pool.take_response_receiver().unwrap();

        pool.request_range(range(0, 4)).unwrap();
        pool.request_range(range(5, 9)).unwrap();

        let mut ranges =
            vec![responses.recv().await.unwrap().range, responses.recv().await.unwrap().range];
        ranges.sort();
        assert_eq!(ranges, vec![range(0, 4), range(5, 9)]);
        pool.wait_idle().await;
    }

    #[tokio::test]
    async fn test_worker_frees_up_after_response() {
        let provider = MockL1Provider::default();
        let mut pool = WorkerPool::new(vec![provider], CancellationToken::new());
        let mut responses = pool.take_response_receiver().unwrap();

        pool.request_range(range(0, 4)).unwrap();
        responses.recv().await.unwrap();
        pool.wait_idle().await;

        pool.request_range(range(5, 9)).unwrap();
        assert_eq!(responses.recv().await.unwrap().range, range(5, 9));
    }

    #[tokio::test]
    async fn test_head_request_retries_transient_errors() {
        let provider = Arc::new(MockL1Provider::default());
        provider.push_head_error(L1ProviderError::Transient("connection reset".to_string()));
        provider.push_head(42);
        let pool = WorkerPool::new(vec![provider.clone()], CancellationToken::new());

        let head = pool.request_head(Duration::from_secs(1), 5).await.unwrap();
        assert_eq!(head, 42);
        assert_eq!(provider.head_requests(), 2);
    }

    #[tokio::test]
    async fn test_head_request_fails_fast_on_permanent_error() {
        let provider = Arc::new(MockL1Provider::default());
        provider.push_head_error(L1ProviderError::Permanent("wrong chain".to_string()));
        let pool = WorkerPool::new(vec![provider.clone()], CancellationToken::new());

        let result = pool.request_head(Duration::from_secs(1), 5).await;
        assert!(matches!(
            result,
            Err(WorkerPoolError::HeadUnavailable { attempts: 1, .. })
        ));
        assert_eq!(provider.head_requests(), 1);
    }

    #[tokio::test]
    async fn test_head_request_exhausts_retries() {
        let provider = Arc::new(MockL1Provider::default());
        for _ in 0..3 {
            provider.push_head_error(L1ProviderError::Transient("unreachable".to_string()));
        }
        let pool = WorkerPool::new(vec![provider.clone()], CancellationToken::new());

        let result = pool.request_head(Duration::from_millis(100), 3).await;
        assert!(matches!(
            result,
            Err(WorkerPoolError::HeadUnavailable { attempts: 3, .. })
        ));
        assert_eq!(provider.head_requests(), 3);
    }

    #[tokio::test]
    async fn test_cancellation_interrupts_in_flight_jobs() {
        let provider = MockL1Provider::default();
        provider.script_range(
            range(0, 4),
            Duration::from_secs(60),
            Ok(rollup_sync_providers::test_utils::chunk(range(0, 4))),
        );
        let cancel = CancellationToken::new();
        let mut pool = WorkerPool::new(vec![provider], cancel.clone());
        let mut responses = pool.take_response_receiver().unwrap();

        pool.request_range(range(0, 4)).unwrap();
        cancel.cancel();

        // the job unwinds without delivering a response.
        tokio::time::timeout(Duration::from_secs(1), pool.wait_idle()).await.unwrap();
        assert!(responses.try_recv().is_err());
    }
}

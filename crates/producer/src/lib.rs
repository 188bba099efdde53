//! Parallel L1 rollup info producer.
//!
//! Retrieves rollup info from the L1 between a starting block and the
//! current head, fetching ranges in parallel over multiple L1 clients while
//! delivering the results to the consumer in strict ascending block order,
//! then tracks the moving tip so new blocks are picked up as they appear.

pub use config::{
    ProducerConfig, DEFAULT_HEAD_REQUEST_MAX_RETRIES, DEFAULT_HEAD_REQUEST_TIMEOUT,
    DEFAULT_MAIN_LOOP_TIMEOUT, DEFAULT_STATISTICS_LOG_INTERVAL, DEFAULT_TTL_OF_LAST_BLOCK,
};
mod config;

pub use error::ProducerError;
mod error;

mod filter;
use filter::ReorderFilter;

pub use metrics::ProducerMetrics;
mod metrics;

pub use statistics::ProducerStatistics;
mod statistics;

pub use status::{SyncMode, SyncStatusError};
mod status;
use status::SyncStatus;

pub use workers::WorkerPoolError;
mod workers;
use workers::{WorkerPool, WorkerResponse};

use rollup_sync_primitives::{ControlEvent, L1SyncMessage};
use rollup_sync_providers::L1RollupInfoProvider;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// The minimum wait between main loop iterations while synchronized.
const MIN_SYNCHRONIZED_WAIT: Duration = Duration::from_secs(1);

/// The rollup info producer.
///
/// The producer owns a pool of workers over independent L1 clients and
/// drives a single control loop: it wakes on a worker response, a scheduled
/// timer or cancellation, reconciles the sync status ledger, refreshes the
/// L1 head when its TTL expired, and dispatches new ranges while workers and
/// ranges remain. Fetched chunks pass through a reorder filter so the
/// outgoing channel sees them in strict ascending block order; crossing into
/// the synchronized state is announced with [`ControlEvent::FullySynced`].
///
/// All sync status mutation happens on the producer task; workers only
/// communicate through the response channel.
#[derive(Debug)]
pub struct RollupInfoProducer<P> {
    /// The producer configuration.
    config: ProducerConfig,
    /// The ledger of head, cursor and in-flight ranges.
    status: SyncStatus,
    /// The pool of L1 clients executing range and head queries.
    pool: WorkerPool<P>,
    /// The receiving end of the pool's multiplexed response channel.
    responses: mpsc::Receiver<WorkerResponse>,
    /// Reorders out-of-order range results for in-order delivery.
    filter: ReorderFilter,
    /// The channel drained by the downstream consumer.
    outgoing: mpsc::Sender<L1SyncMessage>,
    /// The mode observed after the previous iteration, for edge detection.
    previous_mode: SyncMode,
    /// The token cancelling the producer and every worker.
    cancel: CancellationToken,
    /// Progress bookkeeping for the periodic statistics log line.
    statistics: ProducerStatistics,
    /// The metrics of the producer.
    metrics: ProducerMetrics,
}

impl<P: L1RollupInfoProvider + 'static> RollupInfoProducer<P> {
    /// Returns a new [`RollupInfoProducer`] over the provided L1 clients,
    /// emitting on `outgoing`.
    ///
    /// A channel capacity of at least the number of clients is recommended;
    /// a smaller capacity only adds backpressure, it never causes loss.
    pub fn new(
        config: ProducerConfig,
        providers: Vec<P>,
        outgoing: mpsc::Sender<L1SyncMessage>,
    ) -> Result<Self, ProducerError> {
        config.validate()?;
        if providers.is_empty() {
            return Err(ProducerError::InvalidConfig("at least one L1 client is required"));
        }
        if outgoing.max_capacity() < providers.len() {
            tracing::warn!(
                target: "rollup_sync::producer",
                capacity = outgoing.max_capacity(),
                clients = providers.len(),
                "outgoing channel capacity is below the number of L1 clients, expect backpressure"
            );
        }

        let cancel = CancellationToken::new();
        let mut pool = WorkerPool::new(providers, cancel.clone());
        let responses = pool.take_response_receiver().expect("taken once at construction");
        Ok(Self {
            status: SyncStatus::new(
                config.starting_block,
                config.chunk_size,
                config.ttl_of_last_block,
            ),
            filter: ReorderFilter::new(config.starting_block),
            statistics: ProducerStatistics::new(config.starting_block),
            metrics: ProducerMetrics::default(),
            previous_mode: SyncMode::Idle,
            pool,
            responses,
            outgoing,
            cancel,
            config,
        })
    }

    /// Retrieves the initial last block on L1. Failure here is fatal: the
    /// main loop is never entered without a head to bound the work range.
    pub async fn init(&mut self) -> Result<(), ProducerError> {
        if self.status.need_head_refresh() {
            tracing::info!(
                target: "rollup_sync::producer",
                max_retries = self.config.head_request_max_retries,
                timeout = ?self.config.head_request_timeout,
                "retrieving the initial last block on L1"
            );
            let head = self
                .pool
                .request_head(
                    self.config.head_request_timeout,
                    self.config.head_request_max_retries,
                )
                .await
                .map_err(ProducerError::InitialHead)?;
            self.handle_new_head(head);
        }
        Ok(())
    }

    /// Runs the producer until cancellation. Returns after every accepted
    /// worker job has unwound, so no worker task outlives the producer.
    pub async fn start(&mut self) -> Result<(), ProducerError> {
        let result = self.run().await;
        self.cancel.cancel();
        self.pool.wait_idle().await;
        result
    }

    /// Requests the producer to stop. [`Self::start`] returns once in-flight
    /// workers have unwound.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// Returns a clone of the producer's cancellation token.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// The current synchronization mode.
    pub fn mode(&self) -> SyncMode {
        self.status.mode()
    }

    /// The producer's progress bookkeeping.
    pub fn statistics(&self) -> &ProducerStatistics {
        &self.statistics
    }

    async fn run(&mut self) -> Result<(), ProducerError> {
        let mut wait = Duration::ZERO;
        loop {
            match self.step(&mut wait).await {
                Ok(true) => {}
                Ok(false) => return Ok(()),
                Err(ProducerError::OutputChannelClosed) => {
                    tracing::warn!(
                        target: "rollup_sync::producer",
                        "outgoing channel closed, stopping the producer"
                    );
                    return Ok(());
                }
                Err(error) => return Err(error),
            }
        }
    }

    /// One iteration of the control loop. Returns false on cancellation.
    async fn step(&mut self, wait: &mut Duration) -> Result<bool, ProducerError> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Ok(false),
            Some(response) = self.responses.recv() => self.on_response(response).await?,
            _ = tokio::time::sleep(*wait) => {
                tracing::trace!(target: "rollup_sync::producer", timeout = ?*wait, "main loop timer fired");
            }
        }

        if self.status.mode() == SyncMode::Synchronized && self.status.need_head_refresh() {
            self.refresh_head().await;
        }
        self.dispatch()?;
        self.notify_mode_change().await?;

        if self.statistics.should_log(self.config.statistics_log_interval) {
            tracing::info!(target: "rollup_sync::producer", "{}", self.statistics.eta());
        }
        *wait = self.next_timeout();
        tracing::trace!(
            target: "rollup_sync::producer",
            next_timeout = ?*wait,
            status = %self.status,
            "iteration done"
        );
        Ok(true)
    }

    /// Reconciles one worker response: a fetched chunk goes through the
    /// reorder filter and every released chunk is forwarded (which may block
    /// on backpressure); a failed range rewinds the status so the next
    /// dispatch re-issues it.
    async fn on_response(&mut self, response: WorkerResponse) -> Result<(), ProducerError> {
        match response.result {
            Ok(chunk) => {
                self.status.on_finished(response.range, true)?;
                self.statistics.on_response_ok(response.range.len());
                self.metrics.ranges_fetched.increment(1);

                let released = self.filter.filter(chunk);
                self.metrics.reorder_buffer_depth.record(self.filter.buffered_len() as f64);
                for chunk in released {
                    self.send(L1SyncMessage::Data(chunk)).await?;
                }
            }
            Err(error) => {
                self.status.on_finished(response.range, false)?;
                self.statistics.on_response_error();
                self.metrics.range_fetch_errors.increment(1);
                tracing::warn!(
                    target: "rollup_sync::producer",
                    range = %response.range,
                    ?error,
                    "range fetch failed, the range will be re-dispatched"
                );
            }
        }
        Ok(())
    }

    /// Hands out ranges while a worker and a range remain.
    fn dispatch(&mut self) -> Result<(), ProducerError> {
        while let Some(range) = self.status.next_range() {
            match self.pool.request_range(range) {
                Ok(()) => {
                    self.status.on_started(range)?;
                    tracing::debug!(target: "rollup_sync::producer", range = %range, "range dispatched");
                }
                Err(_no_free_worker) => {
                    self.status.on_dispatch_failed(range);
                    break;
                }
            }
        }
        Ok(())
    }

    /// Emits [`ControlEvent::FullySynced`] when the mode just crossed into
    /// [`SyncMode::Synchronized`], after the data chunks of the response
    /// that caused the transition and before any later chunk.
    async fn notify_mode_change(&mut self) -> Result<(), ProducerError> {
        let mode = self.status.mode();
        if mode == self.previous_mode {
            return Ok(());
        }
        tracing::info!(
            target: "rollup_sync::producer",
            from = %self.previous_mode,
            to = %mode,
            "sync status changed"
        );
        self.previous_mode = mode;
        if mode == SyncMode::Synchronized {
            debug_assert_eq!(self.status.in_flight_len(), 0);
            self.send(L1SyncMessage::Control(ControlEvent::FullySynced)).await?;
        }
        Ok(())
    }

    /// Refreshes the last block on L1. Failure is not fatal here: the stale
    /// head is kept until the next refresh succeeds.
    async fn refresh_head(&mut self) {
        let old_block = self.status.last_block_on_l1();
        match self
            .pool
            .request_head(self.config.head_request_timeout, self.config.head_request_max_retries)
            .await
        {
            Ok(head) => {
                tracing::debug!(
                    target: "rollup_sync::producer",
                    ?old_block,
                    new_block = head,
                    "refreshed the last block on L1"
                );
                self.metrics.head_refreshes.increment(1);
                self.handle_new_head(head);
            }
            Err(WorkerPoolError::Cancelled) => {}
            Err(error) => {
                tracing::warn!(
                    target: "rollup_sync::producer",
                    ?error,
                    "failed to refresh the last block on L1, keeping the stale head"
                );
            }
        }
    }

    fn handle_new_head(&mut self, head: u64) {
        if let Some(extended) = self.status.on_new_head(head) {
            tracing::info!(
                target: "rollup_sync::producer",
                head,
                extended = %extended,
                "new last block on L1"
            );
        }
        self.statistics.update_last_block(head);
    }

    /// The wait before the next iteration when no response arrives: a long
    /// safety net while catching up, the remaining head TTL (at least
    /// [`MIN_SYNCHRONIZED_WAIT`]) while synchronized.
    fn next_timeout(&self) -> Duration {
        match self.status.mode() {
            SyncMode::Idle | SyncMode::Working => self.config.main_loop_timeout,
            SyncMode::Synchronized => {
                let elapsed = self.status.time_since_last_block().unwrap_or_default();
                self.config
                    .ttl_of_last_block
                    .saturating_sub(elapsed)
                    .max(MIN_SYNCHRONIZED_WAIT)
            }
        }
    }

    async fn send(&mut self, message: L1SyncMessage) -> Result<(), ProducerError> {
        tracing::trace!(
            target: "rollup_sync::producer",
            %message,
            "sending message to the consumer, may block on backpressure"
        );
        tokio::select! {
            biased;
            // messages are worthless after cancellation, drop instead of
            // blocking shutdown on a stalled consumer.
            _ = self.cancel.cancelled() => Ok(()),
            result = self.outgoing.send(message) => {
                result.map_err(|_| ProducerError::OutputChannelClosed)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rollup_sync_providers::{test_utils::MockL1Provider, L1ProviderError};

    #[tokio::test]
    async fn test_rejects_invalid_configuration() {
        let (tx, _rx) = mpsc::channel(1);

        let zero_chunk = RollupInfoProducer::new(
            ProducerConfig::new(0, 0),
            vec![MockL1Provider::default()],
            tx.clone(),
        );
        assert!(matches!(zero_chunk, Err(ProducerError::InvalidConfig(_))));

        let no_clients =
            RollupInfoProducer::new(ProducerConfig::new(0, 10), Vec::<MockL1Provider>::new(), tx);
        assert!(matches!(no_clients, Err(ProducerError::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn test_init_fails_when_head_unavailable() {
        let provider = MockL1Provider::default();
        provider.push_head_error(L1ProviderError::Permanent("wrong chain".to_string()));

        let mut config = ProducerConfig::new(0, 10);
        config.head_request_timeout = Duration::from_millis(100);
        config.head_request_max_retries = 1;

        let (tx, _rx) = mpsc::channel(1);
        let mut producer =
            RollupInfoProducer::new(config, vec![provider], tx).expect("valid configuration");
        assert!(matches!(producer.init().await, Err(ProducerError::InitialHead(_))));
        assert_eq!(producer.mode(), SyncMode::Idle);
    }
}

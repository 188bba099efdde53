use std::time::{Duration, Instant};

/// Progress bookkeeping for the producer, rendered periodically in the logs.
#[derive(Debug, Clone)]
pub struct ProducerStatistics {
    initial_block: u64,
    start_time: Instant,
    last_block_on_l1: u64,
    num_responses_ok: u64,
    num_responses_error: u64,
    num_blocks_retrieved: u64,
    last_log_time: Instant,
}

impl ProducerStatistics {
    pub(crate) fn new(initial_block: u64) -> Self {
        let now = Instant::now();
        Self {
            initial_block,
            start_time: now,
            last_block_on_l1: 0,
            num_responses_ok: 0,
            num_responses_error: 0,
            num_blocks_retrieved: 0,
            last_log_time: now,
        }
    }

    pub(crate) fn update_last_block(&mut self, block: u64) {
        self.last_block_on_l1 = self.last_block_on_l1.max(block);
    }

    pub(crate) fn on_response_ok(&mut self, blocks: u64) {
        self.num_responses_ok += 1;
        self.num_blocks_retrieved += blocks;
    }

    pub(crate) fn on_response_error(&mut self) {
        self.num_responses_error += 1;
    }

    /// Returns true once per `interval`, resetting the cadence on a hit.
    pub(crate) fn should_log(&mut self, interval: Duration) -> bool {
        if self.last_log_time.elapsed() > interval {
            self.last_log_time = Instant::now();
            return true;
        }
        false
    }

    /// The number of successfully fetched ranges.
    pub fn num_responses_ok(&self) -> u64 {
        self.num_responses_ok
    }

    /// The number of failed range fetches.
    pub fn num_responses_error(&self) -> u64 {
        self.num_responses_error
    }

    /// The number of blocks retrieved so far.
    pub fn num_blocks_retrieved(&self) -> u64 {
        self.num_blocks_retrieved
    }

    /// Renders a progress line: percentage of the known window retrieved,
    /// throughput, and the estimated time to catch up.
    pub(crate) fn eta(&self) -> String {
        let total_blocks = self.last_block_on_l1.saturating_sub(self.initial_block) + 1;
        let pending_blocks = total_blocks.saturating_sub(self.num_blocks_retrieved);
        let percentage = self.num_blocks_retrieved as f64 * 100.0 / total_blocks as f64;
        let elapsed = self.start_time.elapsed().as_secs_f64();
        let blocks_per_second = if elapsed > 0.0 {
            self.num_blocks_retrieved as f64 / elapsed
        } else {
            0.0
        };
        let eta = if blocks_per_second > 0.0 {
            Duration::from_secs_f64(pending_blocks as f64 / blocks_per_second)
        } else {
            Duration::ZERO
        };
        format!(
            "progress: {percentage:.1}% ({}/{total_blocks} blocks, {blocks_per_second:.1} blocks/s), eta: {eta:?}, ranges ok: {}, errors: {}",
            self.num_blocks_retrieved, self.num_responses_ok, self.num_responses_error
        )
    }
}

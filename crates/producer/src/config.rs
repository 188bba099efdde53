use crate::ProducerError;
use std::time::Duration;

/// The default TTL of the last block on L1 before a refresh is due.
pub const DEFAULT_TTL_OF_LAST_BLOCK: Duration = Duration::from_secs(5);

/// The default safety-net timeout of the main loop.
pub const DEFAULT_MAIN_LOOP_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// The default per-attempt timeout of a head request.
pub const DEFAULT_HEAD_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// The default number of head request attempts.
pub const DEFAULT_HEAD_REQUEST_MAX_RETRIES: usize = 10;

/// The default interval between statistics log lines.
pub const DEFAULT_STATISTICS_LOG_INTERVAL: Duration = Duration::from_secs(60);

/// The configuration of the [`crate::RollupInfoProducer`].
#[derive(Debug, Clone)]
pub struct ProducerConfig {
    /// The first block to retrieve rollup info for.
    pub starting_block: u64,
    /// The maximum number of blocks per dispatched range.
    pub chunk_size: u64,
    /// How long the last block on L1 is trusted before a refresh is due.
    pub ttl_of_last_block: Duration,
    /// Reserved for future refresh policy; both values currently behave the
    /// same.
    pub renew_last_block_on_l1: bool,
    /// The safety-net timeout of the main loop while catching up. Hitting it
    /// only re-runs the refresh and dispatch cycle.
    pub main_loop_timeout: Duration,
    /// The per-attempt timeout of a head request.
    pub head_request_timeout: Duration,
    /// The maximum number of head request attempts.
    pub head_request_max_retries: usize,
    /// The interval between statistics log lines.
    pub statistics_log_interval: Duration,
}

impl ProducerConfig {
    /// Returns a new [`ProducerConfig`] with the default timings.
    pub const fn new(starting_block: u64, chunk_size: u64) -> Self {
        Self {
            starting_block,
            chunk_size,
            ttl_of_last_block: DEFAULT_TTL_OF_LAST_BLOCK,
            renew_last_block_on_l1: false,
            main_loop_timeout: DEFAULT_MAIN_LOOP_TIMEOUT,
            head_request_timeout: DEFAULT_HEAD_REQUEST_TIMEOUT,
            head_request_max_retries: DEFAULT_HEAD_REQUEST_MAX_RETRIES,
            statistics_log_interval: DEFAULT_STATISTICS_LOG_INTERVAL,
        }
    }

    pub(crate) fn validate(&self) -> Result<(), ProducerError> {
        if self.chunk_size == 0 {
            return Err(ProducerError::InvalidConfig("chunk size must be greater than zero"));
        }
        if self.head_request_max_retries == 0 {
            return Err(ProducerError::InvalidConfig(
                "at least one head request attempt is required",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_zero_chunk_size() {
        assert!(ProducerConfig::new(0, 0).validate().is_err());
        assert!(ProducerConfig::new(0, 1).validate().is_ok());
    }
}

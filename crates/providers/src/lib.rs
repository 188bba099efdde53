//! L1 provider abstractions for the rollup sync producer.

pub use error::L1ProviderError;
mod error;

#[cfg(any(test, feature = "test-utils"))]
/// Common test helpers.
pub mod test_utils;

use rollup_sync_primitives::{BlockRange, RollupInfoChunk};

/// A client of the L1 able to answer rollup info range queries and head
/// queries.
///
/// Implementations should carry their own backoff and rate limiting policy;
/// the producer only retries at range granularity and treats a
/// [`L1ProviderError::Transient`] head failure as retryable.
#[async_trait::async_trait]
pub trait L1RollupInfoProvider: Send + Sync {
    /// Retrieves the rollup info for the provided inclusive block range.
    ///
    /// A chunk with zero blocks is a valid response for a range without
    /// rollup activity, including a range queried past the current head.
    async fn get_rollup_info_by_range(
        &self,
        range: BlockRange,
    ) -> Result<RollupInfoChunk, L1ProviderError>;

    /// Returns the highest confirmed block number on L1.
    async fn get_head(&self) -> Result<u64, L1ProviderError>;
}

#[async_trait::async_trait]
impl<T: L1RollupInfoProvider> L1RollupInfoProvider for std::sync::Arc<T> {
    async fn get_rollup_info_by_range(
        &self,
        range: BlockRange,
    ) -> Result<RollupInfoChunk, L1ProviderError> {
        self.as_ref().get_rollup_info_by_range(range).await
    }

    async fn get_head(&self) -> Result<u64, L1ProviderError> {
        self.as_ref().get_head().await
    }
}

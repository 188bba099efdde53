use metrics::{Counter, Histogram};
use metrics_derive::Metrics;

/// The metrics for the [`super::RollupInfoProducer`].
#[derive(Metrics)]
#[metrics(scope = "rollup_sync_producer")]
pub struct ProducerMetrics {
    /// A counter on the ranges fetched successfully.
    pub ranges_fetched: Counter,
    /// A counter on the failed range fetches.
    pub range_fetch_errors: Counter,
    /// A counter on the L1 head refreshes.
    pub head_refreshes: Counter,
    /// A histogram of the reorder buffer depth sampled at each response.
    pub reorder_buffer_depth: Histogram,
}

use crate::{status::SyncStatusError, workers::WorkerPoolError};

/// An error that occurred at the rollup info producer.
#[derive(Debug, thiserror::Error)]
pub enum ProducerError {
    /// The configuration was rejected at construction.
    #[error("invalid producer configuration: {0}")]
    InvalidConfig(&'static str),
    /// The initial L1 head could not be retrieved.
    #[error("failed to retrieve the initial last block on L1")]
    InitialHead(#[source] WorkerPoolError),
    /// The sync status ledger detected an invariant violation, indicating a
    /// programming error in the dispatcher.
    #[error(transparent)]
    Status(#[from] SyncStatusError),
    /// The consumer closed the outgoing channel.
    #[error("outgoing channel closed by the consumer")]
    OutputChannelClosed,
}

/// An error occurring at an L1 provider.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum L1ProviderError {
    /// A transient error, the request may be retried.
    #[error("transient provider error: {0}")]
    Transient(String),
    /// A permanent error, retrying the same request will not succeed.
    #[error("permanent provider error: {0}")]
    Permanent(String),
    /// The request was cancelled.
    #[error("provider request cancelled")]
    Cancelled,
}

impl L1ProviderError {
    /// Returns true if the request may be retried.
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }

    /// Returns true if the request was cancelled.
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

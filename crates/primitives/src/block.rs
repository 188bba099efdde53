use alloy_primitives::B256;

/// A single L1 block as retrieved by a rollup info range query.
#[derive(Debug, Default, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct L1BlockRecord {
    /// The block number.
    pub number: u64,
    /// The block hash.
    pub hash: B256,
    /// The parent block hash.
    pub parent_hash: B256,
    /// The block timestamp.
    pub timestamp: u64,
}

impl L1BlockRecord {
    /// Returns a new instance of [`L1BlockRecord`].
    pub const fn new(number: u64, hash: B256, parent_hash: B256, timestamp: u64) -> Self {
        Self { number, hash, parent_hash, timestamp }
    }
}

/// A rollup event observed on the L1.
///
/// The payload is opaque to the producer, it is decoded by the downstream
/// consumer.
#[derive(Debug, Default, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct RollupEvent {
    /// The hash of the L1 transaction that emitted the event.
    pub tx_hash: B256,
    /// The L1 block number the event was emitted at.
    pub block_number: u64,
    /// The raw event payload.
    pub data: Vec<u8>,
}

#[cfg(feature = "arbitrary")]
impl arbitrary::Arbitrary<'_> for L1BlockRecord {
    fn arbitrary(u: &mut arbitrary::Unstructured<'_>) -> arbitrary::Result<Self> {
        let number = u.int_in_range(0..=u32::MAX)? as u64;
        Ok(Self {
            number,
            hash: B256::arbitrary(u)?,
            parent_hash: B256::arbitrary(u)?,
            timestamp: u.arbitrary()?,
        })
    }
}

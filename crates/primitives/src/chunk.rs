use crate::{BlockRange, L1BlockRecord, RollupEvent};
use alloy_primitives::B256;
use std::collections::HashMap;

/// The rollup info retrieved for one block range: the L1 blocks of the range
/// and the rollup events they carry, keyed by block hash.
///
/// The producer only inspects [`Self::range`] for ordering; the payload is
/// handed to the consumer untouched. A chunk with zero blocks is a valid
/// result for a range without rollup activity.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct RollupInfoChunk {
    /// The block range the chunk covers.
    pub range: BlockRange,
    /// The L1 blocks of the range that carry rollup activity.
    pub blocks: Vec<L1BlockRecord>,
    /// The rollup events of the range, keyed by the hash of the block that
    /// contains them.
    pub events: HashMap<B256, Vec<RollupEvent>>,
}

impl RollupInfoChunk {
    /// Returns a new [`RollupInfoChunk`] without any rollup activity.
    pub fn empty(range: BlockRange) -> Self {
        Self { range, blocks: Vec::new(), events: HashMap::new() }
    }

    /// The total number of rollup events in the chunk.
    pub fn event_count(&self) -> usize {
        self.events.values().map(Vec::len).sum()
    }
}

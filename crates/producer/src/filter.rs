use rollup_sync_primitives::RollupInfoChunk;
use std::collections::BTreeMap;

/// Buffers out-of-order range results and releases them in strict ascending
/// block order.
///
/// Released chunks form a contiguous ascending cover starting at the block
/// the filter was constructed with; a chunk is never released before every
/// block preceding it has been released.
#[derive(Debug)]
pub(crate) struct ReorderFilter {
    /// The next block number that, when present at the low end of a buffered
    /// chunk, may be forwarded.
    next_expected_block: u64,
    /// Chunks that arrived ahead of order, keyed by their first block.
    buffered: BTreeMap<u64, RollupInfoChunk>,
}

impl ReorderFilter {
    /// Returns a new [`ReorderFilter`] expecting `starting_block` first.
    pub(crate) const fn new(starting_block: u64) -> Self {
        Self { next_expected_block: starting_block, buffered: BTreeMap::new() }
    }

    /// Takes one arrived chunk and returns the prefix of chunks that now
    /// form a contiguous sequence starting at the next expected block,
    /// possibly empty.
    pub(crate) fn filter(&mut self, chunk: RollupInfoChunk) -> Vec<RollupInfoChunk> {
        if chunk.range.to() < self.next_expected_block {
            tracing::debug!(
                target: "rollup_sync::filter",
                range = %chunk.range,
                next_expected_block = self.next_expected_block,
                "dropping already delivered chunk"
            );
            return Vec::new();
        }
        if chunk.range.from() < self.next_expected_block {
            // unreachable with disjoint dispatches.
            tracing::warn!(
                target: "rollup_sync::filter",
                range = %chunk.range,
                next_expected_block = self.next_expected_block,
                "dropping chunk partially below the next expected block"
            );
            return Vec::new();
        }
        self.buffered.insert(chunk.range.from(), chunk);

        let mut released = Vec::new();
        while let Some(entry) = self.buffered.first_entry() {
            if *entry.key() != self.next_expected_block {
                break;
            }
            let chunk = entry.remove();
            self.next_expected_block = chunk.range.to() + 1;
            released.push(chunk);
        }
        released
    }

    /// The number of chunks buffered ahead of order.
    pub(crate) fn buffered_len(&self) -> usize {
        self.buffered.len()
    }
}

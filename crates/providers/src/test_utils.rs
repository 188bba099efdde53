//! Test utilities for the L1 provider trait.

use crate::{L1ProviderError, L1RollupInfoProvider};
use alloy_primitives::{B256, U256};
use rollup_sync_primitives::{BlockRange, L1BlockRecord, RollupEvent, RollupInfoChunk};
use std::{
    collections::{HashMap, VecDeque},
    sync::Mutex,
    time::Duration,
};

/// A scripted response for one range request.
#[derive(Debug, Clone)]
struct ScriptedRange {
    delay: Duration,
    result: Result<RollupInfoChunk, L1ProviderError>,
}

#[derive(Debug, Default)]
struct MockState {
    heads: VecDeque<Result<u64, L1ProviderError>>,
    last_head: Option<u64>,
    ranges: HashMap<BlockRange, VecDeque<ScriptedRange>>,
    head_requests: usize,
    range_requests: usize,
}

/// A mock implementation of the [`L1RollupInfoProvider`] trait.
///
/// Head responses are consumed from a scripted queue; once the queue is
/// drained the last returned head repeats. Range responses may be scripted
/// per range (with an optional completion delay to force out-of-order
/// arrival); unscripted ranges resolve to a synthetic chunk.
#[derive(Debug, Default)]
pub struct MockL1Provider {
    state: Mutex<MockState>,
}

impl MockL1Provider {
    /// Returns a new mock provider that immediately reports `head`.
    pub fn with_head(head: u64) -> Self {
        let provider = Self::default();
        provider.push_head(head);
        provider
    }

    /// Queues a head response.
    pub fn push_head(&self, head: u64) {
        self.state.lock().unwrap().heads.push_back(Ok(head));
    }

    /// Queues a failed head response.
    pub fn push_head_error(&self, error: L1ProviderError) {
        self.state.lock().unwrap().heads.push_back(Err(error));
    }

    /// Scripts the next response for `range`.
    pub fn script_range(
        &self,
        range: BlockRange,
        delay: Duration,
        result: Result<RollupInfoChunk, L1ProviderError>,
    ) {
        self.state
            .lock()
            .unwrap()
            .ranges
            .entry(range)
            .or_default()
            .push_back(ScriptedRange { delay, result });
    }

    /// The number of head requests served so far.
    pub fn head_requests(&self) -> usize {
        self.state.lock().unwrap().head_requests
    }

    /// The number of range requests served so far.
    pub fn range_requests(&self) -> usize {
        self.state.lock().unwrap().range_requests
    }
}

#[async_trait::async_trait]
impl L1RollupInfoProvider for MockL1Provider {
    async fn get_rollup_info_by_range(
        &self,
        range: BlockRange,
    ) -> Result<RollupInfoChunk, L1ProviderError> {
        let scripted = {
            let mut state = self.state.lock().unwrap();
            state.range_requests += 1;
            state.ranges.get_mut(&range).and_then(VecDeque::pop_front)
        };
        match scripted {
            Some(scripted) => {
                if !scripted.delay.is_zero() {
                    tokio::time::sleep(scripted.delay).await;
                }
                scripted.result
            }
            None => Ok(chunk(range)),
        }
    }

    async fn get_head(&self) -> Result<u64, L1ProviderError> {
        let mut state = self.state.lock().unwrap();
        state.head_requests += 1;
        match state.heads.pop_front() {
            Some(Ok(head)) => {
                state.last_head = Some(head);
                Ok(head)
            }
            Some(Err(error)) => Err(error),
            None => state
                .last_head
                .ok_or_else(|| L1ProviderError::Transient("no head scripted".to_string())),
        }
    }
}

/// Returns a deterministic block hash for `number`.
pub fn block_hash(number: u64) -> B256 {
    B256::from(U256::from(number))
}

/// Builds a synthetic [`RollupInfoChunk`] covering `range`, one rollup event
/// per block.
pub fn chunk(range: BlockRange) -> RollupInfoChunk {
    let blocks: Vec<_> = (range.from()..=range.to())
        .map(|number| {
            L1BlockRecord::new(
                number,
                block_hash(number),
                block_hash(number.saturating_sub(1)),
                number,
            )
        })
        .collect();
    let events = blocks
        .iter()
        .map(|block| {
            let event = RollupEvent {
                tx_hash: block_hash(block.number),
                block_number: block.number,
                data: block.number.to_be_bytes().to_vec(),
            };
            (block.hash, vec![event])
        })
        .collect();
    RollupInfoChunk { range, blocks, events }
}

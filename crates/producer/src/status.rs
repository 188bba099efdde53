use core::fmt::{self, Display, Formatter};
use rollup_sync_primitives::BlockRange;
use std::{
    collections::BTreeSet,
    time::{Duration, Instant},
};

/// The coarse synchronization state of the producer.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SyncMode {
    /// The last block on L1 is not known yet.
    Idle,
    /// Catching up: ranges remain to dispatch or are in flight.
    Working,
    /// Caught up with the last known block on L1, nothing in flight.
    Synchronized,
}

impl Display for SyncMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Working => write!(f, "working"),
            Self::Synchronized => write!(f, "synchronized"),
        }
    }
}

/// An invariant violation in the sync status ledger.
///
/// These indicate a programming error in the dispatcher, never a condition
/// reachable through L1 behavior, and are fatal to the producer.
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SyncStatusError {
    /// A range was reported finished that was never dispatched.
    #[error("finished range {0} was never dispatched")]
    UnknownRange(BlockRange),
    /// A range was reported started that overlaps an in-flight range.
    #[error("started range {0} overlaps an in-flight range")]
    OverlappingRange(BlockRange),
}

/// The in-memory ledger of the producer's synchronization state: the last
/// known block on L1 and its freshness, the dispatch cursor, and the set of
/// in-flight ranges.
///
/// Every range ever handed out by [`Self::next_range`] lies within
/// `[starting_block, last_block_on_l1]`, has at most `chunk_size` blocks and
/// is disjoint from every other handed-out range.
#[derive(Debug)]
pub(crate) struct SyncStatus {
    /// The first block the producer ever asked about.
    starting_block: u64,
    /// The maximum number of blocks per dispatched range.
    chunk_size: u64,
    /// The last known block on L1, `None` until the first head observation.
    last_block_on_l1: Option<u64>,
    /// When the last block on L1 was observed.
    last_block_timestamp: Option<Instant>,
    /// How long the last block on L1 is trusted before a refresh is due.
    ttl_of_last_block: Duration,
    /// The next block the dispatcher will schedule. Advances as ranges are
    /// handed out, not as they complete.
    next_block_to_ask: u64,
    /// The currently dispatched, not yet completed ranges.
    in_flight: BTreeSet<BlockRange>,
    /// The current mode, a pure function of the fields above.
    mode: SyncMode,
}

impl SyncStatus {
    /// Returns a new [`SyncStatus`] in [`SyncMode::Idle`].
    pub(crate) fn new(starting_block: u64, chunk_size: u64, ttl_of_last_block: Duration) -> Self {
        debug_assert!(chunk_size > 0, "chunk size is validated at construction");
        Self {
            starting_block,
            chunk_size,
            last_block_on_l1: None,
            last_block_timestamp: None,
            ttl_of_last_block,
            next_block_to_ask: starting_block,
            in_flight: BTreeSet::new(),
            mode: SyncMode::Idle,
        }
    }

    /// Returns the next range to dispatch and advances the cursor past it,
    /// or `None` when no range remains or the head is unknown.
    ///
    /// After a failure rewind the cursor can sit at or inside a range that
    /// is still in flight; the cursor skips over in-flight coverage and the
    /// returned range is clamped below the lowest in-flight range past it,
    /// so a re-issued range can never overlap a dispatch that is still in
    /// flight even if the head grew in between.
    pub(crate) fn next_range(&mut self) -> Option<BlockRange> {
        let last_block = self.last_block_on_l1?;

        while let Some(in_flight) =
            self.in_flight.iter().find(|range| range.contains(self.next_block_to_ask))
        {
            self.next_block_to_ask = in_flight.to() + 1;
        }
        if self.next_block_to_ask > last_block {
            return None;
        }

        let mut to = self.next_block_to_ask.saturating_add(self.chunk_size - 1).min(last_block);
        if let Some(in_flight) =
            self.in_flight.iter().find(|range| range.from() > self.next_block_to_ask)
        {
            to = to.min(in_flight.from() - 1);
        }

        let range = BlockRange::new(self.next_block_to_ask, to)
            .expect("cursor is bounded by the last block on L1");
        self.next_block_to_ask = to + 1;
        Some(range)
    }

    /// Records a dispatched range as in flight. Must follow the
    /// [`Self::next_range`] call that produced the range.
    pub(crate) fn on_started(&mut self, range: BlockRange) -> Result<(), SyncStatusError> {
        if self.in_flight.iter().any(|in_flight| in_flight.overlaps(&range)) {
            return Err(SyncStatusError::OverlappingRange(range));
        }
        self.in_flight.insert(range);
        self.update_mode();
        Ok(())
    }

    /// Re-admits a range produced by [`Self::next_range`] that could not be
    /// handed to a worker, rewinding the cursor to its first block.
    pub(crate) fn on_dispatch_failed(&mut self, range: BlockRange) {
        self.next_block_to_ask = self.next_block_to_ask.min(range.from());
        self.update_mode();
    }

    /// Records the completion of an in-flight range. On failure the cursor
    /// rewinds to the first block of the range so it is re-issued; later
    /// dispatches stay in flight and are not re-issued.
    pub(crate) fn on_finished(
        &mut self,
        range: BlockRange,
        successful: bool,
    ) -> Result<(), SyncStatusError> {
        if !self.in_flight.remove(&range) {
            return Err(SyncStatusError::UnknownRange(range));
        }
        if !successful {
            self.next_block_to_ask = self.next_block_to_ask.min(range.from());
        }
        self.update_mode();
        Ok(())
    }

    /// Records a head observation. Returns the newly exposed sub-range when
    /// the observation widens the window, `None` otherwise. The freshness
    /// timestamp is renewed unconditionally.
    pub(crate) fn on_new_head(&mut self, block: u64) -> Option<BlockRange> {
        self.last_block_timestamp = Some(Instant::now());
        let extended = match self.last_block_on_l1 {
            None => BlockRange::new(self.next_block_to_ask, block).ok(),
            Some(old_block) if block > old_block => {
                BlockRange::new(old_block + 1, block).ok()
            }
            Some(old_block) => {
                if block < old_block {
                    tracing::warn!(
                        target: "rollup_sync::status",
                        old_block,
                        new_block = block,
                        "L1 head went backwards, keeping the old head"
                    );
                }
                self.update_mode();
                return None;
            }
        };
        self.last_block_on_l1 = Some(self.last_block_on_l1.unwrap_or(0).max(block));
        self.update_mode();
        extended
    }

    /// Returns true if the head was never observed or its TTL expired.
    pub(crate) fn need_head_refresh(&self) -> bool {
        self.last_block_timestamp
            .map_or(true, |observed| observed.elapsed() > self.ttl_of_last_block)
    }

    /// The current mode.
    pub(crate) const fn mode(&self) -> SyncMode {
        self.mode
    }

    /// The last known block on L1.
    pub(crate) const fn last_block_on_l1(&self) -> Option<u64> {
        self.last_block_on_l1
    }

    /// The time elapsed since the head was last observed.
    pub(crate) fn time_since_last_block(&self) -> Option<Duration> {
        self.last_block_timestamp.map(|observed| observed.elapsed())
    }

    /// The number of in-flight ranges.
    pub(crate) fn in_flight_len(&self) -> usize {
        self.in_flight.len()
    }

    fn update_mode(&mut self) {
        self.mode = match self.last_block_on_l1 {
            None => SyncMode::Idle,
            Some(last_block)
                if self.next_block_to_ask > last_block && self.in_flight.is_empty() =>
            {
                SyncMode::Synchronized
            }
            Some(_) => SyncMode::Working,
        };
    }
}

impl Display for SyncStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "mode: {}, last block on L1: {:?}, next block to ask: {}, in flight: {}",
            self.mode,
            self.last_block_on_l1,
            self.next_block_to_ask,
            self.in_flight.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(starting_block: u64, chunk_size: u64) -> SyncStatus {
        SyncStatus::new(starting_block, chunk_size, Duration::from_secs(5))
    }

    #[test]
    fn test_idle_until_first_head() {
        let mut status = status(100, 10);
        assert_eq!(status.mode(), SyncMode::Idle);
        assert_eq!(status.next_range(), None);

        let extended = status.on_new_head(129);
        assert_eq!(extended, Some(BlockRange::new(100, 129).unwrap()));
        assert_eq!(status.mode(), SyncMode::Working);
    }

    #[test]
    fn test_next_range_respects_chunk_size_and_head() {
        let mut status = status(100, 10);
        status.on_new_head(115);

        assert_eq!(status.next_range(), Some(BlockRange::new(100, 109).unwrap()));
        assert_eq!(status.next_range(), Some(BlockRange::new(110, 115).unwrap()));
        assert_eq!(status.next_range(), None);
    }

    #[test]
    fn test_synchronized_when_nothing_left_and_nothing_in_flight() {
        let mut status = status(0, 10);
        status.on_new_head(9);

        let range = status.next_range().unwrap();
        status.on_started(range).unwrap();
        assert_eq!(status.mode(), SyncMode::Working);

        status.on_finished(range, true).unwrap();
        assert_eq!(status.mode(), SyncMode::Synchronized);
    }

    #[test]
    fn test_new_head_leaves_synchronized() {
        let mut status = status(0, 10);
        status.on_new_head(9);
        let range = status.next_range().unwrap();
        status.on_started(range).unwrap();
        status.on_finished(range, true).unwrap();
        assert_eq!(status.mode(), SyncMode::Synchronized);

        let extended = status.on_new_head(14);
        assert_eq!(extended, Some(BlockRange::new(10, 14).unwrap()));
        assert_eq!(status.mode(), SyncMode::Working);
        assert_eq!(status.next_range(), Some(BlockRange::new(10, 14).unwrap()));
    }

    #[test]
    fn test_failure_rewinds_cursor_and_reissues() {
        let mut status = status(0, 5);
        status.on_new_head(14);

        let first = status.next_range().unwrap();
        let second = status.next_range().unwrap();
        status.on_started(first).unwrap();
        status.on_started(second).unwrap();

        status.on_finished(first, false).unwrap();
        assert_eq!(status.mode(), SyncMode::Working);

        // the failed range is re-issued, the later dispatch stays in flight.
        assert_eq!(status.next_range(), Some(first));
        assert_eq!(status.in_flight_len(), 1);

        // the cursor skips the in-flight [5, 9] instead of re-issuing it.
        assert_eq!(status.next_range(), Some(BlockRange::new(10, 14).unwrap()));
        assert_eq!(status.next_range(), None);
    }

    #[test]
    fn test_reissued_range_clamped_below_in_flight() {
        let mut status = status(0, 5);
        status.on_new_head(7);

        // [0, 4] and the clipped [5, 7] go out.
        let first = status.next_range().unwrap();
        let second = status.next_range().unwrap();
        assert_eq!(second, BlockRange::new(5, 7).unwrap());
        status.on_started(first).unwrap();
        status.on_started(second).unwrap();

        // [0, 4] fails, the head grows past the old clip point.
        status.on_finished(first, false).unwrap();
        status.on_new_head(14);

        // the retry must not extend into the still in-flight [5, 7].
        assert_eq!(status.next_range(), Some(BlockRange::new(0, 4).unwrap()));
    }

    #[test]
    fn test_finished_unknown_range_is_an_invariant_violation() {
        let mut status = status(0, 5);
        status.on_new_head(9);
        let range = BlockRange::new(0, 4).unwrap();
        assert_eq!(
            status.on_finished(range, true),
            Err(SyncStatusError::UnknownRange(range))
        );
    }

    #[test]
    fn test_dispatch_failure_readmits_range() {
        let mut status = status(0, 5);
        status.on_new_head(9);

        let range = status.next_range().unwrap();
        status.on_dispatch_failed(range);
        assert_eq!(status.next_range(), Some(range));
    }

    #[test]
    fn test_backwards_head_is_ignored() {
        let mut status = status(0, 5);
        status.on_new_head(20);
        assert_eq!(status.on_new_head(10), None);
        assert_eq!(status.last_block_on_l1(), Some(20));
    }

    #[test]
    fn test_head_refresh_follows_ttl() {
        let mut status = SyncStatus::new(0, 5, Duration::from_millis(10));
        assert!(status.need_head_refresh());

        status.on_new_head(9);
        assert!(!status.need_head_refresh());

        std::thread::sleep(Duration::from_millis(20));
        assert!(status.need_head_refresh());
    }
}

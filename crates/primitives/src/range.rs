use core::fmt::{self, Display, Formatter};

/// The error returned when constructing a [`BlockRange`] with `from > to`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid block range: from {from} > to {to}")]
pub struct InvalidBlockRange {
    /// The first block of the rejected range.
    pub from: u64,
    /// The last block of the rejected range.
    pub to: u64,
}

/// An inclusive range of L1 block numbers.
///
/// Ranges order by their first block, so a collection of disjoint ranges
/// sorts in ascending block order.
#[derive(
    Debug,
    Copy,
    Clone,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    serde::Serialize,
    serde::Deserialize,
)]
pub struct BlockRange {
    from: u64,
    to: u64,
}

impl BlockRange {
    /// Returns a new [`BlockRange`], failing if `from > to`.
    pub const fn new(from: u64, to: u64) -> Result<Self, InvalidBlockRange> {
        if from > to {
            return Err(InvalidBlockRange { from, to });
        }
        Ok(Self { from, to })
    }

    /// The first block of the range.
    pub const fn from(&self) -> u64 {
        self.from
    }

    /// The last block of the range.
    pub const fn to(&self) -> u64 {
        self.to
    }

    /// The number of blocks covered by the range.
    pub const fn len(&self) -> u64 {
        self.to - self.from + 1
    }

    /// An inclusive range is never empty.
    pub const fn is_empty(&self) -> bool {
        false
    }

    /// Returns true if `other` starts exactly one block after this range ends.
    pub const fn is_adjacent(&self, other: &Self) -> bool {
        self.to + 1 == other.from
    }

    /// Returns true if the ranges share at least one block.
    pub const fn overlaps(&self, other: &Self) -> bool {
        self.from <= other.to && other.from <= self.to
    }

    /// Returns true if `block` lies within the range.
    pub const fn contains(&self, block: u64) -> bool {
        self.from <= block && block <= self.to
    }
}

impl Display for BlockRange {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.from, self.to)
    }
}

#[cfg(any(test, feature = "arbitrary"))]
impl arbitrary::Arbitrary<'_> for BlockRange {
    fn arbitrary(u: &mut arbitrary::Unstructured<'_>) -> arbitrary::Result<Self> {
        let from = u.int_in_range(0..=u32::MAX)? as u64;
        let len = u.int_in_range(1..=u16::MAX)? as u64;
        Ok(Self { from, to: from + len - 1 })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_inverted_range() {
        assert_eq!(BlockRange::new(10, 9), Err(InvalidBlockRange { from: 10, to: 9 }));
    }

    #[test]
    fn test_len_counts_inclusive_bounds() {
        assert_eq!(BlockRange::new(100, 109).unwrap().len(), 10);
        assert_eq!(BlockRange::new(5, 5).unwrap().len(), 1);
    }

    #[test]
    fn test_adjacency() {
        let low = BlockRange::new(0, 4).unwrap();
        let high = BlockRange::new(5, 9).unwrap();
        assert!(low.is_adjacent(&high));
        assert!(!high.is_adjacent(&low));
        assert!(!low.is_adjacent(&BlockRange::new(6, 9).unwrap()));
    }

    #[test]
    fn test_overlap() {
        let low = BlockRange::new(0, 4).unwrap();
        assert!(low.overlaps(&BlockRange::new(4, 8).unwrap()));
        assert!(low.overlaps(&BlockRange::new(0, 0).unwrap()));
        assert!(!low.overlaps(&BlockRange::new(5, 8).unwrap()));
    }

    #[test]
    fn test_arbitrary_ranges_are_well_formed() {
        use arbitrary::Arbitrary;

        let mut bytes = [0u8; 256];
        rand::RngCore::fill_bytes(&mut rand::rng(), &mut bytes);
        let mut u = arbitrary::Unstructured::new(&bytes);

        for _ in 0..16 {
            let range = BlockRange::arbitrary(&mut u).unwrap();
            assert!(range.from() <= range.to());
        }
    }

    #[test]
    fn test_orders_by_first_block() {
        let mut ranges =
            vec![BlockRange::new(10, 14).unwrap(), BlockRange::new(0, 4).unwrap()];
        ranges.sort();
        assert_eq!(ranges[0].from(), 0);
    }
}

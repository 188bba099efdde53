use crate::RollupInfoChunk;
use core::fmt::{self, Display, Formatter};

/// A control event emitted by the producer alongside data chunks.
#[derive(Debug, Copy, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ControlEvent {
    /// The producer has caught up with the last known block on L1 and has no
    /// range in flight.
    FullySynced,
}

/// A message yielded on the producer's outgoing channel.
///
/// Consumers must handle both variants: data chunks arrive in strict
/// ascending block order, control events are interleaved at the point they
/// occurred.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum L1SyncMessage {
    /// The rollup info of one block range.
    Data(RollupInfoChunk),
    /// A producer control event.
    Control(ControlEvent),
}

impl Display for L1SyncMessage {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Data(chunk) => {
                write!(f, "Data {{ range: {}, events: {} }}", chunk.range, chunk.event_count())
            }
            Self::Control(event) => write!(f, "Control({event})"),
        }
    }
}

impl Display for ControlEvent {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::FullySynced => write!(f, "FullySynced"),
        }
    }
}

//! Primitive types for the rollup sync producer.

pub use range::{BlockRange, InvalidBlockRange};
mod range;

pub use block::{L1BlockRecord, RollupEvent};
mod block;

pub use chunk::RollupInfoChunk;
mod chunk;

pub use message::{ControlEvent, L1SyncMessage};
mod message;

//! Chunk wire format and codec.
//!
//! A sealed chunk is a single byte of format tag followed by a compressed
//! stream of `(u32 timestamp, f64 value)` pairs in ascending timestamp
//! order. The stream is byte-aligned Gorilla-style: timestamps are stored
//! as zigzag-varint delta-of-deltas, values as varint XORs of the previous
//! value's bits.

mod codec;
mod itergen;

pub use codec::{ChunkEncoder, ChunkIter};
pub use itergen::IterGen;

use crate::{Error, Result};

/// Chunk payload format tag. Occupies the first byte of every persisted
/// chunk. Only one format is currently defined; unknown tags are rejected
/// at read time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Format {
    /// Zigzag-varint delta-of-delta timestamps, varint XOR values.
    StandardZip = 0,
}

impl Format {
    pub fn from_tag(tag: u8) -> Result<Format> {
        match tag {
            0 => Ok(Format::StandardZip),
            other => Err(Error::Corrupt(format!("unknown chunk format tag {other}"))),
        }
    }

    pub fn tag(self) -> u8 {
        self as u8
    }
}

//! Reusable iterator handles over sealed chunk payloads.

use super::codec::ChunkIter;
use super::Format;
use crate::{Error, Result};
use bytes::Bytes;

/// A handle over one sealed chunk that can materialize an ascending point
/// iterator any number of times from the original bytes.
///
/// The held bytes are the compressed stream without the leading format tag.
/// `span` is the chunk span in seconds, or 0 when unknown (chunks read back
/// from storage written before spans were tracked).
#[derive(Debug, Clone)]
pub struct IterGen {
    t0: u32,
    span: u32,
    bytes: Bytes,
}

impl IterGen {
    /// Wrap a freshly sealed stream (no format tag).
    pub fn new(t0: u32, span: u32, bytes: Bytes) -> Self {
        Self { t0, span, bytes }
    }

    /// Build a handle from a persisted payload: one format tag byte plus
    /// the stream. Payloads shorter than 2 bytes or carrying an unknown
    /// tag are corrupt.
    pub fn from_payload(t0: u32, span: u32, payload: Bytes) -> Result<Self> {
        if payload.len() < 2 {
            return Err(Error::Corrupt(format!(
                "chunk payload too short: {} bytes",
                payload.len()
            )));
        }
        Format::from_tag(payload[0])?;
        Ok(Self {
            t0,
            span,
            bytes: payload.slice(1..),
        })
    }

    /// Inclusive start timestamp of the chunk.
    pub fn ts(&self) -> u32 {
        self.t0
    }

    /// Chunk span in seconds, or 0 when unknown.
    pub fn span(&self) -> u32 {
        self.span
    }

    /// Exclusive end timestamp, when the span is known.
    pub fn end_ts(&self) -> Option<u32> {
        (self.span > 0).then(|| self.t0 + self.span)
    }

    /// Size of the compressed stream, used for cache accounting.
    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    /// The stream without the format tag, as enqueued for persistence.
    pub fn bytes(&self) -> Bytes {
        self.bytes.clone()
    }

    /// Materialize an ascending `(ts, value)` iterator.
    pub fn iter(&self) -> ChunkIter {
        ChunkIter::new(self.bytes.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::ChunkEncoder;

    fn sealed(t0: u32, points: &[(u32, f64)]) -> Bytes {
        let mut enc = ChunkEncoder::new(t0);
        for &(ts, v) in points {
            enc.push(ts, v).unwrap();
        }
        enc.seal()
    }

    #[test]
    fn iter_is_restartable() {
        let ig = IterGen::new(60, 60, sealed(60, &[(60, 1.0), (70, 2.0)]));
        let a: Vec<_> = ig.iter().collect();
        let b: Vec<_> = ig.iter().collect();
        assert_eq!(a, b);
        assert_eq!(a, vec![(60, 1.0), (70, 2.0)]);
    }

    #[test]
    fn span_accessors() {
        let ig = IterGen::new(600, 600, Bytes::from_static(&[0, 0, 0]));
        assert_eq!(ig.ts(), 600);
        assert_eq!(ig.span(), 600);
        assert_eq!(ig.end_ts(), Some(1200));

        let legacy = IterGen::new(600, 0, Bytes::from_static(&[0, 0, 0]));
        assert_eq!(legacy.span(), 0);
        assert_eq!(legacy.end_ts(), None);
    }

    #[test]
    fn from_payload_strips_tag() {
        let stream = sealed(0, &[(0, 0.5), (10, 0.25)]);
        let mut payload = Vec::with_capacity(stream.len() + 1);
        payload.push(Format::StandardZip.tag());
        payload.extend_from_slice(&stream);

        let ig = IterGen::from_payload(0, 0, Bytes::from(payload)).unwrap();
        let points: Vec<_> = ig.iter().collect();
        assert_eq!(points, vec![(0, 0.5), (10, 0.25)]);
    }

    #[test]
    fn from_payload_rejects_short_and_unknown() {
        assert!(matches!(
            IterGen::from_payload(0, 0, Bytes::from_static(&[0])),
            Err(Error::Corrupt(_))
        ));
        assert!(matches!(
            IterGen::from_payload(0, 0, Bytes::from_static(&[9, 1, 2, 3])),
            Err(Error::Corrupt(_))
        ));
    }
}

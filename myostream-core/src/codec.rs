//! Wire frame codec.
//!
//! The producer sends fixed-size frames: `channels * samples * 4` bytes of
//! little-endian f32 values in row-major (channel, then sample) order. There
//! is no header, length prefix, or checksum — frame boundaries are purely
//! byte-count based, so the reader upstream must hand this codec exactly one
//! frame's worth of bytes at a time.

use crate::chunk::SampleChunk;
use crate::error::{MyoError, Result};

/// Stateless decoder/encoder for one frame shape.
#[derive(Debug, Clone, Copy)]
pub struct FrameCodec {
    channels: usize,
    samples_per_chunk: usize,
}

impl FrameCodec {
    pub fn new(channels: usize, samples_per_chunk: usize) -> Self {
        Self {
            channels,
            samples_per_chunk,
        }
    }

    /// Exact frame size in bytes.
    pub fn frame_len(&self) -> usize {
        self.channels * self.samples_per_chunk * 4
    }

    /// Decode one complete frame. All-or-nothing: there is no partial mode.
    ///
    /// # Errors
    /// Returns `MyoError::FrameSize` when `bytes.len() != frame_len()`.
    /// With correct fixed-size framing upstream this cannot happen; the check
    /// is an assertion boundary, not input validation.
    pub fn decode(&self, bytes: &[u8]) -> Result<SampleChunk> {
        let expected = self.frame_len();
        if bytes.len() != expected {
            return Err(MyoError::FrameSize {
                expected,
                actual: bytes.len(),
            });
        }

        let mut data = Vec::with_capacity(self.channels * self.samples_per_chunk);
        for word in bytes.chunks_exact(4) {
            data.push(f32::from_le_bytes([word[0], word[1], word[2], word[3]]));
        }

        SampleChunk::new(self.channels, self.samples_per_chunk, data)
    }

    /// Encode a chunk into one wire frame — the exact inverse of `decode`.
    ///
    /// Used by the feed generator and by test harnesses; the service itself
    /// only ever decodes.
    pub fn encode(&self, chunk: &SampleChunk) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.frame_len());
        for sample in chunk.as_flat() {
            out.extend_from_slice(&sample.to_le_bytes());
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_encode_round_trip() {
        let codec = FrameCodec::new(3, 4);
        let data: Vec<f32> = (0..12).map(|i| i as f32 * 0.25 - 1.0).collect();
        let chunk = SampleChunk::new(3, 4, data).unwrap();

        let bytes = codec.encode(&chunk);
        assert_eq!(bytes.len(), codec.frame_len());
        let decoded = codec.decode(&bytes).unwrap();
        assert_eq!(decoded, chunk);
    }

    #[test]
    fn decode_rejects_any_other_length() {
        let codec = FrameCodec::new(2, 2);
        for len in [0, 1, 15, 17, 32] {
            let err = codec.decode(&vec![0u8; len]).unwrap_err();
            assert!(matches!(
                err,
                MyoError::FrameSize {
                    expected: 16,
                    actual
                } if actual == len
            ));
        }
    }

    #[test]
    fn default_frame_decodes_to_32_by_18_row_major() {
        let codec = FrameCodec::new(32, 18);
        assert_eq!(codec.frame_len(), 2_304);

        let values: Vec<f32> = (0..576).map(|i| i as f32).collect();
        let mut bytes = Vec::with_capacity(2_304);
        for v in &values {
            bytes.extend_from_slice(&v.to_le_bytes());
        }

        let chunk = codec.decode(&bytes).unwrap();
        assert_eq!(chunk.channels(), 32);
        assert_eq!(chunk.samples_per_channel(), 18);
        assert_eq!(chunk.as_flat(), &values[..]);
        // Channel rows follow the flat order exactly.
        assert_eq!(chunk.channel(0).unwrap(), &values[0..18]);
        assert_eq!(chunk.channel(31).unwrap(), &values[558..576]);
    }

    #[test]
    fn little_endian_on_the_wire() {
        let codec = FrameCodec::new(1, 1);
        let chunk = SampleChunk::new(1, 1, vec![1.0]).unwrap();
        assert_eq!(codec.encode(&chunk), vec![0x00, 0x00, 0x80, 0x3f]);
    }
}

//! Typed sample chunk passed from the wire codec to the buffer and consumers.

use serde::{Deserialize, Serialize};

use crate::error::{MyoError, Result};

/// One decoded network frame: a channels × samples matrix of f32 samples,
/// stored row-major (all of channel 0, then all of channel 1, ...).
///
/// Immutable after construction; the buffer keeps its own clone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SampleChunk {
    channels: usize,
    samples_per_channel: usize,
    data: Vec<f32>,
}

impl SampleChunk {
    /// Build a chunk from row-major sample data.
    ///
    /// # Errors
    /// Returns `MyoError::ChannelShape` when `data.len()` is not
    /// `channels * samples_per_channel`.
    pub fn new(channels: usize, samples_per_channel: usize, data: Vec<f32>) -> Result<Self> {
        let expected = channels * samples_per_channel;
        if data.len() != expected {
            return Err(MyoError::ChannelShape {
                expected: channels,
                actual: data.len().checked_div(samples_per_channel).unwrap_or(0),
            });
        }
        Ok(Self {
            channels,
            samples_per_channel,
            data,
        })
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn samples_per_channel(&self) -> usize {
        self.samples_per_channel
    }

    /// Samples of one channel, in arrival order.
    ///
    /// # Errors
    /// Returns `MyoError::ChannelRange` for `index >= channels`.
    pub fn channel(&self, index: usize) -> Result<&[f32]> {
        if index >= self.channels {
            return Err(MyoError::ChannelRange {
                index,
                channels: self.channels,
            });
        }
        let start = index * self.samples_per_channel;
        Ok(&self.data[start..start + self.samples_per_channel])
    }

    /// The full matrix as a flat row-major slice.
    pub fn as_flat(&self) -> &[f32] {
        &self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_slices_are_row_major() {
        let chunk = SampleChunk::new(2, 3, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
        assert_eq!(chunk.channel(0).unwrap(), &[1.0, 2.0, 3.0]);
        assert_eq!(chunk.channel(1).unwrap(), &[4.0, 5.0, 6.0]);
    }

    #[test]
    fn constructor_rejects_wrong_length() {
        let err = SampleChunk::new(2, 3, vec![0.0; 5]).unwrap_err();
        assert!(matches!(err, MyoError::ChannelShape { .. }));
    }

    #[test]
    fn channel_out_of_range_fails() {
        let chunk = SampleChunk::new(2, 2, vec![0.0; 4]).unwrap();
        let err = chunk.channel(2).unwrap_err();
        assert!(matches!(
            err,
            MyoError::ChannelRange {
                index: 2,
                channels: 2
            }
        ));
    }
}

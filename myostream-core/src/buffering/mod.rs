//! Bounded rolling retention of decoded chunks.
//!
//! `ChunkRing` is a fixed-capacity slot ring: once full, each append
//! overwrites the oldest retained chunk. Capacity is set at construction and
//! never resized, so memory stays bounded no matter how long the stream runs.
//!
//! # Threading
//!
//! The ring itself is plain data. Cross-thread sharing goes through
//! [`BufferHandle`], which serialises the single writer (the ingestion
//! thread) against readers with one `parking_lot::Mutex`. Handle methods keep
//! the lock scoped to the ring mutation or read traversal only — signal
//! processing always happens on a copied-out `Vec`, outside the lock.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::chunk::SampleChunk;
use crate::error::{MyoError, Result};

/// Fixed-capacity ring of chunks, indexed per channel on read.
#[derive(Debug)]
pub struct ChunkRing {
    capacity: usize,
    channels: usize,
    slots: Vec<SampleChunk>,
    /// Slot the next append overwrites once the ring is full.
    next: usize,
}

impl ChunkRing {
    /// Allocate a ring retaining at most `capacity` chunks of `channels`
    /// channels each. Starts empty.
    ///
    /// # Panics
    /// Panics if `capacity` or `channels` is zero — both are construction-time
    /// configuration, not runtime input.
    pub fn new(capacity: usize, channels: usize) -> Self {
        assert!(capacity > 0, "ring capacity must be at least 1");
        assert!(channels > 0, "channel count must be at least 1");
        Self {
            capacity,
            channels,
            slots: Vec::with_capacity(capacity),
            next: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Number of chunks currently retained (≤ capacity).
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Insert `chunk` as newest; at capacity the oldest chunk is overwritten.
    ///
    /// # Errors
    /// Returns `MyoError::ChannelShape` when the chunk's channel count does
    /// not match the ring's, leaving the ring unchanged.
    pub fn append(&mut self, chunk: SampleChunk) -> Result<()> {
        if chunk.channels() != self.channels {
            return Err(MyoError::ChannelShape {
                expected: self.channels,
                actual: chunk.channels(),
            });
        }

        if self.slots.len() < self.capacity {
            self.slots.push(chunk);
        } else {
            self.slots[self.next] = chunk;
            self.next = (self.next + 1) % self.capacity;
        }
        Ok(())
    }

    /// Concatenation of channel `index` across all retained chunks,
    /// oldest first. Empty when the ring is empty. Pure read — repeated
    /// calls before the next append return the same data.
    ///
    /// # Errors
    /// Returns `MyoError::ChannelRange` for `index >= channels`.
    pub fn get_channel(&self, index: usize) -> Result<Vec<f32>> {
        if index >= self.channels {
            return Err(MyoError::ChannelRange {
                index,
                channels: self.channels,
            });
        }

        let mut out = Vec::new();
        for chunk in self.iter_oldest_first() {
            out.extend_from_slice(chunk.channel(index)?);
        }
        Ok(out)
    }

    /// The newest retained chunk, if any.
    pub fn latest(&self) -> Option<&SampleChunk> {
        if self.slots.is_empty() {
            None
        } else if self.slots.len() < self.capacity {
            self.slots.last()
        } else {
            // Full ring: `next` points at the oldest slot, so the newest is
            // the one just behind it.
            let newest = (self.next + self.capacity - 1) % self.capacity;
            Some(&self.slots[newest])
        }
    }

    /// Discard all retained chunks; capacity and channel count are unchanged.
    pub fn clear(&mut self) {
        self.slots.clear();
        self.next = 0;
    }

    fn iter_oldest_first(&self) -> impl Iterator<Item = &SampleChunk> {
        let (tail, head) = if self.slots.len() < self.capacity {
            (&self.slots[..], &self.slots[0..0])
        } else {
            // Full ring: oldest lives at `next`.
            (&self.slots[self.next..], &self.slots[..self.next])
        };
        tail.iter().chain(head.iter())
    }
}

/// Thread-safe reference-counted handle to a [`ChunkRing`].
///
/// Cloneable; all clones share the same ring. Uses `parking_lot::Mutex` for
/// non-poisoning locks and cheap uncontended acquisition.
#[derive(Clone)]
pub struct BufferHandle(Arc<Mutex<ChunkRing>>);

impl BufferHandle {
    pub fn new(capacity: usize, channels: usize) -> Self {
        Self(Arc::new(Mutex::new(ChunkRing::new(capacity, channels))))
    }

    /// Append from the ingestion thread. Lock covers only the ring mutation.
    pub fn append(&self, chunk: SampleChunk) -> Result<()> {
        self.0.lock().append(chunk)
    }

    /// Copy out one channel's retained samples. The lock covers only the
    /// traversal; callers run any DSP on the returned `Vec` lock-free.
    pub fn get_channel(&self, index: usize) -> Result<Vec<f32>> {
        self.0.lock().get_channel(index)
    }

    pub fn latest(&self) -> Option<SampleChunk> {
        self.0.lock().latest().cloned()
    }

    pub fn is_empty(&self) -> bool {
        self.0.lock().is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.lock().len()
    }

    pub fn clear(&self) {
        self.0.lock().clear()
    }
}

impl std::fmt::Debug for BufferHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let ring = self.0.lock();
        f.debug_struct("BufferHandle")
            .field("len", &ring.len())
            .field("capacity", &ring.capacity())
            .field("channels", &ring.channels())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(channels: usize, samples: usize, fill: impl Fn(usize) -> f32) -> SampleChunk {
        let data = (0..channels * samples).map(fill).collect();
        SampleChunk::new(channels, samples, data).unwrap()
    }

    #[test]
    fn starts_empty_and_reads_empty() {
        let ring = ChunkRing::new(4, 2);
        assert!(ring.is_empty());
        assert_eq!(ring.get_channel(0).unwrap(), Vec::<f32>::new());
        assert_eq!(ring.get_channel(1).unwrap(), Vec::<f32>::new());
        assert!(ring.latest().is_none());
    }

    #[test]
    fn get_channel_out_of_range_fails() {
        let ring = ChunkRing::new(4, 2);
        assert!(matches!(
            ring.get_channel(2),
            Err(MyoError::ChannelRange {
                index: 2,
                channels: 2
            })
        ));
    }

    #[test]
    fn append_rejects_shape_mismatch_and_leaves_ring_unchanged() {
        let mut ring = ChunkRing::new(4, 2);
        ring.append(chunk(2, 3, |i| i as f32)).unwrap();

        let err = ring.append(chunk(3, 3, |_| 0.0)).unwrap_err();
        assert!(matches!(
            err,
            MyoError::ChannelShape {
                expected: 2,
                actual: 3
            }
        ));
        assert_eq!(ring.len(), 1);
        assert_eq!(ring.get_channel(0).unwrap(), vec![0.0, 1.0, 2.0]);
    }

    #[test]
    fn ring_overwrites_oldest_at_capacity() {
        // Capacity 3, channels 2, 2 samples per chunk. Four appends evict
        // the first chunk completely.
        let mut ring = ChunkRing::new(3, 2);
        let a = SampleChunk::new(2, 2, vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        let b = SampleChunk::new(2, 2, vec![5.0, 6.0, 7.0, 8.0]).unwrap();
        let c = SampleChunk::new(2, 2, vec![9.0, 10.0, 11.0, 12.0]).unwrap();
        let d = SampleChunk::new(2, 2, vec![13.0, 14.0, 15.0, 16.0]).unwrap();

        for ch in [a, b, c, d] {
            ring.append(ch).unwrap();
        }

        assert_eq!(ring.len(), 3);
        assert_eq!(ring.get_channel(0).unwrap(), vec![5.0, 6.0, 9.0, 10.0, 13.0, 14.0]);
        assert_eq!(ring.get_channel(1).unwrap(), vec![7.0, 8.0, 11.0, 12.0, 15.0, 16.0]);
    }

    #[test]
    fn capacity_n_retains_exactly_last_n() {
        let mut ring = ChunkRing::new(3, 1);
        for i in 0..7 {
            ring.append(chunk(1, 2, |s| (i * 10 + s) as f32)).unwrap();
        }
        // Chunks 4, 5, 6 survive, oldest first.
        assert_eq!(
            ring.get_channel(0).unwrap(),
            vec![40.0, 41.0, 50.0, 51.0, 60.0, 61.0]
        );
    }

    #[test]
    fn latest_tracks_newest_through_wraparound() {
        let mut ring = ChunkRing::new(2, 1);
        for i in 0..5 {
            ring.append(chunk(1, 1, |_| i as f32)).unwrap();
            assert_eq!(ring.latest().unwrap().channel(0).unwrap(), &[i as f32]);
        }
    }

    #[test]
    fn clear_empties_but_keeps_shape() {
        let mut ring = ChunkRing::new(2, 2);
        ring.append(chunk(2, 2, |i| i as f32)).unwrap();
        ring.clear();

        assert!(ring.is_empty());
        assert_eq!(ring.capacity(), 2);
        assert_eq!(ring.channels(), 2);
        // Still usable after clear, including a fresh wraparound.
        for i in 0..3 {
            ring.append(chunk(2, 2, |s| (i * 100 + s) as f32)).unwrap();
        }
        assert_eq!(ring.get_channel(0).unwrap(), vec![100.0, 101.0, 200.0, 201.0]);
    }

    #[test]
    fn reads_are_idempotent_between_appends() {
        let mut ring = ChunkRing::new(2, 1);
        ring.append(chunk(1, 3, |s| s as f32)).unwrap();
        let first = ring.get_channel(0).unwrap();
        let second = ring.get_channel(0).unwrap();
        assert_eq!(first, second);
        assert_eq!(ring.len(), 1);
    }

    #[test]
    fn handle_serialises_writer_against_readers() {
        use std::thread;

        let handle = BufferHandle::new(8, 2);
        let writer = handle.clone();

        let t = thread::spawn(move || {
            for i in 0..200 {
                writer
                    .append(chunk(2, 4, |s| (i * 10 + s) as f32))
                    .unwrap();
            }
        });

        // Concurrent reads must always observe whole chunks: every retained
        // channel row is a multiple of 4 samples long.
        for _ in 0..200 {
            let row = handle.get_channel(0).unwrap();
            assert_eq!(row.len() % 4, 0);
        }

        t.join().unwrap();
        assert_eq!(handle.len(), 8);
    }
}

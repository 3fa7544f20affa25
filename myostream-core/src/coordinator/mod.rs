//! `StreamCoordinator` — the consumer-facing front of the core.
//!
//! Owns the rolling buffer and the ingestion service, gates "new data"
//! notifications behind a pause flag, and answers on-demand per-channel
//! queries through the DSP layer.
//!
//! ## Ordering contract
//!
//! The chunk sink runs on the ingestion thread: it appends to the buffer
//! first and only then broadcasts the notification, so an event for chunk K
//! is never observed before K is readable through `channel_data`. Chunks
//! arrive at subscribers in strict network-arrival order.
//!
//! ## Pause semantics
//!
//! `pause()` suppresses notifications only — ingestion and buffering
//! continue untouched. `resume()` re-emits the latest buffered chunk so a
//! consumer repaints immediately instead of waiting for the next frame.

use std::net::SocketAddr;
use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc,
};

use tokio::sync::broadcast;
use tracing::warn;

use crate::buffering::BufferHandle;
use crate::config::StreamConfig;
use crate::dsp::{self, SignalKind, SignalStats};
use crate::error::Result;
use crate::events::{ChunkEvent, LinkStatusEvent};
use crate::ingest::IngestionService;

/// Broadcast capacity: chunk events buffered per subscriber before lag.
const BROADCAST_CAP: usize = 256;

/// Owns one buffer + one ingestion service; `Send + Sync`, wrap in `Arc`
/// to share with consumer threads.
pub struct StreamCoordinator {
    config: StreamConfig,
    buffer: BufferHandle,
    service: IngestionService,
    paused: Arc<AtomicBool>,
    chunk_tx: broadcast::Sender<ChunkEvent>,
    status_tx: broadcast::Sender<LinkStatusEvent>,
    seq: Arc<AtomicU64>,
}

impl StreamCoordinator {
    /// Build the coordinator. Ingestion does not start until
    /// [`start_ingestion`](Self::start_ingestion) is called.
    pub fn new(config: StreamConfig) -> Self {
        let (chunk_tx, _) = broadcast::channel(BROADCAST_CAP);
        let (status_tx, _) = broadcast::channel(BROADCAST_CAP);
        let buffer = BufferHandle::new(config.capacity_chunks, config.channels);
        let service = IngestionService::new(&config, status_tx.clone());

        Self {
            config,
            buffer,
            service,
            paused: Arc::new(AtomicBool::new(false)),
            chunk_tx,
            status_tx,
            seq: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Start the ingestion service; returns the bound address.
    ///
    /// # Errors
    /// - `MyoError::AlreadyRunning` if ingestion is already running.
    /// - `MyoError::Io` if the listener cannot be bound.
    pub fn start_ingestion(&self) -> Result<SocketAddr> {
        let buffer = self.buffer.clone();
        let paused = Arc::clone(&self.paused);
        let chunk_tx = self.chunk_tx.clone();
        let seq = Arc::clone(&self.seq);

        self.service.start(Box::new(move |chunk| {
            // Append before notifying — subscribers must always find the
            // chunk already readable.
            if let Err(e) = buffer.append(chunk.clone()) {
                // Malformed chunk: drop it, keep the stream alive.
                warn!("dropping chunk: {e}");
                return;
            }
            if !paused.load(Ordering::SeqCst) {
                let _ = chunk_tx.send(ChunkEvent {
                    seq: seq.fetch_add(1, Ordering::Relaxed),
                    chunk,
                });
            }
        }))
    }

    /// Stop the ingestion service. Buffered data is retained.
    ///
    /// # Errors
    /// - `MyoError::NotRunning` if ingestion is not running.
    pub fn stop_ingestion(&self) -> Result<()> {
        self.service.stop()
    }

    pub fn is_ingesting(&self) -> bool {
        self.service.is_running()
    }

    /// Suppress "new data" notifications. Ingestion and buffering continue.
    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    /// Re-enable notifications and re-emit the latest buffered chunk, if
    /// any, so a consumer repaints without waiting for new data.
    pub fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
        if let Some(chunk) = self.buffer.latest() {
            let _ = self.chunk_tx.send(ChunkEvent {
                seq: self.seq.fetch_add(1, Ordering::Relaxed),
                chunk,
            });
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    /// One channel's retained samples in the requested representation.
    ///
    /// The buffer lock is released before any DSP runs.
    ///
    /// # Errors
    /// - `MyoError::ChannelRange` for an invalid channel index.
    pub fn channel_data(&self, index: usize, kind: SignalKind) -> Result<Vec<f32>> {
        let raw = self.buffer.get_channel(index)?;
        Ok(dsp::select(raw, kind, &self.config.dsp))
    }

    /// Summary statistics over one channel's raw samples; `None` while the
    /// buffer is empty.
    ///
    /// # Errors
    /// - `MyoError::ChannelRange` for an invalid channel index.
    pub fn channel_stats(&self, index: usize) -> Result<Option<SignalStats>> {
        let raw = self.buffer.get_channel(index)?;
        Ok(SignalStats::from_samples(&raw))
    }

    pub fn has_data(&self) -> bool {
        !self.buffer.is_empty()
    }

    /// Discard all retained chunks. Capacity and channel count unchanged.
    pub fn clear(&self) {
        self.buffer.clear();
    }

    /// Subscribe to "new data" notifications.
    pub fn subscribe_chunks(&self) -> broadcast::Receiver<ChunkEvent> {
        self.chunk_tx.subscribe()
    }

    /// Subscribe to connection lifecycle transitions.
    pub fn subscribe_status(&self) -> broadcast::Receiver<LinkStatusEvent> {
        self.status_tx.subscribe()
    }

    /// Shared handle to the underlying buffer.
    pub fn buffer(&self) -> BufferHandle {
        self.buffer.clone()
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }
}

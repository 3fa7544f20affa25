//! # myostream-core
//!
//! Multi-channel signal stream backend: TCP ingestion, bounded retention,
//! on-demand signal conditioning.
//!
//! ## Architecture
//!
//! ```text
//! Producer (TCP) → IngestionService → FrameCodec → SampleChunk
//!                                                      │
//!                                          BufferHandle::append  (always)
//!                                                      │
//!                                     broadcast ChunkEvent  (unless paused)
//!
//! Consumer pull: channel_data(i, kind) → BufferHandle::get_channel → dsp::select
//! ```
//!
//! One dedicated thread blocks on the network; consumers read the buffer
//! and run DSP on their own threads. The buffer mutex is the only point of
//! contact and is never held across a DSP call.

#![forbid(unsafe_code)]
#![warn(clippy::all)]

pub mod buffering;
pub mod chunk;
pub mod codec;
pub mod config;
pub mod coordinator;
pub mod dsp;
pub mod error;
pub mod events;
pub mod ingest;

// Convenience re-exports for downstream crates
pub use buffering::{BufferHandle, ChunkRing};
pub use chunk::SampleChunk;
pub use codec::FrameCodec;
pub use config::{DspParams, StreamConfig};
pub use coordinator::StreamCoordinator;
pub use dsp::{SignalKind, SignalStats};
pub use error::MyoError;
pub use events::{ChunkEvent, LinkState, LinkStatusEvent};
pub use ingest::IngestionService;

//! TCP ingestion service.
//!
//! One dedicated OS thread owns the listening socket and blocks on
//! accept/read; everything else in the process only ever talks to the
//! service through the chunk sink and the status broadcast.
//!
//! ## Lifecycle
//!
//! ```text
//! IngestionService::new()
//!     └─► start(sink)     → bound, thread spawned   Idle → Listening → Accepting
//!         peer connects   → frames decoded           Accepting → Streaming
//!         peer drops      → automatic re-accept      Streaming → Accepting
//!         └─► stop()      → flag + socket shutdown   any → Closing
//! ```
//!
//! ## Stop mechanics
//!
//! The accept loop polls a non-blocking listener on a short interval and
//! frame reads use a socket read timeout, so the stop flag is observed at
//! bounded intervals even with an idle peer. `stop()` additionally shuts
//! down any live client socket, which unblocks an in-flight read
//! immediately; the resulting error is treated as a normal shutdown.

use std::io::{ErrorKind, Read};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::thread::JoinHandle;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

use crate::chunk::SampleChunk;
use crate::codec::FrameCodec;
use crate::config::StreamConfig;
use crate::error::{MyoError, Result};
use crate::events::{LinkState, LinkStatusEvent};

/// How often the accept loop re-checks the stop flag with no peer around.
const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Read timeout on the client socket; bounds how long a stop request can
/// sit unobserved while a peer is connected but silent.
const READ_TIMEOUT: Duration = Duration::from_millis(200);

/// Chunk sink registered by the consumer side; invoked on the service
/// thread for every decoded frame, in strict arrival order.
pub type ChunkSink = Box<dyn FnMut(SampleChunk) + Send>;

/// Why a connection ended.
enum PeerEnd {
    /// Zero-length read: the peer closed the stream (possibly mid-frame).
    Disconnected,
    /// The stop flag was raised while serving this peer.
    Stopped,
    /// A frame failed to decode; the connection is abandoned.
    DecodeFailed,
}

/// Accepts one producer connection at a time and turns its byte stream
/// into decoded chunks.
pub struct IngestionService {
    host: String,
    port: u16,
    codec: FrameCodec,
    status_tx: broadcast::Sender<LinkStatusEvent>,
    running: Arc<AtomicBool>,
    /// Live client socket, shared so `stop()` can shut it down.
    client: Arc<Mutex<Option<TcpStream>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    local_addr: Mutex<Option<SocketAddr>>,
}

impl IngestionService {
    pub fn new(config: &StreamConfig, status_tx: broadcast::Sender<LinkStatusEvent>) -> Self {
        Self {
            host: config.host.clone(),
            port: config.port,
            codec: FrameCodec::new(config.channels, config.samples_per_chunk),
            status_tx,
            running: Arc::new(AtomicBool::new(false)),
            client: Arc::new(Mutex::new(None)),
            worker: Mutex::new(None),
            local_addr: Mutex::new(None),
        }
    }

    /// Bind the listener and spawn the service thread.
    ///
    /// Blocks until the bind is confirmed (or fails), then returns the
    /// actual bound address — relevant when the configured port is 0.
    ///
    /// # Errors
    /// - `MyoError::AlreadyRunning` if already started.
    /// - `MyoError::Io` if the listener cannot be bound.
    pub fn start(&self, on_chunk: ChunkSink) -> Result<SocketAddr> {
        if self.running.load(Ordering::SeqCst) {
            return Err(MyoError::AlreadyRunning);
        }
        self.running.store(true, Ordering::SeqCst);

        self.report(LinkState::Idle, "Starting TCP server...");

        let addr = format!("{}:{}", self.host, self.port);
        let codec = self.codec;
        let running = Arc::clone(&self.running);
        let client = Arc::clone(&self.client);
        let status_tx = self.status_tx.clone();

        // Sync handshake: the service thread confirms bind success/failure
        // back to start() before it enters the accept loop.
        let (bound_tx, bound_rx) = std::sync::mpsc::channel::<Result<SocketAddr>>();

        let handle = std::thread::spawn(move || {
            let listener = match bind_listener(&addr) {
                Ok(l) => l,
                Err(e) => {
                    let _ = bound_tx.send(Err(e));
                    running.store(false, Ordering::SeqCst);
                    return;
                }
            };
            let local = match listener.local_addr() {
                Ok(a) => a,
                Err(e) => {
                    let _ = bound_tx.send(Err(e.into()));
                    running.store(false, Ordering::SeqCst);
                    return;
                }
            };
            let _ = bound_tx.send(Ok(local));

            run_service(ServiceContext {
                listener,
                local,
                codec,
                running,
                client,
                status_tx,
                on_chunk,
            });
        });

        match bound_rx.recv() {
            Ok(Ok(local)) => {
                *self.worker.lock() = Some(handle);
                *self.local_addr.lock() = Some(local);
                info!(%local, "ingestion service started");
                Ok(local)
            }
            Ok(Err(e)) => {
                self.running.store(false, Ordering::SeqCst);
                let _ = handle.join();
                Err(e)
            }
            Err(_) => {
                // Channel closed before a message was sent — the thread died.
                self.running.store(false, Ordering::SeqCst);
                let _ = handle.join();
                Err(MyoError::Other(anyhow::anyhow!(
                    "service thread died before binding"
                )))
            }
        }
    }

    /// Request shutdown and join the service thread.
    ///
    /// Closes any live client socket so a blocked read returns promptly;
    /// the join is bounded by the accept poll interval plus read timeout.
    ///
    /// # Errors
    /// - `MyoError::NotRunning` if not currently running.
    pub fn stop(&self) -> Result<()> {
        if !self.running.load(Ordering::SeqCst) {
            return Err(MyoError::NotRunning);
        }

        self.report(LinkState::Closing, "Stopping TCP server...");
        self.running.store(false, Ordering::SeqCst);

        if let Some(stream) = self.client.lock().as_ref() {
            let _ = stream.shutdown(Shutdown::Both);
        }

        if let Some(handle) = self.worker.lock().take() {
            if handle.join().is_err() {
                error!("ingestion service thread panicked");
            }
        }
        *self.local_addr.lock() = None;
        info!("ingestion service stopped");
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Bound address while running.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        *self.local_addr.lock()
    }

    fn report(&self, state: LinkState, detail: impl Into<String>) {
        let _ = self.status_tx.send(LinkStatusEvent {
            state,
            detail: Some(detail.into()),
        });
    }
}

struct ServiceContext {
    listener: TcpListener,
    local: SocketAddr,
    codec: FrameCodec,
    running: Arc<AtomicBool>,
    client: Arc<Mutex<Option<TcpStream>>>,
    status_tx: broadcast::Sender<LinkStatusEvent>,
    on_chunk: ChunkSink,
}

fn bind_listener(addr: &str) -> Result<TcpListener> {
    let listener = TcpListener::bind(addr)?;
    // Non-blocking accept lets the loop observe the stop flag while idle.
    listener.set_nonblocking(true)?;
    Ok(listener)
}

fn report(status_tx: &broadcast::Sender<LinkStatusEvent>, state: LinkState, detail: String) {
    let _ = status_tx.send(LinkStatusEvent {
        state,
        detail: Some(detail),
    });
}

/// Accept loop: one peer served at a time, automatic return to accepting
/// on peer loss, exits when the stop flag is raised.
fn run_service(mut ctx: ServiceContext) {
    report(
        &ctx.status_tx,
        LinkState::Listening,
        format!("TCP server started on {}", ctx.local),
    );

    while ctx.running.load(Ordering::SeqCst) {
        report(
            &ctx.status_tx,
            LinkState::Accepting,
            "Waiting for connections...".to_string(),
        );

        let (stream, peer) = match accept_next(&ctx.listener, &ctx.running) {
            Some(conn) => conn,
            None => break,
        };

        if let Err(e) = stream.set_read_timeout(Some(READ_TIMEOUT)) {
            warn!(%peer, "failed to set read timeout, dropping connection: {e}");
            continue;
        }

        match stream.try_clone() {
            Ok(clone) => *ctx.client.lock() = Some(clone),
            Err(e) => warn!(%peer, "could not retain client handle for stop(): {e}"),
        }

        report(
            &ctx.status_tx,
            LinkState::Streaming,
            format!("Client connected: {peer}"),
        );
        info!(%peer, "client connected");

        let end = serve_peer(stream, &ctx.codec, &ctx.running, &mut ctx.on_chunk);
        *ctx.client.lock() = None;

        match end {
            Ok(PeerEnd::Disconnected) => {
                info!(%peer, "client disconnected");
            }
            Ok(PeerEnd::DecodeFailed) => {
                warn!(%peer, "dropping client after decode failure");
            }
            Ok(PeerEnd::Stopped) => break,
            Err(e) => {
                // Connection-scoped network error: contained, never fatal
                // to the service.
                warn!(%peer, "connection error: {e}");
            }
        }

        report(
            &ctx.status_tx,
            LinkState::Accepting,
            format!("Client {peer} disconnected"),
        );
    }

    info!("ingestion loop exited");
}

/// Poll for the next connection until one arrives or the stop flag is
/// raised. `None` means stop.
fn accept_next(listener: &TcpListener, running: &AtomicBool) -> Option<(TcpStream, SocketAddr)> {
    loop {
        if !running.load(Ordering::SeqCst) {
            return None;
        }
        match listener.accept() {
            Ok(conn) => return Some(conn),
            Err(e) if e.kind() == ErrorKind::WouldBlock => {
                std::thread::sleep(ACCEPT_POLL_INTERVAL);
            }
            Err(e) => {
                error!("accept failed: {e}");
                std::thread::sleep(ACCEPT_POLL_INTERVAL);
            }
        }
    }
}

/// Read and decode frames from one peer until it disconnects, a frame
/// fails to decode, the stop flag is raised, or the socket errors.
fn serve_peer(
    mut stream: TcpStream,
    codec: &FrameCodec,
    running: &AtomicBool,
    on_chunk: &mut ChunkSink,
) -> std::io::Result<PeerEnd> {
    let frame_len = codec.frame_len();
    let mut frame = vec![0u8; frame_len];

    loop {
        match read_frame(&mut stream, &mut frame, running)? {
            ReadOutcome::Frame => {}
            ReadOutcome::PeerClosed => return Ok(PeerEnd::Disconnected),
            ReadOutcome::Stopped => return Ok(PeerEnd::Stopped),
        }

        match codec.decode(&frame) {
            Ok(chunk) => on_chunk(chunk),
            Err(e) => {
                // Framing is byte-count based, so this cannot happen with a
                // well-behaved peer; escalate to a disconnect, not a crash.
                error!("frame decode failed: {e}");
                return Ok(PeerEnd::DecodeFailed);
            }
        }
    }
}

enum ReadOutcome {
    Frame,
    PeerClosed,
    Stopped,
}

/// Accumulate exactly `buf.len()` bytes, looping over partial reads.
/// A zero-length read at any point is a peer disconnect, not an error.
fn read_frame(
    stream: &mut TcpStream,
    buf: &mut [u8],
    running: &AtomicBool,
) -> std::io::Result<ReadOutcome> {
    let mut filled = 0;
    while filled < buf.len() {
        if !running.load(Ordering::SeqCst) {
            return Ok(ReadOutcome::Stopped);
        }
        match stream.read(&mut buf[filled..]) {
            Ok(0) => return Ok(ReadOutcome::PeerClosed),
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::WouldBlock || e.kind() == ErrorKind::TimedOut => {
                // Read timeout: loop back to re-check the stop flag.
            }
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(ReadOutcome::Frame)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::Mutex as StdMutex;
    use std::time::Instant;

    fn test_config() -> StreamConfig {
        StreamConfig {
            port: 0,
            channels: 2,
            samples_per_chunk: 3,
            capacity_chunks: 8,
            ..StreamConfig::default()
        }
    }

    fn collecting_sink() -> (ChunkSink, Arc<StdMutex<Vec<SampleChunk>>>) {
        let seen = Arc::new(StdMutex::new(Vec::new()));
        let sink_seen = Arc::clone(&seen);
        let sink: ChunkSink = Box::new(move |chunk| sink_seen.lock().unwrap().push(chunk));
        (sink, seen)
    }

    fn wait_until(deadline: Duration, mut cond: impl FnMut() -> bool) -> bool {
        let start = Instant::now();
        while start.elapsed() < deadline {
            if cond() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        false
    }

    #[test]
    fn stop_before_start_is_an_error() {
        let (status_tx, _) = broadcast::channel(16);
        let service = IngestionService::new(&test_config(), status_tx);
        assert!(matches!(service.stop(), Err(MyoError::NotRunning)));
    }

    #[test]
    fn double_start_is_an_error() {
        let (status_tx, _) = broadcast::channel(16);
        let service = IngestionService::new(&test_config(), status_tx);
        let (sink, _) = collecting_sink();
        service.start(sink).unwrap();

        let (sink2, _) = collecting_sink();
        assert!(matches!(service.start(sink2), Err(MyoError::AlreadyRunning)));
        service.stop().unwrap();
    }

    #[test]
    fn one_frame_is_decoded_and_delivered() {
        let config = test_config();
        let (status_tx, _) = broadcast::channel(16);
        let service = IngestionService::new(&config, status_tx);
        let (sink, seen) = collecting_sink();
        let addr = service.start(sink).unwrap();

        let codec = FrameCodec::new(config.channels, config.samples_per_chunk);
        let chunk = SampleChunk::new(2, 3, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
        let mut peer = TcpStream::connect(addr).unwrap();
        peer.write_all(&codec.encode(&chunk)).unwrap();

        assert!(wait_until(Duration::from_secs(2), || !seen
            .lock()
            .unwrap()
            .is_empty()));
        assert_eq!(seen.lock().unwrap()[0], chunk);
        service.stop().unwrap();
    }

    #[test]
    fn partial_frame_then_close_yields_no_chunk() {
        let config = test_config();
        let (status_tx, mut status_rx) = broadcast::channel(64);
        let service = IngestionService::new(&config, status_tx);
        let (sink, seen) = collecting_sink();
        let addr = service.start(sink).unwrap();

        {
            let mut peer = TcpStream::connect(addr).unwrap();
            // Half a frame, then drop the connection.
            peer.write_all(&[0u8; 12]).unwrap();
        }

        // The service must come back to accepting without delivering data.
        assert!(wait_until(Duration::from_secs(2), || {
            while let Ok(event) = status_rx.try_recv() {
                if event.state == LinkState::Accepting
                    && event.detail.as_deref().is_some_and(|d| d.contains("disconnected"))
                {
                    return true;
                }
            }
            false
        }));
        assert!(seen.lock().unwrap().is_empty());
        service.stop().unwrap();
    }

    #[test]
    fn stop_mid_read_returns_promptly() {
        let config = test_config();
        let (status_tx, _) = broadcast::channel(16);
        let service = IngestionService::new(&config, status_tx);
        let (sink, _) = collecting_sink();
        let addr = service.start(sink).unwrap();

        // Connect a peer that never sends a full frame.
        let mut peer = TcpStream::connect(addr).unwrap();
        peer.write_all(&[0u8; 4]).unwrap();
        std::thread::sleep(Duration::from_millis(100));

        let start = Instant::now();
        service.stop().unwrap();
        assert!(
            start.elapsed() < Duration::from_secs(2),
            "stop took {:?}",
            start.elapsed()
        );
        assert!(!service.is_running());
    }
}

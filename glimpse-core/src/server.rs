//! Streaming server: accept loop plus one session task per viewer.
//!
//! [`StreamServer::bind`] claims the listening socket up front, so a
//! port clash surfaces to the caller instead of inside a background
//! task. [`StreamServer::start`] then spawns the accept loop, which
//! spawns one [`run_session`] task per accepted connection. Sessions
//! share a [`ServerState`] handle for connection accounting; the
//! counters are atomics, so sessions never serialise behind each
//! other.
//!
//! A session ends only when something goes wrong: the peer vanishing
//! ends it quietly, a capture or codec failure ends it loudly. The
//! accept loop outlives both.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use bytes::Bytes;
use futures::SinkExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_util::codec::FramedWrite;
use tracing::{debug, info, warn};

use crate::codec::{DEFAULT_MAX_PAYLOAD, GlimpseCodec};
use crate::error::GlimpseError;
use crate::pipeline::{FrameCodec, FrameSource};

// ── ServerState ──────────────────────────────────────────────────

/// Connection accounting shared by the accept loop and every session.
#[derive(Debug, Default)]
pub struct ServerState {
    used_slots: AtomicUsize,
    running: AtomicBool,
}

impl ServerState {
    /// Number of sessions currently inside their send loop.
    pub fn used_slots(&self) -> usize {
        self.used_slots.load(Ordering::SeqCst)
    }

    /// Whether the accept loop should keep going.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Flip the lifecycle flag. The accept loop re-checks it only
    /// after an accept returns, so clearing it does not interrupt a
    /// blocked accept.
    pub fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::SeqCst);
    }

    fn acquire_slot(&self) -> usize {
        self.used_slots.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn release_slot(&self) -> usize {
        self.used_slots.fetch_sub(1, Ordering::SeqCst) - 1
    }
}

// ── ServerOptions ────────────────────────────────────────────────

/// Tuning for [`StreamServer`].
#[derive(Debug, Clone)]
pub struct ServerOptions {
    /// Every capture is scaled to this size before encoding.
    pub stream_size: (u32, u32),
    /// Codec quality, fixed for the lifetime of the server.
    pub quality: u8,
    /// Upper bound on one encoded frame on the wire.
    pub max_payload: usize,
    /// Minimum time between frames; `None` streams as fast as capture
    /// and encode allow.
    pub frame_interval: Option<Duration>,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            stream_size: (1000, 600),
            quality: 90,
            max_payload: DEFAULT_MAX_PAYLOAD,
            frame_interval: Some(Duration::from_millis(33)),
        }
    }
}

// ── StreamServer ─────────────────────────────────────────────────

/// Owns the listening socket and fans frames out to every connected
/// viewer.
pub struct StreamServer {
    listener: Option<TcpListener>,
    local_addr: SocketAddr,
    state: Arc<ServerState>,
    source: Arc<dyn FrameSource>,
    codec: Arc<dyn FrameCodec>,
    options: ServerOptions,
}

impl StreamServer {
    /// Bind the listening socket immediately. A bind failure is fatal
    /// and surfaces to the caller.
    pub async fn bind(
        host: &str,
        port: u16,
        source: Arc<dyn FrameSource>,
        codec: Arc<dyn FrameCodec>,
        options: ServerOptions,
    ) -> Result<Self, GlimpseError> {
        let listener = TcpListener::bind((host, port)).await?;
        let local_addr = listener.local_addr()?;

        Ok(Self {
            listener: Some(listener),
            local_addr,
            state: Arc::new(ServerState::default()),
            source,
            codec,
            options,
        })
    }

    /// Address the server is actually listening on (useful when bound
    /// to port 0).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Handle to the shared accounting state.
    pub fn state(&self) -> Arc<ServerState> {
        Arc::clone(&self.state)
    }

    pub fn used_slots(&self) -> usize {
        self.state.used_slots()
    }

    pub fn is_running(&self) -> bool {
        self.state.is_running()
    }

    /// Launch the accept loop without blocking the caller.
    ///
    /// Idempotent: a second call reports that the server is already
    /// running and returns `None`.
    pub fn start(&mut self) -> Option<JoinHandle<()>> {
        if self.state.running.swap(true, Ordering::SeqCst) {
            info!("server already running on {}", self.local_addr);
            return None;
        }

        let listener = self.listener.take()?;
        info!("streaming on {}", self.local_addr);

        let state = Arc::clone(&self.state);
        let source = Arc::clone(&self.source);
        let codec = Arc::clone(&self.codec);
        let options = self.options.clone();

        Some(tokio::spawn(accept_loop(
            listener, state, source, codec, options,
        )))
    }
}

// ── Accept loop ──────────────────────────────────────────────────

async fn accept_loop(
    listener: TcpListener,
    state: Arc<ServerState>,
    source: Arc<dyn FrameSource>,
    codec: Arc<dyn FrameCodec>,
    options: ServerOptions,
) {
    while state.is_running() {
        let (stream, addr) = match listener.accept().await {
            Ok(pair) => pair,
            Err(e) => {
                warn!("accept failed: {e}");
                continue;
            }
        };

        let slots = state.acquire_slot();
        info!("({addr}) connected, {slots} active");

        tokio::spawn(run_session(
            stream,
            addr,
            Arc::clone(&state),
            Arc::clone(&source),
            Arc::clone(&codec),
            options.clone(),
        ));
    }
}

// ── Session ──────────────────────────────────────────────────────

/// Serve one viewer an unbounded stream of frames until the
/// connection breaks, then settle the accounting.
pub(crate) async fn run_session(
    stream: TcpStream,
    addr: SocketAddr,
    state: Arc<ServerState>,
    source: Arc<dyn FrameSource>,
    codec: Arc<dyn FrameCodec>,
    options: ServerOptions,
) {
    match stream_frames(stream, source, codec, &options).await {
        Err(e) if e.is_disconnect() => {}
        Err(e) => warn!("({addr}) session failed: {e}"),
        Ok(()) => unreachable!("send loop has no clean exit"),
    }

    let slots = state.release_slot();
    info!("({addr}) disconnected, {slots} active");
}

/// The per-connection send loop: capture, scale, encode, frame, write.
async fn stream_frames(
    stream: TcpStream,
    source: Arc<dyn FrameSource>,
    codec: Arc<dyn FrameCodec>,
    options: &ServerOptions,
) -> Result<(), GlimpseError> {
    let mut writer = FramedWrite::new(stream, GlimpseCodec::with_max_payload(options.max_payload));
    let (width, height) = options.stream_size;

    loop {
        let started = Instant::now();

        let raw = source.capture()?;
        let raw = if raw.width == width && raw.height == height {
            raw
        } else {
            raw.resize(width, height)
        };

        let payload = codec.encode(&raw, options.quality)?;
        debug!("frame: {} bytes", payload.len());
        writer.send(Bytes::from(payload)).await?;

        if let Some(interval) = options.frame_interval {
            let elapsed = started.elapsed();
            if elapsed < interval {
                tokio::time::sleep(interval - elapsed).await;
            }
        }
    }
}

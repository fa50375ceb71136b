//! Streaming client: connect once, then read, reassemble, decode and
//! render until the server goes away or the user quits.
//!
//! The receive loop keeps its own byte accumulator and drives
//! [`GlimpseCodec`] by hand: each socket read appends at most
//! [`READ_CHUNK`] bytes, then every complete message buffered so far
//! is decoded and handed to the sink. A read returning zero bytes is
//! a defined disconnect, not a stall.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use bytes::BytesMut;
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio_util::codec::Decoder;
use tracing::{debug, info};

use crate::codec::{DEFAULT_MAX_PAYLOAD, GlimpseCodec};
use crate::error::GlimpseError;
use crate::pipeline::{FrameCodec, FrameSink};

/// Upper bound on a single socket read.
pub const READ_CHUNK: usize = 4096;

// ── ClientOptions ────────────────────────────────────────────────

/// Tuning for [`StreamClient`].
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Upper bound on one encoded frame on the wire.
    pub max_payload: usize,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            max_payload: DEFAULT_MAX_PAYLOAD,
        }
    }
}

// ── StreamClient ─────────────────────────────────────────────────

/// Receives one server's frame stream and feeds it to a sink.
pub struct StreamClient {
    stream: Option<TcpStream>,
    peer_addr: SocketAddr,
    running: Arc<AtomicBool>,
    codec: Arc<dyn FrameCodec>,
    options: ClientOptions,
}

impl StreamClient {
    /// Connect to `host:port`. A connect failure is fatal and
    /// surfaces to the caller; there is no retry.
    pub async fn connect(
        host: &str,
        port: u16,
        codec: Arc<dyn FrameCodec>,
        options: ClientOptions,
    ) -> Result<Self, GlimpseError> {
        let stream = TcpStream::connect((host, port)).await?;
        let peer_addr = stream.peer_addr()?;
        info!("connected to {peer_addr}");

        Ok(Self {
            stream: Some(stream),
            peer_addr,
            running: Arc::new(AtomicBool::new(false)),
            codec,
            options,
        })
    }

    /// Address of the server end.
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    /// A cloneable handle that observes (and can clear) the run flag.
    pub fn running_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    /// Whether the receive loop is currently running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Ask the receive loop to stop after the frame it is handling.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Launch the receive loop on the runtime without blocking the
    /// caller. Idempotent: a second call reports that the client is
    /// already running and returns `None`.
    pub fn start<S>(&mut self, mut sink: S) -> Option<JoinHandle<Result<(), GlimpseError>>>
    where
        S: FrameSink + Send + 'static,
    {
        if self.running.swap(true, Ordering::SeqCst) {
            info!("client already running");
            return None;
        }

        let stream = self.stream.take()?;
        let peer_addr = self.peer_addr;
        let running = Arc::clone(&self.running);
        let codec = Arc::clone(&self.codec);
        let max_payload = self.options.max_payload;

        Some(tokio::spawn(async move {
            receive_loop(stream, peer_addr, codec, running, max_payload, &mut sink).await
        }))
    }

    /// Run the receive loop on the calling task. Intended for sinks
    /// that own the terminal or a window and want to stay on the main
    /// flow of control.
    pub async fn run<S: FrameSink>(&mut self, sink: &mut S) -> Result<(), GlimpseError> {
        if self.running.swap(true, Ordering::SeqCst) {
            info!("client already running");
            return Ok(());
        }

        let stream = self
            .stream
            .take()
            .ok_or_else(|| GlimpseError::Other("receive loop already consumed".into()))?;

        receive_loop(
            stream,
            self.peer_addr,
            Arc::clone(&self.codec),
            Arc::clone(&self.running),
            self.options.max_payload,
            sink,
        )
        .await
    }
}

// ── Receive loop ─────────────────────────────────────────────────

async fn receive_loop<S: FrameSink>(
    stream: TcpStream,
    peer_addr: SocketAddr,
    codec: Arc<dyn FrameCodec>,
    running: Arc<AtomicBool>,
    max_payload: usize,
    sink: &mut S,
) -> Result<(), GlimpseError> {
    let result = drive(stream, peer_addr, codec, &running, max_payload, sink).await;
    running.store(false, Ordering::SeqCst);
    result
}

async fn drive<S: FrameSink>(
    mut stream: TcpStream,
    peer_addr: SocketAddr,
    codec: Arc<dyn FrameCodec>,
    running: &AtomicBool,
    max_payload: usize,
    sink: &mut S,
) -> Result<(), GlimpseError> {
    let title = peer_addr.to_string();
    let mut wire = GlimpseCodec::with_max_payload(max_payload);
    let mut data = BytesMut::with_capacity(READ_CHUNK * 2);
    let mut chunk = [0u8; READ_CHUNK];

    while running.load(Ordering::SeqCst) {
        // Hand over every complete message already buffered.
        while let Some(payload) = wire.decode(&mut data)? {
            debug!("frame: {} bytes", payload.len());
            let image = codec.decode(&payload)?;
            sink.render(&image, &title)?;

            if sink.poll_quit()? {
                info!("quit requested, closing stream from {peer_addr}");
                return Ok(());
            }

            if !running.load(Ordering::SeqCst) {
                return Ok(());
            }
        }

        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            info!("({peer_addr}) closed the stream");
            return Err(GlimpseError::Disconnected);
        }
        data.extend_from_slice(&chunk[..n]);
    }

    Ok(())
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::encode_message;
    use crate::frame::{PixelFormat, RawImage};
    use std::sync::Mutex;
    use tokio::io::AsyncWriteExt;
    use tokio::net::TcpListener;

    /// Codec stub that records every payload it is asked to decode.
    struct RecordingCodec {
        decoded: Mutex<Vec<Vec<u8>>>,
    }

    impl RecordingCodec {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                decoded: Mutex::new(Vec::new()),
            })
        }
    }

    impl FrameCodec for RecordingCodec {
        fn encode(&self, _image: &RawImage, _quality: u8) -> Result<Vec<u8>, GlimpseError> {
            unimplemented!("client tests never encode")
        }

        fn decode(&self, bytes: &[u8]) -> Result<RawImage, GlimpseError> {
            self.decoded.lock().unwrap().push(bytes.to_vec());
            RawImage::new(1, 1, PixelFormat::Rgba8, vec![0, 0, 0, 255])
        }
    }

    /// Sink that counts renders and quit polls, optionally quitting
    /// after a fixed number of frames.
    struct CountingSink {
        rendered: usize,
        polls: usize,
        quit_after: Option<usize>,
    }

    impl CountingSink {
        fn new(quit_after: Option<usize>) -> Self {
            Self {
                rendered: 0,
                polls: 0,
                quit_after,
            }
        }
    }

    impl FrameSink for CountingSink {
        fn render(&mut self, _image: &RawImage, _title: &str) -> Result<(), GlimpseError> {
            self.rendered += 1;
            Ok(())
        }

        fn poll_quit(&mut self) -> Result<bool, GlimpseError> {
            self.polls += 1;
            Ok(self.quit_after.is_some_and(|n| self.rendered >= n))
        }
    }

    async fn ephemeral_listener() -> (TcpListener, SocketAddr) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        (listener, addr)
    }

    #[tokio::test]
    async fn frames_arrive_in_order_and_eof_is_a_disconnect() {
        let frames: Vec<Vec<u8>> = vec![b"one".to_vec(), b"two".to_vec(), b"three".to_vec()];
        let (listener, addr) = ephemeral_listener().await;

        let to_send = frames.clone();
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut wire = Vec::new();
            for f in &to_send {
                wire.extend_from_slice(&encode_message(f));
            }
            // Dribble the stream out in awkward pieces.
            for piece in wire.chunks(5) {
                stream.write_all(piece).await.unwrap();
                stream.flush().await.unwrap();
            }
            // Closing the socket ends the stream.
        });

        let codec = RecordingCodec::new();
        let mut client = StreamClient::connect(
            &addr.ip().to_string(),
            addr.port(),
            codec.clone() as Arc<dyn FrameCodec>,
            ClientOptions::default(),
        )
        .await
        .unwrap();

        let mut sink = CountingSink::new(None);
        let err = client.run(&mut sink).await.unwrap_err();

        assert!(matches!(err, GlimpseError::Disconnected));
        assert!(!client.is_running());
        assert_eq!(sink.rendered, 3);
        assert_eq!(*codec.decoded.lock().unwrap(), frames);
    }

    #[tokio::test]
    async fn quit_signal_stops_the_loop_after_one_poll() {
        let (listener, addr) = ephemeral_listener().await;

        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            // Keep sending frames until the client hangs up.
            loop {
                if stream.write_all(&encode_message(b"frame")).await.is_err() {
                    break;
                }
            }
        });

        let codec = RecordingCodec::new();
        let mut client = StreamClient::connect(
            &addr.ip().to_string(),
            addr.port(),
            codec as Arc<dyn FrameCodec>,
            ClientOptions::default(),
        )
        .await
        .unwrap();

        let mut sink = CountingSink::new(Some(1));
        client.run(&mut sink).await.unwrap();

        assert!(!client.is_running());
        assert_eq!(sink.rendered, 1);
        // poll_quit returned true on its first call and was never
        // called again.
        assert_eq!(sink.polls, 1);
    }

    #[tokio::test]
    async fn connect_failure_is_fatal() {
        // Bind then drop a listener so the port is very likely free.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let codec = RecordingCodec::new();
        let result = StreamClient::connect(
            &addr.ip().to_string(),
            addr.port(),
            codec as Arc<dyn FrameCodec>,
            ClientOptions::default(),
        )
        .await;

        assert!(result.is_err());
    }
}

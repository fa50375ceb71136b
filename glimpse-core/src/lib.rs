//! # glimpse-core
//!
//! Core library for the glimpse screen-mirroring stream.
//!
//! This crate contains:
//! - **Framing**: `GlimpseCodec` plus `encode_message`/`decode_length`
//!   for the length-prefixed wire format
//! - **Pipeline seams**: `FrameSource`, `FrameCodec`, `FrameSink`
//!   traits with JPEG, zstd and test-pattern implementations
//! - **Server**: `StreamServer` accept loop and per-viewer sessions
//! - **Client**: `StreamClient` receive/decode/render loop
//! - **Error**: `GlimpseError`, a typed `thiserror`-based hierarchy

pub mod client;
pub mod codec;
pub mod error;
pub mod frame;
pub mod pipeline;
pub mod server;

// ── Re-exports for ergonomic usage ───────────────────────────────

pub use client::{ClientOptions, READ_CHUNK, StreamClient};
pub use codec::{
    DEFAULT_MAX_PAYLOAD, GlimpseCodec, LEN_PREFIX_SIZE, decode_length, encode_message,
};
pub use error::{GlimpseError, is_peer_gone};
pub use frame::{PixelFormat, RawImage};
pub use pipeline::{FrameCodec, FrameSink, FrameSource, JpegCodec, TestPatternSource, ZstdCodec};
pub use server::{ServerOptions, ServerState, StreamServer};

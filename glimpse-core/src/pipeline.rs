//! Collaborator seams for the streaming pipeline.
//!
//! The stream core treats capture, compression and display as
//! pluggable collaborators behind three traits:
//!
//! - [`FrameSource`] produces a raw snapshot of the display.
//! - [`FrameCodec`] compresses a raw image to bytes and back.
//! - [`FrameSink`] shows a decoded image and reports a quit request.
//!
//! This module also ships the stock implementations: [`JpegCodec`]
//! (lossy, the default stream format), [`ZstdCodec`] (lossless) and
//! [`TestPatternSource`] (deterministic frames for demos and tests).

use std::io::Cursor;
use std::sync::atomic::{AtomicU64, Ordering};

use image::{DynamicImage, ImageBuffer, Rgb, Rgba};

use crate::error::GlimpseError;
use crate::frame::{PixelFormat, RawImage};

// ── Traits ───────────────────────────────────────────────────────

/// Produces raw display snapshots on demand.
///
/// A capture failure is fatal to the session that called it.
pub trait FrameSource: Send + Sync {
    fn capture(&self) -> Result<RawImage, GlimpseError>;
}

/// Compresses raw images for the wire and decompresses them back.
pub trait FrameCodec: Send + Sync {
    /// Compress `image`. `quality` is 1..=100 for lossy codecs; the
    /// server fixes it at construction and passes the same value for
    /// every frame.
    fn encode(&self, image: &RawImage, quality: u8) -> Result<Vec<u8>, GlimpseError>;

    /// Decompress a payload received off the wire.
    fn decode(&self, bytes: &[u8]) -> Result<RawImage, GlimpseError>;
}

/// Displays decoded images and reports user quit requests.
pub trait FrameSink {
    /// Show one decoded image. `title` identifies the stream
    /// (typically the server address).
    fn render(&mut self, image: &RawImage, title: &str) -> Result<(), GlimpseError>;

    /// Poll for a pending quit request. Called once after each
    /// rendered frame; never called again once it returns `true`.
    fn poll_quit(&mut self) -> Result<bool, GlimpseError>;
}

// ── JpegCodec ────────────────────────────────────────────────────

/// JPEG compression via the `image` crate.
///
/// Encoding drops the alpha channel (JPEG has none); decoding yields
/// [`PixelFormat::Rgb8`] images.
#[derive(Debug, Clone, Copy, Default)]
pub struct JpegCodec;

impl JpegCodec {
    pub fn new() -> Self {
        Self
    }
}

impl FrameCodec for JpegCodec {
    fn encode(&self, image: &RawImage, quality: u8) -> Result<Vec<u8>, GlimpseError> {
        let rgb = to_rgb_buffer(image)?;
        let quality = quality.clamp(1, 100);

        let mut out = Cursor::new(Vec::new());
        let mut encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut out, quality);
        encoder
            .encode(
                rgb.as_raw(),
                rgb.width(),
                rgb.height(),
                image::ExtendedColorType::Rgb8,
            )
            .map_err(|e| GlimpseError::Encoding(format!("jpeg: {e}")))?;

        Ok(out.into_inner())
    }

    fn decode(&self, bytes: &[u8]) -> Result<RawImage, GlimpseError> {
        let img = image::load_from_memory_with_format(bytes, image::ImageFormat::Jpeg)
            .map_err(|e| GlimpseError::Decoding(format!("jpeg: {e}")))?;
        let rgb = img.to_rgb8();
        RawImage::new(rgb.width(), rgb.height(), PixelFormat::Rgb8, rgb.into_raw())
    }
}

fn to_rgb_buffer(image: &RawImage) -> Result<ImageBuffer<Rgb<u8>, Vec<u8>>, GlimpseError> {
    match image.format {
        PixelFormat::Rgb8 => {
            ImageBuffer::from_raw(image.width, image.height, image.data.clone())
                .ok_or(GlimpseError::InvalidImage("rgb buffer too short"))
        }
        PixelFormat::Rgba8 => {
            let rgba: ImageBuffer<Rgba<u8>, Vec<u8>> =
                ImageBuffer::from_raw(image.width, image.height, image.data.clone())
                    .ok_or(GlimpseError::InvalidImage("rgba buffer too short"))?;
            Ok(DynamicImage::ImageRgba8(rgba).to_rgb8())
        }
    }
}

// ── ZstdCodec ────────────────────────────────────────────────────

/// Lossless compression with zstd.
///
/// Raw pixels carry no dimensions of their own, so the payload starts
/// with a 9-byte header:
///
/// ```text
/// width:  u32 le
/// height: u32 le
/// format: u8   (0 = Rgba8, 1 = Rgb8)
/// data:   zstd-compressed pixels
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct ZstdCodec;

const ZSTD_HEADER: usize = 9;

impl ZstdCodec {
    pub fn new() -> Self {
        Self
    }
}

impl FrameCodec for ZstdCodec {
    fn encode(&self, image: &RawImage, quality: u8) -> Result<Vec<u8>, GlimpseError> {
        // Quality doubles as the zstd level here; anything sensible
        // lands in 1..=19.
        let level = i32::from(quality).clamp(1, 19);

        let compressed = zstd::encode_all(image.data.as_slice(), level)
            .map_err(|e| GlimpseError::Encoding(format!("zstd: {e}")))?;

        let mut out = Vec::with_capacity(ZSTD_HEADER + compressed.len());
        out.extend_from_slice(&image.width.to_le_bytes());
        out.extend_from_slice(&image.height.to_le_bytes());
        out.push(match image.format {
            PixelFormat::Rgba8 => 0,
            PixelFormat::Rgb8 => 1,
        });
        out.extend_from_slice(&compressed);
        Ok(out)
    }

    fn decode(&self, bytes: &[u8]) -> Result<RawImage, GlimpseError> {
        if bytes.len() < ZSTD_HEADER {
            return Err(GlimpseError::Decoding("zstd payload too short".into()));
        }

        let width = u32::from_le_bytes(bytes[0..4].try_into().expect("4-byte slice"));
        let height = u32::from_le_bytes(bytes[4..8].try_into().expect("4-byte slice"));
        let format = match bytes[8] {
            0 => PixelFormat::Rgba8,
            1 => PixelFormat::Rgb8,
            other => {
                return Err(GlimpseError::Decoding(format!(
                    "unknown pixel format tag {other}"
                )));
            }
        };

        let data = zstd::decode_all(&bytes[ZSTD_HEADER..])
            .map_err(|e| GlimpseError::Decoding(format!("zstd: {e}")))?;

        RawImage::new(width, height, format, data)
    }
}

// ── TestPatternSource ────────────────────────────────────────────

/// Deterministic frame source: a colour gradient whose blue channel
/// advances every capture, so consecutive frames differ.
pub struct TestPatternSource {
    width: u32,
    height: u32,
    tick: AtomicU64,
}

impl TestPatternSource {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            tick: AtomicU64::new(0),
        }
    }
}

impl FrameSource for TestPatternSource {
    fn capture(&self) -> Result<RawImage, GlimpseError> {
        let tick = self.tick.fetch_add(1, Ordering::Relaxed);
        let blue = (tick * 8 % 256) as u8;

        let mut data = Vec::with_capacity(self.width as usize * self.height as usize * 4);
        for y in 0..self.height {
            for x in 0..self.width {
                let r = (x * 255 / self.width.max(1)) as u8;
                let g = (y * 255 / self.height.max(1)) as u8;
                data.extend_from_slice(&[r, g, blue, 0xFF]);
            }
        }

        RawImage::new(self.width, self.height, PixelFormat::Rgba8, data)
    }
}

// ── Tests ────────────────────────────────────────────────────────

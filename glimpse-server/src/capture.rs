//! Screen capture via the `scrap` crate.
//!
//! A fresh `Capturer` is created per snapshot: the stream loop asks
//! for one frame at a time, and holding a capturer across calls would
//! pin the session to a `&mut` handle for no gain at these frame
//! rates.

use std::io;
use std::time::{Duration, Instant};

use scrap::{Capturer, Display};

use glimpse_core::{FrameSource, GlimpseError, PixelFormat, RawImage};

/// How long to wait for the compositor to hand over a frame.
const CAPTURE_TIMEOUT: Duration = Duration::from_millis(1000);

/// Pause between `WouldBlock` retries.
const RETRY_INTERVAL: Duration = Duration::from_millis(10);

/// [`FrameSource`] backed by the OS screen-capture API.
pub struct ScrapSource {
    display_index: usize,
}

impl ScrapSource {
    /// Capture the display at `display_index` (0 = primary).
    pub fn new(display_index: usize) -> Self {
        Self { display_index }
    }

    fn open_display(&self) -> Result<Display, GlimpseError> {
        if self.display_index == 0 {
            return Display::primary()
                .map_err(|e| GlimpseError::Capture(format!("primary display: {e}")));
        }

        let mut displays = Display::all()
            .map_err(|e| GlimpseError::Capture(format!("enumerate displays: {e}")))?;
        if self.display_index >= displays.len() {
            return Err(GlimpseError::Capture(format!(
                "display {} not found ({} available)",
                self.display_index,
                displays.len()
            )));
        }
        Ok(displays.remove(self.display_index))
    }
}

impl FrameSource for ScrapSource {
    fn capture(&self) -> Result<RawImage, GlimpseError> {
        let display = self.open_display()?;
        let mut capturer = Capturer::new(display)
            .map_err(|e| GlimpseError::Capture(format!("create capturer: {e}")))?;

        let width = capturer.width();
        let height = capturer.height();
        let deadline = Instant::now() + CAPTURE_TIMEOUT;

        let frame = loop {
            match capturer.frame() {
                Ok(frame) => break frame.to_vec(),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    if Instant::now() >= deadline {
                        return Err(GlimpseError::Capture("frame capture timed out".into()));
                    }
                    std::thread::sleep(RETRY_INTERVAL);
                }
                Err(e) => return Err(GlimpseError::Capture(format!("frame: {e}"))),
            }
        };

        // scrap hands out BGRA rows, possibly padded to a stride.
        let stride = frame.len() / height;
        let mut rgba = Vec::with_capacity(width * height * 4);
        for y in 0..height {
            let row = &frame[y * stride..y * stride + width * 4];
            for px in row.chunks_exact(4) {
                rgba.extend_from_slice(&[px[2], px[1], px[0], px[3]]);
            }
        }

        RawImage::new(width as u32, height as u32, PixelFormat::Rgba8, rgba)
    }
}

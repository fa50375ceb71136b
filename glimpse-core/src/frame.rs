//! Raw image types shared by the capture/display pipeline.
//!
//! These are **internal** frame representations passed between the
//! frame source, the image codec, and the sink. The wire carries only
//! the codec's compressed payload, never these structs.

use crate::error::GlimpseError;

// ── PixelFormat ──────────────────────────────────────────────────

/// Pixel layout for raw frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// 4 bytes per pixel: Red, Green, Blue, Alpha.
    Rgba8,
    /// 3 bytes per pixel: Red, Green, Blue.
    Rgb8,
}

impl PixelFormat {
    /// Bytes consumed by a single pixel in this format.
    pub const fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Rgba8 => 4,
            PixelFormat::Rgb8 => 3,
        }
    }
}

// ── RawImage ─────────────────────────────────────────────────────

/// An uncompressed image, tightly packed (no row padding).
///
/// The `data` buffer holds exactly `width * height * bytes_per_pixel`
/// bytes, rows top to bottom.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawImage {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Pixel layout.
    pub format: PixelFormat,
    /// Pixel data, `width * height * bpp` bytes.
    pub data: Vec<u8>,
}

impl RawImage {
    /// Build an image, validating the buffer length against the
    /// declared dimensions.
    pub fn new(
        width: u32,
        height: u32,
        format: PixelFormat,
        data: Vec<u8>,
    ) -> Result<Self, GlimpseError> {
        let expected = width as usize * height as usize * format.bytes_per_pixel();
        if data.len() != expected {
            return Err(GlimpseError::InvalidImage(
                "pixel buffer length does not match dimensions",
            ));
        }
        Ok(Self {
            width,
            height,
            format,
            data,
        })
    }

    /// Total byte size of the pixel buffer.
    pub fn byte_len(&self) -> usize {
        self.data.len()
    }

    /// Returns the pixel bytes at `(x, y)`.
    ///
    /// # Panics
    ///
    /// Panics if `(x, y)` is out of bounds.
    pub fn pixel(&self, x: u32, y: u32) -> &[u8] {
        let bpp = self.format.bytes_per_pixel();
        let offset = (y as usize * self.width as usize + x as usize) * bpp;
        &self.data[offset..offset + bpp]
    }

    /// Scale to `width × height` with nearest-neighbour sampling.
    ///
    /// Cheap and good enough for normalising captures to the
    /// configured stream size; the lossy image codec dominates the
    /// visual quality anyway.
    pub fn resize(&self, width: u32, height: u32) -> RawImage {
        if width == self.width && height == self.height {
            return self.clone();
        }

        let bpp = self.format.bytes_per_pixel();
        let mut out = Vec::with_capacity(width as usize * height as usize * bpp);

        for y in 0..height {
            let src_y = (y as u64 * self.height as u64 / height as u64) as u32;
            for x in 0..width {
                let src_x = (x as u64 * self.width as u64 / width as u64) as u32;
                out.extend_from_slice(self.pixel(src_x, src_y));
            }
        }

        RawImage {
            width,
            height,
            format: self.format,
            data: out,
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn checker(w: u32, h: u32) -> RawImage {
        let mut data = Vec::with_capacity((w * h * 4) as usize);
        for y in 0..h {
            for x in 0..w {
                let v = if (x + y) % 2 == 0 { 0xFF } else { 0x00 };
                data.extend_from_slice(&[v, v, v, 0xFF]);
            }
        }
        RawImage::new(w, h, PixelFormat::Rgba8, data).unwrap()
    }

    #[test]
    fn new_rejects_wrong_buffer_length() {
        let r = RawImage::new(2, 2, PixelFormat::Rgba8, vec![0u8; 15]);
        assert!(matches!(r, Err(GlimpseError::InvalidImage(_))));
    }

    #[test]
    fn pixel_lookup() {
        let img = checker(4, 4);
        assert_eq!(img.pixel(0, 0), &[0xFF, 0xFF, 0xFF, 0xFF]);
        assert_eq!(img.pixel(1, 0), &[0x00, 0x00, 0x00, 0xFF]);
    }

    #[test]
    fn resize_halves_dimensions() {
        let img = checker(8, 8);
        let small = img.resize(4, 4);
        assert_eq!(small.width, 4);
        assert_eq!(small.height, 4);
        assert_eq!(small.byte_len(), 4 * 4 * 4);
    }

    #[test]
    fn resize_same_size_is_identity() {
        let img = checker(4, 4);
        let same = img.resize(4, 4);
        assert_eq!(same, img);
    }

    #[test]
    fn resize_upscale_repeats_pixels() {
        let img = checker(2, 2);
        let big = img.resize(4, 4);
        // Top-left 2×2 region of the upscale comes from source (0,0).
        assert_eq!(big.pixel(0, 0), img.pixel(0, 0));
        assert_eq!(big.pixel(1, 1), img.pixel(0, 0));
    }
}

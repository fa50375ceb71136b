//! Length-prefixed wire framing.
//!
//! One message on the stream is a 4-byte unsigned big-endian length
//! followed by exactly that many payload bytes:
//!
//! ```text
//! Message := u32_be(length) || bytes[length]
//! ```
//!
//! There is no handshake, no version field and no checksum. The only
//! defence against a corrupt prefix is the configurable payload bound:
//! a prefix above it fails with [`GlimpseError::FrameTooLarge`] instead
//! of making the reader wait forever for bytes that never come.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::GlimpseError;

/// Size of the length prefix on the wire.
pub const LEN_PREFIX_SIZE: usize = 4;

/// Default upper bound on a single payload (64 MiB).
pub const DEFAULT_MAX_PAYLOAD: usize = 64 * 1024 * 1024;

/// Encode one payload into a complete wire message.
pub fn encode_message(payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(LEN_PREFIX_SIZE + payload.len());
    out.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    out.extend_from_slice(payload);
    out
}

/// Decode the length half of a wire message.
pub fn decode_length(prefix: [u8; LEN_PREFIX_SIZE]) -> u32 {
    u32::from_be_bytes(prefix)
}

// ── GlimpseCodec ─────────────────────────────────────────────────

/// Incremental encoder/decoder for the length-prefixed framing,
/// pluggable into `tokio_util::codec::{FramedRead, FramedWrite}`.
#[derive(Debug, Clone)]
pub struct GlimpseCodec {
    max_payload: usize,
}

impl GlimpseCodec {
    pub fn new() -> Self {
        Self {
            max_payload: DEFAULT_MAX_PAYLOAD,
        }
    }

    pub fn with_max_payload(max_payload: usize) -> Self {
        Self { max_payload }
    }

    pub fn max_payload(&self) -> usize {
        self.max_payload
    }
}

impl Default for GlimpseCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl tokio_util::codec::Decoder for GlimpseCodec {
    type Item = Bytes;
    type Error = GlimpseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < LEN_PREFIX_SIZE {
            return Ok(None);
        }

        let prefix: [u8; LEN_PREFIX_SIZE] = src[..LEN_PREFIX_SIZE]
            .try_into()
            .expect("slice is exactly LEN_PREFIX_SIZE bytes");
        let len = decode_length(prefix) as usize;

        if len > self.max_payload {
            return Err(GlimpseError::FrameTooLarge {
                size: len,
                max: self.max_payload,
            });
        }

        if src.len() < LEN_PREFIX_SIZE + len {
            src.reserve(LEN_PREFIX_SIZE + len - src.len());
            return Ok(None);
        }

        src.advance(LEN_PREFIX_SIZE);
        Ok(Some(src.split_to(len).freeze()))
    }
}

impl tokio_util::codec::Encoder<Bytes> for GlimpseCodec {
    type Error = GlimpseError;

    fn encode(&mut self, item: Bytes, dst: &mut BytesMut) -> Result<(), Self::Error> {
        if item.len() > self.max_payload {
            return Err(GlimpseError::FrameTooLarge {
                size: item.len(),
                max: self.max_payload,
            });
        }

        dst.reserve(LEN_PREFIX_SIZE + item.len());
        dst.put_u32(item.len() as u32);
        dst.extend_from_slice(&item);
        Ok(())
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_util::codec::{Decoder, Encoder};

    #[test]
    fn encode_message_layout() {
        let msg = encode_message(b"AB");
        assert_eq!(msg, b"\x00\x00\x00\x02AB");
    }

    #[test]
    fn prefix_roundtrip() {
        for payload in [&b""[..], b"x", &vec![0xCD; 100_000][..]] {
            let msg = encode_message(payload);
            let prefix: [u8; 4] = msg[..4].try_into().unwrap();
            assert_eq!(decode_length(prefix) as usize, payload.len());
            assert_eq!(&msg[4..], payload);
        }
    }

    #[test]
    fn decoder_roundtrips_via_encoder() {
        let mut codec = GlimpseCodec::new();
        let mut buf = BytesMut::new();
        codec.encode(Bytes::from_static(b"hello"), &mut buf).unwrap();

        let out = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(&out[..], b"hello");
        assert!(buf.is_empty());
    }

    #[test]
    fn decoder_waits_for_prefix() {
        let mut codec = GlimpseCodec::new();
        let mut buf = BytesMut::from(&b"\x00\x00"[..]);
        assert!(codec.decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn decoder_waits_for_payload() {
        let mut codec = GlimpseCodec::new();
        let mut buf = BytesMut::from(&b"\x00\x00\x00\x05hel"[..]);
        assert!(codec.decode(&mut buf).unwrap().is_none());
        buf.extend_from_slice(b"lo");
        let out = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(&out[..], b"hello");
    }

    #[test]
    fn decoder_handles_empty_payload() {
        let mut codec = GlimpseCodec::new();
        let mut buf = BytesMut::from(&encode_message(b"")[..]);
        let out = codec.decode(&mut buf).unwrap().unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn reassembly_across_arbitrary_splits() {
        let payloads: Vec<Vec<u8>> = vec![
            b"first".to_vec(),
            Vec::new(),
            vec![0xAB; 10_000],
            b"last".to_vec(),
        ];
        let mut wire = Vec::new();
        for p in &payloads {
            wire.extend_from_slice(&encode_message(p));
        }

        // Feed the concatenated stream in several awkward chunk sizes
        // and check the original payloads come back out in order.
        for chunk_size in [1, 3, 7, 4096, wire.len()] {
            let mut codec = GlimpseCodec::new();
            let mut buf = BytesMut::new();
            let mut out: Vec<Vec<u8>> = Vec::new();

            for chunk in wire.chunks(chunk_size) {
                buf.extend_from_slice(chunk);
                while let Some(payload) = codec.decode(&mut buf).unwrap() {
                    out.push(payload.to_vec());
                }
            }

            assert_eq!(out, payloads, "chunk size {chunk_size}");
        }
    }

    #[test]
    fn oversized_prefix_is_rejected() {
        let mut codec = GlimpseCodec::with_max_payload(16);
        let mut buf = BytesMut::from(&encode_message(&[0u8; 17])[..]);
        let err = codec.decode(&mut buf).unwrap_err();
        assert!(matches!(
            err,
            GlimpseError::FrameTooLarge { size: 17, max: 16 }
        ));
    }

    #[test]
    fn encoder_rejects_oversized_payload() {
        let mut codec = GlimpseCodec::with_max_payload(8);
        let mut buf = BytesMut::new();
        let err = codec
            .encode(Bytes::from(vec![0u8; 9]), &mut buf)
            .unwrap_err();
        assert!(matches!(err, GlimpseError::FrameTooLarge { .. }));
        assert!(buf.is_empty());
    }
}

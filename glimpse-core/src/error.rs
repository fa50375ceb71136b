//! Domain-specific error types for the glimpse stream.
//!
//! All fallible operations return `Result<T, GlimpseError>`.
//! No panics on invalid input: every error is typed and recoverable.

use std::io;

use thiserror::Error;

/// The canonical error type for the glimpse stream.
#[derive(Debug, Error)]
pub enum GlimpseError {
    // ── Transport Errors ─────────────────────────────────────────
    /// The TCP/IO layer reported an error.
    #[error("connection error: {0}")]
    Connection(#[from] io::Error),

    /// The peer closed its end of the connection.
    #[error("peer disconnected")]
    Disconnected,

    // ── Framing Errors ───────────────────────────────────────────
    /// A length prefix exceeded the configured maximum payload size.
    #[error("frame too large: {size} bytes (max {max})")]
    FrameTooLarge { size: usize, max: usize },

    // ── Pipeline Errors ──────────────────────────────────────────
    /// The frame source failed to produce an image.
    #[error("capture failed: {0}")]
    Capture(String),

    /// Compressing an image for the wire failed.
    #[error("encoding failed: {0}")]
    Encoding(String),

    /// Decompressing a received payload failed.
    #[error("decoding failed: {0}")]
    Decoding(String),

    /// A pixel buffer did not match its declared dimensions.
    #[error("invalid image: {0}")]
    InvalidImage(&'static str),

    /// The frame sink failed to display an image.
    #[error("render failed: {0}")]
    Render(String),

    /// Catch-all for errors that do not fit another variant.
    #[error("{0}")]
    Other(String),
}

/// Whether an I/O error belongs to the "peer unreachable or closed"
/// class: reset, aborted, refused, broken pipe, or a short read at
/// a message boundary.
pub fn is_peer_gone(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionRefused
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::UnexpectedEof
    )
}

impl GlimpseError {
    /// True when the error ends a session gracefully rather than
    /// signalling a bug: the peer went away.
    pub fn is_disconnect(&self) -> bool {
        match self {
            GlimpseError::Disconnected => true,
            GlimpseError::Connection(e) => is_peer_gone(e),
            _ => false,
        }
    }
}

// ── Convenient From implementations ──────────────────────────────

impl From<String> for GlimpseError {
    fn from(s: String) -> Self {
        GlimpseError::Other(s)
    }
}

impl From<&str> for GlimpseError {
    fn from(s: &str) -> Self {
        GlimpseError::Other(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_messages() {
        let e = GlimpseError::FrameTooLarge {
            size: 1000,
            max: 500,
        };
        assert!(e.to_string().contains("1000"));
        assert!(e.to_string().contains("500"));

        let e = GlimpseError::Disconnected;
        assert!(e.to_string().contains("disconnected"));
    }

    #[test]
    fn from_string() {
        let e: GlimpseError = "something broke".into();
        assert!(matches!(e, GlimpseError::Other(_)));
    }

    #[test]
    fn peer_gone_classification() {
        for kind in [
            io::ErrorKind::ConnectionReset,
            io::ErrorKind::ConnectionAborted,
            io::ErrorKind::ConnectionRefused,
            io::ErrorKind::BrokenPipe,
        ] {
            let e: GlimpseError = io::Error::new(kind, "gone").into();
            assert!(e.is_disconnect(), "{kind:?} should count as disconnect");
        }

        let e: GlimpseError = io::Error::new(io::ErrorKind::PermissionDenied, "no").into();
        assert!(!e.is_disconnect());
        assert!(GlimpseError::Disconnected.is_disconnect());
        assert!(!GlimpseError::Capture("x".into()).is_disconnect());
    }
}

//! Error types for the frame codec.
//!
//! Framing errors describe problems locating frame boundaries; EOF errors
//! report a peer that hung up halfway through a frame. A close at a frame
//! boundary is not an error. Both are fatal to the connection that raised
//! them.
//!
//! `tokio_util` codecs must report failures as [`io::Error`], so
//! [`CodecError`] converts into one while keeping the structured error as
//! the source. [`CodecError::classify`] recovers it on the other side.

use std::io;

use thiserror::Error;

/// Frame boundary errors.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FramingError {
    /// A payload exceeded the configured maximum.
    ///
    /// On decode `size` is the number of bytes buffered without finding a
    /// terminator; on encode it is the payload length.
    #[error("frame exceeds max length: {size} > {max}")]
    OversizedFrame {
        /// Observed payload size.
        size: usize,
        /// Maximum allowed payload size.
        max: usize,
    },
}

/// End-of-stream conditions.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum EofError {
    /// The peer closed the connection before sending a terminator.
    #[error("premature EOF: {bytes_received} bytes buffered without a terminator")]
    MidFrame {
        /// Bytes buffered when the stream ended.
        bytes_received: usize,
    },
}

/// Top-level codec error taxonomy.
///
/// # Examples
///
/// ```
/// use framerpc::codec::{CodecError, FramingError};
///
/// let err = CodecError::Framing(FramingError::OversizedFrame { size: 2000, max: 1024 });
/// let io_err: std::io::Error = err.into();
/// assert_eq!(io_err.kind(), std::io::ErrorKind::InvalidData);
/// assert!(matches!(
///     CodecError::classify(&io_err),
///     Some(CodecError::Framing(FramingError::OversizedFrame { size: 2000, .. }))
/// ));
/// ```
#[derive(Debug, Error)]
pub enum CodecError {
    /// Frame boundary error.
    #[error("framing error: {0}")]
    Framing(#[from] FramingError),

    /// Transport I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// End-of-stream handling.
    #[error("EOF: {0}")]
    Eof(#[from] EofError),
}

impl CodecError {
    /// Returns the error category as a string for logging and metrics.
    #[must_use]
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::Framing(_) => "framing",
            Self::Io(_) => "io",
            Self::Eof(_) => "eof",
        }
    }

    /// Recover the structured framing or EOF error wrapped inside an
    /// [`io::Error`] produced by this codec.
    ///
    /// Returns `None` for plain transport errors.
    #[must_use]
    pub fn classify(err: &io::Error) -> Option<CodecError> {
        let inner = err.get_ref()?;
        if let Some(framing) = inner.downcast_ref::<FramingError>() {
            return Some(Self::Framing(framing.clone()));
        }
        inner.downcast_ref::<EofError>().map(|eof| Self::Eof(*eof))
    }
}

impl From<CodecError> for io::Error {
    fn from(err: CodecError) -> Self {
        match err {
            CodecError::Io(e) => e,
            CodecError::Framing(e) => io::Error::new(io::ErrorKind::InvalidData, e),
            CodecError::Eof(e) => io::Error::new(io::ErrorKind::UnexpectedEof, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eof_errors_map_to_unexpected_eof() {
        let err: io::Error = CodecError::Eof(EofError::MidFrame { bytes_received: 3 }).into();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
        assert!(err.to_string().contains('3'));
    }

    #[test]
    fn plain_io_errors_are_not_classified() {
        let err = io::Error::other("connection reset");
        assert!(CodecError::classify(&err).is_none());
    }

    #[test]
    fn mid_frame_eof_survives_io_wrapping() {
        let err: io::Error = CodecError::Eof(EofError::MidFrame { bytes_received: 9 }).into();
        let classified = CodecError::classify(&err).expect("codec error");
        assert_eq!(classified.error_type(), "eof");
        assert!(matches!(
            classified,
            CodecError::Eof(EofError::MidFrame { bytes_received: 9 })
        ));
    }
}

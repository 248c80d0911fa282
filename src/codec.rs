//! Terminator-delimited framing.
//!
//! Every message on the wire is an opaque payload followed by a fixed
//! terminator sequence (CRLF by default). There is no length prefix, so the
//! decoder accumulates bytes until the terminator shows up and the encoder
//! simply appends it.
//!
//! The decoder remembers how far it has already scanned. A terminator that
//! straddles two reads is found as soon as its last byte arrives, and bytes
//! that were already inspected are not scanned again.
//!
//! # Error Handling
//!
//! Failures are reported through [`CodecError`]: a payload that outgrows the
//! configured maximum is a [`FramingError::OversizedFrame`], and a stream
//! that ends with a partial frame buffered is an [`EofError::MidFrame`]. Both
//! terminate the connection.

use std::io;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::config::FrameConfig;

pub mod error;

pub use error::{CodecError, EofError, FramingError};

/// Tokio codec splitting a byte stream on a terminator sequence.
///
/// The same codec is used on both ends of a connection.
///
/// # Examples
///
/// ```
/// use bytes::{Bytes, BytesMut};
/// use framerpc::{codec::TerminatedFrameCodec, config::FrameConfig};
/// use tokio_util::codec::{Decoder, Encoder};
///
/// let mut codec = TerminatedFrameCodec::new(&FrameConfig::default());
/// let mut wire = BytesMut::new();
/// codec
///     .encode(Bytes::from_static(b"{\"method\":\"ping\"}"), &mut wire)
///     .expect("encode");
/// assert!(wire.ends_with(b"\r\n"));
///
/// let frame = codec.decode(&mut wire).expect("decode").expect("complete frame");
/// assert_eq!(&frame[..], b"{\"method\":\"ping\"}");
/// ```
#[derive(Clone, Debug)]
pub struct TerminatedFrameCodec {
    terminator: Bytes,
    max_frame_length: usize,
    /// Number of buffered bytes already searched without a match.
    next_index: usize,
}

impl TerminatedFrameCodec {
    /// Build a codec from the given framing parameters.
    #[must_use]
    pub fn new(config: &FrameConfig) -> Self {
        Self {
            terminator: config.terminator_shared(),
            max_frame_length: config.max_frame_length_value(),
            next_index: 0,
        }
    }

    /// Return the maximum payload length accepted by this codec.
    #[must_use]
    pub fn max_frame_length(&self) -> usize { self.max_frame_length }

    /// Return the terminator appended to every frame.
    #[must_use]
    pub fn terminator(&self) -> &[u8] { &self.terminator }

    /// Largest number of bytes that may sit in the buffer without a complete
    /// terminator: a full payload plus all but the last terminator byte.
    fn buffer_limit(&self) -> usize {
        self.max_frame_length
            .saturating_add(self.terminator.len().saturating_sub(1))
    }

    fn oversized(&self, size: usize) -> io::Error {
        CodecError::Framing(FramingError::OversizedFrame {
            size,
            max: self.max_frame_length,
        })
        .into()
    }

    fn find_terminator(&self, src: &[u8]) -> Option<usize> {
        let term_len = self.terminator.len();
        // Re-inspect the tail of the previous scan in case the terminator
        // began there.
        let start = self.next_index.saturating_sub(term_len.saturating_sub(1));
        src.get(start..)?
            .windows(term_len)
            .position(|window| window == self.terminator.as_ref())
            .map(|offset| start + offset)
    }
}

impl Default for TerminatedFrameCodec {
    fn default() -> Self { Self::new(&FrameConfig::default()) }
}

impl Decoder for TerminatedFrameCodec {
    type Item = Bytes;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(end) = self.find_terminator(src) {
            self.next_index = 0;
            if end > self.max_frame_length {
                return Err(self.oversized(end));
            }
            let payload = src.split_to(end).freeze();
            src.advance(self.terminator.len());
            return Ok(Some(payload));
        }

        self.next_index = src.len();
        if src.len() > self.buffer_limit() {
            return Err(self.oversized(src.len()));
        }
        Ok(None)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(frame) = self.decode(src)? {
            return Ok(Some(frame));
        }
        if src.is_empty() {
            return Ok(None);
        }
        tracing::debug!(
            bytes_received = src.len(),
            "stream ended before a frame terminator arrived"
        );
        Err(CodecError::Eof(EofError::MidFrame {
            bytes_received: src.len(),
        })
        .into())
    }
}

impl Encoder<Bytes> for TerminatedFrameCodec {
    type Error = io::Error;

    fn encode(&mut self, item: Bytes, dst: &mut BytesMut) -> Result<(), Self::Error> {
        if item.len() > self.max_frame_length {
            return Err(self.oversized(item.len()));
        }
        dst.reserve(item.len() + self.terminator.len());
        dst.put_slice(&item);
        dst.put_slice(&self.terminator);
        Ok(())
    }
}

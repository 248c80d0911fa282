//! Error types for client operations.

use std::{io, time::Duration};

use thiserror::Error;

use crate::{
    codec::{CodecError, FramingError},
    error::ServiceErrorKind,
};

/// Failure reported by the server in a response's `error` field.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct RemoteError {
    message: String,
}

impl RemoteError {
    pub(crate) fn new(message: String) -> Self { Self { message } }

    /// Message sent by the server.
    #[must_use]
    pub fn message(&self) -> &str { &self.message }

    /// Classify the failure, if the server used one of the standard
    /// messages.
    #[must_use]
    pub fn kind(&self) -> Option<ServiceErrorKind> { ServiceErrorKind::from_message(&self.message) }
}

/// Errors emitted by [`RpcClient`](super::RpcClient).
#[derive(Debug, Error)]
pub enum ClientError {
    /// Connecting, reading or writing failed.
    #[error("connection error: {0}")]
    Connection(#[from] io::Error),
    /// A frame exceeded the configured maximum length.
    #[error("frame of {size} bytes exceeds the {max} byte limit")]
    FrameTooLarge {
        /// Observed length.
        size: usize,
        /// Configured limit.
        max: usize,
    },
    /// The reply could not be decoded into the expected shape.
    #[error("failed to decode response: {0}")]
    Decode(String),
    /// No reply arrived before the deadline.
    #[error("call timed out after {0:?}")]
    Timeout(Duration),
    /// The peer closed the connection before a reply arrived.
    #[error("connection closed by peer")]
    Disconnected,
    /// The server answered with an error.
    #[error("remote error: {0}")]
    Remote(#[from] RemoteError),
    /// The reply carried a different id than the request.
    #[error("response id {received:?} does not match request id {expected:?}")]
    CorrelationMismatch {
        /// Id sent with the request.
        expected: Option<String>,
        /// Id found in the reply.
        received: Option<String>,
    },
    /// The request parameters could not be serialised.
    #[error("failed to serialize request: {0}")]
    Serialize(#[source] serde_json::Error),
    /// The batch this call belonged to failed as a whole.
    #[error("batch aborted: {0}")]
    BatchAborted(String),
    /// The batch this call belongs to has not completed yet, or the result
    /// was already taken.
    #[error("batch call has not completed")]
    NotCompleted,
}

impl ClientError {
    /// Map a transport error raised by the framed stream.
    pub(crate) fn transport(err: io::Error) -> Self {
        match CodecError::classify(&err) {
            Some(CodecError::Framing(FramingError::OversizedFrame { size, max })) => {
                Self::FrameTooLarge { size, max }
            }
            Some(CodecError::Eof(_)) => Self::Disconnected,
            _ => Self::Connection(err),
        }
    }

    pub(crate) fn decode(err: &serde_json::Error) -> Self { Self::Decode(err.to_string()) }
}

//! Dispatch-level error types shared by the server and the client.
//!
//! A [`ServiceError`] is produced on the server while handling one request
//! and travels to the client as the `error` string of the response. Each
//! variant renders with a stable prefix so the client can classify the
//! failure again through [`ServiceErrorKind::from_message`].

use thiserror::Error;

/// Failure of a single request on the server side.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ServiceError {
    /// The request frame was not valid JSON or had the wrong shape.
    #[error("decode error: {0}")]
    Decode(String),
    /// No method is registered under the requested name.
    #[error("method not found: {0}")]
    MethodNotFound(String),
    /// The server's token bucket had no permit left.
    #[error("rate limit exceeded")]
    RateLimitExceeded,
    /// A before or after hook returned an error.
    #[error("hook rejected: {0}")]
    HookRejected(String),
    /// The handler rejected its parameters or failed while running.
    #[error("invocation error: {0}")]
    Invocation(String),
}

/// Discriminant of a [`ServiceError`], recoverable from its message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ServiceErrorKind {
    /// See [`ServiceError::Decode`].
    Decode,
    /// See [`ServiceError::MethodNotFound`].
    MethodNotFound,
    /// See [`ServiceError::RateLimitExceeded`].
    RateLimitExceeded,
    /// See [`ServiceError::HookRejected`].
    HookRejected,
    /// See [`ServiceError::Invocation`].
    Invocation,
}

const KINDS: [ServiceErrorKind; 5] = [
    ServiceErrorKind::Decode,
    ServiceErrorKind::MethodNotFound,
    ServiceErrorKind::RateLimitExceeded,
    ServiceErrorKind::HookRejected,
    ServiceErrorKind::Invocation,
];

impl ServiceErrorKind {
    /// Message prefix written by the matching [`ServiceError`] variant.
    #[must_use]
    pub const fn prefix(self) -> &'static str {
        match self {
            Self::Decode => "decode error",
            Self::MethodNotFound => "method not found",
            Self::RateLimitExceeded => "rate limit exceeded",
            Self::HookRejected => "hook rejected",
            Self::Invocation => "invocation error",
        }
    }

    /// Classify an error message received from a peer.
    ///
    /// # Examples
    ///
    /// ```
    /// use framerpc::error::{ServiceError, ServiceErrorKind};
    ///
    /// let message = ServiceError::MethodNotFound("nope".into()).to_string();
    /// assert_eq!(
    ///     ServiceErrorKind::from_message(&message),
    ///     Some(ServiceErrorKind::MethodNotFound)
    /// );
    /// assert_eq!(ServiceErrorKind::from_message("custom failure"), None);
    /// ```
    #[must_use]
    pub fn from_message(message: &str) -> Option<Self> {
        KINDS
            .into_iter()
            .find(|kind| message.starts_with(kind.prefix()))
    }
}

impl ServiceError {
    /// Return the discriminant of this error.
    #[must_use]
    pub const fn kind(&self) -> ServiceErrorKind {
        match self {
            Self::Decode(_) => ServiceErrorKind::Decode,
            Self::MethodNotFound(_) => ServiceErrorKind::MethodNotFound,
            Self::RateLimitExceeded => ServiceErrorKind::RateLimitExceeded,
            Self::HookRejected(_) => ServiceErrorKind::HookRejected,
            Self::Invocation(_) => ServiceErrorKind::Invocation,
        }
    }

    /// Label used for logging and metrics.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Decode(_) => "decode",
            Self::MethodNotFound(_) => "method_not_found",
            Self::RateLimitExceeded => "rate_limited",
            Self::HookRejected(_) => "hook_rejected",
            Self::Invocation(_) => "invocation",
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(ServiceError::Decode("eof".into()))]
    #[case(ServiceError::MethodNotFound("missing".into()))]
    #[case(ServiceError::RateLimitExceeded)]
    #[case(ServiceError::HookRejected("denied".into()))]
    #[case(ServiceError::Invocation("boom".into()))]
    fn rendered_messages_classify_back(#[case] error: ServiceError) {
        let message = error.to_string();
        assert_eq!(ServiceErrorKind::from_message(&message), Some(error.kind()));
    }
}

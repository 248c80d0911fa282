//! Protocol configuration shared by clients and servers.
//!
//! A [`FrameConfig`] carries the two knobs both peers must agree on: the
//! terminator sequence that closes every frame and the largest payload a
//! peer is willing to buffer. Clients additionally carry a call timeout
//! (see [`crate::client::RpcClientBuilder`]).

use std::time::Duration;

use bytes::Bytes;
use thiserror::Error;

/// Terminator used when none is configured.
pub const DEFAULT_TERMINATOR: &[u8] = b"\r\n";

/// Default maximum payload length (2 MiB).
pub const DEFAULT_MAX_FRAME_LENGTH: usize = 2 * 1024 * 1024;

/// Default deadline applied to each client call.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(15);

/// Minimum frame length in bytes.
///
/// Frame lengths passed to [`FrameConfig::max_frame_length`] are clamped to
/// at least this value.
pub const MIN_FRAME_LENGTH: usize = 64;

/// Maximum frame length in bytes (16 MiB).
///
/// Frame lengths are clamped to at most this value to prevent unbounded
/// buffering on a connection that never sends a terminator.
pub const MAX_FRAME_LENGTH: usize = 16 * 1024 * 1024;

pub(crate) fn clamp_frame_length(value: usize) -> usize {
    value.clamp(MIN_FRAME_LENGTH, MAX_FRAME_LENGTH)
}

/// Errors raised while validating configuration values.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum ConfigError {
    /// The terminator sequence was empty.
    #[error("frame terminator must not be empty")]
    EmptyTerminator,
    /// The rate limit refill rate was zero, negative or not finite.
    #[error("rate limit refill rate must be a positive finite number, got {0}")]
    InvalidRate(f64),
    /// The rate limit burst capacity was zero.
    #[error("rate limit capacity must be at least 1")]
    ZeroCapacity,
}

/// Framing parameters for one peer.
///
/// # Examples
///
/// ```
/// use framerpc::config::FrameConfig;
///
/// let config = FrameConfig::default()
///     .terminator("\n")
///     .expect("non-empty terminator")
///     .max_frame_length(4096);
/// assert_eq!(config.terminator_bytes(), b"\n");
/// assert_eq!(config.max_frame_length_value(), 4096);
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameConfig {
    terminator: Bytes,
    max_frame_length: usize,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            terminator: Bytes::from_static(DEFAULT_TERMINATOR),
            max_frame_length: DEFAULT_MAX_FRAME_LENGTH,
        }
    }
}

impl FrameConfig {
    /// Replace the terminator sequence.
    ///
    /// The terminator must not be able to appear inside an encoded payload.
    /// Compact JSON never contains raw CR or LF bytes, so the default is
    /// safe; other choices are the caller's responsibility.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::EmptyTerminator`] for an empty sequence.
    pub fn terminator(mut self, terminator: impl AsRef<[u8]>) -> Result<Self, ConfigError> {
        let terminator = terminator.as_ref();
        if terminator.is_empty() {
            return Err(ConfigError::EmptyTerminator);
        }
        self.terminator = Bytes::copy_from_slice(terminator);
        Ok(self)
    }

    /// Set the maximum payload length, clamped to
    /// [`MIN_FRAME_LENGTH`]..=[`MAX_FRAME_LENGTH`].
    #[must_use]
    pub fn max_frame_length(mut self, max_frame_length: usize) -> Self {
        self.max_frame_length = clamp_frame_length(max_frame_length);
        self
    }

    /// Terminator bytes appended to every frame.
    #[must_use]
    pub fn terminator_bytes(&self) -> &[u8] { &self.terminator }

    /// Maximum accepted payload length.
    #[must_use]
    pub const fn max_frame_length_value(&self) -> usize { self.max_frame_length }

    pub(crate) fn terminator_shared(&self) -> Bytes { self.terminator.clone() }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[test]
    fn defaults_match_line_protocol() {
        let config = FrameConfig::default();
        assert_eq!(config.terminator_bytes(), b"\r\n");
        assert_eq!(config.max_frame_length_value(), DEFAULT_MAX_FRAME_LENGTH);
    }

    #[test]
    fn empty_terminator_is_rejected() {
        let err = FrameConfig::default()
            .terminator("")
            .expect_err("empty terminator must be rejected");
        assert_eq!(err, ConfigError::EmptyTerminator);
    }

    #[rstest]
    #[case(0, MIN_FRAME_LENGTH)]
    #[case(1024, 1024)]
    #[case(usize::MAX, MAX_FRAME_LENGTH)]
    fn max_frame_length_is_clamped(#[case] requested: usize, #[case] expected: usize) {
        let config = FrameConfig::default().max_frame_length(requested);
        assert_eq!(config.max_frame_length_value(), expected);
    }
}

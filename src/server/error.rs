//! Errors raised by [`RpcServer`](super::RpcServer) operations.

use std::io;

use thiserror::Error;

/// Errors that may occur while binding or running the server.
///
/// Failed accepts are not listed here: the accept loop retries them with
/// back-off.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Binding or configuring the listener failed.
    #[error("bind error: {0}")]
    Bind(#[source] io::Error),
    /// The Ctrl+C handler could not be installed, so the server shut down.
    #[error("signal handler error: {0}")]
    Signal(#[source] io::Error),
}

//! Builder for [`RpcClient`].

use std::{net::SocketAddr, time::Duration};

use tokio::{net::TcpSocket, time::timeout};
use tokio_util::codec::Framed;

use super::{ClientError, RpcClient, SocketOptions};
use crate::{
    codec::TerminatedFrameCodec,
    config::{ConfigError, DEFAULT_CALL_TIMEOUT, FrameConfig},
};

/// Builder for [`RpcClient`].
///
/// # Examples
///
/// ```no_run
/// use std::{net::SocketAddr, time::Duration};
///
/// use framerpc::client::RpcClient;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let addr: SocketAddr = "127.0.0.1:9000".parse()?;
/// let mut client = RpcClient::builder()
///     .terminator("\n")?
///     .timeout(Duration::from_secs(2))
///     .connect(addr)
///     .await?;
/// let reply: String = client.call("echo", &"hi").await?;
/// assert_eq!(reply, "hi");
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct RpcClientBuilder {
    frame: FrameConfig,
    timeout: Duration,
    socket_options: SocketOptions,
}

impl Default for RpcClientBuilder {
    fn default() -> Self {
        Self {
            frame: FrameConfig::default(),
            timeout: DEFAULT_CALL_TIMEOUT,
            socket_options: SocketOptions::default(),
        }
    }
}

impl RpcClientBuilder {
    /// Create a builder with CRLF framing, a 2 MiB frame limit and a 15 s
    /// timeout.
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Replace the frame terminator.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::EmptyTerminator`] for an empty sequence.
    pub fn terminator(mut self, terminator: impl AsRef<[u8]>) -> Result<Self, ConfigError> {
        self.frame = self.frame.terminator(terminator)?;
        Ok(self)
    }

    /// Set the maximum frame payload length (clamped).
    #[must_use]
    pub fn max_frame_length(mut self, max_frame_length: usize) -> Self {
        self.frame = self.frame.max_frame_length(max_frame_length);
        self
    }

    /// Replace all framing parameters at once.
    #[must_use]
    pub fn frame_config(mut self, frame: FrameConfig) -> Self {
        self.frame = frame;
        self
    }

    /// Deadline for connecting and for each call or batch.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Socket options applied before connecting.
    #[must_use]
    pub fn socket_options(mut self, options: SocketOptions) -> Self {
        self.socket_options = options;
        self
    }

    /// Open a connection to `addr`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Connection`] if the socket cannot be created,
    /// configured or connected, and [`ClientError::Timeout`] if the
    /// connection is not established within the timeout.
    pub async fn connect(self, addr: SocketAddr) -> Result<RpcClient, ClientError> {
        let socket = if addr.is_ipv4() {
            TcpSocket::new_v4()?
        } else {
            TcpSocket::new_v6()?
        };
        self.socket_options.apply(&socket)?;
        let stream = timeout(self.timeout, socket.connect(addr))
            .await
            .map_err(|_| ClientError::Timeout(self.timeout))??;
        tracing::debug!(%addr, "client connected");

        let framed = Framed::new(stream, TerminatedFrameCodec::new(&self.frame));
        Ok(RpcClient::new(framed, self.timeout))
    }
}

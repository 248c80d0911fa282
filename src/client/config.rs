//! Socket options for RPC clients.

use std::{io, time::Duration};

use socket2::{SockRef, TcpKeepalive};
use tokio::net::TcpSocket;

/// Socket options applied before connecting a client.
///
/// Options left unset keep the operating system default.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use framerpc::client::SocketOptions;
///
/// let options = SocketOptions::default()
///     .nodelay(true)
///     .keepalive(Some(Duration::from_secs(30)));
/// assert_ne!(options, SocketOptions::default());
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SocketOptions {
    nodelay: Option<bool>,
    keepalive: Option<Option<Duration>>,
    linger: Option<Option<Duration>>,
}

impl SocketOptions {
    /// Configure `TCP_NODELAY` behaviour on the socket.
    #[must_use]
    pub fn nodelay(mut self, enabled: bool) -> Self {
        self.nodelay = Some(enabled);
        self
    }

    /// Enable `SO_KEEPALIVE` with the given idle time, or disable it with
    /// `None`.
    #[must_use]
    pub fn keepalive(mut self, idle: Option<Duration>) -> Self {
        self.keepalive = Some(idle);
        self
    }

    /// Configure `SO_LINGER`; `None` disables lingering.
    #[must_use]
    pub fn linger(mut self, duration: Option<Duration>) -> Self {
        self.linger = Some(duration);
        self
    }

    pub(crate) fn apply(&self, socket: &TcpSocket) -> io::Result<()> {
        if let Some(enabled) = self.nodelay {
            socket.set_nodelay(enabled)?;
        }
        match self.keepalive {
            Some(Some(idle)) => {
                socket.set_keepalive(true)?;
                SockRef::from(socket).set_tcp_keepalive(&TcpKeepalive::new().with_time(idle))?;
            }
            Some(None) => socket.set_keepalive(false)?,
            None => {}
        }
        if let Some(linger) = self.linger {
            socket.set_linger(linger)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn options_are_applied_to_the_socket() {
        let socket = TcpSocket::new_v4().expect("socket");
        SocketOptions::default()
            .nodelay(true)
            .keepalive(Some(Duration::from_secs(45)))
            .linger(Some(Duration::from_secs(1)))
            .apply(&socket)
            .expect("apply options");
        assert!(socket.nodelay().expect("nodelay"));
        assert!(socket.keepalive().expect("keepalive"));
        assert_eq!(socket.linger().expect("linger"), Some(Duration::from_secs(1)));
    }

    #[tokio::test]
    async fn unset_options_leave_defaults() {
        let socket = TcpSocket::new_v4().expect("socket");
        SocketOptions::default().apply(&socket).expect("apply");
        assert!(!socket.nodelay().expect("nodelay"));
    }
}

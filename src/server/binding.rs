//! Listener binding for [`RpcServer`].

use std::{
    net::{SocketAddr, TcpListener as StdTcpListener},
    sync::Arc,
};

use tokio::net::TcpListener;

use super::{Bound, RpcServer, ServerError, Unbound};

impl RpcServer<Unbound> {
    /// Return `None` as the server is not bound.
    ///
    /// # Examples
    ///
    /// ```
    /// use framerpc::server::RpcServer;
    ///
    /// assert!(RpcServer::new().local_addr().is_none());
    /// ```
    #[must_use]
    pub const fn local_addr(&self) -> Option<SocketAddr> { None }

    /// Bind to a fresh address.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::net::{Ipv4Addr, SocketAddr};
    ///
    /// use framerpc::server::RpcServer;
    ///
    /// # #[tokio::main(flavor = "current_thread")]
    /// # async fn main() {
    /// let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, 0));
    /// let server = RpcServer::new().bind(addr).expect("bind failed");
    /// assert!(server.local_addr().is_some());
    /// # }
    /// ```
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Bind`] if binding or configuring the listener
    /// fails.
    pub fn bind(self, addr: SocketAddr) -> Result<RpcServer<Bound>, ServerError> {
        let std_listener = StdTcpListener::bind(addr).map_err(ServerError::Bind)?;
        self.bind_listener(std_listener)
    }

    /// Bind to an existing `StdTcpListener`.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Bind`] if configuring the listener fails.
    pub fn bind_listener(
        self,
        std_listener: StdTcpListener,
    ) -> Result<RpcServer<Bound>, ServerError> {
        std_listener
            .set_nonblocking(true)
            .map_err(ServerError::Bind)?;
        let listener = TcpListener::from_std(std_listener).map_err(ServerError::Bind)?;
        if let Ok(addr) = listener.local_addr() {
            tracing::info!(
                %addr,
                methods = self.registry.len(),
                rate_limit = ?self.limit.settings(),
                "server bound"
            );
        }

        let RpcServer {
            config,
            registry,
            hooks,
            limit,
            backoff_config,
            ready_tx,
            state: Unbound,
        } = self;
        Ok(RpcServer {
            config,
            registry,
            hooks,
            limit,
            backoff_config,
            ready_tx,
            state: Bound {
                listener: Arc::new(listener),
            },
        })
    }
}

impl RpcServer<Bound> {
    /// Return the bound socket address.
    #[must_use]
    pub fn local_addr(&self) -> Option<SocketAddr> { self.state.listener.local_addr().ok() }
}

#[cfg(test)]
mod tests {
    use std::net::TcpListener as StdTcpListener;

    use rstest::rstest;
    use tracing_test::traced_test;

    use super::*;
    use crate::server::test_util::free_listener;

    #[rstest]
    #[tokio::test]
    async fn bind_listener_reports_its_address(free_listener: StdTcpListener) {
        let expected = free_listener.local_addr().expect("listener address");
        let server = RpcServer::new()
            .bind_listener(free_listener)
            .expect("bind existing listener");
        assert_eq!(server.local_addr(), Some(expected));
    }

    #[rstest]
    #[tokio::test]
    async fn binding_a_taken_port_fails(free_listener: StdTcpListener) {
        let taken = free_listener.local_addr().expect("listener address");
        let err = RpcServer::new()
            .bind(taken)
            .err()
            .expect("port already in use");
        assert!(matches!(err, ServerError::Bind(_)));
    }

    #[rstest]
    #[traced_test]
    #[tokio::test]
    async fn bound_log_reports_the_rate_limit(free_listener: StdTcpListener) {
        let _server = RpcServer::new()
            .rate_limit(5.0, 3)
            .expect("valid limit")
            .bind_listener(free_listener)
            .expect("bind existing listener");
        assert!(logs_contain("server bound"));
        assert!(logs_contain("rate_limit=Some((5.0, 3))"));
    }
}

//! Shared helpers for integration testing `framerpc` servers and clients.

use std::{
    net::{Ipv4Addr, SocketAddr, TcpListener as StdTcpListener},
    sync::Arc,
    time::Duration,
};

use framerpc::{
    registry::{MethodTable, Service},
    server::{RpcServer, Unbound},
};
use serde_json::Value;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream},
    sync::oneshot,
    task::JoinHandle,
};

/// Shared result type for integration tests.
pub type TestResult<T = ()> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Create a TCP listener bound to a free local port.
///
/// # Errors
///
/// Returns any IO error encountered while binding to an ephemeral localhost
/// port.
pub fn unused_listener() -> std::io::Result<StdTcpListener> {
    let addr = SocketAddr::new(Ipv4Addr::LOCALHOST.into(), 0);
    StdTcpListener::bind(addr)
}

/// Methods commonly needed by integration tests: `echo`, `add`, `ping`
/// and `sleep` (milliseconds).
#[derive(Debug, Default)]
pub struct EchoService;

impl EchoService {
    /// A new instance ready for [`RpcServer::register`].
    #[must_use]
    pub fn shared() -> Arc<Self> { Arc::new(Self) }
}

impl Service for EchoService {
    fn methods(self: Arc<Self>) -> MethodTable {
        MethodTable::new()
            .method("echo", |value: Value| async move { Ok::<_, String>(value) })
            .method("add", |(a, b): (i64, i64)| async move {
                a.checked_add(b).ok_or_else(|| "overflow".to_owned())
            })
            .method("ping", |_: Value| async move { Ok::<_, String>("pong") })
            .method("sleep", |millis: u64| async move {
                tokio::time::sleep(Duration::from_millis(millis)).await;
                Ok::<_, String>(millis)
            })
    }
}

/// A server running on a background task.
pub struct RunningServer {
    /// Address the server accepts on.
    pub addr: SocketAddr,
    shutdown: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

impl RunningServer {
    /// Trigger shutdown and wait for the server to finish.
    ///
    /// # Errors
    ///
    /// Returns a join error if the server task panicked.
    pub async fn stop(self) -> TestResult {
        let _ = self.shutdown.send(());
        self.handle.await?;
        Ok(())
    }
}

/// Bind `server` to a free port, run it in the background and wait until it
/// accepts connections.
///
/// # Errors
///
/// Returns an error if binding fails or the server never signals readiness.
pub async fn spawn_server(server: RpcServer<Unbound>) -> TestResult<RunningServer> {
    let (ready_tx, ready_rx) = oneshot::channel();
    let (shutdown, shutdown_rx) = oneshot::channel::<()>();
    let server = server
        .ready_signal(ready_tx)
        .bind_listener(unused_listener()?)?;
    let addr = server.local_addr().ok_or("bound server has no address")?;
    let handle = tokio::spawn(server.run_with_shutdown(async {
        let _ = shutdown_rx.await;
    }));
    ready_rx.await?;
    Ok(RunningServer {
        addr,
        shutdown,
        handle,
    })
}

/// A listener that accepts connections and never answers them.
///
/// The returned task keeps accepted sockets open until it is aborted.
///
/// # Errors
///
/// Returns any IO error raised while binding.
pub async fn silent_listener() -> std::io::Result<(SocketAddr, JoinHandle<()>)> {
    let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await?;
    let addr = listener.local_addr()?;
    let handle = tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((stream, _)) = listener.accept().await {
            held.push(stream);
        }
    });
    Ok((addr, handle))
}

/// Write raw bytes to `addr` and read until the peer closes or a CRLF is
/// seen.
///
/// # Errors
///
/// Returns any IO error raised by the socket.
pub async fn send_line(addr: SocketAddr, bytes: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut stream = TcpStream::connect(addr).await?;
    stream.write_all(bytes).await?;
    let mut reply = Vec::new();
    let mut chunk = [0_u8; 1024];
    loop {
        let read = stream.read(&mut chunk).await?;
        if read == 0 {
            break;
        }
        reply.extend_from_slice(&chunk[..read]);
        if reply.ends_with(b"\r\n") {
            break;
        }
    }
    Ok(reply)
}

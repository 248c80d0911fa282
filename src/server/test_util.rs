//! Test helpers shared across server modules.

use std::{
    net::{Ipv4Addr, SocketAddr, TcpListener as StdTcpListener},
    sync::Arc,
};

use rstest::fixture;
use serde_json::Value;
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::TcpStream,
    sync::oneshot,
    task::JoinHandle,
};

use super::{Bound, RpcServer, Unbound};
use crate::registry::{MethodTable, Service};

/// Methods used by server tests. `panic` panics with its non-empty
/// parameter as the message.
pub struct TestService;

impl Service for TestService {
    fn methods(self: Arc<Self>) -> MethodTable {
        MethodTable::new()
            .method("echo", |value: Value| async move { Ok::<_, String>(value) })
            .method("panic", |message: String| async move {
                if message.is_empty() {
                    Ok::<_, String>(())
                } else {
                    panic!("{message}")
                }
            })
            .method("sleep", |millis: u64| async move {
                tokio::time::sleep(std::time::Duration::from_millis(millis)).await;
                Ok::<_, String>(millis)
            })
    }
}

#[fixture]
/// Returns a bound [`StdTcpListener`] on a free port for use in tests.
///
/// Keeping the listener bound prevents race conditions where another
/// process could claim the port between discovery and use.
pub fn free_listener() -> StdTcpListener {
    let addr = SocketAddr::new(Ipv4Addr::LOCALHOST.into(), 0);
    StdTcpListener::bind(addr).expect("Failed to bind free port listener")
}

#[fixture]
pub fn test_server() -> RpcServer<Unbound> {
    RpcServer::new()
        .register(Arc::new(TestService))
        .expect("register test service")
}

pub fn bind_server(server: RpcServer<Unbound>, listener: StdTcpListener) -> RpcServer<Bound> {
    server.bind_listener(listener).expect("Failed to bind")
}

/// A server running on a background task.
pub struct Running {
    pub addr: SocketAddr,
    pub shutdown: oneshot::Sender<()>,
    pub handle: JoinHandle<()>,
}

/// Bind `server` to `listener`, run it, and wait until it accepts.
pub async fn start(server: RpcServer<Unbound>, listener: StdTcpListener) -> Running {
    let (ready_tx, ready_rx) = oneshot::channel();
    let (shutdown, shutdown_rx) = oneshot::channel::<()>();
    let server = bind_server(server.ready_signal(ready_tx), listener);
    let addr = server.local_addr().expect("bound address");
    let handle = tokio::spawn(server.run_with_shutdown(async {
        let _ = shutdown_rx.await;
    }));
    ready_rx.await.expect("server ready");
    Running {
        addr,
        shutdown,
        handle,
    }
}

/// Send one CRLF-terminated line and read the reply line.
pub async fn round_trip(stream: &mut BufReader<TcpStream>, line: &str) -> String {
    stream
        .get_mut()
        .write_all(format!("{line}\r\n").as_bytes())
        .await
        .expect("write request");
    let mut reply = String::new();
    stream.read_line(&mut reply).await.expect("read reply");
    reply
}

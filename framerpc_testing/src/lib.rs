//! Utilities for driving a [`RpcServer`](framerpc::server::RpcServer) over
//! real loopback sockets during tests.
//!
//! ```rust,no_run
//! use framerpc_testing::{EchoService, TestResult, spawn_server};
//!
//! # async fn example() -> TestResult {
//! let server = framerpc::server::RpcServer::new().register(EchoService::shared())?;
//! let running = spawn_server(server).await?;
//! let reply = framerpc_testing::send_line(running.addr, b"{\"method\":\"echo\"}\r\n").await?;
//! assert!(reply.starts_with(b"{"));
//! running.stop().await?;
//! # Ok(())
//! # }
//! ```

pub mod integration_helpers;
pub mod logging;

pub use integration_helpers::{
    EchoService,
    RunningServer,
    TestResult,
    send_line,
    silent_listener,
    spawn_server,
    unused_listener,
};
pub use logging::{LoggerHandle, logger};

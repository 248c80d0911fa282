//! Demo `framerpc` server.
//!
//! Serves `echo`, `add` and `ping` until Ctrl+C is received.

mod cli;

use std::sync::Arc;

use clap::Parser;
use framerpc::{
    FrameConfig,
    registry::{MethodTable, Service},
    server::{BackoffConfig, RpcServer, ServerConfig},
};
use serde_json::Value;
use tracing_subscriber::EnvFilter;

struct Demo;

impl Service for Demo {
    fn methods(self: Arc<Self>) -> MethodTable {
        MethodTable::new()
            .method("echo", |value: Value| async move { Ok::<_, String>(value) })
            .method("add", |(a, b): (i64, i64)| async move {
                a.checked_add(b).ok_or_else(|| "overflow".to_owned())
            })
            .method("ping", |_: Value| async move { Ok::<_, String>("pong") })
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = cli::Cli::parse();
    let frame = FrameConfig::default()
        .terminator(cli.terminator_bytes())?
        .max_frame_length(cli.max_frame_length);
    let mut server = RpcServer::with_config(ServerConfig { frame })
        .backoff(BackoffConfig {
            initial_delay: cli.backoff(),
            ..BackoffConfig::default()
        })
        .register(Arc::new(Demo))?;
    if let Some(rate) = cli.rate {
        server = server.rate_limit(rate, cli.burst)?;
    }

    let server = server.bind(cli.bind)?;
    if let Some(addr) = server.local_addr() {
        tracing::info!(%addr, "listening");
    }
    server.run().await?;
    Ok(())
}

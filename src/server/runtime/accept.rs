//! Accept loop feeding connection tasks.

use std::{io, net::SocketAddr, sync::Arc};

use async_trait::async_trait;
use log::warn;
use tokio::{
    net::{TcpListener, TcpStream},
    select,
    time::{Duration, sleep},
};
use tokio_util::task::TaskTracker;

use super::backoff::BackoffConfig;
use crate::server::connection::{ConnectionContext, spawn_connection_task};

/// Source of incoming connections consumed by the accept loop.
///
/// Implementations must be cancellation-safe: dropping a pending `accept()`
/// future must not leak resources.
#[async_trait]
pub(in crate::server) trait AcceptListener: Send + Sync {
    async fn accept(&self) -> io::Result<(TcpStream, SocketAddr)>;
    fn local_addr(&self) -> io::Result<SocketAddr>;
}

#[async_trait]
impl AcceptListener for TcpListener {
    async fn accept(&self) -> io::Result<(TcpStream, SocketAddr)> {
        TcpListener::accept(self).await
    }

    fn local_addr(&self) -> io::Result<SocketAddr> { TcpListener::local_addr(self) }
}

#[derive(Debug)]
pub(in crate::server) struct AcceptLoopOptions {
    pub connection: ConnectionContext,
    pub tracker: TaskTracker,
    pub backoff: BackoffConfig,
}

/// Accept connections from `listener` and spawn one tracked task per
/// connection until the shutdown token in `options` is cancelled.
///
/// Failed accepts are retried after an exponentially growing delay.
pub(in crate::server) async fn accept_loop<L>(listener: Arc<L>, options: AcceptLoopOptions)
where
    L: AcceptListener + 'static,
{
    let backoff = options.backoff.normalized();
    let mut delay = backoff.initial_delay;
    while let Some(next_delay) = accept_iteration(&*listener, &options, &backoff, delay).await {
        delay = next_delay;
    }
    tracing::debug!("accept loop stopped");
}

async fn accept_iteration<L>(
    listener: &L,
    options: &AcceptLoopOptions,
    backoff: &BackoffConfig,
    delay: Duration,
) -> Option<Duration>
where
    L: AcceptListener,
{
    select! {
        biased;

        () = options.connection.shutdown.cancelled() => None,
        res = listener.accept() => Some(match res {
            Ok((stream, peer_addr)) => {
                spawn_connection_task(
                    stream,
                    peer_addr,
                    options.connection.clone(),
                    &options.tracker,
                );
                backoff.initial_delay
            }
            Err(e) => {
                let local_addr = listener.local_addr().ok();
                warn!("accept error: error={e:?}, local_addr={local_addr:?}");
                sleep(delay).await;
                backoff.next_delay(delay)
            }
        }),
    }
}

//! Per-connection request loop.

use std::net::SocketAddr;

use futures::{FutureExt, SinkExt, StreamExt};
use log::{error, warn};
use tokio::{net::TcpStream, select};
use tokio_util::{codec::Framed, sync::CancellationToken, task::TaskTracker};

use crate::{
    codec::{CodecError, TerminatedFrameCodec},
    config::FrameConfig,
    dispatch::Dispatcher,
    panic::panic_message,
};

/// State shared by every connection task of one server run.
#[derive(Clone, Debug)]
pub(in crate::server) struct ConnectionContext {
    pub dispatcher: Dispatcher,
    pub frame: FrameConfig,
    pub shutdown: CancellationToken,
}

/// Spawn a task to process a single TCP connection, logging and discarding
/// any panic that escapes request handling, such as one raised by a hook.
pub(super) fn spawn_connection_task(
    stream: TcpStream,
    peer_addr: SocketAddr,
    ctx: ConnectionContext,
    tracker: &TaskTracker,
) {
    tracker.spawn(async move {
        let fut = std::panic::AssertUnwindSafe(serve_connection(stream, peer_addr, ctx))
            .catch_unwind();

        if let Err(panic) = fut.await {
            #[cfg(feature = "metrics")]
            crate::metrics::inc_connection_panics();
            let panic_msg = panic_message(panic.as_ref());
            // Emit via both `log` and `tracing` for tests that capture either.
            error!("connection task panicked: panic={panic_msg}, peer_addr={peer_addr}");
            tracing::error!(panic = %panic_msg, %peer_addr, "connection task panicked");
        }
    });
}

/// Decrements the connection gauge even when the task unwinds.
struct ConnectionGuard;

impl ConnectionGuard {
    fn open() -> Self {
        #[cfg(feature = "metrics")]
        crate::metrics::inc_connections();
        Self
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        #[cfg(feature = "metrics")]
        crate::metrics::dec_connections();
    }
}

enum Next {
    Frame(bytes::Bytes),
    Closed,
    Shutdown,
}

async fn serve_connection(stream: TcpStream, peer_addr: SocketAddr, ctx: ConnectionContext) {
    let _guard = ConnectionGuard::open();
    tracing::debug!(%peer_addr, "connection opened");
    let mut framed = Framed::new(stream, TerminatedFrameCodec::new(&ctx.frame));

    loop {
        let next = select! {
            biased;

            () = ctx.shutdown.cancelled() => Next::Shutdown,
            frame = framed.next() => match frame {
                Some(Ok(payload)) => Next::Frame(payload),
                Some(Err(err)) => {
                    log_read_error(&err, peer_addr);
                    Next::Closed
                }
                None => Next::Closed,
            },
        };

        let payload = match next {
            Next::Frame(payload) => payload,
            Next::Closed => break,
            Next::Shutdown => {
                tracing::debug!(%peer_addr, "closing idle connection for shutdown");
                break;
            }
        };

        let reply = ctx.dispatcher.handle_payload(&payload).await;
        if let Err(err) = framed.send(reply).await {
            warn!("failed to write response: error={err}, peer_addr={peer_addr}");
            break;
        }
    }
    tracing::debug!(%peer_addr, "connection closed");
}

fn log_read_error(err: &std::io::Error, peer_addr: SocketAddr) {
    match CodecError::classify(err) {
        Some(codec_err) => {
            warn!(
                "dropping connection after framing error: error={codec_err}, \
                 peer_addr={peer_addr}"
            );
            tracing::warn!(error_type = codec_err.error_type(), %peer_addr, "framing error");
        }
        None => warn!("connection read failed: error={err}, peer_addr={peer_addr}"),
    }
}

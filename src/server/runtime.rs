//! Runtime control for [`RpcServer`].

mod accept;
mod backoff;

use std::{future::Future, sync::Arc};

use accept::{AcceptLoopOptions, accept_loop};
pub use backoff::BackoffConfig;
use log::warn;
use tokio::{select, signal};
use tokio_util::{sync::CancellationToken, task::TaskTracker};

use super::{Bound, RpcServer, ServerError, connection::ConnectionContext};
use crate::dispatch::Dispatcher;

impl RpcServer<Bound> {
    /// Run the server until Ctrl+C is received.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use framerpc::server::RpcServer;
    ///
    /// # #[tokio::main]
    /// # async fn main() -> Result<(), framerpc::server::ServerError> {
    /// let server = RpcServer::new().bind(([127, 0, 0, 1], 8080).into())?;
    /// server.run().await?;
    /// # Ok(())
    /// # }
    /// ```
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Signal`] if the Ctrl+C handler cannot be
    /// installed. The server still shuts down cleanly in that case.
    pub async fn run(self) -> Result<(), ServerError> {
        let mut signal_error = None;
        self.run_with_shutdown(async {
            if let Err(err) = signal::ctrl_c().await {
                warn!("failed to listen for Ctrl+C: error={err}");
                signal_error = Some(err);
            }
        })
        .await;
        signal_error.map_or(Ok(()), |err| Err(ServerError::Signal(err)))
    }

    /// Run the server until the `shutdown` future resolves.
    ///
    /// On shutdown the accept loop stops, idle connections close at once and
    /// connections in the middle of a request finish writing their reply
    /// before closing. The call returns once every connection task ended.
    ///
    /// # Examples
    ///
    /// ```
    /// use framerpc::server::RpcServer;
    /// use tokio::sync::oneshot;
    ///
    /// # #[tokio::main]
    /// # async fn main() -> Result<(), framerpc::server::ServerError> {
    /// let server = RpcServer::new().bind(([127, 0, 0, 1], 0).into())?;
    ///
    /// let (tx, rx) = oneshot::channel::<()>();
    /// let handle = tokio::spawn(async move {
    ///     server
    ///         .run_with_shutdown(async {
    ///             let _ = rx.await;
    ///         })
    ///         .await
    /// });
    ///
    /// let _ = tx.send(());
    /// handle.await.expect("join server task");
    /// # Ok(())
    /// # }
    /// ```
    pub async fn run_with_shutdown<S>(self, shutdown: S)
    where
        S: Future<Output = ()> + Send,
    {
        let RpcServer {
            config,
            registry,
            hooks,
            limit,
            backoff_config,
            ready_tx,
            state: Bound { listener },
        } = self;
        let shutdown_token = CancellationToken::new();
        let tracker = TaskTracker::new();
        let dispatcher = Dispatcher::new(registry, Arc::new(limit), Arc::new(hooks));

        tracker.spawn(accept_loop(
            listener,
            AcceptLoopOptions {
                connection: ConnectionContext {
                    dispatcher,
                    frame: config.frame,
                    shutdown: shutdown_token.clone(),
                },
                tracker: tracker.clone(),
                backoff: backoff_config,
            },
        ));

        if let Some(tx) = ready_tx
            && tx.send(()).is_err()
        {
            warn!("Failed to send readiness signal: receiver dropped");
        }

        select! {
            () = shutdown => shutdown_token.cancel(),
            () = tracker.wait() => {},
        }

        tracker.close();
        tracker.wait().await;
        tracing::info!("server stopped");
    }
}

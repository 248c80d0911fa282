//! Tokio-based RPC server.
//!
//! `RpcServer` accepts TCP connections and runs one task per connection.
//! Each task reads terminator-delimited frames, dispatches the request or
//! batch they carry, and writes the reply frame. All connections share one
//! method registry, one rate limiter and one pair of hooks.

use std::sync::Arc;

use tokio::{net::TcpListener, sync::oneshot};

use crate::{
    config::{ConfigError, FrameConfig},
    hooks::{HookError, Hooks},
    message::Request,
    rate_limit::RateLimit,
    registry::{MethodRegistry, RegistryError, Service},
};

mod binding;
mod connection;
pub mod error;
mod runtime;

pub use error::ServerError;
/// Re-exported configuration types for server backoff behaviour.
pub use runtime::BackoffConfig;

/// Server-side protocol settings.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ServerConfig {
    /// Framing applied to every accepted connection.
    pub frame: FrameConfig,
}

/// RPC server over terminator-delimited TCP frames.
///
/// The server carries a typestate `S` indicating whether it is [`Unbound`]
/// or [`Bound`]. Hooks and the rate limit can only be changed while
/// unbound; methods may be registered at any time, including through
/// [`RpcServer::registry`] while the server runs.
///
/// # Examples
///
/// ```no_run
/// use std::{net::SocketAddr, sync::Arc};
///
/// use framerpc::{
///     registry::{MethodTable, Service},
///     server::RpcServer,
/// };
///
/// struct Echo;
///
/// impl Service for Echo {
///     fn methods(self: Arc<Self>) -> MethodTable {
///         MethodTable::new().method("echo", |value: String| async move { Ok::<_, String>(value) })
///     }
/// }
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let addr: SocketAddr = "127.0.0.1:9000".parse()?;
/// RpcServer::new()
///     .register(Arc::new(Echo))?
///     .rate_limit(100.0, 20)?
///     .bind(addr)?
///     .run()
///     .await?;
/// # Ok(())
/// # }
/// ```
pub struct RpcServer<S: ServerState = Unbound> {
    pub(crate) config: ServerConfig,
    pub(crate) registry: Arc<MethodRegistry>,
    pub(crate) hooks: Hooks,
    pub(crate) limit: RateLimit,
    pub(crate) backoff_config: BackoffConfig,
    /// Channel used to notify when the server is ready.
    ///
    /// A `oneshot::Sender` can transmit only one readiness notification, so
    /// a new sender must be provided each time the server is started.
    pub(crate) ready_tx: Option<oneshot::Sender<()>>,
    /// Typestate tracking whether the server has been bound to a listener.
    pub(crate) state: S,
}

/// Marker indicating the server has not yet bound a listener.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unbound;

/// Marker indicating the server is bound to a TCP listener.
#[derive(Debug, Clone)]
pub struct Bound {
    pub(crate) listener: Arc<TcpListener>,
}

/// Trait implemented by [`Unbound`] and [`Bound`] to model binding typestate.
pub trait ServerState: sealed::Sealed {}

mod sealed {
    //! Prevent external implementations of [`ServerState`].

    pub trait Sealed {}
    impl Sealed for super::Unbound {}
    impl Sealed for super::Bound {}
}

impl ServerState for Unbound {}
impl ServerState for Bound {}

impl Default for RpcServer<Unbound> {
    fn default() -> Self { Self::new() }
}

impl RpcServer<Unbound> {
    /// Create a server with default framing, no methods, no hooks and no
    /// rate limit.
    #[must_use]
    pub fn new() -> Self { Self::with_config(ServerConfig::default()) }

    /// Create a server with explicit protocol settings.
    #[must_use]
    pub fn with_config(config: ServerConfig) -> Self {
        Self {
            config,
            registry: Arc::new(MethodRegistry::new()),
            hooks: Hooks::default(),
            limit: RateLimit::disabled(),
            backoff_config: BackoffConfig::default(),
            ready_tx: None,
            state: Unbound,
        }
    }

    /// Install the hook run before every admitted invocation.
    #[must_use]
    pub fn before<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Request) -> Result<(), HookError> + Send + Sync + 'static,
    {
        self.hooks = self.hooks.with_before(hook);
        self
    }

    /// Install the hook run after every invocation.
    #[must_use]
    pub fn after<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Request, &mut serde_json::Value) -> Result<(), HookError> + Send + Sync + 'static,
    {
        self.hooks = self.hooks.with_after(hook);
        self
    }

    /// Limit admissions to `rate` requests per second with bursts of up to
    /// `capacity`.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] for a non-positive rate or zero capacity.
    pub fn rate_limit(mut self, rate: f64, capacity: usize) -> Result<Self, ConfigError> {
        self.limit = RateLimit::new(rate, capacity)?;
        Ok(self)
    }
}

impl<S: ServerState> RpcServer<S> {
    /// Register every method of `service`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::DuplicateMethod`] if a name is already taken.
    pub fn register<T: Service>(self, service: Arc<T>) -> Result<Self, RegistryError> {
        self.registry.register(service)?;
        Ok(self)
    }

    /// Register every method of `service` as `prefix.method`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::DuplicateMethod`] if a name is already taken.
    pub fn register_as<T: Service>(
        self,
        prefix: &str,
        service: Arc<T>,
    ) -> Result<Self, RegistryError> {
        self.registry.register_as(prefix, service)?;
        Ok(self)
    }

    /// Shared registry, usable for registration while the server runs.
    #[must_use]
    pub fn registry(&self) -> Arc<MethodRegistry> { Arc::clone(&self.registry) }

    /// Protocol settings used for accepted connections.
    #[must_use]
    pub const fn config(&self) -> &ServerConfig { &self.config }

    /// Configure the accept-loop back-off.
    #[must_use]
    pub fn backoff(mut self, backoff: BackoffConfig) -> Self {
        self.backoff_config = backoff.normalized();
        self
    }

    /// Notify `tx` once the accept loop is running.
    #[must_use]
    pub fn ready_signal(mut self, tx: oneshot::Sender<()>) -> Self {
        self.ready_tx = Some(tx);
        self
    }
}

#[cfg(test)]
pub(crate) mod test_util;

//! Method registry mapping names to invocable handlers.
//!
//! Services describe their methods explicitly through [`Service::methods`],
//! which returns a [`MethodTable`] of named async handlers. The registry
//! stores the handlers in a [`DashMap`] so registration and lookup can
//! proceed concurrently with running connections.

use std::{fmt, future::Future, sync::Arc};

use dashmap::{DashMap, mapref::entry::Entry};
use futures::{FutureExt, future::BoxFuture};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use thiserror::Error;

/// Type-erased handler stored in the registry.
///
/// The handler receives the raw `params` value and returns either the
/// encoded result or a failure message.
pub type Method = Arc<dyn Fn(Value) -> BoxFuture<'static, Result<Value, String>> + Send + Sync>;

/// Errors raised while registering methods.
#[derive(Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum RegistryError {
    /// A method with the provided name was already registered.
    #[error("method {0:?} was already registered")]
    DuplicateMethod(String),
}

/// A value exposing a set of named methods.
///
/// ```
/// use std::sync::Arc;
///
/// use framerpc::registry::{MethodRegistry, MethodTable, Service};
///
/// struct Greeter {
///     greeting: String,
/// }
///
/// impl Service for Greeter {
///     fn methods(self: Arc<Self>) -> MethodTable {
///         MethodTable::new().method("greet", move |name: String| {
///             let this = Arc::clone(&self);
///             async move { Ok::<_, String>(format!("{} {name}", this.greeting)) }
///         })
///     }
/// }
///
/// let registry = MethodRegistry::new();
/// registry
///     .register(Arc::new(Greeter {
///         greeting: "hello".into(),
///     }))
///     .expect("no duplicates");
/// assert!(registry.contains("greet"));
/// ```
pub trait Service: Send + Sync + 'static {
    /// Describe the methods this service exposes.
    fn methods(self: Arc<Self>) -> MethodTable;
}

/// Named handlers produced by a [`Service`].
#[derive(Default)]
pub struct MethodTable {
    entries: Vec<(String, Method)>,
}

impl fmt::Debug for MethodTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.entries.iter().map(|(name, _)| name))
            .finish()
    }
}

impl MethodTable {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Add a handler taking typed parameters and returning a typed result.
    ///
    /// Parameters that fail to deserialise into `P` and errors returned by
    /// the handler both become invocation failures.
    #[must_use]
    pub fn method<P, R, E, F, Fut>(self, name: impl Into<String>, handler: F) -> Self
    where
        P: DeserializeOwned + Send + 'static,
        R: Serialize + Send + 'static,
        E: fmt::Display + Send + 'static,
        F: Fn(P) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, E>> + Send + 'static,
    {
        let handler = Arc::new(handler);
        let method: Method = Arc::new(move |params: Value| {
            let handler = Arc::clone(&handler);
            async move {
                let params: P = serde_json::from_value(params)
                    .map_err(|err| format!("invalid params: {err}"))?;
                let result = handler(params).await.map_err(|err| err.to_string())?;
                serde_json::to_value(result).map_err(|err| format!("invalid result: {err}"))
            }
            .boxed()
        });
        self.raw(name, method)
    }

    /// Add a pre-erased handler operating on raw JSON values.
    #[must_use]
    pub fn raw(mut self, name: impl Into<String>, method: Method) -> Self {
        self.entries.push((name.into(), method));
        self
    }

    /// Number of handlers in the table.
    #[must_use]
    pub fn len(&self) -> usize { self.entries.len() }

    /// Whether the table holds no handlers.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.entries.is_empty() }
}

/// Concurrent map from method name to handler.
#[derive(Default)]
pub struct MethodRegistry {
    methods: DashMap<String, Method>,
}

impl fmt::Debug for MethodRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodRegistry")
            .field("methods", &self.method_names())
            .finish()
    }
}

impl MethodRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Register every method of `service` under its own name.
    ///
    /// Returns the number of methods added.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::DuplicateMethod`] if any name is taken. No
    /// method from this call remains registered in that case.
    pub fn register<S: Service>(&self, service: Arc<S>) -> Result<usize, RegistryError> {
        self.register_table(None, service.methods())
    }

    /// Register every method of `service` as `prefix.method`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::DuplicateMethod`] if any name is taken.
    pub fn register_as<S: Service>(
        &self,
        prefix: &str,
        service: Arc<S>,
    ) -> Result<usize, RegistryError> {
        self.register_table(Some(prefix), service.methods())
    }

    /// Register the handlers of a prepared table.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::DuplicateMethod`] if any name is taken.
    pub fn register_table(
        &self,
        prefix: Option<&str>,
        table: MethodTable,
    ) -> Result<usize, RegistryError> {
        let mut inserted: Vec<String> = Vec::with_capacity(table.len());
        for (name, method) in table.entries {
            let name = match prefix {
                Some(prefix) => format!("{prefix}.{name}"),
                None => name,
            };
            // The entry guard holds a shard lock, so it is released before
            // any rollback removal.
            let taken = match self.methods.entry(name.clone()) {
                Entry::Occupied(_) => true,
                Entry::Vacant(slot) => {
                    slot.insert(method);
                    false
                }
            };
            if taken {
                for added in &inserted {
                    self.methods.remove(added);
                }
                log::warn!("rejecting duplicate method registration: {name}");
                return Err(RegistryError::DuplicateMethod(name));
            }
            tracing::debug!(method = %name, "registered method");
            inserted.push(name);
        }
        Ok(inserted.len())
    }

    /// Remove a method, returning whether it was present.
    pub fn unregister(&self, name: &str) -> bool { self.methods.remove(name).is_some() }

    /// Whether a method is registered under `name`.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool { self.methods.contains_key(name) }

    /// Look up a handler by name.
    ///
    /// The handler is cloned out so no map lock is held while it runs.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Method> {
        self.methods.get(name).map(|entry| Arc::clone(entry.value()))
    }

    /// Number of registered methods.
    #[must_use]
    pub fn len(&self) -> usize { self.methods.len() }

    /// Whether no method is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.methods.is_empty() }

    /// Sorted names of all registered methods.
    #[must_use]
    pub fn method_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .methods
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        names.sort_unstable();
        names
    }
}

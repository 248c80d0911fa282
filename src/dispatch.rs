//! Request dispatch: lookup, admission, hooks and invocation.
//!
//! For each request the [`Dispatcher`] performs, in order:
//!
//! 1. method lookup;
//! 2. rate-limit admission;
//! 3. the before hook;
//! 4. the method itself;
//! 5. the after hook, with mutable access to the result.
//!
//! A failure at any step produces a [`Response`] carrying the matching
//! [`ServiceError`]; later steps do not run, except that the after hook still
//! sees a failed invocation (with a `null` result). A method that panics
//! fails with an invocation error carrying the panic message.

use std::{panic::AssertUnwindSafe, sync::Arc};

use bytes::Bytes;
use futures::FutureExt;
use serde_json::Value;
use tracing::Instrument;

use crate::{
    error::ServiceError,
    hooks::Hooks,
    message::{Incoming, Outgoing, Request, Response},
    panic::panic_message,
    rate_limit::RateLimit,
    registry::MethodRegistry,
};

/// Shared request handling state for every connection of a server.
#[derive(Clone, Debug)]
pub struct Dispatcher {
    registry: Arc<MethodRegistry>,
    limit: Arc<RateLimit>,
    hooks: Arc<Hooks>,
}

impl Dispatcher {
    /// Assemble a dispatcher from its shared parts.
    #[must_use]
    pub fn new(registry: Arc<MethodRegistry>, limit: Arc<RateLimit>, hooks: Arc<Hooks>) -> Self {
        Self {
            registry,
            limit,
            hooks,
        }
    }

    /// Registry consulted for method lookup.
    #[must_use]
    pub fn registry(&self) -> &Arc<MethodRegistry> { &self.registry }

    /// Handle one request and build its response.
    pub async fn dispatch(&self, request: Request) -> Response {
        let id = request.id.clone();
        let span = tracing::debug_span!("dispatch", method = %request.method, id = ?id);
        match self.run(&request).instrument(span).await {
            Ok(result) => Response::success(id, result),
            Err(err) => {
                record_failure(&request.method, &err);
                Response::failure(id, &err)
            }
        }
    }

    async fn run(&self, request: &Request) -> Result<Value, ServiceError> {
        let method = self
            .registry
            .get(&request.method)
            .ok_or_else(|| ServiceError::MethodNotFound(request.method.clone()))?;
        self.limit.try_acquire().map_err(|_| {
            #[cfg(feature = "metrics")]
            crate::metrics::inc_rate_limited();
            ServiceError::RateLimitExceeded
        })?;
        self.hooks
            .before(request)
            .map_err(|err| ServiceError::HookRejected(err.0))?;

        #[cfg(feature = "metrics")]
        crate::metrics::inc_requests();
        let params = request.params.clone();
        let outcome = match AssertUnwindSafe(async move { method(params).await })
            .catch_unwind()
            .await
        {
            Ok(outcome) => outcome.map_err(ServiceError::Invocation),
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                tracing::error!(method = %request.method, panic = %message, "method panicked");
                Err(ServiceError::Invocation(message))
            }
        };

        let mut result = outcome.as_ref().map_or(Value::Null, Clone::clone);
        self.hooks
            .after(request, &mut result)
            .map_err(|err| ServiceError::HookRejected(err.0))?;
        outcome.map(|_| result)
    }

    /// Decode a frame payload, dispatch its request or batch, and encode the
    /// reply payload.
    ///
    /// Batch elements are dispatched one after another in request order.
    pub async fn handle_payload(&self, payload: &[u8]) -> Bytes {
        let outgoing = match Incoming::decode(payload) {
            Ok(Incoming::Single(request)) => Outgoing::Single(self.dispatch(request).await),
            Ok(Incoming::Batch(items)) => {
                let mut responses = Vec::with_capacity(items.len());
                for item in items {
                    let response = match item {
                        Ok(request) => self.dispatch(request).await,
                        Err(err) => decode_failure(&err),
                    };
                    responses.push(response);
                }
                Outgoing::Batch(responses)
            }
            Err(err) => Outgoing::Single(decode_failure(&err)),
        };
        encode_outgoing(&outgoing)
    }
}

fn decode_failure(err: &ServiceError) -> Response {
    log::debug!("rejecting undecodable request: {err}");
    #[cfg(feature = "metrics")]
    crate::metrics::inc_errors(err.label());
    Response::failure(None, err)
}

fn record_failure(method: &str, err: &ServiceError) {
    tracing::debug!(method, kind = err.label(), error = %err, "request failed");
    #[cfg(feature = "metrics")]
    crate::metrics::inc_errors(err.label());
}

fn encode_outgoing(outgoing: &Outgoing) -> Bytes {
    match outgoing.encode() {
        Ok(bytes) => bytes,
        Err(err) => {
            // Results are produced by `serde_json::to_value`, so this only
            // triggers for non-string map keys smuggled in by a raw handler.
            tracing::error!(error = %err, "failed to encode response");
            let fallback = Response::failure(None, &ServiceError::Invocation(err.to_string()));
            Outgoing::Single(fallback).encode().unwrap_or_default()
        }
    }
}

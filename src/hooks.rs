//! Interception points around method invocation.
//!
//! A server carries at most one before hook and one after hook. The before
//! hook sees the decoded request and may veto it; the after hook sees the
//! request together with the mutable result and may rewrite or veto it.
//! Either veto surfaces to the caller as
//! [`ServiceError::HookRejected`](crate::error::ServiceError::HookRejected).

use std::{fmt, sync::Arc};

use serde_json::Value;
use thiserror::Error;

use crate::message::Request;

/// Error returned by a hook to reject a call.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct HookError(pub String);

impl HookError {
    /// Build a hook error from any displayable message.
    pub fn new(message: impl Into<String>) -> Self { Self(message.into()) }
}

/// Callback run after the rate limiter admitted a request and before the
/// method runs.
pub type BeforeHook = Arc<dyn Fn(&Request) -> Result<(), HookError> + Send + Sync>;

/// Callback run after the method returned.
///
/// `result` is `null` when the invocation failed.
pub type AfterHook = Arc<dyn Fn(&Request, &mut Value) -> Result<(), HookError> + Send + Sync>;

/// The pair of hooks installed on a server.
#[derive(Clone, Default)]
pub struct Hooks {
    before: Option<BeforeHook>,
    after: Option<AfterHook>,
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks")
            .field("before", &self.before.is_some())
            .field("after", &self.after.is_some())
            .finish()
    }
}

impl Hooks {
    /// Install the before hook, replacing any previous one.
    #[must_use]
    pub fn with_before<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Request) -> Result<(), HookError> + Send + Sync + 'static,
    {
        self.before = Some(Arc::new(hook));
        self
    }

    /// Install the after hook, replacing any previous one.
    #[must_use]
    pub fn with_after<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Request, &mut Value) -> Result<(), HookError> + Send + Sync + 'static,
    {
        self.after = Some(Arc::new(hook));
        self
    }

    /// Run the before hook if registered.
    ///
    /// # Errors
    ///
    /// Propagates the hook's rejection.
    pub fn before(&self, request: &Request) -> Result<(), HookError> {
        match &self.before {
            Some(hook) => hook(request),
            None => Ok(()),
        }
    }

    /// Run the after hook if registered.
    ///
    /// # Errors
    ///
    /// Propagates the hook's rejection.
    pub fn after(&self, request: &Request, result: &mut Value) -> Result<(), HookError> {
        match &self.after {
            Some(hook) => hook(request, result),
            None => Ok(()),
        }
    }
}

#![doc(html_root_url = "https://docs.rs/framerpc/latest")]
//! Public API for the `framerpc` library.
//!
//! This crate provides a small RPC framework over TCP. Messages are JSON
//! payloads closed by a configurable terminator; servers dispatch them to
//! registered methods behind an optional rate limit and before/after hooks,
//! and clients issue single or batched calls under a deadline.

pub mod client;
pub mod codec;
pub mod config;
pub mod correlation;
pub mod dispatch;
pub mod error;
pub mod hooks;
pub mod message;
mod panic;
#[cfg(feature = "metrics")]
pub mod metrics;
pub mod rate_limit;
pub mod registry;
pub mod server;

pub use client::{BatchSlot, ClientError, RemoteError, RpcClient, RpcClientBuilder};
pub use codec::TerminatedFrameCodec;
pub use config::{ConfigError, FrameConfig};
pub use error::{ServiceError, ServiceErrorKind};
pub use hooks::{HookError, Hooks};
pub use message::{Request, Response};
pub use registry::{MethodRegistry, MethodTable, RegistryError, Service};
pub use server::{RpcServer, ServerConfig, ServerError};

//! Client session for terminator-delimited RPC connections.
//!
//! An [`RpcClient`] owns one TCP connection and issues either single calls,
//! each answered by one reply frame, or batches accumulated with
//! [`RpcClient::batch_append`] and sent together by
//! [`RpcClient::batch_call`]. Every exchange is bounded by the configured
//! timeout.

mod batch;
mod builder;
mod config;
mod error;
mod runtime;

pub use batch::BatchSlot;
pub use builder::RpcClientBuilder;
pub use config::SocketOptions;
pub use error::{ClientError, RemoteError};
pub use runtime::RpcClient;

#[cfg(test)]
mod tests;
